use std::sync::Arc;

use crate::services::query_service::QueryService;

#[derive(Clone)]
pub struct AppState {
    pub query_service: Arc<QueryService>,
}
