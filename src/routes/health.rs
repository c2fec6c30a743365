use axum::{
    Json, Router,
    extract::State,
    http::StatusCode,
    routing::get,
};
use tracing::{info, warn};

use crate::models::HealthReport;
use crate::state::AppState;

pub fn router() -> Router<AppState> {
    Router::new()
        .route("/", get(health))
}

/// GET /health
///
/// 200 when both databases answer, 503 otherwise. The text generator is
/// reported but never degrades the status.
async fn health(State(state): State<AppState>) -> (StatusCode, Json<HealthReport>) {
    info!("GET /health - Health check");

    let report = state.query_service.health().await;
    let code = if report.db_ok {
        StatusCode::OK
    } else {
        warn!("Health check degraded: {:?}", report.messages);
        StatusCode::SERVICE_UNAVAILABLE
    };

    (code, Json(report))
}
