use axum::extract::rejection::JsonRejection;
use axum::extract::State;
use axum::{Json, Router};
use axum::routing::post;
use tracing::{error, info, warn};

use crate::errors::AppError;
use crate::models::{QueryRequest, QueryResponse};
use crate::state::AppState;

pub fn router() -> Router<AppState> {
    Router::new()
        .route("/", post(run_query))
}

/// POST /api/query
///
/// Request body: QueryRequest
/// {
///   "nl_query": "Companies with 20% price growth and debt-equity <= 1 in 2017"
/// }
///
/// Returns: QueryResponse with the resolved plan, matching rows, an optional
/// narrative and a status explaining empty results
async fn run_query(
    State(state): State<AppState>,
    payload: Result<Json<QueryRequest>, JsonRejection>,
) -> Result<Json<QueryResponse>, AppError> {
    let Json(request) = payload.map_err(|rejection| {
        warn!("Rejected query body: {}", rejection.body_text());
        AppError::Validation(format!("Invalid request body: {}", rejection.body_text()))
    })?;

    let nl_query = request.nl_query.trim();
    if nl_query.is_empty() {
        return Err(AppError::Validation("nl_query cannot be empty".to_string()));
    }

    info!("POST /api/query - Query: {}", nl_query);

    let response = state
        .query_service
        .execute_query(nl_query)
        .await
        .map_err(|e| {
            error!("Failed to execute query: {}", e);
            AppError::from(e)
        })?;

    info!(
        "Successfully answered query with {} results",
        response.results.len()
    );

    Ok(Json(response))
}
