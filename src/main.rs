use std::net::SocketAddr;
use std::sync::Arc;

use sqlx::mysql::MySqlPoolOptions;
use tokio::net::TcpListener;

use finsight_backend::app;
use finsight_backend::config::AppConfig;
use finsight_backend::db::{MySqlFundamentalsStore, MySqlPriceStore};
use finsight_backend::logging::{self, LoggingConfig};
use finsight_backend::services::llm_service::LlmService;
use finsight_backend::services::query_service::QueryService;
use finsight_backend::state::AppState;

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    dotenvy::dotenv().ok();

    // Initialize logging FIRST
    logging::init_logging(LoggingConfig::from_env())?;

    let config = AppConfig::from_env();
    config.validate()?;

    // Lazy pools: the service starts (and /health reports) even when a
    // database is down
    let price_pool = MySqlPoolOptions::new()
        .max_connections(config.db_max_connections)
        .connect_lazy(&config.price_database_url)?;
    let fund_pool = MySqlPoolOptions::new()
        .max_connections(config.db_max_connections)
        .connect_lazy(&config.fundamentals_database_url)?;

    let llm_service = Arc::new(LlmService::new(config.llm.clone()));

    tracing::info!(
        "📊 Tracking {} symbols from {} to {}",
        config.pipeline.universe.len(),
        config.pipeline.window.start,
        config.pipeline.window.end
    );

    let query_service = QueryService::new(
        Arc::new(MySqlPriceStore::new(price_pool)),
        Arc::new(MySqlFundamentalsStore::new(fund_pool)),
        llm_service,
        config.pipeline.clone(),
    );

    let state = AppState {
        query_service: Arc::new(query_service),
    };
    let app = app::create_app(state);

    let addr = SocketAddr::from(([0, 0, 0, 0], config.server_port));
    let listener = TcpListener::bind(&addr).await?;
    tracing::info!("🚀 FinSight backend running at http://{}/", addr);
    axum::serve(listener, app)
        .await?;

    Ok(())
}
