use tracing::{error, info};

use crate::db::{FundamentalsStore, PriceStore};
use crate::errors::{DataSource, DataSourceError};
use crate::models::{FundamentalsRow, PriceGrowthRow, PriceRow};
use crate::services::sql_planner::ExecutablePlan;

/// The two independent result sets for one plan.
#[derive(Debug, Clone, Default)]
pub struct FederatedResult {
    pub prices: Vec<PriceGrowthRow>,
    pub fundamentals: Vec<FundamentalsRow>,
}

/// Run `sql_price` and `sql_fund` against their stores concurrently.
///
/// Neither statement waits on the other and there is no shared transaction.
/// A failure on either side fails the whole call with the offending statement
/// attached; nothing is retried and no partial result is returned.
pub async fn run_federated_query(
    price_store: &dyn PriceStore,
    fund_store: &dyn FundamentalsStore,
    plan: &ExecutablePlan,
) -> Result<FederatedResult, DataSourceError> {
    let (prices, fundamentals) = tokio::join!(
        price_store.fetch_price_growth(plan.sql_price()),
        fund_store.fetch_fundamentals(plan.sql_fund()),
    );

    let prices = prices.map_err(|e| {
        let err = DataSourceError::new(DataSource::Prices, plan.sql_price(), e);
        error!("❌ {}", err);
        err
    });
    let fundamentals = fundamentals.map_err(|e| {
        let err = DataSourceError::new(DataSource::Fundamentals, plan.sql_fund(), e);
        error!("❌ {}", err);
        err
    });

    let prices = prices?;
    let fundamentals = fundamentals?;

    info!(
        "Federated query returned {} price rows and {} fundamentals rows",
        prices.len(),
        fundamentals.len()
    );

    Ok(FederatedResult {
        prices,
        fundamentals,
    })
}

/// Fetch the raw daily closes used for risk metrics.
pub async fn fetch_daily_series(
    price_store: &dyn PriceStore,
    sql: &str,
) -> Result<Vec<PriceRow>, DataSourceError> {
    price_store.fetch_daily_series(sql).await.map_err(|e| {
        let err = DataSourceError::new(DataSource::Prices, sql, e);
        error!("❌ {}", err);
        err
    })
}
