pub mod fundamentals_queries;
pub mod price_queries;

use async_trait::async_trait;

use crate::models::{FundamentalsRow, PriceGrowthRow, PriceRow};

pub use fundamentals_queries::MySqlFundamentalsStore;
pub use price_queries::MySqlPriceStore;

/// Read-only access to the daily price database.
///
/// Every call runs exactly one statement on one connection.
#[async_trait]
pub trait PriceStore: Send + Sync {
    /// Run the aggregated (one row per symbol) price statement.
    async fn fetch_price_growth(&self, sql: &str) -> Result<Vec<PriceGrowthRow>, sqlx::Error>;

    /// Run a daily-series statement returning `(symbol, trade_date, close_price)`.
    async fn fetch_daily_series(&self, sql: &str) -> Result<Vec<PriceRow>, sqlx::Error>;

    async fn ping(&self) -> Result<(), sqlx::Error>;
}

/// Read-only access to the fiscal-year fundamentals database.
#[async_trait]
pub trait FundamentalsStore: Send + Sync {
    async fn fetch_fundamentals(&self, sql: &str) -> Result<Vec<FundamentalsRow>, sqlx::Error>;

    async fn ping(&self) -> Result<(), sqlx::Error>;
}

/// Read a numeric column whatever its MySQL type, through the safe cast.
///
/// A missing column or a type we can't decode reads as absent.
pub(crate) fn numeric_column(row: &sqlx::mysql::MySqlRow, column: &str) -> Option<f64> {
    use crate::utils::numeric::SafeCast;
    use bigdecimal::BigDecimal;
    use sqlx::Row;

    if let Ok(v) = row.try_get::<Option<BigDecimal>, _>(column) {
        return v.safe_f64();
    }
    if let Ok(v) = row.try_get::<Option<f64>, _>(column) {
        return v.safe_f64();
    }
    if let Ok(v) = row.try_get::<Option<f32>, _>(column) {
        return v.safe_f64();
    }
    if let Ok(v) = row.try_get::<Option<i64>, _>(column) {
        return v.safe_f64();
    }
    if let Ok(v) = row.try_get::<Option<String>, _>(column) {
        return v.safe_f64();
    }
    None
}
