use async_trait::async_trait;
use sqlx::mysql::{MySqlPool, MySqlRow};
use sqlx::Row;
use tracing::{debug, error, warn};

use crate::db::{numeric_column, FundamentalsStore};
use crate::models::FundamentalsRow;

/// Fundamentals database backed by a MySQL pool.
#[derive(Clone)]
pub struct MySqlFundamentalsStore {
    pool: MySqlPool,
}

impl MySqlFundamentalsStore {
    pub fn new(pool: MySqlPool) -> Self {
        Self { pool }
    }
}

#[async_trait]
impl FundamentalsStore for MySqlFundamentalsStore {
    async fn fetch_fundamentals(&self, sql: &str) -> Result<Vec<FundamentalsRow>, sqlx::Error> {
        let mut conn = self.pool.acquire().await?;
        let rows = sqlx::query(sql).fetch_all(&mut *conn).await.map_err(|e| {
            error!("Fundamentals query failed: {}", e);
            e
        })?;

        debug!("Fundamentals query returned {} rows", rows.len());
        Ok(rows.iter().filter_map(decode_fundamentals).collect())
    }

    async fn ping(&self) -> Result<(), sqlx::Error> {
        let mut conn = self.pool.acquire().await?;
        sqlx::query("SELECT 1").execute(&mut *conn).await?;
        Ok(())
    }
}

fn decode_fundamentals(row: &MySqlRow) -> Option<FundamentalsRow> {
    let symbol = match row.try_get::<String, _>("symbol") {
        Ok(s) => s.trim().to_uppercase(),
        Err(e) => {
            warn!("Skipping fundamentals row without a readable symbol: {}", e);
            return None;
        }
    };

    // The feed names the column `fy`; accept `fiscal_year` as well
    let fiscal_year = numeric_column(row, "fy")
        .or_else(|| numeric_column(row, "fiscal_year"))
        .filter(|v| v.fract() == 0.0)
        .map(|v| v as i32);
    let Some(fiscal_year) = fiscal_year else {
        warn!("Skipping fundamentals row for {} without a fiscal year", symbol);
        return None;
    };

    Some(FundamentalsRow {
        symbol,
        fiscal_year,
        roe: numeric_column(row, "roe"),
        debt_equity_ratio: numeric_column(row, "debt_equity_ratio"),
        current_ratio: numeric_column(row, "current_ratio"),
        pe_ratio: numeric_column(row, "pe_ratio"),
        pb_ratio: numeric_column(row, "pb_ratio"),
        market_cap: numeric_column(row, "market_cap"),
    })
}
