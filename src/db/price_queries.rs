use async_trait::async_trait;
use chrono::NaiveDate;
use sqlx::mysql::{MySqlPool, MySqlRow};
use sqlx::Row;
use tracing::{debug, error, warn};

use crate::db::{numeric_column, PriceStore};
use crate::models::{PriceGrowthRow, PriceRow};

/// Price database backed by a MySQL pool.
#[derive(Clone)]
pub struct MySqlPriceStore {
    pool: MySqlPool,
}

impl MySqlPriceStore {
    pub fn new(pool: MySqlPool) -> Self {
        Self { pool }
    }
}

#[async_trait]
impl PriceStore for MySqlPriceStore {
    async fn fetch_price_growth(&self, sql: &str) -> Result<Vec<PriceGrowthRow>, sqlx::Error> {
        // The connection goes back to the pool when `conn` drops, on every path
        let mut conn = self.pool.acquire().await?;
        let rows = sqlx::query(sql).fetch_all(&mut *conn).await.map_err(|e| {
            error!("Price growth query failed: {}", e);
            e
        })?;

        debug!("Price growth query returned {} rows", rows.len());
        Ok(rows.iter().filter_map(decode_price_growth).collect())
    }

    async fn fetch_daily_series(&self, sql: &str) -> Result<Vec<PriceRow>, sqlx::Error> {
        let mut conn = self.pool.acquire().await?;
        let rows = sqlx::query(sql).fetch_all(&mut *conn).await.map_err(|e| {
            error!("Daily series query failed: {}", e);
            e
        })?;

        debug!("Daily series query returned {} rows", rows.len());
        Ok(rows.iter().filter_map(decode_daily_row).collect())
    }

    async fn ping(&self) -> Result<(), sqlx::Error> {
        let mut conn = self.pool.acquire().await?;
        sqlx::query("SELECT 1").execute(&mut *conn).await?;
        Ok(())
    }
}

fn decode_price_growth(row: &MySqlRow) -> Option<PriceGrowthRow> {
    let symbol = match row.try_get::<String, _>("symbol") {
        Ok(s) => s.trim().to_uppercase(),
        Err(e) => {
            warn!("Skipping price row without a readable symbol: {}", e);
            return None;
        }
    };

    Some(PriceGrowthRow {
        symbol,
        start_price: numeric_column(row, "start_price"),
        end_price: numeric_column(row, "end_price"),
        price_growth: numeric_column(row, "price_growth"),
    })
}

fn decode_daily_row(row: &MySqlRow) -> Option<PriceRow> {
    let symbol = row.try_get::<String, _>("symbol").ok()?;
    let trade_date = match row.try_get::<NaiveDate, _>("trade_date") {
        Ok(d) => d,
        Err(e) => {
            warn!("Skipping daily row for {} without a trade date: {}", symbol, e);
            return None;
        }
    };
    // A missing close is a gap in the series, not a zero
    let close_price = numeric_column(row, "close_price")?;

    Some(PriceRow {
        symbol: symbol.trim().to_uppercase(),
        trade_date,
        close_price,
    })
}
