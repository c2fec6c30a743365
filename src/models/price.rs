use chrono::NaiveDate;
use serde::{Deserialize, Serialize};

// One daily close for a ticker. Trading days need not be contiguous.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PriceRow {
    pub symbol: String,
    pub trade_date: NaiveDate,
    pub close_price: f64,
}

impl PriceRow {
    pub fn new(symbol: impl Into<String>, trade_date: NaiveDate, close_price: f64) -> Self {
        Self {
            symbol: symbol.into(),
            trade_date,
            close_price,
        }
    }
}

/// Pre-aggregated price result over the plan window, one row per symbol.
///
/// Numeric columns are optional: a NULL, undecodable or non-finite value in
/// the source arrives here as `None`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PriceGrowthRow {
    pub symbol: String,
    pub start_price: Option<f64>,
    pub end_price: Option<f64>,
    /// Fraction, `(end - start) / start`
    pub price_growth: Option<f64>,
}
