use serde::{Deserialize, Serialize};

/// Fiscal-year fundamentals for a ticker. The feed carries one row per
/// (symbol, fiscal year); ratio columns may be missing for a given year.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FundamentalsRow {
    pub symbol: String,
    pub fiscal_year: i32,
    pub roe: Option<f64>,
    pub debt_equity_ratio: Option<f64>,
    pub current_ratio: Option<f64>,
    pub pe_ratio: Option<f64>,
    pub pb_ratio: Option<f64>,
    pub market_cap: Option<f64>,
}

impl FundamentalsRow {
    /// A row with only the identifying columns populated.
    pub fn empty(symbol: impl Into<String>, fiscal_year: i32) -> Self {
        Self {
            symbol: symbol.into(),
            fiscal_year,
            roe: None,
            debt_equity_ratio: None,
            current_ratio: None,
            pe_ratio: None,
            pb_ratio: None,
            market_cap: None,
        }
    }
}
