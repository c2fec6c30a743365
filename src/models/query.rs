use serde::{Deserialize, Serialize};

use crate::models::PlanSummary;

/// Body of `POST /api/query`
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct QueryRequest {
    #[serde(default)]
    pub nl_query: String,
}

/// One security that passed every filter.
///
/// All numeric fields are `None` when the value is unavailable. `None` is
/// never a stand-in for zero: a symbol without fundamentals has `roe: None`,
/// and a flat price series has `max_drawdown: Some(0.0)`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ResultRow {
    pub symbol: String,
    pub start_price: Option<f64>,
    pub end_price: Option<f64>,
    pub price_growth: Option<f64>,
    pub fiscal_year: Option<i32>,
    pub roe: Option<f64>,
    pub debt_equity_ratio: Option<f64>,
    pub current_ratio: Option<f64>,
    pub pe_ratio: Option<f64>,
    pub pb_ratio: Option<f64>,
    pub market_cap: Option<f64>,
    /// Sample standard deviation of daily returns over the plan window
    pub volatility: Option<f64>,
    /// Largest peak-to-trough decline as a positive fraction
    pub max_drawdown: Option<f64>,
}

/// Outcome attached to every successful response.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "kind", content = "reason", rename_all = "snake_case")]
pub enum ResultStatus {
    Ok,
    /// The price source returned nothing for the plan
    NoData(String),
    /// Data came back but no symbol passed the thresholds
    NoMatches(String),
    /// Rows came back without usable price metrics
    Unavailable(String),
}

impl ResultStatus {
    pub fn is_ok(&self) -> bool {
        matches!(self, ResultStatus::Ok)
    }

    pub fn reason(&self) -> Option<&str> {
        match self {
            ResultStatus::Ok => None,
            ResultStatus::NoData(r) | ResultStatus::NoMatches(r) | ResultStatus::Unavailable(r) => {
                Some(r.as_str())
            }
        }
    }
}

impl std::fmt::Display for ResultStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            ResultStatus::Ok => write!(f, "ok"),
            ResultStatus::NoData(r) => write!(f, "no data: {}", r),
            ResultStatus::NoMatches(r) => write!(f, "no matches: {}", r),
            ResultStatus::Unavailable(r) => write!(f, "unavailable: {}", r),
        }
    }
}

/// Full answer to a natural-language query
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct QueryResponse {
    pub plan: PlanSummary,
    pub results: Vec<ResultRow>,
    /// Empty when the text generator is disabled, failed, or was discarded
    pub narrative: String,
    pub status: ResultStatus,
}

/// Body of `GET /health`
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct HealthReport {
    pub status: String,
    pub db_ok: bool,
    pub llm_ok: bool,
    pub messages: Vec<String>,
}
