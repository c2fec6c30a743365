use chrono::NaiveDate;
use serde::{Deserialize, Serialize};

/// Structured intent of a natural-language query.
///
/// Built once per request by the parser (or a verified LLM extraction) and
/// never mutated afterwards. The SQL that executes it lives in
/// [`ExecutablePlan`](crate::services::sql_planner::ExecutablePlan).
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct QueryPlan {
    /// Inclusive, always `<= end_date`
    pub start_date: NaiveDate,
    pub end_date: NaiveDate,
    /// `None` means every tracked symbol; never `Some(vec![])`
    pub symbols: Option<Vec<String>>,
    /// Fraction, e.g. 0.2 for 20%
    pub min_price_growth: Option<f64>,
    pub max_debt_equity: Option<f64>,
    pub min_roe: Option<f64>,
    pub max_pe: Option<f64>,
    pub fiscal_year: Option<i32>,
}

impl QueryPlan {
    /// A plan covering `[start_date, end_date]` with no filters.
    pub fn unfiltered(start_date: NaiveDate, end_date: NaiveDate) -> Self {
        Self {
            start_date,
            end_date,
            symbols: None,
            min_price_growth: None,
            max_debt_equity: None,
            min_roe: None,
            max_pe: None,
            fiscal_year: None,
        }
    }

    pub fn summary(&self) -> PlanSummary {
        PlanSummary {
            start_date: self.start_date,
            end_date: self.end_date,
            symbols: self.symbols.clone(),
            fiscal_year: self.fiscal_year,
            min_price_growth: self.min_price_growth,
            max_debt_equity: self.max_debt_equity,
            min_roe: self.min_roe,
            max_pe: self.max_pe,
        }
    }
}

/// What the caller sees of the plan: the resolved window, symbols, fiscal
/// year and every threshold that was applied.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PlanSummary {
    pub start_date: NaiveDate,
    pub end_date: NaiveDate,
    pub symbols: Option<Vec<String>>,
    pub fiscal_year: Option<i32>,
    pub min_price_growth: Option<f64>,
    pub max_debt_equity: Option<f64>,
    pub min_roe: Option<f64>,
    pub max_pe: Option<f64>,
}
