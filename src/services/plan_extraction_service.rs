use chrono::NaiveDate;
use serde::Deserialize;
use thiserror::Error;
use tracing::{debug, info, warn};

use crate::errors::LlmError;
use crate::models::{DataWindow, QueryPlan, SymbolUniverse};
use crate::services::llm_service::{GenerationParams, LlmService};

/// Shape the model is asked to return. Unknown keys reject the whole draft.
#[derive(Debug, Deserialize)]
#[serde(deny_unknown_fields)]
struct LlmPlanDraft {
    start_date: Option<String>,
    end_date: Option<String>,
    #[serde(default)]
    symbols: Option<Vec<String>>,
    #[serde(default)]
    min_price_growth: Option<f64>,
    #[serde(default)]
    max_debt_equity: Option<f64>,
    #[serde(default)]
    min_roe: Option<f64>,
    #[serde(default)]
    max_pe: Option<f64>,
    #[serde(default, alias = "fy")]
    fiscal_year: Option<i32>,
    #[serde(default)]
    sql_price: Option<String>,
    #[serde(default)]
    sql_fund: Option<String>,
}

#[derive(Debug, Error, PartialEq)]
pub enum ExtractionError {
    #[error("text generator unavailable: {0}")]
    Llm(#[from] LlmError),
    #[error("response is not a plan object: {0}")]
    Malformed(String),
    #[error("missing {0}")]
    MissingField(&'static str),
    #[error("{field} is not an ISO date: {value}")]
    BadDate { field: &'static str, value: String },
    #[error("start date {start} is after end date {end}")]
    InvertedRange { start: NaiveDate, end: NaiveDate },
    #[error("{0} is outside the data window")]
    OutsideWindow(String),
    #[error("unknown symbol {0}")]
    UnknownSymbol(String),
    #[error("{0} is not a finite number")]
    NonFinite(&'static str),
}

/// A plan the model proposed that survived every check, plus any SQL it
/// suggested. The SQL is still unvalidated here.
#[derive(Debug, Clone, PartialEq)]
pub struct ExtractedPlan {
    pub plan: QueryPlan,
    pub sql_price: Option<String>,
    pub sql_fund: Option<String>,
}

/// Ask the text generator to turn `text` into a plan.
///
/// Any failure, from transport to a single out-of-window date, is returned as
/// an [`ExtractionError`]; the caller falls back to the regex parser.
pub async fn extract_plan(
    llm_service: &LlmService,
    text: &str,
    window: &DataWindow,
    universe: &SymbolUniverse,
) -> Result<ExtractedPlan, ExtractionError> {
    let prompt = build_extraction_prompt(text, window, universe);
    // Extraction wants determinism, not prose
    let params = GenerationParams {
        temperature: 0.0,
        ..llm_service.default_params()
    };

    let response = llm_service.generate(&prompt, params).await?;
    debug!("Plan extraction response: {}", response);

    let extracted = parse_extraction_response(&response, window, universe)?;
    info!("Using LLM-extracted plan for query");
    Ok(extracted)
}

fn build_extraction_prompt(text: &str, window: &DataWindow, universe: &SymbolUniverse) -> String {
    format!(
        r#"Convert the financial question below into a JSON query plan.

QUESTION: {text}

DATA AVAILABLE:
- Daily closing prices from {start} to {end} in table prices(symbol, trade_date, close_price)
- Fiscal-year fundamentals in table fundamentals(symbol, fy, roe, debt_equity_ratio, current_ratio, pe_ratio, pb_ratio, market_cap)
- Symbols: {symbols}

RULES:
- Dates must be YYYY-MM-DD and inside the period above
- Price growth is a fraction (20% is 0.2)
- Use null for anything the question does not mention
- Each SQL statement may read only its own table

Respond with only this JSON object:
{{
  "start_date": "YYYY-MM-DD",
  "end_date": "YYYY-MM-DD",
  "symbols": ["..."] or null,
  "min_price_growth": number or null,
  "max_debt_equity": number or null,
  "min_roe": number or null,
  "max_pe": number or null,
  "fiscal_year": number or null,
  "sql_price": "SELECT ..." or null,
  "sql_fund": "SELECT ..." or null
}}"#,
        text = text.trim(),
        start = window.start,
        end = window.end,
        symbols = universe.symbols().join(", "),
    )
}

/// Parse and verify a model response.
///
/// Markdown fences and chatter around the object are tolerated: everything
/// from the first `{` to the last `}` is parsed.
pub fn parse_extraction_response(
    response: &str,
    window: &DataWindow,
    universe: &SymbolUniverse,
) -> Result<ExtractedPlan, ExtractionError> {
    let (Some(open), Some(close)) = (response.find('{'), response.rfind('}')) else {
        return Err(ExtractionError::Malformed("no JSON object found".to_string()));
    };
    if close < open {
        return Err(ExtractionError::Malformed("no JSON object found".to_string()));
    }

    let draft: LlmPlanDraft = serde_json::from_str(&response[open..=close])
        .map_err(|e| ExtractionError::Malformed(e.to_string()))?;

    let start_date = parse_date("start_date", draft.start_date)?;
    let end_date = parse_date("end_date", draft.end_date)?;
    if start_date > end_date {
        return Err(ExtractionError::InvertedRange {
            start: start_date,
            end: end_date,
        });
    }
    for date in [start_date, end_date] {
        if !window.contains(date) {
            return Err(ExtractionError::OutsideWindow(date.to_string()));
        }
    }

    if let Some(fy) = draft.fiscal_year {
        if !window.contains_year(fy) {
            return Err(ExtractionError::OutsideWindow(format!("fiscal year {}", fy)));
        }
    }

    let symbols = match draft.symbols {
        Some(list) => {
            let mut out: Vec<String> = Vec::new();
            for s in list {
                let s = s.trim().to_uppercase();
                if !universe.contains(&s) {
                    warn!("LLM proposed untracked symbol {}", s);
                    return Err(ExtractionError::UnknownSymbol(s));
                }
                if !out.contains(&s) {
                    out.push(s);
                }
            }
            // An empty list means no restriction
            (!out.is_empty()).then_some(out)
        }
        None => None,
    };

    let plan = QueryPlan {
        start_date,
        end_date,
        symbols,
        min_price_growth: finite_threshold("min_price_growth", draft.min_price_growth)?,
        max_debt_equity: finite_threshold("max_debt_equity", draft.max_debt_equity)?,
        min_roe: finite_threshold("min_roe", draft.min_roe)?,
        max_pe: finite_threshold("max_pe", draft.max_pe)?,
        fiscal_year: draft.fiscal_year,
    };

    Ok(ExtractedPlan {
        plan,
        sql_price: non_blank(draft.sql_price),
        sql_fund: non_blank(draft.sql_fund),
    })
}

fn parse_date(field: &'static str, value: Option<String>) -> Result<NaiveDate, ExtractionError> {
    let value = value.ok_or(ExtractionError::MissingField(field))?;
    NaiveDate::parse_from_str(value.trim(), "%Y-%m-%d")
        .map_err(|_| ExtractionError::BadDate { field, value })
}

fn finite_threshold(field: &'static str, value: Option<f64>) -> Result<Option<f64>, ExtractionError> {
    match value {
        Some(v) if !v.is_finite() => Err(ExtractionError::NonFinite(field)),
        other => Ok(other),
    }
}

fn non_blank(sql: Option<String>) -> Option<String> {
    sql.filter(|s| !s.trim().is_empty())
}
