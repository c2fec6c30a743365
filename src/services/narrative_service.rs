use std::sync::LazyLock;

use regex::Regex;
use tracing::{info, warn};

use crate::models::{DataWindow, PlanSummary, ResultRow};
use crate::services::llm_service::LlmService;

// Whole digit runs, so `FY2010` and `(2010)` are seen but `12010` is not
static DIGIT_RUN_RE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"\d+").expect("digit run regex is valid"));

/// Generate a short analyst-style summary of the top result rows.
///
/// Returns an empty string when the generator is disabled, there is nothing
/// to describe, the call fails, or the text mentions a year the data does not
/// cover. None of these fail the query.
pub async fn generate_narrative(
    llm_service: &LlmService,
    query: &str,
    plan: &PlanSummary,
    rows: &[ResultRow],
    top_n: usize,
    window: &DataWindow,
) -> String {
    if !llm_service.is_enabled() || rows.is_empty() || top_n == 0 {
        return String::new();
    }

    let prompt = build_narrative_prompt(query, plan, rows, top_n, window);

    match llm_service.generate(&prompt, llm_service.default_params()).await {
        Ok(text) => {
            let narrative = sanitize_narrative(&text, window);
            if !narrative.is_empty() {
                info!("Narrative generated ({} chars)", narrative.len());
            }
            narrative
        }
        Err(e) => {
            warn!("Narrative generation failed, returning results without one: {}", e);
            String::new()
        }
    }
}

/// Drop the whole text if any four-digit year falls outside `window`.
///
/// Trimming the offending sentence would still leave a narrative built on
/// invented context, so the check is all-or-nothing.
pub fn sanitize_narrative(text: &str, window: &DataWindow) -> String {
    let text = text.trim();

    let foreign_year = DIGIT_RUN_RE
        .find_iter(text)
        .map(|m| m.as_str())
        .filter(|run| run.len() == 4)
        .filter_map(|run| run.parse::<i32>().ok())
        .filter(|year| (1900..=2099).contains(year))
        .find(|year| !window.contains_year(*year));

    if let Some(year) = foreign_year {
        warn!(
            "Discarding narrative that mentions {} outside the {}..{} data window",
            year,
            window.start_year(),
            window.end_year()
        );
        return String::new();
    }

    text.to_string()
}

/// Build the prompt for the top `top_n` rows.
fn build_narrative_prompt(
    query: &str,
    plan: &PlanSummary,
    rows: &[ResultRow],
    top_n: usize,
    window: &DataWindow,
) -> String {
    let lines: Vec<String> = rows
        .iter()
        .take(top_n)
        .map(describe_row)
        .collect();

    let symbols = plan
        .symbols
        .as_ref()
        .map(|s| s.join(", "))
        .unwrap_or_else(|| "all tracked symbols".to_string());

    format!(
        r#"You are a financial analyst. A user asked: "{query}"

PERIOD: {start} to {end}
UNIVERSE: {symbols}

MATCHING COMPANIES:
{rows}

INSTRUCTIONS:
- Summarize the results in 3-5 concise sentences
- Use only the figures listed above
- Do not mention any year outside {first_year}-{last_year}
- Do NOT recommend buying or selling specific securities"#,
        query = query.trim(),
        start = plan.start_date,
        end = plan.end_date,
        symbols = symbols,
        rows = lines.join("\n"),
        first_year = window.start_year(),
        last_year = window.end_year(),
    )
}

fn describe_row(row: &ResultRow) -> String {
    let mut parts = vec![format!("- {}", row.symbol)];

    if let Some(g) = row.price_growth {
        parts.push(format!("growth {:.1}%", g * 100.0));
    }
    if let Some(fy) = row.fiscal_year {
        parts.push(format!("FY{}", fy));
    }
    if let Some(v) = row.roe {
        parts.push(format!("ROE {:.2}", v));
    }
    if let Some(v) = row.debt_equity_ratio {
        parts.push(format!("D/E {:.2}", v));
    }
    if let Some(v) = row.pe_ratio {
        parts.push(format!("P/E {:.2}", v));
    }
    if let Some(v) = row.volatility {
        parts.push(format!("daily volatility {:.2}%", v * 100.0));
    }
    if let Some(v) = row.max_drawdown {
        parts.push(format!("max drawdown {:.1}%", v * 100.0));
    }

    parts.join(", ")
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::errors::LlmError;
    use crate::models::QueryPlan;
    use crate::services::llm_service::{GenerationParams, LlmConfig, TextGenerator};
    use async_trait::async_trait;
    use std::sync::Arc;

    struct Canned(Result<String, LlmError>);

    #[async_trait]
    impl TextGenerator for Canned {
        async fn generate(&self, _prompt: &str, _params: GenerationParams) -> Result<String, LlmError> {
            self.0.clone()
        }

        async fn is_available(&self) -> bool {
            true
        }
    }

    fn service(reply: Result<String, LlmError>) -> LlmService {
        LlmService::with_provider(LlmConfig::default(), Arc::new(Canned(reply)))
    }

    fn row(symbol: &str) -> ResultRow {
        ResultRow {
            symbol: symbol.to_string(),
            start_price: Some(100.0),
            end_price: Some(125.0),
            price_growth: Some(0.25),
            fiscal_year: Some(2017),
            roe: Some(18.5),
            debt_equity_ratio: Some(0.4),
            current_ratio: None,
            pe_ratio: Some(22.0),
            pb_ratio: None,
            market_cap: None,
            volatility: Some(0.012),
            max_drawdown: Some(0.08),
        }
    }

    fn summary() -> PlanSummary {
        let window = DataWindow::default();
        QueryPlan::unfiltered(window.start, window.end).summary()
    }

    #[test]
    fn test_build_narrative_prompt() {
        let window = DataWindow::default();
        let rows = vec![row("TCS"), row("INFY"), row("SBIN")];
        let prompt = build_narrative_prompt("  best IT stocks ", &summary(), &rows, 2, &window);

        assert!(prompt.contains("\"best IT stocks\""));
        assert!(prompt.contains("- TCS, growth 25.0%, FY2017"));
        assert!(prompt.contains("INFY"));
        assert!(!prompt.contains("SBIN"));
        assert!(prompt.contains("2016-2017"));
    }

    #[test]
    fn test_sanitize_keeps_in_window_years() {
        let window = DataWindow::default();
        let text = " TCS grew steadily through 2016 and 2017. ";
        assert_eq!(sanitize_narrative(text, &window), text.trim());
    }

    #[test]
    fn test_sanitize_discards_foreign_year() {
        let window = DataWindow::default();
        assert_eq!(sanitize_narrative("Since 2010 TCS has compounded.", &window), "");
        assert_eq!(sanitize_narrative("Expect gains by 2025.", &window), "");
    }

    #[test]
    fn test_sanitize_sees_fiscal_year_prefix() {
        let window = DataWindow::default();
        assert_eq!(sanitize_narrative("SBIN has grown steadily since FY2010.", &window), "");
        assert_eq!(sanitize_narrative("Margins widened (FY2013-FY2017).", &window), "");

        let text = "SBIN improved from FY2016 to FY2017.";
        assert_eq!(sanitize_narrative(text, &window), text);
    }

    #[test]
    fn test_sanitize_ignores_non_year_numbers() {
        let window = DataWindow::default();
        let text = "Market cap reached 12010 crore with P/E near 2100x.";
        assert_eq!(sanitize_narrative(text, &window), text);

        let text = "Revenue of 1,999 crore in FY 2017.";
        assert_eq!(sanitize_narrative(text, &window), text);
    }

    #[tokio::test]
    async fn test_narrative_discarded_but_not_an_error() {
        let window = DataWindow::default();
        let llm = service(Ok("Back in 2010 the bank was smaller.".to_string()));
        let text = generate_narrative(&llm, "q", &summary(), &[row("SBIN")], 3, &window).await;
        assert!(text.is_empty());
    }

    #[tokio::test]
    async fn test_narrative_empty_on_error_or_no_rows() {
        let window = DataWindow::default();
        let failing = service(Err(LlmError::NetworkError("refused".into())));
        assert!(generate_narrative(&failing, "q", &summary(), &[row("TCS")], 3, &window)
            .await
            .is_empty());

        let ok = service(Ok("TCS led the group in 2017.".to_string()));
        assert!(generate_narrative(&ok, "q", &summary(), &[], 3, &window).await.is_empty());
        assert_eq!(
            generate_narrative(&ok, "q", &summary(), &[row("TCS")], 3, &window).await,
            "TCS led the group in 2017."
        );
    }

    #[tokio::test]
    async fn test_disabled_service_yields_empty_narrative() {
        let window = DataWindow::default();
        let llm = LlmService::disabled();
        assert!(generate_narrative(&llm, "q", &summary(), &[row("TCS")], 3, &window)
            .await
            .is_empty());
    }
}
