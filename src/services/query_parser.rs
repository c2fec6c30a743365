use std::sync::LazyLock;

use chrono::{Months, NaiveDate};
use regex::Regex;
use tracing::debug;

use crate::models::{DataWindow, QueryPlan, SymbolUniverse};

// Patterns run against the lower-cased query. They are deliberately loose and
// keep their known blind spots (e.g. overlapping percentage mentions).
static PRICE_GROWTH_RE: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"(\d+)\s*%[^%]*price|\bprice growth\s*(\d+)\s*%").expect("price growth pattern")
});
static DEBT_EQUITY_RE: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"debt[- ]equity\s*[<≤=]+\s*([0-9.]+)").expect("debt equity pattern")
});
static ROE_RE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"roe\s*[>≥=]+\s*([0-9.]+)").expect("roe pattern"));
static PE_RE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"p/?e\s*[<≤=]+\s*([0-9.]+)").expect("pe pattern"));

#[derive(Debug, Default, Clone, Copy, PartialEq)]
struct Thresholds {
    min_price_growth: Option<f64>,
    max_debt_equity: Option<f64>,
    min_roe: Option<f64>,
    max_pe: Option<f64>,
}

/// Deterministic, regex-based query parser.
///
/// Never fails: a signal that isn't found is left absent, and the date
/// window never leaves the configured data window.
#[derive(Debug, Clone)]
pub struct QueryParser {
    window: DataWindow,
    universe: SymbolUniverse,
}

impl QueryParser {
    pub fn new(window: DataWindow, universe: SymbolUniverse) -> Self {
        Self { window, universe }
    }

    pub fn parse(&self, text: &str) -> QueryPlan {
        let (start_date, end_date, fiscal_year) = self.parse_time_window(text);
        let thresholds = parse_thresholds(text);
        let symbols = self.detect_symbols(text);

        debug!(
            "Parsed query window {}..{} fy={:?} symbols={:?} thresholds={:?}",
            start_date, end_date, fiscal_year, symbols, thresholds
        );

        QueryPlan {
            start_date,
            end_date,
            symbols,
            min_price_growth: thresholds.min_price_growth,
            max_debt_equity: thresholds.max_debt_equity,
            min_roe: thresholds.min_roe,
            max_pe: thresholds.max_pe,
            fiscal_year,
        }
    }

    /// Literal year → that calendar year (clipped to the window).
    /// "last year" / "past year" → trailing year ending at the window's end.
    /// Anything else → the whole window.
    fn parse_time_window(&self, text: &str) -> (NaiveDate, NaiveDate, Option<i32>) {
        let t = text.to_lowercase();

        for year in self.window.years() {
            if t.contains(&year.to_string()) {
                let start = NaiveDate::from_ymd_opt(year, 1, 1)
                    .unwrap_or(self.window.start)
                    .max(self.window.start);
                let end = NaiveDate::from_ymd_opt(year, 12, 31)
                    .unwrap_or(self.window.end)
                    .min(self.window.end);
                return (start, end, Some(year));
            }
        }

        if t.contains("last year") || t.contains("past year") {
            let end = self.window.end;
            let start = end
                .checked_sub_months(Months::new(12))
                .unwrap_or(self.window.start)
                .max(self.window.start);
            return (start, end, Some(self.window.end_year()));
        }

        (self.window.start, self.window.end, None)
    }

    /// Case-insensitive substring match against the tracked universe.
    /// `None` rather than an empty list when nothing matches.
    fn detect_symbols(&self, text: &str) -> Option<Vec<String>> {
        let upper = text.to_uppercase();
        let found: Vec<String> = self
            .universe
            .symbols()
            .iter()
            .filter(|s| upper.contains(s.as_str()))
            .cloned()
            .collect();
        (!found.is_empty()).then_some(found)
    }
}

fn parse_thresholds(text: &str) -> Thresholds {
    let t = text.to_lowercase();

    let min_price_growth = PRICE_GROWTH_RE.captures(&t).and_then(|caps| {
        caps.get(1)
            .or_else(|| caps.get(2))
            .and_then(|m| m.as_str().parse::<f64>().ok())
            .map(|pct| pct / 100.0)
    });

    Thresholds {
        min_price_growth,
        max_debt_equity: capture_float(&DEBT_EQUITY_RE, &t),
        min_roe: capture_float(&ROE_RE, &t),
        max_pe: capture_float(&PE_RE, &t),
    }
}

fn capture_float(re: &Regex, text: &str) -> Option<f64> {
    re.captures(text)
        .and_then(|caps| caps.get(1))
        .and_then(|m| m.as_str().parse::<f64>().ok())
        .filter(|v| v.is_finite())
}
