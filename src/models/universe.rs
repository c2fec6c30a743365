use chrono::{Datelike, NaiveDate};
use serde::{Deserialize, Serialize};

/// Inclusive span of dates covered by the price and fundamentals feeds.
///
/// Every date the parser produces falls inside this window.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct DataWindow {
    pub start: NaiveDate,
    pub end: NaiveDate,
}

impl DataWindow {
    /// Returns `None` when `start > end`.
    pub fn new(start: NaiveDate, end: NaiveDate) -> Option<Self> {
        (start <= end).then_some(Self { start, end })
    }

    pub fn start_year(&self) -> i32 {
        self.start.year()
    }

    pub fn end_year(&self) -> i32 {
        self.end.year()
    }

    pub fn contains(&self, date: NaiveDate) -> bool {
        self.start <= date && date <= self.end
    }

    pub fn contains_year(&self, year: i32) -> bool {
        self.start_year() <= year && year <= self.end_year()
    }

    pub fn years(&self) -> impl Iterator<Item = i32> {
        self.start_year()..=self.end_year()
    }
}

impl Default for DataWindow {
    fn default() -> Self {
        Self {
            start: NaiveDate::from_ymd_opt(2016, 1, 1).unwrap_or(NaiveDate::MIN),
            end: NaiveDate::from_ymd_opt(2017, 12, 31).unwrap_or(NaiveDate::MAX),
        }
    }
}

/// The tracked securities, injected per deployment.
///
/// Identifiers are stored upper-cased and keep their configured order, which
/// is also the order the parser reports detected symbols in.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SymbolUniverse {
    symbols: Vec<String>,
}

pub const DEFAULT_SYMBOLS: [&str; 9] = [
    "RELIANCE",
    "HDFCBANK",
    "BHARTIARTL",
    "TCS",
    "ICICIBANK",
    "SBIN",
    "BAJFINANCE",
    "INFY",
    "HINDUNILVR",
];

impl SymbolUniverse {
    pub fn new<I, S>(symbols: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: AsRef<str>,
    {
        let mut out: Vec<String> = Vec::new();
        for s in symbols {
            let s = s.as_ref().trim().to_uppercase();
            if !s.is_empty() && !out.contains(&s) {
                out.push(s);
            }
        }
        Self { symbols: out }
    }

    pub fn contains(&self, symbol: &str) -> bool {
        self.symbols.iter().any(|s| s.eq_ignore_ascii_case(symbol))
    }

    pub fn symbols(&self) -> &[String] {
        &self.symbols
    }

    pub fn is_empty(&self) -> bool {
        self.symbols.is_empty()
    }

    pub fn len(&self) -> usize {
        self.symbols.len()
    }
}

impl Default for SymbolUniverse {
    fn default() -> Self {
        Self::new(DEFAULT_SYMBOLS)
    }
}
