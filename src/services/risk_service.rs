use std::collections::BTreeMap;

use chrono::NaiveDate;

use crate::models::PriceRow;

/// Per-symbol risk derived from the daily close series.
///
/// `None` marks a metric that could not be computed (non-finite arithmetic,
/// non-positive prices, or no series at all).
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct RiskMetrics {
    pub volatility: Option<f64>,
    pub max_drawdown: Option<f64>,
}

impl RiskMetrics {
    pub fn unavailable() -> Self {
        Self {
            volatility: None,
            max_drawdown: None,
        }
    }
}

/// Compute volatility and max drawdown for one symbol's rows.
///
/// Rows are sorted by trade date first; gaps between dates are fine.
pub fn compute_series_risk(series: &[PriceRow]) -> RiskMetrics {
    let mut sorted: Vec<&PriceRow> = series.iter().collect();
    sorted.sort_by_key(|p| p.trade_date);
    let prices: Vec<f64> = sorted.iter().map(|p| p.close_price).collect();

    RiskMetrics {
        volatility: compute_volatility(&prices),
        max_drawdown: compute_max_drawdown(&prices),
    }
}

/// Group daily rows by symbol, keeping only dates inside `[start, end]`.
pub fn group_series(
    rows: &[PriceRow],
    start: NaiveDate,
    end: NaiveDate,
) -> BTreeMap<String, Vec<PriceRow>> {
    let mut grouped: BTreeMap<String, Vec<PriceRow>> = BTreeMap::new();
    for row in rows.iter().filter(|r| start <= r.trade_date && r.trade_date <= end) {
        grouped
            .entry(row.symbol.to_uppercase())
            .or_default()
            .push(row.clone());
    }
    grouped
}

/// `p[t] / p[t-1] - 1` for consecutive closes.
pub fn daily_returns(prices: &[f64]) -> Vec<f64> {
    prices.windows(2).map(|w| w[1] / w[0] - 1.0).collect()
}

/// Sample standard deviation of daily returns (not annualized).
///
/// A series with no returns (zero or one price) has volatility 0. A single
/// return has no sample deviation and is reported as unavailable, as is any
/// non-finite result (e.g. a zero close).
pub fn compute_volatility(prices: &[f64]) -> Option<f64> {
    let returns = daily_returns(prices);

    match returns.len() {
        0 => return Some(0.0),
        1 => return None,
        _ => {}
    }

    let n = returns.len() as f64;
    let mean = returns.iter().sum::<f64>() / n;
    let variance = returns.iter().map(|r| (r - mean).powi(2)).sum::<f64>() / (n - 1.0);
    let volatility = variance.sqrt();

    volatility.is_finite().then_some(volatility)
}

/// Largest peak-to-trough decline, `max(1 - p[t] / running_max[0..=t])`.
///
/// Returned as a non-negative fraction: 0.25 means a 25% decline from the
/// prior peak. An empty series has drawdown 0.
pub fn compute_max_drawdown(prices: &[f64]) -> Option<f64> {
    let mut peak = f64::NEG_INFINITY;
    let mut max_dd = 0.0_f64;

    for &price in prices {
        if !price.is_finite() {
            return None;
        }
        if price > peak {
            peak = price;
        }
        if peak <= 0.0 {
            return None;
        }
        let dd = 1.0 - price / peak;
        if dd > max_dd {
            max_dd = dd;
        }
    }

    max_dd.is_finite().then_some(max_dd)
}
