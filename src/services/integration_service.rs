use std::collections::{BTreeMap, HashSet};

use tracing::{debug, info, warn};

use crate::models::{
    FundamentalsRow, PriceGrowthRow, PriceRow, QueryPlan, ResultRow, ResultStatus, SymbolUniverse,
};
use crate::services::risk_service::{self, RiskMetrics};
use crate::utils::numeric::finite;

/// Joined, filtered rows plus the status to report alongside them.
#[derive(Debug, Clone, PartialEq)]
pub struct Integration {
    pub rows: Vec<ResultRow>,
    pub status: ResultStatus,
}

/// Reconcile the two raw result sets into the final row list.
///
/// 1. collapse fundamentals to the latest fiscal year per symbol
/// 2. left-join them onto the price rows
/// 3. drop symbols outside the tracked universe
/// 4. apply the plan thresholds
///
/// Risk metrics are attached separately by [`attach_risk`] once the daily
/// series for the surviving symbols is known. An empty price set stops here
/// with a "no data" status.
pub fn integrate(
    plan: &QueryPlan,
    universe: &SymbolUniverse,
    prices: &[PriceGrowthRow],
    fundamentals: &[FundamentalsRow],
) -> Integration {
    if prices.is_empty() {
        let reason = no_data_reason(plan);
        info!("Short-circuiting integration: {}", reason);
        return Integration {
            rows: Vec::new(),
            status: ResultStatus::NoData(reason),
        };
    }

    let latest = collapse_fundamentals(fundamentals);
    let joined = left_join(prices, &latest, universe);

    if joined.is_empty() {
        return Integration {
            rows: Vec::new(),
            status: ResultStatus::NoData(
                "Price data was returned only for untracked symbols".to_string(),
            ),
        };
    }

    let usable = joined
        .iter()
        .any(|r| r.price_growth.is_some() || r.start_price.is_some() || r.end_price.is_some());

    let rows = apply_filters(joined, plan);
    debug!("{} rows passed all filters", rows.len());

    let status = if !usable {
        warn!("Price rows carried no usable price metrics");
        ResultStatus::Unavailable("Price metrics could not be read from the price source".to_string())
    } else if rows.is_empty() {
        ResultStatus::NoMatches("No companies matched your criteria".to_string())
    } else {
        ResultStatus::Ok
    };

    Integration { rows, status }
}

/// Keep one fundamentals row per symbol: the greatest fiscal year.
///
/// Rows are ordered by (symbol, fiscal_year) with a stable sort and the last
/// one per symbol wins, so duplicate years resolve to the later input row.
pub fn collapse_fundamentals(rows: &[FundamentalsRow]) -> BTreeMap<String, FundamentalsRow> {
    let mut sorted: Vec<&FundamentalsRow> = rows.iter().collect();
    sorted.sort_by(|a, b| {
        a.symbol
            .to_uppercase()
            .cmp(&b.symbol.to_uppercase())
            .then(a.fiscal_year.cmp(&b.fiscal_year))
    });

    let mut latest = BTreeMap::new();
    for row in sorted {
        latest.insert(row.symbol.to_uppercase(), row.clone());
    }
    latest
}

fn left_join(
    prices: &[PriceGrowthRow],
    latest: &BTreeMap<String, FundamentalsRow>,
    universe: &SymbolUniverse,
) -> Vec<ResultRow> {
    let mut seen = HashSet::new();
    let mut rows = Vec::with_capacity(prices.len());

    for price in prices {
        let symbol = price.symbol.trim().to_uppercase();
        if !universe.contains(&symbol) {
            debug!("Dropping untracked symbol {}", symbol);
            continue;
        }
        if !seen.insert(symbol.clone()) {
            warn!("Duplicate price row for {}, keeping the first", symbol);
            continue;
        }

        let fund = latest.get(&symbol);
        rows.push(ResultRow {
            start_price: finite(price.start_price),
            end_price: finite(price.end_price),
            price_growth: finite(price.price_growth),
            fiscal_year: fund.map(|f| f.fiscal_year),
            roe: finite(fund.and_then(|f| f.roe)),
            debt_equity_ratio: finite(fund.and_then(|f| f.debt_equity_ratio)),
            current_ratio: finite(fund.and_then(|f| f.current_ratio)),
            pe_ratio: finite(fund.and_then(|f| f.pe_ratio)),
            pb_ratio: finite(fund.and_then(|f| f.pb_ratio)),
            market_cap: finite(fund.and_then(|f| f.market_cap)),
            volatility: None,
            max_drawdown: None,
            symbol,
        });
    }

    rows
}

/// Conjunctive threshold filters. An absent threshold is a no-op; an absent
/// value fails any active threshold on it.
pub fn apply_filters(rows: Vec<ResultRow>, plan: &QueryPlan) -> Vec<ResultRow> {
    rows.into_iter()
        .filter(|r| at_least(r.price_growth, plan.min_price_growth))
        .filter(|r| at_most(r.debt_equity_ratio, plan.max_debt_equity))
        .filter(|r| at_least(r.roe, plan.min_roe))
        .filter(|r| at_most(r.pe_ratio, plan.max_pe))
        .collect()
}

fn at_least(value: Option<f64>, min: Option<f64>) -> bool {
    match min {
        None => true,
        Some(min) => value.is_some_and(|v| v >= min),
    }
}

fn at_most(value: Option<f64>, max: Option<f64>) -> bool {
    match max {
        None => true,
        Some(max) => value.is_some_and(|v| v <= max),
    }
}

/// Fill `volatility` and `max_drawdown` from the daily series.
///
/// Only rows dated inside the plan window count. A symbol with no rows at all
/// gets unavailable metrics rather than zeros.
pub fn attach_risk(rows: &mut [ResultRow], daily: &[PriceRow], plan: &QueryPlan) {
    let grouped = risk_service::group_series(daily, plan.start_date, plan.end_date);

    for row in rows.iter_mut() {
        let metrics = grouped
            .get(&row.symbol)
            .map(|series| risk_service::compute_series_risk(series))
            .unwrap_or_else(RiskMetrics::unavailable);

        row.volatility = finite(metrics.volatility);
        row.max_drawdown = finite(metrics.max_drawdown);
    }
}

fn no_data_reason(plan: &QueryPlan) -> String {
    match &plan.symbols {
        Some(symbols) => format!(
            "No price data found for {} between {} and {}",
            symbols.join(", "),
            plan.start_date,
            plan.end_date
        ),
        None => format!(
            "No price data found between {} and {}",
            plan.start_date, plan.end_date
        ),
    }
}
