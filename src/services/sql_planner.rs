use tracing::{debug, warn};

use crate::errors::{DataSource, PlanError};
use crate::models::{DataWindow, QueryPlan};
use crate::services::sql_validator::{self, FUNDAMENTALS_TABLE, PRICE_TABLE};

/// A plan paired with its two validated statements.
///
/// The only way to obtain one is [`ExecutablePlan::new`], which checks the
/// plan's shape and validates each statement against its own table. The SQL
/// is fixed from then on.
#[derive(Debug, Clone)]
pub struct ExecutablePlan {
    plan: QueryPlan,
    sql_price: String,
    sql_fund: String,
}

impl ExecutablePlan {
    pub fn new(plan: QueryPlan, sql_price: String, sql_fund: String) -> Result<Self, PlanError> {
        if plan.start_date > plan.end_date {
            return Err(PlanError::InvertedDateRange {
                start: plan.start_date,
                end: plan.end_date,
            });
        }
        if matches!(&plan.symbols, Some(s) if s.is_empty()) {
            return Err(PlanError::EmptySymbolSet);
        }

        sql_validator::validate_price_sql(&sql_price).map_err(|error| PlanError::InvalidSql {
            source_kind: DataSource::Prices,
            error,
        })?;
        sql_validator::validate_fundamentals_sql(&sql_fund).map_err(|error| {
            PlanError::InvalidSql {
                source_kind: DataSource::Fundamentals,
                error,
            }
        })?;

        Ok(Self {
            plan,
            sql_price,
            sql_fund,
        })
    }

    pub fn plan(&self) -> &QueryPlan {
        &self.plan
    }

    pub fn sql_price(&self) -> &str {
        &self.sql_price
    }

    pub fn sql_fund(&self) -> &str {
        &self.sql_fund
    }
}

/// Generate both statements deterministically and validate them.
pub fn plan_deterministic(plan: QueryPlan, window: &DataWindow) -> Result<ExecutablePlan, PlanError> {
    let sql_price = build_price_sql(&plan);
    let sql_fund = build_fundamentals_sql(&plan, window);
    ExecutablePlan::new(plan, sql_price, sql_fund)
}

/// Use externally proposed statements where they validate, and regenerate
/// deterministically where they don't (or weren't supplied).
pub fn plan_with_candidates(
    plan: QueryPlan,
    candidate_price: Option<String>,
    candidate_fund: Option<String>,
    window: &DataWindow,
) -> Result<ExecutablePlan, PlanError> {
    let sql_price = match candidate_price {
        Some(sql) => match sql_validator::validate_price_sql(&sql) {
            Ok(()) => {
                debug!("Using proposed price statement");
                sql
            }
            Err(e) => {
                warn!("Proposed price statement rejected ({}), regenerating", e);
                build_price_sql(&plan)
            }
        },
        None => build_price_sql(&plan),
    };

    let sql_fund = match candidate_fund {
        Some(sql) => match sql_validator::validate_fundamentals_sql(&sql) {
            Ok(()) => {
                debug!("Using proposed fundamentals statement");
                sql
            }
            Err(e) => {
                warn!("Proposed fundamentals statement rejected ({}), regenerating", e);
                build_fundamentals_sql(&plan, window)
            }
        },
        None => build_fundamentals_sql(&plan, window),
    };

    ExecutablePlan::new(plan, sql_price, sql_fund)
}

/// Min/max close and growth ratio per symbol over the plan window.
///
/// Carries no fundamentals thresholds: those are applied after the join.
pub fn build_price_sql(plan: &QueryPlan) -> String {
    format!(
        r#"
        SELECT
            symbol,
            MIN(close_price) AS start_price,
            MAX(close_price) AS end_price,
            (MAX(close_price) - MIN(close_price)) / MIN(close_price) AS price_growth
        FROM {table}
        WHERE trade_date BETWEEN '{start}' AND '{end}'
        {symbols}
        GROUP BY symbol
        ORDER BY symbol
        "#,
        table = PRICE_TABLE,
        start = plan.start_date,
        end = plan.end_date,
        symbols = symbol_clause(plan.symbols.as_deref()),
    )
}

/// Every tracked ratio for the requested fiscal year, or for both boundary
/// years of the data window when no year was requested.
pub fn build_fundamentals_sql(plan: &QueryPlan, window: &DataWindow) -> String {
    let fy_filter = match plan.fiscal_year {
        Some(fy) => format!("fy = {}", fy),
        None => format!("fy IN ({}, {})", window.start_year(), window.end_year()),
    };

    format!(
        r#"
        SELECT
            symbol,
            fy,
            roe,
            debt_equity_ratio,
            current_ratio,
            pe_ratio,
            pb_ratio,
            market_cap
        FROM {table}
        WHERE {fy_filter}
        {symbols}
        ORDER BY symbol, fy
        "#,
        table = FUNDAMENTALS_TABLE,
        fy_filter = fy_filter,
        symbols = symbol_clause(plan.symbols.as_deref()),
    )
}

/// Raw daily closes inside the plan window for the given symbols, used for
/// the risk metrics.
pub fn build_daily_series_sql(plan: &QueryPlan, symbols: &[String]) -> String {
    format!(
        r#"
        SELECT symbol, trade_date, close_price
        FROM {table}
        WHERE trade_date BETWEEN '{start}' AND '{end}'
        {symbols}
        ORDER BY symbol, trade_date
        "#,
        table = PRICE_TABLE,
        start = plan.start_date,
        end = plan.end_date,
        symbols = symbol_clause(Some(symbols)),
    )
}

fn symbol_clause(symbols: Option<&[String]>) -> String {
    match symbols {
        Some(list) if !list.is_empty() => {
            let in_list = list
                .iter()
                .map(|s| format!("'{}'", s.replace('\'', "''")))
                .collect::<Vec<_>>()
                .join(", ");
            format!("AND symbol IN ({})", in_list)
        }
        _ => String::new(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::errors::SqlValidationError;
    use chrono::NaiveDate;
    use rand::Rng;

    fn date(y: i32, m: u32, d: u32) -> NaiveDate {
        NaiveDate::from_ymd_opt(y, m, d).unwrap()
    }

    fn plan_2017() -> QueryPlan {
        let mut plan = QueryPlan::unfiltered(date(2017, 1, 1), date(2017, 12, 31));
        plan.fiscal_year = Some(2017);
        plan
    }

    #[test]
    fn test_price_sql_shape() {
        let mut plan = plan_2017();
        plan.symbols = Some(vec!["TCS".into(), "INFY".into()]);
        plan.max_debt_equity = Some(1.0);
        let sql = build_price_sql(&plan);

        assert!(sql.contains("FROM prices"));
        assert!(sql.contains("BETWEEN '2017-01-01' AND '2017-12-31'"));
        assert!(sql.contains("AND symbol IN ('TCS', 'INFY')"));
        assert!(sql.contains("GROUP BY symbol"));
        assert!(!sql.contains("debt_equity_ratio"));
    }

    #[test]
    fn test_fundamentals_sql_uses_window_years_without_fiscal_year() {
        let window = DataWindow::default();
        let plan = QueryPlan::unfiltered(window.start, window.end);
        let sql = build_fundamentals_sql(&plan, &window);
        assert!(sql.contains("fy IN (2016, 2017)"));
        assert!(!sql.contains("symbol IN"));

        let sql = build_fundamentals_sql(&plan_2017(), &window);
        assert!(sql.contains("fy = 2017"));
    }

    #[test]
    fn test_deterministic_plan_is_executable() {
        let executable = plan_deterministic(plan_2017(), &DataWindow::default()).unwrap();
        assert!(!executable.sql_price().is_empty());
        assert!(!executable.sql_fund().is_empty());
        assert_eq!(executable.plan().fiscal_year, Some(2017));
    }

    #[test]
    fn test_executable_plan_rejects_bad_shapes() {
        let mut inverted = plan_2017();
        inverted.start_date = date(2018, 1, 1);
        assert!(matches!(
            plan_deterministic(inverted, &DataWindow::default()),
            Err(PlanError::InvertedDateRange { .. })
        ));

        let mut empty = plan_2017();
        empty.symbols = Some(vec![]);
        assert_eq!(
            ExecutablePlan::new(empty, "SELECT symbol FROM prices".into(), "SELECT symbol FROM fundamentals".into())
                .unwrap_err(),
            PlanError::EmptySymbolSet
        );

        let err = ExecutablePlan::new(
            plan_2017(),
            "SELECT symbol, roe FROM prices".into(),
            "SELECT symbol FROM fundamentals".into(),
        )
        .unwrap_err();
        assert_eq!(
            err,
            PlanError::InvalidSql {
                source_kind: DataSource::Prices,
                error: SqlValidationError::ForeignField("roe".into())
            }
        );
    }

    #[test]
    fn test_invalid_candidates_are_regenerated() {
        let window = DataWindow::default();
        let executable = plan_with_candidates(
            plan_2017(),
            Some("DELETE FROM prices".into()),
            Some("SELECT symbol, roe FROM fundamentals WHERE fy = 2017".into()),
            &window,
        )
        .unwrap();

        assert_eq!(executable.sql_price(), build_price_sql(&plan_2017()));
        assert_eq!(
            executable.sql_fund(),
            "SELECT symbol, roe FROM fundamentals WHERE fy = 2017"
        );
    }

    #[test]
    fn test_daily_series_sql_validates_as_price_statement() {
        let sql = build_daily_series_sql(&plan_2017(), &["SBIN".to_string()]);
        assert!(sql.contains("ORDER BY symbol, trade_date"));
        assert_eq!(sql_validator::validate_price_sql(&sql), Ok(()));
    }

    #[test]
    fn test_random_plans_never_cross_table_fields() {
        let universe = crate::models::DEFAULT_SYMBOLS;
        let window = DataWindow::default();
        let mut rng = rand::rng();

        for _ in 0..500 {
            let start = date(2016, 1, 1) + chrono::Duration::days(rng.random_range(0..700));
            let end = start + chrono::Duration::days(rng.random_range(0..30));
            let mut plan = QueryPlan::unfiltered(start, end);
            if rng.random_bool(0.5) {
                let n = rng.random_range(1..=universe.len());
                plan.symbols = Some(universe[..n].iter().map(|s| s.to_string()).collect());
            }
            plan.min_price_growth = rng.random_bool(0.5).then(|| rng.random_range(0.0..1.0));
            plan.max_debt_equity = rng.random_bool(0.5).then(|| rng.random_range(0.0..3.0));
            plan.min_roe = rng.random_bool(0.5).then(|| rng.random_range(0.0..40.0));
            plan.max_pe = rng.random_bool(0.5).then(|| rng.random_range(0.0..60.0));
            plan.fiscal_year = rng.random_bool(0.5).then(|| rng.random_range(2016..=2017));

            let price = build_price_sql(&plan);
            let fund = build_fundamentals_sql(&plan, &window);
            let price_lower = price.to_lowercase();
            let fund_lower = fund.to_lowercase();

            for field in ["roe", "debt_equity_ratio", "current_ratio", "pe_ratio", "pb_ratio", "market_cap", " fy", "fundamentals"] {
                assert!(!price_lower.contains(field), "price SQL leaked {}: {}", field, price);
            }
            for field in ["close_price", "trade_date", "start_price", "end_price", "price_growth", " prices"] {
                assert!(!fund_lower.contains(field), "fundamentals SQL leaked {}: {}", field, fund);
            }
            assert!(plan_deterministic(plan, &window).is_ok());
        }
    }
}
