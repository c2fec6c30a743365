//! Static safety checks for the two generated statements.
//!
//! Each statement may only read its own table and may only name columns that
//! table owns. The checks run over identifier tokens with string literals
//! removed, so a quoted symbol or date can never trip them.

use crate::errors::{DataSource, SqlValidationError};

pub const PRICE_TABLE: &str = "prices";
pub const FUNDAMENTALS_TABLE: &str = "fundamentals";

const PRICE_ONLY_FIELDS: &[&str] = &[
    "close_price",
    "trade_date",
    "start_price",
    "end_price",
    "price_growth",
];

const FUNDAMENTALS_ONLY_FIELDS: &[&str] = &[
    "fy",
    "fiscal_year",
    "roe",
    "debt_equity_ratio",
    "current_ratio",
    "pe_ratio",
    "pb_ratio",
    "market_cap",
];

// Window parameter names shared by both sides
const DATE_RANGE_PARAMS: &[&str] = &["start_date", "end_date"];

// `into` covers `SELECT ... INTO OUTFILE/DUMPFILE`, which writes on the server
const MUTATING_KEYWORDS: &[&str] = &[
    "drop", "delete", "insert", "update", "truncate", "alter", "create", "replace", "grant",
    "revoke", "into", "outfile", "dumpfile", "load", "call", "set",
];

// Clauses that end a FROM list
const FROM_LIST_TERMINATORS: &[&str] = &[
    "where", "group", "order", "having", "limit", "on", "using", "union", "window", "for",
];

/// Validate a statement destined for `source`.
pub fn validate(sql: &str, source: DataSource) -> Result<(), SqlValidationError> {
    let tokens = tokenize(sql)?;

    if tokens.is_empty() {
        return Err(SqlValidationError::Empty);
    }

    if let Some(keyword) = tokens
        .iter()
        .find(|t| MUTATING_KEYWORDS.contains(&t.as_str()))
    {
        return Err(SqlValidationError::MutatingKeyword(keyword.clone()));
    }

    let leading = tokens[0].as_str();
    if leading != "select" && leading != "with" {
        return Err(SqlValidationError::NotSelect);
    }
    if !tokens.iter().any(|t| t == "from") {
        return Err(SqlValidationError::MissingFrom);
    }

    let (own_table, foreign_fields) = match source {
        DataSource::Prices => (PRICE_TABLE, FUNDAMENTALS_ONLY_FIELDS),
        DataSource::Fundamentals => (FUNDAMENTALS_TABLE, PRICE_ONLY_FIELDS),
    };

    for table in referenced_tables(&tokens) {
        if table != own_table {
            return Err(SqlValidationError::ForeignTable {
                expected: own_table,
                found: table.to_string(),
            });
        }
    }

    for token in &tokens {
        if DATE_RANGE_PARAMS.contains(&token.as_str()) {
            continue;
        }
        if foreign_fields.contains(&token.as_str()) {
            return Err(SqlValidationError::ForeignField(token.clone()));
        }
    }

    Ok(())
}

pub fn validate_price_sql(sql: &str) -> Result<(), SqlValidationError> {
    validate(sql, DataSource::Prices)
}

pub fn validate_fundamentals_sql(sql: &str) -> Result<(), SqlValidationError> {
    validate(sql, DataSource::Fundamentals)
}

/// Table names read by the statement.
///
/// A table follows `FROM`, any `*JOIN` keyword (`straight_join` included),
/// or a comma inside a FROM list. The list runs until the next clause
/// keyword. A subquery's `SELECT` is skipped; its own `FROM` is picked up on
/// the way.
fn referenced_tables(tokens: &[String]) -> Vec<&str> {
    let mut tables = Vec::new();
    let mut in_from_list = false;
    let mut expect_table = false;

    for token in tokens.iter().map(String::as_str) {
        if token == "select" {
            in_from_list = false;
            expect_table = false;
            continue;
        }
        if token == "from" || token.ends_with("join") {
            in_from_list = true;
            expect_table = true;
            continue;
        }
        if !in_from_list {
            continue;
        }
        if FROM_LIST_TERMINATORS.contains(&token) {
            in_from_list = false;
            expect_table = false;
            continue;
        }
        if token == "," {
            expect_table = true;
            continue;
        }
        if expect_table {
            tables.push(token);
            expect_table = false;
        }
    }

    tables
}

/// Lower-cased identifier/keyword tokens with quoted literals dropped.
/// Commas are kept as their own token so FROM lists can be walked.
///
/// Backtick-quoted identifiers are kept as identifiers. Comments and a second
/// statement after `;` are rejected here since they would otherwise hide text
/// from the token checks.
fn tokenize(sql: &str) -> Result<Vec<String>, SqlValidationError> {
    let mut tokens = Vec::new();
    let mut current = String::new();
    let mut chars = sql.chars().peekable();
    let mut terminated = false;

    while let Some(c) = chars.next() {
        if terminated && !c.is_whitespace() {
            return Err(SqlValidationError::MultipleStatements);
        }

        match c {
            '\'' | '"' => {
                flush(&mut current, &mut tokens);
                // Doubled quotes are an escaped quote inside the literal
                loop {
                    match chars.next() {
                        Some(q) if q == c => {
                            if chars.peek() == Some(&c) {
                                chars.next();
                            } else {
                                break;
                            }
                        }
                        Some('\\') => {
                            chars.next();
                        }
                        Some(_) => {}
                        None => break,
                    }
                }
            }
            '`' => {
                flush(&mut current, &mut tokens);
                let ident: String = chars.by_ref().take_while(|q| *q != '`').collect();
                let ident = ident.trim().to_ascii_lowercase();
                if !ident.is_empty() {
                    tokens.push(ident);
                }
            }
            '-' if chars.peek() == Some(&'-') => return Err(SqlValidationError::Comment),
            '/' if chars.peek() == Some(&'*') => return Err(SqlValidationError::Comment),
            '#' => return Err(SqlValidationError::Comment),
            ';' => {
                flush(&mut current, &mut tokens);
                terminated = true;
            }
            c if c.is_ascii_alphanumeric() || c == '_' => current.push(c.to_ascii_lowercase()),
            ',' => {
                flush(&mut current, &mut tokens);
                tokens.push(",".to_string());
            }
            _ => flush(&mut current, &mut tokens),
        }
    }
    flush(&mut current, &mut tokens);

    Ok(tokens)
}

fn flush(current: &mut String, tokens: &mut Vec<String>) {
    if !current.is_empty() {
        tokens.push(std::mem::take(current));
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const PRICE_SQL: &str = "SELECT symbol, MIN(close_price) AS start_price, MAX(close_price) AS end_price \
        FROM prices WHERE trade_date BETWEEN '2017-01-01' AND '2017-12-31' GROUP BY symbol";
    const FUND_SQL: &str = "SELECT symbol, fy, roe, debt_equity_ratio, pe_ratio FROM fundamentals WHERE fy = 2017";

    #[test]
    fn test_accepts_well_formed_statements() {
        assert_eq!(validate_price_sql(PRICE_SQL), Ok(()));
        assert_eq!(validate_fundamentals_sql(FUND_SQL), Ok(()));
        assert_eq!(validate_price_sql(&format!("{};  ", PRICE_SQL)), Ok(()));
    }

    #[test]
    fn test_rejects_mutating_keywords() {
        let err = validate_price_sql("DROP TABLE prices").unwrap_err();
        assert_eq!(err, SqlValidationError::MutatingKeyword("drop".into()));

        let err = validate_fundamentals_sql("select * from fundamentals; delete from fundamentals")
            .unwrap_err();
        assert_eq!(err, SqlValidationError::MultipleStatements);

        let err = validate_price_sql("UPDATE prices SET close_price = 0").unwrap_err();
        assert_eq!(err, SqlValidationError::MutatingKeyword("update".into()));
    }

    #[test]
    fn test_rejects_missing_select_shape() {
        assert_eq!(validate_price_sql("   "), Err(SqlValidationError::Empty));
        assert_eq!(validate_price_sql("SELECT 1"), Err(SqlValidationError::MissingFrom));
        assert_eq!(
            validate_price_sql("SHOW TABLES FROM prices"),
            Err(SqlValidationError::NotSelect)
        );
    }

    #[test]
    fn test_rejects_cross_table_fields() {
        let err = validate_price_sql(
            "SELECT symbol, close_price FROM prices WHERE roe > 15",
        )
        .unwrap_err();
        assert_eq!(err, SqlValidationError::ForeignField("roe".into()));

        let err = validate_fundamentals_sql(
            "SELECT symbol, roe FROM fundamentals WHERE close_price > 10",
        )
        .unwrap_err();
        assert_eq!(err, SqlValidationError::ForeignField("close_price".into()));
    }

    #[test]
    fn test_rejects_foreign_tables() {
        let err = validate_price_sql(
            "SELECT p.symbol FROM prices p JOIN fundamentals f ON p.symbol = f.symbol",
        )
        .unwrap_err();
        assert_eq!(
            err,
            SqlValidationError::ForeignTable {
                expected: "prices",
                found: "fundamentals".into()
            }
        );

        let err = validate_fundamentals_sql("SELECT symbol FROM `prices`").unwrap_err();
        assert!(matches!(err, SqlValidationError::ForeignTable { .. }));
    }

    #[test]
    fn test_rejects_comma_and_straight_joins() {
        let foreign = SqlValidationError::ForeignTable {
            expected: "prices",
            found: "fundamentals".into(),
        };
        assert_eq!(validate_price_sql("SELECT symbol FROM prices, fundamentals"), Err(foreign.clone()));
        assert_eq!(
            validate_price_sql("SELECT symbol FROM prices p, fundamentals AS f WHERE p.symbol = f.symbol"),
            Err(foreign.clone())
        );
        assert_eq!(
            validate_price_sql("SELECT symbol FROM prices STRAIGHT_JOIN fundamentals"),
            Err(foreign.clone())
        );
        assert_eq!(
            validate_price_sql("SELECT symbol FROM prices NATURAL JOIN fundamentals"),
            Err(foreign)
        );
    }

    #[test]
    fn test_commas_outside_from_list_are_not_tables() {
        let sql = "SELECT symbol, MIN(close_price), MAX(close_price) FROM prices \
            WHERE symbol IN ('TCS', 'INFY') GROUP BY symbol, trade_date ORDER BY symbol";
        assert_eq!(validate_price_sql(sql), Ok(()));

        let sql = "SELECT t.symbol FROM (SELECT symbol, close_price FROM prices) t, prices";
        assert_eq!(validate_price_sql(sql), Ok(()));
    }

    #[test]
    fn test_rejects_server_side_file_writes() {
        assert_eq!(
            validate_price_sql("SELECT symbol FROM prices INTO OUTFILE '/tmp/x'"),
            Err(SqlValidationError::MutatingKeyword("into".into()))
        );
        assert_eq!(
            validate_fundamentals_sql("SELECT symbol FROM fundamentals INTO DUMPFILE '/tmp/x'"),
            Err(SqlValidationError::MutatingKeyword("into".into()))
        );
        assert!(validate_price_sql("LOAD DATA INFILE '/tmp/x' INTO TABLE prices").is_err());
    }

    #[test]
    fn test_date_range_names_are_exempt_for_fundamentals() {
        let sql = "SELECT symbol, roe, '2016-01-01' AS start_date, '2017-12-31' AS end_date FROM fundamentals";
        assert_eq!(validate_fundamentals_sql(sql), Ok(()));
    }

    #[test]
    fn test_literals_do_not_trip_field_checks() {
        let sql = "SELECT symbol FROM prices WHERE symbol IN ('ROE', 'it''s drop')";
        assert_eq!(validate_price_sql(sql), Ok(()));
    }

    #[test]
    fn test_rejects_comments() {
        assert_eq!(
            validate_price_sql("SELECT symbol FROM prices -- roe"),
            Err(SqlValidationError::Comment)
        );
        assert_eq!(
            validate_price_sql("SELECT symbol /* x */ FROM prices"),
            Err(SqlValidationError::Comment)
        );
    }
}
