use axum::http::StatusCode;
use axum::response::IntoResponse;
use axum::Json;
use chrono::NaiveDate;
use serde_json::json;
use thiserror::Error;

/// Which of the two federated stores a statement belongs to.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DataSource {
    Prices,
    Fundamentals,
}

impl std::fmt::Display for DataSource {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            DataSource::Prices => write!(f, "price database"),
            DataSource::Fundamentals => write!(f, "fundamentals database"),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum SqlValidationError {
    #[error("statement is empty")]
    Empty,
    #[error("only a single statement is allowed")]
    MultipleStatements,
    #[error("comments are not allowed in generated SQL")]
    Comment,
    #[error("statement must be a SELECT ... FROM query")]
    NotSelect,
    #[error("statement has no FROM clause")]
    MissingFrom,
    #[error("mutating keyword `{0}` is not allowed")]
    MutatingKeyword(String),
    #[error("statement reads table `{found}`, only `{expected}` is allowed")]
    ForeignTable { expected: &'static str, found: String },
    #[error("field `{0}` belongs to the other data source")]
    ForeignField(String),
}

#[derive(Debug, Clone, PartialEq, Error)]
pub enum PlanError {
    #[error("start date {start} is after end date {end}")]
    InvertedDateRange { start: NaiveDate, end: NaiveDate },
    #[error("symbol filter is present but empty")]
    EmptySymbolSet,
    #[error("invalid {source_kind} statement: {error}")]
    InvalidSql {
        source_kind: DataSource,
        error: SqlValidationError,
    },
}

/// A statement failed on one of the stores. Carries the SQL for diagnosis.
#[derive(Debug, Clone, Error)]
#[error("{source_kind} query failed: {message}\nSQL was: {sql}")]
pub struct DataSourceError {
    pub source_kind: DataSource,
    pub sql: String,
    pub message: String,
}

impl DataSourceError {
    pub fn new(source_kind: DataSource, sql: &str, err: impl std::fmt::Display) -> Self {
        Self {
            source_kind,
            sql: sql.trim().to_string(),
            message: err.to_string(),
        }
    }
}

#[derive(Debug, Error)]
pub enum PipelineError {
    #[error("planning failed: {0}")]
    Planning(#[from] PlanError),
    #[error("execution failed: {0}")]
    DataSource(#[from] DataSourceError),
}

#[derive(Debug, Clone, PartialEq, Error)]
pub enum LlmError {
    #[error("LLM features are disabled")]
    Disabled,
    #[error("LLM request timed out")]
    Timeout,
    #[error("Network error: {0}")]
    NetworkError(String),
    #[error("API error: {0}")]
    ApiError(String),
    #[error("Invalid response: {0}")]
    InvalidResponse(String),
}

#[derive(Debug, Error)]
pub enum AppError {
    #[error("Validation error: {0}")]
    Validation(String),
    #[error("Query failed: {0}")]
    Pipeline(#[from] PipelineError),
}

impl IntoResponse for AppError {
    fn into_response(self) -> axum::response::Response {
        let status = match &self {
            AppError::Validation(_) => StatusCode::BAD_REQUEST,
            AppError::Pipeline(PipelineError::DataSource(_)) => StatusCode::BAD_GATEWAY,
            AppError::Pipeline(PipelineError::Planning(_)) => StatusCode::INTERNAL_SERVER_ERROR,
        };
        (status, Json(json!({ "error": self.to_string() }))).into_response()
    }
}
