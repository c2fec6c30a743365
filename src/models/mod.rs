mod fundamentals;
mod plan;
mod price;
mod query;
mod universe;

pub use fundamentals::FundamentalsRow;
pub use plan::{PlanSummary, QueryPlan};
pub use price::{PriceGrowthRow, PriceRow};
pub use query::{HealthReport, QueryRequest, QueryResponse, ResultRow, ResultStatus};
pub use universe::{DataWindow, SymbolUniverse, DEFAULT_SYMBOLS};
