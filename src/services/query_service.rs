use std::sync::Arc;

use tracing::{info, info_span, warn, Instrument};
use uuid::Uuid;

use crate::config::PipelineSettings;
use crate::db::{FundamentalsStore, PriceStore};
use crate::errors::{DataSource, PipelineError, PlanError};
use crate::models::{HealthReport, QueryResponse};
use crate::services::federation_service;
use crate::services::integration_service;
use crate::services::llm_service::LlmService;
use crate::services::narrative_service;
use crate::services::plan_extraction_service;
use crate::services::query_parser::QueryParser;
use crate::services::sql_planner::{self, ExecutablePlan};
use crate::services::sql_validator;

/// End-to-end query pipeline over the two data sources.
///
/// Holds no per-request state; one instance serves every request.
pub struct QueryService {
    price_store: Arc<dyn PriceStore>,
    fund_store: Arc<dyn FundamentalsStore>,
    llm: Arc<LlmService>,
    parser: QueryParser,
    settings: PipelineSettings,
}

impl QueryService {
    pub fn new(
        price_store: Arc<dyn PriceStore>,
        fund_store: Arc<dyn FundamentalsStore>,
        llm: Arc<LlmService>,
        settings: PipelineSettings,
    ) -> Self {
        let parser = QueryParser::new(settings.window, settings.universe.clone());
        Self {
            price_store,
            fund_store,
            llm,
            parser,
            settings,
        }
    }

    /// Answer one natural-language query.
    ///
    /// Only planning and data-source failures are errors. Empty data,
    /// unmatched filters and narrative problems all come back as a normal
    /// response with a status.
    pub async fn execute_query(&self, text: &str) -> Result<QueryResponse, PipelineError> {
        let request_id = Uuid::new_v4();
        let span = info_span!("query", %request_id);

        async move {
            info!("Executing query: {}", text);
            let executable = self.plan(text).await?;
            let plan = executable.plan();

            let federated =
                federation_service::run_federated_query(&*self.price_store, &*self.fund_store, &executable)
                    .await?;

            let mut integration = integration_service::integrate(
                plan,
                &self.settings.universe,
                &federated.prices,
                &federated.fundamentals,
            );

            if !integration.rows.is_empty() {
                let symbols: Vec<String> =
                    integration.rows.iter().map(|r| r.symbol.clone()).collect();
                let sql = sql_planner::build_daily_series_sql(plan, &symbols);
                sql_validator::validate_price_sql(&sql).map_err(|error| PlanError::InvalidSql {
                    source_kind: DataSource::Prices,
                    error,
                })?;
                let daily = federation_service::fetch_daily_series(&*self.price_store, &sql).await?;
                integration_service::attach_risk(&mut integration.rows, &daily, plan);
            }

            let summary = plan.summary();
            let narrative = narrative_service::generate_narrative(
                &self.llm,
                text,
                &summary,
                &integration.rows,
                self.settings.narrative_top_n,
                &self.settings.window,
            )
            .await;

            info!(
                "Query finished with {} rows ({})",
                integration.rows.len(),
                integration.status
            );

            Ok::<_, PipelineError>(QueryResponse {
                plan: summary,
                results: integration.rows,
                narrative,
                status: integration.status,
            })
        }
        .instrument(span)
        .await
    }

    /// Resolve `text` into an executable plan.
    ///
    /// When extraction is enabled and the generator returns a plan that
    /// passes every check, that plan is used (with its SQL where the SQL
    /// validates). Anything else falls back to the regex parser.
    pub async fn plan(&self, text: &str) -> Result<ExecutablePlan, PipelineError> {
        if self.settings.llm_plan_extraction && self.llm.is_enabled() {
            match plan_extraction_service::extract_plan(
                &self.llm,
                text,
                &self.settings.window,
                &self.settings.universe,
            )
            .await
            {
                Ok(extracted) => {
                    let executable = sql_planner::plan_with_candidates(
                        extracted.plan,
                        extracted.sql_price,
                        extracted.sql_fund,
                        &self.settings.window,
                    )?;
                    return Ok(executable);
                }
                Err(e) => warn!("LLM plan extraction rejected, using parser: {}", e),
            }
        }

        let plan = self.parser.parse(text);
        Ok(sql_planner::plan_deterministic(plan, &self.settings.window)?)
    }

    /// Check both databases and the text generator.
    ///
    /// Only the databases decide `status`; an unreachable generator just
    /// means answers come without a narrative.
    pub async fn health(&self) -> HealthReport {
        let mut messages = Vec::new();

        let (price, fund) = tokio::join!(self.price_store.ping(), self.fund_store.ping());
        if let Err(e) = &price {
            messages.push(format!("Price database check failed: {}", e));
        }
        if let Err(e) = &fund {
            messages.push(format!("Fundamentals database check failed: {}", e));
        }
        let db_ok = price.is_ok() && fund.is_ok();

        let llm_ok = self.llm.is_available().await;
        if !self.llm.is_enabled() {
            messages.push("Text generation is disabled".to_string());
        } else if !llm_ok {
            messages.push("Text generation service is unreachable".to_string());
        }

        HealthReport {
            status: if db_ok { "ok" } else { "degraded" }.to_string(),
            db_ok,
            llm_ok,
            messages,
        }
    }
}
