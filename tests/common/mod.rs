//! In-memory stores and a scripted text generator shared by the integration tests.
#![allow(dead_code)]

use std::sync::{Arc, Mutex};
use std::sync::atomic::{AtomicUsize, Ordering};

use async_trait::async_trait;
use chrono::NaiveDate;

use finsight_backend::config::PipelineSettings;
use finsight_backend::db::{FundamentalsStore, PriceStore};
use finsight_backend::errors::LlmError;
use finsight_backend::models::{
    DataWindow, FundamentalsRow, PriceGrowthRow, PriceRow, SymbolUniverse,
};
use finsight_backend::services::llm_service::{GenerationParams, LlmConfig, LlmService, TextGenerator};
use finsight_backend::services::query_service::QueryService;

pub fn date(y: i32, m: u32, d: u32) -> NaiveDate {
    NaiveDate::from_ymd_opt(y, m, d).unwrap()
}

#[derive(Default)]
pub struct MemoryPriceStore {
    pub growth: Vec<PriceGrowthRow>,
    pub daily: Vec<PriceRow>,
    pub fail: bool,
    /// Fail only the daily close series; growth rows still come back.
    pub fail_daily: bool,
    pub down: bool,
    pub growth_sql: Mutex<Vec<String>>,
    pub daily_sql: Mutex<Vec<String>>,
    pub daily_calls: AtomicUsize,
}

impl MemoryPriceStore {
    pub fn daily_calls(&self) -> usize {
        self.daily_calls.load(Ordering::SeqCst)
    }

    pub fn last_growth_sql(&self) -> String {
        self.growth_sql.lock().unwrap().last().cloned().unwrap_or_default()
    }

    pub fn last_daily_sql(&self) -> String {
        self.daily_sql.lock().unwrap().last().cloned().unwrap_or_default()
    }
}

#[async_trait]
impl PriceStore for MemoryPriceStore {
    async fn fetch_price_growth(&self, sql: &str) -> Result<Vec<PriceGrowthRow>, sqlx::Error> {
        self.growth_sql.lock().unwrap().push(sql.to_string());
        if self.fail {
            return Err(sqlx::Error::Protocol("price db connection reset".into()));
        }
        Ok(self.growth.clone())
    }

    async fn fetch_daily_series(&self, sql: &str) -> Result<Vec<PriceRow>, sqlx::Error> {
        self.daily_calls.fetch_add(1, Ordering::SeqCst);
        self.daily_sql.lock().unwrap().push(sql.to_string());
        if self.fail_daily {
            return Err(sqlx::Error::Protocol("daily series read timed out".into()));
        }
        Ok(self.daily.clone())
    }

    async fn ping(&self) -> Result<(), sqlx::Error> {
        if self.down {
            return Err(sqlx::Error::PoolTimedOut);
        }
        Ok(())
    }
}

#[derive(Default)]
pub struct MemoryFundamentalsStore {
    pub rows: Vec<FundamentalsRow>,
    pub sql: Mutex<Vec<String>>,
}

impl MemoryFundamentalsStore {
    pub fn last_sql(&self) -> String {
        self.sql.lock().unwrap().last().cloned().unwrap_or_default()
    }
}

#[async_trait]
impl FundamentalsStore for MemoryFundamentalsStore {
    async fn fetch_fundamentals(&self, sql: &str) -> Result<Vec<FundamentalsRow>, sqlx::Error> {
        self.sql.lock().unwrap().push(sql.to_string());
        Ok(self.rows.clone())
    }

    async fn ping(&self) -> Result<(), sqlx::Error> {
        Ok(())
    }
}

/// Answers plan-extraction prompts and narrative prompts with fixed text.
pub struct ScriptedGenerator {
    pub plan_reply: String,
    pub narrative_reply: String,
}

#[async_trait]
impl TextGenerator for ScriptedGenerator {
    async fn generate(&self, prompt: &str, _params: GenerationParams) -> Result<String, LlmError> {
        if prompt.contains("JSON query plan") {
            Ok(self.plan_reply.clone())
        } else {
            Ok(self.narrative_reply.clone())
        }
    }

    async fn is_available(&self) -> bool {
        true
    }
}

pub fn growth(symbol: &str, start: f64, end: f64) -> PriceGrowthRow {
    PriceGrowthRow {
        symbol: symbol.to_string(),
        start_price: Some(start),
        end_price: Some(end),
        price_growth: Some((end - start) / start),
    }
}

pub fn settings(start: NaiveDate, end: NaiveDate, symbols: &[&str]) -> PipelineSettings {
    PipelineSettings {
        window: DataWindow::new(start, end).unwrap(),
        universe: SymbolUniverse::new(symbols.iter().copied()),
        narrative_top_n: 3,
        llm_plan_extraction: false,
    }
}

pub fn scripted_llm(plan_reply: &str, narrative_reply: &str) -> Arc<LlmService> {
    Arc::new(LlmService::with_provider(
        LlmConfig { enabled: true, ..LlmConfig::default() },
        Arc::new(ScriptedGenerator {
            plan_reply: plan_reply.to_string(),
            narrative_reply: narrative_reply.to_string(),
        }),
    ))
}

pub fn service(
    prices: Arc<MemoryPriceStore>,
    funds: Arc<MemoryFundamentalsStore>,
    llm: Arc<LlmService>,
    settings: PipelineSettings,
) -> QueryService {
    QueryService::new(prices, funds, llm, settings)
}
