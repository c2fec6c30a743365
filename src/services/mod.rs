pub mod federation_service;
pub mod integration_service;
pub mod llm_service;
pub mod narrative_service;
pub mod plan_extraction_service;
pub mod query_parser;
pub mod query_service;
pub mod risk_service;
pub mod sql_planner;
pub mod sql_validator;
