pub mod cache;
pub mod cli;
pub mod config;
pub mod error;
pub mod events;
pub mod fetcher;
pub mod generator;
pub mod i18n;
pub mod llm;
pub mod ranking;
pub mod search;
pub mod store;
pub mod types;
pub mod utils;

// Re-export commonly used types
pub use config::Config;
pub use error::PipelineError;
pub use generator::analysis::{AnalysisOrchestrator, FinalResult};
pub use generator::context::PipelineContext;
pub use generator::research::ResearchOrchestrator;
pub use generator::workflow::{AnalysisRequest, launch};
