pub mod agents;
pub mod context;
pub mod node;
pub mod orchestrator;
pub mod types;

pub use context::{AnalysisInput, StrategyInput};
pub use orchestrator::AnalysisOrchestrator;
pub use types::FinalResult;
