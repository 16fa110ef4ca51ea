//! 调研阶段：查询生成 → 搜索 → 抓取 → 去重排序 → ResearchPack
//!
//! 同一 (idea, 查询集合) 只产出一次证据包，再次运行时直接命中整包缓存。

pub mod facts;
pub mod orchestrator;
pub mod queries;

pub use orchestrator::ResearchOrchestrator;
pub use queries::{generate_queries, research_hash};
