pub mod competitor;
pub mod feasibility;
pub mod market;
pub mod strategy;
pub mod tam_sam;

pub use competitor::CompetitorAnalyzer;
pub use feasibility::FeasibilityAnalyzer;
pub use market::MarketAnalyzer;
pub use strategy::StrategySynthesizer;
pub use tam_sam::TamSamAnalyzer;

/// 节点名，同时用作缓存键与任务状态中的标识
pub struct NodeNames;

impl NodeNames {
    pub const MARKET: &'static str = "market";
    pub const TAM_SAM: &'static str = "tam_sam";
    pub const COMPETITOR: &'static str = "competitor";
    pub const FEASIBILITY: &'static str = "feasibility";
    pub const STRATEGY: &'static str = "strategy";

    /// 并行阶段的节点，顺序即结果合并与失败上报的顺序
    pub const PARALLEL: [&'static str; 4] =
        [Self::MARKET, Self::TAM_SAM, Self::COMPETITOR, Self::FEASIBILITY];
}
