use crate::config::AnalysisConfig;
use crate::generator::analysis::context::{AnalysisInput, build_evidence_context};
use crate::generator::analysis::node::AnalysisNode;
use crate::generator::analysis::types::MarketAnalysis;

use super::NodeNames;

/// 市场需求分析：需求信号、趋势与目标细分人群
#[derive(Default, Clone)]
pub struct MarketAnalyzer;

impl AnalysisNode for MarketAnalyzer {
    type Input = AnalysisInput;
    type Output = MarketAnalysis;

    fn name(&self) -> &'static str {
        NodeNames::MARKET
    }

    fn system_prompt(&self) -> String {
        "You are a senior market research analyst. Using only the research evidence provided, assess whether there is real demand for the business idea. Identify concrete demand signals and cite the source URL for each one when the evidence contains it. Describe relevant market trends, the most promising target segments, and the main market risks. Set confidence between 0 and 100 according to how strong and consistent the evidence is.".to_string()
    }

    fn build_user_prompt(&self, input: &AnalysisInput, settings: &AnalysisConfig) -> String {
        format!(
            "Analyze market demand for the following idea.\n\n{}",
            build_evidence_context(input, settings)
        )
    }
}
