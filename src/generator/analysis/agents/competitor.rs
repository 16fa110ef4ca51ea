use std::collections::HashSet;

use crate::config::AnalysisConfig;
use crate::generator::analysis::context::{AnalysisInput, build_evidence_context};
use crate::generator::analysis::node::AnalysisNode;
use crate::generator::analysis::types::CompetitorAnalysis;

use super::NodeNames;

/// 竞争格局分析
#[derive(Default, Clone)]
pub struct CompetitorAnalyzer;

impl AnalysisNode for CompetitorAnalyzer {
    type Input = AnalysisInput;
    type Output = CompetitorAnalysis;

    fn name(&self) -> &'static str {
        NodeNames::COMPETITOR
    }

    fn system_prompt(&self) -> String {
        "You are a competitive intelligence analyst. Map the competitive landscape for the business idea using the research evidence. Name at least two market leaders and any direct competitors, with their strengths, weaknesses and pricing where known. Propose at least three concrete differentiation opportunities, rate the competitive intensity as low, medium or high, and list the barriers to entry.".to_string()
    }

    fn build_user_prompt(&self, input: &AnalysisInput, settings: &AnalysisConfig) -> String {
        format!(
            "Analyze the competitors of the following idea.\n\n{}",
            build_evidence_context(input, settings)
        )
    }

    /// 同一家公司不能在列表中重复出现
    fn post_validate(&self, output: &CompetitorAnalysis) -> Result<(), String> {
        let mut seen = HashSet::new();
        for competitor in output.market_leaders.iter().chain(&output.direct_competitors) {
            let key = competitor.name.trim().to_lowercase();
            if !seen.insert(key) {
                return Err(format!("competitor '{}' is listed more than once", competitor.name));
            }
        }
        Ok(())
    }
}
