use crate::config::AnalysisConfig;
use crate::generator::analysis::context::{AnalysisInput, build_evidence_context};
use crate::generator::analysis::node::AnalysisNode;
use crate::generator::analysis::types::FeasibilityAnalysis;

use super::NodeNames;

/// 综合分与各维度平均分允许的最大偏差
const OVERALL_SCORE_TOLERANCE: f64 = 3.0;

/// 可行性评估
#[derive(Default, Clone)]
pub struct FeasibilityAnalyzer;

impl AnalysisNode for FeasibilityAnalyzer {
    type Input = AnalysisInput;
    type Output = FeasibilityAnalysis;

    fn name(&self) -> &'static str {
        NodeNames::FEASIBILITY
    }

    fn system_prompt(&self) -> String {
        "You are a startup advisor who evaluates execution feasibility. Score the business idea from 1 to 10 on five dimensions: technical, market, financial, operational and regulatory, giving a short rationale for each score. Give an overall score from 1 to 10 consistent with the dimension scores, list the major risks, and finish with a one-paragraph recommendation.".to_string()
    }

    fn build_user_prompt(&self, input: &AnalysisInput, settings: &AnalysisConfig) -> String {
        format!(
            "Assess the feasibility of the following idea.\n\n{}",
            build_evidence_context(input, settings)
        )
    }

    fn post_validate(&self, output: &FeasibilityAnalysis) -> Result<(), String> {
        let dimensions = output.dimensions();
        let average =
            dimensions.iter().map(|(_, d)| d.score).sum::<f64>() / dimensions.len() as f64;
        if (output.overall_score - average).abs() > OVERALL_SCORE_TOLERANCE {
            return Err(format!(
                "overallScore {} is inconsistent with the average dimension score {:.1}",
                output.overall_score, average
            ));
        }
        Ok(())
    }
}
