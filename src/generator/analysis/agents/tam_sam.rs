use crate::config::AnalysisConfig;
use crate::generator::analysis::context::{AnalysisInput, build_evidence_context};
use crate::generator::analysis::node::AnalysisNode;
use crate::generator::analysis::types::TamSamAnalysis;
use crate::llm::ModelTier;

use super::NodeNames;

/// TAM/SAM/SOM测算
#[derive(Default, Clone)]
pub struct TamSamAnalyzer;

impl AnalysisNode for TamSamAnalyzer {
    type Input = AnalysisInput;
    type Output = TamSamAnalysis;

    fn name(&self) -> &'static str {
        NodeNames::TAM_SAM
    }

    fn model_tier(&self) -> ModelTier {
        ModelTier::Powerful
    }

    fn system_prompt(&self) -> String {
        "You are a market sizing specialist. Estimate the total addressable market (TAM), the serviceable addressable market (SAM) and the serviceable obtainable market (SOM) in US dollars for the business idea. Prefer figures quoted in the research evidence and explain how each number was derived. TAM must be at least SAM, and SAM must be at least SOM. List the assumptions behind the estimates and include a compound annual growth rate when the evidence supports one.".to_string()
    }

    fn build_user_prompt(&self, input: &AnalysisInput, settings: &AnalysisConfig) -> String {
        format!(
            "Size the market for the following idea.\n\n{}",
            build_evidence_context(input, settings)
        )
    }

    fn post_validate(&self, output: &TamSamAnalysis) -> Result<(), String> {
        if output.tam.value_usd < output.sam.value_usd {
            return Err(format!(
                "tam ({}) must be greater than or equal to sam ({})",
                output.tam.value_usd, output.sam.value_usd
            ));
        }
        if output.sam.value_usd < output.som.value_usd {
            return Err(format!(
                "sam ({}) must be greater than or equal to som ({})",
                output.sam.value_usd, output.som.value_usd
            ));
        }
        Ok(())
    }
}
