use md5::{Digest, Md5};
use serde::Serialize;

use crate::config::AnalysisConfig;
use crate::generator::analysis::context::{StrategyInput, build_strategy_context};
use crate::generator::analysis::node::AnalysisNode;
use crate::generator::analysis::types::{StrategyRecommendation, Verdict};
use crate::llm::ModelTier;

use super::NodeNames;

/// 在四个分析结果的基础上给出最终策略
#[derive(Default, Clone)]
pub struct StrategySynthesizer;

impl AnalysisNode for StrategySynthesizer {
    type Input = StrategyInput;
    type Output = StrategyRecommendation;

    fn name(&self) -> &'static str {
        NodeNames::STRATEGY
    }

    fn model_tier(&self) -> ModelTier {
        ModelTier::Powerful
    }

    fn system_prompt(&self) -> String {
        "You are a venture strategist. Combine the market, market sizing, competitor and feasibility analyses into one strategic recommendation for the business idea. Give a verdict of go, pivot or no_go with an overall score from 0 to 100, state the positioning, outline concrete go-to-market steps and a pricing strategy, define milestones with measurable success metrics, and list the key risks and immediate next steps. Stay consistent with the analyses you were given.".to_string()
    }

    fn build_user_prompt(&self, input: &StrategyInput, _settings: &AnalysisConfig) -> String {
        format!(
            "Synthesize a strategy from the following analyses.\n\n{}",
            build_strategy_context(input)
        )
    }

    /// verdict与综合分不能相互矛盾
    fn post_validate(&self, output: &StrategyRecommendation) -> Result<(), String> {
        match output.verdict {
            Verdict::Go if output.overall_score < 40.0 => Err(format!(
                "verdict 'go' conflicts with overallScore {}",
                output.overall_score
            )),
            Verdict::NoGo if output.overall_score > 60.0 => Err(format!(
                "verdict 'no_go' conflicts with overallScore {}",
                output.overall_score
            )),
            _ => Ok(()),
        }
    }

    /// 四个上游输出的md5，任一输出变化都会让策略缓存失效
    fn input_fingerprint(&self, input: &StrategyInput) -> Option<String> {
        let mut hasher = Md5::new();
        hash_json(&mut hasher, &input.market)?;
        hash_json(&mut hasher, &input.tam_sam)?;
        hash_json(&mut hasher, &input.competitor)?;
        hash_json(&mut hasher, &input.feasibility)?;
        let digest = format!("{:x}", hasher.finalize());
        Some(digest[..12].to_string())
    }
}

fn hash_json<T: Serialize>(hasher: &mut Md5, value: &T) -> Option<()> {
    let json = serde_json::to_string(value).ok()?;
    hasher.update(json.as_bytes());
    hasher.update(b"\n");
    Some(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::generator::analysis::node::parse_output;
    use serde_json::json;

    fn strategy(verdict: &str, score: f64) -> String {
        json!({
            "confidence": 65,
            "verdict": verdict,
            "overallScore": score,
            "positioning": "Voice-first notes for students",
            "goToMarket": [{"step": "Campus ambassadors", "channel": "universities"}],
            "pricingStrategy": "Freemium",
            "milestones": [],
            "keyRisks": [],
            "nextSteps": ["Ship a beta"]
        })
        .to_string()
    }

    #[test]
    fn test_verdict_matches_score() {
        assert!(parse_output(&StrategySynthesizer, &strategy("go", 72.0)).is_ok());
        assert!(parse_output(&StrategySynthesizer, &strategy("go", 20.0)).is_err());
        assert!(parse_output(&StrategySynthesizer, &strategy("no_go", 90.0)).is_err());
        assert!(parse_output(&StrategySynthesizer, &strategy("pivot", 50.0)).is_ok());
    }

    fn input(market_summary: &str) -> StrategyInput {
        let market = json!({
            "confidence": 70,
            "summary": market_summary,
            "demandSignals": [{"signal": "Search interest", "evidence": "Rising"}],
            "trends": ["AI"],
            "targetSegments": [{"name": "Students", "description": "Lecture heavy"}],
            "risks": []
        });
        let tam_sam = json!({
            "confidence": 60,
            "tam": {"valueUsd": 8.6e9, "rationale": "Global"},
            "sam": {"valueUsd": 1.2e9, "rationale": "Students"},
            "som": {"valueUsd": 3.0e7, "rationale": "Share"},
            "methodology": "Top-down",
            "assumptions": []
        });
        let competitor = json!({
            "confidence": 70,
            "marketLeaders": [
                {"name": "Notion", "description": "Workspace"},
                {"name": "Evernote", "description": "Notes"}
            ],
            "directCompetitors": [],
            "differentiationOpportunities": ["Offline", "Voice", "Pricing"],
            "competitiveIntensity": "high",
            "barriersToEntry": []
        });
        let dimension = json!({"score": 7.0, "rationale": "ok"});
        let feasibility = json!({
            "confidence": 65,
            "technical": dimension,
            "market": dimension,
            "financial": dimension,
            "operational": dimension,
            "regulatory": dimension,
            "overallScore": 7.0,
            "risks": [],
            "recommendation": "Build an MVP"
        });

        StrategyInput {
            idea: crate::types::NormalizedIdea {
                title: "AI note app".to_string(),
                description: None,
                industry: "Productivity".to_string(),
                target_audience: "Students".to_string(),
                key_features: vec![],
                problem: None,
                business_model: None,
            },
            market: serde_json::from_value(market).unwrap(),
            tam_sam: serde_json::from_value(tam_sam).unwrap(),
            competitor: serde_json::from_value(competitor).unwrap(),
            feasibility: serde_json::from_value(feasibility).unwrap(),
        }
    }

    #[test]
    fn test_fingerprint_follows_upstream_outputs() {
        let first = StrategySynthesizer.input_fingerprint(&input("Strong demand"));
        assert!(first.is_some());
        assert_eq!(first, StrategySynthesizer.input_fingerprint(&input("Strong demand")));
        assert_ne!(first, StrategySynthesizer.input_fingerprint(&input("Weak demand")));
    }
}
