//! 分析节点的结构化输出
//!
//! 字段上的 `validator` 规则描述结构约束，跨字段的约束由各节点的 `post_validate` 检查。
//! JSON Schema 由 `schemars` 从同一组类型生成，作为模型的输出格式说明。

use std::collections::BTreeMap;

use chrono::{DateTime, Utc};
use schemars::JsonSchema;
use serde::{Deserialize, Serialize};
use validator::Validate;

use crate::types::NodeResult;

#[derive(Debug, Serialize, Deserialize, Clone, PartialEq, JsonSchema, Validate)]
#[serde(rename_all = "camelCase")]
pub struct DemandSignal {
    /// 需求信号，例如搜索热度、社区讨论、付费意愿
    #[validate(length(min = 1))]
    pub signal: String,
    /// 支撑该信号的证据
    pub evidence: String,
    #[serde(default)]
    pub source_url: Option<String>,
}

#[derive(Debug, Serialize, Deserialize, Clone, PartialEq, JsonSchema, Validate)]
#[serde(rename_all = "camelCase")]
pub struct TargetSegment {
    #[validate(length(min = 1))]
    pub name: String,
    pub description: String,
    #[serde(default)]
    pub size_estimate: Option<String>,
}

/// 市场需求分析
#[derive(Debug, Serialize, Deserialize, Clone, PartialEq, JsonSchema, Validate)]
#[serde(rename_all = "camelCase")]
pub struct MarketAnalysis {
    /// 0-100
    #[validate(range(min = 0.0, max = 100.0))]
    pub confidence: f64,
    #[validate(length(min = 1))]
    pub summary: String,
    #[validate(length(min = 1), nested)]
    pub demand_signals: Vec<DemandSignal>,
    pub trends: Vec<String>,
    #[validate(nested)]
    pub target_segments: Vec<TargetSegment>,
    pub risks: Vec<String>,
}

#[derive(Debug, Serialize, Deserialize, Clone, PartialEq, JsonSchema, Validate)]
#[serde(rename_all = "camelCase")]
pub struct MarketFigure {
    /// 美元金额
    #[validate(range(min = 0.0))]
    pub value_usd: f64,
    #[validate(length(min = 1))]
    pub rationale: String,
}

/// TAM / SAM / SOM 市场规模测算
#[derive(Debug, Serialize, Deserialize, Clone, PartialEq, JsonSchema, Validate)]
#[serde(rename_all = "camelCase")]
pub struct TamSamAnalysis {
    #[validate(range(min = 0.0, max = 100.0))]
    pub confidence: f64,
    #[validate(nested)]
    pub tam: MarketFigure,
    #[validate(nested)]
    pub sam: MarketFigure,
    #[validate(nested)]
    pub som: MarketFigure,
    #[validate(length(min = 1))]
    pub methodology: String,
    pub assumptions: Vec<String>,
    /// 年复合增长率（百分比）
    #[serde(default)]
    pub cagr_percent: Option<f64>,
}

#[derive(Debug, Serialize, Deserialize, Clone, PartialEq, JsonSchema, Validate)]
#[serde(rename_all = "camelCase")]
pub struct Competitor {
    #[validate(length(min = 1))]
    pub name: String,
    pub description: String,
    #[serde(default)]
    pub strengths: Vec<String>,
    #[serde(default)]
    pub weaknesses: Vec<String>,
    #[serde(default)]
    pub pricing: Option<String>,
}

#[derive(Debug, Serialize, Deserialize, Clone, Copy, PartialEq, Eq, JsonSchema)]
#[serde(rename_all = "snake_case")]
pub enum Intensity {
    Low,
    Medium,
    High,
}

/// 竞争格局分析
#[derive(Debug, Serialize, Deserialize, Clone, PartialEq, JsonSchema, Validate)]
#[serde(rename_all = "camelCase")]
pub struct CompetitorAnalysis {
    #[validate(range(min = 0.0, max = 100.0))]
    pub confidence: f64,
    #[validate(length(min = 2), nested)]
    pub market_leaders: Vec<Competitor>,
    #[validate(nested)]
    pub direct_competitors: Vec<Competitor>,
    #[validate(length(min = 3))]
    pub differentiation_opportunities: Vec<String>,
    pub competitive_intensity: Intensity,
    pub barriers_to_entry: Vec<String>,
}

#[derive(Debug, Serialize, Deserialize, Clone, PartialEq, JsonSchema, Validate)]
#[serde(rename_all = "camelCase")]
pub struct DimensionScore {
    /// 1-10
    #[validate(range(min = 1.0, max = 10.0))]
    pub score: f64,
    #[validate(length(min = 1))]
    pub rationale: String,
}

/// 可行性评估，五个维度各自1-10分
#[derive(Debug, Serialize, Deserialize, Clone, PartialEq, JsonSchema, Validate)]
#[serde(rename_all = "camelCase")]
pub struct FeasibilityAnalysis {
    #[validate(range(min = 0.0, max = 100.0))]
    pub confidence: f64,
    #[validate(nested)]
    pub technical: DimensionScore,
    #[validate(nested)]
    pub market: DimensionScore,
    #[validate(nested)]
    pub financial: DimensionScore,
    #[validate(nested)]
    pub operational: DimensionScore,
    #[validate(nested)]
    pub regulatory: DimensionScore,
    #[validate(range(min = 1.0, max = 10.0))]
    pub overall_score: f64,
    pub risks: Vec<String>,
    #[validate(length(min = 1))]
    pub recommendation: String,
}

impl FeasibilityAnalysis {
    pub fn dimensions(&self) -> [(&'static str, &DimensionScore); 5] {
        [
            ("technical", &self.technical),
            ("market", &self.market),
            ("financial", &self.financial),
            ("operational", &self.operational),
            ("regulatory", &self.regulatory),
        ]
    }
}

#[derive(Debug, Serialize, Deserialize, Clone, Copy, PartialEq, Eq, JsonSchema)]
#[serde(rename_all = "snake_case")]
pub enum Verdict {
    Go,
    Pivot,
    NoGo,
}

#[derive(Debug, Serialize, Deserialize, Clone, PartialEq, JsonSchema, Validate)]
#[serde(rename_all = "camelCase")]
pub struct GoToMarketStep {
    #[validate(length(min = 1))]
    pub step: String,
    #[serde(default)]
    pub channel: Option<String>,
    #[serde(default)]
    pub timeline: Option<String>,
}

#[derive(Debug, Serialize, Deserialize, Clone, PartialEq, JsonSchema, Validate)]
#[serde(rename_all = "camelCase")]
pub struct Milestone {
    #[validate(length(min = 1))]
    pub name: String,
    pub timeframe: String,
    pub success_metric: String,
}

/// 综合策略建议，基于四个分析节点的输出
#[derive(Debug, Serialize, Deserialize, Clone, PartialEq, JsonSchema, Validate)]
#[serde(rename_all = "camelCase")]
pub struct StrategyRecommendation {
    #[validate(range(min = 0.0, max = 100.0))]
    pub confidence: f64,
    pub verdict: Verdict,
    /// 0-100
    #[validate(range(min = 0.0, max = 100.0))]
    pub overall_score: f64,
    #[validate(length(min = 1))]
    pub positioning: String,
    #[validate(length(min = 1), nested)]
    pub go_to_market: Vec<GoToMarketStep>,
    pub pricing_strategy: String,
    #[validate(nested)]
    pub milestones: Vec<Milestone>,
    pub key_risks: Vec<String>,
    #[validate(length(min = 1))]
    pub next_steps: Vec<String>,
}

/// 单个节点在最终结果中的执行统计
#[derive(Debug, Serialize, Deserialize, Clone, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct NodeSummary {
    pub success: bool,
    pub timing_ms: u64,
    pub attempts: u32,
    pub cached: bool,
}

impl<T> From<&NodeResult<T>> for NodeSummary {
    fn from(result: &NodeResult<T>) -> Self {
        Self {
            success: result.success,
            timing_ms: result.timing,
            attempts: result.attempts,
            cached: result.cached,
        }
    }
}

/// 一次完整分析的最终结果
#[derive(Debug, Serialize, Deserialize, Clone, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct FinalResult {
    pub job_id: String,
    pub idea_id: String,
    pub research_pack_id: String,
    pub research_hash: String,
    pub market: MarketAnalysis,
    pub tam_sam: TamSamAnalysis,
    pub competitor: CompetitorAnalysis,
    pub feasibility: FeasibilityAnalysis,
    pub strategy: StrategyRecommendation,
    pub nodes: BTreeMap<String, NodeSummary>,
    pub completed_at: DateTime<Utc>,
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_competitor_requires_leaders_and_opportunities() {
        let analysis: CompetitorAnalysis = serde_json::from_value(json!({
            "confidence": 70,
            "marketLeaders": [{"name": "Notion", "description": "workspace"}],
            "directCompetitors": [],
            "differentiationOpportunities": ["offline", "voice"],
            "competitiveIntensity": "high",
            "barriersToEntry": []
        }))
        .unwrap();

        let errors = analysis.validate().unwrap_err();
        let fields = errors.field_errors();
        assert!(fields.contains_key("market_leaders"));
        assert!(fields.contains_key("differentiation_opportunities"));
    }

    #[test]
    fn test_feasibility_scores_bounded() {
        let dimension = |score: f64| json!({"score": score, "rationale": "r"});
        let mut value = json!({
            "confidence": 60,
            "technical": dimension(7.0),
            "market": dimension(6.0),
            "financial": dimension(5.0),
            "operational": dimension(8.0),
            "regulatory": dimension(9.0),
            "overallScore": 7,
            "risks": [],
            "recommendation": "Proceed with an MVP"
        });
        let analysis: FeasibilityAnalysis = serde_json::from_value(value.clone()).unwrap();
        assert!(analysis.validate().is_ok());
        assert_eq!(analysis.dimensions()[4].0, "regulatory");

        value["technical"] = dimension(11.0);
        let analysis: FeasibilityAnalysis = serde_json::from_value(value).unwrap();
        assert!(analysis.validate().is_err());
    }

    #[test]
    fn test_verdict_serialization() {
        assert_eq!(serde_json::to_value(Verdict::NoGo).unwrap(), json!("no_go"));
        let verdict: Verdict = serde_json::from_value(json!("pivot")).unwrap();
        assert_eq!(verdict, Verdict::Pivot);
    }
}
