use crate::config::LLMConfig;
use crate::llm::ModelTier;

/// 超过该长度的prompt直接交给powerful模型
const EFFICIENT_PROMPT_LIMIT: usize = 32 * 1024;

/// 根据档位与prompt长度选择模型，返回 (首选模型, 兜底模型)
pub fn evaluate_befitting_model(
    llm_config: &LLMConfig,
    tier: ModelTier,
    system_prompt: &str,
    user_prompt: &str,
) -> (String, Option<String>) {
    let oversized = system_prompt.len() + user_prompt.len() > EFFICIENT_PROMPT_LIMIT;
    let same_model = llm_config.model_efficient == llm_config.model_powerful;

    if tier == ModelTier::Powerful || oversized || same_model {
        return (llm_config.model_powerful.clone(), None);
    }
    (
        llm_config.model_efficient.clone(),
        Some(llm_config.model_powerful.clone()),
    )
}

/// 把JSON Schema附加到system prompt末尾
pub fn compose_structured_preamble(system_prompt: &str, schema: &serde_json::Value) -> String {
    let schema_text =
        serde_json::to_string_pretty(schema).unwrap_or_else(|_| schema.to_string());
    format!(
        "{}\n\nRespond with exactly one JSON object and nothing else. It must conform to this JSON Schema:\n```json\n{}\n```",
        system_prompt, schema_text
    )
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn llm_config() -> LLMConfig {
        LLMConfig {
            model_efficient: "small".to_string(),
            model_powerful: "large".to_string(),
            ..LLMConfig::default()
        }
    }

    #[test]
    fn test_efficient_tier_falls_back_to_powerful() {
        let (model, fallback) =
            evaluate_befitting_model(&llm_config(), ModelTier::Efficient, "sys", "user");
        assert_eq!(model, "small");
        assert_eq!(fallback.as_deref(), Some("large"));
    }

    #[test]
    fn test_powerful_tier_and_oversized_prompt() {
        let (model, fallback) =
            evaluate_befitting_model(&llm_config(), ModelTier::Powerful, "sys", "user");
        assert_eq!(model, "large");
        assert!(fallback.is_none());

        let long_prompt = "x".repeat(EFFICIENT_PROMPT_LIMIT + 1);
        let (model, fallback) =
            evaluate_befitting_model(&llm_config(), ModelTier::Efficient, "sys", &long_prompt);
        assert_eq!(model, "large");
        assert!(fallback.is_none());
    }

    #[test]
    fn test_structured_preamble_embeds_schema() {
        let preamble = compose_structured_preamble("You analyse markets.", &json!({"type": "object"}));
        assert!(preamble.starts_with("You analyse markets."));
        assert!(preamble.contains("\"type\": \"object\""));
    }
}
