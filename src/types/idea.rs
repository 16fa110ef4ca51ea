use serde::{Deserialize, Serialize};

/// 经过规范化的商业想法，由上游表单/接口整理后传入
#[derive(Debug, Serialize, Deserialize, Clone, PartialEq, Default)]
#[serde(rename_all = "camelCase")]
pub struct NormalizedIdea {
    pub title: String,
    #[serde(default)]
    pub description: Option<String>,
    #[serde(default)]
    pub industry: String,
    #[serde(default)]
    pub target_audience: String,
    #[serde(default)]
    pub key_features: Vec<String>,
    /// 想法要解决的问题
    #[serde(default)]
    pub problem: Option<String>,
    #[serde(default)]
    pub business_model: Option<String>,
}

impl NormalizedIdea {
    /// 供prompt使用的简要描述
    pub fn to_brief(&self) -> String {
        let mut brief = format!("- Title: {}\n", self.title);
        if !self.industry.trim().is_empty() {
            brief.push_str(&format!("- Industry: {}\n", self.industry));
        }
        if !self.target_audience.trim().is_empty() {
            brief.push_str(&format!("- Target audience: {}\n", self.target_audience));
        }
        if !self.key_features.is_empty() {
            brief.push_str(&format!("- Key features: {}\n", self.key_features.join(", ")));
        }
        if let Some(problem) = self.problem.as_ref().filter(|p| !p.trim().is_empty()) {
            brief.push_str(&format!("- Problem: {}\n", problem));
        }
        if let Some(model) = self.business_model.as_ref().filter(|m| !m.trim().is_empty()) {
            brief.push_str(&format!("- Business model: {}\n", model));
        }
        if let Some(description) = self.description.as_ref().filter(|d| !d.trim().is_empty()) {
            brief.push_str(&format!("- Description: {}\n", description));
        }
        brief
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_deserialize_camel_case() {
        let idea: NormalizedIdea = serde_json::from_str(
            r#"{"title":"AI note app","industry":"Productivity","targetAudience":"Students","keyFeatures":["voice-to-text","summarization"]}"#,
        )
        .unwrap();

        assert_eq!(idea.title, "AI note app");
        assert_eq!(idea.target_audience, "Students");
        assert_eq!(idea.key_features.len(), 2);
        assert!(idea.description.is_none());
    }

    #[test]
    fn test_brief_skips_empty_fields() {
        let idea = NormalizedIdea {
            title: "AI note app".to_string(),
            industry: "Productivity".to_string(),
            ..Default::default()
        };
        let brief = idea.to_brief();
        assert!(brief.contains("Title: AI note app"));
        assert!(brief.contains("Industry: Productivity"));
        assert!(!brief.contains("Target audience"));
        assert!(!brief.contains("Key features"));
    }
}
