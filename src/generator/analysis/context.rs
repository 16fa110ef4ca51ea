//! 节点输入与prompt上下文的构建

use super::types::{CompetitorAnalysis, FeasibilityAnalysis, MarketAnalysis, TamSamAnalysis};
use crate::config::AnalysisConfig;
use crate::types::{NormalizedIdea, ResearchPack};
use crate::utils::text::truncate_chars;

/// 四个分析节点共享的输入
#[derive(Debug, Clone)]
pub struct AnalysisInput {
    pub idea: NormalizedIdea,
    pub pack: ResearchPack,
}

/// 策略节点的输入：四个分析节点的结构化输出
#[derive(Debug, Clone)]
pub struct StrategyInput {
    pub idea: NormalizedIdea,
    pub market: MarketAnalysis,
    pub tam_sam: TamSamAnalysis,
    pub competitor: CompetitorAnalysis,
    pub feasibility: FeasibilityAnalysis,
}

/// 从ResearchPack中取前N篇文档构建有界的证据上下文
pub fn build_evidence_context(input: &AnalysisInput, settings: &AnalysisConfig) -> String {
    let pack = &input.pack;
    let mut context = String::new();

    context.push_str("## Business idea\n");
    context.push_str(&input.idea.to_brief());

    if !pack.facts.is_empty() {
        context.push_str("\n## Key facts from research\n");
        for fact in &pack.facts {
            context.push_str(&format!("- {} (source: {})\n", fact.statement, fact.source_url));
        }
    }

    context.push_str("\n## Research sources\n");
    if pack.documents.is_empty() {
        context.push_str("No web documents were retrieved for this idea.\n");
    }
    for (index, ranked) in pack
        .documents
        .iter()
        .take(settings.context_documents)
        .enumerate()
    {
        let doc = &ranked.document;
        context.push_str(&format!(
            "\n### [{}] {}\nURL: {}\nDomain: {} | Relevance score: {:.1}",
            index + 1,
            doc.title,
            doc.url,
            doc.metadata.domain,
            ranked.rank_score
        ));
        if let Some(published) = doc.metadata.published_date {
            context.push_str(&format!(" | Published: {}", published.format("%Y-%m-%d")));
        }
        context.push('\n');
        context.push_str(truncate_chars(&doc.content, settings.context_chars_per_document));
        context.push('\n');
    }

    if !pack.assumptions.is_empty() {
        context.push_str("\n## Research caveats\n");
        for assumption in &pack.assumptions {
            context.push_str(&format!("- {}\n", assumption));
        }
    }

    context
}

/// 策略节点的上下文：想法简述 + 四个分析结果的JSON
pub fn build_strategy_context(input: &StrategyInput) -> String {
    let mut context = String::new();
    context.push_str("## Business idea\n");
    context.push_str(&input.idea.to_brief());

    let sections: [(&str, serde_json::Result<String>); 4] = [
        ("Market analysis", serde_json::to_string_pretty(&input.market)),
        ("Market sizing (TAM/SAM/SOM)", serde_json::to_string_pretty(&input.tam_sam)),
        ("Competitive landscape", serde_json::to_string_pretty(&input.competitor)),
        ("Feasibility assessment", serde_json::to_string_pretty(&input.feasibility)),
    ];

    for (title, body) in sections {
        context.push_str(&format!("\n## {}\n", title));
        match body {
            Ok(json) => {
                context.push_str("```json\n");
                context.push_str(&json);
                context.push_str("\n```\n");
            }
            Err(e) => context.push_str(&format!("(unavailable: {})\n", e)),
        }
    }

    context
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::{Document, DocumentMetadata, Fact, RankedDocument, ResearchMetrics};
    use chrono::Utc;

    fn pack_with_documents(n: usize) -> ResearchPack {
        let now = Utc::now();
        ResearchPack {
            id: "pack-1".to_string(),
            idea_id: "idea-1".to_string(),
            research_hash: "hash".to_string(),
            queries: vec![],
            sources: vec![],
            documents: (0..n)
                .map(|i| RankedDocument {
                    document: Document {
                        url: format!("https://site{}.com", i),
                        title: format!("Doc {}", i),
                        content: "x".repeat(100),
                        content_hash: None,
                        metadata: DocumentMetadata {
                            domain: format!("site{}.com", i),
                            fetched_at: now,
                            ..Default::default()
                        },
                    },
                    rank_score: 10.0,
                })
                .collect(),
            facts: vec![Fact {
                statement: "The market grew 20% in 2023.".to_string(),
                source_url: "https://site0.com".to_string(),
            }],
            metrics: ResearchMetrics::default(),
            assumptions: vec!["Figures were not verified.".to_string()],
            ttl: now,
            created_at: now,
        }
    }

    #[test]
    fn test_evidence_context_is_bounded() {
        let input = AnalysisInput {
            idea: NormalizedIdea {
                title: "AI note app".to_string(),
                ..Default::default()
            },
            pack: pack_with_documents(5),
        };
        let settings = AnalysisConfig {
            context_documents: 2,
            context_chars_per_document: 10,
            ..AnalysisConfig::default()
        };

        let context = build_evidence_context(&input, &settings);
        assert!(context.contains("Title: AI note app"));
        assert!(context.contains("[2] Doc 1"));
        assert!(!context.contains("[3] Doc 2"));
        assert!(context.contains(&format!("\n{}\n", "x".repeat(10))));
        assert!(!context.contains(&"x".repeat(11)));
        assert!(context.contains("grew 20%"));
        assert!(context.contains("Research caveats"));
    }
}
