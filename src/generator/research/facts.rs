//! 从高分文档中抽取带数字的事实，并根据调研统计给出研究前提

use std::collections::HashSet;
use std::sync::LazyLock;

use regex::Regex;

use crate::types::{Fact, RankedDocument, ResearchMetrics};

/// 百分比、金额、规模量级、CAGR、倍数
static FIGURE_PATTERN: LazyLock<Option<Regex>> = LazyLock::new(|| {
    Regex::new(
        r"(?i)(\d[\d,.]*\s?%|\$\s?\d|\d[\d,.]*\s?(million|billion|trillion|bn|mn|k)\b|\bcagr\b|\b\d+(\.\d+)?x\b)",
    )
    .ok()
});

const MIN_FACT_CHARS: usize = 40;
const MAX_FACT_CHARS: usize = 300;
/// 单篇文档最多贡献的事实数，避免被一篇长文占满
const MAX_FACTS_PER_DOCUMENT: usize = 3;

/// 按句号/问号/感叹号+空白或换行切句
pub fn split_sentences(text: &str) -> Vec<&str> {
    let mut sentences = Vec::new();
    let mut start = 0;
    let mut chars = text.char_indices().peekable();

    while let Some((idx, ch)) = chars.next() {
        let boundary = match ch {
            '\n' => Some(idx),
            '.' | '!' | '?' => match chars.peek() {
                Some((_, next)) if next.is_whitespace() => Some(idx + ch.len_utf8()),
                None => Some(idx + ch.len_utf8()),
                _ => None,
            },
            _ => None,
        };
        if let Some(end) = boundary {
            let sentence = text[start..end].trim();
            if !sentence.is_empty() {
                sentences.push(sentence);
            }
            start = end;
        }
    }

    let tail = text[start..].trim();
    if !tail.is_empty() {
        sentences.push(tail);
    }
    sentences
}

fn carries_figure(sentence: &str) -> bool {
    FIGURE_PATTERN
        .as_ref()
        .is_some_and(|pattern| pattern.is_match(sentence))
}

/// 按排名顺序从文档中挑选带数字的句子
pub fn extract_facts(documents: &[RankedDocument], max_facts: usize) -> Vec<Fact> {
    let mut facts = Vec::new();
    let mut seen = HashSet::new();

    for ranked in documents {
        if facts.len() >= max_facts {
            break;
        }
        let mut taken = 0;
        for sentence in split_sentences(&ranked.document.content) {
            let length = sentence.chars().count();
            if !(MIN_FACT_CHARS..=MAX_FACT_CHARS).contains(&length) || !carries_figure(sentence) {
                continue;
            }
            if !seen.insert(sentence.to_lowercase()) {
                continue;
            }
            facts.push(Fact {
                statement: sentence.to_string(),
                source_url: ranked.document.url.clone(),
            });
            taken += 1;
            if taken >= MAX_FACTS_PER_DOCUMENT || facts.len() >= max_facts {
                break;
            }
        }
    }

    facts
}

/// 调研本身的局限，供分析节点参考
pub fn derive_assumptions(metrics: &ResearchMetrics) -> Vec<String> {
    let mut assumptions = Vec::new();

    if !metrics.secondary_enabled {
        assumptions.push(
            "Secondary search provider was disabled; evidence comes from a single search index."
                .to_string(),
        );
    }

    match metrics.document_count {
        0 => assumptions.push(
            "No usable documents were retrieved; conclusions rely on general market knowledge."
                .to_string(),
        ),
        n if n < 3 => assumptions.push(format!(
            "Evidence base is thin ({} documents); conclusions carry higher uncertainty.",
            n
        )),
        _ => {}
    }

    if metrics.unique_url_count > 0 {
        if metrics.blocked_count > 0 && metrics.blocked_count * 4 >= metrics.unique_url_count {
            assumptions.push(format!(
                "{} of {} sources were excluded by robots.txt.",
                metrics.blocked_count, metrics.unique_url_count
            ));
        }
        if metrics.error_count > 0 && metrics.error_count * 2 >= metrics.unique_url_count {
            assumptions.push(format!(
                "{} of {} sources could not be downloaded or parsed.",
                metrics.error_count, metrics.unique_url_count
            ));
        }
    }

    assumptions.push(
        "Figures quoted by web sources are taken at face value and were not independently verified."
            .to_string(),
    );
    assumptions
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::{Document, DocumentMetadata};

    fn ranked(url: &str, content: &str) -> RankedDocument {
        RankedDocument {
            document: Document {
                url: url.to_string(),
                title: String::new(),
                content: content.to_string(),
                content_hash: None,
                metadata: DocumentMetadata::default(),
            },
            rank_score: 10.0,
        }
    }

    #[test]
    fn test_split_sentences_keeps_decimals() {
        let sentences = split_sentences("The market is worth $1.5 billion. It grows fast!\nNew line");
        assert_eq!(
            sentences,
            vec!["The market is worth $1.5 billion.", "It grows fast!", "New line"]
        );
    }

    #[test]
    fn test_extract_facts_prefers_figures() {
        let docs = vec![
            ranked(
                "https://a.com",
                "Note-taking apps are popular with students everywhere. The global note-taking app market reached $8.6 billion in 2023. Analysts expect a CAGR of 17% through 2030 for the whole category.",
            ),
            ranked(
                "https://b.com",
                "About 65% of university students use a digital note tool every week.",
            ),
        ];

        let facts = extract_facts(&docs, 10);
        assert_eq!(facts.len(), 3);
        assert!(facts[0].statement.contains("$8.6 billion"));
        assert_eq!(facts[0].source_url, "https://a.com");
        assert_eq!(facts[2].source_url, "https://b.com");
    }

    #[test]
    fn test_extract_facts_respects_limits() {
        let text = (0..10)
            .map(|i| format!("Segment number {} accounts for {}% of all recorded revenue.", i, i + 10))
            .collect::<Vec<_>>()
            .join(" ");
        let docs = vec![ranked("https://a.com", &text), ranked("https://b.com", &text)];

        let facts = extract_facts(&docs, 20);
        // 第二篇跳过与第一篇重复的句子
        assert_eq!(facts.len(), MAX_FACTS_PER_DOCUMENT * 2);
        assert!(facts[3].statement.starts_with("Segment number 3 "));
        assert_eq!(facts[3].source_url, "https://b.com");
        assert_eq!(extract_facts(&docs, 2).len(), 2);
    }

    #[test]
    fn test_derive_assumptions() {
        let metrics = ResearchMetrics {
            unique_url_count: 8,
            blocked_count: 2,
            error_count: 4,
            document_count: 2,
            secondary_enabled: false,
            ..Default::default()
        };
        let assumptions = derive_assumptions(&metrics);
        assert_eq!(assumptions.len(), 5);
        assert!(assumptions[1].contains("thin (2 documents)"));

        let healthy = ResearchMetrics {
            unique_url_count: 10,
            document_count: 9,
            secondary_enabled: true,
            ..Default::default()
        };
        assert_eq!(derive_assumptions(&healthy).len(), 1);
    }
}
