use std::collections::HashSet;

use md5::{Digest, Md5};

use crate::types::NormalizedIdea;
use crate::utils::text::collapse_spaces;

/// 过短的查询没有检索价值
pub const MIN_QUERY_CHARS: usize = 10;
pub const MIN_QUERIES: usize = 5;
pub const MAX_QUERIES: usize = 7;
/// 参与查询生成的关键特性数
const MAX_FEATURE_QUERIES: usize = 2;

fn filled(value: &str) -> Option<&str> {
    let value = value.trim();
    (!value.is_empty()).then_some(value)
}

/// 由想法字段确定性地生成5到7条搜索查询
pub fn generate_queries(idea: &NormalizedIdea) -> Vec<String> {
    let title = filled(&idea.title);
    let industry = filled(&idea.industry);
    let audience = filled(&idea.target_audience);

    let mut primary = Vec::new();
    if let Some(title) = title {
        primary.push(format!("{} market size", title));
        primary.push(format!("{} competitors", title));
    }
    if let Some(industry) = industry {
        primary.push(format!("{} industry trends", industry));
        if let Some(audience) = audience {
            primary.push(format!("{} tools for {}", industry, audience));
        }
    }
    if let Some(title) = title {
        for feature in idea
            .key_features
            .iter()
            .filter_map(|f| filled(f))
            .take(MAX_FEATURE_QUERIES)
        {
            primary.push(format!("{} {}", title, feature));
        }
    }

    let mut fallback = Vec::new();
    if let Some(title) = title {
        fallback.push(format!("{} alternatives", title));
        fallback.push(format!("{} pricing models", title));
        fallback.push(format!("{} customer reviews", title));
    }
    if let Some(audience) = audience {
        fallback.push(format!("{} pain points", audience));
    }
    if let Some(industry) = industry {
        fallback.push(format!("{} startups funding", industry));
    }

    let mut seen = HashSet::new();
    let mut queries = Vec::new();
    let mut accept = |candidate: &str, queries: &mut Vec<String>| {
        let query = collapse_spaces(candidate);
        if query.chars().count() < MIN_QUERY_CHARS || !seen.insert(query.to_lowercase()) {
            return;
        }
        queries.push(query);
    };

    for candidate in &primary {
        accept(candidate, &mut queries);
    }
    for candidate in &fallback {
        if queries.len() >= MIN_QUERIES {
            break;
        }
        accept(candidate, &mut queries);
    }

    queries.truncate(MAX_QUERIES);
    queries
}

/// (idea_id, 排序后的查询) 的MD5指纹，与查询顺序无关
pub fn research_hash(idea_id: &str, queries: &[String]) -> String {
    let mut sorted = queries.to_vec();
    sorted.sort();

    let mut hasher = Md5::new();
    hasher.update(idea_id.as_bytes());
    for query in &sorted {
        hasher.update(b"\n");
        hasher.update(query.as_bytes());
    }
    format!("{:x}", hasher.finalize())
}
