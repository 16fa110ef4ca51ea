//! URL规范化、文档去重与启发式排序

use std::collections::HashSet;

use chrono::{DateTime, Duration, Utc};
use url::Url;

use crate::types::{Document, RankedDocument};

/// 跟踪类查询参数，规范化时丢弃
const TRACKING_PARAMS: &[&str] = &[
    "gclid", "fbclid", "msclkid", "mc_cid", "mc_eid", "ref", "ref_src", "igshid", "_ga", "yclid",
];

/// 高可信来源
const HIGH_TRUST_DOMAINS: &[&str] = &[
    "statista.com",
    "gartner.com",
    "mckinsey.com",
    "forrester.com",
    "bloomberg.com",
    "reuters.com",
    "wsj.com",
    "ft.com",
    "economist.com",
    "hbr.org",
    "nature.com",
    "crunchbase.com",
    "cbinsights.com",
    "pitchbook.com",
    "grandviewresearch.com",
    "worldbank.org",
    "oecd.org",
];

/// 中等可信来源
const MID_TRUST_DOMAINS: &[&str] = &[
    "techcrunch.com",
    "forbes.com",
    "businessinsider.com",
    "cnbc.com",
    "theverge.com",
    "wired.com",
    "venturebeat.com",
    "nytimes.com",
    "wikipedia.org",
    "g2.com",
    "capterra.com",
    "producthunt.com",
    "news.ycombinator.com",
    "medium.com",
    "substack.com",
];

const QUERY_OVERLAP_POINTS: f64 = 5.0;

/// 规范化URL，使等价地址比较相等。无法解析的地址退化为去空白后的小写文本。
pub fn canonicalize_url(raw: &str) -> String {
    let trimmed = raw.trim();
    let Ok(parsed) = Url::parse(trimmed) else {
        return trimmed.to_lowercase();
    };
    let Some(host) = parsed.host_str() else {
        return trimmed.to_lowercase();
    };

    // Url::parse 已把scheme与host转为小写
    let host = host.strip_prefix("www.").unwrap_or(host);
    let mut canonical = format!("{}://{}", parsed.scheme(), host);
    // 默认端口在解析时已被丢弃
    if let Some(port) = parsed.port() {
        canonical.push_str(&format!(":{}", port));
    }

    let path = parsed.path().trim_end_matches('/');
    canonical.push_str(path);

    let mut params: Vec<(String, String)> = parsed
        .query_pairs()
        .filter(|(key, _)| !is_tracking_param(key))
        .map(|(key, value)| (key.into_owned(), value.into_owned()))
        .collect();
    if !params.is_empty() {
        params.sort();
        let query = url::form_urlencoded::Serializer::new(String::new())
            .extend_pairs(params)
            .finish();
        canonical.push('?');
        canonical.push_str(&query);
    }

    canonical
}

fn is_tracking_param(key: &str) -> bool {
    let key = key.to_lowercase();
    key.starts_with("utm_") || TRACKING_PARAMS.contains(&key.as_str())
}

/// 按规范化URL与正文哈希去重，保留首次出现的文档
pub fn deduplicate(documents: Vec<Document>) -> Vec<Document> {
    let mut seen_urls = HashSet::new();
    let mut seen_hashes = HashSet::new();

    documents
        .into_iter()
        .filter(|doc| {
            if !seen_urls.insert(canonicalize_url(&doc.url)) {
                return false;
            }
            match &doc.content_hash {
                Some(hash) => seen_hashes.insert(hash.clone()),
                None => true,
            }
        })
        .collect()
}

/// 时效分：按距今天数分档，未来日期按0天计
pub fn recency_score(date: Option<DateTime<Utc>>, now: DateTime<Utc>) -> f64 {
    let Some(date) = date else {
        return 0.0;
    };
    let age = (now - date).max(Duration::zero());

    if age < Duration::days(30) {
        10.0
    } else if age < Duration::days(90) {
        7.0
    } else if age < Duration::days(180) {
        5.0
    } else if age < Duration::days(365) {
        3.0
    } else {
        1.0
    }
}

fn matches_listed(domain: &str, listed: &str) -> bool {
    domain == listed || domain.ends_with(&format!(".{}", listed))
}

/// 来源权威分，子域名继承所属域名的档位
pub fn domain_authority_score(domain: &str) -> f64 {
    let domain = domain.trim().to_lowercase();
    let domain = domain.strip_prefix("www.").unwrap_or(&domain);

    if HIGH_TRUST_DOMAINS.iter().any(|d| matches_listed(domain, d)) {
        return 10.0;
    }
    if is_institutional(domain) {
        return 8.0;
    }
    if MID_TRUST_DOMAINS.iter().any(|d| matches_listed(domain, d)) {
        return 5.0;
    }
    3.0
}

/// `.gov`、`.edu`、`.gov.xx`、`.edu.xx` 与 `.ac.uk`
fn is_institutional(domain: &str) -> bool {
    let labels: Vec<&str> = domain.split('.').collect();
    let n = labels.len();
    if n < 2 {
        return false;
    }
    let tld = labels[n - 1];
    let second = labels[n - 2];

    matches!(tld, "gov" | "edu")
        || (n >= 3 && matches!(second, "gov" | "edu") && tld.len() == 2)
        || (n >= 3 && second == "ac" && tld == "uk")
}

/// 每个在正文中出现的不同查询加5分
pub fn query_overlap_score(content: &str, queries: &[String]) -> f64 {
    let content = content.to_lowercase();
    let distinct: HashSet<String> = queries
        .iter()
        .map(|q| q.trim().to_lowercase())
        .filter(|q| !q.is_empty())
        .collect();

    distinct.iter().filter(|q| content.contains(q.as_str())).count() as f64 * QUERY_OVERLAP_POINTS
}

pub fn score_document(doc: &Document, queries: &[String], now: DateTime<Utc>) -> f64 {
    let date = doc.metadata.published_date.or(Some(doc.metadata.fetched_at));
    recency_score(date, now)
        + domain_authority_score(&doc.metadata.domain)
        + query_overlap_score(&doc.content, queries)
}

pub fn rank(documents: Vec<Document>, queries: &[String]) -> Vec<RankedDocument> {
    rank_at(documents, queries, Utc::now())
}

/// 以给定时间为基准打分并降序排列，同分保持输入顺序
pub fn rank_at(
    documents: Vec<Document>,
    queries: &[String],
    now: DateTime<Utc>,
) -> Vec<RankedDocument> {
    let mut ranked: Vec<RankedDocument> = documents
        .into_iter()
        .map(|document| RankedDocument {
            rank_score: score_document(&document, queries, now),
            document,
        })
        .collect();

    // sort_by 是稳定排序
    ranked.sort_by(|a, b| b.rank_score.total_cmp(&a.rank_score));
    ranked
}
