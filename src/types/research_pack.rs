use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::types::document::RankedDocument;

#[derive(Debug, Serialize, Deserialize, Clone, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct SourceRef {
    pub url: String,
    pub title: String,
    pub domain: String,
    pub fetched_at: DateTime<Utc>,
}

/// 从高分文档中提取的带数字的事实陈述
#[derive(Debug, Serialize, Deserialize, Clone, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct Fact {
    pub statement: String,
    pub source_url: String,
}

/// 调研过程统计
#[derive(Debug, Serialize, Deserialize, Clone, PartialEq, Default)]
#[serde(rename_all = "camelCase")]
pub struct ResearchMetrics {
    pub query_count: usize,
    pub search_result_count: usize,
    pub unique_url_count: usize,
    pub fetched_count: usize,
    pub blocked_count: usize,
    pub error_count: usize,
    pub duplicate_count: usize,
    pub document_count: usize,
    pub secondary_enabled: bool,
}

/// 一次调研产出的证据包，按 (idea, 查询集合) 写入一次，供所有分析节点读取
#[derive(Debug, Serialize, Deserialize, Clone, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct ResearchPack {
    pub id: String,
    pub idea_id: String,
    /// (idea_id, 排序后的查询) 的确定性指纹
    pub research_hash: String,
    pub queries: Vec<String>,
    pub sources: Vec<SourceRef>,
    pub documents: Vec<RankedDocument>,
    pub facts: Vec<Fact>,
    pub metrics: ResearchMetrics,
    pub assumptions: Vec<String>,
    /// 过期时间
    pub ttl: DateTime<Utc>,
    pub created_at: DateTime<Utc>,
}

impl ResearchPack {
    pub fn is_expired(&self, now: DateTime<Utc>) -> bool {
        now >= self.ttl
    }
}
