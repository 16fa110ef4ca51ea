use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// 搜索结果的元数据
#[derive(Debug, Serialize, Deserialize, Clone, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct SearchMetadata {
    /// 去掉 `www.` 的主机名
    pub domain: String,
    /// 产生该结果的搜索Provider
    pub source: String,
    pub fetched_at: DateTime<Utc>,
    pub score: f64,
    #[serde(default)]
    pub published_date: Option<DateTime<Utc>>,
}

/// 搜索Provider返回的候选结果，不单独持久化
#[derive(Debug, Serialize, Deserialize, Clone, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct SearchResult {
    pub url: String,
    pub title: String,
    pub snippet: String,
    #[serde(default)]
    pub content: Option<String>,
    pub metadata: SearchMetadata,
}

#[derive(Debug, Serialize, Deserialize, Clone, PartialEq, Default)]
#[serde(rename_all = "camelCase")]
pub struct DocumentMetadata {
    pub domain: String,
    pub fetched_at: DateTime<Utc>,
    /// PDF页数
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub pages: Option<usize>,
    /// 被robots.txt禁止抓取
    #[serde(default)]
    pub blocked: bool,
    /// 抓取或解析失败
    #[serde(default)]
    pub error: bool,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub error_message: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub published_date: Option<DateTime<Utc>>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub content_type: Option<String>,
}

/// 抓取并清洗后的文档，创建后不再修改
#[derive(Debug, Serialize, Deserialize, Clone, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct Document {
    pub url: String,
    pub title: String,
    /// 规范化后的纯文本
    pub content: String,
    /// 正文摘要哈希，正文为空时为 None
    pub content_hash: Option<String>,
    pub metadata: DocumentMetadata,
}

impl Document {
    /// 抓取失败时返回的空文档
    pub fn failed(url: &str, domain: &str, message: impl Into<String>) -> Self {
        Self {
            url: url.to_string(),
            title: String::new(),
            content: String::new(),
            content_hash: None,
            metadata: DocumentMetadata {
                domain: domain.to_string(),
                fetched_at: Utc::now(),
                error: true,
                error_message: Some(message.into()),
                ..Default::default()
            },
        }
    }

    /// 被robots策略拦截的空文档
    pub fn blocked(url: &str, domain: &str) -> Self {
        Self {
            url: url.to_string(),
            title: String::new(),
            content: String::new(),
            content_hash: None,
            metadata: DocumentMetadata {
                domain: domain.to_string(),
                fetched_at: Utc::now(),
                blocked: true,
                ..Default::default()
            },
        }
    }

    /// 可参与去重与排序：未被拦截、未出错且有正文
    pub fn is_usable(&self) -> bool {
        !self.metadata.blocked && !self.metadata.error && !self.content.trim().is_empty()
    }
}

/// 带排序分数的文档
#[derive(Debug, Serialize, Deserialize, Clone, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct RankedDocument {
    #[serde(flatten)]
    pub document: Document,
    pub rank_score: f64,
}
