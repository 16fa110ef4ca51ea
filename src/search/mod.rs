//! 搜索服务：把查询字符串转换为候选结果

use async_trait::async_trait;
use chrono::{DateTime, NaiveDate, NaiveDateTime, Utc};

use crate::error::TransportError;
use crate::types::SearchResult;

pub mod primary;
pub mod secondary;

pub use primary::ExaSearchProvider;
pub use secondary::BraveSearchProvider;

/// 单次搜索的可选参数
#[derive(Debug, Clone, Default)]
pub struct SearchOptions {
    /// 覆盖Provider默认的结果数
    pub num_results: Option<usize>,
    /// 只要该日期之后发布的内容
    pub start_published_date: Option<DateTime<Utc>>,
}

#[async_trait]
pub trait SearchProvider: Send + Sync {
    fn name(&self) -> &str;

    fn is_enabled(&self) -> bool;

    async fn search(
        &self,
        query: &str,
        options: &SearchOptions,
    ) -> Result<Vec<SearchResult>, TransportError>;
}

/// 尽力解析供应商返回的各种日期格式
pub(crate) fn parse_published_date(raw: &str) -> Option<DateTime<Utc>> {
    let raw = raw.trim();
    if raw.is_empty() {
        return None;
    }
    if let Ok(dt) = DateTime::parse_from_rfc3339(raw) {
        return Some(dt.with_timezone(&Utc));
    }
    if let Ok(dt) = NaiveDateTime::parse_from_str(raw, "%Y-%m-%dT%H:%M:%S%.f") {
        return Some(dt.and_utc());
    }
    NaiveDate::parse_from_str(raw, "%Y-%m-%d")
        .ok()
        .and_then(|d| d.and_hms_opt(0, 0, 0))
        .map(|dt| dt.and_utc())
}

/// 按结果位次给出 (0, 1] 区间的分数
pub(crate) fn positional_score(index: usize, total: usize) -> f64 {
    if total == 0 {
        return 0.0;
    }
    1.0 - index as f64 / total as f64
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Datelike;

    #[test]
    fn test_parse_published_date_formats() {
        let rfc = parse_published_date("2024-03-01T10:00:00.000Z").unwrap();
        assert_eq!(rfc.month(), 3);

        let naive = parse_published_date("2023-11-20T08:30:00").unwrap();
        assert_eq!(naive.day(), 20);

        let date = parse_published_date("2022-01-05").unwrap();
        assert_eq!(date.year(), 2022);

        assert!(parse_published_date("3 days ago").is_none());
        assert!(parse_published_date("").is_none());
    }

    #[test]
    fn test_positional_score() {
        assert_eq!(positional_score(0, 4), 1.0);
        assert_eq!(positional_score(2, 4), 0.5);
        assert_eq!(positional_score(0, 0), 0.0);
    }
}
