use async_trait::async_trait;
use chrono::Utc;
use reqwest::Client;
use serde::Deserialize;
use std::time::Duration;

use super::{SearchOptions, SearchProvider, parse_published_date, positional_score};
use crate::config::SecondarySearchConfig;
use crate::error::TransportError;
use crate::types::{SearchMetadata, SearchResult};
use crate::utils::text::collapse_spaces;
use crate::utils::urls::domain_of;

const PROVIDER_NAME: &str = "brave";

#[derive(Deserialize, Default)]
struct BraveSearchResponse {
    #[serde(default)]
    web: Option<BraveWebResults>,
}

#[derive(Deserialize, Default)]
struct BraveWebResults {
    #[serde(default)]
    results: Vec<BraveResult>,
}

#[derive(Deserialize)]
struct BraveResult {
    url: String,
    #[serde(default)]
    title: Option<String>,
    #[serde(default)]
    description: Option<String>,
    #[serde(default)]
    page_age: Option<String>,
}

/// 辅助搜索服务（Brave风格接口），未启用或出错时返回空列表
pub struct BraveSearchProvider {
    client: Client,
    config: SecondarySearchConfig,
}

impl BraveSearchProvider {
    pub fn new(config: &SecondarySearchConfig) -> Result<Self, TransportError> {
        let client = Client::builder()
            .timeout(Duration::from_secs(config.timeout_seconds))
            .build()?;
        Ok(Self {
            client,
            config: config.clone(),
        })
    }

    async fn search_once(
        &self,
        query: &str,
        options: &SearchOptions,
    ) -> Result<Vec<SearchResult>, TransportError> {
        let url = format!(
            "{}/res/v1/web/search",
            self.config.base_url.trim_end_matches('/')
        );
        let count = options
            .num_results
            .unwrap_or(self.config.num_results)
            .to_string();

        let response = self
            .client
            .get(&url)
            .query(&[("q", query), ("count", count.as_str())])
            .header("Accept", "application/json")
            .header("X-Subscription-Token", &self.config.api_key)
            .send()
            .await?;

        let status = response.status();
        if !status.is_success() {
            return Err(TransportError::Status {
                status: status.as_u16(),
                url,
            });
        }

        let body: BraveSearchResponse = response
            .json()
            .await
            .map_err(|e| TransportError::Decode(e.to_string()))?;

        let results = body.web.unwrap_or_default().results;
        let fetched_at = Utc::now();
        let total = results.len();

        Ok(results
            .into_iter()
            .enumerate()
            .filter_map(|(index, result)| {
                let domain = domain_of(&result.url)?;
                let snippet = collapse_spaces(&result.description.unwrap_or_default());
                Some(SearchResult {
                    title: result
                        .title
                        .filter(|t| !t.trim().is_empty())
                        .unwrap_or_else(|| domain.clone()),
                    snippet,
                    content: None,
                    metadata: SearchMetadata {
                        domain,
                        source: PROVIDER_NAME.to_string(),
                        fetched_at,
                        score: positional_score(index, total),
                        published_date: result.page_age.as_deref().and_then(parse_published_date),
                    },
                    url: result.url,
                })
            })
            .collect())
    }
}

#[async_trait]
impl SearchProvider for BraveSearchProvider {
    fn name(&self) -> &str {
        PROVIDER_NAME
    }

    fn is_enabled(&self) -> bool {
        self.config.enabled && !self.config.api_key.trim().is_empty()
    }

    async fn search(
        &self,
        query: &str,
        options: &SearchOptions,
    ) -> Result<Vec<SearchResult>, TransportError> {
        if !self.is_enabled() {
            return Ok(Vec::new());
        }

        match self.search_once(query, options).await {
            Ok(results) => Ok(results),
            Err(e) => {
                tracing::warn!("⚠️ 辅助搜索服务失败，忽略该结果 [{}]: {}", query, e);
                Ok(Vec::new())
            }
        }
    }
}
