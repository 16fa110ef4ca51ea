use async_trait::async_trait;
use chrono::{DateTime, Utc};
use reqwest::Client;
use serde::{Deserialize, Serialize};
use std::time::Duration;

use super::{SearchOptions, SearchProvider, parse_published_date, positional_score};
use crate::config::PrimarySearchConfig;
use crate::error::TransportError;
use crate::types::{SearchMetadata, SearchResult};
use crate::utils::retry::{RetryDecision, RetryPolicy, with_retry};
use crate::utils::text::{collapse_spaces, truncate_chars};
use crate::utils::urls::domain_of;

const PROVIDER_NAME: &str = "exa";
const SNIPPET_CHARS: usize = 300;
const CONTENT_CHARS: u32 = 4000;

#[derive(Serialize)]
#[serde(rename_all = "camelCase")]
struct ExaSearchRequest<'a> {
    query: &'a str,
    num_results: usize,
    #[serde(rename = "type")]
    search_type: &'a str,
    contents: ExaContents,
    #[serde(skip_serializing_if = "Option::is_none")]
    start_published_date: Option<String>,
}

#[derive(Serialize)]
#[serde(rename_all = "camelCase")]
struct ExaContents {
    text: ExaTextConfig,
}

#[derive(Serialize)]
#[serde(rename_all = "camelCase")]
struct ExaTextConfig {
    max_characters: u32,
}

#[derive(Deserialize)]
struct ExaSearchResponse {
    #[serde(default)]
    results: Vec<ExaResult>,
}

#[derive(Deserialize)]
#[serde(rename_all = "camelCase")]
struct ExaResult {
    url: String,
    #[serde(default)]
    title: Option<String>,
    #[serde(default)]
    text: Option<String>,
    #[serde(default)]
    published_date: Option<String>,
    #[serde(default)]
    score: Option<f64>,
}

/// 主搜索服务（Exa风格接口），失败会向上传播
pub struct ExaSearchProvider {
    client: Client,
    api_key: String,
    base_url: String,
    num_results: usize,
    retry_policy: RetryPolicy,
}

impl ExaSearchProvider {
    /// 缺少API KEY时直接报错
    pub fn new(config: &PrimarySearchConfig) -> Result<Self, TransportError> {
        if config.api_key.trim().is_empty() {
            return Err(TransportError::NotConfigured(
                "primary search provider requires an API key".to_string(),
            ));
        }

        let client = Client::builder()
            .timeout(Duration::from_secs(config.timeout_seconds))
            .build()?;

        Ok(Self {
            client,
            api_key: config.api_key.clone(),
            base_url: config.base_url.trim_end_matches('/').to_string(),
            num_results: config.num_results,
            retry_policy: RetryPolicy::exponential(
                config.max_attempts,
                Duration::from_millis(config.base_delay_ms),
                Duration::from_millis(config.max_delay_ms),
            ),
        })
    }

    async fn search_once(
        &self,
        query: &str,
        options: &SearchOptions,
    ) -> Result<Vec<SearchResult>, TransportError> {
        let url = format!("{}/search", self.base_url);
        let request = ExaSearchRequest {
            query,
            num_results: options.num_results.unwrap_or(self.num_results),
            search_type: "auto",
            contents: ExaContents {
                text: ExaTextConfig {
                    max_characters: CONTENT_CHARS,
                },
            },
            start_published_date: options.start_published_date.map(|d| d.to_rfc3339()),
        };

        let response = self
            .client
            .post(&url)
            .header("x-api-key", &self.api_key)
            .header("Content-Type", "application/json")
            .json(&request)
            .send()
            .await?;

        let status = response.status();
        if !status.is_success() {
            return Err(TransportError::Status {
                status: status.as_u16(),
                url,
            });
        }

        let body: ExaSearchResponse = response
            .json()
            .await
            .map_err(|e| TransportError::Decode(e.to_string()))?;

        Ok(normalize_results(body.results, Utc::now()))
    }
}

fn normalize_results(results: Vec<ExaResult>, fetched_at: DateTime<Utc>) -> Vec<SearchResult> {
    let total = results.len();
    results
        .into_iter()
        .enumerate()
        .filter_map(|(index, result)| {
            let domain = domain_of(&result.url)?;
            let text = result.text.unwrap_or_default();
            let snippet = collapse_spaces(truncate_chars(&text, SNIPPET_CHARS));
            Some(SearchResult {
                title: result
                    .title
                    .filter(|t| !t.trim().is_empty())
                    .unwrap_or_else(|| domain.clone()),
                snippet,
                content: (!text.trim().is_empty()).then_some(text),
                metadata: SearchMetadata {
                    domain,
                    source: PROVIDER_NAME.to_string(),
                    fetched_at,
                    score: result
                        .score
                        .unwrap_or_else(|| positional_score(index, total)),
                    published_date: result
                        .published_date
                        .as_deref()
                        .and_then(parse_published_date),
                },
                url: result.url,
            })
        })
        .collect()
}

#[async_trait]
impl SearchProvider for ExaSearchProvider {
    fn name(&self) -> &str {
        PROVIDER_NAME
    }

    fn is_enabled(&self) -> bool {
        true
    }

    async fn search(
        &self,
        query: &str,
        options: &SearchOptions,
    ) -> Result<Vec<SearchResult>, TransportError> {
        let outcome = with_retry(&self.retry_policy, move |attempt| async move {
            self.search_once(query, options).await.map_err(|e| {
                tracing::debug!(provider = PROVIDER_NAME, attempt, error = %e, "search attempt failed");
                if e.is_retryable() {
                    RetryDecision::Retryable(e)
                } else {
                    RetryDecision::Terminal(e)
                }
            })
        })
        .await;

        match outcome {
            Ok(retried) => Ok(retried.value),
            Err(e) => {
                tracing::error!(
                    "❌ 主搜索服务失败 ({} 次尝试): {}",
                    e.attempts(),
                    query
                );
                Err(e.into_error())
            }
        }
    }
}
