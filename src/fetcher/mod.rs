//! 网页抓取：robots检查、限流、正文提取

use async_trait::async_trait;
use chrono::Utc;
use reqwest::{Client, Response, header::CONTENT_TYPE, redirect::Policy};
use std::sync::Arc;
use std::time::Duration;
use url::Url;

use crate::config::FetcherConfig;
use crate::error::{PolicyError, TransportError};
use crate::types::{Document, DocumentMetadata};
use crate::utils::urls::domain_of;

pub mod extract;
pub mod rate_limit;
pub mod robots;

use extract::{ContentKind, Extracted, content_hash, detect_kind, extract_html, extract_pdf, finalize_text};
use rate_limit::RateLimiter;
use robots::RobotsCache;

/// 下载并清洗单个URL。普通的网络或解析失败不会返回错误，而是返回 `metadata.error` 为真的空文档。
#[async_trait]
pub trait DocumentFetcher: Send + Sync {
    async fn fetch_and_extract(&self, url: &str) -> Document;
}

pub struct ContentFetcher {
    client: Client,
    config: FetcherConfig,
    robots: RobotsCache,
    limiter: Arc<RateLimiter>,
}

impl ContentFetcher {
    pub fn new(config: &FetcherConfig) -> Result<Self, TransportError> {
        let client = Client::builder()
            .timeout(Duration::from_secs(config.timeout_seconds))
            .user_agent(config.user_agent.clone())
            .redirect(Policy::limited(config.max_redirects))
            .build()?;

        let limiter = Arc::new(RateLimiter::per_minute(
            config.max_concurrent,
            config.requests_per_minute,
        ));
        Ok(Self {
            robots: RobotsCache::new(
                client.clone(),
                Duration::from_secs(config.robots_cache_ttl_secs),
                limiter.clone(),
            ),
            limiter,
            client,
            config: config.clone(),
        })
    }

    async fn download(&self, url: &Url) -> Result<(Extracted, Option<String>), String> {
        let _permit = self
            .limiter
            .acquire()
            .await
            .map_err(|e| format!("rate limiter closed: {}", e))?;

        let response = self
            .client
            .get(url.clone())
            .send()
            .await
            .map_err(|e| TransportError::from(e).to_string())?;

        let status = response.status();
        if !status.is_success() {
            return Err(TransportError::Status {
                status: status.as_u16(),
                url: url.to_string(),
            }
            .to_string());
        }

        let content_type = response
            .headers()
            .get(CONTENT_TYPE)
            .and_then(|v| v.to_str().ok())
            .map(|s| s.to_string());

        let max_bytes = self.config.max_body_bytes;
        let extracted = match detect_kind(content_type.as_deref(), url) {
            ContentKind::Html => {
                let body = read_body(response, max_bytes).await?;
                extract_html(&String::from_utf8_lossy(&body))
            }
            ContentKind::PlainText => {
                let body = read_body(response, max_bytes).await?;
                Extracted {
                    text: String::from_utf8_lossy(&body).into_owned(),
                    ..Extracted::default()
                }
            }
            ContentKind::Pdf => {
                let body = read_body(response, max_bytes).await?;
                tokio::task::spawn_blocking(move || extract_pdf(&body))
                    .await
                    .map_err(|e| format!("PDF extraction aborted: {}", e))??
            }
            ContentKind::Unsupported(mime) => {
                return Err(format!("unsupported content type: {}", mime));
            }
        };

        Ok((extracted, content_type))
    }
}

/// 按块读取响应体，最多 `max_bytes` 字节；声明的长度超限时直接拒绝。
/// HTML与纯文本截断后仍可提取，PDF截断后会在解析时失败。
async fn read_body(mut response: Response, max_bytes: usize) -> Result<Vec<u8>, String> {
    if let Some(declared) = response.content_length()
        && declared > max_bytes as u64
    {
        return Err(format!(
            "response too large: {} bytes exceeds the {} byte limit",
            declared, max_bytes
        ));
    }

    let mut body = Vec::new();
    while let Some(chunk) = response.chunk().await.map_err(|e| e.to_string())? {
        let remaining = max_bytes.saturating_sub(body.len());
        if chunk.len() >= remaining {
            body.extend_from_slice(&chunk[..remaining]);
            tracing::debug!(url = %response.url(), max_bytes, "response body truncated");
            break;
        }
        body.extend_from_slice(&chunk);
    }
    Ok(body)
}

#[async_trait]
impl DocumentFetcher for ContentFetcher {
    async fn fetch_and_extract(&self, url: &str) -> Document {
        let parsed = match Url::parse(url.trim()) {
            Ok(parsed) if matches!(parsed.scheme(), "http" | "https") => parsed,
            _ => {
                let err = TransportError::InvalidUrl(url.to_string());
                tracing::debug!("{}", err);
                return Document::failed(url, "", err.to_string());
            }
        };
        let domain = domain_of(url).unwrap_or_default();

        if self.config.respect_robots
            && !self
                .robots
                .is_allowed(&parsed, &self.config.robots_agent)
                .await
        {
            let err = PolicyError {
                url: url.to_string(),
                agent: self.config.robots_agent.clone(),
            };
            tracing::info!("🚫 {}", err);
            return Document::blocked(url, &domain);
        }

        match self.download(&parsed).await {
            Ok((extracted, content_type)) => {
                let content = finalize_text(&extracted.text, self.config.max_content_chars);
                tracing::debug!(url, chars = content.chars().count(), "document extracted");
                Document {
                    url: url.to_string(),
                    title: extracted.title,
                    content_hash: content_hash(&content),
                    content,
                    metadata: DocumentMetadata {
                        domain,
                        fetched_at: Utc::now(),
                        pages: extracted.pages,
                        content_type: content_type
                            .and_then(|ct| ct.split(';').next().map(|m| m.trim().to_string())),
                        ..Default::default()
                    },
                }
            }
            Err(message) => {
                tracing::warn!("⚠️ 抓取失败 {}: {}", url, message);
                Document::failed(url, &domain, message)
            }
        }
    }
}
