//! 流水线错误分类
//!
//! 传输层与策略层错误在靠近来源处被吸收（单个URL、单个Provider），
//! 校验与编排层错误则一路向上传播给调用方。

use serde::{Deserialize, Serialize};
use thiserror::Error;

/// 搜索、抓取等网络调用失败
#[derive(Error, Debug)]
pub enum TransportError {
    #[error("HTTP request error: {0}")]
    Http(#[from] reqwest::Error),

    #[error("unexpected status {status} from {url}")]
    Status { status: u16, url: String },

    #[error("failed to decode response: {0}")]
    Decode(String),

    #[error("invalid url: {0}")]
    InvalidUrl(String),

    #[error("provider not configured: {0}")]
    NotConfigured(String),
}

impl TransportError {
    /// 是否值得按退避策略重试：网络层错误、429以及5xx
    pub fn is_retryable(&self) -> bool {
        match self {
            TransportError::Http(e) => e.is_timeout() || e.is_connect() || e.is_request(),
            TransportError::Status { status, .. } => *status == 429 || *status >= 500,
            TransportError::Decode(_)
            | TransportError::InvalidUrl(_)
            | TransportError::NotConfigured(_) => false,
        }
    }
}

/// robots.txt 禁止抓取
#[derive(Error, Debug, Clone, PartialEq, Eq)]
#[error("robots.txt disallows {url} for agent {agent}")]
pub struct PolicyError {
    pub url: String,
    pub agent: String,
}

/// LLM输出未通过结构化校验。解析失败与结构不符属于同一类错误，统一进入重试策略。
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum ValidationError {
    #[error("response is not valid JSON: {0}")]
    Parse(String),

    #[error("response does not match schema: {0}")]
    Schema(String),
}

/// 单个分析节点不可恢复的失败
#[derive(Error, Debug)]
pub enum NodeFailure {
    #[error("node {node} failed validation after {attempts} attempts: {last_error}")]
    Validation {
        node: String,
        attempts: u32,
        last_error: ValidationError,
    },

    #[error("node {node} timed out on all {attempts} attempts")]
    Timeout { node: String, attempts: u32 },

    #[error("node {node} completion call failed: {source}")]
    Completion {
        node: String,
        #[source]
        source: anyhow::Error,
    },

    #[error("node {node} reported success without an output")]
    MissingOutput { node: String },
}

impl NodeFailure {
    pub fn node(&self) -> &str {
        match self {
            NodeFailure::Validation { node, .. }
            | NodeFailure::Timeout { node, .. }
            | NodeFailure::Completion { node, .. }
            | NodeFailure::MissingOutput { node } => node,
        }
    }

    pub fn attempts(&self) -> u32 {
        match self {
            NodeFailure::Validation { attempts, .. } | NodeFailure::Timeout { attempts, .. } => {
                *attempts
            }
            NodeFailure::Completion { .. } => 1,
            NodeFailure::MissingOutput { .. } => 0,
        }
    }
}

/// 编排阶段
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Phase {
    Research,
    ParallelAnalysis,
    Strategy,
    Complete,
    Failed,
}

impl std::fmt::Display for Phase {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Phase::Research => write!(f, "research"),
            Phase::ParallelAnalysis => write!(f, "parallel_analysis"),
            Phase::Strategy => write!(f, "strategy"),
            Phase::Complete => write!(f, "complete"),
            Phase::Failed => write!(f, "failed"),
        }
    }
}

/// 调研或分析阶段的致命错误，携带失败阶段与节点名
#[derive(Error, Debug)]
#[error("pipeline failed during {phase}{}: {cause}", node_suffix(.node_name))]
pub struct PipelineError {
    pub phase: Phase,
    pub node_name: Option<String>,
    #[source]
    pub cause: anyhow::Error,
}

fn node_suffix(node_name: &Option<String>) -> String {
    node_name
        .as_ref()
        .map(|n| format!(" (node {})", n))
        .unwrap_or_default()
}

impl PipelineError {
    pub fn research(cause: anyhow::Error) -> Self {
        Self {
            phase: Phase::Research,
            node_name: None,
            cause,
        }
    }

    pub fn node(phase: Phase, failure: NodeFailure) -> Self {
        Self {
            phase,
            node_name: Some(failure.node().to_string()),
            cause: failure.into(),
        }
    }

    pub fn in_phase(phase: Phase, cause: anyhow::Error) -> Self {
        Self {
            phase,
            node_name: None,
            cause,
        }
    }
}
