//! 结构化补全服务接口

use anyhow::Result;
use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use serde_json::Value;

pub mod client;

pub use client::LLMClient;

/// 模型档位提示
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
#[serde(rename_all = "snake_case")]
pub enum ModelTier {
    /// 常规推理，失败时可升级到powerful
    #[default]
    Efficient,
    /// 复杂推理
    Powerful,
}

/// 一次结构化输出请求
#[derive(Debug, Clone)]
pub struct CompletionRequest {
    pub system_prompt: String,
    pub user_prompt: String,
    /// 期望输出的JSON Schema
    pub schema: Value,
    pub tier: ModelTier,
    /// 调用方标识（通常为节点名），用于日志与测试替身
    pub tag: String,
}

/// 补全服务：返回模型原始文本，由调用方解析与校验。传输失败时返回错误。
#[async_trait]
pub trait CompletionProvider: Send + Sync {
    async fn complete(&self, request: CompletionRequest) -> Result<String>;
}
