//! LLM客户端 - 基于rig的结构化补全服务

use anyhow::Result;
use async_trait::async_trait;
use std::time::Duration;

use crate::config::LLMConfig;
use crate::llm::{CompletionProvider, CompletionRequest};
use crate::utils::retry::{RetryDecision, RetryPolicy, with_retry};

mod providers;
pub mod utils;

use providers::ProviderClient;
use utils::{compose_structured_preamble, evaluate_befitting_model};

/// LLM客户端
#[derive(Clone)]
pub struct LLMClient {
    config: LLMConfig,
    client: ProviderClient,
}

impl LLMClient {
    /// 创建新的LLM客户端
    pub fn new(config: LLMConfig) -> Result<Self> {
        let client = ProviderClient::new(&config)?;
        Ok(Self { client, config })
    }

    /// 检查模型连接和功能是否正常
    pub async fn check_connection(&self) -> Result<()> {
        tracing::info!("🔄 正在检查模型连接...");
        let agent = self.client.create_agent(
            &self.config.model_efficient,
            "You are a helpful assistant.",
            None,
            &self.config,
        );
        match agent.prompt("Hello").await {
            Ok(_) => {
                tracing::info!("✅ 模型连接正常");
                Ok(())
            }
            Err(e) => {
                tracing::error!("❌ 模型连接失败: {}", e);
                Err(e)
            }
        }
    }

    /// 传输层重试策略：指数退避 + 抖动
    fn transport_policy(&self) -> RetryPolicy {
        RetryPolicy::exponential(
            self.config.retry_attempts,
            Duration::from_millis(self.config.retry_delay_ms),
            Duration::from_millis(self.config.retry_delay_ms.saturating_mul(8)),
        )
    }

    /// 先用首选模型，传输重试耗尽后带着错误信息切换到兜底模型
    async fn prompt_with_fallover(
        &self,
        request: &CompletionRequest,
        preamble: &str,
        befitting_model: String,
        fallover_model: Option<String>,
    ) -> Result<String> {
        let tag = request.tag.as_str();
        let output_format = self.client.output_format(tag, &request.schema);
        let policy = self.transport_policy();
        let max_attempts = policy.max_attempts;
        let mut model = befitting_model;
        let mut fallover_model = fallover_model;
        let mut user_prompt = request.user_prompt.clone();

        loop {
            let agent =
                self.client
                    .create_agent(&model, preamble, output_format.clone(), &self.config);
            tracing::debug!(node = tag, model = %model, "calling completion model");

            let (agent, prompt) = (&agent, user_prompt.as_str());
            let outcome = with_retry(&policy, move |attempt| async move {
                agent.prompt(prompt).await.map_err(|err| {
                    tracing::warn!(
                        "❌ [{}] 调用模型服务出错 (第 {} / {}次尝试): {}",
                        tag,
                        attempt,
                        max_attempts,
                        err
                    );
                    RetryDecision::Retryable(err)
                })
            })
            .await;
            let e = match outcome {
                Ok(retried) => return Ok(retried.value),
                Err(err) => err.into_error(),
            };

            match fallover_model.take() {
                Some(next) => {
                    tracing::warn!(
                        "❌ [{}] 调用模型服务出错，尝试 {} 次均失败，尝试使用备选模型{}...{}",
                        tag,
                        max_attempts,
                        next,
                        e
                    );
                    user_prompt = format!(
                        "{}\n\n**Note** A previous attempt to answer this request failed with the error \"{}\". Avoid repeating it.",
                        user_prompt, e
                    );
                    model = next;
                }
                None => {
                    tracing::error!(
                        "❌ [{}] 调用模型服务出错，尝试 {} 次均失败...{}",
                        tag,
                        max_attempts,
                        e
                    );
                    return Err(e);
                }
            }
        }
    }
}

#[async_trait]
impl CompletionProvider for LLMClient {
    async fn complete(&self, request: CompletionRequest) -> Result<String> {
        let preamble = compose_structured_preamble(&request.system_prompt, &request.schema);
        let (befitting_model, fallover_model) = evaluate_befitting_model(
            &self.config,
            request.tier,
            &preamble,
            &request.user_prompt,
        );

        self.prompt_with_fallover(&request, &preamble, befitting_model, fallover_model)
            .await
    }
}
