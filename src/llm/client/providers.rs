//! Provider客户端与结构化输出参数

use anyhow::Result;
use rig::{
    agent::{Agent, AgentBuilder},
    client::CompletionClient,
    completion::{CompletionModel, Prompt},
};
use serde_json::{Value, json};

use crate::config::{LLMConfig, LLMProvider};

/// Provider约束输出格式的方式
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StructuredOutput {
    /// `response_format: json_schema`，按schema约束输出
    JsonSchema,
    /// `response_format: json_object`，只保证返回JSON对象
    JsonObject,
    /// 无原生支持，schema只写在preamble中
    PromptOnly,
}

impl StructuredOutput {
    pub fn for_provider(provider: &LLMProvider) -> Self {
        match provider {
            LLMProvider::OpenAI | LLMProvider::OpenRouter => StructuredOutput::JsonSchema,
            LLMProvider::DeepSeek | LLMProvider::Moonshot => StructuredOutput::JsonObject,
            LLMProvider::Anthropic | LLMProvider::Ollama => StructuredOutput::PromptOnly,
        }
    }

    /// 附加到补全请求上的参数，`name` 为schema名（节点名）
    pub fn request_params(self, name: &str, schema: &Value) -> Option<Value> {
        match self {
            StructuredOutput::JsonSchema => Some(json!({
                "response_format": {
                    "type": "json_schema",
                    "json_schema": {
                        "name": schema_name(name),
                        "schema": schema,
                        // 字段校验在本地完成，schemars生成的schema不满足strict模式
                        "strict": false,
                    }
                }
            })),
            StructuredOutput::JsonObject => Some(json!({
                "response_format": { "type": "json_object" }
            })),
            StructuredOutput::PromptOnly => None,
        }
    }
}

/// schema名只允许字母数字、`_` 与 `-`
fn schema_name(name: &str) -> String {
    let cleaned: String = name
        .chars()
        .map(|c| if c.is_ascii_alphanumeric() || c == '-' { c } else { '_' })
        .collect();
    if cleaned.is_empty() {
        "analysis".to_string()
    } else {
        cleaned
    }
}

/// 统一的Provider客户端枚举
#[derive(Clone)]
pub enum ProviderClient {
    OpenAI(rig::providers::openai::Client),
    Moonshot(rig::providers::moonshot::Client),
    DeepSeek(rig::providers::deepseek::Client),
    OpenRouter(rig::providers::openrouter::Client),
    Anthropic(rig::providers::anthropic::Client),
    Ollama(rig::providers::ollama::Client),
}

impl ProviderClient {
    pub fn new(config: &LLMConfig) -> Result<Self> {
        let client = match config.provider {
            LLMProvider::OpenAI => ProviderClient::OpenAI(
                rig::providers::openai::Client::builder(&config.api_key)
                    .base_url(&config.api_base_url)
                    .build(),
            ),
            LLMProvider::Moonshot => ProviderClient::Moonshot(
                rig::providers::moonshot::Client::builder(&config.api_key)
                    .base_url(&config.api_base_url)
                    .build(),
            ),
            LLMProvider::DeepSeek => ProviderClient::DeepSeek(
                rig::providers::deepseek::Client::builder(&config.api_key)
                    .base_url(&config.api_base_url)
                    .build(),
            ),
            LLMProvider::OpenRouter => ProviderClient::OpenRouter(
                rig::providers::openrouter::Client::builder(&config.api_key).build(),
            ),
            LLMProvider::Anthropic => ProviderClient::Anthropic(
                rig::providers::anthropic::ClientBuilder::new(&config.api_key).build()?,
            ),
            LLMProvider::Ollama => {
                ProviderClient::Ollama(rig::providers::ollama::Client::builder().build())
            }
        };
        Ok(client)
    }

    pub fn provider(&self) -> LLMProvider {
        match self {
            ProviderClient::OpenAI(_) => LLMProvider::OpenAI,
            ProviderClient::Moonshot(_) => LLMProvider::Moonshot,
            ProviderClient::DeepSeek(_) => LLMProvider::DeepSeek,
            ProviderClient::OpenRouter(_) => LLMProvider::OpenRouter,
            ProviderClient::Anthropic(_) => LLMProvider::Anthropic,
            ProviderClient::Ollama(_) => LLMProvider::Ollama,
        }
    }

    /// 当前Provider下约束输出为 `schema` 所需的请求参数
    pub fn output_format(&self, name: &str, schema: &Value) -> Option<Value> {
        StructuredOutput::for_provider(&self.provider()).request_params(name, schema)
    }

    /// 创建不带工具的Agent，`output_format` 为 [`ProviderClient::output_format`] 的结果
    pub fn create_agent(
        &self,
        model: &str,
        preamble: &str,
        output_format: Option<Value>,
        config: &LLMConfig,
    ) -> ProviderAgent {
        match self {
            ProviderClient::OpenAI(client) => ProviderAgent::OpenAI(configure(
                client
                    .completion_model(model)
                    .completions_api()
                    .into_agent_builder(),
                preamble,
                output_format,
                config,
            )),
            ProviderClient::Moonshot(client) => ProviderAgent::Moonshot(configure(
                client.agent(model),
                preamble,
                output_format,
                config,
            )),
            ProviderClient::DeepSeek(client) => ProviderAgent::DeepSeek(configure(
                client.agent(model),
                preamble,
                output_format,
                config,
            )),
            ProviderClient::OpenRouter(client) => ProviderAgent::OpenRouter(configure(
                client.agent(model),
                preamble,
                output_format,
                config,
            )),
            ProviderClient::Anthropic(client) => ProviderAgent::Anthropic(configure(
                client.agent(model),
                preamble,
                output_format,
                config,
            )),
            ProviderClient::Ollama(client) => ProviderAgent::Ollama(configure(
                client.agent(model),
                preamble,
                output_format,
                config,
            )),
        }
    }
}

fn configure<M: CompletionModel>(
    builder: AgentBuilder<M>,
    preamble: &str,
    output_format: Option<Value>,
    config: &LLMConfig,
) -> Agent<M> {
    let builder = builder
        .preamble(preamble)
        .max_tokens(config.max_tokens.into())
        .temperature(config.temperature);
    match output_format {
        Some(params) => builder.additional_params(params).build(),
        None => builder.build(),
    }
}

/// 统一的Agent枚举
pub enum ProviderAgent {
    OpenAI(Agent<rig::providers::openai::CompletionModel>),
    OpenRouter(Agent<rig::providers::openrouter::CompletionModel>),
    Anthropic(Agent<rig::providers::anthropic::completion::CompletionModel>),
    Moonshot(Agent<rig::providers::moonshot::CompletionModel>),
    DeepSeek(Agent<rig::providers::deepseek::CompletionModel>),
    Ollama(Agent<rig::providers::ollama::CompletionModel<reqwest::Client>>),
}

impl ProviderAgent {
    pub async fn prompt(&self, prompt: &str) -> Result<String> {
        let text = match self {
            ProviderAgent::OpenAI(agent) => agent.prompt(prompt).await?,
            ProviderAgent::Moonshot(agent) => agent.prompt(prompt).await?,
            ProviderAgent::DeepSeek(agent) => agent.prompt(prompt).await?,
            ProviderAgent::OpenRouter(agent) => agent.prompt(prompt).await?,
            ProviderAgent::Anthropic(agent) => agent.prompt(prompt).await?,
            ProviderAgent::Ollama(agent) => agent.prompt(prompt).await?,
        };
        Ok(text)
    }
}
