use std::sync::Mutex;

use md5::{Digest, Md5};
use schemars::JsonSchema;
use serde::{Serialize, de::DeserializeOwned};
use serde_json::{Value, json};
use validator::Validate;

use crate::config::AnalysisConfig;
use crate::error::{NodeFailure, ValidationError};
use crate::events::{EventEmitter, EventNames};
use crate::i18n::TargetLanguage;
use crate::llm::{CompletionProvider, CompletionRequest, ModelTier};
use crate::utils::retry::{RetryDecision, RetryPolicy, Retried, with_retry};

/// 分析节点：声明prompt与输出类型，执行、校验与重试由 [`execute_node`] 统一处理
pub trait AnalysisNode: Send + Sync {
    /// 节点输入
    type Input: Sync;
    /// 节点输出，必须可生成JSON Schema并通过字段校验
    type Output: JsonSchema + DeserializeOwned + Serialize + Validate + Send + Sync + 'static;

    /// 节点名，用于缓存键、事件与任务状态
    fn name(&self) -> &'static str;

    fn model_tier(&self) -> ModelTier {
        ModelTier::Efficient
    }

    fn system_prompt(&self) -> String;

    fn build_user_prompt(&self, input: &Self::Input, settings: &AnalysisConfig) -> String;

    /// 跨字段约束检查
    fn post_validate(&self, _output: &Self::Output) -> Result<(), String> {
        Ok(())
    }

    /// 调研结果之外的输入指纹，参与节点缓存键
    fn input_fingerprint(&self, _input: &Self::Input) -> Option<String> {
        None
    }
}

/// 节点执行期间需要的外部依赖
pub struct NodeRuntime<'a> {
    pub completion: &'a dyn CompletionProvider,
    pub settings: &'a AnalysisConfig,
    pub language: &'a TargetLanguage,
    pub events: &'a EventEmitter,
}

pub fn output_schema<N: AnalysisNode + ?Sized>() -> Value {
    serde_json::to_value(schemars::schema_for!(N::Output)).unwrap_or_else(|_| json!({}))
}

/// prompt、schema与配置版本号的8位指纹，任一变化都会让旧的节点缓存失效
pub fn prompt_version<N: AnalysisNode + ?Sized>(node: &N, configured: &str) -> String {
    let mut hasher = Md5::new();
    hasher.update(configured.as_bytes());
    hasher.update(b"\n");
    hasher.update(node.system_prompt().as_bytes());
    hasher.update(b"\n");
    hasher.update(output_schema::<N>().to_string().as_bytes());
    let digest = format!("{:x}", hasher.finalize());
    digest[..8].to_string()
}

/// 去掉markdown代码块等包裹，取出最外层的JSON对象
pub fn extract_json_block(raw: &str) -> &str {
    let trimmed = raw.trim();
    match (trimmed.find('{'), trimmed.rfind('}')) {
        (Some(start), Some(end)) if start < end => &trimmed[start..=end],
        _ => trimmed,
    }
}

/// 解析并校验模型输出，解析失败与结构不符都归为 [`ValidationError`]
pub fn parse_output<N: AnalysisNode + ?Sized>(
    node: &N,
    raw: &str,
) -> Result<N::Output, ValidationError> {
    let output: N::Output = serde_json::from_str(extract_json_block(raw))
        .map_err(|e| ValidationError::Parse(e.to_string()))?;
    validate_output(node, &output)?;
    Ok(output)
}

pub fn validate_output<N: AnalysisNode + ?Sized>(
    node: &N,
    output: &N::Output,
) -> Result<(), ValidationError> {
    output
        .validate()
        .map_err(|e| ValidationError::Schema(e.to_string()))?;
    node.post_validate(output).map_err(ValidationError::Schema)
}

const JSON_ONLY_INSTRUCTION: &str = "Respond with a single JSON object that matches the provided schema. Do not wrap it in markdown and do not add commentary.";

/// 单次尝试的失败原因
enum AttemptError {
    Invalid(ValidationError),
    TimedOut,
    Transport(anyhow::Error),
}

fn retry_note(previous: &str) -> String {
    format!(
        "\n\n**Your previous answer was rejected**: {}\nReturn a corrected JSON object that satisfies every constraint of the schema.",
        previous
    )
}

/// 调用模型并校验输出。校验失败与超时按重试策略重试，并把上次的校验错误反馈给模型；
/// 补全服务的传输错误直接终止该节点。
pub async fn execute_node<N: AnalysisNode + ?Sized>(
    node: &N,
    input: &N::Input,
    runtime: &NodeRuntime<'_>,
) -> Result<Retried<N::Output>, NodeFailure> {
    let name = node.name();
    let schema = output_schema::<N>();
    let system_prompt = format!(
        "{}\n\n{}\n\n{}",
        node.system_prompt(),
        JSON_ONLY_INSTRUCTION,
        runtime.language.prompt_instruction()
    );
    let user_prompt = node.build_user_prompt(input, runtime.settings);
    let timeout = runtime.settings.node_timeout();
    let policy = RetryPolicy::immediate(runtime.settings.max_attempts());

    let last_error: Mutex<Option<String>> = Mutex::new(None);
    let last_error = &last_error;
    let (system_prompt, user_prompt, schema) = (&system_prompt, &user_prompt, &schema);

    let outcome = with_retry(&policy, move |attempt| async move {
        let previous = last_error.lock().ok().and_then(|guard| guard.clone());

        let mut prompt = user_prompt.clone();
        if let Some(previous) = &previous {
            runtime.events.emit(
                EventNames::NODE_RETRY,
                json!({ "node": name, "attempt": attempt, "error": previous }),
            );
            tracing::warn!("   🔁 [{}] 第{}次尝试，上次错误: {}", name, attempt, previous);
            prompt.push_str(&retry_note(previous));
        }

        let request = CompletionRequest {
            system_prompt: system_prompt.clone(),
            user_prompt: prompt,
            schema: schema.clone(),
            tier: node.model_tier(),
            tag: name.to_string(),
        };

        let remember = |message: String| {
            if let Ok(mut guard) = last_error.lock() {
                *guard = Some(message);
            }
        };

        match tokio::time::timeout(timeout, runtime.completion.complete(request)).await {
            Err(_) => {
                remember(format!("the call timed out after {}s", timeout.as_secs()));
                Err(RetryDecision::Retryable(AttemptError::TimedOut))
            }
            Ok(Err(e)) => Err(RetryDecision::Terminal(AttemptError::Transport(e))),
            Ok(Ok(raw)) => match parse_output(node, &raw) {
                Ok(output) => Ok(output),
                Err(e) => {
                    tracing::debug!("[{}] invalid output on attempt {}: {}", name, attempt, e);
                    remember(e.to_string());
                    Err(RetryDecision::Retryable(AttemptError::Invalid(e)))
                }
            },
        }
    })
    .await;

    outcome.map_err(|err| {
        let attempts = err.attempts();
        match err.into_error() {
            AttemptError::Invalid(last_error) => NodeFailure::Validation {
                node: name.to_string(),
                attempts,
                last_error,
            },
            AttemptError::TimedOut => NodeFailure::Timeout {
                node: name.to_string(),
                attempts,
            },
            AttemptError::Transport(source) => NodeFailure::Completion {
                node: name.to_string(),
                source,
            },
        }
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::events::RecordingEventSink;
    use anyhow::anyhow;
    use async_trait::async_trait;
    use serde::Deserialize;
    use std::sync::Arc;
    use std::sync::atomic::{AtomicU32, Ordering};
    use std::time::Duration;

    #[derive(Debug, Serialize, Deserialize, JsonSchema, Validate, PartialEq)]
    struct Scored {
        #[validate(range(min = 0.0, max = 100.0))]
        confidence: f64,
        low: u32,
        high: u32,
    }

    struct ScoredNode;

    impl AnalysisNode for ScoredNode {
        type Input = ();
        type Output = Scored;

        fn name(&self) -> &'static str {
            "scored"
        }

        fn system_prompt(&self) -> String {
            "Score things".to_string()
        }

        fn build_user_prompt(&self, _input: &(), _settings: &AnalysisConfig) -> String {
            "Please score".to_string()
        }

        fn post_validate(&self, output: &Scored) -> Result<(), String> {
            if output.low > output.high {
                return Err("low must not exceed high".to_string());
            }
            Ok(())
        }
    }

    /// 按顺序返回预设的响应
    struct ScriptedCompletion {
        responses: Vec<Result<String, String>>,
        calls: AtomicU32,
        delay: Duration,
        prompts: std::sync::Mutex<Vec<String>>,
    }

    impl ScriptedCompletion {
        fn new(responses: Vec<Result<&str, &str>>) -> Self {
            Self {
                responses: responses
                    .into_iter()
                    .map(|r| r.map(str::to_string).map_err(str::to_string))
                    .collect(),
                calls: AtomicU32::new(0),
                delay: Duration::ZERO,
                prompts: std::sync::Mutex::new(Vec::new()),
            }
        }
    }

    #[async_trait]
    impl CompletionProvider for ScriptedCompletion {
        async fn complete(&self, request: CompletionRequest) -> anyhow::Result<String> {
            let index = self.calls.fetch_add(1, Ordering::SeqCst) as usize;
            self.prompts.lock().unwrap().push(request.user_prompt);
            if !self.delay.is_zero() {
                tokio::time::sleep(self.delay).await;
            }
            match &self.responses[index.min(self.responses.len() - 1)] {
                Ok(text) => Ok(text.clone()),
                Err(message) => Err(anyhow!(message.clone())),
            }
        }
    }

    fn settings(max_retries: u32, timeout_seconds: u64) -> AnalysisConfig {
        AnalysisConfig {
            max_retries,
            node_timeout_seconds: timeout_seconds,
            ..AnalysisConfig::default()
        }
    }

    async fn run(
        completion: &ScriptedCompletion,
        settings: &AnalysisConfig,
        sink: &RecordingEventSink,
    ) -> Result<Retried<Scored>, NodeFailure> {
        let events = EventEmitter::new(Arc::new(sink.clone()), "idea-1");
        let language = TargetLanguage::English;
        let runtime = NodeRuntime {
            completion,
            settings,
            language: &language,
            events: &events,
        };
        execute_node(&ScoredNode, &(), &runtime).await
    }

    #[test]
    fn test_extract_json_block() {
        assert_eq!(extract_json_block("```json\n{\"a\": 1}\n```"), "{\"a\": 1}");
        assert_eq!(extract_json_block("Sure! {\"a\": {\"b\": 2}} done"), "{\"a\": {\"b\": 2}}");
        assert_eq!(extract_json_block("no json"), "no json");
    }

    #[test]
    fn test_parse_output_classifies_errors() {
        assert!(matches!(
            parse_output(&ScoredNode, "not json"),
            Err(ValidationError::Parse(_))
        ));
        assert!(matches!(
            parse_output(&ScoredNode, r#"{"confidence": 150, "low": 1, "high": 2}"#),
            Err(ValidationError::Schema(_))
        ));
        assert!(matches!(
            parse_output(&ScoredNode, r#"{"confidence": 50, "low": 3, "high": 2}"#),
            Err(ValidationError::Schema(message)) if message.contains("low must not exceed high")
        ));
        assert!(parse_output(&ScoredNode, r#"{"confidence": 50, "low": 1, "high": 2}"#).is_ok());
    }

    #[test]
    fn test_prompt_version_changes_with_configured_version() {
        let v1 = prompt_version(&ScoredNode, "v1");
        assert_eq!(v1.len(), 8);
        assert_eq!(v1, prompt_version(&ScoredNode, "v1"));
        assert_ne!(v1, prompt_version(&ScoredNode, "v2"));
    }

    #[tokio::test]
    async fn test_retries_invalid_output_with_feedback() {
        let completion = ScriptedCompletion::new(vec![
            Ok("garbage"),
            Ok(r#"{"confidence": 50, "low": 1, "high": 2}"#),
        ]);
        let sink = RecordingEventSink::new();

        let retried = run(&completion, &settings(2, 30), &sink).await.unwrap();
        assert_eq!(retried.attempts, 2);
        assert_eq!(retried.value.high, 2);

        let prompts = completion.prompts.lock().unwrap().clone();
        assert!(!prompts[0].contains("previous answer was rejected"));
        assert!(prompts[1].contains("previous answer was rejected"));
        assert_eq!(sink.named(EventNames::NODE_RETRY).len(), 1);
    }

    #[tokio::test]
    async fn test_validation_exhaustion_names_node() {
        let completion = ScriptedCompletion::new(vec![Ok(r#"{"confidence": 500, "low": 1, "high": 2}"#)]);
        let sink = RecordingEventSink::new();

        let failure = run(&completion, &settings(2, 30), &sink).await.unwrap_err();
        assert_eq!(failure.node(), "scored");
        assert_eq!(failure.attempts(), 3);
        assert!(matches!(failure, NodeFailure::Validation { .. }));
        assert_eq!(completion.calls.load(Ordering::SeqCst), 3);
    }

    #[tokio::test]
    async fn test_transport_error_is_not_retried() {
        let completion = ScriptedCompletion::new(vec![Err("connection reset")]);
        let sink = RecordingEventSink::new();

        let failure = run(&completion, &settings(2, 30), &sink).await.unwrap_err();
        assert!(matches!(failure, NodeFailure::Completion { .. }));
        assert_eq!(completion.calls.load(Ordering::SeqCst), 1);
    }

    #[tokio::test]
    async fn test_timeout_counts_as_failed_attempt() {
        let mut completion =
            ScriptedCompletion::new(vec![Ok(r#"{"confidence": 50, "low": 1, "high": 2}"#)]);
        completion.delay = Duration::from_millis(1500);
        let sink = RecordingEventSink::new();

        let failure = run(&completion, &settings(1, 1), &sink).await.unwrap_err();
        assert!(matches!(failure, NodeFailure::Timeout { attempts: 2, .. }));
    }
}
