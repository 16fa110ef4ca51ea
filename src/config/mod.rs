use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};
use std::fs::File;
use std::io::Read;
use std::path::{Path, PathBuf};
use std::time::Duration;

use crate::i18n::TargetLanguage;

pub const LLM_API_KEY_ENV: &str = "IDEASCOPE_LLM_API_KEY";
pub const SEARCH_API_KEY_ENV: &str = "IDEASCOPE_SEARCH_API_KEY";
pub const SECONDARY_SEARCH_API_KEY_ENV: &str = "IDEASCOPE_SECONDARY_SEARCH_API_KEY";

/// 默认配置文件名
pub const DEFAULT_CONFIG_FILE: &str = "ideascope.toml";

/// LLM Provider类型
#[derive(Debug, Deserialize, Serialize, Clone, PartialEq, Default)]
pub enum LLMProvider {
    #[serde(rename = "openai")]
    #[default]
    OpenAI,
    #[serde(rename = "moonshot")]
    Moonshot,
    #[serde(rename = "deepseek")]
    DeepSeek,
    #[serde(rename = "openrouter")]
    OpenRouter,
    #[serde(rename = "anthropic")]
    Anthropic,
    #[serde(rename = "ollama")]
    Ollama,
}

impl std::fmt::Display for LLMProvider {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            LLMProvider::OpenAI => write!(f, "openai"),
            LLMProvider::Moonshot => write!(f, "moonshot"),
            LLMProvider::DeepSeek => write!(f, "deepseek"),
            LLMProvider::OpenRouter => write!(f, "openrouter"),
            LLMProvider::Anthropic => write!(f, "anthropic"),
            LLMProvider::Ollama => write!(f, "ollama"),
        }
    }
}

impl std::str::FromStr for LLMProvider {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_lowercase().as_str() {
            "openai" => Ok(LLMProvider::OpenAI),
            "moonshot" => Ok(LLMProvider::Moonshot),
            "deepseek" => Ok(LLMProvider::DeepSeek),
            "openrouter" => Ok(LLMProvider::OpenRouter),
            "anthropic" => Ok(LLMProvider::Anthropic),
            "ollama" => Ok(LLMProvider::Ollama),
            _ => Err(format!("Unknown provider: {}", s)),
        }
    }
}

/// 应用程序配置
#[derive(Debug, Deserialize, Serialize, Clone)]
#[serde(default)]
pub struct Config {
    /// 最终结果输出路径
    pub output_path: PathBuf,

    /// 内部工作目录路径 (.ideascope)
    pub internal_path: PathBuf,

    /// 报告语言
    pub target_language: TargetLanguage,

    /// LLM模型配置
    pub llm: LLMConfig,

    /// 搜索服务配置
    pub search: SearchConfig,

    /// 网页抓取配置
    pub fetcher: FetcherConfig,

    /// 调研阶段配置
    pub research: ResearchConfig,

    /// 分析阶段配置
    pub analysis: AnalysisConfig,

    /// 缓存配置
    pub cache: CacheConfig,

    /// 文档存储配置
    pub store: StoreConfig,

    /// 运行前清除该idea的调研与节点缓存
    pub force_regenerate: bool,

    /// 是否启用详细日志
    pub verbose: bool,
}

/// LLM模型配置
#[derive(Debug, Deserialize, Serialize, Clone)]
#[serde(default)]
pub struct LLMConfig {
    /// LLM Provider类型
    pub provider: LLMProvider,

    /// LLM API KEY
    pub api_key: String,

    /// LLM API基地址
    pub api_base_url: String,

    /// 高能效模型，用于常规分析节点
    pub model_efficient: String,

    /// 高质量模型，用于策略综合，以及作为efficient失效情况下的兜底
    pub model_powerful: String,

    /// 最大tokens
    pub max_tokens: u32,

    /// 温度
    pub temperature: f64,

    /// 传输层重试次数
    pub retry_attempts: u32,

    /// 重试间隔（毫秒）
    pub retry_delay_ms: u64,
}

/// 搜索服务配置
#[derive(Debug, Deserialize, Serialize, Clone, Default)]
#[serde(default)]
pub struct SearchConfig {
    pub primary: PrimarySearchConfig,
    pub secondary: SecondarySearchConfig,
}

/// 主搜索服务（必需）
#[derive(Debug, Deserialize, Serialize, Clone)]
#[serde(default)]
pub struct PrimarySearchConfig {
    pub api_key: String,
    pub base_url: String,
    /// 每个查询返回的结果数
    pub num_results: usize,
    /// 最大尝试次数（含首次）
    pub max_attempts: u32,
    /// 退避基础间隔（毫秒）
    pub base_delay_ms: u64,
    /// 退避上限（毫秒）
    pub max_delay_ms: u64,
    pub timeout_seconds: u64,
}

/// 辅助搜索服务（可选）
#[derive(Debug, Deserialize, Serialize, Clone)]
#[serde(default)]
pub struct SecondarySearchConfig {
    pub enabled: bool,
    pub api_key: String,
    pub base_url: String,
    pub num_results: usize,
    pub timeout_seconds: u64,
}

/// 网页抓取配置
#[derive(Debug, Deserialize, Serialize, Clone)]
#[serde(default)]
pub struct FetcherConfig {
    /// 发起请求时使用的User-Agent
    pub user_agent: String,
    /// 匹配robots.txt分组时使用的agent标识
    pub robots_agent: String,
    pub respect_robots: bool,
    /// robots策略按host缓存的时长（秒）
    pub robots_cache_ttl_secs: u64,
    /// 每分钟最多请求数
    pub requests_per_minute: usize,
    /// 最大并发抓取数
    pub max_concurrent: usize,
    pub timeout_seconds: u64,
    pub max_redirects: usize,
    /// 正文最大字符数
    pub max_content_chars: usize,
    /// 响应体最多读取的字节数
    pub max_body_bytes: usize,
}

/// 调研阶段配置
#[derive(Debug, Deserialize, Serialize, Clone)]
#[serde(default)]
pub struct ResearchConfig {
    /// 抓取的URL上限
    pub max_urls: usize,
    /// 并发执行的查询数
    pub query_concurrency: usize,
    /// ResearchPack缓存有效期（小时）
    pub pack_ttl_hours: u64,
    /// 写入ResearchPack时每篇文档保留的字符数
    pub pack_document_chars: usize,
    pub max_facts: usize,
}

/// 分析阶段配置
#[derive(Debug, Deserialize, Serialize, Clone)]
#[serde(default)]
pub struct AnalysisConfig {
    /// 校验失败后的重试次数，不含首次
    pub max_retries: u32,
    /// 单次模型调用超时（秒）
    pub node_timeout_seconds: u64,
    /// 节点结果缓存有效期（小时）
    pub node_cache_ttl_hours: u64,
    /// 构建节点上下文时使用的文档数
    pub context_documents: usize,
    /// 每篇文档截取的字符数
    pub context_chars_per_document: usize,
    /// prompt版本号，参与节点缓存键计算
    pub prompt_version: String,
}

/// 缓存后端
#[derive(Debug, Deserialize, Serialize, Clone, PartialEq, Default)]
pub enum CacheBackend {
    #[serde(rename = "file")]
    #[default]
    File,
    #[serde(rename = "memory")]
    Memory,
}

/// 缓存配置
#[derive(Debug, Deserialize, Serialize, Clone)]
#[serde(default)]
pub struct CacheConfig {
    /// 是否启用缓存
    pub enabled: bool,

    pub backend: CacheBackend,

    /// 缓存目录
    pub cache_dir: PathBuf,
}

/// 文档存储配置
#[derive(Debug, Deserialize, Serialize, Clone)]
#[serde(default)]
pub struct StoreConfig {
    pub backend: CacheBackend,
    pub store_dir: PathBuf,
}

impl Config {
    /// 从文件加载配置
    pub fn from_file(path: &Path) -> Result<Self> {
        let mut file =
            File::open(path).context(format!("Failed to open config file: {:?}", path))?;
        let mut content = String::new();
        file.read_to_string(&mut content)
            .context("Failed to read config file")?;

        let mut config: Config =
            toml::from_str(&content).context("Failed to parse config file")?;
        config.fill_keys_from_env();
        Ok(config)
    }

    /// 显式路径优先，其次当前目录下的 ideascope.toml，都没有则使用默认配置
    pub fn load(path: Option<&Path>) -> Result<Self> {
        if let Some(path) = path {
            return Self::from_file(path);
        }

        let default_config_path = std::env::current_dir()
            .unwrap_or_else(|_| PathBuf::from("."))
            .join(DEFAULT_CONFIG_FILE);

        if default_config_path.exists() {
            Self::from_file(&default_config_path)
        } else {
            Ok(Config::default())
        }
    }

    /// 配置文件中留空的API KEY从环境变量补齐
    pub fn fill_keys_from_env(&mut self) {
        fill_from_env(&mut self.llm.api_key, LLM_API_KEY_ENV);
        fill_from_env(&mut self.search.primary.api_key, SEARCH_API_KEY_ENV);
        fill_from_env(
            &mut self.search.secondary.api_key,
            SECONDARY_SEARCH_API_KEY_ENV,
        );
    }
}

fn fill_from_env(value: &mut String, var: &str) {
    if value.trim().is_empty()
        && let Ok(from_env) = std::env::var(var)
    {
        *value = from_env;
    }
}

impl ResearchConfig {
    pub fn pack_ttl(&self) -> Duration {
        Duration::from_secs(self.pack_ttl_hours.saturating_mul(3600))
    }
}

impl AnalysisConfig {
    pub fn node_timeout(&self) -> Duration {
        Duration::from_secs(self.node_timeout_seconds)
    }

    pub fn node_cache_ttl(&self) -> Duration {
        Duration::from_secs(self.node_cache_ttl_hours.saturating_mul(3600))
    }

    /// 含首次在内的总尝试次数
    pub fn max_attempts(&self) -> u32 {
        self.max_retries + 1
    }
}

impl Default for Config {
    fn default() -> Self {
        Self {
            output_path: PathBuf::from("./ideascope.reports"),
            internal_path: PathBuf::from("./.ideascope"),
            target_language: TargetLanguage::default(),
            llm: LLMConfig::default(),
            search: SearchConfig::default(),
            fetcher: FetcherConfig::default(),
            research: ResearchConfig::default(),
            analysis: AnalysisConfig::default(),
            cache: CacheConfig::default(),
            store: StoreConfig::default(),
            force_regenerate: false,
            verbose: false,
        }
    }
}

impl Default for LLMConfig {
    fn default() -> Self {
        Self {
            provider: LLMProvider::default(),
            api_key: std::env::var(LLM_API_KEY_ENV).unwrap_or_default(),
            api_base_url: String::from("https://api.openai.com/v1"),
            model_efficient: String::from("gpt-4o-mini"),
            model_powerful: String::from("gpt-4o"),
            max_tokens: 8192,
            temperature: 0.2,
            retry_attempts: 3,
            retry_delay_ms: 2000,
        }
    }
}

impl Default for PrimarySearchConfig {
    fn default() -> Self {
        Self {
            api_key: std::env::var(SEARCH_API_KEY_ENV).unwrap_or_default(),
            base_url: String::from("https://api.exa.ai"),
            num_results: 10,
            max_attempts: 3,
            base_delay_ms: 500,
            max_delay_ms: 8000,
            timeout_seconds: 20,
        }
    }
}

impl Default for SecondarySearchConfig {
    fn default() -> Self {
        Self {
            enabled: false,
            api_key: std::env::var(SECONDARY_SEARCH_API_KEY_ENV).unwrap_or_default(),
            base_url: String::from("https://api.search.brave.com"),
            num_results: 10,
            timeout_seconds: 15,
        }
    }
}

impl Default for FetcherConfig {
    fn default() -> Self {
        Self {
            user_agent: format!("ideascope/{}", env!("CARGO_PKG_VERSION")),
            robots_agent: String::from("ideascope"),
            respect_robots: true,
            robots_cache_ttl_secs: 3600,
            requests_per_minute: 60,
            max_concurrent: 5,
            timeout_seconds: 15,
            max_redirects: 5,
            max_content_chars: 50_000,
            max_body_bytes: 10 * 1024 * 1024,
        }
    }
}

impl Default for ResearchConfig {
    fn default() -> Self {
        Self {
            max_urls: 20,
            query_concurrency: 3,
            pack_ttl_hours: 24 * 7,
            pack_document_chars: 10_000,
            max_facts: 20,
        }
    }
}

impl Default for AnalysisConfig {
    fn default() -> Self {
        Self {
            max_retries: 2,
            node_timeout_seconds: 120,
            node_cache_ttl_hours: 24 * 7,
            context_documents: 8,
            context_chars_per_document: 2500,
            prompt_version: String::from("v1"),
        }
    }
}

impl Default for CacheConfig {
    fn default() -> Self {
        Self {
            enabled: true,
            backend: CacheBackend::default(),
            cache_dir: PathBuf::from(".ideascope/cache"),
        }
    }
}

impl Default for StoreConfig {
    fn default() -> Self {
        Self {
            backend: CacheBackend::default(),
            store_dir: PathBuf::from(".ideascope/store"),
        }
    }
}

// Include tests
#[cfg(test)]
mod tests;
