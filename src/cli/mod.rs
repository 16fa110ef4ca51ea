use crate::config::{CacheBackend, Config, LLMProvider};
use crate::generator::workflow::AnalysisRequest;
use crate::i18n::TargetLanguage;
use anyhow::{Result, anyhow};
use clap::Parser;
use std::path::PathBuf;

/// ideascope - 由Rust与AI驱动的商业想法调研与分析引擎
#[derive(Parser, Debug)]
#[command(name = "ideascope")]
#[command(
    about = "Research-and-analysis engine for business ideas. It searches the web for evidence, ranks it, and runs market, sizing, competitor and feasibility analyses that feed a final strategy recommendation."
)]
#[command(version)]
pub struct Args {
    /// 想法JSON文件路径
    #[arg(short, long)]
    pub idea: PathBuf,

    /// 想法ID，缺省时由标题推导
    #[arg(long)]
    pub idea_id: Option<String>,

    /// 输出路径
    #[arg(short, long)]
    pub output_path: Option<PathBuf>,

    /// 配置文件路径
    #[arg(short, long)]
    pub config: Option<PathBuf>,

    /// 是否启用详细日志
    #[arg(short, long)]
    pub verbose: bool,

    /// 高能效模型，用于常规分析节点
    #[arg(long)]
    pub model_efficient: Option<String>,

    /// 高质量模型，用于市场规模测算与策略综合
    #[arg(long)]
    pub model_powerful: Option<String>,

    /// LLM API基地址
    #[arg(long)]
    pub llm_api_base_url: Option<String>,

    /// LLM API KEY
    #[arg(long)]
    pub llm_api_key: Option<String>,

    /// LLM Provider (openai, moonshot, deepseek, openrouter, anthropic, ollama)
    #[arg(long)]
    pub llm_provider: Option<String>,

    /// 主搜索服务API KEY
    #[arg(long)]
    pub search_api_key: Option<String>,

    /// 启用辅助搜索服务
    #[arg(long)]
    pub secondary_search: bool,

    /// 目标语言 (zh, en, ja, ko, de, fr, ru)
    #[arg(long)]
    pub target_language: Option<String>,

    /// 节点失败后的最大重试次数
    #[arg(long)]
    pub max_retries: Option<u32>,

    /// 是否禁用缓存
    #[arg(long)]
    pub no_cache: bool,

    /// 使用内存缓存与内存存储，进程退出后不保留
    #[arg(long)]
    pub in_memory: bool,

    /// 强制重新生成（清除该想法的缓存）
    #[arg(long)]
    pub force_regenerate: bool,
}

impl Args {
    /// 将CLI参数转换为配置，CLI参数优先于配置文件
    pub fn into_config(&self) -> Result<Config> {
        let mut config = Config::load(self.config.as_deref())?;

        if let Some(output_path) = &self.output_path {
            config.output_path = output_path.clone();
        }

        // 覆盖LLM配置
        if let Some(provider_str) = &self.llm_provider {
            config.llm.provider = provider_str
                .parse::<LLMProvider>()
                .map_err(|e| anyhow!(e))?;
        }
        if let Some(llm_api_base_url) = &self.llm_api_base_url {
            config.llm.api_base_url = llm_api_base_url.clone();
        }
        if let Some(llm_api_key) = &self.llm_api_key {
            config.llm.api_key = llm_api_key.clone();
        }
        if let Some(model_efficient) = &self.model_efficient {
            config.llm.model_efficient = model_efficient.clone();
        }
        if let Some(model_powerful) = &self.model_powerful {
            config.llm.model_powerful = model_powerful.clone();
        }

        // 搜索配置
        if let Some(search_api_key) = &self.search_api_key {
            config.search.primary.api_key = search_api_key.clone();
        }
        if self.secondary_search {
            config.search.secondary.enabled = true;
        }

        // 目标语言配置
        if let Some(target_language_str) = &self.target_language {
            if let Ok(target_language) = target_language_str.parse::<TargetLanguage>() {
                config.target_language = target_language;
            } else {
                tracing::warn!(
                    "⚠️ 警告: 未知的目标语言: {}，使用默认语言 (English)",
                    target_language_str
                );
            }
        }

        if let Some(max_retries) = self.max_retries {
            config.analysis.max_retries = max_retries;
        }

        // 缓存与存储配置
        if self.no_cache {
            config.cache.enabled = false;
        }
        if self.in_memory {
            config.cache.backend = CacheBackend::Memory;
            config.store.backend = CacheBackend::Memory;
        }

        // 其他配置
        config.force_regenerate = self.force_regenerate;
        config.verbose = config.verbose || self.verbose;

        Ok(config)
    }

    /// 读取想法文件
    pub fn load_request(&self) -> Result<AnalysisRequest> {
        AnalysisRequest::from_file(&self.idea, self.idea_id.clone())
    }
}

// Include tests
#[cfg(test)]
mod tests;
