use crate::cache::CacheKeys;
use crate::config::Config;
use crate::generator::analysis::{AnalysisOrchestrator, FinalResult};
use crate::generator::context::PipelineContext;
use crate::llm::LLMClient;
use crate::types::NormalizedIdea;

use anyhow::{Context, Result};
use md5::{Digest, Md5};
use std::collections::HashMap;
use std::path::{Path, PathBuf};
use std::time::{Duration, Instant};

/// 时间跟踪作用域
pub struct TimingScope {
    start_time: Instant,
    phase_start_times: HashMap<String, Instant>,
    /// 按结束顺序记录
    phase_durations: Vec<(String, Duration)>,
}

impl Default for TimingScope {
    fn default() -> Self {
        Self::new()
    }
}

impl TimingScope {
    pub fn new() -> Self {
        Self {
            start_time: Instant::now(),
            phase_start_times: HashMap::new(),
            phase_durations: Vec::new(),
        }
    }

    /// 开始一个新的阶段计时
    pub fn start_phase(&mut self, phase_name: &str) {
        self.phase_start_times
            .insert(phase_name.to_string(), Instant::now());
    }

    /// 结束一个阶段的计时，未开始的阶段返回 None
    pub fn end_phase(&mut self, phase_name: &str) -> Option<Duration> {
        let start_time = self.phase_start_times.remove(phase_name)?;
        let duration = start_time.elapsed();
        self.phase_durations
            .push((phase_name.to_string(), duration));
        Some(duration)
    }

    pub fn total_duration(&self) -> Duration {
        self.start_time.elapsed()
    }

    pub fn phase_durations(&self) -> &[(String, Duration)] {
        &self.phase_durations
    }

    /// 获取格式化的执行时间报告
    pub fn generate_timing_report(&self) -> String {
        let mut report = format!(
            "总执行时间: {:.2}秒\n",
            self.total_duration().as_secs_f64()
        );

        if !self.phase_durations.is_empty() {
            report.push_str("各阶段执行时间:\n");
            for (phase, duration) in &self.phase_durations {
                report.push_str(&format!("- {}: {:.3}秒\n", phase, duration.as_secs_f64()));
            }
        }

        report
    }
}

/// 时间跟踪常量
pub struct TimingKeys;

impl TimingKeys {
    pub const CACHE_INVALIDATION: &'static str = "cache_invalidation";
    pub const ANALYSIS: &'static str = "analysis";
    pub const OUTPUT: &'static str = "output";
}

/// 一次分析请求：想法本身与其稳定标识
#[derive(Debug, Clone)]
pub struct AnalysisRequest {
    pub idea_id: String,
    pub idea: NormalizedIdea,
}

impl AnalysisRequest {
    /// 未指定idea_id时由标题推导，保证同一想法多次运行命中同一组缓存
    pub fn new(idea: NormalizedIdea, idea_id: Option<String>) -> Self {
        let idea_id = idea_id
            .filter(|id| !id.trim().is_empty())
            .unwrap_or_else(|| derive_idea_id(&idea));
        Self { idea_id, idea }
    }

    /// 从JSON文件读取规范化后的想法
    pub fn from_file(path: &Path, idea_id: Option<String>) -> Result<Self> {
        let content = std::fs::read_to_string(path)
            .with_context(|| format!("Failed to read idea file: {:?}", path))?;
        let idea: NormalizedIdea = serde_json::from_str(&content)
            .with_context(|| format!("Failed to parse idea file: {:?}", path))?;
        if idea.title.trim().is_empty() {
            anyhow::bail!("Idea file {:?} has an empty title", path);
        }
        Ok(Self::new(idea, idea_id))
    }
}

/// `idea-` + 规范化标题md5的前12位
pub fn derive_idea_id(idea: &NormalizedIdea) -> String {
    let normalized = idea
        .title
        .split_whitespace()
        .collect::<Vec<_>>()
        .join(" ")
        .to_lowercase();
    let digest = format!("{:x}", Md5::digest(normalized.as_bytes()));
    format!("idea-{}", &digest[..12])
}

/// 启动分析工作流
pub async fn launch(config: &Config, request: &AnalysisRequest) -> Result<FinalResult> {
    // 启动时检查模型连接
    LLMClient::new(config.llm.clone())?
        .check_connection()
        .await?;

    let context = PipelineContext::from_config(config.clone())?;
    execute(&context, request).await
}

/// 在给定依赖上执行工作流：按需清缓存 → 分析 → 写出结果
pub async fn execute(context: &PipelineContext, request: &AnalysisRequest) -> Result<FinalResult> {
    let config = &context.config;
    let mut timing = TimingScope::new();

    if config.force_regenerate {
        timing.start_phase(TimingKeys::CACHE_INVALIDATION);
        let removed = invalidate_idea_cache(context, &request.idea_id).await?;
        tracing::info!("🧹 已清除 {} 条缓存 [{}]", removed, request.idea_id);
        timing.end_phase(TimingKeys::CACHE_INVALIDATION);
    }

    timing.start_phase(TimingKeys::ANALYSIS);
    let result = AnalysisOrchestrator::new(context.clone())
        .run(&request.idea, &request.idea_id)
        .await?;
    timing.end_phase(TimingKeys::ANALYSIS);

    timing.start_phase(TimingKeys::OUTPUT);
    let path = save_result(&config.output_path, &result).await?;
    timing.end_phase(TimingKeys::OUTPUT);
    tracing::info!("💾 分析结果已写入 {}", path.display());

    tracing::info!("\n{}", timing.generate_timing_report());
    if let Some(report) = context.cache.performance_report() {
        report.log_summary();
    }

    Ok(result)
}

/// 清除某个idea的调研与节点缓存，返回删除数量
pub async fn invalidate_idea_cache(context: &PipelineContext, idea_id: &str) -> Result<usize> {
    let research = context
        .cache
        .invalidate(&CacheKeys::research_pattern(idea_id))
        .await?;
    let nodes = context
        .cache
        .invalidate(&CacheKeys::node_pattern(idea_id))
        .await?;
    Ok(research + nodes)
}

/// 写出 `<output>/<idea_id>.json`
pub async fn save_result(output_path: &Path, result: &FinalResult) -> Result<PathBuf> {
    tokio::fs::create_dir_all(output_path)
        .await
        .with_context(|| format!("Failed to create output directory: {:?}", output_path))?;

    let path = output_path.join(format!("{}.json", result.idea_id));
    let content = serde_json::to_string_pretty(result)?;
    tokio::fs::write(&path, content)
        .await
        .with_context(|| format!("Failed to write analysis result: {:?}", path))?;
    Ok(path)
}
