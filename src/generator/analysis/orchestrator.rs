use std::collections::BTreeMap;
use std::time::Instant;

use anyhow::Result;
use chrono::Utc;
use serde_json::json;
use tokio::sync::Mutex;

use super::agents::{
    CompetitorAnalyzer, FeasibilityAnalyzer, MarketAnalyzer, NodeNames, StrategySynthesizer,
    TamSamAnalyzer,
};
use super::context::{AnalysisInput, StrategyInput};
use super::node::{AnalysisNode, NodeRuntime, execute_node, prompt_version, validate_output};
use super::types::{FinalResult, NodeSummary};
use crate::cache::CacheKeys;
use crate::error::{NodeFailure, Phase, PipelineError};
use crate::events::{EventEmitter, EventNames};
use crate::generator::context::PipelineContext;
use crate::generator::research::ResearchOrchestrator;
use crate::store::{Collections, DocumentStore, get_record, put_record};
use crate::types::{JobError, JobState, JobStatus, NormalizedIdea, NodeResult};

/// 调研完成后的进度
const PROGRESS_AFTER_RESEARCH: u8 = 30;
/// 每个并行节点完成后增加的进度
const PROGRESS_PER_NODE: u8 = 10;
const PROGRESS_AFTER_STRATEGY: u8 = 90;

/// 任务状态的唯一写入方，每次变更后整值持久化
struct JobTracker<'a> {
    status: Mutex<JobStatus>,
    store: &'a dyn DocumentStore,
}

impl<'a> JobTracker<'a> {
    fn new(status: JobStatus, store: &'a dyn DocumentStore) -> Self {
        Self {
            status: Mutex::new(status),
            store,
        }
    }

    async fn update(&self, apply: impl FnOnce(&mut JobStatus)) {
        let mut status = self.status.lock().await;
        apply(&mut status);
        status.updated_at = Utc::now();
        // 状态持久化失败不影响分析本身
        if let Err(e) = put_record(self.store, Collections::ANALYSIS_JOBS, &status.id, &*status).await
        {
            tracing::warn!("⚠️ 任务状态写入失败 [{}]: {}", status.id, e);
        }
    }

    async fn record_node<T>(&self, node: &str, result: &NodeResult<T>) {
        self.update(|status| {
            status
                .per_node_timing
                .insert(node.to_string(), result.timing);
            status
                .per_node_attempts
                .insert(node.to_string(), result.attempts);
            status
                .per_node_cached
                .insert(node.to_string(), result.cached);
            if result.success {
                status.progress = status.progress.saturating_add(PROGRESS_PER_NODE).min(99);
                status.message = format!("{} analysis finished", node);
            }
        })
        .await;
    }

    async fn snapshot(&self) -> JobStatus {
        self.status.lock().await.clone()
    }
}

/// 一次分析运行中各节点共享的依赖
struct NodeScope<'a> {
    idea_id: &'a str,
    research_hash: &'a str,
    runtime: NodeRuntime<'a>,
    tracker: &'a JobTracker<'a>,
}

/// 分析编排器：调研 → 四个分析节点并行 → 策略综合
pub struct AnalysisOrchestrator {
    context: PipelineContext,
}

impl AnalysisOrchestrator {
    pub fn new(context: PipelineContext) -> Self {
        Self { context }
    }

    /// 为一个想法执行完整分析，任务状态写入 `analysis_jobs`，最终结果写入 `analysis_results`
    pub async fn run(
        &self,
        idea: &NormalizedIdea,
        idea_id: &str,
    ) -> Result<FinalResult, PipelineError> {
        let job_id = uuid::Uuid::new_v4().to_string();
        self.run_job(idea, idea_id, &job_id).await
    }

    /// 以指定的任务ID执行，便于调用方提前订阅任务状态
    pub async fn run_job(
        &self,
        idea: &NormalizedIdea,
        idea_id: &str,
        job_id: &str,
    ) -> Result<FinalResult, PipelineError> {
        let store = self.context.store.as_ref();
        let tracker = JobTracker::new(JobStatus::new(job_id, idea_id), store);
        let events = EventEmitter::new(self.context.events.clone(), idea_id);

        tracing::info!("🚀 开始分析任务 [{}] {}", job_id, idea.title);
        match self.execute(idea, idea_id, job_id, &tracker, &events).await {
            Ok(result) => Ok(result),
            Err(err) => {
                self.fail(&tracker, &events, &err).await;
                Err(err)
            }
        }
    }

    pub async fn job_status(&self, job_id: &str) -> Result<Option<JobStatus>> {
        get_record(self.context.store.as_ref(), Collections::ANALYSIS_JOBS, job_id).await
    }

    async fn execute(
        &self,
        idea: &NormalizedIdea,
        idea_id: &str,
        job_id: &str,
        tracker: &JobTracker<'_>,
        events: &EventEmitter,
    ) -> Result<FinalResult, PipelineError> {
        let config = &self.context.config;

        self.enter_phase(tracker, events, Phase::Research, 0, "Researching the idea")
            .await;
        let pack = ResearchOrchestrator::new(self.context.clone())
            .run(idea, idea_id, self.context.events.clone())
            .await
            .map_err(PipelineError::research)?;

        self.enter_phase(
            tracker,
            events,
            Phase::ParallelAnalysis,
            PROGRESS_AFTER_RESEARCH,
            "Running market, sizing, competitor and feasibility analyses",
        )
        .await;

        let research_hash = pack.research_hash.clone();
        let research_pack_id = pack.id.clone();
        let input = AnalysisInput {
            idea: idea.clone(),
            pack,
        };
        let scope = NodeScope {
            idea_id,
            research_hash: &research_hash,
            runtime: NodeRuntime {
                completion: self.context.completion.as_ref(),
                settings: &config.analysis,
                language: &config.target_language,
                events,
            },
            tracker,
        };

        let (market, tam_sam, competitor, feasibility) = tokio::join!(
            self.run_node(&MarketAnalyzer, &input, &scope),
            self.run_node(&TamSamAnalyzer, &input, &scope),
            self.run_node(&CompetitorAnalyzer, &input, &scope),
            self.run_node(&FeasibilityAnalyzer, &input, &scope),
        );
        let mut nodes = BTreeMap::new();
        let (market, tam_sam, competitor, feasibility) =
            gather(market, tam_sam, competitor, feasibility)
                .and_then(|(market, tam_sam, competitor, feasibility)| {
                    Ok((
                        settle(NodeNames::MARKET, market, &mut nodes)?,
                        settle(NodeNames::TAM_SAM, tam_sam, &mut nodes)?,
                        settle(NodeNames::COMPETITOR, competitor, &mut nodes)?,
                        settle(NodeNames::FEASIBILITY, feasibility, &mut nodes)?,
                    ))
                })
                .map_err(|failure| PipelineError::node(Phase::ParallelAnalysis, failure))?;

        self.enter_phase(
            tracker,
            events,
            Phase::Strategy,
            PROGRESS_AFTER_RESEARCH + PROGRESS_PER_NODE * NodeNames::PARALLEL.len() as u8,
            "Synthesizing strategy",
        )
        .await;

        let strategy_input = StrategyInput {
            idea: idea.clone(),
            market,
            tam_sam,
            competitor,
            feasibility,
        };
        let strategy = self
            .run_node(&StrategySynthesizer, &strategy_input, &scope)
            .await
            .and_then(|result| settle(NodeNames::STRATEGY, result, &mut nodes))
            .map_err(|failure| PipelineError::node(Phase::Strategy, failure))?;
        tracker
            .update(|status| status.progress = PROGRESS_AFTER_STRATEGY)
            .await;

        let StrategyInput {
            market,
            tam_sam,
            competitor,
            feasibility,
            ..
        } = strategy_input;

        let result = FinalResult {
            job_id: job_id.to_string(),
            idea_id: idea_id.to_string(),
            research_pack_id,
            research_hash,
            market,
            tam_sam,
            competitor,
            feasibility,
            strategy,
            nodes,
            completed_at: Utc::now(),
        };

        put_record(
            self.context.store.as_ref(),
            Collections::ANALYSIS_RESULTS,
            job_id,
            &result,
        )
        .await
        .map_err(|e| PipelineError::in_phase(Phase::Complete, e))?;

        let value = serde_json::to_value(&result).ok();
        tracker
            .update(|status| {
                status.status = JobState::Completed;
                status.step = Phase::Complete;
                status.progress = 100;
                status.message = "Analysis completed".to_string();
                status.result = value;
            })
            .await;
        events.emit(
            EventNames::PHASE_CHANGED,
            json!({ "jobId": job_id, "phase": Phase::Complete, "progress": 100 }),
        );
        events.emit(
            EventNames::ANALYSIS_COMPLETED,
            json!({
                "jobId": job_id,
                "verdict": result.strategy.verdict,
                "overallScore": result.strategy.overall_score,
            }),
        );
        tracing::info!(
            "✓ 分析完成 [{}]: {:?}，综合分 {:.0}",
            job_id,
            result.strategy.verdict,
            result.strategy.overall_score
        );

        Ok(result)
    }

    /// 先查节点缓存，未命中再调用模型；成功的输出按节点TTL写回缓存
    async fn run_node<N: AnalysisNode>(
        &self,
        node: &N,
        input: &N::Input,
        scope: &NodeScope<'_>,
    ) -> Result<NodeResult<N::Output>, NodeFailure> {
        let name = node.name();
        let events = scope.runtime.events;
        let settings = scope.runtime.settings;
        let mut version = prompt_version(node, &settings.prompt_version);
        if let Some(fingerprint) = node.input_fingerprint(input) {
            version = format!("{}-{}", version, fingerprint);
        }
        let cache_key = CacheKeys::node(scope.idea_id, name, scope.research_hash, &version);
        let started = Instant::now();

        if let Some(output) = self.cached_output(node, &cache_key).await {
            let result = NodeResult::succeeded(output, elapsed_ms(started), 0, true);
            scope.tracker.record_node(name, &result).await;
            events.emit(
                EventNames::NODE_CACHE_HIT,
                json!({ "node": name, "key": cache_key }),
            );
            tracing::info!("   ✅ [{}] 命中节点缓存", name);
            return Ok(result);
        }

        events.emit(
            EventNames::NODE_CACHE_MISS,
            json!({ "node": name, "key": cache_key }),
        );
        events.emit(
            EventNames::NODE_STARTED,
            json!({ "node": name, "promptVersion": version }),
        );
        tracing::info!("   🤖 [{}] 开始分析", name);

        match execute_node(node, input, &scope.runtime).await {
            Ok(retried) => {
                match serde_json::to_value(&retried.value) {
                    Ok(value) => {
                        if let Err(e) = self
                            .context
                            .cache
                            .set(&cache_key, value, settings.node_cache_ttl())
                            .await
                        {
                            tracing::warn!("⚠️ 节点缓存写入失败 [{}]: {}", cache_key, e);
                        }
                    }
                    Err(e) => tracing::warn!("⚠️ 节点输出序列化失败 [{}]: {}", name, e),
                }

                let result = NodeResult::succeeded(
                    retried.value,
                    elapsed_ms(started),
                    retried.attempts,
                    false,
                );
                scope.tracker.record_node(name, &result).await;

                events.emit(
                    EventNames::NODE_COMPLETED,
                    json!({
                        "node": name,
                        "attempts": result.attempts,
                        "timingMs": result.timing,
                    }),
                );
                tracing::info!(
                    "   ✓ [{}] 完成，{}次尝试，耗时{}ms",
                    name,
                    result.attempts,
                    result.timing
                );
                Ok(result)
            }
            Err(failure) => {
                let result: NodeResult<N::Output> =
                    NodeResult::failed(failure.to_string(), elapsed_ms(started), failure.attempts());
                scope.tracker.record_node(name, &result).await;
                events.emit(
                    EventNames::NODE_FAILED,
                    json!({
                        "node": name,
                        "attempts": result.attempts,
                        "error": result.error,
                    }),
                );
                tracing::error!("❌ [{}] 分析失败: {}", name, failure);
                Err(failure)
            }
        }
    }

    /// 缓存中的输出仍需通过当前的校验规则
    async fn cached_output<N: AnalysisNode>(&self, node: &N, key: &str) -> Option<N::Output> {
        let value = match self.context.cache.get(key).await {
            Ok(value) => value?,
            Err(e) => {
                tracing::warn!("⚠️ 读取节点缓存失败 [{}]: {}", key, e);
                return None;
            }
        };
        let output: N::Output = match serde_json::from_value(value) {
            Ok(output) => output,
            Err(e) => {
                tracing::warn!("⚠️ 节点缓存内容无法解析 [{}]: {}", key, e);
                return None;
            }
        };
        match validate_output(node, &output) {
            Ok(()) => Some(output),
            Err(e) => {
                tracing::warn!("⚠️ 节点缓存未通过校验 [{}]: {}", key, e);
                None
            }
        }
    }

    async fn enter_phase(
        &self,
        tracker: &JobTracker<'_>,
        events: &EventEmitter,
        phase: Phase,
        progress: u8,
        message: &str,
    ) {
        tracker
            .update(|status| {
                status.status = JobState::Running;
                status.step = phase;
                status.progress = status.progress.max(progress);
                status.message = message.to_string();
            })
            .await;
        let job_id = tracker.snapshot().await.id;
        events.emit(
            EventNames::PHASE_CHANGED,
            json!({ "jobId": job_id, "phase": phase, "progress": progress }),
        );
    }

    async fn fail(&self, tracker: &JobTracker<'_>, events: &EventEmitter, err: &PipelineError) {
        let message = err.to_string();
        tracker
            .update(|status| {
                status.status = JobState::Failed;
                status.step = Phase::Failed;
                status.message = message.clone();
                status.error = Some(JobError {
                    phase: err.phase,
                    node_name: err.node_name.clone(),
                    message: message.clone(),
                });
            })
            .await;
        let job_id = tracker.snapshot().await.id;
        events.emit(
            EventNames::PHASE_CHANGED,
            json!({ "jobId": job_id, "phase": Phase::Failed }),
        );
        events.emit(
            EventNames::ANALYSIS_FAILED,
            json!({
                "jobId": job_id,
                "phase": err.phase,
                "node": err.node_name,
                "error": message,
            }),
        );
        tracing::error!("❌ 分析任务失败 [{}]: {}", job_id, message);
    }
}

/// 按固定顺序合并并行结果，返回第一个失败的节点
fn gather<A, B, C, D>(
    market: Result<A, NodeFailure>,
    tam_sam: Result<B, NodeFailure>,
    competitor: Result<C, NodeFailure>,
    feasibility: Result<D, NodeFailure>,
) -> Result<(A, B, C, D), NodeFailure> {
    Ok((market?, tam_sam?, competitor?, feasibility?))
}

/// 取出成功节点的输出，执行统计记入 `nodes`
fn settle<T>(
    node: &str,
    result: NodeResult<T>,
    nodes: &mut BTreeMap<String, NodeSummary>,
) -> Result<T, NodeFailure> {
    nodes.insert(node.to_string(), NodeSummary::from(&result));
    result.data.ok_or_else(|| NodeFailure::MissingOutput {
        node: node.to_string(),
    })
}

fn elapsed_ms(started: Instant) -> u64 {
    started.elapsed().as_millis() as u64
}
