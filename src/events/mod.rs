//! 生命周期事件
//!
//! 编排器通过显式传入的 [`EventSink`] 发布事件，外部的流式/轮询层订阅消费。

use std::sync::{Arc, Mutex};

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::Value;
use tokio::sync::broadcast;

/// 一条生命周期事件
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct PipelineEvent {
    pub name: String,
    pub idea_id: String,
    pub payload: Value,
    pub emitted_at: DateTime<Utc>,
}

impl PipelineEvent {
    pub fn new(name: &str, idea_id: &str, payload: Value) -> Self {
        Self {
            name: name.to_string(),
            idea_id: idea_id.to_string(),
            payload,
            emitted_at: Utc::now(),
        }
    }
}

/// 事件名常量
pub struct EventNames;

impl EventNames {
    pub const RESEARCH_STARTED: &'static str = "research:started";
    pub const QUERIES_GENERATED: &'static str = "research:queries_generated";
    pub const RESEARCH_CACHE_HIT: &'static str = "research:cache_hit";
    pub const RESEARCH_CACHE_MISS: &'static str = "research:cache_miss";
    pub const SEARCH_COMPLETED: &'static str = "research:search_completed";
    pub const SEARCH_FAILED: &'static str = "research:search_failed";
    pub const FETCH_COMPLETED: &'static str = "research:fetch_completed";
    pub const DEDUPE_COMPLETED: &'static str = "research:dedupe_completed";
    pub const RANKING_COMPLETED: &'static str = "research:ranking_completed";
    pub const PACK_ASSEMBLED: &'static str = "research:pack_assembled";
    pub const PACK_CACHED: &'static str = "research:pack_cached";

    pub const PHASE_CHANGED: &'static str = "analysis:phase_changed";
    pub const NODE_CACHE_HIT: &'static str = "node:cache_hit";
    pub const NODE_CACHE_MISS: &'static str = "node:cache_miss";
    pub const NODE_STARTED: &'static str = "node:started";
    pub const NODE_COMPLETED: &'static str = "node:completed";
    pub const NODE_RETRY: &'static str = "node:retry";
    pub const NODE_FAILED: &'static str = "node:failed";
    pub const ANALYSIS_COMPLETED: &'static str = "analysis:completed";
    pub const ANALYSIS_FAILED: &'static str = "analysis:failed";
}

/// 事件发布接口，发布必须是非阻塞的
pub trait EventSink: Send + Sync {
    fn emit(&self, event: PipelineEvent);
}

/// 以结构化日志形式输出事件
#[derive(Debug, Default, Clone)]
pub struct TracingEventSink;

impl EventSink for TracingEventSink {
    fn emit(&self, event: PipelineEvent) {
        tracing::debug!(
            event = %event.name,
            idea_id = %event.idea_id,
            payload = %event.payload,
            "pipeline event"
        );
    }
}

/// 基于broadcast通道的事件发布，供实时订阅方使用
#[derive(Debug, Clone)]
pub struct BroadcastEventSink {
    sender: broadcast::Sender<PipelineEvent>,
}

impl BroadcastEventSink {
    pub fn new(capacity: usize) -> Self {
        let (sender, _) = broadcast::channel(capacity.max(1));
        Self { sender }
    }

    pub fn subscribe(&self) -> broadcast::Receiver<PipelineEvent> {
        self.sender.subscribe()
    }
}

impl EventSink for BroadcastEventSink {
    fn emit(&self, event: PipelineEvent) {
        // 没有订阅者时发送失败是正常情况
        let _ = self.sender.send(event);
    }
}

/// 记录所有事件，便于检查事件顺序
#[derive(Debug, Default, Clone)]
pub struct RecordingEventSink {
    events: Arc<Mutex<Vec<PipelineEvent>>>,
}

impl RecordingEventSink {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn events(&self) -> Vec<PipelineEvent> {
        self.events.lock().map(|e| e.clone()).unwrap_or_default()
    }

    pub fn names(&self) -> Vec<String> {
        self.events().into_iter().map(|e| e.name).collect()
    }

    /// 指定名称的事件
    pub fn named(&self, name: &str) -> Vec<PipelineEvent> {
        self.events()
            .into_iter()
            .filter(|e| e.name == name)
            .collect()
    }
}

impl EventSink for RecordingEventSink {
    fn emit(&self, event: PipelineEvent) {
        if let Ok(mut events) = self.events.lock() {
            events.push(event);
        }
    }
}

/// 把事件同时转发给多个sink
#[derive(Default, Clone)]
pub struct FanoutEventSink {
    sinks: Vec<Arc<dyn EventSink>>,
}

impl FanoutEventSink {
    pub fn new(sinks: Vec<Arc<dyn EventSink>>) -> Self {
        Self { sinks }
    }
}

impl EventSink for FanoutEventSink {
    fn emit(&self, event: PipelineEvent) {
        for sink in &self.sinks {
            sink.emit(event.clone());
        }
    }
}

/// 与某个idea绑定的发布器，省去每次传idea_id
#[derive(Clone)]
pub struct EventEmitter {
    sink: Arc<dyn EventSink>,
    idea_id: String,
}

impl EventEmitter {
    pub fn new(sink: Arc<dyn EventSink>, idea_id: &str) -> Self {
        Self {
            sink,
            idea_id: idea_id.to_string(),
        }
    }

    pub fn emit(&self, name: &str, payload: Value) {
        self.sink
            .emit(PipelineEvent::new(name, &self.idea_id, payload));
    }
}
