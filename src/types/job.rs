use std::collections::BTreeMap;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::error::Phase;

/// 单个分析节点一次调用的结果
#[derive(Debug, Serialize, Deserialize, Clone, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct NodeResult<T> {
    pub success: bool,
    pub data: Option<T>,
    /// 耗时（毫秒）
    pub timing: u64,
    pub attempts: u32,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
    /// 是否来自节点缓存
    #[serde(default)]
    pub cached: bool,
}

impl<T> NodeResult<T> {
    pub fn succeeded(data: T, timing: u64, attempts: u32, cached: bool) -> Self {
        Self {
            success: true,
            data: Some(data),
            timing,
            attempts,
            error: None,
            cached,
        }
    }

    pub fn failed(error: String, timing: u64, attempts: u32) -> Self {
        Self {
            success: false,
            data: None,
            timing,
            attempts,
            error: Some(error),
            cached: false,
        }
    }
}

#[derive(Debug, Serialize, Deserialize, Clone, Copy, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub enum JobState {
    Pending,
    Running,
    Completed,
    Failed,
}

#[derive(Debug, Serialize, Deserialize, Clone, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct JobError {
    pub phase: Phase,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub node_name: Option<String>,
    pub message: String,
}

/// 分析任务状态，随阶段推进增量更新并持久化
#[derive(Debug, Serialize, Deserialize, Clone, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct JobStatus {
    pub id: String,
    pub idea_id: String,
    pub status: JobState,
    pub step: Phase,
    /// 0–100
    pub progress: u8,
    pub message: String,
    pub per_node_timing: BTreeMap<String, u64>,
    pub per_node_attempts: BTreeMap<String, u32>,
    pub per_node_cached: BTreeMap<String, bool>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub error: Option<JobError>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub result: Option<Value>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl JobStatus {
    pub fn new(id: &str, idea_id: &str) -> Self {
        let now = Utc::now();
        Self {
            id: id.to_string(),
            idea_id: idea_id.to_string(),
            status: JobState::Pending,
            step: Phase::Research,
            progress: 0,
            message: String::new(),
            per_node_timing: BTreeMap::new(),
            per_node_attempts: BTreeMap::new(),
            per_node_cached: BTreeMap::new(),
            error: None,
            result: None,
            created_at: now,
            updated_at: now,
        }
    }

    pub fn is_terminal(&self) -> bool {
        matches!(self.status, JobState::Completed | JobState::Failed)
    }
}
