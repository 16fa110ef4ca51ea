//! 文档存储：ResearchPack、JobStatus与最终结果的持久化

use anyhow::Result;
use async_trait::async_trait;
use serde::{Serialize, de::DeserializeOwned};
use serde_json::Value;

pub mod file;
pub mod memory;

pub use file::FileStore;
pub use memory::MemoryStore;

/// 集合名
pub struct Collections;

impl Collections {
    pub const RESEARCH_PACKS: &'static str = "research_packs";
    pub const ANALYSIS_JOBS: &'static str = "analysis_jobs";
    pub const ANALYSIS_RESULTS: &'static str = "analysis_results";
}

/// 按集合组织的JSON文档存储，写入为整值覆盖
#[async_trait]
pub trait DocumentStore: Send + Sync {
    async fn put(&self, collection: &str, id: &str, document: Value) -> Result<()>;

    async fn get(&self, collection: &str, id: &str) -> Result<Option<Value>>;

    /// 顶层字段等于给定值的所有文档
    async fn find_by(&self, collection: &str, field: &str, value: &Value) -> Result<Vec<Value>>;
}

/// 带类型的便捷读写
pub async fn put_record<T: Serialize + Sync>(
    store: &dyn DocumentStore,
    collection: &str,
    id: &str,
    record: &T,
) -> Result<()> {
    let document = serde_json::to_value(record)?;
    store.put(collection, id, document).await
}

pub async fn get_record<T: DeserializeOwned>(
    store: &dyn DocumentStore,
    collection: &str,
    id: &str,
) -> Result<Option<T>> {
    match store.get(collection, id).await? {
        Some(document) => Ok(Some(serde_json::from_value(document)?)),
        None => Ok(None),
    }
}

pub(crate) fn field_matches(document: &Value, field: &str, value: &Value) -> bool {
    document.get(field).is_some_and(|v| v == value)
}
