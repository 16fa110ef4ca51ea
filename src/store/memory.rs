use anyhow::Result;
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use serde_json::Value;
use std::collections::{BTreeMap, HashMap};
use tokio::sync::RwLock;

use super::{DocumentStore, field_matches};

/// 存储元数据
#[derive(Debug, Clone)]
pub struct StoreMetadata {
    pub created_at: DateTime<Utc>,
    pub last_updated: DateTime<Utc>,
    pub data_sizes: HashMap<String, usize>,
    pub total_size: usize,
}

impl Default for StoreMetadata {
    fn default() -> Self {
        Self {
            created_at: Utc::now(),
            last_updated: Utc::now(),
            data_sizes: HashMap::new(),
            total_size: 0,
        }
    }
}

#[derive(Default)]
struct Inner {
    // 集合 -> (id -> 文档)，id有序使find_by结果稳定
    data: HashMap<String, BTreeMap<String, Value>>,
    metadata: StoreMetadata,
}

/// 进程内文档存储
#[derive(Default)]
pub struct MemoryStore {
    inner: RwLock<Inner>,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// 列出指定集合的所有id
    pub async fn list_ids(&self, collection: &str) -> Vec<String> {
        self.inner
            .read()
            .await
            .data
            .get(collection)
            .map(|docs| docs.keys().cloned().collect())
            .unwrap_or_default()
    }

    /// 每个集合占用的字节数
    pub async fn get_usage_stats(&self) -> HashMap<String, usize> {
        let inner = self.inner.read().await;
        let mut stats = HashMap::new();

        for (key, size) in &inner.metadata.data_sizes {
            let collection = key.split(':').next().unwrap_or("unknown").to_string();
            *stats.entry(collection).or_insert(0) += size;
        }

        stats
    }
}

#[async_trait]
impl DocumentStore for MemoryStore {
    async fn put(&self, collection: &str, id: &str, document: Value) -> Result<()> {
        let full_key = format!("{}:{}", collection, id);
        let data_size = document.to_string().len();

        let mut inner = self.inner.write().await;

        // 更新元数据
        if let Some(old_size) = inner.metadata.data_sizes.get(&full_key).copied() {
            inner.metadata.total_size -= old_size;
        }
        inner.metadata.data_sizes.insert(full_key, data_size);
        inner.metadata.total_size += data_size;
        inner.metadata.last_updated = Utc::now();

        inner
            .data
            .entry(collection.to_string())
            .or_default()
            .insert(id.to_string(), document);
        Ok(())
    }

    async fn get(&self, collection: &str, id: &str) -> Result<Option<Value>> {
        Ok(self
            .inner
            .read()
            .await
            .data
            .get(collection)
            .and_then(|docs| docs.get(id))
            .cloned())
    }

    async fn find_by(&self, collection: &str, field: &str, value: &Value) -> Result<Vec<Value>> {
        Ok(self
            .inner
            .read()
            .await
            .data
            .get(collection)
            .map(|docs| {
                docs.values()
                    .filter(|doc| field_matches(doc, field, value))
                    .cloned()
                    .collect()
            })
            .unwrap_or_default())
    }
}
