use anyhow::{Context, Result};
use async_trait::async_trait;
use serde_json::Value;
use std::collections::HashMap;
use std::time::Duration;
use tokio::sync::RwLock;
use tokio::time::Instant;

use super::{CacheKeys, CachePerformanceMonitor, CachePerformanceReport, KvCache};

struct MemoryEntry {
    value: Value,
    /// 超出时钟范围的TTL视为永不过期
    expires_at: Option<Instant>,
}

impl MemoryEntry {
    fn is_live(&self, now: Instant) -> bool {
        self.expires_at.is_none_or(|at| at > now)
    }
}

/// 进程内缓存，测试与单次运行使用
#[derive(Default)]
pub struct MemoryCache {
    entries: RwLock<HashMap<String, MemoryEntry>>,
    performance_monitor: CachePerformanceMonitor,
}

impl MemoryCache {
    pub fn new() -> Self {
        Self::default()
    }

    /// 当前未过期的键，按字典序
    pub async fn keys(&self) -> Vec<String> {
        let now = Instant::now();
        let entries = self.entries.read().await;
        let mut keys: Vec<String> = entries
            .iter()
            .filter(|(_, entry)| entry.is_live(now))
            .map(|(key, _)| key.clone())
            .collect();
        keys.sort();
        keys
    }

    pub fn generate_performance_report(&self) -> CachePerformanceReport {
        self.performance_monitor.generate_report()
    }
}

#[async_trait]
impl KvCache for MemoryCache {
    fn performance_report(&self) -> Option<CachePerformanceReport> {
        Some(self.generate_performance_report())
    }

    async fn get(&self, key: &str) -> Result<Option<Value>> {
        let category = CacheKeys::category(key);
        let now = Instant::now();
        {
            let entries = self.entries.read().await;
            if let Some(entry) = entries.get(key)
                && entry.is_live(now)
            {
                self.performance_monitor.record_cache_hit(category);
                return Ok(Some(entry.value.clone()));
            }
        }

        // 顺带清理已过期的条目
        let mut entries = self.entries.write().await;
        if entries.get(key).is_some_and(|e| !e.is_live(now)) {
            entries.remove(key);
        }
        self.performance_monitor.record_cache_miss(category);
        Ok(None)
    }

    async fn set(&self, key: &str, value: Value, ttl: Duration) -> Result<()> {
        let entry = MemoryEntry {
            value,
            expires_at: Instant::now().checked_add(ttl),
        };
        self.entries.write().await.insert(key.to_string(), entry);
        self.performance_monitor
            .record_cache_write(CacheKeys::category(key));
        Ok(())
    }

    async fn invalidate(&self, pattern: &str) -> Result<usize> {
        let matcher = glob::Pattern::new(pattern)
            .with_context(|| format!("Invalid cache invalidation pattern: {}", pattern))?;

        let mut entries = self.entries.write().await;
        let before = entries.len();
        entries.retain(|key, _| !matcher.matches(key));
        let removed = before - entries.len();

        self.performance_monitor.record_invalidation(pattern, removed);
        Ok(removed)
    }
}
