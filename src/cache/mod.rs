use anyhow::{Context, Result};
use async_trait::async_trait;
use md5::{Digest, Md5};
use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::path::{Path, PathBuf};
use std::time::{Duration, SystemTime, UNIX_EPOCH};
use tokio::fs;

use crate::config::CacheConfig;

pub mod memory;
pub mod performance_monitor;
pub use memory::MemoryCache;
pub use performance_monitor::{CachePerformanceMonitor, CachePerformanceReport};

/// 带TTL的键值缓存
#[async_trait]
pub trait KvCache: Send + Sync {
    async fn get(&self, key: &str) -> Result<Option<Value>>;

    /// 整值覆盖写入
    async fn set(&self, key: &str, value: Value, ttl: Duration) -> Result<()>;

    /// 删除所有匹配glob模式的键，返回删除数量
    async fn invalidate(&self, pattern: &str) -> Result<usize>;

    /// 命中率统计，不统计的实现返回 None
    fn performance_report(&self) -> Option<CachePerformanceReport> {
        None
    }
}

/// 缓存键的构造规则，两个键空间互不重叠
pub struct CacheKeys;

impl CacheKeys {
    pub const RESEARCH: &'static str = "research";
    pub const NODE: &'static str = "node";

    /// 整个ResearchPack
    pub fn research(idea_id: &str, research_hash: &str) -> String {
        format!("{}:{}:{}", Self::RESEARCH, idea_id, research_hash)
    }

    /// 单个节点经过校验的输出，prompt_version 使prompt或schema变更后旧缓存失效
    pub fn node(idea_id: &str, node_name: &str, research_hash: &str, prompt_version: &str) -> String {
        format!(
            "{}:{}:{}:{}:{}",
            Self::NODE,
            idea_id,
            node_name,
            research_hash,
            prompt_version
        )
    }

    /// 某个idea的全部调研缓存
    pub fn research_pattern(idea_id: &str) -> String {
        format!("{}:{}:*", Self::RESEARCH, idea_id)
    }

    /// 某个idea的全部节点缓存
    pub fn node_pattern(idea_id: &str) -> String {
        format!("{}:{}:*", Self::NODE, idea_id)
    }

    /// 键所属的类别，用于分目录存储与统计
    pub fn category(key: &str) -> &str {
        match key.split(':').next() {
            Some(Self::RESEARCH) => Self::RESEARCH,
            Some(Self::NODE) => Self::NODE,
            _ => "other",
        }
    }
}

/// 基于文件的缓存管理器
pub struct CacheManager {
    config: CacheConfig,
    performance_monitor: CachePerformanceMonitor,
}

/// 缓存条目
#[derive(Debug, Serialize, Deserialize)]
pub struct CacheEntry {
    pub key: String,
    pub data: Value,
    /// 写入时间（秒）
    pub timestamp: u64,
    /// 过期时间（秒）
    pub expires_at: u64,
}

fn now_secs() -> u64 {
    SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .map(|d| d.as_secs())
        .unwrap_or_default()
}

impl CacheManager {
    pub fn new(config: CacheConfig) -> Self {
        Self {
            config,
            performance_monitor: CachePerformanceMonitor::new(),
        }
    }

    /// 生成键的MD5哈希，作为文件名
    pub fn hash_key(&self, key: &str) -> String {
        let mut hasher = Md5::new();
        hasher.update(key.as_bytes());
        format!("{:x}", hasher.finalize())
    }

    /// 获取缓存文件路径
    fn get_cache_path(&self, key: &str) -> PathBuf {
        self.config
            .cache_dir
            .join(CacheKeys::category(key))
            .join(format!("{}.json", self.hash_key(key)))
    }

    /// 检查缓存是否过期
    fn is_expired(&self, entry: &CacheEntry) -> bool {
        now_secs() >= entry.expires_at
    }

    async fn read_entry(path: &Path) -> Result<CacheEntry> {
        let content = fs::read_to_string(path).await?;
        Ok(serde_json::from_str::<CacheEntry>(&content)?)
    }

    /// 生成性能报告
    pub fn generate_performance_report(&self) -> CachePerformanceReport {
        self.performance_monitor.generate_report()
    }
}

#[async_trait]
impl KvCache for CacheManager {
    fn performance_report(&self) -> Option<CachePerformanceReport> {
        Some(self.generate_performance_report())
    }

    async fn get(&self, key: &str) -> Result<Option<Value>> {
        if !self.config.enabled {
            return Ok(None);
        }

        let category = CacheKeys::category(key);
        let cache_path = self.get_cache_path(key);

        if !cache_path.exists() {
            self.performance_monitor.record_cache_miss(category);
            return Ok(None);
        }

        match Self::read_entry(&cache_path).await {
            Ok(entry) => {
                if entry.key != key || self.is_expired(&entry) {
                    // 删除过期缓存
                    let _ = fs::remove_file(&cache_path).await;
                    self.performance_monitor.record_cache_miss(category);
                    return Ok(None);
                }
                self.performance_monitor.record_cache_hit(category);
                Ok(Some(entry.data))
            }
            Err(e) => {
                self.performance_monitor
                    .record_cache_error(category, &format!("读取缓存失败: {}", e));
                Ok(None)
            }
        }
    }

    async fn set(&self, key: &str, value: Value, ttl: Duration) -> Result<()> {
        if !self.config.enabled {
            return Ok(());
        }

        let category = CacheKeys::category(key);
        let cache_path = self.get_cache_path(key);

        // 确保目录存在
        if let Some(parent) = cache_path.parent() {
            fs::create_dir_all(parent).await?;
        }

        let timestamp = now_secs();
        let entry = CacheEntry {
            key: key.to_string(),
            data: value,
            timestamp,
            expires_at: timestamp.saturating_add(ttl.as_secs()),
        };

        let content = match serde_json::to_string_pretty(&entry) {
            Ok(content) => content,
            Err(e) => {
                self.performance_monitor
                    .record_cache_error(category, &format!("序列化失败: {}", e));
                return Err(e.into());
            }
        };

        // 先写临时文件再重命名，读者不会看到写了一半的内容
        let tmp_path = cache_path.with_extension(format!("json.{}.tmp", uuid::Uuid::new_v4()));
        let written = async {
            fs::write(&tmp_path, content).await?;
            fs::rename(&tmp_path, &cache_path).await
        }
        .await;

        match written {
            Ok(()) => {
                self.performance_monitor.record_cache_write(category);
                Ok(())
            }
            Err(e) => {
                let _ = fs::remove_file(&tmp_path).await;
                self.performance_monitor
                    .record_cache_error(category, &format!("写入文件失败: {}", e));
                Err(e.into())
            }
        }
    }

    async fn invalidate(&self, pattern: &str) -> Result<usize> {
        let matcher = glob::Pattern::new(pattern)
            .with_context(|| format!("Invalid cache invalidation pattern: {}", pattern))?;

        if !self.config.cache_dir.exists() {
            return Ok(0);
        }

        let mut removed = 0;
        let mut categories = fs::read_dir(&self.config.cache_dir).await?;
        while let Some(category_dir) = categories.next_entry().await? {
            if !category_dir.file_type().await?.is_dir() {
                continue;
            }
            let mut entries = fs::read_dir(category_dir.path()).await?;
            while let Some(file) = entries.next_entry().await? {
                let path = file.path();
                if path.extension().and_then(|e| e.to_str()) != Some("json") {
                    continue;
                }
                if let Ok(entry) = Self::read_entry(&path).await
                    && matcher.matches(&entry.key)
                {
                    fs::remove_file(&path).await?;
                    removed += 1;
                }
            }
        }

        self.performance_monitor.record_invalidation(pattern, removed);
        Ok(removed)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;
    use tempfile::TempDir;

    fn file_cache(dir: &TempDir) -> CacheManager {
        CacheManager::new(CacheConfig {
            enabled: true,
            cache_dir: dir.path().join("cache"),
            ..CacheConfig::default()
        })
    }

    #[test]
    fn test_cache_keys() {
        assert_eq!(CacheKeys::research("idea-1", "abc"), "research:idea-1:abc");
        assert_eq!(
            CacheKeys::node("idea-1", "market", "abc", "v1"),
            "node:idea-1:market:abc:v1"
        );
        assert_eq!(CacheKeys::category("node:idea-1:market:abc:v1"), "node");
        assert_eq!(CacheKeys::category("research:idea-1:abc"), "research");
        assert_eq!(CacheKeys::category("whatever"), "other");
    }

    #[tokio::test]
    async fn test_file_cache_roundtrip() {
        let dir = TempDir::new().unwrap();
        let cache = file_cache(&dir);
        let key = CacheKeys::research("idea-1", "abc");

        assert!(cache.get(&key).await.unwrap().is_none());

        cache
            .set(&key, json!({"queries": ["a"]}), Duration::from_secs(60))
            .await
            .unwrap();
        let value = cache.get(&key).await.unwrap().unwrap();
        assert_eq!(value["queries"][0], "a");

        let report = cache.generate_performance_report();
        assert_eq!(report.cache_hits, 1);
        assert_eq!(report.cache_misses, 1);
        assert_eq!(report.cache_writes, 1);
    }

    #[tokio::test]
    async fn test_file_cache_expired_entry_is_miss() {
        let dir = TempDir::new().unwrap();
        let cache = file_cache(&dir);
        let key = CacheKeys::research("idea-1", "abc");

        cache.set(&key, json!(1), Duration::ZERO).await.unwrap();
        assert!(cache.get(&key).await.unwrap().is_none());
    }

    #[tokio::test]
    async fn test_file_cache_invalidate_pattern() {
        let dir = TempDir::new().unwrap();
        let cache = file_cache(&dir);
        let ttl = Duration::from_secs(60);

        cache.set(&CacheKeys::research("idea-1", "h1"), json!(1), ttl).await.unwrap();
        cache.set(&CacheKeys::node("idea-1", "market", "h1", "v1"), json!(2), ttl).await.unwrap();
        cache.set(&CacheKeys::node("idea-2", "market", "h9", "v1"), json!(3), ttl).await.unwrap();

        let removed = cache.invalidate(&CacheKeys::node_pattern("idea-1")).await.unwrap();
        assert_eq!(removed, 1);

        assert!(cache.get(&CacheKeys::research("idea-1", "h1")).await.unwrap().is_some());
        assert!(cache.get(&CacheKeys::node("idea-1", "market", "h1", "v1")).await.unwrap().is_none());
        assert!(cache.get(&CacheKeys::node("idea-2", "market", "h9", "v1")).await.unwrap().is_some());
    }

    #[tokio::test]
    async fn test_disabled_cache_is_noop() {
        let dir = TempDir::new().unwrap();
        let cache = CacheManager::new(CacheConfig {
            enabled: false,
            cache_dir: dir.path().join("cache"),
            ..CacheConfig::default()
        });
        let key = CacheKeys::research("idea-1", "abc");

        cache.set(&key, json!(1), Duration::from_secs(60)).await.unwrap();
        assert!(cache.get(&key).await.unwrap().is_none());
    }
}
