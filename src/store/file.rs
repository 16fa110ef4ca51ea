use anyhow::{Context, Result};
use async_trait::async_trait;
use serde_json::Value;
use std::path::PathBuf;
use tokio::fs;

use super::{DocumentStore, field_matches};

/// 以 `{store_dir}/{collection}/{id}.json` 形式持久化的文档存储
pub struct FileStore {
    root: PathBuf,
}

impl FileStore {
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self { root: root.into() }
    }

    fn collection_dir(&self, collection: &str) -> PathBuf {
        // 集合名是固定常量，只有含特殊字符时才转义
        let plain = collection
            .bytes()
            .all(|b| b.is_ascii_alphanumeric() || b == b'_' || b == b'-');
        if plain {
            self.root.join(collection)
        } else {
            self.root.join(sanitize(collection))
        }
    }

    fn document_path(&self, collection: &str, id: &str) -> PathBuf {
        self.collection_dir(collection)
            .join(format!("{}.json", sanitize(id)))
    }
}

/// 把id转义为文件名：字母数字、`-`、`.` 原样保留，其余字节（含 `_`）写成 `_xx`，
/// 不同的id不会落到同一个文件
fn sanitize(name: &str) -> String {
    let mut escaped = String::with_capacity(name.len());
    for byte in name.bytes() {
        if byte.is_ascii_alphanumeric() || byte == b'-' || byte == b'.' {
            escaped.push(byte as char);
        } else {
            escaped.push_str(&format!("_{:02x}", byte));
        }
    }
    escaped
}

#[async_trait]
impl DocumentStore for FileStore {
    async fn put(&self, collection: &str, id: &str, document: Value) -> Result<()> {
        let dir = self.collection_dir(collection);
        fs::create_dir_all(&dir)
            .await
            .with_context(|| format!("Failed to create store directory {:?}", dir))?;

        let path = self.document_path(collection, id);
        let tmp_path = path.with_extension(format!("json.{}.tmp", uuid::Uuid::new_v4()));
        let content = serde_json::to_string_pretty(&document)?;

        fs::write(&tmp_path, content).await?;
        if let Err(e) = fs::rename(&tmp_path, &path).await {
            let _ = fs::remove_file(&tmp_path).await;
            return Err(e).with_context(|| format!("Failed to write document {:?}", path));
        }
        Ok(())
    }

    async fn get(&self, collection: &str, id: &str) -> Result<Option<Value>> {
        let path = self.document_path(collection, id);
        if !path.exists() {
            return Ok(None);
        }
        let content = fs::read_to_string(&path).await?;
        let document = serde_json::from_str(&content)
            .with_context(|| format!("Corrupted document {:?}", path))?;
        Ok(Some(document))
    }

    async fn find_by(&self, collection: &str, field: &str, value: &Value) -> Result<Vec<Value>> {
        let dir = self.collection_dir(collection);
        if !dir.exists() {
            return Ok(Vec::new());
        }

        let mut paths = Vec::new();
        let mut entries = fs::read_dir(&dir).await?;
        while let Some(entry) = entries.next_entry().await? {
            let path = entry.path();
            if path.extension().and_then(|e| e.to_str()) == Some("json") {
                paths.push(path);
            }
        }
        paths.sort();

        let mut found = Vec::new();
        for path in paths {
            let content = fs::read_to_string(&path).await?;
            match serde_json::from_str::<Value>(&content) {
                Ok(document) if field_matches(&document, field, value) => found.push(document),
                Ok(_) => {}
                Err(e) => tracing::warn!("⚠️ 跳过损坏的文档 {:?}: {}", path, e),
            }
        }
        Ok(found)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::store::Collections;
    use serde_json::json;
    use tempfile::TempDir;

    #[tokio::test]
    async fn test_file_store_roundtrip_and_find() {
        let dir = TempDir::new().unwrap();
        let store = FileStore::new(dir.path());

        store
            .put(Collections::ANALYSIS_RESULTS, "job/1", json!({"ideaId": "a", "v": 1}))
            .await
            .unwrap();
        store
            .put(Collections::ANALYSIS_RESULTS, "job/2", json!({"ideaId": "b", "v": 2}))
            .await
            .unwrap();

        let doc = store
            .get(Collections::ANALYSIS_RESULTS, "job/1")
            .await
            .unwrap()
            .unwrap();
        assert_eq!(doc["v"], 1);
        assert!(dir.path().join("analysis_results/job_2f1.json").exists());

        let found = store
            .find_by(Collections::ANALYSIS_RESULTS, "ideaId", &json!("b"))
            .await
            .unwrap();
        assert_eq!(found, vec![json!({"ideaId": "b", "v": 2})]);

        assert!(store.get(Collections::ANALYSIS_JOBS, "missing").await.unwrap().is_none());
        assert!(
            store
                .find_by(Collections::ANALYSIS_JOBS, "ideaId", &json!("a"))
                .await
                .unwrap()
                .is_empty()
        );
    }

    #[test]
    fn test_sanitize_keeps_distinct_ids_apart() {
        assert_eq!(sanitize("idea-1.v2"), "idea-1.v2");
        assert_eq!(sanitize("a/b"), "a_2fb");
        assert_eq!(sanitize("a_b"), "a_5fb");
        assert_ne!(sanitize("a/b"), sanitize("a_b"));
        assert_ne!(sanitize("a b"), sanitize("a_20b"));
    }

    #[tokio::test]
    async fn test_ids_differing_only_in_separators_do_not_collide() {
        let dir = TempDir::new().unwrap();
        let store = FileStore::new(dir.path());

        store
            .put(Collections::ANALYSIS_JOBS, "a/b", json!({"v": "slash"}))
            .await
            .unwrap();
        store
            .put(Collections::ANALYSIS_JOBS, "a_b", json!({"v": "underscore"}))
            .await
            .unwrap();

        let slash = store.get(Collections::ANALYSIS_JOBS, "a/b").await.unwrap().unwrap();
        let underscore = store.get(Collections::ANALYSIS_JOBS, "a_b").await.unwrap().unwrap();
        assert_eq!(slash["v"], "slash");
        assert_eq!(underscore["v"], "underscore");
    }
}
