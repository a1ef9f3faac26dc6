//! Per-document metadata records, one JSON file per document under the
//! index directory. Writes are serialised by a single mutex; readers
//! take the whole file in one read and need no lock.

use std::fs;
use std::path::PathBuf;

use parking_lot::Mutex;
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};
use tracing::warn;

use crate::contracts::DocumentType;
use crate::errors::StoreError;

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DocumentRecord {
    pub id: String,
    pub title: String,
    pub document_type: DocumentType,
    pub created_at: i64,
    pub updated_at: i64,
    #[serde(default)]
    pub tags: Vec<String>,
    #[serde(default)]
    pub metadata: Map<String, Value>,
    pub size_bytes: u64,
    #[serde(default)]
    pub source_url: Option<String>,
    /// Path of the document file relative to the root.
    pub path: String,
}

pub struct DocumentIndex {
    dir: PathBuf,
    write_lock: Mutex<()>,
}

impl DocumentIndex {
    pub fn open(dir: PathBuf) -> Result<Self, StoreError> {
        fs::create_dir_all(&dir)?;
        Ok(DocumentIndex {
            dir,
            write_lock: Mutex::new(()),
        })
    }

    fn record_path(&self, id: &str) -> PathBuf {
        self.dir.join(format!("{id}.json"))
    }

    /// Merge `patch` into the record, creating it when absent. Keys are
    /// replaced at the top level; the caller supplies already-merged
    /// metadata maps.
    pub fn upsert(&self, id: &str, patch: Value) -> Result<(), StoreError> {
        let _guard = self.write_lock.lock();

        let path = self.record_path(id);
        let merged = match fs::read_to_string(&path) {
            Ok(raw) => {
                let mut current: Value = serde_json::from_str(&raw)?;
                if let (Some(current_map), Some(patch_map)) =
                    (current.as_object_mut(), patch.as_object())
                {
                    for (key, value) in patch_map {
                        current_map.insert(key.clone(), value.clone());
                    }
                }
                current
            }
            Err(_) => patch,
        };

        fs::write(&path, serde_json::to_string_pretty(&merged)?)?;
        Ok(())
    }

    pub fn put(&self, record: &DocumentRecord) -> Result<(), StoreError> {
        self.upsert(&record.id, serde_json::to_value(record)?)
    }

    pub fn get(&self, id: &str) -> Result<Option<DocumentRecord>, StoreError> {
        let path = self.record_path(id);
        if !path.exists() {
            return Ok(None);
        }

        match fs::read_to_string(&path) {
            Ok(raw) => match serde_json::from_str(&raw) {
                Ok(record) => Ok(Some(record)),
                Err(err) => {
                    warn!(id, %err, "unreadable index record");
                    Ok(None)
                }
            },
            Err(err) => {
                warn!(id, %err, "unreadable index record");
                Ok(None)
            }
        }
    }

    pub fn remove(&self, id: &str) -> Result<(), StoreError> {
        let _guard = self.write_lock.lock();
        let path = self.record_path(id);
        if path.exists() {
            fs::remove_file(path)?;
        }
        Ok(())
    }

    /// Every parseable record, in directory scan order.
    pub fn scan(&self) -> Result<Vec<DocumentRecord>, StoreError> {
        let mut records = Vec::new();

        for entry in fs::read_dir(&self.dir)? {
            let path = entry?.path();
            if path.extension().and_then(|e| e.to_str()) != Some("json") {
                continue;
            }
            match fs::read_to_string(&path).map_err(StoreError::from).and_then(|raw| {
                serde_json::from_str::<DocumentRecord>(&raw).map_err(StoreError::from)
            }) {
                Ok(record) => records.push(record),
                Err(err) => warn!(path = %path.display(), %err, "skipping index record"),
            }
        }

        Ok(records)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn record(id: &str) -> DocumentRecord {
        DocumentRecord {
            id: id.to_string(),
            title: "Title".to_string(),
            document_type: DocumentType::Generic,
            created_at: 100,
            updated_at: 100,
            tags: vec!["t1".to_string()],
            metadata: Map::new(),
            size_bytes: 10,
            source_url: None,
            path: format!("generic/{id}.md"),
        }
    }

    #[test]
    fn put_get_remove_lifecycle() {
        let dir = tempfile::TempDir::new().unwrap();
        let index = DocumentIndex::open(dir.path().join(".index")).unwrap();

        assert!(index.get("doc_1_aaaaaaaa").unwrap().is_none());

        index.put(&record("doc_1_aaaaaaaa")).unwrap();
        let loaded = index.get("doc_1_aaaaaaaa").unwrap().unwrap();
        assert_eq!(loaded.title, "Title");
        assert_eq!(loaded.tags, vec!["t1".to_string()]);

        index.remove("doc_1_aaaaaaaa").unwrap();
        assert!(index.get("doc_1_aaaaaaaa").unwrap().is_none());
        // removing a missing record is fine
        index.remove("doc_1_aaaaaaaa").unwrap();
    }

    #[test]
    fn upsert_merges_top_level_keys() {
        let dir = tempfile::TempDir::new().unwrap();
        let index = DocumentIndex::open(dir.path().join(".index")).unwrap();

        index.put(&record("doc_1_aaaaaaaa")).unwrap();
        index
            .upsert(
                "doc_1_aaaaaaaa",
                json!({"title": "Renamed", "updated_at": 200}),
            )
            .unwrap();

        let loaded = index.get("doc_1_aaaaaaaa").unwrap().unwrap();
        assert_eq!(loaded.title, "Renamed");
        assert_eq!(loaded.updated_at, 200);
        // untouched keys survive the merge
        assert_eq!(loaded.created_at, 100);
        assert_eq!(loaded.tags, vec!["t1".to_string()]);
    }

    #[test]
    fn scan_returns_every_record() {
        let dir = tempfile::TempDir::new().unwrap();
        let index = DocumentIndex::open(dir.path().join(".index")).unwrap();

        index.put(&record("doc_1_aaaaaaaa")).unwrap();
        index.put(&record("doc_2_bbbbbbbb")).unwrap();
        std::fs::write(dir.path().join(".index/garbage.json"), "nope").unwrap();

        let records = index.scan().unwrap();
        assert_eq!(records.len(), 2);
    }
}
