//! Keyed durable storage for review requests and notifications.
//!
//! Records are JSON documents grouped into collections and addressed by id.
//! Every id is allow-list validated before it is used as a key, so an
//! externally supplied id can never steer a file path.
//!
//! Two backends are provided: [`FileStore`] writes one pretty-printed JSON
//! file per record (`<root>/<collection>/<id>.json`), and [`MemoryStore`]
//! keeps records in process for tests and embedding. [`Records`] layers a
//! typed view over either.

use crate::errors::{GateError, GateResult};
use crate::gate::validate_request_id;
use serde::Serialize;
use serde::de::DeserializeOwned;
use serde_json::Value;
use std::collections::{BTreeMap, HashMap};
use std::fs;
use std::marker::PhantomData;
use std::path::{Path, PathBuf};
use std::sync::{Arc, Mutex};

/// Create/read/update/delete of JSON records by validated id.
///
/// Implementations must provide read-your-writes per id. Concurrent writers
/// to the same id are not expected.
pub trait RecordStore: Send + Sync {
    /// Insert a new record; fails if the id already exists.
    fn create(&self, collection: &str, id: &str, record: &Value) -> GateResult<()>;
    fn read(&self, collection: &str, id: &str) -> GateResult<Option<Value>>;
    /// Replace an existing record; fails with `RequestNotFound` if absent.
    fn update(&self, collection: &str, id: &str, record: &Value) -> GateResult<()>;
    /// Remove a record, returning whether it existed.
    fn delete(&self, collection: &str, id: &str) -> GateResult<bool>;
    /// Ids in a collection, sorted.
    fn list(&self, collection: &str) -> GateResult<Vec<String>>;
}

fn already_exists(collection: &str, id: &str) -> GateError {
    GateError::Other(anyhow::anyhow!(
        "Record {} already exists in {}",
        id,
        collection
    ))
}

/// One JSON file per record under a root directory.
#[derive(Debug, Clone)]
pub struct FileStore {
    root: PathBuf,
}

impl FileStore {
    pub fn new(root: impl AsRef<Path>) -> Self {
        Self {
            root: root.as_ref().to_path_buf(),
        }
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    fn collection_dir(&self, collection: &str) -> GateResult<PathBuf> {
        validate_request_id(collection)?;
        Ok(self.root.join(collection))
    }

    fn record_path(&self, collection: &str, id: &str) -> GateResult<PathBuf> {
        validate_request_id(id)?;
        Ok(self.collection_dir(collection)?.join(format!("{}.json", id)))
    }

    fn write(&self, path: &Path, record: &Value) -> GateResult<()> {
        if let Some(parent) = path.parent() {
            fs::create_dir_all(parent).map_err(|source| GateError::Storage {
                path: parent.to_path_buf(),
                source,
            })?;
        }
        let json = serde_json::to_string_pretty(record).map_err(|source| {
            GateError::Serialization {
                what: path.display().to_string(),
                source,
            }
        })?;
        // Write-then-rename so readers never see a torn record.
        let tmp = path.with_extension("json.tmp");
        fs::write(&tmp, json).map_err(|source| GateError::Storage {
            path: tmp.clone(),
            source,
        })?;
        fs::rename(&tmp, path).map_err(|source| GateError::Storage {
            path: path.to_path_buf(),
            source,
        })
    }
}

impl RecordStore for FileStore {
    fn create(&self, collection: &str, id: &str, record: &Value) -> GateResult<()> {
        let path = self.record_path(collection, id)?;
        if path.exists() {
            return Err(already_exists(collection, id));
        }
        self.write(&path, record)
    }

    fn read(&self, collection: &str, id: &str) -> GateResult<Option<Value>> {
        let path = self.record_path(collection, id)?;
        if !path.exists() {
            return Ok(None);
        }
        let content = fs::read_to_string(&path).map_err(|source| GateError::Storage {
            path: path.clone(),
            source,
        })?;
        let value = serde_json::from_str(&content).map_err(|source| GateError::Serialization {
            what: path.display().to_string(),
            source,
        })?;
        Ok(Some(value))
    }

    fn update(&self, collection: &str, id: &str, record: &Value) -> GateResult<()> {
        let path = self.record_path(collection, id)?;
        if !path.exists() {
            return Err(GateError::RequestNotFound { id: id.to_string() });
        }
        self.write(&path, record)
    }

    fn delete(&self, collection: &str, id: &str) -> GateResult<bool> {
        let path = self.record_path(collection, id)?;
        if !path.exists() {
            return Ok(false);
        }
        fs::remove_file(&path).map_err(|source| GateError::Storage { path, source })?;
        Ok(true)
    }

    fn list(&self, collection: &str) -> GateResult<Vec<String>> {
        let dir = self.collection_dir(collection)?;
        if !dir.exists() {
            return Ok(Vec::new());
        }
        let entries = fs::read_dir(&dir).map_err(|source| GateError::Storage {
            path: dir.clone(),
            source,
        })?;
        let mut ids: Vec<String> = entries
            .filter_map(|e| e.ok())
            .map(|e| e.path())
            .filter(|p| p.extension().is_some_and(|ext| ext == "json"))
            .filter_map(|p| p.file_stem().map(|s| s.to_string_lossy().to_string()))
            .collect();
        ids.sort();
        Ok(ids)
    }
}

/// In-process store; same validation rules as [`FileStore`].
#[derive(Debug, Default)]
pub struct MemoryStore {
    collections: Mutex<HashMap<String, BTreeMap<String, Value>>>,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    fn with_collection<R>(
        &self,
        collection: &str,
        f: impl FnOnce(&mut BTreeMap<String, Value>) -> R,
    ) -> GateResult<R> {
        validate_request_id(collection)?;
        let mut collections = self
            .collections
            .lock()
            .map_err(|_| GateError::LockPoisoned("memory store"))?;
        Ok(f(collections.entry(collection.to_string()).or_default()))
    }
}

impl RecordStore for MemoryStore {
    fn create(&self, collection: &str, id: &str, record: &Value) -> GateResult<()> {
        validate_request_id(id)?;
        let inserted = self.with_collection(collection, |records| {
            if records.contains_key(id) {
                false
            } else {
                records.insert(id.to_string(), record.clone());
                true
            }
        })?;
        if inserted {
            Ok(())
        } else {
            Err(already_exists(collection, id))
        }
    }

    fn read(&self, collection: &str, id: &str) -> GateResult<Option<Value>> {
        validate_request_id(id)?;
        self.with_collection(collection, |records| records.get(id).cloned())
    }

    fn update(&self, collection: &str, id: &str, record: &Value) -> GateResult<()> {
        validate_request_id(id)?;
        let updated = self.with_collection(collection, |records| match records.get_mut(id) {
            Some(existing) => {
                *existing = record.clone();
                true
            }
            None => false,
        })?;
        if updated {
            Ok(())
        } else {
            Err(GateError::RequestNotFound { id: id.to_string() })
        }
    }

    fn delete(&self, collection: &str, id: &str) -> GateResult<bool> {
        validate_request_id(id)?;
        self.with_collection(collection, |records| records.remove(id).is_some())
    }

    fn list(&self, collection: &str) -> GateResult<Vec<String>> {
        self.with_collection(collection, |records| records.keys().cloned().collect())
    }
}

/// Typed view over one collection of a [`RecordStore`].
pub struct Records<T> {
    store: Arc<dyn RecordStore>,
    collection: &'static str,
    _marker: PhantomData<fn() -> T>,
}

impl<T> Clone for Records<T> {
    fn clone(&self) -> Self {
        Self {
            store: Arc::clone(&self.store),
            collection: self.collection,
            _marker: PhantomData,
        }
    }
}

impl<T: Serialize + DeserializeOwned> Records<T> {
    pub fn new(store: Arc<dyn RecordStore>, collection: &'static str) -> Self {
        Self {
            store,
            collection,
            _marker: PhantomData,
        }
    }

    pub fn collection(&self) -> &'static str {
        self.collection
    }

    fn to_value(&self, record: &T) -> GateResult<Value> {
        serde_json::to_value(record).map_err(|source| GateError::Serialization {
            what: self.collection.to_string(),
            source,
        })
    }

    pub fn create(&self, id: &str, record: &T) -> GateResult<()> {
        let value = self.to_value(record)?;
        self.store.create(self.collection, id, &value)
    }

    pub fn read(&self, id: &str) -> GateResult<Option<T>> {
        self.store
            .read(self.collection, id)?
            .map(|value| {
                serde_json::from_value(value).map_err(|source| GateError::Serialization {
                    what: format!("{}/{}", self.collection, id),
                    source,
                })
            })
            .transpose()
    }

    pub fn update(&self, id: &str, record: &T) -> GateResult<()> {
        let value = self.to_value(record)?;
        self.store.update(self.collection, id, &value)
    }

    pub fn delete(&self, id: &str) -> GateResult<bool> {
        self.store.delete(self.collection, id)
    }

    pub fn ids(&self) -> GateResult<Vec<String>> {
        self.store.list(self.collection)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;
    use tempfile::tempdir;

    fn exercise_crud(store: &dyn RecordStore) {
        store.create("reviews", "hr-1", &json!({"n": 1})).unwrap();
        assert_eq!(store.read("reviews", "hr-1").unwrap(), Some(json!({"n": 1})));
        assert!(store.create("reviews", "hr-1", &json!({})).is_err());

        store.update("reviews", "hr-1", &json!({"n": 2})).unwrap();
        assert_eq!(store.read("reviews", "hr-1").unwrap(), Some(json!({"n": 2})));

        store.create("reviews", "hr-0", &json!({})).unwrap();
        assert_eq!(store.list("reviews").unwrap(), vec!["hr-0", "hr-1"]);

        assert!(store.delete("reviews", "hr-1").unwrap());
        assert!(!store.delete("reviews", "hr-1").unwrap());
        assert_eq!(store.read("reviews", "hr-1").unwrap(), None);

        let err = store.update("reviews", "missing", &json!({})).unwrap_err();
        assert!(matches!(err, GateError::RequestNotFound { .. }));
    }

    fn exercise_rejections(store: &dyn RecordStore) {
        for bad in ["", "../x", "a/b", "a\\b", "<x>", "a;b", "`id`"] {
            let err = store.read("reviews", bad).unwrap_err();
            assert!(
                matches!(err, GateError::InvalidRequestId { .. }),
                "expected rejection for {bad:?}"
            );
        }
        assert!(store.list("../reviews").is_err());
    }

    #[test]
    fn file_store_crud() {
        let dir = tempdir().unwrap();
        exercise_crud(&FileStore::new(dir.path()));
        assert!(dir.path().join("reviews/hr-0.json").exists());
    }

    #[test]
    fn memory_store_crud() {
        exercise_crud(&MemoryStore::new());
    }

    #[test]
    fn file_store_rejects_bad_ids() {
        let dir = tempdir().unwrap();
        exercise_rejections(&FileStore::new(dir.path()));
    }

    #[test]
    fn memory_store_rejects_bad_ids() {
        exercise_rejections(&MemoryStore::new());
    }

    #[test]
    fn list_of_missing_collection_is_empty() {
        let dir = tempdir().unwrap();
        assert!(FileStore::new(dir.path()).list("reviews").unwrap().is_empty());
    }

    #[test]
    fn typed_records_round_trip() {
        #[derive(Debug, PartialEq, Serialize, serde::Deserialize)]
        struct Note {
            text: String,
        }
        let records: Records<Note> = Records::new(Arc::new(MemoryStore::new()), "notes");
        let note = Note {
            text: "hello".into(),
        };
        records.create("n1", &note).unwrap();
        assert_eq!(records.read("n1").unwrap(), Some(note));
        assert_eq!(records.ids().unwrap(), vec!["n1"]);
    }
}
