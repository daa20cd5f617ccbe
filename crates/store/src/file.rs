//! File-backed store shared between processes.
//!
//! The whole store lives in one JSON document. Every operation takes an
//! exclusive advisory lock on a sidecar `.lock` file, loads the document,
//! applies the operation to the configured database and, for writes, saves
//! the document atomically before releasing the lock. Conditional updates
//! are therefore atomic across every process using the same file.

use crate::backend::{
    Collection, InsertOutcome, MetaStore, PurgeReport, SiblingRecord, UpdateOutcome,
};
use crate::document::{Database, StoreDocument};
use async_trait::async_trait;
use fs2::FileExt;
use metasync_core::{AggregateFields, Error, MetaRecord, Result};
use metasync_utils::{read_if_exists, write_atomic};
use std::fs::{File, OpenOptions};
use std::path::{Path, PathBuf};
use std::sync::Arc;

/// JSON file store
#[derive(Debug, Clone)]
pub struct FileStore {
    inner: Arc<FileStoreInner>,
}

#[derive(Debug)]
struct FileStoreInner {
    path: PathBuf,
    lock_path: PathBuf,
    database: String,
}

/// Whether an operation changes the document
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Access {
    Read,
    Write,
}

impl FileStore {
    /// Open a store at `path`, scoped to `database`. The file is created on
    /// the first write.
    pub fn new(path: impl Into<PathBuf>, database: impl Into<String>) -> Self {
        let path = path.into();
        let mut lock_name = path
            .file_name()
            .map(|name| name.to_os_string())
            .unwrap_or_default();
        lock_name.push(".lock");
        let lock_path = path.with_file_name(lock_name);

        Self {
            inner: Arc::new(FileStoreInner {
                path,
                lock_path,
                database: database.into(),
            }),
        }
    }

    pub fn path(&self) -> &Path {
        &self.inner.path
    }

    pub fn database_name(&self) -> &str {
        &self.inner.database
    }

    /// Run `operation` against the database on a blocking thread
    async fn run<T, F>(&self, access: Access, operation: F) -> Result<T>
    where
        T: Send + 'static,
        F: FnOnce(&mut Database) -> T + Send + 'static,
    {
        let inner = Arc::clone(&self.inner);
        match tokio::task::spawn_blocking(move || inner.with_database(access, operation)).await {
            Ok(result) => result,
            Err(e) => Err(Error::store_unavailable(
                "file store operation",
                format!("blocking task failed: {e}"),
            )),
        }
    }
}

impl FileStoreInner {
    fn with_database<T, F>(&self, access: Access, operation: F) -> Result<T>
    where
        F: FnOnce(&mut Database) -> T,
    {
        let lock = self.acquire_lock()?;

        let result = (|| -> Result<T> {
            let mut document = self.load()?;
            let database = document.databases.entry(self.database.clone()).or_default();
            let value = operation(database);

            if access == Access::Write {
                let content = serde_json::to_vec_pretty(&document)
                    .map_err(|e| Error::serialization("encode store document", e))?;
                write_atomic(&self.path, &content)?;
            }

            Ok(value)
        })();

        if let Err(e) = FileExt::unlock(&lock) {
            tracing::warn!(path = %self.lock_path.display(), error = %e, "failed to release store lock");
        }

        result
    }

    fn acquire_lock(&self) -> Result<File> {
        if let Some(parent) = self.lock_path.parent() {
            if !parent.as_os_str().is_empty() {
                std::fs::create_dir_all(parent)
                    .map_err(|e| Error::io(parent, "create store directory", e))?;
            }
        }

        let lock_file = OpenOptions::new()
            .read(true)
            .write(true)
            .create(true)
            .truncate(false)
            .open(&self.lock_path)
            .map_err(|e| Error::io(&self.lock_path, "open store lock", e))?;

        lock_file
            .lock_exclusive()
            .map_err(|e| Error::io(&self.lock_path, "lock store", e))?;

        Ok(lock_file)
    }

    fn load(&self) -> Result<StoreDocument> {
        match read_if_exists(&self.path)? {
            Some(content) if !content.is_empty() => serde_json::from_slice(&content)
                .map_err(|e| Error::serialization(format!("decode {}", self.path.display()), e)),
            _ => Ok(StoreDocument::default()),
        }
    }
}

#[async_trait]
impl MetaStore for FileStore {
    async fn read(&self, id: &str) -> Result<Option<MetaRecord>> {
        let id = id.to_string();
        self.run(Access::Read, move |db| db.read(&id)).await
    }

    async fn insert(&self, record: &MetaRecord) -> Result<InsertOutcome> {
        let record = record.clone();
        self.run(Access::Write, move |db| db.insert(&record)).await
    }

    async fn conditional_update(
        &self,
        id: &str,
        expected_version: u64,
        fields: &AggregateFields,
    ) -> Result<UpdateOutcome> {
        let id = id.to_string();
        let fields = *fields;
        self.run(Access::Write, move |db| {
            db.conditional_update(&id, expected_version, &fields)
        })
        .await
    }

    async fn scan(&self) -> Result<Vec<MetaRecord>> {
        self.run(Access::Read, |db| db.scan()).await
    }

    async fn insert_sibling(&self, collection: Collection, record: SiblingRecord) -> Result<()> {
        self.run(Access::Write, move |db| db.insert_sibling(collection, record))
            .await
    }

    async fn count_siblings(&self, metric: &str) -> Result<usize> {
        let metric = metric.to_string();
        self.run(Access::Read, move |db| db.count_siblings(&metric))
            .await
    }

    async fn purge_metric(&self, metric: &str) -> Result<PurgeReport> {
        let metric = metric.to_string();
        self.run(Access::Write, move |db| db.purge_metric(&metric))
            .await
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    #[test]
    fn test_lock_path_sits_next_to_store() {
        let store = FileStore::new("/var/lib/metasync/store.json", "morgoth");
        assert_eq!(
            store.inner.lock_path,
            PathBuf::from("/var/lib/metasync/store.json.lock")
        );
        assert_eq!(store.database_name(), "morgoth");
    }

    #[tokio::test]
    async fn test_databases_are_isolated() {
        let temp_dir = TempDir::new().unwrap();
        let path = temp_dir.path().join("store.json");
        let first = FileStore::new(&path, "first");
        let second = FileStore::new(&path, "second");

        let record = MetaRecord::new("cpu.load", 3.0);
        first.insert(&record).await.unwrap();

        assert_eq!(first.read("cpu.load").await.unwrap(), Some(record));
        assert_eq!(second.read("cpu.load").await.unwrap(), None);
    }

    #[tokio::test]
    async fn test_corrupt_document_is_reported() {
        let temp_dir = TempDir::new().unwrap();
        let path = temp_dir.path().join("store.json");
        std::fs::write(&path, "not json").unwrap();

        let store = FileStore::new(&path, "metasync");
        let err = store.read("cpu.load").await.unwrap_err();
        assert!(matches!(err, Error::Serialization { .. }));
    }
}
