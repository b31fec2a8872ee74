use crate::domain::ports::SnapshotStore;
use crate::error::{OnboardingError, Result};
use async_trait::async_trait;
use rocksdb::{ColumnFamilyDescriptor, DB, Options};
use std::path::Path;
use std::sync::Arc;

/// Column family holding entity snapshots and the person ownership index.
pub const CF_SNAPSHOTS: &str = "snapshots";

fn storage_error(message: impl ToString) -> OnboardingError {
    OnboardingError::Storage(std::io::Error::other(message.to_string()))
}

/// A persistent snapshot store backed by RocksDB.
///
/// Keys are the cache's namespaced strings, values whole JSON snapshots.
/// `Clone` shares the underlying `Arc<DB>`, so one open database serves
/// every cache instance of the process.
#[derive(Clone)]
pub struct RocksDBSnapshotStore {
    db: Arc<DB>,
}

impl RocksDBSnapshotStore {
    /// Opens or creates a RocksDB instance at the specified path, ensuring
    /// the snapshot column family exists.
    pub fn open<P: AsRef<Path>>(path: P) -> Result<Self> {
        let mut opts = Options::default();
        opts.create_if_missing(true);
        opts.create_missing_column_families(true);

        let cf_snapshots = ColumnFamilyDescriptor::new(CF_SNAPSHOTS, Options::default());
        let db = DB::open_cf_descriptors(&opts, path, vec![cf_snapshots])
            .map_err(storage_error)?;

        Ok(Self { db: Arc::new(db) })
    }

    fn cf(&self) -> Result<&rocksdb::ColumnFamily> {
        self.db
            .cf_handle(CF_SNAPSHOTS)
            .ok_or_else(|| storage_error("snapshots column family not found"))
    }
}

#[async_trait]
impl SnapshotStore for RocksDBSnapshotStore {
    async fn read(&self, key: &str) -> Result<Option<String>> {
        let cf = self.cf()?;
        match self.db.get_cf(cf, key.as_bytes()).map_err(storage_error)? {
            Some(bytes) => {
                let value = String::from_utf8(bytes)
                    .map_err(|e| storage_error(format!("non-utf8 snapshot value: {e}")))?;
                Ok(Some(value))
            }
            None => Ok(None),
        }
    }

    async fn write(&self, key: &str, value: &str) -> Result<()> {
        let cf = self.cf()?;
        self.db
            .put_cf(cf, key.as_bytes(), value.as_bytes())
            .map_err(storage_error)
    }

    async fn delete(&self, key: &str) -> Result<()> {
        let cf = self.cf()?;
        self.db.delete_cf(cf, key.as_bytes()).map_err(storage_error)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::tempdir;

    #[tokio::test]
    async fn test_rocksdb_open_cf() {
        let dir = tempdir().unwrap();
        let store = RocksDBSnapshotStore::open(dir.path()).expect("failed to open RocksDB");
        assert!(store.db.cf_handle(CF_SNAPSHOTS).is_some());
    }

    #[tokio::test]
    async fn test_rocksdb_round_trip() {
        let dir = tempdir().unwrap();
        let store = RocksDBSnapshotStore::open(dir.path()).unwrap();

        store
            .write("accounts/acct_1", r#"{"id":"acct_1"}"#)
            .await
            .unwrap();
        assert_eq!(
            store.read("accounts/acct_1").await.unwrap().as_deref(),
            Some(r#"{"id":"acct_1"}"#)
        );

        store.delete("accounts/acct_1").await.unwrap();
        assert!(store.read("accounts/acct_1").await.unwrap().is_none());
    }

    #[tokio::test]
    async fn test_rocksdb_delete_missing_is_ok() {
        let dir = tempdir().unwrap();
        let store = RocksDBSnapshotStore::open(dir.path()).unwrap();
        store.delete("accounts/none").await.unwrap();
    }

    #[tokio::test]
    async fn test_rocksdb_survives_reopen() {
        let dir = tempdir().unwrap();
        {
            let store = RocksDBSnapshotStore::open(dir.path()).unwrap();
            store.write("persons/per_1", "{}").await.unwrap();
        }
        let reopened = RocksDBSnapshotStore::open(dir.path()).unwrap();
        assert_eq!(
            reopened.read("persons/per_1").await.unwrap().as_deref(),
            Some("{}")
        );
    }
}
