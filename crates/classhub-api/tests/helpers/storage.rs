use std::collections::HashSet;
use std::sync::Mutex;

use async_trait::async_trait;
use bytes::Bytes;
use classhub_storage::{
    KeyStrategy, LocalStorage, Storage, StorageBackend, StorageError, StorageResult, StoredObject,
};

/// Local backend whose puts and deletes fail for keys containing a configured fragment
pub struct FaultyStorage {
    inner: LocalStorage,
    fail_puts: Mutex<HashSet<String>>,
    fail_deletes: Mutex<HashSet<String>>,
}

impl FaultyStorage {
    pub fn new(inner: LocalStorage) -> Self {
        Self {
            inner,
            fail_puts: Mutex::new(HashSet::new()),
            fail_deletes: Mutex::new(HashSet::new()),
        }
    }

    pub fn fail_put_of(&self, fragment: &str) {
        self.fail_puts.lock().unwrap().insert(fragment.to_string());
    }

    pub fn fail_delete_of(&self, fragment: &str) {
        self.fail_deletes
            .lock()
            .unwrap()
            .insert(fragment.to_string());
    }

    pub fn heal(&self) {
        self.fail_puts.lock().unwrap().clear();
        self.fail_deletes.lock().unwrap().clear();
    }

    fn matches(set: &Mutex<HashSet<String>>, key: &str) -> bool {
        set.lock().unwrap().iter().any(|f| key.contains(f.as_str()))
    }
}

#[async_trait]
impl Storage for FaultyStorage {
    async fn put(&self, key: &str, data: Bytes) -> StorageResult<StoredObject> {
        if Self::matches(&self.fail_puts, key) {
            return Err(StorageError::UploadFailed(format!("injected failure for {}", key)));
        }
        self.inner.put(key, data).await
    }

    async fn delete(&self, key: &str) -> StorageResult<()> {
        if Self::matches(&self.fail_deletes, key) {
            return Err(StorageError::DeleteFailed(format!("injected failure for {}", key)));
        }
        self.inner.delete(key).await
    }

    async fn exists(&self, key: &str) -> StorageResult<bool> {
        self.inner.exists(key).await
    }

    async fn mkdir_recursive(&self, dir: &str) -> StorageResult<()> {
        self.inner.mkdir_recursive(dir).await
    }

    fn key_strategy(&self) -> KeyStrategy {
        self.inner.key_strategy()
    }

    fn public_path(&self, key: &str) -> String {
        self.inner.public_path(key)
    }

    fn backend_type(&self) -> StorageBackend {
        self.inner.backend_type()
    }
}
