//! In-process object store.

use std::collections::{HashMap, HashSet};
use std::sync::{Mutex, MutexGuard, PoisonError};

use async_trait::async_trait;

use crate::core::{ObjectStore, ObjectUri};
use crate::error::{Result, TransferError};

#[derive(Debug, Default)]
struct Inner {
    buckets: HashSet<String>,
    objects: HashMap<ObjectUri, Vec<u8>>,
}

/// Object store keeping whole objects in memory.
///
/// Writes replace the full object; there are no partial writes.
#[derive(Debug, Default)]
pub struct MemoryObjectStore {
    inner: Mutex<Inner>,
}

impl MemoryObjectStore {
    /// Create an empty store with no buckets.
    pub fn new() -> Self {
        Self::default()
    }

    /// Create a store with the given buckets.
    pub fn with_buckets<I, S>(buckets: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        let store = Self::new();
        for bucket in buckets {
            store.create_bucket(bucket);
        }
        store
    }

    fn lock(&self) -> MutexGuard<'_, Inner> {
        self.inner.lock().unwrap_or_else(PoisonError::into_inner)
    }

    /// Create a bucket. Creating an existing bucket is a no-op.
    pub fn create_bucket(&self, bucket: impl Into<String>) {
        self.lock().buckets.insert(bucket.into());
    }

    /// Write a whole object, replacing any previous contents.
    pub fn put_object(&self, uri: &ObjectUri, data: Vec<u8>) -> Result<()> {
        let mut inner = self.lock();
        if !inner.buckets.contains(&uri.bucket) {
            return Err(TransferError::reference(format!(
                "Not found: bucket {}",
                uri.bucket
            )));
        }
        inner.objects.insert(uri.clone(), data);
        Ok(())
    }

    /// Read a whole object.
    pub fn get_object(&self, uri: &ObjectUri) -> Option<Vec<u8>> {
        self.lock().objects.get(uri).cloned()
    }

    /// All stored object URIs, sorted.
    pub fn object_uris(&self) -> Vec<ObjectUri> {
        let mut uris: Vec<_> = self.lock().objects.keys().cloned().collect();
        uris.sort_by_key(|u| u.to_string());
        uris
    }
}

#[async_trait]
impl ObjectStore for MemoryObjectStore {
    async fn object_exists(&self, uri: &ObjectUri) -> Result<bool> {
        Ok(self.lock().objects.contains_key(uri))
    }

    async fn delete_object(&self, uri: &ObjectUri) -> Result<()> {
        self.lock().objects.remove(uri);
        Ok(())
    }

    async fn bucket_exists(&self, bucket: &str) -> Result<bool> {
        Ok(self.lock().buckets.contains(bucket))
    }

    fn name(&self) -> &'static str {
        "memory"
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_put_requires_bucket() {
        let store = MemoryObjectStore::new();
        let uri = ObjectUri::new("exports", "a.csv").unwrap();
        assert!(store.put_object(&uri, b"x".to_vec()).is_err());

        store.create_bucket("exports");
        store.put_object(&uri, b"x".to_vec()).unwrap();
        assert!(store.object_exists(&uri).await.unwrap());
    }

    #[tokio::test]
    async fn test_put_overwrites_and_delete_is_idempotent() {
        let store = MemoryObjectStore::with_buckets(["exports"]);
        let uri = ObjectUri::new("exports", "a.csv").unwrap();
        store.put_object(&uri, b"first".to_vec()).unwrap();
        store.put_object(&uri, b"second".to_vec()).unwrap();
        assert_eq!(store.get_object(&uri).unwrap(), b"second");

        store.delete_object(&uri).await.unwrap();
        store.delete_object(&uri).await.unwrap();
        assert!(!store.object_exists(&uri).await.unwrap());
        assert!(store.object_uris().is_empty());
    }
}
