//! In-memory blob store for testing.

use crate::backend::{BlobReader, BlobStore, Locator};
use crate::error::{StorageError, StorageResult};
use parking_lot::RwLock;
use std::collections::{HashMap, HashSet};
use std::io::Cursor;

/// An in-memory blob store.
///
/// This store keeps every object in memory and is suitable for:
/// - Unit tests
/// - Integration tests
/// - Ephemeral record stores that don't need persistence
///
/// # Thread Safety
///
/// This store is thread-safe and can be shared across threads. A reader
/// gets its own copy of the object, so a later write never affects it.
///
/// # Example
///
/// ```rust
/// use csvstore_storage::{BlobStore, InMemoryBlobStore, Locator};
///
/// let locator = Locator::new("bucket", "data.csv");
/// let store = InMemoryBlobStore::with_object(&locator, b"id\r\n1\r\n".to_vec());
/// assert!(store.exists(&locator).unwrap());
/// assert_eq!(store.object(&locator).unwrap(), b"id\r\n1\r\n");
/// ```
#[derive(Debug, Default)]
pub struct InMemoryBlobStore {
    containers: RwLock<HashSet<String>>,
    objects: RwLock<HashMap<Locator, Vec<u8>>>,
}

impl InMemoryBlobStore {
    /// Creates a new empty in-memory store.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Creates a store holding one pre-existing object.
    ///
    /// The object's container is created as well.
    #[must_use]
    pub fn with_object(locator: &Locator, data: Vec<u8>) -> Self {
        let store = Self::new();
        store
            .containers
            .write()
            .insert(locator.container().to_string());
        store.objects.write().insert(locator.clone(), data);
        store
    }

    /// Returns a copy of the object, if present.
    ///
    /// Useful for testing and debugging.
    #[must_use]
    pub fn object(&self, locator: &Locator) -> Option<Vec<u8>> {
        self.objects.read().get(locator).cloned()
    }

    /// Returns true if the container exists.
    #[must_use]
    pub fn has_container(&self, container: &str) -> bool {
        self.containers.read().contains(container)
    }

    /// Returns the number of stored objects.
    #[must_use]
    pub fn len(&self) -> usize {
        self.objects.read().len()
    }

    /// Returns true if no object is stored.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.objects.read().is_empty()
    }
}

impl BlobStore for InMemoryBlobStore {
    fn exists(&self, locator: &Locator) -> StorageResult<bool> {
        Ok(self.objects.read().contains_key(locator))
    }

    fn open_reader(&self, locator: &Locator) -> StorageResult<Option<BlobReader>> {
        Ok(self
            .objects
            .read()
            .get(locator)
            .map(|data| Box::new(Cursor::new(data.clone())) as BlobReader))
    }

    fn write_all(&self, locator: &Locator, data: &[u8]) -> StorageResult<()> {
        if !self.has_container(locator.container()) {
            return Err(StorageError::ContainerNotFound {
                container: locator.container().to_string(),
            });
        }
        self.objects.write().insert(locator.clone(), data.to_vec());
        Ok(())
    }

    fn ensure_container(&self, container: &str) -> StorageResult<()> {
        if container.is_empty() {
            return Err(StorageError::invalid_locator("container name is empty"));
        }
        self.containers.write().insert(container.to_string());
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Read;

    fn locator() -> Locator {
        Locator::new("bucket", "users.csv")
    }

    fn read_all(store: &InMemoryBlobStore, locator: &Locator) -> Vec<u8> {
        let mut data = Vec::new();
        store
            .open_reader(locator)
            .unwrap()
            .unwrap()
            .read_to_end(&mut data)
            .unwrap();
        data
    }

    #[test]
    fn memory_new_is_empty() {
        let store = InMemoryBlobStore::new();
        assert!(store.is_empty());
        assert!(!store.exists(&locator()).unwrap());
        assert!(store.open_reader(&locator()).unwrap().is_none());
    }

    #[test]
    fn memory_write_requires_container() {
        let store = InMemoryBlobStore::new();
        let result = store.write_all(&locator(), b"data");
        assert!(matches!(result, Err(StorageError::ContainerNotFound { .. })));
    }

    #[test]
    fn memory_write_and_read() {
        let store = InMemoryBlobStore::new();
        store.ensure_container("bucket").unwrap();
        store.write_all(&locator(), b"hello").unwrap();

        assert!(store.exists(&locator()).unwrap());
        assert_eq!(read_all(&store, &locator()), b"hello");
    }

    #[test]
    fn memory_write_replaces_whole_object() {
        let store = InMemoryBlobStore::with_object(&locator(), b"old content".to_vec());
        store.write_all(&locator(), b"new").unwrap();
        assert_eq!(store.object(&locator()).unwrap(), b"new");
        assert_eq!(store.len(), 1);
    }

    #[test]
    fn memory_reader_is_isolated_from_later_writes() {
        let store = InMemoryBlobStore::with_object(&locator(), b"before".to_vec());
        let mut reader = store.open_reader(&locator()).unwrap().unwrap();
        store.write_all(&locator(), b"after").unwrap();

        let mut seen = String::new();
        reader.read_to_string(&mut seen).unwrap();
        assert_eq!(seen, "before");
    }

    #[test]
    fn memory_ensure_container_is_idempotent() {
        let store = InMemoryBlobStore::new();
        store.ensure_container("bucket").unwrap();
        store.ensure_container("bucket").unwrap();
        assert!(store.has_container("bucket"));
    }

    #[test]
    fn memory_empty_container_name_fails() {
        let store = InMemoryBlobStore::new();
        assert!(matches!(
            store.ensure_container(""),
            Err(StorageError::InvalidLocator(_))
        ));
    }
}
