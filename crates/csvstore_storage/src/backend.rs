//! Blob store trait definition.

use crate::error::StorageResult;
use std::fmt;
use std::io::Read;

/// A readable byte stream over one stored object.
pub type BlobReader = Box<dyn Read + Send>;

/// Address of one object: a container (bucket) and a key inside it.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct Locator {
    container: String,
    key: String,
}

impl Locator {
    /// Creates a locator for `key` inside `container`.
    pub fn new(container: impl Into<String>, key: impl Into<String>) -> Self {
        Self {
            container: container.into(),
            key: key.into(),
        }
    }

    /// Returns the container name.
    #[must_use]
    pub fn container(&self) -> &str {
        &self.container
    }

    /// Returns the object key.
    #[must_use]
    pub fn key(&self) -> &str {
        &self.key
    }
}

impl fmt::Display for Locator {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}/{}", self.container, self.key)
    }
}

/// A remote object store holding whole-file blobs.
///
/// Stores are **opaque byte stores**. They know nothing about delimited
/// text; callers always materialize a complete buffer before writing.
///
/// # Invariants
///
/// - `write_all` replaces the object atomically: a concurrent
///   `open_reader` observes either the previous or the new content
/// - `open_reader` returns `None` when the object does not exist
/// - Stores must be `Send + Sync` for concurrent access
///
/// # Implementors
///
/// - [`super::InMemoryBlobStore`] - For testing
/// - [`super::FileBlobStore`] - For a local directory
pub trait BlobStore: Send + Sync {
    /// Returns true if the object exists and can be read.
    ///
    /// # Errors
    ///
    /// Returns an error if the store cannot be queried.
    fn exists(&self, locator: &Locator) -> StorageResult<bool>;

    /// Opens a reader over the whole object, or `None` if it does not exist.
    ///
    /// # Errors
    ///
    /// Returns an error if the object exists but cannot be opened.
    fn open_reader(&self, locator: &Locator) -> StorageResult<Option<BlobReader>>;

    /// Replaces the object with `data`, creating it if needed.
    ///
    /// # Errors
    ///
    /// Returns an error if the container does not exist or the write fails.
    /// On error the previous object is left unchanged.
    fn write_all(&self, locator: &Locator, data: &[u8]) -> StorageResult<()>;

    /// Creates the container if it does not exist yet.
    ///
    /// # Errors
    ///
    /// Returns an error if the container cannot be created.
    fn ensure_container(&self, container: &str) -> StorageResult<()>;
}
