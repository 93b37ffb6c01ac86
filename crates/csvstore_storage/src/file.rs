//! Directory-backed blob store.

use crate::backend::{BlobReader, BlobStore, Locator};
use crate::error::{StorageError, StorageResult};
use fs2::FileExt;
use std::fs::{self, File, OpenOptions};
use std::io::{self, Write};
use std::path::{Component, Path, PathBuf};

/// Advisory lock file kept in every container directory.
const LOCK_FILE: &str = ".lock";
/// Suffix of the staging file written before the atomic rename.
const TEMP_SUFFIX: &str = ".tmp";

/// A blob store rooted at a local directory.
///
/// The layout mirrors an object store:
///
/// ```text
/// <root>/
/// └─ <container>/
///    ├─ .lock        # Advisory lock held while an object is replaced
///    └─ <key>        # One object per file
/// ```
///
/// # Durability
///
/// `write_all` writes a staging file, syncs it and renames it over the
/// object, so readers never see a partially written object.
///
/// # Example
///
/// ```no_run
/// use csvstore_storage::{BlobStore, FileBlobStore, Locator};
/// use std::path::Path;
///
/// let store = FileBlobStore::new(Path::new("/var/lib/csvstore"));
/// let locator = Locator::new("accounts", "users.csv");
/// store.ensure_container(locator.container()).unwrap();
/// store.write_all(&locator, b"id;name\r\n").unwrap();
/// ```
#[derive(Debug, Clone)]
pub struct FileBlobStore {
    root: PathBuf,
}

impl FileBlobStore {
    /// Creates a store rooted at `root`. The directory is created lazily.
    #[must_use]
    pub fn new(root: &Path) -> Self {
        Self {
            root: root.to_path_buf(),
        }
    }

    /// Returns the root directory.
    #[must_use]
    pub fn root(&self) -> &Path {
        &self.root
    }

    /// Returns the file path backing `locator`.
    ///
    /// # Errors
    ///
    /// Returns an error if the container or key would escape the root.
    pub fn object_path(&self, locator: &Locator) -> StorageResult<PathBuf> {
        Ok(self
            .container_path(locator.container())?
            .join(checked_name(locator.key())?))
    }

    fn container_path(&self, container: &str) -> StorageResult<PathBuf> {
        Ok(self.root.join(checked_name(container)?))
    }
}

/// Accepts a single normal path component only.
fn checked_name(name: &str) -> StorageResult<&str> {
    let mut components = Path::new(name).components();
    match (components.next(), components.next()) {
        (Some(Component::Normal(_)), None) if name != LOCK_FILE => Ok(name),
        _ => Err(StorageError::invalid_locator(format!(
            "'{name}' is not a plain object name"
        ))),
    }
}

impl BlobStore for FileBlobStore {
    fn exists(&self, locator: &Locator) -> StorageResult<bool> {
        Ok(self.object_path(locator)?.is_file())
    }

    fn open_reader(&self, locator: &Locator) -> StorageResult<Option<BlobReader>> {
        let path = self.object_path(locator)?;
        match File::open(&path) {
            Ok(file) => Ok(Some(Box::new(io::BufReader::new(file)))),
            Err(e) if e.kind() == io::ErrorKind::NotFound => Ok(None),
            Err(e) => Err(e.into()),
        }
    }

    fn write_all(&self, locator: &Locator, data: &[u8]) -> StorageResult<()> {
        let container = self.container_path(locator.container())?;
        if !container.is_dir() {
            return Err(StorageError::ContainerNotFound {
                container: locator.container().to_string(),
            });
        }

        let lock_file = OpenOptions::new()
            .read(true)
            .write(true)
            .create(true)
            .truncate(false)
            .open(container.join(LOCK_FILE))?;
        lock_file.lock_exclusive()?;

        let target = self.object_path(locator)?;
        let staging = container.join(format!("{}{TEMP_SUFFIX}", locator.key()));
        let result = (|| -> io::Result<()> {
            let mut file = File::create(&staging)?;
            file.write_all(data)?;
            file.sync_all()?;
            fs::rename(&staging, &target)
        })();

        if result.is_err() {
            let _ = fs::remove_file(&staging);
        }
        if let Err(e) = FileExt::unlock(&lock_file) {
            tracing::warn!(container = %locator.container(), error = %e, "failed to release container lock");
        }

        result?;
        tracing::debug!(object = %locator, bytes = data.len(), "object replaced");
        Ok(())
    }

    fn ensure_container(&self, container: &str) -> StorageResult<()> {
        if container.is_empty() {
            return Err(StorageError::invalid_locator("container name is empty"));
        }
        let path = self.container_path(container)?;
        if !path.is_dir() {
            fs::create_dir_all(&path)?;
            tracing::info!(container, "created container");
        }
        Ok(())
    }
}
