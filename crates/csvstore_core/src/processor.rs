//! The record store serving one object class.

use crate::config::{StoreConfig, ValidatedConfig};
use crate::error::{CoreError, CoreResult};
use crate::header::infer_header;
use crate::lock::CriticalSection;
use crate::record::{RecordCodec, StoreObject};
use crate::schema::{ObjectClassInfo, RecordLayout};
use crate::sync::SnapshotStore;
use crate::value::Secret;
use csvstore_storage::{BlobReader, BlobStore};
use parking_lot::RwLock;
use std::sync::Arc;

/// Record store over one delimited file.
///
/// The header is inferred once at [`Processor::open`]. Reads parse the whole
/// file on every call; writes rewrite it inside the shared critical section.
pub struct Processor {
    pub(crate) source: StoreConfig,
    pub(crate) config: ValidatedConfig,
    pub(crate) store: Arc<dyn BlobStore>,
    pub(crate) section: Arc<CriticalSection>,
    pub(crate) layout: RwLock<RecordLayout>,
    pub(crate) snapshots: SnapshotStore,
}

impl Processor {
    /// Validates `config`, prepares the container and infers the header.
    ///
    /// # Errors
    ///
    /// Fails on invalid configuration, an unreadable or empty existing file,
    /// or a header lacking the configured columns.
    pub fn open(
        config: StoreConfig,
        store: Arc<dyn BlobStore>,
        section: Arc<CriticalSection>,
    ) -> CoreResult<Self> {
        let source = config;
        let config = source.validate()?;
        let columns = {
            let _guard = section.enter();
            Self::verify_storage(&config, store.as_ref())?;
            infer_header(&config.dialect, store.open_reader(&config.locator)?)?
        };
        let layout = RecordLayout::new(columns, config.names.clone())?;
        let snapshots = SnapshotStore::new(&config.snapshot_dir, &config.object_class, &config.locator);

        tracing::info!(
            object_class = %config.object_class,
            file = %config.locator,
            columns = layout.width(),
            read_only = config.read_only,
            "opened record store"
        );

        Ok(Self {
            source,
            config,
            store,
            section,
            layout: RwLock::new(layout),
            snapshots,
        })
    }

    fn verify_storage(config: &ValidatedConfig, store: &dyn BlobStore) -> CoreResult<()> {
        if config.read_only {
            if !store.exists(&config.locator)? {
                tracing::warn!(file = %config.locator, "backing file doesn't exist");
            }
        } else {
            store.ensure_container(config.locator.container())?;
        }
        Ok(())
    }

    /// Object class served by this store.
    pub fn object_class(&self) -> &str {
        &self.config.object_class
    }

    /// The validated configuration.
    pub fn config(&self) -> &ValidatedConfig {
        &self.config
    }

    /// A copy of the current layout.
    pub fn layout(&self) -> RecordLayout {
        self.layout.read().clone()
    }

    pub(crate) fn open_file(&self) -> CoreResult<Option<BlobReader>> {
        Ok(self.store.open_reader(&self.config.locator)?)
    }

    /// Describes the object class and its attributes.
    pub fn schema(&self) -> ObjectClassInfo {
        ObjectClassInfo {
            name: self.config.object_class.clone(),
            container: self.config.container,
            auxiliary: self.config.auxiliary,
            attributes: self.layout.read().attribute_info(),
        }
    }

    /// Checks that the configuration is still valid and the store is still
    /// usable.
    ///
    /// # Errors
    ///
    /// Fails on invalid configuration, when the backing file cannot be read
    /// or when the container cannot be created.
    pub fn test(&self) -> CoreResult<()> {
        self.source.validate()?;
        if self.config.read_only {
            if self.open_file()?.is_none() {
                return Err(CoreError::configuration(format!(
                    "backing file {} doesn't exist or can't be read",
                    self.config.locator
                )));
            }
        } else {
            let _guard = self.section.enter();
            self.store.ensure_container(self.config.locator.container())?;
        }
        tracing::info!(object_class = %self.config.object_class, "test passed");
        Ok(())
    }

    /// Streams objects to `handler` until it returns false.
    ///
    /// With `uid`, only rows whose identifier matches are delivered. A
    /// missing file yields nothing.
    ///
    /// # Errors
    ///
    /// Fails when the file cannot be parsed or a row cannot be decoded.
    pub fn search<F>(&self, uid: Option<&str>, mut handler: F) -> CoreResult<()>
    where
        F: FnMut(StoreObject) -> bool,
    {
        let Some(reader) = self.open_file()? else {
            tracing::warn!(file = %self.config.locator, "returning no results, backing file doesn't exist");
            return Ok(());
        };

        let layout = self.layout();
        let dialect = &self.config.dialect;
        let codec = RecordCodec::new(&layout, dialect, self.config.read_only);
        for row in dialect.data_rows(reader) {
            let row = row?;
            if let Some(uid) = uid {
                match codec.uid_of(&row) {
                    Some(found) if dialect.uid_matches(uid, found) => {}
                    _ => continue,
                }
            }
            if !handler(codec.decode(&row)?) {
                break;
            }
        }
        Ok(())
    }

    /// Returns every object, in file order.
    ///
    /// # Errors
    ///
    /// See [`Processor::search`].
    pub fn list(&self) -> CoreResult<Vec<StoreObject>> {
        let mut objects = Vec::new();
        self.search(None, |object| {
            objects.push(object);
            true
        })?;
        Ok(objects)
    }

    /// Returns the object with the given identifier.
    ///
    /// # Errors
    ///
    /// See [`Processor::search`].
    pub fn get(&self, uid: &str) -> CoreResult<Option<StoreObject>> {
        let mut found = None;
        self.search(Some(uid), |object| {
            found = Some(object);
            false
        })?;
        Ok(found)
    }

    fn find_by_name(&self, username: &str, authenticate: bool) -> CoreResult<StoreObject> {
        let mut found = None;
        self.search(None, |object| {
            if object.name.eq_ignore_ascii_case(username) {
                found = Some(object);
                return false;
            }
            true
        })?;
        found.ok_or_else(|| {
            CoreError::invalid_credential(if authenticate {
                "invalid username and/or password"
            } else {
                "invalid username"
            })
        })
    }

    /// Returns the identifier of the object whose display name is `username`.
    ///
    /// # Errors
    ///
    /// Fails with `InvalidCredential` when `username` is empty or unknown.
    pub fn resolve_username(&self, username: &str) -> CoreResult<String> {
        if username.is_empty() {
            return Err(CoreError::invalid_credential("username must not be empty"));
        }
        Ok(self.find_by_name(username, false)?.uid)
    }

    /// Checks `password` against the stored password of `username`.
    ///
    /// # Errors
    ///
    /// Fails with `Configuration` when no password column is configured,
    /// `InvalidCredential` for an unknown user and `InvalidPassword` when the
    /// stored password is empty or differs.
    pub fn authenticate(&self, username: &str, password: &Secret) -> CoreResult<String> {
        if username.is_empty() {
            return Err(CoreError::invalid_credential("username must not be empty"));
        }
        if self.config.names.password.is_none() {
            return Err(CoreError::configuration(
                "password attribute not defined in configuration",
            ));
        }

        let object = self.find_by_name(username, true)?;
        let stored = object
            .password
            .filter(|stored| !stored.is_empty())
            .ok_or_else(|| {
                CoreError::invalid_password(format!("password not defined for username '{username}'"))
            })?;
        if stored.expose_bytes() != password.expose_bytes() {
            return Err(CoreError::invalid_password("invalid username and/or password"));
        }
        Ok(object.uid)
    }
}

impl std::fmt::Debug for Processor {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Processor")
            .field("object_class", &self.config.object_class)
            .field("locator", &self.config.locator)
            .field("read_only", &self.config.read_only)
            .finish_non_exhaustive()
    }
}
