//! Snapshot-diff synchronization.
//!
//! Every sync call copies the live file into a snapshot named after a fresh
//! token and diffs it against the snapshot of the token it was given.
//! Creates and updates are reported in live-file order, deletes afterwards
//! in previous-snapshot order.

use crate::dialect::Dialect;
use crate::error::{CoreError, CoreResult};
use crate::header::{infer_header, ColumnMap};
use crate::processor::Processor;
use crate::record::{RecordCodec, Row, StoreObject};
use csvstore_storage::Locator;
use parking_lot::Mutex;
use sha2::{Digest, Sha256};
use std::borrow::Cow;
use std::collections::HashMap;
use std::fmt;
use std::io::{self, Read};
use std::path::{Path, PathBuf};
use std::time::{SystemTime, UNIX_EPOCH};

/// Watermark naming one snapshot: milliseconds since the Unix epoch.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct SyncToken(u64);

impl SyncToken {
    /// Wraps a raw millisecond value.
    pub const fn new(millis: u64) -> Self {
        Self(millis)
    }

    /// Parses the wire form: exactly 13 decimal digits.
    ///
    /// Anything else is treated as "no prior token" and yields `None`.
    pub fn parse(text: &str) -> Option<Self> {
        if text.len() != 13 || !text.bytes().all(|b| b.is_ascii_digit()) {
            return None;
        }
        text.parse().ok().map(Self)
    }

    /// Raw millisecond value.
    pub const fn value(self) -> u64 {
        self.0
    }
}

impl fmt::Display for SyncToken {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// Kind of a detected change.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ChangeKind {
    /// The record appeared.
    Create,
    /// The record's row changed.
    Update,
    /// The record disappeared.
    Delete,
}

impl fmt::Display for ChangeKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            ChangeKind::Create => "CREATE",
            ChangeKind::Update => "UPDATE",
            ChangeKind::Delete => "DELETE",
        })
    }
}

/// One change between two snapshots.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ChangeEvent {
    /// What happened.
    pub kind: ChangeKind,
    /// Token of the snapshot the change was observed in.
    pub token: SyncToken,
    /// The record, as of the live file for creates and updates and as of the
    /// previous snapshot for deletes.
    pub object: StoreObject,
}

/// Receives change events.
pub trait SyncHandler {
    /// Handles one event. Returning false stops the sync.
    fn handle(&mut self, event: ChangeEvent) -> bool;

    /// Called instead of [`SyncHandler::handle`] when nothing changed, or
    /// when there was no usable previous snapshot.
    fn handle_token(&mut self, _token: SyncToken) {}
}

impl<F> SyncHandler for F
where
    F: FnMut(ChangeEvent) -> bool,
{
    fn handle(&mut self, event: ChangeEvent) -> bool {
        self(event)
    }
}

/// Handler collecting everything it receives.
#[derive(Debug, Default)]
pub struct SyncCollector {
    /// Events, in delivery order.
    pub events: Vec<ChangeEvent>,
    /// Tokens delivered without events.
    pub tokens: Vec<SyncToken>,
    limit: Option<usize>,
}

impl SyncCollector {
    /// Creates a collector accepting every event.
    pub fn new() -> Self {
        Self::default()
    }

    /// Creates a collector that stops the sync after `limit` events.
    pub fn with_limit(limit: usize) -> Self {
        Self {
            limit: Some(limit),
            ..Self::default()
        }
    }
}

impl SyncHandler for SyncCollector {
    fn handle(&mut self, event: ChangeEvent) -> bool {
        self.events.push(event);
        self.limit.map_or(true, |limit| self.events.len() < limit)
    }

    fn handle_token(&mut self, token: SyncToken) {
        self.tokens.push(token);
    }
}

/// A parsed copy of the file at one point in time.
#[derive(Debug, Clone)]
pub struct Snapshot {
    token: SyncToken,
    columns: ColumnMap,
    rows: Vec<Row>,
}

impl Snapshot {
    /// Parses file contents. Empty contents stand for a missing file.
    ///
    /// # Errors
    ///
    /// Fails when the contents cannot be parsed.
    pub fn parse(dialect: &Dialect, token: SyncToken, data: &[u8]) -> CoreResult<Self> {
        if data.is_empty() {
            return Ok(Self {
                token,
                columns: ColumnMap::new(),
                rows: Vec::new(),
            });
        }
        let columns = infer_header(dialect, Some(data))?;
        let rows = dialect.data_rows(data).collect::<CoreResult<Vec<_>>>()?;
        Ok(Self {
            token,
            columns,
            rows,
        })
    }

    /// Token naming the snapshot.
    pub fn token(&self) -> SyncToken {
        self.token
    }

    /// Header of the snapshot.
    pub fn columns(&self) -> &ColumnMap {
        &self.columns
    }

    /// Data rows in file order.
    pub fn rows(&self) -> &[Row] {
        &self.rows
    }

    fn ensure_header(&self, expected: &ColumnMap) -> CoreResult<()> {
        if self.columns.is_empty() && self.rows.is_empty() {
            return Ok(());
        }
        if &self.columns != expected {
            return Err(CoreError::header_mismatch(format!(
                "header of snapshot {} doesn't match the store header",
                self.token
            )));
        }
        Ok(())
    }
}

/// Directory of snapshot files named `<file>.<store-id>.sync.<token>`.
///
/// The store id is derived from the object class and the full locator, so
/// stores sharing a directory and a file name never read each other's
/// snapshots.
#[derive(Debug)]
pub struct SnapshotStore {
    dir: PathBuf,
    file_name: String,
    last: Mutex<u64>,
}

impl SnapshotStore {
    /// Creates a store keeping snapshots of the file at `locator`, served
    /// as `object_class`, in `dir`.
    pub fn new(dir: &Path, object_class: &str, locator: &Locator) -> Self {
        let mut hasher = Sha256::new();
        for part in [object_class, locator.container(), locator.key()] {
            hasher.update((part.len() as u64).to_le_bytes());
            hasher.update(part.as_bytes());
        }
        let store_id: String = hasher.finalize()[..8].iter().map(|b| format!("{b:02x}")).collect();
        Self {
            dir: dir.to_path_buf(),
            file_name: format!("{}.{store_id}", locator.key().replace(['/', '\\'], "_")),
            last: Mutex::new(0),
        }
    }

    /// Path of the snapshot for `token`.
    pub fn path(&self, token: SyncToken) -> PathBuf {
        self.dir.join(format!("{}.sync.{token}", self.file_name))
    }

    /// Returns a token for "now", strictly greater than every token minted
    /// before by this store.
    pub fn mint(&self) -> SyncToken {
        let now = SystemTime::now()
            .duration_since(UNIX_EPOCH)
            .map_or(0, |elapsed| u64::try_from(elapsed.as_millis()).unwrap_or(u64::MAX));
        let mut last = self.last.lock();
        *last = now.max(*last + 1);
        SyncToken(*last)
    }

    /// Writes a snapshot.
    ///
    /// # Errors
    ///
    /// Returns an I/O error if the file cannot be written.
    pub fn save(&self, token: SyncToken, data: &[u8]) -> CoreResult<()> {
        std::fs::create_dir_all(&self.dir)?;
        let path = self.path(token);
        std::fs::write(&path, data)?;
        tracing::info!(path = %path.display(), bytes = data.len(), "saved sync snapshot");
        Ok(())
    }

    /// Reads a snapshot, `None` if it doesn't exist.
    ///
    /// # Errors
    ///
    /// Returns an I/O error if the file exists but cannot be read.
    pub fn load(&self, token: SyncToken) -> CoreResult<Option<Vec<u8>>> {
        match std::fs::read(self.path(token)) {
            Ok(data) => Ok(Some(data)),
            Err(e) if e.kind() == io::ErrorKind::NotFound => Ok(None),
            Err(e) => Err(e.into()),
        }
    }

    /// Deletes a snapshot. Failures are logged and otherwise ignored.
    pub fn remove(&self, token: SyncToken) {
        let path = self.path(token);
        match std::fs::remove_file(&path) {
            Ok(()) => tracing::info!(path = %path.display(), "deleted sync snapshot"),
            Err(e) if e.kind() == io::ErrorKind::NotFound => {}
            Err(e) => tracing::warn!(path = %path.display(), error = %e, "failed to delete sync snapshot"),
        }
    }
}

impl Processor {
    fn read_file(&self) -> CoreResult<Vec<u8>> {
        let mut data = Vec::new();
        if let Some(mut reader) = self.open_file()? {
            reader.read_to_end(&mut data)?;
        }
        Ok(data)
    }

    /// Captures the live file and returns the token naming the capture.
    ///
    /// # Errors
    ///
    /// Fails when the file or the snapshot cannot be accessed.
    pub fn latest_sync_token(&self) -> CoreResult<SyncToken> {
        let data = self.read_file()?;
        let token = self.snapshots.mint();
        self.snapshots.save(token, &data)?;
        tracing::info!(object_class = %self.config.object_class, %token, "synchronizing from now");
        Ok(token)
    }

    /// Reports every change since the snapshot named by `token` and returns
    /// the token of the new snapshot.
    ///
    /// An unknown or malformed `token` starts over: the live file is
    /// captured and only the new token is reported.
    ///
    /// # Errors
    ///
    /// Fails with `HeaderMismatch` when a snapshot header differs from the
    /// store header, `DuplicateKey` when the previous snapshot repeats an
    /// identifier and `MissingKey` when a row lacks one.
    pub fn sync<H>(&self, token: &str, handler: &mut H) -> CoreResult<SyncToken>
    where
        H: SyncHandler + ?Sized,
    {
        let previous = match SyncToken::parse(token) {
            Some(previous) => self.snapshots.load(previous)?.map(|data| (previous, data)),
            None => None,
        };
        let Some((previous_token, previous_data)) = previous else {
            tracing::error!(token, "couldn't find previous snapshot to diff against, starting from now");
            let token = self.latest_sync_token()?;
            handler.handle_token(token);
            return Ok(token);
        };

        let live_data = self.read_file()?;
        let live_token = self.snapshots.mint();
        self.snapshots.save(live_token, &live_data)?;

        let result = self.diff(previous_token, &previous_data, live_token, &live_data, handler);
        match result {
            Ok(changes) => {
                self.snapshots.remove(previous_token);
                tracing::info!(from = %previous_token, to = %live_token, changes, "sync finished");
                Ok(live_token)
            }
            Err(e) => {
                self.snapshots.remove(live_token);
                Err(e)
            }
        }
    }

    fn diff<H>(
        &self,
        previous_token: SyncToken,
        previous_data: &[u8],
        live_token: SyncToken,
        live_data: &[u8],
        handler: &mut H,
    ) -> CoreResult<usize>
    where
        H: SyncHandler + ?Sized,
    {
        let layout = self.layout();
        let dialect = &self.config.dialect;
        let codec = RecordCodec::new(&layout, dialect, self.config.read_only);

        let live = Snapshot::parse(dialect, live_token, live_data)?;
        live.ensure_header(layout.columns())?;
        let previous = Snapshot::parse(dialect, previous_token, previous_data)?;
        previous.ensure_header(layout.columns())?;

        let mut index: HashMap<Cow<'_, str>, usize> = HashMap::with_capacity(previous.rows().len());
        for (position, row) in previous.rows().iter().enumerate() {
            let uid = codec
                .uid_of(row)
                .ok_or(CoreError::MissingKey { row: row.line() })?;
            if index.insert(dialect.uid_key(uid), position).is_some() {
                return Err(CoreError::duplicate_key(uid));
            }
        }

        let mut consumed = vec![false; previous.rows().len()];
        let mut changes = 0usize;
        let mut emit = |kind: ChangeKind, row: &Row| -> CoreResult<bool> {
            let event = ChangeEvent {
                kind,
                token: live_token,
                object: codec.decode(row)?,
            };
            tracing::debug!(kind = %kind, uid = %event.object.uid, "created delta");
            changes += 1;
            Ok(handler.handle(event))
        };

        let mut proceed = true;
        for row in live.rows() {
            let uid = codec
                .uid_of(row)
                .ok_or(CoreError::MissingKey { row: row.line() })?;
            let kind = match index.get(&*dialect.uid_key(uid)) {
                None => ChangeKind::Create,
                Some(&position) => {
                    consumed[position] = true;
                    if previous.rows()[position].cells() == row.cells() {
                        continue;
                    }
                    ChangeKind::Update
                }
            };
            if !emit(kind, row)? {
                proceed = false;
                break;
            }
        }

        if proceed {
            for (row, _) in previous.rows().iter().zip(&consumed).filter(|(_, used)| !**used) {
                if !emit(ChangeKind::Delete, row)? {
                    break;
                }
            }
        }

        drop(emit);
        if changes == 0 {
            handler.handle_token(live_token);
        }
        Ok(changes)
    }
}
