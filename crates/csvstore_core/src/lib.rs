//! # csvstore core
//!
//! Record store whose durable medium is one delimited text file held in a
//! blob store.
//!
//! This crate provides:
//! - Dialect handling for parsing and printing rows
//! - Header inference and schema validation
//! - A record codec between rows and typed objects
//! - Whole-file create/update/delete under one critical section
//! - Snapshot-diff synchronization producing ordered change events
//!
//! ## Example
//!
//! ```rust
//! use csvstore_core::{Attribute, CriticalSection, Processor, StoreConfig};
//! use csvstore_storage::InMemoryBlobStore;
//! use std::sync::Arc;
//!
//! let config = StoreConfig::new("accounts", "users.csv").unique_attribute("id");
//! let store = Processor::open(
//!     config,
//!     Arc::new(InMemoryBlobStore::new()),
//!     Arc::new(CriticalSection::new()),
//! )
//! .unwrap();
//!
//! let uid = store
//!     .create(vec![Attribute::plain("id", "1"), Attribute::plain("mail", "a@example.com")])
//!     .unwrap();
//! assert_eq!(uid, "1");
//! ```

#![deny(unsafe_code)]
#![warn(missing_docs)]

mod config;
mod connector;
mod crud;
mod dialect;
mod error;
mod header;
mod lock;
mod processor;
mod record;
mod schema;
mod sync;
mod value;

pub use config::{ConnectorConfig, StoreConfig, ValidatedConfig, DEFAULT_OBJECT_CLASS};
pub use connector::Connector;
pub use dialect::{Dialect, QuoteMode, RecordSeparator, RowReader, RowWriter};
pub use error::{CoreError, CoreResult};
pub use header::{infer_header, Column, ColumnMap, DEFAULT_COLUMN_PREFIX};
pub use lock::{CriticalSection, CriticalSectionGuard};
pub use processor::Processor;
pub use record::{RecordCodec, Row, StoreObject};
pub use schema::{AttributeInfo, AttributeNames, ColumnRole, ObjectClassInfo, RecordLayout, ValueType};
pub use sync::{ChangeEvent, ChangeKind, Snapshot, SnapshotStore, SyncCollector, SyncHandler, SyncToken};
pub use value::{
    Attribute, Secret, Value, NAME_ATTRIBUTE, PASSWORD_ATTRIBUTE, UID_ATTRIBUTE,
};

/// Crate version, as published.
pub const VERSION: &str = env!("CARGO_PKG_VERSION");
