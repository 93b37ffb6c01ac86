//! # csvstore storage
//!
//! Blob store trait and implementations for csvstore.
//!
//! This crate provides the lowest-level storage abstraction: a container of
//! named objects, each an opaque byte blob. Stores never interpret the bytes
//! they hold and never patch an object in place.
//!
//! ## Design Principles
//!
//! - An object is always replaced as a whole (`write_all`)
//! - Readers see either the old or the new object, never a partial one
//! - Must be `Send + Sync` so one store can back several record stores
//!
//! ## Available Stores
//!
//! - [`InMemoryBlobStore`] - For testing and ephemeral storage
//! - [`FileBlobStore`] - A local directory acting as an object store
//!
//! ## Example
//!
//! ```rust
//! use csvstore_storage::{BlobStore, InMemoryBlobStore, Locator};
//! use std::io::Read;
//!
//! let store = InMemoryBlobStore::new();
//! let locator = Locator::new("accounts", "users.csv");
//! store.ensure_container(locator.container()).unwrap();
//! store.write_all(&locator, b"id;name\r\n").unwrap();
//!
//! let mut text = String::new();
//! store.open_reader(&locator).unwrap().unwrap().read_to_string(&mut text).unwrap();
//! assert_eq!(text, "id;name\r\n");
//! ```

#![deny(unsafe_code)]
#![warn(missing_docs)]

mod backend;
mod error;
mod file;
mod memory;

pub use backend::{BlobReader, BlobStore, Locator};
pub use error::{StorageError, StorageResult};
pub use file::FileBlobStore;
pub use memory::InMemoryBlobStore;
