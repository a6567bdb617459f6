//! # colock core
//!
//! Concurrency policy facade for colock.
//!
//! This crate arbitrates simultaneous edits to the same persisted entity
//! across independent user sessions. It provides:
//! - Lock acquisition and release policy over a shared [`LockStore`]
//! - Optimistic state-diff validation at commit time (`check_persist`)
//! - The conflict taxonomy surfaced to callers
//!
//! Bookkeeping lives in `colock_store`; this crate decides *when* locks are
//! taken, seeds optimistic snapshots from the [`EntitySource`] collaborator,
//! and re-validates them immediately before writes are flushed.
//!
//! ## Example
//!
//! ```rust
//! use std::sync::Arc;
//! use colock_core::{ConcurrencyManager, MemorySource};
//! use colock_core::{EntityState, LockKind, ObjectId, Owner, SessionId, TableLockStore};
//!
//! let source = Arc::new(MemorySource::new());
//! let book = ObjectId::new("Book", "7");
//! source.put(book.clone(), EntityState::from(&b"title=A"[..]));
//!
//! let manager = ConcurrencyManager::new(Arc::new(TableLockStore::new()), source);
//! let alice = Owner::new("alice", SessionId::new());
//!
//! manager.acquire_lock(&alice, &book, LockKind::Optimistic, None).unwrap();
//! // ... the user edits ...
//! manager.check_persist(&alice, &book).unwrap();
//! ```

#![deny(unsafe_code)]
#![warn(missing_docs)]

mod config;
mod error;
mod manager;
mod source;

pub use config::{ConcurrencyConfig, PersistPolicy};
pub use error::{ConcurrencyError, ConcurrencyResult};
pub use manager::ConcurrencyManager;
pub use source::{EntitySource, MemorySource};

// Re-export the data model so embedders depend on one crate.
pub use colock_store::{
    Conflict, EntityState, Lock, LockKind, LockRecord, LockStore, NoOpLockStore, ObjectId, Owner,
    SessionId, StoreError, StoreResult, StoreStats, TableLockStore, Timestamp,
};
