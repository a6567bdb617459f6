//! # colock store
//!
//! Lock data model and lock store implementations for colock.
//!
//! This crate is the bookkeeping half of the concurrency-control core: it
//! defines what a lock *is* and keeps the shared table of current locks.
//! It carries no business policy - acquisition rules are mechanical table
//! invariants here, and everything about *when* to lock and what to do
//! with a conflict lives in `colock_core`.
//!
//! ## Design Principles
//!
//! - One lock struct with an explicit [`LockKind`] discriminant, not a
//!   type hierarchy
//! - Every check-then-insert is a single atomic operation against the
//!   shared table
//! - Stores must be `Send + Sync`; one instance is shared by all callers
//! - Conflicts are values carried in results, never panics
//!
//! ## Available Stores
//!
//! - [`TableLockStore`] - the shared lock table
//! - [`NoOpLockStore`] - disables locking application-wide
//!
//! ## Example
//!
//! ```rust
//! use colock_store::{LockKind, LockStore, ObjectId, Owner, SessionId, TableLockStore};
//!
//! let store = TableLockStore::new();
//! let alice = Owner::new("alice", SessionId::new());
//! let doc = ObjectId::new("Document", "42");
//!
//! let lock = store.acquire(&doc, LockKind::Pessimistic, &alice, None).unwrap();
//! assert_eq!(store.get(&doc).unwrap(), Some(lock));
//! ```

#![deny(unsafe_code)]
#![warn(missing_docs)]

mod error;
mod lock;
mod noop;
mod record;
mod store;
mod table;
mod types;

pub use error::{Conflict, StoreError, StoreResult};
pub use lock::Lock;
pub use noop::NoOpLockStore;
pub use record::LockRecord;
pub use store::LockStore;
pub use table::{StoreStats, TableLockStore};
pub use types::{EntityState, LockKind, ObjectId, Owner, SessionId, Timestamp};
