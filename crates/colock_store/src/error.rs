//! Error types for lock store operations.

use crate::lock::Lock;
use crate::types::EntityState;
use thiserror::Error;

/// Result type for lock store operations.
pub type StoreResult<T> = Result<T, StoreError>;

/// An expected, user-facing concurrency conflict.
///
/// These are the only two conflict shapes the subsystem ever surfaces.
/// They carry everything the caller needs to report or resolve the
/// situation; retry, merge, and backoff policy belong entirely to the
/// caller.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum Conflict {
    /// Another owner already holds the exclusive lock. Carries that lock so
    /// the caller can report who is editing and since when.
    #[error("already locked: {lock}")]
    Pessimistic {
        /// The conflicting lock.
        lock: Lock,
    },

    /// The entity changed, or was deleted, since the caller's snapshot was
    /// taken. Carries the current persisted state (`None` if deleted) so
    /// the caller can offer merge, overwrite, or abandon.
    #[error("stale snapshot: entity changed since the lock was taken")]
    Optimistic {
        /// The authoritative current state, or `None` if the entity was
        /// deleted.
        current_state: Option<EntityState>,
    },
}

impl Conflict {
    /// Creates a pessimistic conflict carrying the holding lock.
    #[must_use]
    pub fn pessimistic(lock: Lock) -> Self {
        Self::Pessimistic { lock }
    }

    /// Creates an optimistic conflict carrying the current state.
    #[must_use]
    pub fn optimistic(current_state: Option<EntityState>) -> Self {
        Self::Optimistic { current_state }
    }
}

/// Errors that can occur in lock store operations.
#[derive(Debug, Error)]
pub enum StoreError {
    /// An expected concurrency conflict.
    #[error(transparent)]
    Conflict(#[from] Conflict),

    /// The lock table contains state that violates its invariants, e.g. two
    /// pessimistic locks for one object. Indicates a defect in whatever
    /// produced the persisted records, never a normal business condition.
    #[error("lock table integrity violation: {message}")]
    Integrity {
        /// Description of the violated invariant.
        message: String,
    },

    /// A persisted lock record could not be decoded.
    #[error("lock record codec error: {message}")]
    Codec {
        /// Description of the failure.
        message: String,
    },
}

impl StoreError {
    /// Creates an integrity violation error.
    pub fn integrity(message: impl Into<String>) -> Self {
        Self::Integrity {
            message: message.into(),
        }
    }

    /// Creates a codec error.
    pub fn codec(message: impl Into<String>) -> Self {
        Self::Codec {
            message: message.into(),
        }
    }

    /// Returns true if this is one of the two expected conflict shapes.
    #[must_use]
    pub fn is_conflict(&self) -> bool {
        matches!(self, Self::Conflict(_))
    }
}
