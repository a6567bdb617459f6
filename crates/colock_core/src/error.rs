//! Error types for the concurrency policy layer.

use colock_store::{Conflict, ObjectId, StoreError};
use thiserror::Error;

/// Result type for concurrency operations.
pub type ConcurrencyResult<T> = Result<T, ConcurrencyError>;

/// Errors surfaced by the concurrency manager.
///
/// Exactly two of these are expected, user-facing conflict shapes, both
/// under [`ConcurrencyError::Conflict`]. Everything else is either a policy
/// violation ([`ConcurrencyError::LockRequired`]) or an unexpected failure
/// of a collaborator.
#[derive(Debug, Error)]
pub enum ConcurrencyError {
    /// An expected concurrency conflict; passes through from the lock
    /// store or commit-time validation unmodified.
    #[error(transparent)]
    Conflict(#[from] Conflict),

    /// No lock is held on the object and the persist policy requires one.
    #[error("no lock held on {object_id} and the persist policy requires one")]
    LockRequired {
        /// The object that was about to be written.
        object_id: ObjectId,
    },

    /// The lock store failed for a reason other than a conflict.
    #[error("lock store error: {0}")]
    Store(StoreError),

    /// The entity source collaborator failed to load current state.
    #[error("entity source error: {message}")]
    Source {
        /// Description of the failure.
        message: String,
    },
}

impl ConcurrencyError {
    /// Creates a lock-required policy error.
    #[must_use]
    pub fn lock_required(object_id: ObjectId) -> Self {
        Self::LockRequired { object_id }
    }

    /// Creates an entity source error.
    pub fn source(message: impl Into<String>) -> Self {
        Self::Source {
            message: message.into(),
        }
    }

    /// Returns true if this is one of the two expected conflict shapes.
    #[must_use]
    pub fn is_conflict(&self) -> bool {
        matches!(self, Self::Conflict(_))
    }
}

impl From<StoreError> for ConcurrencyError {
    fn from(err: StoreError) -> Self {
        // Conflicts keep their shape through this layer; only genuinely
        // unexpected store failures are wrapped.
        match err {
            StoreError::Conflict(conflict) => Self::Conflict(conflict),
            other => Self::Store(other),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use colock_store::{Lock, Owner, SessionId};

    #[test]
    fn store_conflicts_pass_through_unchanged() {
        let lock = Lock::pessimistic(
            ObjectId::new("Document", "42"),
            Owner::new("alice", SessionId::new()),
        );
        let store_err = StoreError::from(Conflict::pessimistic(lock.clone()));

        let err = ConcurrencyError::from(store_err);
        assert!(err.is_conflict());
        match err {
            ConcurrencyError::Conflict(Conflict::Pessimistic { lock: carried }) => {
                assert_eq!(carried, lock);
            }
            other => panic!("expected pessimistic conflict, got {other:?}"),
        }
    }

    #[test]
    fn integrity_errors_are_not_conflicts() {
        let err = ConcurrencyError::from(StoreError::integrity("duplicate pessimistic lock"));
        assert!(!err.is_conflict());
        assert!(matches!(err, ConcurrencyError::Store(_)));
    }
}
