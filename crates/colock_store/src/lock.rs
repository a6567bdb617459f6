//! The lock record.

use crate::types::{EntityState, LockKind, ObjectId, Owner, Timestamp};
use std::fmt;

/// A single lock on one persisted entity.
///
/// Identity (kind, object, owner, creation time) is immutable once the lock
/// is created. The snapshot is the only mutable part and is populated for
/// [`LockKind::Optimistic`] locks only: it holds the entity state the lock
/// was last validated against. An optimistic lock taken on a then-absent
/// entity carries `snapshot = None`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Lock {
    kind: LockKind,
    object_id: ObjectId,
    owner: Owner,
    created: Timestamp,
    snapshot: Option<EntityState>,
}

impl Lock {
    /// Creates a fresh optimistic lock with the given baseline snapshot.
    #[must_use]
    pub fn optimistic(object_id: ObjectId, owner: Owner, snapshot: Option<EntityState>) -> Self {
        Self {
            kind: LockKind::Optimistic,
            object_id,
            owner,
            created: Timestamp::now(),
            snapshot,
        }
    }

    /// Creates a fresh pessimistic lock.
    #[must_use]
    pub fn pessimistic(object_id: ObjectId, owner: Owner) -> Self {
        Self {
            kind: LockKind::Pessimistic,
            object_id,
            owner,
            created: Timestamp::now(),
            snapshot: None,
        }
    }

    /// Reassembles a lock from persisted parts.
    ///
    /// A snapshot supplied for a pessimistic lock is dropped; only
    /// optimistic locks carry one.
    #[must_use]
    pub fn from_parts(
        kind: LockKind,
        object_id: ObjectId,
        owner: Owner,
        created: Timestamp,
        snapshot: Option<EntityState>,
    ) -> Self {
        let snapshot = match kind {
            LockKind::Optimistic => snapshot,
            LockKind::Pessimistic => None,
        };
        Self {
            kind,
            object_id,
            owner,
            created,
            snapshot,
        }
    }

    /// Returns the lock discipline.
    #[must_use]
    pub fn kind(&self) -> LockKind {
        self.kind
    }

    /// Returns the locked object.
    #[must_use]
    pub fn object_id(&self) -> &ObjectId {
        &self.object_id
    }

    /// Returns the holder.
    #[must_use]
    pub fn owner(&self) -> &Owner {
        &self.owner
    }

    /// Returns when the lock was created.
    #[must_use]
    pub fn created(&self) -> Timestamp {
        self.created
    }

    /// Returns the baseline snapshot, if any.
    #[must_use]
    pub fn snapshot(&self) -> Option<&EntityState> {
        self.snapshot.as_ref()
    }

    /// Returns true for optimistic locks.
    #[must_use]
    pub fn is_optimistic(&self) -> bool {
        self.kind == LockKind::Optimistic
    }

    /// Returns true for pessimistic locks.
    #[must_use]
    pub fn is_pessimistic(&self) -> bool {
        self.kind == LockKind::Pessimistic
    }

    /// Replaces the baseline snapshot.
    pub(crate) fn set_snapshot(&mut self, snapshot: Option<EntityState>) {
        self.snapshot = snapshot;
    }
}

impl fmt::Display for Lock {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "{} lock on {} held by {} since {}",
            self.kind, self.object_id, self.owner, self.created
        )
    }
}
