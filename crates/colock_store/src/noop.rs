//! Lock store that disables locking.

use crate::error::StoreResult;
use crate::lock::Lock;
use crate::store::LockStore;
use crate::types::{EntityState, LockKind, ObjectId, Owner};

/// A lock store with locking switched off.
///
/// Every mutating operation is a no-op and every lookup returns `None`, so
/// acquisition always succeeds and commit-time validation always passes.
/// Select it at composition time to disable locking application-wide; the
/// callers stay free of conditional branches.
///
/// `acquire` still hands back a well-formed lock so callers are oblivious
/// to the substitution; the lock is simply never recorded.
#[derive(Debug, Clone, Copy, Default)]
pub struct NoOpLockStore;

impl NoOpLockStore {
    /// Creates a new no-op lock store.
    #[must_use]
    pub fn new() -> Self {
        Self
    }
}

impl LockStore for NoOpLockStore {
    fn acquire(
        &self,
        object_id: &ObjectId,
        kind: LockKind,
        owner: &Owner,
        snapshot: Option<EntityState>,
    ) -> StoreResult<Lock> {
        let lock = match kind {
            LockKind::Optimistic => Lock::optimistic(object_id.clone(), owner.clone(), snapshot),
            LockKind::Pessimistic => Lock::pessimistic(object_id.clone(), owner.clone()),
        };
        Ok(lock)
    }

    fn release(
        &self,
        _object_id: &ObjectId,
        _owner: &Owner,
        _kind: Option<LockKind>,
    ) -> StoreResult<()> {
        Ok(())
    }

    fn release_all(&self, _object_id: &ObjectId) -> StoreResult<()> {
        Ok(())
    }

    fn release_all_for_owner(&self, _owner: &Owner) -> StoreResult<()> {
        Ok(())
    }

    fn get(&self, _object_id: &ObjectId) -> StoreResult<Option<Lock>> {
        Ok(None)
    }

    fn find(&self, _object_id: &ObjectId, _owner: &Owner) -> StoreResult<Option<Lock>> {
        Ok(None)
    }

    fn update_snapshot(
        &self,
        _object_id: &ObjectId,
        _owner: &Owner,
        _new_snapshot: Option<EntityState>,
    ) -> StoreResult<()> {
        Ok(())
    }
}
