//! Lock store trait definition.

use crate::error::StoreResult;
use crate::lock::Lock;
use crate::types::{EntityState, LockKind, ObjectId, Owner};

/// Shared bookkeeping of current locks.
///
/// A lock store is **pure storage**: it enforces the structural invariants
/// of the lock table but carries no business policy. Policy (when to
/// acquire, what to do with a conflict, commit-time validation) lives in
/// the concurrency manager built on top.
///
/// # Invariants
///
/// - At most one pessimistic lock exists per object at any time.
/// - Multiple optimistic locks may coexist per object, at most one per
///   distinct owner.
/// - An owner holds at most one lock per object; re-acquiring replaces or
///   refreshes rather than duplicating.
/// - Every check-then-insert in `acquire` is a single atomic operation
///   against the shared table, so two simultaneous pessimistic attempts on
///   one object can never both win.
/// - Implementations must be `Send + Sync`; one store instance is shared by
///   all concurrent callers.
///
/// # Implementors
///
/// - [`crate::TableLockStore`] - the shared lock table
/// - [`crate::NoOpLockStore`] - disables locking application-wide
pub trait LockStore: Send + Sync {
    /// Acquires a lock on `object_id` for `owner`, atomically.
    ///
    /// Rules, evaluated in order inside one critical section:
    ///
    /// 1. A pessimistic lock held by another owner fails the attempt with a
    ///    [`Conflict::Pessimistic`](crate::Conflict::Pessimistic) carrying
    ///    that lock, regardless of the requested kind.
    /// 2. A pessimistic request by the owner already holding the
    ///    pessimistic lock succeeds as a no-op, returning the existing lock.
    /// 3. An optimistic request creates or replaces the owner's own
    ///    optimistic lock, storing `snapshot` as the new baseline.
    /// 4. Otherwise a fresh lock is created.
    ///
    /// Acquiring one kind removes the owner's lock of the other kind on the
    /// same object.
    ///
    /// # Errors
    ///
    /// Returns a conflict per rule 1, or a store-specific failure.
    fn acquire(
        &self,
        object_id: &ObjectId,
        kind: LockKind,
        owner: &Owner,
        snapshot: Option<EntityState>,
    ) -> StoreResult<Lock>;

    /// Removes the owner's own lock(s) on `object_id`.
    ///
    /// `kind = None` means all kinds held by this owner on this object.
    /// No-op if nothing is held.
    ///
    /// # Errors
    ///
    /// Returns a store-specific failure.
    fn release(&self, object_id: &ObjectId, owner: &Owner, kind: Option<LockKind>)
        -> StoreResult<()>;

    /// Removes every lock on `object_id` regardless of owner.
    ///
    /// Privileged: used by internal callers when the underlying entity is
    /// deleted, never driven by request input.
    ///
    /// # Errors
    ///
    /// Returns a store-specific failure.
    fn release_all(&self, object_id: &ObjectId) -> StoreResult<()>;

    /// Removes every lock held by `owner` across all objects.
    ///
    /// Privileged: used by internal callers at session end.
    ///
    /// # Errors
    ///
    /// Returns a store-specific failure.
    fn release_all_for_owner(&self, owner: &Owner) -> StoreResult<()>;

    /// Returns the pessimistic lock on `object_id`, if one exists.
    ///
    /// Optimistic locks are owner-scoped and not retrievable by object id
    /// alone, since several may coexist; use [`LockStore::find`] for those.
    ///
    /// # Errors
    ///
    /// Returns a store-specific failure.
    fn get(&self, object_id: &ObjectId) -> StoreResult<Option<Lock>>;

    /// Returns the owner's own lock on `object_id`, of either kind.
    ///
    /// If the owner somehow holds both kinds the pessimistic one is
    /// returned.
    ///
    /// # Errors
    ///
    /// Returns a store-specific failure.
    fn find(&self, object_id: &ObjectId, owner: &Owner) -> StoreResult<Option<Lock>>;

    /// Replaces the snapshot of the owner's optimistic lock on `object_id`.
    ///
    /// No-op if the owner holds no optimistic lock there. The creation
    /// timestamp is preserved; only the comparison baseline moves.
    ///
    /// # Errors
    ///
    /// Returns a store-specific failure.
    fn update_snapshot(
        &self,
        object_id: &ObjectId,
        owner: &Owner,
        new_snapshot: Option<EntityState>,
    ) -> StoreResult<()>;
}
