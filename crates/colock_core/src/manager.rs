//! Concurrency manager.

use crate::config::{ConcurrencyConfig, PersistPolicy};
use crate::error::{ConcurrencyError, ConcurrencyResult};
use crate::source::EntitySource;
use colock_store::{Conflict, EntityState, Lock, LockKind, LockStore, ObjectId, Owner};
use std::sync::Arc;
use tracing::{debug, warn};

/// The policy surface of the concurrency-control core.
///
/// The manager arbitrates simultaneous edits to the same persisted entity
/// across independent user sessions. Callers acquire a lock when a user
/// begins editing, optionally refresh its snapshot after merging external
/// changes, and call [`check_persist`](ConcurrencyManager::check_persist)
/// immediately before each write is flushed. Bookkeeping is delegated to
/// the [`LockStore`]; this layer adds owner resolution discipline, snapshot
/// seeding, and the commit-time state comparison.
///
/// Every owner-scoped operation takes an explicit [`Owner`], produced once
/// per request by a trusted authentication step. Owners are never
/// reconstructed from request parameters.
///
/// Acquisition never blocks: a held exclusive lock fails the call
/// immediately with a conflict, and retry or backoff is the caller's
/// decision. Request-handling threads cannot be parked for the length of a
/// human editing session.
pub struct ConcurrencyManager {
    /// Shared lock bookkeeping.
    store: Arc<dyn LockStore>,
    /// Authoritative entity state, for snapshot seeding and re-validation.
    source: Arc<dyn EntitySource>,
    /// Policy switches.
    config: ConcurrencyConfig,
}

impl ConcurrencyManager {
    /// Creates a manager with the default (advisory) configuration.
    pub fn new(store: Arc<dyn LockStore>, source: Arc<dyn EntitySource>) -> Self {
        Self::with_config(store, source, ConcurrencyConfig::default())
    }

    /// Creates a manager with an explicit configuration.
    pub fn with_config(
        store: Arc<dyn LockStore>,
        source: Arc<dyn EntitySource>,
        config: ConcurrencyConfig,
    ) -> Self {
        Self {
            store,
            source,
            config,
        }
    }

    /// Acquires a lock on `object_id` for `owner`.
    ///
    /// For an optimistic acquisition with no `current_state` supplied, the
    /// baseline snapshot is loaded from the entity source first. A caller
    /// that already read the entity for display passes that state instead
    /// and saves the extra load.
    ///
    /// # Errors
    ///
    /// Fails fast with [`Conflict::Pessimistic`] if another owner holds the
    /// exclusive lock; no retries are performed here.
    pub fn acquire_lock(
        &self,
        owner: &Owner,
        object_id: &ObjectId,
        kind: LockKind,
        current_state: Option<EntityState>,
    ) -> ConcurrencyResult<Lock> {
        let snapshot = match (kind, current_state) {
            (LockKind::Optimistic, None) => self.source.load(object_id)?,
            (LockKind::Optimistic, state) => state,
            (LockKind::Pessimistic, _) => None,
        };
        let lock = self.store.acquire(object_id, kind, owner, snapshot)?;
        Ok(lock)
    }

    /// Releases the owner's own lock(s) on `object_id`.
    ///
    /// `kind = None` releases all kinds held by this owner on this object.
    ///
    /// # Errors
    ///
    /// Returns an error if the lock store fails.
    pub fn release_lock(
        &self,
        owner: &Owner,
        object_id: &ObjectId,
        kind: Option<LockKind>,
    ) -> ConcurrencyResult<()> {
        self.store.release(object_id, owner, kind)?;
        Ok(())
    }

    /// Releases every lock on `object_id` regardless of owner.
    ///
    /// Administrative: for internal callers reacting to entity deletion,
    /// never exposed to request input.
    ///
    /// # Errors
    ///
    /// Returns an error if the lock store fails.
    pub fn release_locks(&self, object_id: &ObjectId) -> ConcurrencyResult<()> {
        self.store.release_all(object_id)?;
        Ok(())
    }

    /// Releases every lock held by `owner` across all objects.
    ///
    /// Administrative: for internal callers reacting to session end.
    ///
    /// # Errors
    ///
    /// Returns an error if the lock store fails.
    pub fn release_all_locks(&self, owner: &Owner) -> ConcurrencyResult<()> {
        self.store.release_all_for_owner(owner)?;
        Ok(())
    }

    /// Returns the pessimistic lock on `object_id`, if any.
    ///
    /// # Errors
    ///
    /// Returns an error if the lock store fails.
    pub fn get_lock(&self, object_id: &ObjectId) -> ConcurrencyResult<Option<Lock>> {
        Ok(self.store.get(object_id)?)
    }

    /// Refreshes the baseline snapshot of the owner's optimistic lock.
    ///
    /// A snapshot is captured once at acquisition and never moves on its
    /// own; after merging external changes into the edited entity, callers
    /// use this to re-baseline, or subsequent
    /// [`check_persist`](ConcurrencyManager::check_persist) calls keep
    /// comparing against the stale state. No-op if the owner holds no
    /// optimistic lock on the object.
    ///
    /// # Errors
    ///
    /// Returns an error if the lock store fails.
    pub fn update_lock(
        &self,
        owner: &Owner,
        object_id: &ObjectId,
        state: EntityState,
    ) -> ConcurrencyResult<()> {
        self.store.update_snapshot(object_id, owner, Some(state))?;
        Ok(())
    }

    /// Validates that `owner` may write `object_id`, immediately before the
    /// physical write.
    ///
    /// The enclosing transaction must call this exactly once per modified
    /// object and roll back atomically if any call fails.
    ///
    /// - The owner's own pessimistic lock allows the write.
    /// - A foreign pessimistic lock fails it (defensive; acquisition should
    ///   have prevented this state).
    /// - The owner's optimistic lock triggers a reload of the authoritative
    ///   state: deletion or any change since the snapshot fails with an
    ///   optimistic conflict carrying the current state.
    /// - With no lock at all the outcome is the configured
    ///   [`PersistPolicy`].
    ///
    /// # Errors
    ///
    /// Returns one of the two conflict shapes, or
    /// [`ConcurrencyError::LockRequired`] under
    /// [`PersistPolicy::RequireLock`].
    pub fn check_persist(&self, owner: &Owner, object_id: &ObjectId) -> ConcurrencyResult<()> {
        if let Some(lock) = self.store.get(object_id)? {
            if lock.owner() == owner {
                debug!(object = %object_id, owner = %owner, "persist allowed by exclusive lock");
                return Ok(());
            }
            warn!(object = %object_id, owner = %owner, holder = %lock.owner(),
                  "persist blocked by foreign pessimistic lock");
            return Err(Conflict::pessimistic(lock).into());
        }

        match self.store.find(object_id, owner)? {
            Some(lock) if lock.is_optimistic() => {
                let current = self.source.load(object_id)?;
                if current.as_ref() != lock.snapshot() {
                    warn!(object = %object_id, owner = %owner,
                          deleted = current.is_none(), "optimistic conflict at commit");
                    return Err(Conflict::optimistic(current).into());
                }
                debug!(object = %object_id, owner = %owner, "snapshot still current");
                Ok(())
            }
            // A pessimistic lock of our own would have been returned by
            // `get` above already.
            Some(_) => Ok(()),
            None => match self.config.policy {
                PersistPolicy::Advisory => Ok(()),
                PersistPolicy::RequireLock => {
                    Err(ConcurrencyError::lock_required(object_id.clone()))
                }
            },
        }
    }
}

impl std::fmt::Debug for ConcurrencyManager {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ConcurrencyManager")
            .field("config", &self.config)
            .finish_non_exhaustive()
    }
}
