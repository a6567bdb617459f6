//! Entity source collaborator boundary.

use crate::error::ConcurrencyResult;
use colock_store::{EntityState, ObjectId};
use parking_lot::RwLock;
use std::collections::HashMap;

/// Read access to the authoritative persisted entity state.
///
/// This is the lock subsystem's only view of the surrounding persistence
/// layer. It is used twice: to seed an optimistic snapshot at acquisition
/// time, and to re-validate that snapshot immediately before a write is
/// flushed. Implementations must return the **canonical serialized** state,
/// so that equal entities always compare byte-equal.
pub trait EntitySource: Send + Sync {
    /// Loads the current state of `object_id`, or `None` if the entity
    /// does not exist.
    ///
    /// # Errors
    ///
    /// Returns an error if the underlying store fails; implementations map
    /// their own failures via
    /// [`ConcurrencyError::source`](crate::ConcurrencyError::source).
    fn load(&self, object_id: &ObjectId) -> ConcurrencyResult<Option<EntityState>>;
}

/// An in-memory entity source.
///
/// Holds serialized entity states in a map. Suitable for tests and for
/// embedders that keep their working set in memory; every mutation is
/// immediately visible to subsequent loads, which is exactly what the
/// commit-time re-validation needs.
#[derive(Debug, Default)]
pub struct MemorySource {
    entities: RwLock<HashMap<ObjectId, EntityState>>,
}

impl MemorySource {
    /// Creates a new empty source.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Stores (or overwrites) the state of an entity.
    pub fn put(&self, object_id: ObjectId, state: EntityState) {
        self.entities.write().insert(object_id, state);
    }

    /// Removes an entity.
    pub fn remove(&self, object_id: &ObjectId) {
        self.entities.write().remove(object_id);
    }

    /// Returns the number of stored entities.
    #[must_use]
    pub fn len(&self) -> usize {
        self.entities.read().len()
    }

    /// Returns true if no entities are stored.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.entities.read().is_empty()
    }
}

impl EntitySource for MemorySource {
    fn load(&self, object_id: &ObjectId) -> ConcurrencyResult<Option<EntityState>> {
        Ok(self.entities.read().get(object_id).cloned())
    }
}
