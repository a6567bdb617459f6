//! Shared lock table implementation.

use crate::error::{Conflict, StoreError, StoreResult};
use crate::lock::Lock;
use crate::record::LockRecord;
use crate::store::LockStore;
use crate::types::{EntityState, LockKind, ObjectId, Owner};
use parking_lot::Mutex;
use std::collections::HashMap;
use tracing::{debug, warn};

/// Counters over the current lock table contents.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct StoreStats {
    /// Number of objects with at least one lock.
    pub objects: usize,
    /// Number of pessimistic locks.
    pub pessimistic: usize,
    /// Number of optimistic locks.
    pub optimistic: usize,
}

/// All locks on one object.
///
/// The representation enforces the table invariants structurally: the
/// pessimistic holder is an `Option`, and optimistic locks are keyed by
/// owner, so neither "two pessimistic locks" nor "two optimistic locks for
/// one owner" can be expressed.
#[derive(Debug, Default)]
struct Slot {
    pessimistic: Option<Lock>,
    optimistic: HashMap<Owner, Lock>,
}

impl Slot {
    fn is_empty(&self) -> bool {
        self.pessimistic.is_none() && self.optimistic.is_empty()
    }
}

/// The shared lock table.
///
/// One table instance is shared by every concurrent caller (wrap it in an
/// `Arc`). A single mutex around the whole table makes each
/// check-then-insert in [`LockStore::acquire`] one atomic critical section,
/// the in-process equivalent of a unique-constraint-backed transactional
/// insert: of two simultaneous pessimistic attempts on the same object,
/// exactly one can win.
///
/// The table never expires locks on its own. Creation timestamps are kept
/// so an external janitor can reap locks left behind by crashed sessions.
#[derive(Debug, Default)]
pub struct TableLockStore {
    table: Mutex<HashMap<ObjectId, Slot>>,
}

impl TableLockStore {
    /// Creates a new empty lock table.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Rebuilds a lock table from persisted records.
    ///
    /// # Errors
    ///
    /// Returns [`StoreError::Integrity`] if the records violate the table
    /// invariants (two pessimistic locks for one object, or two optimistic
    /// locks for one `(object, owner)` pair), and [`StoreError::Codec`] if
    /// a record cannot be decoded into a lock.
    pub fn from_records(records: Vec<LockRecord>) -> StoreResult<Self> {
        let mut table: HashMap<ObjectId, Slot> = HashMap::new();
        for record in records {
            let lock = record.into_lock()?;
            let slot = table.entry(lock.object_id().clone()).or_default();
            match lock.kind() {
                LockKind::Pessimistic => {
                    if let Some(existing) = &slot.pessimistic {
                        warn!(object = %lock.object_id(), "duplicate pessimistic lock records");
                        return Err(StoreError::integrity(format!(
                            "two pessimistic locks for {}: held by {} and {}",
                            lock.object_id(),
                            existing.owner(),
                            lock.owner()
                        )));
                    }
                    slot.pessimistic = Some(lock);
                }
                LockKind::Optimistic => {
                    let object = lock.object_id().clone();
                    let owner = lock.owner().clone();
                    if slot.optimistic.insert(owner.clone(), lock).is_some() {
                        return Err(StoreError::integrity(format!(
                            "two optimistic locks for ({object}, {owner})"
                        )));
                    }
                }
            }
        }
        Ok(Self {
            table: Mutex::new(table),
        })
    }

    /// Exports every lock as a persisted record.
    #[must_use]
    pub fn records(&self) -> Vec<LockRecord> {
        let table = self.table.lock();
        let mut records = Vec::new();
        for slot in table.values() {
            if let Some(lock) = &slot.pessimistic {
                records.push(LockRecord::from(lock));
            }
            for lock in slot.optimistic.values() {
                records.push(LockRecord::from(lock));
            }
        }
        records
    }

    /// Returns counters over the current table contents.
    #[must_use]
    pub fn stats(&self) -> StoreStats {
        let table = self.table.lock();
        let mut stats = StoreStats {
            objects: table.len(),
            ..StoreStats::default()
        };
        for slot in table.values() {
            if slot.pessimistic.is_some() {
                stats.pessimistic += 1;
            }
            stats.optimistic += slot.optimistic.len();
        }
        stats
    }
}

impl LockStore for TableLockStore {
    fn acquire(
        &self,
        object_id: &ObjectId,
        kind: LockKind,
        owner: &Owner,
        snapshot: Option<EntityState>,
    ) -> StoreResult<Lock> {
        let mut table = self.table.lock();
        let slot = table.entry(object_id.clone()).or_default();

        // Rule 1: a foreign pessimistic lock blocks either kind.
        if let Some(held) = &slot.pessimistic {
            if held.owner() != owner {
                debug!(object = %object_id, owner = %owner, holder = %held.owner(),
                       "acquisition blocked by pessimistic lock");
                return Err(Conflict::pessimistic(held.clone()).into());
            }
            // Rule 2: re-acquiring one's own pessimistic lock is a no-op.
            if kind == LockKind::Pessimistic {
                return Ok(held.clone());
            }
        }

        // Acquiring one kind replaces the owner's lock of the other kind.
        let lock = match kind {
            LockKind::Pessimistic => {
                slot.optimistic.remove(owner);
                let lock = Lock::pessimistic(object_id.clone(), owner.clone());
                slot.pessimistic = Some(lock.clone());
                lock
            }
            LockKind::Optimistic => {
                if slot.pessimistic.as_ref().is_some_and(|l| l.owner() == owner) {
                    slot.pessimistic = None;
                }
                let lock = Lock::optimistic(object_id.clone(), owner.clone(), snapshot);
                slot.optimistic.insert(owner.clone(), lock.clone());
                lock
            }
        };

        debug!(object = %object_id, owner = %owner, kind = %kind, "lock acquired");
        Ok(lock)
    }

    fn release(
        &self,
        object_id: &ObjectId,
        owner: &Owner,
        kind: Option<LockKind>,
    ) -> StoreResult<()> {
        let mut table = self.table.lock();
        if let Some(slot) = table.get_mut(object_id) {
            if kind != Some(LockKind::Optimistic)
                && slot.pessimistic.as_ref().is_some_and(|l| l.owner() == owner)
            {
                slot.pessimistic = None;
            }
            if kind != Some(LockKind::Pessimistic) {
                slot.optimistic.remove(owner);
            }
            if slot.is_empty() {
                table.remove(object_id);
            }
            debug!(object = %object_id, owner = %owner, "lock released");
        }
        Ok(())
    }

    fn release_all(&self, object_id: &ObjectId) -> StoreResult<()> {
        let mut table = self.table.lock();
        if table.remove(object_id).is_some() {
            debug!(object = %object_id, "all locks released");
        }
        Ok(())
    }

    fn release_all_for_owner(&self, owner: &Owner) -> StoreResult<()> {
        let mut table = self.table.lock();
        for slot in table.values_mut() {
            if slot.pessimistic.as_ref().is_some_and(|l| l.owner() == owner) {
                slot.pessimistic = None;
            }
            slot.optimistic.remove(owner);
        }
        table.retain(|_, slot| !slot.is_empty());
        debug!(owner = %owner, "all locks for owner released");
        Ok(())
    }

    fn get(&self, object_id: &ObjectId) -> StoreResult<Option<Lock>> {
        let table = self.table.lock();
        Ok(table
            .get(object_id)
            .and_then(|slot| slot.pessimistic.clone()))
    }

    fn find(&self, object_id: &ObjectId, owner: &Owner) -> StoreResult<Option<Lock>> {
        let table = self.table.lock();
        let Some(slot) = table.get(object_id) else {
            return Ok(None);
        };
        if let Some(lock) = &slot.pessimistic {
            if lock.owner() == owner {
                return Ok(Some(lock.clone()));
            }
        }
        Ok(slot.optimistic.get(owner).cloned())
    }

    fn update_snapshot(
        &self,
        object_id: &ObjectId,
        owner: &Owner,
        new_snapshot: Option<EntityState>,
    ) -> StoreResult<()> {
        let mut table = self.table.lock();
        if let Some(lock) = table
            .get_mut(object_id)
            .and_then(|slot| slot.optimistic.get_mut(owner))
        {
            lock.set_snapshot(new_snapshot);
            debug!(object = %object_id, owner = %owner, "snapshot refreshed");
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::SessionId;
    use std::sync::{Arc, Barrier};
    use std::thread;

    fn owner(login: &str) -> Owner {
        Owner::new(login, SessionId::new())
    }

    fn doc() -> ObjectId {
        ObjectId::new("Document", "42")
    }

    fn state(bytes: &[u8]) -> EntityState {
        EntityState::from(bytes)
    }

    #[test]
    fn pessimistic_blocks_other_owner() {
        let store = TableLockStore::new();
        let alice = owner("alice");
        let bob = owner("bob");

        store
            .acquire(&doc(), LockKind::Pessimistic, &alice, None)
            .unwrap();

        let err = store
            .acquire(&doc(), LockKind::Pessimistic, &bob, None)
            .unwrap_err();
        match err {
            StoreError::Conflict(Conflict::Pessimistic { lock }) => {
                assert_eq!(lock.owner(), &alice);
            }
            other => panic!("expected pessimistic conflict, got {other:?}"),
        }

        // The pessimistic holder also blocks optimistic attempts.
        let err = store
            .acquire(&doc(), LockKind::Optimistic, &bob, Some(state(b"s")))
            .unwrap_err();
        assert!(err.is_conflict());
    }

    #[test]
    fn pessimistic_reacquire_is_idempotent() {
        let store = TableLockStore::new();
        let alice = owner("alice");

        let first = store
            .acquire(&doc(), LockKind::Pessimistic, &alice, None)
            .unwrap();
        let second = store
            .acquire(&doc(), LockKind::Pessimistic, &alice, None)
            .unwrap();

        // The original lock survives, creation time included.
        assert_eq!(first, second);
        assert_eq!(store.stats().pessimistic, 1);
    }

    #[test]
    fn optimistic_locks_coexist_per_owner() {
        let store = TableLockStore::new();
        let alice = owner("alice");
        let bob = owner("bob");

        store
            .acquire(&doc(), LockKind::Optimistic, &alice, Some(state(b"a")))
            .unwrap();
        store
            .acquire(&doc(), LockKind::Optimistic, &bob, Some(state(b"a")))
            .unwrap();

        assert_eq!(store.stats().optimistic, 2);
        assert!(store.get(&doc()).unwrap().is_none());
        assert!(store.find(&doc(), &alice).unwrap().is_some());
        assert!(store.find(&doc(), &bob).unwrap().is_some());
    }

    #[test]
    fn optimistic_reacquire_replaces_snapshot() {
        let store = TableLockStore::new();
        let alice = owner("alice");

        store
            .acquire(&doc(), LockKind::Optimistic, &alice, Some(state(b"v1")))
            .unwrap();
        store
            .acquire(&doc(), LockKind::Optimistic, &alice, Some(state(b"v2")))
            .unwrap();

        let lock = store.find(&doc(), &alice).unwrap().unwrap();
        assert_eq!(lock.snapshot(), Some(&state(b"v2")));
        assert_eq!(store.stats().optimistic, 1);
    }

    #[test]
    fn acquiring_pessimistic_replaces_own_optimistic() {
        let store = TableLockStore::new();
        let alice = owner("alice");

        store
            .acquire(&doc(), LockKind::Optimistic, &alice, Some(state(b"s")))
            .unwrap();
        store
            .acquire(&doc(), LockKind::Pessimistic, &alice, None)
            .unwrap();

        let stats = store.stats();
        assert_eq!((stats.pessimistic, stats.optimistic), (1, 0));
        let found = store.find(&doc(), &alice).unwrap().unwrap();
        assert!(found.is_pessimistic());
    }

    #[test]
    fn pessimistic_leaves_other_owners_optimistic_in_place() {
        let store = TableLockStore::new();
        let alice = owner("alice");
        let bob = owner("bob");

        store
            .acquire(&doc(), LockKind::Optimistic, &bob, Some(state(b"s")))
            .unwrap();
        store
            .acquire(&doc(), LockKind::Pessimistic, &alice, None)
            .unwrap();

        // Bob's lock survives; it is fenced off at commit-validation time.
        assert!(store.find(&doc(), &bob).unwrap().is_some());
    }

    #[test]
    fn release_is_owner_scoped() {
        let store = TableLockStore::new();
        let alice = owner("alice");
        let bob = owner("bob");

        store
            .acquire(&doc(), LockKind::Optimistic, &alice, Some(state(b"a")))
            .unwrap();
        store
            .acquire(&doc(), LockKind::Optimistic, &bob, Some(state(b"a")))
            .unwrap();

        store.release(&doc(), &alice, None).unwrap();

        assert!(store.find(&doc(), &alice).unwrap().is_none());
        assert!(store.find(&doc(), &bob).unwrap().is_some());
    }

    #[test]
    fn release_with_kind_leaves_other_kind() {
        let store = TableLockStore::new();
        let alice = owner("alice");

        store
            .acquire(&doc(), LockKind::Optimistic, &alice, Some(state(b"s")))
            .unwrap();
        store
            .release(&doc(), &alice, Some(LockKind::Pessimistic))
            .unwrap();
        assert!(store.find(&doc(), &alice).unwrap().is_some());

        store
            .release(&doc(), &alice, Some(LockKind::Optimistic))
            .unwrap();
        assert!(store.find(&doc(), &alice).unwrap().is_none());
    }

    #[test]
    fn release_absent_is_noop() {
        let store = TableLockStore::new();
        store.release(&doc(), &owner("alice"), None).unwrap();
        assert_eq!(store.stats(), StoreStats::default());
    }

    #[test]
    fn release_all_clears_object_across_owners() {
        let store = TableLockStore::new();
        let alice = owner("alice");
        let bob = owner("bob");

        store
            .acquire(&doc(), LockKind::Optimistic, &alice, Some(state(b"a")))
            .unwrap();
        store
            .acquire(&doc(), LockKind::Optimistic, &bob, Some(state(b"a")))
            .unwrap();

        store.release_all(&doc()).unwrap();

        assert_eq!(store.stats(), StoreStats::default());
    }

    #[test]
    fn release_all_for_owner_spans_objects() {
        let store = TableLockStore::new();
        let alice = owner("alice");
        let bob = owner("bob");
        let other = ObjectId::new("Book", "7");

        store
            .acquire(&doc(), LockKind::Pessimistic, &alice, None)
            .unwrap();
        store
            .acquire(&other, LockKind::Optimistic, &alice, Some(state(b"a")))
            .unwrap();
        store
            .acquire(&other, LockKind::Optimistic, &bob, Some(state(b"a")))
            .unwrap();

        store.release_all_for_owner(&alice).unwrap();

        assert!(store.get(&doc()).unwrap().is_none());
        assert!(store.find(&other, &alice).unwrap().is_none());
        assert!(store.find(&other, &bob).unwrap().is_some());
    }

    #[test]
    fn update_snapshot_refreshes_baseline() {
        let store = TableLockStore::new();
        let alice = owner("alice");

        store
            .acquire(&doc(), LockKind::Optimistic, &alice, Some(state(b"v1")))
            .unwrap();
        store
            .update_snapshot(&doc(), &alice, Some(state(b"v2")))
            .unwrap();

        let lock = store.find(&doc(), &alice).unwrap().unwrap();
        assert_eq!(lock.snapshot(), Some(&state(b"v2")));
    }

    #[test]
    fn update_snapshot_without_lock_is_noop() {
        let store = TableLockStore::new();
        store
            .update_snapshot(&doc(), &owner("alice"), Some(state(b"v2")))
            .unwrap();
        assert_eq!(store.stats(), StoreStats::default());
    }

    #[test]
    fn pessimistic_race_has_exactly_one_winner() {
        const CONTENDERS: usize = 8;

        let store = Arc::new(TableLockStore::new());
        let barrier = Arc::new(Barrier::new(CONTENDERS));

        let handles: Vec<_> = (0..CONTENDERS)
            .map(|i| {
                let store = Arc::clone(&store);
                let barrier = Arc::clone(&barrier);
                thread::spawn(move || {
                    let me = Owner::new(format!("user{i}"), SessionId::new());
                    barrier.wait();
                    store
                        .acquire(&ObjectId::new("Document", "42"), LockKind::Pessimistic, &me, None)
                        .map(|lock| (me, lock))
                })
            })
            .collect();

        let mut winners = Vec::new();
        let mut losers = Vec::new();
        for handle in handles {
            match handle.join().unwrap() {
                Ok((me, _)) => winners.push(me),
                Err(StoreError::Conflict(Conflict::Pessimistic { lock })) => losers.push(lock),
                Err(other) => panic!("unexpected error: {other:?}"),
            }
        }

        assert_eq!(winners.len(), 1);
        assert_eq!(losers.len(), CONTENDERS - 1);
        // Every conflict names the single winner.
        for lock in losers {
            assert_eq!(lock.owner(), &winners[0]);
        }
    }

    #[test]
    fn roundtrip_through_records() {
        let store = TableLockStore::new();
        let alice = owner("alice");
        let bob = owner("bob");

        store
            .acquire(&doc(), LockKind::Pessimistic, &alice, None)
            .unwrap();
        store
            .acquire(
                &ObjectId::new("Book", "7"),
                LockKind::Optimistic,
                &bob,
                Some(state(b"title=A")),
            )
            .unwrap();

        let rebuilt = TableLockStore::from_records(store.records()).unwrap();
        assert_eq!(rebuilt.stats(), store.stats());
        assert_eq!(
            rebuilt.get(&doc()).unwrap().unwrap().owner().login(),
            "alice"
        );
        let lock = rebuilt
            .find(&ObjectId::new("Book", "7"), &bob)
            .unwrap()
            .unwrap();
        assert_eq!(lock.snapshot(), Some(&state(b"title=A")));
    }

    #[test]
    fn from_records_rejects_duplicate_pessimistic() {
        let alice = Lock::pessimistic(doc(), owner("alice"));
        let bob = Lock::pessimistic(doc(), owner("bob"));
        let records = vec![LockRecord::from(&alice), LockRecord::from(&bob)];

        let err = TableLockStore::from_records(records).unwrap_err();
        assert!(matches!(err, StoreError::Integrity { .. }));
    }

    mod properties {
        use super::*;
        use proptest::prelude::*;

        #[derive(Debug, Clone)]
        enum Op {
            Acquire(usize, LockKind),
            Release(usize, Option<LockKind>),
            ReleaseAll,
            ReleaseOwner(usize),
        }

        fn op_strategy() -> impl Strategy<Value = Op> {
            let kind = prop_oneof![Just(LockKind::Optimistic), Just(LockKind::Pessimistic)];
            let opt_kind = prop_oneof![
                Just(None),
                Just(Some(LockKind::Optimistic)),
                Just(Some(LockKind::Pessimistic)),
            ];
            prop_oneof![
                (0usize..3, kind.clone()).prop_map(|(o, k)| Op::Acquire(o, k)),
                (0usize..3, opt_kind).prop_map(|(o, k)| Op::Release(o, k)),
                Just(Op::ReleaseAll),
                (0usize..3).prop_map(Op::ReleaseOwner),
            ]
        }

        proptest! {
            /// Any operation sequence on one slot keeps the table invariants:
            /// at most one pessimistic lock, at most one lock per owner, and
            /// a successful pessimistic acquisition only ever happens when no
            /// other owner held the pessimistic lock.
            #[test]
            fn slot_invariants_hold(ops in proptest::collection::vec(op_strategy(), 1..40)) {
                let store = TableLockStore::new();
                let object = ObjectId::new("Document", "42");
                let owners: Vec<Owner> = (0..3)
                    .map(|i| Owner::new(format!("user{i}"), SessionId::new()))
                    .collect();
                // Model of the slot: pessimistic holder index, optimistic holder set.
                let mut model_pess: Option<usize> = None;
                let mut model_opt: Vec<bool> = vec![false; owners.len()];

                for op in ops {
                    match op {
                        Op::Acquire(o, kind) => {
                            let result = store.acquire(
                                &object,
                                kind,
                                &owners[o],
                                Some(EntityState::from(&b"s"[..])),
                            );
                            match model_pess {
                                Some(holder) if holder != o => {
                                    prop_assert!(result.is_err());
                                }
                                _ => {
                                    prop_assert!(result.is_ok());
                                    match kind {
                                        LockKind::Pessimistic => {
                                            model_pess = Some(o);
                                            model_opt[o] = false;
                                        }
                                        LockKind::Optimistic => {
                                            if model_pess == Some(o) {
                                                model_pess = None;
                                            }
                                            model_opt[o] = true;
                                        }
                                    }
                                }
                            }
                        }
                        Op::Release(o, kind) => {
                            store.release(&object, &owners[o], kind).unwrap();
                            if kind != Some(LockKind::Optimistic) && model_pess == Some(o) {
                                model_pess = None;
                            }
                            if kind != Some(LockKind::Pessimistic) {
                                model_opt[o] = false;
                            }
                        }
                        Op::ReleaseAll => {
                            store.release_all(&object).unwrap();
                            model_pess = None;
                            model_opt.iter_mut().for_each(|held| *held = false);
                        }
                        Op::ReleaseOwner(o) => {
                            store.release_all_for_owner(&owners[o]).unwrap();
                            if model_pess == Some(o) {
                                model_pess = None;
                            }
                            model_opt[o] = false;
                        }
                    }

                    // The table agrees with the model after every step.
                    let stats = store.stats();
                    prop_assert!(stats.pessimistic <= 1);
                    prop_assert_eq!(stats.pessimistic, usize::from(model_pess.is_some()));
                    prop_assert_eq!(stats.optimistic, model_opt.iter().filter(|h| **h).count());
                    let held = store.get(&object).unwrap();
                    prop_assert_eq!(
                        held.map(|l| l.owner().clone()),
                        model_pess.map(|i| owners[i].clone())
                    );
                }
            }
        }
    }
}
