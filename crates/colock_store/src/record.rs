//! Persisted lock record shape and codec.

use crate::error::{StoreError, StoreResult};
use crate::lock::Lock;
use crate::types::{EntityState, LockKind, ObjectId, Owner, SessionId, Timestamp};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// The durable representation of one [`Lock`].
///
/// This mirrors the row shape of a shared lock table: `object_id` is the
/// `entity:key` rendering, `created` is Unix milliseconds, and `snapshot`
/// is the opaque serialized entity state (optimistic locks only). The
/// uniqueness constraints - one pessimistic record per `object_id`, one
/// optimistic record per `(object_id, owner_login)` - are enforced when a
/// table is rebuilt via
/// [`TableLockStore::from_records`](crate::TableLockStore::from_records).
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct LockRecord {
    /// Lock discipline, serialized as `optimistic` or `pessimistic`.
    pub kind: LockKind,
    /// `entity:key` rendering of the locked object.
    pub object_id: String,
    /// Login of the holder.
    pub owner_login: String,
    /// Session the lock was issued to.
    pub owner_session: Uuid,
    /// Creation time, milliseconds since the Unix epoch.
    pub created: u64,
    /// Serialized baseline state, optimistic locks only.
    pub snapshot: Option<Vec<u8>>,
}

impl LockRecord {
    /// Encodes the record as CBOR.
    ///
    /// # Errors
    ///
    /// Returns [`StoreError::Codec`] if serialization fails.
    pub fn encode(&self) -> StoreResult<Vec<u8>> {
        let mut buf = Vec::new();
        ciborium::ser::into_writer(self, &mut buf)
            .map_err(|e| StoreError::codec(e.to_string()))?;
        Ok(buf)
    }

    /// Decodes a record from CBOR.
    ///
    /// # Errors
    ///
    /// Returns [`StoreError::Codec`] if the bytes are not a valid record.
    pub fn decode(bytes: &[u8]) -> StoreResult<Self> {
        ciborium::de::from_reader(bytes).map_err(|e| StoreError::codec(e.to_string()))
    }

    /// Converts the record back into a lock.
    ///
    /// A snapshot on a pessimistic record is tolerated and dropped.
    ///
    /// # Errors
    ///
    /// Returns [`StoreError::Codec`] if `object_id` is not a valid
    /// `entity:key` rendering.
    pub fn into_lock(self) -> StoreResult<Lock> {
        let object_id = ObjectId::parse(&self.object_id).ok_or_else(|| {
            StoreError::codec(format!("malformed object id: {:?}", self.object_id))
        })?;
        let owner = Owner::new(self.owner_login, SessionId::from_uuid(self.owner_session));
        Ok(Lock::from_parts(
            self.kind,
            object_id,
            owner,
            Timestamp::from_millis(self.created),
            self.snapshot.map(EntityState::from_bytes),
        ))
    }
}

impl From<&Lock> for LockRecord {
    fn from(lock: &Lock) -> Self {
        Self {
            kind: lock.kind(),
            object_id: lock.object_id().to_string(),
            owner_login: lock.owner().login().to_string(),
            owner_session: lock.owner().session().as_uuid(),
            created: lock.created().as_millis(),
            snapshot: lock.snapshot().map(|s| s.as_bytes().to_vec()),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn sample_lock() -> Lock {
        Lock::optimistic(
            ObjectId::new("Book", "7"),
            Owner::new("alice", SessionId::new()),
            Some(EntityState::from(&b"title=A"[..])),
        )
    }

    #[test]
    fn lock_record_roundtrip() {
        let lock = sample_lock();
        let record = LockRecord::from(&lock);
        assert_eq!(record.kind, LockKind::Optimistic);
        assert_eq!(record.object_id, "Book:7");
        assert_eq!(record.owner_login, "alice");
        assert_eq!(record.snapshot.as_deref(), Some(&b"title=A"[..]));

        let rebuilt = record.into_lock().unwrap();
        assert_eq!(rebuilt, lock);
    }

    #[test]
    fn cbor_roundtrip() {
        let record = LockRecord::from(&sample_lock());
        let bytes = record.encode().unwrap();
        assert_eq!(LockRecord::decode(&bytes).unwrap(), record);
    }

    #[test]
    fn decode_garbage_fails() {
        let err = LockRecord::decode(b"not cbor").unwrap_err();
        assert!(matches!(err, StoreError::Codec { .. }));
    }

    #[test]
    fn malformed_object_id_is_rejected() {
        let mut record = LockRecord::from(&sample_lock());
        record.object_id = "no-separator".to_string();
        let err = record.into_lock().unwrap_err();
        assert!(matches!(err, StoreError::Codec { .. }));
    }

    #[test]
    fn snapshot_on_pessimistic_record_is_dropped() {
        let mut record = LockRecord::from(&sample_lock());
        record.kind = LockKind::Pessimistic;
        let lock = record.into_lock().unwrap();
        assert!(lock.snapshot().is_none());
    }
}
