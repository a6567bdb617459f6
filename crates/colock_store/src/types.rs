//! Core type definitions for the lock subsystem.

use serde::{Deserialize, Serialize};
use std::fmt;
use std::time::{SystemTime, UNIX_EPOCH};
use uuid::Uuid;

/// Identifier for one persisted entity: type name plus primary key.
///
/// Object IDs are opaque to the lock subsystem. They are only compared,
/// hashed, and rendered; the persistence layer that owns the entities
/// decides what goes into the two components.
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct ObjectId {
    entity: String,
    key: String,
}

impl ObjectId {
    /// Creates an object ID from an entity type name and a primary key
    /// rendering.
    pub fn new(entity: impl Into<String>, key: impl Into<String>) -> Self {
        Self {
            entity: entity.into(),
            key: key.into(),
        }
    }

    /// Returns the entity type name.
    #[must_use]
    pub fn entity(&self) -> &str {
        &self.entity
    }

    /// Returns the primary key rendering.
    #[must_use]
    pub fn key(&self) -> &str {
        &self.key
    }

    /// Parses the `entity:key` rendering produced by [`fmt::Display`].
    ///
    /// The split happens at the first `:`; entity type names must not
    /// contain one. Returns `None` if the separator is missing.
    #[must_use]
    pub fn parse(s: &str) -> Option<Self> {
        let (entity, key) = s.split_once(':')?;
        if entity.is_empty() {
            return None;
        }
        Some(Self::new(entity, key))
    }
}

impl fmt::Display for ObjectId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}:{}", self.entity, self.key)
    }
}

/// Unique identifier for a user session.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub struct SessionId(Uuid);

impl SessionId {
    /// Creates a new random session ID.
    #[must_use]
    pub fn new() -> Self {
        Self(Uuid::new_v4())
    }

    /// Creates a session ID from a UUID.
    #[must_use]
    pub const fn from_uuid(uuid: Uuid) -> Self {
        Self(uuid)
    }

    /// Converts to a UUID.
    #[must_use]
    pub const fn as_uuid(&self) -> Uuid {
        self.0
    }
}

impl Default for SessionId {
    fn default() -> Self {
        Self::new()
    }
}

impl fmt::Display for SessionId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl From<Uuid> for SessionId {
    fn from(uuid: Uuid) -> Self {
        Self::from_uuid(uuid)
    }
}

/// The holder of a lock: a login paired with the session it was issued to.
///
/// Owners are always produced by a trusted authentication step and threaded
/// explicitly through every call. They are never reconstructed from
/// request-supplied input, which would allow one user to spoof another's
/// locks.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct Owner {
    login: String,
    session: SessionId,
}

impl Owner {
    /// Creates an owner from a login and its session.
    pub fn new(login: impl Into<String>, session: SessionId) -> Self {
        Self {
            login: login.into(),
            session,
        }
    }

    /// Returns the login name.
    #[must_use]
    pub fn login(&self) -> &str {
        &self.login
    }

    /// Returns the session ID.
    #[must_use]
    pub fn session(&self) -> SessionId {
        self.session
    }
}

impl fmt::Display for Owner {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}@{}", self.login, self.session)
    }
}

/// The two lock disciplines.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum LockKind {
    /// Non-exclusive edit-intent marker; conflicts are detected at commit
    /// time by comparing a stored snapshot against the current state.
    Optimistic,
    /// Exclusive edit-intent marker; at most one holder per object.
    Pessimistic,
}

impl fmt::Display for LockKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            LockKind::Optimistic => write!(f, "optimistic"),
            LockKind::Pessimistic => write!(f, "pessimistic"),
        }
    }
}

/// Opaque canonical serialized entity state.
///
/// Equality is byte equality. The persistence layer is responsible for
/// producing a canonical encoding, so that two equal entities always
/// serialize to the same bytes.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct EntityState(Vec<u8>);

impl EntityState {
    /// Creates an entity state from serialized bytes.
    #[must_use]
    pub fn from_bytes(bytes: Vec<u8>) -> Self {
        Self(bytes)
    }

    /// Returns the serialized bytes.
    #[must_use]
    pub fn as_bytes(&self) -> &[u8] {
        &self.0
    }

    /// Consumes the state, returning the serialized bytes.
    #[must_use]
    pub fn into_bytes(self) -> Vec<u8> {
        self.0
    }
}

impl From<Vec<u8>> for EntityState {
    fn from(bytes: Vec<u8>) -> Self {
        Self(bytes)
    }
}

impl From<&[u8]> for EntityState {
    fn from(bytes: &[u8]) -> Self {
        Self(bytes.to_vec())
    }
}

/// Milliseconds since the Unix epoch.
///
/// Stored on every lock so that an external janitor process can reap locks
/// abandoned by crashed sessions. The subsystem itself never expires locks.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub struct Timestamp(pub u64);

impl Timestamp {
    /// Creates a timestamp from raw milliseconds.
    #[must_use]
    pub const fn from_millis(millis: u64) -> Self {
        Self(millis)
    }

    /// Returns the current wall-clock time.
    #[must_use]
    pub fn now() -> Self {
        let millis = SystemTime::now()
            .duration_since(UNIX_EPOCH)
            .map(|d| d.as_millis() as u64)
            .unwrap_or_default();
        Self(millis)
    }

    /// Returns the raw milliseconds.
    #[must_use]
    pub const fn as_millis(self) -> u64 {
        self.0
    }
}

impl fmt::Display for Timestamp {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "ts:{}", self.0)
    }
}
