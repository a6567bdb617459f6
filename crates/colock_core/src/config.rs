//! Concurrency manager configuration.

/// What `check_persist` does when no lock exists for the object and caller.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum PersistPolicy {
    /// Locking is advisory: a write with no lock is allowed. This is the
    /// default; callers opt in to concurrency control per edit.
    #[default]
    Advisory,
    /// Every write must be covered by a lock; a write with none fails.
    RequireLock,
}

/// Configuration for a concurrency manager.
#[derive(Debug, Clone, Copy, Default)]
pub struct ConcurrencyConfig {
    /// Behavior of `check_persist` for unlocked objects.
    pub policy: PersistPolicy,
}

impl ConcurrencyConfig {
    /// Creates a new configuration with default values.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Sets the persist policy.
    #[must_use]
    pub const fn policy(mut self, policy: PersistPolicy) -> Self {
        self.policy = policy;
        self
    }
}
