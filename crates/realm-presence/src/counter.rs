//! The live "players online" number.

/// Count of distinct authenticated users.
///
/// Moved in lock-step with the registry: +1 for a fresh registration,
/// -1 for an unregistration, unchanged for an eviction. Never negative.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct PresenceCounter(u64);

impl PresenceCounter {
    pub fn new() -> Self {
        Self(0)
    }

    pub fn get(&self) -> u64 {
        self.0
    }

    pub fn increment(&mut self) -> u64 {
        self.0 += 1;
        self.0
    }

    /// Decrements, clamping at zero.
    pub fn decrement(&mut self) -> u64 {
        if self.0 == 0 {
            tracing::warn!("presence counter underflow, clamped at zero");
        }
        self.0 = self.0.saturating_sub(1);
        self.0
    }

    pub fn reset(&mut self) {
        self.0 = 0;
    }
}
