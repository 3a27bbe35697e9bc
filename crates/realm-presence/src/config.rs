//! Presence configuration.

use std::time::Duration;

use realm_reaper::ReaperConfig;

/// Timeouts for the presence service.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PresenceConfig {
    /// A connection with no inbound activity for longer than this is
    /// closed by the next sweep. Applies before authentication too.
    ///
    /// Default: 30 minutes.
    pub idle_threshold: Duration,

    /// How often the idle sweep runs.
    pub reaper: ReaperConfig,
}

impl PresenceConfig {
    pub const DEFAULT_IDLE_THRESHOLD: Duration = Duration::from_secs(30 * 60);
}

impl Default for PresenceConfig {
    fn default() -> Self {
        Self {
            idle_threshold: Self::DEFAULT_IDLE_THRESHOLD,
            reaper: ReaperConfig::default(),
        }
    }
}
