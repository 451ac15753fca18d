//! Park command length and protection-window selection.

#![allow(missing_docs)]

use std::time::Duration;

use crate::core::config::ProtectionConfig;

/// How long the drive is asked to stay parked, and how long the daemon keeps
/// it that way absent further events.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ProtectionPolicy {
    /// Sent with every park command; longer than either window so the drive
    /// never unparks on its own while the daemon still considers it protected.
    pub park_seconds: u32,
    /// Machine is likely stationary or attended (external power or lid open).
    pub attended_window: Duration,
    /// On battery with the lid closed: probably being carried.
    pub unattended_window: Duration,
}

impl Default for ProtectionPolicy {
    fn default() -> Self {
        Self::from_config(&ProtectionConfig::default())
    }
}

impl ProtectionPolicy {
    #[must_use]
    pub fn from_config(config: &ProtectionConfig) -> Self {
        Self {
            park_seconds: config.park_seconds,
            attended_window: config.attended_window(),
            unattended_window: config.unattended_window(),
        }
    }

    /// Short window if either condition holds, long window otherwise.
    #[must_use]
    pub fn select_window(&self, on_external_power: bool, lid_open: bool) -> Duration {
        if on_external_power || lid_open {
            self.attended_window
        } else {
            self.unattended_window
        }
    }
}
