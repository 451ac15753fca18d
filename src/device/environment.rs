//! Power-source and lid-state readings with fail-open defaults.
//!
//! Every call re-reads its surface; readings legitimately change between
//! freefall events (charger unplugged, lid shut) so nothing is cached.
//! An unreadable surface reports `true`, which selects the short window.

#![allow(missing_docs)]

use std::fs;
use std::path::PathBuf;

use crate::core::config::SurfacesConfig;
use crate::device::EnvironmentProbe;

/// [`EnvironmentProbe`] over the power-supply and ACPI lid surfaces.
#[derive(Debug, Clone)]
pub struct SysfsEnvironment {
    power_online_path: PathBuf,
    lid_state_path: PathBuf,
}

impl SysfsEnvironment {
    pub fn new(power_online_path: impl Into<PathBuf>, lid_state_path: impl Into<PathBuf>) -> Self {
        Self {
            power_online_path: power_online_path.into(),
            lid_state_path: lid_state_path.into(),
        }
    }

    pub fn from_surfaces(surfaces: &SurfacesConfig) -> Self {
        Self::new(surfaces.power_online.clone(), surfaces.lid_state.clone())
    }
}

impl EnvironmentProbe for SysfsEnvironment {
    fn on_external_power(&self) -> bool {
        fs::read_to_string(&self.power_online_path).map_or(true, |raw| parse_power_online(&raw))
    }

    fn is_lid_open(&self) -> bool {
        fs::read_to_string(&self.lid_state_path).map_or(true, |raw| parse_lid_open(&raw))
    }
}

/// `online` surface: exactly "1" means external power.
pub fn parse_power_online(raw: &str) -> bool {
    raw.trim() == "1"
}

/// ACPI lid surface, e.g. `state:      open`.
pub fn parse_lid_open(raw: &str) -> bool {
    raw.to_ascii_lowercase().contains("open")
}
