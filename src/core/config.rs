//! Configuration system: TOML file + env var overrides + smart defaults.

#![allow(missing_docs)]

use std::env;
use std::fs;
use std::path::{Path, PathBuf};
use std::time::Duration;

use serde::{Deserialize, Serialize};

use crate::core::errors::{FfgError, Result};

/// Full freefall guard configuration model.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq, Default)]
#[serde(default)]
pub struct Config {
    pub device: DeviceConfig,
    pub surfaces: SurfacesConfig,
    pub protection: ProtectionConfig,
    pub tuning: TuningConfig,
    pub log: LogConfig,
    /// Where this config was loaded from (not read from the file itself).
    #[serde(skip)]
    pub config_file: PathBuf,
}

/// Which disk this instance protects.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
#[serde(default)]
pub struct DeviceConfig {
    /// `/dev/<name>` or a bare kernel name.
    pub name: String,
}

/// OS-exposed control and status surfaces.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
#[serde(default)]
pub struct SurfacesConfig {
    /// Directory holding `<name>/device/unload_heads`.
    pub block_root: PathBuf,
    /// Protection LED brightness (0/1).
    pub indicator: PathBuf,
    /// External power status ("1" when online).
    pub power_online: PathBuf,
    /// ACPI lid state ("state:      open").
    pub lid_state: PathBuf,
    /// Freefall character device.
    pub freefall: PathBuf,
}

/// Park command and protection windows.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
#[serde(default)]
pub struct ProtectionConfig {
    /// Seconds requested from the drive on each park command.
    pub park_seconds: u32,
    /// Window used while on external power or with the lid open.
    pub attended_window_secs: u64,
    /// Window used on battery with the lid closed.
    pub unattended_window_secs: u64,
}

/// Best-effort process tuning applied at startup.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
#[serde(default)]
pub struct TuningConfig {
    /// SCHED_FIFO priority; 0 leaves the scheduler untouched.
    pub realtime_priority: u8,
    /// Pin all current and future pages in RAM.
    pub lock_memory: bool,
}

/// JSONL activity log settings.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
#[serde(default)]
pub struct LogConfig {
    pub jsonl_path: PathBuf,
    pub fallback_path: Option<PathBuf>,
    pub max_size_bytes: u64,
    pub max_rotated_files: u32,
}

impl Default for DeviceConfig {
    fn default() -> Self {
        Self {
            name: "/dev/sda".to_string(),
        }
    }
}

impl Default for SurfacesConfig {
    fn default() -> Self {
        Self {
            block_root: PathBuf::from("/sys/block"),
            indicator: PathBuf::from("/sys/class/leds/hp::hddprotect/brightness"),
            power_online: PathBuf::from("/sys/class/power_supply/AC0/online"),
            lid_state: PathBuf::from("/proc/acpi/button/lid/LID/state"),
            freefall: PathBuf::from("/dev/freefall"),
        }
    }
}

impl Default for ProtectionConfig {
    fn default() -> Self {
        Self {
            park_seconds: 21,
            attended_window_secs: 2,
            unattended_window_secs: 20,
        }
    }
}

impl Default for TuningConfig {
    fn default() -> Self {
        Self {
            realtime_priority: 99,
            lock_memory: true,
        }
    }
}

impl Default for LogConfig {
    fn default() -> Self {
        Self {
            jsonl_path: PathBuf::from("/var/log/ffg/activity.jsonl"),
            fallback_path: Some(PathBuf::from("/dev/shm/ffg-activity.jsonl")),
            max_size_bytes: 8 * 1024 * 1024,
            max_rotated_files: 3,
        }
    }
}

impl ProtectionConfig {
    #[must_use]
    pub fn attended_window(&self) -> Duration {
        Duration::from_secs(self.attended_window_secs)
    }

    #[must_use]
    pub fn unattended_window(&self) -> Duration {
        Duration::from_secs(self.unattended_window_secs)
    }
}

impl Config {
    /// Default configuration path.
    #[must_use]
    pub fn default_path() -> PathBuf {
        PathBuf::from("/etc/ffg/config.toml")
    }

    /// Load config from default or explicit path, then apply env overrides.
    ///
    /// Missing config file is not an error when loading from default path; defaults are used.
    pub fn load(path: Option<&Path>) -> Result<Self> {
        let path_buf = path.map_or_else(Self::default_path, Path::to_path_buf);
        let is_explicit_path = path.is_some();

        let mut cfg = if path_buf.exists() {
            let raw = fs::read_to_string(&path_buf).map_err(|source| FfgError::Io {
                path: path_buf.clone(),
                source,
            })?;
            let parsed: Self = toml::from_str(&raw)?;
            parsed
        } else if is_explicit_path {
            return Err(FfgError::MissingConfig { path: path_buf });
        } else {
            Self::default()
        };

        cfg.config_file = path_buf;
        cfg.apply_env_overrides_from(env_var)?;
        cfg.validate()?;
        Ok(cfg)
    }

    /// Deterministic hash of the effective config for the startup log line.
    ///
    /// FNV-1a over the canonical JSON form, stable across processes.
    pub fn stable_hash(&self) -> Result<String> {
        let canonical = serde_json::to_string(self)?;
        let mut hash: u64 = 0xcbf2_9ce4_8422_2325;
        for byte in canonical.as_bytes() {
            hash ^= u64::from(*byte);
            hash = hash.wrapping_mul(0x0100_0000_01b3);
        }
        Ok(format!("{hash:016x}"))
    }

    fn apply_env_overrides_from<F>(&mut self, mut lookup: F) -> Result<()>
    where
        F: FnMut(&str) -> Option<String>,
    {
        if let Some(raw) = lookup("FFG_DEVICE") {
            self.device.name = raw;
        }
        if let Some(raw) = lookup("FFG_FREEFALL_PATH") {
            self.surfaces.freefall = PathBuf::from(raw);
        }
        if let Some(raw) = lookup("FFG_PARK_SECONDS") {
            self.protection.park_seconds = parse_env("FFG_PARK_SECONDS", &raw)?;
        }
        if let Some(raw) = lookup("FFG_ATTENDED_WINDOW_SECS") {
            self.protection.attended_window_secs = parse_env("FFG_ATTENDED_WINDOW_SECS", &raw)?;
        }
        if let Some(raw) = lookup("FFG_UNATTENDED_WINDOW_SECS") {
            self.protection.unattended_window_secs =
                parse_env("FFG_UNATTENDED_WINDOW_SECS", &raw)?;
        }
        if let Some(raw) = lookup("FFG_REALTIME_PRIORITY") {
            self.tuning.realtime_priority = parse_env("FFG_REALTIME_PRIORITY", &raw)?;
        }
        if let Some(raw) = lookup("FFG_LOCK_MEMORY") {
            self.tuning.lock_memory = parse_env("FFG_LOCK_MEMORY", &raw)?;
        }
        if let Some(raw) = lookup("FFG_JSONL_LOG") {
            self.log.jsonl_path = PathBuf::from(raw);
        }
        Ok(())
    }

    /// Check cross-field constraints. Called by [`Config::load`]; call again
    /// after mutating a loaded config (e.g. CLI overrides).
    pub fn validate(&self) -> Result<()> {
        let p = &self.protection;

        if p.attended_window_secs == 0 || p.unattended_window_secs == 0 {
            return Err(FfgError::InvalidConfig {
                details: "protection windows must be > 0 seconds".to_string(),
            });
        }

        if p.attended_window_secs > p.unattended_window_secs {
            return Err(FfgError::InvalidConfig {
                details: format!(
                    "protection.attended_window_secs ({}) must be <= unattended_window_secs ({})",
                    p.attended_window_secs, p.unattended_window_secs
                ),
            });
        }

        // The drive unparks by itself once park_seconds elapse; that must not
        // happen before the daemon's own deadline.
        if u64::from(p.park_seconds) <= p.unattended_window_secs {
            return Err(FfgError::InvalidConfig {
                details: format!(
                    "protection.park_seconds ({}) must exceed unattended_window_secs ({})",
                    p.park_seconds, p.unattended_window_secs
                ),
            });
        }

        if self.tuning.realtime_priority > 99 {
            return Err(FfgError::InvalidConfig {
                details: format!(
                    "tuning.realtime_priority must be in [0, 99], got {}",
                    self.tuning.realtime_priority
                ),
            });
        }

        if self.log.max_rotated_files == 0 {
            return Err(FfgError::InvalidConfig {
                details: "log.max_rotated_files must be >= 1".to_string(),
            });
        }

        crate::core::paths::normalize_device_name(&self.device.name)?;

        Ok(())
    }
}

fn env_var(name: &str) -> Option<String> {
    env::var(name).ok().filter(|raw| !raw.trim().is_empty())
}

fn parse_env<T>(name: &str, raw: &str) -> Result<T>
where
    T: std::str::FromStr,
    T::Err: std::fmt::Display,
{
    raw.trim().parse::<T>().map_err(|error| FfgError::ConfigParse {
        context: "env",
        details: format!("{name}={raw:?}: {error}"),
    })
}
