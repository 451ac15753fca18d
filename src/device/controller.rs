//! Sysfs-backed device controller: head-park surface + protection LED.

#![allow(missing_docs)]

use std::fs::{File, OpenOptions};
use std::io::Write;
use std::path::{Path, PathBuf};

use crate::core::config::SurfacesConfig;
use crate::core::errors::{FfgError, Result};
use crate::core::paths::{head_park_path, normalize_device_name};
use crate::device::DeviceControl;

/// Drive units for the head-park surface are milliseconds.
const MILLIS_PER_SECOND: u64 = 1_000;

/// One storage device and its head-park control surface. Immutable once probed.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DeviceHandle {
    name: String,
    park_path: PathBuf,
}

impl DeviceHandle {
    /// Resolve the head-park surface for `device` under `block_root` and
    /// check that it can be opened.
    ///
    /// Fails with `DeviceUnsupported` when the drive has no head-park support
    /// or the process lacks permission to touch it.
    pub fn probe(device: &str, block_root: &Path) -> Result<Self> {
        let name = normalize_device_name(device)?;
        let park_path = head_park_path(block_root, &name);

        File::open(&park_path).map_err(|source| FfgError::DeviceUnsupported {
            device: device.to_string(),
            path: park_path.clone(),
            source,
        })?;

        Ok(Self { name, park_path })
    }

    /// Kernel device name (`sda`).
    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn park_path(&self) -> &Path {
        &self.park_path
    }
}

/// [`DeviceControl`] over the real sysfs surfaces.
///
/// The indicator path is process-wide (one LED per machine), not per device.
#[derive(Debug, Clone)]
pub struct SysfsDevice {
    handle: DeviceHandle,
    indicator_path: PathBuf,
}

impl SysfsDevice {
    pub fn new(handle: DeviceHandle, indicator_path: impl Into<PathBuf>) -> Self {
        Self {
            handle,
            indicator_path: indicator_path.into(),
        }
    }

    /// Probe `device` and pair it with the configured indicator surface.
    pub fn probe(device: &str, surfaces: &SurfacesConfig) -> Result<Self> {
        let handle = DeviceHandle::probe(device, &surfaces.block_root)?;
        Ok(Self::new(handle, surfaces.indicator.clone()))
    }

    pub fn handle(&self) -> &DeviceHandle {
        &self.handle
    }
}

impl DeviceControl for SysfsDevice {
    fn set_parked(&self, seconds: u32) -> Result<()> {
        write_int(&self.handle.park_path, u64::from(seconds) * MILLIS_PER_SECOND)
    }

    fn set_indicator(&self, on: bool) -> Result<()> {
        write_int(&self.indicator_path, u64::from(on))
    }
}

/// Write a decimal integer to an existing control surface in one attempt.
///
/// Never creates the file: a missing surface is an IO failure, not something
/// to paper over with a regular file.
fn write_int(path: &Path, value: u64) -> Result<()> {
    let mut file = OpenOptions::new()
        .write(true)
        .truncate(true)
        .open(path)
        .map_err(|source| FfgError::io(path, source))?;
    file.write_all(value.to_string().as_bytes())
        .map_err(|source| FfgError::io(path, source))
}
