//! Device-name normalization and control-surface path derivation.

use std::path::{Path, PathBuf};

use crate::core::errors::{FfgError, Result};

/// Prefix accepted (and stripped) in front of a block device name.
pub const DEV_PREFIX: &str = "/dev/";

/// Reduce `/dev/sda` or `sda` to the bare kernel name `sda`.
///
/// Rejects anything that could escape the block root once joined onto it.
pub fn normalize_device_name(raw: &str) -> Result<String> {
    let trimmed = raw.trim();
    let name = trimmed.strip_prefix(DEV_PREFIX).unwrap_or(trimmed);

    let invalid = |details: &str| FfgError::InvalidDevice {
        name: raw.to_string(),
        details: details.to_string(),
    };

    if name.is_empty() {
        return Err(invalid("device name is empty"));
    }
    if name.contains('/') {
        return Err(invalid("expected /dev/<name> or a bare kernel device name"));
    }
    if name == "." || name == ".." {
        return Err(invalid("not a device name"));
    }
    Ok(name.to_string())
}

/// Head-park control surface for a block device: `<root>/<name>/device/unload_heads`.
pub fn head_park_path(block_root: &Path, device_name: &str) -> PathBuf {
    block_root
        .join(device_name)
        .join("device")
        .join("unload_heads")
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn strips_dev_prefix() {
        assert_eq!(normalize_device_name("/dev/sda").unwrap(), "sda");
        assert_eq!(normalize_device_name("sdb").unwrap(), "sdb");
        assert_eq!(normalize_device_name("  /dev/nvme0n1 ").unwrap(), "nvme0n1");
    }

    #[test]
    fn rejects_paths_outside_dev() {
        assert!(normalize_device_name("/home/test").is_err());
        assert!(normalize_device_name("/dev/").is_err());
        assert!(normalize_device_name("").is_err());
        assert!(normalize_device_name("/dev/..").is_err());
    }

    #[test]
    fn invalid_device_error_names_input() {
        let err = normalize_device_name("/dev/disk/by-id/x").unwrap_err();
        assert_eq!(err.code(), "FFG-1101");
        assert!(err.to_string().contains("/dev/disk/by-id/x"));
    }

    #[test]
    fn head_park_path_layout() {
        assert_eq!(
            head_park_path(Path::new("/sys/block"), "sda"),
            PathBuf::from("/sys/block/sda/device/unload_heads")
        );
    }
}
