//! Detach from the controlling terminal.

use crate::core::errors::{FfgError, Result};

/// Background the process with `daemon(3)`: fork, new session, cwd `/`,
/// standard streams on `/dev/null`. The umask is reset to 022 first.
///
/// Must run before any thread is spawned; only the calling thread survives
/// the fork.
#[cfg(target_os = "linux")]
pub fn detach() -> Result<()> {
    use nix::sys::stat::{Mode, umask};

    umask(Mode::from_bits_truncate(0o022));
    nix::unistd::daemon(false, false).map_err(|e| FfgError::Runtime {
        details: format!("failed to detach: {e}"),
    })
}

#[cfg(not(target_os = "linux"))]
pub fn detach() -> Result<()> {
    Err(FfgError::Runtime {
        details: "detaching is not supported on this platform; use --foreground".to_string(),
    })
}
