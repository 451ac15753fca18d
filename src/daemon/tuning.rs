//! Best-effort process tuning: real-time scheduling and locked memory.
//!
//! Both keep the response to a freefall event prompt under load and memory
//! pressure. Neither is required; each failure is reported as a warning and
//! the daemon carries on.
//!
//! Order matters: threads inherit the scheduling policy of the thread that
//! spawns them, so the priority is raised first. Memory is locked last, once
//! every helper thread stack is mapped; see [`tune_around`].

#![allow(missing_docs)]

use std::process::Command;

use crate::core::config::TuningConfig;
use crate::core::errors::{FfgError, Result};

/// Seam over the privileged OS calls so the policy can be tested.
pub trait SystemTuning {
    /// Move the whole process to SCHED_FIFO at `priority`.
    fn raise_priority(&self, priority: u8) -> Result<()>;
    /// Lock current and future pages into RAM.
    fn lock_memory(&self) -> Result<()>;
}

/// Linux implementation: `chrt` for the scheduler, `mlockall(2)` via nix.
#[derive(Debug, Default, Clone, Copy)]
pub struct LinuxTuning;

impl SystemTuning for LinuxTuning {
    fn raise_priority(&self, priority: u8) -> Result<()> {
        // --all-tasks covers threads spawned before this point.
        let output = Command::new("chrt")
            .arg("--fifo")
            .arg("--all-tasks")
            .arg("--pid")
            .arg(priority.to_string())
            .arg(std::process::id().to_string())
            .output()
            .map_err(|e| FfgError::Runtime {
                details: format!("failed to run chrt: {e}"),
            })?;

        if output.status.success() {
            Ok(())
        } else {
            Err(FfgError::Runtime {
                details: format!(
                    "chrt exited with {}: {}",
                    output.status,
                    String::from_utf8_lossy(&output.stderr).trim()
                ),
            })
        }
    }

    #[cfg(target_os = "linux")]
    fn lock_memory(&self) -> Result<()> {
        use nix::sys::mman::{MlockAllFlags, mlockall};
        use nix::sys::resource::{RLIM_INFINITY, Resource, getrlimit};

        // Under a finite RLIMIT_MEMLOCK every later mapping counts against
        // the limit and fails once it is exhausted, so only lock what is
        // mapped now.
        let unlimited = getrlimit(Resource::RLIMIT_MEMLOCK)
            .is_ok_and(|(soft, _)| soft == RLIM_INFINITY);
        let flags = if unlimited {
            MlockAllFlags::MCL_CURRENT | MlockAllFlags::MCL_FUTURE
        } else {
            MlockAllFlags::MCL_CURRENT
        };
        mlockall(flags).map_err(|e| FfgError::Runtime {
            details: format!("mlockall failed: {e}"),
        })
    }

    #[cfg(not(target_os = "linux"))]
    fn lock_memory(&self) -> Result<()> {
        Err(FfgError::Runtime {
            details: "memory locking is not supported on this platform".to_string(),
        })
    }
}

/// What [`tune_around`] managed to do.
#[derive(Debug, Default, Clone, PartialEq, Eq)]
pub struct TuningReport {
    pub applied: Vec<&'static str>,
    pub warnings: Vec<String>,
}

impl TuningReport {
    /// Applied steps for the startup event, e.g. `realtime-scheduling,memory-lock`.
    pub fn summary(&self) -> String {
        if self.applied.is_empty() {
            "none".to_string()
        } else {
            self.applied.join(",")
        }
    }
}

/// Tune the process around `spawn`, which starts the helper threads.
///
/// The scheduler is raised before `spawn` so the threads inherit SCHED_FIFO;
/// memory is locked after it so thread stacks are mapped before any locking
/// limit applies. Tuning failures become warnings; only `spawn` can fail.
pub fn tune_around<T>(
    tuner: &impl SystemTuning,
    config: &TuningConfig,
    spawn: impl FnOnce() -> Result<T>,
) -> Result<(T, TuningReport)> {
    let mut report = TuningReport::default();
    raise_priority_best_effort(tuner, config, &mut report);
    let spawned = spawn()?;
    lock_memory_best_effort(tuner, config, &mut report);
    Ok((spawned, report))
}

fn raise_priority_best_effort(
    tuner: &impl SystemTuning,
    config: &TuningConfig,
    report: &mut TuningReport,
) {
    if config.realtime_priority > 0 {
        match tuner.raise_priority(config.realtime_priority) {
            Ok(()) => report.applied.push("realtime-scheduling"),
            Err(e) => report.warnings.push(format!(
                "could not set SCHED_FIFO priority {}: {e}",
                config.realtime_priority
            )),
        }
    }
}

fn lock_memory_best_effort(
    tuner: &impl SystemTuning,
    config: &TuningConfig,
    report: &mut TuningReport,
) {
    if config.lock_memory {
        match tuner.lock_memory() {
            Ok(()) => report.applied.push("memory-lock"),
            Err(e) => report.warnings.push(format!("could not lock memory: {e}")),
        }
    }
}

/// Effective UID 0. The daemon still starts otherwise, but control-surface
/// writes and tuning will most likely fail.
#[cfg(unix)]
pub fn is_running_as_root() -> bool {
    nix::unistd::geteuid().is_root()
}

#[cfg(not(unix))]
pub fn is_running_as_root() -> bool {
    false
}
