//! Top-level CLI definition and startup sequence.

use std::io::{self, Write};
use std::path::PathBuf;

use clap::Parser;
use serde::Serialize;
use thiserror::Error;

use freefall_guard::core::config::Config;
use freefall_guard::core::errors::FfgError;
use freefall_guard::daemon::detach::detach;
use freefall_guard::daemon::lifecycle::ProtectionSession;
use freefall_guard::daemon::loop_main::FreefallDaemon;
use freefall_guard::daemon::signals::SignalHandler;
use freefall_guard::daemon::tuning::{LinuxTuning, is_running_as_root, tune_around};
use freefall_guard::device::EnvironmentProbe;
use freefall_guard::device::controller::SysfsDevice;
use freefall_guard::device::environment::SysfsEnvironment;
use freefall_guard::logger::activity::{ActivityEvent, ActivityLoggerConfig, spawn_logger};
use freefall_guard::logger::jsonl::JsonlConfig;
use freefall_guard::protection::machine::ProtectionMachine;
use freefall_guard::protection::policy::ProtectionPolicy;
use freefall_guard::source::freefall::FreefallStream;

/// Freefall guard: parks the disk heads when the laptop is falling.
#[derive(Debug, Parser)]
#[command(
    name = "ffg",
    author,
    version,
    about = "Freefall Guard - parks hard-disk heads on freefall notifications",
    long_about = None
)]
pub struct Cli {
    /// Block device to protect (`/dev/sda` or `sda`). Defaults to the config value.
    #[arg(value_name = "DEVICE")]
    device: Option<String>,
    /// Stay attached to the terminal instead of detaching.
    #[arg(short = 'f', long, visible_alias = "no-daemon")]
    foreground: bool,
    /// Override config file path.
    #[arg(short, long, value_name = "PATH")]
    config: Option<PathBuf>,
    /// Check the device and print the current readings, then exit.
    #[arg(long)]
    probe: bool,
    /// Print `--probe` output as JSON.
    #[arg(long, requires = "probe")]
    json: bool,
}

/// Top-level CLI error.
#[derive(Debug, Error)]
pub enum CliError {
    #[error(transparent)]
    Guard(#[from] FfgError),
    #[error("failed to serialize output: {0}")]
    Json(#[from] serde_json::Error),
    #[error("failed to write output: {0}")]
    Io(#[from] io::Error),
}

/// Load configuration and dispatch to probe or daemon mode.
pub fn run(cli: &Cli) -> Result<(), CliError> {
    let mut config = Config::load(cli.config.as_deref())?;
    if let Some(device) = &cli.device {
        config.device.name.clone_from(device);
        config.validate()?;
    }

    if cli.probe {
        run_probe(cli, &config)
    } else {
        run_daemon(cli, &config)
    }
}

// ──────────────────── probe ────────────────────

#[derive(Debug, Serialize)]
struct ProbeReport {
    device: String,
    head_park_path: PathBuf,
    indicator_path: PathBuf,
    event_source: PathBuf,
    event_source_present: bool,
    on_external_power: bool,
    lid_open: bool,
    window_ms: u64,
    park_seconds: u32,
}

fn run_probe(cli: &Cli, config: &Config) -> Result<(), CliError> {
    let device = SysfsDevice::probe(&config.device.name, &config.surfaces)?;
    let environment = SysfsEnvironment::from_surfaces(&config.surfaces);
    let policy = ProtectionPolicy::from_config(&config.protection);

    let on_external_power = environment.on_external_power();
    let lid_open = environment.is_lid_open();
    let window = policy.select_window(on_external_power, lid_open);

    let report = ProbeReport {
        device: device.handle().name().to_string(),
        head_park_path: device.handle().park_path().to_path_buf(),
        indicator_path: config.surfaces.indicator.clone(),
        event_source: config.surfaces.freefall.clone(),
        event_source_present: config.surfaces.freefall.exists(),
        on_external_power,
        lid_open,
        window_ms: u64::try_from(window.as_millis()).unwrap_or(u64::MAX),
        park_seconds: policy.park_seconds,
    };

    let mut out = io::stdout().lock();
    if cli.json {
        serde_json::to_writer_pretty(&mut out, &report)?;
        writeln!(out)?;
    } else {
        writeln!(out, "device:         {}", report.device)?;
        writeln!(out, "head park:      {}", report.head_park_path.display())?;
        writeln!(out, "indicator:      {}", report.indicator_path.display())?;
        writeln!(
            out,
            "event source:   {} ({})",
            report.event_source.display(),
            if report.event_source_present { "present" } else { "missing" }
        )?;
        writeln!(out, "external power: {}", yes_no(report.on_external_power))?;
        writeln!(out, "lid open:       {}", yes_no(report.lid_open))?;
        writeln!(out, "window:         {}ms", report.window_ms)?;
        writeln!(out, "park command:   {}s", report.park_seconds)?;
    }
    Ok(())
}

fn yes_no(value: bool) -> &'static str {
    if value { "yes" } else { "no" }
}

// ──────────────────── daemon ────────────────────

fn run_daemon(cli: &Cli, config: &Config) -> Result<(), CliError> {
    if !is_running_as_root() {
        eprintln!("[FFG-DAEMON] warning: not running as root; control-surface writes will likely fail");
    }

    let device = SysfsDevice::probe(&config.device.name, &config.surfaces)?;
    let device_name = device.handle().name().to_string();
    let environment = SysfsEnvironment::from_surfaces(&config.surfaces);
    let policy = ProtectionPolicy::from_config(&config.protection);

    // Every early return below drops the session, which unparks the heads
    // and clears the indicator.
    let session = ProtectionSession::new(ProtectionMachine::new(device, environment, policy));

    let stream = FreefallStream::open(&config.surfaces.freefall)?;

    if !cli.foreground {
        detach()?;
    }

    // Helper threads start between the priority raise and the memory lock.
    let ((activity, logger_join, source), tuning) =
        tune_around(&LinuxTuning, &config.tuning, || {
            let (activity, logger_join) = spawn_logger(ActivityLoggerConfig {
                jsonl: JsonlConfig::from_log_config(&config.log),
                ..ActivityLoggerConfig::default()
            })?;
            let signals = SignalHandler::new();
            let source = stream.start(signals.subscribe())?;
            Ok((activity, logger_join, source))
        })?;
    for warning in &tuning.warnings {
        eprintln!("[FFG-TUNING] warning: {warning}");
        activity.send(ActivityEvent::TuningDegraded {
            details: warning.clone(),
        });
    }

    activity.send(ActivityEvent::DaemonStarted {
        version: env!("CARGO_PKG_VERSION").to_string(),
        device: device_name.clone(),
        config_hash: config.stable_hash().unwrap_or_default(),
        tuning: tuning.summary(),
    });

    let outcome = FreefallDaemon::new(session, source, activity.clone(), device_name).run();

    activity.shutdown();
    if logger_join.join().is_err() {
        eprintln!("[FFG-DAEMON] logger thread panicked during shutdown");
    }
    if activity.dropped_events() > 0 {
        eprintln!(
            "[FFG-DAEMON] {} activity events dropped",
            activity.dropped_events()
        );
    }

    outcome.map(|_| ()).map_err(CliError::from)
}
