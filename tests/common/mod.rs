#![allow(dead_code)]

use std::fs;
use std::io::{self, Read, Write};
use std::os::unix::net::UnixStream;
use std::path::{Path, PathBuf};
use std::process::{Command, ExitStatus};
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};
use std::thread;
use std::time::{Duration, Instant, SystemTime, UNIX_EPOCH};

use crossbeam_channel::{Sender, bounded};
use parking_lot::Mutex;

use freefall_guard::core::errors::{FfgError, Result};
use freefall_guard::daemon::lifecycle::ProtectionSession;
use freefall_guard::daemon::loop_main::FreefallDaemon;
use freefall_guard::device::{DeviceControl, EnvironmentProbe};
use freefall_guard::logger::activity::ActivityLoggerHandle;
use freefall_guard::protection::machine::ProtectionMachine;
use freefall_guard::protection::policy::ProtectionPolicy;
use freefall_guard::source::freefall::{FreefallStream, ShutdownCause};

// ──────────────────── CLI runner ────────────────────

pub struct CmdResult {
    pub status: ExitStatus,
    pub stdout: String,
    pub stderr: String,
    pub log_path: PathBuf,
}

const FFG_ENV_VARS: [&str; 8] = [
    "FFG_DEVICE",
    "FFG_FREEFALL_PATH",
    "FFG_PARK_SECONDS",
    "FFG_ATTENDED_WINDOW_SECS",
    "FFG_UNATTENDED_WINDOW_SECS",
    "FFG_REALTIME_PRIORITY",
    "FFG_LOCK_MEMORY",
    "FFG_JSONL_LOG",
];

fn now_millis() -> u128 {
    SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .map_or(0, |d| d.as_millis())
}

fn sanitize(name: &str) -> String {
    name.chars()
        .map(|c| if c.is_ascii_alphanumeric() { c } else { '_' })
        .collect()
}

fn resolve_bin_path() -> PathBuf {
    if let Ok(path) = std::env::var("CARGO_BIN_EXE_ffg") {
        return PathBuf::from(path);
    }

    let fallback = std::env::current_exe()
        .ok()
        .and_then(|p| p.parent().map(PathBuf::from))
        .and_then(|deps| deps.parent().map(PathBuf::from))
        .map(|debug_dir| debug_dir.join("ffg"));

    match fallback {
        Some(path) if path.exists() => path,
        _ => panic!("unable to resolve ffg binary path for integration test"),
    }
}

pub fn run_cli_case(case_name: &str, args: &[&str]) -> CmdResult {
    let root = std::env::temp_dir().join("ffg-test-logs");
    fs::create_dir_all(&root).expect("create temp test log dir");

    let log_path = root.join(format!("{}-{}.log", sanitize(case_name), now_millis()));
    let bin_path = resolve_bin_path();

    let mut command = Command::new(&bin_path);
    command.args(args).env("RUST_BACKTRACE", "1");
    for var in FFG_ENV_VARS {
        command.env_remove(var);
    }
    let output = command.output().expect("execute ffg command");

    let stdout = String::from_utf8_lossy(&output.stdout).to_string();
    let stderr = String::from_utf8_lossy(&output.stderr).to_string();

    let log_content = format!(
        "case={case_name}\nbin={}\nargs={args:?}\nstatus={}\n----- stdout -----\n{stdout}\n----- stderr -----\n{stderr}\n",
        bin_path.display(),
        output.status
    );
    fs::write(&log_path, log_content).expect("write test log");

    CmdResult {
        status: output.status,
        stdout,
        stderr,
        log_path,
    }
}

// ──────────────────── fake control surfaces ────────────────────

/// A temp directory laid out like the sysfs/procfs surfaces the daemon uses.
pub struct FakeSysfs {
    pub dir: tempfile::TempDir,
}

impl FakeSysfs {
    /// One disk with head-park support, an indicator, AC online and lid open.
    pub fn with_disk(name: &str) -> Self {
        let dir = tempfile::tempdir().expect("tempdir");
        let fake = Self { dir };
        let device_dir = fake.block_root().join(name).join("device");
        fs::create_dir_all(&device_dir).expect("create device dir");
        fs::write(device_dir.join("unload_heads"), "0").expect("write unload_heads");
        fs::write(fake.indicator(), "0").expect("write brightness");
        fake.set_power("1");
        fake.set_lid("state:      open");
        fake
    }

    pub fn root(&self) -> &Path {
        self.dir.path()
    }

    pub fn block_root(&self) -> PathBuf {
        self.root().join("block")
    }

    pub fn park_surface(&self, name: &str) -> PathBuf {
        self.block_root().join(name).join("device").join("unload_heads")
    }

    pub fn indicator(&self) -> PathBuf {
        self.root().join("brightness")
    }

    pub fn power(&self) -> PathBuf {
        self.root().join("online")
    }

    pub fn lid(&self) -> PathBuf {
        self.root().join("state")
    }

    pub fn freefall(&self) -> PathBuf {
        self.root().join("freefall")
    }

    pub fn activity_log(&self) -> PathBuf {
        self.root().join("log").join("activity.jsonl")
    }

    pub fn set_power(&self, raw: &str) {
        fs::write(self.power(), raw).expect("write power surface");
    }

    pub fn set_lid(&self, raw: &str) {
        fs::write(self.lid(), raw).expect("write lid surface");
    }

    pub fn remove_lid(&self) {
        let _ = fs::remove_file(self.lid());
    }

    pub fn read(&self, path: &Path) -> String {
        fs::read_to_string(path).expect("read surface")
    }

    /// Config pointing every surface into this tree; tuning disabled.
    pub fn write_config(&self, device: &str) -> PathBuf {
        self.write_config_locking(device, false)
    }

    /// Same as [`FakeSysfs::write_config`] with `tuning.lock_memory` set.
    pub fn write_config_locking(&self, device: &str, lock_memory: bool) -> PathBuf {
        let path = self.root().join("config.toml");
        let body = format!(
            r#"[device]
name = "{device}"

[surfaces]
block_root = "{block}"
indicator = "{led}"
power_online = "{power}"
lid_state = "{lid}"
freefall = "{freefall}"

[tuning]
realtime_priority = 0
lock_memory = {lock_memory}

[log]
jsonl_path = "{log}"
"#,
            block = self.block_root().display(),
            led = self.indicator().display(),
            power = self.power().display(),
            lid = self.lid().display(),
            freefall = self.freefall().display(),
            log = self.activity_log().display(),
        );
        fs::write(&path, body).expect("write config");
        path
    }

    pub fn activity_events(&self) -> Vec<serde_json::Value> {
        fs::read_to_string(self.activity_log())
            .unwrap_or_default()
            .lines()
            .map(|l| serde_json::from_str(l).expect("valid jsonl line"))
            .collect()
    }
}

// ──────────────────── recording doubles ────────────────────

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DeviceCommand {
    Park(u32),
    Indicator(bool),
}

#[derive(Default)]
pub struct RecordingDevice {
    commands: Mutex<Vec<DeviceCommand>>,
    fail_park: AtomicBool,
}

impl RecordingDevice {
    pub fn commands(&self) -> Vec<DeviceCommand> {
        self.commands.lock().clone()
    }

    pub fn count(&self, command: DeviceCommand) -> usize {
        self.commands.lock().iter().filter(|c| **c == command).count()
    }

    pub fn fail_park(&self, fail: bool) {
        self.fail_park.store(fail, Ordering::Relaxed);
    }

    /// Last park and indicator values written, if any.
    pub fn observed(&self) -> (Option<u32>, Option<bool>) {
        let commands = self.commands.lock();
        let park = commands.iter().rev().find_map(|c| match c {
            DeviceCommand::Park(s) => Some(*s),
            DeviceCommand::Indicator(_) => None,
        });
        let led = commands.iter().rev().find_map(|c| match c {
            DeviceCommand::Indicator(on) => Some(*on),
            DeviceCommand::Park(_) => None,
        });
        (park, led)
    }
}

impl DeviceControl for RecordingDevice {
    fn set_parked(&self, seconds: u32) -> Result<()> {
        self.commands.lock().push(DeviceCommand::Park(seconds));
        if self.fail_park.load(Ordering::Relaxed) {
            return Err(FfgError::io("unload_heads", io::Error::other("injected")));
        }
        Ok(())
    }

    fn set_indicator(&self, on: bool) -> Result<()> {
        self.commands.lock().push(DeviceCommand::Indicator(on));
        Ok(())
    }
}

#[derive(Debug, Clone, Copy)]
pub struct FixedEnvironment {
    pub on_power: bool,
    pub lid_open: bool,
}

impl EnvironmentProbe for FixedEnvironment {
    fn on_external_power(&self) -> bool {
        self.on_power
    }

    fn is_lid_open(&self) -> bool {
        self.lid_open
    }
}

/// Poll `condition` until it holds or `timeout` passes; returns the last result.
pub fn wait_until(timeout: Duration, mut condition: impl FnMut() -> bool) -> bool {
    let deadline = Instant::now() + timeout;
    loop {
        if condition() {
            return true;
        }
        if Instant::now() >= deadline {
            return false;
        }
        thread::sleep(Duration::from_millis(5));
    }
}

/// Millisecond-scale windows so live loops finish quickly.
pub fn fast_policy(attended_ms: u64, unattended_ms: u64) -> ProtectionPolicy {
    ProtectionPolicy {
        park_seconds: 21,
        attended_window: Duration::from_millis(attended_ms),
        unattended_window: Duration::from_millis(unattended_ms),
    }
}

// ──────────────────── live daemon ────────────────────

/// A daemon loop on its own thread, fed through a socket pair.
pub struct RunningDaemon {
    writer: UnixStream,
    shutdown: Sender<ShutdownCause>,
    join: thread::JoinHandle<Result<ShutdownCause>>,
}

impl RunningDaemon {
    pub fn start<E>(device: &Arc<RecordingDevice>, environment: E, policy: ProtectionPolicy) -> Self
    where
        E: EnvironmentProbe + Send + 'static,
    {
        let (writer, reader) = UnixStream::pair().expect("socket pair");
        Self::start_with_reader(device, environment, policy, reader, writer)
    }

    pub fn start_with_reader<E, R>(
        device: &Arc<RecordingDevice>,
        environment: E,
        policy: ProtectionPolicy,
        reader: R,
        writer: UnixStream,
    ) -> Self
    where
        E: EnvironmentProbe + Send + 'static,
        R: Read + Send + 'static,
    {
        let (tx, rx) = bounded(1);
        let machine = ProtectionMachine::new(Arc::clone(device), environment, policy);
        let source = FreefallStream::from_reader("test-freefall", reader)
            .start(rx)
            .expect("start event source");
        let daemon = FreefallDaemon::new(
            ProtectionSession::new(machine),
            source,
            ActivityLoggerHandle::disabled(),
            "sda",
        );
        let join = thread::spawn(move || daemon.run());
        Self {
            writer,
            shutdown: tx,
            join,
        }
    }

    pub fn fire(&mut self, count: u8) {
        self.writer.write_all(&[count]).expect("write event byte");
    }

    pub fn stop(self, cause: ShutdownCause) -> Result<ShutdownCause> {
        let _ = self.shutdown.send(cause);
        self.join.join().expect("daemon thread panicked")
    }

    /// Wait for the loop to end on its own (fatal stream error).
    pub fn wait(self) -> Result<ShutdownCause> {
        self.join.join().expect("daemon thread panicked")
    }
}

/// Reader that yields `bytes` and then fails with a non-interrupt error.
pub struct FailingReader {
    bytes: Vec<u8>,
    pos: usize,
}

impl FailingReader {
    pub fn after(bytes: &[u8]) -> Self {
        Self {
            bytes: bytes.to_vec(),
            pos: 0,
        }
    }
}

impl Read for FailingReader {
    fn read(&mut self, buf: &mut [u8]) -> io::Result<usize> {
        if self.pos < self.bytes.len() {
            buf[0] = self.bytes[self.pos];
            self.pos += 1;
            return Ok(1);
        }
        Err(io::Error::new(io::ErrorKind::BrokenPipe, "device went away"))
    }
}
