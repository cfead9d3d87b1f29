#![cfg(unix)]

use std::fs;
use std::os::unix::fs::PermissionsExt as _;
use std::path::{Path, PathBuf};
use std::time::{Duration, Instant};

use avd_launcher::{
    force_kill, is_process_alive, wait_for_exit, AdbOptions, Emulator, ErrorKind,
    RestartTimings,
};
use tempfile::TempDir;

const FAST: RestartTimings = RestartTimings {
    probe_delay_ms: 300,
    settle_ms: 200,
    command_timeout_ms: 2000,
};

/// Stub SDK: a qemu binary whose command line matches the default process
/// pattern, an optional `emulator` wrapper, and an adb that reports a resumed
/// activity once the stub has written its boot marker.
struct StubSdk {
    dir: TempDir,
    avd_name: String,
}

impl StubSdk {
    fn new() -> Self {
        let dir = tempfile::tempdir().unwrap();
        fs::create_dir_all(dir.path().join("emulator/qemu/linux-x86_64")).unwrap();
        let sdk = Self {
            dir,
            avd_name: format!("avd-{}", uuid::Uuid::new_v4()),
        };
        sdk.write_script(
            "adb",
            &format!(
                "if [ -f '{}' ]; then echo '  mResumedActivity: ActivityRecord{{1 u0 launcher t2}}'; fi",
                sdk.marker().display()
            ),
        );
        sdk
    }

    fn marker(&self) -> PathBuf {
        self.dir.path().join("booted")
    }

    fn qemu(&self) -> PathBuf {
        self.dir
            .path()
            .join("emulator/qemu/linux-x86_64/qemu-system-stub")
    }

    fn write_script(&self, relative: &str, body: &str) -> PathBuf {
        let path = self.dir.path().join(relative);
        fs::write(&path, format!("#!/bin/sh\n{body}\n")).unwrap();
        fs::set_permissions(&path, fs::Permissions::from_mode(0o755)).unwrap();
        path
    }

    fn write_qemu(&self, body: &str) -> PathBuf {
        let relative = self
            .qemu()
            .strip_prefix(self.dir.path())
            .unwrap()
            .to_string_lossy()
            .into_owned();
        self.write_script(&relative, body)
    }

    /// A qemu stub that boots after `boot` and then stays up.
    fn booting_qemu(&self, boot: &str) -> PathBuf {
        self.write_qemu(&format!(
            "sleep {boot}\ntouch '{}'\nsleep 120",
            self.marker().display()
        ))
    }

    /// A qemu stub that boots at once and keeps writing to stdout and stderr.
    fn chatty_qemu(&self) -> PathBuf {
        self.write_qemu(&format!(
            "touch '{}'\ni=0\nwhile [ $i -lt 600 ]; do\n  echo \"tick $i\"\n  echo \"tock $i\" >&2\n  i=$((i+1))\n  sleep 0.1\ndone",
            self.marker().display()
        ))
    }

    fn emulator(&self, launch_path: &Path, timings: RestartTimings) -> Emulator {
        Emulator::new(
            launch_path,
            &self.avd_name,
            5556,
            "-no-window -no-audio",
            AdbOptions {
                adb_path: self.dir.path().join("adb"),
                forward_port: 0,
            },
        )
        .with_timings(timings)
    }
}

async fn cleanup(emulator: &Emulator) {
    let _ = emulator.kill().await;
}

#[tokio::test]
async fn restart_returns_once_booted_and_alive() {
    let sdk = StubSdk::new();
    let qemu = sdk.booting_qemu("0.8");
    let mut emulator = sdk.emulator(&qemu, FAST);

    let started = Instant::now();
    emulator.restart(Duration::from_secs(30)).await.unwrap();
    let elapsed = started.elapsed();

    assert!(elapsed >= Duration::from_millis(1000), "{elapsed:?}");
    assert!(elapsed < Duration::from_secs(10), "{elapsed:?}");

    let pid = emulator.find_pid().await.unwrap();
    assert!(is_process_alive(pid));
    assert!(emulator.is_running().await);

    cleanup(&emulator).await;
}

#[tokio::test]
async fn restart_kills_the_previous_instance() {
    let sdk = StubSdk::new();
    let qemu = sdk.booting_qemu("0.2");
    let mut emulator = sdk.emulator(&qemu, FAST);

    emulator.restart(Duration::from_secs(30)).await.unwrap();
    let first = emulator.find_pid().await.unwrap();

    emulator.restart(Duration::from_secs(30)).await.unwrap();
    let second = emulator.find_pid().await.unwrap();

    assert_ne!(first, second);
    assert!(wait_for_exit(first, Duration::from_secs(2)).await);
    assert!(is_process_alive(second));

    cleanup(&emulator).await;
}

#[tokio::test]
async fn kill_then_lookup_is_not_found() {
    let sdk = StubSdk::new();
    let qemu = sdk.booting_qemu("0.2");
    let mut emulator = sdk.emulator(&qemu, FAST);

    emulator.restart(Duration::from_secs(30)).await.unwrap();
    emulator.kill().await.unwrap();

    let err = emulator.find_pid().await.unwrap_err();
    assert_eq!(err.kind(), ErrorKind::NotFound);
    assert_eq!(emulator.kill().await.unwrap_err().kind(), ErrorKind::NotFound);
}

#[tokio::test]
async fn budget_shorter_than_readiness_delay_times_out() {
    let sdk = StubSdk::new();
    let qemu = sdk.booting_qemu("0");
    let mut emulator = sdk.emulator(&qemu, FAST);

    let started = Instant::now();
    let err = emulator
        .restart(Duration::from_millis(100))
        .await
        .unwrap_err();
    assert_eq!(err.kind(), ErrorKind::Timeout);
    assert!(started.elapsed() < Duration::from_millis(300 + 2000));

    // The timed-out instance is left running for the next restart to clean up.
    assert!(emulator.is_running().await);
    cleanup(&emulator).await;
}

#[tokio::test]
async fn early_exit_with_error_is_a_launch_error() {
    let sdk = StubSdk::new();
    let crashing = sdk.write_script(
        "crashing-emulator",
        "echo 'PANIC: Missing emulator engine' >&2\nexit 1",
    );
    let mut emulator = sdk.emulator(&crashing, FAST);

    let err = emulator
        .restart(Duration::from_secs(30))
        .await
        .unwrap_err();
    assert_eq!(err.kind(), ErrorKind::Launch);
}

#[tokio::test]
async fn clean_exit_without_process_is_process_lost() {
    let sdk = StubSdk::new();
    let vanishing = sdk.write_script("vanishing-emulator", "exit 0");
    let mut emulator = sdk.emulator(&vanishing, FAST);

    let err = emulator
        .restart(Duration::from_secs(30))
        .await
        .unwrap_err();
    assert_eq!(err.kind(), ErrorKind::ProcessLost);
}

#[tokio::test]
async fn ready_device_without_emulator_process_is_process_lost() {
    let sdk = StubSdk::new();
    fs::write(sdk.marker(), "").unwrap();
    let pid_file = sdk.dir.path().join("sleeper.pid");
    let sleeper = sdk.write_script(
        "sleeper",
        &format!("echo $$ > '{}'\nexec sleep 30", pid_file.display()),
    );
    let mut emulator = sdk.emulator(&sleeper, FAST);

    let err = emulator
        .restart(Duration::from_secs(30))
        .await
        .unwrap_err();
    assert_eq!(err.kind(), ErrorKind::ProcessLost);

    let pid: u32 = fs::read_to_string(&pid_file)
        .unwrap()
        .trim()
        .parse()
        .unwrap();
    let _ = force_kill(pid);
}

#[test]
fn launched_emulator_outlives_the_runtime() {
    let sdk = StubSdk::new();
    let qemu = sdk.chatty_qemu();
    let mut emulator = sdk.emulator(&qemu, FAST);

    let runtime = tokio::runtime::Runtime::new().unwrap();
    let pid = runtime.block_on(async {
        emulator.restart(Duration::from_secs(30)).await.unwrap();
        emulator.find_pid().await.unwrap()
    });
    drop(runtime);
    std::thread::sleep(Duration::from_secs(1));

    let runtime = tokio::runtime::Runtime::new().unwrap();
    runtime.block_on(async {
        assert_eq!(emulator.find_pid().await.unwrap(), pid);
        assert!(is_process_alive(pid));
        cleanup(&emulator).await;
    });
}

#[tokio::test]
async fn clean_wrapper_exit_keeps_waiting_for_boot() {
    let sdk = StubSdk::new();
    let qemu = sdk.booting_qemu("0.6");
    let wrapper = sdk.write_script(
        "emulator/emulator",
        &format!("'{}' \"$@\" &\nsleep 0.2\nexit 0", qemu.display()),
    );
    let mut emulator = sdk.emulator(&wrapper, FAST);

    emulator.restart(Duration::from_secs(30)).await.unwrap();
    assert!(emulator.is_running().await);

    cleanup(&emulator).await;
}

#[tokio::test]
async fn restart_with_args_overrides_launch_arguments() {
    let sdk = StubSdk::new();
    let args_file = sdk.dir.path().join("args");
    let qemu = sdk.booting_qemu("0.2");
    let recording = sdk.write_script(
        "emulator/recording-emulator",
        &format!(
            "echo \"$@\" > '{}'\n'{}' \"$@\" &\nsleep 0.2\nexit 0",
            args_file.display(),
            qemu.display()
        ),
    );
    let mut emulator = sdk.emulator(&recording, FAST);

    emulator
        .restart_with_args("-wipe-data", Duration::from_secs(30))
        .await
        .unwrap();

    let args = fs::read_to_string(&args_file).unwrap();
    assert_eq!(args.trim(), format!("-avd {} -port 5556 -wipe-data", sdk.avd_name));
    assert_eq!(emulator.extra_args(), "-no-window -no-audio");

    cleanup(&emulator).await;
}

#[tokio::test]
async fn default_timings_do_not_wait_for_the_full_budget() {
    let sdk = StubSdk::new();
    let qemu = sdk.booting_qemu("4");
    let mut emulator = sdk.emulator(&qemu, RestartTimings::default());

    let started = Instant::now();
    emulator.restart(Duration::from_secs(90)).await.unwrap();
    // Not ready at 3 s, ready at 6 s, then 3 s of settling.
    let elapsed = started.elapsed();
    assert!(elapsed >= Duration::from_secs(9), "{elapsed:?}");
    assert!(elapsed < Duration::from_secs(11), "{elapsed:?}");

    cleanup(&emulator).await;
}

#[tokio::test]
async fn exec_passes_through_to_adb() {
    let sdk = StubSdk::new();
    let qemu = sdk.booting_qemu("0");
    let emulator = sdk.emulator(&qemu, FAST);

    fs::write(sdk.marker(), "").unwrap();
    let output = emulator
        .exec("shell dumpsys activity activities", Duration::from_secs(5))
        .await
        .unwrap();
    assert!(output.stdout_lossy().contains("mResumedActivity"));
}
