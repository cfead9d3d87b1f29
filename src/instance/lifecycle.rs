//! Emulator lifecycle management (kill/launch/restart).

use std::time::Duration;

use tokio::time::Instant;

use super::health::ProbeTask;
use super::Emulator;
use crate::error::{AppError, Result, ResultExt as _};
use crate::process::{force_kill, spawn_detached, wait_for_exit, LaunchHandle};

/// Whatever finished first in one racing iteration.
#[derive(Debug)]
enum RaceEvent {
    LaunchFinished(Result<()>),
    TimedOut,
    Probe(bool),
}

impl Emulator {
    /// Force-kill the emulator process for this AVD.
    ///
    /// A missing process is reported as [`ErrorKind::NotFound`](crate::ErrorKind::NotFound);
    /// callers wanting best-effort semantics must ignore it themselves.
    pub async fn kill(&self) -> Result<()> {
        let pid = self.find_pid().await?;
        log::info!("Killing emulator {} (pid: {})", self.avd_name, pid);
        force_kill(pid)?;

        if !wait_for_exit(pid, self.timings.command_timeout()).await {
            log::warn!(
                "Emulator {} (pid: {}) still present after SIGKILL",
                self.avd_name,
                pid
            );
        }
        Ok(())
    }

    /// Kill any running instance, relaunch it and wait until it has booted.
    ///
    /// May take `timeout` plus the settle period.
    pub async fn restart(&mut self, timeout: Duration) -> Result<()> {
        let extra_args = self.extra_args.clone();
        self.restart_with_args(&extra_args, timeout).await
    }

    /// Like [`Emulator::restart`], launching with `extra_args` for this call only.
    pub async fn restart_with_args(&mut self, extra_args: &str, timeout: Duration) -> Result<()> {
        self.kill()
            .await
            .ignore_and_log(&format!("Stopping emulator {} before restart", self.avd_name));

        let mut launch = self.launch(extra_args)?;
        let deadline = Instant::now() + timeout;
        self.wait_until_ready(&mut launch, deadline, timeout).await?;

        // Settings activities can still be coming up right after the first resume.
        log::info!(
            "Emulator {} is ready, settling for {:?}",
            self.avd_name,
            self.timings.settle_period()
        );
        tokio::time::sleep(self.timings.settle_period()).await;
        Ok(())
    }

    fn launch(&self, extra_args: &str) -> Result<LaunchHandle> {
        let mut args = vec![
            "-avd".to_string(),
            self.avd_name.clone(),
            "-port".to_string(),
            self.port.to_string(),
        ];
        args.extend(extra_args.split_whitespace().map(str::to_string));

        spawn_detached(&self.emulator_path, &args, &self.avd_name)
    }

    /// Race process exit, the deadline and a delayed readiness probe until the
    /// probe succeeds. Every event is followed by a fresh liveness check.
    async fn wait_until_ready(
        &self,
        launch: &mut LaunchHandle,
        deadline: Instant,
        budget: Duration,
    ) -> Result<()> {
        loop {
            let mut probe = ProbeTask::spawn(
                self.adb.clone(),
                self.timings.probe_delay(),
                self.timings.command_timeout(),
            );

            let event = tokio::select! {
                outcome = launch.exited() => RaceEvent::LaunchFinished(outcome),
                () = tokio::time::sleep_until(deadline) => RaceEvent::TimedOut,
                ready = probe.ready() => RaceEvent::Probe(ready),
            };
            drop(probe);

            let ready = match event {
                RaceEvent::LaunchFinished(Err(e)) => {
                    return Err(AppError::launch(format!(
                        "Emulator {} exited before booting: {}",
                        self.avd_name, e
                    )));
                }
                RaceEvent::LaunchFinished(Ok(())) => {
                    log::debug!(
                        "Launcher for {} (pid: {}) exited cleanly",
                        self.avd_name,
                        launch.pid()
                    );
                    false
                }
                RaceEvent::TimedOut => return Err(AppError::restart_timeout(budget)),
                RaceEvent::Probe(ready) => {
                    log::debug!("Emulator {} readiness probe: {}", self.avd_name, ready);
                    ready
                }
            };

            let pid = self
                .find_pid()
                .await
                .map_err(|e| AppError::process_lost(&self.avd_name, &e))?;

            if ready {
                log::info!("Emulator {} booted (pid: {})", self.avd_name, pid);
                return Ok(());
            }
        }
    }
}
