//! Boot readiness probe.

use std::time::Duration;

use tokio::task::JoinHandle;

use crate::adb::AdbSession;

/// Lists the resumed activity; output is empty until the launcher is in front.
pub(super) const RESUMED_ACTIVITY_PROBE: &str =
    "shell dumpsys activity activities | grep mResumedActivity";

/// Whether the device reports a resumed foreground activity.
pub(super) async fn has_resumed_activity(adb: &AdbSession, timeout: Duration) -> bool {
    match adb.exec(RESUMED_ACTIVITY_PROBE, timeout).await {
        Ok(output) => !output.stdout_lossy().trim().is_empty(),
        Err(e) => {
            log::debug!("Readiness probe on {} failed: {}", adb.serial(), e);
            false
        }
    }
}

/// One delayed readiness probe running in the background.
///
/// Dropping the task aborts it, so a superseded probe never reports.
pub(super) struct ProbeTask {
    handle: JoinHandle<bool>,
}

impl ProbeTask {
    pub(super) fn spawn(adb: AdbSession, delay: Duration, timeout: Duration) -> Self {
        let handle = tokio::spawn(async move {
            tokio::time::sleep(delay).await;
            has_resumed_activity(&adb, timeout).await
        });
        Self { handle }
    }

    pub(super) async fn ready(&mut self) -> bool {
        (&mut self.handle).await.unwrap_or(false)
    }
}

impl Drop for ProbeTask {
    fn drop(&mut self) {
        self.handle.abort();
    }
}
