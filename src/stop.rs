//! Stop orchestration for a recording owned by another process.
//!
//! The stopping invocation never touches the audio stream itself: it asks
//! the capture process to stop (SIGTERM), waits a bounded time for it to
//! exit, and escalates to SIGKILL if it does not. Whatever happens, the
//! session record is released so the next invocation starts from a clean
//! slate; escalation is reported as an error, not silent success.

use crate::defaults;
use crate::error::{DictoggleError, Result};
use crate::session::{SessionRecord, SessionStore};
use crate::sys;
use std::time::Duration;
use tokio::time::Instant;

/// Result of a stop request.
#[derive(Debug, Clone, PartialEq)]
pub enum StopOutcome {
    /// No session existed; stopping while idle is a no-op.
    Idle,
    /// A stale record (dead owner) was found and reaped.
    StaleReaped { pid: i32 },
    /// The capture process exited within the budget. The record describes
    /// the finished session; its artifact is ready for transcription.
    Stopped { record: SessionRecord },
}

/// Orchestrates the SIGTERM → poll → SIGKILL stop protocol.
pub struct StopOrchestrator<'a> {
    store: &'a SessionStore,
    wait: Duration,
    poll_interval: Duration,
}

impl<'a> StopOrchestrator<'a> {
    /// Create an orchestrator with the default budgets.
    pub fn new(store: &'a SessionStore) -> Self {
        Self {
            store,
            wait: defaults::STOP_WAIT,
            poll_interval: defaults::STOP_POLL_INTERVAL,
        }
    }

    /// Override the total wait before SIGKILL escalation.
    pub fn with_wait(mut self, wait: Duration) -> Self {
        self.wait = wait;
        self
    }

    /// Override the liveness polling interval.
    pub fn with_poll_interval(mut self, poll_interval: Duration) -> Self {
        self.poll_interval = poll_interval;
        self
    }

    /// Execute the stop protocol.
    ///
    /// # Errors
    /// [`DictoggleError::StopTimeout`] when the capture process outlived the
    /// budget and was SIGKILLed. The session record is released even then, so
    /// a later invocation is never blocked by this failure.
    pub async fn stop(&self) -> Result<StopOutcome> {
        let Some(record) = self.store.inspect()? else {
            return Ok(StopOutcome::Idle);
        };

        if record.is_stale() {
            self.store.release()?;
            return Ok(StopOutcome::StaleReaped {
                pid: record.owner_pid,
            });
        }

        sys::terminate(record.owner_pid)?;

        let deadline = Instant::now() + self.wait;
        loop {
            if !sys::process_alive(record.owner_pid) {
                // The capture process releases the record itself; this
                // release only matters if it died without cleaning up.
                self.store.release()?;
                return Ok(StopOutcome::Stopped { record });
            }
            if Instant::now() >= deadline {
                break;
            }
            tokio::time::sleep(self.poll_interval).await;
        }

        // Escalation: the in-process teardown budget failed us. Kill hard,
        // release the record regardless, and report the degraded stop.
        let _ = sys::kill_hard(record.owner_pid);
        tokio::time::sleep(Duration::from_millis(100)).await;
        self.store.release()?;

        Err(DictoggleError::StopTimeout {
            pid: record.owner_pid,
            waited_ms: self.wait.as_millis() as u64,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::session::CaptureParams;
    use std::process::{Child, Command};
    use tempfile::TempDir;

    fn store_in(dir: &TempDir) -> SessionStore {
        SessionStore::new(dir.path().join(defaults::SESSION_FILE_NAME))
    }

    fn record_for(dir: &TempDir, pid: i32) -> SessionRecord {
        SessionRecord::new(dir.path().join("capture.wav"), CaptureParams::default())
            .with_owner_pid(pid)
    }

    /// Reap the child in the background so `kill(pid, 0)` stops reporting it
    /// alive once it exits (zombies count as alive).
    fn reap_in_background(mut child: Child) {
        std::thread::spawn(move || {
            let _ = child.wait();
        });
    }

    #[tokio::test]
    async fn stop_while_idle_is_a_noop() {
        let dir = TempDir::new().unwrap();
        let store = store_in(&dir);

        let outcome = StopOrchestrator::new(&store).stop().await.unwrap();
        assert_eq!(outcome, StopOutcome::Idle);
    }

    #[tokio::test]
    async fn stop_twice_second_observes_idle() {
        let dir = TempDir::new().unwrap();
        let store = store_in(&dir);

        let child = Command::new("sleep").arg("30").spawn().unwrap();
        let pid = child.id() as i32;
        reap_in_background(child);
        store.acquire(record_for(&dir, pid)).unwrap();

        let orchestrator = StopOrchestrator::new(&store);
        let first = orchestrator.stop().await.unwrap();
        assert!(matches!(first, StopOutcome::Stopped { .. }));

        let second = orchestrator.stop().await.unwrap();
        assert_eq!(second, StopOutcome::Idle, "second stop must observe idle");
    }

    #[tokio::test]
    async fn stop_terminates_capture_process_within_budget() {
        let dir = TempDir::new().unwrap();
        let store = store_in(&dir);

        let child = Command::new("sleep").arg("30").spawn().unwrap();
        let pid = child.id() as i32;
        reap_in_background(child);
        store.acquire(record_for(&dir, pid)).unwrap();

        let started = std::time::Instant::now();
        let outcome = StopOrchestrator::new(&store).stop().await.unwrap();
        let elapsed = started.elapsed();

        match outcome {
            StopOutcome::Stopped { record } => assert_eq!(record.owner_pid, pid),
            other => panic!("expected Stopped, got {:?}", other),
        }
        assert!(
            elapsed < defaults::STOP_WAIT,
            "stop took {:?}, budget is {:?}",
            elapsed,
            defaults::STOP_WAIT
        );
        assert_eq!(store.inspect().unwrap(), None, "record must be released");
        assert!(!sys::process_alive(pid));
    }

    #[tokio::test]
    async fn stop_reaps_stale_record() {
        let dir = TempDir::new().unwrap();
        let store = store_in(&dir);

        let mut child = Command::new("true").spawn().unwrap();
        let pid = child.id() as i32;
        child.wait().unwrap();
        store.acquire(record_for(&dir, pid)).unwrap();

        let outcome = StopOrchestrator::new(&store).stop().await.unwrap();
        assert_eq!(outcome, StopOutcome::StaleReaped { pid });
        assert_eq!(store.inspect().unwrap(), None);
    }

    #[tokio::test]
    async fn stop_escalates_to_sigkill_and_releases_record() {
        let dir = TempDir::new().unwrap();
        let store = store_in(&dir);

        // A process that ignores SIGTERM, forcing the escalation path.
        let child = Command::new("sh")
            .arg("-c")
            .arg("trap '' TERM; sleep 30")
            .spawn()
            .unwrap();
        let pid = child.id() as i32;
        reap_in_background(child);
        // Give the shell a moment to install the trap.
        tokio::time::sleep(Duration::from_millis(200)).await;
        store.acquire(record_for(&dir, pid)).unwrap();

        let result = StopOrchestrator::new(&store)
            .with_wait(Duration::from_millis(300))
            .stop()
            .await;

        match result {
            Err(DictoggleError::StopTimeout { pid: p, waited_ms }) => {
                assert_eq!(p, pid);
                assert_eq!(waited_ms, 300);
            }
            other => panic!("expected StopTimeout, got {:?}", other),
        }
        // The record is released even on the failure path, so the next
        // invocation is not blocked.
        assert_eq!(store.inspect().unwrap(), None);
    }
}
