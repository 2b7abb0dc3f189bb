//! The capture process: session-owning main loop and signal-driven stop.
//!
//! One invocation of `dictoggle start` becomes this process. It publishes the
//! session record, drains the audio source on a fixed tick, and waits for a
//! stop request (SIGTERM from a later invocation, SIGINT from a terminal, or
//! the max-session safety stop).
//!
//! The stop path is the part with teeth: audio stream teardown can block
//! indefinitely on some backends, so it runs on a blocking worker under a
//! hard budget. When the budget expires the stream is abandoned and whatever
//! was already drained is flushed best-effort. The session record is released
//! on every path; the stop orchestrator's SIGKILL escalation exists as a
//! backstop but this in-process bound is the primary defense.

use crate::audio::recorder::AudioSource;
use crate::audio::wav;
use crate::defaults;
use crate::error::{DictoggleError, Result};
use crate::inject::injector::CommandExecutor;
use crate::notify::Notifier;
use crate::session::{CaptureParams, SessionRecord, SessionStore};
use std::path::{Path, PathBuf};
use std::time::Duration;
use tokio::signal::unix::{SignalKind, signal};

/// Budgets bounding the in-process stop path.
#[derive(Debug, Clone, Copy)]
pub struct CaptureBudgets {
    /// Maximum time spent waiting for the audio stream to close.
    pub teardown: Duration,
    /// Maximum time spent flushing the buffer to the WAV artifact.
    pub flush: Duration,
}

impl Default for CaptureBudgets {
    fn default() -> Self {
        Self {
            teardown: defaults::TEARDOWN_BUDGET,
            flush: defaults::FLUSH_BUDGET,
        }
    }
}

/// Result of a completed capture.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CaptureOutcome {
    /// Written artifact, or `None` when nothing was captured.
    pub artifact: Option<PathBuf>,
    /// Number of mono samples captured.
    pub captured_samples: usize,
    /// Whether stream teardown exceeded its budget and the stream was
    /// abandoned.
    pub teardown_timed_out: bool,
}

/// Artifact path for a session, unique per owning pid and start time.
pub fn artifact_path(runtime_dir: &Path, pid: u32, created_at: u64) -> PathBuf {
    runtime_dir.join(format!("recording-{}-{}.wav", pid, created_at))
}

/// Run a full capture session in the current process.
///
/// Acquires the session record (failing with `SessionActive` if another
/// recording is live), starts the audio source, then records until a stop
/// signal arrives. The record is released on every exit path, including
/// failures after acquisition.
pub async fn run_capture<A, E>(
    store: &SessionStore,
    mut source: A,
    artifact: PathBuf,
    params: CaptureParams,
    budgets: CaptureBudgets,
    notifier: &Notifier<E>,
    quiet: bool,
) -> Result<CaptureOutcome>
where
    A: AudioSource + 'static,
    E: CommandExecutor,
{
    let record = SessionRecord::new(artifact.clone(), params);
    let handle = store.acquire(record)?;

    let driven = drive_capture(&mut source, notifier, quiet).await;

    let buffer = match driven {
        Ok(buffer) => buffer,
        Err(e) => {
            // Failed before recording properly began: tear down best-effort
            // and make sure no session record survives.
            let _ = source.stop();
            let _ = handle.release();
            return Err(e);
        }
    };

    let finished = finish_capture(source, buffer, &artifact, params, &budgets).await;

    // Coordination-state cleanup holds unconditionally, even when the flush
    // failed: a dangling record would block every later invocation.
    let released = handle.release();
    let outcome = finished?;
    released?;

    if !quiet {
        let secs = wav::duration_secs(outcome.captured_samples, params.sample_rate);
        eprintln!("Recording stopped ({:.1}s captured)", secs);
    }

    Ok(outcome)
}

/// Register stop signals, start the source, and drain samples until a stop
/// condition is met.
///
/// Device errors mid-capture are not fatal: the loop exits and the samples
/// drained so far are returned for a best-effort flush.
async fn drive_capture<A, E>(
    source: &mut A,
    notifier: &Notifier<E>,
    quiet: bool,
) -> Result<Vec<i16>>
where
    A: AudioSource,
    E: CommandExecutor,
{
    let mut sigterm = signal(SignalKind::terminate())
        .map_err(|e| DictoggleError::Other(format!("Failed to register SIGTERM handler: {}", e)))?;
    let mut sigint = signal(SignalKind::interrupt())
        .map_err(|e| DictoggleError::Other(format!("Failed to register SIGINT handler: {}", e)))?;

    source.start()?;

    notifier.info("Dictation", "Recording started");
    if !quiet {
        eprintln!(
            "Recording started (pid {}). Stop with `dictoggle stop` or Ctrl+C.",
            std::process::id()
        );
    }

    let mut buffer: Vec<i16> = Vec::new();
    let safety_stop = tokio::time::Instant::now() + defaults::MAX_SESSION;

    loop {
        tokio::select! {
            _ = sigterm.recv() => break,
            _ = sigint.recv() => break,
            _ = tokio::time::sleep_until(safety_stop) => {
                eprintln!(
                    "dictoggle: maximum recording duration ({}s) reached, stopping",
                    defaults::MAX_SESSION.as_secs()
                );
                notifier.info("Dictation", "Maximum recording duration reached");
                break;
            }
            _ = tokio::time::sleep(defaults::DRAIN_INTERVAL) => {
                match source.read_samples() {
                    Ok(samples) => buffer.extend_from_slice(&samples),
                    Err(e) => {
                        // Device disconnected mid-capture: keep what we have.
                        eprintln!("dictoggle: audio device error during capture: {}", e);
                        notifier.error("Dictation", "Audio device lost; keeping partial recording");
                        break;
                    }
                }
            }
        }
    }

    Ok(buffer)
}

/// Stop the stream and flush the buffer, each under a hard time budget.
///
/// Teardown runs on a blocking worker; if it does not finish inside the
/// budget the stream is abandoned rather than joined, and flushing proceeds
/// with the samples drained so far. An empty buffer produces no artifact.
pub async fn finish_capture<A>(
    mut source: A,
    mut buffer: Vec<i16>,
    artifact: &Path,
    params: CaptureParams,
    budgets: &CaptureBudgets,
) -> Result<CaptureOutcome>
where
    A: AudioSource + 'static,
{
    // Final drain before the stream goes away; failure here just means no
    // tail samples.
    if let Ok(tail) = source.read_samples() {
        buffer.extend_from_slice(&tail);
    }

    let teardown = tokio::task::spawn_blocking(move || source.stop());
    let teardown_timed_out = match tokio::time::timeout(budgets.teardown, teardown).await {
        Ok(Ok(Ok(()))) => false,
        Ok(Ok(Err(e))) => {
            eprintln!("dictoggle: audio stream stop failed: {}", e);
            false
        }
        Ok(Err(e)) => {
            eprintln!("dictoggle: stream teardown worker failed: {}", e);
            false
        }
        Err(_) => {
            eprintln!(
                "dictoggle: stream teardown exceeded {}ms, abandoning stream",
                budgets.teardown.as_millis()
            );
            true
        }
    };

    if buffer.is_empty() {
        return Ok(CaptureOutcome {
            artifact: None,
            captured_samples: 0,
            teardown_timed_out,
        });
    }

    let captured_samples = buffer.len();
    let path = artifact.to_path_buf();
    let sample_rate = params.sample_rate;
    let channels = params.channels;
    let flush =
        tokio::task::spawn_blocking(move || wav::write_wav(&path, &buffer, sample_rate, channels));

    match tokio::time::timeout(budgets.flush, flush).await {
        Ok(Ok(Ok(()))) => Ok(CaptureOutcome {
            artifact: Some(artifact.to_path_buf()),
            captured_samples,
            teardown_timed_out,
        }),
        Ok(Ok(Err(e))) => Err(e),
        Ok(Err(e)) => Err(DictoggleError::Other(format!(
            "artifact flush worker failed: {}",
            e
        ))),
        Err(_) => Err(DictoggleError::Other(format!(
            "artifact flush exceeded {}ms",
            budgets.flush.as_millis()
        ))),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::audio::recorder::MockAudioSource;
    use crate::error::Result as DictoggleResult;
    use std::time::Instant;
    use tempfile::TempDir;

    /// Source whose stop() blocks long enough to blow any sane budget —
    /// models the backend hang the teardown budget exists for.
    struct HangingStopSource {
        samples: Vec<i16>,
        hang: Duration,
    }

    impl AudioSource for HangingStopSource {
        fn start(&mut self) -> DictoggleResult<()> {
            Ok(())
        }

        fn stop(&mut self) -> DictoggleResult<()> {
            std::thread::sleep(self.hang);
            Ok(())
        }

        fn read_samples(&mut self) -> DictoggleResult<Vec<i16>> {
            Ok(std::mem::take(&mut self.samples))
        }
    }

    fn test_budgets() -> CaptureBudgets {
        CaptureBudgets {
            teardown: Duration::from_millis(200),
            flush: Duration::from_secs(1),
        }
    }

    #[test]
    fn artifact_path_is_unique_per_pid_and_time() {
        let dir = Path::new("/tmp/dictoggle");
        let a = artifact_path(dir, 100, 1000);
        let b = artifact_path(dir, 100, 1001);
        let c = artifact_path(dir, 101, 1000);

        assert_eq!(a, PathBuf::from("/tmp/dictoggle/recording-100-1000.wav"));
        assert_ne!(a, b);
        assert_ne!(a, c);
    }

    #[tokio::test]
    async fn finish_capture_writes_artifact() {
        let dir = TempDir::new().unwrap();
        let artifact = dir.path().join("capture.wav");
        let source = MockAudioSource::new().with_samples(vec![]);

        let outcome = finish_capture(
            source,
            vec![100i16; 16000],
            &artifact,
            CaptureParams::default(),
            &test_budgets(),
        )
        .await
        .unwrap();

        assert_eq!(outcome.artifact, Some(artifact.clone()));
        assert_eq!(outcome.captured_samples, 16000);
        assert!(!outcome.teardown_timed_out);

        let read_back = wav::read_wav(&artifact).unwrap();
        assert_eq!(read_back.len(), 16000);
    }

    #[tokio::test]
    async fn finish_capture_drains_tail_samples() {
        let dir = TempDir::new().unwrap();
        let artifact = dir.path().join("capture.wav");
        // 100 samples still sitting in the source at stop time.
        let source = MockAudioSource::new().with_samples(vec![7i16; 100]);

        let outcome = finish_capture(
            source,
            vec![1i16; 50],
            &artifact,
            CaptureParams::default(),
            &test_budgets(),
        )
        .await
        .unwrap();

        assert_eq!(outcome.captured_samples, 150);
    }

    #[tokio::test]
    async fn finish_capture_empty_buffer_writes_nothing() {
        let dir = TempDir::new().unwrap();
        let artifact = dir.path().join("capture.wav");
        let source = MockAudioSource::new().with_samples(vec![]);

        let outcome = finish_capture(
            source,
            Vec::new(),
            &artifact,
            CaptureParams::default(),
            &test_budgets(),
        )
        .await
        .unwrap();

        assert_eq!(outcome.artifact, None);
        assert_eq!(outcome.captured_samples, 0);
        assert!(!artifact.exists(), "no artifact should be written");
    }

    #[tokio::test]
    async fn finish_capture_survives_stop_failure() {
        let dir = TempDir::new().unwrap();
        let artifact = dir.path().join("capture.wav");
        let source = MockAudioSource::new()
            .with_samples(vec![])
            .with_stop_failure();

        let outcome = finish_capture(
            source,
            vec![5i16; 1000],
            &artifact,
            CaptureParams::default(),
            &test_budgets(),
        )
        .await
        .unwrap();

        // A failing stream stop must not lose the buffered audio.
        assert!(outcome.artifact.is_some());
        assert!(artifact.exists());
    }

    #[tokio::test]
    async fn finish_capture_bounds_hanging_teardown() {
        let dir = TempDir::new().unwrap();
        let artifact = dir.path().join("capture.wav");
        let source = HangingStopSource {
            samples: Vec::new(),
            hang: Duration::from_secs(2),
        };

        let started = Instant::now();
        let outcome = finish_capture(
            source,
            vec![3i16; 4000],
            &artifact,
            CaptureParams::default(),
            &test_budgets(),
        )
        .await
        .unwrap();
        let elapsed = started.elapsed();

        assert!(outcome.teardown_timed_out);
        assert!(outcome.artifact.is_some(), "buffered audio must be flushed");
        assert!(
            elapsed < Duration::from_secs(1),
            "stop path took {:?}, budget was 200ms teardown + flush",
            elapsed
        );
        assert!(artifact.exists());
    }

    #[tokio::test]
    async fn run_capture_start_failure_leaves_no_record() {
        let dir = TempDir::new().unwrap();
        let store = SessionStore::new(dir.path().join(defaults::SESSION_FILE_NAME));
        let source = MockAudioSource::new().with_start_failure();
        let notifier = crate::notify::Notifier::new(
            crate::inject::injector::SystemCommandExecutor::new(),
            "notify-send",
            false,
        );

        let result = run_capture(
            &store,
            source,
            dir.path().join("capture.wav"),
            CaptureParams::default(),
            CaptureBudgets::default(),
            &notifier,
            true,
        )
        .await;

        assert!(result.is_err(), "start failure must propagate");
        assert_eq!(
            store.inspect().unwrap(),
            None,
            "no session record may survive a failed start"
        );
    }

    #[tokio::test]
    async fn run_capture_rejects_concurrent_session() {
        let dir = TempDir::new().unwrap();
        let store = SessionStore::new(dir.path().join(defaults::SESSION_FILE_NAME));

        // A live session held by this test process.
        let existing = SessionRecord::new(dir.path().join("other.wav"), CaptureParams::default());
        let _handle = store.acquire(existing).unwrap();

        let source = MockAudioSource::new();
        let notifier = crate::notify::Notifier::new(
            crate::inject::injector::SystemCommandExecutor::new(),
            "notify-send",
            false,
        );

        let result = run_capture(
            &store,
            source,
            dir.path().join("capture.wav"),
            CaptureParams::default(),
            CaptureBudgets::default(),
            &notifier,
            true,
        )
        .await;

        assert!(matches!(result, Err(DictoggleError::SessionActive { .. })));
    }

    #[test]
    fn default_budgets_match_defaults() {
        let budgets = CaptureBudgets::default();
        assert_eq!(budgets.teardown, defaults::TEARDOWN_BUDGET);
        assert_eq!(budgets.flush, defaults::FLUSH_BUDGET);
    }
}
