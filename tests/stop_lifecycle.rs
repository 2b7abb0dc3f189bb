//! End-to-end tests of the cross-invocation stop protocol against real
//! processes: SIGTERM delivery, bounded waiting, stale-session recovery.

use dictoggle::session::{CaptureParams, SessionRecord, SessionStore};
use dictoggle::stop::{StopOrchestrator, StopOutcome};
use dictoggle::{DictoggleError, audio::wav};
use std::process::{Child, Command};
use std::time::{Duration, Instant};
use tempfile::TempDir;

fn store_in(dir: &TempDir) -> SessionStore {
    SessionStore::new(dir.path().join("dictoggle.lock"))
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
async fn stop_sequence_tears_down_session_within_budget() {
    let dir = TempDir::new().unwrap();
    let store = store_in(&dir);

    // Stand-in for a capture process: exits promptly on SIGTERM.
    let child = Command::new("sleep").arg("60").spawn().unwrap();
    let pid = child.id() as i32;
    reap_in_background(child);
    store.acquire(record_for(&dir, pid)).unwrap();

    let started = Instant::now();
    let outcome = StopOrchestrator::new(&store).stop().await.unwrap();
    let elapsed = started.elapsed();

    match outcome {
        StopOutcome::Stopped { record } => {
            assert_eq!(record.owner_pid, pid);
            assert_eq!(record.audio_artifact_path, dir.path().join("capture.wav"));
        }
        other => panic!("expected Stopped, got {:?}", other),
    }
    assert!(
        elapsed < Duration::from_secs(2),
        "stop exceeded budget: {:?}",
        elapsed
    );
    assert_eq!(store.inspect().unwrap(), None, "session record must be gone");
}

#[tokio::test]
async fn killed_capture_process_is_recovered_as_stale() {
    let dir = TempDir::new().unwrap();
    let store = store_in(&dir);

    // A capture process dies without cleaning up (simulated hard kill).
    let mut child = Command::new("sleep").arg("60").spawn().unwrap();
    let pid = child.id() as i32;
    store.acquire(record_for(&dir, pid)).unwrap();
    child.kill().unwrap();
    child.wait().unwrap();

    // The record is still on disk, but the next start acquires through it.
    assert!(store.inspect().unwrap().is_some());
    let fresh = record_for(&dir, std::process::id() as i32);
    let handle = store.acquire(fresh.clone()).unwrap();
    assert_eq!(handle.record(), &fresh);
    handle.release().unwrap();
}

#[tokio::test]
async fn killed_capture_process_is_recovered_by_stop() {
    let dir = TempDir::new().unwrap();
    let store = store_in(&dir);

    let mut child = Command::new("sleep").arg("60").spawn().unwrap();
    let pid = child.id() as i32;
    store.acquire(record_for(&dir, pid)).unwrap();
    child.kill().unwrap();
    child.wait().unwrap();

    let outcome = StopOrchestrator::new(&store).stop().await.unwrap();
    assert_eq!(outcome, StopOutcome::StaleReaped { pid });
    assert_eq!(store.inspect().unwrap(), None);
}

#[tokio::test]
async fn stop_while_idle_is_clean() {
    let dir = TempDir::new().unwrap();
    let store = store_in(&dir);

    let outcome = StopOrchestrator::new(&store).stop().await.unwrap();
    assert_eq!(outcome, StopOutcome::Idle);

    // And again: idempotent.
    let outcome = StopOrchestrator::new(&store).stop().await.unwrap();
    assert_eq!(outcome, StopOutcome::Idle);
}

#[tokio::test]
async fn unresponsive_capture_process_is_force_killed() {
    let dir = TempDir::new().unwrap();
    let store = store_in(&dir);

    let child = Command::new("sh")
        .arg("-c")
        .arg("trap '' TERM; sleep 60")
        .spawn()
        .unwrap();
    let pid = child.id() as i32;
    reap_in_background(child);
    tokio::time::sleep(Duration::from_millis(200)).await;
    store.acquire(record_for(&dir, pid)).unwrap();

    let result = StopOrchestrator::new(&store)
        .with_wait(Duration::from_millis(400))
        .stop()
        .await;

    assert!(matches!(result, Err(DictoggleError::StopTimeout { .. })));
    // Even the failure path releases the record so the next toggle works.
    assert_eq!(store.inspect().unwrap(), None);

    let fresh = record_for(&dir, std::process::id() as i32);
    assert!(store.acquire(fresh).is_ok());
}

#[test]
fn mutual_exclusion_across_threads() {
    let dir = TempDir::new().unwrap();
    let store = store_in(&dir);
    let my_pid = std::process::id() as i32;

    // Two concurrent starts: exactly one may win the acquire.
    let results: Vec<_> = std::thread::scope(|scope| {
        let handles: Vec<_> = (0..2)
            .map(|_| {
                let store = store.clone();
                let record = record_for(&dir, my_pid);
                scope.spawn(move || store.acquire(record).is_ok())
            })
            .collect();
        handles.into_iter().map(|h| h.join().unwrap()).collect()
    });

    let winners = results.iter().filter(|&&won| won).count();
    assert_eq!(winners, 1, "exactly one concurrent acquire may succeed");
}

#[test]
fn artifact_written_by_one_process_is_readable_by_another_store_view() {
    // The stopping invocation only reads the artifact after the record is
    // released; emulate the read side against a finished file.
    let dir = TempDir::new().unwrap();
    let artifact = dir.path().join("capture.wav");
    let samples = vec![250i16; 16000 * 3];

    wav::write_wav(&artifact, &samples, 16000, 1).unwrap();

    let read_back = wav::read_wav(&artifact).unwrap();
    let secs = wav::duration_secs(read_back.len(), 16000);
    assert!((secs - 3.0).abs() < 0.05, "expected ~3s artifact, got {secs}");
}
