//! Default configuration constants for dictoggle.
//!
//! This module provides shared constants used across different configuration
//! types to ensure consistency and eliminate duplication.

use std::time::Duration;

/// Default audio sample rate in Hz.
///
/// 16kHz is the standard for speech recognition and provides a good balance
/// between quality and computational efficiency for voice applications.
pub const SAMPLE_RATE: u32 = 16000;

/// Default channel count. Whisper expects mono input.
pub const CHANNELS: u16 = 1;

/// Default language code for transcription.
///
/// "auto" lets Whisper detect the spoken language automatically.
/// Set to a specific code (e.g., "en", "de") to force a language.
pub const DEFAULT_LANGUAGE: &str = "auto";

/// Language value that triggers automatic language detection.
pub const AUTO_LANGUAGE: &str = "auto";

/// File name of the session record inside the runtime directory's parent.
pub const SESSION_FILE_NAME: &str = "dictoggle.lock";

/// Directory name for runtime files (session record, audio artifacts).
pub const RUNTIME_DIR_NAME: &str = "dictoggle";

/// Interval at which the capture loop drains samples from the audio source.
pub const DRAIN_INTERVAL: Duration = Duration::from_millis(100);

/// Hard budget for stream teardown inside the capture process's stop path.
///
/// Stream close can block indefinitely on some audio backends; after this
/// budget the stream is abandoned and whatever was buffered is flushed.
pub const TEARDOWN_BUDGET: Duration = Duration::from_secs(1);

/// Budget for flushing the buffered samples to the WAV artifact.
pub const FLUSH_BUDGET: Duration = Duration::from_secs(1);

/// Total time the stop orchestrator waits for the capture process to exit
/// after SIGTERM before escalating to SIGKILL.
pub const STOP_WAIT: Duration = Duration::from_secs(2);

/// Interval between liveness polls while waiting for the capture process.
pub const STOP_POLL_INTERVAL: Duration = Duration::from_millis(50);

/// Time the toggle controller waits for a spawned capture child to publish
/// its session record before reporting a failed start.
pub const START_WAIT: Duration = Duration::from_secs(2);

/// Maximum recording duration (safety stop for a forgotten hotkey).
pub const MAX_SESSION: Duration = Duration::from_secs(300);

/// Session records older than this are implausible and treated as stale
/// even when a process with the recorded pid happens to exist (pid reuse).
pub const STALE_RECORD_AGE_SECS: u64 = 2 * MAX_SESSION.as_secs();

/// Captures shorter than this are reported as "no speech detected".
pub const MIN_CAPTURE: Duration = Duration::from_millis(500);

/// Default delay between injected keystrokes, in milliseconds.
pub const TYPING_DELAY_MS: u32 = 12;

/// Report the GPU backend compiled into this build.
///
/// Returns a human-readable name based on the compile-time feature flags.
/// Only one GPU backend can be active at a time; if none is enabled, returns "CPU".
pub fn gpu_backend() -> &'static str {
    if cfg!(feature = "cuda") {
        "CUDA"
    } else if cfg!(feature = "vulkan") {
        "Vulkan"
    } else if cfg!(feature = "hipblas") {
        "HipBLAS (AMD)"
    } else if cfg!(feature = "openblas") {
        "OpenBLAS"
    } else {
        "CPU"
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn stop_wait_exceeds_in_process_budgets() {
        // The outer escalation budget must leave room for the inner teardown
        // and flush budgets, otherwise SIGKILL would fire during a healthy stop.
        assert!(STOP_WAIT > TEARDOWN_BUDGET + FLUSH_BUDGET - Duration::from_millis(1));
    }

    #[test]
    fn stale_age_covers_max_session() {
        assert!(STALE_RECORD_AGE_SECS > MAX_SESSION.as_secs() + STOP_WAIT.as_secs());
    }

    #[test]
    fn gpu_backend_matches_compiled_feature() {
        let expected = if cfg!(feature = "cuda") {
            "CUDA"
        } else if cfg!(feature = "vulkan") {
            "Vulkan"
        } else if cfg!(feature = "hipblas") {
            "HipBLAS (AMD)"
        } else if cfg!(feature = "openblas") {
            "OpenBLAS"
        } else {
            "CPU"
        };
        assert_eq!(gpu_backend(), expected);
    }
}
