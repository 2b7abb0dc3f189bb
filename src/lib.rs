//! dictoggle - Hotkey voice dictation for Linux
//!
//! Each hotkey press is an independent short-lived process invocation;
//! invocations coordinate through an on-disk session record and POSIX
//! signals to start, stop, transcribe and inject a dictation.

// Enforce error handling discipline
#![warn(clippy::unwrap_used)]
#![warn(clippy::expect_used)]
#![warn(clippy::let_underscore_must_use)]

pub mod app;
pub mod audio;
pub mod cli;
pub mod config;
pub mod defaults;
pub mod diagnostics;
pub mod error;
pub mod inject;
pub mod notify;
pub mod record;
pub mod session;
pub mod stop;
pub mod stt;
pub mod sys;
pub mod text;

// Core traits (source → transcribe → inject)
pub use audio::recorder::AudioSource;
pub use inject::injector::{CommandExecutor, SystemCommandExecutor, TextInjector};
pub use stt::transcriber::Transcriber;

// Session lifecycle
pub use record::{CaptureBudgets, CaptureOutcome};
pub use session::{CaptureParams, SessionHandle, SessionRecord, SessionStore};
pub use stop::{StopOrchestrator, StopOutcome};

// Error handling
pub use error::{DictoggleError, Result};

// Config
pub use config::{Config, InjectionMethod};

/// Build version string with optional git commit hash.
///
/// Returns `"0.1.0+abc1234"` when git hash is available, `"0.1.0"` otherwise.
pub fn version_string() -> String {
    let version = env!("CARGO_PKG_VERSION");
    match option_env!("GIT_HASH") {
        Some(hash) if !hash.is_empty() => format!("{}+{}", version, hash),
        _ => version.to_string(),
    }
}
