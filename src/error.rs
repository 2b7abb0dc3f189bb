//! Error types for dictoggle.

use thiserror::Error;

#[derive(Error, Debug)]
pub enum DictoggleError {
    // Configuration errors
    #[error("Configuration file not found at {path}")]
    ConfigFileNotFound { path: String },

    #[error("Invalid configuration value for {key}: {message}")]
    ConfigInvalidValue { key: String, message: String },

    #[error("Configuration error: {0}")]
    Config(#[from] toml::de::Error),

    // Audio capture errors
    #[error("Audio device not found: {device}")]
    AudioDeviceNotFound { device: String },

    #[error("Audio capture failed: {message}")]
    AudioCapture { message: String },

    // Session coordination errors
    #[error("Recording already in progress (pid {pid})")]
    SessionActive { pid: i32 },

    #[error("Session record at {path} is corrupt: {message}")]
    SessionCorrupt { path: String, message: String },

    #[error("Recording process (pid {pid}) did not stop within {waited_ms}ms; sent SIGKILL")]
    StopTimeout { pid: i32, waited_ms: u64 },

    #[error("Failed to start recording process: {message}")]
    SpawnFailed { message: String },

    // Transcription errors
    #[error("Transcription model not found at {path}")]
    TranscriptionModelNotFound { path: String },

    #[error("Transcription inference failed: {message}")]
    TranscriptionInferenceFailed { message: String },

    #[error("Audio artifact unreadable at {path}: {message}")]
    ArtifactUnreadable { path: String, message: String },

    // Text injection errors
    #[error("Text injection tool not found: {tool}")]
    InjectionToolNotFound { tool: String },

    #[error("Text injection permission denied: {message}")]
    InjectionPermissionDenied { message: String },

    #[error("Text injection failed: {message}")]
    InjectionFailed { message: String },

    // General I/O errors
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    // Generic error for cases not covered above
    #[error("{0}")]
    Other(String),
}

// Type alias for convenience
pub type Result<T> = std::result::Result<T, DictoggleError>;
