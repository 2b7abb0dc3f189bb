//! Whisper-based speech-to-text transcription.
//!
//! This module provides a Whisper implementation of the Transcriber trait using whisper-rs.
//!
//! # Feature Gate
//!
//! This module requires the `whisper` feature to be enabled and cmake to be installed.
//! Without the feature, [`WhisperTranscriber`] is a stub that returns errors.

use crate::defaults;
use crate::error::{DictoggleError, Result};
use crate::stt::transcriber::Transcriber;
use std::path::PathBuf;

#[cfg(feature = "whisper")]
use std::sync::{Mutex, Once};
#[cfg(feature = "whisper")]
use whisper_rs::{
    FullParams, SamplingStrategy, WhisperContext, WhisperContextParameters, install_logging_hooks,
};

#[cfg(feature = "whisper")]
static LOGGING_HOOKS_INSTALLED: Once = Once::new();

/// Configuration for Whisper transcriber.
#[derive(Debug, Clone)]
pub struct WhisperConfig {
    /// Path to the Whisper model file
    pub model_path: PathBuf,
    /// Language code (e.g., "en", "es", "fr"), or "auto"
    pub language: String,
    /// Number of threads for inference (None = auto-detect)
    pub threads: Option<usize>,
}

impl Default for WhisperConfig {
    fn default() -> Self {
        Self {
            model_path: PathBuf::from("models/ggml-base.en.bin"),
            language: defaults::DEFAULT_LANGUAGE.to_string(),
            threads: None,
        }
    }
}

/// Whisper-based transcriber implementation.
///
/// Uses whisper-rs for speech-to-text transcription. The WhisperContext is
/// wrapped in a Mutex to ensure thread safety.
#[cfg(feature = "whisper")]
pub struct WhisperTranscriber {
    context: Mutex<WhisperContext>,
    config: WhisperConfig,
    model_name: String,
}

#[cfg(feature = "whisper")]
impl std::fmt::Debug for WhisperTranscriber {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("WhisperTranscriber")
            .field("config", &self.config)
            .field("model_name", &self.model_name)
            .field("context", &"<WhisperContext>")
            .finish()
    }
}

/// Whisper-based transcriber placeholder (without whisper feature).
///
/// This is a stub implementation that returns errors when used.
/// Enable the `whisper` feature to use real transcription.
#[cfg(not(feature = "whisper"))]
#[derive(Debug)]
pub struct WhisperTranscriber {
    config: WhisperConfig,
    model_name: String,
}

/// Extract a model name from the file path.
fn model_name_from_path(path: &std::path::Path) -> String {
    path.file_stem()
        .and_then(|s| s.to_str())
        .unwrap_or("unknown")
        .to_string()
}

#[cfg(feature = "whisper")]
impl WhisperTranscriber {
    /// Create a new Whisper transcriber.
    ///
    /// # Errors
    /// Returns `DictoggleError::TranscriptionModelNotFound` if the model file
    /// doesn't exist, `DictoggleError::TranscriptionInferenceFailed` if model
    /// loading fails.
    pub fn new(config: WhisperConfig) -> Result<Self> {
        // Install logging hooks to suppress whisper.cpp output (only once)
        LOGGING_HOOKS_INSTALLED.call_once(|| {
            install_logging_hooks();
        });

        if !config.model_path.exists() {
            return Err(DictoggleError::TranscriptionModelNotFound {
                path: config.model_path.to_string_lossy().to_string(),
            });
        }

        let model_name = model_name_from_path(&config.model_path);

        let context_params = WhisperContextParameters::default();
        let context = WhisperContext::new_with_params(
            config.model_path.to_str().ok_or_else(|| {
                DictoggleError::TranscriptionInferenceFailed {
                    message: "Invalid UTF-8 in model path".to_string(),
                }
            })?,
            context_params,
        )
        .map_err(|e| DictoggleError::TranscriptionInferenceFailed {
            message: format!("Failed to load Whisper model: {}", e),
        })?;

        Ok(Self {
            context: Mutex::new(context),
            config,
            model_name,
        })
    }

    /// Get the configuration
    pub fn config(&self) -> &WhisperConfig {
        &self.config
    }
}

/// Convert i16 audio samples to f32 normalized to [-1.0, 1.0]
///
/// Whisper expects audio in f32 format normalized to the range [-1.0, 1.0].
/// Input is 16-bit PCM audio where samples range from -32768 to 32767.
pub fn convert_audio(samples: &[i16]) -> Vec<f32> {
    samples
        .iter()
        .map(|&sample| sample as f32 / 32768.0)
        .collect()
}

#[cfg(feature = "whisper")]
impl Transcriber for WhisperTranscriber {
    fn transcribe(&self, audio: &[i16]) -> Result<String> {
        let audio_f32 = convert_audio(audio);

        let context =
            self.context
                .lock()
                .map_err(|e| DictoggleError::TranscriptionInferenceFailed {
                    message: format!("Failed to acquire context lock: {}", e),
                })?;

        let mut state =
            context
                .create_state()
                .map_err(|e| DictoggleError::TranscriptionInferenceFailed {
                    message: format!("Failed to create Whisper state: {}", e),
                })?;

        let mut params = FullParams::new(SamplingStrategy::Greedy { best_of: 1 });

        if self.config.language == defaults::AUTO_LANGUAGE {
            params.set_language(None);
        } else {
            params.set_language(Some(&self.config.language));
        }

        if let Some(threads) = self.config.threads {
            params.set_n_threads(threads as i32);
        }

        params.set_print_special(false);
        params.set_print_progress(false);
        params.set_print_realtime(false);
        params.set_print_timestamps(false);

        state
            .full(params, &audio_f32)
            .map_err(|e| DictoggleError::TranscriptionInferenceFailed {
                message: format!("Whisper inference failed: {}", e),
            })?;

        let mut transcription = String::new();
        for segment in state.as_iter() {
            transcription.push_str(&segment.to_string());
        }

        Ok(transcription.trim().to_string())
    }

    fn model_name(&self) -> &str {
        &self.model_name
    }

    fn is_ready(&self) -> bool {
        true
    }
}

#[cfg(not(feature = "whisper"))]
impl WhisperTranscriber {
    /// Create a new Whisper transcriber (stub implementation).
    ///
    /// This returns an error for a missing model just like the real one, so
    /// configuration problems surface identically in both builds.
    pub fn new(config: WhisperConfig) -> Result<Self> {
        if !config.model_path.exists() {
            return Err(DictoggleError::TranscriptionModelNotFound {
                path: config.model_path.to_string_lossy().to_string(),
            });
        }

        let model_name = model_name_from_path(&config.model_path);

        Ok(Self { config, model_name })
    }

    /// Get the configuration
    pub fn config(&self) -> &WhisperConfig {
        &self.config
    }
}

#[cfg(not(feature = "whisper"))]
impl Transcriber for WhisperTranscriber {
    fn transcribe(&self, _audio: &[i16]) -> Result<String> {
        Err(DictoggleError::TranscriptionInferenceFailed {
            message: concat!(
                "Whisper feature not enabled. This binary was built without speech recognition.\n",
                "To fix: cargo build --release (whisper is enabled by default)\n",
                "If build fails with cmake errors, install: sudo apt install cmake"
            )
            .to_string(),
        })
    }

    fn model_name(&self) -> &str {
        &self.model_name
    }

    fn is_ready(&self) -> bool {
        false
    }
}
