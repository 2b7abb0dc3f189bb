use crate::defaults;
use serde::{Deserialize, Serialize};
use std::fs;
use std::path::{Path, PathBuf};
use std::time::Duration;

/// Root configuration structure
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Default)]
#[serde(default)]
pub struct Config {
    pub audio: AudioConfig,
    pub stt: SttConfig,
    pub inject: InjectConfig,
    pub notify: NotifyConfig,
    pub text: TextConfig,
    pub files: FilesConfig,
    pub stop: StopConfig,
}

/// Audio capture configuration
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(default)]
pub struct AudioConfig {
    pub device: Option<String>,
    pub sample_rate: u32,
    pub channels: u16,
}

/// Speech-to-text configuration
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(default)]
pub struct SttConfig {
    /// Path to a GGML model file. Defaults to
    /// `<data_dir>/dictoggle/models/ggml-base.en.bin` when unset.
    pub model_path: Option<PathBuf>,
    pub language: String,
    pub threads: Option<usize>,
}

/// Text injection configuration
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(default)]
pub struct InjectConfig {
    pub method: InjectionMethod,
    pub typing_delay_ms: u32,
}

/// Injection method enumeration
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "lowercase")]
pub enum InjectionMethod {
    /// Simulate keystrokes at the focused input.
    Direct,
    /// Place the text on the clipboard and let the user paste.
    Clipboard,
}

/// Desktop notification configuration
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(default)]
pub struct NotifyConfig {
    pub enable: bool,
    pub tool: String,
}

/// Transcript post-processing configuration
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(default)]
pub struct TextConfig {
    pub strip_spaces: bool,
    pub auto_capitalize: bool,
}

/// Runtime file management configuration
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(default)]
pub struct FilesConfig {
    /// Directory for the session record and audio artifacts.
    /// Defaults to `<temp_dir>/dictoggle`.
    pub runtime_dir: Option<PathBuf>,
    /// Keep audio artifacts after transcription (debugging).
    pub keep_artifacts: bool,
}

/// Stop protocol timing configuration
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(default)]
pub struct StopConfig {
    /// Total wait for the capture process to exit after SIGTERM, before
    /// escalating to SIGKILL.
    pub wait_ms: u64,
    /// In-process budget for audio stream teardown inside the capture
    /// process's stop path.
    pub teardown_budget_ms: u64,
}

impl Default for AudioConfig {
    fn default() -> Self {
        Self {
            device: None,
            sample_rate: defaults::SAMPLE_RATE,
            channels: defaults::CHANNELS,
        }
    }
}

impl Default for SttConfig {
    fn default() -> Self {
        Self {
            model_path: None,
            language: defaults::DEFAULT_LANGUAGE.to_string(),
            threads: None,
        }
    }
}

impl Default for InjectConfig {
    fn default() -> Self {
        Self {
            method: InjectionMethod::Direct,
            typing_delay_ms: defaults::TYPING_DELAY_MS,
        }
    }
}

impl Default for NotifyConfig {
    fn default() -> Self {
        Self {
            enable: true,
            tool: "notify-send".to_string(),
        }
    }
}

impl Default for TextConfig {
    fn default() -> Self {
        Self {
            strip_spaces: true,
            auto_capitalize: false,
        }
    }
}

impl Default for FilesConfig {
    fn default() -> Self {
        Self {
            runtime_dir: None,
            keep_artifacts: false,
        }
    }
}

impl Default for StopConfig {
    fn default() -> Self {
        Self {
            wait_ms: defaults::STOP_WAIT.as_millis() as u64,
            teardown_budget_ms: defaults::TEARDOWN_BUDGET.as_millis() as u64,
        }
    }
}

impl Config {
    /// Load configuration from a TOML file
    ///
    /// Returns an error if the file contains invalid TOML.
    /// Missing fields will use default values.
    pub fn load(path: &Path) -> anyhow::Result<Self> {
        let contents = fs::read_to_string(path)?;
        let config: Config = toml::from_str(&contents)?;
        Ok(config)
    }

    /// Load configuration from a file or return defaults if file doesn't exist
    ///
    /// Only returns defaults if the file is missing.
    /// Returns errors for invalid TOML.
    pub fn load_or_default(path: &Path) -> Self {
        match Self::load(path) {
            Ok(config) => config,
            Err(e) => {
                if e.downcast_ref::<std::io::Error>()
                    .map(|io_err| io_err.kind() == std::io::ErrorKind::NotFound)
                    .unwrap_or(false)
                {
                    Self::default()
                } else {
                    // Re-panic on invalid TOML or other errors
                    panic!("Failed to load config from {}: {}", path.display(), e);
                }
            }
        }
    }

    /// Apply environment variable overrides
    ///
    /// Supported environment variables:
    /// - DICTOGGLE_MODEL → stt.model_path
    /// - DICTOGGLE_LANGUAGE → stt.language
    /// - DICTOGGLE_AUDIO_DEVICE → audio.device
    pub fn with_env_overrides(mut self) -> Self {
        if let Ok(model) = std::env::var("DICTOGGLE_MODEL")
            && !model.is_empty()
        {
            self.stt.model_path = Some(PathBuf::from(model));
        }

        if let Ok(language) = std::env::var("DICTOGGLE_LANGUAGE")
            && !language.is_empty()
        {
            self.stt.language = language;
        }

        if let Ok(device) = std::env::var("DICTOGGLE_AUDIO_DEVICE")
            && !device.is_empty()
        {
            self.audio.device = Some(device);
        }

        self
    }

    /// Get the default configuration file path
    ///
    /// Returns ~/.config/dictoggle/config.toml on Linux
    pub fn default_path() -> PathBuf {
        dirs::config_dir()
            .expect("Could not determine config directory")
            .join("dictoggle")
            .join("config.toml")
    }

    /// Directory holding the session record and audio artifacts.
    pub fn runtime_dir(&self) -> PathBuf {
        self.files
            .runtime_dir
            .clone()
            .unwrap_or_else(|| std::env::temp_dir().join(defaults::RUNTIME_DIR_NAME))
    }

    /// Canonical path of the session record file.
    pub fn session_file(&self) -> PathBuf {
        self.runtime_dir().join(defaults::SESSION_FILE_NAME)
    }

    /// Resolved model file path.
    pub fn model_path(&self) -> PathBuf {
        self.stt.model_path.clone().unwrap_or_else(|| {
            dirs::data_dir()
                .unwrap_or_else(std::env::temp_dir)
                .join("dictoggle")
                .join("models")
                .join("ggml-base.en.bin")
        })
    }

    /// Outer stop budget: SIGTERM → SIGKILL escalation.
    pub fn stop_wait(&self) -> Duration {
        Duration::from_millis(self.stop.wait_ms)
    }

    /// Inner stop budget: stream teardown inside the capture process.
    pub fn teardown_budget(&self) -> Duration {
        Duration::from_millis(self.stop.teardown_budget_ms)
    }
}
