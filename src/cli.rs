//! Command-line interface for dictoggle
//!
//! Provides argument parsing using clap derive macros.

use clap::{Parser, Subcommand};
use clap_complete::Shell;
use std::path::PathBuf;
use std::time::Duration;

/// Hotkey voice dictation for Linux
#[derive(Parser, Debug)]
#[command(name = "dictoggle", version, about = "Hotkey voice dictation for Linux")]
pub struct Cli {
    /// Subcommand to execute
    #[command(subcommand)]
    pub command: Commands,

    /// Path to configuration file
    #[arg(long, global = true, value_name = "PATH")]
    pub config: Option<PathBuf>,

    /// Suppress output and notifications (quiet mode)
    #[arg(short, long, global = true)]
    pub quiet: bool,

    /// Verbose output (-v: progress, -vv: full diagnostics)
    #[arg(short, long, global = true, action = clap::ArgAction::Count)]
    pub verbose: u8,

    /// Audio input device (e.g., pipewire)
    #[arg(long, global = true, value_name = "DEVICE")]
    pub device: Option<String>,

    /// Path to a Whisper GGML model file
    #[arg(long, global = true, value_name = "PATH")]
    pub model: Option<PathBuf>,

    /// Language code for transcription (default: auto-detect). Examples: auto, en, de, es
    #[arg(long, global = true, value_name = "LANG")]
    pub language: Option<String>,

    /// Wait for the recording process to exit before force-killing it.
    /// Examples: 2s, 1500ms
    #[arg(long, global = true, value_name = "DURATION", value_parser = parse_duration)]
    pub stop_timeout: Option<Duration>,
}

/// Parse a duration string such as "2s", "1500ms" or a bare number of seconds.
fn parse_duration(s: &str) -> Result<Duration, String> {
    let s = s.trim();
    // Bare number → seconds
    if let Ok(secs) = s.parse::<u64>() {
        return Ok(Duration::from_secs(secs));
    }
    humantime::parse_duration(s).map_err(|e| e.to_string())
}

/// Available commands
#[derive(Subcommand, Debug)]
pub enum Commands {
    /// Start recording in the foreground (the process becomes the capture
    /// engine and runs until stopped)
    Start,

    /// Stop the active recording, transcribe it and inject the text
    Stop,

    /// Toggle: start a background recording if idle, otherwise stop and
    /// transcribe (bind this to a hotkey)
    Toggle,

    /// Show the current session state
    Status,

    /// List available audio input devices
    Devices,

    /// Transcribe an existing audio file and print the text
    Transcribe {
        /// WAV file to transcribe
        #[arg(value_name = "FILE")]
        file: PathBuf,
    },

    /// Check system dependencies
    Check,

    /// Generate shell completions
    Completions {
        /// Shell to generate completions for
        #[arg(value_name = "SHELL")]
        shell: Shell,
    },
}

#[cfg(test)]
mod tests {
    use super::*;
    use clap::CommandFactory;

    #[test]
    fn cli_definition_is_valid() {
        Cli::command().debug_assert();
    }

    #[test]
    fn parses_toggle_command() {
        let cli = Cli::try_parse_from(["dictoggle", "toggle"]).unwrap();
        assert!(matches!(cli.command, Commands::Toggle));
        assert!(!cli.quiet);
        assert_eq!(cli.verbose, 0);
    }

    #[test]
    fn parses_global_flags_after_subcommand() {
        let cli = Cli::try_parse_from([
            "dictoggle",
            "start",
            "--quiet",
            "--device",
            "pipewire",
            "--config",
            "/tmp/config.toml",
        ])
        .unwrap();

        assert!(matches!(cli.command, Commands::Start));
        assert!(cli.quiet);
        assert_eq!(cli.device.as_deref(), Some("pipewire"));
        assert_eq!(cli.config, Some(PathBuf::from("/tmp/config.toml")));
    }

    #[test]
    fn parses_transcribe_with_file() {
        let cli = Cli::try_parse_from(["dictoggle", "transcribe", "audio.wav"]).unwrap();
        match cli.command {
            Commands::Transcribe { file } => assert_eq!(file, PathBuf::from("audio.wav")),
            _ => panic!("expected Transcribe"),
        }
    }

    #[test]
    fn rejects_missing_subcommand() {
        assert!(Cli::try_parse_from(["dictoggle"]).is_err());
    }

    #[test]
    fn parse_duration_accepts_bare_seconds() {
        assert_eq!(parse_duration("2"), Ok(Duration::from_secs(2)));
    }

    #[test]
    fn parse_duration_accepts_humantime() {
        assert_eq!(parse_duration("1500ms"), Ok(Duration::from_millis(1500)));
        assert_eq!(parse_duration("2s"), Ok(Duration::from_secs(2)));
    }

    #[test]
    fn parse_duration_rejects_garbage() {
        assert!(parse_duration("soon").is_err());
    }

    #[test]
    fn verbose_flag_counts() {
        let cli = Cli::try_parse_from(["dictoggle", "status", "-vv"]).unwrap();
        assert_eq!(cli.verbose, 2);
    }
}
