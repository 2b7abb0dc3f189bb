//! Application entry points for the dictation lifecycle.
//!
//! Orchestrates the complete flow across invocations:
//! toggle → capture (background process) → stop → transcribe → inject.
//!
//! Transcription and injection always run in the *stopping* invocation,
//! after the capture process has exited — never inside its signal path.

use crate::audio::capture::CpalAudioSource;
use crate::audio::wav;
use crate::config::{Config, InjectionMethod};
use crate::defaults;
use crate::error::{DictoggleError, Result};
use crate::inject::injector::{CommandExecutor, TextInjector};
use crate::notify::Notifier;
use crate::record::{self, CaptureBudgets};
use crate::session::{CaptureParams, SessionStore};
use crate::stop::{StopOrchestrator, StopOutcome};
use crate::stt::transcriber::Transcriber;
use crate::stt::whisper::{WhisperConfig, WhisperTranscriber};
use crate::sys::suppress_audio_warnings;
use crate::text::process_text;
use owo_colors::OwoColorize;
use std::fs;
use std::path::Path;
use std::process::{Child, Command, Stdio};
use std::time::{SystemTime, UNIX_EPOCH};

/// CLI flags forwarded to a spawned background capture process.
#[derive(Debug, Clone, Default)]
pub struct StartPassthrough {
    pub config: Option<std::path::PathBuf>,
    pub device: Option<String>,
    pub quiet: bool,
}

/// How the transcript reached the user.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Delivery {
    /// Typed at the cursor.
    Typed,
    /// Placed on the clipboard for manual paste.
    Clipboard,
}

/// Run a foreground capture: this process becomes the capture engine and
/// records until signalled to stop.
pub async fn run_start(config: &Config, quiet: bool, _verbosity: u8) -> Result<()> {
    suppress_audio_warnings();

    let store = SessionStore::new(config.session_file());
    let notifier = Notifier::from_config(&config.notify, quiet);

    // acquire() would reap a stale record silently; surfacing the recovery
    // to the user is this layer's job.
    if let Some(existing) = store.inspect()?
        && existing.is_stale()
    {
        store.release()?;
        notifier.info("Dictation", "Cleaned up stale recording session");
        if !quiet {
            eprintln!("Cleaned up stale session (pid {} is gone)", existing.owner_pid);
        }
    }

    let source = match CpalAudioSource::new(config.audio.device.as_deref(), config.audio.sample_rate)
    {
        Ok(source) => source,
        Err(e) => {
            notifier.error("Dictation", &format!("Audio device error: {}", e));
            return Err(e);
        }
    };

    let runtime_dir = config.runtime_dir();
    fs::create_dir_all(&runtime_dir)?;

    let params = CaptureParams {
        sample_rate: config.audio.sample_rate,
        channels: config.audio.channels,
    };
    let artifact = record::artifact_path(&runtime_dir, std::process::id(), epoch_secs());
    let budgets = CaptureBudgets {
        teardown: config.teardown_budget(),
        flush: defaults::FLUSH_BUDGET,
    };

    let outcome = record::run_capture(&store, source, artifact, params, budgets, &notifier, quiet)
        .await
        .map_err(|e| {
            if !matches!(e, DictoggleError::SessionActive { .. }) {
                notifier.error("Dictation", &format!("Recording failed: {}", e));
            }
            e
        })?;

    let secs = wav::duration_secs(outcome.captured_samples, params.sample_rate);
    notifier.info("Dictation", &format!("Recording stopped ({:.1}s)", secs));
    Ok(())
}

/// Stop an active recording, then transcribe and inject its audio.
pub async fn run_stop(config: &Config, quiet: bool, verbosity: u8) -> Result<()> {
    let store = SessionStore::new(config.session_file());
    let notifier = Notifier::from_config(&config.notify, quiet);

    let orchestrator = StopOrchestrator::new(&store).with_wait(config.stop_wait());
    match orchestrator.stop().await {
        Ok(StopOutcome::Idle) => {
            if !quiet {
                eprintln!("No recording in progress");
            }
            Ok(())
        }
        Ok(StopOutcome::StaleReaped { pid }) => {
            notifier.info("Dictation", "Cleaned up stale recording session");
            if !quiet {
                eprintln!("Cleaned up stale session (pid {} is gone)", pid);
            }
            Ok(())
        }
        Ok(StopOutcome::Stopped { record }) => {
            finish_session(config, &record.audio_artifact_path, &notifier, quiet, verbosity).await
        }
        Err(e @ DictoggleError::StopTimeout { .. }) => {
            notifier.error(
                "Dictation",
                "Recording did not stop cleanly and was force-killed; audio may be lost",
            );
            Err(e)
        }
        Err(e) => Err(e),
    }
}

/// Toggle: start a background recording when idle, stop and transcribe when
/// recording. The operation a hotkey binds to.
pub async fn run_toggle(
    config: &Config,
    passthrough: &StartPassthrough,
    verbosity: u8,
) -> Result<()> {
    let store = SessionStore::new(config.session_file());
    let notifier = Notifier::from_config(&config.notify, passthrough.quiet);

    match store.inspect()? {
        Some(record) if !record.is_stale() => {
            // Active session: this invocation is the stopping one.
            run_stop(config, passthrough.quiet, verbosity).await
        }
        Some(record) => {
            // Stale session: reap it and fall through to a fresh start.
            store.release()?;
            notifier.info("Dictation", "Cleaned up stale recording session");
            if !passthrough.quiet {
                eprintln!("Cleaned up stale session (pid {} is gone)", record.owner_pid);
            }
            start_background(&store, passthrough).await
        }
        None => start_background(&store, passthrough).await,
    }
}

/// Spawn a detached capture process and wait for its session record to
/// appear.
async fn start_background(store: &SessionStore, passthrough: &StartPassthrough) -> Result<()> {
    let mut child = spawn_capture_child(passthrough)?;

    let deadline = tokio::time::Instant::now() + defaults::START_WAIT;
    loop {
        // Any live record means a recording is running — ours, or a
        // concurrent toggle's that won the acquire race. Both count.
        if let Some(record) = store.inspect()?
            && !record.is_stale()
        {
            if !passthrough.quiet {
                eprintln!("Recording started (pid {})", record.owner_pid);
            }
            return Ok(());
        }

        if let Some(status) = child.try_wait().map_err(DictoggleError::Io)? {
            return Err(DictoggleError::SpawnFailed {
                message: format!("recording process exited immediately ({})", status),
            });
        }

        if tokio::time::Instant::now() >= deadline {
            return Err(DictoggleError::SpawnFailed {
                message: format!(
                    "recording process did not publish a session within {}ms",
                    defaults::START_WAIT.as_millis()
                ),
            });
        }

        tokio::time::sleep(defaults::STOP_POLL_INTERVAL).await;
    }
}

/// Spawn `dictoggle start` detached from this invocation.
fn spawn_capture_child(passthrough: &StartPassthrough) -> Result<Child> {
    let exe = std::env::current_exe().map_err(|e| DictoggleError::SpawnFailed {
        message: format!("cannot locate own executable: {}", e),
    })?;

    let mut cmd = Command::new(exe);
    cmd.arg("start");
    if let Some(config) = &passthrough.config {
        cmd.arg("--config").arg(config);
    }
    if let Some(device) = &passthrough.device {
        cmd.arg("--device").arg(device);
    }
    if passthrough.quiet {
        cmd.arg("--quiet");
    }
    cmd.stdin(Stdio::null())
        .stdout(Stdio::null())
        .stderr(Stdio::null());

    cmd.spawn().map_err(|e| DictoggleError::SpawnFailed {
        message: e.to_string(),
    })
}

/// Transcribe a finished artifact and inject the text.
async fn finish_session(
    config: &Config,
    artifact: &Path,
    notifier: &Notifier<impl CommandExecutor>,
    quiet: bool,
    verbosity: u8,
) -> Result<()> {
    let samples = match read_artifact(artifact) {
        Some(samples) => samples,
        None => {
            return no_speech(config, artifact, notifier, quiet);
        }
    };

    // read_wav normalizes to the transcriber's 16 kHz mono format.
    let min_samples = (defaults::MIN_CAPTURE.as_millis() as u64
        * defaults::SAMPLE_RATE as u64
        / 1000) as usize;
    if samples.len() < min_samples {
        return no_speech(config, artifact, notifier, quiet);
    }

    notifier.info("Dictation", "Transcribing…");
    if !quiet {
        eprintln!(
            "Transcribing {:.1}s of audio...",
            wav::duration_secs(samples.len(), defaults::SAMPLE_RATE)
        );
    }

    let transcriber = match create_transcriber(config) {
        Ok(t) => t,
        Err(e) => {
            // The artifact is preserved for a retry with a working model.
            notifier.error("Dictation", &format!("Transcription failed: {}", e));
            return Err(e);
        }
    };

    let raw = match transcriber.transcribe(&samples) {
        Ok(raw) => raw,
        Err(e) => {
            notifier.error("Dictation", &format!("Transcription failed: {}", e));
            return Err(e);
        }
    };

    let text = process_text(&raw, &config.text);
    if text.is_empty() {
        return no_speech(config, artifact, notifier, quiet);
    }

    if verbosity >= 1 {
        println!("{}", text);
    }

    let injector = TextInjector::system(config.inject.typing_delay_ms);
    let delivery = deliver_transcript(&text, &config.inject.method, &injector);

    cleanup_artifact(config, artifact);

    let words = text.split_whitespace().count();
    match delivery {
        Ok(Delivery::Typed) => {
            notifier.info("Dictation", &format!("Typed {} word(s)", words));
            Ok(())
        }
        Ok(Delivery::Clipboard) => {
            notifier.info(
                "Dictation",
                &format!("{} word(s) on the clipboard — paste with Ctrl+V", words),
            );
            Ok(())
        }
        Err(e) => {
            // Do not lose the transcript: it is the whole point.
            println!("{}", text);
            notifier.error(
                "Dictation",
                &format!("Could not inject or copy text: {}", e),
            );
            Err(e)
        }
    }
}

/// Inject `text` using the configured method, degrading from direct typing
/// to the clipboard rather than losing the transcript.
pub(crate) fn deliver_transcript<E>(
    text: &str,
    method: &InjectionMethod,
    injector: &TextInjector<E>,
) -> Result<Delivery>
where
    E: CommandExecutor,
{
    match method {
        InjectionMethod::Direct => match injector.inject_direct(text) {
            Ok(()) => Ok(Delivery::Typed),
            Err(type_err) => {
                eprintln!("dictoggle: direct typing failed ({}), falling back to clipboard", type_err);
                injector.copy_to_clipboard(text)?;
                Ok(Delivery::Clipboard)
            }
        },
        InjectionMethod::Clipboard => {
            injector.copy_to_clipboard(text)?;
            Ok(Delivery::Clipboard)
        }
    }
}

/// Read an artifact, returning `None` for a missing or empty capture.
fn read_artifact(artifact: &Path) -> Option<Vec<i16>> {
    match fs::metadata(artifact) {
        Ok(meta) if meta.len() > 0 => wav::read_wav(artifact).ok().filter(|s| !s.is_empty()),
        _ => None,
    }
}

/// Handle the empty-capture outcome: a successful no-op, not an error.
fn no_speech(
    config: &Config,
    artifact: &Path,
    notifier: &Notifier<impl CommandExecutor>,
    quiet: bool,
) -> Result<()> {
    notifier.info("Dictation", "No speech detected");
    if !quiet {
        eprintln!("No speech detected");
    }
    cleanup_artifact(config, artifact);
    Ok(())
}

/// Remove an artifact unless configuration asks to keep it.
fn cleanup_artifact(config: &Config, artifact: &Path) {
    if config.files.keep_artifacts {
        return;
    }
    if let Err(e) = fs::remove_file(artifact)
        && e.kind() != std::io::ErrorKind::NotFound
    {
        eprintln!("dictoggle: could not remove {}: {}", artifact.display(), e);
    }
}

/// Build the Whisper transcriber from configuration.
fn create_transcriber(config: &Config) -> Result<WhisperTranscriber> {
    WhisperTranscriber::new(WhisperConfig {
        model_path: config.model_path(),
        language: config.stt.language.clone(),
        threads: config.stt.threads,
    })
}

/// Transcribe an existing WAV file and print the text.
pub async fn run_transcribe(config: &Config, file: &Path, quiet: bool) -> Result<()> {
    let samples = wav::read_wav(file)?;

    if !quiet {
        eprintln!(
            "Transcribing {} ({:.1}s of audio)...",
            file.display(),
            wav::duration_secs(samples.len(), defaults::SAMPLE_RATE)
        );
    }

    let transcriber = create_transcriber(config)?;
    let text = process_text(&transcriber.transcribe(&samples)?, &config.text);
    println!("{}", text);
    Ok(())
}

/// Print the current session state.
pub fn run_status(config: &Config) -> Result<()> {
    let store = SessionStore::new(config.session_file());

    match store.inspect()? {
        None => println!("{} idle", "○".dimmed()),
        Some(record) if record.is_stale() => {
            println!(
                "{} stale session (pid {} is gone; will be reaped on next start/stop)",
                "⚠".yellow(),
                record.owner_pid
            );
        }
        Some(record) => {
            println!("{} recording (pid {})", "●".green(), record.owner_pid);
            println!("  {} {}s ago", "Started:".dimmed(), record.age_secs());
            println!(
                "  {} {}",
                "Artifact:".dimmed(),
                record.audio_artifact_path.display()
            );
            println!(
                "  {} {} Hz, {} channel(s)",
                "Format:".dimmed(),
                record.capture_parameters.sample_rate,
                record.capture_parameters.channels
            );
        }
    }

    Ok(())
}

fn epoch_secs() -> u64 {
    SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .map(|d| d.as_secs())
        .unwrap_or(0)
}
