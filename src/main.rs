use anyhow::Result;
use clap::{CommandFactory, Parser};
use dictoggle::app::{self, StartPassthrough};
use dictoggle::audio::capture::list_devices;
use dictoggle::cli::{Cli, Commands};
use dictoggle::config::Config;
use dictoggle::diagnostics::check_dependencies;
use owo_colors::OwoColorize;

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();
    let config = load_config(&cli)?;

    let result = match &cli.command {
        Commands::Start => app::run_start(&config, cli.quiet, cli.verbose).await,
        Commands::Stop => app::run_stop(&config, cli.quiet, cli.verbose).await,
        Commands::Toggle => {
            let passthrough = StartPassthrough {
                config: cli.config.clone(),
                device: cli.device.clone(),
                quiet: cli.quiet,
            };
            app::run_toggle(&config, &passthrough, cli.verbose).await
        }
        Commands::Status => app::run_status(&config),
        Commands::Devices => {
            list_audio_devices()?;
            Ok(())
        }
        Commands::Transcribe { file } => app::run_transcribe(&config, file, cli.quiet).await,
        Commands::Check => {
            check_dependencies();
            Ok(())
        }
        Commands::Completions { shell } => {
            clap_complete::generate(*shell, &mut Cli::command(), "dictoggle", &mut std::io::stdout());
            Ok(())
        }
    };

    if let Err(e) = result {
        eprintln!("{}", format!("Error: {}", e).red());
        std::process::exit(1);
    }

    Ok(())
}

/// Load configuration and apply overrides.
///
/// Priority order (highest wins):
/// 1. CLI flags (--device, --model, --language, --stop-timeout)
/// 2. Environment variables (DICTOGGLE_*)
/// 3. Config file (--config path, or ~/.config/dictoggle/config.toml)
/// 4. Built-in defaults
fn load_config(cli: &Cli) -> Result<Config> {
    let mut config = if let Some(path) = &cli.config {
        // An explicitly requested config file must exist and parse.
        Config::load(path)?
    } else {
        Config::load_or_default(&Config::default_path())
    }
    .with_env_overrides();

    if let Some(device) = &cli.device {
        config.audio.device = Some(device.clone());
    }
    if let Some(model) = &cli.model {
        config.stt.model_path = Some(model.clone());
    }
    if let Some(language) = &cli.language {
        config.stt.language = language.clone();
    }
    if let Some(stop_timeout) = cli.stop_timeout {
        config.stop.wait_ms = stop_timeout.as_millis() as u64;
    }

    Ok(config)
}

/// List available audio input devices.
fn list_audio_devices() -> Result<()> {
    let devices = list_devices()?;

    if devices.is_empty() {
        eprintln!("No audio input devices found");
        std::process::exit(1);
    }

    println!("Available audio input devices:");
    for (idx, device) in devices.iter().enumerate() {
        println!("  [{}] {}", idx, device);
    }

    Ok(())
}
