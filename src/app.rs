//! CLI command handlers.
//!
//! Wires configuration, the component catalog and the transcription
//! service together for the `asrcore` binary. Results go to stdout, status
//! and diagnostics to stderr.

use crate::audio::WavAudio;
use crate::cli::{Cli, Commands, ConfigAction};
use crate::config::{Config, parse_stage_list};
use crate::engine::TranscribeOptions;
use crate::registry::{ComponentCatalog, ComponentRole};
use crate::service::{TranscribeRequest, TranscriptionService};
use crate::stream;
use anyhow::{Context, Result};
use std::path::{Path, PathBuf};
use std::time::Duration;
use tracing_subscriber::EnvFilter;

/// Install the stderr log subscriber.
///
/// `RUST_LOG` wins over the verbosity flag when set.
pub fn init_logging(verbose: u8) {
    let level = match verbose {
        0 => "warn",
        1 => "info",
        2 => "debug",
        _ => "trace",
    };
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(level));
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_target(false)
        .with_writer(std::io::stderr)
        .init();
}

/// Load configuration from `custom_path`, or the default location, then
/// apply environment overrides.
///
/// An explicit path must exist; a missing default file means defaults.
pub fn load_config(custom_path: Option<&Path>) -> Result<Config> {
    let config = match custom_path {
        Some(path) => Config::load(path)?,
        None => match Config::default_path() {
            Some(path) => Config::load_or_default(&path)?,
            None => Config::default(),
        },
    };
    Ok(config.with_env_overrides())
}

pub fn run(cli: Cli) -> Result<()> {
    let config_path = cli.config.clone();
    let config = load_config(config_path.as_deref())?;

    match cli.command {
        Commands::Transcribe {
            file,
            engine,
            stages,
            stream,
            chunk_ms,
            language,
            timeout,
            json,
        } => {
            let request = build_request(engine, stages, language, timeout);
            let service = TranscriptionService::from_config(&config, &ComponentCatalog::with_builtins())?;
            let audio = WavAudio::from_path(&file)
                .with_context(|| format!("Failed to read {}", file.display()))?;
            if stream {
                transcribe_streaming(&service, &audio, &request, chunk_ms, json)
            } else {
                transcribe_offline(&service, audio, &request, json)
            }
        }
        Commands::List { json } => {
            let service = TranscriptionService::from_config(&config, &ComponentCatalog::with_builtins())?;
            list_components(&service, json)
        }
        Commands::Plan { engine, stages } => {
            let service = TranscriptionService::from_config(&config, &ComponentCatalog::with_builtins())?;
            let request = build_request(engine, stages, None, None);
            let plan = service.plan(&request)?;
            println!("{}", plan);
            let drains = plan.drain_points();
            if !drains.is_empty() {
                println!("  drain points: {}", drains.join(", "));
            }
            if plan.engine_fallback() {
                println!("  engine transcribes streams in one call");
            }
            Ok(())
        }
        Commands::Config { action } => handle_config_command(action, &config, config_path),
    }
}

fn build_request(
    engine: Option<String>,
    stages: Option<String>,
    language: Option<String>,
    timeout: Option<Duration>,
) -> TranscribeRequest {
    TranscribeRequest {
        engine,
        stages: stages.as_deref().map(parse_stage_list),
        options: TranscribeOptions { language, timeout },
    }
}

fn transcribe_offline(
    service: &TranscriptionService,
    audio: WavAudio,
    request: &TranscribeRequest,
    json: bool,
) -> Result<()> {
    tracing::info!(duration_ms = audio.duration_ms(), "transcribing");
    let text = service.transcribe(audio.into_pcm_bytes(), request)?;
    if json {
        println!("{}", serde_json::json!({ "text": text }));
    } else {
        println!("{}", text);
    }
    Ok(())
}

fn transcribe_streaming(
    service: &TranscriptionService,
    audio: &WavAudio,
    request: &TranscribeRequest,
    chunk_ms: u32,
    json: bool,
) -> Result<()> {
    let chunks = audio.chunks(chunk_ms);
    tracing::info!(chunks = chunks.len(), chunk_ms, "streaming");
    let deltas = service.transcribe_streaming(stream::from_buffers(chunks), request)?;
    for delta in deltas {
        let delta = delta?;
        if json {
            println!("{}", serde_json::to_string(&delta)?);
        } else {
            println!("{}", delta.text);
        }
    }
    Ok(())
}

fn list_components(service: &TranscriptionService, json: bool) -> Result<()> {
    let components = service.registry().snapshot().describe();
    if json {
        println!("{}", serde_json::to_string_pretty(&components)?);
        return Ok(());
    }

    for role in [ComponentRole::Stage, ComponentRole::Engine] {
        let title = match role {
            ComponentRole::Stage => "Stages:",
            ComponentRole::Engine => "Engines:",
        };
        println!("{}", title);
        for component in components.iter().filter(|c| c.role == role) {
            let marker = if component.is_default { " (default)" } else { "" };
            println!("  {:<16} {}{}", component.name, component.capability, marker);
        }
    }
    Ok(())
}

fn handle_config_command(
    action: ConfigAction,
    config: &Config,
    custom_path: Option<PathBuf>,
) -> Result<()> {
    match action {
        ConfigAction::Show => print!("{}", config.to_toml()?),
        ConfigAction::Path => match custom_path.or_else(Config::default_path) {
            Some(path) => println!("{}", path.display()),
            None => anyhow::bail!("No configuration directory on this platform"),
        },
    }
    Ok(())
}
