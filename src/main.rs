//! Command-line host for the recitation engine.
//!
//! - Parse command-line arguments.
//! - Load configuration from `conf/config.toml`.
//! - Load a chapter bundle from disk or over HTTP and assemble the queue.
//! - Drive the engine on a fixed tick against the default audio device.

mod bundle;
mod cancellation;
mod fetch;
mod player;

use crate::bundle::{ScopeRequest, load_bundle};
use crate::cancellation::CancellationToken;
use crate::fetch::{SourceFetcher, http_client};
use crate::player::{AudioDevice, RodioOutput, RodioWordOutput};
use anyhow::{Context, Result, anyhow};
use hifz_core::config::{EngineConfig, load_config};
use hifz_core::engine::{EngineEvent, Notice, RecitationEngine};
use hifz_core::pagination::page_bounds;
use hifz_core::queue::assemble;
use hifz_core::runtime::Runtime;
use hifz_core::transport::TransportState;
use std::env;
use std::path::Path;
use std::time::Duration;
use tracing::{debug, error, info, warn};
use tracing_subscriber::{EnvFilter, fmt, prelude::*, reload};

type ReloadHandle = reload::Handle<EnvFilter, tracing_subscriber::Registry>;

const USAGE: &str = "Usage: hifz-coach <bundle.json|url> [--from N] [--to M] [--whole] [--loop]";

fn main() {
    let reload_handle = init_tracing();
    if let Err(err) = run(&reload_handle) {
        error!("{err:?}");
        std::process::exit(1);
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
struct CliArgs {
    location: String,
    scope: ScopeRequest,
    looping: bool,
}

fn run(reload_handle: &ReloadHandle) -> Result<()> {
    let args = parse_args(env::args().skip(1))?;
    let mut config = load_config(Path::new("conf/config.toml"));
    if args.looping {
        config.loop_queue = true;
    }
    set_log_level(reload_handle, config.log_level.as_filter_str());
    info!(
        location = %args.location,
        level = %config.log_level,
        "Starting recitation player"
    );

    let client = http_client()?;
    let bundle = load_bundle(&client, &args.location)?;
    let scope = bundle.scope(args.scope)?;
    let queue = assemble(&bundle.verses, &scope, &config.base_url);
    if queue.is_empty() {
        return Err(anyhow!("No audio available for this selection"));
    }
    info!(
        kind = queue.kind().as_str(),
        entries = queue.len(),
        total_secs = queue.total_duration(),
        "Assembled playback queue"
    );

    let token = CancellationToken::new();
    let handler_token = token.clone();
    if let Err(err) = ctrlc::set_handler(move || {
        info!("Received Ctrl+C; stopping playback");
        handler_token.cancel();
    }) {
        warn!("Failed to install Ctrl+C signal handler: {err}");
    }

    let device = AudioDevice::open()?;
    let fetcher = SourceFetcher::new(client);
    let mut runtime = Runtime::new(
        RecitationEngine::new(config.clone()),
        RodioOutput::new(device.handle(), fetcher.clone(), config.volume),
        RodioWordOutput::new(device.handle(), fetcher, config.volume),
    );

    let mut done = false;
    for event in [EngineEvent::LoadQueue(queue), EngineEvent::Play] {
        let notices = runtime.dispatch(event);
        done |= report(&runtime, notices);
    }
    play_until_done(&mut runtime, &config, &token, done)
}

type HostRuntime = Runtime<RodioOutput, RodioWordOutput>;

fn play_until_done(
    runtime: &mut HostRuntime,
    config: &EngineConfig,
    token: &CancellationToken,
    mut done: bool,
) -> Result<()> {
    let tick = Duration::from_millis(config.tick_interval_ms);
    while !done {
        if token.wait(tick) {
            let notices = runtime.dispatch(EngineEvent::Stop);
            report(runtime, notices);
            info!("Playback cancelled");
            return Ok(());
        }
        let notices = runtime.tick();
        done = report(runtime, notices);
    }
    let snapshot = runtime.engine().snapshot();
    if snapshot.transport == TransportState::Failed {
        let message = snapshot
            .status_message
            .unwrap_or_else(|| "playback failed".to_string());
        return Err(anyhow!(message)).context("Playback stopped");
    }
    info!(position = %snapshot.position_text, "Recitation finished");
    Ok(())
}

/// Log notices; returns true once playback has nothing left to do.
fn report(runtime: &HostRuntime, notices: Vec<Notice>) -> bool {
    let engine = runtime.engine();
    let mut done = false;
    for notice in notices {
        match notice {
            Notice::PositionChanged { seconds } | Notice::ScrubPreview { seconds } => {
                debug!(seconds, "Position")
            }
            Notice::Started => info!("Playing"),
            Notice::Paused => info!("Paused"),
            Notice::Ended => {
                info!("Reached end of queue");
                done = true;
            }
            Notice::Failed { index, error } => {
                warn!(?index, %error, "Playback failure");
                done |= engine.transport().state() == TransportState::Failed;
            }
            Notice::TrackCompleted { index, seconds } => {
                info!(index, seconds, "Track completed")
            }
            Notice::ActiveVerseChanged {
                index: Some(index),
                verse_key,
            } => {
                let text = engine.queue().get(index).map_or("", |entry| entry.text());
                info!(index, verse = ?verse_key, %text, "Reciting");
            }
            Notice::ActiveVerseChanged { index: None, .. } => debug!("No active verse"),
            Notice::PageChanged { page } => {
                let shown = page_bounds(page, engine.queue().len(), engine.config().page_size);
                info!(page, first = shown.start + 1, last = shown.end, "Page changed");
            }
            Notice::WordStarted { key } => debug!(%key, "Word pronunciation started"),
            Notice::WordFinished { key } => debug!(%key, "Word pronunciation finished"),
        }
    }
    done
}

fn parse_args(mut args: impl Iterator<Item = String>) -> Result<CliArgs> {
    let mut location = None;
    let mut scope = ScopeRequest::default();
    let mut looping = false;
    while let Some(arg) = args.next() {
        match arg.as_str() {
            "--from" => scope.from = Some(parse_verse_number(args.next(), "--from")?),
            "--to" => scope.to = Some(parse_verse_number(args.next(), "--to")?),
            "--whole" => scope.whole = true,
            "--loop" => looping = true,
            flag if flag.starts_with("--") => return Err(anyhow!("Unknown flag {flag}\n{USAGE}")),
            _ if location.is_none() => location = Some(arg),
            _ => return Err(anyhow!("Unexpected argument {arg}\n{USAGE}")),
        }
    }
    let location = location.ok_or_else(|| anyhow!(USAGE))?;
    Ok(CliArgs {
        location,
        scope,
        looping,
    })
}

fn parse_verse_number(value: Option<String>, flag: &str) -> Result<u32> {
    let value = value.ok_or_else(|| anyhow!("{flag} needs a verse number"))?;
    value
        .parse()
        .with_context(|| format!("Invalid verse number for {flag}: {value}"))
}

fn init_tracing() -> ReloadHandle {
    let env_filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("debug"));
    let (filter_layer, handle) = reload::Layer::new(env_filter);
    tracing_subscriber::registry()
        .with(
            fmt::layer()
                .with_target(true)
                .with_file(true)
                .with_line_number(true)
                .with_filter(filter_layer),
        )
        .init();
    debug!("Logging initialized; override level with logging.log_level or RUST_LOG");
    handle
}

fn set_log_level(handle: &ReloadHandle, level: &str) {
    let parsed = EnvFilter::builder()
        .parse(level)
        .unwrap_or_else(|_| EnvFilter::new("info"));
    if let Err(err) = handle.modify(|filter| *filter = parsed.clone()) {
        warn!(%level, "Failed to update log level from config: {err}");
    } else {
        debug!(%level, "Applied log level from config");
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn args(raw: &[&str]) -> Result<CliArgs> {
        parse_args(raw.iter().map(|arg| arg.to_string()))
    }

    #[test]
    fn parses_range_flags() {
        let parsed = args(&["112.json", "--from", "2", "--to", "4", "--loop"]).unwrap();
        assert_eq!(parsed.location, "112.json");
        assert_eq!(parsed.scope.from, Some(2));
        assert_eq!(parsed.scope.to, Some(4));
        assert!(!parsed.scope.whole);
        assert!(parsed.looping);
    }

    #[test]
    fn whole_flag_may_precede_location() {
        let parsed = args(&["--whole", "https://cdn.example/112.json"]).unwrap();
        assert!(parsed.scope.whole);
        assert_eq!(parsed.location, "https://cdn.example/112.json");
    }

    #[test]
    fn rejects_bad_input() {
        assert!(args(&[]).is_err());
        assert!(args(&["a.json", "--from"]).is_err());
        assert!(args(&["a.json", "--to", "x"]).is_err());
        assert!(args(&["a.json", "--speed"]).is_err());
        assert!(args(&["a.json", "b.json"]).is_err());
    }
}
