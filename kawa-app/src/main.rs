//! kawa: coaching backend.
//!
//! Reads captured websocket traffic as JSON lines on stdin, turns it into
//! canonical events, runs them through the decision pipeline and prints
//! recommendation, notification and action payloads on stdout.
//!
//! Usage: `kawa [settings.json]` (or `KAWA_SETTINGS=...`).

mod capture;
mod sink;

use std::io::{self, BufRead};
use std::path::PathBuf;
use std::thread;

use anyhow::{Context, Result};
use kawa_bot::{Controller, Producer, Reactor, Settings, SettingsFactory, StateTracker};

use crate::capture::{CaptureRecord, CaptureRouter, RecordKind};
use crate::sink::JsonLinesSink;

const DEFAULT_SETTINGS: &str = "settings.json";

fn settings_path() -> PathBuf {
    std::env::args_os()
        .nth(1)
        .map(PathBuf::from)
        .or_else(|| std::env::var_os("KAWA_SETTINGS").map(PathBuf::from))
        .unwrap_or_else(|| PathBuf::from(DEFAULT_SETTINGS))
}

fn main() -> Result<()> {
    let path = settings_path();
    let settings = Settings::load(&path)?;

    env_logger::Builder::new()
        .filter_level(settings.log_level.to_filter())
        .parse_default_env()
        .init();
    log::info!("settings from {}", path.display());

    let model_4p = settings.model_config.model_path(false);
    anyhow::ensure!(
        model_4p.exists(),
        "local model {} not found; it is required even with the online engine enabled",
        model_4p.display()
    );
    let model_3p = settings.model_config.model_path(true);
    if !model_3p.exists() {
        log::warn!(
            "three-player model {} not found, 3p games will fail to bind",
            model_3p.display()
        );
    }

    let router = CaptureRouter::new(&settings)?;
    let (producer, rx) = kawa_bot::channel(settings.reactor.queue_capacity);
    thread::Builder::new()
        .name("capture".to_owned())
        .spawn(move || ingest(io::stdin().lock(), router, producer))
        .context("spawning capture thread")?;

    let controller = Controller::new(Box::new(SettingsFactory::new(settings.clone())));
    let tracker = StateTracker::new(settings.model_config.temperature);
    let sink = JsonLinesSink::new(io::stdout());
    let mut reactor = Reactor::new(rx, controller, tracker, sink, &settings.reactor);
    reactor.run();
    log::info!("bye");
    Ok(())
}

/// Capture producer: one record per line until EOF or a shutdown record.
fn ingest(input: impl BufRead, mut router: CaptureRouter, producer: Producer) {
    for line in input.lines() {
        let line = match line {
            Ok(line) => line,
            Err(e) => {
                log::error!("stdin read failed: {e}");
                break;
            }
        };
        if line.trim().is_empty() {
            continue;
        }
        let record: CaptureRecord = match serde_json::from_str(&line) {
            Ok(record) => record,
            Err(e) => {
                log::warn!("skipping malformed capture record: {e}");
                continue;
            }
        };
        if record.kind == RecordKind::Shutdown {
            break;
        }
        producer.send_all(router.handle(record));
    }
    router.reset_all();
    producer.shutdown();
}
