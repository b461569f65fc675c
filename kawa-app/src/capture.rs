//! Capture ingest: routes captured websocket traffic to per-connection
//! bridges.
//!
//! Input is JSON lines, one record per websocket event:
//!
//! ```text
//! {"conn": "7", "kind": "open", "url": "wss://game.maj-soul.com/..."}
//! {"conn": "7", "kind": "frame", "data": "<base64 payload>"}
//! {"conn": "7", "kind": "close"}
//! {"kind": "shutdown"}
//! ```

use std::collections::HashMap;
use std::sync::Arc;

use anyhow::{Context, Result};
use base64::engine::general_purpose::STANDARD;
use base64::Engine as _;
use kawa_bot::notify::codes;
use kawa_bot::Settings;
use kawa_core::bridge::{new_bridge, Bridge, MajsoulBridge, Platform};
use kawa_core::codec::SchemaRegistry;
use kawa_core::{Event, EventBody};
use serde::Deserialize;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum RecordKind {
    Open,
    Frame,
    Close,
    Shutdown,
}

#[derive(Debug, Clone, Deserialize)]
pub struct CaptureRecord {
    #[serde(default)]
    pub conn: String,
    pub kind: RecordKind,
    #[serde(default)]
    pub url: Option<String>,
    #[serde(default)]
    pub data: String,
}

/// One bridge per live connection.
pub struct CaptureRouter {
    platform: Option<Platform>,
    schema: Option<Arc<SchemaRegistry>>,
    conns: HashMap<String, Box<dyn Bridge>>,
}

impl CaptureRouter {
    pub fn new(settings: &Settings) -> Result<Self> {
        let schema = match &settings.majsoul.schema_path {
            Some(path) => {
                let text = std::fs::read_to_string(path)
                    .with_context(|| format!("reading majsoul schema {}", path.display()))?;
                let registry = SchemaRegistry::from_json(&text)
                    .with_context(|| format!("parsing majsoul schema {}", path.display()))?;
                Some(Arc::new(registry))
            }
            None => None,
        };
        Ok(Self {
            platform: settings.platform,
            schema,
            conns: HashMap::new(),
        })
    }

    pub fn connections(&self) -> usize {
        self.conns.len()
    }

    /// Canonical events for one record.
    pub fn handle(&mut self, record: CaptureRecord) -> Vec<Event> {
        match record.kind {
            RecordKind::Open => self.open(&record.conn, record.url.as_deref()),
            RecordKind::Frame => self.frame(&record.conn, &record.data),
            RecordKind::Close => self.close(&record.conn),
            RecordKind::Shutdown => Vec::new(),
        }
    }

    fn open(&mut self, conn: &str, url: Option<&str>) -> Vec<Event> {
        let Some(platform) = self.platform.or_else(|| url.and_then(Platform::from_url)) else {
            log::warn!("connection {conn}: no platform for {url:?}, ignored");
            return Vec::new();
        };
        let bridge = match self.bridge_for(platform) {
            Ok(bridge) => bridge,
            Err(e) => {
                log::error!("connection {conn}: cannot create {platform} bridge: {e:#}");
                return Vec::new();
            }
        };
        if let Some(mut old) = self.conns.insert(conn.to_owned(), bridge) {
            log::info!("connection {conn} replaced");
            old.reset();
        }
        log::info!("connection {conn} opened ({platform})");
        vec![Event::system(codes::CLIENT_CONNECTED)]
    }

    fn frame(&mut self, conn: &str, data: &str) -> Vec<Event> {
        let Some(bridge) = self.conns.get_mut(conn) else {
            log::debug!("frame for unknown connection {conn}");
            return Vec::new();
        };
        let raw = match STANDARD.decode(data.trim()) {
            Ok(raw) => raw,
            Err(e) => {
                log::warn!("connection {conn}: undecodable frame: {e}");
                return Vec::new();
            }
        };
        let mut events = bridge.parse(&raw).unwrap_or_default();
        if events.iter().any(|e| matches!(e.body, EventBody::EndGame)) {
            events.push(Event::system(codes::RETURN_LOBBY));
        }
        events
    }

    fn close(&mut self, conn: &str) -> Vec<Event> {
        let Some(mut bridge) = self.conns.remove(conn) else {
            return Vec::new();
        };
        let ended = bridge.game_ended();
        bridge.reset();
        log::info!("connection {conn} closed");
        if ended {
            Vec::new()
        } else {
            vec![Event::system(codes::GAME_DISCONNECTED)]
        }
    }

    /// Drops every bridge.
    pub fn reset_all(&mut self) {
        for (_, mut bridge) in self.conns.drain() {
            bridge.reset();
        }
    }

    fn bridge_for(&self, platform: Platform) -> Result<Box<dyn Bridge>> {
        match (platform, &self.schema) {
            (Platform::Majsoul, Some(schema)) => {
                Ok(Box::new(MajsoulBridge::with_registry(schema.clone())))
            }
            _ => Ok(new_bridge(platform)?),
        }
    }
}
