//! Notification codes for the delivery side.
//!
//! A notification payload is an ordered list of opaque string codes derived
//! from the event, the engine diagnostics raised while reacting to it, and
//! any error attached to the response.

use kawa_core::{Event, EventBody};
use serde::Serialize;

use crate::engine::EngineFlags;
use crate::response::Response;

pub mod codes {
    pub const CLIENT_CONNECTED: &str = "client_connected";
    pub const GAME_CONNECTED: &str = "game_connected";
    pub const GAME_SYNCING: &str = "game_syncing";
    pub const GAME_DISCONNECTED: &str = "game_disconnected";
    pub const RETURN_LOBBY: &str = "return_lobby";

    pub const FALLBACK_USED: &str = "fallback_used";
    pub const ONLINE_SERVICE_RECONNECTING: &str = "online_service_reconnecting";
    pub const ONLINE_SERVICE_RESTORED: &str = "online_service_restored";
    pub const MODEL_LOADED_LOCAL: &str = "model_loaded_local";
    pub const MODEL_LOADED_ONLINE: &str = "model_loaded_online";

    pub const GAME_DATA_PARSE_FAILED: &str = "game_data_parse_failed";
    pub const JSON_DECODE_ERROR: &str = "json_decode_error";
    pub const NO_BOT_LOADED: &str = "no_bot_loaded";
    pub const BOT_SWITCH_FAILED: &str = "bot_switch_failed";
    pub const BOT_RUNTIME_ERROR: &str = "bot_runtime_error";
    pub const STATE_TRACKER_ERROR: &str = "state_tracker_error";
}

/// Engine and model-loading diagnostics collected for one event.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct NotificationFlags {
    pub fallback_used: bool,
    pub circuit_open: bool,
    pub circuit_restored: bool,
    pub model_loaded_local: bool,
    pub model_loaded_online: bool,
}

impl NotificationFlags {
    pub fn merge_engine(&mut self, engine: EngineFlags) {
        self.fallback_used |= engine.fallback_used;
        self.circuit_open |= engine.circuit_open;
        self.circuit_restored |= engine.circuit_restored;
    }

    pub fn codes(&self) -> Vec<&'static str> {
        [
            (self.fallback_used, codes::FALLBACK_USED),
            (self.circuit_open, codes::ONLINE_SERVICE_RECONNECTING),
            (self.circuit_restored, codes::ONLINE_SERVICE_RESTORED),
            (self.model_loaded_local, codes::MODEL_LOADED_LOCAL),
            (self.model_loaded_online, codes::MODEL_LOADED_ONLINE),
        ]
        .into_iter()
        .filter_map(|(on, code)| on.then_some(code))
        .collect()
    }
}

/// Codes for one processed event, in delivery order: event codes, engine
/// flags, then the response error. A system event yields only its own code.
pub fn collect(event: &Event, flags: NotificationFlags, response: &Response) -> Vec<String> {
    match &event.body {
        EventBody::SystemEvent { code, .. } => return vec![code.clone()],
        EventBody::StartGame { .. } => {
            let mut out = vec![codes::GAME_CONNECTED.to_owned()];
            out.extend(rest(flags, response));
            out
        }
        _ => rest(flags, response).collect(),
    }
}

fn rest(flags: NotificationFlags, response: &Response) -> impl Iterator<Item = String> + '_ {
    flags
        .codes()
        .into_iter()
        .map(str::to_owned)
        .chain(response.error.iter().cloned())
}
