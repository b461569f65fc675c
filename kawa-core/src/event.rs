//! Canonical MJAI event stream.
//!
//! Every bridge translates its platform's traffic into [`Event`]s; the
//! decision pipeline consumes nothing else. The JSON shape is the usual
//! MJAI one: a `"type"` discriminator plus per-type fields. Events replayed
//! from a resync backlog carry `"sync": true`.

use serde::de::{self, Deserializer};
use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::tile::Tile;

/// Scores, deltas and other per-seat values. Three-player games pad seat 3 with 0.
pub type Scores = [i32; 4];

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum EventBody {
    StartGame {
        #[serde(default)]
        id: u8,
    },
    StartKyoku {
        bakaze: Tile,
        dora_marker: Tile,
        kyoku: u8,
        honba: u8,
        kyotaku: u8,
        oya: u8,
        scores: Scores,
        tehais: [Vec<Tile>; 4],
        /// Absent on the wire means "seat 3 scores 0".
        #[serde(default)]
        is_3p: bool,
    },
    Tsumo {
        actor: u8,
        pai: Tile,
    },
    Dahai {
        actor: u8,
        pai: Tile,
        tsumogiri: bool,
    },
    Chi {
        actor: u8,
        target: u8,
        pai: Tile,
        consumed: Vec<Tile>,
    },
    Pon {
        actor: u8,
        target: u8,
        pai: Tile,
        consumed: Vec<Tile>,
    },
    Daiminkan {
        actor: u8,
        target: u8,
        pai: Tile,
        consumed: Vec<Tile>,
    },
    Ankan {
        actor: u8,
        consumed: Vec<Tile>,
    },
    Kakan {
        actor: u8,
        pai: Tile,
        consumed: Vec<Tile>,
    },
    Reach {
        actor: u8,
    },
    ReachAccepted {
        actor: u8,
        #[serde(default, skip_serializing_if = "Option::is_none")]
        deltas: Option<Scores>,
        #[serde(default, skip_serializing_if = "Option::is_none")]
        scores: Option<Scores>,
    },
    Dora {
        dora_marker: Tile,
    },
    /// Three-player North extraction.
    Nukidora {
        actor: u8,
        pai: Tile,
    },
    Hora {
        actor: u8,
        target: u8,
        #[serde(default, skip_serializing_if = "Option::is_none")]
        pai: Option<Tile>,
        #[serde(default, skip_serializing_if = "Option::is_none")]
        deltas: Option<Scores>,
        #[serde(default, skip_serializing_if = "Option::is_none")]
        scores: Option<Scores>,
    },
    Ryukyoku {
        #[serde(default, skip_serializing_if = "Option::is_none")]
        deltas: Option<Scores>,
        #[serde(default, skip_serializing_if = "Option::is_none")]
        scores: Option<Scores>,
    },
    EndKyoku,
    EndGame,
    /// Diagnostic signal for the delivery side (`game_syncing`, ...).
    SystemEvent {
        code: String,
        #[serde(default, skip_serializing_if = "Option::is_none")]
        message: Option<String>,
    },
    None,
}

/// A canonical event plus its synthetic marker.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Event {
    #[serde(flatten)]
    pub body: EventBody,
    #[serde(default, skip_serializing_if = "is_false")]
    pub sync: bool,
}

fn is_false(b: &bool) -> bool {
    !*b
}

#[derive(Deserialize)]
struct WireEvent {
    #[serde(flatten)]
    body: EventBody,
    #[serde(default)]
    sync: bool,
}

impl<'de> Deserialize<'de> for Event {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        let mut value = Value::deserialize(deserializer)?;
        if let Some(obj) = value.as_object_mut() {
            let is_start = obj.get("type").and_then(Value::as_str) == Some("start_kyoku");
            if is_start && !obj.contains_key("is_3p") {
                let seat_3 = obj.get("scores").and_then(|s| s.get(3));
                let empty_seat = seat_3.and_then(Value::as_i64) == Some(0);
                obj.insert("is_3p".to_owned(), Value::Bool(empty_seat));
            }
        }
        let wire = WireEvent::deserialize(value).map_err(de::Error::custom)?;
        Ok(Event {
            body: wire.body,
            sync: wire.sync,
        })
    }
}

impl From<EventBody> for Event {
    fn from(body: EventBody) -> Self {
        Event { body, sync: false }
    }
}

impl Event {
    pub fn new(body: EventBody) -> Self {
        body.into()
    }

    /// Marks the event as replayed from a resync backlog.
    pub fn synthetic(mut self) -> Self {
        self.sync = true;
        self
    }

    pub fn system(code: &str) -> Self {
        EventBody::SystemEvent {
            code: code.to_owned(),
            message: None,
        }
        .into()
    }

    #[inline]
    pub fn is_sync(&self) -> bool {
        self.sync
    }

    /// The MJAI `type` string.
    pub fn kind(&self) -> &'static str {
        self.body.kind()
    }

    pub fn actor(&self) -> Option<u8> {
        self.body.actor()
    }
}

impl EventBody {
    pub fn kind(&self) -> &'static str {
        match self {
            EventBody::StartGame { .. } => "start_game",
            EventBody::StartKyoku { .. } => "start_kyoku",
            EventBody::Tsumo { .. } => "tsumo",
            EventBody::Dahai { .. } => "dahai",
            EventBody::Chi { .. } => "chi",
            EventBody::Pon { .. } => "pon",
            EventBody::Daiminkan { .. } => "daiminkan",
            EventBody::Ankan { .. } => "ankan",
            EventBody::Kakan { .. } => "kakan",
            EventBody::Reach { .. } => "reach",
            EventBody::ReachAccepted { .. } => "reach_accepted",
            EventBody::Dora { .. } => "dora",
            EventBody::Nukidora { .. } => "nukidora",
            EventBody::Hora { .. } => "hora",
            EventBody::Ryukyoku { .. } => "ryukyoku",
            EventBody::EndKyoku => "end_kyoku",
            EventBody::EndGame => "end_game",
            EventBody::SystemEvent { .. } => "system_event",
            EventBody::None => "none",
        }
    }

    pub fn actor(&self) -> Option<u8> {
        match *self {
            EventBody::Tsumo { actor, .. }
            | EventBody::Dahai { actor, .. }
            | EventBody::Chi { actor, .. }
            | EventBody::Pon { actor, .. }
            | EventBody::Daiminkan { actor, .. }
            | EventBody::Ankan { actor, .. }
            | EventBody::Kakan { actor, .. }
            | EventBody::Reach { actor }
            | EventBody::ReachAccepted { actor, .. }
            | EventBody::Nukidora { actor, .. }
            | EventBody::Hora { actor, .. } => Some(actor),
            _ => None,
        }
    }

    /// Round-boundary and lifecycle events that carry no seat action.
    pub fn is_lifecycle(&self) -> bool {
        matches!(
            self,
            EventBody::StartGame { .. }
                | EventBody::StartKyoku { .. }
                | EventBody::EndKyoku
                | EventBody::EndGame
        )
    }
}
