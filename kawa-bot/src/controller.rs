//! Controller: owns the live agent and the variant state machine.
//!
//! ```text
//!            start_kyoku(is_3p)          contradicting signal
//!   Idle ──────────────────────► Bound(v) ───────────────────► Bound(v')
//! ```
//!
//! `start_game` is held back until the next `start_kyoku` tells which
//! variant to load. A later signal for the other variant (a `start_kyoku`
//! with a different seat count, or a North extraction in a four-seat game)
//! switches engines and replays the held `start_game` into the new agent.
//! Every failure becomes a `{"type": "none", "error": code}` response.

use kawa_core::{Event, EventBody};

use crate::action::Variant;
use crate::agent::Agent;
use crate::engine::{EngineFactory, EngineKind};
use crate::notify::{codes, NotificationFlags};
use crate::response::Response;

pub struct Controller {
    factory: Box<dyn EngineFactory>,
    agent: Option<Agent>,
    /// Waiting for the round start that picks the variant.
    pending_start_game: Option<Event>,
    /// Kept for replay into a switched agent.
    last_start_game: Option<Event>,
    flags: NotificationFlags,
}

impl Controller {
    pub fn new(factory: Box<dyn EngineFactory>) -> Self {
        Self {
            factory,
            agent: None,
            pending_start_game: None,
            last_start_game: None,
            flags: NotificationFlags::default(),
        }
    }

    pub fn variant(&self) -> Option<Variant> {
        self.agent.as_ref().map(Agent::variant)
    }

    pub fn agent(&self) -> Option<&Agent> {
        self.agent.as_ref()
    }

    /// Diagnostics raised since the last call.
    pub fn take_flags(&mut self) -> NotificationFlags {
        let mut flags = std::mem::take(&mut self.flags);
        if let Some(agent) = self.agent.as_mut() {
            flags.merge_engine(agent.take_flags());
        }
        flags
    }

    /// Parses one event from JSON text, then reacts to it.
    pub fn react_json(&mut self, text: &str) -> Response {
        let value: serde_json::Value = match serde_json::from_str(text) {
            Ok(v) => v,
            Err(e) => {
                log::warn!("undecodable event json: {e}");
                return Response::error(codes::JSON_DECODE_ERROR);
            }
        };
        match serde_json::from_value::<Event>(value) {
            Ok(event) => self.react(&event),
            Err(e) => {
                log::warn!("json is not a game event: {e}");
                Response::error(codes::GAME_DATA_PARSE_FAILED)
            }
        }
    }

    pub fn react(&mut self, event: &Event) -> Response {
        match &event.body {
            EventBody::StartGame { .. } => {
                self.pending_start_game = Some(event.clone());
                self.last_start_game = Some(event.clone());
                return Response::none();
            }
            EventBody::StartKyoku { is_3p, .. } => {
                if let Err(code) = self.ensure_variant(Variant::from_is_3p(*is_3p)) {
                    return Response::error(code);
                }
            }
            EventBody::Nukidora { .. } if self.variant() == Some(Variant::FourPlayer) => {
                log::warn!("nukidora in a four-player game, switching to three-player");
                if let Err(code) = self.ensure_variant(Variant::ThreePlayer) {
                    return Response::error(code);
                }
            }
            _ if self.pending_start_game.is_some() => {
                log::debug!("{} before the first round start, ignored", event.kind());
                return Response::none();
            }
            _ => {}
        }

        let Some(agent) = self.agent.as_mut() else {
            return Response::error(codes::NO_BOT_LOADED);
        };
        let mut batch = Vec::with_capacity(2);
        batch.extend(self.pending_start_game.take());
        batch.push(event.clone());
        match agent.react(&batch) {
            Ok(response) => response,
            Err(e) => {
                log::error!("agent failed on {}: {e:#}", event.kind());
                Response::error(codes::BOT_RUNTIME_ERROR)
            }
        }
    }

    /// Loads an agent for `variant` unless one is already bound.
    fn ensure_variant(&mut self, variant: Variant) -> Result<(), &'static str> {
        let current = self.variant();
        if current == Some(variant) {
            return Ok(());
        }
        let provider = self.factory.build(variant).map_err(|e| {
            log::error!("failed to load {} engine: {e:#}", variant.name());
            codes::BOT_SWITCH_FAILED
        })?;
        if provider.has_online() {
            self.flags.model_loaded_online = true;
        } else {
            self.flags.model_loaded_local = true;
        }
        let seat = match self.last_start_game.as_ref().map(|e| &e.body) {
            Some(EventBody::StartGame { id }) => *id,
            _ => 0,
        };
        log::info!(
            "bound {} engine (seat {seat}, {})",
            variant.name(),
            if provider.has_online() {
                EngineKind::Online.as_str()
            } else {
                EngineKind::Local.as_str()
            },
        );
        self.agent = Some(Agent::new(seat, provider));
        if current.is_some() && self.pending_start_game.is_none() {
            // switched mid-game: the new agent still needs the game start
            self.pending_start_game = self.last_start_game.clone();
        }
        Ok(())
    }
}
