//! State Tracker: a second, engine-free mirror of the match.
//!
//! The tracker absorbs the same events as the controller, after it, and
//! answers the questions the delivery and move-execution sides ask: which
//! concrete tiles a call would consume, what the last discard or draw was,
//! and whether the seat is locked in riichi.

use kawa_core::tile::NUM_TILE_TYPES;
use kawa_core::{Event, EventBody, Tile};
use serde::Serialize;
use tinyvec::ArrayVec;

use crate::action::{ActionKind, Variant};
use crate::notify::codes;
use crate::response::Response;
use crate::state::{ActionCandidate, PlayerState};

/// One concrete way to perform a call.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct CallOption {
    pub pai: Tile,
    pub consumed: Vec<Tile>,
}

/// Read-only view handed to the move-execution side.
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct TrackerSnapshot {
    pub player_id: u8,
    pub is_3p: bool,
    pub tehai: Vec<Tile>,
    pub last_self_tsumo: Option<Tile>,
    pub last_kawa_tile: Option<Tile>,
    pub self_riichi_accepted: bool,
    pub cans: ActionCandidate,
    pub ankan: Vec<CallOption>,
    pub kakan: Vec<CallOption>,
}

pub struct StateTracker {
    state: PlayerState,
    /// Own chi/pon/kan events of the current round.
    calls: Vec<EventBody>,
    temperature: f32,
}

impl Default for StateTracker {
    fn default() -> Self {
        Self::new(1.0)
    }
}

impl StateTracker {
    pub fn new(temperature: f32) -> Self {
        Self {
            state: PlayerState::new(0, false),
            calls: Vec::new(),
            temperature,
        }
    }

    /// Absorbs one event. Returns the default tsumogiri (or nothing), or a
    /// `state_tracker_error` envelope when the mirror cannot follow.
    pub fn update(&mut self, event: &Event) -> Response {
        match self.absorb(&event.body) {
            Ok(()) => self.think(),
            Err(e) => {
                log::error!("state tracker failed on {}: {e}", event.kind());
                log::error!("{}", self.state.brief_info());
                Response::error(codes::STATE_TRACKER_ERROR)
            }
        }
    }

    fn absorb(&mut self, body: &EventBody) -> kawa_core::KawaResult<()> {
        match body {
            EventBody::StartGame { .. } | EventBody::StartKyoku { .. } => self.calls.clear(),
            EventBody::Chi { actor, .. }
            | EventBody::Pon { actor, .. }
            | EventBody::Daiminkan { actor, .. }
            | EventBody::Ankan { actor, .. }
            | EventBody::Kakan { actor, .. }
                if *actor == self.state.player_id() =>
            {
                self.calls.push(body.clone());
            }
            _ => {}
        }
        if let EventBody::Nukidora { actor, pai } = body {
            // mirrored as a North discard
            let dahai = EventBody::Dahai {
                actor: *actor,
                pai: *pai,
                tsumogiri: *actor == self.state.player_id()
                    && self.state.last_self_tsumo() == Some(Tile::NORTH),
            };
            self.state.update(&dahai)?;
        } else {
            self.state.update(body)?;
        }
        Ok(())
    }

    fn think(&self) -> Response {
        let cans = self.state.last_cans();
        if !cans.can_discard {
            return Response::none();
        }
        match self.state.last_self_tsumo() {
            Some(pai) if !self.self_riichi_accepted() || !(cans.can_agari() || cans.can_ankan) => {
                Response::action(EventBody::Dahai {
                    actor: self.state.player_id(),
                    pai,
                    tsumogiri: true,
                })
            }
            _ => Response::none(),
        }
    }

    pub fn state(&self) -> &PlayerState {
        &self.state
    }

    pub fn variant(&self) -> Variant {
        Variant::from_is_3p(self.state.is_3p())
    }

    pub fn temperature(&self) -> f32 {
        self.temperature
    }

    pub fn calls(&self) -> &[EventBody] {
        &self.calls
    }

    pub fn last_kawa_tile(&self) -> Option<Tile> {
        self.state.last_kawa_tile()
    }

    pub fn last_self_tsumo(&self) -> Option<Tile> {
        self.state.last_self_tsumo()
    }

    pub fn self_riichi_accepted(&self) -> bool {
        self.state.riichi_accepted(self.state.player_id())
    }

    pub fn can_tsumo_agari(&self) -> bool {
        self.state.last_cans().can_tsumo_agari
    }

    pub fn snapshot(&self) -> TrackerSnapshot {
        TrackerSnapshot {
            player_id: self.state.player_id(),
            is_3p: self.state.is_3p(),
            tehai: self.state.tehai_tiles(),
            last_self_tsumo: self.last_self_tsumo(),
            last_kawa_tile: self.last_kawa_tile(),
            self_riichi_accepted: self.self_riichi_accepted(),
            cans: self.state.last_cans(),
            ankan: self.ankan_options(),
            kakan: self.kakan_options(),
        }
    }
}

// ---------------------------------------------------------------------------
// Call enumeration
// ---------------------------------------------------------------------------

impl StateTracker {
    /// Distinct copies of a tile type held in hand, red five first.
    fn copies(&self, ty: usize) -> ArrayVec<[Tile; 2]> {
        let held: Vec<Tile> = self
            .state
            .tehai_tiles()
            .into_iter()
            .filter(|t| t.tile_type() == Some(ty))
            .collect();
        let mut out = ArrayVec::new();
        if let Some(&aka) = held.iter().find(|t| t.is_aka()) {
            out.push(aka);
        }
        if let Some(&plain) = held.iter().find(|t| !t.is_aka()) {
            out.push(plain);
        }
        out
    }

    /// Held copies of `ty` that may fill `n` slots: red five first, then
    /// the plain copies.
    fn take(&self, ty: usize, n: usize) -> Option<Vec<Tile>> {
        let mut held: Vec<Tile> = self
            .state
            .tehai_tiles()
            .into_iter()
            .filter(|t| t.tile_type() == Some(ty))
            .collect();
        held.sort_by_key(|t| !t.is_aka());
        (held.len() >= n).then(|| held[..n].to_vec())
    }

    /// Every consumed pair for one chi shape on the last discard.
    pub fn chi_options(&self, kind: ActionKind) -> Vec<CallOption> {
        let Some(pai) = self.last_kawa_tile() else {
            return Vec::new();
        };
        let Some(ty) = pai.tile_type() else {
            return Vec::new();
        };
        if ty >= 27 {
            return Vec::new();
        }
        let num = ty % 9;
        let (a, b) = match kind {
            ActionKind::ChiLow if num <= 6 => (ty + 1, ty + 2),
            ActionKind::ChiMid if (1..=7).contains(&num) => (ty - 1, ty + 1),
            ActionKind::ChiHigh if num >= 2 => (ty - 2, ty - 1),
            _ => return Vec::new(),
        };
        let mut out = Vec::new();
        for &x in self.copies(a).iter() {
            for &y in self.copies(b).iter() {
                out.push(CallOption {
                    pai,
                    consumed: vec![x, y],
                });
            }
        }
        out
    }

    /// Consumed pairs for a pon on the last discard, red five first.
    pub fn pon_options(&self) -> Vec<CallOption> {
        let Some(pai) = self.last_kawa_tile() else {
            return Vec::new();
        };
        let Some(ty) = pai.tile_type() else {
            return Vec::new();
        };
        let mut out = Vec::new();
        if let Some(consumed) = self.take(ty, 2) {
            let has_aka = consumed.iter().any(|t| t.is_aka());
            out.push(CallOption { pai, consumed });
            let plain = self.state.tehai()[ty] as usize - usize::from(has_aka);
            if has_aka && plain >= 2 {
                out.push(CallOption {
                    pai,
                    consumed: vec![pai.deaka(); 2],
                });
            }
        }
        out
    }

    /// The open kan on the last discard, when one is offered.
    pub fn daiminkan_options(&self) -> Vec<CallOption> {
        let (Some(pai), true) = (self.last_kawa_tile(), self.state.last_cans().can_daiminkan) else {
            return Vec::new();
        };
        pai.tile_type()
            .and_then(|ty| self.take(ty, 3))
            .map(|consumed| CallOption { pai, consumed })
            .into_iter()
            .collect()
    }

    /// Every tile type held four times.
    pub fn ankan_options(&self) -> Vec<CallOption> {
        (0..NUM_TILE_TYPES)
            .filter(|&ty| self.state.tehai()[ty] == 4)
            .filter_map(|ty| self.take(ty, 4))
            .map(|consumed| CallOption {
                pai: consumed[0],
                consumed,
            })
            .collect()
    }

    /// Own pons whose fourth tile is in hand.
    pub fn kakan_options(&self) -> Vec<CallOption> {
        self.calls
            .iter()
            .filter_map(|call| match call {
                EventBody::Pon { consumed, .. } => consumed.first().and_then(|t| t.tile_type()),
                _ => None,
            })
            .filter_map(|ty| self.take(ty, 1))
            .map(|consumed| CallOption {
                pai: consumed[0],
                consumed,
            })
            .collect()
    }
}
