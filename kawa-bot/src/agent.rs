//! Decision agent: one seat, one variant, one engine provider.
//!
//! Feeds events into its [`PlayerState`], and whenever the seat has a
//! decision pending, encodes the observation, asks the provider and turns
//! the chosen index back into a canonical event.

use anyhow::{ensure, Context, Result};
use kawa_core::tile::NORTH;
use kawa_core::{Event, EventBody, Tile};

use crate::action::{mask_to_bits, ActionKind, Variant};
use crate::encoder::ObservationEncoder;
use crate::engine::{EngineFlags, EngineProvider};
use crate::response::{Meta, Response};
use crate::state::{FuuroKind, PlayerState};

pub struct Agent {
    variant: Variant,
    state: PlayerState,
    provider: EngineProvider,
    encoder: ObservationEncoder,
    /// Set by start_game, consumed by the next decision's meta.
    game_start: bool,
}

impl Agent {
    pub fn new(player_id: u8, provider: EngineProvider) -> Self {
        let variant = provider.variant();
        Self {
            variant,
            state: PlayerState::new(player_id, variant.is_3p()),
            provider,
            encoder: ObservationEncoder::new(),
            game_start: false,
        }
    }

    pub fn variant(&self) -> Variant {
        self.variant
    }

    pub fn player_id(&self) -> u8 {
        self.state.player_id()
    }

    pub fn state(&self) -> &PlayerState {
        &self.state
    }

    pub fn provider(&self) -> &EngineProvider {
        &self.provider
    }

    pub fn take_flags(&mut self) -> EngineFlags {
        self.provider.take_flags()
    }

    /// Applies `events` in order and answers for the last one. Sync events
    /// still update state, but the engine answers without a real query.
    pub fn react(&mut self, events: &[Event]) -> Result<Response> {
        let mut cans = Default::default();
        for event in events {
            if let EventBody::StartGame { .. } = event.body {
                self.game_start = true;
            }
            cans = self
                .state
                .update(&event.body)
                .with_context(|| format!("failed to apply {}", event.kind()))?;
        }
        let Some(last) = events.last() else {
            return Ok(Response::none());
        };
        if !cans.can_act() {
            return Ok(Response::none());
        }

        let sync = last.is_sync();
        if sync {
            self.provider.set_sync_mode(true);
        }
        let decided = self.decide();
        if sync {
            self.provider.set_sync_mode(false);
        }
        decided
    }

    fn decide(&mut self) -> Result<Response> {
        let mask = self.state.legal_mask(self.variant);
        ensure!(mask.iter().any(|&b| b), "no legal action: {}", self.state.brief_info());
        let obs = self.encoder.encode(&self.state).to_vec();
        let result = self.provider.react_batch(&[obs], std::slice::from_ref(&mask))?;

        let (action, q, honored, is_greedy) = match (
            result.actions.first(),
            result.q_out.first(),
            result.masks.first(),
            result.is_greedy.first(),
        ) {
            (Some(&a), Some(q), Some(m), Some(&g)) => (a, q, m, g),
            _ => anyhow::bail!("engine returned an empty batch"),
        };
        let kind = self
            .variant
            .kind_at(action)
            .with_context(|| format!("action index {action} outside {:?}", self.variant))?;
        let event = self.kind_to_event(kind)?;
        log::debug!(
            "seat {} chose {} -> {}",
            self.state.player_id(),
            self.variant.labels()[action],
            event.kind()
        );

        let mask_bits = mask_to_bits(honored);
        let game_start = std::mem::take(&mut self.game_start);
        // a forced single choice in 3p carries no useful scores
        if self.variant.is_3p() && mask_bits.count_ones() <= 1 {
            return Ok(Response::action(event));
        }
        let q_values = q
            .iter()
            .zip(honored)
            .filter(|&(_, &legal)| legal)
            .map(|(&v, _)| v)
            .collect();
        Ok(Response::action(event).with_meta(Meta {
            q_values,
            mask_bits,
            is_greedy,
            engine_type: self.provider.active(),
            circuit_open: self.provider.circuit_open(),
            is_fallback: self.provider.is_fallback(),
            game_start,
        }))
    }

    fn kind_to_event(&self, kind: ActionKind) -> Result<EventBody> {
        let state = &self.state;
        let actor = state.player_id();
        let cans = state.last_cans();
        let last_kawa = || state.last_kawa_tile().context("invalid state: no last kawa tile");

        let event = match kind {
            ActionKind::Discard(pai) => {
                ensure!(cans.can_discard, "failed discard check: {}", state.brief_info());
                EventBody::Dahai {
                    actor,
                    pai,
                    tsumogiri: state.last_self_tsumo() == Some(pai),
                }
            }
            ActionKind::Riichi => {
                ensure!(cans.can_riichi, "failed riichi check: {}", state.brief_info());
                EventBody::Reach { actor }
            }
            ActionKind::ChiLow | ActionKind::ChiMid | ActionKind::ChiHigh => {
                let consumed = state
                    .chi_consumed(kind)
                    .with_context(|| format!("failed {kind:?} check: {}", state.brief_info()))?;
                EventBody::Chi {
                    actor,
                    target: cans.target_actor,
                    pai: last_kawa()?,
                    consumed: consumed.to_vec(),
                }
            }
            ActionKind::Pon => {
                ensure!(cans.can_pon, "failed pon check: {}", state.brief_info());
                EventBody::Pon {
                    actor,
                    target: cans.target_actor,
                    pai: last_kawa()?,
                    consumed: state.pon_consumed(2).context("pon tiles missing from hand")?,
                }
            }
            ActionKind::KanSelect => self.kan_event()?,
            ActionKind::Nukidora => {
                ensure!(cans.can_nukidora, "failed nukidora check: {}", state.brief_info());
                EventBody::Nukidora {
                    actor,
                    pai: Tile::new(NORTH).context("north tile")?,
                }
            }
            ActionKind::Hora => {
                ensure!(cans.can_agari(), "failed hora check: {}", state.brief_info());
                let pai = if cans.can_tsumo_agari {
                    state.last_self_tsumo()
                } else {
                    state.last_kawa_tile()
                };
                EventBody::Hora {
                    actor,
                    target: cans.target_actor,
                    pai,
                    deltas: None,
                    scores: None,
                }
            }
            ActionKind::Ryukyoku => {
                ensure!(cans.can_ryukyoku, "failed ryukyoku check: {}", state.brief_info());
                EventBody::Ryukyoku {
                    deltas: None,
                    scores: None,
                }
            }
            ActionKind::Pass => EventBody::None,
        };
        Ok(event)
    }

    /// Kan choice: an open kan on the discard first, then the first
    /// concealed kan, then the first added kan.
    fn kan_event(&self) -> Result<EventBody> {
        let state = &self.state;
        let actor = state.player_id();
        let cans = state.last_cans();
        ensure!(cans.can_kan(), "failed kan check: {}", state.brief_info());

        if cans.can_daiminkan {
            return Ok(EventBody::Daiminkan {
                actor,
                target: cans.target_actor,
                pai: state.last_kawa_tile().context("invalid state: no last kawa tile")?,
                consumed: state.pon_consumed(3).context("kan tiles missing from hand")?,
            });
        }
        if let Some(&tile) = state.ankan_candidates().first() {
            return Ok(EventBody::Ankan {
                actor,
                consumed: state.ankan_consumed(tile),
            });
        }
        let tile = *state
            .kakan_candidates()
            .first()
            .context("kan selected without candidates")?;
        let pon = state
            .fuuro(actor)
            .iter()
            .find(|f| {
                f.kind == FuuroKind::Pon && f.tiles.first().is_some_and(|t| t.same_kind(tile))
            })
            .context("kakan without a matching pon")?;
        let slot = tile.tile_type().map(|ty| ty / 9);
        let pai = match slot {
            Some(s) if s < 3 && tile.number() == Some(5) && state.akas_in_hand()[s] => {
                tile.akaize()
            }
            _ => tile,
        };
        Ok(EventBody::Kakan {
            actor,
            pai,
            consumed: pon.tiles.iter().copied().take(3).collect(),
        })
    }
}
