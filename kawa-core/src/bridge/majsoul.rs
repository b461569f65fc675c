//! Majsoul bridge.
//!
//! Live play arrives as `.lq.ActionPrototype` notifications; the game
//! session itself (seat, mode) comes from the `authGame` request/response
//! pair. Reconnects replay the round through `syncGame`/`enterGame`
//! responses carrying a backlog of actions plus a snapshot.

use std::sync::Arc;

use serde::Deserialize;
use serde_json::Value;

use super::hand::PrivateHand;
use super::{
    ankan_consumed, bakaze, kakan_consumed, scores4, tehais_with, unknown_hand, Bridge, Platform,
    TEHAI_SIZE,
};
use crate::codec::liqi::{LiqiCodec, LiqiMessage, MsgKind};
use crate::codec::protobuf::SchemaRegistry;
use crate::errors::{KawaError, KawaResult};
use crate::event::{Event, EventBody};
use crate::tile::Tile;

pub const GAME_SYNCING: &str = "game_syncing";

const METHOD_AUTH: &str = ".lq.FastTest.authGame";
const METHOD_SYNC: &str = ".lq.FastTest.syncGame";
const METHOD_ENTER: &str = ".lq.FastTest.enterGame";
const NOTIFY_ACTION: &str = ".lq.ActionPrototype";
const NOTIFY_END: &str = ".lq.NotifyGameEndResult";
const NOTIFY_TERMINATE: &str = ".lq.NotifyGameTerminate";

const CPG_CHI: u32 = 0;
const CPG_PON: u32 = 1;
const CPG_GANG: u32 = 2;
const KAN_ADD: u32 = 2;
const KAN_CONCEALED: u32 = 3;

const START_SCORE_4P: i32 = 25000;
const START_SCORE_3P: i32 = 35000;

// ---------------------------------------------------------------------------
// Payload shapes
// ---------------------------------------------------------------------------

#[derive(Deserialize)]
struct AuthReq {
    account_id: u64,
}

#[derive(Deserialize)]
struct AuthRes {
    #[serde(default)]
    seat_list: Vec<u64>,
}

#[derive(Deserialize)]
struct NewRound {
    chang: usize,
    ju: u8,
    ben: u8,
    #[serde(default)]
    tiles: Vec<String>,
    #[serde(default)]
    dora: String,
    #[serde(default)]
    doras: Vec<String>,
    #[serde(default)]
    scores: Vec<i32>,
    #[serde(default)]
    liqibang: u8,
}

#[derive(Deserialize)]
struct DealTile {
    seat: u8,
    #[serde(default)]
    tile: String,
}

#[derive(Deserialize)]
struct DiscardTile {
    seat: u8,
    tile: String,
    #[serde(default)]
    is_liqi: bool,
    #[serde(default)]
    is_wliqi: bool,
    #[serde(default)]
    moqie: bool,
}

#[derive(Deserialize)]
struct ChiPengGang {
    seat: u8,
    #[serde(rename = "type")]
    kind: u32,
    tiles: Vec<String>,
    froms: Vec<u8>,
}

#[derive(Deserialize)]
struct AnGangAddGang {
    seat: u8,
    #[serde(rename = "type")]
    kind: u32,
    tiles: String,
}

#[derive(Deserialize)]
struct BaBei {
    seat: u8,
}

#[derive(Deserialize)]
struct Snapshot {
    #[serde(default)]
    chang: usize,
    #[serde(default)]
    ju: u8,
    #[serde(default)]
    ben: u8,
    #[serde(default)]
    liqibang: u8,
    #[serde(default)]
    hands: Vec<String>,
    #[serde(default)]
    doras: Vec<String>,
    #[serde(default)]
    players: Vec<PlayerSnapshot>,
}

#[derive(Deserialize)]
struct PlayerSnapshot {
    #[serde(default)]
    score: Option<i32>,
}

fn payload<'a, T: Deserialize<'a>>(data: &'a Value, what: &str) -> KawaResult<T> {
    T::deserialize(data).map_err(|e| KawaError::parse(what, e.to_string()))
}

fn ms_tile(code: &str) -> Tile {
    Tile::from_majsoul(code).unwrap_or_else(|| {
        if !code.is_empty() {
            log::warn!("unknown majsoul tile code {code:?}");
        }
        Tile::UNKNOWN
    })
}

// ---------------------------------------------------------------------------
// Bridge
// ---------------------------------------------------------------------------

#[derive(Debug, Default)]
struct MajsoulState {
    account_id: u64,
    seat: u8,
    seated: bool,
    is_3p: bool,
    hand: PrivateHand,
    dora_count: usize,
    accept_reach: Option<Event>,
    game_ended: bool,
}

pub struct MajsoulBridge {
    codec: LiqiCodec,
    state: MajsoulState,
}

impl MajsoulBridge {
    /// Bridge using the bundled schema.
    pub fn new() -> KawaResult<Self> {
        Ok(Self::with_registry(SchemaRegistry::bundled()?))
    }

    pub fn with_registry(registry: Arc<SchemaRegistry>) -> Self {
        Self {
            codec: LiqiCodec::new(registry),
            state: MajsoulState::default(),
        }
    }

    pub fn hand(&self) -> &PrivateHand {
        &self.state.hand
    }

    pub fn is_3p(&self) -> bool {
        self.state.is_3p
    }

    /// Translates an already-decoded liqi message.
    pub fn handle(&mut self, msg: &LiqiMessage) -> KawaResult<Vec<Event>> {
        match (msg.method.as_str(), msg.kind) {
            (METHOD_AUTH, MsgKind::Request) => {
                let req: AuthReq = payload(&msg.data, "ReqAuthGame")?;
                self.state = MajsoulState {
                    account_id: req.account_id,
                    ..MajsoulState::default()
                };
                Ok(Vec::new())
            }
            (METHOD_AUTH, MsgKind::Response) => self.auth_response(&msg.data),
            (METHOD_SYNC, MsgKind::Response) => self.resync(&msg.data, true),
            (METHOD_ENTER, MsgKind::Response) => self.resync(&msg.data, false),
            (NOTIFY_ACTION, MsgKind::Notify) => self.action(&msg.data),
            (NOTIFY_END | NOTIFY_TERMINATE, MsgKind::Notify) => {
                self.state.game_ended = true;
                Ok(vec![EventBody::EndGame.into()])
            }
            _ => Ok(Vec::new()),
        }
    }

    fn auth_response(&mut self, data: &Value) -> KawaResult<Vec<Event>> {
        let res: AuthRes = payload(data, "ResAuthGame")?;
        let state = &mut self.state;
        state.is_3p = res.seat_list.len() == 3;
        let seat = res
            .seat_list
            .iter()
            .position(|&id| id == state.account_id)
            .ok_or_else(|| {
                KawaError::invalid_state(format!(
                    "account {} not in seat list {:?}",
                    state.account_id, res.seat_list
                ))
            })?;
        state.seat = seat as u8;
        state.seated = true;
        log::info!("majsoul: seated at {seat}, 3p={}", state.is_3p);
        Ok(vec![EventBody::StartGame { id: state.seat }.into()])
    }

    // -- actions ----------------------------------------------------------

    /// `action` is an unwrapped `ActionPrototype`: `{name, step, data}`.
    fn action(&mut self, action: &Value) -> KawaResult<Vec<Event>> {
        let name = action.get("name").and_then(Value::as_str).unwrap_or_default();
        let data = &action["data"];
        let mut out = Vec::new();

        if name == "ActionNewRound" {
            out.extend(self.new_round(data)?);
        }
        if matches!(name, "ActionHule" | "ActionNoTile" | "ActionLiuJu") {
            // the pending riichi never gets its deposit accepted
            self.state.accept_reach = None;
            return Ok(vec![EventBody::EndKyoku.into()]);
        }
        if let Some(accept) = self.state.accept_reach.take() {
            out.push(accept);
        }
        out.extend(self.dora_update(data));

        match name {
            "ActionDealTile" => out.extend(self.deal_tile(data)?),
            "ActionDiscardTile" => out.extend(self.discard(data)?),
            "ActionChiPengGang" => out.extend(self.chi_peng_gang(data)?),
            "ActionAnGangAddGang" => out.extend(self.an_gang_add_gang(data)?),
            "ActionBaBei" => out.extend(self.ba_bei(data)?),
            _ => {}
        }
        Ok(out)
    }

    fn new_round(&mut self, data: &Value) -> KawaResult<Vec<Event>> {
        let round: NewRound = payload(data, "ActionNewRound")?;
        let state = &mut self.state;

        let dora_code = round.doras.first().unwrap_or(&round.dora);
        let dora_marker = ms_tile(dora_code);
        state.dora_count = 1;

        let tiles: Vec<Tile> = round.tiles.iter().map(|c| ms_tile(c)).collect();
        let tsumo = match tiles.len() {
            TEHAI_SIZE => {
                state.hand.deal(tiles, None);
                None
            }
            14 => state.hand.deal_split(tiles),
            n => {
                return Err(KawaError::invalid_state(format!(
                    "ActionNewRound with {n} tiles"
                )));
            }
        };

        let mut out = vec![Event::from(EventBody::StartKyoku {
            bakaze: bakaze(round.chang),
            dora_marker,
            kyoku: round.ju + 1,
            honba: round.ben,
            kyotaku: round.liqibang,
            oya: round.ju,
            scores: scores4(&round.scores),
            tehais: tehais_with(state.seat, state.hand.tiles()),
            is_3p: state.is_3p,
        })];
        if let Some(pai) = tsumo {
            out.push(
                EventBody::Tsumo {
                    actor: state.seat,
                    pai,
                }
                .into(),
            );
        }
        Ok(out)
    }

    fn dora_update(&mut self, data: &Value) -> Option<Event> {
        let doras = data.get("doras")?.as_array()?;
        if doras.len() <= self.state.dora_count {
            return None;
        }
        self.state.dora_count = doras.len();
        let marker = ms_tile(doras.last()?.as_str()?);
        Some(
            EventBody::Dora {
                dora_marker: marker,
            }
            .into(),
        )
    }

    fn deal_tile(&mut self, data: &Value) -> KawaResult<Vec<Event>> {
        let deal: DealTile = payload(data, "ActionDealTile")?;
        let pai = ms_tile(&deal.tile);
        if deal.seat == self.state.seat && !pai.is_unknown() {
            self.state.hand.draw(pai);
        }
        Ok(vec![EventBody::Tsumo {
            actor: deal.seat,
            pai,
        }
        .into()])
    }

    fn discard(&mut self, data: &Value) -> KawaResult<Vec<Event>> {
        let d: DiscardTile = payload(data, "ActionDiscardTile")?;
        let pai = ms_tile(&d.tile);
        let riichi = d.is_liqi || d.is_wliqi;
        let mut out = Vec::with_capacity(2);
        if riichi {
            out.push(EventBody::Reach { actor: d.seat }.into());
        }
        out.push(
            EventBody::Dahai {
                actor: d.seat,
                pai,
                tsumogiri: d.moqie,
            }
            .into(),
        );
        if d.seat == self.state.seat {
            self.state.hand.discard(pai, d.moqie);
        }
        if riichi {
            self.state.accept_reach = Some(
                EventBody::ReachAccepted {
                    actor: d.seat,
                    deltas: None,
                    scores: None,
                }
                .into(),
            );
        }
        Ok(out)
    }

    fn chi_peng_gang(&mut self, data: &Value) -> KawaResult<Vec<Event>> {
        let cpg: ChiPengGang = payload(data, "ActionChiPengGang")?;
        let actor = cpg.seat;
        let mut target = None;
        let mut pai = Tile::UNKNOWN;
        let mut consumed = Vec::with_capacity(3);
        for (code, &from) in cpg.tiles.iter().zip(&cpg.froms) {
            if from == actor {
                consumed.push(ms_tile(code));
            } else {
                target = Some(from);
                pai = ms_tile(code);
            }
        }
        let Some(target) = target else {
            return Err(KawaError::invalid_state("call without a source seat"));
        };

        let expected = match cpg.kind {
            CPG_CHI | CPG_PON => 2,
            CPG_GANG => 3,
            other => {
                log::warn!("unknown ActionChiPengGang type {other}");
                return Ok(Vec::new());
            }
        };
        if consumed.len() != expected {
            return Err(KawaError::invalid_state(format!(
                "call consumed {} tiles, expected {expected}",
                consumed.len()
            )));
        }

        if actor == self.state.seat {
            self.state.hand.call(&consumed);
        }
        let body = match cpg.kind {
            CPG_CHI => EventBody::Chi {
                actor,
                target,
                pai,
                consumed,
            },
            CPG_PON => EventBody::Pon {
                actor,
                target,
                pai,
                consumed,
            },
            _ => EventBody::Daiminkan {
                actor,
                target,
                pai,
                consumed,
            },
        };
        Ok(vec![body.into()])
    }

    fn an_gang_add_gang(&mut self, data: &Value) -> KawaResult<Vec<Event>> {
        let kan: AnGangAddGang = payload(data, "ActionAnGangAddGang")?;
        let actor = kan.seat;
        let pai = ms_tile(&kan.tiles);
        let own = actor == self.state.seat;
        let body = match kan.kind {
            KAN_CONCEALED => {
                let consumed = ankan_consumed(pai);
                if own {
                    self.state.hand.call(&consumed);
                }
                EventBody::Ankan { actor, consumed }
            }
            KAN_ADD => {
                if own {
                    self.state.hand.kakan(pai);
                }
                EventBody::Kakan {
                    actor,
                    pai,
                    consumed: kakan_consumed(pai),
                }
            }
            other => {
                log::warn!("unknown ActionAnGangAddGang type {other}");
                return Ok(Vec::new());
            }
        };
        Ok(vec![body.into()])
    }

    fn ba_bei(&mut self, data: &Value) -> KawaResult<Vec<Event>> {
        let b: BaBei = payload(data, "ActionBaBei")?;
        if b.seat == self.state.seat {
            self.state.hand.nukidora();
        }
        Ok(vec![EventBody::Nukidora {
            actor: b.seat,
            pai: Tile::NORTH,
        }
        .into()])
    }

    // -- resync -----------------------------------------------------------

    /// Replays a `syncGame` (`live_tail`) or `enterGame` restore. With
    /// `live_tail` the final backlog action is left unflagged so it can
    /// still drive one recommendation.
    fn resync(&mut self, data: &Value, live_tail: bool) -> KawaResult<Vec<Event>> {
        let mut out: Vec<Event> = Vec::new();
        if live_tail {
            out.push(Event::system(GAME_SYNCING));
        }
        let restore = &data["game_restore"];
        if restore.is_null() {
            return Ok(out);
        }

        let actions = restore
            .get("actions")
            .and_then(Value::as_array)
            .map(Vec::as_slice)
            .unwrap_or_default();
        let n = actions.len();
        let mut replayed = 0usize;
        for (i, raw) in actions.iter().enumerate() {
            let inner = match self.codec.unwrap_action(raw, false) {
                Ok(Some(inner)) => inner,
                Ok(None) => continue,
                Err(e) => {
                    log::warn!("majsoul resync: skipping undecodable action {i}: {e}");
                    continue;
                }
            };
            let events = match self.action(&inner) {
                Ok(events) => events,
                Err(e) => {
                    log::warn!("majsoul resync: action {i} failed: {e}");
                    continue;
                }
            };
            let synthetic = !(live_tail && i + 1 == n);
            out.extend(
                events
                    .into_iter()
                    .map(|e| if synthetic { e.synthetic() } else { e }),
            );
            replayed += 1;
        }

        let has_start = out
            .iter()
            .any(|e| matches!(e.body, EventBody::StartKyoku { .. }));
        let snapshot = &restore["snapshot"];
        if !has_start && !snapshot.is_null() {
            log::info!("majsoul resync: no round start in backlog, rebuilding from snapshot");
            let recovered = self.snapshot_events(snapshot)?;
            let flag = !live_tail || n > 0;
            let recovered = recovered
                .into_iter()
                .map(|e| if flag { e.synthetic() } else { e });
            let at = usize::from(live_tail);
            out.splice(at..at, recovered);
        }
        log::debug!("majsoul resync: {replayed}/{n} actions replayed");
        Ok(out)
    }

    fn snapshot_events(&mut self, snapshot: &Value) -> KawaResult<Vec<Event>> {
        let snap: Snapshot = payload(snapshot, "GameSnapshot")?;
        let state = &mut self.state;
        if snap.players.len() == 3 {
            state.is_3p = true;
        }

        let mut scores = if state.is_3p {
            [START_SCORE_3P, START_SCORE_3P, START_SCORE_3P, 0]
        } else {
            [START_SCORE_4P; 4]
        };
        for (slot, p) in scores.iter_mut().zip(&snap.players) {
            if let Some(score) = p.score {
                *slot = score;
            }
        }
        if state.is_3p {
            scores[3] = 0;
        }

        state.dora_count = snap.doras.len().min(1);
        let dora_marker = snap
            .doras
            .first()
            .map(|c| ms_tile(c))
            .unwrap_or(Tile::UNKNOWN);

        let mut tiles: Vec<Tile> = snap.hands.iter().map(|c| ms_tile(c)).collect();
        let tsumo = if tiles.len() > TEHAI_SIZE {
            tiles.pop()
        } else {
            None
        };
        if tiles.len() == TEHAI_SIZE {
            state.hand.deal(tiles, tsumo);
        } else {
            log::warn!("majsoul snapshot hand has {} tiles", tiles.len());
            state.hand.deal(unknown_hand(), None);
        }

        let mut out = vec![Event::from(EventBody::StartKyoku {
            bakaze: bakaze(snap.chang),
            dora_marker,
            kyoku: snap.ju + 1,
            honba: snap.ben,
            kyotaku: snap.liqibang,
            oya: snap.ju,
            scores,
            tehais: tehais_with(state.seat, state.hand.tiles()),
            is_3p: state.is_3p,
        })];
        if let Some(pai) = state.hand.tsumo() {
            out.push(
                EventBody::Tsumo {
                    actor: state.seat,
                    pai,
                }
                .into(),
            );
        }
        Ok(out)
    }
}

impl Bridge for MajsoulBridge {
    fn platform(&self) -> Platform {
        Platform::Majsoul
    }

    fn parse(&mut self, raw: &[u8]) -> Option<Vec<Event>> {
        let msg = match self.codec.parse(raw) {
            Ok(Some(msg)) => msg,
            Ok(None) => return None,
            Err(e) => {
                log::warn!("majsoul: dropping frame: {e}");
                return None;
            }
        };
        log::trace!("majsoul <- {} {:?}", msg.method, msg.kind);
        match self.handle(&msg) {
            Ok(events) => Some(events),
            Err(e) => {
                log::warn!("majsoul: {} not applied: {e}", msg.method);
                None
            }
        }
    }

    fn reset(&mut self) {
        self.codec.reset();
        self.state = MajsoulState::default();
    }

    fn game_ended(&self) -> bool {
        self.state.game_ended
    }

    fn seat(&self) -> Option<u8> {
        self.state.seated.then_some(self.state.seat)
    }
}
