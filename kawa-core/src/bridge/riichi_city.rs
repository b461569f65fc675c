//! Riichi City bridge.
//!
//! Players are identified by user id; the seat order is the room's player
//! list rotated so that the first dealer sits at 0. A login frame carries
//! our own user id before any room traffic.

use serde::Deserialize;
use serde_json::Value;

use super::hand::PrivateHand;
use super::{ankan_consumed, kakan_consumed, tehais_with, Bridge, Platform, TEHAI_SIZE};
use crate::codec::riichi_city::RcFrame;
use crate::errors::{KawaError, KawaResult};
use crate::event::{Event, EventBody};
use crate::tile::Tile;

/// Move position the client reports for the drawn tile.
const TSUMO_POS: u32 = 14;
const EMPTY_SEAT: i64 = -1;

// ---------------------------------------------------------------------------
// Action codes
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum RcAction {
    Chi,
    Pon,
    Daiminkan,
    Ankan,
    Kakan,
    Discard,
    Nukidora,
    /// Tsumo win, ron, abortive draw.
    RoundEnd,
}

impl RcAction {
    fn from_code(code: u32) -> Option<Self> {
        Some(match code {
            2..=4 => RcAction::Chi,
            5 => RcAction::Pon,
            6 => RcAction::Daiminkan,
            7 => RcAction::Ankan,
            8 => RcAction::Kakan,
            9 => RcAction::Discard,
            10 => RcAction::Nukidora,
            11..=13 => RcAction::RoundEnd,
            _ => return None,
        })
    }
}

// ---------------------------------------------------------------------------
// Payload shapes
// ---------------------------------------------------------------------------

#[derive(Deserialize)]
struct EnterRoom {
    players: Vec<RoomPlayer>,
    options: RoomOptions,
}

#[derive(Deserialize)]
struct RoomPlayer {
    user: RoomUser,
}

#[derive(Deserialize)]
struct RoomUser {
    user_id: i64,
}

#[derive(Deserialize)]
struct RoomOptions {
    #[serde(default)]
    classify_id: Option<i64>,
    player_count: usize,
}

#[derive(Deserialize)]
struct GameStart {
    quan_feng: i64,
    bao_pai_card: i64,
    dealer_pos: usize,
    #[serde(default)]
    ben_chang_num: u8,
    #[serde(default)]
    li_zhi_bang_num: u8,
    #[serde(default)]
    user_info_list: Vec<UserInfo>,
    #[serde(default)]
    hand_cards: Vec<i64>,
}

#[derive(Deserialize)]
struct UserInfo {
    hand_points: i32,
}

#[derive(Deserialize)]
struct InCard {
    user_id: i64,
    #[serde(default)]
    card: i64,
}

#[derive(Deserialize)]
struct GameActionBrc {
    #[serde(default)]
    action_info: Vec<ActionInfo>,
}

#[derive(Deserialize)]
struct ActionInfo {
    action: u32,
    user_id: i64,
    #[serde(default)]
    card: i64,
    #[serde(default)]
    group_cards: Vec<i64>,
    #[serde(default)]
    move_cards_pos: Vec<u32>,
    #[serde(default)]
    is_li_zhi: bool,
}

#[derive(Deserialize)]
struct CurrentAction {
    #[serde(default)]
    in_card: i64,
}

#[derive(Deserialize)]
struct GangBao {
    #[serde(default)]
    cards: Vec<i64>,
}

fn payload<'a, T: Deserialize<'a>>(data: &'a Value, what: &str) -> KawaResult<T> {
    T::deserialize(data).map_err(|e| KawaError::parse(what, e.to_string()))
}

fn card(code: i64) -> Tile {
    Tile::from_riichi_city(code)
}

// ---------------------------------------------------------------------------
// Bridge
// ---------------------------------------------------------------------------

#[derive(Debug, Default)]
struct RcState {
    seat: Option<u8>,
    is_3p: bool,
    players: Vec<i64>,
    /// Dealer position of the first round, the rotation base.
    shift: usize,
    awaiting_first_round: bool,
    classify_id: Option<i64>,
    hand: PrivateHand,
    last_dahai_actor: Option<u8>,
    pending_doras: Vec<Tile>,
    accept_reach: Option<Event>,
    game_ended: bool,
}

#[derive(Debug)]
pub struct RiichiCityBridge {
    uid: Option<i64>,
    state: RcState,
}

impl Default for RiichiCityBridge {
    fn default() -> Self {
        Self::new()
    }
}

impl RiichiCityBridge {
    pub fn new() -> Self {
        Self {
            uid: None,
            state: RcState::default(),
        }
    }

    pub fn uid(&self) -> Option<i64> {
        self.uid
    }

    pub fn hand(&self) -> &PrivateHand {
        &self.state.hand
    }

    /// Translates one decoded frame.
    pub fn handle(&mut self, frame: &RcFrame) -> KawaResult<Vec<Event>> {
        if frame.is_login() {
            let uid = frame
                .data
                .get("uid")
                .and_then(Value::as_i64)
                .ok_or_else(|| KawaError::parse(frame.data.to_string(), "login without uid"))?;
            log::info!("riichi city: logged in as {uid}");
            self.uid = Some(uid);
            return Ok(Vec::new());
        }
        let Some(cmd) = frame.cmd() else {
            return Ok(Vec::new());
        };
        let data = &frame.data["data"];
        match cmd {
            "cmd_enter_room" => self.enter_room(data),
            "cmd_game_start" => self.game_start(data),
            "cmd_in_card_brc" => self.in_card(data),
            "cmd_game_action_brc" => self.game_action(data),
            "cmd_send_current_action" => self.current_action(data),
            "cmd_gang_bao_brc" => {
                let bao: GangBao = payload(data, "cmd_gang_bao_brc")?;
                if let Some(&last) = bao.cards.last() {
                    self.state.pending_doras.push(card(last));
                }
                Ok(Vec::new())
            }
            "cmd_room_end" => {
                self.state = RcState {
                    game_ended: true,
                    ..RcState::default()
                };
                Ok(vec![EventBody::EndGame.into()])
            }
            _ => Ok(Vec::new()),
        }
    }

    fn seat_of(&self, user_id: i64) -> KawaResult<u8> {
        self.state
            .players
            .iter()
            .position(|&id| id == user_id)
            .map(|p| p as u8)
            .ok_or_else(|| KawaError::invalid_state(format!("user {user_id} is not seated")))
    }

    fn own_seat(&self) -> KawaResult<u8> {
        self.state
            .seat
            .ok_or_else(|| KawaError::invalid_state("seat not known yet"))
    }

    fn flush_accept(&mut self, out: &mut Vec<Event>) {
        if let Some(accept) = self.state.accept_reach.take() {
            out.push(accept);
        }
    }

    fn enter_room(&mut self, data: &Value) -> KawaResult<Vec<Event>> {
        let room: EnterRoom = payload(data, "cmd_enter_room")?;
        if room.options.classify_id.is_some() && self.state.classify_id == room.options.classify_id
        {
            log::warn!("riichi city: already in room {:?}", room.options.classify_id);
            return Ok(Vec::new());
        }
        self.state = RcState {
            is_3p: room.options.player_count == 3,
            players: room.players.iter().map(|p| p.user.user_id).collect(),
            classify_id: room.options.classify_id,
            awaiting_first_round: true,
            ..RcState::default()
        };
        log::info!("riichi city: entered room with players {:?}", self.state.players);
        Ok(Vec::new())
    }

    fn game_start(&mut self, data: &Value) -> KawaResult<Vec<Event>> {
        let start: GameStart = payload(data, "cmd_game_start")?;
        let mut out = Vec::new();
        let state = &mut self.state;

        if state.awaiting_first_round {
            let uid = self
                .uid
                .ok_or_else(|| KawaError::invalid_state("game start before login"))?;
            let n = state.players.len();
            if n == 0 {
                return Err(KawaError::invalid_state("game start without a room"));
            }
            state.players.rotate_left(start.dealer_pos % n);
            let seat = state
                .players
                .iter()
                .position(|&id| id == uid)
                .ok_or_else(|| KawaError::invalid_state(format!("user {uid} not in room")))?
                as u8;
            state.seat = Some(seat);
            state.shift = start.dealer_pos;
            if state.is_3p {
                state.players.push(EMPTY_SEAT);
            }
            state.awaiting_first_round = false;
            out.push(EventBody::StartGame { id: seat }.into());
        }
        let seat = state
            .seat
            .ok_or_else(|| KawaError::invalid_state("seat not known yet"))?;

        let seats = if state.is_3p { 3 } else { 4 };
        let oya = ((start.dealer_pos % seats + seats - state.shift % seats) % seats) as u8;

        let mut scores = [0; 4];
        for (slot, info) in scores.iter_mut().zip(&start.user_info_list) {
            *slot = info.hand_points;
        }
        if state.is_3p {
            scores[3] = 0;
        }

        let mut cards: Vec<Tile> = start.hand_cards.iter().map(|&c| card(c)).collect();
        let tsumo = if cards.len() > TEHAI_SIZE {
            cards.truncate(TEHAI_SIZE + 1);
            cards.pop()
        } else {
            None
        };
        state.hand.deal(cards, tsumo);
        state.pending_doras.clear();
        state.accept_reach = None;
        state.last_dahai_actor = None;

        out.push(
            EventBody::StartKyoku {
                bakaze: card(start.quan_feng),
                dora_marker: card(start.bao_pai_card),
                kyoku: oya + 1,
                honba: start.ben_chang_num,
                kyotaku: start.li_zhi_bang_num,
                oya,
                scores,
                tehais: tehais_with(seat, state.hand.tiles()),
                is_3p: state.is_3p,
            }
            .into(),
        );
        out.push(match tsumo {
            Some(pai) => EventBody::Tsumo { actor: seat, pai }.into(),
            None => EventBody::Tsumo {
                actor: oya,
                pai: Tile::UNKNOWN,
            }
            .into(),
        });
        Ok(out)
    }

    fn in_card(&mut self, data: &Value) -> KawaResult<Vec<Event>> {
        let draw: InCard = payload(data, "cmd_in_card_brc")?;
        let mut out = Vec::with_capacity(2);
        self.flush_accept(&mut out);
        let actor = self.seat_of(draw.user_id)?;
        let pai = card(draw.card);
        if Some(actor) == self.state.seat && !pai.is_unknown() {
            self.state.hand.draw(pai);
        }
        out.push(EventBody::Tsumo { actor, pai }.into());
        Ok(out)
    }

    /// Our own draw, announced together with the options it opens.
    fn current_action(&mut self, data: &Value) -> KawaResult<Vec<Event>> {
        let cur: CurrentAction = payload(data, "cmd_send_current_action")?;
        let mut out = Vec::with_capacity(2);
        self.flush_accept(&mut out);
        let pai = card(cur.in_card);
        if pai.is_unknown() {
            log::warn!("riichi city: current action without a drawn card");
            return Ok(out);
        }
        let seat = self.own_seat()?;
        if self.state.hand.tsumo() != Some(pai) {
            self.state.hand.draw(pai);
        }
        out.push(EventBody::Tsumo { actor: seat, pai }.into());
        Ok(out)
    }

    fn game_action(&mut self, data: &Value) -> KawaResult<Vec<Event>> {
        let brc: GameActionBrc = payload(data, "cmd_game_action_brc")?;
        let mut out = Vec::new();
        self.flush_accept(&mut out);
        for info in &brc.action_info {
            self.action(info, &mut out)?;
            if !out.is_empty() {
                break;
            }
        }
        Ok(out)
    }

    fn action(&mut self, info: &ActionInfo, out: &mut Vec<Event>) -> KawaResult<()> {
        let Some(kind) = RcAction::from_code(info.action) else {
            log::debug!("riichi city: skipping action code {}", info.action);
            return Ok(());
        };
        if kind == RcAction::RoundEnd {
            out.push(EventBody::EndKyoku.into());
            return Ok(());
        }

        let actor = self.seat_of(info.user_id)?;
        let own = Some(actor) == self.state.seat;
        let pai = card(info.card);
        let group = || info.group_cards.iter().map(|&c| card(c)).collect::<Vec<_>>();

        match kind {
            RcAction::Chi | RcAction::Pon | RcAction::Daiminkan => {
                let consumed = group();
                if own {
                    self.state.hand.call(&consumed);
                }
                let body = if kind == RcAction::Chi {
                    EventBody::Chi {
                        actor,
                        target: (actor + 3) % 4,
                        pai,
                        consumed,
                    }
                } else {
                    let target = self.state.last_dahai_actor.ok_or_else(|| {
                        KawaError::invalid_state("call before any discard this round")
                    })?;
                    if kind == RcAction::Pon {
                        EventBody::Pon {
                            actor,
                            target,
                            pai,
                            consumed,
                        }
                    } else {
                        EventBody::Daiminkan {
                            actor,
                            target,
                            pai,
                            consumed,
                        }
                    }
                };
                out.push(body.into());
            }
            RcAction::Ankan => {
                let consumed = ankan_consumed(pai);
                if own {
                    self.state.hand.call(&consumed);
                }
                out.push(EventBody::Ankan { actor, consumed }.into());
            }
            RcAction::Kakan => {
                if own {
                    self.state.hand.kakan(pai);
                }
                out.push(
                    EventBody::Kakan {
                        actor,
                        pai,
                        consumed: kakan_consumed(pai),
                    }
                    .into(),
                );
            }
            RcAction::Discard => {
                let tsumogiri = info.move_cards_pos.first().map_or(true, |&p| p == TSUMO_POS);
                if info.is_li_zhi {
                    out.push(EventBody::Reach { actor }.into());
                }
                out.push(
                    EventBody::Dahai {
                        actor,
                        pai,
                        tsumogiri,
                    }
                    .into(),
                );
                if own {
                    self.state.hand.discard(pai, tsumogiri);
                }
                self.state.last_dahai_actor = Some(actor);
                if info.is_li_zhi {
                    self.state.accept_reach = Some(
                        EventBody::ReachAccepted {
                            actor,
                            deltas: None,
                            scores: None,
                        }
                        .into(),
                    );
                }
                // kan indicators are revealed after the replacement discard
                out.extend(
                    self.state
                        .pending_doras
                        .drain(..)
                        .map(|dora_marker| Event::from(EventBody::Dora { dora_marker })),
                );
            }
            RcAction::Nukidora => {
                if own {
                    self.state.hand.nukidora();
                }
                out.push(
                    EventBody::Nukidora {
                        actor,
                        pai: Tile::NORTH,
                    }
                    .into(),
                );
            }
            RcAction::RoundEnd => {}
        }
        Ok(())
    }
}

impl Bridge for RiichiCityBridge {
    fn platform(&self) -> Platform {
        Platform::RiichiCity
    }

    fn parse(&mut self, raw: &[u8]) -> Option<Vec<Event>> {
        let frame = match RcFrame::parse(raw) {
            Ok(frame) => frame,
            Err(e) => {
                log::warn!("riichi city: dropping frame: {e}");
                return None;
            }
        };
        match self.handle(&frame) {
            Ok(events) => Some(events),
            Err(e) => {
                log::warn!("riichi city: {:?} not applied: {e}", frame.cmd());
                None
            }
        }
    }

    fn reset(&mut self) {
        self.state = RcState::default();
    }

    fn game_ended(&self) -> bool {
        self.state.game_ended
    }

    fn seat(&self) -> Option<u8> {
        self.state.seat
    }
}
