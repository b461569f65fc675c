//! Amatsuki bridge.
//!
//! Traffic is STOMP `MESSAGE` frames routed by destination. Only the desk
//! join callback has a fixed destination; the game topics end in a desk id
//! and are matched by prefix. A round start does not carry the dora
//! indicator, so the `start_kyoku` is held until the following dora sync.

use serde::Deserialize;
use serde_json::Value;

use super::{bakaze, kakan_consumed, scores4, Bridge, Platform, TEHAI_SIZE};
use crate::codec::stomp::{StompCommand, StompFrame};
use crate::errors::{KawaError, KawaResult};
use crate::event::{Event, EventBody};
use crate::tile::{sort_tiles, Tile};

pub const TOPIC_JOIN_DESK: &str = "/user/topic/callback/joinDesk";
pub const TOPIC_ROUND_START: &str = "/user/topic/desk/roundStart/";
pub const TOPIC_SYNC_DORA: &str = "/topic/desk/syncDora/";
pub const TOPIC_DRAW: &str = "/user/topic/desk/draw/";
pub const TOPIC_TEHAI_ACTION: &str = "/topic/desk/tehaiAction/";
pub const TOPIC_RIVER_ACTION: &str = "/topic/desk/riverAction/";
pub const TOPIC_RON_ACTION: &str = "/topic/desk/ronAction/";
pub const TOPIC_RYUUKYOKU_ACTION: &str = "/topic/desk/ryuukyokuAction/";
pub const TOPIC_GAME_END: &str = "/user/topic/desk/gameEnd/";

const GAME_TYPE_RIICHI: i64 = 0;
const HIDDEN_ID: i64 = -1;

// ---------------------------------------------------------------------------
// Payload shapes
// ---------------------------------------------------------------------------

#[derive(Deserialize)]
#[serde(rename_all = "camelCase")]
struct JoinDesk {
    status: i64,
    error_code: i64,
    game_type: i64,
    game_mode: i64,
    #[serde(default)]
    desk_id: Value,
}

#[derive(Deserialize, Clone, Copy)]
struct Hai {
    id: i64,
}

impl Hai {
    fn tile(self) -> Tile {
        amatsuki_tile(self.id)
    }
}

#[derive(Deserialize)]
#[serde(rename_all = "camelCase")]
struct RoundStart {
    bakaze: usize,
    honba: u8,
    oya: u8,
    player_points: Vec<i32>,
    player_tiles: Vec<PlayerTiles>,
}

#[derive(Deserialize)]
struct PlayerTiles {
    tehai: Tehai,
}

#[derive(Deserialize)]
struct Tehai {
    hand: Vec<Hai>,
}

#[derive(Deserialize)]
#[serde(rename_all = "camelCase")]
struct SyncDora {
    dora: Vec<Hai>,
    #[serde(default)]
    reach_count: u8,
}

#[derive(Deserialize)]
struct Draw {
    hai: Hai,
    position: u8,
}

#[derive(Deserialize)]
#[serde(rename_all = "camelCase")]
struct TehaiAction {
    action: String,
    hai_list: Vec<Hai>,
    #[serde(default)]
    is_kiri: bool,
    position: u8,
}

#[derive(Deserialize)]
struct RiverAction {
    action: String,
    menzu: Menzu,
    position: u8,
}

#[derive(Deserialize)]
#[serde(rename_all = "camelCase")]
struct Menzu {
    menzu_list: Vec<Hai>,
}

fn payload<T: for<'de> Deserialize<'de>>(body: &Value, what: &str) -> KawaResult<T> {
    T::deserialize(body).map_err(|e| KawaError::parse(what, e.to_string()))
}

/// Amatsuki tile ids follow the 136 layout.
fn amatsuki_tile(id: i64) -> Tile {
    Tile::from_136(id).unwrap_or_else(|| {
        log::warn!("amatsuki tile id {id} out of range");
        Tile::UNKNOWN
    })
}

// ---------------------------------------------------------------------------
// Bridge
// ---------------------------------------------------------------------------

#[derive(Debug, Default)]
struct AmatsukiState {
    /// Set once a riichi desk join succeeded; everything else is ignored until then.
    valid_flow: bool,
    desk_id: Option<String>,
    game_started: bool,
    game_ended: bool,
    seat: Option<u8>,
    is_3p: bool,
    pending_start: Option<EventBody>,
    accept_reach: Option<Event>,
    dora_count: usize,
    last_discard: Option<(u8, Tile)>,
    /// Our concealed tile ids.
    hand_ids: Vec<i64>,
}

#[derive(Debug, Default)]
pub struct AmatsukiBridge {
    state: AmatsukiState,
}

impl AmatsukiBridge {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn desk_id(&self) -> Option<&str> {
        self.state.desk_id.as_deref()
    }

    pub fn hand_ids(&self) -> &[i64] {
        &self.state.hand_ids
    }

    /// Translates one decoded frame. Frames other than `MESSAGE` and
    /// unknown destinations produce nothing.
    pub fn handle(&mut self, frame: &StompFrame) -> KawaResult<Vec<Event>> {
        if frame.command != StompCommand::Message {
            return Ok(Vec::new());
        }
        let Some(dest) = frame.destination() else {
            return Ok(Vec::new());
        };
        log::debug!("amatsuki <- {dest}");
        if dest == TOPIC_JOIN_DESK {
            let body = body_of(frame)?;
            self.join_desk(&body)?;
            return Ok(Vec::new());
        }
        if !self.state.valid_flow {
            return Ok(Vec::new());
        }
        let routes: [(&str, fn(&mut Self, &Value) -> KawaResult<Vec<Event>>); 8] = [
            (TOPIC_ROUND_START, Self::round_start),
            (TOPIC_SYNC_DORA, Self::sync_dora),
            (TOPIC_DRAW, Self::draw),
            (TOPIC_TEHAI_ACTION, Self::tehai_action),
            (TOPIC_RIVER_ACTION, Self::river_action),
            (TOPIC_RON_ACTION, Self::round_end),
            (TOPIC_RYUUKYOKU_ACTION, Self::round_end),
            (TOPIC_GAME_END, Self::game_end),
        ];
        match routes.iter().find(|(prefix, _)| dest.starts_with(prefix)) {
            Some((_, route)) => {
                let body = body_of(frame)?;
                route(self, &body)
            }
            None => Ok(Vec::new()),
        }
    }

    fn join_desk(&mut self, body: &Value) -> KawaResult<()> {
        let join: JoinDesk = payload(body, "joinDesk")?;
        if join.status != 0 || join.error_code != 0 {
            log::warn!(
                "amatsuki: desk join failed (status {}, error {})",
                join.status,
                join.error_code
            );
            return Ok(());
        }
        if join.game_type != GAME_TYPE_RIICHI {
            log::warn!("amatsuki: unsupported game type {}", join.game_type);
            return Ok(());
        }
        let is_3p = match join.game_mode {
            0 => false,
            1 => true,
            other => {
                log::warn!("amatsuki: unsupported game mode {other}");
                return Ok(());
            }
        };
        self.state.valid_flow = true;
        self.state.is_3p = is_3p;
        self.state.desk_id = match join.desk_id {
            Value::String(s) => Some(s),
            Value::Null => None,
            other => Some(other.to_string()),
        };
        log::info!("amatsuki: joined desk {:?}, 3p={is_3p}", self.state.desk_id);
        Ok(())
    }

    fn flush_accept(&mut self, out: &mut Vec<Event>) {
        if let Some(accept) = self.state.accept_reach.take() {
            out.push(accept);
        }
    }

    fn round_start(&mut self, body: &Value) -> KawaResult<Vec<Event>> {
        let start: RoundStart = payload(body, "roundStart")?;
        if start.oya >= 4 {
            return Err(KawaError::parse(body.to_string(), "dealer seat out of range"));
        }
        let mut tehais: Vec<Vec<Tile>> = Vec::with_capacity(4);
        for (idx, player) in start.player_tiles.iter().enumerate() {
            let hidden = player.tehai.hand.first().map_or(true, |h| h.id == HIDDEN_ID);
            if hidden {
                tehais.push(vec![Tile::UNKNOWN; TEHAI_SIZE]);
                continue;
            }
            self.state.seat = Some(idx as u8);
            self.state.hand_ids = player.tehai.hand.iter().map(|h| h.id).collect();
            let mut own: Vec<Tile> = player.tehai.hand.iter().map(|h| h.tile()).collect();
            sort_tiles(&mut own);
            tehais.push(own);
        }
        while tehais.len() < 4 {
            tehais.push(vec![Tile::UNKNOWN; TEHAI_SIZE]);
        }
        let seat = self
            .state
            .seat
            .ok_or_else(|| KawaError::invalid_state("round start without our hand"))?;
        let tehais: [Vec<Tile>; 4] = tehais
            .try_into()
            .map_err(|_| KawaError::invalid_state("more than four hands in round start"))?;

        self.state.dora_count = 1;
        self.state.last_discard = None;
        self.state.accept_reach = None;
        self.state.pending_start = Some(EventBody::StartKyoku {
            bakaze: bakaze(start.bakaze),
            dora_marker: Tile::UNKNOWN,
            kyoku: start.oya + 1,
            honba: start.honba,
            kyotaku: 0,
            oya: start.oya,
            scores: scores4(&start.player_points),
            tehais,
            is_3p: self.state.is_3p,
        });
        if self.state.game_started {
            return Ok(Vec::new());
        }
        self.state.game_started = true;
        Ok(vec![EventBody::StartGame { id: seat }.into()])
    }

    fn sync_dora(&mut self, body: &Value) -> KawaResult<Vec<Event>> {
        let sync: SyncDora = payload(body, "syncDora")?;
        if let Some(mut start) = self.state.pending_start.take() {
            if let EventBody::StartKyoku {
                dora_marker,
                kyotaku,
                ..
            } = &mut start
            {
                *dora_marker = sync.dora.first().map_or(Tile::UNKNOWN, |h| h.tile());
                *kyotaku = sync.reach_count;
            }
            return Ok(vec![start.into()]);
        }
        if sync.dora.len() > self.state.dora_count {
            self.state.dora_count = sync.dora.len();
            if let Some(last) = sync.dora.last() {
                return Ok(vec![EventBody::Dora {
                    dora_marker: last.tile(),
                }
                .into()]);
            }
        }
        Ok(Vec::new())
    }

    fn draw(&mut self, body: &Value) -> KawaResult<Vec<Event>> {
        let draw: Draw = payload(body, "draw")?;
        let mut out = Vec::with_capacity(2);
        self.flush_accept(&mut out);
        let mut pai = Tile::UNKNOWN;
        if Some(draw.position) == self.state.seat {
            pai = draw.hai.tile();
            self.state.hand_ids.push(draw.hai.id);
        }
        out.push(
            EventBody::Tsumo {
                actor: draw.position,
                pai,
            }
            .into(),
        );
        Ok(out)
    }

    fn tehai_action(&mut self, body: &Value) -> KawaResult<Vec<Event>> {
        let act: TehaiAction = payload(body, "tehaiAction")?;
        let actor = act.position;
        let own = Some(actor) == self.state.seat;
        let first = act
            .hai_list
            .first()
            .copied()
            .ok_or_else(|| KawaError::parse(body.to_string(), "tehai action without tiles"))?;
        let pai = first.tile();

        let out = match act.action.as_str() {
            "KIRI" => {
                self.state.last_discard = Some((actor, pai));
                vec![EventBody::Dahai {
                    actor,
                    pai,
                    tsumogiri: act.is_kiri,
                }
                .into()]
            }
            "REACH" | "WREACH" => {
                let tsumogiri = act.action == "WREACH" || act.is_kiri;
                self.state.last_discard = Some((actor, pai));
                self.state.accept_reach = Some(
                    EventBody::ReachAccepted {
                        actor,
                        deltas: None,
                        scores: None,
                    }
                    .into(),
                );
                vec![
                    EventBody::Reach { actor }.into(),
                    EventBody::Dahai {
                        actor,
                        pai,
                        tsumogiri,
                    }
                    .into(),
                ]
            }
            "ANNKAN" => {
                let consumed = act.hai_list.iter().map(|h| h.tile()).collect();
                if own {
                    self.remove_ids(act.hai_list.iter().map(|h| h.id));
                }
                return Ok(vec![EventBody::Ankan { actor, consumed }.into()]);
            }
            "KAKAN" => vec![EventBody::Kakan {
                actor,
                pai,
                consumed: kakan_consumed(pai),
            }
            .into()],
            "KITA" => {
                if !self.state.is_3p {
                    log::warn!("amatsuki: nukidora outside a three-player game");
                }
                vec![EventBody::Nukidora {
                    actor,
                    pai: Tile::NORTH,
                }
                .into()]
            }
            other => {
                log::debug!("amatsuki: ignoring tehai action {other}");
                return Ok(Vec::new());
            }
        };
        if own {
            self.remove_ids([first.id]);
        }
        Ok(out)
    }

    fn river_action(&mut self, body: &Value) -> KawaResult<Vec<Event>> {
        let act: RiverAction = payload(body, "riverAction")?;
        let actor = act.position;
        let (target, pai) = self
            .state
            .last_discard
            .ok_or_else(|| KawaError::invalid_state("river call before any discard"))?;

        // the called tile is the first copy matching the discard
        let mut consumed = Vec::with_capacity(3);
        let mut skipped = false;
        for hai in &act.menzu.menzu_list {
            let tile = hai.tile();
            if !skipped && tile == pai {
                skipped = true;
                continue;
            }
            consumed.push(tile);
        }
        if Some(actor) == self.state.seat {
            self.remove_ids(act.menzu.menzu_list.iter().map(|h| h.id));
        }

        let body = match act.action.as_str() {
            "CHII" => EventBody::Chi {
                actor,
                target,
                pai,
                consumed,
            },
            "PON" => EventBody::Pon {
                actor,
                target,
                pai,
                consumed,
            },
            "MINKAN" => EventBody::Daiminkan {
                actor,
                target,
                pai,
                consumed,
            },
            other => {
                log::debug!("amatsuki: ignoring river action {other}");
                return Ok(Vec::new());
            }
        };
        let mut out = Vec::with_capacity(2);
        self.flush_accept(&mut out);
        out.push(body.into());
        Ok(out)
    }

    fn round_end(&mut self, _body: &Value) -> KawaResult<Vec<Event>> {
        self.state.accept_reach = None;
        Ok(vec![EventBody::EndKyoku.into()])
    }

    fn game_end(&mut self, _body: &Value) -> KawaResult<Vec<Event>> {
        self.state.accept_reach = None;
        self.state.game_ended = true;
        Ok(vec![EventBody::EndGame.into()])
    }

    /// Drops ids we hold; ids of the called discard are simply absent.
    fn remove_ids(&mut self, ids: impl IntoIterator<Item = i64>) {
        for id in ids {
            if let Some(pos) = self.state.hand_ids.iter().position(|&h| h == id) {
                self.state.hand_ids.remove(pos);
            }
        }
    }
}

fn body_of(frame: &StompFrame) -> KawaResult<Value> {
    frame
        .json()
        .ok_or_else(|| KawaError::parse(frame.body.clone(), "stomp body is not json"))
}

impl Bridge for AmatsukiBridge {
    fn platform(&self) -> Platform {
        Platform::Amatsuki
    }

    fn parse(&mut self, raw: &[u8]) -> Option<Vec<Event>> {
        let frame = match StompFrame::parse(raw) {
            Ok(frame) => frame,
            Err(e) => {
                log::warn!("amatsuki: dropping frame: {e}");
                return None;
            }
        };
        match self.handle(&frame) {
            Ok(events) => Some(events),
            Err(e) => {
                log::warn!("amatsuki: {:?} not applied: {e}", frame.destination());
                None
            }
        }
    }

    fn reset(&mut self) {
        self.state = AmatsukiState::default();
    }

    fn game_ended(&self) -> bool {
        self.state.game_ended
    }

    fn seat(&self) -> Option<u8> {
        self.state.seat
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn send(b: &mut AmatsukiBridge, dest: &str, body: Value) -> Vec<Event> {
        let frame = StompFrame::message(dest, &body);
        b.handle(&frame).unwrap()
    }

    fn kinds(events: &[Event]) -> Vec<&'static str> {
        events.iter().map(Event::kind).collect()
    }

    fn hidden() -> Value {
        json!({"tehai": {"hand": vec![json!({"id": -1}); 13]}, "haiRiver": []})
    }

    fn joined(mode: i64) -> AmatsukiBridge {
        let mut b = AmatsukiBridge::new();
        send(
            &mut b,
            TOPIC_JOIN_DESK,
            json!({"status": 0, "errorCode": 0, "gameType": 0, "gameMode": mode, "deskId": "d1"}),
        );
        b
    }

    /// We sit at seat 1 holding 1m..9m, E E E S.
    fn started() -> AmatsukiBridge {
        let mut b = joined(0);
        let ids = [0, 4, 8, 12, 16, 20, 24, 28, 32, 108, 109, 110, 112];
        let own = json!({
            "tehai": {"hand": ids.iter().map(|i| json!({"id": i})).collect::<Vec<_>>()},
        });
        let out = send(
            &mut b,
            "/user/topic/desk/roundStart/d1",
            json!({
                "bakaze": 0, "honba": 0, "isAllLast": false, "oya": 0,
                "playerPoints": [25000, 25000, 25000, 25000],
                "playerTiles": [hidden(), own, hidden(), hidden()],
            }),
        );
        assert_eq!(kinds(&out), ["start_game"]);
        b
    }

    #[test]
    fn ignored_before_join() {
        let mut b = AmatsukiBridge::new();
        let out = send(&mut b, "/topic/desk/tehaiAction/d1", json!({"action": "KIRI"}));
        assert!(out.is_empty());
    }

    #[test]
    fn failed_join_stays_invalid() {
        let mut b = AmatsukiBridge::new();
        send(
            &mut b,
            TOPIC_JOIN_DESK,
            json!({"status": 0, "errorCode": 0, "gameType": 1, "gameMode": 0}),
        );
        assert!(send(&mut b, "/user/topic/desk/gameEnd/x", json!({})).is_empty());
    }

    #[test]
    fn start_kyoku_waits_for_dora() {
        let mut b = started();
        assert_eq!(b.seat(), Some(1));
        assert_eq!(b.desk_id(), Some("d1"));
        let out = send(
            &mut b,
            "/topic/desk/syncDora/d1",
            json!({"dora": [{"id": 52}], "honba": 0, "reachCount": 1}),
        );
        match &out[0].body {
            EventBody::StartKyoku { dora_marker, kyotaku, kyoku, tehais, .. } => {
                assert_eq!(dora_marker.as_str(), "5pr");
                assert_eq!(*kyotaku, 1);
                assert_eq!(*kyoku, 1);
                assert_eq!(tehais[1][0].as_str(), "1m");
                assert_eq!(tehais[1][4].as_str(), "5mr");
            }
            other => panic!("unexpected {other:?}"),
        }
        // the next sync with the same count is silent, a new kan dora is not
        let again = json!({"dora": [{"id": 52}], "honba": 0, "reachCount": 1});
        assert!(send(&mut b, "/topic/desk/syncDora/d1", again).is_empty());
        let out = send(
            &mut b,
            "/topic/desk/syncDora/d1",
            json!({"dora": [{"id": 52}, {"id": 130}], "honba": 0, "reachCount": 1}),
        );
        assert_eq!(out[0].body, EventBody::Dora { dora_marker: "F".parse().unwrap() });
    }

    #[test]
    fn riichi_acceptance_before_call() {
        let mut b = started();
        let out = send(
            &mut b,
            "/topic/desk/tehaiAction/d1",
            json!({
                "action": "REACH",
                "haiList": [{"id": 111}],
                "isKiri": false,
                "isReachDisplay": true,
                "position": 2,
            }),
        );
        assert_eq!(kinds(&out), ["reach", "dahai"]);
        let out = send(
            &mut b,
            "/topic/desk/riverAction/d1",
            json!({
                "action": "PON",
                "menzu": {"menzuList": [{"id": 111}, {"id": 108}, {"id": 109}]},
                "position": 1,
            }),
        );
        assert_eq!(kinds(&out), ["reach_accepted", "pon"]);
        assert_eq!(
            out[1].body,
            EventBody::Pon {
                actor: 1,
                target: 2,
                pai: "E".parse().unwrap(),
                consumed: vec!["E".parse().unwrap(), "E".parse().unwrap()],
            }
        );
        assert_eq!(b.hand_ids().len(), 11);
    }

    #[test]
    fn own_draw_and_discard() {
        let mut b = started();
        let out = send(
            &mut b,
            "/user/topic/desk/draw/d1",
            json!({"hai": {"id": 132}, "position": 1}),
        );
        assert_eq!(out[0].body, EventBody::Tsumo { actor: 1, pai: "C".parse().unwrap() });
        assert_eq!(b.hand_ids().len(), 14);
        send(
            &mut b,
            "/topic/desk/tehaiAction/d1",
            json!({
                "action": "KIRI",
                "haiList": [{"id": 132}],
                "isKiri": true,
                "isReachDisplay": false,
                "position": 1,
            }),
        );
        assert_eq!(b.hand_ids().len(), 13);

        let out = send(
            &mut b,
            "/user/topic/desk/draw/d1",
            json!({"hai": {"id": -1}, "position": 2}),
        );
        assert_eq!(out[0].body, EventBody::Tsumo { actor: 2, pai: Tile::UNKNOWN });
    }

    #[test]
    fn ron_drops_pending_acceptance() {
        let mut b = started();
        send(
            &mut b,
            "/topic/desk/tehaiAction/d1",
            json!({"action": "REACH", "haiList": [{"id": 40}], "isKiri": true, "position": 0}),
        );
        let out = send(
            &mut b,
            "/topic/desk/ronAction/d1",
            json!({"agariInfo": [], "isTsumo": false}),
        );
        assert_eq!(kinds(&out), ["end_kyoku"]);
        let out = send(
            &mut b,
            "/user/topic/desk/draw/d1",
            json!({"hai": {"id": -1}, "position": 0}),
        );
        assert_eq!(kinds(&out), ["tsumo"]);
    }

    #[test]
    fn three_player_pads_seats() {
        let mut b = joined(1);
        let own = json!({
            "tehai": {"hand": (0..13).map(|i| json!({"id": i * 4})).collect::<Vec<_>>()},
        });
        send(
            &mut b,
            "/user/topic/desk/roundStart/d1",
            json!({
                "bakaze": 1, "honba": 2, "oya": 2,
                "playerPoints": [35000, 35000, 35000],
                "playerTiles": [own, hidden(), hidden()],
            }),
        );
        let out = send(
            &mut b,
            "/topic/desk/syncDora/d1",
            json!({"dora": [{"id": 0}], "reachCount": 0}),
        );
        match &out[0].body {
            EventBody::StartKyoku { bakaze, scores, tehais, is_3p, .. } => {
                assert_eq!(bakaze.as_str(), "S");
                assert_eq!(*scores, [35000, 35000, 35000, 0]);
                assert_eq!(tehais[3].len(), 13);
                assert!(is_3p);
            }
            other => panic!("unexpected {other:?}"),
        }
    }
}
