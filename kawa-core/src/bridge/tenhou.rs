//! Tenhou bridge.
//!
//! Wire seats are relative to our own seat, which is itself chosen so that
//! the first dealer sits at 0. Our hand is tracked as exact 136-indices,
//! since every discard and call names the physical tile.

use serde_json::{Map, Value};

use super::{bakaze, tehais_with, Bridge, Platform};
use crate::codec::tenhou::{
    attr_csv, attr_int, is_nukidora, parse_frame, to_tile, Meld, MeldKind, TenhouFrame, NORTH_TYPE,
};
use crate::event::{Event, EventBody, Scores};
use crate::tile::{sort_tiles, Tile};

const SEATS: u8 = 4;
const SEATS_3P: usize = 3;
const RIICHI_DEPOSIT: i32 = 1000;

type Msg = Map<String, Value>;

#[derive(Debug, Default)]
struct TenhouState {
    game_active: bool,
    ended: bool,
    seat: u8,
    is_3p: bool,
    hand: Vec<u8>,
    last_kawa: Option<Tile>,
}

#[derive(Debug, Default)]
pub struct TenhouBridge {
    state: TenhouState,
}

impl TenhouBridge {
    pub fn new() -> Self {
        Self::default()
    }

    /// Our concealed tiles as 136-indices, in arrival order.
    pub fn hand_indices(&self) -> &[u8] {
        &self.state.hand
    }

    pub fn last_discard(&self) -> Option<Tile> {
        self.state.last_kawa
    }

    fn rel_to_abs(&self, rel: i64) -> u8 {
        ((rel.rem_euclid(i64::from(SEATS)) + i64::from(self.state.seat)) % i64::from(SEATS)) as u8
    }

    /// Rotates a relative per-seat list into absolute seats, scaled by `mul`.
    fn rotate(&self, values: &[i64], mul: i64) -> Scores {
        let mut out = [0; 4];
        for (rel, v) in values.iter().take(SEATS as usize).enumerate() {
            let scaled = v.saturating_mul(mul).clamp(i64::from(i32::MIN), i64::from(i32::MAX));
            out[self.rel_to_abs(rel as i64) as usize] = scaled as i32;
        }
        out
    }

    fn dispatch(&mut self, msg: &Msg) -> Option<Vec<Event>> {
        let tag = msg.get("tag").and_then(Value::as_str)?;
        let mut out = match tag {
            "HELO" => self.helo(),
            "REJOIN" => Vec::new(),
            "UN" => self.un(msg),
            "TAIKYOKU" => self.taikyoku(msg)?,
            "INIT" => self.init(msg)?,
            "DORA" => vec![EventBody::Dora {
                dora_marker: to_tile(tile_index(attr_int(msg, "hai")?)?),
            }
            .into()],
            "REACH" => self.reach(msg)?,
            "AGARI" => vec![EventBody::EndKyoku.into()],
            "RYUUKYOKU" => self.ryukyoku(msg),
            "N" => self.meld(msg)?,
            _ if is_draw_tag(tag) => self.tsumo(tag, msg),
            _ if is_discard_tag(tag) => self.dahai(tag, msg),
            _ => return if msg.contains_key("owari") { Some(self.end_game()) } else { None },
        };
        if msg.contains_key("owari") {
            out.extend(self.end_game());
        }
        Some(out)
    }

    fn end_game(&mut self) -> Vec<Event> {
        self.state.game_active = false;
        self.state.ended = true;
        vec![EventBody::EndGame.into()]
    }

    fn helo(&mut self) -> Vec<Event> {
        if !self.state.game_active {
            return Vec::new();
        }
        log::info!("tenhou: HELO during an active game, closing it");
        self.reset();
        self.state.ended = true;
        vec![EventBody::EndGame.into()]
    }

    fn un(&mut self, msg: &Msg) -> Vec<Event> {
        let players = (0..4)
            .filter(|i| {
                msg.get(&format!("n{i}"))
                    .and_then(Value::as_str)
                    .is_some_and(|n| !n.is_empty())
            })
            .count();
        self.state.is_3p = players == SEATS_3P;
        log::debug!("tenhou: {players} players at the table");
        Vec::new()
    }

    fn taikyoku(&mut self, msg: &Msg) -> Option<Vec<Event>> {
        let oya = attr_int(msg, "oya")?;
        let state = &mut self.state;
        state.game_active = true;
        state.seat = (i64::from(SEATS) - oya).rem_euclid(i64::from(SEATS)) as u8;
        log::info!(
            "tenhou: game started, {} seats, we are {}",
            if state.is_3p { 3 } else { 4 },
            state.seat
        );
        Some(vec![EventBody::StartGame { id: state.seat }.into()])
    }

    fn init(&mut self, msg: &Msg) -> Option<Vec<Event>> {
        let hai = attr_csv(msg, "hai")?;
        let seed = attr_csv(msg, "seed")?;
        let ten = attr_csv(msg, "ten")?;
        let Some(round) = Round::from_seed(&seed) else {
            log::warn!("tenhou: bad INIT seed {seed:?}");
            return None;
        };
        let Some(hand) = hai.iter().map(|&i| tile_index(i)).collect::<Option<Vec<u8>>>() else {
            log::warn!("tenhou: bad INIT hand {hai:?}");
            return None;
        };
        let oya = self.rel_to_abs(attr_int(msg, "oya")?);
        let scores = self.rotate(&ten, 100);

        self.state.hand = hand;
        self.state.last_kawa = None;

        let mut own: Vec<Tile> = self.state.hand.iter().map(|&i| to_tile(i)).collect();
        sort_tiles(&mut own);

        Some(vec![EventBody::StartKyoku {
            bakaze: bakaze(usize::from(round.number / 4)),
            dora_marker: to_tile(round.dora),
            kyoku: round.number % 4 + 1,
            honba: round.honba,
            kyotaku: round.kyotaku,
            oya,
            scores,
            tehais: tehais_with(self.state.seat, &own),
            is_3p: self.state.is_3p,
        }
        .into()])
    }

    fn tsumo(&mut self, tag: &str, msg: &Msg) -> Vec<Event> {
        let rel = i64::from(tag.as_bytes()[0] - b'T');
        if self.state.is_3p && rel as usize >= SEATS_3P {
            return Vec::new();
        }
        let actor = self.rel_to_abs(rel);
        let mut pai = Tile::UNKNOWN;
        if actor == self.state.seat {
            match tag_index(tag).or_else(|| attr_int(msg, "p")).and_then(tile_index) {
                Some(index) => {
                    self.state.hand.push(index);
                    pai = to_tile(index);
                }
                None => log::warn!("tenhou: own draw {tag} without a tile index"),
            }
        }
        vec![EventBody::Tsumo { actor, pai }.into()]
    }

    fn dahai(&mut self, tag: &str, msg: &Msg) -> Vec<Event> {
        let letter = tag.as_bytes()[0];
        let actor = self.rel_to_abs(i64::from(letter.to_ascii_uppercase() - b'D'));
        let own = actor == self.state.seat;
        let index = attr_int(msg, "p")
            .or_else(|| tag_index(tag))
            .and_then(tile_index)
            .or_else(|| if own { self.state.hand.last().copied() } else { None });

        let pai = index.map(to_tile).unwrap_or(Tile::UNKNOWN);
        let tsumogiri = if own {
            self.state.hand.last().map_or(true, |&last| Some(last) == index)
        } else {
            letter.is_ascii_uppercase()
        };
        self.state.last_kawa = Some(pai);

        if own {
            if let Some(index) = index {
                self.remove_index(index, "discard");
            }
        }
        vec![EventBody::Dahai {
            actor,
            pai,
            tsumogiri,
        }
        .into()]
    }

    fn meld(&mut self, msg: &Msg) -> Option<Vec<Event>> {
        let actor = self.rel_to_abs(attr_int(msg, "who")?);
        let m = u32::try_from(attr_int(msg, "m")?).ok()?;
        let own = actor == self.state.seat;

        if is_nukidora(m) {
            if own {
                match self.state.hand.iter().position(|&i| i / 4 == NORTH_TYPE) {
                    Some(pos) => {
                        self.state.hand.remove(pos);
                    }
                    None => log::warn!("tenhou: nukidora without a North in hand"),
                }
            }
            return Some(vec![EventBody::Nukidora {
                actor,
                pai: Tile::NORTH,
            }
            .into()]);
        }

        let Some(meld) = Meld::decode(m) else {
            log::warn!("tenhou: dropping meld with bad word {m}");
            return None;
        };
        let pai = meld.pai();
        let consumed = meld.consumed();
        let from_target = (actor + meld.from) % SEATS;
        let body = match meld.kind {
            MeldKind::Chi => EventBody::Chi {
                actor,
                target: (actor + SEATS - 1) % SEATS,
                pai,
                consumed,
            },
            MeldKind::Pon => EventBody::Pon {
                actor,
                target: from_target,
                pai,
                consumed,
            },
            MeldKind::Daiminkan => EventBody::Daiminkan {
                actor,
                target: from_target,
                pai,
                consumed,
            },
            MeldKind::Kakan => EventBody::Kakan {
                actor,
                pai,
                consumed,
            },
            MeldKind::Ankan => EventBody::Ankan { actor, consumed },
        };
        if own {
            for &index in meld.exposed() {
                self.remove_index(index, "meld");
            }
        }
        Some(vec![body.into()])
    }

    fn reach(&mut self, msg: &Msg) -> Option<Vec<Event>> {
        let actor = self.rel_to_abs(attr_int(msg, "who")?);
        match attr_int(msg, "step")? {
            1 => Some(vec![EventBody::Reach { actor }.into()]),
            2 => {
                let mut deltas = [0; 4];
                deltas[actor as usize] = -RIICHI_DEPOSIT;
                let scores = attr_csv(msg, "ten").map(|ten| self.rotate(&ten, 100));
                Some(vec![EventBody::ReachAccepted {
                    actor,
                    deltas: Some(deltas),
                    scores,
                }
                .into()])
            }
            _ => None,
        }
    }

    /// `sc` alternates score-before and delta, both in hundreds.
    fn ryukyoku(&self, msg: &Msg) -> Vec<Event> {
        let (scores, deltas) = match attr_csv(msg, "sc") {
            Some(sc) => {
                let before: Vec<i64> = sc.iter().step_by(2).copied().collect();
                let delta: Vec<i64> = sc.iter().skip(1).step_by(2).copied().collect();
                let after: Vec<i64> = before
                    .iter()
                    .zip(&delta)
                    .map(|(b, d)| b.saturating_add(*d))
                    .collect();
                (Some(self.rotate(&after, 100)), Some(self.rotate(&delta, 100)))
            }
            None => (None, None),
        };
        vec![
            EventBody::Ryukyoku { deltas, scores }.into(),
            EventBody::EndKyoku.into(),
        ]
    }

    fn remove_index(&mut self, index: u8, what: &str) {
        match self.state.hand.iter().position(|&i| i == index) {
            Some(pos) => {
                self.state.hand.remove(pos);
            }
            None => log::warn!("tenhou: {what} tile {index} not in tracked hand"),
        }
    }
}

fn is_draw_tag(tag: &str) -> bool {
    let mut chars = tag.chars();
    matches!(chars.next(), Some('T'..='W')) && chars.all(|c| c.is_ascii_digit())
}

fn is_discard_tag(tag: &str) -> bool {
    let mut chars = tag.chars();
    matches!(chars.next(), Some('D'..='G' | 'd'..='g')) && chars.all(|c| c.is_ascii_digit())
}

/// Round fields of the INIT `seed`: round number, honba, riichi sticks,
/// two dice, dora indicator.
struct Round {
    number: u8,
    honba: u8,
    kyotaku: u8,
    dora: u8,
}

impl Round {
    fn from_seed(seed: &[i64]) -> Option<Round> {
        let &[number, honba, kyotaku, _, _, dora, ..] = seed else {
            return None;
        };
        Some(Round {
            number: u8::try_from(number).ok().filter(|&n| n < 16)?,
            honba: u8::try_from(honba).ok()?,
            kyotaku: u8::try_from(kyotaku).ok()?,
            dora: tile_index(dora)?,
        })
    }
}

/// A 136-index, or `None` when out of range.
fn tile_index(i: i64) -> Option<u8> {
    u8::try_from(i).ok().filter(|&i| i < 136)
}

fn tag_index(tag: &str) -> Option<i64> {
    tag.get(1..).filter(|s| !s.is_empty())?.parse().ok()
}

impl Bridge for TenhouBridge {
    fn platform(&self) -> Platform {
        Platform::Tenhou
    }

    fn parse(&mut self, raw: &[u8]) -> Option<Vec<Event>> {
        match parse_frame(raw) {
            Ok(TenhouFrame::Heartbeat) => Some(Vec::new()),
            Ok(TenhouFrame::Message(msg)) => self.dispatch(&msg),
            Err(e) => {
                log::warn!("tenhou: dropping frame: {e}");
                None
            }
        }
    }

    fn reset(&mut self) {
        self.state = TenhouState::default();
    }

    fn game_ended(&self) -> bool {
        self.state.ended
    }

    fn seat(&self) -> Option<u8> {
        self.state.game_active.then_some(self.state.seat)
    }
}
