//! Tenhou JSON tag frames and the packed meld word.
//!
//! Every frame is a JSON object with a `tag` and string-valued attributes
//! (`{"tag":"INIT","seed":"0,0,0,3,2,52",...}`), except the `<Z/>`
//! heartbeat. Seat attributes are relative to our own seat.

use serde_json::{Map, Value};

use crate::errors::{KawaError, KawaResult};
use crate::tile::Tile;

pub const HEARTBEAT: &[u8] = b"<Z/>";

/// Tile type index of North, the 3-seat extraction tile.
pub const NORTH_TYPE: u8 = 30;

const MELD_KIND_MASK: u32 = 0x3F;
const NUKIDORA_BITS: u32 = 0x20;

#[derive(Debug, Clone, PartialEq)]
pub enum TenhouFrame {
    Heartbeat,
    Message(Map<String, Value>),
}

pub fn parse_frame(raw: &[u8]) -> KawaResult<TenhouFrame> {
    if raw == HEARTBEAT {
        return Ok(TenhouFrame::Heartbeat);
    }
    match serde_json::from_slice::<Value>(raw)? {
        Value::Object(map) => Ok(TenhouFrame::Message(map)),
        other => Err(KawaError::parse(
            other.to_string(),
            "tenhou frame is not a json object",
        )),
    }
}

/// Reads an attribute as an integer. Tenhou sends numbers as strings.
pub fn attr_int(msg: &Map<String, Value>, key: &str) -> Option<i64> {
    match msg.get(key)? {
        Value::String(s) => s.trim().parse().ok(),
        Value::Number(n) => n.as_i64(),
        _ => None,
    }
}

/// Reads a comma separated integer list (`hai`, `seed`, `ten`, `sc`).
pub fn attr_csv(msg: &Map<String, Value>, key: &str) -> Option<Vec<i64>> {
    let s = msg.get(key)?.as_str()?;
    s.split(',')
        .filter(|part| !part.is_empty())
        .map(|part| part.trim().parse().ok())
        .collect()
}

// ---------------------------------------------------------------------------
// Meld word
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MeldKind {
    Chi,
    Pon,
    Kakan,
    Daiminkan,
    Ankan,
}

/// A decoded meld. `tiles` are 136-indices with the called (or added)
/// tile first.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Meld {
    pub kind: MeldKind,
    /// Relative offset of the seat the tile came from (0 for concealed).
    pub from: u8,
    pub tiles: Vec<u8>,
}

pub fn is_nukidora(m: u32) -> bool {
    m & MELD_KIND_MASK == NUKIDORA_BITS
}

impl Meld {
    /// `None` when the word names a tile outside the 136 set.
    pub fn decode(m: u32) -> Option<Meld> {
        if m & (1 << 2) != 0 {
            Self::decode_chi(m)
        } else if m & (1 << 3) != 0 {
            Self::decode_pon(m, false)
        } else if m & (1 << 4) != 0 {
            Self::decode_pon(m, true)
        } else {
            Self::decode_kan(m)
        }
    }

    fn decode_chi(m: u32) -> Option<Meld> {
        let t = m >> 10;
        let r = (t % 3) as usize;
        let base = t / 3;
        // 7 starting numbers in each of the 3 suits
        if base >= 21 {
            return None;
        }
        let base = (base / 7 * 9 + base % 7) * 4;
        let mut tiles = vec![
            index(base + ((m >> 3) & 0x3))?,
            index(base + 4 + ((m >> 5) & 0x3))?,
            index(base + 8 + ((m >> 7) & 0x3))?,
        ];
        tiles.swap(0, r);
        Some(Meld {
            kind: MeldKind::Chi,
            from: (m & 3) as u8,
            tiles,
        })
    }

    /// Pon and added kan share a layout; bits 5-6 pick the unused (pon)
    /// or added (kakan) copy.
    fn decode_pon(m: u32, added: bool) -> Option<Meld> {
        let which = ((m >> 5) & 0x3) as usize;
        let t = m >> 9;
        let r = (t % 3) as usize;
        let mut tiles = copies(t / 3)?;
        let picked = tiles.remove(which);
        tiles.swap(0, r);
        let kind = if added {
            tiles.insert(0, picked);
            MeldKind::Kakan
        } else {
            MeldKind::Pon
        };
        Some(Meld {
            kind,
            from: (m & 3) as u8,
            tiles,
        })
    }

    fn decode_kan(m: u32) -> Option<Meld> {
        let from = (m & 3) as u8;
        let hai0 = m >> 8;
        let mut tiles = copies(hai0 / 4)?;
        tiles.swap(0, (hai0 % 4) as usize);
        Some(Meld {
            kind: if from == 0 {
                MeldKind::Ankan
            } else {
                MeldKind::Daiminkan
            },
            from,
            tiles,
        })
    }

    pub fn pai(&self) -> Tile {
        to_tile(self.tiles[0])
    }

    pub fn consumed(&self) -> Vec<Tile> {
        let tiles = match self.kind {
            MeldKind::Ankan => &self.tiles[..],
            _ => &self.tiles[1..],
        };
        tiles.iter().map(|&i| to_tile(i)).collect()
    }

    /// 136-indices that leave the caller's concealed hand.
    pub fn exposed(&self) -> &[u8] {
        match self.kind {
            MeldKind::Ankan => &self.tiles,
            MeldKind::Kakan => &self.tiles[..1],
            _ => &self.tiles[1..],
        }
    }
}

fn index(i: u32) -> Option<u8> {
    u8::try_from(i).ok().filter(|&i| i < 136)
}

/// The four 136-indices of one tile type.
fn copies(ty: u32) -> Option<Vec<u8>> {
    let base = index(ty.checked_mul(4)?)?;
    Some((base..base + 4).collect())
}

pub fn to_tile(index: u8) -> Tile {
    Tile::from_136(i64::from(index)).unwrap_or(Tile::UNKNOWN)
}
