//! Tile representation shared by every codec and bridge.
//!
//! A [`Tile`] is the 34-type system extended with the three red fives
//! (ids 34-36) and an opaque tile (id 37) used for hidden draws and
//! placeholder hands. Conversions from each platform's native tile code
//! live here so bridges only ever deal with [`Tile`].

use std::cmp::Ordering;
use std::fmt;
use std::str::FromStr;

use serde::de::{self, Visitor};
use serde::{Deserialize, Deserializer, Serialize, Serializer};

use crate::errors::KawaError;

// ---------------------------------------------------------------------------
// Constants
// ---------------------------------------------------------------------------

/// Total number of distinct tile types (0-33).
pub const NUM_TILE_TYPES: usize = 34;

/// Tile types plus the three red fives.
pub const NUM_TILES_WITH_AKA: usize = 37;

/// Number of tiles per suited category (1-9).
pub const NUM_SUIT_TILES: usize = 9;

// Suit range starts (tile type indices).
pub const MANZU_START: u8 = 0;
pub const PINZU_START: u8 = 9;
pub const SOUZU_START: u8 = 18;
pub const JIHAI_START: u8 = 27;

pub const EAST: u8 = 27;
pub const SOUTH: u8 = 28;
pub const WEST: u8 = 29;
pub const NORTH: u8 = 30;
pub const HAKU: u8 = 31;
pub const HATSU: u8 = 32;
pub const CHUN: u8 = 33;

/// Extended ids for the red fives.
pub const AKA_MANZU: u8 = 34;
pub const AKA_PINZU: u8 = 35;
pub const AKA_SOUZU: u8 = 36;

/// Opaque tile (`?`).
pub const UNKNOWN: u8 = 37;

/// 136-format indices of the red fives (copy 0 of each five).
pub const AKA_MANZU_136: u8 = 16;
pub const AKA_PINZU_136: u8 = 52;
pub const AKA_SOUZU_136: u8 = 88;

const MJAI_NAMES: [&str; 38] = [
    "1m", "2m", "3m", "4m", "5m", "6m", "7m", "8m", "9m", "1p", "2p", "3p", "4p", "5p", "6p", "7p",
    "8p", "9p", "1s", "2s", "3s", "4s", "5s", "6s", "7s", "8s", "9s", "E", "S", "W", "N", "P", "F",
    "C", "5mr", "5pr", "5sr", "?",
];

/// Position of every tile id in the hand display order
/// `1m 2m 3m 4m 5mr 5m 6m .. 9m, (same for p, s), E S W N P F C ?`.
const SORT_KEYS: [u8; 38] = [
    0, 1, 2, 3, 5, 6, 7, 8, 9, // m
    10, 11, 12, 13, 15, 16, 17, 18, 19, // p
    20, 21, 22, 23, 25, 26, 27, 28, 29, // s
    30, 31, 32, 33, 34, 35, 36, // honors
    4, 14, 24, // red fives sort just before their plain five
    37, // ?
];

// ---------------------------------------------------------------------------
// Suit
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Suit {
    Manzu = 0,
    Pinzu = 1,
    Souzu = 2,
    Jihai = 3,
}

// ---------------------------------------------------------------------------
// Tile
// ---------------------------------------------------------------------------

/// A single tile in MJAI terms: a 34-type id, a red five, or the opaque tile.
#[derive(Clone, Copy, PartialEq, Eq, Hash, Default)]
pub struct Tile(u8);

impl Tile {
    pub const UNKNOWN: Tile = Tile(UNKNOWN);
    pub const NORTH: Tile = Tile(NORTH);

    /// Create from an extended id (0-37). Returns None if out of range.
    #[inline]
    pub const fn new(id: u8) -> Option<Self> {
        if id <= UNKNOWN {
            Some(Self(id))
        } else {
            None
        }
    }

    #[inline]
    pub const fn id(self) -> u8 {
        self.0
    }

    #[inline]
    pub const fn is_unknown(self) -> bool {
        self.0 == UNKNOWN
    }

    #[inline]
    pub const fn is_aka(self) -> bool {
        matches!(self.0, AKA_MANZU | AKA_PINZU | AKA_SOUZU)
    }

    /// Strips the red flag. Other tiles pass through unchanged.
    #[inline]
    pub const fn deaka(self) -> Tile {
        match self.0 {
            AKA_MANZU => Tile(4),
            AKA_PINZU => Tile(13),
            AKA_SOUZU => Tile(22),
            _ => self,
        }
    }

    /// Turns a plain five into its red counterpart. Other tiles pass through.
    #[inline]
    pub const fn akaize(self) -> Tile {
        match self.0 {
            4 => Tile(AKA_MANZU),
            13 => Tile(AKA_PINZU),
            22 => Tile(AKA_SOUZU),
            _ => self,
        }
    }

    /// Tile type index (0-33) with red fives folded in. The opaque tile has none.
    #[inline]
    pub const fn tile_type(self) -> Option<usize> {
        if self.is_unknown() {
            None
        } else {
            Some(self.deaka().0 as usize)
        }
    }

    pub const fn suit(self) -> Option<Suit> {
        match self.tile_type() {
            Some(t) if t < PINZU_START as usize => Some(Suit::Manzu),
            Some(t) if t < SOUZU_START as usize => Some(Suit::Pinzu),
            Some(t) if t < JIHAI_START as usize => Some(Suit::Souzu),
            Some(_) => Some(Suit::Jihai),
            None => None,
        }
    }

    /// 1-9 for suited tiles, None for honors and the opaque tile.
    pub const fn number(self) -> Option<u8> {
        match self.tile_type() {
            Some(t) if t < JIHAI_START as usize => Some((t % NUM_SUIT_TILES) as u8 + 1),
            _ => None,
        }
    }

    pub const fn is_honor(self) -> bool {
        matches!(self.suit(), Some(Suit::Jihai))
    }

    /// Terminal or honor (yaochuu).
    pub const fn is_yaokyuu(self) -> bool {
        match self.number() {
            Some(n) => n == 1 || n == 9,
            None => self.is_honor(),
        }
    }

    /// Tile indicated by this dora indicator. In three-player games the
    /// manzu run skips 2m-8m so 1m points at 9m.
    pub fn next(self, three_player: bool) -> Tile {
        let Some(t) = self.tile_type() else {
            return self;
        };
        let t = t as u8;
        let next = match t {
            0 if three_player => 8,
            8 | 17 | 26 => t - 8,
            30 => EAST,
            33 => HAKU,
            _ => t + 1,
        };
        Tile(next)
    }

    /// Position in the fixed hand display order.
    #[inline]
    pub const fn sort_key(self) -> u8 {
        SORT_KEYS[self.0 as usize]
    }

    pub fn as_str(self) -> &'static str {
        MJAI_NAMES[self.0 as usize]
    }

    /// Same tile ignoring the red flag.
    #[inline]
    pub fn same_kind(self, other: Tile) -> bool {
        self.deaka() == other.deaka()
    }
}

impl fmt::Debug for Tile {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "Tile({})", self.as_str())
    }
}

impl fmt::Display for Tile {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl PartialOrd for Tile {
    fn partial_cmp(&self, other: &Self) -> Option<Ordering> {
        Some(self.cmp(other))
    }
}

impl Ord for Tile {
    fn cmp(&self, other: &Self) -> Ordering {
        self.sort_key().cmp(&other.sort_key())
    }
}

impl FromStr for Tile {
    type Err = KawaError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        MJAI_NAMES
            .iter()
            .position(|&name| name == s)
            .map(|id| Tile(id as u8))
            .ok_or_else(|| KawaError::parse(s, "not an mjai tile"))
    }
}

impl Serialize for Tile {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_str(self.as_str())
    }
}

struct TileVisitor;

impl Visitor<'_> for TileVisitor {
    type Value = Tile;

    fn expecting(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str("an mjai tile string")
    }

    fn visit_str<E: de::Error>(self, v: &str) -> Result<Tile, E> {
        v.parse().map_err(E::custom)
    }
}

impl<'de> Deserialize<'de> for Tile {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        deserializer.deserialize_str(TileVisitor)
    }
}

// ---------------------------------------------------------------------------
// Platform tile codes
// ---------------------------------------------------------------------------

impl Tile {
    /// Majsoul code: `0m`/`0p`/`0s` are red fives, `1z`..`7z` are honors.
    pub fn from_majsoul(code: &str) -> Option<Tile> {
        let bytes = code.as_bytes();
        if bytes.len() != 2 || !bytes[0].is_ascii_digit() {
            return None;
        }
        let n = bytes[0] - b'0';
        let start = match bytes[1] {
            b'm' => MANZU_START,
            b'p' => PINZU_START,
            b's' => SOUZU_START,
            b'z' => {
                return (1..=7).contains(&n).then(|| Tile(JIHAI_START + n - 1));
            }
            _ => return None,
        };
        match n {
            0 => Some(Tile(start + 4).akaize()),
            1..=9 => Some(Tile(start + n - 1)),
            _ => None,
        }
    }

    /// Inverse of [`Tile::from_majsoul`].
    pub fn to_majsoul(self) -> String {
        match (self.suit(), self.number()) {
            (Some(Suit::Jihai), _) => format!("{}z", self.0 - JIHAI_START + 1),
            (Some(suit), Some(n)) => {
                let n = if self.is_aka() { 0 } else { n };
                let c = match suit {
                    Suit::Manzu => 'm',
                    Suit::Pinzu => 'p',
                    _ => 's',
                };
                format!("{n}{c}")
            }
            _ => String::new(),
        }
    }

    /// 136-format index (Tenhou tiles, Amatsuki tile ids). Copy 0 of each
    /// suited five is red. Negative ids are hidden tiles.
    pub fn from_136(index: i64) -> Option<Tile> {
        if index < 0 {
            return Some(Tile::UNKNOWN);
        }
        if index >= 136 {
            return None;
        }
        let index = index as u8;
        let tile = Tile(index / 4);
        if matches!(index, AKA_MANZU_136 | AKA_PINZU_136 | AKA_SOUZU_136) {
            Some(tile.akaize())
        } else {
            Some(tile)
        }
    }

    /// Riichi City card code: low nibble is the number, the next nibble the
    /// suit (0 m, 1 p, 2 s, 3 honors E S W N P F C), bit 0x100 marks a red
    /// five. Anything else decodes to the opaque tile.
    pub fn from_riichi_city(card: i64) -> Tile {
        if card <= 0 {
            return Tile::UNKNOWN;
        }
        let red = card & 0x100 != 0;
        let n = (card & 0x0F) as u8;
        let suit = ((card >> 4) & 0x0F) as u8;
        let tile = match (suit, n) {
            (0..=2, 1..=9) => Tile(suit * NUM_SUIT_TILES as u8 + n - 1),
            (3, 1..=7) => Tile(JIHAI_START + n - 1),
            _ => return Tile::UNKNOWN,
        };
        if red && n == 5 && suit < 3 {
            tile.akaize()
        } else {
            tile
        }
    }

    /// Inverse of [`Tile::from_riichi_city`]; the opaque tile encodes as 0.
    pub fn to_riichi_city(self) -> i64 {
        let Some(t) = self.tile_type() else {
            return 0;
        };
        let t = t as i64;
        let code = if t >= JIHAI_START as i64 {
            0x30 | (t - JIHAI_START as i64 + 1)
        } else {
            ((t / 9) << 4) | (t % 9 + 1)
        };
        if self.is_aka() {
            code | 0x100
        } else {
            code
        }
    }
}

// ---------------------------------------------------------------------------
// Helpers
// ---------------------------------------------------------------------------

/// Sorts a hand into display order.
pub fn sort_tiles(tiles: &mut [Tile]) {
    tiles.sort_by_key(|t| t.sort_key());
}

/// Counts per tile type, ignoring red flags and opaque tiles.
pub fn tiles_to_counts(tiles: &[Tile]) -> [u8; NUM_TILE_TYPES] {
    let mut counts = [0u8; NUM_TILE_TYPES];
    for t in tiles {
        if let Some(ty) = t.tile_type() {
            counts[ty] += 1;
        }
    }
    counts
}

/// Parses a list of MJAI tile codes.
pub fn parse_tiles(codes: &[&str]) -> Result<Vec<Tile>, KawaError> {
    codes.iter().map(|c| c.parse()).collect()
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
