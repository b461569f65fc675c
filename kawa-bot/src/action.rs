//! Discrete action spaces for the four- and three-player rulesets.
//!
//! Both variants share indices 0-37 (34 tile types, three red fives, riichi).
//! After that the four-player space has the three chi shapes, while the
//! three-player space has no chi and gains North extraction:
//!
//! | idx | 4p          | 3p          |
//! |-----|-------------|-------------|
//! | 38  | chi_low     | pon         |
//! | 39  | chi_mid     | kan_select  |
//! | 40  | chi_high    | nukidora    |
//! | 41  | pon         | hora        |
//! | 42  | kan_select  | ryukyoku    |
//! | 43  | hora        | none        |
//! | 44  | ryukyoku    |             |
//! | 45  | none        |             |

use kawa_core::tile::{AKA_MANZU, AKA_SOUZU};
use kawa_core::Tile;
use serde::{Deserialize, Serialize};

/// Size of the four-player action space.
pub const ACTION_SPACE_4P: usize = 46;

/// Size of the three-player action space.
pub const ACTION_SPACE_3P: usize = 44;

/// Discards: 0-33 = tile types, 34-36 = red fives.
pub const DISCARD_END: usize = 36;
pub const RIICHI: usize = 37;

pub const LABELS_4P: [&str; ACTION_SPACE_4P] = [
    "1m", "2m", "3m", "4m", "5m", "6m", "7m", "8m", "9m", "1p", "2p", "3p", "4p", "5p", "6p", "7p",
    "8p", "9p", "1s", "2s", "3s", "4s", "5s", "6s", "7s", "8s", "9s", "E", "S", "W", "N", "P", "F",
    "C", "5mr", "5pr", "5sr", "reach", "chi_low", "chi_mid", "chi_high", "pon", "kan_select",
    "hora", "ryukyoku", "none",
];

pub const LABELS_3P: [&str; ACTION_SPACE_3P] = [
    "1m", "2m", "3m", "4m", "5m", "6m", "7m", "8m", "9m", "1p", "2p", "3p", "4p", "5p", "6p", "7p",
    "8p", "9p", "1s", "2s", "3s", "4s", "5s", "6s", "7s", "8s", "9s", "E", "S", "W", "N", "P", "F",
    "C", "5mr", "5pr", "5sr", "reach", "pon", "kan_select", "nukidora", "hora", "ryukyoku", "none",
];

/// A decoded action independent of the variant's index layout.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ActionKind {
    Discard(Tile),
    Riichi,
    ChiLow,
    ChiMid,
    ChiHigh,
    Pon,
    KanSelect,
    Nukidora,
    Hora,
    Ryukyoku,
    Pass,
}

/// Ruleset variant a decision engine is bound to.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Variant {
    FourPlayer,
    ThreePlayer,
}

impl Variant {
    #[inline]
    pub const fn from_is_3p(is_3p: bool) -> Self {
        if is_3p {
            Variant::ThreePlayer
        } else {
            Variant::FourPlayer
        }
    }

    #[inline]
    pub const fn is_3p(self) -> bool {
        matches!(self, Variant::ThreePlayer)
    }

    #[inline]
    pub const fn action_space(self) -> usize {
        match self {
            Variant::FourPlayer => ACTION_SPACE_4P,
            Variant::ThreePlayer => ACTION_SPACE_3P,
        }
    }

    pub fn labels(self) -> &'static [&'static str] {
        match self {
            Variant::FourPlayer => &LABELS_4P,
            Variant::ThreePlayer => &LABELS_3P,
        }
    }

    pub const fn name(self) -> &'static str {
        match self {
            Variant::FourPlayer => "mortal",
            Variant::ThreePlayer => "mortal3p",
        }
    }

    /// Index of `kind` in this variant, or None if the variant lacks it.
    pub fn index_of(self, kind: ActionKind) -> Option<usize> {
        let idx = match (self, kind) {
            (_, ActionKind::Discard(tile)) => {
                let id = tile.id() as usize;
                return (id <= DISCARD_END).then_some(id);
            }
            (_, ActionKind::Riichi) => RIICHI,
            (Variant::FourPlayer, ActionKind::ChiLow) => 38,
            (Variant::FourPlayer, ActionKind::ChiMid) => 39,
            (Variant::FourPlayer, ActionKind::ChiHigh) => 40,
            (Variant::FourPlayer, ActionKind::Pon) => 41,
            (Variant::FourPlayer, ActionKind::KanSelect) => 42,
            (Variant::FourPlayer, ActionKind::Hora) => 43,
            (Variant::FourPlayer, ActionKind::Ryukyoku) => 44,
            (Variant::FourPlayer, ActionKind::Pass) => 45,
            (Variant::FourPlayer, ActionKind::Nukidora) => return None,
            (Variant::ThreePlayer, ActionKind::Pon) => 38,
            (Variant::ThreePlayer, ActionKind::KanSelect) => 39,
            (Variant::ThreePlayer, ActionKind::Nukidora) => 40,
            (Variant::ThreePlayer, ActionKind::Hora) => 41,
            (Variant::ThreePlayer, ActionKind::Ryukyoku) => 42,
            (Variant::ThreePlayer, ActionKind::Pass) => 43,
            (
                Variant::ThreePlayer,
                ActionKind::ChiLow | ActionKind::ChiMid | ActionKind::ChiHigh,
            ) => {
                return None
            }
        };
        Some(idx)
    }

    /// Inverse of [`Variant::index_of`].
    pub fn kind_at(self, idx: usize) -> Option<ActionKind> {
        if idx <= DISCARD_END {
            return Tile::new(idx as u8).map(ActionKind::Discard);
        }
        let kind = match (self, idx) {
            (_, RIICHI) => ActionKind::Riichi,
            (Variant::FourPlayer, 38) => ActionKind::ChiLow,
            (Variant::FourPlayer, 39) => ActionKind::ChiMid,
            (Variant::FourPlayer, 40) => ActionKind::ChiHigh,
            (Variant::FourPlayer, 41) => ActionKind::Pon,
            (Variant::FourPlayer, 42) => ActionKind::KanSelect,
            (Variant::FourPlayer, 43) => ActionKind::Hora,
            (Variant::FourPlayer, 44) => ActionKind::Ryukyoku,
            (Variant::FourPlayer, 45) => ActionKind::Pass,
            (Variant::ThreePlayer, 38) => ActionKind::Pon,
            (Variant::ThreePlayer, 39) => ActionKind::KanSelect,
            (Variant::ThreePlayer, 40) => ActionKind::Nukidora,
            (Variant::ThreePlayer, 41) => ActionKind::Hora,
            (Variant::ThreePlayer, 42) => ActionKind::Ryukyoku,
            (Variant::ThreePlayer, 43) => ActionKind::Pass,
            _ => return None,
        };
        Some(kind)
    }
}

/// True for the red-five discard slots.
#[inline]
pub const fn is_aka_discard(idx: usize) -> bool {
    idx >= AKA_MANZU as usize && idx <= AKA_SOUZU as usize
}

/// Packs a boolean mask into bits, index 0 in the lowest bit.
pub fn mask_to_bits(mask: &[bool]) -> u64 {
    mask.iter()
        .enumerate()
        .filter(|&(_, &legal)| legal)
        .fold(0u64, |bits, (i, _)| bits | (1 << i))
}

/// Unpacks [`mask_to_bits`] for an action space of `len`.
pub fn bits_to_mask(bits: u64, len: usize) -> Vec<bool> {
    (0..len).map(|i| bits >> i & 1 == 1).collect()
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
