//! 62x34 observation tensor encoder for the decision engines.
//!
//! Encodes one seat's view of the table into a flat `[f32; 62 * 34]` array
//! (row-major). Seats are relative to the observer: index 0 is self, then
//! shimocha, toimen and kamicha. Channels are grouped:
//!
//! - 0..3:   closed hand (thresholded tile counts)
//! - 4..7:   own meld tile counts (thresholded)
//! - 8:      drawn tile one-hot
//! - 9..10:  shanten masks (keep / next)
//! - 11..22: discards per seat (presence, tedashi, temporal)
//! - 23..34: melds per seat (chi, pon, kan)
//! - 35..39: dora indicator thermometer
//! - 40..42: aka flags (per suit plane)
//! - 43..61: metadata (riichi, scores, gaps, shanten, round, honba, kyotaku)

use kawa_core::shanten::calc_shanten;
use kawa_core::tile::{EAST, NUM_TILE_TYPES};
use kawa_core::Tile;

use crate::state::{FuuroKind, PlayerState};

// ---------------------------------------------------------------------------
// Constants
// ---------------------------------------------------------------------------

/// Total observation channels.
pub const NUM_CHANNELS: usize = 62;

/// Tiles per channel (one per tile type).
pub const NUM_TILES: usize = NUM_TILE_TYPES; // 34

/// Total elements in the flat observation buffer.
pub const OBS_SIZE: usize = NUM_CHANNELS * NUM_TILES; // 2108

const CH_HAND: usize = 0; // 0..3
const CH_OPEN_MELD: usize = 4; // 4..7
const CH_DRAWN: usize = 8;
const CH_SHANTEN_MASK: usize = 9; // 9..10
const CH_DISCARDS: usize = 11; // 11..22, 3 per seat
const CH_MELDS: usize = 23; // 23..34, 3 per seat
const CH_DORA: usize = 35; // 35..39
const CH_AKA: usize = 40; // 40..42
const CH_META: usize = 43; // 43..61

const NUM_PLAYERS: usize = 4;

/// Temporal decay factor for discard recency weighting.
const DISCARD_DECAY: f32 = 0.2;

// ---------------------------------------------------------------------------
// ObservationEncoder
// ---------------------------------------------------------------------------

/// Pre-allocated encoder buffer, reused across decisions.
#[derive(Clone)]
pub struct ObservationEncoder {
    buffer: Box<[f32; OBS_SIZE]>,
}

impl ObservationEncoder {
    pub fn new() -> Self {
        Self {
            buffer: Box::new([0.0; OBS_SIZE]),
        }
    }

    pub fn clear(&mut self) {
        self.buffer.fill(0.0);
    }

    pub fn as_slice(&self) -> &[f32] {
        &self.buffer[..]
    }

    #[inline]
    fn set(&mut self, channel: usize, tile: usize, value: f32) {
        self.buffer[channel * NUM_TILES + tile] = value;
    }

    #[inline]
    fn fill_channel(&mut self, channel: usize, value: f32) {
        let start = channel * NUM_TILES;
        self.buffer[start..start + NUM_TILES].fill(value);
    }

    /// Thermometer planes `base..base + planes` for per-type counts.
    fn thermometer(&mut self, base: usize, planes: usize, counts: &[u8; NUM_TILES]) {
        for (tile, &count) in counts.iter().enumerate() {
            for level in 0..planes.min(count as usize) {
                self.set(base + level, tile, 1.0);
            }
        }
    }
}

impl Default for ObservationEncoder {
    fn default() -> Self {
        Self::new()
    }
}

// ---------------------------------------------------------------------------
// Encoding: hands (channels 0-10)
// ---------------------------------------------------------------------------

impl ObservationEncoder {
    /// Channels 0-3: count >= 1, >= 2, >= 3, == 4.
    pub fn encode_hand(&mut self, hand_counts: &[u8; NUM_TILES]) {
        self.thermometer(CH_HAND, 4, hand_counts);
    }

    /// Channels 4-7, same thermometer over tiles locked in own melds.
    pub fn encode_open_meld_hand(&mut self, counts: &[u8; NUM_TILES]) {
        self.thermometer(CH_OPEN_MELD, 4, counts);
    }

    /// Channel 8. `None` after a call or before the first draw.
    pub fn encode_drawn_tile(&mut self, tile: Option<Tile>) {
        if let Some(ty) = tile.and_then(|t| t.tile_type()) {
            self.set(CH_DRAWN, ty, 1.0);
        }
    }

    /// Channels 9-10.
    ///
    /// - Ch 9: discarding this tile does not raise shanten.
    /// - Ch 10: discarding this tile lowers shanten.
    pub fn encode_shanten_masks(&mut self, hand: &[u8; NUM_TILES], three_player: bool) {
        let total: u8 = hand.iter().sum();
        if total % 3 != 2 {
            return;
        }
        let len_div3 = total / 3;
        let base = calc_shanten(hand, len_div3, three_player);
        let mut tmp = *hand;
        for tile in 0..NUM_TILES {
            if tmp[tile] == 0 {
                continue;
            }
            tmp[tile] -= 1;
            let after = calc_shanten(&tmp, (total - 1) / 3, three_player);
            if after <= base {
                self.set(CH_SHANTEN_MASK, tile, 1.0);
            }
            if after < base {
                self.set(CH_SHANTEN_MASK + 1, tile, 1.0);
            }
            tmp[tile] += 1;
        }
    }
}

// ---------------------------------------------------------------------------
// Encoding: rivers and melds (channels 11-34)
// ---------------------------------------------------------------------------

impl ObservationEncoder {
    /// Channels 11-22. Per relative seat: presence, tedashi and
    /// `exp(-0.2 * turns_ago)`.
    pub fn encode_discards(&mut self, state: &PlayerState) {
        for rel in 0..NUM_PLAYERS {
            let seat = (state.player_id() as usize + rel) % NUM_PLAYERS;
            let kawa = state.kawa(seat as u8);
            let ch_base = CH_DISCARDS + 3 * rel;
            let last = kawa.len().saturating_sub(1);
            for (turn, sutehai) in kawa.iter().enumerate() {
                let Some(t) = sutehai.pai.tile_type() else {
                    continue;
                };
                self.set(ch_base, t, 1.0);
                if !sutehai.tsumogiri {
                    self.set(ch_base + 1, t, 1.0);
                }
                let w = (-DISCARD_DECAY * (last - turn) as f32).exp();
                let idx = (ch_base + 2) * NUM_TILES + t;
                if w > self.buffer[idx] {
                    self.buffer[idx] = w;
                }
            }
        }
    }

    /// Channels 23-34. Per relative seat: chi, pon and any kan.
    pub fn encode_melds(&mut self, state: &PlayerState) {
        for rel in 0..NUM_PLAYERS {
            let seat = (state.player_id() as usize + rel) % NUM_PLAYERS;
            let ch_base = CH_MELDS + 3 * rel;
            for fuuro in state.fuuro(seat as u8) {
                let offset = match fuuro.kind {
                    FuuroKind::Chi => 0,
                    FuuroKind::Pon => 1,
                    FuuroKind::Daiminkan | FuuroKind::Ankan | FuuroKind::Kakan => 2,
                };
                for t in fuuro.tiles.iter().filter_map(|t| t.tile_type()) {
                    self.set(ch_base + offset, t, 1.0);
                }
            }
        }
    }
}

// ---------------------------------------------------------------------------
// Encoding: dora and aka (channels 35-42)
// ---------------------------------------------------------------------------

impl ObservationEncoder {
    /// Channels 35-39: how many indicators sit on each type, thresholded.
    pub fn encode_dora(&mut self, indicators: &[Tile]) {
        let mut counts = [0u8; NUM_TILES];
        for t in indicators.iter().filter_map(|t| t.tile_type()) {
            counts[t] = counts[t].saturating_add(1);
        }
        self.thermometer(CH_DORA, 5, &counts);
    }

    /// Channels 40-42, a full plane per held red five.
    pub fn encode_aka(&mut self, aka_flags: [bool; 3]) {
        for (suit, &has_aka) in aka_flags.iter().enumerate() {
            if has_aka {
                self.fill_channel(CH_AKA + suit, 1.0);
            }
        }
    }
}

// ---------------------------------------------------------------------------
// Encoding: metadata (channels 43-61)
// ---------------------------------------------------------------------------

/// Scalar table state, seats relative to the observer.
#[derive(Debug, Clone)]
pub struct GameMetadata {
    pub riichi: [bool; 4],
    pub scores: [i32; 4],
    pub shanten: i8,
    /// 0-7: East 1 = 0, South 4 = 7.
    pub kyoku_index: u8,
    pub honba: u8,
    pub kyotaku: u8,
}

impl GameMetadata {
    pub fn from_state(state: &PlayerState) -> Self {
        let me = state.player_id() as usize;
        let abs = state.scores();
        let riichi = std::array::from_fn(|rel| state.riichi_declared(((me + rel) % 4) as u8));
        let scores = std::array::from_fn(|rel| abs[(me + rel) % 4]);
        let wind = state.bakaze().id().saturating_sub(EAST);
        Self {
            riichi,
            scores,
            shanten: state.shanten(),
            kyoku_index: wind * 4 + state.kyoku().saturating_sub(1),
            honba: state.honba(),
            kyotaku: state.kyotaku(),
        }
    }
}

impl ObservationEncoder {
    /// Layout:
    /// - Ch 43-46: riichi flags
    /// - Ch 47-50: scores / 100000
    /// - Ch 51-54: (my - their) / 30000
    /// - Ch 55-58: shanten one-hot (0=tenpai, 1, 2, 3+)
    /// - Ch 59: kyoku_index / 8
    /// - Ch 60: honba / 10
    /// - Ch 61: kyotaku / 10
    pub fn encode_metadata(&mut self, meta: &GameMetadata) {
        for (i, &r) in meta.riichi.iter().enumerate() {
            if r {
                self.fill_channel(CH_META + i, 1.0);
            }
        }
        for (i, &score) in meta.scores.iter().enumerate() {
            self.fill_channel(CH_META + 4 + i, score as f32 / 100_000.0);
        }
        let my_score = meta.scores[0];
        for (i, &their_score) in meta.scores.iter().enumerate() {
            self.fill_channel(CH_META + 8 + i, (my_score - their_score) as f32 / 30_000.0);
        }
        let sh = meta.shanten.clamp(0, 3) as usize;
        self.fill_channel(CH_META + 12 + sh, 1.0);
        self.fill_channel(CH_META + 16, meta.kyoku_index as f32 / 8.0);
        self.fill_channel(CH_META + 17, meta.honba as f32 / 10.0);
        self.fill_channel(CH_META + 18, meta.kyotaku as f32 / 10.0);
    }
}

// ---------------------------------------------------------------------------
// Full encode entry point
// ---------------------------------------------------------------------------

impl ObservationEncoder {
    /// Clears the buffer and encodes every group from `state`.
    pub fn encode(&mut self, state: &PlayerState) -> &[f32] {
        self.clear();
        let hand = *state.tehai();
        let mut meld_counts = [0u8; NUM_TILES];
        for fuuro in state.fuuro(state.player_id()) {
            for t in fuuro.tiles.iter().filter_map(|t| t.tile_type()) {
                meld_counts[t] = meld_counts[t].saturating_add(1);
            }
        }
        self.encode_hand(&hand);
        self.encode_open_meld_hand(&meld_counts);
        self.encode_drawn_tile(state.last_self_tsumo());
        self.encode_shanten_masks(&hand, state.is_3p());
        self.encode_discards(state);
        self.encode_melds(state);
        self.encode_dora(state.dora_indicators());
        self.encode_aka(state.akas_in_hand());
        self.encode_metadata(&GameMetadata::from_state(state));
        self.as_slice()
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
