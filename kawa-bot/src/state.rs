//! Per-seat match mirror built purely from canonical events.
//!
//! `PlayerState` holds everything observable from one seat: tile counts of
//! the concealed hand, rivers, melds, riichi flags, indicators and scores.
//! After every event it recomputes which actions the seat may take next
//! ([`ActionCandidate`]) and can render them as a legal mask over either
//! variant's action space.

use kawa_core::shanten::calc_shanten;
use kawa_core::tile::{AKA_MANZU, NORTH, NUM_TILE_TYPES};
use kawa_core::{EventBody, KawaError, KawaResult, Scores, Tile};
use serde::Serialize;
use tinyvec::{ArrayVec, TinyVec};

use crate::action::{ActionKind, Variant};

/// Tile types of the three suited fives.
const FIVES: [usize; 3] = [4, 13, 22];

/// Terminal and honor tile types, for the nine-kinds abort.
const YAOCHUU: [usize; 13] = [0, 8, 9, 17, 18, 26, 27, 28, 29, 30, 31, 32, 33];

const WALL_4P: u8 = 70;
const WALL_3P: u8 = 55;

#[inline]
fn tile_of(ty: usize) -> Tile {
    Tile::new(ty as u8).unwrap_or(Tile::UNKNOWN)
}

#[inline]
fn aka_slot(ty: usize) -> Option<usize> {
    FIVES.iter().position(|&f| f == ty)
}

/// Suit-local number (1-9) of a tile type, or None for honors.
#[inline]
fn number_of(ty: usize) -> Option<usize> {
    (ty < 27).then_some(ty % 9 + 1)
}

// ---------------------------------------------------------------------------
// Items
// ---------------------------------------------------------------------------

/// One river entry.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct Sutehai {
    pub pai: Tile,
    pub tsumogiri: bool,
    /// The discard that declared riichi.
    pub riichi: bool,
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum FuuroKind {
    #[default]
    Chi,
    Pon,
    Daiminkan,
    Ankan,
    Kakan,
}

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Fuuro {
    pub kind: FuuroKind,
    /// Consumed tiles followed by the called tile, if any.
    pub tiles: ArrayVec<[Tile; 4]>,
}

/// What the seat may do in reply to the last event.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct ActionCandidate {
    pub can_discard: bool,
    pub can_riichi: bool,
    pub can_chi_low: bool,
    pub can_chi_mid: bool,
    pub can_chi_high: bool,
    pub can_pon: bool,
    pub can_daiminkan: bool,
    pub can_ankan: bool,
    pub can_kakan: bool,
    pub can_tsumo_agari: bool,
    pub can_ron_agari: bool,
    pub can_ryukyoku: bool,
    pub can_nukidora: bool,
    pub can_pass: bool,
    /// Seat the call or ron would take from.
    pub target_actor: u8,
}

impl ActionCandidate {
    #[inline]
    pub const fn can_chi(&self) -> bool {
        self.can_chi_low || self.can_chi_mid || self.can_chi_high
    }

    #[inline]
    pub const fn can_kan(&self) -> bool {
        self.can_daiminkan || self.can_ankan || self.can_kakan
    }

    #[inline]
    pub const fn can_agari(&self) -> bool {
        self.can_tsumo_agari || self.can_ron_agari
    }

    /// Any decision at all is pending for this seat.
    #[inline]
    pub const fn can_act(&self) -> bool {
        self.can_discard
            || self.can_riichi
            || self.can_chi()
            || self.can_pon
            || self.can_kan()
            || self.can_agari()
            || self.can_ryukyoku
            || self.can_nukidora
    }
}

// ---------------------------------------------------------------------------
// PlayerState
// ---------------------------------------------------------------------------

#[derive(Debug, Clone)]
pub struct PlayerState {
    player_id: u8,
    is_3p: bool,

    /// Concealed hand counts. Does not separate red fives.
    tehai: [u8; NUM_TILE_TYPES],
    akas_in_hand: [bool; 3],
    /// Sets still needed: 4 minus calls and kans.
    tehai_len_div3: u8,
    is_menzen: bool,
    shanten: i8,
    /// Tile types that may not be discarded right after a call.
    forbidden: [bool; NUM_TILE_TYPES],

    bakaze: Tile,
    /// MJAI numbering, starting at 1.
    kyoku: u8,
    honba: u8,
    kyotaku: u8,
    oya: u8,
    /// Absolute seat order.
    scores: Scores,
    tiles_left: u8,
    dora_indicators: ArrayVec<[Tile; 5]>,

    kawa: [TinyVec<[Sutehai; 24]>; 4],
    fuuro: [ArrayVec<[Fuuro; 4]>; 4],
    kita: [u8; 4],
    riichi_declared: [bool; 4],
    riichi_accepted: [bool; 4],
    /// Any call this round; closes the first-turn window.
    any_call: bool,

    last_self_tsumo: Option<Tile>,
    last_kawa_tile: Option<Tile>,
    last_cans: ActionCandidate,

    /// Both deaka'd.
    ankan_candidates: ArrayVec<[Tile; 3]>,
    kakan_candidates: ArrayVec<[Tile; 3]>,
}

impl PlayerState {
    pub fn new(player_id: u8, is_3p: bool) -> Self {
        Self {
            player_id,
            is_3p,
            tehai: [0; NUM_TILE_TYPES],
            akas_in_hand: [false; 3],
            tehai_len_div3: 4,
            is_menzen: true,
            shanten: 6,
            forbidden: [false; NUM_TILE_TYPES],
            bakaze: Tile::default(),
            kyoku: 1,
            honba: 0,
            kyotaku: 0,
            oya: 0,
            scores: [0; 4],
            tiles_left: if is_3p { WALL_3P } else { WALL_4P },
            dora_indicators: ArrayVec::new(),
            kawa: Default::default(),
            fuuro: Default::default(),
            kita: [0; 4],
            riichi_declared: [false; 4],
            riichi_accepted: [false; 4],
            any_call: false,
            last_self_tsumo: None,
            last_kawa_tile: None,
            last_cans: ActionCandidate::default(),
            ankan_candidates: ArrayVec::new(),
            kakan_candidates: ArrayVec::new(),
        }
    }

    /// Applies one event and returns what this seat may do next.
    pub fn update(&mut self, event: &EventBody) -> KawaResult<ActionCandidate> {
        self.last_cans = ActionCandidate::default();
        self.ankan_candidates.clear();
        self.kakan_candidates.clear();
        if let Some(actor) = event.actor() {
            if actor >= 4 {
                return Err(KawaError::invalid_state(format!("actor {actor} out of range")));
            }
        }

        match event {
            EventBody::StartGame { id } => *self = Self::new(*id, self.is_3p),
            EventBody::StartKyoku {
                bakaze,
                dora_marker,
                kyoku,
                honba,
                kyotaku,
                oya,
                scores,
                tehais,
                is_3p,
            } => {
                let mut fresh = Self::new(self.player_id, *is_3p);
                fresh.bakaze = *bakaze;
                fresh.kyoku = *kyoku;
                fresh.honba = *honba;
                fresh.kyotaku = *kyotaku;
                fresh.oya = *oya;
                fresh.scores = *scores;
                fresh.dora_indicators.push(*dora_marker);
                *self = fresh;
                let own = tehais
                    .get(self.player_id as usize)
                    .ok_or_else(|| KawaError::invalid_state("seat has no tehai slot"))?;
                for &tile in own.iter().filter(|t| !t.is_unknown()) {
                    self.add_tile(tile)?;
                }
                self.update_shanten();
            }
            EventBody::Tsumo { actor, pai } => {
                self.tiles_left = self.tiles_left.saturating_sub(1);
                if *actor == self.player_id {
                    self.add_tile(*pai)?;
                    self.last_self_tsumo = Some(*pai);
                    self.update_shanten();
                    self.on_own_draw(*pai);
                }
            }
            EventBody::Dahai { actor, pai, tsumogiri } => {
                let riichi = self.riichi_declared[*actor as usize]
                    && !self.riichi_accepted[*actor as usize]
                    && self.kawa[*actor as usize].iter().all(|s| !s.riichi);
                self.kawa[*actor as usize].push(Sutehai {
                    pai: *pai,
                    tsumogiri: *tsumogiri,
                    riichi,
                });
                if *actor == self.player_id {
                    self.remove_tile(*pai)?;
                    self.last_self_tsumo = None;
                    self.forbidden = [false; NUM_TILE_TYPES];
                    self.update_shanten();
                } else {
                    self.last_kawa_tile = Some(*pai);
                    self.on_other_discard(*actor, *pai);
                }
            }
            EventBody::Chi { actor, pai, consumed, .. }
            | EventBody::Pon { actor, pai, consumed, .. }
            | EventBody::Daiminkan { actor, pai, consumed, .. } => {
                let kind = match event {
                    EventBody::Chi { .. } => FuuroKind::Chi,
                    EventBody::Pon { .. } => FuuroKind::Pon,
                    _ => FuuroKind::Daiminkan,
                };
                self.any_call = true;
                self.last_kawa_tile = None;
                let mut tiles: ArrayVec<[Tile; 4]> = consumed.iter().copied().collect();
                tiles.push(*pai);
                self.push_fuuro(*actor, Fuuro { kind, tiles })?;
                if *actor == self.player_id {
                    for &tile in consumed {
                        self.remove_tile(tile)?;
                    }
                    self.is_menzen = false;
                    self.tehai_len_div3 = self.tehai_len_div3.saturating_sub(1);
                    self.update_shanten();
                    if kind != FuuroKind::Daiminkan {
                        self.mark_kuikae(kind, *pai, consumed);
                        self.last_cans.can_discard = true;
                    }
                }
            }
            EventBody::Ankan { actor, consumed } => {
                self.any_call = true;
                let tiles: ArrayVec<[Tile; 4]> = consumed.iter().copied().collect();
                self.push_fuuro(*actor, Fuuro { kind: FuuroKind::Ankan, tiles })?;
                if *actor == self.player_id {
                    for &tile in consumed {
                        self.remove_tile(tile)?;
                    }
                    self.last_self_tsumo = None;
                    self.tehai_len_div3 = self.tehai_len_div3.saturating_sub(1);
                    self.update_shanten();
                }
            }
            EventBody::Kakan { actor, pai, .. } => {
                self.any_call = true;
                let melds = &mut self.fuuro[*actor as usize];
                match melds
                    .iter_mut()
                    .find(|f| {
                        f.kind == FuuroKind::Pon
                            && f.tiles.first().is_some_and(|t| t.same_kind(*pai))
                    })
                {
                    Some(pon) => {
                        pon.kind = FuuroKind::Kakan;
                        pon.tiles.push(*pai);
                    }
                    None => log::warn!("kakan {pai} by {actor} without a matching pon"),
                }
                if *actor == self.player_id {
                    self.remove_tile(*pai)?;
                    self.last_self_tsumo = None;
                    self.update_shanten();
                } else if self.completes_hand(*pai) {
                    // chankan
                    self.last_cans.can_ron_agari = true;
                    self.last_cans.can_pass = true;
                    self.last_cans.target_actor = *actor;
                }
            }
            EventBody::Reach { actor } => {
                self.riichi_declared[*actor as usize] = true;
                if *actor == self.player_id {
                    self.last_cans.can_discard = true;
                }
            }
            EventBody::ReachAccepted { actor, scores, .. } => {
                self.riichi_accepted[*actor as usize] = true;
                self.kyotaku = self.kyotaku.saturating_add(1);
                match scores {
                    Some(scores) => self.scores = *scores,
                    None => self.scores[*actor as usize] -= 1000,
                }
            }
            EventBody::Dora { dora_marker } => {
                if self.dora_indicators.try_push(*dora_marker).is_some() {
                    log::warn!("more than five dora indicators; ignoring {dora_marker}");
                }
            }
            EventBody::Nukidora { actor, pai } => {
                self.kita[*actor as usize] += 1;
                if *actor == self.player_id {
                    self.remove_tile(*pai)?;
                    self.last_self_tsumo = None;
                    self.update_shanten();
                }
            }
            EventBody::Hora { scores, .. } | EventBody::Ryukyoku { scores, .. } => {
                if let Some(scores) = scores {
                    self.scores = *scores;
                }
            }
            EventBody::EndKyoku
            | EventBody::EndGame
            | EventBody::SystemEvent { .. }
            | EventBody::None => {}
        }

        Ok(self.last_cans)
    }
}

// ---------------------------------------------------------------------------
// Candidate computation
// ---------------------------------------------------------------------------

impl PlayerState {
    fn on_own_draw(&mut self, pai: Tile) {
        let me = self.player_id as usize;
        let in_riichi = self.riichi_declared[me];
        let cans = &mut self.last_cans;
        cans.can_discard = true;
        cans.target_actor = self.player_id;
        cans.can_tsumo_agari = self.shanten == -1;

        let min_wall = if self.is_3p { 3 } else { 4 };
        cans.can_riichi = !in_riichi
            && self.is_menzen
            && self.shanten <= 0
            && self.scores[me] >= 1000
            && self.tiles_left >= min_wall;

        if self.tiles_left > 0 {
            for ty in 0..NUM_TILE_TYPES {
                if self.tehai[ty] != 4 {
                    continue;
                }
                // after riichi only the drawn tile may complete a kan
                if in_riichi && pai.tile_type() != Some(ty) {
                    continue;
                }
                let _ = self.ankan_candidates.try_push(tile_of(ty));
            }
            if !in_riichi {
                for f in self.fuuro[me].iter().filter(|f| f.kind == FuuroKind::Pon) {
                    if let Some(ty) = f.tiles.first().and_then(|t| t.tile_type()) {
                        if self.tehai[ty] > 0 {
                            let _ = self.kakan_candidates.try_push(tile_of(ty));
                        }
                    }
                }
            }
        }
        cans.can_ankan = !self.ankan_candidates.is_empty();
        cans.can_kakan = !self.kakan_candidates.is_empty();

        let first_turn = !self.any_call && self.kawa[me].is_empty();
        cans.can_ryukyoku =
            first_turn && YAOCHUU.iter().filter(|&&ty| self.tehai[ty] > 0).count() >= 9;
        cans.can_nukidora = self.is_3p && self.tehai[NORTH as usize] > 0 && self.tiles_left > 0;
    }

    fn on_other_discard(&mut self, actor: u8, pai: Tile) {
        let Some(ty) = pai.tile_type() else {
            return;
        };
        let me = self.player_id as usize;
        let ron = self.completes_hand(pai);
        let cans = &mut self.last_cans;
        cans.target_actor = actor;
        cans.can_ron_agari = ron;

        let callable = !self.riichi_declared[me] && self.tiles_left > 0;
        if callable {
            cans.can_pon = self.tehai[ty] >= 2;
            cans.can_daiminkan = self.tehai[ty] >= 3;
            let kamicha = (self.player_id + 3) % 4;
            if !self.is_3p && actor == kamicha {
                if let Some(n) = number_of(ty) {
                    let has = |t: usize| self.tehai[t] > 0;
                    cans.can_chi_low = n <= 7 && has(ty + 1) && has(ty + 2);
                    cans.can_chi_mid = (2..=8).contains(&n) && has(ty - 1) && has(ty + 1);
                    cans.can_chi_high = n >= 3 && has(ty - 2) && has(ty - 1);
                }
            }
        }
        cans.can_pass = cans.can_act();
    }

    fn completes_hand(&self, pai: Tile) -> bool {
        let Some(ty) = pai.tile_type() else {
            return false;
        };
        let mut counts = self.tehai;
        counts[ty] += 1;
        calc_shanten(&counts, self.tehai_len_div3, self.is_3p) == -1
    }

    fn mark_kuikae(&mut self, kind: FuuroKind, pai: Tile, consumed: &[Tile]) {
        let Some(ty) = pai.tile_type() else {
            return;
        };
        self.forbidden[ty] = true;
        if kind != FuuroKind::Chi {
            return;
        }
        let (Some(n), Some(lo)) = (
            number_of(ty),
            consumed.iter().filter_map(|t| t.tile_type()).min(),
        ) else {
            return;
        };
        // suji swap: called the low end forbids the tile above the run
        if lo > ty && n <= 6 {
            self.forbidden[ty + 3] = true;
        } else if lo + 2 == ty && n >= 4 {
            self.forbidden[ty - 3] = true;
        }
    }

    fn update_shanten(&mut self) {
        self.shanten = calc_shanten(&self.tehai, self.tehai_len_div3, self.is_3p);
    }

    fn push_fuuro(&mut self, actor: u8, fuuro: Fuuro) -> KawaResult<()> {
        self.fuuro[actor as usize]
            .try_push(fuuro)
            .map_or(Ok(()), |_| {
                Err(KawaError::invalid_state(format!(
                    "seat {actor} has more than four melds"
                )))
            })
    }

    fn add_tile(&mut self, tile: Tile) -> KawaResult<()> {
        let ty = tile
            .tile_type()
            .ok_or_else(|| KawaError::invalid_state("opaque tile in own hand"))?;
        if self.tehai[ty] >= 4 {
            return Err(KawaError::invalid_state(format!("fifth copy of {tile} in hand")));
        }
        self.tehai[ty] += 1;
        if tile.is_aka() {
            self.akas_in_hand[(tile.id() - AKA_MANZU) as usize] = true;
        }
        Ok(())
    }

    fn remove_tile(&mut self, tile: Tile) -> KawaResult<()> {
        let ty = tile
            .tile_type()
            .ok_or_else(|| KawaError::invalid_state("opaque tile removed from own hand"))?;
        if self.tehai[ty] == 0 {
            return Err(KawaError::invalid_state(format!("{tile} not in hand")));
        }
        self.tehai[ty] -= 1;
        if let Some(slot) = aka_slot(ty) {
            if tile.is_aka() || self.tehai[ty] == 0 {
                self.akas_in_hand[slot] = false;
            }
        }
        Ok(())
    }
}

// ---------------------------------------------------------------------------
// Legal mask and call shapes
// ---------------------------------------------------------------------------

impl PlayerState {
    /// Legal actions for the last event over `variant`'s action space.
    pub fn legal_mask(&self, variant: Variant) -> Vec<bool> {
        let mut mask = vec![false; variant.action_space()];
        let cans = self.last_cans;
        if cans.can_discard {
            self.fill_discards(&mut mask);
        }
        let flags = [
            (ActionKind::Riichi, cans.can_riichi),
            (ActionKind::ChiLow, cans.can_chi_low),
            (ActionKind::ChiMid, cans.can_chi_mid),
            (ActionKind::ChiHigh, cans.can_chi_high),
            (ActionKind::Pon, cans.can_pon),
            (ActionKind::KanSelect, cans.can_kan()),
            (ActionKind::Hora, cans.can_agari()),
            (ActionKind::Ryukyoku, cans.can_ryukyoku),
            (ActionKind::Nukidora, cans.can_nukidora),
            (ActionKind::Pass, cans.can_pass),
        ];
        for (kind, on) in flags {
            if let (true, Some(idx)) = (on, variant.index_of(kind)) {
                mask[idx] = true;
            }
        }
        mask
    }

    fn fill_discards(&self, mask: &mut [bool]) {
        let me = self.player_id as usize;
        if self.riichi_accepted[me] {
            if let Some(tsumo) = self.last_self_tsumo {
                mask[tsumo.id() as usize] = true;
            }
            return;
        }
        let declaring = self.riichi_declared[me];
        let mut any = false;
        for pass in 0..2 {
            for ty in 0..NUM_TILE_TYPES {
                if self.tehai[ty] == 0 || (pass == 0 && self.forbidden[ty]) {
                    continue;
                }
                if declaring && !self.keeps_tenpai(ty) {
                    continue;
                }
                let aka = aka_slot(ty).filter(|&s| self.akas_in_hand[s]);
                if aka.is_none() || self.tehai[ty] > 1 {
                    mask[ty] = true;
                }
                if let Some(slot) = aka {
                    mask[AKA_MANZU as usize + slot] = true;
                }
                any = true;
            }
            if any {
                break;
            }
            // every remaining tile is forbidden; lift the restriction
        }
    }

    fn keeps_tenpai(&self, ty: usize) -> bool {
        let mut counts = self.tehai;
        counts[ty] -= 1;
        calc_shanten(&counts, self.tehai_len_div3, self.is_3p) <= 0
    }

    /// Consumed tiles for a chi on the last discard, preferring a red five.
    pub fn chi_consumed(&self, kind: ActionKind) -> Option<[Tile; 2]> {
        let ty = self.last_kawa_tile?.tile_type()?;
        let (a, b) = match kind {
            ActionKind::ChiLow => (ty + 1, ty + 2),
            ActionKind::ChiMid => (ty.checked_sub(1)?, ty + 1),
            ActionKind::ChiHigh => (ty.checked_sub(2)?, ty.checked_sub(1)?),
            _ => return None,
        };
        if a >= NUM_TILE_TYPES || b >= NUM_TILE_TYPES || self.tehai[a] == 0 || self.tehai[b] == 0 {
            return None;
        }
        Some([self.pick(a), self.pick(b)])
    }

    /// Consumed tiles for pon (2) or daiminkan (3) on the last discard.
    pub fn pon_consumed(&self, n: usize) -> Option<Vec<Tile>> {
        let ty = self.last_kawa_tile?.tile_type()?;
        if (self.tehai[ty] as usize) < n {
            return None;
        }
        let mut out = vec![tile_of(ty); n];
        if aka_slot(ty).is_some_and(|s| self.akas_in_hand[s]) {
            out[0] = tile_of(ty).akaize();
        }
        Some(out)
    }

    /// All four copies of `tile` as held for a concealed kan.
    pub fn ankan_consumed(&self, tile: Tile) -> Vec<Tile> {
        let plain = tile.deaka();
        let mut out = vec![plain; 4];
        if plain.tile_type().and_then(aka_slot).is_some_and(|s| self.akas_in_hand[s]) {
            out[0] = plain.akaize();
        }
        out
    }

    /// The copy of type `ty` to give up, red five first.
    fn pick(&self, ty: usize) -> Tile {
        match aka_slot(ty) {
            Some(s) if self.akas_in_hand[s] => tile_of(ty).akaize(),
            _ => tile_of(ty),
        }
    }
}

// ---------------------------------------------------------------------------
// Getters
// ---------------------------------------------------------------------------

impl PlayerState {
    #[inline]
    pub fn player_id(&self) -> u8 {
        self.player_id
    }

    #[inline]
    pub fn is_3p(&self) -> bool {
        self.is_3p
    }

    #[inline]
    pub fn tehai(&self) -> &[u8; NUM_TILE_TYPES] {
        &self.tehai
    }

    #[inline]
    pub fn akas_in_hand(&self) -> [bool; 3] {
        self.akas_in_hand
    }

    /// Concealed hand as tiles in display order.
    pub fn tehai_tiles(&self) -> Vec<Tile> {
        let mut out = Vec::with_capacity(14);
        for (ty, &count) in self.tehai.iter().enumerate() {
            for i in 0..count {
                let aka = i == 0 && aka_slot(ty).is_some_and(|s| self.akas_in_hand[s]);
                out.push(if aka { tile_of(ty).akaize() } else { tile_of(ty) });
            }
        }
        out
    }

    #[inline]
    pub fn shanten(&self) -> i8 {
        self.shanten
    }

    #[inline]
    pub fn is_menzen(&self) -> bool {
        self.is_menzen
    }

    #[inline]
    pub fn bakaze(&self) -> Tile {
        self.bakaze
    }

    #[inline]
    pub fn kyoku(&self) -> u8 {
        self.kyoku
    }

    #[inline]
    pub fn honba(&self) -> u8 {
        self.honba
    }

    #[inline]
    pub fn kyotaku(&self) -> u8 {
        self.kyotaku
    }

    #[inline]
    pub fn oya(&self) -> u8 {
        self.oya
    }

    #[inline]
    pub fn scores(&self) -> Scores {
        self.scores
    }

    #[inline]
    pub fn tiles_left(&self) -> u8 {
        self.tiles_left
    }

    pub fn dora_indicators(&self) -> &[Tile] {
        &self.dora_indicators
    }

    pub fn kawa(&self, seat: u8) -> &[Sutehai] {
        &self.kawa[seat as usize % 4]
    }

    pub fn fuuro(&self, seat: u8) -> &[Fuuro] {
        &self.fuuro[seat as usize % 4]
    }

    #[inline]
    pub fn kita(&self, seat: u8) -> u8 {
        self.kita[seat as usize % 4]
    }

    #[inline]
    pub fn riichi_declared(&self, seat: u8) -> bool {
        self.riichi_declared[seat as usize % 4]
    }

    #[inline]
    pub fn riichi_accepted(&self, seat: u8) -> bool {
        self.riichi_accepted[seat as usize % 4]
    }

    #[inline]
    pub fn last_self_tsumo(&self) -> Option<Tile> {
        self.last_self_tsumo
    }

    #[inline]
    pub fn last_kawa_tile(&self) -> Option<Tile> {
        self.last_kawa_tile
    }

    #[inline]
    pub fn last_cans(&self) -> ActionCandidate {
        self.last_cans
    }

    pub fn ankan_candidates(&self) -> &[Tile] {
        &self.ankan_candidates
    }

    pub fn kakan_candidates(&self) -> &[Tile] {
        &self.kakan_candidates
    }

    /// For debug only.
    pub fn brief_info(&self) -> String {
        let hand: Vec<&str> = self.tehai_tiles().iter().map(|t| t.as_str()).collect();
        format!(
            "player {} {}{}-{} shanten {} hand [{}] tsumo {:?} kawa {:?} cans {:?}",
            self.player_id,
            self.bakaze,
            self.kyoku,
            self.honba,
            self.shanten,
            hand.join(" "),
            self.last_self_tsumo,
            self.last_kawa_tile,
            self.last_cans,
        )
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------

#[cfg(test)]
mod tests {
    use super::*;
    use crate::action::{LABELS_3P, LABELS_4P};
    use kawa_core::tile::parse_tiles;

    fn t(s: &str) -> Tile {
        s.parse().unwrap()
    }

    fn start(seat: u8, hand: &[&str], is_3p: bool) -> PlayerState {
        let mut state = PlayerState::new(0, is_3p);
        state.update(&EventBody::StartGame { id: seat }).unwrap();
        let mut tehais: [Vec<Tile>; 4] = std::array::from_fn(|_| vec![Tile::UNKNOWN; 13]);
        tehais[seat as usize] = parse_tiles(hand).unwrap();
        let scores = if is_3p { [35000, 35000, 35000, 0] } else { [25000; 4] };
        state
            .update(&EventBody::StartKyoku {
                bakaze: t("E"),
                dora_marker: t("9s"),
                kyoku: 1,
                honba: 0,
                kyotaku: 0,
                oya: 0,
                scores,
                tehais,
                is_3p,
            })
            .unwrap();
        state
    }

    fn legal_labels(state: &PlayerState, variant: Variant) -> Vec<&'static str> {
        let labels: &[&str] = if variant.is_3p() { &LABELS_3P } else { &LABELS_4P };
        state
            .legal_mask(variant)
            .iter()
            .enumerate()
            .filter(|&(_, &b)| b)
            .map(|(i, _)| labels[i])
            .collect()
    }

    const TENPAI: [&str; 13] = [
        "1m", "2m", "3m", "4p", "5p", "6p", "7s", "8s", "9s", "E", "E", "E", "C",
    ];

    #[test]
    fn start_kyoku_loads_own_hand() {
        let state = start(1, &TENPAI, false);
        assert_eq!(state.tehai_tiles(), parse_tiles(&TENPAI).unwrap());
        assert_eq!(state.shanten(), 0);
        assert_eq!(state.scores(), [25000; 4]);
        assert_eq!(state.dora_indicators(), &[t("9s")]);
    }

    #[test]
    fn own_draw_enables_discard_riichi_and_tsumo() {
        let mut state = start(0, &TENPAI, false);
        let cans = state.update(&EventBody::Tsumo { actor: 0, pai: t("C") }).unwrap();
        assert!(cans.can_discard);
        assert!(cans.can_tsumo_agari);
        assert!(cans.can_riichi);
        let legal = legal_labels(&state, Variant::FourPlayer);
        assert!(legal.contains(&"hora"));
        assert!(legal.contains(&"reach"));
        assert!(legal.contains(&"C"));
        assert!(!legal.contains(&"none"));
    }

    #[test]
    fn other_discard_offers_pon_and_ron() {
        let mut state = start(0, &TENPAI, false);
        let cans = state
            .update(&EventBody::Dahai { actor: 2, pai: t("C"), tsumogiri: true })
            .unwrap();
        assert!(cans.can_ron_agari);
        assert!(!cans.can_pon);
        assert_eq!(cans.target_actor, 2);
        assert_eq!(legal_labels(&state, Variant::FourPlayer), ["hora", "none"]);

        let cans = state
            .update(&EventBody::Dahai { actor: 1, pai: t("E"), tsumogiri: false })
            .unwrap();
        assert!(cans.can_pon && cans.can_daiminkan);
    }

    #[test]
    fn chi_only_from_kamicha() {
        let mut state = start(1, &TENPAI, false);
        // seat 0 is kamicha of seat 1
        let cans = state
            .update(&EventBody::Dahai { actor: 0, pai: t("4m"), tsumogiri: false })
            .unwrap();
        assert!(cans.can_chi_high);
        assert!(!cans.can_chi_low && !cans.can_chi_mid);
        assert_eq!(state.chi_consumed(ActionKind::ChiHigh), Some([t("2m"), t("3m")]));

        let cans = state
            .update(&EventBody::Dahai { actor: 2, pai: t("4m"), tsumogiri: false })
            .unwrap();
        assert!(!cans.can_chi());
    }

    #[test]
    fn three_player_has_no_chi_but_nukidora() {
        let hand = ["1m", "9m", "1p", "2p", "3p", "4s", "5s", "6s", "N", "P", "P", "C", "C"];
        let mut state = start(1, &hand, true);
        let cans = state
            .update(&EventBody::Dahai { actor: 0, pai: t("4p"), tsumogiri: false })
            .unwrap();
        assert!(!cans.can_chi());
        let cans = state.update(&EventBody::Tsumo { actor: 1, pai: t("7s") }).unwrap();
        assert!(cans.can_nukidora);
        assert!(legal_labels(&state, Variant::ThreePlayer).contains(&"nukidora"));
        state.update(&EventBody::Nukidora { actor: 1, pai: t("N") }).unwrap();
        assert_eq!(state.kita(1), 1);
        assert_eq!(state.tehai_tiles().len(), 13);
    }

    #[test]
    fn pon_then_kuikae_forbids_same_tile() {
        let hand = ["1m", "2m", "3m", "4p", "5p", "6p", "7s", "8s", "9s", "P", "P", "P", "C"];
        let mut state = start(0, &hand, false);
        state
            .update(&EventBody::Dahai { actor: 2, pai: t("P"), tsumogiri: false })
            .unwrap();
        let cans = state
            .update(&EventBody::Pon {
                actor: 0,
                target: 2,
                pai: t("P"),
                consumed: vec![t("P"), t("P")],
            })
            .unwrap();
        assert!(cans.can_discard);
        let legal = legal_labels(&state, Variant::FourPlayer);
        assert!(!legal.contains(&"P"));
        assert!(legal.contains(&"C"));
        assert_eq!(state.tehai_tiles().len(), 11);
        assert!(!state.is_menzen());
    }

    #[test]
    fn riichi_accepted_allows_only_tsumogiri() {
        let mut state = start(0, &TENPAI, false);
        state.update(&EventBody::Tsumo { actor: 0, pai: t("2s") }).unwrap();
        state.update(&EventBody::Reach { actor: 0 }).unwrap();
        // declaring: only tenpai-keeping discards
        let legal = legal_labels(&state, Variant::FourPlayer);
        assert!(legal.contains(&"2s") && legal.contains(&"C"));
        assert!(!legal.contains(&"1m"));
        state
            .update(&EventBody::Dahai { actor: 0, pai: t("2s"), tsumogiri: true })
            .unwrap();
        state
            .update(&EventBody::ReachAccepted { actor: 0, deltas: None, scores: None })
            .unwrap();
        assert_eq!(state.scores()[0], 24000);
        assert_eq!(state.kyotaku(), 1);
        state.update(&EventBody::Tsumo { actor: 0, pai: t("9p") }).unwrap();
        assert_eq!(legal_labels(&state, Variant::FourPlayer), ["9p"]);
    }

    #[test]
    fn red_five_has_its_own_discard_slot() {
        let hand = ["1m", "2m", "3m", "5pr", "5p", "6p", "7s", "8s", "9s", "E", "E", "E", "C"];
        let mut state = start(0, &hand, false);
        state.update(&EventBody::Tsumo { actor: 0, pai: t("N") }).unwrap();
        let legal = legal_labels(&state, Variant::FourPlayer);
        assert!(legal.contains(&"5p") && legal.contains(&"5pr"));
        state
            .update(&EventBody::Dahai { actor: 0, pai: t("5pr"), tsumogiri: false })
            .unwrap();
        assert_eq!(state.akas_in_hand(), [false; 3]);
    }

    #[test]
    fn ankan_candidate_after_fourth_copy() {
        let hand = ["1m", "1m", "1m", "4p", "5p", "6p", "7s", "8s", "9s", "E", "E", "S", "C"];
        let mut state = start(0, &hand, false);
        let cans = state.update(&EventBody::Tsumo { actor: 0, pai: t("1m") }).unwrap();
        assert!(cans.can_ankan);
        assert_eq!(state.ankan_candidates(), &[t("1m")]);
        state
            .update(&EventBody::Ankan { actor: 0, consumed: vec![t("1m"); 4] })
            .unwrap();
        assert_eq!(state.tehai_tiles().len(), 10);
        assert!(state.is_menzen());
    }

    #[test]
    fn missing_tile_is_an_error() {
        let mut state = start(0, &TENPAI, false);
        let err = state
            .update(&EventBody::Dahai { actor: 0, pai: t("9p"), tsumogiri: false })
            .unwrap_err();
        assert!(err.to_string().contains("9p"));
    }

    #[test]
    fn nine_kinds_on_first_draw() {
        let hand = ["1m", "9m", "1p", "9p", "1s", "9s", "E", "S", "W", "2m", "3m", "4m", "5m"];
        let mut state = start(0, &hand, false);
        let cans = state.update(&EventBody::Tsumo { actor: 0, pai: t("N") }).unwrap();
        assert!(cans.can_ryukyoku);
    }
}
