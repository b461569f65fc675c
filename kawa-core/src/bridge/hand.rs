//! Private-hand mirror shared by the bridges that receive tile deltas.
//!
//! The concealed part is kept sorted in display order and a drawn tile is
//! held apart until an action resolves it. Any action that does not use
//! the drawn tile folds it back into the hand, so a later draw can never
//! overwrite it.

use crate::tile::{sort_tiles, Tile};

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct PrivateHand {
    tiles: Vec<Tile>,
    tsumo: Option<Tile>,
    /// Chi, pon, daiminkan and ankan sets moved out of the hand.
    melds: u8,
}

impl PrivateHand {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn clear(&mut self) {
        *self = Self::default();
    }

    pub fn tiles(&self) -> &[Tile] {
        &self.tiles
    }

    pub fn tsumo(&self) -> Option<Tile> {
        self.tsumo
    }

    pub fn len(&self) -> usize {
        self.tiles.len()
    }

    pub fn is_empty(&self) -> bool {
        self.tiles.is_empty()
    }

    pub fn melds(&self) -> u8 {
        self.melds
    }

    /// Concealed tiles plus three per called set. 13 whenever the hand is
    /// consistent and no drawn tile is pending.
    pub fn effective_len(&self) -> usize {
        self.tiles.len() + 3 * self.melds as usize
    }

    /// Deals a 13-tile hand with an optional separately-known draw.
    pub fn deal(&mut self, mut tiles: Vec<Tile>, tsumo: Option<Tile>) {
        sort_tiles(&mut tiles);
        self.tiles = tiles;
        self.tsumo = tsumo;
        self.melds = 0;
    }

    /// Deals an initial hand where a dealer's 14th tile is not identified.
    /// All tiles are sorted and the last one becomes the draw.
    ///
    /// Known issue kept as-is: the tile split off is whatever sorts last
    /// (North after the other winds), not necessarily the tile the server
    /// actually dealt as the draw.
    pub fn deal_split(&mut self, mut tiles: Vec<Tile>) -> Option<Tile> {
        sort_tiles(&mut tiles);
        let tsumo = if tiles.len() >= 14 { tiles.pop() } else { None };
        self.tiles = tiles;
        self.tsumo = tsumo;
        self.melds = 0;
        tsumo
    }

    /// Registers a draw. A still-pending draw is folded back first.
    pub fn draw(&mut self, tile: Tile) {
        if let Some(prev) = self.tsumo.take() {
            log::warn!("draw {tile} while {prev} still pending; folding it into the hand");
            self.insert(prev);
        }
        self.tsumo = Some(tile);
    }

    /// Moves the pending draw into the sorted hand.
    pub fn fold_tsumo(&mut self) {
        if let Some(t) = self.tsumo.take() {
            self.insert(t);
        }
    }

    /// Applies a discard. Returns false if the tile could not be located.
    pub fn discard(&mut self, tile: Tile, tsumogiri: bool) -> bool {
        if tsumogiri && self.tsumo.is_some_and(|t| t.same_kind(tile)) {
            self.tsumo = None;
            return true;
        }
        let found = if self.remove_one(tile) {
            true
        } else if self.tsumo.is_some_and(|t| t.same_kind(tile)) {
            self.tsumo = None;
            true
        } else {
            false
        };
        self.fold_tsumo();
        if !found {
            log::warn!("discarded {tile} not found in tracked hand");
        }
        found
    }

    /// Removes the hand-side tiles of a chi, pon, daiminkan or ankan. The
    /// pending draw may be one of them; otherwise it is folded back.
    pub fn call(&mut self, consumed: &[Tile]) -> bool {
        let mut rest: Vec<Tile> = consumed.to_vec();
        if let Some(t) = self.tsumo {
            let pos = rest
                .iter()
                .position(|&c| c == t)
                .or_else(|| rest.iter().position(|&c| c.same_kind(t)));
            if let Some(pos) = pos {
                rest.remove(pos);
                self.tsumo = None;
            }
        }
        self.fold_tsumo();
        let mut ok = true;
        for tile in rest {
            if !self.remove_one(tile) {
                log::warn!("called tile {tile} not found in tracked hand");
                ok = false;
            }
        }
        self.melds = self.melds.saturating_add(1);
        ok
    }

    /// Upgrades an existing pon with `pai`.
    pub fn kakan(&mut self, pai: Tile) -> bool {
        if self.tsumo.is_some_and(|t| t.same_kind(pai)) {
            self.tsumo = None;
            return true;
        }
        self.fold_tsumo();
        let ok = self.remove_one(pai);
        if !ok {
            log::warn!("kakan tile {pai} not found in tracked hand");
        }
        ok
    }

    /// Sets aside one North.
    pub fn nukidora(&mut self) -> bool {
        if self.tsumo.is_some_and(|t| t == Tile::NORTH) {
            self.tsumo = None;
            return true;
        }
        let ok = self.remove_one(Tile::NORTH);
        self.fold_tsumo();
        if !ok {
            log::warn!("nukidora without a North in the tracked hand");
        }
        ok
    }

    fn insert(&mut self, tile: Tile) {
        let pos = self.tiles.partition_point(|t| t.sort_key() <= tile.sort_key());
        self.tiles.insert(pos, tile);
    }

    /// Removes one copy, preferring an exact match over a red/plain swap.
    fn remove_one(&mut self, tile: Tile) -> bool {
        let pos = self
            .tiles
            .iter()
            .position(|&t| t == tile)
            .or_else(|| self.tiles.iter().position(|&t| t.same_kind(tile)));
        match pos {
            Some(pos) => {
                self.tiles.remove(pos);
                true
            }
            None => false,
        }
    }
}
