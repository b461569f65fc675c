//! Shanten (distance to tenpai) over 34-type tile counts.
//!
//! `-1` means the hand is complete, `0` tenpai. Counts must describe the
//! concealed part only; `len_div3` is the number of sets still needed
//! (4 for a closed hand, one less per call).

use crate::tile::NUM_TILE_TYPES;

const YAOCHUU: [usize; 13] = [0, 8, 9, 17, 18, 26, 27, 28, 29, 30, 31, 32, 33];

// ---------------------------------------------------------------------------
// Normal form
// ---------------------------------------------------------------------------

struct Search {
    needed: i8,
    three_player: bool,
    best: i8,
}

impl Search {
    fn can_run(&self, idx: usize) -> bool {
        // Honors never form runs; in sanma manzu is only 1m/9m.
        idx < 27 && !(self.three_player && idx < 9)
    }

    fn score(&self, mentsu: i8, taatsu: i8, pair: bool) -> i8 {
        let taatsu = taatsu.min(self.needed - mentsu);
        2 * self.needed - 2 * mentsu - taatsu - pair as i8
    }

    fn walk(&mut self, counts: &mut [u8; NUM_TILE_TYPES], start: usize, m: i8, t: i8, pair: bool) {
        let Some(i) = (start..NUM_TILE_TYPES).find(|&i| counts[i] > 0) else {
            self.best = self.best.min(self.score(m, t, pair));
            return;
        };
        if self.best == -1 {
            return;
        }
        let pos = i % 9;

        if counts[i] >= 3 {
            counts[i] -= 3;
            self.walk(counts, i, m + 1, t, pair);
            counts[i] += 3;
        }
        if self.can_run(i) && pos <= 6 && counts[i + 1] > 0 && counts[i + 2] > 0 {
            counts[i] -= 1;
            counts[i + 1] -= 1;
            counts[i + 2] -= 1;
            self.walk(counts, i, m + 1, t, pair);
            counts[i] += 1;
            counts[i + 1] += 1;
            counts[i + 2] += 1;
        }
        if m + t < self.needed {
            if counts[i] >= 2 {
                counts[i] -= 2;
                self.walk(counts, i, m, t + 1, pair);
                counts[i] += 2;
            }
            if self.can_run(i) && pos <= 7 && counts[i + 1] > 0 {
                counts[i] -= 1;
                counts[i + 1] -= 1;
                self.walk(counts, i, m, t + 1, pair);
                counts[i] += 1;
                counts[i + 1] += 1;
            }
            if self.can_run(i) && pos <= 6 && counts[i + 2] > 0 {
                counts[i] -= 1;
                counts[i + 2] -= 1;
                self.walk(counts, i, m, t + 1, pair);
                counts[i] += 1;
                counts[i + 2] += 1;
            }
        }
        // Leave one copy isolated.
        counts[i] -= 1;
        self.walk(counts, i, m, t, pair);
        counts[i] += 1;
    }
}

pub fn calc_normal(counts: &[u8; NUM_TILE_TYPES], len_div3: u8, three_player: bool) -> i8 {
    let mut search = Search {
        needed: len_div3 as i8,
        three_player,
        best: 2 * len_div3 as i8,
    };
    let mut work = *counts;
    search.walk(&mut work, 0, 0, 0, false);
    for i in 0..NUM_TILE_TYPES {
        if work[i] >= 2 {
            work[i] -= 2;
            search.walk(&mut work, 0, 0, 0, true);
            work[i] += 2;
        }
    }
    search.best
}

// ---------------------------------------------------------------------------
// Special forms
// ---------------------------------------------------------------------------

pub fn calc_chitoi(counts: &[u8; NUM_TILE_TYPES]) -> i8 {
    let mut pairs = 0u8;
    let mut kinds = 0u8;
    for &c in counts.iter() {
        if c > 0 {
            kinds += 1;
            if c >= 2 {
                pairs += 1;
            }
        }
    }
    let missing_kinds = 7u8.saturating_sub(kinds) as i8;
    7 - pairs as i8 + missing_kinds - 1
}

pub fn calc_kokushi(counts: &[u8; NUM_TILE_TYPES]) -> i8 {
    let mut kinds = 0i8;
    let mut has_pair = false;
    for &idx in &YAOCHUU {
        if counts[idx] > 0 {
            kinds += 1;
            has_pair |= counts[idx] >= 2;
        }
    }
    14 - kinds - has_pair as i8 - 1
}

/// Best shanten over normal, seven pairs and thirteen orphans. The special
/// forms only apply to closed hands.
pub fn calc_shanten(counts: &[u8; NUM_TILE_TYPES], len_div3: u8, three_player: bool) -> i8 {
    let shanten = calc_normal(counts, len_div3, three_player);
    if shanten <= -1 || len_div3 < 4 {
        return shanten;
    }
    shanten.min(calc_chitoi(counts)).min(calc_kokushi(counts))
}
