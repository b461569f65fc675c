//! Platform bridges: stateful translators from native frames to [`Event`]s.
//!
//! One bridge instance serves exactly one live connection. It mirrors
//! whatever the platform only sends as deltas (our seat, the private hand,
//! the revealed indicator count) and stages events whose emission depends
//! on a later frame.

pub mod amatsuki;
pub mod hand;
pub mod majsoul;
pub mod riichi_city;
pub mod tenhou;

use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};

use crate::errors::{KawaError, KawaResult};
use crate::event::Event;
use crate::tile::Tile;

pub use amatsuki::AmatsukiBridge;
pub use hand::PrivateHand;
pub use majsoul::MajsoulBridge;
pub use riichi_city::RiichiCityBridge;
pub use tenhou::TenhouBridge;

pub const TEHAI_SIZE: usize = 13;

/// Capability set every platform bridge provides.
pub trait Bridge: Send {
    fn platform(&self) -> Platform;

    /// Translates one captured frame. `None` means the frame was malformed
    /// or carried nothing the bridge understands; `Some(vec![])` means it
    /// was understood but produced no events.
    fn parse(&mut self, raw: &[u8]) -> Option<Vec<Event>>;

    /// Drops all per-connection state.
    fn reset(&mut self);

    /// True once the platform reported the end of the match.
    fn game_ended(&self) -> bool;

    /// Our seat, once known.
    fn seat(&self) -> Option<u8>;
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Platform {
    Majsoul,
    Tenhou,
    RiichiCity,
    Amatsuki,
}

impl Platform {
    pub const ALL: [Platform; 4] = [
        Platform::Majsoul,
        Platform::Tenhou,
        Platform::RiichiCity,
        Platform::Amatsuki,
    ];

    pub fn as_str(self) -> &'static str {
        match self {
            Platform::Majsoul => "majsoul",
            Platform::Tenhou => "tenhou",
            Platform::RiichiCity => "riichi_city",
            Platform::Amatsuki => "amatsuki",
        }
    }

    /// Guesses the platform from a websocket URL.
    pub fn from_url(url: &str) -> Option<Platform> {
        let url = url.to_ascii_lowercase();
        let matches = |needles: &[&str]| needles.iter().any(|n| url.contains(n));
        if matches(&["majsoul", "maj-soul", "mahjongsoul"]) {
            Some(Platform::Majsoul)
        } else if matches(&["tenhou.net", "nodocchi"]) {
            Some(Platform::Tenhou)
        } else if matches(&["amatsukimj", "amatsuki"]) {
            Some(Platform::Amatsuki)
        } else if matches(&["mahjong-jp.city", "riichicity"]) {
            Some(Platform::RiichiCity)
        } else {
            None
        }
    }
}

impl fmt::Display for Platform {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for Platform {
    type Err = KawaError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Platform::ALL
            .into_iter()
            .find(|p| p.as_str() == s)
            .ok_or_else(|| KawaError::parse(s, "unknown platform"))
    }
}

/// Creates a fresh bridge for `platform`.
pub fn new_bridge(platform: Platform) -> KawaResult<Box<dyn Bridge>> {
    Ok(match platform {
        Platform::Majsoul => Box::new(MajsoulBridge::new()?),
        Platform::Tenhou => Box::new(TenhouBridge::new()),
        Platform::RiichiCity => Box::new(RiichiCityBridge::new()),
        Platform::Amatsuki => Box::new(AmatsukiBridge::new()),
    })
}

// ---------------------------------------------------------------------------
// Helpers shared by the bridges
// ---------------------------------------------------------------------------

pub(crate) fn unknown_hand() -> Vec<Tile> {
    vec![Tile::UNKNOWN; TEHAI_SIZE]
}

/// Placeholder tehais with `own` in our seat.
pub(crate) fn tehais_with(seat: u8, own: &[Tile]) -> [Vec<Tile>; 4] {
    let mut tehais: [Vec<Tile>; 4] = std::array::from_fn(|_| unknown_hand());
    if let Some(slot) = tehais.get_mut(seat as usize) {
        *slot = own.to_vec();
    }
    tehais
}

/// Pads a 3- or 4-entry score list to four seats.
pub(crate) fn scores4(scores: &[i32]) -> [i32; 4] {
    let mut out = [0; 4];
    for (dst, &src) in out.iter_mut().zip(scores) {
        *dst = src;
    }
    out
}

pub(crate) fn bakaze(index: usize) -> Tile {
    const WINDS: [&str; 4] = ["E", "S", "W", "N"];
    WINDS
        .get(index)
        .and_then(|w| w.parse().ok())
        .unwrap_or(Tile::UNKNOWN)
}

/// Consumed tiles of a concealed kan on `pai`; one red copy for suited fives.
pub(crate) fn ankan_consumed(pai: Tile) -> Vec<Tile> {
    let plain = pai.deaka();
    let mut consumed = vec![plain; 4];
    if plain.number() == Some(5) {
        consumed[0] = plain.akaize();
    }
    consumed
}

/// Consumed tiles of an added kan: the pon already on the table.
pub(crate) fn kakan_consumed(pai: Tile) -> Vec<Tile> {
    let plain = pai.deaka();
    let mut consumed = vec![plain; 3];
    if plain.number() == Some(5) && !pai.is_aka() {
        consumed[0] = plain.akaize();
    }
    consumed
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn platform_from_url() {
        assert_eq!(
            Platform::from_url("wss://gateway-hw.maj-soul.com/gateway"),
            Some(Platform::Majsoul)
        );
        assert_eq!(
            Platform::from_url("https://tenhou.net/3/"),
            Some(Platform::Tenhou)
        );
        assert_eq!(
            Platform::from_url("wss://game.amatsukimj.jp/stomp"),
            Some(Platform::Amatsuki)
        );
        assert_eq!(
            Platform::from_url("wss://cdn.mahjong-jp.city/ws"),
            Some(Platform::RiichiCity)
        );
        assert_eq!(Platform::from_url("wss://example.com"), None);
    }

    #[test]
    fn platform_names() {
        for p in Platform::ALL {
            assert_eq!(p.as_str().parse::<Platform>().unwrap(), p);
        }
        assert!("mahjongsoul".parse::<Platform>().is_err());
    }

    #[test]
    fn kan_consumed_red_handling() {
        let t = |s: &str| s.parse::<Tile>().unwrap();
        let names = |v: Vec<Tile>| v.iter().map(|t| t.as_str()).collect::<Vec<_>>();
        assert_eq!(names(ankan_consumed(t("5p"))), ["5pr", "5p", "5p", "5p"]);
        assert_eq!(names(ankan_consumed(t("E"))), ["E", "E", "E", "E"]);
        assert_eq!(names(kakan_consumed(t("5s"))), ["5sr", "5s", "5s"]);
        assert_eq!(names(kakan_consumed(t("5sr"))), ["5s", "5s", "5s"]);
        assert_eq!(names(kakan_consumed(t("3m"))), ["3m", "3m", "3m"]);
    }

    #[test]
    fn score_padding() {
        assert_eq!(scores4(&[35000, 35000, 35000]), [35000, 35000, 35000, 0]);
        assert_eq!(bakaze(1).as_str(), "S");
        assert!(bakaze(9).is_unknown());
    }
}
