//! kawa-core: protocol side of the kawa coaching backend.
//!
//! Turns captured platform traffic (Majsoul, Tenhou, Riichi City, Amatsuki)
//! into one canonical MJAI event stream. Nothing here performs I/O.

pub mod bridge;
pub mod codec;
pub mod errors;
pub mod event;
pub mod shanten;
pub mod tile;

pub use bridge::{new_bridge, Bridge, Platform, PrivateHand};
pub use errors::{KawaError, KawaResult};
pub use event::{Event, EventBody, Scores};
pub use tile::Tile;
