//! Byte-level wire codecs, one per platform.
//!
//! Codecs are stateless apart from the Majsoul request/response table; they
//! turn raw frames into platform-native structures and never emit events.

pub mod liqi;
pub mod protobuf;
pub mod riichi_city;
pub mod stomp;
pub mod tenhou;

pub use liqi::{LiqiCodec, LiqiMessage, MsgKind};
pub use protobuf::SchemaRegistry;
pub use riichi_city::RcFrame;
pub use stomp::{StompCommand, StompFrame};
pub use tenhou::{Meld, MeldKind, TenhouFrame};
