//! kawa-bot: decision side of the kawa coaching backend.
//!
//! Consumes canonical MJAI events and produces decisions plus the payloads
//! the delivery side shows:
//!
//! - [`state::PlayerState`] mirrors one seat and enumerates legal actions.
//! - [`encoder::ObservationEncoder`] turns that mirror into a fixed tensor.
//! - [`engine::EngineProvider`] serves decisions from a remote engine behind
//!   a circuit breaker, falling back to a local ONNX model.
//! - [`controller::Controller`] binds the engine to the game variant.
//! - [`tracker::StateTracker`] answers call-enumeration queries.
//! - [`reactor::Reactor`] runs all of the above in strict order on one thread.

pub mod action;
pub mod agent;
pub mod config;
pub mod controller;
pub mod encoder;
pub mod engine;
pub mod notify;
pub mod reactor;
pub mod recommend;
pub mod response;
pub mod state;
pub mod tracker;

pub use action::Variant;
pub use agent::Agent;
pub use config::Settings;
pub use controller::Controller;
pub use engine::{EngineFactory, EngineProvider, SettingsFactory};
pub use reactor::{channel, Message, Producer, Reactor};
pub use response::{Meta, Response};
pub use tracker::StateTracker;
