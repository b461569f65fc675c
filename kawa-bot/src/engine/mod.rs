//! Decision engines and the provider that arbitrates between them.
//!
//! Every engine answers the same stateless batch query: given observation
//! planes and legal masks, pick one action per item and report the scores
//! it used. All per-match state lives in [`crate::agent::Agent`].

mod breaker;
mod local;
mod provider;
mod remote;

pub use breaker::{CircuitBreaker, CircuitState, Clock, SystemClock};
pub use local::OnnxEngine;
pub use provider::{EngineFactory, EngineFlags, EngineProvider, SettingsFactory};
pub use remote::RemoteEngine;

use serde::{Deserialize, Serialize};
use thiserror::Error;

/// Which engine served a call.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum EngineKind {
    Local,
    Online,
}

impl EngineKind {
    pub const fn as_str(self) -> &'static str {
        match self {
            EngineKind::Local => "local",
            EngineKind::Online => "online",
        }
    }
}

/// Per-item answers of one batch call.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct InferenceResult {
    pub actions: Vec<usize>,
    pub q_out: Vec<Vec<f32>>,
    pub masks: Vec<Vec<bool>>,
    pub is_greedy: Vec<bool>,
}

impl InferenceResult {
    pub fn len(&self) -> usize {
        self.actions.len()
    }

    pub fn is_empty(&self) -> bool {
        self.actions.is_empty()
    }

    /// Rejects answers whose shape does not match the query.
    pub fn validate(&self, masks: &[Vec<bool>]) -> Result<(), EngineError> {
        let n = masks.len();
        if self.actions.len() != n
            || self.q_out.len() != n
            || self.masks.len() != n
            || self.is_greedy.len() != n
        {
            return Err(EngineError::Shape(format!(
                "expected {n} items, got actions={} q_out={} masks={} is_greedy={}",
                self.actions.len(),
                self.q_out.len(),
                self.masks.len(),
                self.is_greedy.len(),
            )));
        }
        for (i, (&action, mask)) in self.actions.iter().zip(masks).enumerate() {
            if !mask.get(action).copied().unwrap_or(false) {
                return Err(EngineError::Malformed(format!(
                    "item {i}: action {action} is not legal"
                )));
            }
        }
        Ok(())
    }
}

#[derive(Debug, Error)]
pub enum EngineError {
    #[error("circuit open, remote engine skipped")]
    CircuitOpen,
    #[error("transport failure: {0}")]
    Transport(String),
    #[error("remote engine answered status {0}")]
    Status(u16),
    #[error("malformed engine response: {0}")]
    Malformed(String),
    #[error("local inference failed: {0}")]
    Inference(String),
    #[error("shape mismatch: {0}")]
    Shape(String),
    #[error("no engine available")]
    Unavailable,
}

/// A stateless batch decision engine.
pub trait Engine: Send {
    fn kind(&self) -> EngineKind;

    fn react_batch(
        &mut self,
        obs: &[Vec<f32>],
        masks: &[Vec<bool>],
    ) -> Result<InferenceResult, EngineError>;

    /// While on, answer without touching the network or the model.
    fn set_sync_mode(&mut self, on: bool);
}

/// Answer used in sync mode: first legal action, zero scores, greedy.
pub fn sync_result(masks: &[Vec<bool>]) -> InferenceResult {
    InferenceResult {
        actions: masks.iter().map(|m| m.iter().position(|&b| b).unwrap_or(0)).collect(),
        q_out: masks.iter().map(|m| vec![0.0; m.len()]).collect(),
        masks: masks.to_vec(),
        is_greedy: vec![true; masks.len()],
    }
}

/// Index of the highest score among legal entries.
pub fn argmax_legal(q: &[f32], mask: &[bool]) -> Option<usize> {
    q.iter()
        .zip(mask)
        .enumerate()
        .filter(|(_, (_, &legal))| legal)
        .max_by(|(_, (a, _)), (_, (b, _))| a.total_cmp(b))
        .map(|(i, _)| i)
}
