//! Action envelope returned by the agent and the controller.

use kawa_core::EventBody;
use serde::{Deserialize, Serialize};

use crate::action::bits_to_mask;
use crate::engine::EngineKind;

/// Engine diagnostics attached to a decided action.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Meta {
    /// Scores of the legal actions only, in index order.
    pub q_values: Vec<f32>,
    /// Legal mask, action index `i` at bit `i`.
    pub mask_bits: u64,
    pub is_greedy: bool,
    pub engine_type: EngineKind,
    #[serde(default)]
    pub circuit_open: bool,
    #[serde(default)]
    pub is_fallback: bool,
    /// First decision after a game start.
    #[serde(default, skip_serializing_if = "std::ops::Not::not")]
    pub game_start: bool,
}

impl Meta {
    pub fn legal_mask(&self, len: usize) -> Vec<bool> {
        bits_to_mask(self.mask_bits, len)
    }

    /// Expands the compact `q_values` back onto the full action space;
    /// illegal slots get `None`.
    pub fn full_q(&self, len: usize) -> Vec<Option<f32>> {
        let mut compact = self.q_values.iter().copied();
        self.legal_mask(len)
            .into_iter()
            .map(|legal| if legal { compact.next() } else { None })
            .collect()
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Response {
    #[serde(flatten)]
    pub action: EventBody,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub meta: Option<Meta>,
}

impl Response {
    pub fn none() -> Self {
        Self::action(EventBody::None)
    }

    pub fn action(action: EventBody) -> Self {
        Self {
            action,
            error: None,
            meta: None,
        }
    }

    /// `{"type": "none", "error": code}`.
    pub fn error(code: &str) -> Self {
        Self {
            action: EventBody::None,
            error: Some(code.to_owned()),
            meta: None,
        }
    }

    pub fn with_meta(mut self, meta: Meta) -> Self {
        self.meta = Some(meta);
        self
    }

    pub fn is_none(&self) -> bool {
        matches!(self.action, EventBody::None)
    }

    pub fn is_error(&self) -> bool {
        self.error.is_some()
    }
}

impl Default for Response {
    fn default() -> Self {
        Self::none()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use kawa_core::Tile;
    use serde_json::json;

    #[test]
    fn error_envelope_shape() {
        let v = serde_json::to_value(Response::error("no_bot_loaded")).unwrap();
        assert_eq!(v, json!({"type": "none", "error": "no_bot_loaded"}));
    }

    #[test]
    fn action_with_meta_flattens() {
        let pai: Tile = "5mr".parse().unwrap();
        let dahai = EventBody::Dahai {
            actor: 0,
            pai,
            tsumogiri: false,
        };
        let r = Response::action(dahai).with_meta(Meta {
            q_values: vec![1.0, 2.0],
            mask_bits: 0b101,
            is_greedy: true,
            engine_type: EngineKind::Local,
            circuit_open: false,
            is_fallback: false,
            game_start: false,
        });
        let v = serde_json::to_value(&r).unwrap();
        assert_eq!(v["type"], "dahai");
        assert_eq!(v["pai"], "5mr");
        assert_eq!(v["meta"]["engine_type"], "local");
        assert!(v["meta"].get("game_start").is_none());
        let back: Response = serde_json::from_value(v).unwrap();
        assert_eq!(back, r);
    }

    #[test]
    fn full_q_restores_positions() {
        let meta = Meta {
            q_values: vec![0.5, -1.0],
            mask_bits: 0b1001,
            is_greedy: true,
            engine_type: EngineKind::Online,
            circuit_open: false,
            is_fallback: false,
            game_start: false,
        };
        assert_eq!(meta.full_q(4), [Some(0.5), None, None, Some(-1.0)]);
    }
}
