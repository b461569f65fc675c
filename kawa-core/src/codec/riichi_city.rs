//! Riichi City binary frames.
//!
//! ```text
//! 0..4   u32 BE  total frame length
//! 4..8   00 0f 00 01
//! 8..12  u32 BE  message id
//! 12..14 u16 BE  message type (1 = login)
//! 14     01
//! 15..   JSON body (optional)
//! ```

use serde_json::Value;

use crate::errors::{KawaError, KawaResult};

pub const HEADER_LEN: usize = 15;
pub const SIGNATURE: [u8; 4] = [0x00, 0x0F, 0x00, 0x01];
pub const MSG_TYPE_LOGIN: u16 = 0x01;

#[derive(Debug, Clone, PartialEq)]
pub struct RcFrame {
    pub msg_id: u32,
    pub msg_type: u16,
    /// Empty object when the frame has no body.
    pub data: Value,
}

impl RcFrame {
    pub fn parse(raw: &[u8]) -> KawaResult<Self> {
        if raw.len() < HEADER_LEN {
            return Err(KawaError::codec(format!(
                "riichi city frame too short ({} bytes)",
                raw.len()
            )));
        }
        let declared = u32::from_be_bytes([raw[0], raw[1], raw[2], raw[3]]) as usize;
        if declared != raw.len() {
            return Err(KawaError::codec(format!(
                "riichi city frame length {declared} != {}",
                raw.len()
            )));
        }
        if raw[4..8] != SIGNATURE {
            return Err(KawaError::codec("riichi city signature mismatch"));
        }
        let msg_id = u32::from_be_bytes([raw[8], raw[9], raw[10], raw[11]]);
        let msg_type = u16::from_be_bytes([raw[12], raw[13]]);
        if raw[14] != 1 {
            return Err(KawaError::codec("riichi city trailer byte is not 1"));
        }
        let data = if raw.len() == HEADER_LEN {
            Value::Object(Default::default())
        } else {
            serde_json::from_slice(&raw[HEADER_LEN..])?
        };
        log::trace!("rc frame id={msg_id} type={msg_type}");
        Ok(Self {
            msg_id,
            msg_type,
            data,
        })
    }

    pub fn encode(&self) -> Vec<u8> {
        let body = match &self.data {
            Value::Object(map) if map.is_empty() => Vec::new(),
            other => other.to_string().into_bytes(),
        };
        let total = (HEADER_LEN + body.len()) as u32;
        let mut out = Vec::with_capacity(total as usize);
        out.extend_from_slice(&total.to_be_bytes());
        out.extend_from_slice(&SIGNATURE);
        out.extend_from_slice(&self.msg_id.to_be_bytes());
        out.extend_from_slice(&self.msg_type.to_be_bytes());
        out.push(1);
        out.extend_from_slice(&body);
        out
    }

    pub fn is_login(&self) -> bool {
        self.msg_type == MSG_TYPE_LOGIN
    }

    /// The `cmd` routing key, if any.
    pub fn cmd(&self) -> Option<&str> {
        self.data.get("cmd").and_then(Value::as_str)
    }
}
