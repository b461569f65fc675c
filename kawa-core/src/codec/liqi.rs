//! Majsoul ("liqi") websocket framing.
//!
//! A frame is one kind byte (1 notify, 2 request, 3 response), a
//! little-endian u16 correlation id for requests and responses, then a
//! `Wrapper` message whose first field names the method or notification
//! and whose second field holds the payload. Responses carry an empty name
//! and are matched to their request by id.

use std::collections::HashMap;
use std::sync::Arc;

use base64::{engine::general_purpose::STANDARD as BASE64, Engine as _};
use serde_json::{json, Value};

use super::protobuf::{encode_blocks, parse_blocks, Block, SchemaRegistry, WireValue};
use crate::errors::{KawaError, KawaResult};

const XOR_KEYS: [u8; 9] = [0x84, 0x5E, 0x4E, 0x42, 0x39, 0xA2, 0x1F, 0x60, 0x1C];

/// Reverses the action payload obfuscation. The transform is an involution.
pub fn xor_decode(data: &[u8]) -> Vec<u8> {
    let len = data.len();
    data.iter()
        .enumerate()
        .map(|(i, &b)| {
            let mask = ((23 ^ len) + 5 * i + XOR_KEYS[i % XOR_KEYS.len()] as usize) & 0xFF;
            b ^ mask as u8
        })
        .collect()
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MsgKind {
    Notify = 1,
    Request = 2,
    Response = 3,
}

impl MsgKind {
    fn from_byte(b: u8) -> Option<Self> {
        match b {
            1 => Some(MsgKind::Notify),
            2 => Some(MsgKind::Request),
            3 => Some(MsgKind::Response),
            _ => None,
        }
    }
}

/// A decoded frame. `method` is the notification type
/// (`.lq.ActionPrototype`) or the RPC path (`.lq.FastTest.authGame`).
#[derive(Debug, Clone, PartialEq)]
pub struct LiqiMessage {
    pub kind: MsgKind,
    pub id: Option<u16>,
    pub method: String,
    pub data: Value,
}

/// Stateful decoder for one connection.
pub struct LiqiCodec {
    registry: Arc<SchemaRegistry>,
    /// Request id -> (method path, response type).
    pending: HashMap<u16, (String, String)>,
}

impl LiqiCodec {
    pub fn new(registry: Arc<SchemaRegistry>) -> Self {
        Self {
            registry,
            pending: HashMap::new(),
        }
    }

    pub fn registry(&self) -> &SchemaRegistry {
        &self.registry
    }

    pub fn reset(&mut self) {
        self.pending.clear();
    }

    /// Decodes one frame. `Ok(None)` means the frame is well formed but not
    /// interesting (unknown method, orphan response).
    pub fn parse(&mut self, frame: &[u8]) -> KawaResult<Option<LiqiMessage>> {
        let (&kind_byte, rest) = frame
            .split_first()
            .ok_or_else(|| KawaError::codec("empty liqi frame"))?;
        let kind = MsgKind::from_byte(kind_byte)
            .ok_or_else(|| KawaError::codec(format!("unknown liqi message kind {kind_byte}")))?;

        let (id, body) = match kind {
            MsgKind::Notify => (None, rest),
            _ => {
                if rest.len() < 2 {
                    return Err(KawaError::codec("liqi frame missing correlation id"));
                }
                (Some(u16::from_le_bytes([rest[0], rest[1]])), &rest[2..])
            }
        };

        let blocks = parse_blocks(body)?;
        let name_bytes = blocks.first().and_then(Block::bytes).unwrap_or_default();
        let payload = blocks.get(1).and_then(Block::bytes).unwrap_or_default();
        let name = String::from_utf8_lossy(name_bytes).into_owned();

        match kind {
            MsgKind::Notify => {
                let Some(data) = self.decode_by_name(&name, payload)? else {
                    return Ok(None);
                };
                let data = match self.unwrap_action(&data, true)? {
                    Some(inner) => inner,
                    None => data,
                };
                Ok(Some(LiqiMessage {
                    kind,
                    id,
                    method: name,
                    data,
                }))
            }
            MsgKind::Request => {
                let Some(method) = self.registry.method(&name).cloned() else {
                    log::debug!("liqi request for unknown method {name}");
                    return Ok(None);
                };
                let data = self.registry.decode(&method.request_type, payload)?;
                if let Some(id) = id {
                    self.pending
                        .insert(id, (name.clone(), method.response_type.clone()));
                }
                Ok(Some(LiqiMessage {
                    kind,
                    id,
                    method: name,
                    data,
                }))
            }
            MsgKind::Response => {
                if !name_bytes.is_empty() {
                    return Err(KawaError::codec("liqi response carries a method name"));
                }
                let Some((method, response_type)) = id.and_then(|id| self.pending.remove(&id))
                else {
                    log::debug!("liqi response {id:?} without matching request");
                    return Ok(None);
                };
                let data = self.registry.decode(&response_type, payload)?;
                Ok(Some(LiqiMessage {
                    kind,
                    id,
                    method,
                    data,
                }))
            }
        }
    }

    fn decode_by_name(&self, name: &str, payload: &[u8]) -> KawaResult<Option<Value>> {
        if self.registry.message(name).is_none() {
            log::trace!("liqi notify {name} not in schema");
            return Ok(None);
        }
        self.registry.decode(name, payload).map(Some)
    }

    /// Decodes the inner message of an `ActionPrototype`-shaped value
    /// (`{name, data}` with base64 `data`). Live notifications are XOR
    /// obfuscated; actions replayed in a resync snapshot are not.
    /// Returns `{"name": .., "step": .., "data": {..}}` or None if the value
    /// is not an action wrapper.
    pub fn unwrap_action(&self, action: &Value, obfuscated: bool) -> KawaResult<Option<Value>> {
        let (Some(name), Some(data)) = (
            action.get("name").and_then(Value::as_str),
            action.get("data").and_then(Value::as_str),
        ) else {
            return Ok(None);
        };
        if name.is_empty() {
            return Ok(None);
        }
        let raw = BASE64
            .decode(data)
            .map_err(|e| KawaError::codec(format!("action payload: {e}")))?;
        let raw = if obfuscated { xor_decode(&raw) } else { raw };
        let inner = self.registry.decode(name, &raw)?;
        Ok(Some(json!({
            "name": name,
            "step": action.get("step").cloned().unwrap_or(Value::from(0)),
            "data": inner,
        })))
    }

    // -- encoding ---------------------------------------------------------

    /// Builds a notify frame around an already-encoded payload.
    pub fn encode_notify(&self, type_name: &str, data: &Value) -> KawaResult<Vec<u8>> {
        let payload = self.registry.encode(type_name, data)?;
        let mut frame = vec![MsgKind::Notify as u8];
        frame.extend(wrap(&format!(".lq.{type_name}"), payload));
        Ok(frame)
    }

    /// Builds the notify frame for a live action: the inner message is
    /// encoded, obfuscated and wrapped in an `ActionPrototype`.
    pub fn encode_action(&self, step: u32, name: &str, data: &Value) -> KawaResult<Vec<u8>> {
        let inner = self.registry.encode(name, data)?;
        let proto = json!({
            "step": step,
            "name": name,
            "data": BASE64.encode(xor_decode(&inner)),
        });
        self.encode_notify("ActionPrototype", &proto)
    }

    pub fn encode_request(&self, id: u16, method: &str, data: &Value) -> KawaResult<Vec<u8>> {
        let desc = self
            .registry
            .method(method)
            .ok_or_else(|| KawaError::codec(format!("unknown method {method}")))?;
        let payload = self.registry.encode(&desc.request_type, data)?;
        let mut frame = vec![MsgKind::Request as u8];
        frame.extend_from_slice(&id.to_le_bytes());
        frame.extend(wrap(method, payload));
        Ok(frame)
    }

    pub fn encode_response(&self, id: u16, method: &str, data: &Value) -> KawaResult<Vec<u8>> {
        let desc = self
            .registry
            .method(method)
            .ok_or_else(|| KawaError::codec(format!("unknown method {method}")))?;
        let payload = self.registry.encode(&desc.response_type, data)?;
        let mut frame = vec![MsgKind::Response as u8];
        frame.extend_from_slice(&id.to_le_bytes());
        frame.extend(wrap("", payload));
        Ok(frame)
    }
}

fn wrap(name: &str, payload: Vec<u8>) -> Vec<u8> {
    encode_blocks(&[
        Block {
            field: 1,
            value: WireValue::Bytes(name.as_bytes().to_vec()),
        },
        Block {
            field: 2,
            value: WireValue::Bytes(payload),
        },
    ])
}
