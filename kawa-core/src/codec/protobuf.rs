//! Minimal protobuf wire reader/writer driven by a runtime schema.
//!
//! Only the two wire types the Majsoul protocol uses are supported: varint
//! (0) and length-delimited (2). Message layouts come from a protobufjs-style
//! JSON description loaded once into a [`SchemaRegistry`]; decoded messages
//! are plain `serde_json::Value` objects with proto3 defaults filled in and
//! `bytes` fields carried as base64 strings.

use std::collections::HashMap;
use std::sync::{Arc, OnceLock};

use base64::{engine::general_purpose::STANDARD as BASE64, Engine as _};
use serde::Deserialize;
use serde_json::{Map, Value};

use crate::errors::{KawaError, KawaResult};

const BUNDLED_SCHEMA: &str = include_str!("../../../assets/liqi.json");

// ---------------------------------------------------------------------------
// Wire blocks
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum WireValue {
    Varint(u64),
    Bytes(Vec<u8>),
}

/// One field occurrence on the wire.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Block {
    pub field: u32,
    pub value: WireValue,
}

impl Block {
    pub fn bytes(&self) -> Option<&[u8]> {
        match &self.value {
            WireValue::Bytes(b) => Some(b),
            WireValue::Varint(_) => None,
        }
    }
}

pub fn read_varint(buf: &[u8], pos: &mut usize) -> KawaResult<u64> {
    let mut value = 0u64;
    let mut shift = 0u32;
    loop {
        let Some(&byte) = buf.get(*pos) else {
            return Err(KawaError::codec("truncated varint"));
        };
        *pos += 1;
        if shift >= 64 {
            return Err(KawaError::codec("varint overflow"));
        }
        value |= u64::from(byte & 0x7F) << shift;
        if byte & 0x80 == 0 {
            return Ok(value);
        }
        shift += 7;
    }
}

pub fn write_varint(out: &mut Vec<u8>, mut value: u64) {
    while value >= 0x80 {
        out.push((value as u8 & 0x7F) | 0x80);
        value >>= 7;
    }
    out.push(value as u8);
}

/// Splits a message body into its raw field blocks.
pub fn parse_blocks(buf: &[u8]) -> KawaResult<Vec<Block>> {
    let mut blocks = Vec::new();
    let mut pos = 0;
    while pos < buf.len() {
        let key = read_varint(buf, &mut pos)?;
        let field = (key >> 3) as u32;
        let value = match key & 0x07 {
            0 => WireValue::Varint(read_varint(buf, &mut pos)?),
            2 => {
                let len = read_varint(buf, &mut pos)? as usize;
                let end = pos
                    .checked_add(len)
                    .filter(|&end| end <= buf.len())
                    .ok_or_else(|| KawaError::codec("length-delimited block overruns buffer"))?;
                let bytes = buf[pos..end].to_vec();
                pos = end;
                WireValue::Bytes(bytes)
            }
            other => {
                return Err(KawaError::codec(format!("unsupported wire type {other}")));
            }
        };
        blocks.push(Block { field, value });
    }
    Ok(blocks)
}

pub fn encode_blocks(blocks: &[Block]) -> Vec<u8> {
    let mut out = Vec::new();
    for block in blocks {
        match &block.value {
            WireValue::Varint(v) => {
                write_varint(&mut out, u64::from(block.field) << 3);
                write_varint(&mut out, *v);
            }
            WireValue::Bytes(b) => {
                write_varint(&mut out, (u64::from(block.field) << 3) | 2);
                write_varint(&mut out, b.len() as u64);
                out.extend_from_slice(b);
            }
        }
    }
    out
}

// ---------------------------------------------------------------------------
// Schema description (protobufjs JSON)
// ---------------------------------------------------------------------------

#[derive(Deserialize)]
struct RawNode {
    #[serde(default)]
    nested: HashMap<String, RawNode>,
    #[serde(default)]
    fields: Option<HashMap<String, RawField>>,
    #[serde(default)]
    methods: Option<HashMap<String, RawMethod>>,
}

#[derive(Deserialize)]
struct RawField {
    #[serde(rename = "type")]
    ty: String,
    id: u32,
    #[serde(default)]
    rule: Option<String>,
}

#[derive(Deserialize)]
#[serde(rename_all = "camelCase")]
struct RawMethod {
    request_type: String,
    response_type: String,
}

// ---------------------------------------------------------------------------
// Descriptors
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum FieldType {
    Uint32,
    Int32,
    Uint64,
    Int64,
    Bool,
    Enum,
    String,
    Bytes,
    Message(String),
}

impl FieldType {
    fn resolve(name: &str, messages: &HashMap<String, RawFieldSet>) -> Self {
        match name {
            "uint32" => FieldType::Uint32,
            "int32" | "sint32" => FieldType::Int32,
            "uint64" => FieldType::Uint64,
            "int64" | "sint64" => FieldType::Int64,
            "bool" => FieldType::Bool,
            "string" => FieldType::String,
            "bytes" => FieldType::Bytes,
            other => {
                let short = short_name(other);
                if messages.contains_key(short) {
                    FieldType::Message(short.to_owned())
                } else {
                    FieldType::Enum
                }
            }
        }
    }

    fn is_scalar_varint(&self) -> bool {
        matches!(
            self,
            FieldType::Uint32
                | FieldType::Int32
                | FieldType::Uint64
                | FieldType::Int64
                | FieldType::Bool
                | FieldType::Enum
        )
    }

    fn default_value(&self) -> Value {
        match self {
            FieldType::Bool => Value::Bool(false),
            FieldType::String | FieldType::Bytes => Value::String(String::new()),
            FieldType::Message(_) => Value::Null,
            _ => Value::from(0),
        }
    }

    fn varint_to_value(&self, raw: u64) -> Value {
        match self {
            FieldType::Bool => Value::Bool(raw != 0),
            FieldType::Int32 => Value::from(raw as i64 as i32),
            FieldType::Int64 => Value::from(raw as i64),
            FieldType::Uint32 => Value::from(raw as u32),
            _ => Value::from(raw),
        }
    }
}

#[derive(Debug, Clone)]
pub struct FieldDescriptor {
    pub name: String,
    pub number: u32,
    pub ty: FieldType,
    pub repeated: bool,
}

#[derive(Debug, Clone)]
pub struct MessageDescriptor {
    pub name: String,
    /// Sorted by field number.
    pub fields: Vec<FieldDescriptor>,
    by_number: HashMap<u32, usize>,
}

impl MessageDescriptor {
    pub fn field(&self, number: u32) -> Option<&FieldDescriptor> {
        self.by_number.get(&number).map(|&i| &self.fields[i])
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MethodDescriptor {
    pub request_type: String,
    pub response_type: String,
}

type RawFieldSet = HashMap<String, RawField>;

fn short_name(name: &str) -> &str {
    name.rsplit('.').next().unwrap_or(name)
}

// ---------------------------------------------------------------------------
// Registry
// ---------------------------------------------------------------------------

/// Message and service descriptors, keyed by short message name and by
/// fully qualified method path (`.lq.FastTest.authGame`).
#[derive(Debug, Default)]
pub struct SchemaRegistry {
    messages: HashMap<String, MessageDescriptor>,
    methods: HashMap<String, MethodDescriptor>,
}

impl SchemaRegistry {
    pub fn from_json(text: &str) -> KawaResult<Self> {
        let root: RawNode = serde_json::from_str(text)?;

        let mut raw_messages: HashMap<String, RawFieldSet> = HashMap::new();
        let mut raw_methods: Vec<(String, RawMethod)> = Vec::new();
        collect(root.nested, "", &mut raw_messages, &mut raw_methods);

        let mut messages = HashMap::with_capacity(raw_messages.len());
        for (name, fields) in &raw_messages {
            let mut descs: Vec<FieldDescriptor> = fields
                .iter()
                .map(|(field_name, raw)| FieldDescriptor {
                    name: field_name.clone(),
                    number: raw.id,
                    ty: FieldType::resolve(&raw.ty, &raw_messages),
                    repeated: raw.rule.as_deref() == Some("repeated"),
                })
                .collect();
            descs.sort_by_key(|f| f.number);
            let by_number = descs.iter().enumerate().map(|(i, f)| (f.number, i)).collect();
            messages.insert(
                name.clone(),
                MessageDescriptor {
                    name: name.clone(),
                    fields: descs,
                    by_number,
                },
            );
        }

        let methods: HashMap<String, MethodDescriptor> = raw_methods
            .into_iter()
            .map(|(path, m)| {
                (
                    path,
                    MethodDescriptor {
                        request_type: short_name(&m.request_type).to_owned(),
                        response_type: short_name(&m.response_type).to_owned(),
                    },
                )
            })
            .collect();

        log::debug!(
            "schema registry built: {} messages, {} methods",
            messages.len(),
            methods.len()
        );
        Ok(Self { messages, methods })
    }

    /// Registry for the schema shipped with the crate, parsed on first use.
    pub fn bundled() -> KawaResult<Arc<SchemaRegistry>> {
        static BUNDLED: OnceLock<Result<Arc<SchemaRegistry>, String>> = OnceLock::new();
        BUNDLED
            .get_or_init(|| {
                SchemaRegistry::from_json(BUNDLED_SCHEMA)
                    .map(Arc::new)
                    .map_err(|e| e.to_string())
            })
            .clone()
            .map_err(KawaError::config)
    }

    pub fn message(&self, name: &str) -> Option<&MessageDescriptor> {
        self.messages.get(short_name(name))
    }

    pub fn method(&self, path: &str) -> Option<&MethodDescriptor> {
        self.methods.get(path)
    }

    fn descriptor(&self, name: &str) -> KawaResult<&MessageDescriptor> {
        self.message(name)
            .ok_or_else(|| KawaError::codec(format!("unknown message type {name}")))
    }

    /// Decodes `buf` as message `type_name` into a JSON object.
    pub fn decode(&self, type_name: &str, buf: &[u8]) -> KawaResult<Value> {
        let desc = self.descriptor(type_name)?;
        let mut out = Map::new();
        for f in &desc.fields {
            let default = if f.repeated {
                Value::Array(Vec::new())
            } else {
                f.ty.default_value()
            };
            out.insert(f.name.clone(), default);
        }

        for block in parse_blocks(buf)? {
            let Some(field) = desc.field(block.field) else {
                log::trace!("{}: skipping unknown field {}", desc.name, block.field);
                continue;
            };
            let values = self.decode_field(field, block.value)?;
            let slot = out.entry(field.name.clone()).or_insert(Value::Null);
            if field.repeated {
                if let Value::Array(items) = slot {
                    items.extend(values);
                }
            } else if let Some(last) = values.into_iter().last() {
                *slot = last;
            }
        }
        Ok(Value::Object(out))
    }

    fn decode_field(&self, field: &FieldDescriptor, value: WireValue) -> KawaResult<Vec<Value>> {
        Ok(match (&field.ty, value) {
            (ty, WireValue::Varint(raw)) if ty.is_scalar_varint() => vec![ty.varint_to_value(raw)],
            (ty, WireValue::Bytes(packed)) if ty.is_scalar_varint() => {
                let mut pos = 0;
                let mut items = Vec::new();
                while pos < packed.len() {
                    items.push(ty.varint_to_value(read_varint(&packed, &mut pos)?));
                }
                items
            }
            (FieldType::String, WireValue::Bytes(b)) => {
                vec![Value::String(String::from_utf8_lossy(&b).into_owned())]
            }
            (FieldType::Bytes, WireValue::Bytes(b)) => vec![Value::String(BASE64.encode(b))],
            (FieldType::Message(name), WireValue::Bytes(b)) => vec![self.decode(name, &b)?],
            (ty, _) => {
                return Err(KawaError::codec(format!(
                    "field {} ({ty:?}) has mismatched wire type",
                    field.name
                )));
            }
        })
    }

    /// Encodes a JSON object as message `type_name`. Default-valued fields
    /// are omitted and repeated scalars are packed.
    pub fn encode(&self, type_name: &str, value: &Value) -> KawaResult<Vec<u8>> {
        let desc = self.descriptor(type_name)?;
        let obj = value
            .as_object()
            .ok_or_else(|| KawaError::codec(format!("{type_name}: expected object")))?;

        let mut blocks = Vec::new();
        for field in &desc.fields {
            let Some(v) = obj.get(&field.name) else {
                continue;
            };
            if field.repeated {
                let items = v.as_array().map(Vec::as_slice).unwrap_or_default();
                if items.is_empty() {
                    continue;
                }
                if field.ty.is_scalar_varint() {
                    let mut packed = Vec::new();
                    for item in items {
                        write_varint(&mut packed, json_to_varint(item));
                    }
                    blocks.push(Block {
                        field: field.number,
                        value: WireValue::Bytes(packed),
                    });
                } else {
                    for item in items {
                        if let Some(value) = self.encode_single(field, item)? {
                            blocks.push(Block {
                                field: field.number,
                                value,
                            });
                        }
                    }
                }
            } else if *v != field.ty.default_value() {
                if let Some(value) = self.encode_single(field, v)? {
                    blocks.push(Block {
                        field: field.number,
                        value,
                    });
                }
            }
        }
        Ok(encode_blocks(&blocks))
    }

    fn encode_single(&self, field: &FieldDescriptor, v: &Value) -> KawaResult<Option<WireValue>> {
        Ok(match &field.ty {
            ty if ty.is_scalar_varint() => Some(WireValue::Varint(json_to_varint(v))),
            FieldType::String => v.as_str().map(|s| WireValue::Bytes(s.as_bytes().to_vec())),
            FieldType::Bytes => match v.as_str() {
                Some(s) => Some(WireValue::Bytes(
                    BASE64
                        .decode(s)
                        .map_err(|e| KawaError::codec(format!("{}: {e}", field.name)))?,
                )),
                None => None,
            },
            FieldType::Message(name) if !v.is_null() => {
                Some(WireValue::Bytes(self.encode(name, v)?))
            }
            _ => None,
        })
    }
}

fn json_to_varint(v: &Value) -> u64 {
    match v {
        Value::Bool(b) => u64::from(*b),
        Value::Number(n) => n
            .as_u64()
            .or_else(|| n.as_i64().map(|i| i as u64))
            .unwrap_or_default(),
        _ => 0,
    }
}

fn collect(
    nested: HashMap<String, RawNode>,
    path: &str,
    messages: &mut HashMap<String, RawFieldSet>,
    methods: &mut Vec<(String, RawMethod)>,
) {
    for (name, node) in nested {
        let node_path = format!("{path}.{name}");
        if let Some(fields) = node.fields {
            messages.insert(name, fields);
        }
        if let Some(rpcs) = node.methods {
            for (rpc, m) in rpcs {
                methods.push((format!("{node_path}.{rpc}"), m));
            }
        }
        collect(node.nested, &node_path, messages, methods);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn varint_multibyte() {
        let mut buf = Vec::new();
        write_varint(&mut buf, 300);
        assert_eq!(buf, [0xAC, 0x02]);
        let mut pos = 0;
        assert_eq!(read_varint(&buf, &mut pos).unwrap(), 300);
        assert_eq!(pos, 2);
        assert!(read_varint(&[0x80], &mut 0).is_err());
    }

    #[test]
    fn fixed_width_wire_types_rejected() {
        // field 1, wire type 1 (fixed64)
        assert!(parse_blocks(&[0x09, 0, 0, 0, 0, 0, 0, 0, 0]).is_err());
        // length past the end
        assert!(parse_blocks(&[0x0A, 0x05, 0x01]).is_err());
    }

    #[test]
    fn bundled_registry_has_services() {
        let reg = SchemaRegistry::bundled().unwrap();
        let auth = reg.method(".lq.FastTest.authGame").unwrap();
        assert_eq!(auth.request_type, "ReqAuthGame");
        assert_eq!(auth.response_type, "ResAuthGame");
        assert!(reg.message(".lq.ActionDiscardTile").is_some());
    }

    #[test]
    fn decode_fills_defaults() {
        let reg = SchemaRegistry::bundled().unwrap();
        let v = reg.decode("ActionDiscardTile", &[]).unwrap();
        assert_eq!(v["seat"], json!(0));
        assert_eq!(v["tile"], json!(""));
        assert_eq!(v["is_liqi"], json!(false));
        assert_eq!(v["doras"], json!([]));
    }

    #[test]
    fn packed_and_unpacked_repeated() {
        let reg = SchemaRegistry::bundled().unwrap();
        // seat_list packed: [0, 2, 1]
        let packed = encode_blocks(&[Block {
            field: 3,
            value: WireValue::Bytes(vec![0, 2, 1]),
        }]);
        let v = reg.decode("ResAuthGame", &packed).unwrap();
        assert_eq!(v["seat_list"], json!([0, 2, 1]));

        let unpacked = encode_blocks(&[
            Block { field: 3, value: WireValue::Varint(7) },
            Block { field: 3, value: WireValue::Varint(9) },
        ]);
        let v = reg.decode("ResAuthGame", &unpacked).unwrap();
        assert_eq!(v["seat_list"], json!([7, 9]));
    }

    #[test]
    fn nested_message_and_negative_int32() {
        let reg = SchemaRegistry::bundled().unwrap();
        let msg = json!({
            "snapshot": {
                "chang": 1,
                "ju": 2,
                "hands": ["1m", "0p"],
                "players": [{"score": -1200}, {"score": 41200}],
            },
            "actions": [],
        });
        let buf = reg.encode("GameRestore", &msg).unwrap();
        let back = reg.decode("GameRestore", &buf).unwrap();
        assert_eq!(back["snapshot"]["ju"], json!(2));
        assert_eq!(back["snapshot"]["hands"], json!(["1m", "0p"]));
        assert_eq!(back["snapshot"]["players"][0]["score"], json!(-1200));
        assert_eq!(back["snapshot"]["players"][1]["score"], json!(41200));
    }

    #[test]
    fn unknown_message_type() {
        let reg = SchemaRegistry::from_json(r#"{"nested": {}}"#).unwrap();
        assert!(reg.decode("Nope", &[]).is_err());
    }
}
