//! Decoded messages: tagged values keyed by field name, in FMT order.

use crate::format::{Format, RawFmt, RECORD_HEADER_LEN};
use crate::io_utils::BinaryReader;
use crate::typemap::{PostOp, WireType};
use serde::ser::{SerializeMap, Serializer};
use serde::Serialize;
use std::sync::Arc;
use std::sync::OnceLock;

/// A single decoded field value.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(untagged)]
pub enum Value {
    Int(i64),
    UInt(u64),
    Float(f64),
    Text(String),
    Bytes(Vec<u8>),
    I16Array(Vec<i16>),
}

/// One decoded message: field name/value pairs in FMT declaration order,
/// plus the synthetic `mavpackettype` field carrying the type name.
#[derive(Debug, Clone, PartialEq)]
pub struct Message {
    fields: Vec<(Arc<str>, Value)>,
}

static PACKET_TYPE_KEY: OnceLock<Arc<str>> = OnceLock::new();

fn packet_type_key() -> Arc<str> {
    PACKET_TYPE_KEY
        .get_or_init(|| Arc::from("mavpackettype"))
        .clone()
}

impl Message {
    fn with_capacity(n: usize) -> Self {
        Self {
            fields: Vec::with_capacity(n),
        }
    }

    fn push(&mut self, name: Arc<str>, value: Value) {
        self.fields.push((name, value));
    }

    /// Field value by name.
    pub fn get(&self, name: &str) -> Option<&Value> {
        self.fields
            .iter()
            .find(|(n, _)| &**n == name)
            .map(|(_, v)| v)
    }

    /// The message type name (value of `mavpackettype`).
    pub fn packet_type(&self) -> &str {
        match self.get("mavpackettype") {
            Some(Value::Text(s)) => s,
            _ => "",
        }
    }

    /// All fields in emission order.
    pub fn fields(&self) -> &[(Arc<str>, Value)] {
        &self.fields
    }

    pub fn len(&self) -> usize {
        self.fields.len()
    }

    pub fn is_empty(&self) -> bool {
        self.fields.is_empty()
    }
}

impl Serialize for Message {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        let mut map = serializer.serialize_map(Some(self.fields.len()))?;
        for (name, value) in &self.fields {
            map.serialize_entry(&**name, value)?;
        }
        map.end()
    }
}

/// Which record classes a decode pass emits.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum MessageKind {
    /// FMT meta-records only.
    Fmt,
    /// Data records only.
    Data,
    /// Both.
    #[default]
    All,
}

/// Per-worker emission filter, applied before a message leaves a worker.
#[derive(Debug, Clone, Default)]
pub struct MessageFilter {
    /// Message type names to keep; empty passes everything. `"FMT"` selects
    /// the meta-records themselves.
    pub names: Vec<String>,
    pub kind: MessageKind,
}

impl MessageFilter {
    pub fn wants_fmt(&self) -> bool {
        self.kind != MessageKind::Data && self.passes_name("FMT")
    }

    pub fn wants_data(&self) -> bool {
        self.kind != MessageKind::Fmt
    }

    pub fn passes_name(&self, name: &str) -> bool {
        self.names.is_empty() || self.names.iter().any(|n| n == name)
    }
}

/// Options shared by every decode pass.
#[derive(Debug, Clone, Default)]
pub struct DecodeOptions {
    /// Round `ROUND_SET` fields to 7 decimals after scaling.
    pub round: bool,
    pub filter: MessageFilter,
}

/// Round to 7 decimal places, matching the reference tool's output.
fn round7(v: f64) -> f64 {
    (v * 1e7).round() / 1e7
}

/// Decode a data record of `fmt` whose sync marker sits at `offset`.
///
/// The framing scanner guarantees the full record is in bounds. Fields are
/// emitted in declaration order with `mavpackettype` appended last.
pub fn decode_data(data: &[u8], fmt: &Format, offset: usize, round: bool) -> Message {
    let mut r = BinaryReader::at_offset(data, offset + RECORD_HEADER_LEN);
    let mut msg = Message::with_capacity(fmt.codecs.len() + 1);
    for (codec, col) in fmt.codecs.iter().zip(fmt.columns.iter()) {
        let value = match codec.post {
            PostOp::Scale100 { round: round_field } => {
                let raw = match codec.wire {
                    WireType::I16 => r.read_i16() as f64,
                    WireType::U16 => r.read_u16() as f64,
                    WireType::I32 => r.read_i32() as f64,
                    WireType::U32 => r.read_u32() as f64,
                    _ => unreachable!("scaled fields are 16- or 32-bit integers"),
                };
                let v = raw / 100.0;
                Value::Float(if round && round_field { round7(v) } else { v })
            }
            PostOp::LatLon { round: round_field } => {
                let v = r.read_i32() as f64 * 1e-7;
                Value::Float(if round && round_field { round7(v) } else { v })
            }
            PostOp::Text => Value::Text(r.read_cstr(codec.wire.width())),
            PostOp::None => read_raw(&mut r, codec.wire),
        };
        msg.push(col.clone(), value);
    }
    msg.push(packet_type_key(), Value::Text(fmt.name.to_string()));
    msg
}

fn read_raw(r: &mut BinaryReader, wire: WireType) -> Value {
    match wire {
        WireType::I8 => Value::Int(r.read_i8() as i64),
        WireType::U8 => Value::UInt(r.read_u8() as u64),
        WireType::I16 => Value::Int(r.read_i16() as i64),
        WireType::U16 => Value::UInt(r.read_u16() as u64),
        WireType::I32 => Value::Int(r.read_i32() as i64),
        WireType::U32 => Value::UInt(r.read_u32() as u64),
        WireType::I64 => Value::Int(r.read_i64()),
        WireType::U64 => Value::UInt(r.read_u64()),
        WireType::F32 => Value::Float(r.read_f32() as f64),
        WireType::F64 => Value::Float(r.read_f64()),
        WireType::I16Array => Value::I16Array(r.read_i16_array(32)),
        WireType::Bytes4 => Value::Bytes(r.read_bytes(4)),
        WireType::Bytes16 => Value::Bytes(r.read_bytes(16)),
        WireType::Bytes64 => Value::Bytes(r.read_bytes(64)),
    }
}

/// Decode an FMT meta-record into its synthetic field map, mirroring the
/// reference tool's output shape.
pub fn decode_fmt(data: &[u8], offset: usize) -> Message {
    let raw = RawFmt::parse(data, offset);
    let mut msg = Message::with_capacity(6);
    msg.push(packet_type_key(), Value::Text("FMT".to_string()));
    msg.push(Arc::from("Type"), Value::UInt(raw.type_id as u64));
    msg.push(Arc::from("Length"), Value::UInt(raw.length as u64));
    msg.push(Arc::from("Name"), Value::Text(raw.name));
    msg.push(Arc::from("Format"), Value::Text(raw.types));
    msg.push(Arc::from("Columns"), Value::Text(raw.columns));
    msg
}
