//! JSON rendering for diagnostics
//!
//! [`to_json`] turns one MessagePack object into a [`serde_json::Value`];
//! [`record_document`] renders a whole decoded record. Documents are built
//! completely before they are returned.

use crate::error::DecodeError;
use crate::msgp::{MsgpError, Reader, marker::*};
use crate::record::{MetadataRecord, Payload};
use base64::Engine;
use base64::engine::general_purpose::STANDARD as BASE64;
use chrono::{DateTime, SecondsFormat};
use serde_json::{Map, Number, Value, json};
use tracing::debug;

/// Deepest nesting [`to_json`] follows
pub const MAX_DEPTH: usize = 100;

/// Extension type used for timestamps in stored metadata
const EXT_TIME: i8 = 5;

/// Standard MessagePack timestamp extension
const EXT_TIMESTAMP: i8 = -1;

/// Render the object at the front of `buf`, returning it with the bytes
/// that follow it
pub fn to_json(buf: &[u8]) -> Result<(Value, &[u8]), MsgpError> {
    let mut r = Reader::new(buf);
    let value = read_value(&mut r, 0)?;
    Ok((value, r.remaining()))
}

fn read_value(r: &mut Reader<'_>, depth: usize) -> Result<Value, MsgpError> {
    if depth > MAX_DEPTH {
        return Err(MsgpError::DepthExceeded(MAX_DEPTH));
    }

    let m = r.peek()?;
    let value = match m {
        NIL => {
            r.read_nil()?;
            Value::Null
        }
        TRUE | FALSE => Value::Bool(r.read_bool()?),
        0x00..=0x7f | UINT8 | UINT16 | UINT32 | UINT64 => Value::from(r.read_uint()?),
        0xe0..=0xff | INT8 | INT16 | INT32 | INT64 => Value::from(r.read_int()?),
        FLOAT32 | FLOAT64 => Number::from_f64(r.read_f64()?).map_or(Value::Null, Value::Number),
        0xa0..=0xbf | STR8 | STR16 | STR32 => Value::String(r.read_str()?.to_owned()),
        BIN8 | BIN16 | BIN32 => Value::String(BASE64.encode(r.read_bin()?)),
        0x90..=0x9f | ARRAY16 | ARRAY32 => {
            let n = r.read_array_len()?;
            let mut items = Vec::with_capacity(capacity(n, r));
            for _ in 0..n {
                items.push(read_value(r, depth + 1)?);
            }
            Value::Array(items)
        }
        0x80..=0x8f | MAP16 | MAP32 => {
            let n = r.read_map_len()?;
            let mut map = Map::new();
            for _ in 0..n {
                let key = read_key(r, depth + 1)?;
                let value = read_value(r, depth + 1)?;
                map.insert(key, value);
            }
            Value::Object(map)
        }
        FIXEXT1 | FIXEXT2 | FIXEXT4 | FIXEXT8 | FIXEXT16 | EXT8 | EXT16 | EXT32 => {
            let (tag, data) = r.read_ext()?;
            render_ext(tag, data)
        }
        _ => {
            return Err(MsgpError::TypeMismatch {
                expected: "object",
                found: m,
            });
        }
    };
    Ok(value)
}

/// Map keys become strings; keys that are neither str nor bin are rendered
/// as compact JSON
fn read_key(r: &mut Reader<'_>, depth: usize) -> Result<String, MsgpError> {
    match r.read_map_key() {
        Ok(key) => Ok(String::from_utf8_lossy(key).into_owned()),
        Err(MsgpError::TypeMismatch { .. }) => Ok(read_value(r, depth)?.to_string()),
        Err(e) => Err(e),
    }
}

// A length cannot promise more elements than bytes left.
fn capacity(n: u32, r: &Reader<'_>) -> usize {
    usize::try_from(n).map_or(r.len(), |n| n.min(r.len()))
}

fn render_ext(tag: i8, data: &[u8]) -> Value {
    let time = match (tag, data.len()) {
        (EXT_TIME, 12) => {
            let secs = i64::from_be_bytes(data[..8].try_into().unwrap_or_default());
            let nanos = u32::from_be_bytes(data[8..].try_into().unwrap_or_default());
            Some((secs, nanos))
        }
        (EXT_TIMESTAMP, 4) => {
            let secs = u32::from_be_bytes(data.try_into().unwrap_or_default());
            Some((i64::from(secs), 0))
        }
        (EXT_TIMESTAMP, 8) => {
            let v = u64::from_be_bytes(data.try_into().unwrap_or_default());
            let nanos = u32::try_from(v >> 34).unwrap_or_default();
            let secs = i64::try_from(v & 0x0000_0003_ffff_ffff).unwrap_or_default();
            Some((secs, nanos))
        }
        (EXT_TIMESTAMP, 12) => {
            let nanos = u32::from_be_bytes(data[..4].try_into().unwrap_or_default());
            let secs = i64::from_be_bytes(data[4..].try_into().unwrap_or_default());
            Some((secs, nanos))
        }
        _ => None,
    };

    time.and_then(|(secs, nanos)| DateTime::from_timestamp(secs, nanos))
        .map_or_else(
            || json!({ "type": tag, "data": BASE64.encode(data) }),
            |t| Value::String(t.to_rfc3339_opts(SecondsFormat::Nanos, true)),
        )
}

/// Render version metadata, which must be exactly one MessagePack object
fn render_metadata(buf: &[u8]) -> Result<Value, DecodeError> {
    let (value, rest) = to_json(buf).map_err(DecodeError::MalformedMetadata)?;
    if !rest.is_empty() {
        debug!(trailing = rest.len(), "bytes after metadata object");
        return Err(DecodeError::MalformedMetadata(MsgpError::LengthMismatch {
            want: buf.len() - rest.len(),
            got: buf.len(),
        }));
    }
    Ok(value)
}

/// Render a decoded record
///
/// With `include_inline`, the inline store is listed as key to value size.
pub fn record_document(
    record: &MetadataRecord<'_>,
    include_inline: bool,
) -> Result<Value, DecodeError> {
    let mut doc = Map::new();
    doc.insert("Major".into(), json!(record.version.major));
    doc.insert("Minor".into(), json!(record.version.minor));
    doc.insert("Checksum".into(), json!(record.checksum_status()));

    match &record.payload {
        Payload::Legacy { metadata } => {
            let (value, _) = to_json(metadata).map_err(DecodeError::MalformedMetadata)?;
            doc.insert("Metadata".into(), value);
        }
        Payload::SingleVersion { metadata, .. } => {
            doc.insert("Metadata".into(), render_metadata(metadata)?);
        }
        Payload::MultiVersion { index, .. } => {
            let versions = index
                .iter()
                .enumerate()
                .map(|(idx, entry)| {
                    let metadata = render_metadata(entry.metadata())?;
                    Ok(json!({
                        "Idx": idx,
                        "Header": entry.header.summary(),
                        "Metadata": metadata,
                    }))
                })
                .collect::<Result<Vec<_>, DecodeError>>()?;
            doc.insert("Versions".into(), Value::Array(versions));
        }
    }

    if let Some(inline) = record.inline_data().filter(|_| include_inline) {
        let sizes: Map<String, Value> = inline
            .sizes()
            .map(|(key, size)| (key.to_owned(), json!(size)))
            .collect();
        doc.insert("Inline".into(), Value::Object(sizes));
    }

    Ok(Value::Object(doc))
}
