//! On-disk document codec
//!
//! Converts an entry envelope into a self-describing JSON document plus zero
//! or more external blob payloads, and back. Values the document format
//! cannot represent natively are wrapped in a tagged object keyed by
//! [`TYPE_TAG`]; byte payloads at or above [`EXTERNAL_BUFFER_THRESHOLD`]
//! move into sibling blob files referenced by a contiguous index.
//!
//! Decoding also understands the untagged markers written by early versions
//! of the format (`{type: "Buffer", data: [...]}` and friends); that
//! fallback only fires when the explicit tag is absent.

pub mod compression;

use crate::errors::{CacheError, RecoveryHint, Result, SerializationOp};
use crate::value::{TypedArray, Value};
use base64::engine::general_purpose::STANDARD as BASE64;
use base64::Engine;
use indexmap::IndexMap;
use std::collections::HashMap;
use std::future::Future;

/// Tag field marking extended values in the wire document
pub const TYPE_TAG: &str = "__$diskstoreType";

/// Byte payloads at or above this size are stored as external blob files
/// instead of being inlined as base64
pub const EXTERNAL_BUFFER_THRESHOLD: usize = 1024;

/// Entry envelope persisted per key
#[derive(Debug, Clone, PartialEq)]
pub struct CacheEntry {
    /// Original key, stored verbatim for collision detection
    pub key: String,
    pub value: Value,
    /// Absolute expiry in epoch milliseconds; `None` never expires
    pub expire_time: Option<u64>,
}

/// Encode an entry into its primary document bytes and external blob payloads
///
/// Blob indices in the returned vec match the indices referenced by the
/// document. With `zip` both the document and every blob come back deflated.
pub fn encode(entry: &CacheEntry, zip: bool) -> Result<(Vec<u8>, Vec<Vec<u8>>)> {
    let mut blobs = Vec::new();

    let mut document = serde_json::Map::new();
    document.insert(
        "expireTime".to_string(),
        match entry.expire_time {
            Some(at) => at.into(),
            None => serde_json::Value::Null,
        },
    );
    document.insert("key".to_string(), entry.key.clone().into());
    document.insert("val".to_string(), encode_value(&entry.value, &mut blobs));

    let mut primary = serde_json::Value::Object(document).to_string().into_bytes();
    if zip {
        primary = compression::deflate(&primary)?;
        blobs = blobs
            .iter()
            .map(|blob| compression::deflate(blob))
            .collect::<Result<_>>()?;
    }
    Ok((primary, blobs))
}

/// Decode a primary document, fetching external blobs through `load_blob`
///
/// `load_blob` receives a blob index and returns the raw file bytes. All
/// referenced blobs are fetched before this returns; any fetch failure fails
/// the whole decode.
pub async fn decode<L, F>(primary: &[u8], zip: bool, load_blob: L) -> Result<CacheEntry>
where
    L: Fn(u64) -> F,
    F: Future<Output = Result<Vec<u8>>>,
{
    let inflated;
    let raw: &[u8] = if zip {
        inflated = compression::inflate(primary)?;
        &inflated
    } else {
        primary
    };

    let document: serde_json::Value =
        serde_json::from_slice(raw).map_err(|e| CacheError::Serialization {
            operation: SerializationOp::Decode,
            source: Box::new(e),
            recovery_hint: RecoveryHint::ClearAndRetry,
        })?;

    let mut refs = Vec::new();
    collect_blob_refs(&document, &mut refs)?;

    // parsing is synchronous; the referenced blobs are fetched afterwards,
    // all at once, and spliced in by index
    let fetched = futures::future::try_join_all(refs.iter().map(|blob_ref| {
        let blob_ref = *blob_ref;
        let fetch = load_blob(blob_ref.index);
        async move {
            let bytes = fetch.await?;
            let bytes = if zip {
                compression::inflate(&bytes)?
            } else {
                bytes
            };
            if bytes.len() as u64 != blob_ref.size {
                return Err(corruption(format!(
                    "external blob {} holds {} bytes, document declares {}",
                    blob_ref.index,
                    bytes.len(),
                    blob_ref.size
                )));
            }
            Ok((blob_ref.index, bytes))
        }
    }))
    .await?;
    let blobs: HashMap<u64, Vec<u8>> = fetched.into_iter().collect();

    let root = document
        .as_object()
        .ok_or_else(|| corruption("document root is not an object"))?;

    let expire_time = match root.get("expireTime") {
        None | Some(serde_json::Value::Null) => None,
        Some(serde_json::Value::Number(n)) => Some(
            n.as_u64()
                .or_else(|| n.as_f64().map(|f| f as u64))
                .ok_or_else(|| corruption("expireTime is not a valid instant"))?,
        ),
        Some(_) => return Err(corruption("expireTime is not a number")),
    };
    let key = root
        .get("key")
        .and_then(|v| v.as_str())
        .ok_or_else(|| corruption("document has no key field"))?
        .to_string();
    let value = match root.get("val") {
        Some(node) => decode_value(node, &blobs)?,
        None => Value::Null,
    };

    Ok(CacheEntry {
        key,
        value,
        expire_time,
    })
}

/// Reference to an external blob collected while parsing the document
#[derive(Debug, Clone, Copy)]
struct BlobRef {
    index: u64,
    size: u64,
}

fn corruption(reason: impl Into<String>) -> CacheError {
    CacheError::Corruption {
        reason: reason.into(),
        recovery_hint: RecoveryHint::ClearAndRetry,
    }
}

fn tagged(kind: &str, fields: &[(&str, serde_json::Value)]) -> serde_json::Value {
    let mut map = serde_json::Map::new();
    map.insert(TYPE_TAG.to_string(), kind.into());
    for (name, value) in fields {
        map.insert((*name).to_string(), value.clone());
    }
    serde_json::Value::Object(map)
}

fn encode_value(value: &Value, blobs: &mut Vec<Vec<u8>>) -> serde_json::Value {
    match value {
        Value::Null => serde_json::Value::Null,
        Value::Bool(b) => (*b).into(),
        Value::Int(i) => (*i).into(),
        Value::Float(f) => {
            if f.is_infinite() {
                let sign = if *f > 0.0 { 1 } else { -1 };
                tagged("Infinity", &[("sign", sign.into())])
            } else {
                // JSON has no NaN; it flattens to null exactly like
                // JSON.stringify
                serde_json::Number::from_f64(*f)
                    .map(serde_json::Value::Number)
                    .unwrap_or(serde_json::Value::Null)
            }
        }
        Value::String(s) => s.clone().into(),
        Value::Array(items) => serde_json::Value::Array(
            items.iter().map(|item| encode_value(item, blobs)).collect(),
        ),
        Value::Object(map) => {
            let mut out = serde_json::Map::new();
            for (k, v) in map {
                out.insert(k.clone(), encode_value(v, blobs));
            }
            serde_json::Value::Object(out)
        }
        Value::Bytes(bytes) => {
            if bytes.len() >= EXTERNAL_BUFFER_THRESHOLD {
                let index = blobs.len() as u64;
                blobs.push(bytes.clone());
                tagged(
                    "ExternalBuffer",
                    &[
                        ("index", index.into()),
                        ("size", (bytes.len() as u64).into()),
                    ],
                )
            } else {
                tagged("Buffer", &[("data64", BASE64.encode(bytes).into())])
            }
        }
        Value::Map(entries) => tagged(
            "Map",
            &[(
                "entries",
                serde_json::Value::Array(
                    entries
                        .iter()
                        .map(|(k, v)| {
                            serde_json::Value::Array(vec![
                                encode_value(k, blobs),
                                encode_value(v, blobs),
                            ])
                        })
                        .collect(),
                ),
            )],
        ),
        Value::Set(values) => tagged(
            "Set",
            &[(
                "values",
                serde_json::Value::Array(
                    values.iter().map(|item| encode_value(item, blobs)).collect(),
                ),
            )],
        ),
        Value::Regex { pattern, flags } => tagged(
            "RegExp",
            &[
                ("pattern", pattern.clone().into()),
                ("flags", flags.clone().into()),
            ],
        ),
        Value::BigInt(digits) => tagged("BigInt", &[("value", digits.clone().into())]),
        Value::Error {
            name,
            message,
            code,
            stack,
        } => {
            let mut fields: Vec<(&str, serde_json::Value)> = Vec::new();
            if let Some(code) = code {
                fields.push(("code", code.clone().into()));
            }
            fields.push(("name", name.clone().into()));
            fields.push(("message", message.clone().into()));
            if let Some(stack) = stack {
                fields.push(("stack", stack.clone().into()));
            }
            tagged("Error", &fields)
        }
        Value::ArrayBuffer(bytes) => {
            tagged("ArrayBuffer", &[("data64", BASE64.encode(bytes).into())])
        }
        Value::TypedArray(array) => tagged(
            array.tag(),
            &[("data64", BASE64.encode(array.to_le_bytes()).into())],
        ),
    }
}

fn collect_blob_refs(node: &serde_json::Value, refs: &mut Vec<BlobRef>) -> Result<()> {
    match node {
        serde_json::Value::Array(items) => {
            for item in items {
                collect_blob_refs(item, refs)?;
            }
        }
        serde_json::Value::Object(map) => {
            if extended_tag(map) == Some("ExternalBuffer") {
                refs.push(external_ref(map)?);
            } else {
                for value in map.values() {
                    collect_blob_refs(value, refs)?;
                }
            }
        }
        _ => {}
    }
    Ok(())
}

/// Extended-type tag of an object node, if any
///
/// The explicit tag wins; the legacy `type` markers are only consulted when
/// it is absent.
fn extended_tag(map: &serde_json::Map<String, serde_json::Value>) -> Option<&str> {
    if let Some(tag) = map.get(TYPE_TAG).and_then(|v| v.as_str()) {
        return Some(tag);
    }
    match map.get("type").and_then(|v| v.as_str()) {
        Some("Buffer") if map.get("data").is_some_and(|v| v.is_array()) => Some("Buffer"),
        Some("ExternalBuffer")
            if map.get("index").is_some_and(|v| v.is_number())
                && map.get("size").is_some_and(|v| v.is_number()) =>
        {
            Some("ExternalBuffer")
        }
        Some("Infinity") if map.get("sign").is_some_and(|v| v.is_number()) => Some("Infinity"),
        _ => None,
    }
}

fn external_ref(map: &serde_json::Map<String, serde_json::Value>) -> Result<BlobRef> {
    let index = map
        .get("index")
        .and_then(|v| v.as_u64())
        .ok_or_else(|| corruption("ExternalBuffer has no valid index"))?;
    let size = map
        .get("size")
        .and_then(|v| v.as_u64())
        .ok_or_else(|| corruption("ExternalBuffer has no valid size"))?;
    Ok(BlobRef { index, size })
}

fn base64_field(
    map: &serde_json::Map<String, serde_json::Value>,
    field: &str,
) -> Result<Option<Vec<u8>>> {
    match map.get(field).and_then(|v| v.as_str()) {
        Some(text) => BASE64
            .decode(text)
            .map(Some)
            .map_err(|e| corruption(format!("invalid base64 payload: {e}"))),
        None => Ok(None),
    }
}

fn decode_value(node: &serde_json::Value, blobs: &HashMap<u64, Vec<u8>>) -> Result<Value> {
    match node {
        serde_json::Value::Null => Ok(Value::Null),
        serde_json::Value::Bool(b) => Ok(Value::Bool(*b)),
        serde_json::Value::Number(n) => Ok(decode_number(n)),
        serde_json::Value::String(s) => Ok(Value::String(s.clone())),
        serde_json::Value::Array(items) => Ok(Value::Array(
            items
                .iter()
                .map(|item| decode_value(item, blobs))
                .collect::<Result<_>>()?,
        )),
        serde_json::Value::Object(map) => {
            if let Some(tag) = extended_tag(map) {
                if let Some(value) = decode_tagged(tag, map, blobs)? {
                    return Ok(value);
                }
            }
            // untagged and unknown-tagged objects pass through unchanged
            let mut out = IndexMap::new();
            for (k, v) in map {
                out.insert(k.clone(), decode_value(v, blobs)?);
            }
            Ok(Value::Object(out))
        }
    }
}

fn decode_number(n: &serde_json::Number) -> Value {
    if let Some(i) = n.as_i64() {
        Value::Int(i)
    } else {
        Value::Float(n.as_f64().unwrap_or(f64::NAN))
    }
}

fn decode_tagged(
    tag: &str,
    map: &serde_json::Map<String, serde_json::Value>,
    blobs: &HashMap<u64, Vec<u8>>,
) -> Result<Option<Value>> {
    match tag {
        "Infinity" => {
            let sign = map
                .get("sign")
                .and_then(|v| v.as_f64())
                .ok_or_else(|| corruption("Infinity marker has no numeric sign"))?;
            Ok(Some(Value::Float(f64::INFINITY * sign)))
        }
        "Buffer" => {
            if let Some(bytes) = base64_field(map, "data64")? {
                return Ok(Some(Value::Bytes(bytes)));
            }
            // early documents inlined small buffers as a plain byte array
            let data = map
                .get("data")
                .and_then(|v| v.as_array())
                .ok_or_else(|| corruption("Buffer marker has no payload"))?;
            let bytes = data
                .iter()
                .map(|item| {
                    item.as_u64()
                        .filter(|b| *b <= u8::MAX as u64)
                        .map(|b| b as u8)
                        .ok_or_else(|| corruption("Buffer byte array holds a non-byte value"))
                })
                .collect::<Result<Vec<u8>>>()?;
            Ok(Some(Value::Bytes(bytes)))
        }
        "ExternalBuffer" => {
            let blob_ref = external_ref(map)?;
            let bytes = blobs
                .get(&blob_ref.index)
                .cloned()
                .ok_or_else(|| corruption(format!("external blob {} was not loaded", blob_ref.index)))?;
            Ok(Some(Value::Bytes(bytes)))
        }
        "Map" => {
            let entries = map
                .get("entries")
                .and_then(|v| v.as_array())
                .ok_or_else(|| corruption("Map marker has no entries"))?;
            let decoded = entries
                .iter()
                .map(|entry| {
                    let pair = entry
                        .as_array()
                        .filter(|pair| pair.len() == 2)
                        .ok_or_else(|| corruption("Map entry is not a key/value pair"))?;
                    Ok((decode_value(&pair[0], blobs)?, decode_value(&pair[1], blobs)?))
                })
                .collect::<Result<Vec<_>>>()?;
            Ok(Some(Value::Map(decoded)))
        }
        "Set" => {
            let values = map
                .get("values")
                .and_then(|v| v.as_array())
                .ok_or_else(|| corruption("Set marker has no values"))?;
            Ok(Some(Value::Set(
                values
                    .iter()
                    .map(|item| decode_value(item, blobs))
                    .collect::<Result<_>>()?,
            )))
        }
        "RegExp" => {
            let pattern = map
                .get("pattern")
                .and_then(|v| v.as_str())
                .ok_or_else(|| corruption("RegExp marker has no pattern"))?
                .to_string();
            let flags = map
                .get("flags")
                .and_then(|v| v.as_str())
                .unwrap_or_default()
                .to_string();
            Ok(Some(Value::Regex { pattern, flags }))
        }
        "BigInt" => {
            let digits = map
                .get("value")
                .and_then(|v| v.as_str())
                .ok_or_else(|| corruption("BigInt marker has no value"))?
                .to_string();
            Ok(Some(Value::BigInt(digits)))
        }
        "Error" => Ok(Some(Value::Error {
            name: map
                .get("name")
                .and_then(|v| v.as_str())
                .unwrap_or("Error")
                .to_string(),
            message: map
                .get("message")
                .and_then(|v| v.as_str())
                .unwrap_or_default()
                .to_string(),
            code: map.get("code").and_then(|v| v.as_str()).map(String::from),
            stack: map.get("stack").and_then(|v| v.as_str()).map(String::from),
        })),
        "ArrayBuffer" => {
            let bytes = base64_field(map, "data64")?
                .ok_or_else(|| corruption("ArrayBuffer marker has no payload"))?;
            Ok(Some(Value::ArrayBuffer(bytes)))
        }
        tag if TypedArray::is_typed_array_tag(tag) => {
            let bytes = base64_field(map, "data64")?
                .ok_or_else(|| corruption(format!("{tag} marker has no payload")))?;
            let array = TypedArray::from_le_bytes(tag, &bytes)
                .ok_or_else(|| corruption(format!("{tag} payload length is misaligned")))?;
            Ok(Some(Value::TypedArray(array)))
        }
        _ => Ok(None),
    }
}
