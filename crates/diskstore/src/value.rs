//! In-memory value graph accepted by the store
//!
//! Plain JSON shapes pass through the document format untouched; everything
//! else here is one of the extended kinds the codec wraps in a tagged form.

use indexmap::IndexMap;

/// A value that round-trips through the on-disk document format
#[derive(Debug, Clone, PartialEq)]
pub enum Value {
    Null,
    Bool(bool),
    Int(i64),
    /// Non-finite floats are representable: signed infinities survive a
    /// round trip, NaN is flattened to `Null` like `JSON.stringify` does
    Float(f64),
    String(String),
    Array(Vec<Value>),
    /// Insertion-ordered string-keyed object
    Object(IndexMap<String, Value>),
    /// Binary payload; large payloads are stored as sibling blob files
    /// instead of being inlined into the document
    Bytes(Vec<u8>),
    /// Ordered entries with arbitrary keys
    Map(Vec<(Value, Value)>),
    Set(Vec<Value>),
    Regex {
        pattern: String,
        flags: String,
    },
    /// Arbitrary-precision integer as its decimal digits
    BigInt(String),
    Error {
        name: String,
        message: String,
        code: Option<String>,
        stack: Option<String>,
    },
    /// Raw buffer, always inlined into the document
    ArrayBuffer(Vec<u8>),
    TypedArray(TypedArray),
}

impl From<bool> for Value {
    fn from(v: bool) -> Self {
        Value::Bool(v)
    }
}

impl From<i64> for Value {
    fn from(v: i64) -> Self {
        Value::Int(v)
    }
}

impl From<f64> for Value {
    fn from(v: f64) -> Self {
        Value::Float(v)
    }
}

impl From<&str> for Value {
    fn from(v: &str) -> Self {
        Value::String(v.to_string())
    }
}

impl From<String> for Value {
    fn from(v: String) -> Self {
        Value::String(v)
    }
}

impl From<Vec<u8>> for Value {
    fn from(v: Vec<u8>) -> Self {
        Value::Bytes(v)
    }
}

/// Typed numeric array payloads, one variant per element kind
///
/// The wire form is a base64 little-endian byte image, so conversions here
/// fix the byte order regardless of the host.
#[derive(Debug, Clone, PartialEq)]
pub enum TypedArray {
    Int8(Vec<i8>),
    Uint8(Vec<u8>),
    Uint8Clamped(Vec<u8>),
    Int16(Vec<i16>),
    Uint16(Vec<u16>),
    Int32(Vec<i32>),
    Uint32(Vec<u32>),
    Float32(Vec<f32>),
    Float64(Vec<f64>),
    BigInt64(Vec<i64>),
    BigUint64(Vec<u64>),
}

impl TypedArray {
    /// Wire tag identifying this variant
    pub fn tag(&self) -> &'static str {
        match self {
            Self::Int8(_) => "Int8Array",
            Self::Uint8(_) => "Uint8Array",
            Self::Uint8Clamped(_) => "Uint8ClampedArray",
            Self::Int16(_) => "Int16Array",
            Self::Uint16(_) => "Uint16Array",
            Self::Int32(_) => "Int32Array",
            Self::Uint32(_) => "Uint32Array",
            Self::Float32(_) => "Float32Array",
            Self::Float64(_) => "Float64Array",
            Self::BigInt64(_) => "BigInt64Array",
            Self::BigUint64(_) => "BigUint64Array",
        }
    }

    /// Whether a wire tag names a typed-array kind
    pub fn is_typed_array_tag(tag: &str) -> bool {
        matches!(
            tag,
            "Int8Array"
                | "Uint8Array"
                | "Uint8ClampedArray"
                | "Int16Array"
                | "Uint16Array"
                | "Int32Array"
                | "Uint32Array"
                | "Float32Array"
                | "Float64Array"
                | "BigInt64Array"
                | "BigUint64Array"
        )
    }

    /// Little-endian byte image of the element buffer
    pub fn to_le_bytes(&self) -> Vec<u8> {
        match self {
            Self::Int8(v) => v.iter().map(|x| *x as u8).collect(),
            Self::Uint8(v) | Self::Uint8Clamped(v) => v.clone(),
            Self::Int16(v) => v.iter().flat_map(|x| x.to_le_bytes()).collect(),
            Self::Uint16(v) => v.iter().flat_map(|x| x.to_le_bytes()).collect(),
            Self::Int32(v) => v.iter().flat_map(|x| x.to_le_bytes()).collect(),
            Self::Uint32(v) => v.iter().flat_map(|x| x.to_le_bytes()).collect(),
            Self::Float32(v) => v.iter().flat_map(|x| x.to_le_bytes()).collect(),
            Self::Float64(v) => v.iter().flat_map(|x| x.to_le_bytes()).collect(),
            Self::BigInt64(v) => v.iter().flat_map(|x| x.to_le_bytes()).collect(),
            Self::BigUint64(v) => v.iter().flat_map(|x| x.to_le_bytes()).collect(),
        }
    }

    /// Rebuild the typed array named by `tag` from a little-endian byte image
    ///
    /// Returns `None` when the tag is not a typed-array kind or the byte
    /// length is not a multiple of the element size.
    pub fn from_le_bytes(tag: &str, bytes: &[u8]) -> Option<Self> {
        fn elements<const N: usize, T>(bytes: &[u8], convert: fn([u8; N]) -> T) -> Option<Vec<T>> {
            if bytes.len() % N != 0 {
                return None;
            }
            Some(
                bytes
                    .chunks_exact(N)
                    .map(|chunk| {
                        let mut array = [0u8; N];
                        array.copy_from_slice(chunk);
                        convert(array)
                    })
                    .collect(),
            )
        }

        match tag {
            "Int8Array" => Some(Self::Int8(bytes.iter().map(|b| *b as i8).collect())),
            "Uint8Array" => Some(Self::Uint8(bytes.to_vec())),
            "Uint8ClampedArray" => Some(Self::Uint8Clamped(bytes.to_vec())),
            "Int16Array" => elements(bytes, i16::from_le_bytes).map(Self::Int16),
            "Uint16Array" => elements(bytes, u16::from_le_bytes).map(Self::Uint16),
            "Int32Array" => elements(bytes, i32::from_le_bytes).map(Self::Int32),
            "Uint32Array" => elements(bytes, u32::from_le_bytes).map(Self::Uint32),
            "Float32Array" => elements(bytes, f32::from_le_bytes).map(Self::Float32),
            "Float64Array" => elements(bytes, f64::from_le_bytes).map(Self::Float64),
            "BigInt64Array" => elements(bytes, i64::from_le_bytes).map(Self::BigInt64),
            "BigUint64Array" => elements(bytes, u64::from_le_bytes).map(Self::BigUint64),
            _ => None,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn typed_arrays_round_trip_through_le_bytes() {
        let arrays = vec![
            TypedArray::Int8(vec![-1, 0, 127]),
            TypedArray::Uint8(vec![0, 128, 255]),
            TypedArray::Uint8Clamped(vec![1, 2, 3]),
            TypedArray::Int16(vec![-300, 300]),
            TypedArray::Uint16(vec![0, 65535]),
            TypedArray::Int32(vec![i32::MIN, i32::MAX]),
            TypedArray::Uint32(vec![0, u32::MAX]),
            TypedArray::Float32(vec![1.5, -2.25]),
            TypedArray::Float64(vec![std::f64::consts::PI]),
            TypedArray::BigInt64(vec![i64::MIN, i64::MAX]),
            TypedArray::BigUint64(vec![0, u64::MAX]),
        ];
        for array in arrays {
            let bytes = array.to_le_bytes();
            let back = TypedArray::from_le_bytes(array.tag(), &bytes).unwrap();
            assert_eq!(array, back);
        }
    }

    #[test]
    fn misaligned_byte_images_are_rejected() {
        assert_eq!(TypedArray::from_le_bytes("Int32Array", &[1, 2, 3]), None);
        assert_eq!(TypedArray::from_le_bytes("Float64Array", &[0; 9]), None);
    }

    #[test]
    fn unknown_tags_are_not_typed_arrays() {
        assert!(!TypedArray::is_typed_array_tag("DataView"));
        assert_eq!(TypedArray::from_le_bytes("DataView", &[]), None);
    }

    #[test]
    fn conversions_pick_the_natural_variant() {
        assert_eq!(Value::from(true), Value::Bool(true));
        assert_eq!(Value::from(7i64), Value::Int(7));
        assert_eq!(Value::from("hi"), Value::String("hi".to_string()));
        assert_eq!(Value::from(vec![1u8, 2]), Value::Bytes(vec![1, 2]));
    }
}
