// Copyright 2022 RisingLight Project Authors. Licensed under Apache-2.0.

//! Type definitions shared across the crate: the physical and logical type
//! system of the file format, and the runtime [`Value`] carried by column
//! stores and record trees.

use bytes::BufMut;

use crate::errors::{ParquetError, ParquetResult, TracedParquetError};

/// Physical storage type of a leaf column.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum PhysicalType {
    Boolean,
    Int32,
    Int64,
    Int96,
    Float,
    Double,
    ByteArray,
    FixedLenByteArray,
}

impl PhysicalType {
    pub fn to_i32(self) -> i32 {
        match self {
            Self::Boolean => 0,
            Self::Int32 => 1,
            Self::Int64 => 2,
            Self::Int96 => 3,
            Self::Float => 4,
            Self::Double => 5,
            Self::ByteArray => 6,
            Self::FixedLenByteArray => 7,
        }
    }

    pub fn from_i32(v: i32) -> ParquetResult<Self> {
        Ok(match v {
            0 => Self::Boolean,
            1 => Self::Int32,
            2 => Self::Int64,
            3 => Self::Int96,
            4 => Self::Float,
            5 => Self::Double,
            6 => Self::ByteArray,
            7 => Self::FixedLenByteArray,
            _ => return Err(TracedParquetError::corrupt(format!("invalid type {v}"))),
        })
    }
}

/// Repetition kind of a schema node.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Repetition {
    Required,
    Optional,
    Repeated,
}

impl Repetition {
    pub fn to_i32(self) -> i32 {
        match self {
            Self::Required => 0,
            Self::Optional => 1,
            Self::Repeated => 2,
        }
    }

    pub fn from_i32(v: i32) -> ParquetResult<Self> {
        Ok(match v {
            0 => Self::Required,
            1 => Self::Optional,
            2 => Self::Repeated,
            _ => {
                return Err(TracedParquetError::corrupt(format!(
                    "invalid repetition type {v}"
                )))
            }
        })
    }
}

/// Unit of a TIME or TIMESTAMP logical type.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TimeUnit {
    Millis,
    Micros,
    Nanos,
}

/// Logical (annotation) type of a leaf column.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LogicalType {
    String,
    Enum,
    Decimal { scale: i32, precision: i32 },
    Date,
    Time { unit: TimeUnit, adjusted_to_utc: bool },
    Timestamp { unit: TimeUnit, adjusted_to_utc: bool },
    Integer { bit_width: i8, signed: bool },
    Json,
    Bson,
    Uuid,
    /// Annotates the outer group of a three-level list.
    List,
    /// Annotates the outer group of a map.
    Map,
}

/// Legacy converted type, kept alongside the logical type for old readers.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ConvertedType {
    Utf8,
    Map,
    MapKeyValue,
    List,
    Enum,
    Decimal,
    Date,
    TimeMillis,
    TimeMicros,
    TimestampMillis,
    TimestampMicros,
    Uint8,
    Uint16,
    Uint32,
    Uint64,
    Int8,
    Int16,
    Int32,
    Int64,
    Json,
    Bson,
}

impl ConvertedType {
    pub fn to_i32(self) -> i32 {
        match self {
            Self::Utf8 => 0,
            Self::Map => 1,
            Self::MapKeyValue => 2,
            Self::List => 3,
            Self::Enum => 4,
            Self::Decimal => 5,
            Self::Date => 6,
            Self::TimeMillis => 7,
            Self::TimeMicros => 8,
            Self::TimestampMillis => 9,
            Self::TimestampMicros => 10,
            Self::Uint8 => 11,
            Self::Uint16 => 12,
            Self::Uint32 => 13,
            Self::Uint64 => 14,
            Self::Int8 => 15,
            Self::Int16 => 16,
            Self::Int32 => 17,
            Self::Int64 => 18,
            Self::Json => 19,
            Self::Bson => 20,
        }
    }

    pub fn from_i32(v: i32) -> ParquetResult<Self> {
        Ok(match v {
            0 => Self::Utf8,
            1 => Self::Map,
            2 => Self::MapKeyValue,
            3 => Self::List,
            4 => Self::Enum,
            5 => Self::Decimal,
            6 => Self::Date,
            7 => Self::TimeMillis,
            8 => Self::TimeMicros,
            9 => Self::TimestampMillis,
            10 => Self::TimestampMicros,
            11 => Self::Uint8,
            12 => Self::Uint16,
            13 => Self::Uint32,
            14 => Self::Uint64,
            15 => Self::Int8,
            16 => Self::Int16,
            17 => Self::Int32,
            18 => Self::Int64,
            19 => Self::Json,
            20 => Self::Bson,
            _ => {
                return Err(TracedParquetError::corrupt(format!(
                    "invalid converted type {v}"
                )))
            }
        })
    }
}

/// Value encodings of the format. `PlainDictionary` is the deprecated alias
/// of `RleDictionary` and is normalized away on the write path.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Encoding {
    Plain,
    PlainDictionary,
    Rle,
    DeltaBinaryPacked,
    DeltaLengthByteArray,
    DeltaByteArray,
    RleDictionary,
}

impl Encoding {
    pub fn to_i32(self) -> i32 {
        match self {
            Self::Plain => 0,
            Self::PlainDictionary => 2,
            Self::Rle => 3,
            Self::DeltaBinaryPacked => 5,
            Self::DeltaLengthByteArray => 6,
            Self::DeltaByteArray => 7,
            Self::RleDictionary => 8,
        }
    }

    pub fn from_i32(v: i32) -> ParquetResult<Self> {
        Ok(match v {
            0 => Self::Plain,
            2 => Self::PlainDictionary,
            3 => Self::Rle,
            5 => Self::DeltaBinaryPacked,
            6 => Self::DeltaLengthByteArray,
            7 => Self::DeltaByteArray,
            8 => Self::RleDictionary,
            _ => return Err(TracedParquetError::corrupt(format!("invalid encoding {v}"))),
        })
    }

    pub fn is_dictionary(self) -> bool {
        matches!(self, Self::PlainDictionary | Self::RleDictionary)
    }

    /// Whether this encoding may carry values of `physical`.
    pub fn supports(self, physical: PhysicalType) -> bool {
        use PhysicalType::*;
        match self {
            Self::Plain => true,
            Self::Rle => physical == Boolean,
            Self::DeltaBinaryPacked => matches!(physical, Int32 | Int64),
            Self::DeltaLengthByteArray => physical == ByteArray,
            Self::DeltaByteArray => matches!(physical, ByteArray | FixedLenByteArray),
            Self::PlainDictionary | Self::RleDictionary => physical != Boolean,
        }
    }
}

/// Compression codec applied to page payloads.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Codec {
    Uncompressed,
    Snappy,
    Gzip,
    Lz4,
    Zstd,
}

impl Codec {
    pub fn to_i32(self) -> i32 {
        match self {
            Self::Uncompressed => 0,
            Self::Snappy => 1,
            Self::Gzip => 2,
            Self::Lz4 => 5,
            Self::Zstd => 6,
        }
    }

    pub fn from_i32(v: i32) -> ParquetResult<Self> {
        Ok(match v {
            0 => Self::Uncompressed,
            1 => Self::Snappy,
            2 => Self::Gzip,
            5 => Self::Lz4,
            6 => Self::Zstd,
            _ => return Err(TracedParquetError::corrupt(format!("invalid codec {v}"))),
        })
    }
}

/// Kind of a page within a column chunk.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PageType {
    DataPage,
    DictionaryPage,
}

impl PageType {
    pub fn to_i32(self) -> i32 {
        match self {
            Self::DataPage => 0,
            Self::DictionaryPage => 2,
        }
    }

    pub fn from_i32(v: i32) -> ParquetResult<Self> {
        Ok(match v {
            0 => Self::DataPage,
            2 => Self::DictionaryPage,
            _ => {
                return Err(TracedParquetError::corrupt(format!(
                    "unsupported page type {v}"
                )))
            }
        })
    }
}

/// A primitive value as stored in a leaf column.
///
/// `ByteArray` covers both variable-length and fixed-length byte arrays;
/// the length of the latter is validated against the column's type length.
#[derive(Debug, Clone, PartialEq)]
pub enum Value {
    Boolean(bool),
    Int32(i32),
    Int64(i64),
    Int96([u8; 12]),
    Float(f32),
    Double(f64),
    ByteArray(Vec<u8>),
}

impl Value {
    pub fn physical_type(&self) -> PhysicalType {
        match self {
            Value::Boolean(_) => PhysicalType::Boolean,
            Value::Int32(_) => PhysicalType::Int32,
            Value::Int64(_) => PhysicalType::Int64,
            Value::Int96(_) => PhysicalType::Int96,
            Value::Float(_) => PhysicalType::Float,
            Value::Double(_) => PhysicalType::Double,
            Value::ByteArray(_) => PhysicalType::ByteArray,
        }
    }

    /// Whether this value may be stored in a column of `physical`.
    pub fn matches(&self, physical: PhysicalType) -> bool {
        match (self, physical) {
            (Value::ByteArray(_), PhysicalType::ByteArray | PhysicalType::FixedLenByteArray) => {
                true
            }
            _ => self.physical_type() == physical,
        }
    }

    /// Canonical byte representation: the little-endian wire bytes for
    /// fixed-width primitives, the raw payload for byte arrays. Used for
    /// dictionary interning and statistics ordering.
    pub fn canonical_bytes(&self) -> Vec<u8> {
        let mut buf = Vec::new();
        match self {
            Value::Boolean(v) => buf.put_u8(*v as u8),
            Value::Int32(v) => buf.put_i32_le(*v),
            Value::Int64(v) => buf.put_i64_le(*v),
            Value::Int96(v) => buf.put_slice(v),
            Value::Float(v) => buf.put_f32_le(*v),
            Value::Double(v) => buf.put_f64_le(*v),
            Value::ByteArray(v) => buf.put_slice(v),
        }
        buf
    }

    /// Size in bytes when plain-encoded, used for row-group accounting.
    pub fn encoded_size(&self) -> usize {
        match self {
            Value::Boolean(_) => 1,
            Value::Int32(_) | Value::Float(_) => 4,
            Value::Int64(_) | Value::Double(_) => 8,
            Value::Int96(_) => 12,
            Value::ByteArray(v) => 4 + v.len(),
        }
    }

    pub fn type_name(&self) -> &'static str {
        match self {
            Value::Boolean(_) => "boolean",
            Value::Int32(_) => "int32",
            Value::Int64(_) => "int64",
            Value::Int96(_) => "int96",
            Value::Float(_) => "float",
            Value::Double(_) => "double",
            Value::ByteArray(_) => "byte array",
        }
    }

    pub fn as_byte_array(&self) -> ParquetResult<&[u8]> {
        match self {
            Value::ByteArray(v) => Ok(v),
            other => Err(ParquetError::TypeMismatch {
                column: String::new(),
                expected: PhysicalType::ByteArray,
                got: other.type_name().into(),
            }
            .into()),
        }
    }
}

impl From<bool> for Value {
    fn from(v: bool) -> Self {
        Value::Boolean(v)
    }
}

impl From<i32> for Value {
    fn from(v: i32) -> Self {
        Value::Int32(v)
    }
}

impl From<i64> for Value {
    fn from(v: i64) -> Self {
        Value::Int64(v)
    }
}

impl From<f32> for Value {
    fn from(v: f32) -> Self {
        Value::Float(v)
    }
}

impl From<f64> for Value {
    fn from(v: f64) -> Self {
        Value::Double(v)
    }
}

impl From<&str> for Value {
    fn from(v: &str) -> Self {
        Value::ByteArray(v.as_bytes().to_vec())
    }
}

impl From<Vec<u8>> for Value {
    fn from(v: Vec<u8>) -> Self {
        Value::ByteArray(v)
    }
}

/// Number of bits needed to store values in `0..=max`.
pub fn bit_width_of(max: u64) -> u8 {
    (64 - max.leading_zeros()) as u8
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_bit_width() {
        assert_eq!(bit_width_of(0), 0);
        assert_eq!(bit_width_of(1), 1);
        assert_eq!(bit_width_of(3), 2);
        assert_eq!(bit_width_of(4), 3);
        assert_eq!(bit_width_of(255), 8);
    }

    #[test]
    fn test_value_canonical_bytes() {
        assert_eq!(Value::Int32(1).canonical_bytes(), vec![1, 0, 0, 0]);
        assert_eq!(Value::from("hi").canonical_bytes(), b"hi".to_vec());
        assert_eq!(
            Value::Double(1.0).canonical_bytes(),
            1.0f64.to_le_bytes().to_vec()
        );
    }

    #[test]
    fn test_value_matches_fixed_len() {
        let v = Value::ByteArray(vec![0; 16]);
        assert!(v.matches(PhysicalType::ByteArray));
        assert!(v.matches(PhysicalType::FixedLenByteArray));
        assert!(!v.matches(PhysicalType::Int32));
    }
}
