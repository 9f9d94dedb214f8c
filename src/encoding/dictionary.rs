// Copyright 2022 RisingLight Project Authors. Licensed under Apache-2.0.

//! Dictionary interning and the dictionary index stream.
//!
//! Distinct values are keyed by their canonical byte form and assigned
//! dense indices in first-seen order. The data page then carries one byte
//! with the chosen bit width followed by an unframed hybrid run stream of
//! indices; the dictionary itself goes to a dictionary page in plain
//! encoding.

use std::collections::HashMap;

use crate::errors::{ParquetResult, TracedParquetError};
use crate::types::{bit_width_of, Value};

use super::rle::{RleDecoder, RleEncoder};

pub struct DictStore {
    lookup: HashMap<Vec<u8>, u32>,
    values: Vec<Value>,
    indices: Vec<u32>,
    value_bytes: usize,
}

impl Default for DictStore {
    fn default() -> Self {
        Self::new()
    }
}

impl DictStore {
    pub fn new() -> Self {
        Self {
            lookup: HashMap::new(),
            values: Vec::new(),
            indices: Vec::new(),
            value_bytes: 0,
        }
    }

    /// Intern `value` and record its index in the chunk's index stream.
    pub fn push(&mut self, value: &Value) -> u32 {
        let key = value.canonical_bytes();
        let index = match self.lookup.get(&key) {
            Some(&idx) => idx,
            None => {
                let idx = self.values.len() as u32;
                self.value_bytes += key.len();
                self.lookup.insert(key, idx);
                self.values.push(value.clone());
                idx
            }
        };
        self.indices.push(index);
        index
    }

    pub fn len(&self) -> usize {
        self.values.len()
    }

    pub fn is_empty(&self) -> bool {
        self.values.is_empty()
    }

    /// Distinct values in first-seen order, the dictionary page payload.
    pub fn values(&self) -> &[Value] {
        &self.values
    }

    /// Total canonical bytes of distinct values, the fallback trigger.
    pub fn byte_size(&self) -> usize {
        self.value_bytes
    }

    /// Smallest width addressing every entry; zero for a single entry.
    pub fn bit_width(&self) -> u8 {
        bit_width_of(self.values.len().saturating_sub(1) as u64)
    }

    /// Index stream of a data page: one width byte, then the hybrid body
    /// filling the remainder of the payload.
    pub fn encode_indices(&self) -> Vec<u8> {
        let width = self.bit_width();
        let mut enc = RleEncoder::new(width);
        enc.put_all(self.indices.iter().copied());
        let body = enc.finish();
        let mut out = Vec::with_capacity(1 + body.len());
        out.push(width);
        out.extend(body);
        out
    }

    pub fn reset(&mut self) {
        self.lookup.clear();
        self.values.clear();
        self.indices.clear();
        self.value_bytes = 0;
    }
}

/// Decode `count` indices and map them through the chunk's dictionary.
pub fn decode_indexed(data: &[u8], dictionary: &[Value], count: usize) -> ParquetResult<Vec<Value>> {
    let width = *data
        .first()
        .ok_or_else(|| TracedParquetError::corrupt("dictionary index stream is empty"))?;
    if width > 32 {
        return Err(TracedParquetError::corrupt(format!(
            "dictionary index width {width} exceeds 32"
        )));
    }
    let mut decoder = RleDecoder::new(&data[1..], width);
    let mut out = Vec::with_capacity(count);
    for _ in 0..count {
        let index = decoder.next()? as usize;
        let value = dictionary.get(index).ok_or_else(|| {
            TracedParquetError::corrupt(format!(
                "dictionary index {index} out of range for {} entries",
                dictionary.len()
            ))
        })?;
        out.push(value.clone());
    }
    Ok(out)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_dict_first_seen_order() {
        let mut dict = DictStore::new();
        assert_eq!(dict.push(&Value::from("b")), 0);
        assert_eq!(dict.push(&Value::from("a")), 1);
        assert_eq!(dict.push(&Value::from("b")), 0);
        assert_eq!(dict.push(&Value::from("c")), 2);
        assert_eq!(dict.len(), 3);
        assert_eq!(dict.byte_size(), 3);
        assert_eq!(
            dict.values(),
            &[Value::from("b"), Value::from("a"), Value::from("c")]
        );
    }

    #[test]
    fn test_dict_bit_width() {
        let mut dict = DictStore::new();
        dict.push(&Value::Int32(5));
        assert_eq!(dict.bit_width(), 0);
        for i in 0..4 {
            dict.push(&Value::Int32(i));
        }
        // five entries need three bits
        assert_eq!(dict.bit_width(), 3);
    }

    #[test]
    fn test_dict_index_stream_roundtrip() {
        let mut dict = DictStore::new();
        let values: Vec<Value> = (0..1000).map(|i| Value::Int64(i % 4)).collect();
        for v in &values {
            dict.push(v);
        }
        assert_eq!(dict.bit_width(), 2);
        let stream = dict.encode_indices();
        assert_eq!(stream[0], 2);
        let decoded = decode_indexed(&stream, dict.values(), values.len()).unwrap();
        assert_eq!(decoded, values);
    }

    #[test]
    fn test_dict_index_out_of_range() {
        let mut dict = DictStore::new();
        dict.push(&Value::Int32(1));
        dict.push(&Value::Int32(2));
        let stream = dict.encode_indices();
        // present a smaller dictionary than the stream references
        assert!(decode_indexed(&stream, &[Value::Int32(1)], 2).is_err());
    }

    #[test]
    fn test_dict_single_entry_zero_width() {
        let mut dict = DictStore::new();
        for _ in 0..10 {
            dict.push(&Value::from("only"));
        }
        let stream = dict.encode_indices();
        assert_eq!(stream[0], 0);
        let decoded = decode_indexed(&stream, dict.values(), 10).unwrap();
        assert!(decoded.iter().all(|v| *v == Value::from("only")));
    }
}
