// Copyright 2022 RisingLight Project Authors. Licensed under Apache-2.0.

//! Per-leaf column store.
//!
//! A store accumulates three parallel sequences: present values, definition
//! levels and repetition levels. Nulls touch only the level streams. When
//! the column elected dictionary encoding, present values are additionally
//! interned until the dictionary outgrows its byte limit, at which point
//! the chunk downgrades to plain for good.

use std::cmp::Ordering;

use tracing::warn;

use crate::encoding::DictStore;
use crate::errors::{ParquetError, ParquetResult, TracedParquetError};
use crate::types::{Codec, Encoding, PhysicalType, Value};

/// Leaf description supplied to `Schema::add_column`.
#[derive(Debug, Clone)]
pub struct ColumnDescriptor {
    pub physical: PhysicalType,
    pub type_length: Option<usize>,
    pub logical: Option<crate::types::LogicalType>,
    pub converted: Option<crate::types::ConvertedType>,
    pub encoding: Encoding,
    /// Overrides the file-level codec when set.
    pub codec: Option<Codec>,
}

impl ColumnDescriptor {
    pub fn new(physical: PhysicalType) -> Self {
        // dictionary pays off by default everywhere it is representable
        let encoding = if physical == PhysicalType::Boolean {
            Encoding::Plain
        } else {
            Encoding::RleDictionary
        };
        Self {
            physical,
            type_length: None,
            logical: None,
            converted: None,
            encoding,
            codec: None,
        }
    }

    pub fn with_type_length(mut self, len: usize) -> Self {
        self.type_length = Some(len);
        self
    }

    pub fn with_logical(mut self, logical: crate::types::LogicalType) -> Self {
        self.logical = Some(logical);
        self
    }

    pub fn with_converted(mut self, converted: crate::types::ConvertedType) -> Self {
        self.converted = Some(converted);
        self
    }

    pub fn with_encoding(mut self, encoding: Encoding) -> Self {
        self.encoding = encoding;
        self
    }

    pub fn with_codec(mut self, codec: Codec) -> Self {
        self.codec = Some(codec);
        self
    }
}

pub struct ColumnStore {
    path: String,
    physical: PhysicalType,
    type_length: Option<usize>,
    /// Base value encoding, with the deprecated dictionary alias
    /// normalized away.
    encoding: Encoding,
    codec: Option<Codec>,
    max_def: u16,
    max_rep: u16,

    values: Vec<Value>,
    def_levels: Vec<u16>,
    rep_levels: Vec<u16>,
    dict: Option<DictStore>,
    dict_limit: usize,

    value_bytes: usize,
    null_count: u64,
    min_value: Option<Value>,
    max_value: Option<Value>,
}

impl ColumnStore {
    pub fn new(desc: &ColumnDescriptor) -> ParquetResult<Self> {
        let encoding = match desc.encoding {
            Encoding::PlainDictionary => Encoding::RleDictionary,
            other => other,
        };
        if !encoding.supports(desc.physical) {
            return Err(ParquetError::Encoding {
                encoding,
                physical: desc.physical,
            }
            .into());
        }
        if desc.physical == PhysicalType::FixedLenByteArray && desc.type_length.is_none() {
            return Err(TracedParquetError::schema(
                "fixed-length byte array without a type length",
            ));
        }
        let dict = encoding.is_dictionary().then(DictStore::new);
        Ok(Self {
            path: String::new(),
            physical: desc.physical,
            type_length: desc.type_length,
            encoding,
            codec: desc.codec,
            max_def: 0,
            max_rep: 0,
            values: Vec::new(),
            def_levels: Vec::new(),
            rep_levels: Vec::new(),
            dict,
            dict_limit: usize::MAX,
            value_bytes: 0,
            null_count: 0,
            min_value: None,
            max_value: None,
        })
    }

    /// Called by the schema when the leaf is (re)attached to the tree.
    pub(crate) fn attach(&mut self, path: String, max_def: u16, max_rep: u16) {
        self.path = path;
        self.max_def = max_def;
        self.max_rep = max_rep;
    }

    pub(crate) fn set_dictionary_limit(&mut self, bytes: usize) {
        self.dict_limit = bytes;
    }

    /// Append one logical entry. `value` is `None` iff `def < max_def`;
    /// the shredding engine guarantees the levels are in range.
    pub fn push(&mut self, value: Option<Value>, def: u16, rep: u16) -> ParquetResult<()> {
        debug_assert!(def <= self.max_def && rep <= self.max_rep);
        match value {
            None => {
                self.null_count += 1;
            }
            Some(value) => {
                if !value.matches(self.physical) {
                    return Err(ParquetError::TypeMismatch {
                        column: self.path.clone(),
                        expected: self.physical,
                        got: value.type_name().into(),
                    }
                    .into());
                }
                if let (PhysicalType::FixedLenByteArray, Value::ByteArray(bytes)) =
                    (self.physical, &value)
                {
                    let expected = self.type_length.unwrap();
                    if bytes.len() != expected {
                        return Err(TracedParquetError::shape(format!(
                            "column {} takes {} bytes per value, got {}",
                            self.path,
                            expected,
                            bytes.len()
                        )));
                    }
                }
                self.observe(&value);
                self.value_bytes += value.encoded_size();
                if let Some(dict) = &mut self.dict {
                    dict.push(&value);
                    if dict.byte_size() > self.dict_limit {
                        warn!(
                            column = %self.path,
                            bytes = dict.byte_size(),
                            "dictionary outgrew its page limit, falling back to plain"
                        );
                        self.dict = None;
                    }
                }
                self.values.push(value);
            }
        }
        self.def_levels.push(def);
        self.rep_levels.push(rep);
        Ok(())
    }

    fn observe(&mut self, value: &Value) {
        if value_cmp(value, value).is_none() {
            return;
        }
        match &self.min_value {
            Some(min) if value_cmp(value, min) != Some(Ordering::Less) => {}
            _ => self.min_value = Some(value.clone()),
        }
        match &self.max_value {
            Some(max) if value_cmp(value, max) != Some(Ordering::Greater) => {}
            _ => self.max_value = Some(value.clone()),
        }
    }

    /// Number of logical entries (values plus nulls).
    pub fn num_entries(&self) -> usize {
        self.def_levels.len()
    }

    /// Number of rows, i.e. entries starting a new top-level record.
    pub fn num_rows(&self) -> usize {
        self.rep_levels.iter().filter(|&&r| r == 0).count()
    }

    /// Rough in-memory footprint used for the row-group size cap.
    pub fn estimated_size(&self) -> usize {
        self.value_bytes + 2 * (self.def_levels.len() + self.rep_levels.len())
    }

    /// Effective value encoding of the next data page.
    pub fn page_encoding(&self) -> Encoding {
        if self.dict.is_some() {
            Encoding::RleDictionary
        } else if self.encoding.is_dictionary() {
            Encoding::Plain
        } else {
            self.encoding
        }
    }

    pub fn path(&self) -> &str {
        &self.path
    }

    pub fn physical(&self) -> PhysicalType {
        self.physical
    }

    pub fn type_length(&self) -> Option<usize> {
        self.type_length
    }

    pub fn codec_override(&self) -> Option<Codec> {
        self.codec
    }

    pub fn max_def(&self) -> u16 {
        self.max_def
    }

    pub fn max_rep(&self) -> u16 {
        self.max_rep
    }

    pub fn values(&self) -> &[Value] {
        &self.values
    }

    pub fn def_levels(&self) -> &[u16] {
        &self.def_levels
    }

    pub fn rep_levels(&self) -> &[u16] {
        &self.rep_levels
    }

    pub fn dictionary(&self) -> Option<&DictStore> {
        self.dict.as_ref()
    }

    pub fn null_count(&self) -> u64 {
        self.null_count
    }

    pub fn min_value(&self) -> Option<Vec<u8>> {
        self.min_value.as_ref().map(Value::canonical_bytes)
    }

    pub fn max_value(&self) -> Option<Vec<u8>> {
        self.max_value.as_ref().map(Value::canonical_bytes)
    }

    /// Clear accumulated data after a row-group flush. A fresh chunk gets
    /// a fresh shot at dictionary encoding.
    pub fn reset(&mut self) {
        self.values.clear();
        self.def_levels.clear();
        self.rep_levels.clear();
        self.value_bytes = 0;
        self.null_count = 0;
        self.min_value = None;
        self.max_value = None;
        if self.encoding.is_dictionary() {
            match &mut self.dict {
                Some(dict) => dict.reset(),
                None => self.dict = Some(DictStore::new()),
            }
        }
    }
}

/// Ordering used for statistics; booleans are unordered here, matching
/// the chunk metadata which carries no min/max for them.
fn value_cmp(a: &Value, b: &Value) -> Option<Ordering> {
    match (a, b) {
        (Value::Int32(a), Value::Int32(b)) => Some(a.cmp(b)),
        (Value::Int64(a), Value::Int64(b)) => Some(a.cmp(b)),
        (Value::Float(a), Value::Float(b)) => a.partial_cmp(b),
        (Value::Double(a), Value::Double(b)) => a.partial_cmp(b),
        (Value::ByteArray(a), Value::ByteArray(b)) => Some(a.cmp(b)),
        (Value::Int96(a), Value::Int96(b)) => Some(a.cmp(b)),
        _ => None,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn int32_store() -> ColumnStore {
        let mut store = ColumnStore::new(&ColumnDescriptor::new(PhysicalType::Int32)).unwrap();
        store.attach("v".into(), 1, 0);
        store
    }

    #[test]
    fn test_store_nulls_skip_values() {
        let mut store = int32_store();
        store.push(Some(Value::Int32(3)), 1, 0).unwrap();
        store.push(None, 0, 0).unwrap();
        store.push(Some(Value::Int32(1)), 1, 0).unwrap();
        assert_eq!(store.num_entries(), 3);
        assert_eq!(store.values().len(), 2);
        assert_eq!(store.def_levels(), &[1, 0, 1]);
        assert_eq!(store.null_count(), 1);
        assert_eq!(store.min_value(), Some(1i32.to_le_bytes().to_vec()));
        assert_eq!(store.max_value(), Some(3i32.to_le_bytes().to_vec()));
    }

    #[test]
    fn test_store_type_mismatch() {
        let mut store = int32_store();
        assert!(store.push(Some(Value::Int64(1)), 1, 0).is_err());
    }

    #[test]
    fn test_store_dictionary_fallback() {
        let mut store = ColumnStore::new(
            &ColumnDescriptor::new(PhysicalType::ByteArray).with_encoding(Encoding::RleDictionary),
        )
        .unwrap();
        store.attach("s".into(), 1, 0);
        store.set_dictionary_limit(8);
        store.push(Some(Value::from("abcd")), 1, 0).unwrap();
        assert_eq!(store.page_encoding(), Encoding::RleDictionary);
        store.push(Some(Value::from("efghij")), 1, 0).unwrap();
        // 10 bytes of distinct values tripped the 8-byte limit
        assert_eq!(store.page_encoding(), Encoding::Plain);
        assert!(store.dictionary().is_none());
        // values kept flowing into the plain path
        assert_eq!(store.values().len(), 2);
        // the next chunk starts over with a live dictionary
        store.reset();
        assert_eq!(store.page_encoding(), Encoding::RleDictionary);
    }

    #[test]
    fn test_store_rows_from_rep_levels() {
        let mut store = int32_store();
        store.attach("xs".into(), 1, 1);
        for (def, rep) in [(1, 0), (1, 1), (1, 1), (0, 0), (1, 0)] {
            let value = (def == 1).then_some(Value::Int32(def as i32));
            store.push(value, def, rep).unwrap();
        }
        assert_eq!(store.num_rows(), 3);
        assert_eq!(store.num_entries(), 5);
    }

    #[test]
    fn test_store_rejects_bad_encoding() {
        let desc =
            ColumnDescriptor::new(PhysicalType::Boolean).with_encoding(Encoding::DeltaBinaryPacked);
        assert!(ColumnStore::new(&desc).is_err());
    }
}
