// Copyright 2022 RisingLight Project Authors. Licensed under Apache-2.0.

//! Plain encoding, one codec per physical type.
//!
//! Fixed-width types are stored as little-endian two's-complement or
//! IEEE-754. Byte arrays carry a `u32` little-endian length prefix,
//! fixed-length byte arrays are raw. Booleans are one bit per value, low
//! bit first, with the trailing partial byte zero-padded when the encoder
//! is finished.

use bitvec::prelude::{BitVec, Lsb0};
use bytes::{Buf, BufMut};

use crate::errors::{ParquetError, ParquetResult, TracedParquetError};
use crate::types::{PhysicalType, Value};

pub struct PlainEncoder {
    physical: PhysicalType,
    type_length: Option<usize>,
    data: Vec<u8>,
    bits: BitVec<u8, Lsb0>,
}

impl PlainEncoder {
    pub fn new(physical: PhysicalType, type_length: Option<usize>) -> ParquetResult<Self> {
        if physical == PhysicalType::FixedLenByteArray && type_length.is_none() {
            return Err(TracedParquetError::schema(
                "fixed-length byte array without a type length",
            ));
        }
        Ok(Self {
            physical,
            type_length,
            data: Vec::new(),
            bits: BitVec::new(),
        })
    }

    pub fn put(&mut self, value: &Value) -> ParquetResult<()> {
        match (self.physical, value) {
            (PhysicalType::Boolean, Value::Boolean(v)) => self.bits.push(*v),
            (PhysicalType::Int32, Value::Int32(v)) => self.data.put_i32_le(*v),
            (PhysicalType::Int64, Value::Int64(v)) => self.data.put_i64_le(*v),
            (PhysicalType::Int96, Value::Int96(v)) => self.data.put_slice(v),
            (PhysicalType::Float, Value::Float(v)) => self.data.put_f32_le(*v),
            (PhysicalType::Double, Value::Double(v)) => self.data.put_f64_le(*v),
            (PhysicalType::ByteArray, Value::ByteArray(v)) => {
                self.data.put_u32_le(v.len() as u32);
                self.data.put_slice(v);
            }
            (PhysicalType::FixedLenByteArray, Value::ByteArray(v)) => {
                let expected = self.type_length.unwrap();
                if v.len() != expected {
                    return Err(TracedParquetError::shape(format!(
                        "fixed-length byte array of {expected} bytes, got {}",
                        v.len()
                    )));
                }
                self.data.put_slice(v);
            }
            (expected, got) => {
                return Err(ParquetError::TypeMismatch {
                    column: String::new(),
                    expected,
                    got: got.type_name().into(),
                }
                .into())
            }
        }
        Ok(())
    }

    pub fn put_all(&mut self, values: &[Value]) -> ParquetResult<()> {
        for v in values {
            self.put(v)?;
        }
        Ok(())
    }

    /// Flush, padding the trailing boolean byte with zeros.
    pub fn finish(self) -> Vec<u8> {
        if self.physical == PhysicalType::Boolean {
            self.bits.into_vec()
        } else {
            self.data
        }
    }
}

pub struct PlainDecoder<'a> {
    physical: PhysicalType,
    type_length: Option<usize>,
    data: &'a [u8],
    /// Bit cursor, used only for booleans.
    bit: usize,
}

impl<'a> PlainDecoder<'a> {
    pub fn new(
        physical: PhysicalType,
        type_length: Option<usize>,
        data: &'a [u8],
    ) -> ParquetResult<Self> {
        if physical == PhysicalType::FixedLenByteArray && type_length.is_none() {
            return Err(TracedParquetError::schema(
                "fixed-length byte array without a type length",
            ));
        }
        Ok(Self {
            physical,
            type_length,
            data,
            bit: 0,
        })
    }

    fn take(&mut self, n: usize) -> ParquetResult<&'a [u8]> {
        if self.data.len() < n {
            return Err(TracedParquetError::corrupt(format!(
                "plain stream needs {n} bytes, {} remain",
                self.data.len()
            )));
        }
        let (head, tail) = self.data.split_at(n);
        self.data = tail;
        Ok(head)
    }

    pub fn next(&mut self) -> ParquetResult<Value> {
        Ok(match self.physical {
            PhysicalType::Boolean => {
                if self.bit == 0 && self.data.is_empty() {
                    return Err(TracedParquetError::corrupt("boolean stream exhausted"));
                }
                let byte = self.data[0];
                let v = byte >> self.bit & 1 == 1;
                self.bit += 1;
                if self.bit == 8 {
                    self.bit = 0;
                    self.data = &self.data[1..];
                }
                Value::Boolean(v)
            }
            PhysicalType::Int32 => Value::Int32(self.take(4)?.get_i32_le()),
            PhysicalType::Int64 => Value::Int64(self.take(8)?.get_i64_le()),
            PhysicalType::Int96 => {
                let mut buf = [0u8; 12];
                buf.copy_from_slice(self.take(12)?);
                Value::Int96(buf)
            }
            PhysicalType::Float => Value::Float(self.take(4)?.get_f32_le()),
            PhysicalType::Double => Value::Double(self.take(8)?.get_f64_le()),
            PhysicalType::ByteArray => {
                let len = self.take(4)?.get_u32_le() as usize;
                Value::ByteArray(self.take(len)?.to_vec())
            }
            PhysicalType::FixedLenByteArray => {
                Value::ByteArray(self.take(self.type_length.unwrap())?.to_vec())
            }
        })
    }

    pub fn read(&mut self, count: usize) -> ParquetResult<Vec<Value>> {
        let mut out = Vec::with_capacity(count);
        for _ in 0..count {
            out.push(self.next()?);
        }
        Ok(out)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn roundtrip(physical: PhysicalType, type_length: Option<usize>, values: Vec<Value>) {
        let mut enc = PlainEncoder::new(physical, type_length).unwrap();
        enc.put_all(&values).unwrap();
        let data = enc.finish();
        let mut dec = PlainDecoder::new(physical, type_length, &data).unwrap();
        assert_eq!(dec.read(values.len()).unwrap(), values);
    }

    #[test]
    fn test_plain_int32() {
        roundtrip(
            PhysicalType::Int32,
            None,
            vec![Value::Int32(1), Value::Int32(-7), Value::Int32(i32::MAX)],
        );
    }

    #[test]
    fn test_plain_int64() {
        roundtrip(
            PhysicalType::Int64,
            None,
            vec![Value::Int64(i64::MIN), Value::Int64(0), Value::Int64(42)],
        );
    }

    #[test]
    fn test_plain_boolean_partial_byte() {
        // 11 values exercise the padded trailing byte
        let values: Vec<Value> = (0..11).map(|i| Value::Boolean(i % 3 == 0)).collect();
        let mut enc = PlainEncoder::new(PhysicalType::Boolean, None).unwrap();
        enc.put_all(&values).unwrap();
        let data = enc.finish();
        assert_eq!(data.len(), 2);
        let mut dec = PlainDecoder::new(PhysicalType::Boolean, None, &data).unwrap();
        assert_eq!(dec.read(11).unwrap(), values);
    }

    #[test]
    fn test_plain_byte_array() {
        roundtrip(
            PhysicalType::ByteArray,
            None,
            vec![Value::from("hi"), Value::from(""), Value::from("yo")],
        );
    }

    #[test]
    fn test_plain_fixed_len_byte_array() {
        roundtrip(
            PhysicalType::FixedLenByteArray,
            Some(3),
            vec![
                Value::ByteArray(vec![1, 2, 3]),
                Value::ByteArray(vec![4, 5, 6]),
            ],
        );
        let mut enc = PlainEncoder::new(PhysicalType::FixedLenByteArray, Some(3)).unwrap();
        assert!(enc.put(&Value::ByteArray(vec![1])).is_err());
    }

    #[test]
    fn test_plain_floats() {
        roundtrip(
            PhysicalType::Float,
            None,
            vec![Value::Float(1.5), Value::Float(-0.25)],
        );
        roundtrip(
            PhysicalType::Double,
            None,
            vec![Value::Double(std::f64::consts::PI)],
        );
    }

    #[test]
    fn test_plain_type_mismatch() {
        let mut enc = PlainEncoder::new(PhysicalType::Int32, None).unwrap();
        assert!(enc.put(&Value::Int64(1)).is_err());
    }

    #[test]
    fn test_plain_short_input() {
        let mut dec = PlainDecoder::new(PhysicalType::Int64, None, &[0, 1, 2]).unwrap();
        assert!(dec.next().is_err());
    }
}
