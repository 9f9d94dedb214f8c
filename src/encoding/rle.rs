// Copyright 2022 RisingLight Project Authors. Licensed under Apache-2.0.

//! The run-length / bit-packed hybrid codec.
//!
//! Encodes sequences of small unsigned integers of a fixed bit width. The
//! body is a concatenation of runs, each headed by an unsigned varint:
//!
//! ```plain
//! | header (uvarint) | payload |
//! ```
//!
//! If the header's low bit is 0 the run is run-length encoded:
//! `header >> 1` is the repeat count and the payload is one value stored in
//! `ceil(width / 8)` little-endian bytes. If the low bit is 1 the run is
//! bit-packed: `header >> 1` is the number of 8-value groups and the
//! payload is `groups * width` bytes.
//!
//! Level streams and the boolean RLE value stream carry a `u32`
//! little-endian byte length before the body ("sized" framing); the
//! dictionary index stream does not.

use bytes::BufMut;

use super::bitpack::{pack8, unpack8};
use crate::errors::{ParquetResult, TracedParquetError};

/// Commit an RLE run before its count gets close to the 32-bit varint cap.
const MAX_RLE_RUN: u64 = 1 << 30;

pub fn write_uvarint(mut v: u64, out: &mut Vec<u8>) {
    while v >= 0x80 {
        out.push((v as u8 & 0x7f) | 0x80);
        v >>= 7;
    }
    out.push(v as u8);
}

/// Read an unsigned varint limited to 32 bits of payload.
pub fn read_uvarint32(data: &[u8], pos: &mut usize) -> ParquetResult<u64> {
    let mut result: u64 = 0;
    let mut shift = 0u32;
    loop {
        let byte = *data
            .get(*pos)
            .ok_or_else(|| TracedParquetError::corrupt("varint overruns buffer"))?;
        *pos += 1;
        result |= ((byte & 0x7f) as u64) << shift;
        if byte & 0x80 == 0 {
            return Ok(result);
        }
        shift += 7;
        if shift > 32 {
            return Err(TracedParquetError::corrupt("varint exceeds 32 bits"));
        }
    }
}

/// Greedy hybrid encoder: identical runs of length >= 8 that start on a
/// group boundary become RLE runs, everything else is flushed as 8-value
/// bit-packed groups (tails padded with zeros).
pub struct RleEncoder {
    width: u8,
    out: Vec<u8>,
    /// Values not yet forming a full bit-packed group.
    partial: Vec<u32>,
    /// Payload of the open bit-packed run.
    packed: Vec<u8>,
    packed_groups: u64,
    run_value: u32,
    run_len: u64,
}

impl RleEncoder {
    pub fn new(width: u8) -> Self {
        debug_assert!(width <= 32);
        Self {
            width,
            out: Vec::new(),
            partial: Vec::with_capacity(8),
            packed: Vec::new(),
            packed_groups: 0,
            run_value: 0,
            run_len: 0,
        }
    }

    pub fn put(&mut self, value: u32) {
        if self.run_len > 0 && value == self.run_value {
            self.run_len += 1;
            if self.run_len >= MAX_RLE_RUN {
                self.commit_run();
            }
            return;
        }
        self.commit_run();
        self.run_value = value;
        self.run_len = 1;
    }

    pub fn put_all(&mut self, values: impl IntoIterator<Item = u32>) {
        for v in values {
            self.put(v);
        }
    }

    /// Flush all pending state and return the encoded body.
    pub fn finish(mut self) -> Vec<u8> {
        self.commit_run();
        if !self.partial.is_empty() {
            while self.partial.len() < 8 {
                self.partial.push(0);
            }
            self.pack_partial();
        }
        self.close_packed();
        self.out
    }

    /// Byte-length prefixed variant used by level streams.
    pub fn finish_sized(self) -> Vec<u8> {
        let body = self.finish();
        let mut out = Vec::with_capacity(4 + body.len());
        out.put_u32_le(body.len() as u32);
        out.extend(body);
        out
    }

    fn commit_run(&mut self) {
        let mut n = self.run_len;
        self.run_len = 0;
        if n == 0 {
            return;
        }
        // Top up the current partial group first so RLE runs always start
        // on a group boundary.
        if !self.partial.is_empty() {
            while n > 0 && self.partial.len() < 8 {
                self.partial.push(self.run_value);
                n -= 1;
            }
            if self.partial.len() == 8 {
                self.pack_partial();
            }
        }
        if n >= 8 {
            self.close_packed();
            write_uvarint(n << 1, &mut self.out);
            let byte_width = (self.width as usize + 7) / 8;
            for i in 0..byte_width {
                self.out.push((self.run_value >> (8 * i)) as u8);
            }
        } else {
            for _ in 0..n {
                self.partial.push(self.run_value);
            }
        }
    }

    fn pack_partial(&mut self) {
        debug_assert_eq!(self.partial.len(), 8);
        let mut group = [0u32; 8];
        group.copy_from_slice(&self.partial);
        pack8(&group, self.width, &mut self.packed);
        self.packed_groups += 1;
        self.partial.clear();
    }

    fn close_packed(&mut self) {
        if self.packed_groups == 0 {
            return;
        }
        write_uvarint((self.packed_groups << 1) | 1, &mut self.out);
        self.out.append(&mut self.packed);
        self.packed_groups = 0;
    }
}

/// Decoder over an in-memory body. The caller knows how many values the
/// stream carries; zero padding of the final bit-packed group is simply
/// never requested.
pub struct RleDecoder<'a> {
    data: &'a [u8],
    pos: usize,
    width: u8,
    rle_value: u32,
    rle_remaining: u64,
    packed: [u32; 8],
    packed_idx: usize,
    packed_groups_remaining: u64,
}

impl<'a> RleDecoder<'a> {
    pub fn new(data: &'a [u8], width: u8) -> Self {
        debug_assert!(width <= 32);
        Self {
            data,
            pos: 0,
            width,
            rle_value: 0,
            rle_remaining: 0,
            packed: [0; 8],
            packed_idx: 8,
            packed_groups_remaining: 0,
        }
    }

    /// Parse the `u32` length prefix of a sized stream and return the
    /// decoder over the body plus the total number of bytes consumed by
    /// the framed stream.
    pub fn new_sized(data: &'a [u8], width: u8) -> ParquetResult<(Self, usize)> {
        if data.len() < 4 {
            return Err(TracedParquetError::corrupt("sized stream missing length"));
        }
        let len = u32::from_le_bytes([data[0], data[1], data[2], data[3]]) as usize;
        if data.len() - 4 < len {
            return Err(TracedParquetError::corrupt(format!(
                "sized stream declares {} bytes, {} remain",
                len,
                data.len() - 4
            )));
        }
        Ok((Self::new(&data[4..4 + len], width), 4 + len))
    }

    pub fn next(&mut self) -> ParquetResult<u32> {
        loop {
            if self.rle_remaining > 0 {
                self.rle_remaining -= 1;
                return Ok(self.rle_value);
            }
            if self.packed_idx < 8 {
                let v = self.packed[self.packed_idx];
                self.packed_idx += 1;
                return Ok(v);
            }
            if self.packed_groups_remaining > 0 {
                self.packed = unpack8(&self.data[self.pos..], self.width)?;
                self.pos += self.width as usize;
                self.packed_groups_remaining -= 1;
                self.packed_idx = 0;
                continue;
            }
            self.read_run_header()?;
        }
    }

    pub fn read(&mut self, count: usize) -> ParquetResult<Vec<u32>> {
        let mut out = Vec::with_capacity(count);
        for _ in 0..count {
            out.push(self.next()?);
        }
        Ok(out)
    }

    /// Bytes of the body consumed so far.
    pub fn bytes_consumed(&self) -> usize {
        self.pos
    }

    pub fn body_len(&self) -> usize {
        self.data.len()
    }

    fn read_run_header(&mut self) -> ParquetResult<()> {
        if self.pos >= self.data.len() {
            return Err(TracedParquetError::corrupt("hybrid stream exhausted"));
        }
        let header = read_uvarint32(self.data, &mut self.pos)?;
        if header & 1 == 1 {
            let groups = header >> 1;
            let needed = groups as usize * self.width as usize;
            if self.data.len() - self.pos < needed {
                return Err(TracedParquetError::corrupt(format!(
                    "bit-packed run declares {} bytes, {} remain",
                    needed,
                    self.data.len() - self.pos
                )));
            }
            self.packed_groups_remaining = groups;
        } else {
            let byte_width = (self.width as usize + 7) / 8;
            if self.data.len() - self.pos < byte_width {
                return Err(TracedParquetError::corrupt("rle run value overruns buffer"));
            }
            let mut value: u32 = 0;
            for i in 0..byte_width {
                value |= (self.data[self.pos + i] as u32) << (8 * i);
            }
            self.pos += byte_width;
            self.rle_value = value;
            self.rle_remaining = header >> 1;
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use itertools::Itertools;
    use rand::rngs::StdRng;
    use rand::{Rng, SeedableRng};

    use super::*;

    fn roundtrip(values: &[u32], width: u8) {
        let mut enc = RleEncoder::new(width);
        enc.put_all(values.iter().copied());
        let body = enc.finish();
        let mut dec = RleDecoder::new(&body, width);
        let decoded = dec.read(values.len()).unwrap();
        assert_eq!(decoded, values);
        assert_eq!(dec.bytes_consumed(), body.len());
    }

    #[test]
    fn test_rle_long_runs() {
        let values = [1u32; 100]
            .into_iter()
            .chain([2u32; 100])
            .chain([1u32; 3])
            .collect_vec();
        roundtrip(&values, 2);
        // two RLE runs and one padded bit-packed group
        let mut enc = RleEncoder::new(2);
        enc.put_all(values.iter().copied());
        let body = enc.finish();
        assert_eq!(body, vec![0xc8, 0x01, 1, 0xc8, 0x01, 2, 3, 0b01_01_01, 0]);
    }

    #[test]
    fn test_rle_mixed() {
        let mut rng = StdRng::seed_from_u64(7);
        for width in [1u8, 3, 7, 12, 20, 32] {
            let max = if width == 32 {
                u32::MAX
            } else {
                (1u32 << width) - 1
            };
            let mut values = vec![];
            for _ in 0..50 {
                if rng.gen_bool(0.5) {
                    let v = rng.gen_range(0..=max);
                    values.extend(std::iter::repeat(v).take(rng.gen_range(1..40)));
                } else {
                    values.extend((0..rng.gen_range(1..20)).map(|_| rng.gen_range(0..=max)));
                }
            }
            roundtrip(&values, width);
        }
    }

    #[test]
    fn test_rle_zero_width() {
        // a one-entry dictionary produces index streams of width zero
        let values = vec![0u32; 17];
        let mut enc = RleEncoder::new(0);
        enc.put_all(values.iter().copied());
        let body = enc.finish();
        let mut dec = RleDecoder::new(&body, 0);
        assert_eq!(dec.read(17).unwrap(), values);
    }

    #[test]
    fn test_sized_framing_is_length_exact() {
        let values = (0..1000u32).map(|v| v % 5).collect_vec();
        let mut enc = RleEncoder::new(3);
        enc.put_all(values.iter().copied());
        let framed = enc.finish_sized();
        let (mut dec, consumed) = RleDecoder::new_sized(&framed, 3).unwrap();
        assert_eq!(consumed, framed.len());
        assert_eq!(dec.read(1000).unwrap(), values);
        assert_eq!(dec.bytes_consumed(), dec.body_len());
    }

    #[test]
    fn test_corrupt_declared_length() {
        let mut framed = vec![];
        framed.put_u32_le(100);
        framed.push(0);
        assert!(RleDecoder::new_sized(&framed, 1).is_err());
    }

    #[test]
    fn test_corrupt_bit_packed_overrun() {
        // header claims 4 groups of width 8 but only 2 bytes follow
        let body = vec![(4 << 1) | 1, 0xaa, 0xbb];
        let mut dec = RleDecoder::new(&body, 8);
        assert!(dec.next().is_err());
    }

    #[test]
    fn test_corrupt_varint_overflow() {
        let body = vec![0xff, 0xff, 0xff, 0xff, 0xff, 0xff];
        let mut dec = RleDecoder::new(&body, 1);
        assert!(dec.next().is_err());
    }

    #[test]
    fn test_exhausted_stream() {
        let mut dec = RleDecoder::new(&[], 1);
        assert!(dec.next().is_err());
    }
}
