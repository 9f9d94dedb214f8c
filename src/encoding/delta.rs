// Copyright 2022 RisingLight Project Authors. Licensed under Apache-2.0.

//! Delta encodings: delta-binary-packed integers, delta-length byte
//! arrays, and delta byte arrays (shared-prefix + suffix).
//!
//! The delta-binary-packed layout is
//!
//! ```plain
//! | block size | miniblocks per block | total count | first value (zigzag) |
//! | min delta (zigzag) | miniblock widths | packed miniblocks | ...
//! ```
//!
//! with all integers as unsigned varints unless noted. Blocks hold 128
//! deltas in 4 miniblocks of 32. Miniblocks that carry no values get a
//! width byte of zero and no payload. Delta arithmetic is wrapping, so
//! the full `i64` range round-trips.

use crate::errors::{ParquetResult, TracedParquetError};
use crate::types::{PhysicalType, Value};

use super::rle::write_uvarint;

const BLOCK_SIZE: usize = 128;
const MINIBLOCKS_PER_BLOCK: usize = 4;
const VALUES_PER_MINIBLOCK: usize = BLOCK_SIZE / MINIBLOCKS_PER_BLOCK;

fn zigzag_encode(v: i64) -> u64 {
    ((v << 1) ^ (v >> 63)) as u64
}

fn zigzag_decode(v: u64) -> i64 {
    ((v >> 1) as i64) ^ -((v & 1) as i64)
}

/// Varint reader for the delta headers; counts here may need the full
/// 64-bit range (zigzagged first values and min deltas).
fn read_uvarint64(data: &[u8], pos: &mut usize) -> ParquetResult<u64> {
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
        if shift >= 64 {
            return Err(TracedParquetError::corrupt("varint exceeds 64 bits"));
        }
    }
}

/// Pack `values` (length a multiple of 8) at `width` bits each, 0..=64,
/// low bit first. The wider sibling of the level packer, needed because
/// int64 deltas may span the full range.
fn pack_wide(values: &[u64], width: u8, out: &mut Vec<u8>) {
    debug_assert!(width <= 64);
    debug_assert_eq!(values.len() % 8, 0);
    if width == 0 {
        return;
    }
    let mask = if width == 64 {
        u128::MAX
    } else {
        (1u128 << width) - 1
    };
    let mut acc: u128 = 0;
    let mut bits: u32 = 0;
    for &v in values {
        acc |= (v as u128 & mask) << bits;
        bits += width as u32;
        while bits >= 8 {
            out.push((acc & 0xff) as u8);
            acc >>= 8;
            bits -= 8;
        }
    }
    debug_assert_eq!(bits, 0);
}

fn unpack_wide(data: &[u8], width: u8, count: usize) -> ParquetResult<Vec<u64>> {
    debug_assert!(width <= 64);
    debug_assert_eq!(count % 8, 0);
    let needed = count * width as usize / 8;
    if data.len() < needed {
        return Err(TracedParquetError::corrupt(format!(
            "packed miniblock needs {} bytes, {} remain",
            needed,
            data.len()
        )));
    }
    let mut out = vec![0u64; count];
    if width == 0 {
        return Ok(out);
    }
    let mask = if width == 64 {
        u128::MAX
    } else {
        (1u128 << width) - 1
    };
    let mut acc: u128 = 0;
    let mut bits: u32 = 0;
    let mut pos = 0usize;
    for value in out.iter_mut() {
        while bits < width as u32 {
            acc |= (data[pos] as u128) << bits;
            pos += 1;
            bits += 8;
        }
        *value = (acc & mask) as u64;
        acc >>= width;
        bits -= width as u32;
    }
    Ok(out)
}

fn bits_needed(v: u64) -> u8 {
    (64 - v.leading_zeros()) as u8
}

/// Encoder accumulating `i64` values, flushed into blocks at the end.
/// `i32` columns widen on the way in and narrow on the way out.
pub struct DeltaBinaryPackedEncoder {
    values: Vec<i64>,
}

impl Default for DeltaBinaryPackedEncoder {
    fn default() -> Self {
        Self::new()
    }
}

impl DeltaBinaryPackedEncoder {
    pub fn new() -> Self {
        Self { values: Vec::new() }
    }

    pub fn put(&mut self, v: i64) {
        self.values.push(v);
    }

    pub fn finish(self) -> Vec<u8> {
        let mut out = Vec::new();
        write_uvarint(BLOCK_SIZE as u64, &mut out);
        write_uvarint(MINIBLOCKS_PER_BLOCK as u64, &mut out);
        write_uvarint(self.values.len() as u64, &mut out);
        let first = self.values.first().copied().unwrap_or(0);
        write_uvarint(zigzag_encode(first), &mut out);

        let mut deltas = Vec::with_capacity(self.values.len().saturating_sub(1));
        for window in self.values.windows(2) {
            deltas.push(window[1].wrapping_sub(window[0]));
        }

        for block in deltas.chunks(BLOCK_SIZE) {
            let min_delta = block.iter().copied().min().unwrap();
            write_uvarint(zigzag_encode(min_delta), &mut out);

            let adjusted: Vec<u64> = block
                .iter()
                .map(|d| d.wrapping_sub(min_delta) as u64)
                .collect();

            let mut widths = [0u8; MINIBLOCKS_PER_BLOCK];
            for (i, width) in widths.iter_mut().enumerate() {
                let start = i * VALUES_PER_MINIBLOCK;
                if start < adjusted.len() {
                    let end = (start + VALUES_PER_MINIBLOCK).min(adjusted.len());
                    *width = adjusted[start..end]
                        .iter()
                        .map(|&v| bits_needed(v))
                        .max()
                        .unwrap();
                }
            }
            out.extend_from_slice(&widths);

            let mut padded;
            for (i, &width) in widths.iter().enumerate() {
                let start = i * VALUES_PER_MINIBLOCK;
                if start >= adjusted.len() {
                    break;
                }
                let end = (start + VALUES_PER_MINIBLOCK).min(adjusted.len());
                padded = adjusted[start..end].to_vec();
                padded.resize(VALUES_PER_MINIBLOCK, 0);
                pack_wide(&padded, width, &mut out);
            }
        }
        out
    }
}

/// Decoder over an in-memory stream; reports how many bytes the stream
/// occupied so byte-array codecs can locate the payload that follows.
pub struct DeltaBinaryPackedDecoder;

impl DeltaBinaryPackedDecoder {
    /// Decode the whole stream starting at `*pos`, advancing `*pos` past it.
    pub fn decode(data: &[u8], pos: &mut usize) -> ParquetResult<Vec<i64>> {
        let block_size = read_uvarint64(data, pos)? as usize;
        let miniblocks = read_uvarint64(data, pos)? as usize;
        let total = read_uvarint64(data, pos)? as usize;
        let first = zigzag_decode(read_uvarint64(data, pos)?);

        if block_size == 0 || block_size % 128 != 0 {
            return Err(TracedParquetError::corrupt(format!(
                "delta block size {block_size} is not a positive multiple of 128"
            )));
        }
        if miniblocks == 0 || block_size % miniblocks != 0 || (block_size / miniblocks) % 32 != 0 {
            return Err(TracedParquetError::corrupt(format!(
                "invalid miniblock count {miniblocks} for block size {block_size}"
            )));
        }
        let per_mini = block_size / miniblocks;

        let mut out = Vec::with_capacity(total);
        if total == 0 {
            return Ok(out);
        }
        out.push(first);
        let mut previous = first;
        let mut remaining = total - 1;

        while remaining > 0 {
            let min_delta = zigzag_decode(read_uvarint64(data, pos)?);
            if data.len() < *pos + miniblocks {
                return Err(TracedParquetError::corrupt("miniblock widths overrun buffer"));
            }
            let widths = data[*pos..*pos + miniblocks].to_vec();
            *pos += miniblocks;
            for &width in &widths {
                if remaining == 0 {
                    break;
                }
                if width > 64 {
                    return Err(TracedParquetError::corrupt(format!(
                        "miniblock width {width} exceeds 64"
                    )));
                }
                let unpacked = unpack_wide(&data[*pos..], width, per_mini)?;
                *pos += per_mini * width as usize / 8;
                for delta in unpacked {
                    if remaining == 0 {
                        break;
                    }
                    previous = previous.wrapping_add(min_delta).wrapping_add(delta as i64);
                    out.push(previous);
                    remaining -= 1;
                }
            }
        }
        Ok(out)
    }
}

/// Delta-binary-packed over a typed value slice.
pub fn encode_int(values: &[Value], physical: PhysicalType) -> ParquetResult<Vec<u8>> {
    let mut enc = DeltaBinaryPackedEncoder::new();
    for v in values {
        match (physical, v) {
            (PhysicalType::Int32, Value::Int32(v)) => enc.put(*v as i64),
            (PhysicalType::Int64, Value::Int64(v)) => enc.put(*v),
            _ => {
                return Err(TracedParquetError::shape(format!(
                    "delta binary packed cannot carry {}",
                    v.type_name()
                )))
            }
        }
    }
    Ok(enc.finish())
}

pub fn decode_int(data: &[u8], physical: PhysicalType) -> ParquetResult<Vec<Value>> {
    let mut pos = 0;
    let raw = DeltaBinaryPackedDecoder::decode(data, &mut pos)?;
    raw.into_iter()
        .map(|v| match physical {
            PhysicalType::Int32 => {
                let narrowed = i32::try_from(v).map_err(|_| {
                    TracedParquetError::corrupt(format!("delta value {v} overflows int32"))
                })?;
                Ok(Value::Int32(narrowed))
            }
            PhysicalType::Int64 => Ok(Value::Int64(v)),
            _ => Err(TracedParquetError::corrupt(
                "delta binary packed on a non-integer column",
            )),
        })
        .collect()
}

/// Delta-length byte array: a delta-binary-packed stream of lengths, then
/// the concatenated payloads.
pub fn encode_delta_length(values: &[Value]) -> ParquetResult<Vec<u8>> {
    let mut lengths = DeltaBinaryPackedEncoder::new();
    for v in values {
        lengths.put(v.as_byte_array()?.len() as i64);
    }
    let mut out = lengths.finish();
    for v in values {
        out.extend_from_slice(v.as_byte_array()?);
    }
    Ok(out)
}

pub fn decode_delta_length(data: &[u8]) -> ParquetResult<Vec<Value>> {
    let mut pos = 0;
    let lengths = DeltaBinaryPackedDecoder::decode(data, &mut pos)?;
    let mut out = Vec::with_capacity(lengths.len());
    for len in lengths {
        let len = usize::try_from(len)
            .map_err(|_| TracedParquetError::corrupt(format!("negative byte-array length {len}")))?;
        if data.len() < pos + len {
            return Err(TracedParquetError::corrupt(
                "byte-array payload overruns buffer",
            ));
        }
        out.push(Value::ByteArray(data[pos..pos + len].to_vec()));
        pos += len;
    }
    Ok(out)
}

/// Delta byte array: shared-prefix lengths and suffixes, each value being
/// `previous[..prefix] + suffix`.
pub fn encode_delta_byte_array(values: &[Value]) -> ParquetResult<Vec<u8>> {
    let mut prefixes = DeltaBinaryPackedEncoder::new();
    let mut suffix_lengths = DeltaBinaryPackedEncoder::new();
    let mut payload = Vec::new();
    let mut previous: &[u8] = &[];
    for v in values {
        let bytes = v.as_byte_array()?;
        let prefix = previous
            .iter()
            .zip(bytes.iter())
            .take_while(|(a, b)| a == b)
            .count();
        prefixes.put(prefix as i64);
        suffix_lengths.put((bytes.len() - prefix) as i64);
        payload.extend_from_slice(&bytes[prefix..]);
        previous = bytes;
    }
    let mut out = prefixes.finish();
    out.extend(suffix_lengths.finish());
    out.extend(payload);
    Ok(out)
}

pub fn decode_delta_byte_array(data: &[u8]) -> ParquetResult<Vec<Value>> {
    let mut pos = 0;
    let prefixes = DeltaBinaryPackedDecoder::decode(data, &mut pos)?;
    let suffix_lengths = DeltaBinaryPackedDecoder::decode(data, &mut pos)?;
    if prefixes.len() != suffix_lengths.len() {
        return Err(TracedParquetError::corrupt(format!(
            "{} prefix lengths but {} suffix lengths",
            prefixes.len(),
            suffix_lengths.len()
        )));
    }
    let mut out: Vec<Value> = Vec::with_capacity(prefixes.len());
    let mut previous: Vec<u8> = Vec::new();
    for (prefix, suffix_len) in prefixes.into_iter().zip(suffix_lengths) {
        let prefix = usize::try_from(prefix)
            .map_err(|_| TracedParquetError::corrupt("negative prefix length"))?;
        let suffix_len = usize::try_from(suffix_len)
            .map_err(|_| TracedParquetError::corrupt("negative suffix length"))?;
        if prefix > previous.len() {
            return Err(TracedParquetError::corrupt(format!(
                "prefix length {} exceeds previous value length {}",
                prefix,
                previous.len()
            )));
        }
        if data.len() < pos + suffix_len {
            return Err(TracedParquetError::corrupt("suffix payload overruns buffer"));
        }
        let mut value = previous[..prefix].to_vec();
        value.extend_from_slice(&data[pos..pos + suffix_len]);
        pos += suffix_len;
        previous = value.clone();
        out.push(Value::ByteArray(value));
    }
    Ok(out)
}

#[cfg(test)]
mod tests {
    use rand::rngs::StdRng;
    use rand::{Rng, SeedableRng};

    use super::*;

    fn roundtrip_i64(values: &[i64]) {
        let mut enc = DeltaBinaryPackedEncoder::new();
        for &v in values {
            enc.put(v);
        }
        let data = enc.finish();
        let mut pos = 0;
        assert_eq!(
            DeltaBinaryPackedDecoder::decode(&data, &mut pos).unwrap(),
            values
        );
        assert_eq!(pos, data.len());
    }

    #[test]
    fn test_delta_header_layout() {
        let mut enc = DeltaBinaryPackedEncoder::new();
        for v in [100i64, 103, 107, 150] {
            enc.put(v);
        }
        let data = enc.finish();
        // block size 128, 4 miniblocks, 4 values, first value zigzag(100)
        assert_eq!(&data[..6], &[0x80, 0x01, 4, 4, 0xc8, 0x01]);
    }

    #[test]
    fn test_delta_small_sequences() {
        roundtrip_i64(&[]);
        roundtrip_i64(&[7]);
        roundtrip_i64(&[100, 103, 107, 150]);
        roundtrip_i64(&[i64::MIN, i64::MAX, 0, -1]);
        roundtrip_i64(&(0..5000).map(|i| i * i - 400).collect::<Vec<_>>());
    }

    #[test]
    fn test_delta_random() {
        let mut rng = StdRng::seed_from_u64(3);
        let values: Vec<i64> = (0..1000).map(|_| rng.gen()).collect();
        roundtrip_i64(&values);
    }

    #[test]
    fn test_delta_int32_narrowing() {
        let values = vec![Value::Int32(1), Value::Int32(-5), Value::Int32(i32::MAX)];
        let data = encode_int(&values, PhysicalType::Int32).unwrap();
        assert_eq!(decode_int(&data, PhysicalType::Int32).unwrap(), values);
    }

    #[test]
    fn test_delta_length_byte_array() {
        let values = vec![Value::from("hello"), Value::from(""), Value::from("world!")];
        let data = encode_delta_length(&values).unwrap();
        assert_eq!(decode_delta_length(&data).unwrap(), values);
    }

    #[test]
    fn test_delta_byte_array_shares_prefixes() {
        let values = vec![
            Value::from("apple"),
            Value::from("applied"),
            Value::from("apply"),
            Value::from("banana"),
        ];
        let data = encode_delta_byte_array(&values).unwrap();
        assert_eq!(decode_delta_byte_array(&data).unwrap(), values);
    }

    #[test]
    fn test_delta_truncated_stream() {
        let mut enc = DeltaBinaryPackedEncoder::new();
        for v in 0..300i64 {
            enc.put(v);
        }
        let data = enc.finish();
        let mut pos = 0;
        assert!(DeltaBinaryPackedDecoder::decode(&data[..data.len() - 5], &mut pos).is_err());
    }
}
