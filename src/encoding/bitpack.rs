// Copyright 2022 RisingLight Project Authors. Licensed under Apache-2.0.

//! Bit-packing primitives for widths 0..=32.
//!
//! Values are packed in groups of eight, little-endian within the byte
//! stream, low bit first into the running word. A group of eight `width`-bit
//! values always occupies exactly `width` bytes, so groups never straddle
//! partial bytes. Callers pad tails shorter than eight with zeros and track
//! the true length separately.

use crate::errors::{ParquetResult, TracedParquetError};

/// Pack eight values of `width` bits each onto `out`. Bits of each value
/// above `width` must be zero, which callers guarantee by masking levels
/// and dictionary indices against their maximum.
pub fn pack8(values: &[u32; 8], width: u8, out: &mut Vec<u8>) {
    debug_assert!(width <= 32);
    if width == 0 {
        return;
    }
    let mask = if width == 32 {
        u64::MAX
    } else {
        (1u64 << width) - 1
    };
    let mut acc: u64 = 0;
    let mut bits: u32 = 0;
    for &v in values {
        acc |= (v as u64 & mask) << bits;
        bits += width as u32;
        while bits >= 8 {
            out.push((acc & 0xff) as u8);
            acc >>= 8;
            bits -= 8;
        }
    }
    debug_assert_eq!(bits, 0);
}

/// Unpack eight `width`-bit values from the front of `data`, which must
/// hold at least `width` bytes.
pub fn unpack8(data: &[u8], width: u8) -> ParquetResult<[u32; 8]> {
    debug_assert!(width <= 32);
    let mut values = [0u32; 8];
    if width == 0 {
        return Ok(values);
    }
    if data.len() < width as usize {
        return Err(TracedParquetError::corrupt(format!(
            "bit-packed group needs {} bytes, {} remain",
            width,
            data.len()
        )));
    }
    let mask = if width == 32 {
        u64::MAX
    } else {
        (1u64 << width) - 1
    };
    let mut acc: u64 = 0;
    let mut bits: u32 = 0;
    let mut pos = 0usize;
    for value in values.iter_mut() {
        while bits < width as u32 {
            acc |= (data[pos] as u64) << bits;
            pos += 1;
            bits += 8;
        }
        *value = (acc & mask) as u32;
        acc >>= width;
        bits -= width as u32;
    }
    Ok(values)
}

#[cfg(test)]
mod tests {
    use rand::rngs::StdRng;
    use rand::{Rng, SeedableRng};

    use super::*;

    #[test]
    fn test_pack_unpack_roundtrip_all_widths() {
        let mut rng = StdRng::seed_from_u64(42);
        for width in 0..=32u8 {
            let max = if width == 0 {
                0
            } else if width == 32 {
                u32::MAX
            } else {
                (1u32 << width) - 1
            };
            for _ in 0..16 {
                let mut values = [0u32; 8];
                for v in values.iter_mut() {
                    *v = if max == 0 { 0 } else { rng.gen_range(0..=max) };
                }
                let mut buf = vec![];
                pack8(&values, width, &mut buf);
                assert_eq!(buf.len(), width as usize);
                assert_eq!(unpack8(&buf, width).unwrap(), values);
            }
        }
    }

    #[test]
    fn test_pack_one_bit() {
        let values = [1, 0, 1, 1, 0, 0, 1, 0];
        let mut buf = vec![];
        pack8(&values, 1, &mut buf);
        // low bit first: 0b0100_1101
        assert_eq!(buf, vec![0x4d]);
    }

    #[test]
    fn test_unpack_short_input() {
        assert!(unpack8(&[0u8; 2], 3).is_err());
    }
}
