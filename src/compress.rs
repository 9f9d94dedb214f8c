// Copyright 2022 RisingLight Project Authors. Licensed under Apache-2.0.

//! Compression codec drivers.
//!
//! Every codec is a plain byte-to-byte transform over a page payload.
//! Snappy uses the raw (unframed) format and LZ4 the raw block format,
//! as the file format prescribes for page data.

use std::io::{Read, Write};

use crate::errors::{ParquetResult, TracedParquetError};
use crate::types::Codec;

pub fn compress(codec: Codec, data: &[u8]) -> ParquetResult<Vec<u8>> {
    match codec {
        Codec::Uncompressed => Ok(data.to_vec()),
        Codec::Snappy => snap::raw::Encoder::new()
            .compress_vec(data)
            .map_err(|e| TracedParquetError::codec(format!("snappy: {e}"))),
        Codec::Gzip => {
            let mut encoder =
                flate2::write::GzEncoder::new(Vec::new(), flate2::Compression::default());
            encoder
                .write_all(data)
                .and_then(|_| encoder.finish())
                .map_err(|e| TracedParquetError::codec(format!("gzip: {e}")))
        }
        Codec::Zstd => zstd::stream::encode_all(data, 0)
            .map_err(|e| TracedParquetError::codec(format!("zstd: {e}"))),
        Codec::Lz4 => Ok(lz4_flex::block::compress(data)),
    }
}

/// Inflate `data` back to `uncompressed_size` bytes as declared by the
/// page header; a size mismatch is a corrupt stream.
pub fn decompress(codec: Codec, data: &[u8], uncompressed_size: usize) -> ParquetResult<Vec<u8>> {
    let out = match codec {
        Codec::Uncompressed => data.to_vec(),
        Codec::Snappy => snap::raw::Decoder::new()
            .decompress_vec(data)
            .map_err(|e| TracedParquetError::codec(format!("snappy: {e}")))?,
        Codec::Gzip => {
            let mut out = Vec::with_capacity(uncompressed_size);
            flate2::read::GzDecoder::new(data)
                .read_to_end(&mut out)
                .map_err(|e| TracedParquetError::codec(format!("gzip: {e}")))?;
            out
        }
        Codec::Zstd => zstd::stream::decode_all(data)
            .map_err(|e| TracedParquetError::codec(format!("zstd: {e}")))?,
        Codec::Lz4 => lz4_flex::block::decompress(data, uncompressed_size)
            .map_err(|e| TracedParquetError::codec(format!("lz4: {e}")))?,
    };
    if out.len() != uncompressed_size {
        return Err(TracedParquetError::corrupt(format!(
            "page inflates to {} bytes, header declares {}",
            out.len(),
            uncompressed_size
        )));
    }
    Ok(out)
}
