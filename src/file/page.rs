// Copyright 2022 RisingLight Project Authors. Licensed under Apache-2.0.

//! Page framing: serialize a column store into data and dictionary
//! pages, and parse them back.
//!
//! A data page payload is `[repLevels?][defLevels?][values]`, each level
//! stream a length-prefixed hybrid stream. The whole payload is run
//! through the chunk's codec, then framed by a compact-protocol page
//! header.

use crate::column::ColumnStore;
use crate::compress::{compress, decompress};
use crate::encoding::dictionary::decode_indexed;
use crate::encoding::{DictStore, PlainDecoder, PlainEncoder, RleDecoder, RleEncoder};
use crate::errors::{ParquetError, ParquetResult, TracedParquetError};
use crate::meta::thrift::{CompactReader, CompactWriter};
use crate::meta::{DataPageHeader, DictionaryPageHeader, PageHeader};
use crate::record::assemble::ColumnData;
use crate::types::{bit_width_of, Codec, Encoding, PageType, PhysicalType, Value};
use crate::encoding::delta;

/// A serialized page plus the payload sizes its chunk accounting needs.
pub(crate) struct WrittenPage {
    /// Header and compressed payload, ready to hit the sink.
    pub bytes: Vec<u8>,
    pub compressed_size: usize,
    pub uncompressed_size: usize,
}

fn frame_page(header: PageHeader, compressed: Vec<u8>, uncompressed_size: usize) -> WrittenPage {
    let compressed_size = compressed.len();
    let mut w = CompactWriter::new();
    header.write(&mut w);
    let mut bytes = w.into_inner();
    bytes.extend(compressed);
    WrittenPage {
        bytes,
        compressed_size,
        uncompressed_size,
    }
}

/// Serialize the store's buffered triples into one data page.
pub(crate) fn write_data_page(store: &ColumnStore, codec: Codec) -> ParquetResult<WrittenPage> {
    let mut payload = Vec::new();
    if store.max_rep() > 0 {
        let mut enc = RleEncoder::new(bit_width_of(store.max_rep() as u64));
        enc.put_all(store.rep_levels().iter().map(|&l| l as u32));
        payload.extend(enc.finish_sized());
    }
    if store.max_def() > 0 {
        let mut enc = RleEncoder::new(bit_width_of(store.max_def() as u64));
        enc.put_all(store.def_levels().iter().map(|&l| l as u32));
        payload.extend(enc.finish_sized());
    }

    let encoding = store.page_encoding();
    match encoding {
        Encoding::RleDictionary => {
            payload.extend(store.dictionary().unwrap().encode_indices());
        }
        Encoding::Plain => {
            let mut enc = PlainEncoder::new(store.physical(), store.type_length())?;
            enc.put_all(store.values())?;
            payload.extend(enc.finish());
        }
        Encoding::Rle => {
            // boolean values as a sized hybrid stream of single bits
            let mut enc = RleEncoder::new(1);
            for value in store.values() {
                match value {
                    Value::Boolean(v) => enc.put(*v as u32),
                    other => {
                        return Err(ParquetError::TypeMismatch {
                            column: store.path().into(),
                            expected: PhysicalType::Boolean,
                            got: other.type_name().into(),
                        }
                        .into())
                    }
                }
            }
            payload.extend(enc.finish_sized());
        }
        Encoding::DeltaBinaryPacked => {
            payload.extend(delta::encode_int(store.values(), store.physical())?);
        }
        Encoding::DeltaLengthByteArray => {
            payload.extend(delta::encode_delta_length(store.values())?);
        }
        Encoding::DeltaByteArray => {
            payload.extend(delta::encode_delta_byte_array(store.values())?);
        }
        Encoding::PlainDictionary => unreachable!("normalized at store construction"),
    }

    let uncompressed_size = payload.len();
    let compressed = compress(codec, &payload)?;
    let header = PageHeader {
        page_type: PageType::DataPage,
        uncompressed_page_size: uncompressed_size as i32,
        compressed_page_size: compressed.len() as i32,
        data_page_header: Some(DataPageHeader {
            num_values: store.num_entries() as i32,
            encoding,
            definition_level_encoding: Encoding::Rle,
            repetition_level_encoding: Encoding::Rle,
        }),
        dictionary_page_header: None,
    };
    Ok(frame_page(header, compressed, uncompressed_size))
}

/// Serialize the chunk's dictionary into a dictionary page.
pub(crate) fn write_dictionary_page(
    dict: &DictStore,
    physical: PhysicalType,
    type_length: Option<usize>,
    codec: Codec,
) -> ParquetResult<WrittenPage> {
    let mut enc = PlainEncoder::new(physical, type_length)?;
    enc.put_all(dict.values())?;
    let payload = enc.finish();
    let uncompressed_size = payload.len();
    let compressed = compress(codec, &payload)?;
    let header = PageHeader {
        page_type: PageType::DictionaryPage,
        uncompressed_page_size: uncompressed_size as i32,
        compressed_page_size: compressed.len() as i32,
        data_page_header: None,
        dictionary_page_header: Some(DictionaryPageHeader {
            num_values: dict.len() as i32,
            encoding: Encoding::Plain,
        }),
    };
    Ok(frame_page(header, compressed, uncompressed_size))
}

/// One page parsed off a chunk buffer: its header, inflated payload, and
/// the bytes it occupied.
pub(crate) struct ParsedPage {
    pub header: PageHeader,
    pub payload: Vec<u8>,
    pub consumed: usize,
}

pub(crate) fn read_page(buf: &[u8], codec: Codec) -> ParquetResult<ParsedPage> {
    let mut r = CompactReader::new(buf);
    let header = PageHeader::read(&mut r)?;
    let header_len = r.position();
    let compressed_size = usize::try_from(header.compressed_page_size)
        .map_err(|_| TracedParquetError::corrupt("negative compressed page size"))?;
    let uncompressed_size = usize::try_from(header.uncompressed_page_size)
        .map_err(|_| TracedParquetError::corrupt("negative uncompressed page size"))?;
    if buf.len() - header_len < compressed_size {
        return Err(TracedParquetError::corrupt(format!(
            "page declares {} payload bytes, {} remain in the chunk",
            compressed_size,
            buf.len() - header_len
        )));
    }
    let payload = decompress(
        codec,
        &buf[header_len..header_len + compressed_size],
        uncompressed_size,
    )?;
    Ok(ParsedPage {
        header,
        payload,
        consumed: header_len + compressed_size,
    })
}

/// Decode a dictionary page payload into its values.
pub(crate) fn decode_dictionary_page(
    header: &DictionaryPageHeader,
    payload: &[u8],
    physical: PhysicalType,
    type_length: Option<usize>,
) -> ParquetResult<Vec<Value>> {
    if header.encoding != Encoding::Plain && header.encoding != Encoding::PlainDictionary {
        return Err(TracedParquetError::corrupt(format!(
            "dictionary page with encoding {:?}",
            header.encoding
        )));
    }
    let count = usize::try_from(header.num_values)
        .map_err(|_| TracedParquetError::corrupt("negative dictionary size"))?;
    PlainDecoder::new(physical, type_length, payload)?.read(count)
}

/// Decode a data page payload into triple streams.
pub(crate) fn decode_data_page(
    header: &DataPageHeader,
    payload: &[u8],
    physical: PhysicalType,
    type_length: Option<usize>,
    max_def: u16,
    max_rep: u16,
    dictionary: Option<&[Value]>,
) -> ParquetResult<ColumnData> {
    let num_values = usize::try_from(header.num_values)
        .map_err(|_| TracedParquetError::corrupt("negative page value count"))?;
    let mut pos = 0usize;

    let rep_levels = if max_rep > 0 {
        let (mut dec, consumed) =
            RleDecoder::new_sized(&payload[pos..], bit_width_of(max_rep as u64))?;
        pos += consumed;
        dec.read(num_values)?
    } else {
        vec![0; num_values]
    };
    let def_levels = if max_def > 0 {
        let (mut dec, consumed) =
            RleDecoder::new_sized(&payload[pos..], bit_width_of(max_def as u64))?;
        pos += consumed;
        dec.read(num_values)?
    } else {
        vec![0; num_values]
    };
    let present = def_levels
        .iter()
        .filter(|&&d| d as u16 == max_def)
        .count();

    let values = match header.encoding {
        Encoding::Plain => PlainDecoder::new(physical, type_length, &payload[pos..])?.read(present)?,
        Encoding::Rle => {
            if physical != PhysicalType::Boolean {
                return Err(TracedParquetError::corrupt(format!(
                    "RLE value encoding on a {physical:?} column"
                )));
            }
            let (mut dec, _) = RleDecoder::new_sized(&payload[pos..], 1)?;
            dec.read(present)?
                .into_iter()
                .map(|v| Value::Boolean(v == 1))
                .collect()
        }
        Encoding::RleDictionary | Encoding::PlainDictionary => {
            let dictionary = dictionary.ok_or_else(|| {
                TracedParquetError::corrupt("data page references a missing dictionary")
            })?;
            decode_indexed(&payload[pos..], dictionary, present)?
        }
        Encoding::DeltaBinaryPacked => {
            let values = delta::decode_int(&payload[pos..], physical)?;
            if values.len() != present {
                return Err(TracedParquetError::corrupt(format!(
                    "delta stream carries {} values, page defines {}",
                    values.len(),
                    present
                )));
            }
            values
        }
        Encoding::DeltaLengthByteArray => {
            let values = delta::decode_delta_length(&payload[pos..])?;
            if values.len() != present {
                return Err(TracedParquetError::corrupt(format!(
                    "delta stream carries {} values, page defines {}",
                    values.len(),
                    present
                )));
            }
            values
        }
        Encoding::DeltaByteArray => {
            let values = delta::decode_delta_byte_array(&payload[pos..])?;
            if values.len() != present {
                return Err(TracedParquetError::corrupt(format!(
                    "delta stream carries {} values, page defines {}",
                    values.len(),
                    present
                )));
            }
            values
        }
    };

    Ok(ColumnData {
        values,
        def_levels: def_levels.into_iter().map(|l| l as u16).collect(),
        rep_levels: rep_levels.into_iter().map(|l| l as u16).collect(),
    })
}
