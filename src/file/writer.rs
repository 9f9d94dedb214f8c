// Copyright 2022 RisingLight Project Authors. Licensed under Apache-2.0.

//! The chunk, row-group and file writer.
//!
//! Records are shredded into the schema's column stores; once the
//! buffered size passes the row-group target the stores are flushed, one
//! chunk per leaf in schema order. Closing the writer seals the file with
//! the thrift footer, its little-endian length, and the trailing magic.

use std::io::Write;

use tracing::debug;

use super::page::{write_data_page, write_dictionary_page};
use super::MAGIC;
use crate::errors::{ParquetResult, TracedParquetError};
use crate::meta::thrift::CompactWriter;
use crate::meta::{ColumnChunk, ColumnMetaData, FileMetaData, RowGroup, Statistics};
use crate::options::WriterOptions;
use crate::record::shred::shred_record;
use crate::record::Record;
use crate::schema::Schema;
use crate::types::Encoding;

/// Wraps the sink to track the absolute write position; chunk offsets and
/// size totals are derived by differencing it.
struct CountingWriter<W: Write> {
    inner: W,
    pos: u64,
}

impl<W: Write> CountingWriter<W> {
    fn write_all(&mut self, buf: &[u8]) -> ParquetResult<()> {
        self.inner.write_all(buf)?;
        self.pos += buf.len() as u64;
        Ok(())
    }
}

pub struct FileWriter<W: Write> {
    sink: CountingWriter<W>,
    schema: Schema,
    options: WriterOptions,
    row_groups: Vec<RowGroup>,
    group_rows: u64,
    total_rows: u64,
}

impl<W: Write> FileWriter<W> {
    pub fn new(sink: W, mut schema: Schema, options: WriterOptions) -> ParquetResult<Self> {
        if schema.num_columns() == 0 {
            return Err(TracedParquetError::schema(
                "cannot write a file with no columns",
            ));
        }
        schema.set_dictionary_limit(options.dictionary_page_limit_bytes as usize);
        let mut sink = CountingWriter { inner: sink, pos: 0 };
        sink.write_all(MAGIC)?;
        Ok(Self {
            sink,
            schema,
            options,
            row_groups: Vec::new(),
            group_rows: 0,
            total_rows: 0,
        })
    }

    pub fn schema(&self) -> &Schema {
        &self.schema
    }

    /// Shred one record into the column stores, flushing the current row
    /// group when it passes the size target.
    pub fn write_record(&mut self, record: &Record) -> ParquetResult<()> {
        shred_record(&mut self.schema, record, self.options.unknown_field_policy)?;
        self.group_rows += 1;
        if self.schema.buffered_size() as u64 >= self.options.row_group_target_bytes {
            self.flush_row_group()?;
        }
        Ok(())
    }

    /// Flush buffered rows as one row group; a no-op when empty.
    pub fn flush_row_group(&mut self) -> ParquetResult<()> {
        if self.group_rows == 0 {
            return Ok(());
        }
        let mut columns = Vec::with_capacity(self.schema.num_columns());
        let mut total_byte_size = 0i64;
        for leaf_index in 0..self.schema.num_columns() {
            let chunk = self.write_chunk(leaf_index)?;
            total_byte_size += chunk
                .meta_data
                .as_ref()
                .unwrap()
                .total_uncompressed_size;
            columns.push(chunk);
        }
        debug!(
            rows = self.group_rows,
            columns = columns.len(),
            bytes = total_byte_size,
            "flushed row group"
        );
        self.row_groups.push(RowGroup {
            columns,
            total_byte_size,
            num_rows: self.group_rows as i64,
        });
        self.total_rows += self.group_rows;
        self.group_rows = 0;
        self.schema.reset_data();
        Ok(())
    }

    fn write_chunk(&mut self, leaf_index: usize) -> ParquetResult<ColumnChunk> {
        let chunk_offset = self.sink.pos as i64;
        let codec = self
            .schema
            .leaf_store(leaf_index)
            .codec_override()
            .unwrap_or(self.options.codec);

        // size totals include the page headers, per the format's
        // accounting rules
        let mut total_compressed = 0i64;
        let mut total_uncompressed = 0i64;
        let mut dictionary_page_offset = None;
        let use_dict = self.schema.leaf_store(leaf_index).dictionary().is_some();
        if use_dict {
            let store = self.schema.leaf_store(leaf_index);
            let page = write_dictionary_page(
                store.dictionary().unwrap(),
                store.physical(),
                store.type_length(),
                codec,
            )?;
            dictionary_page_offset = Some(chunk_offset);
            let header_size = page.bytes.len() - page.compressed_size;
            total_compressed += page.bytes.len() as i64;
            total_uncompressed += (page.uncompressed_size + header_size) as i64;
            self.sink.write_all(&page.bytes)?;
        }

        let data_page_offset = self.sink.pos as i64;
        let store = self.schema.leaf_store(leaf_index);
        let page = write_data_page(store, codec)?;
        let header_size = page.bytes.len() - page.compressed_size;
        total_compressed += page.bytes.len() as i64;
        total_uncompressed += (page.uncompressed_size + header_size) as i64;

        let mut encodings = vec![
            Encoding::Rle,
            // dictionary chunks hold their actual values in PLAIN, on
            // the dictionary page
            if use_dict {
                Encoding::Plain
            } else {
                store.page_encoding()
            },
        ];
        if use_dict {
            encodings.push(Encoding::RleDictionary);
        }
        let statistics = Statistics {
            null_count: Some(store.null_count() as i64),
            distinct_count: None,
            max_value: store.max_value(),
            min_value: store.min_value(),
        };
        let meta = ColumnMetaData {
            physical: store.physical(),
            encodings,
            path_in_schema: store.path().split('.').map(String::from).collect(),
            codec,
            num_values: store.num_entries() as i64,
            total_uncompressed_size: total_uncompressed,
            total_compressed_size: total_compressed,
            data_page_offset,
            dictionary_page_offset,
            statistics: Some(statistics),
        };
        self.sink.write_all(&page.bytes)?;
        Ok(ColumnChunk {
            file_offset: chunk_offset,
            meta_data: Some(meta),
        })
    }

    /// Seal the file: flush pending rows, then write the footer, its
    /// length, and the trailing magic. Returns the sink.
    pub fn close(mut self) -> ParquetResult<W> {
        self.flush_row_group()?;
        let meta = FileMetaData {
            version: 1,
            schema: self.schema.to_elements(),
            num_rows: self.total_rows as i64,
            row_groups: std::mem::take(&mut self.row_groups),
            key_value_metadata: Vec::new(),
            created_by: self.options.created_by.clone(),
        };
        let mut w = CompactWriter::new();
        meta.write(&mut w);
        let footer = w.into_inner();
        self.sink.write_all(&footer)?;
        self.sink.write_all(&(footer.len() as u32).to_le_bytes())?;
        self.sink.write_all(MAGIC)?;
        debug!(
            rows = self.total_rows,
            row_groups = meta.row_groups.len(),
            footer_bytes = footer.len(),
            "sealed file"
        );
        Ok(self.sink.inner)
    }
}
