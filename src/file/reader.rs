// Copyright 2022 RisingLight Project Authors. Licensed under Apache-2.0.

//! The file reader: validate the magic markers, parse the footer,
//! rebuild the schema, and iterate assembled records row group by row
//! group.

use std::io::{Read, Seek, SeekFrom};

use super::page::{decode_data_page, decode_dictionary_page, read_page};
use super::MAGIC;
use crate::errors::{ParquetResult, TracedParquetError};
use crate::meta::thrift::CompactReader;
use crate::meta::{FileMetaData, RowGroup};
use crate::record::assemble::{Assembler, ColumnData};
use crate::record::Record;
use crate::schema::Schema;
use crate::types::{PageType, Value};

pub struct FileReader<R: Read + Seek> {
    reader: R,
    meta: FileMetaData,
    schema: Schema,
    next_group: usize,
    assembler: Option<Assembler>,
}

impl<R: Read + Seek> FileReader<R> {
    pub fn new(mut reader: R) -> ParquetResult<Self> {
        let size = reader.seek(SeekFrom::End(0))?;
        if size < (MAGIC.len() * 2 + 4) as u64 {
            return Err(TracedParquetError::corrupt(format!(
                "{size} bytes is too short for a sealed file"
            )));
        }
        let mut head = [0u8; 4];
        reader.seek(SeekFrom::Start(0))?;
        reader.read_exact(&mut head)?;
        if &head != MAGIC {
            return Err(TracedParquetError::corrupt("leading magic mismatch"));
        }
        let mut tail = [0u8; 8];
        reader.seek(SeekFrom::End(-8))?;
        reader.read_exact(&mut tail)?;
        if &tail[4..] != MAGIC {
            return Err(TracedParquetError::corrupt("trailing magic mismatch"));
        }
        let footer_len = u32::from_le_bytes([tail[0], tail[1], tail[2], tail[3]]) as u64;
        if footer_len + 12 > size {
            return Err(TracedParquetError::corrupt(format!(
                "footer of {footer_len} bytes does not fit in a {size}-byte file"
            )));
        }
        reader.seek(SeekFrom::Start(size - 8 - footer_len))?;
        let mut footer = vec![0u8; footer_len as usize];
        reader.read_exact(&mut footer)?;
        let meta = FileMetaData::read(&mut CompactReader::new(&footer))?;
        let schema = Schema::from_elements(&meta.schema)?;
        Ok(Self {
            reader,
            meta,
            schema,
            next_group: 0,
            assembler: None,
        })
    }

    pub fn metadata(&self) -> &FileMetaData {
        &self.meta
    }

    pub fn schema(&self) -> &Schema {
        &self.schema
    }

    pub fn num_row_groups(&self) -> usize {
        self.meta.row_groups.len()
    }

    pub fn num_rows(&self) -> i64 {
        self.meta.num_rows
    }

    /// The next assembled record, crossing row-group boundaries, or
    /// `None` at the end of the file.
    pub fn next_record(&mut self) -> ParquetResult<Option<Record>> {
        loop {
            if let Some(assembler) = self.assembler.as_mut() {
                if let Some(record) = assembler.next_record(&self.schema)? {
                    return Ok(Some(record));
                }
                self.assembler = None;
            }
            if self.next_group >= self.meta.row_groups.len() {
                return Ok(None);
            }
            let columns = self.read_row_group_columns(self.next_group)?;
            self.next_group += 1;
            self.assembler = Some(Assembler::new(&self.schema, columns)?);
        }
    }

    pub fn read_all(&mut self) -> ParquetResult<Vec<Record>> {
        let mut out = Vec::new();
        while let Some(record) = self.next_record()? {
            out.push(record);
        }
        Ok(out)
    }

    /// Read and decode every chunk of one row group, in schema order.
    fn read_row_group_columns(&mut self, group: usize) -> ParquetResult<Vec<ColumnData>> {
        let row_group: RowGroup = self.meta.row_groups[group].clone();
        if row_group.columns.len() != self.schema.num_columns() {
            return Err(TracedParquetError::corrupt(format!(
                "row group {} has {} chunks for {} schema leaves",
                group,
                row_group.columns.len(),
                self.schema.num_columns()
            )));
        }
        let leaves: Vec<_> = self
            .schema
            .columns()
            .map(|leaf| {
                let store = leaf.store().unwrap();
                (
                    leaf.path().to_string(),
                    store.physical(),
                    store.type_length(),
                    leaf.max_def(),
                    leaf.max_rep(),
                )
            })
            .collect();

        let mut columns = Vec::with_capacity(leaves.len());
        for (chunk, (path, physical, type_length, max_def, max_rep)) in
            row_group.columns.iter().zip(leaves)
        {
            let meta = chunk.meta_data.as_ref().ok_or_else(|| {
                TracedParquetError::corrupt("column chunk without embedded metadata")
            })?;
            if meta.path_in_schema.join(".") != path {
                return Err(TracedParquetError::corrupt(format!(
                    "chunk path {:?} does not match schema leaf {:?}",
                    meta.path_in_schema.join("."),
                    path
                )));
            }
            if meta.physical != physical {
                return Err(TracedParquetError::corrupt(format!(
                    "chunk for {:?} stores {:?}, schema says {:?}",
                    path, meta.physical, physical
                )));
            }
            let start = meta.dictionary_page_offset.unwrap_or(meta.data_page_offset);
            let len = usize::try_from(meta.total_compressed_size).map_err(|_| {
                TracedParquetError::corrupt("negative total compressed size")
            })?;
            let start = u64::try_from(start)
                .map_err(|_| TracedParquetError::corrupt("negative chunk offset"))?;
            self.reader.seek(SeekFrom::Start(start))?;
            let mut buf = vec![0u8; len];
            self.reader.read_exact(&mut buf)?;

            let num_values = usize::try_from(meta.num_values)
                .map_err(|_| TracedParquetError::corrupt("negative chunk value count"))?;
            let mut dictionary: Option<Vec<Value>> = None;
            let mut data = ColumnData::default();
            let mut entries = 0usize;
            let mut offset = 0usize;
            while entries < num_values {
                if offset >= buf.len() {
                    return Err(TracedParquetError::corrupt(format!(
                        "chunk for {:?} ended after {} of {} values",
                        path, entries, num_values
                    )));
                }
                let page = read_page(&buf[offset..], meta.codec)?;
                offset += page.consumed;
                match page.header.page_type {
                    PageType::DictionaryPage => {
                        if dictionary.is_some() {
                            return Err(TracedParquetError::corrupt(
                                "chunk carries a second dictionary page",
                            ));
                        }
                        let header = page.header.dictionary_page_header.as_ref().ok_or_else(
                            || TracedParquetError::corrupt("dictionary page without its header"),
                        )?;
                        dictionary = Some(decode_dictionary_page(
                            header,
                            &page.payload,
                            physical,
                            type_length,
                        )?);
                    }
                    PageType::DataPage => {
                        let header = page.header.data_page_header.as_ref().ok_or_else(|| {
                            TracedParquetError::corrupt("data page without its header")
                        })?;
                        let page_data = decode_data_page(
                            header,
                            &page.payload,
                            physical,
                            type_length,
                            max_def,
                            max_rep,
                            dictionary.as_deref(),
                        )?;
                        entries += page_data.def_levels.len();
                        data.append(page_data);
                    }
                }
            }
            if entries != num_values {
                return Err(TracedParquetError::corrupt(format!(
                    "chunk for {:?} decodes {} values, metadata says {}",
                    path, entries, num_values
                )));
            }
            columns.push(data);
        }
        Ok(columns)
    }
}
