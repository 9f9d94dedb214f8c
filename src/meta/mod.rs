// Copyright 2022 RisingLight Project Authors. Licensed under Apache-2.0.

//! File footer and page header metadata.
//!
//! The struct shapes and field ids match the published format IDL, so
//! footers written here parse in other implementations and vice versa.
//! Unknown fields are skipped on read.

pub mod thrift;

use thrift::{CompactReader, CompactWriter, TC_BINARY, TC_BOOL_TRUE, TC_I32, TC_STRUCT};

use crate::errors::{ParquetResult, TracedParquetError};
use crate::types::{
    Codec, ConvertedType, Encoding, LogicalType, PageType, PhysicalType, Repetition, TimeUnit,
};

/// One node of the flattened pre-order schema list. Group nodes carry
/// `num_children` and no physical type; leaves carry the physical type
/// and its annotations.
#[derive(Debug, Clone, PartialEq, Default)]
pub struct SchemaElement {
    pub physical: Option<PhysicalType>,
    pub type_length: Option<i32>,
    pub repetition: Option<Repetition>,
    pub name: String,
    pub num_children: Option<i32>,
    pub converted_type: Option<ConvertedType>,
    pub scale: Option<i32>,
    pub precision: Option<i32>,
    pub logical_type: Option<LogicalType>,
}

#[derive(Debug, Clone, PartialEq)]
pub struct Statistics {
    pub null_count: Option<i64>,
    pub distinct_count: Option<i64>,
    pub max_value: Option<Vec<u8>>,
    pub min_value: Option<Vec<u8>>,
}

#[derive(Debug, Clone, PartialEq)]
pub struct ColumnMetaData {
    pub physical: PhysicalType,
    pub encodings: Vec<Encoding>,
    pub path_in_schema: Vec<String>,
    pub codec: Codec,
    pub num_values: i64,
    pub total_uncompressed_size: i64,
    pub total_compressed_size: i64,
    pub data_page_offset: i64,
    pub dictionary_page_offset: Option<i64>,
    pub statistics: Option<Statistics>,
}

#[derive(Debug, Clone, PartialEq)]
pub struct ColumnChunk {
    pub file_offset: i64,
    pub meta_data: Option<ColumnMetaData>,
}

#[derive(Debug, Clone, PartialEq)]
pub struct RowGroup {
    pub columns: Vec<ColumnChunk>,
    pub total_byte_size: i64,
    pub num_rows: i64,
}

#[derive(Debug, Clone, PartialEq)]
pub struct KeyValue {
    pub key: String,
    pub value: Option<String>,
}

#[derive(Debug, Clone, PartialEq)]
pub struct FileMetaData {
    pub version: i32,
    pub schema: Vec<SchemaElement>,
    pub num_rows: i64,
    pub row_groups: Vec<RowGroup>,
    pub key_value_metadata: Vec<KeyValue>,
    pub created_by: Option<String>,
}

#[derive(Debug, Clone, PartialEq)]
pub struct DataPageHeader {
    pub num_values: i32,
    pub encoding: Encoding,
    pub definition_level_encoding: Encoding,
    pub repetition_level_encoding: Encoding,
}

#[derive(Debug, Clone, PartialEq)]
pub struct DictionaryPageHeader {
    pub num_values: i32,
    pub encoding: Encoding,
}

#[derive(Debug, Clone, PartialEq)]
pub struct PageHeader {
    pub page_type: PageType,
    pub uncompressed_page_size: i32,
    pub compressed_page_size: i32,
    pub data_page_header: Option<DataPageHeader>,
    pub dictionary_page_header: Option<DictionaryPageHeader>,
}

fn write_logical_type(w: &mut CompactWriter, lt: &LogicalType, id: i16, last: &mut i16) {
    w.field_header(TC_STRUCT, id, last);
    let mut union_last = 0i16;
    match *lt {
        LogicalType::String => w.field_header(TC_STRUCT, 1, &mut union_last),
        LogicalType::Map => w.field_header(TC_STRUCT, 2, &mut union_last),
        LogicalType::List => w.field_header(TC_STRUCT, 3, &mut union_last),
        LogicalType::Enum => w.field_header(TC_STRUCT, 4, &mut union_last),
        LogicalType::Decimal { scale, precision } => {
            w.field_header(TC_STRUCT, 5, &mut union_last);
            let mut last = 0i16;
            w.i32_field(1, scale, &mut last);
            w.i32_field(2, precision, &mut last);
        }
        LogicalType::Date => w.field_header(TC_STRUCT, 6, &mut union_last),
        LogicalType::Time {
            unit,
            adjusted_to_utc,
        } => {
            w.field_header(TC_STRUCT, 7, &mut union_last);
            write_time_body(w, unit, adjusted_to_utc);
        }
        LogicalType::Timestamp {
            unit,
            adjusted_to_utc,
        } => {
            w.field_header(TC_STRUCT, 8, &mut union_last);
            write_time_body(w, unit, adjusted_to_utc);
        }
        LogicalType::Integer { bit_width, signed } => {
            w.field_header(TC_STRUCT, 10, &mut union_last);
            let mut last = 0i16;
            w.byte_field(1, bit_width, &mut last);
            w.bool_field(2, signed, &mut last);
        }
        LogicalType::Json => w.field_header(TC_STRUCT, 12, &mut union_last),
        LogicalType::Bson => w.field_header(TC_STRUCT, 13, &mut union_last),
        LogicalType::Uuid => w.field_header(TC_STRUCT, 14, &mut union_last),
    }
    w.field_stop(); // variant struct
    w.field_stop(); // union struct
}

fn write_time_body(w: &mut CompactWriter, unit: TimeUnit, adjusted_to_utc: bool) {
    let mut last = 0i16;
    w.bool_field(1, adjusted_to_utc, &mut last);
    w.field_header(TC_STRUCT, 2, &mut last);
    let mut unit_last = 0i16;
    let variant = match unit {
        TimeUnit::Millis => 1,
        TimeUnit::Micros => 2,
        TimeUnit::Nanos => 3,
    };
    w.field_header(TC_STRUCT, variant, &mut unit_last);
    w.field_stop(); // unit variant
    w.field_stop(); // unit union
}

fn read_time_unit(r: &mut CompactReader) -> ParquetResult<TimeUnit> {
    let mut last = 0i16;
    let mut unit = None;
    while let Some((ft, id)) = r.read_field_header(&mut last)? {
        match id {
            1 => {
                r.skip(ft)?;
                unit = Some(TimeUnit::Millis);
            }
            2 => {
                r.skip(ft)?;
                unit = Some(TimeUnit::Micros);
            }
            3 => {
                r.skip(ft)?;
                unit = Some(TimeUnit::Nanos);
            }
            _ => r.skip(ft)?,
        }
    }
    unit.ok_or_else(|| TracedParquetError::corrupt("time unit union is empty"))
}

fn read_time_body(r: &mut CompactReader) -> ParquetResult<(TimeUnit, bool)> {
    let mut last = 0i16;
    let mut adjusted = false;
    let mut unit = None;
    while let Some((ft, id)) = r.read_field_header(&mut last)? {
        match id {
            1 => adjusted = ft == TC_BOOL_TRUE,
            2 => unit = Some(read_time_unit(r)?),
            _ => r.skip(ft)?,
        }
    }
    Ok((
        unit.ok_or_else(|| TracedParquetError::corrupt("time type without a unit"))?,
        adjusted,
    ))
}

fn read_logical_type(r: &mut CompactReader) -> ParquetResult<LogicalType> {
    let mut last = 0i16;
    let mut result = None;
    while let Some((ft, id)) = r.read_field_header(&mut last)? {
        let lt = match id {
            1 => {
                r.skip(ft)?;
                LogicalType::String
            }
            2 => {
                r.skip(ft)?;
                LogicalType::Map
            }
            3 => {
                r.skip(ft)?;
                LogicalType::List
            }
            4 => {
                r.skip(ft)?;
                LogicalType::Enum
            }
            5 => {
                let mut inner_last = 0i16;
                let mut scale = 0;
                let mut precision = 0;
                while let Some((ift, iid)) = r.read_field_header(&mut inner_last)? {
                    match iid {
                        1 => scale = r.read_i32()?,
                        2 => precision = r.read_i32()?,
                        _ => r.skip(ift)?,
                    }
                }
                LogicalType::Decimal { scale, precision }
            }
            6 => {
                r.skip(ft)?;
                LogicalType::Date
            }
            7 => {
                let (unit, adjusted_to_utc) = read_time_body(r)?;
                LogicalType::Time {
                    unit,
                    adjusted_to_utc,
                }
            }
            8 => {
                let (unit, adjusted_to_utc) = read_time_body(r)?;
                LogicalType::Timestamp {
                    unit,
                    adjusted_to_utc,
                }
            }
            10 => {
                let mut inner_last = 0i16;
                let mut bit_width = 0i8;
                let mut signed = false;
                while let Some((ift, iid)) = r.read_field_header(&mut inner_last)? {
                    match iid {
                        1 => bit_width = r.read_byte()?,
                        2 => signed = ift == TC_BOOL_TRUE,
                        _ => r.skip(ift)?,
                    }
                }
                LogicalType::Integer { bit_width, signed }
            }
            12 => {
                r.skip(ft)?;
                LogicalType::Json
            }
            13 => {
                r.skip(ft)?;
                LogicalType::Bson
            }
            14 => {
                r.skip(ft)?;
                LogicalType::Uuid
            }
            _ => {
                r.skip(ft)?;
                continue;
            }
        };
        result = Some(lt);
    }
    result.ok_or_else(|| TracedParquetError::corrupt("logical type union is empty"))
}

impl SchemaElement {
    pub fn write(&self, w: &mut CompactWriter) {
        let mut last = 0i16;
        if let Some(physical) = self.physical {
            w.i32_field(1, physical.to_i32(), &mut last);
        }
        if let Some(len) = self.type_length {
            w.i32_field(2, len, &mut last);
        }
        if let Some(rep) = self.repetition {
            w.i32_field(3, rep.to_i32(), &mut last);
        }
        w.binary_field(4, self.name.as_bytes(), &mut last);
        if let Some(n) = self.num_children {
            w.i32_field(5, n, &mut last);
        }
        if let Some(ct) = self.converted_type {
            w.i32_field(6, ct.to_i32(), &mut last);
        }
        if let Some(scale) = self.scale {
            w.i32_field(7, scale, &mut last);
        }
        if let Some(precision) = self.precision {
            w.i32_field(8, precision, &mut last);
        }
        if let Some(lt) = &self.logical_type {
            write_logical_type(w, lt, 10, &mut last);
        }
        w.field_stop();
    }

    pub fn read(r: &mut CompactReader) -> ParquetResult<Self> {
        let mut elem = SchemaElement::default();
        let mut last = 0i16;
        let mut saw_name = false;
        while let Some((ft, id)) = r.read_field_header(&mut last)? {
            match id {
                1 => elem.physical = Some(PhysicalType::from_i32(r.read_i32()?)?),
                2 => elem.type_length = Some(r.read_i32()?),
                3 => elem.repetition = Some(Repetition::from_i32(r.read_i32()?)?),
                4 => {
                    elem.name = r.read_string()?;
                    saw_name = true;
                }
                5 => elem.num_children = Some(r.read_i32()?),
                6 => elem.converted_type = Some(ConvertedType::from_i32(r.read_i32()?)?),
                7 => elem.scale = Some(r.read_i32()?),
                8 => elem.precision = Some(r.read_i32()?),
                10 => elem.logical_type = Some(read_logical_type(r)?),
                _ => r.skip(ft)?,
            }
        }
        if !saw_name {
            return Err(TracedParquetError::corrupt("schema element without a name"));
        }
        Ok(elem)
    }
}

impl Statistics {
    pub fn write(&self, w: &mut CompactWriter) {
        let mut last = 0i16;
        if let Some(n) = self.null_count {
            w.i64_field(3, n, &mut last);
        }
        if let Some(n) = self.distinct_count {
            w.i64_field(4, n, &mut last);
        }
        if let Some(v) = &self.max_value {
            w.binary_field(5, v, &mut last);
        }
        if let Some(v) = &self.min_value {
            w.binary_field(6, v, &mut last);
        }
        w.field_stop();
    }

    pub fn read(r: &mut CompactReader) -> ParquetResult<Self> {
        let mut stats = Statistics {
            null_count: None,
            distinct_count: None,
            max_value: None,
            min_value: None,
        };
        let mut last = 0i16;
        while let Some((ft, id)) = r.read_field_header(&mut last)? {
            match id {
                3 => stats.null_count = Some(r.read_i64()?),
                4 => stats.distinct_count = Some(r.read_i64()?),
                5 => stats.max_value = Some(r.read_binary()?),
                6 => stats.min_value = Some(r.read_binary()?),
                _ => r.skip(ft)?,
            }
        }
        Ok(stats)
    }
}

impl ColumnMetaData {
    pub fn write(&self, w: &mut CompactWriter) {
        let mut last = 0i16;
        w.i32_field(1, self.physical.to_i32(), &mut last);
        w.list_field(2, TC_I32, self.encodings.len(), &mut last);
        for e in &self.encodings {
            w.write_i32_elem(e.to_i32());
        }
        w.list_field(3, TC_BINARY, self.path_in_schema.len(), &mut last);
        for p in &self.path_in_schema {
            w.write_binary(p.as_bytes());
        }
        w.i32_field(4, self.codec.to_i32(), &mut last);
        w.i64_field(5, self.num_values, &mut last);
        w.i64_field(6, self.total_uncompressed_size, &mut last);
        w.i64_field(7, self.total_compressed_size, &mut last);
        w.i64_field(9, self.data_page_offset, &mut last);
        if let Some(off) = self.dictionary_page_offset {
            w.i64_field(11, off, &mut last);
        }
        if let Some(stats) = &self.statistics {
            w.field_header(TC_STRUCT, 12, &mut last);
            stats.write(w);
        }
        w.field_stop();
    }

    pub fn read(r: &mut CompactReader) -> ParquetResult<Self> {
        let mut physical = None;
        let mut encodings = Vec::new();
        let mut path_in_schema = Vec::new();
        let mut codec = None;
        let mut num_values = 0;
        let mut total_uncompressed_size = 0;
        let mut total_compressed_size = 0;
        let mut data_page_offset = None;
        let mut dictionary_page_offset = None;
        let mut statistics = None;
        let mut last = 0i16;
        while let Some((ft, id)) = r.read_field_header(&mut last)? {
            match id {
                1 => physical = Some(PhysicalType::from_i32(r.read_i32()?)?),
                2 => {
                    let (_, len) = r.read_list_header()?;
                    for _ in 0..len {
                        encodings.push(Encoding::from_i32(r.read_i32()?)?);
                    }
                }
                3 => {
                    let (_, len) = r.read_list_header()?;
                    for _ in 0..len {
                        path_in_schema.push(r.read_string()?);
                    }
                }
                4 => codec = Some(Codec::from_i32(r.read_i32()?)?),
                5 => num_values = r.read_i64()?,
                6 => total_uncompressed_size = r.read_i64()?,
                7 => total_compressed_size = r.read_i64()?,
                9 => data_page_offset = Some(r.read_i64()?),
                11 => dictionary_page_offset = Some(r.read_i64()?),
                12 => statistics = Some(Statistics::read(r)?),
                _ => r.skip(ft)?,
            }
        }
        Ok(ColumnMetaData {
            physical: physical
                .ok_or_else(|| TracedParquetError::corrupt("column metadata without a type"))?,
            encodings,
            path_in_schema,
            codec: codec
                .ok_or_else(|| TracedParquetError::corrupt("column metadata without a codec"))?,
            num_values,
            total_uncompressed_size,
            total_compressed_size,
            data_page_offset: data_page_offset.ok_or_else(|| {
                TracedParquetError::corrupt("column metadata without a data page offset")
            })?,
            dictionary_page_offset,
            statistics,
        })
    }
}

impl ColumnChunk {
    pub fn write(&self, w: &mut CompactWriter) {
        let mut last = 0i16;
        w.i64_field(2, self.file_offset, &mut last);
        if let Some(meta) = &self.meta_data {
            w.field_header(TC_STRUCT, 3, &mut last);
            meta.write(w);
        }
        w.field_stop();
    }

    pub fn read(r: &mut CompactReader) -> ParquetResult<Self> {
        let mut file_offset = 0;
        let mut meta_data = None;
        let mut last = 0i16;
        while let Some((ft, id)) = r.read_field_header(&mut last)? {
            match id {
                2 => file_offset = r.read_i64()?,
                3 => meta_data = Some(ColumnMetaData::read(r)?),
                _ => r.skip(ft)?,
            }
        }
        Ok(ColumnChunk {
            file_offset,
            meta_data,
        })
    }
}

impl RowGroup {
    pub fn write(&self, w: &mut CompactWriter) {
        let mut last = 0i16;
        w.list_field(1, TC_STRUCT, self.columns.len(), &mut last);
        for c in &self.columns {
            c.write(w);
        }
        w.i64_field(2, self.total_byte_size, &mut last);
        w.i64_field(3, self.num_rows, &mut last);
        w.field_stop();
    }

    pub fn read(r: &mut CompactReader) -> ParquetResult<Self> {
        let mut columns = Vec::new();
        let mut total_byte_size = 0;
        let mut num_rows = 0;
        let mut last = 0i16;
        while let Some((ft, id)) = r.read_field_header(&mut last)? {
            match id {
                1 => {
                    let (_, len) = r.read_list_header()?;
                    for _ in 0..len {
                        columns.push(ColumnChunk::read(r)?);
                    }
                }
                2 => total_byte_size = r.read_i64()?,
                3 => num_rows = r.read_i64()?,
                _ => r.skip(ft)?,
            }
        }
        Ok(RowGroup {
            columns,
            total_byte_size,
            num_rows,
        })
    }
}

impl KeyValue {
    pub fn write(&self, w: &mut CompactWriter) {
        let mut last = 0i16;
        w.binary_field(1, self.key.as_bytes(), &mut last);
        if let Some(v) = &self.value {
            w.binary_field(2, v.as_bytes(), &mut last);
        }
        w.field_stop();
    }

    pub fn read(r: &mut CompactReader) -> ParquetResult<Self> {
        let mut key = String::new();
        let mut value = None;
        let mut last = 0i16;
        while let Some((ft, id)) = r.read_field_header(&mut last)? {
            match id {
                1 => key = r.read_string()?,
                2 => value = Some(r.read_string()?),
                _ => r.skip(ft)?,
            }
        }
        Ok(KeyValue { key, value })
    }
}

impl FileMetaData {
    pub fn write(&self, w: &mut CompactWriter) {
        let mut last = 0i16;
        w.i32_field(1, self.version, &mut last);
        w.list_field(2, TC_STRUCT, self.schema.len(), &mut last);
        for elem in &self.schema {
            elem.write(w);
        }
        w.i64_field(3, self.num_rows, &mut last);
        w.list_field(4, TC_STRUCT, self.row_groups.len(), &mut last);
        for rg in &self.row_groups {
            rg.write(w);
        }
        if !self.key_value_metadata.is_empty() {
            w.list_field(5, TC_STRUCT, self.key_value_metadata.len(), &mut last);
            for kv in &self.key_value_metadata {
                kv.write(w);
            }
        }
        if let Some(created_by) = &self.created_by {
            w.binary_field(6, created_by.as_bytes(), &mut last);
        }
        w.field_stop();
    }

    pub fn read(r: &mut CompactReader) -> ParquetResult<Self> {
        let mut version = 0;
        let mut schema = Vec::new();
        let mut num_rows = 0;
        let mut row_groups = Vec::new();
        let mut key_value_metadata = Vec::new();
        let mut created_by = None;
        let mut last = 0i16;
        while let Some((ft, id)) = r.read_field_header(&mut last)? {
            match id {
                1 => version = r.read_i32()?,
                2 => {
                    let (_, len) = r.read_list_header()?;
                    for _ in 0..len {
                        schema.push(SchemaElement::read(r)?);
                    }
                }
                3 => num_rows = r.read_i64()?,
                4 => {
                    let (_, len) = r.read_list_header()?;
                    for _ in 0..len {
                        row_groups.push(RowGroup::read(r)?);
                    }
                }
                5 => {
                    let (_, len) = r.read_list_header()?;
                    for _ in 0..len {
                        key_value_metadata.push(KeyValue::read(r)?);
                    }
                }
                6 => created_by = Some(r.read_string()?),
                _ => r.skip(ft)?,
            }
        }
        Ok(FileMetaData {
            version,
            schema,
            num_rows,
            row_groups,
            key_value_metadata,
            created_by,
        })
    }
}

impl DataPageHeader {
    fn write(&self, w: &mut CompactWriter) {
        let mut last = 0i16;
        w.i32_field(1, self.num_values, &mut last);
        w.i32_field(2, self.encoding.to_i32(), &mut last);
        w.i32_field(3, self.definition_level_encoding.to_i32(), &mut last);
        w.i32_field(4, self.repetition_level_encoding.to_i32(), &mut last);
        w.field_stop();
    }

    fn read(r: &mut CompactReader) -> ParquetResult<Self> {
        let mut num_values = 0;
        let mut encoding = Encoding::Plain;
        let mut definition_level_encoding = Encoding::Rle;
        let mut repetition_level_encoding = Encoding::Rle;
        let mut last = 0i16;
        while let Some((ft, id)) = r.read_field_header(&mut last)? {
            match id {
                1 => num_values = r.read_i32()?,
                2 => encoding = Encoding::from_i32(r.read_i32()?)?,
                3 => definition_level_encoding = Encoding::from_i32(r.read_i32()?)?,
                4 => repetition_level_encoding = Encoding::from_i32(r.read_i32()?)?,
                _ => r.skip(ft)?,
            }
        }
        Ok(DataPageHeader {
            num_values,
            encoding,
            definition_level_encoding,
            repetition_level_encoding,
        })
    }
}

impl DictionaryPageHeader {
    fn write(&self, w: &mut CompactWriter) {
        let mut last = 0i16;
        w.i32_field(1, self.num_values, &mut last);
        w.i32_field(2, self.encoding.to_i32(), &mut last);
        w.field_stop();
    }

    fn read(r: &mut CompactReader) -> ParquetResult<Self> {
        let mut num_values = 0;
        let mut encoding = Encoding::Plain;
        let mut last = 0i16;
        while let Some((ft, id)) = r.read_field_header(&mut last)? {
            match id {
                1 => num_values = r.read_i32()?,
                2 => encoding = Encoding::from_i32(r.read_i32()?)?,
                _ => r.skip(ft)?,
            }
        }
        Ok(DictionaryPageHeader {
            num_values,
            encoding,
        })
    }
}

impl PageHeader {
    pub fn write(&self, w: &mut CompactWriter) {
        let mut last = 0i16;
        w.i32_field(1, self.page_type.to_i32(), &mut last);
        w.i32_field(2, self.uncompressed_page_size, &mut last);
        w.i32_field(3, self.compressed_page_size, &mut last);
        if let Some(h) = &self.data_page_header {
            w.field_header(TC_STRUCT, 5, &mut last);
            h.write(w);
        }
        if let Some(h) = &self.dictionary_page_header {
            w.field_header(TC_STRUCT, 7, &mut last);
            h.write(w);
        }
        w.field_stop();
    }

    pub fn read(r: &mut CompactReader) -> ParquetResult<Self> {
        let mut page_type = None;
        let mut uncompressed_page_size = 0;
        let mut compressed_page_size = 0;
        let mut data_page_header = None;
        let mut dictionary_page_header = None;
        let mut last = 0i16;
        while let Some((ft, id)) = r.read_field_header(&mut last)? {
            match id {
                1 => page_type = Some(PageType::from_i32(r.read_i32()?)?),
                2 => uncompressed_page_size = r.read_i32()?,
                3 => compressed_page_size = r.read_i32()?,
                5 => data_page_header = Some(DataPageHeader::read(r)?),
                7 => dictionary_page_header = Some(DictionaryPageHeader::read(r)?),
                _ => r.skip(ft)?,
            }
        }
        Ok(PageHeader {
            page_type: page_type
                .ok_or_else(|| TracedParquetError::corrupt("page header without a type"))?,
            uncompressed_page_size,
            compressed_page_size,
            data_page_header,
            dictionary_page_header,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn roundtrip_meta(meta: &FileMetaData) -> FileMetaData {
        let mut w = CompactWriter::new();
        meta.write(&mut w);
        let buf = w.into_inner();
        FileMetaData::read(&mut CompactReader::new(&buf)).unwrap()
    }

    #[test]
    fn test_file_meta_roundtrip() {
        let meta = FileMetaData {
            version: 1,
            schema: vec![
                SchemaElement {
                    name: "schema".into(),
                    num_children: Some(2),
                    ..Default::default()
                },
                SchemaElement {
                    physical: Some(PhysicalType::Int64),
                    repetition: Some(Repetition::Required),
                    name: "a".into(),
                    logical_type: Some(LogicalType::Integer {
                        bit_width: 64,
                        signed: true,
                    }),
                    ..Default::default()
                },
                SchemaElement {
                    physical: Some(PhysicalType::ByteArray),
                    repetition: Some(Repetition::Optional),
                    name: "s".into(),
                    converted_type: Some(ConvertedType::Utf8),
                    logical_type: Some(LogicalType::String),
                    ..Default::default()
                },
            ],
            num_rows: 10,
            row_groups: vec![RowGroup {
                columns: vec![ColumnChunk {
                    file_offset: 4,
                    meta_data: Some(ColumnMetaData {
                        physical: PhysicalType::Int64,
                        encodings: vec![Encoding::Rle, Encoding::Plain, Encoding::RleDictionary],
                        path_in_schema: vec!["a".into()],
                        codec: Codec::Snappy,
                        num_values: 10,
                        total_uncompressed_size: 120,
                        total_compressed_size: 88,
                        data_page_offset: 40,
                        dictionary_page_offset: Some(4),
                        statistics: Some(Statistics {
                            null_count: Some(0),
                            distinct_count: None,
                            max_value: Some(vec![9, 0, 0, 0, 0, 0, 0, 0]),
                            min_value: Some(vec![1, 0, 0, 0, 0, 0, 0, 0]),
                        }),
                    }),
                }],
                total_byte_size: 120,
                num_rows: 10,
            }],
            key_value_metadata: vec![],
            created_by: Some("parquet-light".into()),
        };
        assert_eq!(roundtrip_meta(&meta), meta);
    }

    #[test]
    fn test_logical_type_unions() {
        for lt in [
            LogicalType::String,
            LogicalType::Decimal {
                scale: 5,
                precision: 15,
            },
            LogicalType::Date,
            LogicalType::Time {
                unit: TimeUnit::Micros,
                adjusted_to_utc: true,
            },
            LogicalType::Timestamp {
                unit: TimeUnit::Nanos,
                adjusted_to_utc: false,
            },
            LogicalType::Integer {
                bit_width: 16,
                signed: false,
            },
            LogicalType::Uuid,
        ] {
            let mut w = CompactWriter::new();
            let mut last = 0i16;
            write_logical_type(&mut w, &lt, 10, &mut last);
            let buf = w.into_inner();
            let mut r = CompactReader::new(&buf);
            let mut last = 0i16;
            let (ft, id) = r.read_field_header(&mut last).unwrap().unwrap();
            assert_eq!((ft, id), (TC_STRUCT, 10));
            assert_eq!(read_logical_type(&mut r).unwrap(), lt);
        }
    }

    #[test]
    fn test_page_header_roundtrip() {
        let header = PageHeader {
            page_type: PageType::DataPage,
            uncompressed_page_size: 100,
            compressed_page_size: 60,
            data_page_header: Some(DataPageHeader {
                num_values: 25,
                encoding: Encoding::RleDictionary,
                definition_level_encoding: Encoding::Rle,
                repetition_level_encoding: Encoding::Rle,
            }),
            dictionary_page_header: None,
        };
        let mut w = CompactWriter::new();
        header.write(&mut w);
        let buf = w.into_inner();
        let mut r = CompactReader::new(&buf);
        assert_eq!(PageHeader::read(&mut r).unwrap(), header);
        assert_eq!(r.position(), buf.len());
    }
}
