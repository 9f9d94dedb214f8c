// Copyright 2022 RisingLight Project Authors. Licensed under Apache-2.0.

//! End-to-end write/read scenarios over in-memory files.

use std::io::Cursor;

use parquet_light::column::ColumnDescriptor;
use parquet_light::file::{FileReader, FileWriter, MAGIC};
use parquet_light::meta::thrift::CompactReader;
use parquet_light::meta::PageHeader;
use parquet_light::record::{Datum, Record};
use parquet_light::schema::Schema;
use parquet_light::types::{LogicalType, PageType, PhysicalType, Repetition};
use parquet_light::{Codec, Encoding, Value, WriterOptions};

fn write_file(schema: Schema, options: WriterOptions, records: &[Record]) -> Vec<u8> {
    let mut writer = FileWriter::new(Vec::new(), schema, options).unwrap();
    for record in records {
        writer.write_record(record).unwrap();
    }
    writer.close().unwrap()
}

fn read_back(bytes: Vec<u8>) -> (Vec<Record>, parquet_light::meta::FileMetaData) {
    let mut reader = FileReader::new(Cursor::new(bytes)).unwrap();
    let records = reader.read_all().unwrap();
    let meta = reader.metadata().clone();
    (records, meta)
}

/// Parse the page header at `offset` and return it with the byte offset
/// of its payload.
fn page_at(bytes: &[u8], offset: usize) -> (PageHeader, usize) {
    let mut r = CompactReader::new(&bytes[offset..]);
    let header = PageHeader::read(&mut r).unwrap();
    (header, offset + r.position())
}

#[test]
fn test_s1_flat_required_ints() {
    let mut schema = Schema::new();
    schema
        .add_column(
            "a",
            ColumnDescriptor::new(PhysicalType::Int32).with_encoding(Encoding::Plain),
            Repetition::Required,
        )
        .unwrap();
    let records: Vec<Record> = (1..=3).map(|i| Record::new().with("a", i)).collect();
    let bytes = write_file(schema, WriterOptions::default_for_test(), &records);
    let (out, meta) = read_back(bytes);

    assert_eq!(out, records);
    assert_eq!(meta.num_rows, 3);
    assert_eq!(meta.row_groups.len(), 1);
    assert_eq!(meta.row_groups[0].columns.len(), 1);
    let chunk = meta.row_groups[0].columns[0].meta_data.as_ref().unwrap();
    assert_eq!(chunk.num_values, 3);
}

#[test]
fn test_s2_optional_string_with_null() {
    let mut schema = Schema::new();
    schema
        .add_column(
            "s",
            ColumnDescriptor::new(PhysicalType::ByteArray)
                .with_logical(LogicalType::String)
                .with_encoding(Encoding::Plain),
            Repetition::Optional,
        )
        .unwrap();
    let records = vec![
        Record::new().with("s", "hi"),
        Record::new(),
        Record::new().with("s", "yo"),
    ];
    let bytes = write_file(schema, WriterOptions::default_for_test(), &records);

    let (out, meta) = read_back(bytes.clone());
    assert_eq!(out, records);
    let chunk = meta.row_groups[0].columns[0].meta_data.as_ref().unwrap();
    assert_eq!(chunk.statistics.as_ref().unwrap().null_count, Some(1));

    // byte-exact page payload: def levels [1, 0, 1] at bit width 1 in the
    // sized hybrid framing, then the two plain byte arrays
    let (header, payload_at) = page_at(&bytes, chunk.data_page_offset as usize);
    assert_eq!(header.data_page_header.unwrap().num_values, 3);
    let payload = &bytes[payload_at..payload_at + header.uncompressed_page_size as usize];
    let mut expected = vec![2, 0, 0, 0, 0b11, 0b101];
    expected.extend([2, 0, 0, 0]);
    expected.extend(b"hi");
    expected.extend([2, 0, 0, 0]);
    expected.extend(b"yo");
    assert_eq!(payload, expected.as_slice());
}

#[test]
fn test_s3_repeated_list() {
    let mut schema = Schema::new();
    schema
        .add_column(
            "xs",
            ColumnDescriptor::new(PhysicalType::Int64).with_encoding(Encoding::Plain),
            Repetition::Repeated,
        )
        .unwrap();
    let records = vec![
        Record::new().with("xs", Datum::list_of([10i64, 20, 30])),
        Record::new().with("xs", Datum::List(vec![])),
        Record::new().with("xs", Datum::list_of([40i64])),
    ];
    let bytes = write_file(schema, WriterOptions::default_for_test(), &records);
    let (out, meta) = read_back(bytes);

    assert_eq!(out, records);
    assert_eq!(meta.num_rows, 3);
    let chunk = meta.row_groups[0].columns[0].meta_data.as_ref().unwrap();
    // five logical entries: four values plus the empty-list null
    assert_eq!(chunk.num_values, 5);
}

#[test]
fn test_s4_dictionary_on_strings() {
    let mut schema = Schema::new();
    schema
        .add_column(
            "k",
            ColumnDescriptor::new(PhysicalType::ByteArray).with_logical(LogicalType::String),
            Repetition::Optional,
        )
        .unwrap();
    let keys = ["north", "south", "east", "west"];
    let records: Vec<Record> = (0..1000)
        .map(|i| Record::new().with("k", keys[i % 4]))
        .collect();
    let bytes = write_file(
        schema,
        WriterOptions::default().with_codec(Codec::Uncompressed),
        &records,
    );

    let (out, meta) = read_back(bytes.clone());
    assert_eq!(out, records);
    let chunk = meta.row_groups[0].columns[0].meta_data.as_ref().unwrap();
    assert_eq!(
        chunk.encodings,
        vec![Encoding::Rle, Encoding::Plain, Encoding::RleDictionary]
    );

    // the chunk leads with a dictionary page of four entries
    let dict_offset = chunk.dictionary_page_offset.unwrap() as usize;
    assert_eq!(meta.row_groups[0].columns[0].file_offset as usize, dict_offset);
    let (dict_header, _) = page_at(&bytes, dict_offset);
    assert_eq!(dict_header.page_type, PageType::DictionaryPage);
    assert_eq!(dict_header.dictionary_page_header.unwrap().num_values, 4);

    // the index stream addresses four entries with two bits
    let (data_header, payload_at) = page_at(&bytes, chunk.data_page_offset as usize);
    assert_eq!(
        data_header.data_page_header.unwrap().encoding,
        Encoding::RleDictionary
    );
    let def_len = u32::from_le_bytes(bytes[payload_at..payload_at + 4].try_into().unwrap());
    let index_stream_at = payload_at + 4 + def_len as usize;
    assert_eq!(bytes[index_stream_at], 2);
}

#[test]
fn test_s5_delta_binary_packed_ints() {
    let mut schema = Schema::new();
    schema
        .add_column(
            "n",
            ColumnDescriptor::new(PhysicalType::Int64).with_encoding(Encoding::DeltaBinaryPacked),
            Repetition::Required,
        )
        .unwrap();
    let records: Vec<Record> = [100i64, 103, 107, 150]
        .into_iter()
        .map(|n| Record::new().with("n", n))
        .collect();
    let bytes = write_file(
        schema,
        WriterOptions::default().with_codec(Codec::Uncompressed),
        &records,
    );

    let (out, meta) = read_back(bytes.clone());
    assert_eq!(out, records);

    // stream header: block size 128, 4 miniblocks, 4 values, zigzag(100)
    let chunk = meta.row_groups[0].columns[0].meta_data.as_ref().unwrap();
    let (_, payload_at) = page_at(&bytes, chunk.data_page_offset as usize);
    assert_eq!(
        &bytes[payload_at..payload_at + 6],
        &[0x80, 0x01, 0x04, 0x04, 0xc8, 0x01]
    );
}

#[test]
fn test_s6_nested_shredding() {
    let mut schema = Schema::new();
    schema.add_group("user", Repetition::Required).unwrap();
    schema
        .add_column(
            "user.name",
            ColumnDescriptor::new(PhysicalType::ByteArray).with_logical(LogicalType::String),
            Repetition::Required,
        )
        .unwrap();
    schema
        .add_column(
            "user.aliases",
            ColumnDescriptor::new(PhysicalType::ByteArray).with_logical(LogicalType::String),
            Repetition::Repeated,
        )
        .unwrap();
    let records = vec![Record::new().with(
        "user",
        Record::new()
            .with("name", "A")
            .with("aliases", Datum::list_of(["a1", "a2"])),
    )];
    let bytes = write_file(schema, WriterOptions::default_for_test(), &records);
    let (out, meta) = read_back(bytes);
    assert_eq!(out, records);
    let aliases = meta.row_groups[0].columns[1].meta_data.as_ref().unwrap();
    assert_eq!(aliases.path_in_schema, vec!["user", "aliases"]);
    assert_eq!(aliases.num_values, 2);
}

#[test]
fn test_file_sealing_layout() {
    let mut schema = Schema::new();
    schema
        .add_column(
            "v",
            ColumnDescriptor::new(PhysicalType::Int32),
            Repetition::Required,
        )
        .unwrap();
    let bytes = write_file(
        schema,
        WriterOptions::default_for_test(),
        &[Record::new().with("v", 7)],
    );

    assert_eq!(&bytes[..4], MAGIC);
    assert_eq!(&bytes[bytes.len() - 4..], MAGIC);
    let footer_len =
        u32::from_le_bytes(bytes[bytes.len() - 8..bytes.len() - 4].try_into().unwrap()) as usize;
    assert!(footer_len > 0 && footer_len + 12 < bytes.len());
    let reader = FileReader::new(Cursor::new(bytes)).unwrap();
    assert_eq!(reader.num_rows(), 1);
    assert!(reader
        .metadata()
        .created_by
        .as_deref()
        .unwrap()
        .starts_with("parquet-light"));
}

#[test]
fn test_multiple_row_groups() {
    let mut schema = Schema::new();
    schema
        .add_column(
            "v",
            ColumnDescriptor::new(PhysicalType::Int64).with_encoding(Encoding::Plain),
            Repetition::Required,
        )
        .unwrap();
    let records: Vec<Record> = (0..5000i64).map(|i| Record::new().with("v", i)).collect();
    let options = WriterOptions::default_for_test().with_row_group_target_bytes(1024);
    let bytes = write_file(schema, options, &records);
    let (out, meta) = read_back(bytes);

    assert!(meta.row_groups.len() > 1, "expected several row groups");
    assert_eq!(meta.num_rows, 5000);
    assert_eq!(
        meta.row_groups.iter().map(|rg| rg.num_rows).sum::<i64>(),
        5000
    );
    assert_eq!(out, records);
}

#[test]
fn test_dictionary_fallback_chunk_has_no_dictionary_page() {
    let mut schema = Schema::new();
    schema
        .add_column(
            "s",
            ColumnDescriptor::new(PhysicalType::ByteArray),
            Repetition::Required,
        )
        .unwrap();
    // every value distinct, 20 bytes each: the 64-byte limit trips early
    let records: Vec<Record> = (0..100)
        .map(|i| Record::new().with("s", format!("{i:020}").as_str()))
        .collect();
    let options = WriterOptions::default_for_test().with_dictionary_page_limit_bytes(64);
    let bytes = write_file(schema, options, &records);
    let (out, meta) = read_back(bytes);

    assert_eq!(out, records);
    let chunk = meta.row_groups[0].columns[0].meta_data.as_ref().unwrap();
    assert_eq!(chunk.dictionary_page_offset, None);
    assert!(!chunk.encodings.contains(&Encoding::RleDictionary));
    assert_eq!(chunk.encodings, vec![Encoding::Rle, Encoding::Plain]);
}

#[test]
fn test_all_codecs_roundtrip() {
    for codec in [
        Codec::Uncompressed,
        Codec::Snappy,
        Codec::Gzip,
        Codec::Zstd,
        Codec::Lz4,
    ] {
        let mut schema = Schema::new();
        schema
            .add_column(
                "text",
                ColumnDescriptor::new(PhysicalType::ByteArray).with_encoding(Encoding::Plain),
                Repetition::Optional,
            )
            .unwrap();
        schema
            .add_column(
                "num",
                ColumnDescriptor::new(PhysicalType::Double).with_encoding(Encoding::Plain),
                Repetition::Required,
            )
            .unwrap();
        let records: Vec<Record> = (0..200)
            .map(|i| {
                let mut r = Record::new().with("num", i as f64 * 0.5);
                if i % 3 != 0 {
                    r.insert("text", format!("row {i}").as_str());
                }
                r
            })
            .collect();
        let bytes = write_file(schema, WriterOptions::default().with_codec(codec), &records);
        let (out, meta) = read_back(bytes);
        assert_eq!(out, records, "codec {codec:?}");
        let chunk = meta.row_groups[0].columns[0].meta_data.as_ref().unwrap();
        assert_eq!(chunk.codec, codec);
    }
}

#[test]
fn test_every_physical_type_roundtrips() {
    let mut schema = Schema::new();
    schema
        .add_column(
            "flag",
            ColumnDescriptor::new(PhysicalType::Boolean),
            Repetition::Required,
        )
        .unwrap();
    schema
        .add_column(
            "i32",
            ColumnDescriptor::new(PhysicalType::Int32),
            Repetition::Required,
        )
        .unwrap();
    schema
        .add_column(
            "i64",
            ColumnDescriptor::new(PhysicalType::Int64),
            Repetition::Required,
        )
        .unwrap();
    schema
        .add_column(
            "ts",
            ColumnDescriptor::new(PhysicalType::Int96).with_encoding(Encoding::Plain),
            Repetition::Required,
        )
        .unwrap();
    schema
        .add_column(
            "f",
            ColumnDescriptor::new(PhysicalType::Float),
            Repetition::Required,
        )
        .unwrap();
    schema
        .add_column(
            "d",
            ColumnDescriptor::new(PhysicalType::Double),
            Repetition::Required,
        )
        .unwrap();
    schema
        .add_column(
            "blob",
            ColumnDescriptor::new(PhysicalType::ByteArray),
            Repetition::Required,
        )
        .unwrap();
    schema
        .add_column(
            "fixed",
            ColumnDescriptor::new(PhysicalType::FixedLenByteArray).with_type_length(4),
            Repetition::Required,
        )
        .unwrap();

    let records: Vec<Record> = (0..50i32)
        .map(|i| {
            let mut rec = Record::new();
            rec.insert("flag", i % 2 == 0);
            rec.insert("i32", i);
            rec.insert("i64", i as i64 * 1_000_000_007);
            rec.insert("ts", Value::Int96([i as u8; 12]));
            rec.insert("f", i as f32 / 3.0);
            rec.insert("d", i as f64 / 7.0);
            rec.insert("blob", format!("blob-{i}").into_bytes());
            rec.insert("fixed", i.to_le_bytes().to_vec());
            rec
        })
        .collect();
    let bytes = write_file(schema, WriterOptions::default_for_test(), &records);
    let (out, _) = read_back(bytes);
    assert_eq!(out, records);
}

#[test]
fn test_delta_byte_array_encodings_roundtrip() {
    let mut schema = Schema::new();
    schema
        .add_column(
            "dl",
            ColumnDescriptor::new(PhysicalType::ByteArray)
                .with_encoding(Encoding::DeltaLengthByteArray),
            Repetition::Required,
        )
        .unwrap();
    schema
        .add_column(
            "dba",
            ColumnDescriptor::new(PhysicalType::ByteArray).with_encoding(Encoding::DeltaByteArray),
            Repetition::Required,
        )
        .unwrap();
    let records: Vec<Record> = (0..300)
        .map(|i| {
            Record::new()
                .with("dl", format!("value number {i}").as_str())
                .with("dba", format!("prefix/shared/{i:06}").as_str())
        })
        .collect();
    let bytes = write_file(schema, WriterOptions::default_for_test(), &records);
    let (out, meta) = read_back(bytes);
    assert_eq!(out, records);
    let dba = meta.row_groups[0].columns[1].meta_data.as_ref().unwrap();
    assert!(dba.encodings.contains(&Encoding::DeltaByteArray));
}

#[test]
fn test_statistics_min_max() {
    let mut schema = Schema::new();
    schema
        .add_column(
            "v",
            ColumnDescriptor::new(PhysicalType::Int64),
            Repetition::Optional,
        )
        .unwrap();
    let mut records: Vec<Record> = [30i64, -5, 12].iter().map(|&v| Record::new().with("v", v)).collect();
    records.push(Record::new());
    let bytes = write_file(schema, WriterOptions::default_for_test(), &records);
    let (_, meta) = read_back(bytes);
    let stats = meta.row_groups[0].columns[0]
        .meta_data
        .as_ref()
        .unwrap()
        .statistics
        .clone()
        .unwrap();
    assert_eq!(stats.min_value, Some((-5i64).to_le_bytes().to_vec()));
    assert_eq!(stats.max_value, Some(30i64.to_le_bytes().to_vec()));
    assert_eq!(stats.null_count, Some(1));
}

#[test]
fn test_corrupt_files_are_rejected() {
    let mut schema = Schema::new();
    schema
        .add_column(
            "v",
            ColumnDescriptor::new(PhysicalType::Int32),
            Repetition::Required,
        )
        .unwrap();
    let bytes = write_file(
        schema,
        WriterOptions::default_for_test(),
        &[Record::new().with("v", 1)],
    );

    // bad trailing magic
    let mut broken = bytes.clone();
    let n = broken.len();
    broken[n - 1] = b'X';
    assert!(FileReader::new(Cursor::new(broken)).is_err());

    // bad leading magic
    let mut broken = bytes.clone();
    broken[0] = b'X';
    assert!(FileReader::new(Cursor::new(broken)).is_err());

    // truncation drops the footer
    assert!(FileReader::new(Cursor::new(bytes[..bytes.len() - 6].to_vec())).is_err());

    // a partial write without a footer is not a valid file
    assert!(FileReader::new(Cursor::new(b"PAR1\x01\x02\x03".to_vec())).is_err());
}

#[test]
fn test_write_to_disk() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("sample.parquet");

    let mut schema = Schema::new();
    schema
        .add_column(
            "v",
            ColumnDescriptor::new(PhysicalType::Int64),
            Repetition::Required,
        )
        .unwrap();
    let file = std::fs::File::create(&path).unwrap();
    let mut writer = FileWriter::new(file, schema, WriterOptions::default()).unwrap();
    for i in 0..10i64 {
        writer.write_record(&Record::new().with("v", i)).unwrap();
    }
    writer.close().unwrap();

    let mut reader = FileReader::new(std::fs::File::open(&path).unwrap()).unwrap();
    let records = reader.read_all().unwrap();
    assert_eq!(records.len(), 10);
    assert_eq!(records[3], Record::new().with("v", 3i64));
}
