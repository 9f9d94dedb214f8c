// Copyright 2022 RisingLight Project Authors. Licensed under Apache-2.0.

//! A light-weight implementation of the Parquet columnar file format.
//!
//! Records are decomposed by column, each column encoded and compressed
//! independently into pages, pages grouped into row groups, and the file
//! sealed by a compact-thrift footer describing the schema and physical
//! layout.
//!
//! The write path:
//!
//! ```no_run
//! use parquet_light::column::ColumnDescriptor;
//! use parquet_light::file::FileWriter;
//! use parquet_light::record::Record;
//! use parquet_light::schema::Schema;
//! use parquet_light::types::{PhysicalType, Repetition};
//! use parquet_light::WriterOptions;
//!
//! # fn main() -> parquet_light::ParquetResult<()> {
//! let mut schema = Schema::new();
//! schema.add_column("id", ColumnDescriptor::new(PhysicalType::Int64), Repetition::Required)?;
//! let sink = std::fs::File::create("out.parquet")?;
//! let mut writer = FileWriter::new(sink, schema, WriterOptions::default())?;
//! writer.write_record(&Record::new().with("id", 1i64))?;
//! writer.close()?;
//! # Ok(())
//! # }
//! ```
//!
//! and the read path mirrors it through [`file::FileReader`], yielding
//! the same record trees the writer accepted.

pub mod column;
pub mod compress;
pub mod encoding;
pub mod errors;
pub mod file;
pub mod meta;
pub mod options;
pub mod record;
pub mod schema;
pub mod types;

pub use errors::{ParquetError, ParquetResult, TracedParquetError};
pub use file::{FileReader, FileWriter};
pub use options::WriterOptions;
pub use record::shred::UnknownFieldPolicy;
pub use record::{Datum, Record};
pub use schema::Schema;
pub use types::{Codec, Encoding, PhysicalType, Repetition, Value};
