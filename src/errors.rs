// Copyright 2022 RisingLight Project Authors. Licensed under Apache-2.0.

//! Error types of the crate.
//!
//! The taxonomy distinguishes recoverable caller mistakes (schema, shape,
//! type errors) from corrupt input streams. Every error is surfaced
//! synchronously at the operation that first detects it; nothing is
//! swallowed or retried.

use std::backtrace::Backtrace;

use thiserror::Error;

#[derive(Error, Debug)]
pub enum ParquetError {
    #[error("schema error: {0}")]
    Schema(String),
    #[error("unsupported encoding {encoding:?} for type {physical:?}")]
    Encoding {
        encoding: crate::types::Encoding,
        physical: crate::types::PhysicalType,
    },
    #[error("type mismatch on column {column}: expected {expected:?}, got {got}")]
    TypeMismatch {
        column: String,
        expected: crate::types::PhysicalType,
        got: String,
    },
    #[error("shape error: {0}")]
    Shape(String),
    #[error("corrupt stream: {0}")]
    CorruptStream(String),
    #[error("IO error: {0}")]
    Io(#[from] Box<std::io::Error>),
    #[error("codec error: {0}")]
    Codec(String),
}

impl From<std::io::Error> for TracedParquetError {
    #[inline]
    fn from(e: std::io::Error) -> TracedParquetError {
        ParquetError::Io(e.into()).into()
    }
}

/// [`ParquetError`] with backtrace.
pub struct TracedParquetError {
    source: ParquetError,
    backtrace: Backtrace,
}

impl From<ParquetError> for TracedParquetError {
    #[inline]
    fn from(source: ParquetError) -> TracedParquetError {
        TracedParquetError {
            source,
            backtrace: Backtrace::capture(),
        }
    }
}

impl std::fmt::Display for TracedParquetError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{:?}\n{}", self.source, self.backtrace)
    }
}

impl std::error::Error for TracedParquetError {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        Some(&self.source)
    }
}

impl std::fmt::Debug for TracedParquetError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self)
    }
}

impl TracedParquetError {
    pub fn schema(message: impl ToString) -> Self {
        ParquetError::Schema(message.to_string()).into()
    }

    pub fn shape(message: impl ToString) -> Self {
        ParquetError::Shape(message.to_string()).into()
    }

    pub fn corrupt(message: impl ToString) -> Self {
        ParquetError::CorruptStream(message.to_string()).into()
    }

    pub fn codec(message: impl ToString) -> Self {
        ParquetError::Codec(message.to_string()).into()
    }

    pub fn kind(&self) -> &ParquetError {
        &self.source
    }
}

pub type ParquetResult<T> = std::result::Result<T, TracedParquetError>;
