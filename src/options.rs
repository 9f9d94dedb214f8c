// Copyright 2022 RisingLight Project Authors. Licensed under Apache-2.0.

use crate::record::shred::UnknownFieldPolicy;
use crate::types::Codec;

/// Options for [`FileWriter`](crate::file::FileWriter)s.
#[derive(Clone)]
pub struct WriterOptions {
    /// File-level compression codec; columns may override it in their
    /// descriptor.
    pub codec: Codec,
    /// Soft cap on the buffered uncompressed size of a row group; the
    /// writer flushes once a record pushes past it.
    pub row_group_target_bytes: u64,
    /// A chunk whose dictionary outgrows this many bytes downgrades to
    /// plain encoding for the rest of the chunk.
    pub dictionary_page_limit_bytes: u64,
    pub unknown_field_policy: UnknownFieldPolicy,
    pub created_by: Option<String>,
}

impl Default for WriterOptions {
    fn default() -> Self {
        Self {
            codec: Codec::Snappy,
            row_group_target_bytes: 128 * 1024 * 1024,
            dictionary_page_limit_bytes: 1024 * 1024,
            unknown_field_policy: UnknownFieldPolicy::Ignore,
            created_by: Some(concat!("parquet-light version ", env!("CARGO_PKG_VERSION")).into()),
        }
    }
}

impl WriterOptions {
    pub fn default_for_test() -> Self {
        Self {
            codec: Codec::Uncompressed,
            row_group_target_bytes: 4096,
            dictionary_page_limit_bytes: 1024,
            ..Default::default()
        }
    }

    pub fn with_codec(mut self, codec: Codec) -> Self {
        self.codec = codec;
        self
    }

    pub fn with_row_group_target_bytes(mut self, bytes: u64) -> Self {
        self.row_group_target_bytes = bytes;
        self
    }

    pub fn with_dictionary_page_limit_bytes(mut self, bytes: u64) -> Self {
        self.dictionary_page_limit_bytes = bytes;
        self
    }

    pub fn with_unknown_field_policy(mut self, policy: UnknownFieldPolicy) -> Self {
        self.unknown_field_policy = policy;
        self
    }
}
