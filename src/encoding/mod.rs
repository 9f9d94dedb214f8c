// Copyright 2022 RisingLight Project Authors. Licensed under Apache-2.0.

//! The per-column encode/decode pipeline.
//!
//! [`bitpack`] and [`rle`] are the level and index primitives; [`plain`],
//! [`delta`] and [`dictionary`] carry the value streams.

pub mod bitpack;
pub mod delta;
pub mod dictionary;
pub mod plain;
pub mod rle;

pub use dictionary::DictStore;
pub use plain::{PlainDecoder, PlainEncoder};
pub use rle::{RleDecoder, RleEncoder};
