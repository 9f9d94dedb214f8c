// Copyright 2022 RisingLight Project Authors. Licensed under Apache-2.0.

//! The nested record model exchanged with the binding layer.
//!
//! A [`Record`] maps field names to [`Datum`] trees: primitives, nested
//! records, or ordered lists for repeated fields. The writer shreds these
//! trees into per-leaf level streams; the reader assembles identical trees
//! back out of them.

pub mod assemble;
pub mod shred;

use std::collections::HashMap;

use crate::types::Value;

#[derive(Debug, Clone, PartialEq)]
pub enum Datum {
    Value(Value),
    Record(Record),
    List(Vec<Datum>),
}

#[derive(Debug, Clone, PartialEq, Default)]
pub struct Record {
    fields: HashMap<String, Datum>,
}

impl Record {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn insert(&mut self, name: impl Into<String>, datum: impl Into<Datum>) {
        self.fields.insert(name.into(), datum.into());
    }

    /// Builder-style `insert` for literal records.
    pub fn with(mut self, name: impl Into<String>, datum: impl Into<Datum>) -> Self {
        self.insert(name, datum);
        self
    }

    pub fn get(&self, name: &str) -> Option<&Datum> {
        self.fields.get(name)
    }

    pub fn len(&self) -> usize {
        self.fields.len()
    }

    pub fn is_empty(&self) -> bool {
        self.fields.is_empty()
    }

    pub fn field_names(&self) -> impl Iterator<Item = &str> {
        self.fields.keys().map(String::as_str)
    }
}

impl From<Value> for Datum {
    fn from(v: Value) -> Self {
        Datum::Value(v)
    }
}

impl From<Record> for Datum {
    fn from(v: Record) -> Self {
        Datum::Record(v)
    }
}

impl From<Vec<Datum>> for Datum {
    fn from(v: Vec<Datum>) -> Self {
        Datum::List(v)
    }
}

macro_rules! impl_datum_from_primitive {
    ($($ty:ty),*) => {
        $(
            impl From<$ty> for Datum {
                fn from(v: $ty) -> Self {
                    Datum::Value(v.into())
                }
            }
        )*
    };
}

impl_datum_from_primitive!(bool, i32, i64, f32, f64, &str, Vec<u8>);

impl Datum {
    /// A list of primitives, the common shape of repeated leaves.
    pub fn list_of<T: Into<Value>>(items: impl IntoIterator<Item = T>) -> Self {
        Datum::List(items.into_iter().map(|v| Datum::Value(v.into())).collect())
    }
}
