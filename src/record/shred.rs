// Copyright 2022 RisingLight Project Authors. Licensed under Apache-2.0.

//! The shredding engine: decompose a nested record into per-leaf
//! (value, definition level, repetition level) triples.
//!
//! The schema and the record are walked in lockstep. Optional absence
//! fans one null into every descendant leaf at the current levels; a
//! repeated field fans out its elements, the first inheriting the
//! incoming repetition level and the rest restarting at the field's own
//! maximum. An empty (or absent) repeated field writes the
//! present-but-empty null.

use crate::errors::{ParquetResult, TracedParquetError};
use crate::record::{Datum, Record};
use crate::schema::Schema;
use crate::types::Repetition;

/// What to do when a record carries a field the schema does not know.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum UnknownFieldPolicy {
    /// Skip unknown fields, the forward-compatible default.
    #[default]
    Ignore,
    /// Fail the write.
    Strict,
}

/// Shred one record into the schema's column stores.
pub fn shred_record(
    schema: &mut Schema,
    record: &Record,
    policy: UnknownFieldPolicy,
) -> ParquetResult<()> {
    shred_group(schema, 0, record, 0, 0, policy)
}

fn shred_group(
    schema: &mut Schema,
    group_idx: usize,
    record: &Record,
    def: u16,
    rep: u16,
    policy: UnknownFieldPolicy,
) -> ParquetResult<()> {
    if policy == UnknownFieldPolicy::Strict {
        for name in record.field_names() {
            if !schema.nodes[group_idx]
                .children
                .iter()
                .any(|&c| schema.nodes[c].name == name)
            {
                return Err(TracedParquetError::schema(format!(
                    "unknown field {name:?} in group {:?}",
                    schema.nodes[group_idx].path
                )));
            }
        }
    }
    for child_idx in schema.nodes[group_idx].children.clone() {
        let name = schema.nodes[child_idx].name.clone();
        shred_field(schema, child_idx, record.get(&name), def, rep, policy)?;
    }
    Ok(())
}

fn shred_field(
    schema: &mut Schema,
    idx: usize,
    datum: Option<&Datum>,
    def: u16,
    rep: u16,
    policy: UnknownFieldPolicy,
) -> ParquetResult<()> {
    match schema.nodes[idx].repetition {
        Repetition::Repeated => {
            static EMPTY: &[Datum] = &[];
            let elements = match datum {
                // an absent repeated field is the empty sequence
                None => EMPTY,
                Some(Datum::List(items)) => items.as_slice(),
                Some(_) => {
                    return Err(TracedParquetError::shape(format!(
                        "repeated field {:?} takes a list",
                        schema.nodes[idx].path
                    )))
                }
            };
            if elements.is_empty() {
                return shred_null(schema, idx, def, rep);
            }
            let max_rep = schema.nodes[idx].max_rep;
            for (i, element) in elements.iter().enumerate() {
                let element_rep = if i == 0 { rep } else { max_rep };
                shred_present(schema, idx, element, def + 1, element_rep, policy)?;
            }
            Ok(())
        }
        Repetition::Optional => match datum {
            None => shred_null(schema, idx, def, rep),
            Some(datum) => shred_present(schema, idx, datum, def + 1, rep, policy),
        },
        Repetition::Required => match datum {
            None => Err(TracedParquetError::shape(format!(
                "required field {:?} is missing",
                schema.nodes[idx].path
            ))),
            Some(datum) => shred_present(schema, idx, datum, def, rep, policy),
        },
    }
}

fn shred_present(
    schema: &mut Schema,
    idx: usize,
    datum: &Datum,
    def: u16,
    rep: u16,
    policy: UnknownFieldPolicy,
) -> ParquetResult<()> {
    if schema.nodes[idx].is_leaf() {
        match datum {
            Datum::Value(value) => {
                debug_assert_eq!(def, schema.nodes[idx].max_def);
                let value = value.clone();
                schema.nodes[idx]
                    .store
                    .as_mut()
                    .unwrap()
                    .push(Some(value), def, rep)
            }
            Datum::List(_) => Err(TracedParquetError::shape(format!(
                "field {:?} is not repeated but got a list",
                schema.nodes[idx].path
            ))),
            Datum::Record(_) => Err(TracedParquetError::shape(format!(
                "field {:?} is a column but got a record",
                schema.nodes[idx].path
            ))),
        }
    } else {
        match datum {
            Datum::Record(record) => shred_group(schema, idx, record, def, rep, policy),
            Datum::List(_) => Err(TracedParquetError::shape(format!(
                "field {:?} is not repeated but got a list",
                schema.nodes[idx].path
            ))),
            Datum::Value(_) => Err(TracedParquetError::shape(format!(
                "field {:?} is a group but got a primitive",
                schema.nodes[idx].path
            ))),
        }
    }
}

/// Fan one null into every leaf under `idx` at the given levels.
fn shred_null(schema: &mut Schema, idx: usize, def: u16, rep: u16) -> ParquetResult<()> {
    if schema.nodes[idx].is_leaf() {
        return schema.nodes[idx].store.as_mut().unwrap().push(None, def, rep);
    }
    for child in schema.nodes[idx].children.clone() {
        shred_null(schema, child, def, rep)?;
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::column::ColumnDescriptor;
    use crate::types::{LogicalType, PhysicalType, Value};

    fn leaf_trace(schema: &Schema, path: &str) -> (Vec<Value>, Vec<u16>, Vec<u16>) {
        let store = schema.column_by_path(path).unwrap().store().unwrap();
        (
            store.values().to_vec(),
            store.def_levels().to_vec(),
            store.rep_levels().to_vec(),
        )
    }

    #[test]
    fn test_shred_repeated_leaf() {
        let mut schema = Schema::new();
        schema
            .add_column(
                "xs",
                ColumnDescriptor::new(PhysicalType::Int64),
                Repetition::Repeated,
            )
            .unwrap();
        for record in [
            Record::new().with("xs", Datum::list_of([10i64, 20, 30])),
            Record::new().with("xs", Datum::List(vec![])),
            Record::new().with("xs", Datum::list_of([40i64])),
        ] {
            shred_record(&mut schema, &record, UnknownFieldPolicy::Ignore).unwrap();
        }
        let (values, defs, reps) = leaf_trace(&schema, "xs");
        assert_eq!(
            values,
            [10i64, 20, 30, 40].map(Value::Int64).to_vec()
        );
        assert_eq!(defs, vec![1, 1, 1, 0, 1]);
        assert_eq!(reps, vec![0, 1, 1, 0, 0]);
    }

    #[test]
    fn test_shred_nested_group() {
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
        let record = Record::new().with(
            "user",
            Record::new()
                .with("name", "A")
                .with("aliases", Datum::list_of(["a1", "a2"])),
        );
        shred_record(&mut schema, &record, UnknownFieldPolicy::Ignore).unwrap();

        let (values, defs, reps) = leaf_trace(&schema, "user.name");
        assert_eq!(values, vec![Value::from("A")]);
        assert_eq!((defs, reps), (vec![0], vec![0]));

        let (values, defs, reps) = leaf_trace(&schema, "user.aliases");
        assert_eq!(values, vec![Value::from("a1"), Value::from("a2")]);
        assert_eq!(defs, vec![1, 1]);
        assert_eq!(reps, vec![0, 1]);
    }

    #[test]
    fn test_shred_absent_optional_group_fans_nulls() {
        let mut schema = Schema::new();
        schema.add_group("info", Repetition::Optional).unwrap();
        schema
            .add_column(
                "info.a",
                ColumnDescriptor::new(PhysicalType::Int32),
                Repetition::Optional,
            )
            .unwrap();
        schema
            .add_column(
                "info.b",
                ColumnDescriptor::new(PhysicalType::Int32),
                Repetition::Optional,
            )
            .unwrap();
        shred_record(&mut schema, &Record::new(), UnknownFieldPolicy::Ignore).unwrap();
        for path in ["info.a", "info.b"] {
            let (values, defs, reps) = leaf_trace(&schema, path);
            assert!(values.is_empty());
            assert_eq!((defs, reps), (vec![0], vec![0]));
        }
    }

    #[test]
    fn test_shred_shape_errors() {
        let mut schema = Schema::new();
        schema
            .add_column(
                "v",
                ColumnDescriptor::new(PhysicalType::Int32),
                Repetition::Required,
            )
            .unwrap();
        // required field missing
        let err = shred_record(&mut schema, &Record::new(), UnknownFieldPolicy::Ignore);
        assert!(err.is_err());
        // list at a non-repeated field
        let record = Record::new().with("v", Datum::list_of([1i32]));
        assert!(shred_record(&mut schema, &record, UnknownFieldPolicy::Ignore).is_err());
    }

    #[test]
    fn test_unknown_field_policies() {
        let mut schema = Schema::new();
        schema
            .add_column(
                "v",
                ColumnDescriptor::new(PhysicalType::Int32),
                Repetition::Required,
            )
            .unwrap();
        let record = Record::new().with("v", 1i32).with("extra", 2i32);
        shred_record(&mut schema, &record, UnknownFieldPolicy::Ignore).unwrap();
        assert!(shred_record(&mut schema, &record, UnknownFieldPolicy::Strict).is_err());
    }
}
