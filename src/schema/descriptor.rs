// Copyright 2022 RisingLight Project Authors. Licensed under Apache-2.0.

//! Tag-driven schema construction from record descriptors.
//!
//! A [`RecordDescriptor`] is the language-neutral description a binding
//! layer extracts from an application record type: a name, a physical
//! primitive or a list/map shape, and a string tag map such as
//! `name=ts, logicaltype=TIMESTAMP, timeunit=MILLIS, isadjustedtoutc=true`.
//! Tags prefixed `key.`, `value.` and `element.` are routed to the map and
//! list children. Lists expand to the three-level `LIST` group shape and
//! maps to the `MAP` / `key_value` shape of the format.

use std::collections::HashMap;

use crate::column::ColumnDescriptor;
use crate::errors::{ParquetResult, TracedParquetError};
use crate::schema::{validate_logical, Schema};
use crate::types::{ConvertedType, LogicalType, PhysicalType, Repetition, TimeUnit};

#[derive(Debug, Clone)]
pub struct RecordDescriptor {
    pub name: String,
    pub kind: DescriptorKind,
    pub tags: HashMap<String, String>,
}

#[derive(Debug, Clone)]
pub enum DescriptorKind {
    Scalar {
        physical: PhysicalType,
        type_length: Option<usize>,
    },
    List {
        element: Box<RecordDescriptor>,
    },
    Map {
        key: Box<RecordDescriptor>,
        value: Box<RecordDescriptor>,
    },
}

impl RecordDescriptor {
    pub fn scalar(name: impl Into<String>, physical: PhysicalType) -> Self {
        Self {
            name: name.into(),
            kind: DescriptorKind::Scalar {
                physical,
                type_length: None,
            },
            tags: HashMap::new(),
        }
    }

    pub fn fixed(name: impl Into<String>, type_length: usize) -> Self {
        Self {
            name: name.into(),
            kind: DescriptorKind::Scalar {
                physical: PhysicalType::FixedLenByteArray,
                type_length: Some(type_length),
            },
            tags: HashMap::new(),
        }
    }

    pub fn list(name: impl Into<String>, element: RecordDescriptor) -> Self {
        Self {
            name: name.into(),
            kind: DescriptorKind::List {
                element: Box::new(element),
            },
            tags: HashMap::new(),
        }
    }

    pub fn map(name: impl Into<String>, key: RecordDescriptor, value: RecordDescriptor) -> Self {
        Self {
            name: name.into(),
            kind: DescriptorKind::Map {
                key: Box::new(key),
                value: Box::new(value),
            },
            tags: HashMap::new(),
        }
    }

    pub fn with_tag(mut self, key: impl Into<String>, value: impl Into<String>) -> Self {
        self.tags.insert(key.into(), value.into());
        self
    }
}

/// Add the node(s) described by `desc` under `parent` (empty for the
/// root). The tag map may override the name via `name=...`; children of
/// lists and maps read their own settings from `element.`/`key.`/`value.`
/// prefixed tags, including `repetition=required|optional|repeated`.
pub fn add_descriptor(
    schema: &mut Schema,
    parent: &str,
    desc: &RecordDescriptor,
    repetition: Repetition,
) -> ParquetResult<()> {
    let tags = own_tags(&desc.tags);
    add_with_tags(schema, parent, desc, repetition, &tags)
}

fn add_with_tags(
    schema: &mut Schema,
    parent: &str,
    desc: &RecordDescriptor,
    repetition: Repetition,
    tags: &HashMap<String, String>,
) -> ParquetResult<()> {
    let name = tags.get("name").cloned().unwrap_or_else(|| desc.name.clone());
    if name.trim().is_empty() {
        return Err(TracedParquetError::schema("descriptor without a name"));
    }
    let path = join(parent, &name);
    match &desc.kind {
        DescriptorKind::Scalar {
            physical,
            type_length,
        } => {
            let column = scalar_descriptor(*physical, *type_length, tags)?;
            schema.add_column(&path, column, repetition)
        }
        DescriptorKind::List { element } => {
            schema.add_annotated_group(
                &path,
                repetition,
                Some(LogicalType::List),
                Some(ConvertedType::List),
            )?;
            let inner = join(&path, "list");
            schema.add_group(&inner, Repetition::Repeated)?;
            let mut element_tags = own_tags(&element.tags);
            element_tags.extend(prefixed_tags(&desc.tags, "element."));
            element_tags
                .entry("name".into())
                .or_insert_with(|| "element".into());
            let element_rep = tag_repetition(&element_tags, Repetition::Required)?;
            add_with_tags(schema, &inner, element, element_rep, &element_tags)
        }
        DescriptorKind::Map { key, value } => {
            schema.add_annotated_group(
                &path,
                repetition,
                Some(LogicalType::Map),
                Some(ConvertedType::Map),
            )?;
            let inner = join(&path, "key_value");
            schema.add_annotated_group(
                &inner,
                Repetition::Repeated,
                None,
                Some(ConvertedType::MapKeyValue),
            )?;
            let mut key_tags = own_tags(&key.tags);
            key_tags.extend(prefixed_tags(&desc.tags, "key."));
            key_tags.entry("name".into()).or_insert_with(|| "key".into());
            // map keys are always present
            add_with_tags(schema, &inner, key, Repetition::Required, &key_tags)?;
            let mut value_tags = own_tags(&value.tags);
            value_tags.extend(prefixed_tags(&desc.tags, "value."));
            value_tags
                .entry("name".into())
                .or_insert_with(|| "value".into());
            let value_rep = tag_repetition(&value_tags, Repetition::Optional)?;
            add_with_tags(schema, &inner, value, value_rep, &value_tags)
        }
    }
}

fn scalar_descriptor(
    physical: PhysicalType,
    type_length: Option<usize>,
    tags: &HashMap<String, String>,
) -> ParquetResult<ColumnDescriptor> {
    let mut desc = ColumnDescriptor::new(physical);
    if let Some(len) = type_length {
        desc = desc.with_type_length(len);
    }

    let mut logical = match tags.get("logicaltype").map(String::as_str) {
        None => None,
        Some("STRING") => Some((LogicalType::String, Some(ConvertedType::Utf8))),
        Some("ENUM") => Some((LogicalType::Enum, Some(ConvertedType::Enum))),
        Some("DECIMAL") => Some((
            LogicalType::Decimal {
                scale: 0,
                precision: 0,
            },
            Some(ConvertedType::Decimal),
        )),
        Some("DATE") => Some((LogicalType::Date, Some(ConvertedType::Date))),
        Some("TIME") => Some((
            LogicalType::Time {
                unit: TimeUnit::Nanos,
                adjusted_to_utc: false,
            },
            None,
        )),
        Some("TIMESTAMP") => Some((
            LogicalType::Timestamp {
                unit: TimeUnit::Nanos,
                adjusted_to_utc: false,
            },
            None,
        )),
        Some("JSON") => Some((LogicalType::Json, Some(ConvertedType::Json))),
        Some("BSON") => Some((LogicalType::Bson, Some(ConvertedType::Bson))),
        Some("UUID") => Some((LogicalType::Uuid, None)),
        Some("INT") => {
            let bit_width: i8 = tags
                .get("bitwidth")
                .ok_or_else(|| TracedParquetError::schema("INT requires a bitwidth tag"))?
                .parse()
                .map_err(|_| TracedParquetError::schema("invalid bitwidth tag"))?;
            let signed = match tags.get("signed").map(String::as_str) {
                None | Some("true") => true,
                Some("false") => false,
                Some(other) => {
                    return Err(TracedParquetError::schema(format!(
                        "invalid signed tag {other:?}"
                    )))
                }
            };
            Some((LogicalType::Integer { bit_width, signed }, None))
        }
        Some(other) => {
            return Err(TracedParquetError::schema(format!(
                "unsupported logical type {other:?}"
            )))
        }
    };

    if let Some(unit_tag) = tags.get("timeunit") {
        let unit = match unit_tag.as_str() {
            "MILLIS" => TimeUnit::Millis,
            "MICROS" => TimeUnit::Micros,
            "NANOS" | "" => TimeUnit::Nanos,
            other => {
                return Err(TracedParquetError::schema(format!(
                    "unsupported time unit {other:?}"
                )))
            }
        };
        match &mut logical {
            Some((LogicalType::Time { unit: u, .. }, converted)) => {
                *u = unit;
                *converted = match unit {
                    TimeUnit::Millis => Some(ConvertedType::TimeMillis),
                    TimeUnit::Micros => Some(ConvertedType::TimeMicros),
                    TimeUnit::Nanos => None,
                };
            }
            Some((LogicalType::Timestamp { unit: u, .. }, converted)) => {
                *u = unit;
                *converted = match unit {
                    TimeUnit::Millis => Some(ConvertedType::TimestampMillis),
                    TimeUnit::Micros => Some(ConvertedType::TimestampMicros),
                    TimeUnit::Nanos => None,
                };
            }
            _ => {
                return Err(TracedParquetError::schema(
                    "a time unit requires a TIME or TIMESTAMP logical type",
                ))
            }
        }
    }

    if let Some(flag) = tags.get("isadjustedtoutc") {
        let adjusted = match flag.to_lowercase().as_str() {
            "true" => true,
            "false" => false,
            other => {
                return Err(TracedParquetError::schema(format!(
                    "invalid isadjustedtoutc value {other:?}"
                )))
            }
        };
        match &mut logical {
            Some((LogicalType::Time {
                adjusted_to_utc, ..
            }, _))
            | Some((LogicalType::Timestamp {
                adjusted_to_utc, ..
            }, _)) => *adjusted_to_utc = adjusted,
            _ => {
                return Err(TracedParquetError::schema(
                    "isadjustedtoutc requires a TIME or TIMESTAMP logical type",
                ))
            }
        }
    }

    for (tag, target) in [("scale", 0usize), ("precision", 1)] {
        if let Some(raw) = tags.get(tag) {
            let parsed: i32 = raw
                .parse()
                .map_err(|_| TracedParquetError::schema(format!("invalid {tag} tag {raw:?}")))?;
            match &mut logical {
                Some((LogicalType::Decimal { scale, precision }, _)) => {
                    if target == 0 {
                        *scale = parsed;
                    } else {
                        *precision = parsed;
                    }
                }
                _ => {
                    return Err(TracedParquetError::schema(format!(
                        "{tag} requires a DECIMAL logical type"
                    )))
                }
            }
        }
    }

    if let Some((logical, converted)) = logical {
        validate_logical(&logical, physical, type_length)?;
        desc = desc.with_logical(logical);
        if let Some(converted) = converted {
            desc = desc.with_converted(converted);
        }
    }
    Ok(desc)
}

fn tag_repetition(
    tags: &HashMap<String, String>,
    default: Repetition,
) -> ParquetResult<Repetition> {
    match tags.get("repetition").map(String::as_str) {
        None => Ok(default),
        Some("required") => Ok(Repetition::Required),
        Some("optional") => Ok(Repetition::Optional),
        Some("repeated") => Ok(Repetition::Repeated),
        Some(other) => Err(TracedParquetError::schema(format!(
            "invalid repetition tag {other:?}"
        ))),
    }
}

/// Tags of the node itself: entries without a routing prefix.
fn own_tags(tags: &HashMap<String, String>) -> HashMap<String, String> {
    tags.iter()
        .filter(|(k, _)| !k.contains('.'))
        .map(|(k, v)| (k.clone(), v.clone()))
        .collect()
}

/// Entries routed to a child, with the prefix stripped.
fn prefixed_tags(tags: &HashMap<String, String>, prefix: &str) -> HashMap<String, String> {
    tags.iter()
        .filter_map(|(k, v)| {
            k.strip_prefix(prefix)
                .map(|stripped| (stripped.to_string(), v.clone()))
        })
        .collect()
}

fn join(parent: &str, name: &str) -> String {
    if parent.is_empty() {
        name.to_string()
    } else {
        format!("{parent}.{name}")
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_scalar_with_logical_tags() {
        let mut schema = Schema::new();
        let desc = RecordDescriptor::scalar("Amount", PhysicalType::Int64)
            .with_tag("name", "amount")
            .with_tag("logicaltype", "DECIMAL")
            .with_tag("scale", "5")
            .with_tag("precision", "15");
        add_descriptor(&mut schema, "", &desc, Repetition::Optional).unwrap();
        let column = schema.column_by_path("amount").unwrap();
        assert_eq!(
            column.store().unwrap().physical(),
            PhysicalType::Int64
        );
        let elements = schema.to_elements();
        assert_eq!(elements[1].scale, Some(5));
        assert_eq!(elements[1].precision, Some(15));
        assert_eq!(elements[1].converted_type, Some(ConvertedType::Decimal));
    }

    #[test]
    fn test_timestamp_tags() {
        let mut schema = Schema::new();
        let desc = RecordDescriptor::scalar("ts", PhysicalType::Int64)
            .with_tag("logicaltype", "TIMESTAMP")
            .with_tag("timeunit", "MILLIS")
            .with_tag("isadjustedtoutc", "true");
        add_descriptor(&mut schema, "", &desc, Repetition::Required).unwrap();
        let elements = schema.to_elements();
        assert_eq!(
            elements[1].logical_type,
            Some(LogicalType::Timestamp {
                unit: TimeUnit::Millis,
                adjusted_to_utc: true
            })
        );
        assert_eq!(
            elements[1].converted_type,
            Some(ConvertedType::TimestampMillis)
        );
    }

    #[test]
    fn test_tag_rule_violations() {
        let mut schema = Schema::new();
        // timeunit without TIME/TIMESTAMP
        let desc = RecordDescriptor::scalar("v", PhysicalType::Int64).with_tag("timeunit", "MILLIS");
        assert!(add_descriptor(&mut schema, "", &desc, Repetition::Required).is_err());
        // scale without DECIMAL
        let desc = RecordDescriptor::scalar("w", PhysicalType::Int32).with_tag("scale", "3");
        assert!(add_descriptor(&mut schema, "", &desc, Repetition::Required).is_err());
        // TIME(MILLIS) must be int32
        let desc = RecordDescriptor::scalar("t", PhysicalType::Int64)
            .with_tag("logicaltype", "TIME")
            .with_tag("timeunit", "MILLIS");
        assert!(add_descriptor(&mut schema, "", &desc, Repetition::Required).is_err());
        // UUID must be a 16-byte fixed array
        let desc = RecordDescriptor::fixed("id", 8).with_tag("logicaltype", "UUID");
        assert!(add_descriptor(&mut schema, "", &desc, Repetition::Required).is_err());
    }

    #[test]
    fn test_int_width_mapping() {
        let mut schema = Schema::new();
        let desc = RecordDescriptor::scalar("small", PhysicalType::Int32)
            .with_tag("logicaltype", "INT")
            .with_tag("bitwidth", "16")
            .with_tag("signed", "false");
        add_descriptor(&mut schema, "", &desc, Repetition::Required).unwrap();
        let elements = schema.to_elements();
        assert_eq!(
            elements[1].logical_type,
            Some(LogicalType::Integer {
                bit_width: 16,
                signed: false
            })
        );
    }

    #[test]
    fn test_list_shape() {
        let mut schema = Schema::new();
        let desc = RecordDescriptor::list(
            "tags",
            RecordDescriptor::scalar("ignored", PhysicalType::ByteArray),
        )
        .with_tag("element.logicaltype", "STRING");
        add_descriptor(&mut schema, "", &desc, Repetition::Optional).unwrap();

        let elements = schema.to_elements();
        assert_eq!(elements[1].name, "tags");
        assert_eq!(elements[1].converted_type, Some(ConvertedType::List));
        assert_eq!(elements[2].name, "list");
        assert_eq!(elements[2].repetition, Some(Repetition::Repeated));
        assert_eq!(elements[3].name, "element");
        assert_eq!(elements[3].converted_type, Some(ConvertedType::Utf8));
        let leaf = schema.column_by_path("tags.list.element").unwrap();
        // optional outer group + repeated list group
        assert_eq!((leaf.max_def(), leaf.max_rep()), (2, 1));
    }

    #[test]
    fn test_map_shape() {
        let mut schema = Schema::new();
        let desc = RecordDescriptor::map(
            "attrs",
            RecordDescriptor::scalar("k", PhysicalType::ByteArray),
            RecordDescriptor::scalar("v", PhysicalType::Int64),
        )
        .with_tag("key.logicaltype", "STRING")
        .with_tag("value.repetition", "required");
        add_descriptor(&mut schema, "", &desc, Repetition::Optional).unwrap();

        assert!(schema.column_by_path("attrs.key_value.key").is_some());
        let value = schema.column_by_path("attrs.key_value.value").unwrap();
        assert_eq!(value.repetition(), Repetition::Required);
        let elements = schema.to_elements();
        assert_eq!(elements[1].converted_type, Some(ConvertedType::Map));
        assert_eq!(elements[2].name, "key_value");
        assert_eq!(elements[2].converted_type, Some(ConvertedType::MapKeyValue));
    }
}
