// Copyright 2022 RisingLight Project Authors. Licensed under Apache-2.0.

//! The assembly engine: reconstruct nested records from per-leaf
//! (value, definition level, repetition level) triples.
//!
//! Each leaf keeps a cursor over its triples. A repetition level of zero
//! marks the start of a new top-level record; within a record the schema
//! is walked recursively, deciding presence from the peeked definition
//! level and continuing repeated elements while the next repetition level
//! equals the node's own maximum. Leaves under an absent branch consume
//! exactly one null triple each, mirroring what the shredding engine
//! wrote.

use crate::column::ColumnStore;
use crate::errors::{ParquetResult, TracedParquetError};
use crate::record::{Datum, Record};
use crate::schema::Schema;
use crate::types::{Repetition, Value};

/// Decoded triple streams of one leaf column.
#[derive(Debug, Clone, Default)]
pub struct ColumnData {
    pub values: Vec<Value>,
    pub def_levels: Vec<u16>,
    pub rep_levels: Vec<u16>,
}

impl ColumnData {
    pub fn from_store(store: &ColumnStore) -> Self {
        Self {
            values: store.values().to_vec(),
            def_levels: store.def_levels().to_vec(),
            rep_levels: store.rep_levels().to_vec(),
        }
    }

    pub fn append(&mut self, mut other: ColumnData) {
        self.values.append(&mut other.values);
        self.def_levels.append(&mut other.def_levels);
        self.rep_levels.append(&mut other.rep_levels);
    }
}

#[derive(Debug, Clone, Copy, Default)]
struct LeafCursor {
    entry: usize,
    value: usize,
}

pub struct Assembler {
    columns: Vec<ColumnData>,
    cursors: Vec<LeafCursor>,
    /// Leaf index of the leftmost leaf under each schema node.
    first_leaf: Vec<usize>,
    /// Leaf indices under each schema node, pre-order.
    descendant_leaves: Vec<Vec<usize>>,
}

impl Assembler {
    /// `columns` holds one entry per leaf, in leaf-index order.
    pub fn new(schema: &Schema, columns: Vec<ColumnData>) -> ParquetResult<Self> {
        if columns.len() != schema.num_columns() {
            return Err(TracedParquetError::corrupt(format!(
                "{} columns supplied for {} leaves",
                columns.len(),
                schema.num_columns()
            )));
        }
        for (leaf, data) in schema.columns().zip(&columns) {
            if data.def_levels.len() != data.rep_levels.len() {
                return Err(TracedParquetError::corrupt(format!(
                    "column {:?} has {} definition but {} repetition levels",
                    leaf.path(),
                    data.def_levels.len(),
                    data.rep_levels.len()
                )));
            }
            let max_def = leaf.max_def();
            let present = data.def_levels.iter().filter(|&&d| d == max_def).count();
            if present != data.values.len() {
                return Err(TracedParquetError::corrupt(format!(
                    "column {:?} has {} values but {} defined entries",
                    leaf.path(),
                    data.values.len(),
                    present
                )));
            }
            if data.def_levels.iter().any(|&d| d > max_def)
                || data.rep_levels.iter().any(|&r| r > leaf.max_rep())
            {
                return Err(TracedParquetError::corrupt(format!(
                    "column {:?} carries levels above its maxima",
                    leaf.path()
                )));
            }
        }

        let mut descendant_leaves = vec![Vec::new(); schema.nodes.len()];
        for idx in (0..schema.nodes.len()).rev() {
            let node = &schema.nodes[idx];
            if node.is_leaf() {
                descendant_leaves[idx] = vec![node.leaf_index];
            } else {
                let mut all = Vec::new();
                for &child in &node.children {
                    all.extend(descendant_leaves[child].iter().copied());
                }
                descendant_leaves[idx] = all;
            }
        }
        let first_leaf = descendant_leaves
            .iter()
            .map(|leaves| leaves.first().copied().unwrap_or(usize::MAX))
            .collect();

        Ok(Self {
            cursors: vec![LeafCursor::default(); columns.len()],
            columns,
            first_leaf,
            descendant_leaves,
        })
    }

    /// Assemble the next record, or `None` once every leaf is exhausted.
    pub fn next_record(&mut self, schema: &Schema) -> ParquetResult<Option<Record>> {
        let exhausted = self
            .cursors
            .iter()
            .zip(&self.columns)
            .all(|(c, data)| c.entry >= data.def_levels.len());
        if exhausted {
            return Ok(None);
        }
        let record = self.read_group(schema, 0, 0)?;
        // the next unconsumed triple of every live leaf must start a record
        for (cursor, data) in self.cursors.iter().zip(&self.columns) {
            if let Some(&rep) = data.rep_levels.get(cursor.entry) {
                if rep != 0 {
                    return Err(TracedParquetError::corrupt(
                        "column cursors disagree on the record boundary",
                    ));
                }
            }
        }
        Ok(Some(record))
    }

    fn read_group(
        &mut self,
        schema: &Schema,
        group_idx: usize,
        def: u16,
    ) -> ParquetResult<Record> {
        let mut record = Record::new();
        for &child in &schema.nodes[group_idx].children {
            let node = &schema.nodes[child];
            let name = node.name.clone();
            match node.repetition {
                Repetition::Required => {
                    if node.is_leaf() {
                        let (value, d, _) = self.pop(schema, child)?;
                        if d != node.max_def {
                            return Err(TracedParquetError::corrupt(format!(
                                "required column {:?} has an undefined entry",
                                node.path
                            )));
                        }
                        record.insert(name, value.unwrap());
                    } else {
                        let nested = self.read_group(schema, child, def)?;
                        record.insert(name, nested);
                    }
                }
                Repetition::Optional => {
                    if node.is_leaf() {
                        let (value, d, _) = self.pop(schema, child)?;
                        if d == node.max_def {
                            record.insert(name, value.unwrap());
                        } else if d != def {
                            return Err(TracedParquetError::corrupt(format!(
                                "column {:?} has definition level {} under level {}",
                                node.path, d, def
                            )));
                        }
                    } else if self.peek_def(schema, child)? > def {
                        let nested = self.read_group(schema, child, def + 1)?;
                        record.insert(name, nested);
                    } else {
                        self.consume_nulls(schema, child, def)?;
                    }
                }
                Repetition::Repeated => {
                    if self.peek_def(schema, child)? <= def {
                        self.consume_nulls(schema, child, def)?;
                        record.insert(name, Datum::List(vec![]));
                        continue;
                    }
                    let mut items = Vec::new();
                    loop {
                        if node.is_leaf() {
                            let (value, d, _) = self.pop(schema, child)?;
                            if d != node.max_def {
                                return Err(TracedParquetError::corrupt(format!(
                                    "repeated column {:?} has an undefined element",
                                    node.path
                                )));
                            }
                            items.push(Datum::Value(value.unwrap()));
                        } else {
                            items.push(Datum::Record(self.read_group(schema, child, def + 1)?));
                        }
                        match self.peek_rep(schema, child) {
                            Some(rep) if rep == node.max_rep => continue,
                            _ => break,
                        }
                    }
                    record.insert(name, Datum::List(items));
                }
            }
        }
        Ok(record)
    }

    /// Consume the single null triple of every leaf under an absent or
    /// empty branch.
    fn consume_nulls(&mut self, schema: &Schema, idx: usize, def: u16) -> ParquetResult<()> {
        for leaf in self.descendant_leaves[idx].clone() {
            let node_idx = schema.leaf_nodes[leaf];
            let (value, d, _) = self.pop(schema, node_idx)?;
            if value.is_some() || d != def {
                return Err(TracedParquetError::corrupt(format!(
                    "column {:?} is defined under an absent branch",
                    schema.nodes[node_idx].path
                )));
            }
        }
        Ok(())
    }

    fn pop(
        &mut self,
        schema: &Schema,
        node_idx: usize,
    ) -> ParquetResult<(Option<Value>, u16, u16)> {
        let node = &schema.nodes[node_idx];
        let leaf = node.leaf_index;
        let cursor = &mut self.cursors[leaf];
        let data = &self.columns[leaf];
        if cursor.entry >= data.def_levels.len() {
            return Err(TracedParquetError::corrupt(format!(
                "column {:?} is exhausted mid-record",
                node.path
            )));
        }
        let def = data.def_levels[cursor.entry];
        let rep = data.rep_levels[cursor.entry];
        cursor.entry += 1;
        let value = if def == node.max_def {
            let v = data.values[cursor.value].clone();
            cursor.value += 1;
            Some(v)
        } else {
            None
        };
        Ok((value, def, rep))
    }

    fn peek_def(&self, schema: &Schema, idx: usize) -> ParquetResult<u16> {
        let leaf = self.first_leaf[idx];
        let cursor = &self.cursors[leaf];
        self.columns[leaf]
            .def_levels
            .get(cursor.entry)
            .copied()
            .ok_or_else(|| {
                TracedParquetError::corrupt(format!(
                    "column {:?} is exhausted mid-record",
                    schema.nodes[idx].path
                ))
            })
    }

    fn peek_rep(&self, _schema: &Schema, idx: usize) -> Option<u16> {
        let leaf = self.first_leaf[idx];
        let cursor = &self.cursors[leaf];
        self.columns[leaf].rep_levels.get(cursor.entry).copied()
    }
}
