// Copyright 2022 RisingLight Project Authors. Licensed under Apache-2.0.

//! The schema model: a rooted tree of groups and primitive leaves.
//!
//! Every node carries a repetition kind; each leaf owns the column store
//! that accumulates its shredded values. Definition and repetition level
//! maxima are recomputed from the path to the root whenever the tree
//! changes: `max_def` increments at each non-required edge, `max_rep` at
//! each repeated edge. Leaves are indexed by pre-order traversal, which is
//! also the column order of every row group.

pub mod descriptor;

use itertools::Itertools;

use crate::column::{ColumnDescriptor, ColumnStore};
use crate::errors::{ParquetResult, TracedParquetError};
use crate::meta::SchemaElement;
use crate::types::{ConvertedType, LogicalType, PhysicalType, Repetition, TimeUnit};

/// Name given to the root element of the footer schema list.
const ROOT_NAME: &str = "schema";

pub struct SchemaNode {
    pub(crate) name: String,
    /// Dot-separated path from the root, empty for the root itself.
    pub(crate) path: String,
    pub(crate) repetition: Repetition,
    pub(crate) parent: Option<usize>,
    pub(crate) children: Vec<usize>,
    pub(crate) logical: Option<LogicalType>,
    pub(crate) converted: Option<ConvertedType>,
    pub(crate) max_def: u16,
    pub(crate) max_rep: u16,
    /// Present iff this node is a leaf.
    pub(crate) store: Option<ColumnStore>,
    pub(crate) leaf_index: usize,
}

impl SchemaNode {
    pub fn is_leaf(&self) -> bool {
        self.store.is_some()
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn path(&self) -> &str {
        &self.path
    }

    pub fn repetition(&self) -> Repetition {
        self.repetition
    }

    pub fn max_def(&self) -> u16 {
        self.max_def
    }

    pub fn max_rep(&self) -> u16 {
        self.max_rep
    }

    pub fn leaf_index(&self) -> usize {
        self.leaf_index
    }

    pub fn store(&self) -> Option<&ColumnStore> {
        self.store.as_ref()
    }
}

pub struct Schema {
    pub(crate) nodes: Vec<SchemaNode>,
    /// Node index of each leaf, in pre-order.
    pub(crate) leaf_nodes: Vec<usize>,
}

impl Default for Schema {
    fn default() -> Self {
        Self::new()
    }
}

impl Schema {
    pub fn new() -> Self {
        Self {
            nodes: vec![SchemaNode {
                name: ROOT_NAME.into(),
                path: String::new(),
                repetition: Repetition::Required,
                parent: None,
                children: vec![],
                logical: None,
                converted: None,
                max_def: 0,
                max_rep: 0,
                store: None,
                leaf_index: 0,
            }],
            leaf_nodes: vec![],
        }
    }

    /// Add a group at the dot-separated `path`; all parents must exist.
    pub fn add_group(&mut self, path: &str, repetition: Repetition) -> ParquetResult<()> {
        self.add_node(path, repetition, None, None, None)
    }

    /// `add_group` carrying a LIST/MAP annotation.
    pub fn add_annotated_group(
        &mut self,
        path: &str,
        repetition: Repetition,
        logical: Option<LogicalType>,
        converted: Option<ConvertedType>,
    ) -> ParquetResult<()> {
        self.add_node(path, repetition, None, logical, converted)
    }

    /// Add a leaf column at `path`, initializing its column store.
    pub fn add_column(
        &mut self,
        path: &str,
        desc: ColumnDescriptor,
        repetition: Repetition,
    ) -> ParquetResult<()> {
        if let Some(logical) = &desc.logical {
            validate_logical(logical, desc.physical, desc.type_length)?;
        }
        let store = ColumnStore::new(&desc)?;
        self.add_node(path, repetition, Some(store), desc.logical, desc.converted)
    }

    fn add_node(
        &mut self,
        path: &str,
        repetition: Repetition,
        store: Option<ColumnStore>,
        logical: Option<LogicalType>,
        converted: Option<ConvertedType>,
    ) -> ParquetResult<()> {
        let parts = path.split('.').collect_vec();
        let name = parts.last().unwrap().trim();
        if name.is_empty() {
            return Err(TracedParquetError::schema("the name of the node is empty"));
        }
        let mut parent = 0usize;
        for part in &parts[..parts.len() - 1] {
            let child = self.nodes[parent]
                .children
                .iter()
                .copied()
                .find(|&c| self.nodes[c].name == *part)
                .ok_or_else(|| {
                    TracedParquetError::schema(format!("path {path} failed on {part:?}"))
                })?;
            if self.nodes[child].is_leaf() {
                return Err(TracedParquetError::schema(format!(
                    "path {path} is not a parent at {part:?}"
                )));
            }
            parent = child;
        }
        if self.nodes[parent]
            .children
            .iter()
            .any(|&c| self.nodes[c].name == name)
        {
            return Err(TracedParquetError::schema(format!(
                "duplicated node on path {path}"
            )));
        }
        let idx = self.nodes.len();
        self.nodes.push(SchemaNode {
            name: name.into(),
            path: String::new(),
            repetition,
            parent: Some(parent),
            children: vec![],
            logical,
            converted,
            max_def: 0,
            max_rep: 0,
            store,
            leaf_index: 0,
        });
        self.nodes[parent].children.push(idx);
        self.recompute();
        Ok(())
    }

    /// Recompute flat paths, level maxima and dense pre-order leaf
    /// indices. Cheap enough to run after every mutation.
    fn recompute(&mut self) {
        self.leaf_nodes.clear();
        let mut stack = vec![(0usize, 0u16, 0u16, String::new())];
        while let Some((idx, def, rep, prefix)) = stack.pop() {
            let (def, rep, path) = if idx == 0 {
                (0, 0, String::new())
            } else {
                let node = &self.nodes[idx];
                let def = def + (node.repetition != Repetition::Required) as u16;
                let rep = rep + (node.repetition == Repetition::Repeated) as u16;
                let path = if prefix.is_empty() {
                    node.name.clone()
                } else {
                    format!("{}.{}", prefix, node.name)
                };
                (def, rep, path)
            };
            let node = &mut self.nodes[idx];
            node.max_def = def;
            node.max_rep = rep;
            node.path = path.clone();
            if node.is_leaf() {
                node.leaf_index = self.leaf_nodes.len();
                node.store
                    .as_mut()
                    .unwrap()
                    .attach(path.clone(), def, rep);
                self.leaf_nodes.push(idx);
            } else {
                // children pushed in reverse so the stack pops in order
                for &child in self.nodes[idx].children.clone().iter().rev() {
                    stack.push((child, def, rep, path.clone()));
                }
            }
        }
    }

    /// Leaves in pre-order, the column order of every chunk.
    pub fn columns(&self) -> impl Iterator<Item = &SchemaNode> {
        self.leaf_nodes.iter().map(|&i| &self.nodes[i])
    }

    pub fn num_columns(&self) -> usize {
        self.leaf_nodes.len()
    }

    pub fn column_by_path(&self, path: &str) -> Option<&SchemaNode> {
        self.leaf_nodes
            .iter()
            .map(|&i| &self.nodes[i])
            .find(|n| n.path == path)
    }

    pub(crate) fn leaf_store(&self, leaf_index: usize) -> &ColumnStore {
        self.nodes[self.leaf_nodes[leaf_index]].store.as_ref().unwrap()
    }

    pub(crate) fn leaf_store_mut(&mut self, leaf_index: usize) -> &mut ColumnStore {
        self.nodes[self.leaf_nodes[leaf_index]].store.as_mut().unwrap()
    }

    pub(crate) fn set_dictionary_limit(&mut self, bytes: usize) {
        for &idx in &self.leaf_nodes {
            self.nodes[idx]
                .store
                .as_mut()
                .unwrap()
                .set_dictionary_limit(bytes);
        }
    }

    /// Clear all column stores, keeping the tree and level maxima.
    /// Called after each row-group flush.
    pub fn reset_data(&mut self) {
        for &idx in &self.leaf_nodes {
            self.nodes[idx].store.as_mut().unwrap().reset();
        }
    }

    /// Estimated in-memory size of buffered data across all stores.
    pub fn buffered_size(&self) -> usize {
        self.leaf_nodes
            .iter()
            .map(|&i| self.nodes[i].store.as_ref().unwrap().estimated_size())
            .sum()
    }

    /// Flatten the tree into the footer schema list by pre-order walk.
    pub fn to_elements(&self) -> Vec<SchemaElement> {
        let mut out = Vec::with_capacity(self.nodes.len());
        self.element_of(0, &mut out);
        out
    }

    fn element_of(&self, idx: usize, out: &mut Vec<SchemaElement>) {
        let node = &self.nodes[idx];
        let mut elem = SchemaElement {
            name: node.name.clone(),
            converted_type: node.converted,
            logical_type: node.logical,
            ..Default::default()
        };
        if idx != 0 {
            elem.repetition = Some(node.repetition);
        }
        match &node.store {
            Some(store) => {
                elem.physical = Some(store.physical());
                elem.type_length = store.type_length().map(|l| l as i32);
                if let Some(LogicalType::Decimal { scale, precision }) = node.logical {
                    elem.scale = Some(scale);
                    elem.precision = Some(precision);
                }
                out.push(elem);
            }
            None => {
                elem.num_children = Some(node.children.len() as i32);
                out.push(elem);
                for &child in &node.children {
                    self.element_of(child, out);
                }
            }
        }
    }

    /// Rebuild a schema from a parsed footer schema list.
    pub fn from_elements(elements: &[SchemaElement]) -> ParquetResult<Self> {
        let root = elements
            .first()
            .ok_or_else(|| TracedParquetError::schema("empty schema list"))?;
        if root.physical.is_some() {
            return Err(TracedParquetError::schema(
                "the root schema element carries a physical type",
            ));
        }
        let num_children = root
            .num_children
            .ok_or_else(|| TracedParquetError::schema("the root element has no children count"))?;
        if num_children <= 0 {
            return Err(TracedParquetError::schema(format!(
                "invalid children count {num_children} in the root element"
            )));
        }
        let mut schema = Schema::new();
        schema.nodes[0].name = root.name.clone();
        let mut idx = 1;
        for _ in 0..num_children {
            idx = schema.parse_element(elements, idx, "")?;
        }
        if idx != elements.len() {
            return Err(TracedParquetError::schema(format!(
                "{} trailing schema elements",
                elements.len() - idx
            )));
        }
        Ok(schema)
    }

    fn parse_element(
        &mut self,
        elements: &[SchemaElement],
        idx: usize,
        prefix: &str,
    ) -> ParquetResult<usize> {
        let elem = elements
            .get(idx)
            .ok_or_else(|| TracedParquetError::schema("schema list index out of bounds"))?;
        let repetition = elem.repetition.ok_or_else(|| {
            TracedParquetError::schema(format!("element {idx} has no repetition type"))
        })?;
        let path = if prefix.is_empty() {
            elem.name.clone()
        } else {
            format!("{}.{}", prefix, elem.name)
        };
        match elem.physical {
            Some(physical) => {
                let mut desc = ColumnDescriptor::new(physical).with_encoding(
                    // the read path decodes whatever each page declares
                    crate::types::Encoding::Plain,
                );
                if let Some(len) = elem.type_length {
                    desc = desc.with_type_length(len as usize);
                }
                if let Some(logical) = elem.logical_type {
                    desc = desc.with_logical(logical);
                }
                if let Some(converted) = elem.converted_type {
                    desc = desc.with_converted(converted);
                }
                self.add_column(&path, desc, repetition)?;
                Ok(idx + 1)
            }
            None => {
                let num_children = elem.num_children.unwrap_or(0);
                if num_children <= 0 {
                    return Err(TracedParquetError::schema(format!(
                        "invalid children count {num_children} in element {idx}"
                    )));
                }
                self.add_annotated_group(&path, repetition, elem.logical_type, elem.converted_type)?;
                let mut next = idx + 1;
                for _ in 0..num_children {
                    next = self.parse_element(elements, next, &path)?;
                }
                Ok(next)
            }
        }
    }
}

/// Logical and physical types must pair up; the rules follow the format
/// annotation table.
pub(crate) fn validate_logical(
    logical: &LogicalType,
    physical: PhysicalType,
    type_length: Option<usize>,
) -> ParquetResult<()> {
    use PhysicalType::*;
    let ok = match logical {
        LogicalType::String | LogicalType::Enum | LogicalType::Json | LogicalType::Bson => {
            physical == ByteArray
        }
        LogicalType::Decimal { scale, precision } => {
            if *scale < 0 || *precision <= 0 || scale > precision {
                return Err(TracedParquetError::schema(format!(
                    "invalid decimal scale {scale} / precision {precision}"
                )));
            }
            matches!(physical, Int32 | Int64 | ByteArray | FixedLenByteArray)
        }
        LogicalType::Date => physical == Int32,
        LogicalType::Time { unit, .. } => match unit {
            TimeUnit::Millis => physical == Int32,
            TimeUnit::Micros | TimeUnit::Nanos => physical == Int64,
        },
        LogicalType::Timestamp { .. } => physical == Int64,
        LogicalType::Uuid => physical == FixedLenByteArray && type_length == Some(16),
        LogicalType::Integer { bit_width, .. } => match bit_width {
            8 | 16 | 32 => physical == Int32,
            64 => physical == Int64,
            other => {
                return Err(TracedParquetError::schema(format!(
                    "invalid integer bit width {other}"
                )))
            }
        },
        LogicalType::List | LogicalType::Map => {
            return Err(TracedParquetError::schema(format!(
                "{logical:?} annotates groups, not leaves"
            )))
        }
    };
    if !ok {
        return Err(TracedParquetError::schema(format!(
            "logical type {logical:?} is incompatible with physical type {physical:?}"
        )));
    }
    Ok(())
}
