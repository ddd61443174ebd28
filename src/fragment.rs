//! `Fragment`: the per-worker shard of a partitioned graph.
//!
//! Property storage for columnar (`ArrowProperty`/`ArrowProjected`)
//! fragments uses `arrow_array::ArrayRef` columns. Dynamic fragments
//! instead store one `serde_json::Value` per vertex/edge, since their
//! attributes are mutable and heterogeneous across vertices.

use crate::error::EngineError;
use crate::vertex_map::VertexMap;
use arrow::array::{Array, ArrayRef};
use serde_json::Value as JsonValue;
use std::collections::{HashMap, HashSet};
use std::sync::Arc;

/// A vertex or edge label: a stable numeric id plus a display name.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct LabelMeta {
    pub id: u32,
    pub name: String,
}

/// Columnar property storage for one label. Row `i` corresponds to the `i`-th inner vertex of this
/// label in GID order.
#[derive(Clone, Default, Debug)]
pub struct PropertyTable {
    pub columns: Vec<(String, ArrayRef)>,
}

impl PropertyTable {
    #[must_use]
    pub fn len(&self) -> usize {
        self.columns.first().map_or(0, |(_, a)| a.len())
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    #[must_use]
    pub fn column(&self, name: &str) -> Option<&ArrayRef> {
        self.columns.iter().find(|(n, _)| n == name).map(|(_, a)| a)
    }

    /// Append new columns, failing with `IllegalState` if a name collides
    /// or the row count disagrees.
    pub fn add_columns(&mut self, new_cols: Vec<(String, ArrayRef)>) -> Result<(), EngineError> {
        let expected_len = self.len();
        for (name, arr) in &new_cols {
            if self.columns.iter().any(|(n, _)| n == name) {
                return Err(EngineError::IllegalState(format!(
                    "duplicate property key '{name}'"
                )));
            }
            if expected_len != 0 && arr.len() != expected_len {
                return Err(EngineError::IllegalState(format!(
                    "column '{name}' has {} rows, expected {expected_len}",
                    arr.len()
                )));
            }
        }
        self.columns.extend(new_cols);
        Ok(())
    }
}

/// A directed edge: global source/destination vertex ids, owning label,
/// and an optional explicit edge id.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct Edge {
    pub src: u64,
    pub dst: u64,
    pub label: u32,
    pub eid: Option<u64>,
}

/// Heterogeneous per-vertex/per-edge attribute storage for dynamic
/// fragments.
#[derive(Clone, Debug, Default)]
pub struct DynamicAttrs {
    pub vertex_attrs: HashMap<u64, JsonValue>,
    pub edge_attrs: HashMap<(u64, u64), JsonValue>,
}

/// The per-worker shard of a partitioned graph.
#[derive(Clone, Debug)]
pub struct Fragment {
    pub fid: u32,
    pub fnum: u32,
    pub directed: bool,
    pub vertex_labels: Vec<LabelMeta>,
    pub edge_labels: Vec<LabelMeta>,
    /// Inner vertices owned by this fragment, per vertex label id, in
    /// ascending GID order).
    pub inner_vertices: HashMap<u32, Vec<u64>>,
    pub mirror_vertices: HashSet<u64>,
    pub tables: HashMap<u32, PropertyTable>,
    pub edges: Vec<Edge>,
    pub vertex_map: Arc<VertexMap>,
    pub dynamic: Option<DynamicAttrs>,
}

impl Fragment {
    #[must_use]
    pub fn new_empty(fid: u32, fnum: u32, directed: bool, vertex_map: Arc<VertexMap>) -> Self {
        Self {
            fid,
            fnum,
            directed,
            vertex_labels: Vec::new(),
            edge_labels: Vec::new(),
            inner_vertices: HashMap::new(),
            mirror_vertices: HashSet::new(),
            tables: HashMap::new(),
            edges: Vec::new(),
            vertex_map,
            dynamic: None,
        }
    }

    /// Inner vertices of `label_id`, in the ascending-GID order the
    /// selector-to-archive path relies on.
    #[must_use]
    pub fn inner_vertices_of(&self, label_id: u32) -> &[u64] {
        self.inner_vertices
            .get(&label_id)
            .map_or(&[][..], Vec::as_slice)
    }

    #[must_use]
    pub fn inner_vertex_count(&self, label_id: u32) -> usize {
        self.inner_vertices_of(label_id).len()
    }

    #[must_use]
    pub fn total_inner_vertex_count(&self) -> usize {
        self.inner_vertices.values().map(Vec::len).sum()
    }

    #[must_use]
    pub fn label_id_of(&self, name: &str) -> Option<u32> {
        self.vertex_labels
            .iter()
            .find(|l| l.name == name)
            .map(|l| l.id)
    }

    #[must_use]
    pub fn edge_label_id_of(&self, name: &str) -> Option<u32> {
        self.edge_labels
            .iter()
            .find(|l| l.name == name)
            .map(|l| l.id)
    }

    /// Register a vertex as an inner vertex of this fragment under
    /// `label_id`. Caller (`GraphUtility::load_graph` / `MODIFY_VERTICES`)
    /// must have already resolved `gid` through the shared vertex map.
    pub fn register_inner_vertex(&mut self, label_id: u32, gid: u64) {
        self.inner_vertices.entry(label_id).or_default().push(gid);
    }

    /// Append one or more context-derived columns as new vertex properties.
    pub fn add_vertex_columns(
        &mut self,
        label_id: u32,
        columns: Vec<(String, ArrayRef)>,
    ) -> Result<(), EngineError> {
        self.tables.entry(label_id).or_default().add_columns(columns)
    }

    /// Symmetrize the edge set: every edge gains a mirrored back-edge and
    /// the fragment is marked undirected. Only meaningful for dynamic
    /// fragments.
    #[must_use]
    pub fn to_undirected_from(&self, vertex_map: Arc<VertexMap>) -> Self {
        let mut out = self.clone();
        out.vertex_map = vertex_map;
        out.directed = false;
        let mut mirrored = Vec::with_capacity(out.edges.len() * 2);
        for e in &out.edges {
            mirrored.push(e.clone());
            if e.src != e.dst {
                mirrored.push(Edge {
                    src: e.dst,
                    dst: e.src,
                    label: e.label,
                    eid: e.eid,
                });
            }
        }
        mirrored.sort_by_key(|e| (e.src, e.dst, e.label));
        mirrored.dedup_by_key(|e| (e.src, e.dst, e.label));
        out.edges = mirrored;
        out
    }

    /// `ToDirected`: drop the implicit back-edges an undirected graph
    /// carries, keeping one edge per unordered pair.
    #[must_use]
    pub fn to_directed_from(&self, vertex_map: Arc<VertexMap>) -> Self {
        let mut out = self.clone();
        out.vertex_map = vertex_map;
        out.directed = true;
        let mut seen = HashSet::new();
        let mut kept = Vec::new();
        for e in &out.edges {
            let key = if e.src <= e.dst {
                (e.src, e.dst, e.label)
            } else {
                (e.dst, e.src, e.label)
            };
            if seen.insert(key) {
                kept.push(e.clone());
            }
        }
        out.edges = kept;
        out
    }

    /// `VIEW_GRAPH(view_type="reversed")`: swap every edge's endpoints,
    /// keeping directedness and the vertex set unchanged.
    #[must_use]
    pub fn reversed_from(&self, vertex_map: Arc<VertexMap>) -> Self {
        let mut out = self.clone();
        out.vertex_map = vertex_map;
        out.edges = out
            .edges
            .iter()
            .map(|e| Edge {
                src: e.dst,
                dst: e.src,
                label: e.label,
                eid: e.eid,
            })
            .collect();
        out
    }

    /// `CopyType::Reset`: same structure (vertices, labels, edges) but all
    /// property values and dynamic attributes cleared.
    #[must_use]
    pub fn reset_copy(&self) -> Self {
        let mut out = self.clone();
        for table in out.tables.values_mut() {
            *table = PropertyTable::default();
        }
        if let Some(dyn_attrs) = out.dynamic.as_mut() {
            dyn_attrs.vertex_attrs.clear();
            dyn_attrs.edge_attrs.clear();
        }
        out
    }
}

/// Dispatch a columnar copy by Arrow primitive type, over the fixed set of
/// element types this crate supports.
pub fn copy_array(arr: &ArrayRef) -> Result<ArrayRef, EngineError> {
    use arrow::array::{
        Float32Array, Float64Array, Int32Array, Int64Array, LargeStringArray, StringArray,
        UInt32Array, UInt64Array,
    };
    use arrow::datatypes::DataType;

    let out: ArrayRef = match arr.data_type() {
        DataType::Int32 => {
            Arc::new(arr.as_any().downcast_ref::<Int32Array>().unwrap().clone())
        }
        DataType::Int64 => {
            Arc::new(arr.as_any().downcast_ref::<Int64Array>().unwrap().clone())
        }
        DataType::UInt32 => {
            Arc::new(arr.as_any().downcast_ref::<UInt32Array>().unwrap().clone())
        }
        DataType::UInt64 => {
            Arc::new(arr.as_any().downcast_ref::<UInt64Array>().unwrap().clone())
        }
        DataType::Float32 => Arc::new(
            arr.as_any()
                .downcast_ref::<Float32Array>()
                .unwrap()
                .clone(),
        ),
        DataType::Float64 => Arc::new(
            arr.as_any()
                .downcast_ref::<Float64Array>()
                .unwrap()
                .clone(),
        ),
        DataType::Utf8 => {
            Arc::new(arr.as_any().downcast_ref::<StringArray>().unwrap().clone())
        }
        DataType::LargeUtf8 => Arc::new(
            arr.as_any()
                .downcast_ref::<LargeStringArray>()
                .unwrap()
                .clone(),
        ),
        other => {
            return Err(EngineError::DataType(format!(
                "unsupported column type: {other:?}"
            )))
        }
    };
    Ok(out)
}
