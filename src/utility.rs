//! Graph Utilities / Projector.
//!
//! A graph utility is keyed by a *type signature* -- a canonical string
//! encoding of a fragment's OID/VID/VDATA/EDATA tuple.
//! Utilities are cached in an append-only, idempotent-registration registry:
//! each signature stands in for what would otherwise be a lazily loaded,
//! per-type code module; here it is just a trait object, since dynamically
//! loading a real shared library is out of scope.

use crate::archive::{self, ColumnData};
use crate::error::EngineError;
use crate::fragment::{Fragment, LabelMeta, PropertyTable};
use crate::graph_def::{GraphDef, GraphType, SchemaDef};
use crate::vertex_map::VertexMap;
use serde_json::Value as JsonValue;
use std::collections::{HashMap, HashSet};
use std::sync::{Arc, Mutex};

/// Canonical OID/VID/VDATA/EDATA encoding, e.g. `"string:uint64:double:double"`.
#[derive(Clone, Debug, PartialEq, Eq, Hash)]
pub struct TypeSignature(pub String);

impl TypeSignature {
    fn parts(&self) -> Vec<&str> {
        self.0.split(':').collect()
    }

    #[must_use]
    pub fn oid_type(&self) -> &str {
        self.parts().first().copied().unwrap_or("string")
    }

    #[must_use]
    pub fn vid_type(&self) -> &str {
        self.parts().get(1).copied().unwrap_or("uint64")
    }

    #[must_use]
    pub fn vdata_type(&self) -> &str {
        self.parts().get(2).copied().unwrap_or("()")
    }

    #[must_use]
    pub fn edata_type(&self) -> &str {
        self.parts().get(3).copied().unwrap_or("()")
    }
}

/// Per-type-signature singleton encapsulating the loader/converter/projector
/// entry points.
pub trait GraphUtility: Send + Sync {
    /// Build a fresh, empty fragment for this type signature, to be
    /// populated by subsequent `MODIFY_VERTICES`/`MODIFY_EDGES` commands.
    /// Real I/O loading is out of scope; all this contract owes is a
    /// handle a loader would otherwise hand back.
    fn load_graph(
        &self,
        fid: u32,
        fnum: u32,
        directed: bool,
        graph_name: &str,
        signature: &TypeSignature,
    ) -> Result<(GraphDef, Fragment), EngineError>;

    fn add_labels_to_graph(
        &self,
        fragment: &Fragment,
        label_names: &[String],
    ) -> Result<Fragment, EngineError>;

    fn to_dynamic_fragment(&self, src: &Fragment) -> Result<Fragment, EngineError>;

    fn to_arrow_fragment(&self, src: &Fragment) -> Result<Fragment, EngineError>;

    fn project(
        &self,
        src: &Fragment,
        vertex_props: &[(u32, Vec<String>)],
        edge_props: &[(u32, Vec<String>)],
    ) -> Result<Fragment, EngineError>;
}

fn scalar_to_json(col: &ColumnData, row: usize) -> JsonValue {
    match col {
        ColumnData::Int32(v) => JsonValue::from(v[row]),
        ColumnData::Int64(v) => JsonValue::from(v[row]),
        ColumnData::UInt32(v) => JsonValue::from(v[row]),
        ColumnData::UInt64(v) => JsonValue::from(v[row]),
        ColumnData::Float32(v) => JsonValue::from(f64::from(v[row])),
        ColumnData::Float64(v) => JsonValue::from(v[row]),
        ColumnData::Utf8(v) | ColumnData::LargeUtf8(v) => JsonValue::from(v[row].clone()),
    }
}

/// The stock utility implementation, sufficient for every type signature
/// this crate exercises (no real per-type code generation).
#[derive(Default)]
pub struct DefaultGraphUtility;

impl GraphUtility for DefaultGraphUtility {
    fn load_graph(
        &self,
        fid: u32,
        fnum: u32,
        directed: bool,
        graph_name: &str,
        signature: &TypeSignature,
    ) -> Result<(GraphDef, Fragment), EngineError> {
        let vertex_map = Arc::new(VertexMap::empty(fnum));
        let mut fragment = Fragment::new_empty(fid, fnum, directed, vertex_map);
        fragment.vertex_labels.push(LabelMeta {
            id: 0,
            name: "default".to_string(),
        });
        let def = GraphDef {
            key: graph_name.to_string(),
            graph_type: GraphType::ArrowProperty,
            directed,
            vineyard_id: -1,
            schema_def: SchemaDef::new(
                signature.oid_type(),
                signature.vid_type(),
                signature.vdata_type(),
                signature.edata_type(),
                "{}",
            ),
            schema_path: None,
            generate_eid: false,
        };
        Ok((def, fragment))
    }

    fn add_labels_to_graph(
        &self,
        fragment: &Fragment,
        label_names: &[String],
    ) -> Result<Fragment, EngineError> {
        let mut out = fragment.clone();
        let mut next_id = out.vertex_labels.iter().map(|l| l.id + 1).max().unwrap_or(0);
        for name in label_names {
            if out.vertex_labels.iter().any(|l| &l.name == name) {
                return Err(EngineError::DuplicateId(name.clone()));
            }
            out.vertex_labels.push(LabelMeta {
                id: next_id,
                name: name.clone(),
            });
            next_id += 1;
        }
        Ok(out)
    }

    fn to_dynamic_fragment(&self, src: &Fragment) -> Result<Fragment, EngineError> {
        let mut cross_label_edges: HashMap<(u64, u64), u32> = HashMap::new();
        for e in &src.edges {
            match cross_label_edges.get(&(e.src, e.dst)) {
                Some(&other) if other != e.label => {
                    return Err(EngineError::IllegalState(format!(
                        "parallel edge between {} and {} spans labels {other} and {}",
                        e.src, e.dst, e.label
                    )))
                }
                _ => {
                    cross_label_edges.insert((e.src, e.dst), e.label);
                }
            }
        }

        let mut vertex_attrs = HashMap::new();
        for (label_id, table) in &src.tables {
            let mut seen_keys = HashSet::new();
            for (name, _) in &table.columns {
                if !seen_keys.insert(name.clone()) {
                    return Err(EngineError::IllegalState(format!(
                        "duplicate property key '{name}'"
                    )));
                }
            }
            let resolved: Vec<(String, ColumnData)> = table
                .columns
                .iter()
                .map(|(name, arr)| Ok((name.clone(), archive::from_arrow_array(arr)?)))
                .collect::<Result<_, EngineError>>()?;
            for (row, gid) in src.inner_vertices_of(*label_id).iter().enumerate() {
                let mut obj = serde_json::Map::new();
                for (name, col) in &resolved {
                    obj.insert(name.clone(), scalar_to_json(col, row));
                }
                vertex_attrs.insert(*gid, JsonValue::Object(obj));
            }
        }

        let mut out = src.clone();
        out.tables.clear();
        out.dynamic = Some(crate::fragment::DynamicAttrs {
            vertex_attrs,
            edge_attrs: HashMap::new(),
        });
        Ok(out)
    }

    fn to_arrow_fragment(&self, src: &Fragment) -> Result<Fragment, EngineError> {
        let dynamic = src.dynamic.as_ref().ok_or_else(|| {
            EngineError::InvalidOperation(
                "ToArrowFragment requires a dynamic-property fragment".to_string(),
            )
        })?;

        let mut out = src.clone();
        out.dynamic = None;
        out.tables.clear();

        for label in src.vertex_labels.clone() {
            let gids = src.inner_vertices_of(label.id).to_vec();
            let mut keys: Vec<String> = Vec::new();
            for gid in &gids {
                if let Some(JsonValue::Object(map)) = dynamic.vertex_attrs.get(gid) {
                    for k in map.keys() {
                        if !keys.contains(k) {
                            keys.push(k.clone());
                        }
                    }
                }
            }

            let mut columns = Vec::new();
            for key in keys {
                let mut ints = Vec::new();
                let mut floats = Vec::new();
                let mut strs = Vec::new();
                let mut kind: Option<u8> = None;
                for gid in &gids {
                    let value = dynamic.vertex_attrs.get(gid).and_then(|v| v.get(&key));
                    match value {
                        Some(JsonValue::Number(n)) if n.is_i64() => {
                            kind.get_or_insert(0);
                            ints.push(n.as_i64().unwrap_or_default());
                        }
                        Some(JsonValue::Number(n)) => {
                            kind.get_or_insert(1);
                            floats.push(n.as_f64().unwrap_or_default());
                        }
                        Some(JsonValue::String(s)) => {
                            kind.get_or_insert(2);
                            strs.push(s.clone());
                        }
                        _ => {
                            return Err(EngineError::DataType(format!(
                                "property '{key}' is missing or has an unsupported type on vertex {gid}"
                            )))
                        }
                    }
                }
                let col = match kind {
                    Some(0) => ColumnData::Int64(ints),
                    Some(1) => ColumnData::Float64(floats),
                    Some(2) => ColumnData::Utf8(strs),
                    _ => continue,
                };
                columns.push((key, archive::to_arrow_array(&col)));
            }
            out.tables.insert(label.id, PropertyTable { columns });
        }
        Ok(out)
    }

    fn project(
        &self,
        src: &Fragment,
        vertex_props: &[(u32, Vec<String>)],
        edge_props: &[(u32, Vec<String>)],
    ) -> Result<Fragment, EngineError> {
        if vertex_props.is_empty() {
            return Err(EngineError::InvalidValue {
                key: "vertex_collections".to_string(),
                message: "Project requires at least one vertex label".to_string(),
            });
        }
        let mut out = src.clone();
        out.vertex_labels
            .retain(|l| vertex_props.iter().any(|(id, _)| *id == l.id));
        out.edge_labels
            .retain(|l| edge_props.iter().any(|(id, _)| *id == l.id));
        for (label_id, keep) in vertex_props {
            if let Some(table) = out.tables.get_mut(label_id) {
                table
                    .columns
                    .retain(|(name, _)| keep.is_empty() || keep.contains(name));
            }
        }
        let kept: HashSet<u32> = edge_props.iter().map(|(id, _)| *id).collect();
        out.edges.retain(|e| kept.contains(&e.label));
        Ok(out)
    }
}

/// Append-only cache of utilities, keyed by type signature.
#[derive(Default)]
pub struct UtilityRegistry {
    items: Mutex<HashMap<String, Arc<dyn GraphUtility>>>,
}

impl UtilityRegistry {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Register a utility for `signature`. A second registration of the
    /// same signature is a no-op (idempotent), not an error.
    pub fn register(&self, signature: impl Into<String>, utility: Arc<dyn GraphUtility>) {
        let mut items = self.items.lock().unwrap();
        items.entry(signature.into()).or_insert(utility);
    }

    #[must_use]
    pub fn get(&self, signature: &str) -> Option<Arc<dyn GraphUtility>> {
        self.items.lock().unwrap().get(signature).cloned()
    }

    /// Fetch the utility for `signature`, registering the stock
    /// implementation on first use.
    #[must_use]
    pub fn get_or_default(&self, signature: &str) -> Arc<dyn GraphUtility> {
        let mut items = self.items.lock().unwrap();
        Arc::clone(
            items
                .entry(signature.to_string())
                .or_insert_with(|| Arc::new(DefaultGraphUtility)),
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn labeled_fragment_with_property() -> Fragment {
        let vm = Arc::new(VertexMap::empty(1));
        let mut frag = Fragment::new_empty(0, 1, true, vm);
        frag.vertex_labels.push(LabelMeta {
            id: 0,
            name: "person".to_string(),
        });
        frag.register_inner_vertex(0, 0);
        frag.register_inner_vertex(0, 1);
        let col: arrow::array::ArrayRef =
            Arc::new(arrow::array::Int64Array::from(vec![10, 20]));
        frag.add_vertex_columns(0, vec![("age".to_string(), col)])
            .unwrap();
        frag
    }

    #[test]
    fn registry_registration_is_idempotent() {
        let registry = UtilityRegistry::new();
        registry.register("sig", Arc::new(DefaultGraphUtility));
        let first = registry.get("sig").unwrap();
        registry.register("sig", Arc::new(DefaultGraphUtility));
        let second = registry.get("sig").unwrap();
        assert!(Arc::ptr_eq(&first, &second));
    }

    #[test]
    fn type_signature_parses_four_parts() {
        let sig = TypeSignature("string:uint64:double:int32".to_string());
        assert_eq!(sig.oid_type(), "string");
        assert_eq!(sig.edata_type(), "int32");
    }

    #[test]
    fn columnar_to_dynamic_round_trip_preserves_property_value() {
        let utility = DefaultGraphUtility;
        let frag = labeled_fragment_with_property();
        let dynamic = utility.to_dynamic_fragment(&frag).unwrap();
        assert!(dynamic.tables.get(&0).map_or(true, PropertyTable::is_empty));
        let back = utility.to_arrow_fragment(&dynamic).unwrap();
        let col = back.tables.get(&0).unwrap().column("age").unwrap();
        let values = archive::from_arrow_array(col).unwrap();
        assert_eq!(values, ColumnData::Int64(vec![10, 20]));
    }

    #[test]
    fn parallel_cross_label_edge_is_illegal_state() {
        let utility = DefaultGraphUtility;
        let mut frag = labeled_fragment_with_property();
        frag.edges.push(crate::fragment::Edge {
            src: 0,
            dst: 1,
            label: 0,
            eid: Some(0),
        });
        frag.edges.push(crate::fragment::Edge {
            src: 0,
            dst: 1,
            label: 1,
            eid: Some(1),
        });
        let err = utility.to_dynamic_fragment(&frag).unwrap_err();
        assert_eq!(err.kind(), crate::error::ErrorKind::IllegalState);
    }

    #[test]
    fn add_labels_rejects_duplicate_name() {
        let utility = DefaultGraphUtility;
        let frag = labeled_fragment_with_property();
        let err = utility
            .add_labels_to_graph(&frag, &["person".to_string()])
            .unwrap_err();
        assert_eq!(err.kind(), crate::error::ErrorKind::DuplicateId);
    }
}
