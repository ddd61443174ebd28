//! Fragment Wrapper Hierarchy: the polymorphic handle pairing a `GraphDef`
//! with a concrete fragment.
//!
//! Four concrete structs implement one object-safe trait rather than a
//! closed enum: the type-signature registry implies new wrapper kinds can
//! in principle be added by a plugin, unlike the closed
//! `ContextKind`/`GraphType` enums elsewhere in this crate. Operations
//! invalid for a given variant return `InvalidOperation` from a default
//! trait-method body rather than panicking.

use crate::comm::Communicator;
use crate::context::Context;
use crate::error::EngineError;
use crate::fragment::Fragment;
use crate::graph_def::{GraphDef, GraphType};
use crate::selector::{Selector, SelectorKind};
use crate::store::ObjectStore;

fn not_supported(op: &str, variant: &str) -> EngineError {
    EngineError::InvalidOperation(format!("{op} is not supported on a {variant} fragment"))
}

/// `CopyGraph`'s `copy_type` parameter.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum CopyType {
    Identical,
    Reset,
}

fn resolve_fragment_selector(frag: &Fragment, selector: &Selector) -> Result<crate::archive::ColumnData, EngineError> {
    use crate::archive::{self, ColumnData};

    let label_id = match selector.label_id {
        Some(l) => l,
        None if frag.vertex_labels.len() == 1 => frag.vertex_labels[0].id,
        None => {
            return Err(EngineError::InvalidValue {
                key: "selector".to_string(),
                message: "a '#<label_id>:' prefix is required on a multi-label fragment"
                    .to_string(),
            })
        }
    };
    let gids = frag.inner_vertices_of(label_id);

    match &selector.kind {
        SelectorKind::VertexId => Ok(ColumnData::UInt64(gids.to_vec())),
        SelectorKind::VertexLabelId => Ok(ColumnData::UInt32(vec![label_id; gids.len()])),
        SelectorKind::VertexData => {
            let dyn_attrs = frag.dynamic.as_ref().ok_or_else(|| {
                EngineError::UnsupportedOperation(
                    "v.data requires a dynamic fragment".to_string(),
                )
            })?;
            let values = gids
                .iter()
                .map(|gid| {
                    dyn_attrs
                        .vertex_attrs
                        .get(gid)
                        .map(ToString::to_string)
                        .unwrap_or_default()
                })
                .collect();
            Ok(ColumnData::Utf8(values))
        }
        SelectorKind::VertexProperty(name) => {
            let table = frag
                .tables
                .get(&label_id)
                .ok_or_else(|| EngineError::NotFound(format!("label {label_id}")))?;
            let arr = table
                .column(name)
                .ok_or_else(|| EngineError::NotFound(format!("property '{name}'")))?;
            archive::from_arrow_array(arr)
        }
        SelectorKind::Result | SelectorKind::ResultField(_) => Err(
            EngineError::UnsupportedOperation(
                "'r' / 'r.<field>' selectors require a context, not a fragment".to_string(),
            ),
        ),
    }
}

fn gather_ndarray(
    comm: &dyn Communicator,
    frag: &Fragment,
    selector_raw: &str,
) -> Result<Option<Vec<u8>>, EngineError> {
    use crate::archive;

    let selector = Selector::parse(selector_raw)?;
    let local_col = resolve_fragment_selector(frag, &selector)?;
    let local_shard = archive::write_ndarray(&[local_col])?;
    match comm.gather(local_shard) {
        Some(shards) => Ok(Some(archive::concat_ndarray_shards(&shards)?)),
        None => Ok(None),
    }
}

fn gather_dataframe(
    comm: &dyn Communicator,
    frag: &Fragment,
    selectors_raw: &str,
) -> Result<Option<Vec<u8>>, EngineError> {
    use crate::archive;
    use crate::selector::parse_selector_list;

    let list = parse_selector_list(selectors_raw)?;
    let columns = list
        .into_iter()
        .map(|named| resolve_fragment_selector(frag, &named.selector).map(|c| (named.name, c)))
        .collect::<Result<Vec<_>, _>>()?;
    let local_shard = archive::write_dataframe(&columns)?;
    match comm.gather(local_shard) {
        Some(shards) => Ok(Some(archive::concat_dataframe_shards(&shards)?)),
        None => Ok(None),
    }
}

/// Uniform contract across all four wrapper variants.
/// Unsupported operations keep their default body rather than requiring
/// every struct to repeat an `InvalidOperation`/`UnsupportedOperation`
/// boilerplate implementation.
pub trait FragmentWrapper: Send + Sync {
    fn fragment(&self) -> &Fragment;
    fn graph_def(&self) -> &GraphDef;

    fn copy_graph(
        &self,
        _store: &dyn ObjectStore,
        _dst_key: &str,
        _copy_type: CopyType,
        _group_id: Option<i64>,
    ) -> Result<(GraphDef, Fragment), EngineError> {
        Err(not_supported("CopyGraph", self.variant_name()))
    }

    fn project(
        &self,
        _store: &dyn ObjectStore,
        _dst_key: &str,
        _vertex_props: &[(u32, Vec<String>)],
        _edge_props: &[(u32, Vec<String>)],
        _group_id: Option<i64>,
    ) -> Result<(GraphDef, Fragment), EngineError> {
        Err(not_supported("Project", self.variant_name()))
    }

    fn add_column(
        &self,
        _store: &dyn ObjectStore,
        _dst_key: &str,
        _ctx: &Context,
        _label_id: u32,
        _group_id: Option<i64>,
    ) -> Result<(GraphDef, Fragment), EngineError> {
        Err(not_supported("AddColumn", self.variant_name()))
    }

    /// Serialize one selector across the cluster. `Ok(None)` on non-root
    /// ranks.
    fn to_ndarray(
        &self,
        comm: &dyn Communicator,
        selector: &str,
    ) -> Result<Option<Vec<u8>>, EngineError> {
        gather_ndarray(comm, self.fragment(), selector)
    }

    /// As [`FragmentWrapper::to_ndarray`], for a comma-joined selector list.
    fn to_dataframe(
        &self,
        comm: &dyn Communicator,
        selectors: &str,
    ) -> Result<Option<Vec<u8>>, EngineError> {
        gather_dataframe(comm, self.fragment(), selectors)
    }

    fn to_directed(&self) -> Result<Fragment, EngineError> {
        Err(not_supported("ToDirected", self.variant_name()))
    }

    fn to_undirected(&self) -> Result<Fragment, EngineError> {
        Err(not_supported("ToUndirected", self.variant_name()))
    }

    fn create_graph_view(&self, _view_type: &str) -> Result<Fragment, EngineError> {
        Err(not_supported("CreateGraphView", self.variant_name()))
    }

    /// Display name for error messages only.
    fn variant_name(&self) -> &'static str;
}

fn allocate_group(
    store: &dyn ObjectStore,
    fid: u32,
    group_id: Option<i64>,
) -> Result<i64, EngineError> {
    store.construct_fragment_group(group_id, fid)
}

/// Column-rich, immutable, Arrow-backed property graph (`ArrowProperty`).
/// Supports the full set of structural operations.
#[derive(Debug)]
pub struct LabeledPropertyFragmentWrapper {
    pub graph_def: GraphDef,
    pub fragment: Fragment,
}

impl FragmentWrapper for LabeledPropertyFragmentWrapper {
    fn fragment(&self) -> &Fragment {
        &self.fragment
    }

    fn graph_def(&self) -> &GraphDef {
        &self.graph_def
    }

    fn variant_name(&self) -> &'static str {
        "labeled-property"
    }

    fn copy_graph(
        &self,
        store: &dyn ObjectStore,
        dst_key: &str,
        copy_type: CopyType,
        group_id: Option<i64>,
    ) -> Result<(GraphDef, Fragment), EngineError> {
        let new_fragment = match copy_type {
            CopyType::Identical => self.fragment.clone(),
            CopyType::Reset => self.fragment.reset_copy(),
        };
        let group = allocate_group(store, self.fragment.fid, group_id)?;
        let mut def = self.graph_def.clone();
        def.key = dst_key.to_string();
        def.vineyard_id = group;
        Ok((def, new_fragment))
    }

    fn project(
        &self,
        store: &dyn ObjectStore,
        dst_key: &str,
        vertex_props: &[(u32, Vec<String>)],
        edge_props: &[(u32, Vec<String>)],
        group_id: Option<i64>,
    ) -> Result<(GraphDef, Fragment), EngineError> {
        if vertex_props.is_empty() {
            return Err(EngineError::InvalidValue {
                key: "vertex_collections".to_string(),
                message: "Project requires at least one vertex label".to_string(),
            });
        }
        let mut projected = self.fragment.clone();
        projected.vertex_labels.retain(|l| vertex_props.iter().any(|(id, _)| *id == l.id));
        projected.edge_labels.retain(|l| edge_props.iter().any(|(id, _)| *id == l.id));
        for (label_id, keep) in vertex_props {
            if let Some(table) = projected.tables.get_mut(label_id) {
                table.columns.retain(|(name, _)| keep.is_empty() || keep.contains(name));
            }
        }
        let kept_edge_labels: std::collections::HashSet<u32> =
            edge_props.iter().map(|(id, _)| *id).collect();
        projected.edges.retain(|e| kept_edge_labels.contains(&e.label));

        let group = allocate_group(store, self.fragment.fid, group_id)?;
        let def = GraphDef {
            key: dst_key.to_string(),
            graph_type: GraphType::ArrowProjected,
            directed: self.graph_def.directed,
            vineyard_id: group,
            schema_def: self.graph_def.schema_def.clone(),
            schema_path: None,
            generate_eid: self.graph_def.generate_eid,
        };
        Ok((def, projected))
    }

    fn add_column(
        &self,
        store: &dyn ObjectStore,
        dst_key: &str,
        ctx: &Context,
        label_id: u32,
        group_id: Option<i64>,
    ) -> Result<(GraphDef, Fragment), EngineError> {
        if ctx.vertex_map.fnum() != self.fragment.vertex_map.fnum() {
            return Err(EngineError::IllegalState(format!(
                "Fragment number mismatch: context has {}, graph has {}",
                ctx.vertex_map.fnum(),
                self.fragment.vertex_map.fnum()
            )));
        }
        if !ctx.vertex_map.consistent_with(&self.fragment.vertex_map) {
            return Err(EngineError::IllegalState(
                "context vertex map is not consistent with the destination graph's".to_string(),
            ));
        }
        if !self.fragment.vertex_labels.iter().any(|l| l.id == label_id) {
            return Err(EngineError::IllegalState(format!(
                "Label id {label_id} is invalid for this graph's schema"
            )));
        }

        let mut new_fragment = self.fragment.clone();
        let new_columns = ctx.to_arrow_arrays()?;
        new_fragment.add_vertex_columns(label_id, new_columns)?;

        let group = allocate_group(store, self.fragment.fid, group_id)?;
        let mut def = self.graph_def.clone();
        def.key = dst_key.to_string();
        def.vineyard_id = group;
        Ok((def, new_fragment))
    }
}

/// Column-poor, algorithm-facing simple graph (`ArrowProjected`). Supports
/// only serialization, not structural mutation.
#[derive(Debug)]
pub struct ProjectedFragmentWrapper {
    pub graph_def: GraphDef,
    pub fragment: Fragment,
}

impl FragmentWrapper for ProjectedFragmentWrapper {
    fn fragment(&self) -> &Fragment {
        &self.fragment
    }

    fn graph_def(&self) -> &GraphDef {
        &self.graph_def
    }

    fn variant_name(&self) -> &'static str {
        "projected"
    }
}

/// Mutable, heterogeneous-attribute dynamic graph (`DynamicProperty`).
/// Supports copy, directed/undirected conversion, views, and serialization.
#[derive(Debug)]
pub struct DynamicPropertyFragmentWrapper {
    pub graph_def: GraphDef,
    pub fragment: Fragment,
}

impl FragmentWrapper for DynamicPropertyFragmentWrapper {
    fn fragment(&self) -> &Fragment {
        &self.fragment
    }

    fn graph_def(&self) -> &GraphDef {
        &self.graph_def
    }

    fn variant_name(&self) -> &'static str {
        "dynamic-property"
    }

    fn copy_graph(
        &self,
        _store: &dyn ObjectStore,
        dst_key: &str,
        copy_type: CopyType,
        _group_id: Option<i64>,
    ) -> Result<(GraphDef, Fragment), EngineError> {
        // The `fnum`-way parallel vertex-map copy is driven by
        // the dispatcher, which owns the thread::scope fan-out; this method
        // receives an already-copied vertex map baked into `self.fragment`
        // when called from there, so it only needs the payload copy here.
        let new_fragment = match copy_type {
            CopyType::Identical => self.fragment.clone(),
            CopyType::Reset => self.fragment.reset_copy(),
        };
        let mut def = self.graph_def.clone();
        def.key = dst_key.to_string();
        def.vineyard_id = -1;
        Ok((def, new_fragment))
    }

    fn to_directed(&self) -> Result<Fragment, EngineError> {
        let vm = std::sync::Arc::new((*self.fragment.vertex_map).clone());
        Ok(self.fragment.to_directed_from(vm))
    }

    fn to_undirected(&self) -> Result<Fragment, EngineError> {
        let vm = std::sync::Arc::new((*self.fragment.vertex_map).clone());
        Ok(self.fragment.to_undirected_from(vm))
    }

    fn create_graph_view(&self, view_type: &str) -> Result<Fragment, EngineError> {
        match view_type {
            "reversed" => {
                let vm = std::sync::Arc::new((*self.fragment.vertex_map).clone());
                Ok(self.fragment.reversed_from(vm))
            }
            other => Err(EngineError::InvalidValue {
                key: "view_type".to_string(),
                message: format!("unrecognized view type '{other}'"),
            }),
        }
    }
}

/// Mutable, algorithm-facing projected dynamic graph (`DynamicProjected`).
/// Supports neither structural mutation nor selector serialization.
#[derive(Debug)]
pub struct DynamicProjectedFragmentWrapper {
    pub graph_def: GraphDef,
    pub fragment: Fragment,
}

impl FragmentWrapper for DynamicProjectedFragmentWrapper {
    fn fragment(&self) -> &Fragment {
        &self.fragment
    }

    fn graph_def(&self) -> &GraphDef {
        &self.graph_def
    }

    fn variant_name(&self) -> &'static str {
        "dynamic-projected"
    }

    fn to_ndarray(
        &self,
        _comm: &dyn Communicator,
        _selector: &str,
    ) -> Result<Option<Vec<u8>>, EngineError> {
        Err(not_supported("ToNdArray", self.variant_name()))
    }

    fn to_dataframe(
        &self,
        _comm: &dyn Communicator,
        _selectors: &str,
    ) -> Result<Option<Vec<u8>>, EngineError> {
        Err(not_supported("ToDataframe", self.variant_name()))
    }
}
