//! `GraphDef`: the serializable metadata record for every materialized
//! graph.

use serde::{Deserialize, Serialize};

/// Which concrete representation a graph artifact uses.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum GraphType {
    ArrowProperty,
    ArrowProjected,
    DynamicProperty,
    DynamicProjected,
}

impl GraphType {
    /// True for the two columnar (Arrow-backed) variants.
    #[must_use]
    pub fn is_columnar(self) -> bool {
        matches!(self, GraphType::ArrowProperty | GraphType::ArrowProjected)
    }

    /// True for the two mutable/dynamic variants.
    #[must_use]
    pub fn is_dynamic(self) -> bool {
        matches!(
            self,
            GraphType::DynamicProperty | GraphType::DynamicProjected
        )
    }
}

/// The OID/VID/VDATA/EDATA type tuple plus the JSON property schema.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct SchemaDef {
    pub oid_type: String,
    pub vid_type: String,
    pub vdata_type: String,
    pub edata_type: String,
    pub property_schema_json: String,
}

impl SchemaDef {
    #[must_use]
    pub fn new(
        oid_type: impl Into<String>,
        vid_type: impl Into<String>,
        vdata_type: impl Into<String>,
        edata_type: impl Into<String>,
        property_schema_json: impl Into<String>,
    ) -> Self {
        Self {
            oid_type: oid_type.into(),
            vid_type: vid_type.into(),
            edata_type: edata_type.into(),
            vdata_type: vdata_type.into(),
            property_schema_json: property_schema_json.into(),
        }
    }
}

/// Metadata record for a materialized graph.
///
/// Invariant: a wrapper's declared graph-type equals its
/// `GraphDef.graph_type`; this is enforced by `FragmentWrapper::graph_def`
/// implementations, which derive `graph_type` from `self`'s own variant
/// rather than accepting it as a free parameter.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct GraphDef {
    pub key: String,
    pub graph_type: GraphType,
    pub directed: bool,
    /// Shared-store fragment-group id, or `-1` if this graph is not backed
    /// by the object store.
    pub vineyard_id: i64,
    pub schema_def: SchemaDef,
    pub schema_path: Option<String>,
    pub generate_eid: bool,
}

impl GraphDef {
    #[must_use]
    pub fn has_store_backing(&self) -> bool {
        self.vineyard_id >= 0
    }
}
