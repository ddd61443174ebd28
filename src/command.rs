//! Wire-level command envelope.
//!
//! `Command` is the transport-agnostic unit the coordinator sends to every
//! worker. Serialization/framing of this envelope onto an actual RPC
//! channel is explicitly out of scope; this module only defines the shape,
//! derives `serde::{Serialize, Deserialize}` so any codec can carry it, and
//! gives `AttrValue` the primitive/enum/list union a command's attribute
//! map needs.

use serde::{Deserialize, Serialize};
use std::collections::HashMap;

/// The complete set of command kinds the dispatcher implements.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum CommandKind {
    CreateGraph,
    CreateApp,
    RunApp,
    UnloadApp,
    UnloadGraph,
    ReportGraph,
    ProjectGraph,
    ProjectToSimple,
    ModifyVertices,
    ModifyEdges,
    TransformGraph,
    CopyGraph,
    ToDirected,
    ToUndirected,
    InduceSubgraph,
    ClearGraph,
    ClearEdges,
    ViewGraph,
    AddLabels,
    ContextToNumpy,
    ContextToDataframe,
    ToVineyardTensor,
    ToVineyardDataframe,
    AddColumn,
    GraphToNumpy,
    GraphToDataframe,
    RegisterGraphType,
    GetEngineConfig,
}

/// A single value in a command's attribute map.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(tag = "t", content = "v")]
pub enum AttrValue {
    Str(String),
    Int(i64),
    UInt(u64),
    Bool(bool),
    Float(f64),
    StrList(Vec<String>),
    /// A nested list of string lists (e.g. per-label property id lists in
    /// `PROJECT_GRAPH`).
    NestedStrList(Vec<Vec<String>>),
}

impl From<&str> for AttrValue {
    fn from(s: &str) -> Self {
        AttrValue::Str(s.to_string())
    }
}
impl From<String> for AttrValue {
    fn from(s: String) -> Self {
        AttrValue::Str(s)
    }
}
impl From<i64> for AttrValue {
    fn from(v: i64) -> Self {
        AttrValue::Int(v)
    }
}
impl From<u64> for AttrValue {
    fn from(v: u64) -> Self {
        AttrValue::UInt(v)
    }
}
impl From<bool> for AttrValue {
    fn from(v: bool) -> Self {
        AttrValue::Bool(v)
    }
}
impl From<Vec<String>> for AttrValue {
    fn from(v: Vec<String>) -> Self {
        AttrValue::StrList(v)
    }
}

/// Algorithm-specific binary query parameters,
/// opaque to the dispatcher and handed straight to `AlgorithmEntry::query`.
pub type QueryArgs = Vec<u8>;

/// A tagged command: a kind, an attribute map, and optional query args.
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct Command {
    pub kind: CommandKind,
    pub attrs: HashMap<String, AttrValue>,
    #[serde(default)]
    pub query_args: Option<QueryArgs>,
}

impl Command {
    #[must_use]
    pub fn new(kind: CommandKind) -> Self {
        Self {
            kind,
            attrs: HashMap::new(),
            query_args: None,
        }
    }

    #[must_use]
    pub fn with(mut self, key: impl Into<String>, value: impl Into<AttrValue>) -> Self {
        self.attrs.insert(key.into(), value.into());
        self
    }

    #[must_use]
    pub fn with_query_args(mut self, args: QueryArgs) -> Self {
        self.query_args = Some(args);
        self
    }
}
