//! Context Wrapper Hierarchy: the output of a query run.
//!
//! Unlike the four fragment-wrapper variants (kept as separate structs
//! behind a trait object in `wrapper.rs`), the five context variants differ
//! only in granularity and labeling, so they are modeled as one struct over
//! a three-way `ContextKind` enum plus an `Option<u32>` label id -- an
//! exhaustive, closed shape, so a sum type is the right call here.

use crate::archive::{self, ColumnData};
use crate::error::EngineError;
use crate::selector::{parse_selector_list, Selector, SelectorKind};
use crate::store::ObjectStore;
use crate::vertex_map::VertexMap;
use arrow::array::ArrayRef;
use std::sync::Arc;

/// The five shapes an algorithm's output context can take.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum ContextType {
    Tensor,
    VertexData,
    LabeledVertexData,
    VertexProperty,
    LabeledVertexProperty,
}

/// The payload a context carries, before labeling is taken into account.
#[derive(Clone, Debug)]
pub enum ContextKind {
    /// No vertex association: one bare value per worker shard.
    Tensor(ColumnData),
    /// One scalar result per vertex.
    VertexData { gids: Vec<u64>, values: ColumnData },
    /// Multiple named result columns per vertex.
    VertexProperty {
        gids: Vec<u64>,
        columns: Vec<(String, ColumnData)>,
    },
}

/// A produced query result, with a back-pointer to the fragment wrapper
/// that produced it can enforce vertex-map identity.
#[derive(Clone)]
pub struct Context {
    pub producing_wrapper: String,
    pub vertex_map: Arc<VertexMap>,
    pub label_id: Option<u32>,
    pub kind: ContextKind,
}

impl Context {
    #[must_use]
    pub fn context_type(&self) -> ContextType {
        match (&self.kind, self.label_id) {
            (ContextKind::Tensor(_), _) => ContextType::Tensor,
            (ContextKind::VertexData { .. }, None) => ContextType::VertexData,
            (ContextKind::VertexData { .. }, Some(_)) => ContextType::LabeledVertexData,
            (ContextKind::VertexProperty { .. }, None) => ContextType::VertexProperty,
            (ContextKind::VertexProperty { .. }, Some(_)) => ContextType::LabeledVertexProperty,
        }
    }

    fn resolve(&self, selector: &Selector) -> Result<ColumnData, EngineError> {
        if let Some(want) = selector.label_id {
            if self.label_id != Some(want) {
                return Err(EngineError::UnsupportedOperation(format!(
                    "context is labeled #{:?}, selector asked for #{want}",
                    self.label_id
                )));
            }
        }
        match &selector.kind {
            SelectorKind::VertexId => match &self.kind {
                ContextKind::VertexData { gids, .. } | ContextKind::VertexProperty { gids, .. } => {
                    Ok(ColumnData::UInt64(gids.clone()))
                }
                ContextKind::Tensor(_) => Err(EngineError::UnsupportedOperation(
                    "v.id is not meaningful on a tensor context".to_string(),
                )),
            },
            SelectorKind::VertexLabelId => match self.label_id {
                Some(label) => {
                    let len = match &self.kind {
                        ContextKind::VertexData { gids, .. }
                        | ContextKind::VertexProperty { gids, .. } => gids.len(),
                        ContextKind::Tensor(_) => 0,
                    };
                    Ok(ColumnData::UInt32(vec![label; len]))
                }
                None => Err(EngineError::UnsupportedOperation(
                    "context is not labeled".to_string(),
                )),
            },
            SelectorKind::VertexData | SelectorKind::VertexProperty(_) => {
                Err(EngineError::UnsupportedOperation(
                    "v.data / v.property.* are fragment-level selectors, not context selectors"
                        .to_string(),
                ))
            }
            SelectorKind::Result => match &self.kind {
                ContextKind::Tensor(v) => Ok(v.clone()),
                ContextKind::VertexData { values, .. } => Ok(values.clone()),
                ContextKind::VertexProperty { .. } => Err(EngineError::UnsupportedOperation(
                    "bare 'r' is ambiguous on a multi-column context; use r.<field>".to_string(),
                )),
            },
            SelectorKind::ResultField(field) => match &self.kind {
                ContextKind::VertexProperty { columns, .. } => columns
                    .iter()
                    .find(|(name, _)| name == field)
                    .map(|(_, col)| col.clone())
                    .ok_or_else(|| EngineError::NotFound(format!("result field '{field}'"))),
                _ => Err(EngineError::UnsupportedOperation(
                    "r.<field> requires a vertex-property context".to_string(),
                )),
            },
        }
    }

    /// Serialize a single selector into an `NdArray` archive.
    pub fn to_ndarray(&self, selector_raw: &str) -> Result<Vec<u8>, EngineError> {
        let selector = Selector::parse(selector_raw)?;
        let column = self.resolve(&selector)?;
        archive::write_ndarray(&[column])
    }

    /// Serialize a comma-joined selector list into a `Dataframe` archive.
    pub fn to_dataframe(&self, selectors_raw: &str) -> Result<Vec<u8>, EngineError> {
        let list = parse_selector_list(selectors_raw)?;
        let columns = list
            .into_iter()
            .map(|named| self.resolve(&named.selector).map(|col| (named.name, col)))
            .collect::<Result<Vec<_>, _>>()?;
        archive::write_dataframe(&columns)
    }

    /// Materialize the selector's values into the object store, returning
    /// the resulting object id.
    pub fn to_vineyard_tensor(
        &self,
        store: &dyn ObjectStore,
        selector_raw: &str,
    ) -> Result<i64, EngineError> {
        let bytes = self.to_ndarray(selector_raw)?;
        store.put_blob(bytes)
    }

    /// As [`Context::to_vineyard_tensor`], but for a dataframe selector list.
    pub fn to_vineyard_dataframe(
        &self,
        store: &dyn ObjectStore,
        selectors_raw: &str,
    ) -> Result<i64, EngineError> {
        let bytes = self.to_dataframe(selectors_raw)?;
        store.put_blob(bytes)
    }

    /// Render this context's columns as columnar-library arrays, for
    /// `AddColumn`'s native `AddVertexColumns` call.
    pub fn to_arrow_arrays(&self) -> Result<Vec<(String, ArrayRef)>, EngineError> {
        match &self.kind {
            ContextKind::VertexData { values, .. } => {
                Ok(vec![("r".to_string(), archive::to_arrow_array(values))])
            }
            ContextKind::VertexProperty { columns, .. } => Ok(columns
                .iter()
                .map(|(name, col)| (name.clone(), archive::to_arrow_array(col)))
                .collect()),
            ContextKind::Tensor(_) => Err(EngineError::UnsupportedOperation(
                "a tensor context carries no per-vertex columns".to_string(),
            )),
        }
    }
}
