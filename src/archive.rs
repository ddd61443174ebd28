//! Wire-format archive: the linear byte container used to transport
//! serialized `NdArray`/`Dataframe` values from workers to the coordinator.
//!
//! Layouts:
//! - `NdArray`: `[type_code:i32][total_count:i64][payload...]`
//! - `Dataframe`: `[num_columns:i64][total_count:i64]` then, per column,
//!   `[col_name:len-prefixed-string][type_code:i32][payload...]`
//!
//! Type codes are this crate's own enumeration over the eight element
//! types a backing columnar store's array-type enumeration would need to
//! round-trip; that store is external and out of scope, so we give the
//! enumeration a concrete, stable shape here.

use crate::error::EngineError;
use arrow::array::{
    ArrayRef, Float32Array, Float64Array, Int32Array, Int64Array, LargeStringArray, StringArray,
    UInt32Array, UInt64Array,
};
use std::sync::Arc;

/// One typed column's worth of values, ready to serialize.
#[derive(Clone, Debug, PartialEq)]
pub enum ColumnData {
    Int32(Vec<i32>),
    Int64(Vec<i64>),
    UInt32(Vec<u32>),
    UInt64(Vec<u64>),
    Float32(Vec<f32>),
    Float64(Vec<f64>),
    Utf8(Vec<String>),
    LargeUtf8(Vec<String>),
}

impl ColumnData {
    #[must_use]
    pub fn len(&self) -> usize {
        match self {
            ColumnData::Int32(v) => v.len(),
            ColumnData::Int64(v) => v.len(),
            ColumnData::UInt32(v) => v.len(),
            ColumnData::UInt64(v) => v.len(),
            ColumnData::Float32(v) => v.len(),
            ColumnData::Float64(v) => v.len(),
            ColumnData::Utf8(v) => v.len(),
            ColumnData::LargeUtf8(v) => v.len(),
        }
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    #[must_use]
    pub fn type_code(&self) -> i32 {
        match self {
            ColumnData::Int32(_) => 0,
            ColumnData::Int64(_) => 1,
            ColumnData::UInt32(_) => 2,
            ColumnData::UInt64(_) => 3,
            ColumnData::Float32(_) => 4,
            ColumnData::Float64(_) => 5,
            ColumnData::Utf8(_) => 6,
            ColumnData::LargeUtf8(_) => 7,
        }
    }

    /// Serialize just this column's payload bytes, with no header -- used
    /// to ship one worker's shard to the gather root, which then wraps the
    /// concatenated payloads in a single header.
    #[must_use]
    pub fn to_payload_bytes(&self) -> Vec<u8> {
        let mut buf = Vec::new();
        self.write_payload(&mut buf);
        buf
    }

    fn write_payload(&self, buf: &mut Vec<u8>) {
        match self {
            ColumnData::Int32(v) => v.iter().for_each(|x| buf.extend_from_slice(&x.to_le_bytes())),
            ColumnData::Int64(v) => v.iter().for_each(|x| buf.extend_from_slice(&x.to_le_bytes())),
            ColumnData::UInt32(v) => v.iter().for_each(|x| buf.extend_from_slice(&x.to_le_bytes())),
            ColumnData::UInt64(v) => v.iter().for_each(|x| buf.extend_from_slice(&x.to_le_bytes())),
            ColumnData::Float32(v) => v.iter().for_each(|x| buf.extend_from_slice(&x.to_le_bytes())),
            ColumnData::Float64(v) => v.iter().for_each(|x| buf.extend_from_slice(&x.to_le_bytes())),
            ColumnData::Utf8(v) | ColumnData::LargeUtf8(v) => {
                for s in v {
                    buf.extend_from_slice(&(s.len() as u32).to_le_bytes());
                    buf.extend_from_slice(s.as_bytes());
                }
            }
        }
    }
}

/// Build an `NdArray` archive. `worker_columns` is the per-worker column
/// data in ascending worker-id order, already gathered at worker 0 by the
/// communicator.
pub fn write_ndarray(worker_columns: &[ColumnData]) -> Result<Vec<u8>, EngineError> {
    let type_code = worker_columns
        .first()
        .map(ColumnData::type_code)
        .unwrap_or(6);
    if worker_columns
        .iter()
        .any(|c| c.type_code() != type_code)
    {
        return Err(EngineError::IllegalState(
            "NdArray worker shards disagree on element type".to_string(),
        ));
    }
    let total_count: i64 = worker_columns.iter().map(|c| c.len() as i64).sum();

    let mut buf = Vec::new();
    buf.extend_from_slice(&type_code.to_le_bytes());
    buf.extend_from_slice(&total_count.to_le_bytes());
    for col in worker_columns {
        col.write_payload(&mut buf);
    }
    Ok(buf)
}

/// Build a `Dataframe` archive from columns already gathered (concatenated
/// in worker order) at worker 0.
pub fn write_dataframe(columns: &[(String, ColumnData)]) -> Result<Vec<u8>, EngineError> {
    let total_count = columns.first().map(|(_, c)| c.len() as i64).unwrap_or(0);
    for (name, col) in columns {
        if col.len() as i64 != total_count {
            return Err(EngineError::IllegalState(format!(
                "column '{name}' has {} rows, expected {total_count}",
                col.len()
            )));
        }
    }

    let mut buf = Vec::new();
    buf.extend_from_slice(&(columns.len() as i64).to_le_bytes());
    buf.extend_from_slice(&total_count.to_le_bytes());
    for (name, col) in columns {
        buf.extend_from_slice(&(name.len() as u32).to_le_bytes());
        buf.extend_from_slice(name.as_bytes());
        buf.extend_from_slice(&col.type_code().to_le_bytes());
        col.write_payload(&mut buf);
    }
    Ok(buf)
}

/// Render a column as a columnar-library array, the inverse of the copy
/// dispatch in `fragment::copy_array`.
#[must_use]
pub fn to_arrow_array(col: &ColumnData) -> ArrayRef {
    match col {
        ColumnData::Int32(v) => Arc::new(Int32Array::from(v.clone())),
        ColumnData::Int64(v) => Arc::new(Int64Array::from(v.clone())),
        ColumnData::UInt32(v) => Arc::new(UInt32Array::from(v.clone())),
        ColumnData::UInt64(v) => Arc::new(UInt64Array::from(v.clone())),
        ColumnData::Float32(v) => Arc::new(Float32Array::from(v.clone())),
        ColumnData::Float64(v) => Arc::new(Float64Array::from(v.clone())),
        ColumnData::Utf8(v) => Arc::new(StringArray::from(v.clone())),
        ColumnData::LargeUtf8(v) => Arc::new(LargeStringArray::from(v.clone())),
    }
}

/// Parsed `NdArray` header, useful for assertions in tests / callers that
/// only need the counts without decoding the payload.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct NdArrayHeader {
    pub type_code: i32,
    pub total_count: i64,
}

/// Read just the header of an `NdArray` archive.
pub fn read_ndarray_header(bytes: &[u8]) -> Result<NdArrayHeader, EngineError> {
    if bytes.len() < 12 {
        return Err(EngineError::IllegalState("archive too short".to_string()));
    }
    let type_code = i32::from_le_bytes(bytes[0..4].try_into().unwrap());
    let total_count = i64::from_le_bytes(bytes[4..12].try_into().unwrap());
    Ok(NdArrayHeader {
        type_code,
        total_count,
    })
}

/// Parsed `Dataframe` header.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct DataframeHeader {
    pub num_columns: i64,
    pub total_count: i64,
}

/// Read just the header of a `Dataframe` archive.
pub fn read_dataframe_header(bytes: &[u8]) -> Result<DataframeHeader, EngineError> {
    if bytes.len() < 16 {
        return Err(EngineError::IllegalState("archive too short".to_string()));
    }
    let num_columns = i64::from_le_bytes(bytes[0..8].try_into().unwrap());
    let total_count = i64::from_le_bytes(bytes[8..16].try_into().unwrap());
    Ok(DataframeHeader {
        num_columns,
        total_count,
    })
}

/// Parse a column as the columnar-library array type, the inverse of
/// [`to_arrow_array`]. Used when a fragment-level selector reads a property
/// column straight out of a `PropertyTable`.
pub fn from_arrow_array(arr: &ArrayRef) -> Result<ColumnData, EngineError> {
    use arrow::array::Array;
    use arrow::datatypes::DataType;

    let col = match arr.data_type() {
        DataType::Int32 => ColumnData::Int32(
            arr.as_any()
                .downcast_ref::<Int32Array>()
                .unwrap()
                .values()
                .to_vec(),
        ),
        DataType::Int64 => ColumnData::Int64(
            arr.as_any()
                .downcast_ref::<Int64Array>()
                .unwrap()
                .values()
                .to_vec(),
        ),
        DataType::UInt32 => ColumnData::UInt32(
            arr.as_any()
                .downcast_ref::<UInt32Array>()
                .unwrap()
                .values()
                .to_vec(),
        ),
        DataType::UInt64 => ColumnData::UInt64(
            arr.as_any()
                .downcast_ref::<UInt64Array>()
                .unwrap()
                .values()
                .to_vec(),
        ),
        DataType::Float32 => ColumnData::Float32(
            arr.as_any()
                .downcast_ref::<Float32Array>()
                .unwrap()
                .values()
                .to_vec(),
        ),
        DataType::Float64 => ColumnData::Float64(
            arr.as_any()
                .downcast_ref::<Float64Array>()
                .unwrap()
                .values()
                .to_vec(),
        ),
        DataType::Utf8 => ColumnData::Utf8(
            arr.as_any()
                .downcast_ref::<StringArray>()
                .unwrap()
                .iter()
                .map(|s| s.unwrap_or_default().to_string())
                .collect(),
        ),
        DataType::LargeUtf8 => ColumnData::LargeUtf8(
            arr.as_any()
                .downcast_ref::<LargeStringArray>()
                .unwrap()
                .iter()
                .map(|s| s.unwrap_or_default().to_string())
                .collect(),
        ),
        other => {
            return Err(EngineError::DataType(format!(
                "unsupported column type: {other:?}"
            )))
        }
    };
    Ok(col)
}

/// Merge per-worker `NdArray` shards (each already a full header + payload,
/// built locally with [`write_ndarray`]) into the single archive worker 0
/// hands back to the coordinator.
pub fn concat_ndarray_shards(shards: &[Vec<u8>]) -> Result<Vec<u8>, EngineError> {
    let mut total_count = 0i64;
    let mut type_code = None;
    let mut payload = Vec::new();
    for shard in shards {
        let header = read_ndarray_header(shard)?;
        type_code.get_or_insert(header.type_code);
        total_count += header.total_count;
        payload.extend_from_slice(&shard[12..]);
    }
    let mut buf = Vec::new();
    buf.extend_from_slice(&type_code.unwrap_or(6).to_le_bytes());
    buf.extend_from_slice(&total_count.to_le_bytes());
    buf.extend_from_slice(&payload);
    Ok(buf)
}

fn scalar_width(type_code: i32) -> Option<usize> {
    match type_code {
        0 | 2 | 4 => Some(4),
        1 | 3 | 5 => Some(8),
        _ => None,
    }
}

struct RawColumn {
    name: String,
    type_code: i32,
    payload: Vec<u8>,
}

fn parse_dataframe(bytes: &[u8]) -> Result<(i64, Vec<RawColumn>), EngineError> {
    let header = read_dataframe_header(bytes)?;
    let mut offset = 16usize;
    let mut cols = Vec::with_capacity(header.num_columns as usize);
    for _ in 0..header.num_columns {
        let name_len =
            u32::from_le_bytes(bytes[offset..offset + 4].try_into().unwrap()) as usize;
        offset += 4;
        let name = String::from_utf8(bytes[offset..offset + name_len].to_vec())
            .map_err(|_| EngineError::IllegalState("invalid utf8 column name".to_string()))?;
        offset += name_len;
        let type_code = i32::from_le_bytes(bytes[offset..offset + 4].try_into().unwrap());
        offset += 4;

        let payload_len = if let Some(width) = scalar_width(type_code) {
            width * header.total_count as usize
        } else {
            let start = offset;
            let mut cursor = offset;
            for _ in 0..header.total_count {
                let slen =
                    u32::from_le_bytes(bytes[cursor..cursor + 4].try_into().unwrap()) as usize;
                cursor += 4 + slen;
            }
            cursor - start
        };
        let payload = bytes[offset..offset + payload_len].to_vec();
        offset += payload_len;
        cols.push(RawColumn {
            name,
            type_code,
            payload,
        });
    }
    Ok((header.total_count, cols))
}

/// Merge per-worker `Dataframe` shards into the single archive worker 0
/// hands back to the coordinator. Every shard must carry the same columns
/// in the same order (true by construction: every worker resolves the same
/// selector list against its own shard).
pub fn concat_dataframe_shards(shards: &[Vec<u8>]) -> Result<Vec<u8>, EngineError> {
    let mut merged: Vec<(String, i32, Vec<u8>)> = Vec::new();
    let mut total_count = 0i64;
    for shard in shards {
        let (count, cols) = parse_dataframe(shard)?;
        total_count += count;
        if merged.is_empty() {
            merged = cols
                .into_iter()
                .map(|c| (c.name, c.type_code, c.payload))
                .collect();
        } else {
            if merged.len() != cols.len() {
                return Err(EngineError::IllegalState(
                    "dataframe shards disagree on column count".to_string(),
                ));
            }
            for (acc, c) in merged.iter_mut().zip(cols) {
                if acc.0 != c.name || acc.1 != c.type_code {
                    return Err(EngineError::IllegalState(
                        "dataframe shards disagree on column shape".to_string(),
                    ));
                }
                acc.2.extend_from_slice(&c.payload);
            }
        }
    }

    let mut buf = Vec::new();
    buf.extend_from_slice(&(merged.len() as i64).to_le_bytes());
    buf.extend_from_slice(&total_count.to_le_bytes());
    for (name, type_code, payload) in merged {
        buf.extend_from_slice(&(name.len() as u32).to_le_bytes());
        buf.extend_from_slice(name.as_bytes());
        buf.extend_from_slice(&type_code.to_le_bytes());
        buf.extend_from_slice(&payload);
    }
    Ok(buf)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn shard_concat_sums_per_worker_counts() {
        let shard0 = write_ndarray(&[ColumnData::UInt64(vec![10, 11])]).unwrap();
        let shard1 = write_ndarray(&[ColumnData::UInt64(vec![20])]).unwrap();
        let merged = concat_ndarray_shards(&[shard0, shard1]).unwrap();
        let header = read_ndarray_header(&merged).unwrap();
        assert_eq!(header.total_count, 3);
    }

    #[test]
    fn dataframe_shard_concat_preserves_columns() {
        let shard0 = write_dataframe(&[
            ("v.id".to_string(), ColumnData::UInt64(vec![0, 1])),
            ("r".to_string(), ColumnData::Float64(vec![0.0, 1.0])),
        ])
        .unwrap();
        let shard1 = write_dataframe(&[
            ("v.id".to_string(), ColumnData::UInt64(vec![2])),
            ("r".to_string(), ColumnData::Float64(vec![2.0])),
        ])
        .unwrap();
        let merged = concat_dataframe_shards(&[shard0, shard1]).unwrap();
        let header = read_dataframe_header(&merged).unwrap();
        assert_eq!(header.num_columns, 2);
        assert_eq!(header.total_count, 3);
    }

    #[test]
    fn ndarray_header_matches_total_count() {
        let archive = write_ndarray(&[
            ColumnData::UInt64(vec![1, 2]),
            ColumnData::UInt64(vec![3]),
        ])
        .unwrap();
        let header = read_ndarray_header(&archive).unwrap();
        assert_eq!(header.total_count, 3);
        assert_eq!(header.type_code, ColumnData::UInt64(vec![]).type_code());
    }

    #[test]
    fn ndarray_rejects_mixed_types() {
        let err = write_ndarray(&[
            ColumnData::UInt64(vec![1]),
            ColumnData::Int32(vec![2]),
        ])
        .unwrap_err();
        assert_eq!(err.kind(), crate::error::ErrorKind::IllegalState);
    }

    #[test]
    fn dataframe_header_reports_columns_and_rows() {
        let archive = write_dataframe(&[
            ("v.id".to_string(), ColumnData::UInt64(vec![1, 2, 3])),
            ("r".to_string(), ColumnData::Float64(vec![0.0, 1.0, 2.0])),
        ])
        .unwrap();
        let header = read_dataframe_header(&archive).unwrap();
        assert_eq!(header.num_columns, 2);
        assert_eq!(header.total_count, 3);
    }

    #[test]
    fn dataframe_rejects_ragged_columns() {
        let err = write_dataframe(&[
            ("a".to_string(), ColumnData::UInt64(vec![1, 2])),
            ("b".to_string(), ColumnData::UInt64(vec![1])),
        ])
        .unwrap_err();
        assert_eq!(err.kind(), crate::error::ErrorKind::IllegalState);
    }
}
