//! Algorithm Entry: a handle to a dynamically loaded algorithm library.
//!
//! Real dynamic loading of a shared object is explicitly out of scope.
//! What this crate owns is the *contract*: resolving a library
//! path to a runnable query, creating a per-fragment worker handle, and
//! running that query collectively. `AlgorithmLibrary` plays the role of the
//! resolved shared object; two builtin libraries (`sssp`, `pagerank`) stand
//! in for what a real `dlopen` would hand back.

use crate::context::{Context, ContextKind};
use crate::error::EngineError;
use crate::fragment::Fragment;
use crate::wrapper::FragmentWrapper;
use std::collections::{HashMap, VecDeque};
use std::sync::Arc;

/// Parallelism hint for algorithm execution. The dispatcher never
/// observes this parallelism.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct EngineSpec {
    pub num_workers: usize,
}

impl Default for EngineSpec {
    fn default() -> Self {
        Self {
            num_workers: num_cpus::get(),
        }
    }
}

/// The symbols a resolved algorithm library exports.
pub trait AlgorithmLibrary: Send + Sync {
    /// Run the algorithm against one worker's fragment shard, returning the
    /// per-vertex context it produces (`None` if the algorithm produces no
    /// context, e.g. a pure side-effecting transform).
    fn run(
        &self,
        fragment: &Fragment,
        query_args: &[u8],
        engine_spec: &EngineSpec,
    ) -> Result<Option<ContextKind>, EngineError>;
}

/// Unweighted single-source shortest path, breadth-first over the
/// fragment's local edge list. `query_args` is the source vertex's GID as an
/// 8-byte little-endian integer.
pub struct SsspQuery;

impl AlgorithmLibrary for SsspQuery {
    fn run(
        &self,
        fragment: &Fragment,
        query_args: &[u8],
        _engine_spec: &EngineSpec,
    ) -> Result<Option<ContextKind>, EngineError> {
        let source: u64 = query_args
            .get(0..8)
            .and_then(|b| b.try_into().ok())
            .map(u64::from_le_bytes)
            .ok_or_else(|| {
                EngineError::InvalidValue {
                    key: "query_args".to_string(),
                    message: "sssp requires an 8-byte little-endian source vertex id".to_string(),
                }
            })?;

        let mut adjacency: HashMap<u64, Vec<u64>> = HashMap::new();
        for e in &fragment.edges {
            adjacency.entry(e.src).or_default().push(e.dst);
            if !fragment.directed {
                adjacency.entry(e.dst).or_default().push(e.src);
            }
        }

        let mut distance: HashMap<u64, f64> = HashMap::new();
        let mut queue = VecDeque::new();
        distance.insert(source, 0.0);
        queue.push_back(source);
        while let Some(v) = queue.pop_front() {
            let d = distance[&v];
            for &next in adjacency.get(&v).into_iter().flatten() {
                if !distance.contains_key(&next) {
                    distance.insert(next, d + 1.0);
                    queue.push_back(next);
                }
            }
        }

        let gids: Vec<u64> = fragment
            .inner_vertices
            .values()
            .flat_map(|v| v.iter().copied())
            .collect();
        let values = gids
            .iter()
            .map(|gid| distance.get(gid).copied().unwrap_or(f64::INFINITY))
            .collect();

        Ok(Some(ContextKind::VertexData {
            gids,
            values: crate::archive::ColumnData::Float64(values),
        }))
    }
}

/// PageRank over the fragment's local edge list, fixed iteration count and
/// damping factor -- a demonstration algorithm, not a distributed
/// implementation (a real one would exchange rank mass across fragments via
/// the communicator between iterations).
pub struct PagerankQuery {
    pub damping: f64,
    pub iterations: u32,
}

impl Default for PagerankQuery {
    fn default() -> Self {
        Self {
            damping: 0.85,
            iterations: 20,
        }
    }
}

impl AlgorithmLibrary for PagerankQuery {
    fn run(
        &self,
        fragment: &Fragment,
        _query_args: &[u8],
        _engine_spec: &EngineSpec,
    ) -> Result<Option<ContextKind>, EngineError> {
        let gids: Vec<u64> = fragment
            .inner_vertices
            .values()
            .flat_map(|v| v.iter().copied())
            .collect();
        if gids.is_empty() {
            return Ok(Some(ContextKind::VertexData {
                gids,
                values: crate::archive::ColumnData::Float64(Vec::new()),
            }));
        }

        let mut out_degree: HashMap<u64, usize> = HashMap::new();
        let mut incoming: HashMap<u64, Vec<u64>> = HashMap::new();
        for e in &fragment.edges {
            *out_degree.entry(e.src).or_insert(0) += 1;
            incoming.entry(e.dst).or_default().push(e.src);
        }

        let n = gids.len() as f64;
        let mut rank: HashMap<u64, f64> = gids.iter().map(|&g| (g, 1.0 / n)).collect();
        for _ in 0..self.iterations {
            let mut next: HashMap<u64, f64> = HashMap::new();
            for &gid in &gids {
                let inbound: f64 = incoming
                    .get(&gid)
                    .into_iter()
                    .flatten()
                    .map(|src| rank.get(src).copied().unwrap_or(0.0) / out_degree_or_one(&out_degree, *src))
                    .sum();
                next.insert(gid, (1.0 - self.damping) / n + self.damping * inbound);
            }
            rank = next;
        }

        let values = gids.iter().map(|g| rank[g]).collect();
        Ok(Some(ContextKind::VertexData {
            gids,
            values: crate::archive::ColumnData::Float64(values),
        }))
    }
}

fn out_degree_or_one(out_degree: &HashMap<u64, usize>, gid: u64) -> f64 {
    match out_degree.get(&gid).copied().unwrap_or(0) {
        0 => 1.0,
        d => d as f64,
    }
}

/// Resolve a library path to a builtin [`AlgorithmLibrary`], standing in for
/// `dlopen` + symbol lookup.
fn resolve_library(library_path: &str) -> Option<Arc<dyn AlgorithmLibrary>> {
    if library_path.contains("sssp") {
        Some(Arc::new(SsspQuery))
    } else if library_path.contains("pagerank") {
        Some(Arc::new(PagerankQuery::default()))
    } else {
        None
    }
}

/// A handle produced by `CreateWorker`: the fragment it was bound to plus
/// the engine spec it will run with.
pub struct AlgorithmWorker {
    engine_spec: EngineSpec,
}

/// Handle to a dynamically loaded algorithm library.
pub struct AlgorithmEntry {
    pub name: String,
    pub library_path: String,
    library: Arc<dyn AlgorithmLibrary>,
}

impl std::fmt::Debug for AlgorithmEntry {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("AlgorithmEntry")
            .field("name", &self.name)
            .field("library_path", &self.library_path)
            .finish()
    }
}

impl AlgorithmEntry {
    /// `Init`: resolve the library's symbols. Fails with `LibraryLoad` if the
    /// path names no known library.
    pub fn init(name: impl Into<String>, library_path: impl Into<String>) -> Result<Self, EngineError> {
        let library_path = library_path.into();
        let library = resolve_library(&library_path).ok_or_else(|| {
            EngineError::LibraryLoad(
                library_path.clone(),
                "no create-worker/query/meta symbols found".to_string(),
            )
        })?;
        Ok(Self {
            name: name.into(),
            library_path,
            library,
        })
    }

    /// `CreateWorker(fragment, comm, engine_spec)`. `comm` is unused by the
    /// builtin libraries (each worker computes its own shard's context
    /// independently; only `ToNdArray`/`ToDataframe` gather across workers),
    /// but the parameter is kept so a real collective-aware library could
    /// use it.
    #[must_use]
    pub fn create_worker(&self, _comm: &dyn crate::comm::Communicator, engine_spec: EngineSpec) -> AlgorithmWorker {
        AlgorithmWorker { engine_spec }
    }

    /// `Query(worker, query_args, context_key, wrapper)`. Returns `None` if
    /// the algorithm produces no context.
    pub fn query(
        &self,
        worker: &AlgorithmWorker,
        query_args: &[u8],
        wrapper: &dyn FragmentWrapper,
    ) -> Result<Option<Context>, EngineError> {
        let kind = self
            .library
            .run(wrapper.fragment(), query_args, &worker.engine_spec)?;
        Ok(kind.map(|kind| Context {
            producing_wrapper: wrapper.graph_def().key.clone(),
            vertex_map: Arc::clone(&wrapper.fragment().vertex_map),
            label_id: None,
            kind,
        }))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::comm::LocalComm;
    use crate::fragment::{Edge, LabelMeta};
    use crate::graph_def::{GraphDef, GraphType, SchemaDef};
    use crate::vertex_map::VertexMap;
    use crate::wrapper::DynamicPropertyFragmentWrapper;

    fn chain_fragment() -> Fragment {
        let vm = Arc::new(VertexMap::empty(1));
        let mut frag = Fragment::new_empty(0, 1, true, vm);
        frag.vertex_labels.push(LabelMeta {
            id: 0,
            name: "v".to_string(),
        });
        for gid in 0..3 {
            frag.register_inner_vertex(0, gid);
        }
        frag.edges.push(Edge {
            src: 0,
            dst: 1,
            label: 0,
            eid: None,
        });
        frag.edges.push(Edge {
            src: 1,
            dst: 2,
            label: 0,
            eid: None,
        });
        frag
    }

    fn wrapper_for(fragment: Fragment) -> DynamicPropertyFragmentWrapper {
        DynamicPropertyFragmentWrapper {
            graph_def: GraphDef {
                key: "g0".to_string(),
                graph_type: GraphType::DynamicProperty,
                directed: true,
                vineyard_id: -1,
                schema_def: SchemaDef::new("string", "u64", "()", "()", "{}"),
                schema_path: None,
                generate_eid: false,
            },
            fragment,
        }
    }

    #[test]
    fn unresolvable_library_path_is_library_load_error() {
        let err = AlgorithmEntry::init("mystery", "lib/unknown.so").unwrap_err();
        assert_eq!(err.kind(), crate::error::ErrorKind::LibraryLoad);
    }

    #[test]
    fn sssp_computes_hop_distance_along_a_chain() {
        let entry = AlgorithmEntry::init("sssp", "lib/sssp.so").unwrap();
        let wrapper = wrapper_for(chain_fragment());
        let comm = LocalComm::new_group(1).remove(0);
        let worker = entry.create_worker(&comm, EngineSpec::default());
        let ctx = entry
            .query(&worker, &0u64.to_le_bytes(), &wrapper)
            .unwrap()
            .unwrap();
        match ctx.kind {
            ContextKind::VertexData { gids, values } => {
                assert_eq!(gids, vec![0, 1, 2]);
                assert_eq!(
                    values,
                    crate::archive::ColumnData::Float64(vec![0.0, 1.0, 2.0])
                );
            }
            _ => panic!("expected vertex-data context"),
        }
    }

    #[test]
    fn pagerank_produces_one_score_per_vertex() {
        let entry = AlgorithmEntry::init("pagerank", "lib/pagerank.so").unwrap();
        let wrapper = wrapper_for(chain_fragment());
        let comm = LocalComm::new_group(1).remove(0);
        let worker = entry.create_worker(&comm, EngineSpec::default());
        let ctx = entry.query(&worker, &[], &wrapper).unwrap().unwrap();
        match ctx.kind {
            ContextKind::VertexData { gids, values } => {
                assert_eq!(gids.len(), 3);
                assert_eq!(values.len(), 3);
            }
            _ => panic!("expected vertex-data context"),
        }
    }
}
