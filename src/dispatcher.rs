//! Grape Instance: the central command handler.
//!
//! `GrapeInstance::on_receive` is the single entry point every worker calls
//! for every command. Handlers are centralized behind one `dispatch` match
//! so every artifact-touching path goes through the same
//! validate → local compute → optional store write → collective fence →
//! optional worker-0-only cleanup shape, mirroring the
//! teacher's centralization of its `Source → Stateless → barrier` execution
//! shape in `runner.rs`.

use crate::algorithm::{AlgorithmEntry, EngineSpec};
use crate::archive;
use crate::comm::Communicator;
use crate::command::{Command, CommandKind};
use crate::config::EngineConfig;
use crate::context::Context;
use crate::error::EngineError;
use crate::fragment::{Edge, Fragment, LabelMeta};
use crate::graph_def::{GraphDef, GraphType, SchemaDef};
use crate::ids::IdGenerator;
use crate::params::Params;
use crate::registry::ObjectRegistry;
use crate::selector::parse_selector_list;
use crate::store::ObjectStore;
use crate::utility::{TypeSignature, UtilityRegistry};
use crate::vertex_map::VertexMap;
use crate::wrapper::{
    CopyType, DynamicProjectedFragmentWrapper, DynamicPropertyFragmentWrapper, FragmentWrapper,
    LabeledPropertyFragmentWrapper, ProjectedFragmentWrapper,
};
use std::collections::{HashMap, HashSet};
use std::sync::{Arc, Mutex};
use std::time::Duration;

/// How the coordinator combines per-worker results of one command.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum AggregationPolicy {
    /// Only worker 0's payload is kept.
    PickFirst,
    /// The coordinator picks the first non-empty shard in worker order.
    PickFirstNonEmpty,
    /// The coordinator concatenates per-worker payloads.
    Concatenate,
}

/// The payload shape a successful command produces.
#[derive(Clone, Debug)]
pub enum CommandPayload {
    None,
    GraphDef(GraphDef),
    Data(String),
    Archive(Option<Vec<u8>>),
}

/// One worker's outcome for one command, paired with the aggregation policy
/// the coordinator should apply across workers.
#[derive(Clone, Debug)]
pub struct CommandResult {
    pub payload: CommandPayload,
    pub aggregation: AggregationPolicy,
}

/// The closed set of fragment-wrapper variants this crate actually
/// instantiates, stored in the [`ObjectRegistry`] under the graph's name.
/// `ObjectRegistry::put` requires a `Sized` type, so the open `dyn
/// FragmentWrapper` polymorphism lives inside this enum's `as_wrapper`
/// rather than being stored directly.
#[derive(Debug)]
enum GraphArtifact {
    LabeledProperty(LabeledPropertyFragmentWrapper),
    Projected(ProjectedFragmentWrapper),
    DynamicProperty(DynamicPropertyFragmentWrapper),
    DynamicProjected(DynamicProjectedFragmentWrapper),
}

impl GraphArtifact {
    fn as_wrapper(&self) -> &dyn FragmentWrapper {
        match self {
            GraphArtifact::LabeledProperty(w) => w,
            GraphArtifact::Projected(w) => w,
            GraphArtifact::DynamicProperty(w) => w,
            GraphArtifact::DynamicProjected(w) => w,
        }
    }

    fn from_parts(def: GraphDef, fragment: Fragment) -> Self {
        match def.graph_type {
            GraphType::ArrowProperty => GraphArtifact::LabeledProperty(LabeledPropertyFragmentWrapper {
                graph_def: def,
                fragment,
            }),
            GraphType::ArrowProjected => GraphArtifact::Projected(ProjectedFragmentWrapper {
                graph_def: def,
                fragment,
            }),
            GraphType::DynamicProperty => {
                GraphArtifact::DynamicProperty(DynamicPropertyFragmentWrapper {
                    graph_def: def,
                    fragment,
                })
            }
            GraphType::DynamicProjected => {
                GraphArtifact::DynamicProjected(DynamicProjectedFragmentWrapper {
                    graph_def: def,
                    fragment,
                })
            }
        }
    }

    fn with_fragment(&self, fragment: Fragment) -> Self {
        Self::from_parts(self.as_wrapper().graph_def().clone(), fragment)
    }

    fn with_key(&self, key: impl Into<String>) -> Self {
        let mut def = self.as_wrapper().graph_def().clone();
        def.key = key.into();
        Self::from_parts(def, self.as_wrapper().fragment().clone())
    }
}

/// Per-command invocation counters, collected only when
/// [`EngineConfig::metrics_enabled`] is set.
#[derive(Clone, Copy, Debug, Default)]
pub struct CommandMetrics {
    pub invocations: u64,
    pub total_duration: Duration,
}

fn parse_graph_type(raw: &str) -> Result<GraphType, EngineError> {
    match raw {
        "arrow_property" => Ok(GraphType::ArrowProperty),
        "arrow_projected" => Ok(GraphType::ArrowProjected),
        "dynamic_property" => Ok(GraphType::DynamicProperty),
        "dynamic_projected" => Ok(GraphType::DynamicProjected),
        other => Err(EngineError::InvalidValue {
            key: "graph_type".to_string(),
            message: format!("unrecognized graph_type '{other}'"),
        }),
    }
}

fn parse_copy_type(raw: &str) -> Result<CopyType, EngineError> {
    match raw {
        "identical" => Ok(CopyType::Identical),
        "reset" => Ok(CopyType::Reset),
        other => Err(EngineError::InvalidValue {
            key: "copy_type".to_string(),
            message: format!("unrecognized copy_type '{other}'"),
        }),
    }
}

fn single_vertex_label(wrapper: &dyn FragmentWrapper) -> Result<u32, EngineError> {
    match wrapper.fragment().vertex_labels.as_slice() {
        [single] => Ok(single.id),
        _ => Err(EngineError::MissingKey("label_id".to_string())),
    }
}

fn resolve_collection_spec(
    key: &str,
    spec: &[Vec<String>],
    lookup: impl Fn(&str) -> Option<u32>,
) -> Result<Vec<(u32, Vec<String>)>, EngineError> {
    spec.iter()
        .map(|entry| {
            let name = entry.first().ok_or_else(|| EngineError::InvalidValue {
                key: key.to_string(),
                message: "each collection entry needs a label name".to_string(),
            })?;
            let id = lookup(name).ok_or_else(|| EngineError::NotFound(format!("label '{name}'")))?;
            Ok((id, entry[1..].to_vec()))
        })
        .collect()
}

fn bad_pair(key: &str, raw: &str) -> EngineError {
    EngineError::InvalidValue {
        key: key.to_string(),
        message: format!("expected 'src dst', got '{raw}'"),
    }
}

/// Hash-partition an OID to an owning fragment id. Deterministic given
/// (`oid`, `fnum`), so every worker that runs the same `MODIFY_VERTICES`
/// command independently computes the same assignment, keeping the
/// replicated vertex map consistent across workers without any extra
/// coordination round-trip.
fn owning_fid(oid: &str, fnum: u32) -> u32 {
    use std::collections::hash_map::DefaultHasher;
    use std::hash::{Hash, Hasher};
    let mut hasher = DefaultHasher::new();
    oid.hash(&mut hasher);
    (hasher.finish() % u64::from(fnum.max(1))) as u32
}

/// One worker's instance dispatcher and object lifecycle manager.
pub struct GrapeInstance {
    pub fid: u32,
    pub fnum: u32,
    comm: Arc<dyn Communicator>,
    store: Arc<dyn ObjectStore>,
    registry: ObjectRegistry,
    utilities: UtilityRegistry,
    ids: IdGenerator,
    pub config: EngineConfig,
    metrics: Mutex<HashMap<CommandKind, CommandMetrics>>,
}

impl GrapeInstance {
    #[must_use]
    pub fn new(
        fid: u32,
        fnum: u32,
        comm: Arc<dyn Communicator>,
        store: Arc<dyn ObjectStore>,
        config: EngineConfig,
    ) -> Self {
        Self {
            fid,
            fnum,
            comm,
            store,
            registry: ObjectRegistry::new(),
            utilities: UtilityRegistry::new(),
            ids: IdGenerator::new(),
            config,
            metrics: Mutex::new(HashMap::new()),
        }
    }

    #[must_use]
    pub fn metrics_snapshot(&self) -> HashMap<CommandKind, CommandMetrics> {
        self.metrics.lock().unwrap().clone()
    }

    /// `OnReceive`: the single command entry point.
    pub fn on_receive(&self, cmd: &Command) -> Result<CommandResult, EngineError> {
        let span = crate::logging::command_span(cmd.kind, self.fid);
        let _enter = span.enter();
        let start = std::time::Instant::now();

        let params = Params::new(cmd);
        let result = self.dispatch(cmd, &params);

        if self.config.metrics_enabled {
            let mut metrics = self.metrics.lock().unwrap();
            let entry = metrics.entry(cmd.kind).or_default();
            entry.invocations += 1;
            entry.total_duration += start.elapsed();
        }
        if let Err(ref err) = result {
            tracing::warn!(kind = ?cmd.kind, error = %err, "command failed");
        }
        result
    }

    fn dispatch(&self, cmd: &Command, p: &Params) -> Result<CommandResult, EngineError> {
        match cmd.kind {
            CommandKind::CreateGraph => self.handle_create_graph(p),
            CommandKind::CreateApp => self.handle_create_app(p),
            CommandKind::RunApp => self.handle_run_app(cmd, p),
            CommandKind::UnloadApp => self.handle_unload_app(p),
            CommandKind::UnloadGraph => self.handle_unload_graph(p),
            CommandKind::ReportGraph => self.handle_report_graph(p),
            CommandKind::ProjectGraph => self.handle_project_graph(p),
            CommandKind::ProjectToSimple => self.handle_project_to_simple(p),
            CommandKind::ModifyVertices => self.handle_modify_vertices(p),
            CommandKind::ModifyEdges => self.handle_modify_edges(p),
            CommandKind::TransformGraph => self.handle_transform_graph(p),
            CommandKind::CopyGraph => self.handle_copy_graph(p),
            CommandKind::ToDirected => self.handle_to_directed(p),
            CommandKind::ToUndirected => self.handle_to_undirected(p),
            CommandKind::InduceSubgraph => self.handle_induce_subgraph(p),
            CommandKind::ClearGraph => self.handle_clear_graph(p),
            CommandKind::ClearEdges => self.handle_clear_edges(p),
            CommandKind::ViewGraph => self.handle_view_graph(p),
            CommandKind::AddLabels => self.handle_add_labels(p),
            CommandKind::ContextToNumpy => self.handle_context_to_numpy(p),
            CommandKind::ContextToDataframe => self.handle_context_to_dataframe(p),
            CommandKind::ToVineyardTensor => self.handle_to_vineyard_tensor(p),
            CommandKind::ToVineyardDataframe => self.handle_to_vineyard_dataframe(p),
            CommandKind::AddColumn => self.handle_add_column(p),
            CommandKind::GraphToNumpy => self.handle_graph_to_numpy(p),
            CommandKind::GraphToDataframe => self.handle_graph_to_dataframe(p),
            CommandKind::RegisterGraphType => self.handle_register_graph_type(p),
            CommandKind::GetEngineConfig => self.handle_get_engine_config(),
        }
    }

    fn graph(&self, name: &str) -> Result<Arc<GraphArtifact>, EngineError> {
        self.registry.get::<GraphArtifact>(name)
    }

    /// Translate an external vertex id to its cluster-wide gid, for callers
    /// building `RunApp` query args by hand.
    pub fn vertex_gid(&self, graph_name: &str, oid: &str) -> Result<Option<u64>, EngineError> {
        Ok(self.graph(graph_name)?.as_wrapper().fragment().vertex_map.get_gid(oid))
    }

    fn publish_graph(&self, key: &str, def: GraphDef, fragment: Fragment) -> Result<CommandResult, EngineError> {
        let artifact = GraphArtifact::from_parts(def.clone(), fragment);
        self.registry.put(key, Arc::new(artifact))?;
        Ok(CommandResult {
            payload: CommandPayload::GraphDef(def),
            aggregation: AggregationPolicy::PickFirst,
        })
    }

    fn replace_artifact(&self, key: &str, artifact: GraphArtifact) -> Result<(), EngineError> {
        self.registry.remove(key)?;
        self.registry.put(key, Arc::new(artifact))
    }

    /// Allocate a fragment-group id on worker 0 and broadcast it, so every
    /// worker ends up registering itself under the same group id.
    fn collective_group_id(&self) -> Result<i64, EngineError> {
        let seed = if self.comm.rank() == 0 {
            Some(self.store.construct_fragment_group(None, self.fid)?)
        } else {
            None
        };
        let payload = seed.map(|id| id.to_le_bytes().to_vec());
        let bytes = self.comm.broadcast(0, payload);
        let group_id = i64::from_le_bytes(bytes.try_into().map_err(|_| {
            EngineError::CommError("malformed fragment-group id broadcast".to_string())
        })?);
        if self.comm.rank() != 0 {
            self.store.construct_fragment_group(Some(group_id), self.fid)?;
        }
        Ok(group_id)
    }

    /// The `fnum`-way scoped thread fan-out for a dynamic vertex-map copy,
    /// gated by the `multi_threaded_convert` config toggle.
    fn parallel_copy_vertex_map(&self, vm: &Arc<VertexMap>) -> Arc<VertexMap> {
        let fnum = vm.fnum();
        let slices: Vec<_> = if self.config.multi_threaded_convert {
            std::thread::scope(|scope| {
                let handles: Vec<_> = (0..fnum)
                    .map(|f| {
                        let vm = Arc::clone(vm);
                        scope.spawn(move || vm.clone_fragment_slice(f))
                    })
                    .collect();
                handles
                    .into_iter()
                    .map(|h| h.join().expect("vertex-map copy thread panicked"))
                    .collect()
            })
        } else {
            (0..fnum).map(|f| vm.clone_fragment_slice(f)).collect()
        };
        Arc::new(VertexMap::from_slices(fnum, slices))
    }

    fn handle_create_graph(&self, p: &Params) -> Result<CommandResult, EngineError> {
        let graph_name = p.str("graph_name")?;
        let graph_type = parse_graph_type(p.str("graph_type")?)?;

        if graph_type.is_dynamic() {
            let directed = p.boolean("directed")?;
            let vertex_map = Arc::new(VertexMap::empty(self.fnum));
            let fragment = Fragment::new_empty(self.fid, self.fnum, directed, vertex_map);
            let def = GraphDef {
                key: graph_name.to_string(),
                graph_type,
                directed,
                vineyard_id: -1,
                schema_def: SchemaDef::new("string", "uint64", "()", "()", "{}"),
                schema_path: None,
                generate_eid: false,
            };
            self.publish_graph(graph_name, def, fragment)
        } else {
            if graph_type != GraphType::ArrowProperty {
                return Err(EngineError::InvalidValue {
                    key: "graph_type".to_string(),
                    message: "CREATE_GRAPH only constructs arrow_property graphs directly; use PROJECT_GRAPH for arrow_projected".to_string(),
                });
            }
            let directed = p.boolean_or("directed", true)?;
            let signature = TypeSignature(p.str("type_signature")?.to_string());
            let utility = self.utilities.get_or_default(&signature.0);
            let (def, fragment) = utility.load_graph(self.fid, self.fnum, directed, graph_name, &signature)?;
            self.publish_graph(graph_name, def, fragment)
        }
    }

    fn handle_create_app(&self, p: &Params) -> Result<CommandResult, EngineError> {
        let library_path = p.str("app_library_path")?;
        let name = p
            .str_opt("app_name")?
            .map(ToString::to_string)
            .unwrap_or_else(|| self.ids.next_named("app"));
        let entry = AlgorithmEntry::init(name.clone(), library_path)?;
        self.registry.put(&name, Arc::new(entry))?;
        Ok(CommandResult {
            payload: CommandPayload::Data(name),
            aggregation: AggregationPolicy::PickFirst,
        })
    }

    fn handle_run_app(&self, cmd: &Command, p: &Params) -> Result<CommandResult, EngineError> {
        let app_name = p.str("app_name")?;
        let graph_name = p.str("graph_name")?;
        let entry = self.registry.get::<AlgorithmEntry>(app_name)?;
        let artifact = self.graph(graph_name)?;
        let worker = entry.create_worker(self.comm.as_ref(), EngineSpec::default());
        let query_args = cmd.query_args.clone().unwrap_or_default();
        let context = entry.query(&worker, &query_args, artifact.as_wrapper())?;

        match context {
            Some(context) => {
                let context_key = self.ids.next_named("ctx");
                let context_type = context.context_type();
                self.registry.put(&context_key, Arc::new(context))?;
                let json = serde_json::json!({
                    "context_type": format!("{context_type:?}"),
                    "context_key": context_key,
                })
                .to_string();
                Ok(CommandResult {
                    payload: CommandPayload::Data(json),
                    aggregation: AggregationPolicy::PickFirst,
                })
            }
            None => Ok(CommandResult {
                payload: CommandPayload::None,
                aggregation: AggregationPolicy::PickFirst,
            }),
        }
    }

    fn handle_unload_app(&self, p: &Params) -> Result<CommandResult, EngineError> {
        let app_name = p.str("app_name")?;
        self.registry.remove(app_name)?;
        Ok(CommandResult {
            payload: CommandPayload::None,
            aggregation: AggregationPolicy::PickFirst,
        })
    }

    fn handle_unload_graph(&self, p: &Params) -> Result<CommandResult, EngineError> {
        let graph_name = p.str("graph_name")?;
        self.registry.remove(graph_name)?;
        self.comm.barrier();
        if self.comm.rank() == 0 {
            if let Some(vid) = p.int_opt("vineyard_id")? {
                match self.store.delete_fragment_group(vid) {
                    Ok(()) | Err(EngineError::NotFound(_)) => {}
                    Err(err) => return Err(err),
                }
            }
        }
        Ok(CommandResult {
            payload: CommandPayload::None,
            aggregation: AggregationPolicy::PickFirst,
        })
    }

    fn handle_report_graph(&self, p: &Params) -> Result<CommandResult, EngineError> {
        let graph_name = p.str("graph_name")?;
        let artifact = self.graph(graph_name)?;
        let wrapper = artifact.as_wrapper();
        if !wrapper.graph_def().graph_type.is_dynamic() {
            return Err(EngineError::InvalidOperation(
                "REPORT_GRAPH is only supported on dynamic graphs".to_string(),
            ));
        }
        let fragment = wrapper.fragment();
        let json = serde_json::json!({
            "fid": fragment.fid,
            "fnum": fragment.fnum,
            "directed": fragment.directed,
            "vertex_count": fragment.total_inner_vertex_count(),
            "edge_count": fragment.edges.len(),
        })
        .to_string();
        Ok(CommandResult {
            payload: CommandPayload::Data(json),
            aggregation: AggregationPolicy::Concatenate,
        })
    }

    fn handle_project_graph(&self, p: &Params) -> Result<CommandResult, EngineError> {
        let graph_name = p.str("graph_name")?;
        let vertex_collections = p.nested_str_list("vertex_collections")?;
        let edge_collections = p.nested_str_list("edge_collections")?;
        let artifact = self.graph(graph_name)?;
        let wrapper = artifact.as_wrapper();
        let fragment = wrapper.fragment();
        let vertex_props = resolve_collection_spec(
            "vertex_collections",
            vertex_collections,
            |name| fragment.label_id_of(name),
        )?;
        let edge_props = resolve_collection_spec(
            "edge_collections",
            edge_collections,
            |name| fragment.edge_label_id_of(name),
        )?;
        let group_id = self.collective_group_id()?;
        let dst_key = self.ids.next_named("graph");
        let (def, new_fragment) =
            wrapper.project(self.store.as_ref(), &dst_key, &vertex_props, &edge_props, Some(group_id))?;
        self.publish_graph(&dst_key, def, new_fragment)
    }

    fn handle_project_to_simple(&self, p: &Params) -> Result<CommandResult, EngineError> {
        let graph_name = p.str("graph_name")?;
        let type_signature = p.str("type_signature")?;
        let artifact = self.graph(graph_name)?;
        let wrapper = artifact.as_wrapper();
        let fragment = wrapper.fragment();
        let vertex_props: Vec<(u32, Vec<String>)> =
            fragment.vertex_labels.iter().map(|l| (l.id, Vec::new())).collect();
        let edge_props: Vec<(u32, Vec<String>)> =
            fragment.edge_labels.iter().map(|l| (l.id, Vec::new())).collect();
        let group_id = self.collective_group_id()?;
        let dst_key = self.ids.next_named("graph");
        let (mut def, new_fragment) =
            wrapper.project(self.store.as_ref(), &dst_key, &vertex_props, &edge_props, Some(group_id))?;
        def.schema_def.property_schema_json =
            serde_json::json!({ "type_signature": type_signature }).to_string();
        self.publish_graph(&dst_key, def, new_fragment)
    }

    fn handle_modify_vertices(&self, p: &Params) -> Result<CommandResult, EngineError> {
        let graph_name = p.str("graph_name")?;
        let modify_type = p.str("modify_type")?;
        let nodes = p.str_list("nodes")?;
        let artifact = self.graph(graph_name)?;
        let mut fragment = artifact.as_wrapper().fragment().clone();
        if fragment.vertex_labels.is_empty() {
            fragment.vertex_labels.push(LabelMeta {
                id: 0,
                name: "default".to_string(),
            });
        }
        let label_id = fragment.vertex_labels[0].id;

        match modify_type {
            "add" => {
                let mut vm = (*fragment.vertex_map).clone();
                for oid in nodes {
                    let owner = owning_fid(oid, fragment.fnum);
                    let gid = vm.add_vertex(owner, oid.clone());
                    if owner == self.fid {
                        fragment.register_inner_vertex(label_id, gid);
                    }
                }
                fragment.vertex_map = Arc::new(vm);
            }
            "delete" => {
                let doomed: HashSet<u64> = nodes
                    .iter()
                    .filter_map(|oid| fragment.vertex_map.get_gid(oid))
                    .collect();
                for verts in fragment.inner_vertices.values_mut() {
                    verts.retain(|g| !doomed.contains(g));
                }
            }
            other => {
                return Err(EngineError::InvalidValue {
                    key: "modify_type".to_string(),
                    message: format!("unsupported modify_type '{other}'"),
                })
            }
        }
        self.replace_artifact(graph_name, artifact.with_fragment(fragment))?;
        Ok(CommandResult {
            payload: CommandPayload::None,
            aggregation: AggregationPolicy::PickFirst,
        })
    }

    fn handle_modify_edges(&self, p: &Params) -> Result<CommandResult, EngineError> {
        let graph_name = p.str("graph_name")?;
        let modify_type = p.str("modify_type")?;
        let edges = p.str_list("edges")?;
        let artifact = self.graph(graph_name)?;
        let mut fragment = artifact.as_wrapper().fragment().clone();
        if fragment.edge_labels.is_empty() {
            fragment.edge_labels.push(LabelMeta {
                id: 0,
                name: "default".to_string(),
            });
        }
        let label_id = fragment.edge_labels[0].id;

        match modify_type {
            "add" => {
                for pair in edges {
                    let mut parts = pair.split_whitespace();
                    let src_oid = parts.next().ok_or_else(|| bad_pair("edges", pair))?;
                    let dst_oid = parts.next().ok_or_else(|| bad_pair("edges", pair))?;
                    let src = fragment
                        .vertex_map
                        .get_gid(src_oid)
                        .ok_or_else(|| EngineError::NotFound(format!("vertex '{src_oid}'")))?;
                    let dst = fragment
                        .vertex_map
                        .get_gid(dst_oid)
                        .ok_or_else(|| EngineError::NotFound(format!("vertex '{dst_oid}'")))?;
                    if fragment.vertex_map.fid_of(src) == Some(self.fid) {
                        fragment.edges.push(Edge {
                            src,
                            dst,
                            label: label_id,
                            eid: None,
                        });
                    }
                }
            }
            "delete" => {
                let mut doomed = Vec::new();
                for pair in edges {
                    let mut parts = pair.split_whitespace();
                    if let (Some(a), Some(b)) = (parts.next(), parts.next()) {
                        if let (Some(ga), Some(gb)) =
                            (fragment.vertex_map.get_gid(a), fragment.vertex_map.get_gid(b))
                        {
                            doomed.push((ga, gb));
                        }
                    }
                }
                fragment.edges.retain(|e| !doomed.contains(&(e.src, e.dst)));
            }
            other => {
                return Err(EngineError::InvalidValue {
                    key: "modify_type".to_string(),
                    message: format!("unsupported modify_type '{other}'"),
                })
            }
        }
        self.replace_artifact(graph_name, artifact.with_fragment(fragment))?;
        Ok(CommandResult {
            payload: CommandPayload::None,
            aggregation: AggregationPolicy::PickFirst,
        })
    }

    fn handle_transform_graph(&self, p: &Params) -> Result<CommandResult, EngineError> {
        let graph_name = p.str("graph_name")?;
        let dst_graph_type = parse_graph_type(p.str("dst_graph_type")?)?;
        let type_signature = p.str("type_signature")?;
        let artifact = self.graph(graph_name)?;
        let utility = self.utilities.get_or_default(type_signature);
        let src_fragment = artifact.as_wrapper().fragment();
        let new_fragment = if dst_graph_type.is_dynamic() {
            utility.to_dynamic_fragment(src_fragment)?
        } else {
            utility.to_arrow_fragment(src_fragment)?
        };
        let dst_key = self.ids.next_named("graph");
        let mut def = artifact.as_wrapper().graph_def().clone();
        def.key = dst_key.clone();
        def.graph_type = dst_graph_type;
        self.publish_graph(&dst_key, def, new_fragment)
    }

    fn handle_copy_graph(&self, p: &Params) -> Result<CommandResult, EngineError> {
        let graph_name = p.str("graph_name")?;
        let copy_type = parse_copy_type(p.str("copy_type")?)?;
        let artifact = self.graph(graph_name)?;
        let dst_key = self.ids.next_named("graph");

        let (def, fragment) = match artifact.as_wrapper().graph_def().graph_type {
            GraphType::ArrowProperty => {
                let group_id = self.collective_group_id()?;
                artifact
                    .as_wrapper()
                    .copy_graph(self.store.as_ref(), &dst_key, copy_type, Some(group_id))?
            }
            GraphType::DynamicProperty => {
                let copied_vm = self.parallel_copy_vertex_map(&artifact.as_wrapper().fragment().vertex_map);
                let mut fragment = artifact.as_wrapper().fragment().clone();
                fragment.vertex_map = copied_vm;
                artifact
                    .with_fragment(fragment)
                    .as_wrapper()
                    .copy_graph(self.store.as_ref(), &dst_key, copy_type, None)?
            }
            GraphType::ArrowProjected | GraphType::DynamicProjected => artifact
                .as_wrapper()
                .copy_graph(self.store.as_ref(), &dst_key, copy_type, None)?,
        };
        self.publish_graph(&dst_key, def, fragment)
    }

    fn handle_to_directed(&self, p: &Params) -> Result<CommandResult, EngineError> {
        let graph_name = p.str("graph_name")?;
        let artifact = self.graph(graph_name)?;
        let fragment = artifact.as_wrapper().to_directed()?;
        let dst_key = self.ids.next_named("graph");
        let new_artifact = artifact.with_fragment(fragment).with_key(dst_key.clone());
        let def = new_artifact.as_wrapper().graph_def().clone();
        self.registry.put(&dst_key, Arc::new(new_artifact))?;
        Ok(CommandResult {
            payload: CommandPayload::GraphDef(def),
            aggregation: AggregationPolicy::PickFirst,
        })
    }

    fn handle_to_undirected(&self, p: &Params) -> Result<CommandResult, EngineError> {
        let graph_name = p.str("graph_name")?;
        let artifact = self.graph(graph_name)?;
        let fragment = artifact.as_wrapper().to_undirected()?;
        let dst_key = self.ids.next_named("graph");
        let new_artifact = artifact.with_fragment(fragment).with_key(dst_key.clone());
        let def = new_artifact.as_wrapper().graph_def().clone();
        self.registry.put(&dst_key, Arc::new(new_artifact))?;
        Ok(CommandResult {
            payload: CommandPayload::GraphDef(def),
            aggregation: AggregationPolicy::PickFirst,
        })
    }

    fn handle_induce_subgraph(&self, p: &Params) -> Result<CommandResult, EngineError> {
        let graph_name = p.str("graph_name")?;
        let artifact = self.graph(graph_name)?;
        let fragment = artifact.as_wrapper().fragment();

        let keep: HashSet<u64> = if p.has("nodes") {
            p.str_list("nodes")?
                .iter()
                .filter_map(|oid| fragment.vertex_map.get_gid(oid))
                .collect()
        } else if p.has("edges") {
            let mut set = HashSet::new();
            for pair in p.str_list("edges")? {
                let mut parts = pair.split_whitespace();
                if let (Some(a), Some(b)) = (parts.next(), parts.next()) {
                    if let (Some(ga), Some(gb)) =
                        (fragment.vertex_map.get_gid(a), fragment.vertex_map.get_gid(b))
                    {
                        set.insert(ga);
                        set.insert(gb);
                    }
                }
            }
            set
        } else {
            return Err(EngineError::MissingKey("nodes or edges".to_string()));
        };

        let mut new_fragment = fragment.clone();
        for verts in new_fragment.inner_vertices.values_mut() {
            verts.retain(|g| keep.contains(g));
        }
        new_fragment.edges.retain(|e| keep.contains(&e.src) && keep.contains(&e.dst));

        let dst_key = self.ids.next_named("graph");
        let new_artifact = artifact.with_fragment(new_fragment).with_key(dst_key.clone());
        let def = new_artifact.as_wrapper().graph_def().clone();
        self.registry.put(&dst_key, Arc::new(new_artifact))?;
        Ok(CommandResult {
            payload: CommandPayload::GraphDef(def),
            aggregation: AggregationPolicy::PickFirst,
        })
    }

    fn handle_clear_graph(&self, p: &Params) -> Result<CommandResult, EngineError> {
        let graph_name = p.str("graph_name")?;
        let artifact = self.graph(graph_name)?;
        let mut fragment = artifact.as_wrapper().fragment().clone();
        fragment.inner_vertices.clear();
        fragment.edges.clear();
        fragment.tables.clear();
        if let Some(dyn_attrs) = fragment.dynamic.as_mut() {
            dyn_attrs.vertex_attrs.clear();
            dyn_attrs.edge_attrs.clear();
        }
        self.replace_artifact(graph_name, artifact.with_fragment(fragment))?;
        Ok(CommandResult {
            payload: CommandPayload::None,
            aggregation: AggregationPolicy::PickFirst,
        })
    }

    fn handle_clear_edges(&self, p: &Params) -> Result<CommandResult, EngineError> {
        let graph_name = p.str("graph_name")?;
        let artifact = self.graph(graph_name)?;
        let mut fragment = artifact.as_wrapper().fragment().clone();
        fragment.edges.clear();
        if let Some(dyn_attrs) = fragment.dynamic.as_mut() {
            dyn_attrs.edge_attrs.clear();
        }
        self.replace_artifact(graph_name, artifact.with_fragment(fragment))?;
        Ok(CommandResult {
            payload: CommandPayload::None,
            aggregation: AggregationPolicy::PickFirst,
        })
    }

    fn handle_view_graph(&self, p: &Params) -> Result<CommandResult, EngineError> {
        let graph_name = p.str("graph_name")?;
        let view_type = p.str("view_type")?;
        let artifact = self.graph(graph_name)?;
        let fragment = artifact.as_wrapper().create_graph_view(view_type)?;
        let dst_key = self.ids.next_named("graph");
        let new_artifact = artifact.with_fragment(fragment).with_key(dst_key.clone());
        let def = new_artifact.as_wrapper().graph_def().clone();
        self.registry.put(&dst_key, Arc::new(new_artifact))?;
        Ok(CommandResult {
            payload: CommandPayload::GraphDef(def),
            aggregation: AggregationPolicy::PickFirst,
        })
    }

    fn handle_add_labels(&self, p: &Params) -> Result<CommandResult, EngineError> {
        let graph_name = p.str("graph_name")?;
        let type_signature = p.str("type_signature")?;
        let labels = p.str_list("labels")?;
        let artifact = self.graph(graph_name)?;
        if !artifact.as_wrapper().graph_def().graph_type.is_columnar() {
            return Err(EngineError::InvalidOperation(
                "ADD_LABELS requires a columnar graph".to_string(),
            ));
        }
        let utility = self.utilities.get_or_default(type_signature);
        let fragment = utility.add_labels_to_graph(artifact.as_wrapper().fragment(), labels)?;
        let dst_key = self.ids.next_named("graph");
        let new_artifact = artifact.with_fragment(fragment).with_key(dst_key.clone());
        let def = new_artifact.as_wrapper().graph_def().clone();
        self.registry.put(&dst_key, Arc::new(new_artifact))?;
        Ok(CommandResult {
            payload: CommandPayload::GraphDef(def),
            aggregation: AggregationPolicy::PickFirst,
        })
    }

    fn handle_context_to_numpy(&self, p: &Params) -> Result<CommandResult, EngineError> {
        let ctx_name = p.str("ctx_name")?;
        let selector = p.str("selector")?;
        let ctx = self.registry.get::<Context>(ctx_name)?;
        let local = ctx.to_ndarray(selector)?;
        let archive = match self.comm.gather(local) {
            Some(shards) => Some(archive::concat_ndarray_shards(&shards)?),
            None => None,
        };
        Ok(CommandResult {
            payload: CommandPayload::Archive(archive),
            aggregation: AggregationPolicy::PickFirstNonEmpty,
        })
    }

    fn handle_context_to_dataframe(&self, p: &Params) -> Result<CommandResult, EngineError> {
        let ctx_name = p.str("ctx_name")?;
        let selector = p.str("selector")?;
        let ctx = self.registry.get::<Context>(ctx_name)?;
        let local = ctx.to_dataframe(selector)?;
        let archive = match self.comm.gather(local) {
            Some(shards) => Some(archive::concat_dataframe_shards(&shards)?),
            None => None,
        };
        Ok(CommandResult {
            payload: CommandPayload::Archive(archive),
            aggregation: AggregationPolicy::PickFirstNonEmpty,
        })
    }

    fn handle_to_vineyard_tensor(&self, p: &Params) -> Result<CommandResult, EngineError> {
        let ctx_name = p.str("ctx_name")?;
        let selector = p.str("selector")?;
        let ctx = self.registry.get::<Context>(ctx_name)?;
        let object_id = ctx.to_vineyard_tensor(self.store.as_ref(), selector)?;
        Ok(CommandResult {
            payload: CommandPayload::Data(serde_json::json!({ "object_id": object_id }).to_string()),
            aggregation: AggregationPolicy::PickFirst,
        })
    }

    fn handle_to_vineyard_dataframe(&self, p: &Params) -> Result<CommandResult, EngineError> {
        let ctx_name = p.str("ctx_name")?;
        let selector = p.str("selector")?;
        let ctx = self.registry.get::<Context>(ctx_name)?;
        let object_id = ctx.to_vineyard_dataframe(self.store.as_ref(), selector)?;
        Ok(CommandResult {
            payload: CommandPayload::Data(serde_json::json!({ "object_id": object_id }).to_string()),
            aggregation: AggregationPolicy::PickFirst,
        })
    }

    fn handle_add_column(&self, p: &Params) -> Result<CommandResult, EngineError> {
        let graph_name = p.str("graph_name")?;
        let ctx_name = p.str("ctx_name")?;
        let selector = p.str("selector")?;
        let artifact = self.graph(graph_name)?;
        let ctx = self.registry.get::<Context>(ctx_name)?;
        parse_selector_list(selector)?;
        let label_id = match p.int_opt("label_id")? {
            Some(id) => id as u32,
            None => single_vertex_label(artifact.as_wrapper())?,
        };
        let group_id = match artifact.as_wrapper().graph_def().graph_type {
            GraphType::ArrowProperty => Some(self.collective_group_id()?),
            _ => None,
        };
        let dst_key = self.ids.next_named("graph");
        let (def, fragment) =
            artifact
                .as_wrapper()
                .add_column(self.store.as_ref(), &dst_key, &ctx, label_id, group_id)?;
        self.publish_graph(&dst_key, def, fragment)
    }

    fn handle_graph_to_numpy(&self, p: &Params) -> Result<CommandResult, EngineError> {
        let graph_name = p.str("graph_name")?;
        let selector = p.str("selector")?;
        let artifact = self.graph(graph_name)?;
        let archive = artifact.as_wrapper().to_ndarray(self.comm.as_ref(), selector)?;
        Ok(CommandResult {
            payload: CommandPayload::Archive(archive),
            aggregation: AggregationPolicy::PickFirstNonEmpty,
        })
    }

    fn handle_graph_to_dataframe(&self, p: &Params) -> Result<CommandResult, EngineError> {
        let graph_name = p.str("graph_name")?;
        let selector = p.str("selector")?;
        let artifact = self.graph(graph_name)?;
        let archive = artifact.as_wrapper().to_dataframe(self.comm.as_ref(), selector)?;
        Ok(CommandResult {
            payload: CommandPayload::Archive(archive),
            aggregation: AggregationPolicy::PickFirstNonEmpty,
        })
    }

    fn handle_register_graph_type(&self, p: &Params) -> Result<CommandResult, EngineError> {
        let type_signature = p.str("type_signature")?;
        // graph_library_path would be dlopen'd in a production deployment;
        // here the registration just seeds the utility cache for this
        // signature.
        let _ = p.str("graph_library_path")?;
        self.utilities
            .register(type_signature, Arc::new(crate::utility::DefaultGraphUtility));
        Ok(CommandResult {
            payload: CommandPayload::None,
            aggregation: AggregationPolicy::PickFirst,
        })
    }

    fn handle_get_engine_config(&self) -> Result<CommandResult, EngineError> {
        let json = self
            .config
            .to_json()
            .map_err(|e| EngineError::InvalidOperation(e.to_string()))?;
        Ok(CommandResult {
            payload: CommandPayload::Data(json),
            aggregation: AggregationPolicy::PickFirst,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::comm::LocalComm;
    use crate::command::Command;
    use crate::store::MemoryStore;

    fn solo_instance() -> GrapeInstance {
        let comm = Arc::new(LocalComm::new_group(1).remove(0));
        GrapeInstance::new(0, 1, comm, MemoryStore::new(), EngineConfig::default())
    }

    #[test]
    fn create_dynamic_graph_registers_graph_def() {
        let instance = solo_instance();
        let cmd = Command::new(CommandKind::CreateGraph)
            .with("graph_name", "g0")
            .with("graph_type", "dynamic_property")
            .with("directed", true);
        let result = instance.on_receive(&cmd).unwrap();
        match result.payload {
            CommandPayload::GraphDef(def) => assert_eq!(def.graph_type, GraphType::DynamicProperty),
            other => panic!("expected a GraphDef payload, got {other:?}"),
        }
    }

    #[test]
    fn modify_vertices_then_edges_then_run_sssp() {
        let instance = solo_instance();
        instance
            .on_receive(
                &Command::new(CommandKind::CreateGraph)
                    .with("graph_name", "g0")
                    .with("graph_type", "dynamic_property")
                    .with("directed", true),
            )
            .unwrap();
        instance
            .on_receive(&Command::new(CommandKind::ModifyVertices).with("graph_name", "g0").with(
                "modify_type",
                "add",
            ).with("nodes", vec!["1".to_string(), "2".to_string(), "3".to_string()]))
            .unwrap();
        instance
            .on_receive(
                &Command::new(CommandKind::ModifyEdges)
                    .with("graph_name", "g0")
                    .with("modify_type", "add")
                    .with("edges", vec!["1 2".to_string(), "2 3".to_string()]),
            )
            .unwrap();
        instance
            .on_receive(&Command::new(CommandKind::CreateApp).with("app_name", "sssp").with(
                "app_library_path",
                "lib/sssp.so",
            ))
            .unwrap();

        let source_gid = {
            let artifact = instance.graph("g0").unwrap();
            artifact.as_wrapper().fragment().vertex_map.get_gid("1").unwrap()
        };
        let run = Command::new(CommandKind::RunApp)
            .with("app_name", "sssp")
            .with("graph_name", "g0")
            .with_query_args(source_gid.to_le_bytes().to_vec());
        let result = instance.on_receive(&run).unwrap();
        let context_key = match result.payload {
            CommandPayload::Data(json) => {
                let value: serde_json::Value = serde_json::from_str(&json).unwrap();
                value["context_key"].as_str().unwrap().to_string()
            }
            other => panic!("expected a Data payload, got {other:?}"),
        };

        let dataframe = instance
            .on_receive(
                &Command::new(CommandKind::ContextToDataframe)
                    .with("ctx_name", context_key)
                    .with("selector", "v.id,r"),
            )
            .unwrap();
        match dataframe.payload {
            CommandPayload::Archive(Some(bytes)) => {
                let header = archive::read_dataframe_header(&bytes).unwrap();
                assert_eq!(header.num_columns, 2);
                assert_eq!(header.total_count, 3);
            }
            other => panic!("expected a non-empty archive, got {other:?}"),
        }
    }

    #[test]
    fn unload_graph_removes_it_from_the_registry() {
        let instance = solo_instance();
        instance
            .on_receive(
                &Command::new(CommandKind::CreateGraph)
                    .with("graph_name", "g0")
                    .with("graph_type", "dynamic_property")
                    .with("directed", true),
            )
            .unwrap();
        instance
            .on_receive(&Command::new(CommandKind::UnloadGraph).with("graph_name", "g0"))
            .unwrap();
        let err = instance.graph("g0").unwrap_err();
        assert_eq!(err.kind(), crate::error::ErrorKind::NotFound);
    }

    #[test]
    fn copy_graph_on_projected_variant_is_invalid_operation() {
        let instance = solo_instance();
        instance
            .on_receive(
                &Command::new(CommandKind::CreateGraph)
                    .with("graph_name", "g0")
                    .with("graph_type", "arrow_property")
                    .with("type_signature", "string:uint64:double:double"),
            )
            .unwrap();
        let project_result = instance
            .on_receive(
                &Command::new(CommandKind::ProjectToSimple)
                    .with("graph_name", "g0")
                    .with("type_signature", "string:uint64:double:double"),
            )
            .unwrap();
        let projected_key = match project_result.payload {
            CommandPayload::GraphDef(def) => def.key,
            other => panic!("expected a GraphDef payload, got {other:?}"),
        };

        let err = instance
            .on_receive(
                &Command::new(CommandKind::CopyGraph)
                    .with("graph_name", projected_key)
                    .with("copy_type", "identical"),
            )
            .unwrap_err();
        assert_eq!(err.kind(), crate::error::ErrorKind::InvalidOperation);
    }

    #[test]
    fn engine_config_round_trips_through_json() {
        let instance = solo_instance();
        let result = instance.on_receive(&Command::new(CommandKind::GetEngineConfig)).unwrap();
        match result.payload {
            CommandPayload::Data(json) => {
                let cfg: EngineConfig = serde_json::from_str(&json).unwrap();
                assert_eq!(cfg, EngineConfig::default());
            }
            other => panic!("expected a Data payload, got {other:?}"),
        }
    }
}
