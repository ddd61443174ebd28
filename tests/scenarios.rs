//! End-to-end scenarios spanning several commands in sequence.
//!
//! Dataframe archives are only decodable through `archive`'s private
//! `parse_dataframe` helper, so scenarios built on `ContextToDataframe`
//! assert header fields (`total_count`, `num_columns`) rather than
//! individual values. Plain ndarray archives have no such helper gap --
//! their payload is a flat run of fixed-width values after a 12-byte
//! header -- so scenarios built on `ContextToNumpy` decode and assert the
//! actual per-vertex values.

use grape_instance::comm::LocalComm;
use grape_instance::graph_def::GraphType;
use grape_instance::store::MemoryStore;
use grape_instance::{
    AggregationPolicy, Cluster, Command, CommandKind, CommandPayload, EngineConfig, ErrorKind, GrapeInstance,
};
use std::sync::Arc;

fn solo() -> GrapeInstance {
    let comm = Arc::new(LocalComm::new_group(1).remove(0));
    GrapeInstance::new(0, 1, comm, MemoryStore::new(), EngineConfig::default())
}

fn run_app(instance: &GrapeInstance, app_name: &str, graph_name: &str) -> String {
    instance
        .on_receive(
            &Command::new(CommandKind::CreateApp)
                .with("app_name", app_name)
                .with("app_library_path", format!("lib/{app_name}.so")),
        )
        .unwrap();
    let run = instance
        .on_receive(&Command::new(CommandKind::RunApp).with("app_name", app_name).with("graph_name", graph_name))
        .unwrap();
    match run.payload {
        CommandPayload::Data(json) => {
            let value: serde_json::Value = serde_json::from_str(&json).unwrap();
            value["context_key"].as_str().unwrap().to_string()
        }
        other => panic!("expected a Data payload, got {other:?}"),
    }
}

/// Scenario 1: create a dynamic graph, add vertices and edges, run SSSP,
/// materialize the resulting context as an ndarray.
#[test]
fn create_query_materialize_sssp() {
    let cluster = Cluster::new(2, EngineConfig::default());
    cluster
        .dispatch(
            &Command::new(CommandKind::CreateGraph)
                .with("graph_name", "g0")
                .with("graph_type", "dynamic_property")
                .with("directed", true),
        )
        .unwrap();
    cluster
        .dispatch(
            &Command::new(CommandKind::ModifyVertices)
                .with("graph_name", "g0")
                .with("modify_type", "add")
                .with("nodes", vec!["1".to_string(), "2".to_string(), "3".to_string()]),
        )
        .unwrap();
    cluster
        .dispatch(
            &Command::new(CommandKind::ModifyEdges)
                .with("graph_name", "g0")
                .with("modify_type", "add")
                .with("edges", vec!["1 2".to_string(), "2 3".to_string()]),
        )
        .unwrap();

    cluster
        .dispatch(
            &Command::new(CommandKind::CreateApp)
                .with("app_name", "sssp")
                .with("app_library_path", "lib/sssp.so"),
        )
        .unwrap();

    let source_gid = cluster.instance(0).vertex_gid("g0", "1").unwrap().unwrap();
    let run = cluster
        .dispatch(
            &Command::new(CommandKind::RunApp)
                .with("app_name", "sssp")
                .with("graph_name", "g0")
                .with_query_args(source_gid.to_le_bytes().to_vec()),
        )
        .unwrap();
    let ctx_name = match run.payload {
        CommandPayload::Data(json) => {
            let value: serde_json::Value = serde_json::from_str(&json).unwrap();
            value["context_key"].as_str().unwrap().to_string()
        }
        other => panic!("expected a Data payload, got {other:?}"),
    };

    let gid_archive = cluster
        .dispatch(
            &Command::new(CommandKind::ContextToNumpy)
                .with("ctx_name", ctx_name.clone())
                .with("selector", "v.id"),
        )
        .unwrap();
    let dist_archive = cluster
        .dispatch(&Command::new(CommandKind::ContextToNumpy).with("ctx_name", ctx_name).with("selector", "r"))
        .unwrap();

    let gids = match gid_archive.payload {
        CommandPayload::Archive(Some(bytes)) => decode_u64_ndarray(&bytes),
        other => panic!("expected a non-empty archive, got {other:?}"),
    };
    let distances = match dist_archive.payload {
        CommandPayload::Archive(Some(bytes)) => decode_f64_ndarray(&bytes),
        other => panic!("expected a non-empty archive, got {other:?}"),
    };
    assert_eq!(gids.len(), 3);
    let by_gid: std::collections::HashMap<u64, f64> = gids.into_iter().zip(distances).collect();

    let gid_of = |oid: &str| cluster.instance(0).vertex_gid("g0", oid).unwrap().unwrap();
    assert_eq!(by_gid[&gid_of("1")], 0.0);
    assert_eq!(by_gid[&gid_of("2")], 1.0);
    assert_eq!(by_gid[&gid_of("3")], 2.0);
    assert_eq!(dist_archive.aggregation, AggregationPolicy::PickFirstNonEmpty);
}

fn decode_u64_ndarray(bytes: &[u8]) -> Vec<u64> {
    bytes[12..]
        .chunks_exact(8)
        .map(|c| u64::from_le_bytes(c.try_into().unwrap()))
        .collect()
}

fn decode_f64_ndarray(bytes: &[u8]) -> Vec<f64> {
    bytes[12..]
        .chunks_exact(8)
        .map(|c| f64::from_le_bytes(c.try_into().unwrap()))
        .collect()
}

/// Scenario 2: project an arrow-property graph to a simple graph, run
/// pagerank, then add the resulting column back as a new graph artifact.
#[test]
fn add_column_round_trip_through_project_and_pagerank() {
    let instance = solo();
    instance
        .on_receive(
            &Command::new(CommandKind::CreateGraph)
                .with("graph_name", "g0")
                .with("graph_type", "arrow_property")
                .with("type_signature", "string:uint64:double:double"),
        )
        .unwrap();
    instance
        .on_receive(
            &Command::new(CommandKind::ModifyVertices)
                .with("graph_name", "g0")
                .with("modify_type", "add")
                .with("nodes", vec!["1".to_string(), "2".to_string(), "3".to_string()]),
        )
        .unwrap();
    instance
        .on_receive(
            &Command::new(CommandKind::ModifyEdges)
                .with("graph_name", "g0")
                .with("modify_type", "add")
                .with("edges", vec!["1 2".to_string(), "2 3".to_string()]),
        )
        .unwrap();

    let projected = instance
        .on_receive(
            &Command::new(CommandKind::ProjectToSimple)
                .with("graph_name", "g0")
                .with("type_signature", "string:uint64:double:double"),
        )
        .unwrap();
    let (projected_key, projected_vineyard_id) = match projected.payload {
        CommandPayload::GraphDef(def) => (def.key, def.vineyard_id),
        other => panic!("expected a GraphDef payload, got {other:?}"),
    };
    assert!(projected_vineyard_id >= 0);

    let ctx_name = run_app(&instance, "pagerank", &projected_key);

    let add_column_result = instance
        .on_receive(
            &Command::new(CommandKind::AddColumn)
                .with("graph_name", "g0")
                .with("ctx_name", ctx_name)
                .with("selector", "r"),
        )
        .unwrap();
    let new_def = match add_column_result.payload {
        CommandPayload::GraphDef(def) => def,
        other => panic!("expected a GraphDef payload, got {other:?}"),
    };
    assert_eq!(new_def.graph_type, GraphType::ArrowProperty);
    assert!(!new_def.generate_eid);
    assert!(new_def.vineyard_id >= 0);
    assert_ne!(new_def.key, "g0");
}

/// Scenario 3: round-trip an arrow-property graph through a dynamic
/// conversion and back on a two-worker cluster, across both vertex and
/// edge counts.
#[test]
fn convert_round_trip_preserves_counts_on_a_cluster() {
    let cluster = Cluster::new(2, EngineConfig::default());
    cluster
        .dispatch(
            &Command::new(CommandKind::CreateGraph)
                .with("graph_name", "g0")
                .with("graph_type", "arrow_property")
                .with("type_signature", "string:uint64:double:double"),
        )
        .unwrap();
    cluster
        .dispatch(
            &Command::new(CommandKind::ModifyVertices)
                .with("graph_name", "g0")
                .with("modify_type", "add")
                .with(
                    "nodes",
                    vec!["1".to_string(), "2".to_string(), "3".to_string(), "4".to_string()],
                ),
        )
        .unwrap();
    cluster
        .dispatch(
            &Command::new(CommandKind::ModifyEdges)
                .with("graph_name", "g0")
                .with("modify_type", "add")
                .with("edges", vec!["1 2".to_string(), "2 3".to_string(), "3 4".to_string()]),
        )
        .unwrap();

    let to_dynamic = cluster
        .dispatch(
            &Command::new(CommandKind::TransformGraph)
                .with("graph_name", "g0")
                .with("dst_graph_type", "dynamic_property")
                .with("type_signature", "string:uint64:double:double"),
        )
        .unwrap();
    let dynamic_key = match to_dynamic.payload {
        CommandPayload::GraphDef(def) => def.key,
        other => panic!("expected a GraphDef payload, got {other:?}"),
    };

    let mid_report = cluster
        .dispatch(&Command::new(CommandKind::ReportGraph).with("graph_name", dynamic_key.clone()))
        .unwrap();
    let (mid_vertices, mid_edges): (i64, i64) = match mid_report.payload {
        CommandPayload::Data(json) => {
            let entries: Vec<serde_json::Value> = serde_json::from_str(&json).unwrap();
            (
                entries.iter().map(|e| e["vertex_count"].as_i64().unwrap()).sum(),
                entries.iter().map(|e| e["edge_count"].as_i64().unwrap()).sum(),
            )
        }
        other => panic!("expected a Data payload, got {other:?}"),
    };
    assert_eq!(mid_vertices, 4);
    assert_eq!(mid_edges, 3);

    let back_to_arrow = cluster
        .dispatch(
            &Command::new(CommandKind::TransformGraph)
                .with("graph_name", dynamic_key)
                .with("dst_graph_type", "arrow_property")
                .with("type_signature", "string:uint64:double:double"),
        )
        .unwrap();
    let arrow_key = match back_to_arrow.payload {
        CommandPayload::GraphDef(def) => def.key,
        other => panic!("expected a GraphDef payload, got {other:?}"),
    };

    let after = cluster
        .dispatch(&Command::new(CommandKind::GraphToNumpy).with("graph_name", arrow_key).with("selector", "v.id"))
        .unwrap();
    match after.payload {
        CommandPayload::Archive(Some(bytes)) => {
            let header = grape_instance::archive::read_ndarray_header(&bytes).unwrap();
            assert_eq!(header.total_count, 4);
        }
        other => panic!("expected a non-empty archive, got {other:?}"),
    }
}

/// Scenario 4: induce a subgraph on a disconnected vertex selection.
#[test]
fn induce_subgraph_on_a_disconnected_selection() {
    let instance = solo();
    instance
        .on_receive(
            &Command::new(CommandKind::CreateGraph)
                .with("graph_name", "g0")
                .with("graph_type", "dynamic_property")
                .with("directed", true),
        )
        .unwrap();
    instance
        .on_receive(
            &Command::new(CommandKind::ModifyVertices)
                .with("graph_name", "g0")
                .with("modify_type", "add")
                .with(
                    "nodes",
                    vec!["1".to_string(), "2".to_string(), "3".to_string(), "4".to_string(), "5".to_string()],
                ),
        )
        .unwrap();
    instance
        .on_receive(
            &Command::new(CommandKind::ModifyEdges)
                .with("graph_name", "g0")
                .with("modify_type", "add")
                .with(
                    "edges",
                    vec!["1 2".to_string(), "2 3".to_string(), "4 5".to_string()],
                ),
        )
        .unwrap();

    let induced = instance
        .on_receive(
            &Command::new(CommandKind::InduceSubgraph)
                .with("graph_name", "g0")
                .with("nodes", vec!["1".to_string(), "2".to_string(), "3".to_string()]),
        )
        .unwrap();
    let induced_key = match induced.payload {
        CommandPayload::GraphDef(def) => def.key,
        other => panic!("expected a GraphDef payload, got {other:?}"),
    };

    let report = instance
        .on_receive(&Command::new(CommandKind::ReportGraph).with("graph_name", induced_key))
        .unwrap();
    match report.payload {
        CommandPayload::Data(json) => {
            let entries: Vec<serde_json::Value> = serde_json::from_str(&json).unwrap();
            assert_eq!(entries[0]["vertex_count"].as_i64().unwrap(), 3);
            assert_eq!(entries[0]["edge_count"].as_i64().unwrap(), 2);
        }
        other => panic!("expected a Data payload, got {other:?}"),
    }
}

/// Scenario 5: unloading a graph drops it from every worker's registry and
/// reaches the collective barrier before worker 0 deletes the backing
/// fragment group. There is no public probe into `MemoryStore`'s internal
/// fragment-group table, so the registry-level absence (via `vertex_gid`)
/// is the observable half of this invariant.
#[test]
fn unload_with_a_vineyard_id_clears_every_workers_local_shard() {
    let cluster = Cluster::new(2, EngineConfig::default());
    let create = cluster
        .dispatch(
            &Command::new(CommandKind::CreateGraph)
                .with("graph_name", "g0")
                .with("graph_type", "arrow_property")
                .with("type_signature", "string:uint64:double:double"),
        )
        .unwrap();
    match create.payload {
        CommandPayload::GraphDef(def) => assert_eq!(def.vineyard_id, -1),
        other => panic!("expected a GraphDef payload, got {other:?}"),
    }

    let projected = cluster
        .dispatch(
            &Command::new(CommandKind::ProjectToSimple)
                .with("graph_name", "g0")
                .with("type_signature", "string:uint64:double:double"),
        )
        .unwrap();
    let (dst_key, vineyard_id) = match projected.payload {
        CommandPayload::GraphDef(def) => (def.key, def.vineyard_id),
        other => panic!("expected a GraphDef payload, got {other:?}"),
    };
    assert!(vineyard_id >= 0);

    cluster
        .dispatch(
            &Command::new(CommandKind::UnloadGraph)
                .with("graph_name", dst_key.clone())
                .with("vineyard_id", vineyard_id),
        )
        .unwrap();

    for fid in 0..2 {
        let err = cluster.instance(fid).vertex_gid(&dst_key, "missing").unwrap_err();
        assert_eq!(err.kind(), ErrorKind::NotFound);
    }

    // Deleting an already-deleted fragment group is tolerated, not fatal
    // (see `handle_unload_graph`'s `NotFound` pass-through) -- but the
    // graph key itself is gone, so re-issuing the same unload now fails at
    // the registry lookup instead.
    let err = cluster
        .dispatch(&Command::new(CommandKind::UnloadGraph).with("graph_name", dst_key).with("vineyard_id", vineyard_id))
        .unwrap_err();
    assert_eq!(err.kind(), ErrorKind::NotFound);
}

/// Scenario 6: error propagation across workers with asymmetric state.
/// Worker 0 has `g0` registered and worker 1 does not; a read-only,
/// cluster-wide command therefore fails on worker 1 without ever mutating
/// worker 0. `Cluster::dispatch` reports the first failing worker's error
/// and the command as a whole never partially succeeds.
#[test]
fn error_on_one_worker_fails_the_whole_command_without_mutating_the_rest() {
    let cluster = Cluster::new(2, EngineConfig::default());
    cluster
        .instance(0)
        .on_receive(
            &Command::new(CommandKind::CreateGraph)
                .with("graph_name", "g0")
                .with("graph_type", "dynamic_property")
                .with("directed", true),
        )
        .unwrap();
    cluster
        .instance(0)
        .on_receive(
            &Command::new(CommandKind::ModifyVertices)
                .with("graph_name", "g0")
                .with("modify_type", "add")
                .with("nodes", vec!["1".to_string()]),
        )
        .unwrap();

    let err = cluster
        .dispatch(&Command::new(CommandKind::ReportGraph).with("graph_name", "g0"))
        .unwrap_err();
    assert_eq!(err.kind(), ErrorKind::NotFound);

    // Worker 0's registry state is untouched: the vertex added before the
    // cluster-wide command is still resolvable.
    assert!(cluster.instance(0).vertex_gid("g0", "1").unwrap().is_some());
}
