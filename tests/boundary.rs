//! Boundary behaviors a worker must reject with the right error category.

use grape_instance::comm::LocalComm;
use grape_instance::context::{Context, ContextKind};
use grape_instance::graph_def::{GraphDef, GraphType, SchemaDef};
use grape_instance::store::MemoryStore;
use grape_instance::wrapper::{FragmentWrapper, LabeledPropertyFragmentWrapper};
use grape_instance::{AttrValue, Command, CommandKind, EngineConfig, ErrorKind, GrapeInstance};
use std::sync::Arc;

fn solo() -> GrapeInstance {
    let comm = Arc::new(LocalComm::new_group(1).remove(0));
    GrapeInstance::new(0, 1, comm, MemoryStore::new(), EngineConfig::default())
}

#[test]
fn project_with_an_empty_vertex_selection_is_invalid_value() {
    let instance = solo();
    instance
        .on_receive(
            &Command::new(CommandKind::CreateGraph)
                .with("graph_name", "g0")
                .with("graph_type", "arrow_property")
                .with("type_signature", "string:uint64:double:double"),
        )
        .unwrap();

    let err = instance
        .on_receive(
            &Command::new(CommandKind::ProjectGraph)
                .with("graph_name", "g0")
                .with("vertex_collections", AttrValue::NestedStrList(Vec::new()))
                .with("edge_collections", AttrValue::NestedStrList(Vec::new())),
        )
        .unwrap_err();
    assert_eq!(err.kind(), ErrorKind::InvalidValue);
}

fn def(graph_type: GraphType) -> GraphDef {
    GraphDef {
        key: "g0".to_string(),
        graph_type,
        directed: true,
        vineyard_id: -1,
        schema_def: SchemaDef::new("string", "uint64", "()", "()", "{}"),
        schema_path: None,
        generate_eid: false,
    }
}

fn two_label_fragment() -> grape_instance::fragment::Fragment {
    use grape_instance::fragment::LabelMeta;
    use grape_instance::vertex_map::VertexMap;

    let vm = Arc::new(VertexMap::empty(1));
    let mut frag = grape_instance::fragment::Fragment::new_empty(0, 1, true, vm);
    frag.vertex_labels.push(LabelMeta { id: 0, name: "person".to_string() });
    frag.vertex_labels.push(LabelMeta { id: 1, name: "company".to_string() });
    frag.register_inner_vertex(0, 0);
    frag.register_inner_vertex(0, 1);
    frag
}

#[test]
fn add_column_with_a_fragment_count_mismatch_is_illegal_state() {
    let wrapper = LabeledPropertyFragmentWrapper {
        graph_def: def(GraphType::ArrowProperty),
        fragment: two_label_fragment(),
    };
    let mismatched_vm = Arc::new(grape_instance::vertex_map::VertexMap::empty(2));
    let ctx = Context {
        producing_wrapper: "g0".to_string(),
        vertex_map: mismatched_vm,
        label_id: None,
        kind: ContextKind::VertexData {
            gids: vec![0, 1],
            values: grape_instance::archive::ColumnData::Float64(vec![0.0, 1.0]),
        },
    };
    let store = MemoryStore::new();
    let err = wrapper.add_column(store.as_ref(), "g1", &ctx, 0, None).unwrap_err();
    assert_eq!(err.kind(), ErrorKind::IllegalState);
    assert!(err.to_string().contains("Fragment number mismatch"));
}

#[test]
fn add_column_with_an_unknown_label_id_is_illegal_state() {
    let wrapper = LabeledPropertyFragmentWrapper {
        graph_def: def(GraphType::ArrowProperty),
        fragment: two_label_fragment(),
    };
    let ctx = Context {
        producing_wrapper: "g0".to_string(),
        vertex_map: Arc::clone(&wrapper.fragment.vertex_map),
        label_id: None,
        kind: ContextKind::VertexData {
            gids: vec![0, 1],
            values: grape_instance::archive::ColumnData::Float64(vec![0.0, 1.0]),
        },
    };
    let store = MemoryStore::new();
    let err = wrapper.add_column(store.as_ref(), "g1", &ctx, 7, None).unwrap_err();
    assert_eq!(err.kind(), ErrorKind::IllegalState);
    assert!(err.to_string().contains("Label id 7 is invalid"));
}

#[test]
fn project_and_add_column_and_add_labels_on_a_dynamic_graph_are_invalid_operation() {
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
                .with("nodes", vec!["1".to_string(), "2".to_string()]),
        )
        .unwrap();

    let project_err = instance
        .on_receive(
            &Command::new(CommandKind::ProjectGraph)
                .with("graph_name", "g0")
                .with("vertex_collections", AttrValue::NestedStrList(Vec::new()))
                .with("edge_collections", AttrValue::NestedStrList(Vec::new())),
        )
        .unwrap_err();
    assert_eq!(project_err.kind(), ErrorKind::InvalidOperation);

    let add_labels_err = instance
        .on_receive(
            &Command::new(CommandKind::AddLabels)
                .with("graph_name", "g0")
                .with("type_signature", "string:uint64:double:double")
                .with("labels", vec!["extra".to_string()]),
        )
        .unwrap_err();
    assert_eq!(add_labels_err.kind(), ErrorKind::InvalidOperation);

    instance
        .on_receive(
            &Command::new(CommandKind::CreateApp)
                .with("app_name", "pagerank")
                .with("app_library_path", "lib/pagerank.so"),
        )
        .unwrap();
    let run = instance
        .on_receive(
            &Command::new(CommandKind::RunApp)
                .with("app_name", "pagerank")
                .with("graph_name", "g0"),
        )
        .unwrap();
    let ctx_name = match run.payload {
        grape_instance::CommandPayload::Data(json) => {
            let value: serde_json::Value = serde_json::from_str(&json).unwrap();
            value["context_key"].as_str().unwrap().to_string()
        }
        other => panic!("expected a Data payload, got {other:?}"),
    };
    let add_column_err = instance
        .on_receive(
            &Command::new(CommandKind::AddColumn)
                .with("graph_name", "g0")
                .with("ctx_name", ctx_name)
                .with("selector", "r"),
        )
        .unwrap_err();
    assert_eq!(add_column_err.kind(), ErrorKind::InvalidOperation);
}

#[test]
fn structural_ops_on_an_arrow_property_graph_are_invalid_operation() {
    let instance = solo();
    instance
        .on_receive(
            &Command::new(CommandKind::CreateGraph)
                .with("graph_name", "g0")
                .with("graph_type", "arrow_property")
                .with("type_signature", "string:uint64:double:double"),
        )
        .unwrap();

    let to_directed_err = instance
        .on_receive(&Command::new(CommandKind::ToDirected).with("graph_name", "g0"))
        .unwrap_err();
    assert_eq!(to_directed_err.kind(), ErrorKind::InvalidOperation);

    let to_undirected_err = instance
        .on_receive(&Command::new(CommandKind::ToUndirected).with("graph_name", "g0"))
        .unwrap_err();
    assert_eq!(to_undirected_err.kind(), ErrorKind::InvalidOperation);

    let view_err = instance
        .on_receive(&Command::new(CommandKind::ViewGraph).with("graph_name", "g0").with("view_type", "reversed"))
        .unwrap_err();
    assert_eq!(view_err.kind(), ErrorKind::InvalidOperation);

    // CopyGraph, by contrast, is supported on this variant.
    instance
        .on_receive(&Command::new(CommandKind::CopyGraph).with("graph_name", "g0").with("copy_type", "identical"))
        .unwrap();
}
