//! Persistence round trip, migration and component resolution through the public API.

use sciflow::component::LocalComponentRegistry;
use sciflow::persistence::migration::{LEGACY_PYTHON_COMPONENT, PYTHON_INSTALLATION_KEY};
use sciflow::persistence::{is_update_needed, read_workflow_version, update, PersistedWorkflow, WorkflowCodec};
use sciflow::workflow::{
    ComponentDescriptor, ConfigValue, Connection, DataType, EndpointDirection, Node, PlatformId,
    WorkflowGraph,
};
use std::sync::Arc;

const OPTIMIZER: &str = "org.example.optimizer.Optimizer_Optimizer";
const SOLVER: &str = "org.example.solver.Solver_Solver";

fn registry() -> LocalComponentRegistry {
    let registry = LocalComponentRegistry::new();
    registry.register(
        ComponentDescriptor::new(OPTIMIZER, "Optimizer", "3.1")
            .with_platform(PlatformId::new("local"))
            .with_output("design", DataType::Double)
            .with_configuration("algorithm", DataType::String, Some("nsga2".into()))
            .with_configuration("maxIterations", DataType::Integer, Some(ConfigValue::Integer(100)))
            .with_configuration("seed", DataType::Long, None),
    );
    registry.register(
        ComponentDescriptor::new(SOLVER, "Solver", "1.0")
            .with_platform(PlatformId::new("local"))
            .with_input("design", DataType::Double)
            .with_configuration("tolerance", DataType::Double, Some(ConfigValue::Double(1e-6))),
    );
    registry
}

fn codec() -> WorkflowCodec {
    WorkflowCodec::new(Arc::new(registry()), PlatformId::new("local"))
}

fn descriptor(identifier: &str) -> ComponentDescriptor {
    use sciflow::component::ComponentRegistry;
    registry().installations(identifier, None).remove(0)
}

fn sample_graph() -> (WorkflowGraph, String, String) {
    let mut graph = WorkflowGraph::new("wf-roundtrip");
    graph.name = Some("Wing optimization".to_string());
    graph.additional_information = Some("line one: with colon".to_string());

    let mut optimizer = Node::new("Optimizer", descriptor(OPTIMIZER));
    optimizer.set_location(120, -40);
    optimizer.set_configuration_value("algorithm", Some(ConfigValue::from("mo:ea")));
    optimizer.set_configuration_value("weight", Some(ConfigValue::Double(0.5)));
    optimizer.set_configuration_value("seed", None);
    optimizer.add_profile("coarse", Some("default")).unwrap();
    optimizer.set_current_profile("coarse").unwrap();
    optimizer.set_configuration_value("maxIterations", Some(ConfigValue::Integer(10)));
    optimizer.set_endpoint_metadata(EndpointDirection::Output, "design", "lowerBound", ConfigValue::Double(-1.0));
    optimizer.set_endpoint_metadata(EndpointDirection::Output, "design", "goal", ConfigValue::from("minimize"));

    let solver = Node::new("Solver", descriptor(SOLVER));
    let optimizer_id = optimizer.identifier().to_string();
    let solver_id = solver.identifier().to_string();
    graph.add_node(optimizer);
    graph.add_node(solver);

    graph
        .add_dynamic_endpoint(&optimizer_id, EndpointDirection::Input, "objective", DataType::Double)
        .unwrap();
    graph
        .add_dynamic_endpoint(&solver_id, EndpointDirection::Output, "drag", DataType::Double)
        .unwrap();
    graph
        .add_connection(Connection::new(&optimizer_id, "design", &solver_id, "design"))
        .unwrap();
    graph
        .add_connection(Connection::new(&solver_id, "drag", &optimizer_id, "objective"))
        .unwrap();

    (graph, optimizer_id, solver_id)
}

#[test]
fn round_trip_preserves_structure_and_values() {
    let codec = codec();
    let (graph, optimizer_id, solver_id) = sample_graph();

    let text = codec.serialize(&graph).unwrap();
    let parsed = codec.parse(&text).unwrap();

    assert_eq!(parsed.identifier(), "wf-roundtrip");
    assert_eq!(parsed.additional_information, graph.additional_information);
    let ids: Vec<&str> = parsed.nodes().map(|n| n.identifier()).collect();
    assert_eq!(ids, vec![optimizer_id.as_str(), solver_id.as_str()]);

    let optimizer = parsed.node(&optimizer_id).unwrap();
    let original = graph.node(&optimizer_id).unwrap();
    assert_eq!(optimizer.default_configuration(), original.default_configuration());
    assert_eq!(optimizer.configuration("coarse"), original.configuration("coarse"));
    assert_eq!(optimizer.current_profile_id(), "coarse");
    assert_eq!((optimizer.x, optimizer.y), (120, -40));
    assert_eq!(
        optimizer.dynamic_endpoints(EndpointDirection::Input),
        original.dynamic_endpoints(EndpointDirection::Input)
    );
    assert_eq!(
        optimizer.endpoint_metadata(EndpointDirection::Output, "design"),
        original.endpoint_metadata(EndpointDirection::Output, "design")
    );
    assert_eq!(parsed.connections(), graph.connections());

    // Unchanged graphs reproduce the same document
    assert_eq!(codec.serialize(&parsed).unwrap(), text);
}

#[test]
fn backslash_terminated_names_survive_round_trip() {
    let codec = codec();
    let (mut graph, optimizer_id, solver_id) = sample_graph();
    graph
        .add_dynamic_endpoint(&solver_id, EndpointDirection::Output, r"out\", DataType::Double)
        .unwrap();
    graph
        .add_connection(Connection::new(&solver_id, r"out\", &optimizer_id, "objective"))
        .unwrap();
    let solver = graph.node_mut(&solver_id).unwrap();
    solver.set_configuration_value(r"dir\", Some(ConfigValue::from(r"C:\runs\")));
    solver.set_endpoint_metadata(EndpointDirection::Output, r"out\", r"unit\", ConfigValue::from("N"));

    let text = codec.serialize(&graph).unwrap();
    let parsed = codec.parse(&text).unwrap();

    let solver = parsed.node(&solver_id).unwrap();
    assert_eq!(
        solver.dynamic_endpoints(EndpointDirection::Output),
        graph.node(&solver_id).unwrap().dynamic_endpoints(EndpointDirection::Output)
    );
    assert_eq!(
        solver.configuration_value(r"dir\"),
        Some(&ConfigValue::from(r"C:\runs\"))
    );
    assert_eq!(
        solver.endpoint_metadata(EndpointDirection::Output, r"out\"),
        graph.node(&solver_id).unwrap().endpoint_metadata(EndpointDirection::Output, r"out\")
    );
    assert_eq!(parsed.connections(), graph.connections());
    assert_eq!(codec.serialize(&parsed).unwrap(), text);
}

#[test]
fn unset_values_keep_their_type() {
    let codec = codec();
    let (graph, optimizer_id, _) = sample_graph();
    let text = codec.serialize(&graph).unwrap();

    assert!(text.contains("\"seed:java.lang.Long:\""));
    assert!(text.contains("\"algorithm:java.lang.String:mo\\\\:ea\""));
    let parsed = codec.parse(&text).unwrap();
    let node = parsed.node(&optimizer_id).unwrap();
    assert_eq!(node.default_configuration().get("seed"), Some(&None));
}

#[test]
fn missing_identifier_is_a_parse_error_with_line() {
    let text = "{\n  \"workflowVersion\": \"1\",\n  \"nodes\": []\n}";
    let err = codec().parse(text).unwrap_err();
    assert!(err.line().is_some());
}

#[test]
fn unknown_component_loads_as_placeholder() {
    let text = r#"{
  "identifier": "wf-unknown",
  "workflowVersion": "1",
  "nodes": [
    {
      "identifier": "n-1",
      "name": "Mystery",
      "location": "5:5",
      "component": { "identifier": "com.vendor.tools.CfdRunner_CFD Runner", "version": "7" },
      "configuration": [ "mesh:java.lang.String:fine" ]
    }
  ]
}"#;
    let graph = codec().parse(text).unwrap();
    let node = graph.node("n-1").unwrap();
    assert!(node.component().placeholder);
    assert_eq!(node.component().name, "CFD Runner");
    assert_eq!(node.configuration_value("mesh"), Some(&ConfigValue::from("fine")));
}

#[test]
fn current_documents_need_no_update() {
    let (graph, _, _) = sample_graph();
    let codec = codec();
    let document = codec.to_document(&graph);

    assert!(!is_update_needed(&document, 1));
    let updated = update(document.clone(), 1);
    assert_eq!(updated, document);
    assert_eq!(updated.version(), 1);
}

#[test]
fn legacy_python_nodes_gain_installation_setting() {
    let text = format!(
        r#"{{
  "identifier": "wf-legacy",
  "nodes": [
    {{
      "identifier": "py",
      "name": "Script",
      "location": "0:0",
      "component": {{ "identifier": "{LEGACY_PYTHON_COMPONENT}" }},
      "configuration": [ "script:java.lang.String:print(1)" ]
    }}
  ]
}}"#
    );
    assert_eq!(read_workflow_version(&text).unwrap(), 0);
    let document = PersistedWorkflow::from_text(&text).unwrap();
    assert!(is_update_needed(&document, 0));

    let graph = codec().read_with_migration(&text).unwrap();
    assert_eq!(graph.version, 1);
    let node = graph.node("py").unwrap();
    assert_eq!(
        node.configuration_value(PYTHON_INSTALLATION_KEY),
        Some(&ConfigValue::from("${pathPlaceholder}"))
    );
    assert_eq!(node.configuration_value("script"), Some(&ConfigValue::from("print(1)")));
}

#[tokio::test]
async fn file_round_trip() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("wing.wf");
    let codec = codec();
    let (graph, _, _) = sample_graph();

    codec.write_to_path(&graph, &path).await.unwrap();
    let loaded = codec.read_from_path(&path).await.unwrap();
    assert_eq!(loaded.node_count(), 2);
    assert_eq!(loaded.connections().len(), 2);

    let missing = codec.read_from_path(dir.path().join("missing.wf")).await;
    assert!(matches!(missing, Err(sciflow::WorkflowError::Io(_))));
}
