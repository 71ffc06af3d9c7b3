//! Cascading connection repair on dynamic endpoint changes.

use sciflow::workflow::{
    ComponentDescriptor, Connection, DataType, EndpointChangeKind, EndpointDirection, GraphEvent, Node,
    WorkflowGraph,
};

fn two_nodes() -> (WorkflowGraph, String, String) {
    let mut graph = WorkflowGraph::new("wf");
    let a = Node::new("A", ComponentDescriptor::new("org.example.Script_Script", "Script", "1"));
    let b = Node::new("B", ComponentDescriptor::new("org.example.Script_Script", "Script", "1"));
    let (a_id, b_id) = (a.identifier().to_string(), b.identifier().to_string());
    graph.add_node(a);
    graph.add_node(b);
    graph
        .add_dynamic_endpoint(&a_id, EndpointDirection::Output, "out", DataType::Double)
        .unwrap();
    graph
        .add_dynamic_endpoint(&b_id, EndpointDirection::Input, "in", DataType::Double)
        .unwrap();
    graph.add_connection(Connection::new(&a_id, "out", &b_id, "in")).unwrap();
    (graph, a_id, b_id)
}

#[test]
fn removing_an_output_removes_its_connections() {
    let (mut graph, a, b) = two_nodes();

    graph.remove_dynamic_endpoint(&a, EndpointDirection::Output, "out").unwrap();

    assert!(!graph.connections().contains(&Connection::new(&a, "out", &b, "in")));
    assert!(graph.connections().is_empty());
    // Removing it again is a no-op
    graph.remove_dynamic_endpoint(&a, EndpointDirection::Output, "out").unwrap();
}

#[test]
fn renaming_an_output_rewrites_its_connections() {
    let (mut graph, a, b) = two_nodes();

    graph
        .change_dynamic_endpoint(&a, EndpointDirection::Output, "out", "out2", DataType::Double)
        .unwrap();

    assert_eq!(graph.connections().len(), 1);
    assert_eq!(graph.connections()[0], Connection::new(&a, "out2", &b, "in"));
    assert!(graph.node(&a).unwrap().has_endpoint(EndpointDirection::Output, "out2"));
}

#[test]
fn validation_rejects_collisions_without_failing() {
    let (graph, a, _) = two_nodes();
    let node = graph.node(&a).unwrap();

    assert!(!node.validate_output_name("out"));
    assert!(!node.validate_output_name(""));
    assert!(node.validate_output_name("lift"));
    assert!(node.validate_output_type("java.lang.Double"));
    assert!(!node.validate_output_type("java.util.Date"));
}

#[test]
fn unknown_node_is_reported_by_identifier() {
    let (mut graph, _, _) = two_nodes();
    let err = graph.node("ghost").unwrap_err();
    assert_eq!(err.to_string(), "no node with identifier ghost");
    assert!(graph
        .add_dynamic_endpoint("ghost", EndpointDirection::Input, "x", DataType::String)
        .is_err());
}

#[tokio::test]
async fn endpoint_events_follow_connection_repair() {
    let (mut graph, a, b) = two_nodes();
    let mut events = graph.subscribe();

    graph.remove_dynamic_endpoint(&b, EndpointDirection::Input, "in").unwrap();

    assert_eq!(
        events.recv().await.unwrap(),
        GraphEvent::ConnectionRemoved(Connection::new(&a, "out", &b, "in"))
    );
    match events.recv().await.unwrap() {
        GraphEvent::EndpointChanged(change) => {
            assert_eq!(change.kind, EndpointChangeKind::Remove);
            assert_eq!(change.name, "in");
        }
        other => panic!("unexpected event {other:?}"),
    }
}
