/// Petgraph view of a workflow graph
///
/// Converts the node/connection graph into a petgraph `DiGraph` so the runtime can
/// start components in dependency order. Scientific workflows may contain loops
/// (optimizers feeding back into solvers), so a cycle is not an error here: the
/// order falls back to declaration order.

use crate::workflow::graph::WorkflowGraph;
use petgraph::algo::toposort;
use petgraph::graph::{DiGraph, NodeIndex};
use std::collections::HashMap;

/// Dependency structure of a workflow
#[derive(Debug)]
pub struct Topology {
    /// Node weights are node identifiers; parallel connections collapse into one edge
    graph: DiGraph<String, ()>,
    /// Node identifiers in declaration order
    declaration_order: Vec<String>,
}

impl Topology {
    /// Build the dependency graph from a workflow definition
    pub fn build(workflow: &WorkflowGraph) -> Self {
        tracing::debug!(
            "📊 Building topology for '{}' with {} nodes and {} connections",
            workflow.identifier(),
            workflow.node_count(),
            workflow.connections().len()
        );

        let mut graph = DiGraph::new();
        let mut node_id_to_index: HashMap<String, NodeIndex> = HashMap::new();
        let mut declaration_order = Vec::new();

        for node in workflow.nodes() {
            let index = graph.add_node(node.identifier().to_string());
            node_id_to_index.insert(node.identifier().to_string(), index);
            declaration_order.push(node.identifier().to_string());
        }

        for connection in workflow.connections() {
            // Connections always reference member nodes.
            if let (Some(&from), Some(&to)) = (
                node_id_to_index.get(&connection.source),
                node_id_to_index.get(&connection.target),
            ) {
                graph.update_edge(from, to, ());
            }
        }

        Self {
            graph,
            declaration_order,
        }
    }

    /// Node identifiers in dependency order, or declaration order for cyclic graphs
    pub fn execution_order(&self) -> Vec<String> {
        match toposort(&self.graph, None) {
            Ok(order) => order.into_iter().map(|idx| self.graph[idx].clone()).collect(),
            Err(cycle) => {
                tracing::debug!(
                    "🔄 Workflow contains a cycle through '{}', using declaration order",
                    self.graph[cycle.node_id()]
                );
                self.declaration_order.clone()
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::workflow::component::ComponentDescriptor;
    use crate::workflow::graph::Connection;
    use crate::workflow::node::Node;

    fn graph_with(names: &[&str]) -> (WorkflowGraph, Vec<String>) {
        let mut graph = WorkflowGraph::new("wf");
        let mut ids = Vec::new();
        for name in names {
            let node = Node::new(*name, ComponentDescriptor::new("t_T", "T", "1"));
            ids.push(node.identifier().to_string());
            graph.add_node(node);
        }
        (graph, ids)
    }

    #[test]
    fn chain_runs_upstream_first() {
        let (mut graph, ids) = graph_with(&["c", "b", "a"]);
        // a -> b -> c, declared in reverse
        graph.add_connection(Connection::new(&ids[2], "o", &ids[1], "i")).unwrap();
        graph.add_connection(Connection::new(&ids[1], "o", &ids[0], "i")).unwrap();

        let topology = Topology::build(&graph);
        assert_eq!(topology.execution_order(), vec![ids[2].clone(), ids[1].clone(), ids[0].clone()]);
    }

    #[test]
    fn loops_fall_back_to_declaration_order() {
        let (mut graph, ids) = graph_with(&["optimizer", "solver"]);
        graph.add_connection(Connection::new(&ids[0], "x", &ids[1], "x")).unwrap();
        graph.add_connection(Connection::new(&ids[1], "f", &ids[0], "f")).unwrap();

        let topology = Topology::build(&graph);
        assert_eq!(topology.execution_order(), ids);
    }
}
