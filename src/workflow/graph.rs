/// Workflow graph: nodes, connections and structural-change events
///
/// The graph owns its nodes in an id-keyed arena plus an ordered id list, so node
/// order survives a persistence round trip. Every structural mutation is published
/// on a per-graph broadcast channel; subscribers that lag simply miss events, the
/// graph itself never blocks on them.
///
/// Endpoint mutations cascade: removing a dynamic endpoint drops every connection
/// using it, renaming one rewrites those connections. Both happen before the
/// endpoint-change event goes out.

use crate::error::{Result, WorkflowError};
use crate::workflow::component::PlatformId;
use crate::workflow::node::{EndpointDirection, Node};
use crate::workflow::value::DataType;
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::fmt;
use tokio::sync::broadcast;

/// Schema version written by this crate
pub const CURRENT_WORKFLOW_VERSION: u32 = 1;

/// Version assumed for documents that carry no version field
pub const INITIAL_WORKFLOW_VERSION: u32 = 0;

const EVENT_CHANNEL_CAPACITY: usize = 256;

/// Directed edge from one node's output to another node's input
///
/// Equality and hashing cover the four identifying fields only.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct Connection {
    /// Source node identifier
    pub source: String,
    /// Output endpoint name on the source node
    pub output: String,
    /// Target node identifier
    pub target: String,
    /// Input endpoint name on the target node
    pub input: String,
}

impl Connection {
    pub fn new(
        source: impl Into<String>,
        output: impl Into<String>,
        target: impl Into<String>,
        input: impl Into<String>,
    ) -> Self {
        Self {
            source: source.into(),
            output: output.into(),
            target: target.into(),
            input: input.into(),
        }
    }

    /// True when this connection uses the given endpoint of the given node
    fn uses(&self, node_id: &str, direction: EndpointDirection, name: &str) -> bool {
        match direction {
            EndpointDirection::Output => self.source == node_id && self.output == name,
            EndpointDirection::Input => self.target == node_id && self.input == name,
        }
    }

    fn touches(&self, node_id: &str) -> bool {
        self.source == node_id || self.target == node_id
    }
}

impl fmt::Display for Connection {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}.{} -> {}.{}", self.source, self.output, self.target, self.input)
    }
}

/// What happened to a dynamic endpoint
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum EndpointChangeKind {
    Add,
    Change {
        former_name: String,
        former_type: DataType,
    },
    Remove,
}

/// Endpoint change published after connections have been repaired
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct EndpointChange {
    pub kind: EndpointChangeKind,
    pub node_id: String,
    pub direction: EndpointDirection,
    /// Current name (the new name for renames, the removed name for removals)
    pub name: String,
    pub data_type: DataType,
}

/// Structural change of a workflow graph
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum GraphEvent {
    NodeAdded(String),
    NodeRemoved(String),
    ConnectionAdded(Connection),
    ConnectionRemoved(Connection),
    EndpointChanged(EndpointChange),
}

/// In-memory workflow definition
#[derive(Debug)]
pub struct WorkflowGraph {
    identifier: String,
    /// Display name
    pub name: Option<String>,
    /// Schema version this graph was loaded with or will be written as
    pub version: u32,
    /// Platform the workflow controller should run on
    pub target_platform: Option<PlatformId>,
    /// Free-form text attached by the author
    pub additional_information: Option<String>,
    /// Node identifiers in insertion order
    node_order: Vec<String>,
    nodes: HashMap<String, Node>,
    connections: Vec<Connection>,
    events: broadcast::Sender<GraphEvent>,
}

impl WorkflowGraph {
    /// Create an empty graph at the current schema version
    pub fn new(identifier: impl Into<String>) -> Self {
        let (events, _) = broadcast::channel(EVENT_CHANNEL_CAPACITY);
        Self {
            identifier: identifier.into(),
            name: None,
            version: CURRENT_WORKFLOW_VERSION,
            target_platform: None,
            additional_information: None,
            node_order: Vec::new(),
            nodes: HashMap::new(),
            connections: Vec::new(),
            events,
        }
    }

    pub fn identifier(&self) -> &str {
        &self.identifier
    }

    /// Receive structural-change events from now on
    pub fn subscribe(&self) -> broadcast::Receiver<GraphEvent> {
        self.events.subscribe()
    }

    fn publish(&self, event: GraphEvent) {
        // No receivers is the normal case outside of editors.
        let _ = self.events.send(event);
    }

    /// Copy of this graph with identical node identifiers and its own event channel
    pub fn duplicate(&self) -> Self {
        let mut copy = Self::new(self.identifier.clone());
        copy.name = self.name.clone();
        copy.version = self.version;
        copy.target_platform = self.target_platform.clone();
        copy.additional_information = self.additional_information.clone();
        copy.node_order = self.node_order.clone();
        copy.nodes = self.nodes.clone();
        copy.connections = self.connections.clone();
        copy
    }

    // ----- nodes -----

    /// Nodes in insertion order
    pub fn nodes(&self) -> impl Iterator<Item = &Node> {
        self.node_order.iter().filter_map(|id| self.nodes.get(id))
    }

    pub fn node_count(&self) -> usize {
        self.node_order.len()
    }

    pub fn node(&self, node_id: &str) -> Result<&Node> {
        self.nodes
            .get(node_id)
            .ok_or_else(|| WorkflowError::NodeNotFound(node_id.to_string()))
    }

    /// Mutable access for configuration, profile, metadata and layout edits
    pub fn node_mut(&mut self, node_id: &str) -> Result<&mut Node> {
        self.nodes
            .get_mut(node_id)
            .ok_or_else(|| WorkflowError::NodeNotFound(node_id.to_string()))
    }

    /// Add a node; a node with the same identifier is replaced in place
    pub fn add_node(&mut self, node: Node) {
        let id = node.identifier().to_string();
        if self.nodes.insert(id.clone(), node).is_none() {
            self.node_order.push(id.clone());
        }
        tracing::debug!("Added node {} to workflow {}", id, self.identifier);
        self.publish(GraphEvent::NodeAdded(id));
    }

    /// Remove a node together with every connection touching it
    pub fn remove_node(&mut self, node_id: &str) -> Result<Node> {
        let node = self
            .nodes
            .remove(node_id)
            .ok_or_else(|| WorkflowError::NodeNotFound(node_id.to_string()))?;
        self.node_order.retain(|id| id != node_id);

        let (dropped, kept): (Vec<_>, Vec<_>) = std::mem::take(&mut self.connections)
            .into_iter()
            .partition(|c| c.touches(node_id));
        self.connections = kept;

        for connection in dropped {
            self.publish(GraphEvent::ConnectionRemoved(connection));
        }
        self.publish(GraphEvent::NodeRemoved(node_id.to_string()));
        Ok(node)
    }

    // ----- connections -----

    pub fn connections(&self) -> &[Connection] {
        &self.connections
    }

    /// Add a connection between two member nodes
    ///
    /// Endpoint names are not checked against the nodes so graphs with placeholder
    /// components stay editable. Adding an existing connection is a no-op.
    pub fn add_connection(&mut self, connection: Connection) -> Result<()> {
        for node_id in [&connection.source, &connection.target] {
            if !self.nodes.contains_key(node_id) {
                return Err(WorkflowError::NodeNotFound(node_id.clone()));
            }
        }
        if self.connections.contains(&connection) {
            return Ok(());
        }
        self.connections.push(connection.clone());
        self.publish(GraphEvent::ConnectionAdded(connection));
        Ok(())
    }

    pub fn remove_connection(&mut self, connection: &Connection) -> Result<()> {
        let position = self
            .connections
            .iter()
            .position(|c| c == connection)
            .ok_or_else(|| WorkflowError::ConnectionNotFound(connection.to_string()))?;
        let removed = self.connections.remove(position);
        self.publish(GraphEvent::ConnectionRemoved(removed));
        Ok(())
    }

    /// Connections whose target is the given node
    pub fn incoming_connections<'a>(&'a self, node_id: &'a str) -> impl Iterator<Item = &'a Connection> {
        self.connections.iter().filter(move |c| c.target == node_id)
    }

    // ----- dynamic endpoints -----

    /// Declare a dynamic endpoint on a node
    pub fn add_dynamic_endpoint(
        &mut self,
        node_id: &str,
        direction: EndpointDirection,
        name: &str,
        data_type: DataType,
    ) -> Result<()> {
        self.node_mut(node_id)?
            .add_dynamic_endpoint(direction, name, data_type)?;

        self.publish(GraphEvent::EndpointChanged(EndpointChange {
            kind: EndpointChangeKind::Add,
            node_id: node_id.to_string(),
            direction,
            name: name.to_string(),
            data_type,
        }));
        Ok(())
    }

    /// Rename and/or retype a dynamic endpoint, rewriting connections that use it
    pub fn change_dynamic_endpoint(
        &mut self,
        node_id: &str,
        direction: EndpointDirection,
        former_name: &str,
        new_name: &str,
        data_type: DataType,
    ) -> Result<()> {
        let former_type = self
            .node_mut(node_id)?
            .change_dynamic_endpoint(direction, former_name, new_name, data_type)?;

        if former_name != new_name {
            let mut rewritten = Vec::new();
            for connection in self.connections.iter_mut() {
                if connection.uses(node_id, direction, former_name) {
                    let before = connection.clone();
                    match direction {
                        EndpointDirection::Output => connection.output = new_name.to_string(),
                        EndpointDirection::Input => connection.input = new_name.to_string(),
                    }
                    rewritten.push((before, connection.clone()));
                }
            }
            // A rewrite can collide with an existing connection; keep the first.
            let mut seen = std::collections::HashSet::new();
            self.connections.retain(|c| seen.insert(c.clone()));

            if !rewritten.is_empty() {
                tracing::debug!(
                    "Rewrote {} connection(s) for renamed {} {} -> {} on node {}",
                    rewritten.len(),
                    direction,
                    former_name,
                    new_name,
                    node_id
                );
            }
            for (before, after) in rewritten {
                self.publish(GraphEvent::ConnectionRemoved(before));
                self.publish(GraphEvent::ConnectionAdded(after));
            }
        }

        self.publish(GraphEvent::EndpointChanged(EndpointChange {
            kind: EndpointChangeKind::Change {
                former_name: former_name.to_string(),
                former_type,
            },
            node_id: node_id.to_string(),
            direction,
            name: new_name.to_string(),
            data_type,
        }));
        Ok(())
    }

    /// Remove a dynamic endpoint and every connection using it
    ///
    /// Removing an endpoint the node does not declare succeeds without changes.
    pub fn remove_dynamic_endpoint(
        &mut self,
        node_id: &str,
        direction: EndpointDirection,
        name: &str,
    ) -> Result<()> {
        let Some(data_type) = self.node_mut(node_id)?.remove_dynamic_endpoint(direction, name) else {
            return Ok(());
        };

        let (dropped, kept): (Vec<_>, Vec<_>) = std::mem::take(&mut self.connections)
            .into_iter()
            .partition(|c| c.uses(node_id, direction, name));
        self.connections = kept;

        if !dropped.is_empty() {
            tracing::debug!(
                "Dropped {} connection(s) for removed {} {} on node {}",
                dropped.len(),
                direction,
                name,
                node_id
            );
        }
        for connection in dropped {
            self.publish(GraphEvent::ConnectionRemoved(connection));
        }
        self.publish(GraphEvent::EndpointChanged(EndpointChange {
            kind: EndpointChangeKind::Remove,
            node_id: node_id.to_string(),
            direction,
            name: name.to_string(),
            data_type,
        }));
        Ok(())
    }

    /// Platforms hosting at least one node, sorted and de-duplicated
    pub fn platforms(&self) -> Vec<PlatformId> {
        let mut platforms: Vec<PlatformId> = self.nodes().filter_map(|n| n.platform().cloned()).collect();
        platforms.sort();
        platforms.dedup();
        platforms
    }
}
