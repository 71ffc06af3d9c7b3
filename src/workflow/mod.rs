/// Workflow Model Layer
///
/// This module holds the in-memory workflow model and its stores:
/// - Typed configuration values and component descriptors
/// - Nodes with profiles, dynamic endpoints and endpoint metadata
/// - The workflow graph with cascading connection repair
/// - SQLite persistence of workflow documents with sqlx
/// - Lock-free registry of running instances using ArcSwap

// Typed values and the wire type-name registry
pub mod value;

// Component type descriptors and platforms
pub mod component;

// Nodes, profiles and endpoints
pub mod node;

// Graph structure and change events
pub mod graph;

// Dependency order over a graph
pub mod topology;

// Running workflow instances
pub mod registry;

// SQLite persistence for workflow documents
pub mod storage;

// Re-export commonly used types
pub use component::{ComponentDescriptor, PlatformId};
pub use graph::{Connection, EndpointChange, EndpointChangeKind, GraphEvent, WorkflowGraph};
pub use node::{EndpointDirection, Node};
pub use registry::{WorkflowInformation, WorkflowRegistry};
pub use storage::WorkflowStorage;
pub use value::{ConfigValue, DataType};
