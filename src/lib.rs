/// sciflow: scientific-workflow orchestration core
///
/// This library provides the workflow graph model, its versioned text format,
/// placeholder resolution and the distributed lifecycle of running workflows.

// Core configuration and setup
pub mod config;

// Error types shared by all layers
pub mod error;

// Workflow model layer - graph, nodes, values, definition storage and instance registry
pub mod workflow;

// Component installations known to this platform
pub mod component;

// Persisted document format, codec and migration
pub mod persistence;

// `${...}` placeholders in node configurations
pub mod placeholder;

// Topic-based notifications between platforms
pub mod notification;

// Lifecycle state machine and completion aggregation
pub mod runtime;

// HTTP API layer - definition management and instance control
pub mod api;

// Server setup and initialization
pub mod server;

// Re-export commonly used types for external consumers
pub use error::{Result, WorkflowError};
pub use persistence::WorkflowCodec;
pub use runtime::{WorkflowInstance, WorkflowState};
pub use server::start_server;
pub use workflow::{Connection, Node, WorkflowGraph};
