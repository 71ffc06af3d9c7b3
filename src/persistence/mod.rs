/// Workflow persistence
///
/// Versioned text format for workflow definitions:
/// - Escaped tuple encoding for typed values
/// - Serde document model
/// - Graph codec with component resolution
/// - Forward migration between schema versions

// `key:type:value` tuple encoding
pub mod tuple;

// Serde model of the persisted document
pub mod document;

// Graph <-> document conversion and file IO
pub mod codec;

// Version-step migration of older documents
pub mod migration;

pub use codec::WorkflowCodec;
pub use document::PersistedWorkflow;
pub use migration::{is_update_needed, read_workflow_version, update};
