/// Workflow Runtime
///
/// This module drives one workflow execution from READY to DISPOSED:
/// - Lifecycle state machine behind one lock per workflow
/// - Aggregation of component finish/failure notifications from any platform
/// - Operator commands (start, pause, resume, cancel, dispose)
/// - The component controller boundary

// Lifecycle states and their legal changes
pub mod state;

// State cell with finish bookkeeping
pub mod lifecycle;

// Notification subscribers feeding the lifecycle
pub mod aggregator;

// External component lifecycle calls
pub mod controller;

// Command surface of a running workflow
pub mod instance;

// Re-export main types
pub use controller::{ComponentController, ComponentInstanceDescriptor, LoggingComponentController};
pub use instance::WorkflowInstance;
pub use lifecycle::{Lifecycle, LifecycleEvent, Outcome, StateChange};
pub use state::WorkflowState;
