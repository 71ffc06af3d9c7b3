/// Notification transport
///
/// Components running on other platforms report their lifecycle through topic
/// based notifications. The runtime only depends on the `NotificationService`
/// trait; `LocalNotificationBus` is the in-process implementation used by the
/// server and by tests.

// Topic-prefix pub/sub bus
pub mod bus;

pub use bus::{
    LocalNotificationBus, Notification, NotificationService, NotificationSubscriber,
};

/// Prefix of per-workflow component finished notifications
pub const FINISHED_STATE_TOPIC_PREFIX: &str = "component.state.finished:";

/// Prefix of per-workflow component failure notifications
pub const FAILED_STATE_TOPIC_PREFIX: &str = "component.state.failed:";

/// Prefix of per-workflow state change notifications
pub const WORKFLOW_STATE_TOPIC_PREFIX: &str = "workflow.state:";

/// Sent once per workflow after it reached DISPOSED; the body is the workflow id
pub const WORKFLOW_DISPOSED_TOPIC: &str = "workflow.state.disposed";

pub fn finished_topic(workflow_id: &str) -> String {
    format!("{FINISHED_STATE_TOPIC_PREFIX}{workflow_id}")
}

pub fn failed_topic(workflow_id: &str) -> String {
    format!("{FAILED_STATE_TOPIC_PREFIX}{workflow_id}")
}

pub fn workflow_state_topic(workflow_id: &str) -> String {
    format!("{WORKFLOW_STATE_TOPIC_PREFIX}{workflow_id}")
}
