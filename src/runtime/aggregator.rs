/// Notification subscribers that aggregate component results
///
/// Both aggregators hold a weak reference to their workflow instance so the
/// bus keeping them alive does not keep a disposed instance around.

use crate::notification::{Notification, NotificationSubscriber};
use crate::runtime::instance::WorkflowInstance;
use crate::runtime::lifecycle::{LifecycleEvent, Outcome};
use std::sync::Weak;

/// Turns the workflow FINISHED once every component reported completion
#[derive(Debug)]
pub struct FinishAggregator {
    instance: Weak<WorkflowInstance>,
}

impl FinishAggregator {
    pub fn new(instance: Weak<WorkflowInstance>) -> Self {
        Self { instance }
    }
}

impl NotificationSubscriber for FinishAggregator {
    fn notify(&self, notification: &Notification) {
        let Some(instance) = self.instance.upgrade() else {
            return;
        };
        let event = LifecycleEvent::ComponentFinished(notification.body.clone());
        if instance.lifecycle().handle(event) == Outcome::Finished {
            instance.workflow_finished();
        }
    }
}

/// Fails the whole workflow on the first component failure
#[derive(Debug)]
pub struct FailureAggregator {
    instance: Weak<WorkflowInstance>,
}

impl FailureAggregator {
    pub fn new(instance: Weak<WorkflowInstance>) -> Self {
        Self { instance }
    }
}

impl NotificationSubscriber for FailureAggregator {
    fn notify(&self, notification: &Notification) {
        let Some(instance) = self.instance.upgrade() else {
            return;
        };
        let event = LifecycleEvent::ComponentFailed(notification.body.clone());
        if instance.lifecycle().handle(event) == Outcome::Failed {
            instance.cancel_components();
        }
    }
}
