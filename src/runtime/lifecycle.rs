/// Per-workflow lifecycle cell
///
/// The workflow state, the set of component instances and the set of
/// components that reported completion live behind one mutex. Every state read
/// and write, whether triggered by an operator command or by a component
/// notification, goes through this lock, so a failure and a finish notification
/// racing for the same workflow are applied one after the other.
///
/// State changes are pushed into a `watch` channel while the lock is held and
/// published on the notification bus after it is released. Bus deliveries of
/// racing changes may therefore arrive out of order; each carries the revision
/// it was made at, and subscribers drop anything older than what they have seen.

use crate::notification::{workflow_state_topic, NotificationService, WORKFLOW_DISPOSED_TOPIC};
use crate::runtime::state::WorkflowState;
use serde::{Deserialize, Serialize};
use std::collections::HashSet;
use std::sync::{Arc, Mutex, MutexGuard};
use tokio::sync::watch;

/// Component-level input to the lifecycle
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum LifecycleEvent {
    /// Component instance reported FINISHED
    ComponentFinished(String),
    /// Component instance reported a failure
    ComponentFailed(String),
}

/// Result of handling a `LifecycleEvent`
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Outcome {
    /// No effect on the workflow
    Ignored,
    /// Completion recorded, workflow still waiting for others
    Recorded,
    /// Last outstanding component finished; workflow is FINISHED
    Finished,
    /// Workflow moved to FAILED; components still need canceling
    Failed,
}

/// Body of a `workflow.state:<wf>` notification
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct StateChange {
    pub state: WorkflowState,
    /// Increases by one with every change of this workflow
    pub revision: u64,
}

impl StateChange {
    pub fn parse(body: &str) -> Option<Self> {
        serde_json::from_str(body).ok()
    }
}

#[derive(Debug)]
struct Cell {
    state: WorkflowState,
    revision: u64,
    components: HashSet<String>,
    finished: HashSet<String>,
}

/// Lifecycle state of one workflow plus its finish bookkeeping
pub struct Lifecycle {
    workflow_id: String,
    cell: Mutex<Cell>,
    state_tx: watch::Sender<WorkflowState>,
    notifications: Arc<dyn NotificationService>,
}

impl Lifecycle {
    /// Create the cell in `initial` and publish that state
    pub fn new(
        workflow_id: impl Into<String>,
        initial: WorkflowState,
        components: impl IntoIterator<Item = String>,
        notifications: Arc<dyn NotificationService>,
    ) -> Self {
        let (state_tx, _) = watch::channel(initial);
        let lifecycle = Self {
            workflow_id: workflow_id.into(),
            cell: Mutex::new(Cell {
                state: initial,
                revision: 0,
                components: components.into_iter().collect(),
                finished: HashSet::new(),
            }),
            state_tx,
            notifications,
        };
        lifecycle.publish(&[StateChange {
            state: initial,
            revision: 0,
        }]);
        lifecycle
    }

    pub fn state(&self) -> WorkflowState {
        self.lock().state
    }

    pub fn subscribe(&self) -> watch::Receiver<WorkflowState> {
        self.state_tx.subscribe()
    }

    /// Number of distinct components that reported completion
    pub fn finished_count(&self) -> usize {
        self.lock().finished.len()
    }

    pub fn component_count(&self) -> usize {
        self.lock().components.len()
    }

    /// Move to `next` only if the current state is one of `from`
    ///
    /// Check and update happen under the lock; this is how commands evaluate
    /// their precondition at the moment they are received.
    pub fn transition(&self, from: &[WorkflowState], next: WorkflowState) -> bool {
        let changed = {
            let mut cell = self.lock();
            if !from.contains(&cell.state) || !cell.state.can_become(next) {
                return false;
            }
            self.change(&mut cell, next)
        };
        self.publish(&[changed]);
        true
    }

    /// Move to `next` unless the current state forbids it
    pub fn set_state(&self, next: WorkflowState) -> bool {
        let changed = {
            let mut cell = self.lock();
            if !cell.state.can_become(next) {
                tracing::debug!(
                    "Workflow {} stays {}, ignoring change to {}",
                    self.workflow_id,
                    cell.state,
                    next
                );
                return false;
            }
            self.change(&mut cell, next)
        };
        self.publish(&[changed]);
        true
    }

    /// Apply a component notification
    pub fn handle(&self, event: LifecycleEvent) -> Outcome {
        let mut changes = Vec::new();
        let outcome = {
            let mut cell = self.lock();
            match event {
                LifecycleEvent::ComponentFailed(component) => {
                    self.component_failed(&mut cell, &component, &mut changes)
                }
                LifecycleEvent::ComponentFinished(component) => {
                    self.component_finished(&mut cell, component, &mut changes)
                }
            }
        };
        self.publish(&changes);
        outcome
    }

    fn component_failed(&self, cell: &mut Cell, component: &str, changes: &mut Vec<StateChange>) -> Outcome {
        if !matches!(
            cell.state,
            WorkflowState::Ready | WorkflowState::Running | WorkflowState::Paused
        ) {
            tracing::debug!(
                "Ignoring failure of {} in workflow {} ({})",
                component,
                self.workflow_id,
                cell.state
            );
            return Outcome::Ignored;
        }

        tracing::error!(
            "❌ Component {} failed, workflow {} will be canceled",
            component,
            self.workflow_id
        );
        for next in [WorkflowState::Canceling, WorkflowState::Failed] {
            changes.push(self.change(cell, next));
        }
        Outcome::Failed
    }

    fn component_finished(&self, cell: &mut Cell, component: String, changes: &mut Vec<StateChange>) -> Outcome {
        if cell.state.is_disposal() {
            tracing::debug!("Ignoring finish of {} after disposal of {}", component, self.workflow_id);
            return Outcome::Ignored;
        }
        if !cell.components.contains(&component) {
            tracing::warn!(
                "⚠️ Finish notification for {} which is not part of workflow {}",
                component,
                self.workflow_id
            );
            return Outcome::Ignored;
        }

        let recorded = cell.finished.insert(component.clone());
        if cell.state == WorkflowState::Finished {
            tracing::warn!(
                "⚠️ Finish notification for {} received after workflow {} already finished",
                component,
                self.workflow_id
            );
            return Outcome::Ignored;
        }
        if !recorded {
            tracing::debug!("Duplicate finish notification for {}", component);
            return Outcome::Ignored;
        }

        tracing::debug!(
            "📊 Workflow {}: {}/{} components finished",
            self.workflow_id,
            cell.finished.len(),
            cell.components.len()
        );
        let complete = cell.finished.len() == cell.components.len();
        let finishable = matches!(
            cell.state,
            WorkflowState::Running | WorkflowState::Pausing | WorkflowState::Paused | WorkflowState::Resuming
        );
        if complete && finishable {
            changes.push(self.change(cell, WorkflowState::Finished));
            Outcome::Finished
        } else {
            Outcome::Recorded
        }
    }

    fn change(&self, cell: &mut Cell, next: WorkflowState) -> StateChange {
        tracing::info!("🔄 Workflow {}: {} -> {}", self.workflow_id, cell.state, next);
        cell.state = next;
        cell.revision += 1;
        self.state_tx.send_replace(next);
        StateChange {
            state: next,
            revision: cell.revision,
        }
    }

    fn publish(&self, changes: &[StateChange]) {
        let topic = workflow_state_topic(&self.workflow_id);
        for change in changes {
            let body = serde_json::json!(change).to_string();
            self.notifications.send(&topic, &body);
            if change.state == WorkflowState::Disposed {
                self.notifications.send(WORKFLOW_DISPOSED_TOPIC, &self.workflow_id);
            }
        }
    }

    fn lock(&self) -> MutexGuard<'_, Cell> {
        self.cell.lock().unwrap_or_else(|e| e.into_inner())
    }
}

impl std::fmt::Debug for Lifecycle {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Lifecycle")
            .field("workflow_id", &self.workflow_id)
            .field("cell", &*self.lock())
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::notification::LocalNotificationBus;

    fn lifecycle(state: WorkflowState) -> Lifecycle {
        Lifecycle::new(
            "wf-1",
            state,
            ["c-1", "c-2", "c-3"].map(String::from),
            Arc::new(LocalNotificationBus::new()),
        )
    }

    fn finished(id: &str) -> LifecycleEvent {
        LifecycleEvent::ComponentFinished(id.to_string())
    }

    #[test]
    fn finishes_after_all_distinct_components() {
        let lifecycle = lifecycle(WorkflowState::Running);

        assert_eq!(lifecycle.handle(finished("c-1")), Outcome::Recorded);
        assert_eq!(lifecycle.handle(finished("c-1")), Outcome::Ignored);
        assert_eq!(lifecycle.handle(finished("c-2")), Outcome::Recorded);
        assert_eq!(lifecycle.state(), WorkflowState::Running);
        assert_eq!(lifecycle.handle(finished("c-3")), Outcome::Finished);
        assert_eq!(lifecycle.state(), WorkflowState::Finished);
        assert_eq!(lifecycle.handle(finished("c-3")), Outcome::Ignored);
        assert_eq!(lifecycle.finished_count(), 3);
    }

    #[test]
    fn unknown_components_are_ignored() {
        let lifecycle = lifecycle(WorkflowState::Running);
        assert_eq!(lifecycle.handle(finished("other")), Outcome::Ignored);
        assert_eq!(lifecycle.finished_count(), 0);
    }

    #[test]
    fn failure_wins_over_partial_completion() {
        let lifecycle = lifecycle(WorkflowState::Running);
        lifecycle.handle(finished("c-1"));
        lifecycle.handle(finished("c-2"));

        let outcome = lifecycle.handle(LifecycleEvent::ComponentFailed("c-3".into()));
        assert_eq!(outcome, Outcome::Failed);
        assert_eq!(lifecycle.state(), WorkflowState::Failed);

        // FAILED is terminal apart from disposal
        assert_eq!(lifecycle.handle(finished("c-3")), Outcome::Recorded);
        assert!(!lifecycle.set_state(WorkflowState::Canceled));
        assert_eq!(lifecycle.state(), WorkflowState::Failed);
    }

    #[test]
    fn failure_outside_active_states_is_ignored() {
        let lifecycle = lifecycle(WorkflowState::Preparing);
        let outcome = lifecycle.handle(LifecycleEvent::ComponentFailed("c-1".into()));
        assert_eq!(outcome, Outcome::Ignored);
        assert_eq!(lifecycle.state(), WorkflowState::Preparing);
    }

    #[test]
    fn transition_checks_source_state() {
        let lifecycle = lifecycle(WorkflowState::Ready);
        assert!(!lifecycle.transition(&[WorkflowState::Running], WorkflowState::Pausing));
        assert!(lifecycle.transition(&[WorkflowState::Ready], WorkflowState::Preparing));
        assert!(!lifecycle.transition(&[WorkflowState::Ready], WorkflowState::Preparing));
        assert_eq!(*lifecycle.subscribe().borrow(), WorkflowState::Preparing);
    }

    #[derive(Default)]
    struct Recorder {
        bodies: Mutex<Vec<String>>,
    }

    impl crate::notification::NotificationSubscriber for Recorder {
        fn notify(&self, notification: &crate::notification::Notification) {
            self.bodies.lock().unwrap().push(notification.body.clone());
        }
    }

    #[test]
    fn published_changes_carry_increasing_revisions() {
        let bus = Arc::new(LocalNotificationBus::new());
        let recorder = Arc::new(Recorder::default());
        bus.subscribe(&workflow_state_topic("wf-1"), recorder.clone(), &crate::workflow::PlatformId::new("local"));

        let lifecycle = Lifecycle::new("wf-1", WorkflowState::Ready, ["c-1".to_string()], bus);
        lifecycle.transition(&[WorkflowState::Ready], WorkflowState::Preparing);
        lifecycle.transition(&[WorkflowState::Preparing], WorkflowState::Running);
        lifecycle.handle(LifecycleEvent::ComponentFailed("c-1".into()));

        let changes: Vec<StateChange> = recorder
            .bodies
            .lock()
            .unwrap()
            .iter()
            .filter_map(|body| StateChange::parse(body))
            .collect();
        let states: Vec<_> = changes.iter().map(|c| c.state).collect();
        assert_eq!(
            states,
            vec![
                WorkflowState::Ready,
                WorkflowState::Preparing,
                WorkflowState::Running,
                WorkflowState::Canceling,
                WorkflowState::Failed
            ]
        );
        let revisions: Vec<_> = changes.iter().map(|c| c.revision).collect();
        assert_eq!(revisions, vec![0, 1, 2, 3, 4]);
    }

    #[test]
    fn notifications_after_disposal_are_ignored() {
        let lifecycle = lifecycle(WorkflowState::Disposed);
        assert_eq!(lifecycle.handle(finished("c-1")), Outcome::Ignored);
        assert_eq!(
            lifecycle.handle(LifecycleEvent::ComponentFailed("c-1".into())),
            Outcome::Ignored
        );
    }
}
