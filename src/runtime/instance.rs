/// Running workflow instance
///
/// Owns the graph for the duration of one execution, the component instances
/// created for its nodes and the lifecycle cell. Operator commands check their
/// precondition synchronously and return whether they were accepted; the actual
/// component calls run on a spawned task.

use crate::error::WorkflowError;
use crate::notification::{
    failed_topic, finished_topic, NotificationService, NotificationSubscriber,
};
use crate::runtime::aggregator::{FailureAggregator, FinishAggregator};
use crate::runtime::controller::{ComponentController, ComponentInstanceDescriptor};
use crate::runtime::lifecycle::Lifecycle;
use crate::runtime::state::WorkflowState;
use crate::workflow::graph::{Connection, WorkflowGraph};
use crate::workflow::registry::WorkflowInformation;
use crate::workflow::topology::Topology;
use std::sync::{Arc, Mutex};
use tokio::runtime::Handle;
use tokio::sync::watch;

/// Invoked once when the workflow reaches FINISHED
pub type FinishedCallback = Box<dyn Fn(&WorkflowInformation) + Send + Sync>;

const CANCELABLE: [WorkflowState; 6] = [
    WorkflowState::Ready,
    WorkflowState::Preparing,
    WorkflowState::Running,
    WorkflowState::Pausing,
    WorkflowState::Paused,
    WorkflowState::Resuming,
];

const DISPOSABLE: [WorkflowState; 3] = [
    WorkflowState::Finished,
    WorkflowState::Canceled,
    WorkflowState::Failed,
];

pub struct WorkflowInstance {
    information: WorkflowInformation,
    graph: WorkflowGraph,
    lifecycle: Lifecycle,
    controller: Arc<dyn ComponentController>,
    notifications: Arc<dyn NotificationService>,
    finish_subscriber: Arc<dyn NotificationSubscriber>,
    failure_subscriber: Arc<dyn NotificationSubscriber>,
    callbacks: Mutex<Vec<FinishedCallback>>,
    runtime: Handle,
}

impl WorkflowInstance {
    /// Instantiate one component per node and subscribe both aggregators
    ///
    /// The instance starts READY, or FAILED if any component could not be
    /// instantiated. Must be called from within a tokio runtime.
    pub async fn create(
        mut information: WorkflowInformation,
        graph: WorkflowGraph,
        controller: Arc<dyn ComponentController>,
        notifications: Arc<dyn NotificationService>,
    ) -> Arc<Self> {
        let mut failure = None;
        for node in graph.nodes() {
            let platform = node
                .platform()
                .cloned()
                .unwrap_or_else(|| information.controller_platform.clone());
            match controller.instantiate(&information.identifier, node, &platform).await {
                Ok(component) => information.components.push(component),
                Err(err) => {
                    failure = Some(err);
                    break;
                }
            }
        }

        let initial = if failure.is_some() {
            WorkflowState::Failed
        } else {
            WorkflowState::Ready
        };
        let lifecycle = Lifecycle::new(
            information.identifier.clone(),
            initial,
            information.components.iter().map(|c| c.identifier.clone()),
            Arc::clone(&notifications),
        );

        let instance = Arc::new_cyclic(|weak| Self {
            information,
            graph,
            lifecycle,
            controller,
            notifications,
            finish_subscriber: Arc::new(FinishAggregator::new(weak.clone())),
            failure_subscriber: Arc::new(FailureAggregator::new(weak.clone())),
            callbacks: Mutex::new(Vec::new()),
            runtime: Handle::current(),
        });
        instance.subscribe_aggregators();

        match failure {
            Some(err) => {
                tracing::error!(
                    "❌ Instantiating workflow {} failed: {}",
                    instance.identifier(),
                    err
                );
                instance.cancel_components();
            }
            None => tracing::info!(
                "✅ Workflow {} ('{}') ready with {} components",
                instance.identifier(),
                instance.information.name,
                instance.information.components.len()
            ),
        }
        instance
    }

    pub fn identifier(&self) -> &str {
        &self.information.identifier
    }

    pub fn information(&self) -> &WorkflowInformation {
        &self.information
    }

    pub fn graph(&self) -> &WorkflowGraph {
        &self.graph
    }

    pub fn state(&self) -> WorkflowState {
        self.lifecycle.state()
    }

    pub fn watch_state(&self) -> watch::Receiver<WorkflowState> {
        self.lifecycle.subscribe()
    }

    pub(crate) fn lifecycle(&self) -> &Lifecycle {
        &self.lifecycle
    }

    /// Resolve once the state satisfies `predicate`
    pub async fn wait_until(&self, predicate: impl FnMut(&WorkflowState) -> bool) -> WorkflowState {
        let mut receiver = self.lifecycle.subscribe();
        let reached = receiver.wait_for(predicate).await.map(|state| *state);
        reached.unwrap_or_else(|_| self.state())
    }

    /// Register a callback run when all components finished
    pub fn on_finished(&self, callback: impl Fn(&WorkflowInformation) + Send + Sync + 'static) {
        self.callbacks
            .lock()
            .unwrap_or_else(|e| e.into_inner())
            .push(Box::new(callback));
    }

    /// READY -> PREPARING -> RUNNING
    pub fn start(self: &Arc<Self>) -> bool {
        if !self.lifecycle.transition(&[WorkflowState::Ready], WorkflowState::Preparing) {
            return self.ignored("start");
        }
        let instance = Arc::clone(self);
        self.runtime.spawn(async move { instance.run_start().await });
        true
    }

    /// RUNNING -> PAUSING -> PAUSED
    pub fn pause(self: &Arc<Self>) -> bool {
        if !self.lifecycle.transition(&[WorkflowState::Running], WorkflowState::Pausing) {
            return self.ignored("pause");
        }
        let instance = Arc::clone(self);
        self.runtime.spawn(async move {
            for component in &instance.information.components {
                if !instance.is_active() {
                    return;
                }
                if let Err(err) = instance.controller.pause(component).await {
                    instance.fail(err);
                    return;
                }
            }
            instance
                .lifecycle
                .transition(&[WorkflowState::Pausing], WorkflowState::Paused);
        });
        true
    }

    /// PAUSED -> RESUMING -> RUNNING
    pub fn resume(self: &Arc<Self>) -> bool {
        if !self.lifecycle.transition(&[WorkflowState::Paused], WorkflowState::Resuming) {
            return self.ignored("resume");
        }
        let instance = Arc::clone(self);
        self.runtime.spawn(async move {
            for component in &instance.information.components {
                if !instance.is_active() {
                    return;
                }
                if let Err(err) = instance.controller.resume(component).await {
                    instance.fail(err);
                    return;
                }
            }
            instance
                .lifecycle
                .transition(&[WorkflowState::Resuming], WorkflowState::Running);
        });
        true
    }

    /// Any active state -> CANCELING -> CANCELED
    pub fn cancel(self: &Arc<Self>) -> bool {
        if !self.lifecycle.transition(&CANCELABLE, WorkflowState::Canceling) {
            return self.ignored("cancel");
        }
        let instance = Arc::clone(self);
        self.runtime.spawn(async move {
            if instance.cancel_all().await {
                instance
                    .lifecycle
                    .transition(&[WorkflowState::Canceling], WorkflowState::Canceled);
            } else {
                tracing::error!("❌ Canceling workflow {} failed", instance.identifier());
                instance
                    .lifecycle
                    .transition(&[WorkflowState::Canceling], WorkflowState::Failed);
            }
        });
        true
    }

    /// FINISHED, CANCELED or FAILED -> DISPOSING -> DISPOSED
    pub fn dispose(self: &Arc<Self>) -> bool {
        if !self.lifecycle.transition(&DISPOSABLE, WorkflowState::Disposing) {
            return self.ignored("dispose");
        }
        let instance = Arc::clone(self);
        self.runtime.spawn(async move {
            for component in &instance.information.components {
                if let Err(err) = instance.controller.dispose(component).await {
                    tracing::warn!("⚠️ Disposing '{}' failed: {}", component.name, err);
                }
            }
            instance.unsubscribe_aggregators();
            instance.lifecycle.set_state(WorkflowState::Disposed);
        });
        true
    }

    async fn run_start(self: Arc<Self>) {
        for component in &self.information.components {
            if !self.is_active() {
                return;
            }
            let wiring: Vec<Connection> = self
                .graph
                .incoming_connections(&component.node_id)
                .cloned()
                .collect();
            if let Err(err) = self.controller.prepare(component, &wiring).await {
                self.fail(err);
                return;
            }
        }

        if !self
            .lifecycle
            .transition(&[WorkflowState::Preparing], WorkflowState::Running)
        {
            return;
        }

        for component in self.start_order() {
            if !self.is_active() {
                tracing::info!("Workflow {} left RUNNING, not starting remaining components", self.identifier());
                return;
            }
            if let Err(err) = self.controller.start(component).await {
                self.fail(err);
                return;
            }
        }
        tracing::info!("🚀 Started all components of workflow {}", self.identifier());
    }

    /// Components in dependency order of their nodes
    fn start_order(&self) -> Vec<&ComponentInstanceDescriptor> {
        Topology::build(&self.graph)
            .execution_order()
            .iter()
            .filter_map(|node_id| {
                self.information
                    .components
                    .iter()
                    .find(|component| &component.node_id == node_id)
            })
            .collect()
    }

    /// Called by the finish aggregator once the workflow reached FINISHED
    pub(crate) fn workflow_finished(self: &Arc<Self>) {
        tracing::info!("✅ Workflow {} finished", self.identifier());
        for callback in self.callbacks.lock().unwrap_or_else(|e| e.into_inner()).iter() {
            callback(&self.information);
        }

        let topic = finished_topic(self.identifier());
        for platform in self.information.involved_platforms() {
            self.notifications
                .unsubscribe(&topic, &self.finish_subscriber, &platform);
        }

        let instance = Arc::clone(self);
        self.runtime.spawn(async move {
            for component in &instance.information.components {
                if let Err(err) = instance.controller.finished(component).await {
                    tracing::warn!("⚠️ Finishing '{}' failed: {}", component.name, err);
                }
            }
        });
    }

    /// Cancel every component in the background
    pub(crate) fn cancel_components(self: &Arc<Self>) {
        let instance = Arc::clone(self);
        self.runtime.spawn(async move {
            instance.cancel_all().await;
        });
    }

    async fn cancel_all(&self) -> bool {
        let mut all_canceled = true;
        for component in &self.information.components {
            if let Err(err) = self.controller.cancel(component).await {
                tracing::warn!("⚠️ Canceling '{}' failed: {}", component.name, err);
                all_canceled = false;
            }
        }
        all_canceled
    }

    /// Fail an active workflow; late errors after cancel or failure are only logged
    fn fail(self: &Arc<Self>, err: WorkflowError) {
        if !self.lifecycle.transition(&CANCELABLE, WorkflowState::Canceling) {
            tracing::warn!(
                "⚠️ Ignoring error of workflow {} in state {}: {}",
                self.identifier(),
                self.state(),
                err
            );
            return;
        }
        tracing::error!(
            "❌ Executing workflow {} failed, it will be canceled: {}",
            self.identifier(),
            err
        );
        self.lifecycle
            .transition(&[WorkflowState::Canceling], WorkflowState::Failed);
        self.cancel_components();
    }

    /// Whether background command work should keep calling components
    fn is_active(&self) -> bool {
        CANCELABLE.contains(&self.state())
    }

    fn subscribe_aggregators(&self) {
        let finished = finished_topic(self.identifier());
        let failed = failed_topic(self.identifier());
        for platform in self.information.involved_platforms() {
            self.notifications
                .subscribe(&finished, Arc::clone(&self.finish_subscriber), &platform);
            self.notifications
                .subscribe(&failed, Arc::clone(&self.failure_subscriber), &platform);
        }
    }

    fn unsubscribe_aggregators(&self) {
        let finished = finished_topic(self.identifier());
        let failed = failed_topic(self.identifier());
        for platform in self.information.involved_platforms() {
            self.notifications
                .unsubscribe(&finished, &self.finish_subscriber, &platform);
            self.notifications
                .unsubscribe(&failed, &self.failure_subscriber, &platform);
        }
    }

    fn ignored(&self, command: &str) -> bool {
        tracing::info!(
            "Ignoring {} for workflow {} in state {}",
            command,
            self.identifier(),
            self.state()
        );
        false
    }
}

impl std::fmt::Debug for WorkflowInstance {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("WorkflowInstance")
            .field("information", &self.information)
            .field("lifecycle", &self.lifecycle)
            .finish_non_exhaustive()
    }
}
