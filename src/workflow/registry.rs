/// Workflow-instance registry using ArcSwap
///
/// Keeps the running workflow instances of this process. Readers get a
/// lock-free snapshot of the instance map; creation and disposal swap in a new
/// map, so listing instances never blocks a workflow that is being created.

use crate::notification::NotificationService;
use crate::runtime::controller::{ComponentController, ComponentInstanceDescriptor};
use crate::runtime::instance::WorkflowInstance;
use crate::workflow::component::PlatformId;
use crate::workflow::graph::WorkflowGraph;
use arc_swap::ArcSwap;
use chrono::{DateTime, Utc};
use serde::Serialize;
use std::collections::{BTreeSet, HashMap};
use std::sync::Arc;

/// Descriptive data of one workflow instance
#[derive(Debug, Clone, Serialize)]
pub struct WorkflowInformation {
    pub identifier: String,
    pub name: String,
    /// User that instantiated the workflow
    pub user: String,
    pub instantiated_at: DateTime<Utc>,
    pub additional_information: String,
    /// Platform hosting the workflow controller
    pub controller_platform: PlatformId,
    /// Instantiated components, in node order
    pub components: Vec<ComponentInstanceDescriptor>,
}

impl WorkflowInformation {
    /// Controller platform plus every platform hosting a component
    pub fn involved_platforms(&self) -> BTreeSet<PlatformId> {
        self.components
            .iter()
            .map(|component| component.platform.clone())
            .chain(std::iter::once(self.controller_platform.clone()))
            .collect()
    }

    /// Component created for the node named `node_name` of type `component_identifier`
    pub fn component_instance(
        &self,
        node_name: &str,
        component_identifier: &str,
    ) -> Option<&ComponentInstanceDescriptor> {
        self.components.iter().find(|component| {
            component.name == node_name && component.component_identifier == component_identifier
        })
    }
}

/// Lock-free registry of running workflow instances
pub struct WorkflowRegistry {
    /// Key: workflow instance id
    instances: ArcSwap<HashMap<String, Arc<WorkflowInstance>>>,
    controller: Arc<dyn ComponentController>,
    notifications: Arc<dyn NotificationService>,
    /// Controller platform for graphs without a target platform
    local_platform: PlatformId,
}

impl WorkflowRegistry {
    pub fn new(
        controller: Arc<dyn ComponentController>,
        notifications: Arc<dyn NotificationService>,
        local_platform: PlatformId,
    ) -> Self {
        Self {
            instances: ArcSwap::from_pointee(HashMap::new()),
            controller,
            notifications,
            local_platform,
        }
    }

    /// Instantiate `graph` under a fresh instance id
    ///
    /// The returned instance is READY, or FAILED when a component could not be
    /// instantiated. Either way it is registered until disposed.
    pub async fn create_workflow_instance(
        &self,
        user: &str,
        graph: WorkflowGraph,
        name: Option<&str>,
    ) -> Arc<WorkflowInstance> {
        let name = name
            .map(str::to_string)
            .or_else(|| graph.name.clone())
            .unwrap_or_default();
        let information = WorkflowInformation {
            identifier: uuid::Uuid::new_v4().to_string(),
            name,
            user: user.to_string(),
            instantiated_at: Utc::now(),
            additional_information: graph.additional_information.clone().unwrap_or_default(),
            controller_platform: graph
                .target_platform
                .clone()
                .unwrap_or_else(|| self.local_platform.clone()),
            components: Vec::new(),
        };

        tracing::info!(
            "📥 Creating workflow instance {} from '{}' for {}",
            information.identifier,
            graph.identifier(),
            user
        );
        let instance = WorkflowInstance::create(
            information,
            graph,
            Arc::clone(&self.controller),
            Arc::clone(&self.notifications),
        )
        .await;

        let id = instance.identifier().to_string();
        self.instances.rcu(|current| {
            let mut next = HashMap::clone(current);
            next.insert(id.clone(), Arc::clone(&instance));
            next
        });
        instance
    }

    /// Get a workflow instance by id (lock-free read)
    pub fn workflow(&self, identifier: &str) -> Option<Arc<WorkflowInstance>> {
        self.instances.load().get(identifier).cloned()
    }

    /// Information on every registered instance, oldest first
    pub fn informations(&self) -> Vec<WorkflowInformation> {
        let mut informations: Vec<_> = self
            .instances
            .load()
            .values()
            .map(|instance| instance.information().clone())
            .collect();
        informations.sort_by(|a, b| {
            a.instantiated_at
                .cmp(&b.instantiated_at)
                .then_with(|| a.identifier.cmp(&b.identifier))
        });
        informations
    }

    /// Dispose an instance and drop it from the registry
    ///
    /// Returns `false` for unknown ids and for instances whose state does not
    /// allow disposal; those stay registered.
    pub fn dispose_workflow_instance(&self, identifier: &str) -> bool {
        let Some(instance) = self.workflow(identifier) else {
            return false;
        };
        if !instance.dispose() {
            return false;
        }

        self.instances.rcu(|current| {
            let mut next = HashMap::clone(current);
            next.remove(identifier);
            next
        });
        tracing::info!("Removed workflow instance from registry: {}", identifier);
        true
    }
}

impl std::fmt::Debug for WorkflowRegistry {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("WorkflowRegistry")
            .field("instances", &self.instances.load().len())
            .field("local_platform", &self.local_platform)
            .finish_non_exhaustive()
    }
}
