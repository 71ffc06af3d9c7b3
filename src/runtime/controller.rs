/// Component controller boundary
///
/// Components are created and driven on their platforms by an external
/// controller. The runtime only issues lifecycle calls through this trait and
/// learns about completion or failure through notifications.

use crate::error::Result;
use crate::workflow::component::PlatformId;
use crate::workflow::graph::Connection;
use crate::workflow::node::Node;
use async_trait::async_trait;
use serde::{Deserialize, Serialize};

/// Handle of one instantiated component
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct ComponentInstanceDescriptor {
    /// Instance identifier; body of component notifications
    pub identifier: String,
    /// Workflow node the instance was created for
    pub node_id: String,
    /// Node display name
    pub name: String,
    /// Component type identifier
    pub component_identifier: String,
    pub platform: PlatformId,
}

/// Lifecycle calls issued to component instances
///
/// Every call returns once the component acknowledged the request; completion
/// of the actual work is reported asynchronously.
#[async_trait]
pub trait ComponentController: Send + Sync {
    /// Create an instance for `node` on `platform`
    async fn instantiate(
        &self,
        workflow_id: &str,
        node: &Node,
        platform: &PlatformId,
    ) -> Result<ComponentInstanceDescriptor>;

    /// Hand the instance the connections that feed its inputs
    async fn prepare(&self, instance: &ComponentInstanceDescriptor, wiring: &[Connection]) -> Result<()>;

    async fn start(&self, instance: &ComponentInstanceDescriptor) -> Result<()>;

    async fn pause(&self, instance: &ComponentInstanceDescriptor) -> Result<()>;

    async fn resume(&self, instance: &ComponentInstanceDescriptor) -> Result<()>;

    async fn cancel(&self, instance: &ComponentInstanceDescriptor) -> Result<()>;

    /// Called once after the whole workflow finished
    async fn finished(&self, instance: &ComponentInstanceDescriptor) -> Result<()>;

    async fn dispose(&self, instance: &ComponentInstanceDescriptor) -> Result<()>;
}

/// Controller that only logs lifecycle calls
///
/// Used by the server when components run elsewhere and report back through
/// the notification endpoint.
#[derive(Debug, Default, Clone)]
pub struct LoggingComponentController;

#[async_trait]
impl ComponentController for LoggingComponentController {
    async fn instantiate(
        &self,
        workflow_id: &str,
        node: &Node,
        platform: &PlatformId,
    ) -> Result<ComponentInstanceDescriptor> {
        let instance = ComponentInstanceDescriptor {
            identifier: uuid::Uuid::new_v4().to_string(),
            node_id: node.identifier().to_string(),
            name: node.name.clone(),
            component_identifier: node.component().identifier.clone(),
            platform: platform.clone(),
        };
        tracing::info!(
            "📦 Instantiated '{}' ({}) for workflow {} on {}",
            instance.name,
            instance.identifier,
            workflow_id,
            platform
        );
        Ok(instance)
    }

    async fn prepare(&self, instance: &ComponentInstanceDescriptor, wiring: &[Connection]) -> Result<()> {
        tracing::debug!("Preparing '{}' with {} incoming connections", instance.name, wiring.len());
        Ok(())
    }

    async fn start(&self, instance: &ComponentInstanceDescriptor) -> Result<()> {
        tracing::debug!("Starting '{}'", instance.name);
        Ok(())
    }

    async fn pause(&self, instance: &ComponentInstanceDescriptor) -> Result<()> {
        tracing::debug!("Pausing '{}'", instance.name);
        Ok(())
    }

    async fn resume(&self, instance: &ComponentInstanceDescriptor) -> Result<()> {
        tracing::debug!("Resuming '{}'", instance.name);
        Ok(())
    }

    async fn cancel(&self, instance: &ComponentInstanceDescriptor) -> Result<()> {
        tracing::debug!("Canceling '{}'", instance.name);
        Ok(())
    }

    async fn finished(&self, instance: &ComponentInstanceDescriptor) -> Result<()> {
        tracing::debug!("Workflow of '{}' finished", instance.name);
        Ok(())
    }

    async fn dispose(&self, instance: &ComponentInstanceDescriptor) -> Result<()> {
        tracing::debug!("Disposing '{}'", instance.name);
        Ok(())
    }
}
