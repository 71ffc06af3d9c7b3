/// Workflow nodes: placed component instances
///
/// A node owns a copy of its component descriptor, the configuration profiles,
/// the user-declared dynamic endpoints and the per-endpoint metadata. Nodes never
/// point back at their graph; endpoint mutations that would leave connections
/// dangling are crate-private and go through `WorkflowGraph`, which repairs the
/// affected connections in the same step.

use crate::error::{Result, WorkflowError};
use crate::workflow::component::{ComponentDescriptor, PlatformId};
use crate::workflow::value::{ConfigValue, DataType};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::fmt;

/// Identifier of the profile every node starts with
pub const DEFAULT_PROFILE: &str = "default";

/// One configuration profile: key to optional typed value
///
/// `None` marks a key that is defined but has no value yet.
pub type ConfigurationMap = BTreeMap<String, Option<ConfigValue>>;

/// Per-endpoint metadata: endpoint name to key/value pairs
pub type EndpointMetadata = BTreeMap<String, BTreeMap<String, ConfigValue>>;

/// Direction of an endpoint
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum EndpointDirection {
    Input,
    Output,
}

impl fmt::Display for EndpointDirection {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            EndpointDirection::Input => f.write_str("input"),
            EndpointDirection::Output => f.write_str("output"),
        }
    }
}

/// A component placed in a workflow graph
#[derive(Debug, Clone)]
pub struct Node {
    /// Stable unique identifier, generated once
    identifier: String,
    /// Display name
    pub name: String,
    /// Layout position, advisory only
    pub x: i32,
    pub y: i32,
    /// Component type this node instantiates
    component: ComponentDescriptor,
    /// Values of the `DEFAULT_PROFILE` profile
    default_profile: ConfigurationMap,
    /// Additional named profiles
    profiles: BTreeMap<String, ConfigurationMap>,
    /// Profile id that `configuration_value` and friends operate on
    current_profile: String,
    /// User-declared inputs, separate from the component's fixed ones
    dynamic_inputs: BTreeMap<String, DataType>,
    /// User-declared outputs, separate from the component's fixed ones
    dynamic_outputs: BTreeMap<String, DataType>,
    input_metadata: EndpointMetadata,
    output_metadata: EndpointMetadata,
}

impl Node {
    /// Place a component with a freshly generated identifier
    ///
    /// The default profile starts with the component's default configuration.
    pub fn new(name: impl Into<String>, component: ComponentDescriptor) -> Self {
        Self::with_identifier(uuid::Uuid::new_v4().to_string(), name, component)
    }

    /// Recreate a node with a known identifier (used when loading documents)
    pub fn with_identifier(
        identifier: impl Into<String>,
        name: impl Into<String>,
        component: ComponentDescriptor,
    ) -> Self {
        let default_profile: ConfigurationMap = component
            .default_configuration
            .iter()
            .map(|(key, value)| (key.clone(), Some(value.clone())))
            .collect();

        Self {
            identifier: identifier.into(),
            name: name.into(),
            x: 0,
            y: 0,
            component,
            default_profile,
            profiles: BTreeMap::new(),
            current_profile: DEFAULT_PROFILE.to_string(),
            dynamic_inputs: BTreeMap::new(),
            dynamic_outputs: BTreeMap::new(),
            input_metadata: BTreeMap::new(),
            output_metadata: BTreeMap::new(),
        }
    }

    pub fn identifier(&self) -> &str {
        &self.identifier
    }

    pub fn component(&self) -> &ComponentDescriptor {
        &self.component
    }

    /// Platform the component is placed on, if any
    pub fn platform(&self) -> Option<&PlatformId> {
        self.component.platform.as_ref()
    }

    pub fn set_location(&mut self, x: i32, y: i32) {
        self.x = x;
        self.y = y;
    }

    // ----- configuration profiles -----

    /// Profile ids, default first
    pub fn profile_ids(&self) -> impl Iterator<Item = &str> {
        std::iter::once(DEFAULT_PROFILE).chain(self.profiles.keys().map(String::as_str))
    }

    pub fn current_profile_id(&self) -> &str {
        &self.current_profile
    }

    /// Switch the profile that configuration accessors operate on
    pub fn set_current_profile(&mut self, profile_id: &str) -> Result<()> {
        if self.configuration(profile_id).is_none() {
            return Err(WorkflowError::Profile(format!("unknown profile '{profile_id}'")));
        }
        self.current_profile = profile_id.to_string();
        Ok(())
    }

    /// Add a profile, either empty or as a copy of an existing profile's values
    pub fn add_profile(&mut self, profile_id: &str, clone_from: Option<&str>) -> Result<()> {
        if self.configuration(profile_id).is_some() {
            return Err(WorkflowError::Profile(format!("profile '{profile_id}' already exists")));
        }
        let values = match clone_from {
            Some(source) => self
                .configuration(source)
                .cloned()
                .ok_or_else(|| WorkflowError::Profile(format!("unknown profile '{source}'")))?,
            None => ConfigurationMap::new(),
        };
        self.profiles.insert(profile_id.to_string(), values);
        Ok(())
    }

    /// Remove a non-default profile
    ///
    /// Removing the current profile switches back to the default one.
    pub fn remove_profile(&mut self, profile_id: &str) -> Result<()> {
        if profile_id == DEFAULT_PROFILE {
            return Err(WorkflowError::Profile("the default profile cannot be removed".to_string()));
        }
        if self.profiles.remove(profile_id).is_none() {
            return Err(WorkflowError::Profile(format!("unknown profile '{profile_id}'")));
        }
        if self.current_profile == profile_id {
            self.current_profile = DEFAULT_PROFILE.to_string();
        }
        Ok(())
    }

    pub fn configuration(&self, profile_id: &str) -> Option<&ConfigurationMap> {
        if profile_id == DEFAULT_PROFILE {
            Some(&self.default_profile)
        } else {
            self.profiles.get(profile_id)
        }
    }

    pub fn default_configuration(&self) -> &ConfigurationMap {
        &self.default_profile
    }

    /// Replace a whole profile, creating it when missing
    pub fn set_configuration(&mut self, profile_id: &str, values: ConfigurationMap) {
        if profile_id == DEFAULT_PROFILE {
            self.default_profile = values;
        } else {
            self.profiles.insert(profile_id.to_string(), values);
        }
    }

    /// Value of a key in the current profile; `None` when unknown or unset
    pub fn configuration_value(&self, key: &str) -> Option<&ConfigValue> {
        self.configuration(&self.current_profile)
            .and_then(|profile| profile.get(key))
            .and_then(Option::as_ref)
    }

    /// Set (or clear, with `None`) a key in the current profile
    pub fn set_configuration_value(&mut self, key: impl Into<String>, value: Option<ConfigValue>) {
        let profile = if self.current_profile == DEFAULT_PROFILE {
            &mut self.default_profile
        } else {
            self.profiles.entry(self.current_profile.clone()).or_default()
        };
        profile.insert(key.into(), value);
    }

    // ----- endpoints -----

    pub fn dynamic_endpoints(&self, direction: EndpointDirection) -> &BTreeMap<String, DataType> {
        match direction {
            EndpointDirection::Input => &self.dynamic_inputs,
            EndpointDirection::Output => &self.dynamic_outputs,
        }
    }

    fn static_endpoints(&self, direction: EndpointDirection) -> &BTreeMap<String, DataType> {
        match direction {
            EndpointDirection::Input => &self.component.inputs,
            EndpointDirection::Output => &self.component.outputs,
        }
    }

    /// All endpoint names of one direction, fixed ones first
    pub fn endpoint_names(&self, direction: EndpointDirection) -> Vec<&str> {
        self.static_endpoints(direction)
            .keys()
            .chain(self.dynamic_endpoints(direction).keys())
            .map(String::as_str)
            .collect()
    }

    /// Type of a fixed or dynamic endpoint
    pub fn endpoint_type(&self, direction: EndpointDirection, name: &str) -> Option<DataType> {
        self.static_endpoints(direction)
            .get(name)
            .or_else(|| self.dynamic_endpoints(direction).get(name))
            .copied()
    }

    pub fn has_endpoint(&self, direction: EndpointDirection, name: &str) -> bool {
        self.endpoint_type(direction, name).is_some()
    }

    pub fn validate_input_name(&self, name: &str) -> bool {
        self.validate_name(EndpointDirection::Input, name)
    }

    pub fn validate_output_name(&self, name: &str) -> bool {
        self.validate_name(EndpointDirection::Output, name)
    }

    pub fn validate_input_type(&self, type_name: &str) -> bool {
        DataType::from_type_name(type_name).is_some()
    }

    pub fn validate_output_type(&self, type_name: &str) -> bool {
        DataType::from_type_name(type_name).is_some()
    }

    /// True when `name` is non-empty and free in the direction's whole namespace
    fn validate_name(&self, direction: EndpointDirection, name: &str) -> bool {
        !name.trim().is_empty() && !self.has_endpoint(direction, name)
    }

    pub(crate) fn add_dynamic_endpoint(
        &mut self,
        direction: EndpointDirection,
        name: &str,
        data_type: DataType,
    ) -> Result<()> {
        if !self.validate_name(direction, name) {
            return Err(WorkflowError::InvalidEndpoint {
                direction,
                name: name.to_string(),
            });
        }
        self.dynamic_endpoints_mut(direction)
            .insert(name.to_string(), data_type);
        Ok(())
    }

    /// Rename and/or retype a dynamic endpoint, returning its former type
    ///
    /// Metadata follows the endpoint to its new name.
    pub(crate) fn change_dynamic_endpoint(
        &mut self,
        direction: EndpointDirection,
        former_name: &str,
        new_name: &str,
        data_type: DataType,
    ) -> Result<DataType> {
        if !self.dynamic_endpoints(direction).contains_key(former_name) {
            return Err(WorkflowError::InvalidEndpoint {
                direction,
                name: former_name.to_string(),
            });
        }
        if former_name != new_name && !self.validate_name(direction, new_name) {
            return Err(WorkflowError::InvalidEndpoint {
                direction,
                name: new_name.to_string(),
            });
        }

        let endpoints = self.dynamic_endpoints_mut(direction);
        let former_type = endpoints.remove(former_name).unwrap_or(data_type);
        endpoints.insert(new_name.to_string(), data_type);

        let metadata = self.metadata_mut(direction);
        if let Some(values) = metadata.remove(former_name) {
            metadata.insert(new_name.to_string(), values);
        }
        Ok(former_type)
    }

    /// Remove a dynamic endpoint and its metadata; `None` when it did not exist
    pub(crate) fn remove_dynamic_endpoint(
        &mut self,
        direction: EndpointDirection,
        name: &str,
    ) -> Option<DataType> {
        let removed = self.dynamic_endpoints_mut(direction).remove(name)?;
        self.metadata_mut(direction).remove(name);
        Some(removed)
    }

    fn dynamic_endpoints_mut(&mut self, direction: EndpointDirection) -> &mut BTreeMap<String, DataType> {
        match direction {
            EndpointDirection::Input => &mut self.dynamic_inputs,
            EndpointDirection::Output => &mut self.dynamic_outputs,
        }
    }

    // ----- endpoint metadata -----

    pub fn metadata(&self, direction: EndpointDirection) -> &EndpointMetadata {
        match direction {
            EndpointDirection::Input => &self.input_metadata,
            EndpointDirection::Output => &self.output_metadata,
        }
    }

    pub fn endpoint_metadata(
        &self,
        direction: EndpointDirection,
        endpoint: &str,
    ) -> Option<&BTreeMap<String, ConfigValue>> {
        self.metadata(direction).get(endpoint)
    }

    /// Attach a metadata value (bounds, weights, goals, ...) to an endpoint
    pub fn set_endpoint_metadata(
        &mut self,
        direction: EndpointDirection,
        endpoint: impl Into<String>,
        key: impl Into<String>,
        value: ConfigValue,
    ) {
        self.metadata_mut(direction)
            .entry(endpoint.into())
            .or_default()
            .insert(key.into(), value);
    }

    fn metadata_mut(&mut self, direction: EndpointDirection) -> &mut EndpointMetadata {
        match direction {
            EndpointDirection::Input => &mut self.input_metadata,
            EndpointDirection::Output => &mut self.output_metadata,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn optimizer() -> ComponentDescriptor {
        ComponentDescriptor::new("org.example.Optimizer_Optimizer", "Optimizer", "1.0")
            .with_input("objective", DataType::Double)
            .with_output("design", DataType::Double)
            .with_configuration("algorithm", DataType::String, Some("nsga2".into()))
            .with_configuration("iterations", DataType::Integer, None)
    }

    #[test]
    fn new_node_starts_with_component_defaults() {
        let node = Node::new("Optimizer", optimizer());
        assert_eq!(node.current_profile_id(), DEFAULT_PROFILE);
        assert_eq!(
            node.configuration_value("algorithm"),
            Some(&ConfigValue::String("nsga2".into()))
        );
        assert_eq!(node.configuration_value("iterations"), None);
        assert!(uuid::Uuid::parse_str(node.identifier()).is_ok());
    }

    #[test]
    fn profiles_clone_switch_and_remove() {
        let mut node = Node::new("Optimizer", optimizer());
        node.add_profile("fast", Some(DEFAULT_PROFILE)).unwrap();
        node.set_current_profile("fast").unwrap();
        node.set_configuration_value("iterations", Some(ConfigValue::Integer(5)));

        assert_eq!(node.configuration_value("algorithm"), Some(&"nsga2".into()));
        assert_eq!(node.default_configuration().get("iterations"), None);

        node.remove_profile("fast").unwrap();
        assert_eq!(node.current_profile_id(), DEFAULT_PROFILE);
        assert!(matches!(
            node.remove_profile(DEFAULT_PROFILE),
            Err(WorkflowError::Profile(_))
        ));
        assert!(node.set_current_profile("missing").is_err());
        assert!(node.add_profile("copy", Some("missing")).is_err());
    }

    #[test]
    fn validation_rejects_collisions_without_failing() {
        let mut node = Node::new("Optimizer", optimizer());
        node.add_dynamic_endpoint(EndpointDirection::Input, "x1", DataType::Double)
            .unwrap();

        assert!(!node.validate_input_name("objective"));
        assert!(!node.validate_input_name("x1"));
        assert!(!node.validate_input_name(""));
        assert!(node.validate_input_name("x2"));
        // namespaces are per direction
        assert!(node.validate_output_name("x1"));

        assert!(node.validate_output_type("java.lang.Long"));
        assert!(!node.validate_output_type("java.io.File"));
    }

    #[test]
    fn rename_moves_metadata_and_remove_is_idempotent() {
        let mut node = Node::new("Optimizer", optimizer());
        node.add_dynamic_endpoint(EndpointDirection::Output, "f", DataType::Double)
            .unwrap();
        node.set_endpoint_metadata(EndpointDirection::Output, "f", "weight", 2.0.into());

        let former = node
            .change_dynamic_endpoint(EndpointDirection::Output, "f", "g", DataType::Long)
            .unwrap();
        assert_eq!(former, DataType::Double);
        assert_eq!(node.endpoint_type(EndpointDirection::Output, "g"), Some(DataType::Long));
        assert!(node.endpoint_metadata(EndpointDirection::Output, "f").is_none());
        assert!(node.endpoint_metadata(EndpointDirection::Output, "g").is_some());

        assert_eq!(
            node.remove_dynamic_endpoint(EndpointDirection::Output, "g"),
            Some(DataType::Long)
        );
        assert_eq!(node.remove_dynamic_endpoint(EndpointDirection::Output, "g"), None);
    }
}
