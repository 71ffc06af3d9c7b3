/// Component descriptors and platform identifiers
///
/// A descriptor is what an installation of a component type advertises: its fixed
/// endpoints, configuration definitions and defaults. Nodes own a copy of the
/// descriptor they were placed with.

use crate::workflow::value::{ConfigValue, DataType};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::fmt;

/// Separator between the class part and the human-readable part of a component id
pub const COMPONENT_ID_SEPARATOR: char = '_';

/// Identifier prefix for descriptors substituted when a component is unavailable
pub const PLACEHOLDER_COMPONENT_PREFIX: &str = "placeholder_";

/// Version used for placeholder descriptors
pub const UNKNOWN_VERSION: &str = "unknown";

/// Identifier of one platform (execution node) in the distributed system
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct PlatformId(String);

impl PlatformId {
    pub fn new(node_id: impl Into<String>) -> Self {
        Self(node_id.into())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for PlatformId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

/// Description of an installed component type
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ComponentDescriptor {
    /// Component type identifier (e.g. "org.example.Optimizer_Optimizer")
    pub identifier: String,
    /// Human-readable component name
    pub name: String,
    /// Component version string
    pub version: String,
    /// Platform the component is installed on or placed at
    #[serde(default)]
    pub platform: Option<PlatformId>,
    /// Fixed inputs declared by the component
    #[serde(default)]
    pub inputs: BTreeMap<String, DataType>,
    /// Fixed outputs declared by the component
    #[serde(default)]
    pub outputs: BTreeMap<String, DataType>,
    /// Configuration keys and their types
    #[serde(default)]
    pub configuration_definitions: BTreeMap<String, DataType>,
    /// Values a fresh configuration profile starts with
    #[serde(default)]
    pub default_configuration: BTreeMap<String, ConfigValue>,
    /// True when this descriptor stands in for an unavailable component
    #[serde(default)]
    pub placeholder: bool,
}

impl ComponentDescriptor {
    pub fn new(identifier: impl Into<String>, name: impl Into<String>, version: impl Into<String>) -> Self {
        Self {
            identifier: identifier.into(),
            name: name.into(),
            version: version.into(),
            platform: None,
            inputs: BTreeMap::new(),
            outputs: BTreeMap::new(),
            configuration_definitions: BTreeMap::new(),
            default_configuration: BTreeMap::new(),
            placeholder: false,
        }
    }

    /// Descriptor substituted when no installation of a component type is known
    ///
    /// Carries only the name so the graph stays loadable and editable.
    pub fn placeholder(name: impl Into<String>) -> Self {
        let name = name.into();
        let mut descriptor = Self::new(
            format!("{PLACEHOLDER_COMPONENT_PREFIX}{name}"),
            name,
            UNKNOWN_VERSION,
        );
        descriptor.placeholder = true;
        descriptor
    }

    /// Human-readable part of a component identifier (text after the first `_`)
    pub fn name_from_identifier(identifier: &str) -> &str {
        match identifier.find(COMPONENT_ID_SEPARATOR) {
            Some(pos) => &identifier[pos + 1..],
            None => identifier,
        }
    }

    pub fn with_platform(mut self, platform: PlatformId) -> Self {
        self.platform = Some(platform);
        self
    }

    pub fn with_input(mut self, name: impl Into<String>, data_type: DataType) -> Self {
        self.inputs.insert(name.into(), data_type);
        self
    }

    pub fn with_output(mut self, name: impl Into<String>, data_type: DataType) -> Self {
        self.outputs.insert(name.into(), data_type);
        self
    }

    /// Declare a configuration key, optionally with a default value
    pub fn with_configuration(
        mut self,
        key: impl Into<String>,
        data_type: DataType,
        default: Option<ConfigValue>,
    ) -> Self {
        let key = key.into();
        if let Some(value) = default {
            self.default_configuration.insert(key.clone(), value);
        }
        self.configuration_definitions.insert(key, data_type);
        self
    }
}
