/// Workflow codec: graph <-> persisted document
///
/// Serialization writes every configuration and metadata value as a
/// `key:type:value` tuple so the reader can rebuild typed values without any
/// component schema. Parsing resolves each node's component through the
/// component registry and never fails on an unknown component: a placeholder
/// descriptor keeps the graph loadable and editable.

use crate::component::ComponentRegistry;
use crate::error::{Result, WorkflowError};
use crate::persistence::document::{
    error_at, PersistedComponent, PersistedConnection, PersistedNode, PersistedProfile,
    PersistedWorkflow,
};
use crate::persistence::{migration, tuple};
use crate::workflow::component::{ComponentDescriptor, PlatformId};
use crate::workflow::graph::{Connection, WorkflowGraph};
use crate::workflow::node::{ConfigurationMap, EndpointDirection, Node, DEFAULT_PROFILE};
use crate::workflow::value::{ConfigValue, DataType};
use std::collections::BTreeMap;
use std::path::Path;
use std::sync::Arc;

/// Reads and writes workflow documents
#[derive(Clone)]
pub struct WorkflowCodec {
    /// Installed components used to resolve node component references
    registry: Arc<dyn ComponentRegistry>,
    /// Platform this process runs on, second choice during resolution
    local_platform: PlatformId,
}

impl WorkflowCodec {
    pub fn new(registry: Arc<dyn ComponentRegistry>, local_platform: PlatformId) -> Self {
        Self {
            registry,
            local_platform,
        }
    }

    // ----- writing -----

    /// Render a graph as document text
    pub fn serialize(&self, graph: &WorkflowGraph) -> Result<String> {
        self.to_document(graph).to_text()
    }

    /// Build the document model of a graph
    pub fn to_document(&self, graph: &WorkflowGraph) -> PersistedWorkflow {
        PersistedWorkflow {
            identifier: graph.identifier().to_string(),
            workflow_version: Some(graph.version),
            name: graph.name.clone(),
            platform: graph.target_platform.as_ref().map(|p| p.to_string()),
            additional_information: graph.additional_information.clone(),
            nodes: graph.nodes().map(write_node).collect(),
            connections: graph
                .connections()
                .iter()
                .map(|c| PersistedConnection {
                    source: c.source.clone(),
                    output: c.output.clone(),
                    target: c.target.clone(),
                    input: c.input.clone(),
                })
                .collect(),
        }
    }

    /// Write a graph to a file
    pub async fn write_to_path(&self, graph: &WorkflowGraph, path: impl AsRef<Path>) -> Result<()> {
        let text = self.serialize(graph)?;
        tokio::fs::write(path.as_ref(), text).await?;
        tracing::info!("💾 Wrote workflow {} to {}", graph.identifier(), path.as_ref().display());
        Ok(())
    }

    // ----- reading -----

    /// Parse document text without migration
    pub fn parse(&self, text: &str) -> Result<WorkflowGraph> {
        let document = PersistedWorkflow::from_text(text)?;
        self.from_document(&document, text)
    }

    /// Parse document text, migrating older schema versions first
    pub fn read_with_migration(&self, text: &str) -> Result<WorkflowGraph> {
        let document = PersistedWorkflow::from_text(text)?;
        let version = document.version();
        if !migration::is_update_needed(&document, version) {
            return self.from_document(&document, text);
        }

        let migrated = migration::update(document, version);
        let migrated_text = migrated.to_text()?;
        self.from_document(&migrated, &migrated_text)
    }

    /// Read a graph from a file, migrating if needed
    pub async fn read_from_path(&self, path: impl AsRef<Path>) -> Result<WorkflowGraph> {
        let text = tokio::fs::read_to_string(path.as_ref()).await?;
        self.read_with_migration(&text)
    }

    /// Build a graph from the document model
    ///
    /// `text` is the document source, used to locate errors found after
    /// deserialization.
    pub fn from_document(&self, document: &PersistedWorkflow, text: &str) -> Result<WorkflowGraph> {
        let mut graph = WorkflowGraph::new(document.identifier.clone());
        graph.version = document.version();
        graph.name = document.name.clone();
        graph.target_platform = document.platform.as_deref().map(PlatformId::new);
        graph.additional_information = document.additional_information.clone();

        for persisted in &document.nodes {
            let node = self.read_node(persisted, text)?;
            graph.add_node(node);
        }

        for persisted in &document.connections {
            let connection = Connection::new(
                persisted.source.clone(),
                persisted.output.clone(),
                persisted.target.clone(),
                persisted.input.clone(),
            );
            graph.add_connection(connection).map_err(|err| match err {
                WorkflowError::NodeNotFound(id) => {
                    error_at(text, &id, format!("connection references unknown node {id}"))
                }
                other => other,
            })?;
        }

        tracing::debug!(
            "📥 Parsed workflow {} (version {}, {} nodes, {} connections)",
            graph.identifier(),
            graph.version,
            graph.node_count(),
            graph.connections().len()
        );
        Ok(graph)
    }

    fn read_node(&self, persisted: &PersistedNode, text: &str) -> Result<Node> {
        let (x, y) = parse_location(&persisted.location)
            .ok_or_else(|| error_at(text, &persisted.location, "invalid location definition"))?;

        let platform = persisted.platform.as_deref().map(PlatformId::new);
        let component = self.resolve_component(&persisted.component, platform.as_ref());

        let mut node = Node::with_identifier(persisted.identifier.clone(), persisted.name.clone(), component);
        node.set_location(x, y);

        let mut defaults = node.default_configuration().clone();
        for entry in &persisted.configuration {
            let (key, value) = parse_entry(entry).ok_or_else(|| error_at(text, entry, "invalid configuration entry"))?;
            defaults.insert(key, value);
        }
        node.set_configuration(DEFAULT_PROFILE, defaults);

        for profile in &persisted.configurations {
            let mut values = ConfigurationMap::new();
            for entry in &profile.map {
                let (key, value) = parse_entry(entry).ok_or_else(|| error_at(text, entry, "invalid configuration entry"))?;
                values.insert(key, value);
            }
            node.set_configuration(&profile.identifier, values);
        }

        if let Some(current) = &persisted.current_configuration_identifier {
            if node.set_current_profile(current).is_err() {
                tracing::warn!(
                    "Node {} selects unknown profile '{}', using the default profile",
                    persisted.identifier,
                    current
                );
            }
        }

        for (direction, declarations) in [
            (EndpointDirection::Input, &persisted.add_input),
            (EndpointDirection::Output, &persisted.add_output),
        ] {
            for declaration in declarations {
                read_endpoint(&mut node, direction, declaration, text)?;
            }
        }

        for (direction, blocks) in [
            (EndpointDirection::Input, &persisted.input_meta_data),
            (EndpointDirection::Output, &persisted.output_meta_data),
        ] {
            for (endpoint, entries) in blocks {
                for entry in entries {
                    let (key, value) =
                        parse_entry(entry).ok_or_else(|| error_at(text, entry, "invalid metadata entry"))?;
                    if let Some(value) = value {
                        node.set_endpoint_metadata(direction, endpoint.clone(), key, value);
                    }
                }
            }
        }

        Ok(node)
    }

    /// Choose the descriptor for a node's component reference
    ///
    /// Preference: installation on the requested platform, then on the local
    /// platform, then any installation, then a placeholder. The result is a copy
    /// placed on the requested platform.
    pub fn resolve_component(
        &self,
        reference: &PersistedComponent,
        platform: Option<&PlatformId>,
    ) -> ComponentDescriptor {
        let identifier = reference.identifier.as_str();

        let resolved = platform
            .and_then(|p| self.registry.installations(identifier, Some(p)).into_iter().next())
            .or_else(|| {
                self.registry
                    .installations(identifier, Some(&self.local_platform))
                    .into_iter()
                    .next()
            })
            .or_else(|| self.registry.installations(identifier, None).into_iter().next());

        let mut descriptor = match resolved {
            Some(descriptor) => descriptor,
            None => {
                let name = ComponentDescriptor::name_from_identifier(identifier);
                tracing::warn!(
                    "⚠️ No installation of component {} known, substituting placeholder '{}'",
                    identifier,
                    name
                );
                ComponentDescriptor::placeholder(name)
            }
        };
        descriptor.platform = platform.cloned();
        descriptor
    }
}

impl std::fmt::Debug for WorkflowCodec {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("WorkflowCodec")
            .field("local_platform", &self.local_platform)
            .finish_non_exhaustive()
    }
}

fn write_node(node: &Node) -> PersistedNode {
    let definitions = &node.component().configuration_definitions;

    let configurations = node
        .profile_ids()
        .filter(|id| *id != DEFAULT_PROFILE)
        .map(|id| PersistedProfile {
            identifier: id.to_string(),
            map: node
                .configuration(id)
                .map(|values| write_entries(values, definitions))
                .unwrap_or_default(),
        })
        .collect();

    let current = node.current_profile_id();

    PersistedNode {
        identifier: node.identifier().to_string(),
        name: node.name.clone(),
        location: format!("{}{}{}", node.x, tuple::SEPARATOR, node.y),
        platform: node.platform().map(|p| p.to_string()),
        component: PersistedComponent {
            identifier: node.component().identifier.clone(),
            version: Some(node.component().version.clone()),
        },
        configuration: write_entries(node.default_configuration(), definitions),
        configurations,
        current_configuration_identifier: (current != DEFAULT_PROFILE).then(|| current.to_string()),
        add_input: write_declarations(node.dynamic_endpoints(EndpointDirection::Input)),
        add_output: write_declarations(node.dynamic_endpoints(EndpointDirection::Output)),
        input_meta_data: write_metadata(node, EndpointDirection::Input),
        output_meta_data: write_metadata(node, EndpointDirection::Output),
    }
}

/// Configuration tuples; unset values take their type from the definitions and
/// are skipped when the component does not define the key
fn write_entries(values: &ConfigurationMap, definitions: &BTreeMap<String, DataType>) -> Vec<String> {
    values
        .iter()
        .filter_map(|(key, value)| match value {
            Some(value) => Some(tuple::concat(&[
                key.as_str(),
                value.data_type().type_name(),
                value.to_string().as_str(),
            ])),
            None => definitions
                .get(key)
                .map(|data_type| tuple::concat(&[key.as_str(), data_type.type_name(), ""])),
        })
        .collect()
}

fn write_declarations(endpoints: &BTreeMap<String, DataType>) -> Vec<String> {
    endpoints
        .iter()
        .map(|(name, data_type)| tuple::concat(&[name.as_str(), data_type.type_name()]))
        .collect()
}

fn write_metadata(node: &Node, direction: EndpointDirection) -> BTreeMap<String, Vec<String>> {
    node.metadata(direction)
        .iter()
        .filter(|(_, values)| !values.is_empty())
        .map(|(endpoint, values)| {
            let entries = values
                .iter()
                .map(|(key, value)| {
                    tuple::concat(&[key.as_str(), value.data_type().type_name(), value.to_string().as_str()])
                })
                .collect();
            (endpoint.clone(), entries)
        })
        .collect()
}

fn parse_location(location: &str) -> Option<(i32, i32)> {
    let parts = tuple::split(location);
    let x = parts.first()?.trim().parse().ok()?;
    let y = parts.get(1)?.trim().parse().ok()?;
    Some((x, y))
}

/// Parse a `key:type[:value]` tuple
///
/// `None` for tuples without a type part. Unknown types and unparseable values
/// yield an absent value.
fn parse_entry(entry: &str) -> Option<(String, Option<ConfigValue>)> {
    let mut parts = tuple::split(entry).into_iter();
    let key = parts.next()?;
    let type_name = parts.next()?;
    // A value containing unescaped separators from foreign writers is rejoined.
    let raw = parts.collect::<Vec<_>>().join(":");

    let Some(data_type) = DataType::from_type_name(&type_name) else {
        tracing::warn!("Unsupported type {} for key {}, loading it without a value", type_name, key);
        return Some((key, None));
    };
    if raw.is_empty() {
        return Some((key, None));
    }
    let value = data_type.parse_value(&raw);
    if value.is_none() {
        tracing::warn!("Value '{}' of key {} is not a valid {}, loading it without a value", raw, key, data_type);
    }
    Some((key, value))
}

fn read_endpoint(node: &mut Node, direction: EndpointDirection, declaration: &str, text: &str) -> Result<()> {
    let parts = tuple::split(declaration);
    let (Some(name), Some(type_name)) = (parts.first(), parts.get(1)) else {
        return Err(error_at(text, declaration, format!("invalid {direction} declaration")));
    };
    let Some(data_type) = DataType::from_type_name(type_name) else {
        tracing::warn!("Skipping dynamic {} {} of unsupported type {}", direction, name, type_name);
        return Ok(());
    };
    if let Err(err) = node.add_dynamic_endpoint(direction, name, data_type) {
        tracing::warn!("Skipping dynamic {} on node {}: {}", direction, node.identifier(), err);
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::component::LocalComponentRegistry;

    const SOLVER: &str = "org.example.solver.Solver_Solver";

    fn codec_with(registry: LocalComponentRegistry) -> WorkflowCodec {
        WorkflowCodec::new(Arc::new(registry), PlatformId::new("local"))
    }

    fn reference(identifier: &str) -> PersistedComponent {
        PersistedComponent {
            identifier: identifier.to_string(),
            version: None,
        }
    }

    fn solver_on(platform: &str, version: &str) -> ComponentDescriptor {
        ComponentDescriptor::new(SOLVER, "Solver", version).with_platform(PlatformId::new(platform))
    }

    #[test]
    fn resolution_prefers_requested_then_local_then_any() {
        let registry = LocalComponentRegistry::new();
        registry.register(solver_on("remote", "r"));
        registry.register(solver_on("local", "l"));
        registry.register(solver_on("cluster", "c"));
        let codec = codec_with(registry);

        let cluster = PlatformId::new("cluster");
        let on_cluster = codec.resolve_component(&reference(SOLVER), Some(&cluster));
        assert_eq!(on_cluster.version, "c");
        assert_eq!(on_cluster.platform, Some(cluster));

        let elsewhere = PlatformId::new("elsewhere");
        let fallback = codec.resolve_component(&reference(SOLVER), Some(&elsewhere));
        assert_eq!(fallback.version, "l");
        assert_eq!(fallback.platform, Some(elsewhere));
    }

    #[test]
    fn resolution_takes_any_installation_without_local_one() {
        let registry = LocalComponentRegistry::new();
        registry.register(solver_on("remote", "r"));
        let codec = codec_with(registry);

        let resolved = codec.resolve_component(&reference(SOLVER), None);
        assert_eq!(resolved.version, "r");
        assert!(resolved.platform.is_none());
    }

    #[test]
    fn unknown_component_becomes_placeholder() {
        let codec = codec_with(LocalComponentRegistry::new());
        let resolved = codec.resolve_component(&reference("de.example.Missing_Missing Tool"), None);
        assert!(resolved.placeholder);
        assert_eq!(resolved.name, "Missing Tool");
    }

    #[test]
    fn entries_tolerate_bad_values() {
        assert_eq!(
            parse_entry("iterations:java.lang.Integer:ten"),
            Some(("iterations".to_string(), None))
        );
        assert_eq!(parse_entry("date:java.util.Date:2020"), Some(("date".to_string(), None)));
        assert_eq!(
            parse_entry("flag:java.lang.Boolean:true"),
            Some(("flag".to_string(), Some(ConfigValue::Boolean(true))))
        );
        assert_eq!(parse_entry("broken"), None);
    }

    #[test]
    fn unset_values_without_definition_are_skipped() {
        let mut values = ConfigurationMap::new();
        values.insert("known".into(), None);
        values.insert("unknown".into(), None);
        let mut definitions = BTreeMap::new();
        definitions.insert("known".to_string(), DataType::Long);

        assert_eq!(write_entries(&values, &definitions), vec!["known:java.lang.Long:".to_string()]);
    }

    #[test]
    fn connection_to_unknown_node_is_a_located_parse_error() {
        let codec = codec_with(LocalComponentRegistry::new());
        let text = r#"{
  "identifier": "wf",
  "workflowVersion": "1",
  "nodes": [
    { "identifier": "a", "name": "A", "location": "0:0", "component": { "identifier": "x_X" } }
  ],
  "connections": [
    { "source": "a", "output": "o", "target": "ghost", "input": "i" }
  ]
}"#;
        let err = codec.parse(text).unwrap_err();
        assert_eq!(err.line(), Some(8));
    }

    #[test]
    fn malformed_location_is_a_parse_error() {
        let codec = codec_with(LocalComponentRegistry::new());
        let text = r#"{
  "identifier": "wf",
  "nodes": [
    { "identifier": "a", "name": "A", "location": "left", "component": { "identifier": "x_X" } }
  ]
}"#;
        let err = codec.parse(text).unwrap_err();
        assert_eq!(err.line(), Some(4));
    }
}
