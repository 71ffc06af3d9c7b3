/// Forward migration of persisted workflow documents
///
/// Each step upgrades a document from one schema version to the next. Steps run
/// in sequence starting at the document's version, so a version-0 document passes
/// through every step up to the current version exactly once. Steps work on the
/// document model only; no component resolution happens here.

use crate::error::Result;
use crate::persistence::document::{version_from_string, PersistedWorkflow};
use crate::persistence::tuple;
use crate::workflow::graph::CURRENT_WORKFLOW_VERSION;
use crate::workflow::value::DataType;
use serde::Deserialize;

/// Component whose nodes gained an interpreter setting in version 1
pub const LEGACY_PYTHON_COMPONENT: &str = "de.rcenvironment.rce.components.python.PythonComponent_Python";

/// Configuration key injected into legacy python nodes
pub const PYTHON_INSTALLATION_KEY: &str = "pythonInstallation";

/// Placeholder value the injected key points at
pub const PYTHON_INSTALLATION_PLACEHOLDER: &str = "${pathPlaceholder}";

/// One version step
struct MigrationStep {
    /// Version the step upgrades from; it produces `from + 1`
    from: u32,
    /// Whether documents at `from` carry anything this step changes
    needed: fn(&PersistedWorkflow) -> bool,
    apply: fn(&mut PersistedWorkflow),
}

const STEPS: &[MigrationStep] = &[MigrationStep {
    from: 0,
    needed: has_legacy_python_nodes,
    apply: add_python_installation,
}];

/// Read only the schema version of a document (0 when absent)
pub fn read_workflow_version(text: &str) -> Result<u32> {
    #[derive(Deserialize)]
    #[serde(rename_all = "camelCase")]
    struct VersionField {
        #[serde(default, deserialize_with = "version_from_string")]
        workflow_version: Option<u32>,
    }

    let field: VersionField = serde_json::from_str(text)?;
    Ok(field
        .workflow_version
        .unwrap_or(crate::workflow::graph::INITIAL_WORKFLOW_VERSION))
}

/// Whether any step from `from_version` on would change the document
pub fn is_update_needed(document: &PersistedWorkflow, from_version: u32) -> bool {
    STEPS
        .iter()
        .filter(|step| step.from >= from_version)
        .any(|step| (step.needed)(document))
}

/// Apply every step from `from_version` up to the current version
///
/// Documents already at the current version are returned unchanged.
pub fn update(mut document: PersistedWorkflow, from_version: u32) -> PersistedWorkflow {
    if from_version >= CURRENT_WORKFLOW_VERSION {
        return document;
    }
    for step in STEPS.iter().filter(|step| step.from >= from_version) {
        (step.apply)(&mut document);
        document.workflow_version = Some(step.from + 1);
        tracing::info!(
            "🔄 Migrated workflow {} from version {} to {}",
            document.identifier,
            step.from,
            step.from + 1
        );
    }
    document
}

fn has_legacy_python_nodes(document: &PersistedWorkflow) -> bool {
    document
        .nodes
        .iter()
        .any(|node| node.component.identifier == LEGACY_PYTHON_COMPONENT)
}

fn add_python_installation(document: &mut PersistedWorkflow) {
    let entry = tuple::concat(&[
        PYTHON_INSTALLATION_KEY,
        DataType::String.type_name(),
        PYTHON_INSTALLATION_PLACEHOLDER,
    ]);

    for node in document
        .nodes
        .iter_mut()
        .filter(|node| node.component.identifier == LEGACY_PYTHON_COMPONENT)
    {
        node.configuration
            .retain(|existing| tuple::split(existing).first().map(String::as_str) != Some(PYTHON_INSTALLATION_KEY));
        node.configuration.push(entry.clone());
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::persistence::document::{PersistedComponent, PersistedNode};

    fn legacy_document() -> PersistedWorkflow {
        PersistedWorkflow {
            identifier: "wf-legacy".into(),
            nodes: vec![
                PersistedNode {
                    identifier: "n1".into(),
                    name: "Python".into(),
                    location: "0:0".into(),
                    component: PersistedComponent {
                        identifier: LEGACY_PYTHON_COMPONENT.into(),
                        version: None,
                    },
                    ..Default::default()
                },
                PersistedNode {
                    identifier: "n2".into(),
                    name: "Other".into(),
                    location: "10:0".into(),
                    component: PersistedComponent {
                        identifier: "org.example.Other_Other".into(),
                        version: None,
                    },
                    ..Default::default()
                },
            ],
            ..Default::default()
        }
    }

    #[test]
    fn version_zero_python_nodes_get_installation_placeholder() {
        let document = legacy_document();
        assert!(is_update_needed(&document, 0));

        let updated = update(document, 0);
        assert_eq!(updated.workflow_version, Some(1));
        assert_eq!(
            updated.nodes[0].configuration,
            vec![r"pythonInstallation:java.lang.String:${pathPlaceholder}".to_string()]
        );
        assert!(updated.nodes[1].configuration.is_empty());
    }

    #[test]
    fn current_documents_are_left_alone() {
        let mut document = legacy_document();
        document.workflow_version = Some(1);

        assert!(!is_update_needed(&document, 1));
        assert_eq!(update(document.clone(), 1), document);
    }

    #[test]
    fn missing_version_defaults_to_zero() {
        assert_eq!(read_workflow_version(r#"{"identifier": "a"}"#).unwrap(), 0);
        assert_eq!(read_workflow_version(r#"{"identifier": "a", "workflowVersion": "1"}"#).unwrap(), 1);
    }
}
