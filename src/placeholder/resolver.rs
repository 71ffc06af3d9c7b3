/// Placeholder resolution engine
///
/// Discovers `${...}` references in node configurations and keeps their current
/// values per scope: instance-scoped values keyed by node identifier, type-scoped
/// values keyed by component type identifier. Two history ledgers record the
/// values users entered, one keyed `workflow.type.name` and one keyed
/// `instance.name`; re-entering a known value moves it to the end.
///
/// All maps sit behind one lock. Readers may run concurrently, setters are
/// exclusive. The settings store is only awaited outside the lock.

use crate::error::Result;
use crate::placeholder::settings::{SettingsStore, StringListMap};
use crate::placeholder::syntax::{Placeholder, PlaceholderScope};
use crate::workflow::graph::WorkflowGraph;
use crate::workflow::value::ConfigValue;
use std::collections::{BTreeMap, HashMap, HashSet};
use std::sync::{Arc, RwLock, RwLockReadGuard, RwLockWriteGuard};

/// Settings map holding the type-scoped ledger
pub const TYPE_HISTORY_FILE: &str = "placeholderComponentHistory.json";

/// Settings map holding the instance-scoped ledger
pub const INSTANCE_HISTORY_FILE: &str = "placeholderInstanceHistory.json";

const KEY_SEPARATOR: char = '.';

/// Placeholder name to current value (`None` until the user supplies one)
pub type PlaceholderValues = BTreeMap<String, Option<String>>;

#[derive(Debug, Default)]
struct ResolverState {
    /// Node identifier -> placeholder values
    instance_placeholders: HashMap<String, PlaceholderValues>,
    /// Component type identifier -> placeholder values
    type_placeholders: HashMap<String, PlaceholderValues>,
    /// Component type identifier -> node identifiers containing placeholders
    instances_of_type: BTreeMap<String, Vec<String>>,
    /// `type.name` of encrypted placeholders
    encrypted: HashSet<String>,
    /// `workflow.type.name` -> values, most recent last
    type_history: StringListMap,
    /// `instance.name` -> values, most recent last
    instance_history: StringListMap,
}

/// Current values and history of the placeholders of one workflow
pub struct PlaceholderResolver {
    state: RwLock<ResolverState>,
    settings: Arc<dyn SettingsStore>,
}

impl PlaceholderResolver {
    pub fn new(settings: Arc<dyn SettingsStore>) -> Self {
        Self {
            state: RwLock::new(ResolverState::default()),
            settings,
        }
    }

    /// Discover the placeholders of a graph and load the stored history
    pub async fn for_workflow(graph: &WorkflowGraph, settings: Arc<dyn SettingsStore>) -> Result<Self> {
        let resolver = Self::new(settings);
        resolver.discover(graph);
        resolver.load_history().await?;
        Ok(resolver)
    }

    fn read(&self) -> RwLockReadGuard<'_, ResolverState> {
        self.state.read().unwrap_or_else(|e| e.into_inner())
    }

    fn write(&self) -> RwLockWriteGuard<'_, ResolverState> {
        self.state.write().unwrap_or_else(|e| e.into_inner())
    }

    // ----- discovery -----

    /// Register every placeholder found in the default profiles of a graph
    pub fn discover(&self, graph: &WorkflowGraph) {
        let mut found = 0;
        for node in graph.nodes() {
            for value in node.default_configuration().values().flatten() {
                if let ConfigValue::String(text) = value {
                    if self.add_placeholder(text, &node.component().identifier, node.identifier()) {
                        found += 1;
                    }
                }
            }
        }
        tracing::debug!("🔍 Discovered {} placeholder reference(s) in workflow {}", found, graph.identifier());
    }

    /// Register one placeholder reference found on a node; `false` if `text` is no placeholder
    pub fn add_placeholder(&self, text: &str, type_id: &str, instance_id: &str) -> bool {
        let Some(placeholder) = Placeholder::parse(text) else {
            return false;
        };
        let mut state = self.write();

        let instances = state.instances_of_type.entry(type_id.to_string()).or_default();
        if !instances.iter().any(|id| id == instance_id) {
            instances.push(instance_id.to_string());
        }

        let scope_map = match placeholder.scope {
            PlaceholderScope::Type => state.type_placeholders.entry(type_id.to_string()),
            PlaceholderScope::Instance => state.instance_placeholders.entry(instance_id.to_string()),
        };
        scope_map.or_default().entry(placeholder.name.clone()).or_insert(None);

        if placeholder.encrypted {
            state.encrypted.insert(encryption_key(type_id, &placeholder.name));
        }
        true
    }

    // ----- values -----

    /// Store a value for a placeholder of a node
    ///
    /// The scope follows the placeholder syntax. With `record_history` the value
    /// is appended to both ledgers. Text that is no placeholder is ignored.
    pub fn set_value(
        &self,
        placeholder: &str,
        type_id: &str,
        instance_id: &str,
        value: &str,
        workflow_id: &str,
        record_history: bool,
    ) {
        let Some(parsed) = Placeholder::parse(placeholder) else {
            tracing::warn!("Ignoring value for malformed placeholder '{}'", placeholder);
            return;
        };
        let mut state = self.write();

        let scope_map = match parsed.scope {
            PlaceholderScope::Type => state.type_placeholders.entry(type_id.to_string()),
            PlaceholderScope::Instance => state.instance_placeholders.entry(instance_id.to_string()),
        };
        scope_map
            .or_default()
            .insert(parsed.name.clone(), Some(value.to_string()));

        if record_history {
            push_history(
                &mut state.type_history,
                type_history_key(workflow_id, type_id, &parsed.name),
                value,
            );
            push_history(
                &mut state.instance_history,
                instance_history_key(instance_id, &parsed.name),
                value,
            );
        }
    }

    /// Store a value for a type-scoped placeholder without naming a node
    ///
    /// Only the type ledger is updated.
    pub fn set_global_value(
        &self,
        placeholder: &str,
        type_id: &str,
        value: &str,
        workflow_id: &str,
        record_history: bool,
    ) {
        let Some(parsed) = Placeholder::parse(placeholder) else {
            tracing::warn!("Ignoring value for malformed placeholder '{}'", placeholder);
            return;
        };
        let mut state = self.write();

        if parsed.is_global() {
            state
                .type_placeholders
                .entry(type_id.to_string())
                .or_default()
                .insert(parsed.name.clone(), Some(value.to_string()));
        }
        if record_history {
            push_history(
                &mut state.type_history,
                type_history_key(workflow_id, type_id, &parsed.name),
                value,
            );
        }
    }

    /// Current value of an instance-scoped placeholder
    pub fn value(&self, name: &str, instance_id: &str) -> Option<String> {
        self.read()
            .instance_placeholders
            .get(instance_id)
            .and_then(|values| values.get(name).cloned().flatten())
    }

    /// Current value of a type-scoped placeholder
    pub fn global_value(&self, name: &str, type_id: &str) -> Option<String> {
        self.read()
            .type_placeholders
            .get(type_id)
            .and_then(|values| values.get(name).cloned().flatten())
    }

    /// Current value of a placeholder written in `${...}` form, in its own scope
    pub fn value_of(&self, placeholder: &str, type_id: &str, instance_id: &str) -> Option<String> {
        let parsed = Placeholder::parse(placeholder)?;
        match parsed.scope {
            PlaceholderScope::Type => self.global_value(&parsed.name, type_id),
            PlaceholderScope::Instance => self.value(&parsed.name, instance_id),
        }
    }

    // ----- lookups -----

    /// Node identifiers of a component type that contain placeholders
    pub fn instances_of_type(&self, type_id: &str) -> Vec<String> {
        self.read()
            .instances_of_type
            .get(type_id)
            .cloned()
            .unwrap_or_default()
    }

    /// Component types with at least one placeholder-bearing node
    pub fn placeholder_types(&self) -> Vec<String> {
        self.read().instances_of_type.keys().cloned().collect()
    }

    pub fn placeholders_of_instance(&self, instance_id: &str) -> PlaceholderValues {
        self.read()
            .instance_placeholders
            .get(instance_id)
            .cloned()
            .unwrap_or_default()
    }

    pub fn placeholders_of_type(&self, type_id: &str) -> PlaceholderValues {
        self.read()
            .type_placeholders
            .get(type_id)
            .cloned()
            .unwrap_or_default()
    }

    pub fn placeholder_names_of_instance(&self, instance_id: &str) -> Vec<String> {
        self.placeholders_of_instance(instance_id).into_keys().collect()
    }

    pub fn placeholder_names_of_type(&self, type_id: &str) -> Vec<String> {
        self.placeholders_of_type(type_id).into_keys().collect()
    }

    /// Instance placeholders rendered back to `${name}` / `${*.name}`
    pub fn rendered_placeholders_of_instance(&self, instance_id: &str) -> Vec<String> {
        let state = self.read();
        let type_id = state
            .instances_of_type
            .iter()
            .find(|(_, instances)| instances.iter().any(|id| id == instance_id))
            .map(|(type_id, _)| type_id.clone())
            .unwrap_or_default();

        state
            .instance_placeholders
            .get(instance_id)
            .map(|values| {
                values
                    .keys()
                    .map(|name| {
                        render(
                            name,
                            PlaceholderScope::Instance,
                            state.encrypted.contains(&encryption_key(&type_id, name)),
                        )
                    })
                    .collect()
            })
            .unwrap_or_default()
    }

    /// Type placeholders rendered back to `${global.name}` / `${global.*.name}`
    pub fn rendered_placeholders_of_type(&self, type_id: &str) -> Vec<String> {
        let state = self.read();
        state
            .type_placeholders
            .get(type_id)
            .map(|values| {
                values
                    .keys()
                    .map(|name| {
                        render(
                            name,
                            PlaceholderScope::Type,
                            state.encrypted.contains(&encryption_key(type_id, name)),
                        )
                    })
                    .collect()
            })
            .unwrap_or_default()
    }

    pub fn is_encrypted(&self, type_id: &str, name: &str) -> bool {
        self.read().encrypted.contains(&encryption_key(type_id, name))
    }

    // ----- history -----

    /// Values entered for an instance placeholder, most recent last
    pub fn instance_history(&self, name: &str, instance_id: &str) -> Vec<String> {
        self.read()
            .instance_history
            .get(&instance_history_key(instance_id, name))
            .cloned()
            .unwrap_or_default()
    }

    /// Values entered for a type placeholder within one workflow, most recent last
    pub fn type_history(&self, name: &str, type_id: &str, workflow_id: &str) -> Vec<String> {
        self.read()
            .type_history
            .get(&type_history_key(workflow_id, type_id, name))
            .cloned()
            .unwrap_or_default()
    }

    /// Values entered for `name` in any type ledger, de-duplicated, oldest first
    pub fn other_history_values(&self, name: &str) -> Vec<String> {
        let state = self.read();
        let mut proposals: Vec<String> = Vec::new();
        for (key, values) in &state.type_history {
            if names_placeholder(key, name) {
                for value in values {
                    if !proposals.contains(value) {
                        proposals.push(value.clone());
                    }
                }
            }
        }
        proposals
    }

    /// Latest value entered for `name` by any component type of the same workflow
    pub fn value_from_other_component(&self, name: &str, workflow_id: &str) -> Option<String> {
        let state = self.read();
        state
            .type_history
            .iter()
            .filter(|(key, _)| names_placeholder(key, name) && belongs_to_workflow(key, workflow_id))
            .filter_map(|(_, values)| values.last().cloned())
            .last()
    }

    /// Forget the history of a placeholder everywhere and persist the ledgers
    pub async fn delete_history(&self, type_id: &str, name: &str) -> Result<()> {
        {
            let mut state = self.write();
            let type_suffix = format!("{KEY_SEPARATOR}{type_id}{KEY_SEPARATOR}{name}");
            state.instance_history.retain(|key, _| !names_placeholder(key, name));
            state.type_history.retain(|key, _| !key.ends_with(&type_suffix));
        }
        self.save_history().await
    }

    /// Replace the in-memory ledgers with the stored ones
    pub async fn load_history(&self) -> Result<()> {
        let type_history = self.settings.load(TYPE_HISTORY_FILE).await?;
        let instance_history = self.settings.load(INSTANCE_HISTORY_FILE).await?;

        let mut state = self.write();
        state.type_history = type_history;
        state.instance_history = instance_history;
        Ok(())
    }

    /// Persist both ledgers
    pub async fn save_history(&self) -> Result<()> {
        let (type_history, instance_history) = {
            let state = self.read();
            (state.type_history.clone(), state.instance_history.clone())
        };
        self.settings.save(TYPE_HISTORY_FILE, &type_history).await?;
        self.settings.save(INSTANCE_HISTORY_FILE, &instance_history).await?;
        Ok(())
    }
}

impl std::fmt::Debug for PlaceholderResolver {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("PlaceholderResolver")
            .field("state", &self.state)
            .finish_non_exhaustive()
    }
}

fn encryption_key(type_id: &str, name: &str) -> String {
    format!("{type_id}{KEY_SEPARATOR}{name}")
}

fn type_history_key(workflow_id: &str, type_id: &str, name: &str) -> String {
    format!("{workflow_id}{KEY_SEPARATOR}{type_id}{KEY_SEPARATOR}{name}")
}

fn instance_history_key(instance_id: &str, name: &str) -> String {
    format!("{instance_id}{KEY_SEPARATOR}{name}")
}

/// Whether a ledger key ends in the placeholder `name` as a whole segment
fn names_placeholder(key: &str, name: &str) -> bool {
    key.strip_suffix(name)
        .is_some_and(|rest| rest.ends_with(KEY_SEPARATOR))
}

fn belongs_to_workflow(key: &str, workflow_id: &str) -> bool {
    key.strip_prefix(workflow_id)
        .is_some_and(|rest| rest.starts_with(KEY_SEPARATOR))
}

fn render(name: &str, scope: PlaceholderScope, encrypted: bool) -> String {
    Placeholder {
        name: name.to_string(),
        scope,
        encrypted,
    }
    .to_string()
}

/// Append to a ledger entry, moving an existing equal value to the end
fn push_history(ledger: &mut StringListMap, key: String, value: &str) {
    let entries = ledger.entry(key).or_default();
    entries.retain(|existing| existing != value);
    entries.push(value.to_string());
}
