/// Placeholder substitution
///
/// `${...}` references inside node configurations are resolved at execution
/// time. This module parses the reference grammar, tracks values per scope and
/// keeps the value history users pick from.

// Reference grammar and rendering
pub mod syntax;

// Scoped values, discovery and history ledgers
pub mod resolver;

// Persistence of history ledgers
pub mod settings;

pub use resolver::PlaceholderResolver;
pub use settings::{FileSettingsStore, MemorySettingsStore, SettingsStore};
pub use syntax::{Placeholder, PlaceholderScope};
