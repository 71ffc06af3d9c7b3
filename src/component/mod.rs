/// Component registry
///
/// Answers which installations of a component type exist and where. The codec
/// consults it while loading documents; the server fills the local registry from
/// whatever components the platform hosts.

// Registry trait and the in-process, hot-swappable implementation
pub mod registry;

pub use registry::{ComponentRegistry, LocalComponentRegistry};
