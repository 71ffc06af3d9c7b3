/// Lock-free component registry using ArcSwap
///
/// Registration swaps the whole installation map, so lookups made while a
/// workflow document is being parsed never block on a concurrent registration.

use crate::workflow::component::{ComponentDescriptor, PlatformId};
use arc_swap::ArcSwap;
use std::collections::HashMap;

/// Source of installed component descriptors
pub trait ComponentRegistry: Send + Sync {
    /// Installations of a component type
    ///
    /// With `platform` set only installations on that platform are returned,
    /// otherwise installations on every known platform.
    fn installations(&self, identifier: &str, platform: Option<&PlatformId>) -> Vec<ComponentDescriptor>;
}

/// In-process registry of component installations
#[derive(Debug, Default)]
pub struct LocalComponentRegistry {
    /// Key: component identifier, Value: one descriptor per installation
    installations: ArcSwap<HashMap<String, Vec<ComponentDescriptor>>>,
}

impl LocalComponentRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Register an installation, replacing one on the same platform
    pub fn register(&self, descriptor: ComponentDescriptor) {
        self.installations.rcu(|current| {
            let mut updated = HashMap::clone(current);
            let entries = updated.entry(descriptor.identifier.clone()).or_default();
            entries.retain(|existing| existing.platform != descriptor.platform);
            entries.push(descriptor.clone());
            updated
        });

        tracing::info!(
            "📦 Registered component {} {} on {}",
            descriptor.identifier,
            descriptor.version,
            descriptor
                .platform
                .as_ref()
                .map(PlatformId::as_str)
                .unwrap_or("any platform")
        );
    }

    /// Remove the installation of a component type on a platform
    pub fn unregister(&self, identifier: &str, platform: Option<&PlatformId>) -> bool {
        let mut removed = false;
        self.installations.rcu(|current| {
            let mut updated = HashMap::clone(current);
            removed = false;
            if let Some(entries) = updated.get_mut(identifier) {
                let before = entries.len();
                entries.retain(|existing| existing.platform.as_ref() != platform);
                removed = entries.len() != before;
                if entries.is_empty() {
                    updated.remove(identifier);
                }
            }
            updated
        });

        if removed {
            tracing::info!("Unregistered component {}", identifier);
        }
        removed
    }

    /// All registered component identifiers
    pub fn identifiers(&self) -> Vec<String> {
        self.installations.load().keys().cloned().collect()
    }
}

impl ComponentRegistry for LocalComponentRegistry {
    fn installations(&self, identifier: &str, platform: Option<&PlatformId>) -> Vec<ComponentDescriptor> {
        self.installations
            .load()
            .get(identifier)
            .map(|entries| {
                entries
                    .iter()
                    .filter(|d| platform.is_none() || d.platform.as_ref() == platform)
                    .cloned()
                    .collect()
            })
            .unwrap_or_default()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn solver_on(platform: &str) -> ComponentDescriptor {
        ComponentDescriptor::new("org.example.Solver_Solver", "Solver", "2.1")
            .with_platform(PlatformId::new(platform))
    }

    #[test]
    fn lookup_filters_by_platform() {
        let registry = LocalComponentRegistry::new();
        registry.register(solver_on("cluster"));
        registry.register(solver_on("laptop"));

        let cluster = PlatformId::new("cluster");
        assert_eq!(registry.installations("org.example.Solver_Solver", Some(&cluster)).len(), 1);
        assert_eq!(registry.installations("org.example.Solver_Solver", None).len(), 2);
        assert!(registry.installations("org.example.Other_Other", None).is_empty());
    }

    #[test]
    fn re_registering_replaces_and_unregister_removes() {
        let registry = LocalComponentRegistry::new();
        registry.register(solver_on("cluster"));
        registry.register(solver_on("cluster"));
        assert_eq!(registry.installations("org.example.Solver_Solver", None).len(), 1);

        let cluster = PlatformId::new("cluster");
        assert!(registry.unregister("org.example.Solver_Solver", Some(&cluster)));
        assert!(!registry.unregister("org.example.Solver_Solver", Some(&cluster)));
        assert!(registry.identifiers().is_empty());
    }

    #[test]
    fn concurrent_registrations_are_all_kept() {
        let registry = LocalComponentRegistry::new();
        let barrier = std::sync::Barrier::new(16);

        std::thread::scope(|scope| {
            for i in 0..16 {
                let (registry, barrier) = (&registry, &barrier);
                scope.spawn(move || {
                    barrier.wait();
                    for round in 0..20 {
                        registry.register(ComponentDescriptor::new(
                            format!("org.example.C{i}_{round}"),
                            "C",
                            "1",
                        ));
                    }
                });
            }
        });

        assert_eq!(registry.identifiers().len(), 16 * 20);
    }
}
