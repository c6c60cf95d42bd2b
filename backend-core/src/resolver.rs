// Backend class resolution over the namespace chain

use crate::logging::trace;
use crate::namespace::NamespaceChain;
use crate::registry::{ClassRegistry, Component};

/// Resolves bare class names to the most specific registered class.
///
/// Namespaces are searched most recently registered first, so an application
/// namespace registered after the framework shadows framework classes of the
/// same name while unshadowed names fall through to the framework.
#[derive(Clone, Debug)]
pub struct ClassResolver {
    namespaces: NamespaceChain,
    classes: ClassRegistry,
}

impl ClassResolver {
    pub fn new(namespaces: NamespaceChain, classes: ClassRegistry) -> Self {
        Self {
            namespaces,
            classes,
        }
    }

    /// Build `<namespace>.<kind>.<base>`, omitting the kind when absent.
    pub fn qualify(namespace: &str, kind: Option<&str>, base: &str) -> String {
        match kind {
            Some(kind) => format!("{}.{}.{}", namespace, kind, base),
            None => format!("{}.{}", namespace, base),
        }
    }

    /// Candidate identifiers in search order.
    pub fn candidates(&self, base: &str, kind: Option<&str>) -> Vec<String> {
        self.namespaces
            .search_order()
            .iter()
            .map(|namespace| Self::qualify(namespace, kind, base))
            .collect()
    }

    /// The first candidate that is registered, or `base` unchanged.
    ///
    /// Never fails; callers treat an unregistered result as "not found".
    pub fn resolve(&self, base: &str, kind: Option<&str>) -> String {
        for candidate in self.candidates(base, kind) {
            if self.classes.contains(&candidate) {
                trace!(base, kind, resolved = %candidate, "Backend class resolved");
                return candidate;
            }
        }
        trace!(base, kind, "No backend class found, falling back to base name");
        base.to_string()
    }

    /// Look up a class given either an exact identifier or a bare name.
    ///
    /// The identifier is tried as-is first, then resolved through the chain
    /// once per entry of `kinds`.
    pub fn lookup(&self, id: &str, kinds: &[Option<&str>]) -> Option<(String, Component)> {
        if let Some(component) = self.classes.get(id) {
            return Some((id.to_string(), component));
        }
        kinds.iter().find_map(|kind| {
            let resolved = self.resolve(id, *kind);
            self.classes
                .get(&resolved)
                .map(|component| (resolved, component))
        })
    }

    pub fn namespaces(&self) -> &NamespaceChain {
        &self.namespaces
    }

    pub fn classes(&self) -> &ClassRegistry {
        &self.classes
    }
}
