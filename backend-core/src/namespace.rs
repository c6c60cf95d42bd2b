// Namespace chain: override precedence for class resolution

use crate::logging::{debug, trace};
use parking_lot::RwLock;
use std::sync::Arc;

/// Namespace that is always present in every chain.
pub const BASE_NAMESPACE: &str = "Base";
/// Framework namespace, registered at the front of the chain.
pub const CORE_NAMESPACE: &str = "Core";
/// Application namespace, registered at the end of the chain.
pub const APPLICATION_NAMESPACE: &str = "Application";

/// Ordered list of namespaces.
///
/// Later entries override earlier ones during resolution. Clones share the
/// same underlying chain, so a registration through one handle is visible to
/// every resolver built from the others.
#[derive(Clone, Debug)]
pub struct NamespaceChain {
    namespaces: Arc<RwLock<Vec<String>>>,
}

impl NamespaceChain {
    /// A chain holding only the base namespace.
    pub fn new() -> Self {
        Self {
            namespaces: Arc::new(RwLock::new(vec![BASE_NAMESPACE.to_string()])),
        }
    }

    /// The chain every application starts from: `[Core, Base, Application]`.
    pub fn with_defaults() -> Self {
        let chain = Self::new();
        chain.register_defaults();
        chain
    }

    pub(crate) fn register_defaults(&self) {
        self.register(CORE_NAMESPACE, true);
        self.register(APPLICATION_NAMESPACE, false);
    }

    /// Register a namespace. No-op when it is already present.
    ///
    /// Returns `true` when the chain changed.
    pub fn register(&self, namespace: impl Into<String>, prepend: bool) -> bool {
        let namespace = namespace.into();
        let mut namespaces = self.namespaces.write();
        if namespaces.iter().any(|ns| *ns == namespace) {
            trace!(namespace = %namespace, "Namespace already registered");
            return false;
        }

        if prepend {
            namespaces.insert(0, namespace.clone());
        } else {
            namespaces.push(namespace.clone());
        }
        debug!(namespace = %namespace, prepend, len = namespaces.len(), "Namespace registered");
        true
    }

    /// Namespaces in registration order.
    pub fn namespaces(&self) -> Vec<String> {
        self.namespaces.read().clone()
    }

    /// Namespaces in search order: most recently registered first.
    pub fn search_order(&self) -> Vec<String> {
        self.namespaces.read().iter().rev().cloned().collect()
    }

    pub fn contains(&self, namespace: &str) -> bool {
        self.namespaces.read().iter().any(|ns| ns == namespace)
    }

    pub fn len(&self) -> usize {
        self.namespaces.read().len()
    }

    /// Always `false`: the base namespace cannot be removed.
    pub fn is_empty(&self) -> bool {
        self.namespaces.read().is_empty()
    }
}

impl Default for NamespaceChain {
    fn default() -> Self {
        Self::new()
    }
}
