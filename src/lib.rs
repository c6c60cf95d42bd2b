// Backend - an extensible resolution and dispatch engine
//
// Requests are mapped through a namespace override chain to a view, a
// controller and the decorators the controller declares, with a shared
// toolbox supplying collaborators to all of them.

// Re-export core functionality
pub use backend_core::*;

// Numbered-severity logging
pub use backend_log;

// Re-export optional crates
#[cfg(feature = "config")]
pub use backend_config;

/// Prelude module for convenient imports
pub mod prelude {
    pub use backend_core::{
        Application, ClassRegistry, ClassResolver, ConfigSource, Controller, ControllerDecorator,
        Decorable, Error, Kernel, NamespaceChain, Request, Response, Route, ToolSpec, Toolbox,
        View, ViewDescriptor, ViewRegistry,
    };

    #[cfg(feature = "config")]
    pub use backend_config::{Config, SiteState};
}
