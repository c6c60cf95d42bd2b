// Class registry: identifier -> component factory

use crate::controller::{Controller, ErrorController, GenericController};
use crate::decorator::{ControllerDecorator, LoggingDecorator};
use crate::error::{Error, Result};
use crate::logging::debug;
use crate::toolbox::ToolInstance;
use crate::view::{CliView, JsonView, PlainView, View};
use backend_log::Logger;
use parking_lot::RwLock;
use std::collections::HashMap;
use std::fmt;
use std::sync::Arc;

pub type ControllerFactory = Arc<dyn Fn() -> Box<dyn Controller> + Send + Sync>;
pub type DecoratorFactory =
    Arc<dyn Fn(Box<dyn Controller>) -> Box<dyn ControllerDecorator> + Send + Sync>;
pub type ViewFactory = Arc<dyn Fn() -> Arc<dyn View> + Send + Sync>;
pub type ToolFactory =
    Arc<dyn Fn(Option<&serde_json::Value>) -> Result<ToolInstance> + Send + Sync>;

/// A registered class, tagged by the capability it provides.
#[derive(Clone)]
pub enum Component {
    Controller(ControllerFactory),
    Decorator(DecoratorFactory),
    View(ViewFactory),
    Tool(ToolFactory),
}

impl Component {
    pub fn kind(&self) -> &'static str {
        match self {
            Component::Controller(_) => "controller",
            Component::Decorator(_) => "decorator",
            Component::View(_) => "view",
            Component::Tool(_) => "tool",
        }
    }
}

impl fmt::Debug for Component {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "Component::{}", self.kind())
    }
}

/// Registry of constructible classes keyed by dotted identifier
/// (`Core.Controllers.Error`, `Application.Views.Json`, ...).
///
/// Clones share the same entries.
#[derive(Clone, Default)]
pub struct ClassRegistry {
    classes: Arc<RwLock<HashMap<String, Component>>>,
}

impl ClassRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Registry pre-populated with the framework's `Core` classes.
    pub fn with_defaults() -> Self {
        let registry = Self::new();

        registry.register_controller("Core.Controller", GenericController::new);
        registry.register_controller("Core.Controllers.Error", || ErrorController);
        registry.register_decorator("Core.Decorators.Logging", LoggingDecorator::new);
        registry.register_view("Core.Views.Json", || JsonView);
        registry.register_view("Core.Views.Cli", || CliView);
        registry.register_view("Core.Views.Plain", || PlainView);
        registry.register_tool("Core.Utilities.Logger", logger_tool);

        registry
    }

    pub fn register(&self, id: impl Into<String>, component: Component) {
        let id = id.into();
        let kind = component.kind();
        self.classes.write().insert(id.clone(), component);
        debug!(class = %id, kind, "Class registered");
    }

    pub fn register_controller<C, F>(&self, id: impl Into<String>, factory: F)
    where
        C: Controller + 'static,
        F: Fn() -> C + Send + Sync + 'static,
    {
        self.register(
            id,
            Component::Controller(Arc::new(move || Box::new(factory()) as Box<dyn Controller>)),
        );
    }

    pub fn register_decorator<D, F>(&self, id: impl Into<String>, factory: F)
    where
        D: ControllerDecorator + 'static,
        F: Fn(Box<dyn Controller>) -> D + Send + Sync + 'static,
    {
        self.register(
            id,
            Component::Decorator(Arc::new(move |inner| {
                Box::new(factory(inner)) as Box<dyn ControllerDecorator>
            })),
        );
    }

    pub fn register_view<V, F>(&self, id: impl Into<String>, factory: F)
    where
        V: View + 'static,
        F: Fn() -> V + Send + Sync + 'static,
    {
        self.register(
            id,
            Component::View(Arc::new(move || Arc::new(factory()) as Arc<dyn View>)),
        );
    }

    pub fn register_tool<F>(&self, id: impl Into<String>, factory: F)
    where
        F: Fn(Option<&serde_json::Value>) -> Result<ToolInstance> + Send + Sync + 'static,
    {
        self.register(id, Component::Tool(Arc::new(factory)));
    }

    pub fn get(&self, id: &str) -> Option<Component> {
        self.classes.read().get(id).cloned()
    }

    pub fn contains(&self, id: &str) -> bool {
        self.classes.read().contains_key(id)
    }

    pub fn ids(&self) -> Vec<String> {
        let mut ids: Vec<String> = self.classes.read().keys().cloned().collect();
        ids.sort();
        ids
    }
}

impl fmt::Debug for ClassRegistry {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ClassRegistry")
            .field("classes", &self.ids())
            .finish()
    }
}

/// `Logger` tool: stderr by default, or appends to the file named by the argument.
fn logger_tool(argument: Option<&serde_json::Value>) -> Result<ToolInstance> {
    let logger = match argument {
        None | Some(serde_json::Value::Null) => Logger::new(),
        Some(serde_json::Value::String(path)) => {
            let file = std::fs::OpenOptions::new()
                .create(true)
                .append(true)
                .open(path)?;
            Logger::with_sink(Box::new(file))
        }
        Some(other) => {
            return Err(Error::ToolConstruction(format!(
                "Logger expects a file path, got {}",
                other
            )));
        }
    };
    Ok(ToolInstance::named("Core.Utilities.Logger", logger))
}
