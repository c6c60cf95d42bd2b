// Controllers and the decorator declaration capability

use crate::error::Result;
use crate::logging::debug;
use crate::response::Response;
use crate::route::Route;
use crate::toolbox::Toolbox;
use serde_json::json;

/// A controller executes a route and produces a response.
pub trait Controller: Send + Sync {
    /// Name reported in logs
    fn type_name(&self) -> &'static str {
        std::any::type_name::<Self>()
    }

    /// Execute the route
    fn execute(&self, route: &Route, toolbox: &Toolbox) -> Result<Response>;

    /// Decorator declarations, for controllers that make them
    fn as_decorable(&self) -> Option<&dyn Decorable> {
        None
    }
}

/// Controllers that declare an ordered list of decorators to wrap them in.
pub trait Decorable {
    /// Decorator identifiers, first-declared first
    fn decorators(&self) -> Vec<String>;

    fn add_decorator(&mut self, decorator: &str);

    fn remove_decorator(&mut self, decorator: &str);
}

/// Ordered, duplicate-free decorator identifiers.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct DecoratorList {
    decorators: Vec<String>,
}

impl DecoratorList {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn from_ids<I, S>(ids: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        let mut list = Self::new();
        for id in ids {
            list.add(&id.into());
        }
        list
    }

    pub fn add(&mut self, decorator: &str) {
        if !self.decorators.iter().any(|d| d == decorator) {
            self.decorators.push(decorator.to_string());
        }
    }

    pub fn remove(&mut self, decorator: &str) {
        self.decorators.retain(|d| d != decorator);
    }

    pub fn to_vec(&self) -> Vec<String> {
        self.decorators.clone()
    }

    pub fn is_empty(&self) -> bool {
        self.decorators.is_empty()
    }
}

/// Fallback controller: echoes the route it was asked to handle.
#[derive(Debug, Clone, Default)]
pub struct GenericController {
    decorators: DecoratorList,
}

impl GenericController {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_decorators<I, S>(ids: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        Self {
            decorators: DecoratorList::from_ids(ids),
        }
    }
}

impl Controller for GenericController {
    fn execute(&self, route: &Route, _toolbox: &Toolbox) -> Result<Response> {
        debug!(area = route.area(), action = route.action(), "Generic controller executing");
        Ok(Response::ok().with_data(json!({
            "area": route.area(),
            "action": route.action(),
            "arguments": route.arguments(),
        })))
    }

    fn as_decorable(&self) -> Option<&dyn Decorable> {
        if self.decorators.is_empty() {
            None
        } else {
            Some(self)
        }
    }
}

impl Decorable for GenericController {
    fn decorators(&self) -> Vec<String> {
        self.decorators.to_vec()
    }

    fn add_decorator(&mut self, decorator: &str) {
        self.decorators.add(decorator);
    }

    fn remove_decorator(&mut self, decorator: &str) {
        self.decorators.remove(decorator);
    }
}

/// Renders the fault carried by the `error/exception` route.
#[derive(Debug, Clone, Copy, Default)]
pub struct ErrorController;

impl Controller for ErrorController {
    fn execute(&self, route: &Route, _toolbox: &Toolbox) -> Result<Response> {
        let (status, message) = match route.failure() {
            Some(fault) => (fault.status_code(), fault.to_string()),
            None => (500, "Unknown error".to_string()),
        };
        Ok(Response::new(status).with_data(json!({
            "error": message,
            "status": status,
        })))
    }
}
