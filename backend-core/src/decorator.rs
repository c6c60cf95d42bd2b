// Controller decorators and the decorator composer

use crate::controller::Controller;
use crate::error::{Error, Result};
use crate::logging::{debug, info, warn};
use crate::registry::{Component, DecoratorFactory};
use crate::resolver::ClassResolver;
use crate::response::Response;
use crate::route::Route;
use crate::toolbox::Toolbox;
use std::time::Instant;

/// Kind segment searched when a decorator is given by bare name.
pub const DECORATOR_KIND: &str = "Decorators";

/// A controller that wraps another controller.
pub trait ControllerDecorator: Controller {
    /// The wrapped controller
    fn inner(&self) -> &dyn Controller;
}

/// Logs every execution of the wrapped controller with its duration.
pub struct LoggingDecorator {
    inner: Box<dyn Controller>,
}

impl LoggingDecorator {
    pub fn new(inner: Box<dyn Controller>) -> Self {
        Self { inner }
    }
}

impl Controller for LoggingDecorator {
    fn execute(&self, route: &Route, toolbox: &Toolbox) -> Result<Response> {
        let start = Instant::now();
        info!(
            controller = self.inner.type_name(),
            area = route.area(),
            action = route.action(),
            "→ executing"
        );

        let result = self.inner.execute(route, toolbox);

        let duration = start.elapsed();
        match &result {
            Ok(response) => info!(
                status = response.status,
                ?duration,
                "← {}/{}",
                route.area(),
                route.action()
            ),
            Err(e) => warn!(error = %e, ?duration, "← {}/{}", route.area(), route.action()),
        }
        result
    }
}

impl ControllerDecorator for LoggingDecorator {
    fn inner(&self) -> &dyn Controller {
        self.inner.as_ref()
    }
}

/// Wraps controllers in the decorators they declare.
#[derive(Debug, Clone)]
pub struct DecoratorComposer {
    resolver: ClassResolver,
}

impl DecoratorComposer {
    pub fn new(resolver: ClassResolver) -> Self {
        Self { resolver }
    }

    /// Wrap `controller` in its declared decorators.
    ///
    /// Every identifier is checked before any wrapping happens; the first one
    /// that is not a registered decorator fails with
    /// [`Error::InvalidDecorator`] and the controller is dropped. The
    /// first-declared decorator ends up outermost.
    pub fn decorate(&self, controller: Box<dyn Controller>) -> Result<Box<dyn Controller>> {
        let ids = match controller.as_decorable() {
            Some(decorable) => decorable.decorators(),
            None => return Ok(controller),
        };

        let mut factories: Vec<(String, DecoratorFactory)> = Vec::with_capacity(ids.len());
        for id in &ids {
            match self.resolver.lookup(id, &[Some(DECORATOR_KIND)]) {
                Some((resolved, Component::Decorator(factory))) => {
                    factories.push((resolved, factory));
                }
                Some((resolved, other)) => {
                    warn!(decorator = %id, resolved = %resolved, kind = other.kind(), "Not a controller decorator");
                    return Err(Error::InvalidDecorator(id.clone()));
                }
                None => {
                    warn!(decorator = %id, "Unknown controller decorator");
                    return Err(Error::InvalidDecorator(id.clone()));
                }
            }
        }

        let mut current = controller;
        for (resolved, factory) in factories.into_iter().rev() {
            debug!(decorator = %resolved, "Decorating controller");
            current = factory(current);
        }
        Ok(current)
    }
}
