// Application: view setup, controller dispatch, output and fault recovery

use crate::decorator::DecoratorComposer;
use crate::error::{Error, Result, UnrecoverableFault};
use crate::logging::{debug, error, info, trace, warn};
use crate::namespace::{APPLICATION_NAMESPACE, NamespaceChain};
use crate::registry::{ClassRegistry, Component};
use crate::request::Request;
use crate::resolver::ClassResolver;
use crate::response::Response;
use crate::route::Route;
use crate::toolbox::{ToolInstance, ToolSpec, Toolbox};
use crate::view::{PlainView, View, ViewRegistry, ViewSelection, ViewSelector};
use backend_log::{LogMessage, Logger, Severity};
use std::fmt;
use std::io::Write;
use std::panic::{AssertUnwindSafe, catch_unwind};
use std::sync::Arc;

/// Kind segment searched for controllers.
pub const CONTROLLER_KIND: &str = "Controllers";
/// Base name of the fallback controller.
pub const DEFAULT_CONTROLLER: &str = "Controller";
/// Debug level used when the configuration does not set one.
pub const DEFAULT_DEBUG_LEVEL: u8 = 3;

/// Toolbox key of the configuration.
pub const CONFIG_TOOL: &str = "Config";
/// Toolbox key of the active view.
pub const VIEW_TOOL: &str = "View";
/// Toolbox key consulted by [`Application::log`].
pub const LOGGER_TOOL: &str = "Logger";

const LOGGER_CLASS: &str = "Core.Utilities.Logger";

/// Supplies the tools and debug level an application starts with.
pub trait ConfigSource: Send + Sync + 'static {
    /// Tool name and spec pairs, in registration order
    fn tools(&self) -> Vec<(String, ToolSpec)>;

    fn debug_level(&self) -> Option<u8> {
        None
    }
}

impl ConfigSource for Vec<(String, ToolSpec)> {
    fn tools(&self) -> Vec<(String, ToolSpec)> {
        self.clone()
    }
}

/// The shared registries every application in a process works against.
///
/// Clones share state, so applications built from the same kernel see each
/// other's namespace and class registrations.
#[derive(Debug, Clone, Default)]
pub struct Kernel {
    pub namespaces: NamespaceChain,
    pub classes: ClassRegistry,
    pub views: ViewRegistry,
    pub toolbox: Toolbox,
}

impl Kernel {
    /// Empty registries; only the base namespace is present.
    pub fn new() -> Self {
        Self::default()
    }

    /// Framework classes and the `Json` and `Cli` views.
    pub fn with_defaults() -> Self {
        Self {
            namespaces: NamespaceChain::new(),
            classes: ClassRegistry::with_defaults(),
            views: ViewRegistry::with_defaults(),
            toolbox: Toolbox::new(),
        }
    }

    pub fn resolver(&self) -> ClassResolver {
        ClassResolver::new(self.namespaces.clone(), self.classes.clone())
    }
}

/// The view an application renders through, as stored in the toolbox.
#[derive(Clone)]
pub struct ActiveView(pub Arc<dyn View>);

impl fmt::Debug for ActiveView {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_tuple("ActiveView").field(&self.0.name()).finish()
    }
}

/// One application per request.
///
/// `main` may be called several times with different routes to serve more
/// than one route from a single request.
pub struct Application {
    kernel: Kernel,
    request: Request,
    view: Arc<dyn View>,
    debug_level: u8,
}

impl Application {
    /// Set up the toolbox from `config` and pick the view for `request`.
    ///
    /// Never fails: when no view handles the request the bare
    /// [`PlainView`] is used and a warning is logged.
    pub fn new<C: ConfigSource>(kernel: &Kernel, config: C, request: Request) -> Self {
        kernel.namespaces.register_defaults();
        let resolver = kernel.resolver();

        let debug_level = config
            .debug_level()
            .filter(|level| *level > 0)
            .unwrap_or(DEFAULT_DEBUG_LEVEL);

        kernel.toolbox.clear();
        let tools = config.tools();
        kernel.toolbox.add_tool(
            CONFIG_TOOL,
            ToolSpec::Instance(ToolInstance::named(CONFIG_TOOL, config)),
            &resolver,
        );
        for (name, spec) in tools {
            kernel.toolbox.add_tool(&name, spec, &resolver);
        }

        let mut application = Self {
            kernel: kernel.clone(),
            request,
            view: Arc::new(PlainView),
            debug_level,
        };

        let selector = ViewSelector::new(resolver, kernel.views.clone());
        match selector.select(&application.request) {
            Ok(ViewSelection::Found(view)) => application.view = view,
            Ok(ViewSelection::Unrecognized) => {
                application.log(
                    &format!(
                        "View Exception: Unrecognized format: {}",
                        application.request.extension()
                    ),
                    2,
                    "Application",
                );
            }
            Err(e) => {
                application.log(&format!("View Exception: {}", e), 2, "Application");
            }
        }

        kernel.toolbox.add_tool(
            VIEW_TOOL,
            ToolSpec::Instance(ToolInstance::named(
                VIEW_TOOL,
                ActiveView(application.view.clone()),
            )),
            &application.kernel.resolver(),
        );

        let message = format!("Running Application in {} View", application.view.name());
        application.log(&message, 3, "Application");
        application
    }

    /// Dispatch a route, or the route of the held request.
    ///
    /// The controller is the first of `Application.Controllers.<Area>`,
    /// `<Area>` resolved as a controller, and the fallback `Controller`
    /// that is registered as a controller.
    pub fn main(&self, route: Option<Route>) -> Result<Response> {
        let route = route.unwrap_or_else(|| Route::from_request(&self.request));
        let base = route.controller_name();
        let resolver = self.kernel.resolver();

        let candidates = [
            ClassResolver::qualify(APPLICATION_NAMESPACE, Some(CONTROLLER_KIND), &base),
            resolver.resolve(&base, Some(CONTROLLER_KIND)),
            resolver.resolve(DEFAULT_CONTROLLER, None),
        ];
        let found = candidates
            .iter()
            .find_map(|id| match self.kernel.classes.get(id) {
                Some(Component::Controller(factory)) => Some((id, factory)),
                _ => None,
            });
        let Some((class, factory)) = found else {
            warn!(controller = %base, "Unknown controller");
            return Err(Error::UnknownController(base));
        };
        debug!(area = route.area(), action = route.action(), controller = %class, "Dispatching");

        let controller = DecoratorComposer::new(resolver).decorate(factory())?;
        controller.execute(&route, &self.kernel.toolbox)
    }

    /// Pass the response through the view and write its body to `out`.
    pub fn output<W: Write + ?Sized>(&self, response: Response, out: &mut W) -> Result<()> {
        let response = self.view.transform(response)?;
        trace!(status = response.status, bytes = response.body.len(), "Writing response");
        out.write_all(&response.body)?;
        out.flush()?;
        Ok(())
    }

    /// Dispatch the held request and write the result.
    ///
    /// Any failure, panics included, gets one recovery dispatch through the
    /// error route. Failing again is unrecoverable.
    pub fn run<W: Write + ?Sized>(&self, out: &mut W) -> std::result::Result<(), UnrecoverableFault> {
        let outcome = catch_unwind(AssertUnwindSafe(|| {
            let response = self.main(None)?;
            self.output(response, out)
        }));

        let fault = match outcome {
            Ok(Ok(())) => return Ok(()),
            Ok(Err(e)) => e,
            Err(payload) => Error::from_panic(payload),
        };
        self.exception(fault, out)
    }

    /// Render `fault` through the error route. Not retried.
    pub fn exception<W: Write + ?Sized>(
        &self,
        fault: Error,
        out: &mut W,
    ) -> std::result::Result<(), UnrecoverableFault> {
        let fault = Arc::new(fault);
        self.log(&format!("Unhandled fault: {}", fault), 1, "Application");

        let recovery = catch_unwind(AssertUnwindSafe(|| {
            let response = self.main(Some(Route::error(fault.clone())))?;
            self.output(response, out)
        }));

        let source = match recovery {
            Ok(Ok(())) => return Ok(()),
            Ok(Err(e)) => e,
            Err(payload) => Error::from_panic(payload),
        };
        let unrecoverable = UnrecoverableFault {
            original: fault,
            source,
        };
        error!(error = %unrecoverable, "Recovery dispatch failed");
        Err(unrecoverable)
    }

    /// Log through the `Logger` tool, prefixed with `[context]`.
    ///
    /// Messages above the debug level are dropped and `None` is returned.
    pub fn log(&self, message: &str, level: i64, context: &str) -> Option<LogMessage> {
        if level > i64::from(self.debug_level) {
            return None;
        }

        let message = if context.is_empty() {
            message.to_string()
        } else {
            format!("[{}] {}", context, message)
        };

        let severity = Severity::from_level(level);
        match severity {
            Severity::Critical => error!(severity = %severity, "{}", message),
            Severity::Warning => warn!(severity = %severity, "{}", message),
            Severity::Important | Severity::Information => {
                info!(severity = %severity, "{}", message)
            }
            Severity::Debug => debug!(severity = %severity, "{}", message),
            Severity::Other(_) => trace!(severity = %severity, "{}", message),
        }

        let toolbox = &self.kernel.toolbox;
        if let Some(logger) = toolbox
            .get_as::<Logger>(LOGGER_TOOL)
            .or_else(|| toolbox.get_as::<Logger>(LOGGER_CLASS))
        {
            logger.log(&message, level);
        }

        Some(LogMessage::new(message, level))
    }

    /// Log the end of the application's work.
    pub fn shutdown(&self) {
        self.log("Shutting down Application", 3, "Application");
    }

    pub fn debug_level(&self) -> u8 {
        self.debug_level
    }

    /// Change the debug level. Returns `false` and keeps the current level
    /// for non-positive values.
    pub fn set_debug_level(&mut self, level: i64) -> bool {
        if level <= 0 {
            return false;
        }
        self.debug_level = u8::try_from(level).unwrap_or(u8::MAX);
        true
    }

    pub fn request(&self) -> &Request {
        &self.request
    }

    pub fn view(&self) -> &Arc<dyn View> {
        &self.view
    }

    pub fn toolbox(&self) -> &Toolbox {
        &self.kernel.toolbox
    }

    pub fn kernel(&self) -> &Kernel {
        &self.kernel
    }
}

impl fmt::Debug for Application {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Application")
            .field("request", &self.request)
            .field("view", &self.view.name())
            .field("debug_level", &self.debug_level)
            .finish_non_exhaustive()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::controller::Controller;
    use backend_log::MemorySink;

    fn request(query: &str) -> Request {
        Request::new("GET", [(query, "")]).unwrap()
    }

    fn no_tools() -> Vec<(String, ToolSpec)> {
        Vec::new()
    }

    struct Failing;

    impl Controller for Failing {
        fn execute(&self, _route: &Route, _toolbox: &crate::toolbox::Toolbox) -> Result<Response> {
            Err(Error::Controller("failing controller".into()))
        }
    }

    struct Panicking;

    impl Controller for Panicking {
        fn execute(&self, _route: &Route, _toolbox: &crate::toolbox::Toolbox) -> Result<Response> {
            panic!("controller panicked")
        }
    }

    #[test]
    fn test_new_registers_namespaces_and_tools() {
        let kernel = Kernel::with_defaults();
        let app = Application::new(&kernel, no_tools(), request("home.json"));

        assert_eq!(
            kernel.namespaces.namespaces(),
            vec!["Core", "Base", "Application"]
        );
        assert!(app.toolbox().has("Config"));
        let view = app.toolbox().get_as::<ActiveView>("View").unwrap();
        assert_eq!(view.0.name(), "Json");
        assert_eq!(app.view().name(), "Json");
    }

    #[test]
    fn test_toolbox_rebuilt_per_application() {
        let kernel = Kernel::with_defaults();
        kernel.toolbox.add_instance("Stale", 1_u8);
        let _app = Application::new(&kernel, no_tools(), request("home"));
        assert!(!kernel.toolbox.has("Stale"));
    }

    #[test]
    fn test_unmatched_view_falls_back_to_plain() {
        let kernel = Kernel::with_defaults();
        let app = Application::new(
            &kernel,
            no_tools(),
            request("home.pdf").with_accept("application/pdf"),
        );
        assert_eq!(app.view().name(), "Plain");
    }

    #[test]
    fn test_invalid_view_falls_back_to_plain_with_warning() {
        let kernel = Kernel::with_defaults();
        kernel
            .classes
            .register_controller("Application.Views.Report", crate::controller::GenericController::new);
        kernel
            .views
            .register(crate::view::ViewDescriptor::new("Report", ["report"]));

        let sink = MemorySink::new();
        let tools = vec![(
            "Logger".to_string(),
            ToolSpec::Instance(ToolInstance::new(Logger::with_sink(Box::new(sink.clone())))),
        )];
        let app = Application::new(&kernel, tools, request("home.report"));

        assert_eq!(app.view().name(), "Plain");
        assert!(sink.contents().contains(
            "(WARNING) [Application] View Exception: Invalid view: Application.Views.Report"
        ));
        assert!(sink.contents().contains("Running Application in Plain View"));
    }

    #[test]
    fn test_main_uses_generic_controller() {
        let kernel = Kernel::with_defaults();
        let app = Application::new(&kernel, no_tools(), request("blog/show/4"));
        let response = app.main(None).unwrap();
        assert_eq!(response.data["area"], "blog");
        assert_eq!(response.data["arguments"], serde_json::json!(["4"]));
    }

    #[test]
    fn test_unknown_controller() {
        let kernel = Kernel::new();
        let app = Application::new(&kernel, no_tools(), request("blog"));
        assert!(matches!(
            app.main(None),
            Err(Error::UnknownController(ref name)) if name == "Blog"
        ));
    }

    #[test]
    fn test_output_through_view() {
        let kernel = Kernel::with_defaults();
        let app = Application::new(&kernel, no_tools(), request("home.json"));
        let mut out = Vec::new();
        app.output(Response::ok().with_data(serde_json::json!({"ok": true})), &mut out)
            .unwrap();
        assert_eq!(out, br#"{"ok":true}"#);
    }

    #[test]
    fn test_run_recovers_through_error_route() {
        let kernel = Kernel::with_defaults();
        kernel
            .classes
            .register_controller("Application.Controllers.Broken", || Failing);
        let app = Application::new(&kernel, no_tools(), request("broken.json"));

        let mut out = Vec::new();
        app.run(&mut out).unwrap();
        let body: serde_json::Value = serde_json::from_slice(&out).unwrap();
        assert_eq!(body["error"], "Controller error: failing controller");
        assert_eq!(body["status"], 500);
    }

    #[test]
    fn test_run_recovers_from_panic() {
        let kernel = Kernel::with_defaults();
        kernel
            .classes
            .register_controller("Application.Controllers.Boom", || Panicking);
        let app = Application::new(&kernel, no_tools(), request("boom.json"));

        let mut out = Vec::new();
        app.run(&mut out).unwrap();
        let body: serde_json::Value = serde_json::from_slice(&out).unwrap();
        assert_eq!(body["error"], "Unhandled error: controller panicked");
    }

    #[test]
    fn test_failed_recovery_is_unrecoverable() {
        let kernel = Kernel::with_defaults();
        kernel
            .classes
            .register_controller("Application.Controllers.Broken", || Failing);
        kernel
            .classes
            .register_controller("Application.Controllers.Error", || Failing);
        let app = Application::new(&kernel, no_tools(), request("broken"));

        let fault = app.run(&mut Vec::new()).unwrap_err();
        assert_eq!(
            fault.to_string(),
            "Could not handle exception: Controller error: failing controller"
        );
        assert!(matches!(fault.original.as_ref(), Error::Controller(_)));
    }

    #[test]
    fn test_log_gates_on_debug_level_and_uses_logger_tool() {
        let kernel = Kernel::with_defaults();
        let sink = MemorySink::new();
        let tools = vec![(
            "Logger".to_string(),
            ToolSpec::Instance(ToolInstance::new(Logger::with_sink(Box::new(sink.clone())))),
        )];
        let mut app = Application::new(&kernel, tools, request("home"));

        assert!(app.log("too chatty", 5, "Test").is_none());
        let message = app.log("kept", 2, "Test").unwrap();
        assert_eq!(message.message, "[Test] kept");
        assert!(sink.contents().contains("(WARNING) [Test] kept"));
        assert!(!sink.contents().contains("too chatty"));

        assert!(!app.set_debug_level(0));
        assert_eq!(app.debug_level(), 3);
        assert!(app.set_debug_level(5));
        assert!(app.log("now visible", 5, "Test").is_some());
    }

    #[test]
    fn test_shutdown_logs() {
        let kernel = Kernel::with_defaults();
        let sink = MemorySink::new();
        let tools = vec![(
            "Logger".to_string(),
            ToolSpec::Instance(ToolInstance::new(Logger::with_sink(Box::new(sink.clone())))),
        )];
        let app = Application::new(&kernel, tools, request("home"));
        app.shutdown();
        assert!(
            sink.contents()
                .contains("(IMPORTANT) [Application] Shutting down Application")
        );
    }
}
