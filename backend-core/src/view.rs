// Views, view descriptors and format-based view selection

use crate::error::{Error, Result};
use crate::logging::{debug, trace, warn};
use crate::registry::Component;
use crate::request::Request;
use crate::resolver::ClassResolver;
use crate::response::Response;
use parking_lot::RwLock;
use serde::Deserialize;
use std::collections::BTreeMap;
use std::fmt;
use std::path::Path;
use std::sync::Arc;

/// Kind segment searched when a view class is given by bare name.
pub const VIEW_KIND: &str = "Views";

/// Suffix identifying view descriptor files in a views folder.
pub const VIEW_FILE_SUFFIX: &str = ".view.toml";

/// Transforms a controller response into the emitted payload.
pub trait View: Send + Sync {
    fn name(&self) -> &str;

    fn transform(&self, response: Response) -> Result<Response>;
}

/// Renders response data as JSON.
#[derive(Debug, Clone, Copy, Default)]
pub struct JsonView;

impl View for JsonView {
    fn name(&self) -> &str {
        "Json"
    }

    fn transform(&self, response: Response) -> Result<Response> {
        let body = serde_json::to_vec(&response.data)
            .map_err(|e| Error::Serialization(e.to_string()))?;
        Ok(response
            .with_body(body)
            .with_header("Content-Type", "application/json"))
    }
}

/// Renders response data as plain terminal text.
#[derive(Debug, Clone, Copy, Default)]
pub struct CliView;

impl View for CliView {
    fn name(&self) -> &str {
        "Cli"
    }

    fn transform(&self, response: Response) -> Result<Response> {
        let response = if response.data.is_null() {
            response
        } else {
            let mut text = render_text(&response.data);
            if !text.ends_with('\n') {
                text.push('\n');
            }
            response.with_body(text)
        };
        Ok(response.with_header("Content-Type", "text/plain"))
    }
}

/// Bare view used when no other view matches the request.
#[derive(Debug, Clone, Copy, Default)]
pub struct PlainView;

impl View for PlainView {
    fn name(&self) -> &str {
        "Plain"
    }

    fn transform(&self, response: Response) -> Result<Response> {
        if response.body.is_empty() && !response.data.is_null() {
            let text = match &response.data {
                serde_json::Value::String(s) => s.clone(),
                other => other.to_string(),
            };
            return Ok(response.with_body(text));
        }
        Ok(response)
    }
}

fn render_text(value: &serde_json::Value) -> String {
    match value {
        serde_json::Value::Null => String::new(),
        serde_json::Value::String(s) => s.clone(),
        serde_json::Value::Object(map) => map
            .iter()
            .map(|(key, value)| format!("{}: {}", key, render_scalar(value)))
            .collect::<Vec<_>>()
            .join("\n"),
        serde_json::Value::Array(items) => items
            .iter()
            .map(render_scalar)
            .collect::<Vec<_>>()
            .join("\n"),
        other => other.to_string(),
    }
}

fn render_scalar(value: &serde_json::Value) -> String {
    match value {
        serde_json::Value::String(s) => s.clone(),
        other => other.to_string(),
    }
}

/// A view candidate and the formats it declares it can serve.
///
/// `formats` may hold format tokens (`json`), extensions and MIME types
/// (`application/json`, `text/*`).
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ViewDescriptor {
    pub name: String,
    pub class: Option<String>,
    pub formats: Vec<String>,
}

impl ViewDescriptor {
    pub fn new<I, S>(name: impl Into<String>, formats: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        Self {
            name: name.into(),
            class: None,
            formats: formats.into_iter().map(Into::into).collect(),
        }
    }

    pub fn with_class(mut self, class: impl Into<String>) -> Self {
        self.class = Some(class.into());
        self
    }

    /// Whether a declared format equals `token`, ignoring ASCII case.
    ///
    /// Wildcards are literal here; only [`handles_mime`](Self::handles_mime)
    /// expands them.
    pub fn handles(&self, token: &str) -> bool {
        self.formats.iter().any(|f| f.eq_ignore_ascii_case(token))
    }

    /// Like [`handles`](Self::handles), also honouring `type/*`, and `*/*`
    /// or a bare `*` for any MIME type.
    pub fn handles_mime(&self, mime: &str) -> bool {
        let (kind, _) = mime.split_once('/').unwrap_or((mime, ""));
        self.formats.iter().any(|f| {
            f.eq_ignore_ascii_case(mime)
                || f == "*/*"
                || f == "*"
                || f.strip_suffix("/*")
                    .is_some_and(|prefix| prefix.eq_ignore_ascii_case(kind))
        })
    }
}

#[derive(Debug, Deserialize)]
struct ViewFile {
    #[serde(default)]
    formats: Vec<String>,
    class: Option<String>,
}

/// Registered view descriptors, ordered by name.
///
/// Clones share the same entries.
#[derive(Clone, Default)]
pub struct ViewRegistry {
    views: Arc<RwLock<BTreeMap<String, ViewDescriptor>>>,
}

impl ViewRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Registry with the `Json` and `Cli` views.
    pub fn with_defaults() -> Self {
        let registry = Self::new();
        registry.register(ViewDescriptor::new(
            "Json",
            ["json", "application/json", "text/javascript"],
        ));
        registry.register(ViewDescriptor::new("Cli", ["cli", "text/plain"]));
        registry
    }

    pub fn register(&self, descriptor: ViewDescriptor) {
        debug!(view = %descriptor.name, formats = ?descriptor.formats, "View registered");
        self.views
            .write()
            .insert(descriptor.name.clone(), descriptor);
    }

    /// Register every `*.view.toml` descriptor in `dir`.
    ///
    /// The view name is the file name without the suffix. Unparseable files
    /// are skipped. Returns the number of descriptors registered.
    pub fn load_dir(&self, dir: impl AsRef<Path>) -> Result<usize> {
        let dir = dir.as_ref();
        let entries = std::fs::read_dir(dir)
            .map_err(|e| Error::ViewFolderUnavailable(format!("{}: {}", dir.display(), e)))?;

        let mut loaded = 0;
        for entry in entries.flatten() {
            let file_name = entry.file_name();
            let Some(name) = file_name
                .to_str()
                .and_then(|f| f.strip_suffix(VIEW_FILE_SUFFIX))
            else {
                continue;
            };
            if name.is_empty() {
                continue;
            }

            let parsed = std::fs::read_to_string(entry.path())
                .map_err(|e| e.to_string())
                .and_then(|content| {
                    toml::from_str::<ViewFile>(&content).map_err(|e| e.to_string())
                });
            match parsed {
                Ok(file) => {
                    self.register(ViewDescriptor {
                        name: name.to_string(),
                        class: file.class,
                        formats: file.formats,
                    });
                    loaded += 1;
                }
                Err(e) => warn!(view = name, error = %e, "Skipping unreadable view descriptor"),
            }
        }
        Ok(loaded)
    }

    pub fn get(&self, name: &str) -> Option<ViewDescriptor> {
        self.views.read().get(name).cloned()
    }

    /// Descriptors in name order.
    pub fn descriptors(&self) -> Vec<ViewDescriptor> {
        self.views.read().values().cloned().collect()
    }

    pub fn len(&self) -> usize {
        self.views.read().len()
    }

    pub fn is_empty(&self) -> bool {
        self.views.read().is_empty()
    }
}

impl fmt::Debug for ViewRegistry {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ViewRegistry")
            .field("views", &self.views.read().keys().collect::<Vec<_>>())
            .finish()
    }
}

/// Outcome of view selection.
pub enum ViewSelection {
    Found(Arc<dyn View>),
    Unrecognized,
}

impl fmt::Debug for ViewSelection {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ViewSelection::Found(view) => f.debug_tuple("Found").field(&view.name()).finish(),
            ViewSelection::Unrecognized => f.write_str("Unrecognized"),
        }
    }
}

/// Picks the view that serves a request.
#[derive(Debug, Clone)]
pub struct ViewSelector {
    resolver: ClassResolver,
    views: ViewRegistry,
}

impl ViewSelector {
    pub fn new(resolver: ClassResolver, views: ViewRegistry) -> Self {
        Self { resolver, views }
    }

    /// Find the view that serves the request.
    ///
    /// Every view is tested against the specified format first, then against
    /// the extension, then against the MIME type; within a pass views are
    /// tried in name order. Descriptors whose class is not registered are
    /// skipped. A match whose class is not a view fails with
    /// [`Error::InvalidView`].
    pub fn select(&self, request: &Request) -> Result<ViewSelection> {
        let candidates: Vec<(ViewDescriptor, String, Component)> = self
            .views
            .descriptors()
            .into_iter()
            .filter_map(|descriptor| {
                let class = descriptor.class.as_deref().unwrap_or(&descriptor.name);
                match self.resolver.lookup(class, &[Some(VIEW_KIND)]) {
                    Some((resolved, component)) => Some((descriptor, resolved, component)),
                    None => {
                        trace!(view = %descriptor.name, class, "View class not registered, skipping");
                        None
                    }
                }
            })
            .collect();

        let format = request.specified_format();
        let extension = request.extension();
        let mime = request.mime_type();
        let passes: [(&str, &dyn Fn(&ViewDescriptor) -> bool); 3] = [
            ("format", &|d: &ViewDescriptor| format.is_some_and(|f| d.handles(f))),
            ("extension", &|d: &ViewDescriptor| d.handles(extension)),
            ("mime", &|d: &ViewDescriptor| d.handles_mime(&mime)),
        ];

        for (pass, matches) in passes {
            let Some((descriptor, resolved, component)) =
                candidates.iter().find(|(descriptor, _, _)| matches(descriptor))
            else {
                continue;
            };

            return match component {
                Component::View(factory) => {
                    debug!(view = %descriptor.name, class = %resolved, pass, "View selected");
                    Ok(ViewSelection::Found(factory()))
                }
                other => {
                    warn!(view = %descriptor.name, class = %resolved, kind = other.kind(), "Invalid view");
                    Err(Error::InvalidView(resolved.clone()))
                }
            };
        }

        Ok(ViewSelection::Unrecognized)
    }

    /// Like [`select`](Self::select), failing with
    /// [`Error::UnrecognizedFormat`] when nothing matches.
    pub fn build(&self, request: &Request) -> Result<Arc<dyn View>> {
        match self.select(request)? {
            ViewSelection::Found(view) => Ok(view),
            ViewSelection::Unrecognized => Err(Error::UnrecognizedFormat(format!(
                "format={} extension={} mime={}",
                request.specified_format().unwrap_or("-"),
                request.extension(),
                request.mime_type()
            ))),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::controller::GenericController;
    use crate::namespace::NamespaceChain;
    use crate::registry::ClassRegistry;
    use serde_json::json;

    fn selector(views: ViewRegistry) -> ViewSelector {
        let resolver = ClassResolver::new(
            NamespaceChain::with_defaults(),
            ClassRegistry::with_defaults(),
        );
        ViewSelector::new(resolver, views)
    }

    fn request(query: &str) -> Request {
        Request::new("GET", [(query, "")]).unwrap()
    }

    #[test]
    fn test_json_view() {
        let response = JsonView
            .transform(Response::ok().with_data(json!({"a": 1})))
            .unwrap();
        assert_eq!(response.body_str(), Some(r#"{"a":1}"#));
        assert_eq!(response.header("Content-Type"), Some("application/json"));
    }

    #[test]
    fn test_cli_view() {
        let response = CliView
            .transform(Response::ok().with_data(json!({"area": "home", "count": 2})))
            .unwrap();
        assert_eq!(response.body_str(), Some("area: home\ncount: 2\n"));

        let response = CliView.transform(Response::ok().with_body("raw")).unwrap();
        assert_eq!(response.body_str(), Some("raw"));
    }

    #[test]
    fn test_plain_view() {
        let response = PlainView
            .transform(Response::ok().with_data(json!("hello")))
            .unwrap();
        assert_eq!(response.body_str(), Some("hello"));

        let response = PlainView
            .transform(Response::ok().with_data(json!(1)).with_body("kept"))
            .unwrap();
        assert_eq!(response.body_str(), Some("kept"));
    }

    #[test]
    fn test_handles_mime_wildcards() {
        let descriptor = ViewDescriptor::new("Any", ["text/*"]);
        assert!(descriptor.handles_mime("text/html"));
        assert!(!descriptor.handles_mime("application/json"));
        assert!(ViewDescriptor::new("All", ["*/*"]).handles_mime("image/png"));
    }

    #[test]
    fn test_select_by_extension() {
        let selector = selector(ViewRegistry::with_defaults());
        let view = selector.build(&request("home.json")).unwrap();
        assert_eq!(view.name(), "Json");

        let view = selector.build(&request("home")).unwrap();
        assert_eq!(view.name(), "Cli");
    }

    #[test]
    fn test_specified_format_wins() {
        let selector = selector(ViewRegistry::with_defaults());
        let request = Request::new("GET", [("home", ""), ("format", "json")]).unwrap();
        assert_eq!(request.extension(), "cli");
        assert_eq!(selector.build(&request).unwrap().name(), "Json");
    }

    #[test]
    fn test_extension_beats_mime() {
        let views = ViewRegistry::new();
        views.register(ViewDescriptor::new("Any", ["*"]).with_class("Core.Views.Plain"));
        views.register(ViewDescriptor::new("Json", ["json"]));
        let selector = selector(views);

        let view = selector.build(&request("home.json")).unwrap();
        assert_eq!(view.name(), "Json");

        let view = selector.build(&request("home.csv")).unwrap();
        assert_eq!(view.name(), "Plain");
    }

    #[test]
    fn test_format_matching_rules() {
        let descriptor = ViewDescriptor::new("Json", ["JSON", "Application/Json"]);
        assert!(descriptor.handles("json"));
        assert!(descriptor.handles_mime("application/json"));

        let any = ViewDescriptor::new("Any", ["*"]);
        assert!(!any.handles("json"));
        assert!(any.handles_mime("text/csv"));
    }

    #[test]
    fn test_mime_fallback() {
        let views = ViewRegistry::new();
        views.register(ViewDescriptor::new("Plain", ["*/*"]));
        let selector = selector(views);

        let view = selector.build(&request("home.json")).unwrap();
        assert_eq!(view.name(), "Plain");
    }

    #[test]
    fn test_unrecognized() {
        let views = ViewRegistry::new();
        views.register(ViewDescriptor::new("Json", ["json"]));
        let selector = selector(views);

        assert!(matches!(
            selector.select(&request("home.csv")).unwrap(),
            ViewSelection::Unrecognized
        ));
        assert!(matches!(
            selector.build(&request("home.csv")),
            Err(Error::UnrecognizedFormat(_))
        ));
    }

    #[test]
    fn test_unloadable_view_skipped() {
        let views = ViewRegistry::new();
        views.register(ViewDescriptor::new("Html", ["html"]));
        views.register(ViewDescriptor::new("Page", ["html"]).with_class("Core.Views.Plain"));
        let selector = selector(views);

        let view = selector.build(&request("home.html")).unwrap();
        assert_eq!(view.name(), "Plain");
    }

    #[test]
    fn test_invalid_view() {
        let classes = ClassRegistry::with_defaults();
        classes.register_controller("Application.Views.Broken", GenericController::new);
        let views = ViewRegistry::new();
        views.register(ViewDescriptor::new("Broken", ["cli"]));
        let selector = ViewSelector::new(
            ClassResolver::new(NamespaceChain::with_defaults(), classes),
            views,
        );

        assert!(matches!(
            selector.select(&request("home")),
            Err(Error::InvalidView(ref class)) if class == "Application.Views.Broken"
        ));
    }

    #[test]
    fn test_lexicographic_tie_break() {
        let views = ViewRegistry::new();
        views.register(ViewDescriptor::new("Plain", ["cli"]));
        views.register(ViewDescriptor::new("Cli", ["cli"]));
        let selector = selector(views);
        assert_eq!(selector.build(&request("home")).unwrap().name(), "Cli");
    }

    #[test]
    fn test_load_dir() {
        let dir = tempfile::tempdir().unwrap();
        std::fs::write(
            dir.path().join("Json.view.toml"),
            "formats = [\"json\", \"application/json\"]\n",
        )
        .unwrap();
        std::fs::write(
            dir.path().join("Text.view.toml"),
            "formats = [\"txt\"]\nclass = \"Core.Views.Plain\"\n",
        )
        .unwrap();
        std::fs::write(dir.path().join("README.md"), "not a view").unwrap();
        std::fs::write(dir.path().join("Broken.view.toml"), "formats = 3").unwrap();

        let views = ViewRegistry::new();
        assert_eq!(views.load_dir(dir.path()).unwrap(), 2);
        assert_eq!(
            views.get("Text").unwrap().class.as_deref(),
            Some("Core.Views.Plain")
        );
        assert_eq!(
            views
                .descriptors()
                .iter()
                .map(|d| d.name.as_str())
                .collect::<Vec<_>>(),
            vec!["Json", "Text"]
        );
    }

    #[test]
    fn test_load_dir_missing_folder() {
        let dir = tempfile::tempdir().unwrap();
        let missing = dir.path().join("views");
        assert!(matches!(
            ViewRegistry::new().load_dir(&missing),
            Err(Error::ViewFolderUnavailable(_))
        ));
    }
}
