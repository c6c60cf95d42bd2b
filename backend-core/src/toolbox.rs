// Toolbox: named registry of shared service instances

use crate::error::{Error, Result};
use crate::logging::{debug, trace, warn};
use crate::registry::Component;
use crate::resolver::ClassResolver;
use parking_lot::RwLock;
use serde::Deserialize;
use std::any::Any;
use std::collections::HashMap;
use std::fmt;
use std::sync::Arc;

/// Kind segment searched when a tool class is given by bare name.
pub const TOOL_KIND: &str = "Utilities";

/// A constructed tool together with the type name it reports.
#[derive(Clone)]
pub struct ToolInstance {
    type_name: String,
    value: Arc<dyn Any + Send + Sync>,
}

impl ToolInstance {
    /// Wrap a value, naming it after its Rust type.
    pub fn new<T: Any + Send + Sync>(value: T) -> Self {
        Self::from_arc(Arc::new(value))
    }

    pub fn from_arc<T: Any + Send + Sync>(value: Arc<T>) -> Self {
        Self {
            type_name: short_type_name::<T>().to_string(),
            value,
        }
    }

    /// Wrap a value under an explicit type name (class identifier).
    pub fn named<T: Any + Send + Sync>(type_name: impl Into<String>, value: T) -> Self {
        Self {
            type_name: type_name.into(),
            value: Arc::new(value),
        }
    }

    pub fn type_name(&self) -> &str {
        &self.type_name
    }

    pub fn downcast<T: Any + Send + Sync>(&self) -> Option<Arc<T>> {
        self.value.clone().downcast::<T>().ok()
    }

    /// Whether both instances share the same allocation.
    pub fn ptr_eq(&self, other: &ToolInstance) -> bool {
        Arc::ptr_eq(&self.value, &other.value)
    }
}

impl fmt::Debug for ToolInstance {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ToolInstance")
            .field("type_name", &self.type_name)
            .finish_non_exhaustive()
    }
}

/// How a tool is supplied.
///
/// Configuration files deserialize a string as [`ToolSpec::Class`] and a
/// two-element array as [`ToolSpec::Constructed`].
#[derive(Clone, Debug, Deserialize)]
#[serde(untagged)]
pub enum ToolSpec {
    /// A ready-made instance
    #[serde(skip)]
    Instance(ToolInstance),
    /// A class identifier, constructed without arguments
    Class(String),
    /// A class identifier and its constructor argument
    Constructed(String, serde_json::Value),
}

impl ToolSpec {
    pub fn instance<T: Any + Send + Sync>(value: T) -> Self {
        ToolSpec::Instance(ToolInstance::new(value))
    }

    pub fn class(class: impl Into<String>) -> Self {
        ToolSpec::Class(class.into())
    }

    pub fn constructed(class: impl Into<String>, argument: serde_json::Value) -> Self {
        ToolSpec::Constructed(class.into(), argument)
    }
}

/// Named registry of shared tools.
///
/// Clones share the same entries. The last registration under a name wins.
#[derive(Clone)]
pub struct Toolbox {
    tools: Arc<RwLock<HashMap<String, ToolInstance>>>,
}

impl Toolbox {
    pub fn new() -> Self {
        debug!("Creating new toolbox");
        Self {
            tools: Arc::new(RwLock::new(HashMap::new())),
        }
    }

    /// Add a tool from any spec.
    ///
    /// Class specs are looked up through `resolver`. An unresolvable class or
    /// a failing constructor is logged and nothing is stored. Returns the key
    /// the tool was stored under.
    pub fn add_tool(&self, name: &str, spec: ToolSpec, resolver: &ClassResolver) -> Option<String> {
        let instance = match spec {
            ToolSpec::Instance(instance) => Ok(instance),
            ToolSpec::Class(class) => Self::construct(&class, None, resolver),
            ToolSpec::Constructed(class, argument) => {
                Self::construct(&class, Some(&argument), resolver)
            }
        };
        match instance {
            Ok(instance) => Some(self.insert(name, instance)),
            Err(e) => {
                warn!(tool = name, error = %e, "Tool not added");
                None
            }
        }
    }

    /// Add a ready-made instance.
    pub fn add_instance<T: Any + Send + Sync>(&self, name: &str, value: T) -> String {
        self.insert(name, ToolInstance::new(value))
    }

    fn insert(&self, name: &str, instance: ToolInstance) -> String {
        let key = if derives_key(name) {
            instance.type_name().to_string()
        } else {
            name.to_string()
        };

        trace!(tool = %key, "Acquiring write lock for tool registration");
        let replaced = self.tools.write().insert(key.clone(), instance).is_some();
        debug!(tool = %key, replaced, "Tool registered");
        key
    }

    /// Build a tool from its class.
    ///
    /// Fails with [`Error::UndefinedTool`] when the class is not a registered
    /// tool, or with the constructor's own error.
    pub fn construct(
        class: &str,
        argument: Option<&serde_json::Value>,
        resolver: &ClassResolver,
    ) -> Result<ToolInstance> {
        let factory = match resolver.lookup(class, &[Some(TOOL_KIND), None]) {
            Some((id, Component::Tool(factory))) => {
                trace!(class, resolved = %id, "Tool class resolved");
                factory
            }
            Some((id, other)) => {
                debug!(class, resolved = %id, kind = other.kind(), "Not a tool class");
                return Err(Error::UndefinedTool(class.to_string()));
            }
            None => return Err(Error::UndefinedTool(class.to_string())),
        };
        factory(argument)
    }

    /// Fetch a tool by name.
    pub fn get(&self, name: &str) -> Option<ToolInstance> {
        let tool = self.tools.read().get(name).cloned();
        trace!(tool = name, found = tool.is_some(), "Tool lookup");
        tool
    }

    /// Fetch a tool by name and downcast it to `T`.
    pub fn get_as<T: Any + Send + Sync>(&self, name: &str) -> Option<Arc<T>> {
        self.get(name).and_then(|tool| tool.downcast::<T>())
    }

    pub fn has(&self, name: &str) -> bool {
        self.tools.read().contains_key(name)
    }

    pub fn names(&self) -> Vec<String> {
        let mut names: Vec<String> = self.tools.read().keys().cloned().collect();
        names.sort();
        names
    }

    pub fn len(&self) -> usize {
        self.tools.read().len()
    }

    pub fn is_empty(&self) -> bool {
        self.tools.read().is_empty()
    }

    /// Remove every tool
    pub fn clear(&self) {
        let mut tools = self.tools.write();
        let count = tools.len();
        tools.clear();

        debug!(tool_count = count, "Cleared all tools from toolbox");
    }
}

impl Default for Toolbox {
    fn default() -> Self {
        Self::new()
    }
}

impl fmt::Debug for Toolbox {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Toolbox")
            .field("tools", &self.names())
            .finish()
    }
}

/// Empty and numeric names are replaced by the tool's type name.
fn derives_key(name: &str) -> bool {
    let trimmed = name.trim();
    trimmed.is_empty() || trimmed.parse::<f64>().is_ok_and(f64::is_finite)
}

fn short_type_name<T: ?Sized>() -> &'static str {
    let full = std::any::type_name::<T>();
    let base = full.split('<').next().unwrap_or(full);
    base.rsplit("::").next().unwrap_or(base)
}

#[cfg(test)]
mod tests {
    use super::*;

    struct Mailer {
        from: String,
    }

    #[test]
    fn test_derives_key() {
        assert!(derives_key(""));
        assert!(derives_key("0"));
        assert!(derives_key("12"));
        assert!(derives_key("1.5"));
        assert!(!derives_key("Mailer"));
        assert!(!derives_key("inf"));
        assert!(!derives_key("3rd"));
    }

    #[test]
    fn test_short_type_name() {
        assert_eq!(short_type_name::<Mailer>(), "Mailer");
        assert_eq!(short_type_name::<Vec<String>>(), "Vec");
    }

    #[test]
    fn test_instance_round_trip() {
        let toolbox = Toolbox::new();
        let key = toolbox.add_instance(
            "Mailer",
            Mailer {
                from: "noreply@example.com".to_string(),
            },
        );
        assert_eq!(key, "Mailer");

        let first = toolbox.get("Mailer").unwrap();
        let second = toolbox.get("Mailer").unwrap();
        assert!(first.ptr_eq(&second));
        assert_eq!(
            toolbox.get_as::<Mailer>("Mailer").unwrap().from,
            "noreply@example.com"
        );
    }

    #[test]
    fn test_numeric_name_uses_type_name() {
        let toolbox = Toolbox::new();
        let key = toolbox.add_instance(
            "0",
            Mailer {
                from: String::new(),
            },
        );
        assert_eq!(key, "Mailer");
        assert!(toolbox.has("Mailer"));
        assert!(!toolbox.has("0"));
    }

    #[test]
    fn test_missing_tool_is_none() {
        let toolbox = Toolbox::new();
        assert!(toolbox.get("Nope").is_none());
        assert!(toolbox.get_as::<Mailer>("Nope").is_none());
    }

    #[test]
    fn test_wrong_type_downcast_is_none() {
        let toolbox = Toolbox::new();
        toolbox.add_instance("Answer", 42_u32);
        assert!(toolbox.get_as::<String>("Answer").is_none());
        assert_eq!(*toolbox.get_as::<u32>("Answer").unwrap(), 42);
    }

    #[test]
    fn test_last_registration_wins_and_clear() {
        let toolbox = Toolbox::new();
        toolbox.add_instance("Value", 1_i32);
        toolbox.add_instance("Value", 2_i32);
        assert_eq!(*toolbox.get_as::<i32>("Value").unwrap(), 2);
        assert_eq!(toolbox.len(), 1);

        toolbox.clear();
        assert!(toolbox.is_empty());
    }

    #[test]
    fn test_unresolvable_class_is_undefined_tool() {
        let resolver = ClassResolver::new(
            crate::namespace::NamespaceChain::with_defaults(),
            crate::registry::ClassRegistry::with_defaults(),
        );
        assert!(matches!(
            Toolbox::construct("Mailer", None, &resolver),
            Err(Error::UndefinedTool(ref class)) if class == "Mailer"
        ));
        assert!(matches!(
            Toolbox::construct("Core.Controller", None, &resolver),
            Err(Error::UndefinedTool(_))
        ));
        assert!(Toolbox::construct("Logger", None, &resolver).is_ok());

        let toolbox = Toolbox::new();
        assert!(toolbox.add_tool("Mailer", ToolSpec::class("Mailer"), &resolver).is_none());
        assert!(!toolbox.has("Mailer"));
    }

    #[test]
    fn test_spec_deserialization() {
        let spec: ToolSpec = serde_json::from_str(r#""Logger""#).unwrap();
        assert!(matches!(spec, ToolSpec::Class(ref c) if c == "Logger"));

        let spec: ToolSpec = serde_json::from_str(r#"["Logger", "/tmp/app.log"]"#).unwrap();
        match spec {
            ToolSpec::Constructed(class, arg) => {
                assert_eq!(class, "Logger");
                assert_eq!(arg, serde_json::json!("/tmp/app.log"));
            }
            other => panic!("unexpected spec: {:?}", other),
        }
    }
}
