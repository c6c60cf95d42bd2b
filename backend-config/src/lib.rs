// Configuration management for the Backend framework

pub mod env;
pub mod error;
pub mod loader;
pub mod site;

pub use env::{ENV_PREFIX, EnvLoader};
pub use error::{ConfigError, Result};
pub use loader::{ConfigLoader, FileFormat};
pub use site::{SiteState, resolve_debug_level};

use backend_core::logging::{debug, warn};
use backend_core::{ConfigSource, ToolSpec};
use parking_lot::RwLock;
use serde::de::DeserializeOwned;
use std::path::{Path, PathBuf};
use std::sync::Arc;

/// Folder, relative to the project, searched by [`Config::discover`].
pub const CONFIG_FOLDER: &str = "configs";
/// Configuration key holding the tool definitions.
pub const TOOLS_KEY: &str = "tools";
/// Configuration key holding the debug level.
pub const DEBUG_LEVEL_KEY: &str = "debug_level";

/// Application configuration.
///
/// Clones share the same values.
#[derive(Clone, Debug)]
pub struct Config {
    values: Arc<RwLock<serde_json::Map<String, serde_json::Value>>>,
    site_state: SiteState,
    source: Option<PathBuf>,
}

impl Config {
    /// Empty configuration for the given site state
    pub fn new(site_state: SiteState) -> Self {
        Self {
            values: Arc::new(RwLock::new(serde_json::Map::new())),
            site_state,
            source: None,
        }
    }

    /// Site state from `BACKEND_SITE_STATE`, production when unset.
    pub fn site_state_from_env() -> Result<SiteState> {
        match EnvLoader::backend().load_var("SITE_STATE") {
            Ok(state) => state.parse(),
            Err(_) => Ok(SiteState::default()),
        }
    }

    /// Load a single file, picking the format from its extension.
    pub fn from_file(path: impl AsRef<Path>, site_state: SiteState) -> Result<Self> {
        let path = path.as_ref();
        let mut config = Self::new(site_state);
        config.load_file(path, ConfigLoader::auto(path)?.format())?;
        config.source = Some(path.to_path_buf());
        Ok(config)
    }

    /// Find and load the configuration of a project.
    ///
    /// Tries `configs/<site state>.<ext>` and then `configs/default.<ext>`
    /// for each of toml, yaml, yml and json.
    pub fn discover(project_dir: impl AsRef<Path>, site_state: SiteState) -> Result<Self> {
        let folder = project_dir.as_ref().join(CONFIG_FOLDER);
        let path = Self::locate(&folder, site_state)
            .ok_or_else(|| ConfigError::NotFound(folder.display().to_string()))?;
        debug!(path = %path.display(), site_state = %site_state, "Loading configuration");
        Self::from_file(path, site_state)
    }

    fn locate(folder: &Path, site_state: SiteState) -> Option<PathBuf> {
        [site_state.as_str(), "default"]
            .into_iter()
            .flat_map(|stem| {
                FileFormat::DISCOVERY_ORDER
                    .into_iter()
                    .map(move |ext| folder.join(format!("{}.{}", stem, ext)))
            })
            .find(|candidate| candidate.is_file())
    }

    /// Merge a file's top-level keys into this configuration
    pub fn load_file(&self, path: impl AsRef<Path>, format: FileFormat) -> Result<()> {
        let data = ConfigLoader::new(format).load_file(path)?;

        match data {
            serde_json::Value::Object(map) => {
                self.values.write().extend(map);
                Ok(())
            }
            serde_json::Value::Null => Ok(()),
            other => Err(ConfigError::ParseError(format!(
                "configuration root must be a mapping, got {}",
                other
            ))),
        }
    }

    /// Load a `.env` file into the process environment and merge the
    /// `BACKEND_*` variables.
    pub fn load_dotenv(&self, path: Option<&Path>) -> Result<()> {
        match path {
            Some(path) => {
                dotenvy::from_path(path).map_err(|e| ConfigError::LoadError(e.to_string()))?;
            }
            None => {
                // A missing .env is not an error
                dotenvy::dotenv().ok();
            }
        }
        self.load_env();
        Ok(())
    }

    /// Merge `BACKEND_*` environment variables as lowercase keys
    pub fn load_env(&self) {
        let vars = EnvLoader::backend().load();
        let mut values = self.values.write();
        for (key, value) in vars {
            values.insert(key, serde_json::Value::String(value));
        }
    }

    pub fn site_state(&self) -> SiteState {
        self.site_state
    }

    /// File the configuration was read from, if any
    pub fn source(&self) -> Option<&Path> {
        self.source.as_deref()
    }

    /// Raw value; dotted keys (`database.host`) descend into mappings.
    pub fn value(&self, key: &str) -> Option<serde_json::Value> {
        let values = self.values.read();
        if let Some(value) = values.get(key) {
            return Some(value.clone());
        }

        let mut parts = key.split('.');
        let mut current = values.get(parts.next()?)?;
        for part in parts {
            current = match current {
                serde_json::Value::Object(map) => map.get(part)?,
                serde_json::Value::Array(items) => items.get(part.parse::<usize>().ok()?)?,
                _ => return None,
            };
        }
        Some(current.clone())
    }

    /// Set a configuration value
    pub fn set<T: serde::Serialize>(&self, key: &str, value: T) -> Result<()> {
        let json_value = serde_json::to_value(value)
            .map_err(|e| ConfigError::SerializationError(e.to_string()))?;
        self.values.write().insert(key.to_string(), json_value);
        Ok(())
    }

    /// Get a configuration value
    pub fn get<T: DeserializeOwned>(&self, key: &str) -> Result<T> {
        let value = self
            .value(key)
            .ok_or_else(|| ConfigError::KeyNotFound(key.to_string()))?;

        serde_json::from_value(value).map_err(|e| ConfigError::DeserializationError(e.to_string()))
    }

    /// Get a configuration value with default
    pub fn get_or<T: DeserializeOwned>(&self, key: &str, default: T) -> T {
        self.get(key).unwrap_or(default)
    }

    pub fn get_string(&self, key: &str) -> Result<String> {
        self.get(key)
    }

    pub fn get_int(&self, key: &str) -> Result<i64> {
        self.get(key)
    }

    pub fn get_bool(&self, key: &str) -> Result<bool> {
        self.get(key)
    }

    pub fn has(&self, key: &str) -> bool {
        self.value(key).is_some()
    }

    pub fn keys(&self) -> Vec<String> {
        self.values.read().keys().cloned().collect()
    }

    /// Copy every value of `other` over this configuration
    pub fn merge(&self, other: &Config) {
        if Arc::ptr_eq(&self.values, &other.values) {
            return;
        }
        let other_values = other.values.read().clone();
        self.values.write().extend(other_values);
    }

    /// Effective debug level: `BACKEND_DEBUG_LEVEL`, then the `debug_level`
    /// key, then the site state's default.
    pub fn effective_debug_level(&self) -> u8 {
        let override_level = EnvLoader::backend().load_var(DEBUG_LEVEL_KEY).ok();
        resolve_debug_level(
            override_level.as_deref(),
            self.value(DEBUG_LEVEL_KEY).as_ref(),
            self.site_state,
        )
    }

    /// Tool definitions under the `tools` key.
    ///
    /// A mapping gives name/spec pairs; a list gives specs under their index,
    /// which the toolbox replaces by the tool's type name. Malformed specs are
    /// skipped with a warning.
    pub fn tool_specs(&self) -> Vec<(String, ToolSpec)> {
        let entries: Vec<(String, serde_json::Value)> = match self.value(TOOLS_KEY) {
            Some(serde_json::Value::Object(map)) => map.into_iter().collect(),
            Some(serde_json::Value::Array(items)) => items
                .into_iter()
                .enumerate()
                .map(|(index, item)| (index.to_string(), item))
                .collect(),
            Some(serde_json::Value::Null) | None => Vec::new(),
            Some(other) => {
                warn!(tools = %other, "Ignoring tools: expected a mapping or a list");
                Vec::new()
            }
        };

        entries
            .into_iter()
            .filter_map(|(name, value)| match serde_json::from_value::<ToolSpec>(value) {
                Ok(spec) => Some((name, spec)),
                Err(e) => {
                    warn!(tool = %name, error = %e, "Ignoring malformed tool definition");
                    None
                }
            })
            .collect()
    }
}

impl Default for Config {
    fn default() -> Self {
        Self::new(SiteState::default())
    }
}

impl ConfigSource for Config {
    fn tools(&self) -> Vec<(String, ToolSpec)> {
        self.tool_specs()
    }

    fn debug_level(&self) -> Option<u8> {
        Some(self.effective_debug_level())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_set_and_get() {
        let config = Config::default();
        config.set("test_key", "test_value").unwrap();

        let value: String = config.get("test_key").unwrap();
        assert_eq!(value, "test_value");
        assert!(matches!(
            config.get::<String>("missing"),
            Err(ConfigError::KeyNotFound(_))
        ));
    }

    #[test]
    fn test_get_or_default() {
        let config = Config::default();
        let value: String = config.get_or("missing_key", "default_value".to_string());
        assert_eq!(value, "default_value");
    }

    #[test]
    fn test_dotted_lookup() {
        let config = Config::default();
        config
            .set("database", json!({"host": "localhost", "ports": [3306, 3307]}))
            .unwrap();

        assert_eq!(config.get_string("database.host").unwrap(), "localhost");
        assert_eq!(config.get_int("database.ports.1").unwrap(), 3307);
        assert!(!config.has("database.user"));
    }

    #[test]
    fn test_tool_specs_from_mapping() {
        let config = Config::default();
        config
            .set(
                "tools",
                json!({"Logger": ["Logger", "/tmp/backend.log"], "Mailer": "Mailer", "Bad": 5}),
            )
            .unwrap();

        let specs = config.tool_specs();
        assert_eq!(specs.len(), 2);
        let logger = specs.iter().find(|(name, _)| name == "Logger").unwrap();
        assert!(matches!(
            &logger.1,
            ToolSpec::Constructed(class, arg) if class == "Logger" && arg == "/tmp/backend.log"
        ));
    }

    #[test]
    fn test_tool_specs_from_list() {
        let config = Config::default();
        config.set("tools", json!(["Logger"])).unwrap();
        let specs = config.tool_specs();
        assert_eq!(specs[0].0, "0");
        assert!(matches!(&specs[0].1, ToolSpec::Class(c) if c == "Logger"));
    }

    #[test]
    fn test_merge() {
        let base = Config::default();
        base.set("a", 1).unwrap();
        let other = Config::default();
        other.set("a", 2).unwrap();
        other.set("b", true).unwrap();

        base.merge(&other);
        assert_eq!(base.get_int("a").unwrap(), 2);
        assert!(base.get_bool("b").unwrap());
        base.merge(&base.clone());
    }
}
