// Site state and debug level defaults

use crate::{ConfigError, Result};
use std::fmt;
use std::str::FromStr;

/// Deployment state of the site.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum SiteState {
    Development,
    #[default]
    Production,
}

impl SiteState {
    pub fn as_str(&self) -> &'static str {
        match self {
            SiteState::Development => "development",
            SiteState::Production => "production",
        }
    }

    /// Verbose in development, critical messages only in production.
    pub fn default_debug_level(&self) -> u8 {
        match self {
            SiteState::Development => 5,
            SiteState::Production => 1,
        }
    }
}

impl FromStr for SiteState {
    type Err = ConfigError;

    fn from_str(s: &str) -> Result<Self> {
        match s.trim().to_lowercase().as_str() {
            "development" | "dev" => Ok(SiteState::Development),
            "production" | "prod" => Ok(SiteState::Production),
            other => Err(ConfigError::InvalidSiteState(other.to_string())),
        }
    }
}

impl fmt::Display for SiteState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Pick the debug level: a positive override, then a positive configured
/// value, then the site state's default.
pub fn resolve_debug_level(
    override_level: Option<&str>,
    configured: Option<&serde_json::Value>,
    state: SiteState,
) -> u8 {
    let from_override = override_level
        .and_then(|level| level.trim().parse::<i64>().ok())
        .filter(|level| *level > 0);
    let from_config = configured
        .and_then(|value| {
            value
                .as_i64()
                .or_else(|| value.as_str().and_then(|s| s.trim().parse().ok()))
        })
        .filter(|level| *level > 0);

    from_override
        .or(from_config)
        .map(|level| u8::try_from(level).unwrap_or(u8::MAX))
        .unwrap_or_else(|| state.default_debug_level())
}
