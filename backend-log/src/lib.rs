//! Backend Logging
//!
//! Console logging for Backend binaries and the numbered-severity
//! [`Logger`] tool applications register in their toolbox. Console lines use
//! the same `(LABEL)` layout as the tool so both read alike.
//!
//! ```rust
//! use backend_log::{debug, info, warn};
//!
//! debug!("Resolving controller {}", "Home");
//! info!("Running application in {} view", "Json");
//! warn!(target: "backend::view", "Unrecognized format: {}", "pdf");
//! ```
//!
//! Environment:
//!
//! - `BACKEND_DEBUG_LEVEL=1..5` - numbered threshold (1 critical only, 5 everything)
//! - `BACKEND_LOG_LEVEL=trace|debug|info|warn|error|off` - named threshold, wins over the number
//! - `BACKEND_LOG_FORMAT=line|json`
//! - `BACKEND_LOG_COLOR=1|0`

mod logger;

pub use logger::{LogMessage, Logger, MemorySink, Severity};

use once_cell::sync::Lazy;
use std::env;
use std::io::Write;
use std::str::FromStr;
use std::sync::atomic::{AtomicU8, Ordering};

/// Console threshold, ordered from most to least verbose.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord)]
#[repr(u8)]
pub enum Level {
    Trace = 0,
    Debug = 1,
    Info = 2,
    Warn = 3,
    Error = 4,
    Off = 5,
}

impl Level {
    const ALL: [Level; 6] = [
        Level::Trace,
        Level::Debug,
        Level::Info,
        Level::Warn,
        Level::Error,
        Level::Off,
    ];

    /// Threshold showing every severity up to `debug_level`.
    pub fn from_debug_level(debug_level: u8) -> Self {
        match debug_level {
            0 => Level::Off,
            1 => Level::Error,
            2 => Level::Warn,
            3 => Level::Info,
            4 => Level::Debug,
            _ => Level::Trace,
        }
    }

    /// Severity label printed for console lines at this level.
    pub fn severity(&self) -> Severity {
        match self {
            Level::Error | Level::Off => Severity::Critical,
            Level::Warn => Severity::Warning,
            Level::Info => Severity::Important,
            Level::Debug => Severity::Information,
            Level::Trace => Severity::Debug,
        }
    }

    fn from_u8(value: u8) -> Self {
        Self::ALL
            .get(value as usize)
            .copied()
            .unwrap_or(Level::Off)
    }
}

impl FromStr for Level {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_ascii_lowercase().as_str() {
            "trace" => Ok(Level::Trace),
            "debug" => Ok(Level::Debug),
            "info" => Ok(Level::Info),
            "warn" | "warning" => Ok(Level::Warn),
            "error" => Ok(Level::Error),
            "off" | "none" => Ok(Level::Off),
            other => Err(format!("unknown log level: {}", other)),
        }
    }
}

/// Console line layout.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Format {
    /// `YYYY-MM-DD HH:MM:SS (LABEL) target: message`
    Line,
    /// One JSON object per line
    Json,
}

impl FromStr for Format {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_ascii_lowercase().as_str() {
            "line" | "pretty" | "compact" => Ok(Format::Line),
            "json" => Ok(Format::Json),
            other => Err(format!("unknown log format: {}", other)),
        }
    }
}

static THRESHOLD: AtomicU8 = AtomicU8::new(Level::Warn as u8);

static CONSOLE: Lazy<ConsoleConfig> = Lazy::new(ConsoleConfig::from_env);

/// Console settings read once from the environment.
#[derive(Debug, Clone)]
pub struct ConsoleConfig {
    pub level: Level,
    pub format: Format,
    pub color: bool,
}

impl Default for ConsoleConfig {
    fn default() -> Self {
        Self {
            level: Level::Warn,
            format: Format::Line,
            color: false,
        }
    }
}

impl ConsoleConfig {
    pub fn from_env() -> Self {
        let numbered = env::var("BACKEND_DEBUG_LEVEL")
            .ok()
            .and_then(|v| v.trim().parse::<u8>().ok())
            .map(Level::from_debug_level);
        let named = env::var("BACKEND_LOG_LEVEL")
            .ok()
            .and_then(|v| v.parse().ok());
        let level = named.or(numbered).unwrap_or(Level::Warn);

        let format = env::var("BACKEND_LOG_FORMAT")
            .ok()
            .and_then(|v| v.parse().ok())
            .unwrap_or(Format::Line);

        let color = match env::var("BACKEND_LOG_COLOR") {
            Ok(v) => v == "1" || v.eq_ignore_ascii_case("true"),
            Err(_) => env::var("NO_COLOR").is_err() && env::var("TERM").is_ok(),
        };

        THRESHOLD.store(level as u8, Ordering::SeqCst);
        Self {
            level,
            format,
            color,
        }
    }
}

/// Read the environment now rather than on the first message.
pub fn init() {
    Lazy::force(&CONSOLE);
}

pub fn config() -> &'static ConsoleConfig {
    &CONSOLE
}

#[inline]
pub fn is_level_enabled(level: Level) -> bool {
    level != Level::Off && level as u8 >= THRESHOLD.load(Ordering::Relaxed)
}

pub fn current_level() -> Level {
    Level::from_u8(THRESHOLD.load(Ordering::Relaxed))
}

pub fn set_level(level: Level) {
    THRESHOLD.store(level as u8, Ordering::SeqCst);
}

/// Console line for `message`, without the trailing newline.
pub fn render(level: Level, target: &str, message: &str, format: Format) -> String {
    let severity = level.severity();
    match format {
        Format::Line => {
            let stamp = chrono::Local::now().format("%Y-%m-%d %H:%M:%S");
            if target.is_empty() {
                format!("{} ({}) {}", stamp, severity, message)
            } else {
                format!("{} ({}) {}: {}", stamp, severity, target, message)
            }
        }
        Format::Json => render_json(severity, target, message),
    }
}

#[cfg(feature = "json")]
#[derive(serde::Serialize)]
struct JsonLine<'a> {
    timestamp: String,
    severity: i64,
    label: String,
    target: &'a str,
    message: &'a str,
}

#[cfg(feature = "json")]
fn render_json(severity: Severity, target: &str, message: &str) -> String {
    let line = JsonLine {
        timestamp: chrono::Utc::now().to_rfc3339(),
        severity: severity.number(),
        label: severity.to_string(),
        target,
        message,
    };
    serde_json::to_string(&line)
        .unwrap_or_else(|_| format!("({}) {}: {}", severity, target, message))
}

#[cfg(not(feature = "json"))]
fn render_json(severity: Severity, target: &str, message: &str) -> String {
    format!("({}) {}: {}", severity, target, message)
}

#[doc(hidden)]
pub fn log(level: Level, target: &str, message: &str) {
    if !is_level_enabled(level) {
        return;
    }
    let config = config();
    let line = render(level, target, message, config.format);

    #[cfg(feature = "color")]
    let line = if config.color && config.format == Format::Line {
        paint(level, line)
    } else {
        line
    };

    let _ = writeln!(std::io::stderr().lock(), "{}", line);
}

#[cfg(feature = "color")]
fn paint(level: Level, line: String) -> String {
    use colored::Colorize;
    match level {
        Level::Error | Level::Off => line.red().bold().to_string(),
        Level::Warn => line.yellow().to_string(),
        Level::Info => line,
        Level::Debug | Level::Trace => line.dimmed().to_string(),
    }
}

#[doc(hidden)]
#[macro_export]
macro_rules! __emit {
    ($level:expr, $target:expr, $($arg:tt)+) => {
        if $crate::is_level_enabled($level) {
            $crate::log($level, $target, &format!($($arg)+));
        }
    };
}

#[macro_export]
macro_rules! trace {
    (target: $target:expr, $($arg:tt)+) => { $crate::__emit!($crate::Level::Trace, $target, $($arg)+) };
    ($($arg:tt)+) => { $crate::__emit!($crate::Level::Trace, module_path!(), $($arg)+) };
}

#[macro_export]
macro_rules! debug {
    (target: $target:expr, $($arg:tt)+) => { $crate::__emit!($crate::Level::Debug, $target, $($arg)+) };
    ($($arg:tt)+) => { $crate::__emit!($crate::Level::Debug, module_path!(), $($arg)+) };
}

#[macro_export]
macro_rules! info {
    (target: $target:expr, $($arg:tt)+) => { $crate::__emit!($crate::Level::Info, $target, $($arg)+) };
    ($($arg:tt)+) => { $crate::__emit!($crate::Level::Info, module_path!(), $($arg)+) };
}

#[macro_export]
macro_rules! warn {
    (target: $target:expr, $($arg:tt)+) => { $crate::__emit!($crate::Level::Warn, $target, $($arg)+) };
    ($($arg:tt)+) => { $crate::__emit!($crate::Level::Warn, module_path!(), $($arg)+) };
}

#[macro_export]
macro_rules! error {
    (target: $target:expr, $($arg:tt)+) => { $crate::__emit!($crate::Level::Error, $target, $($arg)+) };
    ($($arg:tt)+) => { $crate::__emit!($crate::Level::Error, module_path!(), $($arg)+) };
}
