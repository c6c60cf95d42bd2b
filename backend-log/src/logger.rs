// Numbered-severity logger tool

use crate::Level;
use std::fmt;
use std::io::{self, Write};
use std::sync::{Arc, Mutex};

/// Numbered message severity used by applications.
///
/// 1. Critical
/// 2. Warning
/// 3. Important
/// 4. Information
/// 5. Debug
///
/// Any other number is kept as [`Severity::Other`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Severity {
    Critical,
    Warning,
    Important,
    Information,
    Debug,
    Other(i64),
}

impl Severity {
    pub fn from_level(level: i64) -> Self {
        match level {
            1 => Severity::Critical,
            2 => Severity::Warning,
            3 => Severity::Important,
            4 => Severity::Information,
            5 => Severity::Debug,
            other => Severity::Other(other),
        }
    }

    pub fn number(&self) -> i64 {
        match self {
            Severity::Critical => 1,
            Severity::Warning => 2,
            Severity::Important => 3,
            Severity::Information => 4,
            Severity::Debug => 5,
            Severity::Other(n) => *n,
        }
    }

    /// Closest macro level for this severity.
    pub fn level(&self) -> Level {
        match self {
            Severity::Critical => Level::Error,
            Severity::Warning => Level::Warn,
            Severity::Important | Severity::Other(_) => Level::Info,
            Severity::Information => Level::Debug,
            Severity::Debug => Level::Trace,
        }
    }
}

impl fmt::Display for Severity {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Severity::Critical => write!(f, "CRITICAL"),
            Severity::Warning => write!(f, "WARNING"),
            Severity::Important => write!(f, "IMPORTANT"),
            Severity::Information => write!(f, "INFORMATION"),
            Severity::Debug => write!(f, "DEBUG"),
            Severity::Other(n) => write!(f, "OTHER - {}", n),
        }
    }
}

/// A single log line.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LogMessage {
    pub message: String,
    pub severity: Severity,
}

impl LogMessage {
    pub fn new(message: impl Into<String>, level: i64) -> Self {
        Self {
            message: message.into(),
            severity: Severity::from_level(level),
        }
    }

    /// Format as `YYYY-MM-DD HH:MM:SS (LABEL) message` using the local clock.
    pub fn format_line(&self) -> String {
        self.format_at(chrono::Local::now().naive_local())
    }

    pub fn format_at(&self, at: chrono::NaiveDateTime) -> String {
        format!(
            "{} ({}) {}",
            at.format("%Y-%m-%d %H:%M:%S"),
            self.severity,
            self.message
        )
    }
}

/// Logger tool writing formatted lines to a sink (stderr by default).
pub struct Logger {
    sink: Mutex<Box<dyn Write + Send>>,
}

impl Logger {
    pub fn new() -> Self {
        Self::with_sink(Box::new(io::stderr()))
    }

    pub fn with_sink(sink: Box<dyn Write + Send>) -> Self {
        Self {
            sink: Mutex::new(sink),
        }
    }

    /// Write `message` at the numbered `level`, returning the emitted line.
    pub fn log(&self, message: &str, level: i64) -> String {
        let line = LogMessage::new(message, level).format_line();
        match self.sink.lock() {
            Ok(mut sink) => {
                if let Err(e) = writeln!(sink, "{}", line).and_then(|()| sink.flush()) {
                    crate::warn!(target: "backend_log::logger", "Could not write log line: {}", e);
                }
            }
            Err(_) => {
                crate::warn!(target: "backend_log::logger", "Log sink poisoned, dropped: {}", line);
            }
        }
        line
    }
}

impl Default for Logger {
    fn default() -> Self {
        Self::new()
    }
}

impl fmt::Debug for Logger {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Logger").finish_non_exhaustive()
    }
}

/// In-memory sink whose clones share one buffer.
#[derive(Clone, Default)]
pub struct MemorySink {
    buffer: Arc<Mutex<Vec<u8>>>,
}

impl MemorySink {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn contents(&self) -> String {
        self.buffer
            .lock()
            .map(|buf| String::from_utf8_lossy(&buf).into_owned())
            .unwrap_or_default()
    }

    pub fn lines(&self) -> Vec<String> {
        self.contents().lines().map(str::to_string).collect()
    }
}

impl Write for MemorySink {
    fn write(&mut self, data: &[u8]) -> io::Result<usize> {
        let mut buf = self
            .buffer
            .lock()
            .map_err(|_| io::Error::other("memory sink poisoned"))?;
        buf.extend_from_slice(data);
        Ok(data.len())
    }

    fn flush(&mut self) -> io::Result<()> {
        Ok(())
    }
}
