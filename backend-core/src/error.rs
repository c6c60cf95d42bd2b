// Error types for the Backend framework

use std::sync::Arc;
use thiserror::Error;

#[derive(Error, Debug)]
pub enum Error {
    #[error("Cannot open view folder: {0}")]
    ViewFolderUnavailable(String),

    #[error("Unrecognized format: {0}")]
    UnrecognizedFormat(String),

    #[error("Invalid view: {0}")]
    InvalidView(String),

    #[error("Unknown controller: {0}")]
    UnknownController(String),

    #[error("Class {0} is not a controller decorator")]
    InvalidDecorator(String),

    #[error("Unsupported method: {0}")]
    UnsupportedMethod(String),

    #[error("Undefined tool: {0}")]
    UndefinedTool(String),

    #[error("Tool construction failed: {0}")]
    ToolConstruction(String),

    #[error("Unhandled error: {0}")]
    Unhandled(String),

    #[error("Controller error: {0}")]
    Controller(String),

    #[error("Binding error: {0}")]
    Binding(String),

    #[error("Serialization error: {0}")]
    Serialization(String),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}

impl Error {
    /// HTTP status code reported for this error
    pub fn status_code(&self) -> u16 {
        match self {
            Error::UnknownController(_) => 404,
            Error::UnsupportedMethod(_) => 405,
            Error::UnrecognizedFormat(_) => 406,
            _ => 500,
        }
    }

    /// Promote a caught panic payload into a first-class failure.
    pub fn from_panic(payload: Box<dyn std::any::Any + Send>) -> Self {
        let message = if let Some(s) = payload.downcast_ref::<&str>() {
            (*s).to_string()
        } else if let Some(s) = payload.downcast_ref::<String>() {
            s.clone()
        } else {
            "panic with non-string payload".to_string()
        };
        Error::Unhandled(message)
    }
}

/// Raised when the single recovery dispatch for an unhandled fault fails too.
#[derive(Error, Debug)]
#[error("Could not handle exception: {source}")]
pub struct UnrecoverableFault {
    /// The original fault that triggered recovery
    pub original: Arc<Error>,
    /// The fault raised while recovering
    #[source]
    pub source: Error,
}

pub type Result<T> = std::result::Result<T, Error>;
