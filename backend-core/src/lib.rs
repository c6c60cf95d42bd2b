// Core library for the Backend framework
// Toolbox, namespace resolution, view selection, decorated controllers and dispatch

pub mod application;
pub mod binding;
pub mod controller;
pub mod decorator;
pub mod error;
pub mod logging;
pub mod namespace;
pub mod registry;
pub mod request;
pub mod resolver;
pub mod response;
pub mod route;
pub mod toolbox;
pub mod view;

// Re-export commonly used types
pub use application::*;
pub use binding::*;
pub use controller::*;
pub use decorator::*;
pub use error::*;
pub use namespace::*;
pub use registry::*;
pub use request::*;
pub use resolver::*;
pub use response::*;
pub use route::*;
pub use toolbox::*;
pub use view::*;
