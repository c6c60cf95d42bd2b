// Route derived from a request

use crate::error::Error;
use crate::request::{HttpMethod, Request};
use heck::ToUpperCamelCase;
use std::sync::Arc;

/// Area used when the query is empty.
pub const DEFAULT_AREA: &str = "home";
/// Action used when the query names only an area.
pub const DEFAULT_ACTION: &str = "list";

/// Area, action and arguments of a request.
///
/// Immutable once built. The synthetic error route also carries the fault
/// that triggered recovery.
#[derive(Debug, Clone)]
pub struct Route {
    area: String,
    action: String,
    arguments: Vec<String>,
    request: Request,
    failure: Option<Arc<Error>>,
}

impl Route {
    pub fn from_request(request: &Request) -> Self {
        let mut segments = request
            .query()
            .split('/')
            .filter(|s| !s.is_empty())
            .map(str::to_string);

        let area = segments.next().unwrap_or_else(|| DEFAULT_AREA.to_string());
        let action = segments.next().unwrap_or_else(|| DEFAULT_ACTION.to_string());
        let arguments = segments.collect();

        Self {
            area,
            action,
            arguments,
            request: request.clone(),
            failure: None,
        }
    }

    /// The `error/exception` route dispatched while recovering from `fault`.
    pub fn error(fault: Arc<Error>) -> Self {
        let request = Request::internal(HttpMethod::GET, "error/exception");
        let mut route = Self::from_request(&request);
        route.failure = Some(fault);
        route
    }

    pub fn area(&self) -> &str {
        &self.area
    }

    pub fn action(&self) -> &str {
        &self.action
    }

    pub fn arguments(&self) -> &[String] {
        &self.arguments
    }

    pub fn request(&self) -> &Request {
        &self.request
    }

    pub fn failure(&self) -> Option<&Arc<Error>> {
        self.failure.as_ref()
    }

    /// Controller base name for the area: `user_accounts` -> `UserAccounts`.
    pub fn controller_name(&self) -> String {
        self.area.to_upper_camel_case()
    }
}
