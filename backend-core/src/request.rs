// Request: method, decoded query, extension and negotiated format

use crate::error::{Error, Result};
use crate::logging::trace;
use std::cmp::Ordering;
use std::collections::HashMap;
use std::fmt;

/// Extension used when the query carries no recognizable one.
pub const DEFAULT_EXTENSION: &str = "cli";

/// Tokens accepted as an `_ext` suffix (`home_json`).
const KNOWN_EXTENSIONS: &[&str] = &[
    "json", "xml", "html", "htm", "txt", "csv", "css", "js", "yaml", "php", "cli",
];

/// HTTP methods accepted by the framework
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum HttpMethod {
    GET,
    POST,
    PUT,
    DELETE,
    PATCH,
    HEAD,
    OPTIONS,
}

impl HttpMethod {
    #[allow(clippy::should_implement_trait)]
    pub fn from_str(s: &str) -> Option<Self> {
        match s.to_uppercase().as_str() {
            "GET" => Some(HttpMethod::GET),
            "POST" => Some(HttpMethod::POST),
            "PUT" => Some(HttpMethod::PUT),
            "DELETE" => Some(HttpMethod::DELETE),
            "PATCH" => Some(HttpMethod::PATCH),
            "HEAD" => Some(HttpMethod::HEAD),
            "OPTIONS" => Some(HttpMethod::OPTIONS),
            _ => None,
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            HttpMethod::GET => "GET",
            HttpMethod::POST => "POST",
            HttpMethod::PUT => "PUT",
            HttpMethod::DELETE => "DELETE",
            HttpMethod::PATCH => "PATCH",
            HttpMethod::HEAD => "HEAD",
            HttpMethod::OPTIONS => "OPTIONS",
        }
    }
}

impl fmt::Display for HttpMethod {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// An inbound request.
///
/// The query is the routing path: decoded once, trailing slashes and the
/// extension removed.
#[derive(Debug, Clone)]
pub struct Request {
    method: HttpMethod,
    query: String,
    extension: String,
    parameters: Vec<(String, String)>,
    headers: HashMap<String, String>,
    body: Vec<u8>,
}

impl Request {
    /// Build a request from raw query pairs.
    ///
    /// The first pair with an empty value names the path. Fails with
    /// [`Error::UnsupportedMethod`] for methods outside [`HttpMethod`].
    pub fn new<K, V>(method: &str, pairs: impl IntoIterator<Item = (K, V)>) -> Result<Self>
    where
        K: Into<String>,
        V: Into<String>,
    {
        let method = HttpMethod::from_str(method)
            .ok_or_else(|| Error::UnsupportedMethod(method.to_string()))?;

        let parameters: Vec<(String, String)> = pairs
            .into_iter()
            .map(|(k, v)| (k.into(), v.into()))
            .collect();

        let raw_path = parameters
            .iter()
            .find(|(_, value)| value.is_empty())
            .map(|(key, _)| key.as_str())
            .unwrap_or("");

        let decoded = decode_component(raw_path);
        let (query, extension) = split_extension(decoded.trim_matches('/'));
        trace!(method = %method, query = %query, extension = %extension, "Request parsed");

        Ok(Self {
            method,
            query,
            extension,
            parameters,
            headers: HashMap::new(),
            body: Vec::new(),
        })
    }

    /// Build a request from a URI such as `/home/read.json?format=xml`.
    ///
    /// The path is kept encoded so it is decoded exactly once, like a path
    /// supplied through [`Request::new`].
    pub fn from_uri(method: &str, uri: &str) -> Result<Self> {
        let (path, query_string) = match uri.split_once('?') {
            Some((path, qs)) => (path, qs),
            None => (uri, ""),
        };

        let mut pairs = vec![(path.trim_start_matches('/').to_string(), String::new())];
        pairs.extend(
            query_string
                .split('&')
                .filter(|part| !part.is_empty())
                .map(|part| match part.split_once('=') {
                    Some((k, v)) => (decode_component(k), decode_component(v)),
                    None => (decode_component(part), String::new()),
                })
                .filter(|(k, v)| !k.is_empty() && !v.is_empty()),
        );

        Self::new(method, pairs)
    }

    /// A request built by the framework itself, with an already-decoded query.
    pub(crate) fn internal(method: HttpMethod, query: &str) -> Self {
        Self {
            method,
            query: query.to_string(),
            extension: DEFAULT_EXTENSION.to_string(),
            parameters: vec![(query.to_string(), String::new())],
            headers: HashMap::new(),
            body: Vec::new(),
        }
    }

    pub fn with_header(mut self, key: impl Into<String>, value: impl Into<String>) -> Self {
        self.headers.insert(key.into().to_ascii_lowercase(), value.into());
        self
    }

    pub fn with_accept(self, accept: impl Into<String>) -> Self {
        self.with_header("Accept", accept)
    }

    pub fn with_body(mut self, body: impl Into<Vec<u8>>) -> Self {
        self.body = body.into();
        self
    }

    pub fn method(&self) -> HttpMethod {
        self.method
    }

    /// Decoded routing path without extension, e.g. `home/read`.
    pub fn query(&self) -> &str {
        &self.query
    }

    /// Extension inferred from the path, `cli` when none was given.
    pub fn extension(&self) -> &str {
        &self.extension
    }

    /// Format requested explicitly through the `format` parameter.
    pub fn specified_format(&self) -> Option<&str> {
        self.parameter("format").filter(|f| !f.is_empty())
    }

    /// Preferred MIME type: from `Accept`, else from the extension.
    pub fn mime_type(&self) -> String {
        self.header("accept")
            .and_then(preferred_media_type)
            .or_else(|| mime_for_extension(&self.extension).map(str::to_string))
            .unwrap_or_else(|| "text/plain".to_string())
    }

    pub fn parameter(&self, name: &str) -> Option<&str> {
        self.parameters
            .iter()
            .find(|(key, _)| key == name)
            .map(|(_, value)| value.as_str())
    }

    pub fn parameters(&self) -> &[(String, String)] {
        &self.parameters
    }

    pub fn header(&self, name: &str) -> Option<&str> {
        self.headers
            .get(&name.to_ascii_lowercase())
            .map(String::as_str)
    }

    pub fn headers(&self) -> &HashMap<String, String> {
        &self.headers
    }

    pub fn body(&self) -> &[u8] {
        &self.body
    }
}

/// Percent-decode once, treating `+` as a space.
fn decode_component(raw: &str) -> String {
    let spaced = raw.replace('+', " ");
    match urlencoding::decode(&spaced) {
        Ok(decoded) => decoded.into_owned(),
        Err(_) => spaced,
    }
}

/// Split `home/read.json` or `home/read_json` into query and extension.
fn split_extension(path: &str) -> (String, String) {
    let segment_start = path.rfind('/').map(|i| i + 1).unwrap_or(0);
    let segment = &path[segment_start..];

    if let Some(dot) = segment.rfind('.') {
        let ext = &segment[dot + 1..];
        if dot > 0 && !ext.is_empty() {
            let query = path[..segment_start + dot].trim_end_matches('/');
            return (query.to_string(), ext.to_ascii_lowercase());
        }
    }

    if let Some(underscore) = segment.rfind('_') {
        let ext = segment[underscore + 1..].to_ascii_lowercase();
        if underscore > 0 && KNOWN_EXTENSIONS.contains(&ext.as_str()) {
            return (path[..segment_start + underscore].to_string(), ext);
        }
    }

    (path.to_string(), DEFAULT_EXTENSION.to_string())
}

fn mime_for_extension(extension: &str) -> Option<&'static str> {
    let mime = match extension {
        "json" => "application/json",
        "xml" => "application/xml",
        "html" | "htm" | "php" => "text/html",
        "txt" | "cli" => "text/plain",
        "csv" => "text/csv",
        "css" => "text/css",
        "js" => "text/javascript",
        "yaml" => "application/yaml",
        _ => return None,
    };
    Some(mime)
}

/// Highest-quality concrete media type in an `Accept` header.
fn preferred_media_type(header: &str) -> Option<String> {
    let mut media_types: Vec<(&str, f32)> = header
        .split(',')
        .filter_map(|part| {
            let mut params = part.split(';');
            let media = params.next()?.trim();
            if media.is_empty() || !media.contains('/') {
                return None;
            }
            let quality = params
                .filter_map(|p| p.trim().strip_prefix("q="))
                .find_map(|q| q.trim().parse::<f32>().ok())
                .unwrap_or(1.0)
                .clamp(0.0, 1.0);
            Some((media, quality))
        })
        .filter(|(_, quality)| *quality > 0.0)
        .collect();

    // Stable: equal quality keeps header order.
    media_types.sort_by(|a, b| b.1.partial_cmp(&a.1).unwrap_or(Ordering::Equal));

    media_types
        .into_iter()
        .map(|(media, _)| media)
        .find(|media| *media != "*/*")
        .map(|media| media.to_ascii_lowercase())
}

#[cfg(test)]
mod tests {
    use super::*;

    fn path(query: &str) -> Request {
        Request::new("GET", [(query, "")]).unwrap()
    }

    #[test]
    fn test_url_formats() {
        let cases = [
            ("home", "home"),
            ("home/", "home"),
            ("home%2Fread", "home/read"),
            ("home/read/some%252Fthing", "home/read/some%2Fthing"),
            ("home%2Fread/some%252Fthing", "home/read/some%2Fthing"),
        ];
        for (input, expected) in cases {
            assert_eq!(path(input).query(), expected, "input {}", input);
        }
    }

    #[test]
    fn test_unsupported_method() {
        let err = Request::new("UPDATE", Vec::<(String, String)>::new()).unwrap_err();
        assert!(matches!(err, Error::UnsupportedMethod(ref m) if m == "UPDATE"));
    }

    #[test]
    fn test_method_is_case_insensitive() {
        let request = Request::new("get", [("error/exception", "")]).unwrap();
        assert_eq!(request.method(), HttpMethod::GET);
        assert_eq!(request.query(), "error/exception");
    }

    #[test]
    fn test_request_extension() {
        let cases = [
            ("home.json", "json", "home"),
            ("home_json", "json", "home"),
            ("home_camp.json", "json", "home_camp"),
            ("home_camp_json", "json", "home_camp"),
            ("home_camp/read.json", "json", "home_camp/read"),
            ("home_camp/read_json", "json", "home_camp/read"),
            ("home_camp", "cli", "home_camp"),
        ];
        for (input, extension, query) in cases {
            let request = Request::new("POST", [(input, "")]).unwrap();
            assert_eq!(request.extension(), extension, "input {}", input);
            assert_eq!(request.query(), query, "input {}", input);
        }
    }

    #[test]
    fn test_specified_format() {
        let request = Request::new("GET", [("home", ""), ("format", "xml")]).unwrap();
        assert_eq!(request.specified_format(), Some("xml"));
        assert_eq!(path("home").specified_format(), None);
    }

    #[test]
    fn test_mime_type() {
        assert_eq!(path("home.json").mime_type(), "application/json");
        assert_eq!(path("home").mime_type(), "text/plain");
        assert_eq!(path("home.unknown").mime_type(), "text/plain");

        let request = path("home.json").with_accept("text/html;q=0.5, application/xml");
        assert_eq!(request.mime_type(), "application/xml");

        let request = path("home.json").with_accept("*/*");
        assert_eq!(request.mime_type(), "application/json");
    }

    #[test]
    fn test_from_uri() {
        let request = Request::from_uri("GET", "/blog/show.json?format=xml&page=2").unwrap();
        assert_eq!(request.query(), "blog/show");
        assert_eq!(request.extension(), "json");
        assert_eq!(request.specified_format(), Some("xml"));
        assert_eq!(request.parameter("page"), Some("2"));

        let request = Request::from_uri("GET", "home%2Fread/some%252Fthing").unwrap();
        assert_eq!(request.query(), "home/read/some%2Fthing");
    }

    #[test]
    fn test_empty_request() {
        let request = Request::new("GET", Vec::<(String, String)>::new()).unwrap();
        assert_eq!(request.query(), "");
        assert_eq!(request.extension(), "cli");
    }

    #[test]
    fn test_headers_and_body() {
        let request = path("home")
            .with_header("X-Token", "abc")
            .with_body("payload");
        assert_eq!(request.header("x-token"), Some("abc"));
        assert_eq!(request.body(), b"payload");
    }
}
