//! Request and response types flowing between the page host, the cache
//! manager, the cache store and the network.

use bytes::Bytes;
use schemars::JsonSchema;
use serde::{Deserialize, Serialize};
use url::Url;

/// How the page issued the request.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize, JsonSchema)]
#[serde(rename_all = "kebab-case")]
pub enum RequestMode {
    /// Top-level page load.
    Navigate,
    #[default]
    SameOrigin,
    Cors,
    /// Cross-origin request whose response cannot be inspected.
    NoCors,
}

/// A request intercepted by the cache manager.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Request {
    pub method: String,
    pub url: Url,
    pub mode: RequestMode,
    /// Value of the `Accept` header, if any.
    pub accept: Option<String>,
}

impl Request {
    /// A plain GET in `same-origin` mode.
    pub fn get(url: Url) -> Self {
        Self { method: "GET".to_string(), url, mode: RequestMode::SameOrigin, accept: None }
    }

    /// A GET issued by a top-level page load.
    pub fn navigate(url: Url) -> Self {
        Self {
            method: "GET".to_string(),
            url,
            mode: RequestMode::Navigate,
            accept: Some("text/html,application/xhtml+xml".to_string()),
        }
    }

    pub fn with_method(mut self, method: &str) -> Self {
        self.method = method.to_ascii_uppercase();
        self
    }

    pub fn with_mode(mut self, mode: RequestMode) -> Self {
        self.mode = mode;
        self
    }

    pub fn with_accept(mut self, accept: impl Into<String>) -> Self {
        self.accept = Some(accept.into());
        self
    }

    pub fn is_get(&self) -> bool {
        self.method.eq_ignore_ascii_case("GET")
    }

    /// Navigation requests: explicit `navigate` mode, or a GET asking for HTML.
    pub fn is_navigation(&self) -> bool {
        self.mode == RequestMode::Navigate
            || (self.is_get() && self.accept.as_deref().is_some_and(|a| a.contains("text/html")))
    }

    /// Whether the request targets the given origin (scheme, host and port).
    pub fn is_same_origin(&self, origin: &Url) -> bool {
        self.url.origin() == origin.origin()
    }
}

/// How much of a response the caller can introspect.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize, JsonSchema)]
#[serde(rename_all = "lowercase")]
pub enum ResponseKind {
    #[default]
    Basic,
    Cors,
    /// Cross-origin `no-cors` response: status and body are hidden.
    Opaque,
}

/// A response produced by the network, the cache or a placeholder.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Response {
    pub url: Url,
    pub status: u16,
    pub status_text: String,
    pub headers: Vec<(String, String)>,
    pub body: Bytes,
    pub kind: ResponseKind,
}

impl Response {
    pub fn new(url: Url, status: u16, body: impl Into<Bytes>) -> Self {
        Self {
            url,
            status,
            status_text: String::new(),
            headers: Vec::new(),
            body: body.into(),
            kind: ResponseKind::Basic,
        }
    }

    /// Empty placeholder returned when every fallback layer is exhausted.
    pub fn placeholder(url: Url, status: u16, status_text: &str) -> Self {
        Self { status_text: status_text.to_string(), ..Self::new(url, status, Bytes::new()) }
    }

    pub fn with_header(mut self, name: &str, value: &str) -> Self {
        self.headers.push((name.to_ascii_lowercase(), value.to_string()));
        self
    }

    pub fn with_kind(mut self, kind: ResponseKind) -> Self {
        self.kind = kind;
        self
    }

    /// Status in the 200-299 range.
    pub fn ok(&self) -> bool {
        (200..300).contains(&self.status)
    }

    pub fn header(&self, name: &str) -> Option<&str> {
        self.headers
            .iter()
            .find(|(k, _)| k.eq_ignore_ascii_case(name))
            .map(|(_, v)| v.as_str())
    }

    /// Whether this response may be written to a cache partition.
    ///
    /// Opaque responses hide their status, so an error page could be stored
    /// as if it were content. Partial content is never a complete copy.
    pub fn is_cacheable(&self) -> bool {
        self.kind != ResponseKind::Opaque && self.ok() && self.status != 206
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn url(s: &str) -> Url {
        Url::parse(s).unwrap()
    }

    #[test]
    fn test_navigation_by_mode() {
        let req = Request::navigate(url("https://site.test/lessons.html"));
        assert!(req.is_navigation());
    }

    #[test]
    fn test_navigation_by_accept() {
        let req = Request::get(url("https://site.test/about.html")).with_accept("text/html");
        assert!(req.is_navigation());

        let post = req.with_method("post").with_mode(RequestMode::SameOrigin);
        assert!(!post.is_navigation());
        assert_eq!(post.method, "POST");
    }

    #[test]
    fn test_same_origin() {
        let origin = url("https://site.test");
        assert!(Request::get(url("https://site.test/a.js")).is_same_origin(&origin));
        assert!(!Request::get(url("https://cdn.test/a.js")).is_same_origin(&origin));
        assert!(!Request::get(url("http://site.test/a.js")).is_same_origin(&origin));
    }

    #[test]
    fn test_cacheable() {
        let u = url("https://site.test/a.js");
        assert!(Response::new(u.clone(), 200, "x").is_cacheable());
        assert!(Response::new(u.clone(), 204, "").is_cacheable());
        assert!(!Response::new(u.clone(), 206, "x").is_cacheable());
        assert!(!Response::new(u.clone(), 404, "x").is_cacheable());
        assert!(!Response::new(u, 200, "x").with_kind(ResponseKind::Opaque).is_cacheable());
    }

    #[test]
    fn test_header_lookup_case_insensitive() {
        let resp = Response::new(url("https://site.test/"), 200, "").with_header("Content-Type", "text/html");
        assert_eq!(resp.header("content-type"), Some("text/html"));
        assert_eq!(resp.header("CONTENT-TYPE"), Some("text/html"));
        assert_eq!(resp.header("etag"), None);
    }
}
