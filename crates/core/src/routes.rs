//! Declarative route policy table.
//!
//! Each rule pairs a request predicate with a caching strategy. Rules are
//! evaluated in order and the first match wins; a request matching no rule
//! is passed through to the network.

use std::collections::HashSet;

use regex::Regex;
use schemars::JsonSchema;
use serde::{Deserialize, Serialize};
use url::Url;

use crate::config::{AppConfig, ConfigError};
use crate::http::Request;

/// Which kind of traffic a rule covers.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, JsonSchema)]
#[serde(rename_all = "snake_case")]
pub enum RouteClass {
    Bypass,
    Data,
    Navigation,
    Asset,
    CrossOrigin,
}

/// How a matched request is answered.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, JsonSchema)]
#[serde(rename_all = "snake_case")]
pub enum Strategy {
    /// Straight to the network; never cached.
    Passthrough,
    /// Network, storing ok responses; any cached copy on failure.
    NetworkFirst,
    /// Cached copy with background refresh; network then offline page on miss.
    CacheFirstWithOfflinePage,
    /// Cached copy with background refresh; network then 404 placeholder on miss.
    StaleWhileRevalidate,
}

/// Request predicate.
#[derive(Debug, Clone)]
pub enum RouteMatcher {
    /// Any method other than GET.
    NonGet,
    /// Request host is in the set.
    Hosts(HashSet<String>),
    /// Same-origin request whose path matches any of the patterns.
    SameOriginPath(Vec<Regex>),
    /// Same-origin navigation.
    Navigation,
    /// Any same-origin request.
    SameOrigin,
    /// Everything.
    Any,
}

impl RouteMatcher {
    fn matches(&self, request: &Request, origin: &Url) -> bool {
        match self {
            RouteMatcher::NonGet => !request.is_get(),
            RouteMatcher::Hosts(hosts) => request.url.host_str().is_some_and(|h| hosts.contains(&h.to_lowercase())),
            RouteMatcher::SameOriginPath(patterns) => {
                request.is_same_origin(origin) && patterns.iter().any(|p| p.is_match(request.url.path()))
            }
            RouteMatcher::Navigation => request.is_same_origin(origin) && request.is_navigation(),
            RouteMatcher::SameOrigin => request.is_same_origin(origin),
            RouteMatcher::Any => true,
        }
    }
}

/// One row of the policy table.
#[derive(Debug, Clone)]
pub struct RouteRule {
    pub class: RouteClass,
    pub matcher: RouteMatcher,
    pub strategy: Strategy,
}

impl RouteRule {
    pub fn new(class: RouteClass, matcher: RouteMatcher, strategy: Strategy) -> Self {
        Self { class, matcher, strategy }
    }
}

/// Ordered policy table bound to a site origin.
#[derive(Debug, Clone)]
pub struct RouteTable {
    origin: Url,
    rules: Vec<RouteRule>,
}

/// Returned for requests no rule claims.
const UNMATCHED: (RouteClass, Strategy) = (RouteClass::Bypass, Strategy::Passthrough);

impl RouteTable {
    pub fn new(origin: Url, rules: Vec<RouteRule>) -> Self {
        Self { origin, rules }
    }

    /// The standard table: bypass, data, navigation, same-origin assets, cross-origin.
    ///
    /// # Errors
    ///
    /// Returns `ConfigError::Invalid` for a bad origin or data pattern.
    pub fn from_config(config: &AppConfig) -> Result<Self, ConfigError> {
        let origin = config.origin_url()?;
        let patterns = config
            .data_patterns
            .iter()
            .map(|p| {
                Regex::new(p).map_err(|e| ConfigError::Invalid {
                    field: "data_patterns".into(),
                    reason: format!("{p:?}: {e}"),
                })
            })
            .collect::<Result<Vec<_>, _>>()?;
        let hosts = config.bypass_hosts.iter().map(|h| h.to_lowercase()).collect();

        let rules = vec![
            RouteRule::new(RouteClass::Bypass, RouteMatcher::NonGet, Strategy::Passthrough),
            RouteRule::new(RouteClass::Bypass, RouteMatcher::Hosts(hosts), Strategy::Passthrough),
            RouteRule::new(RouteClass::Data, RouteMatcher::SameOriginPath(patterns), Strategy::NetworkFirst),
            RouteRule::new(RouteClass::Navigation, RouteMatcher::Navigation, Strategy::CacheFirstWithOfflinePage),
            RouteRule::new(RouteClass::Asset, RouteMatcher::SameOrigin, Strategy::StaleWhileRevalidate),
            RouteRule::new(RouteClass::CrossOrigin, RouteMatcher::Any, Strategy::NetworkFirst),
        ];

        Ok(Self::new(origin, rules))
    }

    pub fn origin(&self) -> &Url {
        &self.origin
    }

    pub fn rules(&self) -> &[RouteRule] {
        &self.rules
    }

    /// Class and strategy of the first rule matching `request`.
    pub fn route(&self, request: &Request) -> (RouteClass, Strategy) {
        self.rules
            .iter()
            .find(|rule| rule.matcher.matches(request, &self.origin))
            .map(|rule| (rule.class, rule.strategy))
            .unwrap_or(UNMATCHED)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::http::RequestMode;

    fn table() -> RouteTable {
        let config = AppConfig { origin: "https://kids.example.org".into(), ..Default::default() };
        RouteTable::from_config(&config).unwrap()
    }

    fn url(s: &str) -> Url {
        Url::parse(s).unwrap()
    }

    #[test]
    fn test_non_get_bypasses() {
        let req = Request::get(url("https://kids.example.org/a.json")).with_method("POST");
        assert_eq!(table().route(&req), (RouteClass::Bypass, Strategy::Passthrough));
    }

    #[test]
    fn test_analytics_host_bypasses() {
        let req = Request::get(url("https://www.google-analytics.com/collect?v=1"));
        assert_eq!(table().route(&req).0, RouteClass::Bypass);

        let upper = Request::get(url("https://WWW.Google-Analytics.com/collect"));
        assert_eq!(table().route(&upper).0, RouteClass::Bypass);
    }

    #[test]
    fn test_json_is_data() {
        let req = Request::get(url("https://kids.example.org/games/keyboard.json"));
        assert_eq!(table().route(&req), (RouteClass::Data, Strategy::NetworkFirst));
    }

    #[test]
    fn test_data_wins_over_navigation() {
        let req = Request::navigate(url("https://kids.example.org/data/classes.json"));
        assert_eq!(table().route(&req).0, RouteClass::Data);
    }

    #[test]
    fn test_navigation() {
        let req = Request::navigate(url("https://kids.example.org/lessons.html"));
        assert_eq!(table().route(&req), (RouteClass::Navigation, Strategy::CacheFirstWithOfflinePage));

        let by_accept = Request::get(url("https://kids.example.org/about.html")).with_accept("text/html");
        assert_eq!(table().route(&by_accept).0, RouteClass::Navigation);
    }

    #[test]
    fn test_same_origin_asset() {
        let req = Request::get(url("https://kids.example.org/games/mouse.js"));
        assert_eq!(table().route(&req), (RouteClass::Asset, Strategy::StaleWhileRevalidate));
    }

    #[test]
    fn test_cross_origin() {
        let req = Request::get(url("https://fonts.example.net/font.css")).with_mode(RequestMode::Cors);
        assert_eq!(table().route(&req), (RouteClass::CrossOrigin, Strategy::NetworkFirst));

        let nav = Request::navigate(url("https://other.example.net/"));
        assert_eq!(table().route(&nav).0, RouteClass::CrossOrigin);

        let json = Request::get(url("https://api.example.net/feed.json"));
        assert_eq!(table().route(&json).0, RouteClass::CrossOrigin);
    }

    #[test]
    fn test_unmatched_passes_through() {
        let table = RouteTable::new(
            url("https://kids.example.org"),
            vec![RouteRule::new(RouteClass::Asset, RouteMatcher::SameOrigin, Strategy::StaleWhileRevalidate)],
        );
        let req = Request::get(url("https://cdn.example.net/x.js"));
        assert_eq!(table.route(&req), (RouteClass::Bypass, Strategy::Passthrough));
    }
}
