//! Request Context
//!
//! The normalized per-request snapshot every detector reads. The hosting
//! adapter (whatever web framework the agent is embedded in) builds one
//! `Context` per inbound request and owns it for the request lifetime; it is
//! never shared between requests, so no internal synchronization is needed.

use rustc_hash::FxHashMap;
use serde::{Deserialize, Serialize};
use serde_json::Value;

/// The authenticated user attached to a request, if the host application
/// identified one.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct User {
    pub id: String,
    pub name: String,
}

/// Normalized view of one inbound request.
#[derive(Debug, Clone, Default)]
pub struct Context {
    pub method: String,
    /// Resolved route pattern, e.g. `api/users/{id}`. Empty when the host
    /// could not resolve one; detectors then fall back to `url`.
    pub route: String,
    /// Path plus query string as received.
    pub url: String,
    pub query: FxHashMap<String, String>,
    /// Header names are stored lowercased.
    headers: FxHashMap<String, String>,
    pub cookies: FxHashMap<String, String>,
    pub remote_address: String,
    /// Parsed request body, already content-type-decoded by the host.
    pub body: Value,
    pub user: Option<User>,
    pub attack_detected: bool,
    /// Set once the request has been counted against its IP-scoped rate
    /// limit, so a second check in the same request is not double-counted.
    pub consumed_rate_limit_for_ip: bool,
    pub consumed_rate_limit_for_user: bool,
}

impl Context {
    pub fn new(method: impl Into<String>, url: impl Into<String>) -> Self {
        Self {
            method: method.into(),
            url: url.into(),
            body: Value::Null,
            ..Default::default()
        }
    }

    /// Stores a header, lowercasing the name.
    pub fn set_header(&mut self, name: &str, value: impl Into<String>) {
        self.headers.insert(name.to_ascii_lowercase(), value.into());
    }

    /// Case-insensitive header lookup.
    pub fn header(&self, name: &str) -> Option<&str> {
        self.headers
            .get(&name.to_ascii_lowercase())
            .map(String::as_str)
    }

    pub fn user_agent(&self) -> Option<&str> {
        self.header("user-agent")
    }

    /// `METHOD|route` key for endpoint config lookups, falling back to the
    /// URL path when no route was resolved.
    pub fn endpoint_key(&self) -> String {
        let route = if self.route.is_empty() {
            path_of(&self.url)
        } else {
            self.route.as_str()
        };
        crate::route::endpoint_key(&self.method, route)
    }

    /// Flattens every user-controlled value into a `source.path -> value` map:
    /// query, headers, cookies, and the body walked recursively with dotted
    /// segments (`body.filter.age.0`). This is the haystack the injection
    /// detectors match operation strings against.
    pub fn flatten_user_input(&self) -> FxHashMap<String, String> {
        let mut flat = FxHashMap::default();
        for (key, value) in &self.query {
            flat.insert(format!("query.{key}"), value.clone());
        }
        for (key, value) in &self.headers {
            flat.insert(format!("headers.{key}"), value.clone());
        }
        for (key, value) in &self.cookies {
            flat.insert(format!("cookies.{key}"), value.clone());
        }
        flatten_json(&self.body, "body", &mut flat);
        flat
    }
}

fn path_of(url: &str) -> &str {
    url.split(['?', '#']).next().unwrap_or(url)
}

fn flatten_json(value: &Value, prefix: &str, out: &mut FxHashMap<String, String>) {
    match value {
        Value::Null => {}
        Value::Object(map) => {
            for (key, nested) in map {
                // Operator-style keys ($ne, $where) are recorded as values
                // too, since an attacker controlling the key is the signal.
                out.insert(format!("{prefix}.{key}"), key.clone());
                flatten_json(nested, &format!("{prefix}.{key}"), out);
            }
        }
        Value::Array(items) => {
            for (index, nested) in items.iter().enumerate() {
                flatten_json(nested, &format!("{prefix}.{index}"), out);
            }
        }
        Value::String(s) => {
            out.insert(prefix.to_string(), s.clone());
        }
        Value::Number(n) => {
            out.insert(prefix.to_string(), n.to_string());
        }
        Value::Bool(b) => {
            out.insert(prefix.to_string(), b.to_string());
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn headers_are_case_insensitive() {
        let mut ctx = Context::new("GET", "/api/users");
        ctx.set_header("User-Agent", "curl/8.0");
        assert_eq!(ctx.header("user-agent"), Some("curl/8.0"));
        assert_eq!(ctx.header("USER-AGENT"), Some("curl/8.0"));
        assert_eq!(ctx.user_agent(), Some("curl/8.0"));
        assert_eq!(ctx.header("accept"), None);
    }

    #[test]
    fn endpoint_key_prefers_route_over_url() {
        let mut ctx = Context::new("GET", "/api/users/42?verbose=1");
        assert_eq!(ctx.endpoint_key(), "GET|api/users/42");
        ctx.route = "api/users/{id}".to_string();
        assert_eq!(ctx.endpoint_key(), "GET|api/users/{id}");
    }

    #[test]
    fn flatten_covers_all_sources() {
        let mut ctx = Context::new("POST", "/search");
        ctx.query.insert("q".to_string(), "term".to_string());
        ctx.set_header("X-Api-Version", "2");
        ctx.cookies.insert("session".to_string(), "abc".to_string());
        ctx.body = json!({"filter": {"$ne": null, "ages": [18, 65]}, "active": true});

        let flat = ctx.flatten_user_input();
        assert_eq!(flat.get("query.q").map(String::as_str), Some("term"));
        assert_eq!(flat.get("headers.x-api-version").map(String::as_str), Some("2"));
        assert_eq!(flat.get("cookies.session").map(String::as_str), Some("abc"));
        assert_eq!(flat.get("body.filter.$ne").map(String::as_str), Some("$ne"));
        assert_eq!(flat.get("body.filter.ages.0").map(String::as_str), Some("18"));
        assert_eq!(flat.get("body.active").map(String::as_str), Some("true"));
    }
}
