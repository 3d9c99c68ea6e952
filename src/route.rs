//! Route Matching
//!
//! Endpoint configuration is keyed by `METHOD|route`, where the route may
//! contain `{param}` placeholder segments. Lookups try the exact key first and
//! fall back to a segment-by-segment pattern scan, so `GET /api/users/42`
//! picks up the config for `GET|api/users/{id}`.

use rustc_hash::FxHashMap;

use crate::config::EndpointConfig;

/// Builds the canonical `METHOD|route` key, stripping any leading slash.
pub fn endpoint_key(method: &str, route: &str) -> String {
    format!("{}|{}", method, route.trim_start_matches('/'))
}

/// True when `path` matches `pattern` segment by segment. A `{param}` segment
/// matches any single non-empty path segment.
pub fn matches(pattern: &str, path: &str) -> bool {
    let pattern_segments: Vec<&str> = pattern
        .trim_matches('/')
        .split('/')
        .filter(|s| !s.is_empty())
        .collect();
    let path_segments: Vec<&str> = path
        .trim_matches('/')
        .split('/')
        .filter(|s| !s.is_empty())
        .collect();

    if pattern_segments.len() != path_segments.len() {
        return false;
    }
    pattern_segments
        .iter()
        .zip(&path_segments)
        .all(|(pattern_segment, path_segment)| {
            is_placeholder(pattern_segment) || pattern_segment.eq_ignore_ascii_case(path_segment)
        })
}

fn is_placeholder(segment: &str) -> bool {
    segment.starts_with('{') && segment.ends_with('}')
}

/// Resolves the most specific endpoint config for a request: exact
/// `METHOD|route` match first, then the first pattern whose method matches and
/// whose route pattern matches the request route.
pub fn find_endpoint<'a>(
    endpoints: &'a FxHashMap<String, EndpointConfig>,
    method: &str,
    route: &str,
) -> Option<&'a EndpointConfig> {
    if let Some(endpoint) = endpoints.get(&endpoint_key(method, route)) {
        return Some(endpoint);
    }
    endpoints.values().find(|endpoint| {
        endpoint.method.eq_ignore_ascii_case(method) && matches(&endpoint.route, route)
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    fn endpoint(method: &str, route: &str) -> EndpointConfig {
        EndpointConfig {
            method: method.to_string(),
            route: route.to_string(),
            ..Default::default()
        }
    }

    #[test]
    fn placeholder_segments_match_anything() {
        assert!(matches("api/users/{id}", "/api/users/42"));
        assert!(matches("api/users/{id}", "api/users/jane"));
        assert!(!matches("api/users/{id}", "api/users"));
        assert!(!matches("api/users/{id}", "api/users/42/posts"));
    }

    #[test]
    fn literal_segments_are_case_insensitive() {
        assert!(matches("api/Users", "API/users"));
        assert!(!matches("api/users", "api/orders"));
    }

    #[test]
    fn exact_match_wins_over_pattern() {
        let mut endpoints = FxHashMap::default();
        let exact = endpoint("GET", "api/users/me");
        let pattern = endpoint("GET", "api/users/{id}");
        endpoints.insert(exact.key(), exact);
        endpoints.insert(pattern.key(), pattern);

        let found = find_endpoint(&endpoints, "GET", "/api/users/me").unwrap();
        assert_eq!(found.route, "api/users/me");
        let found = find_endpoint(&endpoints, "GET", "/api/users/42").unwrap();
        assert_eq!(found.route, "api/users/{id}");
        assert!(find_endpoint(&endpoints, "POST", "/api/users/42").is_none());
    }
}
