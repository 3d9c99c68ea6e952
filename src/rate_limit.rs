//! Rate Limiting
//!
//! Sliding-window request counting per (IP, endpoint) and (user, endpoint).
//! Each key holds the timestamps of its requests inside the current window in
//! a TTL cache, so abandoned keys age out on their own. Resolution failures
//! (no endpoint config, rate limiting disabled, protection forced off) always
//! allow: a configuration gap must never turn into a denial of service.

use std::time::{Duration, Instant};

use rustc_hash::FxHashMap;

use crate::cache::TtlCache;
use crate::config::{EndpointConfig, RateLimitingConfig};
use crate::context::Context;
use crate::route;

/// Upper bound on concurrently tracked counter keys.
const MAX_TRACKED_KEYS: usize = 10_000;
/// Idle keys are dropped after this long regardless of window size.
const KEY_TTL: Duration = Duration::from_secs(120 * 60);

pub struct RateLimiter {
    windows: TtlCache<String, Vec<u64>>,
    epoch: Instant,
}

impl Default for RateLimiter {
    fn default() -> Self {
        Self::new()
    }
}

impl RateLimiter {
    pub fn new() -> Self {
        Self {
            windows: TtlCache::new(MAX_TRACKED_KEYS, KEY_TTL),
            epoch: Instant::now(),
        }
    }

    /// Resolves the endpoint config for `ctx` and applies the IP-scoped and
    /// (when a user is attached) user-scoped window checks. Denies when
    /// either scope denies. The effective config is returned so callers can
    /// derive a `Retry-After` hint from the window size.
    ///
    /// Each scope is counted at most once per request; repeat checks for the
    /// same `Context` reuse the consumed slot instead of double-counting.
    pub fn check(
        &self,
        ctx: &mut Context,
        endpoints: &FxHashMap<String, EndpointConfig>,
    ) -> (bool, Option<RateLimitingConfig>) {
        let route = if ctx.route.is_empty() {
            ctx.url.split(['?', '#']).next().unwrap_or(ctx.url.as_str())
        } else {
            ctx.route.as_str()
        };
        let Some(endpoint) = route::find_endpoint(endpoints, &ctx.method, route) else {
            return (true, None);
        };
        if endpoint.force_protection_off || !endpoint.rate_limiting.enabled {
            return (true, None);
        }
        let config = endpoint.rate_limiting.clone();
        let scope = endpoint.key();

        let mut allowed = true;
        if !ctx.remote_address.is_empty() && !ctx.consumed_rate_limit_for_ip {
            ctx.consumed_rate_limit_for_ip = true;
            let key = format!("{scope}:ip:{}", ctx.remote_address);
            if !self.allow(&key, &config) {
                allowed = false;
            }
        }
        if let Some(user) = &ctx.user {
            if !ctx.consumed_rate_limit_for_user {
                ctx.consumed_rate_limit_for_user = true;
                let key = format!("{scope}:user:{}", user.id);
                if !self.allow(&key, &config) {
                    allowed = false;
                }
            }
        }
        (allowed, Some(config))
    }

    /// One sliding-window hit for `key`. Timestamps older than the window are
    /// discarded, the attempt is recorded, and the request is denied when the
    /// window now holds more than the budget. Denied attempts count too, so a
    /// client that keeps hammering stays denied until it actually backs off.
    pub fn allow(&self, key: &str, config: &RateLimitingConfig) -> bool {
        let now = self.now_ms();

        let mut stamps = self.windows.get(&key.to_string()).unwrap_or_default();
        stamps.retain(|&t| now.saturating_sub(t) < config.window_size_in_ms);
        stamps.push(now);
        let allowed = stamps.len() <= config.max_requests as usize;
        self.windows.set(key.to_string(), stamps);
        allowed
    }

    fn now_ms(&self) -> u64 {
        self.epoch.elapsed().as_millis() as u64
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::thread;

    fn config(max: u32, window_ms: u64) -> RateLimitingConfig {
        RateLimitingConfig {
            enabled: true,
            max_requests: max,
            window_size_in_ms: window_ms,
        }
    }

    fn endpoint(method: &str, route: &str, rate: RateLimitingConfig) -> EndpointConfig {
        EndpointConfig {
            method: method.to_string(),
            route: route.to_string(),
            rate_limiting: rate,
            ..Default::default()
        }
    }

    fn endpoints(list: Vec<EndpointConfig>) -> FxHashMap<String, EndpointConfig> {
        list.into_iter().map(|e| (e.key(), e)).collect()
    }

    fn request(ip: &str) -> Context {
        let mut ctx = Context::new("GET", "/api/items");
        ctx.remote_address = ip.to_string();
        ctx
    }

    #[test]
    fn window_fills_then_recovers() {
        let limiter = RateLimiter::new();
        let cfg = config(3, 80);
        for _ in 0..3 {
            assert!(limiter.allow("GET|api/items:ip:1.1.1.1", &cfg));
        }
        assert!(!limiter.allow("GET|api/items:ip:1.1.1.1", &cfg));
        thread::sleep(Duration::from_millis(120));
        assert!(limiter.allow("GET|api/items:ip:1.1.1.1", &cfg));
    }

    #[test]
    fn denied_attempts_keep_the_window_full() {
        let limiter = RateLimiter::new();
        let cfg = config(1, 200);
        assert!(limiter.allow("GET|api/items:ip:1.1.1.1", &cfg));
        thread::sleep(Duration::from_millis(150));
        assert!(!limiter.allow("GET|api/items:ip:1.1.1.1", &cfg));
        thread::sleep(Duration::from_millis(100));
        // The first stamp has aged out, but the denied attempt has not.
        assert!(!limiter.allow("GET|api/items:ip:1.1.1.1", &cfg));
    }

    #[test]
    fn zero_budget_endpoint_denies() {
        let limiter = RateLimiter::new();
        let map = endpoints(vec![endpoint("GET", "api/items", config(0, 60_000))]);
        let (allowed, cfg) = limiter.check(&mut request("1.1.1.1"), &map);
        assert!(!allowed);
        assert_eq!(cfg.unwrap().max_requests, 0);
    }

    #[test]
    fn keys_are_independent() {
        let limiter = RateLimiter::new();
        let cfg = config(1, 60_000);
        assert!(limiter.allow("GET|a:ip:1.1.1.1", &cfg));
        assert!(!limiter.allow("GET|a:ip:1.1.1.1", &cfg));
        assert!(limiter.allow("GET|a:ip:2.2.2.2", &cfg));
        assert!(limiter.allow("GET|b:ip:1.1.1.1", &cfg));
    }

    #[test]
    fn check_resolves_endpoint_and_returns_config() {
        let limiter = RateLimiter::new();
        let map = endpoints(vec![endpoint("GET", "api/items", config(2, 60_000))]);

        let (allowed, cfg) = limiter.check(&mut request("1.1.1.1"), &map);
        assert!(allowed);
        assert_eq!(cfg.unwrap().max_requests, 2);
        let (allowed, _) = limiter.check(&mut request("1.1.1.1"), &map);
        assert!(allowed);
        let (allowed, cfg) = limiter.check(&mut request("1.1.1.1"), &map);
        assert!(!allowed);
        assert_eq!(cfg.unwrap().window_size_in_ms, 60_000);
    }

    #[test]
    fn unconfigured_or_disabled_endpoints_allow() {
        let limiter = RateLimiter::new();
        // No endpoint at all.
        let (allowed, cfg) = limiter.check(&mut request("1.1.1.1"), &FxHashMap::default());
        assert!(allowed);
        assert!(cfg.is_none());
        // Disabled rate limiting.
        let mut rate = config(1, 1000);
        rate.enabled = false;
        let map = endpoints(vec![endpoint("GET", "api/items", rate)]);
        let (allowed, cfg) = limiter.check(&mut request("1.1.1.1"), &map);
        assert!(allowed);
        assert!(cfg.is_none());
        // Protection forced off.
        let mut ep = endpoint("GET", "api/items", config(1, 1000));
        ep.force_protection_off = true;
        let (allowed, cfg) = limiter.check(&mut request("1.1.1.1"), &endpoints(vec![ep]));
        assert!(allowed);
        assert!(cfg.is_none());
    }

    #[test]
    fn user_scope_denies_across_ips() {
        use crate::context::User;
        let limiter = RateLimiter::new();
        let map = endpoints(vec![endpoint("GET", "api/items", config(1, 60_000))]);

        let mut first = request("1.1.1.1");
        first.user = Some(User {
            id: "u1".to_string(),
            name: "Jane".to_string(),
        });
        assert!(limiter.check(&mut first, &map).0);

        // Same user from a fresh IP: the user window is already full.
        let mut second = request("2.2.2.2");
        second.user = Some(User {
            id: "u1".to_string(),
            name: "Jane".to_string(),
        });
        assert!(!limiter.check(&mut second, &map).0);
    }

    #[test]
    fn repeat_check_in_same_request_is_not_double_counted() {
        let limiter = RateLimiter::new();
        let map = endpoints(vec![endpoint("GET", "api/items", config(2, 60_000))]);
        let mut ctx = request("1.1.1.1");
        assert!(limiter.check(&mut ctx, &map).0);
        // Second check on the same context consumes nothing further.
        assert!(limiter.check(&mut ctx, &map).0);
        // A genuinely new request still counts.
        assert!(limiter.check(&mut request("1.1.1.1"), &map).0);
        assert!(!limiter.check(&mut request("1.1.1.1"), &map).0);
    }

    #[test]
    fn pattern_routes_share_one_window_per_config() {
        let limiter = RateLimiter::new();
        let map = endpoints(vec![endpoint("GET", "api/users/{id}", config(2, 60_000))]);
        let mut ctx = Context::new("GET", "/api/users/1");
        ctx.remote_address = "1.1.1.1".to_string();
        assert!(limiter.check(&mut ctx, &map).0);
        let mut ctx = Context::new("GET", "/api/users/2");
        ctx.remote_address = "1.1.1.1".to_string();
        assert!(limiter.check(&mut ctx, &map).0);
        let mut ctx = Context::new("GET", "/api/users/3");
        ctx.remote_address = "1.1.1.1".to_string();
        assert!(!limiter.check(&mut ctx, &map).0);
    }
}
