//! IP Blocklist
//!
//! Wraps an exact-address hash set around the range trie. The set doubles as
//! a promotion cache: when an address is found to match a blocked subnet, it
//! is added to the set so repeat lookups for that exact address skip the trie
//! walk. Per-endpoint allow-lists restrict public traffic to configured
//! ranges; private and loopback addresses always pass them.

use std::net::IpAddr;

use parking_lot::RwLock;
use rustc_hash::{FxHashMap, FxHashSet};

use super::trie::IpRange;
use crate::config::EndpointConfig;

/// Blocked addresses and ranges, plus per-endpoint allowed ranges.
#[derive(Default)]
pub struct BlockList {
    /// Exact blocked addresses, including subnet hits promoted on lookup.
    blocked_addresses: RwLock<FxHashSet<String>>,
    blocked_ranges: IpRange,
    /// `METHOD|route` -> allowed ranges for that endpoint.
    allowed_per_endpoint: RwLock<FxHashMap<String, IpRange>>,
}

impl BlockList {
    pub fn new() -> Self {
        Self::default()
    }

    /// Replaces the blocked set with a fresh batch of addresses and CIDR
    /// ranges from the control plane.
    pub fn update_blocked_ips<I, S>(&self, entries: I)
    where
        I: IntoIterator<Item = S>,
        S: AsRef<str>,
    {
        let mut addresses = FxHashSet::default();
        self.blocked_ranges.clear();
        for entry in entries {
            let entry = entry.as_ref().trim();
            if entry.is_empty() {
                continue;
            }
            if entry.contains('/') {
                self.blocked_ranges.insert_range(entry);
            } else {
                addresses.insert(entry.to_string());
            }
        }
        *self.blocked_addresses.write() = addresses;
    }

    /// Adds a single address to the blocked set.
    pub fn add_blocked_address(&self, ip: &str) {
        self.blocked_addresses.write().insert(ip.to_string());
    }

    /// Rebuilds the per-endpoint allowed ranges from endpoint configuration.
    pub fn update_allowed_for_endpoints(&self, endpoints: &[EndpointConfig]) {
        let mut allowed = FxHashMap::default();
        for endpoint in endpoints {
            if endpoint.allowed_ip_addresses.is_empty() {
                continue;
            }
            let ranges = IpRange::new();
            for entry in &endpoint.allowed_ip_addresses {
                ranges.insert_range(entry);
            }
            allowed.insert(endpoint.key(), ranges);
        }
        *self.allowed_per_endpoint.write() = allowed;
    }

    /// Checks the exact set first, then the range trie. A trie hit promotes
    /// the address into the exact set so the next lookup is a hash hit.
    pub fn is_ip_blocked(&self, ip: &str) -> bool {
        if self.blocked_addresses.read().contains(ip) {
            return true;
        }
        if self.blocked_ranges.is_ip_in_range(ip) {
            self.add_blocked_address(ip);
            return true;
        }
        false
    }

    /// True when `ip` may access `endpoint` (`METHOD|route`). Endpoints
    /// without an allow-list accept everyone; private addresses are always
    /// allowed; unparseable addresses are not rejected here (fail open).
    pub fn is_ip_allowed(&self, ip: &str, endpoint: &str) -> bool {
        let allowed = self.allowed_per_endpoint.read();
        let Some(ranges) = allowed.get(endpoint) else {
            return true;
        };
        let Ok(addr) = ip.parse::<IpAddr>() else {
            return true;
        };
        if is_private_address(&addr) {
            return true;
        }
        !ranges.has_items() || ranges.is_ip_in_range(ip)
    }

    /// Combined decision for a request: blocked outright, or not on the
    /// endpoint's allow-list. Returns the reason for a block, `None` to allow.
    pub fn check(&self, ip: &str, endpoint: &str) -> Option<String> {
        if self.is_ip_blocked(ip) {
            return Some(format!("IP {ip} is blocked"));
        }
        if !self.is_ip_allowed(ip, endpoint) {
            return Some(format!("IP {ip} is not allowed to access this endpoint"));
        }
        None
    }
}

/// Private, loopback, and link-local addresses bypass allow-list checks:
/// allow-lists constrain public traffic only.
pub(crate) fn is_private_address(addr: &IpAddr) -> bool {
    match addr {
        IpAddr::V4(v4) => {
            v4.is_private() || v4.is_loopback() || v4.is_link_local() || v4.is_unspecified()
        }
        IpAddr::V6(v6) => {
            v6.is_loopback()
                || v6.is_unspecified()
                // fc00::/7 unique local
                || (v6.segments()[0] & 0xfe00) == 0xfc00
                // fe80::/10 link local
                || (v6.segments()[0] & 0xffc0) == 0xfe80
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::RateLimitingConfig;

    fn endpoint(method: &str, route: &str, allowed: &[&str]) -> EndpointConfig {
        EndpointConfig {
            method: method.to_string(),
            route: route.to_string(),
            force_protection_off: false,
            allowed_ip_addresses: allowed.iter().map(|s| s.to_string()).collect(),
            rate_limiting: RateLimitingConfig::default(),
        }
    }

    #[test]
    fn exact_address_blocking() {
        let list = BlockList::new();
        list.update_blocked_ips(["1.2.3.4"]);
        assert!(list.is_ip_blocked("1.2.3.4"));
        assert!(!list.is_ip_blocked("1.2.3.5"));
    }

    #[test]
    fn subnet_hit_promotes_to_exact_set() {
        let list = BlockList::new();
        list.update_blocked_ips(["10.0.0.0/24"]);

        assert!(list.is_ip_blocked("10.0.0.77"));
        // Promoted: now an exact-set member, result must be identical.
        assert!(list.blocked_addresses.read().contains("10.0.0.77"));
        assert!(list.is_ip_blocked("10.0.0.77"));
    }

    #[test]
    fn update_replaces_previous_entries() {
        let list = BlockList::new();
        list.update_blocked_ips(["1.2.3.4", "10.0.0.0/24"]);
        assert!(list.is_ip_blocked("1.2.3.4"));
        list.update_blocked_ips(["5.6.7.8"]);
        assert!(!list.is_ip_blocked("1.2.3.4"));
        assert!(!list.is_ip_blocked("10.0.0.9"));
        assert!(list.is_ip_blocked("5.6.7.8"));
    }

    #[test]
    fn endpoint_allow_list() {
        let list = BlockList::new();
        list.update_allowed_for_endpoints(&[endpoint("GET", "api/admin", &["203.0.113.0/24"])]);

        assert!(list.is_ip_allowed("203.0.113.10", "GET|api/admin"));
        assert!(!list.is_ip_allowed("198.51.100.1", "GET|api/admin"));
        // No allow-list configured for this endpoint.
        assert!(list.is_ip_allowed("198.51.100.1", "GET|api/public"));
        // Private addresses always pass.
        assert!(list.is_ip_allowed("192.168.1.5", "GET|api/admin"));
        assert!(list.is_ip_allowed("127.0.0.1", "GET|api/admin"));
    }

    #[test]
    fn check_reports_reason() {
        let list = BlockList::new();
        list.update_blocked_ips(["1.2.3.4"]);
        list.update_allowed_for_endpoints(&[endpoint("GET", "api/admin", &["203.0.113.0/24"])]);

        assert!(list.check("1.2.3.4", "GET|api/admin").is_some());
        assert!(list.check("198.51.100.1", "GET|api/admin").is_some());
        assert!(list.check("203.0.113.10", "GET|api/admin").is_none());
    }
}
