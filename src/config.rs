//! Agent Configuration Types
//!
//! Local tunables plus the shapes delivered by the control plane: endpoint
//! protection settings, rate-limit parameters, and firewall lists. Control
//! plane payloads deserialize leniently (`#[serde(default)]` throughout) so a
//! sparse or partially-unknown response never fails the polling path.

use std::time::Duration;

use serde::{Deserialize, Serialize};

/// Rate limiting parameters for one endpoint.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct RateLimitingConfig {
    pub enabled: bool,
    pub max_requests: u32,
    #[serde(rename = "windowSizeInMS")]
    pub window_size_in_ms: u64,
}

/// Per-route protection settings delivered by the control plane.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct EndpointConfig {
    pub method: String,
    /// Route pattern, e.g. `api/users/{id}`.
    pub route: String,
    pub force_protection_off: bool,
    pub allowed_ip_addresses: Vec<String>,
    pub rate_limiting: RateLimitingConfig,
}

impl EndpointConfig {
    /// Canonical `METHOD|route` key. The leading slash is stripped so
    /// `api/users` and `/api/users` collapse to the same endpoint.
    pub fn key(&self) -> String {
        format!("{}|{}", self.method, self.route.trim_start_matches('/'))
    }
}

/// Response to a reporting call (started event, heartbeat, config poll).
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct ReportingResponse {
    pub success: bool,
    pub error: Option<String>,
    /// Whether detected attacks should be blocked (vs. reported only).
    pub block: bool,
    pub blocked_user_ids: Vec<String>,
    pub endpoints: Vec<EndpointConfig>,
    /// Regex source for blocked user agents, e.g. `badbot|scraper`.
    pub blocked_user_agents: String,
    pub heartbeat_interval_in_ms: Option<u64>,
    pub config_updated_at: i64,
}

/// A named list of IPs/ranges with provenance metadata.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct IpList {
    pub key: String,
    pub source: String,
    pub description: String,
    pub ips: Vec<String>,
}

/// Firewall list payload from the control plane.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct FirewallLists {
    pub success: bool,
    #[serde(rename = "blockedIPAddresses")]
    pub blocked_ip_addresses: Vec<IpList>,
    #[serde(rename = "allowedIPAddresses")]
    pub allowed_ip_addresses: Vec<IpList>,
    pub blocked_user_agents: String,
}

impl FirewallLists {
    pub fn blocked_ips(&self) -> impl Iterator<Item = &str> {
        self.blocked_ip_addresses
            .iter()
            .flat_map(|list| list.ips.iter().map(String::as_str))
    }

    pub fn allowed_ips(&self) -> impl Iterator<Item = &str> {
        self.allowed_ip_addresses
            .iter()
            .flat_map(|list| list.ips.iter().map(String::as_str))
    }
}

/// Attack-wave detector tunables.
#[derive(Debug, Clone)]
pub struct AttackWaveConfig {
    /// Probe count per IP that triggers an attack-wave event.
    pub threshold: u32,
    /// Window within which probes accumulate.
    pub time_frame: Duration,
    /// Cooldown between events for the same IP.
    pub min_time_between_events: Duration,
    /// Capacity of the per-IP tracking caches.
    pub max_tracked_ips: usize,
    /// Upper bound on stored request samples per IP; effectively capped at
    /// `threshold` since collection stops once an event fires.
    pub max_samples_per_ip: usize,
}

impl Default for AttackWaveConfig {
    fn default() -> Self {
        Self {
            threshold: 15,
            time_frame: Duration::from_secs(60),
            min_time_between_events: Duration::from_secs(20 * 60),
            max_tracked_ips: 10_000,
            max_samples_per_ip: 15,
        }
    }
}

/// Local agent configuration, fixed at startup.
#[derive(Debug, Clone)]
pub struct AgentConfig {
    /// Control-plane authentication token.
    pub token: String,
    /// Block detected attacks (true) or report only (false). Overridden by
    /// subsequent config updates from the control plane.
    pub block_mode: bool,
    /// IPs and ranges that bypass every block and rate-limit decision.
    pub bypassed_ips: Vec<String>,
    /// Interval for the recurring heartbeat event, until the control plane
    /// supplies its own.
    pub heartbeat_interval: Duration,
    /// Timeout for a single reporting call.
    pub report_timeout: Duration,
    pub attack_wave: AttackWaveConfig,
}

impl Default for AgentConfig {
    fn default() -> Self {
        Self {
            token: String::new(),
            block_mode: true,
            bypassed_ips: Vec::new(),
            heartbeat_interval: Duration::from_secs(10 * 60),
            report_timeout: Duration::from_secs(5),
            attack_wave: AttackWaveConfig::default(),
        }
    }
}
