//! Agent Decision Context
//!
//! The process-wide aggregation point the per-request checks read from:
//! blocklists and allow-lists, endpoint configuration, the rate limiter and
//! attack-wave detector, plus the counters and per-route/user statistics
//! that feed heartbeat events. Request threads hit it concurrently, so every
//! mutable member is either atomic or behind its own lock, and control-plane
//! updates swap in fully-built replacement structures so readers never see a
//! half-applied config.

use std::net::IpAddr;
use std::sync::atomic::{AtomicBool, AtomicI64, AtomicU64, Ordering};
use std::sync::Arc;

use parking_lot::RwLock;
use regex::Regex;
use rustc_hash::{FxHashMap, FxHashSet};

use crate::attack_wave::AttackWaveDetector;
use crate::config::{
    AgentConfig, EndpointConfig, FirewallLists, RateLimitingConfig, ReportingResponse,
};
use crate::context::{Context, User};
use crate::events::{
    unix_time_ms, AgentInfo, AttackInfo, Event, HostnameStat, RequestInfo, RouteStat, Stats,
    UserStat,
};
use crate::ip::blocklist::is_private_address;
use crate::ip::{BlockList, IpRange};
use crate::rate_limit::RateLimiter;
use crate::route;

pub struct AgentContext {
    info: AgentInfo,
    block_mode: AtomicBool,
    /// IPs that skip every block and rate-limit decision (health checks,
    /// office ranges).
    bypassed_ips: IpRange,
    blocklist: BlockList,
    /// Global allow-list. When non-empty, public traffic must come from one
    /// of these ranges.
    allowed_ips: IpRange,
    blocked_users: RwLock<FxHashSet<String>>,
    endpoints: RwLock<Arc<FxHashMap<String, EndpointConfig>>>,
    blocked_user_agents: RwLock<Option<Regex>>,
    config_updated_at: AtomicI64,

    requests: AtomicU64,
    aborted_requests: AtomicU64,
    attacks_detected: AtomicU64,
    attacks_blocked: AtomicU64,
    routes: RwLock<FxHashMap<String, RouteStat>>,
    users: RwLock<FxHashMap<String, UserStat>>,
    hostnames: RwLock<FxHashMap<String, u64>>,

    pub rate_limiter: RateLimiter,
    pub attack_waves: AttackWaveDetector,
}

impl AgentContext {
    pub fn new(config: &AgentConfig) -> Self {
        let bypassed_ips = IpRange::new();
        for entry in &config.bypassed_ips {
            bypassed_ips.insert_range(entry);
        }
        Self {
            info: AgentInfo {
                hostname: std::env::var("HOSTNAME").unwrap_or_default(),
                version: env!("CARGO_PKG_VERSION").to_string(),
                os_name: std::env::consts::OS.to_string(),
                dry_mode: !config.block_mode,
            },
            block_mode: AtomicBool::new(config.block_mode),
            bypassed_ips,
            blocklist: BlockList::new(),
            allowed_ips: IpRange::new(),
            blocked_users: RwLock::new(FxHashSet::default()),
            endpoints: RwLock::new(Arc::new(FxHashMap::default())),
            blocked_user_agents: RwLock::new(None),
            config_updated_at: AtomicI64::new(0),
            requests: AtomicU64::new(0),
            aborted_requests: AtomicU64::new(0),
            attacks_detected: AtomicU64::new(0),
            attacks_blocked: AtomicU64::new(0),
            routes: RwLock::new(FxHashMap::default()),
            users: RwLock::new(FxHashMap::default()),
            hostnames: RwLock::new(FxHashMap::default()),
            rate_limiter: RateLimiter::new(),
            attack_waves: AttackWaveDetector::new(&config.attack_wave),
        }
    }

    /// Whether detected attacks are blocked (true) or only reported.
    pub fn block_mode(&self) -> bool {
        self.block_mode.load(Ordering::Relaxed)
    }

    pub fn is_bypassed(&self, ip: &str) -> bool {
        self.bypassed_ips.is_ip_in_range(ip)
    }

    /// The block decision for a request, with a reason when blocked.
    /// Bypassed IPs are never blocked; after that the blocked-user set, the
    /// user-agent blocklist, and the IP block/allow lists apply in order.
    pub fn is_blocked(&self, ctx: &Context) -> Option<String> {
        let ip = ctx.remote_address.as_str();
        if self.is_bypassed(ip) {
            return None;
        }
        if let Some(user) = &ctx.user {
            if self.blocked_users.read().contains(&user.id) {
                return Some(format!("user {} is blocked", user.id));
            }
        }
        if let Some(agent) = ctx.user_agent() {
            let blocked = self
                .blocked_user_agents
                .read()
                .as_ref()
                .is_some_and(|re| re.is_match(agent));
            if blocked {
                return Some("user agent is blocked".to_string());
            }
        }
        if let Some(reason) = self.blocklist.check(ip, &ctx.endpoint_key()) {
            return Some(reason);
        }
        if self.allowed_ips.has_items() && !self.is_exempt_from_allow_list(ip) {
            return Some(format!("IP {ip} is not in the allowlist"));
        }
        None
    }

    fn is_exempt_from_allow_list(&self, ip: &str) -> bool {
        match ip.parse::<IpAddr>() {
            Ok(addr) => is_private_address(&addr) || self.allowed_ips.is_ip_in_range(ip),
            // Unparseable addresses fail open here; the host adapter decides
            // what to do with requests that have no usable remote address.
            Err(_) => true,
        }
    }

    /// Rate-limit decision for a request. Bypassed IPs always pass.
    pub fn check_rate_limit(&self, ctx: &mut Context) -> (bool, Option<RateLimitingConfig>) {
        if self.is_bypassed(&ctx.remote_address) {
            return (true, None);
        }
        let endpoints = Arc::clone(&self.endpoints.read());
        self.rate_limiter.check(ctx, &endpoints)
    }

    pub fn add_request(&self) {
        self.requests.fetch_add(1, Ordering::Relaxed);
    }

    pub fn add_aborted_request(&self) {
        self.aborted_requests.fetch_add(1, Ordering::Relaxed);
    }

    pub fn record_attack(&self, blocked: bool) {
        self.attacks_detected.fetch_add(1, Ordering::Relaxed);
        if blocked {
            self.attacks_blocked.fetch_add(1, Ordering::Relaxed);
        }
    }

    /// Counts a hit for the request's route.
    pub fn add_route(&self, ctx: &Context) {
        let path = if ctx.route.is_empty() {
            ctx.url.split(['?', '#']).next().unwrap_or(ctx.url.as_str())
        } else {
            ctx.route.as_str()
        };
        let key = route::endpoint_key(&ctx.method, path);
        let mut routes = self.routes.write();
        routes
            .entry(key)
            .or_insert_with(|| RouteStat {
                method: ctx.method.clone(),
                path: path.to_string(),
                hits: 0,
            })
            .hits += 1;
    }

    /// Records a sighting of `user` from `ip`.
    pub fn add_user(&self, user: &User, ip: &str) {
        let now = unix_time_ms();
        let mut users = self.users.write();
        let stat = users.entry(user.id.clone()).or_insert_with(|| UserStat {
            id: user.id.clone(),
            name: user.name.clone(),
            last_ip_address: ip.to_string(),
            first_seen_at: now,
            last_seen_at: now,
        });
        stat.name = user.name.clone();
        stat.last_ip_address = ip.to_string();
        stat.last_seen_at = now;
    }

    /// Counts an outbound connection to `hostname`.
    pub fn add_hostname(&self, hostname: &str) {
        *self.hostnames.write().entry(hostname.to_string()).or_insert(0) += 1;
    }

    /// Applies a fresh control-plane configuration. Each structure is
    /// replaced wholesale; a reader sees either the old or the new endpoint
    /// map, never a mix.
    pub fn update_config(&self, response: &ReportingResponse) {
        self.block_mode.store(response.block, Ordering::Relaxed);
        *self.blocked_users.write() = response
            .blocked_user_ids
            .iter()
            .cloned()
            .collect::<FxHashSet<String>>();

        let endpoints: FxHashMap<String, EndpointConfig> = response
            .endpoints
            .iter()
            .map(|endpoint| (endpoint.key(), endpoint.clone()))
            .collect();
        *self.endpoints.write() = Arc::new(endpoints);
        self.blocklist.update_allowed_for_endpoints(&response.endpoints);

        *self.blocked_user_agents.write() = compile_user_agent_regex(&response.blocked_user_agents);
        self.config_updated_at
            .store(response.config_updated_at, Ordering::Relaxed);
    }

    /// Applies fresh firewall lists: blocked ranges, the global allow-list,
    /// and the user-agent blocklist they carry.
    pub fn update_firewall_lists(&self, lists: &FirewallLists) {
        self.blocklist.update_blocked_ips(lists.blocked_ips());
        self.allowed_ips.clear();
        for entry in lists.allowed_ips() {
            self.allowed_ips.insert_range(entry);
        }
        if !lists.blocked_user_agents.is_empty() {
            *self.blocked_user_agents.write() =
                compile_user_agent_regex(&lists.blocked_user_agents);
        }
    }

    pub fn config_updated_at(&self) -> i64 {
        self.config_updated_at.load(Ordering::Relaxed)
    }

    pub fn started_event(&self) -> Event {
        Event::Started {
            agent: self.info.clone(),
            time: unix_time_ms(),
        }
    }

    /// Builds the heartbeat event and resets the counters and statistics it
    /// drains, so each heartbeat reports one interval's worth of data.
    pub fn heartbeat_event(&self) -> Event {
        let stats = Stats {
            requests: self.requests.swap(0, Ordering::Relaxed),
            aborted_requests: self.aborted_requests.swap(0, Ordering::Relaxed),
            attacks_detected: self.attacks_detected.swap(0, Ordering::Relaxed),
            attacks_blocked: self.attacks_blocked.swap(0, Ordering::Relaxed),
        };
        let routes = std::mem::take(&mut *self.routes.write())
            .into_values()
            .collect();
        let users = std::mem::take(&mut *self.users.write())
            .into_values()
            .collect();
        let hostnames = std::mem::take(&mut *self.hostnames.write())
            .into_iter()
            .map(|(hostname, hits)| HostnameStat { hostname, hits })
            .collect();
        Event::Heartbeat {
            agent: self.info.clone(),
            time: unix_time_ms(),
            stats,
            routes,
            users,
            hostnames,
        }
    }

    /// Builds a detected-attack event for `ctx`, counting it in the stats.
    pub fn attack_event(&self, ctx: &Context, mut attack: AttackInfo) -> Event {
        attack.blocked = attack.blocked && self.block_mode();
        attack.user = ctx.user.clone();
        self.record_attack(attack.blocked);
        Event::DetectedAttack {
            agent: self.info.clone(),
            time: unix_time_ms(),
            attack,
            request: RequestInfo {
                method: ctx.method.clone(),
                url: ctx.url.clone(),
                route: ctx.route.clone(),
                ip_address: ctx.remote_address.clone(),
                user_agent: ctx.user_agent().map(str::to_string),
            },
        }
    }

    /// Builds an attack-wave event from the samples collected for the
    /// request's source IP.
    pub fn attack_wave_event(&self, ctx: &Context) -> Event {
        Event::DetectedAttackWave {
            agent: self.info.clone(),
            time: unix_time_ms(),
            ip_address: ctx.remote_address.clone(),
            user_agent: ctx.user_agent().map(str::to_string),
            samples: self.attack_waves.samples_for_ip(&ctx.remote_address),
        }
    }
}

/// An empty pattern means "no user agents blocked". A pattern that fails to
/// compile is logged and ignored rather than blocking anyone.
fn compile_user_agent_regex(pattern: &str) -> Option<Regex> {
    if pattern.is_empty() {
        return None;
    }
    match Regex::new(&format!("(?i){pattern}")) {
        Ok(re) => Some(re),
        Err(err) => {
            tracing::warn!(error = %err, "invalid blocked-user-agent pattern, ignoring");
            None
        }
    }
}
