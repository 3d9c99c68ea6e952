//! Palisade — in-process application firewall core.
//!
//! Embeds into a host application and decides, per request and per outbound
//! operation, whether something is an attack and what to do about it:
//!
//! - [`detectors`] — stateless SQL/NoSQL/shell/path-traversal analyzers
//! - [`attack_wave`] — per-IP probe counting that flags scanners early
//! - [`rate_limit`] — sliding-window limits per (IP, endpoint) and (user, endpoint)
//! - [`ip`] — CIDR trie and blocklist for address membership checks
//! - [`agent`] — the shared decision context request threads consult
//! - [`reporting`] — background event dispatch to the control plane
//!
//! The host adapter supplies a [`context::Context`] per request and the
//! extracted operation strings (SQL queries, shell commands, file paths);
//! this crate supplies the verdicts. Detection always fails open: an internal
//! error is never allowed to block legitimate traffic.

pub mod agent;
pub mod attack_wave;
pub mod cache;
pub mod config;
pub mod context;
pub mod detectors;
pub mod events;
pub mod ip;
pub mod rate_limit;
pub mod reporting;
pub mod route;

pub use agent::AgentContext;
pub use attack_wave::AttackWaveDetector;
pub use cache::TtlCache;
pub use config::{AgentConfig, EndpointConfig, FirewallLists, RateLimitingConfig, ReportingResponse};
pub use context::{Context, User};
pub use detectors::{
    detect_path_traversal, is_nosql_injection, is_shell_injection, is_sql_injection, SqlDialect,
};
pub use events::{AttackInfo, AttackKind, Event};
pub use ip::{BlockList, IpRange};
pub use rate_limit::RateLimiter;
pub use reporting::{EventPipeline, ReportError, ReportingClient};
