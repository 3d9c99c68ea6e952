//! Control-Plane Events
//!
//! The payloads the agent reports: a `started` announcement, periodic
//! heartbeats carrying aggregated statistics, and detected attack /
//! attack-wave notifications. The wire shape is camelCase JSON with a
//! snake_case `type` discriminator.

use std::time::{SystemTime, UNIX_EPOCH};

use serde::{Deserialize, Serialize};

use crate::context::User;

/// Milliseconds since the Unix epoch, the timestamp format of every event.
pub fn unix_time_ms() -> u64 {
    SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .unwrap_or_default()
        .as_millis() as u64
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum AttackKind {
    SqlInjection,
    NosqlInjection,
    ShellInjection,
    PathTraversal,
}

/// Identity of the reporting agent process.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AgentInfo {
    pub hostname: String,
    pub version: String,
    pub os_name: String,
    /// True when the agent detects without blocking.
    pub dry_mode: bool,
}

/// The request an attack arrived on.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RequestInfo {
    pub method: String,
    pub url: String,
    pub route: String,
    pub ip_address: String,
    pub user_agent: Option<String>,
}

/// What was detected and where in the request it came from.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AttackInfo {
    pub kind: AttackKind,
    /// Flattened user-input path the payload arrived through, e.g. `query.q`.
    pub source: String,
    pub payload: String,
    /// The operation string the payload was found in (SQL query, shell
    /// command, filesystem path).
    pub operation: String,
    pub blocked: bool,
    pub user: Option<User>,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Stats {
    pub requests: u64,
    pub aborted_requests: u64,
    pub attacks_detected: u64,
    pub attacks_blocked: u64,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RouteStat {
    pub method: String,
    pub path: String,
    pub hits: u64,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct UserStat {
    pub id: String,
    pub name: String,
    pub last_ip_address: String,
    pub first_seen_at: u64,
    pub last_seen_at: u64,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct HostnameStat {
    pub hostname: String,
    pub hits: u64,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum Event {
    #[serde(rename_all = "camelCase")]
    Started {
        agent: AgentInfo,
        time: u64,
    },
    #[serde(rename_all = "camelCase")]
    Heartbeat {
        agent: AgentInfo,
        time: u64,
        stats: Stats,
        routes: Vec<RouteStat>,
        users: Vec<UserStat>,
        hostnames: Vec<HostnameStat>,
    },
    #[serde(rename_all = "camelCase")]
    DetectedAttack {
        agent: AgentInfo,
        time: u64,
        attack: AttackInfo,
        request: RequestInfo,
    },
    #[serde(rename_all = "camelCase")]
    DetectedAttackWave {
        agent: AgentInfo,
        time: u64,
        ip_address: String,
        user_agent: Option<String>,
        /// `METHOD url` strings collected by the attack-wave detector.
        samples: Vec<String>,
    },
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn events_carry_a_snake_case_type_tag() {
        let event = Event::Started {
            agent: AgentInfo::default(),
            time: 1,
        };
        let json = serde_json::to_value(&event).unwrap();
        assert_eq!(json["type"], "started");

        let event = Event::DetectedAttackWave {
            agent: AgentInfo::default(),
            time: 2,
            ip_address: "1.2.3.4".to_string(),
            user_agent: None,
            samples: vec!["GET /.env".to_string()],
        };
        let json = serde_json::to_value(&event).unwrap();
        assert_eq!(json["type"], "detected_attack_wave");
        assert_eq!(json["ipAddress"], "1.2.3.4");
    }

    #[test]
    fn attack_kinds_serialize_snake_case() {
        assert_eq!(
            serde_json::to_value(AttackKind::SqlInjection).unwrap(),
            "sql_injection"
        );
        assert_eq!(
            serde_json::to_value(AttackKind::PathTraversal).unwrap(),
            "path_traversal"
        );
    }

    #[test]
    fn unix_time_is_monotonic_enough() {
        let a = unix_time_ms();
        let b = unix_time_ms();
        assert!(b >= a);
        assert!(a > 1_600_000_000_000); // after Sep 2020, sanity only
    }
}
