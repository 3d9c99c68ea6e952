//! Attack-Wave Detection
//!
//! Catches coordinated scanning before any single request qualifies as a
//! confirmed attack. A stateless classifier decides whether a request looks
//! like a scanner probe (bogus method, sensitive filename, SQL fuzzing in the
//! query string); a stateful counter then tracks probes per source IP inside
//! a rolling window. Crossing the threshold fires exactly once per IP per
//! cooldown period, with a capped, deduplicated sample list retained for the
//! resulting event.
//!
//! The read-count-then-write-count sequence runs under one mutex. Probe
//! traffic is rare relative to request volume, so serializing checks across
//! IPs costs nothing measurable.

use parking_lot::Mutex;

use crate::cache::TtlCache;
use crate::config::AttackWaveConfig;
use crate::context::Context;
use crate::detectors::data::{
    PROBE_DIRECTORIES, PROBE_FILE_EXTENSIONS, PROBE_FILE_NAMES, PROBE_METHODS,
    PROBE_SQL_KEYWORDS,
};

#[derive(Clone, Default)]
struct Suspicious {
    count: u32,
    samples: Vec<String>,
}

struct State {
    /// Per-IP probe counts and samples, expiring after the time frame.
    tracked: TtlCache<String, Suspicious>,
    /// IPs an event has already fired for, expiring after the cooldown.
    reported: TtlCache<String, ()>,
}

pub struct AttackWaveDetector {
    threshold: u32,
    max_samples: usize,
    state: Mutex<State>,
}

impl AttackWaveDetector {
    pub fn new(config: &AttackWaveConfig) -> Self {
        Self {
            threshold: config.threshold,
            // Collection stops once the event fires, so samples beyond the
            // threshold would never be stored anyway.
            max_samples: config.max_samples_per_ip.min(config.threshold as usize),
            state: Mutex::new(State {
                tracked: TtlCache::new(config.max_tracked_ips, config.time_frame),
                reported: TtlCache::new(config.max_tracked_ips, config.min_time_between_events),
            }),
        }
    }

    /// Records `ctx` if it is a probe and returns true when this call pushed
    /// its source IP over the threshold. The caller should then emit an
    /// attack-wave event built from [`samples_for_ip`](Self::samples_for_ip).
    pub fn check(&self, ctx: &Context) -> bool {
        let ip = ctx.remote_address.as_str();
        if ip.is_empty() {
            return false;
        }
        if ctx.method.is_empty() || (ctx.route.is_empty() && ctx.url.is_empty()) {
            return false;
        }

        let state = self.state.lock();
        if state.reported.get(&ip.to_string()).is_some() {
            return false;
        }
        if !is_probe_request(ctx) {
            return false;
        }

        let mut entry = state.tracked.get(&ip.to_string()).unwrap_or_default();
        entry.count += 1;
        let sample = format!("{} {}", ctx.method, url_with_sorted_query(ctx));
        if entry.samples.len() < self.max_samples
            && !entry.samples.iter().any(|s| s.eq_ignore_ascii_case(&sample))
        {
            entry.samples.push(sample);
        }
        let fired = entry.count >= self.threshold;
        state.tracked.set(ip.to_string(), entry);
        if fired {
            state.reported.set(ip.to_string(), ());
        }
        fired
    }

    /// The retained probe samples for an IP, empty when it is not tracked.
    pub fn samples_for_ip(&self, ip: &str) -> Vec<String> {
        let state = self.state.lock();
        state
            .tracked
            .get(&ip.to_string())
            .map(|entry| entry.samples)
            .unwrap_or_default()
    }
}

impl Default for AttackWaveDetector {
    fn default() -> Self {
        Self::new(&AttackWaveConfig::default())
    }
}

/// Rebuilds the request URL with its query pairs in key order, so the same
/// probe sent with shuffled parameters dedups to one sample.
fn url_with_sorted_query(ctx: &Context) -> String {
    let path = ctx.url.split(['?', '#']).next().unwrap_or(&ctx.url);
    if ctx.query.is_empty() {
        return path.to_string();
    }
    let mut pairs: Vec<(&String, &String)> = ctx.query.iter().collect();
    pairs.sort();
    let query: Vec<String> = pairs.iter().map(|(k, v)| format!("{k}={v}")).collect();
    format!("{path}?{}", query.join("&"))
}

/// Stateless probe classifier.
pub fn is_probe_request(ctx: &Context) -> bool {
    if !ctx.method.is_empty() && is_probe_method(&ctx.method) {
        return true;
    }
    let path = if ctx.route.is_empty() {
        &ctx.url
    } else {
        &ctx.route
    };
    if !path.is_empty() && is_probe_path(path) {
        return true;
    }
    query_contains_probe_payload(&ctx.query)
}

fn is_probe_method(method: &str) -> bool {
    PROBE_METHODS.iter().any(|m| m.eq_ignore_ascii_case(method))
}

fn is_probe_path(path: &str) -> bool {
    let path = path.split(['?', '#']).next().unwrap_or(path);
    let mut segments: Vec<&str> = path.split('/').filter(|s| !s.is_empty()).collect();

    if let Some(filename) = segments.pop() {
        if PROBE_FILE_NAMES.iter().any(|f| f.eq_ignore_ascii_case(filename)) {
            return true;
        }
        if let Some((_, extension)) = filename.rsplit_once('.') {
            if PROBE_FILE_EXTENSIONS
                .iter()
                .any(|e| e.eq_ignore_ascii_case(extension))
            {
                return true;
            }
        }
    }
    segments.iter().any(|segment| {
        PROBE_DIRECTORIES
            .iter()
            .any(|d| d.eq_ignore_ascii_case(segment))
    })
}

fn query_contains_probe_payload(query: &rustc_hash::FxHashMap<String, String>) -> bool {
    query
        .iter()
        .flat_map(|(key, value)| [key.as_str(), value.as_str()])
        .filter(|s| (5..=1000).contains(&s.len()))
        .any(|s| {
            let upper = s.to_uppercase();
            PROBE_SQL_KEYWORDS.iter().any(|kw| upper.contains(kw))
        })
}
