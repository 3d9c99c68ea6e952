//! Reporting Pipeline
//!
//! One background worker owns an unbounded FIFO of pending events plus a
//! table of recurring schedules (heartbeat). Each pass: promote due
//! schedules into the queue, enforce the outbound sends-per-second cap,
//! then send one event. Transient failures (control-plane rate limit,
//! timeout) requeue the event at the tail and back off briefly; anything
//! else drops the event, a deliberate bound on queue growth under
//! persistent failure. Shutdown is cooperative: the worker observes the
//! cancellation token at every wait point and requeues an in-flight event
//! rather than losing it.

use std::collections::VecDeque;
use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use parking_lot::Mutex;
use rustc_hash::FxHashMap;
use thiserror::Error;
use tokio::time::Instant;
use tokio_util::sync::CancellationToken;

use crate::config::ReportingResponse;
use crate::events::Event;

const MAX_SENDS_PER_SECOND: u32 = 10;
const EMPTY_QUEUE_SLEEP: Duration = Duration::from_millis(100);
const TRANSIENT_BACKOFF: Duration = Duration::from_millis(250);

#[derive(Debug, Error)]
pub enum ReportError {
    #[error("control plane rate limited the agent")]
    RateLimited,
    #[error("reporting call timed out")]
    Timeout,
    #[error("reporting call failed: {0}")]
    Failed(String),
}

impl ReportError {
    /// Transient failures are retried; everything else drops the event.
    pub fn is_transient(&self) -> bool {
        matches!(self, ReportError::RateLimited | ReportError::Timeout)
    }
}

/// The control-plane transport. Implementations own serialization and HTTP;
/// the pipeline only cares about the error taxonomy.
#[async_trait]
pub trait ReportingClient: Send + Sync {
    async fn report(&self, token: &str, event: &Event) -> Result<ReportingResponse, ReportError>;
}

struct Schedule {
    token: String,
    event: Event,
    interval: Duration,
    next_due: Instant,
}

#[derive(Default)]
struct Queues {
    queue: VecDeque<(String, Event)>,
    schedules: FxHashMap<String, Schedule>,
}

pub struct EventPipeline {
    client: Arc<dyn ReportingClient>,
    queues: Arc<Mutex<Queues>>,
    cancel: CancellationToken,
    report_timeout: Duration,
    worker: Mutex<Option<tokio::task::JoinHandle<()>>>,
}

impl EventPipeline {
    pub fn new(client: Arc<dyn ReportingClient>, report_timeout: Duration) -> Self {
        Self {
            client,
            queues: Arc::new(Mutex::new(Queues::default())),
            cancel: CancellationToken::new(),
            report_timeout,
            worker: Mutex::new(None),
        }
    }

    /// Spawns the background worker. Requires a Tokio runtime; calling twice
    /// replaces nothing (the first worker keeps running).
    pub fn start(&self) {
        let mut worker = self.worker.lock();
        if worker.is_some() {
            return;
        }
        let client = Arc::clone(&self.client);
        let queues = Arc::clone(&self.queues);
        let cancel = self.cancel.clone();
        let timeout = self.report_timeout;
        *worker = Some(tokio::spawn(run_worker(client, queues, cancel, timeout)));
    }

    /// Appends an event to the send queue.
    pub fn enqueue(&self, token: impl Into<String>, event: Event) {
        self.queues.lock().queue.push_back((token.into(), event));
    }

    /// Registers a recurring event under `id`, replacing any existing
    /// schedule with that id. First dispatch is one interval from now.
    pub fn schedule(&self, id: impl Into<String>, token: impl Into<String>, event: Event, interval: Duration) {
        self.queues.lock().schedules.insert(
            id.into(),
            Schedule {
                token: token.into(),
                event,
                interval,
                next_due: Instant::now() + interval,
            },
        );
    }

    pub fn cancel_schedule(&self, id: &str) {
        self.queues.lock().schedules.remove(id);
    }

    pub fn pending(&self) -> usize {
        self.queues.lock().queue.len()
    }

    /// Signals the worker to stop and waits up to `grace` for it to exit.
    /// Returns false when the worker did not finish in time.
    pub async fn shutdown(&self, grace: Duration) -> bool {
        self.cancel.cancel();
        let worker = self.worker.lock().take();
        let Some(worker) = worker else {
            return true;
        };
        match tokio::time::timeout(grace, worker).await {
            Ok(_) => true,
            Err(_) => {
                tracing::warn!("reporting worker did not stop within the grace period");
                false
            }
        }
    }
}

async fn run_worker(
    client: Arc<dyn ReportingClient>,
    queues: Arc<Mutex<Queues>>,
    cancel: CancellationToken,
    report_timeout: Duration,
) {
    let mut second_started = Instant::now();
    let mut sends_this_second = 0u32;

    loop {
        if cancel.is_cancelled() {
            return;
        }
        promote_due_schedules(&queues);

        if second_started.elapsed() >= Duration::from_secs(1) {
            second_started = Instant::now();
            sends_this_second = 0;
        }
        if sends_this_second >= MAX_SENDS_PER_SECOND {
            let until_next_second = Duration::from_secs(1).saturating_sub(second_started.elapsed());
            if sleep_or_cancelled(&cancel, until_next_second).await {
                return;
            }
            continue;
        }

        let Some((token, event)) = queues.lock().queue.pop_front() else {
            if sleep_or_cancelled(&cancel, EMPTY_QUEUE_SLEEP).await {
                return;
            }
            continue;
        };
        sends_this_second += 1;

        tokio::select! {
            _ = cancel.cancelled() => {
                // Do not lose the in-flight event on shutdown.
                queues.lock().queue.push_front((token, event));
                return;
            }
            outcome = tokio::time::timeout(report_timeout, client.report(&token, &event)) => {
                let outcome = match outcome {
                    Ok(result) => result,
                    Err(_) => Err(ReportError::Timeout),
                };
                match outcome {
                    Ok(_) => {}
                    Err(err) if err.is_transient() => {
                        tracing::debug!(error = %err, "transient reporting failure, requeueing");
                        queues.lock().queue.push_back((token, event));
                        if sleep_or_cancelled(&cancel, TRANSIENT_BACKOFF).await {
                            return;
                        }
                    }
                    Err(err) => {
                        tracing::warn!(error = %err, "dropping event after reporting failure");
                    }
                }
            }
        }
    }
}

/// Moves every due schedule into the queue and advances its due time by its
/// interval (not from now), so dispatch cadence does not drift.
fn promote_due_schedules(queues: &Mutex<Queues>) {
    let mut queues = queues.lock();
    let now = Instant::now();
    let mut due = Vec::new();
    for schedule in queues.schedules.values_mut() {
        while schedule.next_due <= now {
            due.push((schedule.token.clone(), schedule.event.clone()));
            schedule.next_due += schedule.interval;
        }
    }
    queues.queue.extend(due);
}

async fn sleep_or_cancelled(cancel: &CancellationToken, duration: Duration) -> bool {
    tokio::select! {
        _ = cancel.cancelled() => true,
        _ = tokio::time::sleep(duration) => false,
    }
}
