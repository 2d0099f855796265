use std::sync::Arc;
use std::time::Duration;

use chrono::{DateTime, Utc};
use promdash_core::model::MetricsPayload;
use serde::Serialize;
use tokio::sync::watch;
use tokio::task::JoinHandle;
use tokio::time::MissedTickBehavior;
use tracing::{debug, warn};

use crate::fetch::MetricsSource;

const MIN_POLL_INTERVAL: Duration = Duration::from_millis(1);

/// Result of the latest poll. A failed poll keeps the last good payload.
#[derive(Debug, Clone, Default, Serialize)]
pub struct Snapshot {
    pub sequence: u64,
    pub polled_at: Option<DateTime<Utc>>,
    pub payload: Option<MetricsPayload>,
    pub error: Option<String>,
}

impl Snapshot {
    fn advance(&self, result: promdash_core::Result<MetricsPayload>) -> Self {
        let (payload, error) = match result {
            Ok(payload) => (Some(payload), None),
            Err(err) => (self.payload.clone(), Some(err.to_string())),
        };
        Self {
            sequence: self.sequence + 1,
            polled_at: Some(Utc::now()),
            payload,
            error,
        }
    }
}

/// Owns the polling task; dropping it stops polling.
pub struct PollHandle {
    rx: watch::Receiver<Snapshot>,
    task: JoinHandle<()>,
}

impl PollHandle {
    pub fn subscribe(&self) -> watch::Receiver<Snapshot> {
        self.rx.clone()
    }

    pub fn latest(&self) -> Snapshot {
        self.rx.borrow().clone()
    }
}

impl Drop for PollHandle {
    fn drop(&mut self) {
        self.task.abort();
    }
}

pub struct Poller;

impl Poller {
    /// Polls `source` immediately and then every `interval`. Intervals
    /// below one millisecond are raised to it.
    pub fn spawn<S: MetricsSource>(source: S, interval: Duration) -> PollHandle {
        let interval = interval.max(MIN_POLL_INTERVAL);
        let (tx, rx) = watch::channel(Snapshot::default());
        let source = Arc::new(source);
        let task = tokio::spawn(run_poll_loop(source, tx, interval));
        PollHandle { rx, task }
    }
}

async fn run_poll_loop<S: MetricsSource>(
    source: Arc<S>,
    tx: watch::Sender<Snapshot>,
    interval: Duration,
) {
    let mut ticker = tokio::time::interval(interval);
    ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);
    loop {
        tokio::select! {
            _ = ticker.tick() => {
                let result = source.fetch().await;
                if let Err(err) = &result {
                    warn!(error = %err, "poll failed");
                }
                let next = tx.borrow().advance(result);
                debug!(
                    sequence = next.sequence,
                    metrics = next.payload.as_ref().map_or(0, |p| p.metrics.len()),
                    "poll completed"
                );
                if tx.send(next).is_err() {
                    break;
                }
            }
            _ = tx.closed() => break,
        }
    }
}
