//! # Worker lifecycle tracker with sequence-based ordering.
//!
//! Maintains authoritative state of which epoch workers are currently alive,
//! using event sequence numbers to handle out-of-order delivery.
//!
//! ## Architecture
//! ```text
//! runner ──► Bus ──► subscriber_listener() ──► AliveTracker::update()
//!                                                      │
//!                                                      ▼
//!                                         HashMap<String, WorkerState>
//!                                              (name → {seq, alive})
//! ```
//!
//! ## Rules
//! - Only `WorkerStarting` / `WorkerStopped` / `WorkerFailed` change alive state
//! - Read operations (`snapshot`, `is_alive`) are **eventually consistent**
//! - Other events carrying a worker name **update seq** but don't affect alive status
//! - Events with `seq <= last_seq` are **rejected** (stale)

use std::collections::HashMap;

use tokio::sync::RwLock;

use crate::events::{Event, EventKind};

#[derive(Debug, Clone)]
struct WorkerState {
    last_seq: u64,
    alive: bool,
}

/// Thread-safe tracker of alive workers.
pub(crate) struct AliveTracker {
    state: RwLock<HashMap<String, WorkerState>>,
}

impl AliveTracker {
    pub(crate) fn new() -> Self {
        Self {
            state: RwLock::new(HashMap::new()),
        }
    }

    /// Applies `ev` if it is newer than the last event seen for its worker.
    ///
    /// ```text
    /// update(WorkerStopped, seq=100)   → alive=false, last_seq=100
    /// update(WorkerStarting, seq=99)   → rejected (stale)
    /// ```
    ///
    /// Returns `true` when the alive state changed hands (start or stop applied).
    pub(crate) async fn update(&self, ev: &Event) -> bool {
        let name = match ev.worker.as_deref() {
            Some(n) => n,
            None => return false,
        };
        if matches!(
            ev.kind,
            EventKind::SubscriberOverflow | EventKind::SubscriberPanicked
        ) {
            // `worker` names a subscriber here, not an epoch worker.
            return false;
        }

        let mut state = self.state.write().await;
        let entry = state.entry(name.to_string()).or_insert(WorkerState {
            last_seq: 0,
            alive: false,
        });

        if ev.seq <= entry.last_seq {
            return false;
        }
        entry.last_seq = ev.seq;
        match ev.kind {
            EventKind::WorkerStarting => {
                entry.alive = true;
                true
            }
            EventKind::WorkerStopped | EventKind::WorkerFailed => {
                entry.alive = false;
                true
            }
            _ => false,
        }
    }

    /// Returns the sorted list of currently alive worker names.
    pub(crate) async fn snapshot(&self) -> Vec<String> {
        let state = self.state.read().await;
        let mut alive: Vec<String> = state
            .iter()
            .filter(|(_, ws)| ws.alive)
            .map(|(name, _)| name.clone())
            .collect();
        alive.sort_unstable();
        alive
    }

    pub(crate) async fn is_alive(&self, name: &str) -> bool {
        self.state
            .read()
            .await
            .get(name)
            .map(|ws| ws.alive)
            .unwrap_or(false)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn ev(kind: EventKind, worker: &str) -> Event {
        Event::new(kind).with_worker(worker).with_epoch(1)
    }

    #[tokio::test]
    async fn test_start_and_stop() {
        let t = AliveTracker::new();
        assert!(t.update(&ev(EventKind::WorkerStarting, "publish:/a")).await);
        assert!(t.update(&ev(EventKind::WorkerStarting, "disconnect-bridge")).await);
        assert_eq!(t.snapshot().await, vec!["disconnect-bridge", "publish:/a"]);

        assert!(t.update(&ev(EventKind::WorkerFailed, "publish:/a")).await);
        assert!(!t.is_alive("publish:/a").await);
        assert!(t.is_alive("disconnect-bridge").await);
    }

    #[tokio::test]
    async fn test_stale_event_rejected() {
        let t = AliveTracker::new();
        let start = ev(EventKind::WorkerStarting, "w");
        let stop = ev(EventKind::WorkerStopped, "w");

        assert!(t.update(&stop).await);
        assert!(!t.update(&start).await);
        assert!(!t.is_alive("w").await);
    }

    #[tokio::test]
    async fn test_subscriber_events_ignored() {
        let t = AliveTracker::new();
        assert!(!t.update(&Event::subscriber_overflow("log", "full")).await);
        assert!(t.snapshot().await.is_empty());
    }
}
