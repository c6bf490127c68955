//! # SSE Event Hub
//!
//! Monotonic event IDs over a bounded retention ring, plus a broadcast
//! channel for live delivery. Reconnecting clients replay everything after
//! their `Last-Event-ID`; when the ring has already discarded part of that
//! range the catch-up is flagged incomplete so the client falls back to
//! REST.

use std::collections::VecDeque;
use std::sync::atomic::{AtomicU64, Ordering};

use parking_lot::Mutex;
use serde::{Deserialize, Serialize};
use tokio::sync::broadcast;
use tracing::debug;

use shared_types::IntentRecord;

/// Lifecycle transition carried by one SSE frame.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum IntentEventKind {
    Accepted,
    Executing,
    Verified,
    Failed,
    Expired,
}

impl IntentEventKind {
    /// SSE `event:` field name.
    #[must_use]
    pub fn event_name(&self) -> &'static str {
        match self {
            IntentEventKind::Accepted => "intent_accepted",
            IntentEventKind::Executing => "intent_executing",
            IntentEventKind::Verified => "intent_verified",
            IntentEventKind::Failed => "intent_failed",
            IntentEventKind::Expired => "intent_expired",
        }
    }
}

/// One published intent transition.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct IntentEvent {
    /// Monotonically increasing, never reused.
    pub id: u64,
    pub kind: IntentEventKind,
    pub record: IntentRecord,
}

/// Catch-up replay result.
#[derive(Debug, Clone, PartialEq)]
pub struct CatchupResult {
    /// Retained events with id greater than the requested one, in order.
    pub events: Vec<IntentEvent>,
    /// False when the ring's lower bound has passed the requested id, so
    /// some events are unrecoverable over SSE.
    pub complete: bool,
}

/// The hub: retention ring + live broadcast.
pub struct EventHub {
    next_id: AtomicU64,
    ring: Mutex<VecDeque<IntentEvent>>,
    retention: usize,
    live: broadcast::Sender<IntentEvent>,
}

impl EventHub {
    #[must_use]
    pub fn new(retention: usize) -> Self {
        let (live, _) = broadcast::channel(retention.max(16));
        Self {
            next_id: AtomicU64::new(0),
            ring: Mutex::new(VecDeque::with_capacity(retention)),
            retention,
            live,
        }
    }

    /// Publish one transition; returns its event id.
    pub fn publish(&self, kind: IntentEventKind, record: IntentRecord) -> u64 {
        let id = self.next_id.fetch_add(1, Ordering::SeqCst) + 1;
        let event = IntentEvent { id, kind, record };
        {
            let mut ring = self.ring.lock();
            if ring.len() == self.retention {
                ring.pop_front();
            }
            ring.push_back(event.clone());
        }
        // Live delivery is best effort; slow consumers lag and reconnect.
        let _ = self.live.send(event);
        debug!(event_id = id, kind = kind.event_name(), "Intent event published");
        id
    }

    /// Subscribe to live events.
    #[must_use]
    pub fn subscribe(&self) -> broadcast::Receiver<IntentEvent> {
        self.live.subscribe()
    }

    /// Replay retained events with `id > last_seen`.
    #[must_use]
    pub fn replay_after(&self, last_seen: u64) -> CatchupResult {
        let ring = self.ring.lock();
        let lower_bound = ring.front().map_or(0, |e| e.id);
        let events: Vec<IntentEvent> =
            ring.iter().filter(|e| e.id > last_seen).cloned().collect();
        // Complete iff nothing between last_seen and the ring's oldest
        // retained id has been discarded.
        let complete = lower_bound <= last_seen + 1;
        CatchupResult { events, complete }
    }

    /// Highest event id issued so far.
    #[must_use]
    pub fn last_event_id(&self) -> u64 {
        self.next_id.load(Ordering::SeqCst)
    }
}
