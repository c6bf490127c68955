//! SSE intent stream with `Last-Event-ID` catch-up.

use std::convert::Infallible;

use axum::extract::State;
use axum::http::HeaderMap;
use axum::response::sse::{Event, KeepAlive, Sse};
use futures::stream::{self, Stream, StreamExt};
use serde_json::json;
use tokio_stream::wrappers::BroadcastStream;
use tracing::debug;

use intent_service::IntentEvent;

use crate::service::AppState;

fn frame(name: &'static str, event: &IntentEvent) -> Event {
    let data = serde_json::to_string(&event.record).unwrap_or_else(|_| "{}".to_string());
    Event::default()
        .event(name)
        .id(event.id.to_string())
        .data(data)
}

/// GET `/operator/intents/stream`.
///
/// Frame order on connect: `connected{reconnected}` first, then
/// `intent_catchup` for every retained event past `Last-Event-ID` (or a
/// `catchup_incomplete` marker when retention fell short), then live
/// events. IDs are strictly increasing across the whole stream.
pub async fn intent_stream(
    State(state): State<AppState>,
    headers: HeaderMap,
) -> Sse<impl Stream<Item = Result<Event, Infallible>>> {
    let last_seen: Option<u64> = headers
        .get("last-event-id")
        .and_then(|v| v.to_str().ok())
        .and_then(|v| v.parse().ok());

    let hub = state.intents.hub();
    // Subscribe before computing catch-up so no event can fall between.
    let live_rx = hub.subscribe();

    let mut frames = vec![Event::default()
        .event("connected")
        .id(hub.last_event_id().to_string())
        .data(json!({"reconnected": last_seen.is_some()}).to_string())];

    // Everything already delivered (via catch-up or the old connection)
    // is filtered out of the live feed.
    let mut delivered = last_seen.unwrap_or_else(|| hub.last_event_id());

    if let Some(last_seen) = last_seen {
        let catchup = hub.replay_after(last_seen);
        if !catchup.complete {
            debug!(last_seen, "Catch-up incomplete, advising REST fallback");
            frames.push(
                Event::default()
                    .event("catchup_incomplete")
                    .id(hub.last_event_id().to_string())
                    .data(json!({"requested_after": last_seen}).to_string()),
            );
        }
        for event in &catchup.events {
            delivered = event.id;
            frames.push(frame("intent_catchup", event));
        }
    }

    let initial = stream::iter(frames.into_iter().map(Ok));
    let live = BroadcastStream::new(live_rx).filter_map(move |received| async move {
        match received {
            Ok(event) if event.id > delivered => {
                Some(Ok(frame(event.kind.event_name(), &event)))
            }
            // Already delivered during catch-up, or the consumer lagged
            // (it will reconnect with Last-Event-ID).
            _ => None,
        }
    });

    Sse::new(initial.chain(live)).keep_alive(KeepAlive::default())
}
