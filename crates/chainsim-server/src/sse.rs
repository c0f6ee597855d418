//! `GET /sse/connections` — per-chain WebSocket connection counts, pushed
//! once immediately and then every second.

use std::convert::Infallible;
use std::time::Duration;

use axum::extract::State;
use axum::response::sse::{Event, KeepAlive, Sse};
use futures::stream::{self, Stream};

use crate::app::AppState;
use crate::connections::ConnectionTracker;

pub const UPDATE_INTERVAL: Duration = Duration::from_secs(1);

pub async fn connections_handler(State(state): State<AppState>) -> Sse<impl Stream<Item = Result<Event, Infallible>>> {
    Sse::new(count_events(state.tracker.clone(), UPDATE_INTERVAL)).keep_alive(KeepAlive::default())
}

/// Infinite stream of count snapshots, the first one without delay.
pub fn count_events(tracker: ConnectionTracker, every: Duration) -> impl Stream<Item = Result<Event, Infallible>> {
    stream::unfold((tracker, true), move |(tracker, first)| async move {
        if !first {
            tokio::time::sleep(every).await;
        }
        let data = serde_json::to_string(&tracker.counts()).unwrap_or_else(|_| "{}".to_string());
        Some((Ok(Event::default().data(data)), (tracker, false)))
    })
}
