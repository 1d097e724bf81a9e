//! Server-Sent Events stream
//!
//! Streams every pipeline event to the client as JSON. Lagged subscribers
//! skip missed events and keep going.

use crate::events::ShoeboxEvent;
use crate::AppState;
use axum::extract::State;
use axum::response::sse::{Event, KeepAlive, Sse};
use futures::Stream;
use std::convert::Infallible;
use std::time::Duration;
use tokio::sync::broadcast::error::RecvError;

pub async fn event_stream(
    State(state): State<AppState>,
) -> Sse<impl Stream<Item = std::result::Result<Event, Infallible>>> {
    let mut rx = state.event_bus.subscribe();

    let stream = async_stream::stream! {
        loop {
            match rx.recv().await {
                Ok(event) => {
                    if let Some(sse_event) = to_sse_event(&event) {
                        yield Ok(sse_event);
                    }
                }
                Err(RecvError::Lagged(missed)) => {
                    tracing::debug!("sse subscriber lagged, {} events dropped", missed);
                }
                Err(RecvError::Closed) => break,
            }
        }
    };

    Sse::new(stream).keep_alive(
        KeepAlive::new()
            .interval(Duration::from_secs(15))
            .text("heartbeat"),
    )
}

fn to_sse_event(event: &ShoeboxEvent) -> Option<Event> {
    let name = match event {
        ShoeboxEvent::FileDetected { .. } => "file_detected",
        ShoeboxEvent::FileImported { .. } => "file_imported",
        ShoeboxEvent::AssetAnalyzed { .. } => "asset_analyzed",
        ShoeboxEvent::SuggestionCreated { .. } => "suggestion_created",
        ShoeboxEvent::RenameApplied { .. } => "rename_applied",
        ShoeboxEvent::RenameFailed { .. } => "rename_failed",
        ShoeboxEvent::FolderStatusChanged { .. } => "folder_status",
        ShoeboxEvent::ProgressUpdate { .. } => "progress",
    };
    match serde_json::to_string(event) {
        Ok(data) => Some(Event::default().event(name).data(data)),
        Err(e) => {
            tracing::warn!("event serialization failed: {}", e);
            None
        }
    }
}
