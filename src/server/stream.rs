use axum::response::sse::{Event, KeepAlive, Sse};
use futures::Stream;
use futures::stream;
use tokio::sync::mpsc;

use crate::workflow::WorkflowEvent;

/// Turns a run's event receiver into an SSE body. The stream ends once every
/// sender is gone.
pub fn event_stream(
    rx: mpsc::Receiver<WorkflowEvent>,
) -> Sse<impl Stream<Item = Result<Event, axum::Error>>> {
    let events = stream::unfold(rx, |mut rx| async move {
        let event = rx.recv().await?;
        Some((Event::default().json_data(&event), rx))
    });
    Sse::new(events).keep_alive(KeepAlive::default())
}
