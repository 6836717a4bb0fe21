//! SSE streaming endpoint.
//!
//! GET /api/jobs/:job_id/stream
//!
//! One JSON object per log entry, a comment line on every poll tick, and a
//! final object carrying `done`, `stopped` or `error` before the stream closes.

use std::convert::Infallible;

use axum::{
    extract::{Extension, Path},
    response::sse::{Event, Sse},
};
use futures::stream::StreamExt;

use crate::common::JobId;
use crate::domains::cleanse::StreamItem;
use crate::server::app::AxumAppState;
use crate::server::error::ApiError;
use crate::server::middleware::AuthOwner;

pub async fn stream_handler(
    Extension(state): Extension<AxumAppState>,
    AuthOwner(owner): AuthOwner,
    Path(job_id): Path<JobId>,
) -> Result<Sse<impl futures::Stream<Item = Result<Event, Infallible>>>, ApiError> {
    let items = state.service.stream(owner, job_id).await?;

    let events = items.filter_map(|item| async move {
        match item {
            StreamItem::Event(event) => Event::default().json_data(&event).ok().map(Ok),
            StreamItem::Heartbeat => Some(Ok(Event::default().comment(""))),
            StreamItem::Terminal(terminal) => Event::default().json_data(&terminal).ok().map(Ok),
        }
    });

    Ok(Sse::new(events))
}
