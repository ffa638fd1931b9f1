//! `GET /progress-stream` (§6): a long-lived SSE connection forwarding one
//! job's progress frames as they are published (C2). The initial frame is
//! the job's current snapshot; the stream closes on `done=true` or `error`.

use std::convert::Infallible;
use std::time::Duration;

use axum::extract::{Query, State};
use axum::response::sse::{Event, KeepAlive, Sse};
use futures_util::stream::{self, Stream, StreamExt};
use serde::Deserialize;
use tracing::warn;

use vrender_progress::ProgressEvent;

use crate::auth::AppAttestation;
use crate::error::ApiError;
use crate::security::is_valid_identifier;
use crate::state::AppState;

#[derive(Debug, Deserialize)]
pub struct ProgressStreamParams {
    pub job_id: String,
}

/// The SSE endpoint tolerates a missing app-attestation header but logs it
/// (§6) — unlike `/render` and `/generate-clip`, it never rejects on that
/// basis alone.
pub async fn progress_stream(
    State(state): State<AppState>,
    Query(params): Query<ProgressStreamParams>,
    attestation: AppAttestation,
) -> Result<Sse<impl Stream<Item = Result<Event, Infallible>>>, ApiError> {
    if attestation == AppAttestation::Missing {
        warn!(job_id = %params.job_id, "progress-stream request missing app-attestation token");
    }
    if !is_valid_identifier(&params.job_id) {
        return Err(ApiError::bad_request("invalid job_id"));
    }

    let initial = state.progress.current(&params.job_id).await?;
    let initial_event = Event::default().json_data(&initial).map_err(|e| ApiError::internal(e.to_string()))?;

    // A job already terminal when the client connects needs no live
    // subscription at all — avoids leaving the subscriber's background task
    // running past this handler's return.
    let combined = if initial.is_terminal() {
        stream::once(async move { Ok(initial_event) }).left_stream()
    } else {
        let job_id = params.job_id.clone();
        let subscriber = state.progress.subscribe(&job_id).await?;

        let rest = stream::unfold((subscriber, false), move |(mut rx, mut closed)| async move {
            if closed {
                return None;
            }
            let event = rx.recv().await?;
            let sse = match &event {
                ProgressEvent::Update(record) => {
                    if record.is_terminal() {
                        closed = true;
                    }
                    Event::default().json_data(record).ok()?
                }
                ProgressEvent::Heartbeat => Event::default().comment("heartbeat"),
            };
            Some((Ok(sse), (rx, closed)))
        });

        stream::once(async move { Ok(initial_event) }).chain(rest).right_stream()
    };

    Ok(Sse::new(combined).keep_alive(KeepAlive::new().interval(Duration::from_secs(30)).text("heartbeat")))
}
