//! WebSocket telemetry gateway.
//!
//! One connection is one session. A reader task forwards frame payloads into
//! a bounded queue; the session loop takes one frame at a time, runs the
//! CPU-bound pipeline on the blocking pool with the owned `SessionState`
//! moved in and back out, and replies before taking the next frame.

use std::sync::Arc;

use axum::extract::ws::{Message, WebSocket, WebSocketUpgrade};
use axum::extract::State;
use axum::response::Response;
use axum::routing::get;
use axum::Router;
use futures::stream::{SplitSink, SplitStream};
use futures::{SinkExt, StreamExt};
use tokio::sync::{mpsc, oneshot};

use crate::config::PipelineConfig;
use crate::response::AppError;
use crate::state::{AppState, SessionGuard};
use crate::telemetry::aggregate::ContactTally;
use crate::telemetry::message::{ClientMessage, FrameTelemetry};
use crate::telemetry::session::SessionState;
use crate::vision::landmarks::FaceLandmarker;

pub fn router() -> Router<AppState> {
    Router::new().route("/ws", get(ws_handler))
}

/// One inbound frame, stamped at receipt.
#[derive(Debug, Clone)]
pub struct FrameJob {
    pub payload: String,
    pub received_at: i64,
}

impl FrameJob {
    pub fn now(payload: String) -> Self {
        Self {
            payload,
            received_at: chrono::Utc::now().timestamp_millis(),
        }
    }
}

#[derive(Debug, Clone, Copy, Default, PartialEq)]
pub struct SessionSummary {
    pub frames: u64,
    pub skipped: u64,
    pub no_face: u64,
    pub tally: ContactTally,
}

pub async fn ws_handler(
    ws: WebSocketUpgrade,
    State(state): State<AppState>,
) -> Result<Response, AppError> {
    let Some(guard) = state.sessions().try_open() else {
        return Err(AppError::too_many_requests("Too many telemetry sessions"));
    };

    Ok(ws.on_upgrade(move |socket| serve_socket(socket, state, guard)))
}

async fn serve_socket(socket: WebSocket, state: AppState, guard: SessionGuard) {
    let session_id = guard.id();
    let queue_depth = state.config().limits.queue_depth;
    tracing::info!(session_id, active = state.sessions().active(), "Telemetry session opened");

    let (sink, stream) = socket.split();
    let (jobs_tx, jobs_rx) = mpsc::channel::<FrameJob>(queue_depth);
    let (replies_tx, replies_rx) = mpsc::channel::<FrameTelemetry>(queue_depth);
    let (disconnect_tx, disconnect_rx) = oneshot::channel::<()>();

    let reader = tokio::spawn(read_frames(stream, jobs_tx, disconnect_tx, session_id));
    let writer = tokio::spawn(write_replies(sink, replies_rx, session_id));

    let mut shutdown_rx = state.shutdown_rx();
    let summary = tokio::select! {
        summary = run_session(
            jobs_rx,
            replies_tx,
            disconnect_rx,
            Arc::clone(state.landmarker()),
            *state.pipeline(),
        ) => Some(summary),
        _ = shutdown_rx.recv() => None,
    };

    reader.abort();
    let _ = writer.await;

    match summary {
        Some(summary) => tracing::info!(
            session_id,
            frames = summary.frames,
            skipped = summary.skipped,
            no_face = summary.no_face,
            total_samples = summary.tally.total_samples(),
            eye_contact_pct = summary.tally.eye_contact_pct(),
            "Telemetry session closed"
        ),
        None => tracing::info!(session_id, "Telemetry session closed by shutdown"),
    }
    drop(guard);
}

/// Forwards frames into the session queue while always watching the socket.
///
/// At most one frame waits outside a full queue; a newer frame replaces it,
/// so a slow session sees the latest picture instead of a growing backlog.
/// Close, EOF and read errors end the task immediately, even with the queue
/// full.
async fn read_frames(
    mut stream: SplitStream<WebSocket>,
    jobs: mpsc::Sender<FrameJob>,
    // Dropped when this task ends, which is the session's disconnect signal.
    _disconnect: oneshot::Sender<()>,
    session_id: u64,
) {
    let mut pending: Option<FrameJob> = None;

    loop {
        tokio::select! {
            biased;
            permit = jobs.reserve(), if pending.is_some() => {
                let Ok(permit) = permit else { break };
                if let Some(job) = pending.take() {
                    permit.send(job);
                }
            }
            msg = stream.next() => match msg {
                Some(Ok(Message::Text(text))) => match ClientMessage::parse(&text) {
                    Some(ClientMessage::Frame { data }) => {
                        if pending.replace(FrameJob::now(data)).is_some() {
                            tracing::debug!(session_id, "Queue full, replacing stale frame");
                        }
                    }
                    Some(ClientMessage::Other) => {
                        tracing::trace!(session_id, "Ignoring non-frame message");
                    }
                    None => {
                        tracing::debug!(session_id, "Ignoring malformed message");
                    }
                },
                Some(Ok(Message::Close(_))) | None => break,
                Some(Ok(_)) => {}
                Some(Err(e)) => {
                    tracing::debug!(session_id, error = %e, "WebSocket read failed");
                    break;
                }
            },
        }
    }
}

async fn write_replies(
    mut sink: SplitSink<WebSocket, Message>,
    mut replies: mpsc::Receiver<FrameTelemetry>,
    session_id: u64,
) {
    while let Some(telemetry) = replies.recv().await {
        let json = match serde_json::to_string(&telemetry) {
            Ok(json) => json,
            Err(e) => {
                tracing::warn!(session_id, error = %e, "Failed to serialize telemetry");
                continue;
            }
        };
        if let Err(e) = sink.send(Message::Text(json)).await {
            tracing::debug!(session_id, error = %e, "WebSocket write failed");
            break;
        }
    }
    let _ = sink.close().await;
}

/// Sequential per-session pipeline.
///
/// Returns when the job queue ends, the reply side goes away, or `disconnect`
/// fires. A frame still running on the blocking pool at disconnect is
/// abandoned together with the session state.
pub async fn run_session(
    mut jobs: mpsc::Receiver<FrameJob>,
    replies: mpsc::Sender<FrameTelemetry>,
    mut disconnect: oneshot::Receiver<()>,
    landmarker: Arc<dyn FaceLandmarker>,
    config: PipelineConfig,
) -> SessionSummary {
    let mut session = SessionState::new(&config);
    let mut summary = SessionSummary::default();

    loop {
        let job = tokio::select! {
            biased;
            _ = &mut disconnect => break,
            job = jobs.recv() => match job {
                Some(job) => job,
                None => break,
            },
        };

        let landmarker = Arc::clone(&landmarker);
        let mut owned = session;
        let task = tokio::task::spawn_blocking(move || {
            let outcome = owned.process_payload(&job.payload, landmarker.as_ref(), job.received_at);
            (owned, outcome)
        });

        let joined = tokio::select! {
            _ = &mut disconnect => {
                tracing::debug!("Abandoning in-flight frame on disconnect");
                return summary;
            }
            joined = task => joined,
        };
        let (returned, outcome) = match joined {
            Ok(result) => result,
            Err(e) => {
                tracing::error!(error = %e, "Frame processing task failed");
                return summary;
            }
        };
        session = returned;
        summary.tally = *session.tally();

        match outcome {
            Ok(outcome) => {
                summary.frames += 1;
                if !outcome.face_detected() {
                    summary.no_face += 1;
                }
                if replies.send(outcome.telemetry()).await.is_err() {
                    break;
                }
            }
            Err(e) => {
                summary.skipped += 1;
                tracing::debug!(error = %e, "Skipping undecodable frame");
            }
        }
    }

    summary
}
