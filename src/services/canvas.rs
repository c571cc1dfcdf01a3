//! Canvas service: join/part, mutation application, and fan-out.
//!
//! DESIGN
//! ======
//! Canvases are created on first join and live in memory for the life of
//! the process. Every mutation runs inside one write-lock section that
//! applies the change to the `CanvasDoc`, stamps the resulting events with
//! the canvas sequence number, and queues them on each peer's channel with
//! `try_send`. Queuing under the lock keeps every recipient's view in `seq`
//! order; `try_send` never waits, so a slow client cannot stall the canvas.
//!
//! ERROR HANDLING
//! ==============
//! Domain failures (`LockConflict`, `StaleUpdate`, ...) abort before any
//! event is stamped, so a rejected operation is invisible to peers. A full
//! or closed client channel drops the frame; the reader task for that
//! client notices the closed socket and parts it.

use std::collections::HashMap;
use std::time::Instant;

use rand::Rng;
use serde::Serialize;
use tokio::sync::mpsc;
use tracing::{debug, info};
use uuid::Uuid;

use crate::canvas::annotation::Annotation;
use crate::canvas::controller::Actor;
use crate::canvas::doc::EventResult;
use crate::canvas::element::CanvasElement;
use crate::canvas::presence::Presence;
use crate::canvas::{CanvasDoc, CanvasError};
use crate::frame::{ErrorCode, Frame};
use crate::state::{AppState, CanvasState};

/// Colors handed to sessions that connect without one.
pub const PRESENCE_PALETTE: [&str; 8] =
    ["#ef4444", "#f97316", "#eab308", "#22c55e", "#14b8a6", "#3b82f6", "#8b5cf6", "#ec4899"];

// =============================================================================
// TYPES
// =============================================================================

#[derive(Debug, thiserror::Error, PartialEq, Eq)]
pub enum CanvasServiceError {
    #[error("canvas not loaded: {0}")]
    NotLoaded(Uuid),
    #[error(transparent)]
    Canvas(#[from] CanvasError),
}

impl ErrorCode for CanvasServiceError {
    fn error_code(&self) -> &'static str {
        match self {
            Self::NotLoaded(_) => "E_CANVAS_NOT_LOADED",
            Self::Canvas(e) => e.error_code(),
        }
    }

    fn retryable(&self) -> bool {
        match self {
            Self::NotLoaded(_) => false,
            Self::Canvas(e) => e.retryable(),
        }
    }
}

/// Full state of one canvas as sent on join and served over REST.
#[derive(Debug, Clone, Serialize)]
pub struct CanvasSnapshot {
    pub canvas_id: Uuid,
    /// Sequence number of the last event folded into this snapshot.
    pub seq: u64,
    /// Elements in draw order (bottom first).
    pub elements: Vec<CanvasElement>,
    pub presence: Vec<Presence>,
    pub annotations: Vec<Annotation>,
}

impl CanvasSnapshot {
    fn capture(canvas_id: Uuid, canvas: &CanvasState) -> Self {
        let doc = &canvas.doc;
        Self {
            canvas_id,
            seq: canvas.seq(),
            elements: doc.elements().sorted().into_iter().cloned().collect(),
            presence: doc.presence().list().into_iter().cloned().collect(),
            annotations: doc.annotations().list().to_vec(),
        }
    }
}

/// Row returned by [`list_canvases`].
#[derive(Debug, Clone, Serialize, PartialEq, Eq)]
pub struct CanvasSummary {
    pub id: Uuid,
    pub elements: usize,
    pub clients: usize,
    pub locks: usize,
    pub annotations: usize,
}

// =============================================================================
// JOIN / PART
// =============================================================================

/// Join a canvas, creating it if this is the first session to ask for it.
/// Peers are told about the newcomer; the newcomer gets the snapshot.
pub async fn join_canvas(state: &AppState, canvas_id: Uuid, presence: Presence, tx: mpsc::Sender<Frame>) -> CanvasSnapshot {
    let client_id = presence.client_id;
    let user_id = presence.user_id.clone();

    let mut canvases = state.canvases.write().await;
    let canvas = canvases
        .entry(canvas_id)
        .or_insert_with(|| state.new_canvas());

    canvas.clients.insert(client_id, tx);
    let events = canvas.doc.join(presence, Instant::now());
    let frames = canvas.stamp(canvas_id, Some(&user_id), events);
    fan_out(&canvas.clients, &frames, Some(client_id));

    info!(%canvas_id, %client_id, %user_id, clients = canvas.clients.len(), "client joined canvas");
    CanvasSnapshot::capture(canvas_id, canvas)
}

/// Leave a canvas. If this was the user's last session on it, their locks
/// are released and peers are told.
pub async fn part_canvas(state: &AppState, canvas_id: Uuid, client_id: Uuid) {
    let mut canvases = state.canvases.write().await;
    let Some(canvas) = canvases.get_mut(&canvas_id) else {
        return;
    };

    canvas.clients.remove(&client_id);
    let events = canvas.doc.leave(&client_id);
    let frames = canvas.stamp(canvas_id, None, events);
    fan_out(&canvas.clients, &frames, None);

    info!(%canvas_id, %client_id, remaining = canvas.clients.len(), released = frames.len().saturating_sub(1), "client left canvas");
}

// =============================================================================
// MUTATION
// =============================================================================

/// Apply one mutation to a loaded canvas and fan its events out.
///
/// `actor` is stamped as the frames' `from` and excluded from the fan-out;
/// the caller replies to it directly. Returns the stamped frames.
///
/// # Errors
///
/// Returns `NotLoaded` if the canvas is not in memory, or the domain error
/// from `mutate` (no events are stamped or sent in that case).
pub async fn apply<F>(
    state: &AppState,
    canvas_id: Uuid,
    actor: Option<Actor<'_>>,
    mutate: F,
) -> Result<Vec<Frame>, CanvasServiceError>
where
    F: FnOnce(&mut CanvasDoc, Instant) -> EventResult,
{
    let mut canvases = state.canvases.write().await;
    let canvas = canvases
        .get_mut(&canvas_id)
        .ok_or(CanvasServiceError::NotLoaded(canvas_id))?;

    let events = mutate(&mut canvas.doc, Instant::now())?;
    let frames = canvas.stamp(canvas_id, actor.map(|a| a.user_id), events);
    fan_out(&canvas.clients, &frames, actor.map(|a| a.client_id));
    Ok(frames)
}

/// Queue frames on every client channel except `exclude`. Best effort.
pub(crate) fn fan_out(clients: &HashMap<Uuid, mpsc::Sender<Frame>>, frames: &[Frame], exclude: Option<Uuid>) {
    for frame in frames {
        for (client_id, tx) in clients {
            if exclude == Some(*client_id) {
                continue;
            }
            if let Err(e) = tx.try_send(frame.clone()) {
                debug!(%client_id, syscall = %frame.syscall, error = %e, "dropped broadcast frame");
            }
        }
    }
}

// =============================================================================
// QUERIES
// =============================================================================

/// Snapshot of a loaded canvas, or `None` if no session has joined it.
pub async fn snapshot(state: &AppState, canvas_id: Uuid) -> Option<CanvasSnapshot> {
    let canvases = state.canvases.read().await;
    canvases
        .get(&canvas_id)
        .map(|canvas| CanvasSnapshot::capture(canvas_id, canvas))
}

/// Summaries of every loaded canvas, ordered by id.
pub async fn list_canvases(state: &AppState) -> Vec<CanvasSummary> {
    let canvases = state.canvases.read().await;
    let mut rows: Vec<CanvasSummary> = canvases
        .iter()
        .map(|(id, canvas)| CanvasSummary {
            id: *id,
            elements: canvas.doc.elements().len(),
            clients: canvas.clients.len(),
            locks: canvas.doc.locks().len(),
            annotations: canvas.doc.annotations().len(),
        })
        .collect();
    rows.sort_by_key(|row| row.id);
    rows
}

/// Pick a random presence color from the palette.
#[must_use]
pub fn pick_color() -> &'static str {
    PRESENCE_PALETTE[rand::rng().random_range(0..PRESENCE_PALETTE.len())]
}

#[cfg(test)]
#[path = "canvas_test.rs"]
mod tests;
