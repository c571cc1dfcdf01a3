//! WebSocket handler: bidirectional frame relay for one canvas session.
//!
//! DESIGN
//! ======
//! On upgrade, generates a client ID and enters a `select!` loop:
//! - Incoming client frames → parse + dispatch by syscall prefix
//! - Event frames from canvas peers → forward to client
//!
//! Handlers validate input, run one mutation through
//! `services::canvas::apply` (which stamps `seq` and fans events out to
//! peers under the canvas lock), and return an `Outcome`. The dispatch
//! layer owns the reply to the sender.
//!
//! LIFECYCLE
//! =========
//! 1. Upgrade → send `session:connected` with `client_id`
//! 2. `canvas:join` → snapshot reply, `presence:updated` to peers
//! 3. Client sends frames → dispatch → handler returns Outcome
//! 4. Close → part the canvas (releases the user's locks if this was
//!    their last session there)

#[cfg(test)]
#[path = "ws_test.rs"]
mod tests;

use std::collections::HashMap;

use axum::extract::ws::{Message, WebSocket, WebSocketUpgrade};
use axum::extract::{Query, State};
use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use serde::Serialize;
use tokio::sync::mpsc;
use tracing::{info, warn};
use uuid::Uuid;

use crate::canvas::controller::{Actor, CanvasController, Tool};
use crate::canvas::element::{ElementDraft, ElementId, ElementPatch, ElementType, Point, Size};
use crate::canvas::presence::Presence;
use crate::frame::{Data, Frame, Status, now_ms};
use crate::services;
use crate::state::AppState;

// =============================================================================
// OUTCOME
// =============================================================================

/// Result returned by handler functions. Event fan-out has already happened
/// by the time a handler returns; this decides what the sender gets back.
enum Outcome {
    /// Events were applied and sent to peers. Sender gets done + the event
    /// payload (or an `events` list when there were several).
    Applied(Vec<Frame>),
    /// Sent to peers only. No reply to sender (cursor traffic).
    Relayed,
    /// Send done+data to sender only.
    Reply(Data),
    /// Send empty done to sender only.
    Done,
}

// =============================================================================
// SESSION
// =============================================================================

/// Per-connection state.
struct Session {
    client_id: Uuid,
    user_id: String,
    user_name: String,
    color: String,
    canvas_id: Option<Uuid>,
    controller: CanvasController,
}

impl Session {
    fn new(user_id: impl Into<String>, user_name: impl Into<String>, color: impl Into<String>) -> Self {
        Self {
            client_id: Uuid::new_v4(),
            user_id: user_id.into(),
            user_name: user_name.into(),
            color: color.into(),
            canvas_id: None,
            controller: CanvasController::new(),
        }
    }

    fn actor(&self) -> Actor<'_> {
        Actor { client_id: self.client_id, user_id: &self.user_id }
    }

    fn presence(&self) -> Presence {
        Presence::new(self.client_id, self.user_id.clone(), self.user_name.clone(), self.color.clone())
    }
}

// =============================================================================
// UPGRADE
// =============================================================================

pub async fn handle_ws(
    State(state): State<AppState>,
    Query(params): Query<HashMap<String, String>>,
    ws: WebSocketUpgrade,
) -> Response {
    let Some(user_id) = non_empty(params.get("user_id")) else {
        return (StatusCode::UNAUTHORIZED, "user_id required").into_response();
    };
    let user_name = non_empty(params.get("name")).unwrap_or(user_id);
    let color = match non_empty(params.get("color")) {
        Some(color) => color.to_owned(),
        None => services::canvas::pick_color().to_owned(),
    };

    let session = Session::new(user_id, user_name, color);
    ws.on_upgrade(move |socket| run_ws(socket, state, session))
}

fn non_empty(value: Option<&String>) -> Option<&str> {
    value.map(|v| v.trim()).filter(|v| !v.is_empty())
}

// =============================================================================
// CONNECTION
// =============================================================================

async fn run_ws(mut socket: WebSocket, state: AppState, mut session: Session) {
    // Per-connection channel for receiving event frames from peers.
    let (client_tx, mut client_rx) = mpsc::channel::<Frame>(state.config.client_channel_capacity);

    let welcome = Frame::request("session:connected", Data::new())
        .with_data("client_id", session.client_id.to_string())
        .with_data("user_id", session.user_id.clone())
        .with_data("user_name", session.user_name.clone())
        .with_data("color", session.color.clone());
    if send_frame(&mut socket, &welcome).await.is_err() {
        return;
    }

    info!(client_id = %session.client_id, user_id = %session.user_id, "ws: client connected");

    loop {
        tokio::select! {
            msg = socket.recv() => {
                let Some(msg) = msg else { break };
                let Ok(msg) = msg else { break };
                match msg {
                    Message::Text(text) => {
                        dispatch_frame(&state, &mut socket, &mut session, &client_tx, &mut client_rx, &text).await;
                    }
                    Message::Close(_) => break,
                    _ => {}
                }
            }
            Some(frame) = client_rx.recv() => {
                if send_frame(&mut socket, &frame).await.is_err() {
                    break;
                }
            }
        }
    }

    if let Some(canvas_id) = session.canvas_id.take() {
        services::canvas::part_canvas(&state, canvas_id, session.client_id).await;
    }
    info!(client_id = %session.client_id, "ws: client disconnected");
}

// =============================================================================
// FRAME DISPATCH
// =============================================================================

/// Parse an incoming JSON frame, dispatch to handler, send replies.
async fn dispatch_frame(
    state: &AppState,
    socket: &mut WebSocket,
    session: &mut Session,
    client_tx: &mpsc::Sender<Frame>,
    client_rx: &mut mpsc::Receiver<Frame>,
    text: &str,
) {
    let replies = process_inbound_text(state, session, client_tx, text).await;
    for frame in outbound_in_order(client_rx, replies) {
        let _ = send_frame(socket, &frame).await;
    }
}

/// Peer events queued before the reply was built carry lower `seq` than
/// the sender's own event, so they go out first.
fn outbound_in_order(client_rx: &mut mpsc::Receiver<Frame>, replies: Vec<Frame>) -> Vec<Frame> {
    let mut frames = Vec::new();
    while let Ok(frame) = client_rx.try_recv() {
        frames.push(frame);
    }
    frames.extend(replies);
    frames
}

/// Parse and process one inbound text frame and return frames for the sender.
///
/// Kept apart from the socket so tests can drive dispatch directly.
async fn process_inbound_text(
    state: &AppState,
    session: &mut Session,
    client_tx: &mpsc::Sender<Frame>,
    text: &str,
) -> Vec<Frame> {
    let mut req: Frame = match serde_json::from_str(text) {
        Ok(r) => r,
        Err(e) => {
            warn!(client_id = %session.client_id, error = %e, "ws: invalid inbound frame");
            let err = Frame::request("gateway:error", Data::new()).with_data("message", format!("invalid json: {e}"));
            return vec![err];
        }
    };

    // Identity comes from the connection, never from the payload.
    req.from = Some(session.user_id.clone());
    if req.canvas_id.is_none() {
        req.canvas_id = session.canvas_id;
    }

    if !is_chatty(&req.syscall) {
        info!(client_id = %session.client_id, id = %req.id, syscall = %req.syscall, "ws: recv frame");
    }

    let result = match req.prefix() {
        "canvas" => handle_canvas(state, session, client_tx, &req).await,
        "element" => handle_element(state, session, &req).await,
        "lock" => handle_lock(state, session, &req).await,
        "cursor" | "presence" => handle_presence(state, session, &req).await,
        "annotation" => handle_annotation(state, session, &req).await,
        "tool" | "view" => handle_view(session, &req),
        "pointer" => handle_pointer(state, session, &req).await,
        prefix => Err(req.error(format!("unknown prefix: {prefix}"))),
    };

    match result {
        Ok(Outcome::Applied(frames)) => vec![req.done_with(events_reply(&frames))],
        Ok(Outcome::Relayed) => vec![],
        Ok(Outcome::Reply(data)) => vec![req.done_with(data)],
        Ok(Outcome::Done) => vec![req.done()],
        Err(err_frame) => vec![err_frame],
    }
}

// =============================================================================
// CANVAS HANDLERS
// =============================================================================

async fn handle_canvas(
    state: &AppState,
    session: &mut Session,
    client_tx: &mpsc::Sender<Frame>,
    req: &Frame,
) -> Result<Outcome, Frame> {
    match req.op() {
        "join" => {
            let Some(canvas_id) = req.uuid_field("canvas_id").or(req.canvas_id) else {
                return Err(req.error("canvas_id required"));
            };

            // Joining the current canvas again only refreshes the snapshot;
            // parting would drop this user's locks.
            if session.canvas_id == Some(canvas_id) {
                if let Some(snapshot) = services::canvas::snapshot(state, canvas_id).await {
                    session.controller.reset();
                    return Ok(Outcome::Reply(to_data(&snapshot)));
                }
            }

            // Part current canvas if already joined.
            if let Some(old) = session.canvas_id.take() {
                services::canvas::part_canvas(state, old, session.client_id).await;
            }
            session.controller.reset();

            let snapshot =
                services::canvas::join_canvas(state, canvas_id, session.presence(), client_tx.clone()).await;
            session.canvas_id = Some(canvas_id);
            Ok(Outcome::Reply(to_data(&snapshot)))
        }
        "part" => {
            if let Some(canvas_id) = session.canvas_id.take() {
                services::canvas::part_canvas(state, canvas_id, session.client_id).await;
            }
            session.controller.reset();
            Ok(Outcome::Done)
        }
        op => Err(req.error(format!("unknown canvas op: {op}"))),
    }
}

// =============================================================================
// ELEMENT HANDLERS
// =============================================================================

async fn handle_element(state: &AppState, session: &Session, req: &Frame) -> Result<Outcome, Frame> {
    let canvas_id = joined(session, req)?;
    let actor = session.actor();
    let user = actor.user_id;

    let result = match req.op() {
        "create" => {
            let draft = parse_draft(req)?;
            services::canvas::apply(state, canvas_id, Some(actor), |doc, now| {
                Ok(doc.create_element(user, draft, now).1)
            })
            .await
        }
        "update" => {
            let id = element_id(req)?;
            let patch: ElementPatch = serde_json::from_value(serde_json::Value::Object(req.data.clone().into_iter().collect()))
                .map_err(|e| req.error(format!("invalid patch: {e}")))?;
            services::canvas::apply(state, canvas_id, Some(actor), |doc, now| doc.update_element(user, &id, &patch, now))
                .await
        }
        "delete" => {
            let id = element_id(req)?;
            services::canvas::apply(state, canvas_id, Some(actor), |doc, now| doc.delete_element(user, &id, now)).await
        }
        "select" => {
            // Absent or null id clears the selection.
            let id = req.uuid_field("id").or_else(|| req.uuid_field("element_id"));
            services::canvas::apply(state, canvas_id, Some(actor), |doc, now| doc.select(&actor.client_id, id, now))
                .await
        }
        op => return Err(req.error(format!("unknown element op: {op}"))),
    };

    result
        .map(Outcome::Applied)
        .map_err(|e| req.error_from(&e))
}

fn parse_draft(req: &Frame) -> Result<ElementDraft, Frame> {
    let Some(kind) = req.str_field("type").and_then(ElementType::parse) else {
        return Err(req.error("type required: rectangle, text, image, button or input"));
    };
    let position = Point::new(req.f64_field("x").unwrap_or(0.0), req.f64_field("y").unwrap_or(0.0));

    let mut draft = ElementDraft::new(kind, position);
    if let (Some(width), Some(height)) = (req.f64_field("width"), req.f64_field("height")) {
        draft = draft.with_size(Size::new(width, height));
    }
    if let Some(serde_json::Value::Object(styles)) = req.data.get("styles") {
        draft = draft.with_styles(styles.clone());
    }
    if let Some(content) = req.str_field("content") {
        draft = draft.with_content(content);
    }
    Ok(draft)
}

// =============================================================================
// LOCK HANDLERS
// =============================================================================

async fn handle_lock(state: &AppState, session: &Session, req: &Frame) -> Result<Outcome, Frame> {
    let canvas_id = joined(session, req)?;
    let id = element_id(req)?;
    let actor = session.actor();
    let user = actor.user_id;

    let result = match req.op() {
        "acquire" => {
            services::canvas::apply(state, canvas_id, Some(actor), |doc, now| doc.acquire_lock(user, &id, now)).await
        }
        "release" => services::canvas::apply(state, canvas_id, Some(actor), |doc, _| doc.release_lock(user, &id)).await,
        op => return Err(req.error(format!("unknown lock op: {op}"))),
    };

    match result {
        // Releasing a lock held by someone else changes nothing.
        Ok(frames) if frames.is_empty() => Ok(Outcome::Done),
        Ok(frames) => Ok(Outcome::Applied(frames)),
        Err(e) => Err(req.error_from(&e)),
    }
}

// =============================================================================
// PRESENCE HANDLERS
// =============================================================================

async fn handle_presence(state: &AppState, session: &Session, req: &Frame) -> Result<Outcome, Frame> {
    let Some(canvas_id) = session.canvas_id else {
        // Silently ignore presence traffic before joining.
        return Ok(if req.syscall == "cursor:move" { Outcome::Relayed } else { Outcome::Done });
    };
    let actor = session.actor();

    match req.syscall.as_str() {
        "cursor:move" => {
            let cursor = match (req.f64_field("x"), req.f64_field("y")) {
                (Some(x), Some(y)) => Some(Point::new(x, y)),
                _ => None,
            };
            services::canvas::apply(state, canvas_id, Some(actor), |doc, now| {
                doc.move_cursor(&actor.client_id, cursor, now)
            })
            .await
            .map(|_| Outcome::Relayed)
            .map_err(|e| req.error_from(&e))
        }
        "presence:ping" => services::canvas::apply(state, canvas_id, Some(actor), |doc, now| {
            doc.heartbeat(&actor.client_id, now)
                .map(|()| Vec::new())
        })
        .await
        .map(|_| Outcome::Done)
        .map_err(|e| req.error_from(&e)),
        other => Err(req.error(format!("unknown presence syscall: {other}"))),
    }
}

// =============================================================================
// ANNOTATION HANDLERS
// =============================================================================

async fn handle_annotation(state: &AppState, session: &Session, req: &Frame) -> Result<Outcome, Frame> {
    let canvas_id = joined(session, req)?;
    let actor = session.actor();

    let result = match req.op() {
        "add" => {
            let Some(text) = req
                .str_field("text")
                .map(str::trim)
                .filter(|t| !t.is_empty())
            else {
                return Err(req.error("text required"));
            };
            let position = Point::new(req.f64_field("x").unwrap_or(0.0), req.f64_field("y").unwrap_or(0.0));
            services::canvas::apply(state, canvas_id, Some(actor), |doc, _| {
                doc.add_annotation(&actor.client_id, position, text, now_ms())
            })
            .await
        }
        "remove" => {
            let Some(id) = req.uuid_field("id") else {
                return Err(req.error("id required"));
            };
            services::canvas::apply(state, canvas_id, Some(actor), |doc, _| doc.remove_annotation(actor.user_id, &id))
                .await
        }
        op => return Err(req.error(format!("unknown annotation op: {op}"))),
    };

    result
        .map(Outcome::Applied)
        .map_err(|e| req.error_from(&e))
}

// =============================================================================
// VIEW HANDLERS
// =============================================================================

fn handle_view(session: &mut Session, req: &Frame) -> Result<Outcome, Frame> {
    let mut data = Data::new();
    match req.syscall.as_str() {
        "tool:set" => {
            let Some(tool) = req.str_field("tool").and_then(Tool::parse) else {
                return Err(req.error("tool required: select, rectangle or text"));
            };
            session.controller.set_tool(tool);
            data.insert("tool".into(), session.controller.tool().as_str().into());
        }
        "view:zoom" => {
            let Some(zoom) = req.f64_field("zoom") else {
                return Err(req.error("zoom required"));
            };
            session.controller.set_zoom(zoom);
            data.insert("zoom".into(), session.controller.zoom().into());
        }
        other => return Err(req.error(format!("unknown view syscall: {other}"))),
    }
    Ok(Outcome::Reply(data))
}

// =============================================================================
// POINTER HANDLERS
// =============================================================================

async fn handle_pointer(state: &AppState, session: &mut Session, req: &Frame) -> Result<Outcome, Frame> {
    let canvas_id = joined(session, req)?;
    let (Some(x), Some(y)) = (req.f64_field("x"), req.f64_field("y")) else {
        return Err(req.error("x and y required"));
    };
    let screen = Point::new(x, y);
    let op = req.op();
    if !matches!(op, "down" | "move" | "up") {
        return Err(req.error(format!("unknown pointer op: {op}")));
    }

    let actor = Actor { client_id: session.client_id, user_id: &session.user_id };
    let controller = &mut session.controller;
    let result = services::canvas::apply(state, canvas_id, Some(actor), |doc, now| match op {
        "down" => controller.pointer_down(doc, actor, screen, now),
        "move" => controller.pointer_move(doc, actor, screen, now),
        _ => controller.pointer_up(doc, actor, screen, now),
    })
    .await;

    let frames = result.map_err(|e| req.error_from(&e))?;
    if op == "move" {
        return Ok(Outcome::Relayed);
    }

    let gesture = session.controller.gesture();
    let mut data = Data::new();
    data.insert("gesture".into(), gesture.as_str().into());
    if let Some(element_id) = gesture.element_id() {
        data.insert("element_id".into(), element_id.to_string().into());
    }
    data.insert("events".into(), events_list(&frames));
    Ok(Outcome::Reply(data))
}

// =============================================================================
// HELPERS
// =============================================================================

fn joined(session: &Session, req: &Frame) -> Result<Uuid, Frame> {
    session
        .canvas_id
        .ok_or_else(|| req.error("must join a canvas first"))
}

fn element_id(req: &Frame) -> Result<ElementId, Frame> {
    req.uuid_field("id")
        .or_else(|| req.uuid_field("element_id"))
        .ok_or_else(|| req.error("id required"))
}

/// Reply payload for applied events: the single event's data, or an
/// `events` list when one operation produced several.
fn events_reply(frames: &[Frame]) -> Data {
    if let [frame] = frames {
        return frame.data.clone();
    }
    let mut data = Data::new();
    data.insert("events".into(), events_list(frames));
    data
}

fn events_list(frames: &[Frame]) -> serde_json::Value {
    serde_json::Value::Array(
        frames
            .iter()
            .filter(|f| !f.syscall.starts_with("presence:"))
            .map(|f| serde_json::Value::Object(f.data.clone().into_iter().collect()))
            .collect(),
    )
}

fn to_data(value: &impl Serialize) -> Data {
    match serde_json::to_value(value) {
        Ok(serde_json::Value::Object(map)) => map.into_iter().collect(),
        _ => Data::new(),
    }
}

/// High-volume presence traffic stays out of the frame log.
fn is_chatty(syscall: &str) -> bool {
    matches!(syscall, "cursor:move" | "pointer:move" | "presence:ping" | "presence:updated")
}

async fn send_frame(socket: &mut WebSocket, frame: &Frame) -> Result<(), ()> {
    let json = match serde_json::to_string(frame) {
        Ok(j) => j,
        Err(e) => {
            warn!(error = %e, "ws: failed to serialize frame");
            return Err(());
        }
    };
    if !is_chatty(&frame.syscall) {
        if frame.status == Status::Error {
            let code = frame.str_field("code").unwrap_or("-");
            let message = frame.str_field("message").unwrap_or("-");
            warn!(id = %frame.id, syscall = %frame.syscall, code, message, "ws: send frame status=Error");
        } else {
            info!(id = %frame.id, syscall = %frame.syscall, status = ?frame.status, "ws: send frame");
        }
    }
    socket
        .send(Message::Text(json.into()))
        .await
        .map_err(|_| ())
}
