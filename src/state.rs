//! Shared application state.
//!
//! DESIGN
//! ======
//! `AppState` is injected into Axum handlers via the `State` extractor.
//! It holds the server config and a map of live canvases. Each canvas owns
//! its `CanvasDoc`, the outbound channel of every connected session, and
//! the sequence counter stamped onto broadcast events.

#[cfg(test)]
#[path = "state_test.rs"]
mod tests;

use std::collections::HashMap;
use std::sync::Arc;
use std::time::Duration;

use tokio::sync::{RwLock, mpsc};
use tracing::debug;
use uuid::Uuid;

use crate::canvas::{CanvasDoc, CanvasEvent};
use crate::config::ServerConfig;
use crate::frame::Frame;

/// Frame data key carrying the per-canvas event sequence number.
pub const FRAME_SEQ: &str = "seq";

// =============================================================================
// CANVAS STATE
// =============================================================================

/// Per-canvas live state. Kept in memory for the life of the process.
#[derive(Debug)]
pub struct CanvasState {
    pub doc: CanvasDoc,
    /// Connected clients: `client_id` -> sender for outgoing frames.
    pub clients: HashMap<Uuid, mpsc::Sender<Frame>>,
    seq: u64,
}

impl CanvasState {
    #[must_use]
    pub fn new(lease_ttl: Duration) -> Self {
        Self { doc: CanvasDoc::new(lease_ttl), clients: HashMap::new(), seq: 0 }
    }

    /// Sequence number of the last stamped event.
    #[must_use]
    pub fn seq(&self) -> u64 {
        self.seq
    }

    /// Turn events into broadcast frames, each stamped with the next sequence number.
    ///
    /// Must be called inside the same write-lock section that produced the
    /// events so `seq` order matches mutation order.
    pub fn stamp(&mut self, canvas_id: Uuid, from: Option<&str>, events: Vec<CanvasEvent>) -> Vec<Frame> {
        events
            .into_iter()
            .map(|event| {
                self.seq += 1;
                if !event.is_presence() {
                    debug!(%canvas_id, seq = self.seq, syscall = event.syscall(), "stamped canvas event");
                }
                let mut frame = Frame::request(event.syscall(), event.to_data())
                    .with_canvas_id(canvas_id)
                    .with_data(FRAME_SEQ, self.seq);
                if let Some(from) = from {
                    frame = frame.with_from(from);
                }
                frame
            })
            .collect()
    }
}

// =============================================================================
// APP STATE
// =============================================================================

/// Shared application state, injected into Axum handlers via State extractor.
#[derive(Clone)]
pub struct AppState {
    pub canvases: Arc<RwLock<HashMap<Uuid, CanvasState>>>,
    pub config: Arc<ServerConfig>,
}

impl AppState {
    #[must_use]
    pub fn new(config: ServerConfig) -> Self {
        Self { canvases: Arc::new(RwLock::new(HashMap::new())), config: Arc::new(config) }
    }

    /// Fresh canvas state using the configured lease TTL.
    #[must_use]
    pub fn new_canvas(&self) -> CanvasState {
        CanvasState::new(self.config.lock_lease)
    }
}

// =============================================================================
// TEST HELPERS
// =============================================================================
