//! Typed events broadcast to every participant of a canvas.
//!
//! Events serialize with a `type` tag in SCREAMING_SNAKE_CASE
//! (`ELEMENT_LOCKED`, `COMMENT_ADDED`, ...) and map onto a frame syscall via
//! [`CanvasEvent::syscall`].

use serde::Serialize;
use uuid::Uuid;

use super::annotation::Annotation;
use super::element::{CanvasElement, ElementId, UserId};
use super::presence::Presence;
use crate::frame::Data;

/// Why a lock went away.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum UnlockReason {
    /// The holder released it, or toggled it off with a second acquire.
    Released,
    /// The holder stopped renewing and the lease ran out.
    Expired,
    /// The holder's last session left the canvas.
    Disconnected,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(tag = "type", rename_all = "SCREAMING_SNAKE_CASE")]
pub enum CanvasEvent {
    ElementCreated {
        element: CanvasElement,
    },
    ElementUpdated {
        element: CanvasElement,
    },
    ElementDeleted {
        element_id: ElementId,
    },
    ElementSelected {
        client_id: Uuid,
        user_id: UserId,
        element_id: Option<ElementId>,
    },
    ElementLocked {
        element_id: ElementId,
        user_id: UserId,
    },
    ElementUnlocked {
        element_id: ElementId,
        user_id: UserId,
        reason: UnlockReason,
    },
    CommentAdded {
        annotation: Annotation,
    },
    CommentRemoved {
        annotation_id: Uuid,
    },
    PresenceUpdated {
        presence: Presence,
    },
    PresenceLeft {
        client_id: Uuid,
        user_id: UserId,
    },
}

impl CanvasEvent {
    /// Frame syscall carrying this event to peers.
    #[must_use]
    pub fn syscall(&self) -> &'static str {
        match self {
            Self::ElementCreated { .. } => "element:created",
            Self::ElementUpdated { .. } => "element:updated",
            Self::ElementDeleted { .. } => "element:deleted",
            Self::ElementSelected { .. } => "element:selected",
            Self::ElementLocked { .. } => "element:locked",
            Self::ElementUnlocked { .. } => "element:unlocked",
            Self::CommentAdded { .. } => "annotation:added",
            Self::CommentRemoved { .. } => "annotation:removed",
            Self::PresenceUpdated { .. } => "presence:updated",
            Self::PresenceLeft { .. } => "presence:left",
        }
    }

    /// Presence traffic is advisory and high-volume; it is excluded from frame logs.
    #[must_use]
    pub fn is_presence(&self) -> bool {
        matches!(self, Self::PresenceUpdated { .. } | Self::PresenceLeft { .. })
    }

    /// Flatten the event into a frame payload, including its `type` tag.
    #[must_use]
    pub fn to_data(&self) -> Data {
        match serde_json::to_value(self) {
            Ok(serde_json::Value::Object(map)) => map.into_iter().collect(),
            _ => Data::new(),
        }
    }
}
