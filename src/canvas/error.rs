use uuid::Uuid;

use super::element::{ElementId, UserId};

/// Failures of canvas operations. None of them change state.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum CanvasError {
    #[error("element not found: {0}")]
    ElementNotFound(ElementId),
    #[error("element {element_id} is locked by {holder}")]
    LockConflict { element_id: ElementId, holder: UserId },
    #[error("stale update: incoming version {incoming} < current {current}")]
    StaleUpdate { incoming: u64, current: u64 },
    #[error("annotation not found: {0}")]
    AnnotationNotFound(Uuid),
    #[error("annotation {0} belongs to another user")]
    NotAnnotationAuthor(Uuid),
    #[error("session has not joined this canvas: {0}")]
    UnknownSession(Uuid),
}

impl crate::frame::ErrorCode for CanvasError {
    fn error_code(&self) -> &'static str {
        match self {
            Self::ElementNotFound(_) => "E_ELEMENT_NOT_FOUND",
            Self::LockConflict { .. } => "E_LOCK_CONFLICT",
            Self::StaleUpdate { .. } => "E_STALE_UPDATE",
            Self::AnnotationNotFound(_) => "E_ANNOTATION_NOT_FOUND",
            Self::NotAnnotationAuthor(_) => "E_NOT_ANNOTATION_AUTHOR",
            Self::UnknownSession(_) => "E_UNKNOWN_SESSION",
        }
    }

    fn retryable(&self) -> bool {
        // Both can succeed after the lock is released or the element refetched.
        matches!(self, Self::LockConflict { .. } | Self::StaleUpdate { .. })
    }
}
