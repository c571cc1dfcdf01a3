//! `CanvasDoc`: one canvas's shared state behind a narrow mutation API.
//!
//! Every write path funnels through here and checks the lock rule. Each
//! operation either fails with no state change or returns the events
//! describing what changed.
//!
//! Activity by a user (cursor moves, heartbeats, edits, lock acquisition)
//! renews the leases on every lock that user holds.

#[cfg(test)]
#[path = "doc_test.rs"]
mod doc_test;

use std::time::{Duration, Instant};

use uuid::Uuid;

use super::annotation::{Annotation, AnnotationStore};
use super::element::{CanvasElement, ElementDraft, ElementId, ElementPatch, Point};
use super::error::CanvasError;
use super::event::{CanvasEvent, UnlockReason};
use super::lock::LockManager;
use super::presence::{Presence, PresenceStore};
use super::store::ElementStore;

pub type EventResult = Result<Vec<CanvasEvent>, CanvasError>;

#[derive(Debug)]
pub struct CanvasDoc {
    elements: ElementStore,
    locks: LockManager,
    presence: PresenceStore,
    annotations: AnnotationStore,
}

impl CanvasDoc {
    #[must_use]
    pub fn new(lease_ttl: Duration) -> Self {
        Self {
            elements: ElementStore::new(),
            locks: LockManager::new(lease_ttl),
            presence: PresenceStore::new(),
            annotations: AnnotationStore::new(),
        }
    }

    // --- Read access ---

    #[must_use]
    pub fn elements(&self) -> &ElementStore {
        &self.elements
    }

    #[must_use]
    pub fn locks(&self) -> &LockManager {
        &self.locks
    }

    #[must_use]
    pub fn presence(&self) -> &PresenceStore {
        &self.presence
    }

    #[must_use]
    pub fn annotations(&self) -> &AnnotationStore {
        &self.annotations
    }

    #[cfg(test)]
    #[must_use]
    pub fn element(&self, id: &ElementId) -> Option<&CanvasElement> {
        self.elements.get(id)
    }

    // --- Sessions ---

    /// Register a session on the canvas.
    pub fn join(&mut self, presence: Presence, now: Instant) -> Vec<CanvasEvent> {
        self.locks.renew(&presence.user_id, now);
        let presence = self.presence.connect(presence).clone();
        vec![CanvasEvent::PresenceUpdated { presence }]
    }

    /// Drop a session. When it was the user's last session on this canvas,
    /// every lock the user holds is released.
    pub fn leave(&mut self, client_id: &Uuid) -> Vec<CanvasEvent> {
        let Some(presence) = self.presence.disconnect(client_id) else {
            return Vec::new();
        };
        let mut events = vec![CanvasEvent::PresenceLeft { client_id: *client_id, user_id: presence.user_id.clone() }];
        if !self.presence.has_user(&presence.user_id) {
            events.extend(
                self.locks
                    .release_all(&mut self.elements, &presence.user_id, UnlockReason::Disconnected),
            );
        }
        events
    }

    /// Renew the sender's leases without any other change.
    ///
    /// # Errors
    ///
    /// Returns `UnknownSession` if the session has not joined.
    pub fn heartbeat(&mut self, client_id: &Uuid, now: Instant) -> Result<(), CanvasError> {
        let user = self.presence.require(client_id)?.user_id.clone();
        self.locks.renew(&user, now);
        Ok(())
    }

    /// Republish a session's cursor.
    ///
    /// # Errors
    ///
    /// Returns `UnknownSession` if the session has not joined.
    pub fn move_cursor(&mut self, client_id: &Uuid, cursor: Option<Point>, now: Instant) -> EventResult {
        let presence = self.presence.set_cursor(client_id, cursor)?.clone();
        self.locks.renew(&presence.user_id, now);
        Ok(vec![CanvasEvent::PresenceUpdated { presence }])
    }

    /// Select an element (or clear the selection with `None`).
    ///
    /// # Errors
    ///
    /// Returns `UnknownSession`, `ElementNotFound`, or `LockConflict` when the
    /// element is locked by another user.
    pub fn select(&mut self, client_id: &Uuid, element: Option<ElementId>, now: Instant) -> EventResult {
        let user = self.presence.require(client_id)?.user_id.clone();
        if let Some(id) = &element {
            self.elements.require_writable(id, &user)?;
        }
        self.presence.select(client_id, element)?;
        self.locks.renew(&user, now);
        Ok(vec![CanvasEvent::ElementSelected { client_id: *client_id, user_id: user, element_id: element }])
    }

    // --- Elements ---

    /// Insert a new element on top of the stack.
    pub fn create_element(&mut self, user: &str, draft: ElementDraft, now: Instant) -> (ElementId, Vec<CanvasEvent>) {
        let element = self.elements.insert(draft, Some(user.to_owned())).clone();
        self.locks.renew(user, now);
        (element.id, vec![CanvasEvent::ElementCreated { element }])
    }

    /// # Errors
    ///
    /// Returns `ElementNotFound`, `LockConflict`, or `StaleUpdate`.
    pub fn update_element(&mut self, user: &str, id: &ElementId, patch: &ElementPatch, now: Instant) -> EventResult {
        let element = self.elements.update(id, user, patch)?.clone();
        self.locks.renew(user, now);
        Ok(vec![CanvasEvent::ElementUpdated { element }])
    }

    /// # Errors
    ///
    /// Returns `ElementNotFound` or `LockConflict`.
    pub fn move_element(&mut self, user: &str, id: &ElementId, position: Point, now: Instant) -> EventResult {
        let element = self.elements.move_to(id, user, position)?.clone();
        self.locks.renew(user, now);
        Ok(vec![CanvasEvent::ElementUpdated { element }])
    }

    /// Delete an element. Blocked while another user holds its lock.
    ///
    /// # Errors
    ///
    /// Returns `ElementNotFound` or `LockConflict`.
    pub fn delete_element(&mut self, user: &str, id: &ElementId, now: Instant) -> EventResult {
        self.elements.remove(id, user)?;
        self.locks.forget(id);
        self.presence.clear_selection_of(id);
        self.locks.renew(user, now);
        Ok(vec![CanvasEvent::ElementDeleted { element_id: *id }])
    }

    // --- Locks ---

    /// Acquire (or toggle off) the lock on an element.
    ///
    /// # Errors
    ///
    /// Returns `ElementNotFound`, or `LockConflict` when another user holds it.
    pub fn acquire_lock(&mut self, user: &str, id: &ElementId, now: Instant) -> EventResult {
        let event = self.locks.acquire(&mut self.elements, id, user, now)?;
        Ok(vec![event])
    }

    /// Release a lock held by `user`. Releasing someone else's lock is a no-op.
    ///
    /// # Errors
    ///
    /// Returns `ElementNotFound`.
    pub fn release_lock(&mut self, user: &str, id: &ElementId) -> EventResult {
        let event = self.locks.release(&mut self.elements, id, user)?;
        Ok(event.into_iter().collect())
    }

    /// Reclaim every lease that ran out at or before `now`.
    pub fn expire_leases(&mut self, now: Instant) -> Vec<CanvasEvent> {
        self.locks.expire(&mut self.elements, now)
    }

    // --- Annotations ---

    /// Pin a comment at `position`, attributed to the session's user.
    ///
    /// # Errors
    ///
    /// Returns `UnknownSession` if the session has not joined.
    pub fn add_annotation(&mut self, client_id: &Uuid, position: Point, text: &str, created_at: i64) -> EventResult {
        let presence = self.presence.require(client_id)?;
        let annotation = Annotation {
            id: Uuid::new_v4(),
            position,
            text: text.to_owned(),
            user_id: presence.user_id.clone(),
            user_name: presence.user_name.clone(),
            created_at,
        };
        let annotation = self.annotations.add(annotation).clone();
        Ok(vec![CanvasEvent::CommentAdded { annotation }])
    }

    /// # Errors
    ///
    /// Returns `AnnotationNotFound` or `NotAnnotationAuthor`.
    pub fn remove_annotation(&mut self, user: &str, id: &Uuid) -> EventResult {
        self.annotations.remove(id, user)?;
        Ok(vec![CanvasEvent::CommentRemoved { annotation_id: *id }])
    }
}
