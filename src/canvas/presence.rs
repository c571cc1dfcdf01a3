//! Presence store: who is connected, where their cursor is and what they selected.
//!
//! Presence is keyed by session (`client_id`), not user: one user with two
//! tabs open shows up twice. Records are created on join and dropped on part.

use std::collections::HashMap;

use serde::{Deserialize, Serialize};
use uuid::Uuid;

use super::element::{ElementId, Point, UserId};
use super::error::CanvasError;

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Presence {
    pub client_id: Uuid,
    pub user_id: UserId,
    pub user_name: String,
    pub color: String,
    pub cursor: Option<Point>,
    pub selected_element: Option<ElementId>,
}

impl Presence {
    #[must_use]
    pub fn new(client_id: Uuid, user_id: impl Into<UserId>, user_name: impl Into<String>, color: impl Into<String>) -> Self {
        Self {
            client_id,
            user_id: user_id.into(),
            user_name: user_name.into(),
            color: color.into(),
            cursor: None,
            selected_element: None,
        }
    }
}

#[derive(Debug, Default)]
pub struct PresenceStore {
    sessions: HashMap<Uuid, Presence>,
}

impl PresenceStore {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    #[cfg(test)]
    #[must_use]
    pub fn len(&self) -> usize {
        self.sessions.len()
    }

    #[cfg(test)]
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.sessions.is_empty()
    }

    #[must_use]
    pub fn get(&self, client_id: &Uuid) -> Option<&Presence> {
        self.sessions.get(client_id)
    }

    /// Look up a session or fail with `UnknownSession`.
    ///
    /// # Errors
    ///
    /// Returns `UnknownSession` if the session has not joined.
    pub fn require(&self, client_id: &Uuid) -> Result<&Presence, CanvasError> {
        self.sessions
            .get(client_id)
            .ok_or(CanvasError::UnknownSession(*client_id))
    }

    /// Register a session. Rejoining replaces the previous record.
    pub fn connect(&mut self, presence: Presence) -> &Presence {
        let client_id = presence.client_id;
        self.sessions.insert(client_id, presence);
        &self.sessions[&client_id]
    }

    pub fn disconnect(&mut self, client_id: &Uuid) -> Option<Presence> {
        self.sessions.remove(client_id)
    }

    /// # Errors
    ///
    /// Returns `UnknownSession` if the session has not joined.
    pub fn set_cursor(&mut self, client_id: &Uuid, cursor: Option<Point>) -> Result<&Presence, CanvasError> {
        let presence = self
            .sessions
            .get_mut(client_id)
            .ok_or(CanvasError::UnknownSession(*client_id))?;
        presence.cursor = cursor;
        Ok(presence)
    }

    /// # Errors
    ///
    /// Returns `UnknownSession` if the session has not joined.
    pub fn select(&mut self, client_id: &Uuid, element: Option<ElementId>) -> Result<&Presence, CanvasError> {
        let presence = self
            .sessions
            .get_mut(client_id)
            .ok_or(CanvasError::UnknownSession(*client_id))?;
        presence.selected_element = element;
        Ok(presence)
    }

    /// Clear any selection pointing at a deleted element.
    pub fn clear_selection_of(&mut self, element: &ElementId) {
        for presence in self.sessions.values_mut() {
            if presence.selected_element.as_ref() == Some(element) {
                presence.selected_element = None;
            }
        }
    }

    /// Whether any session of `user` is still connected.
    #[must_use]
    pub fn has_user(&self, user: &str) -> bool {
        self.sessions.values().any(|p| p.user_id == user)
    }

    /// All sessions, ordered by user name for stable snapshots.
    #[must_use]
    pub fn list(&self) -> Vec<&Presence> {
        let mut all: Vec<&Presence> = self.sessions.values().collect();
        all.sort_by(|a, b| a.user_name.cmp(&b.user_name).then(a.client_id.cmp(&b.client_id)));
        all
    }
}
