//! Element store: the shared elements of one canvas.
//!
//! Elements are keyed by id with a side list recording insertion order, so
//! draw order is `(z_index, insertion)`. Every mutation goes through
//! [`ElementStore::update`] or [`ElementStore::remove`], which enforce the
//! lock rule: only the lock holder may touch a locked element.

#[cfg(test)]
#[path = "store_test.rs"]
mod store_test;

use std::collections::HashMap;

use super::element::{CanvasElement, ElementDraft, ElementId, ElementPatch, Point, UserId};
use super::error::CanvasError;

#[derive(Debug, Default)]
pub struct ElementStore {
    elements: HashMap<ElementId, CanvasElement>,
    order: Vec<ElementId>,
}

impl ElementStore {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    #[must_use]
    pub fn len(&self) -> usize {
        self.elements.len()
    }

    #[cfg(test)]
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.elements.is_empty()
    }

    #[must_use]
    pub fn get(&self, id: &ElementId) -> Option<&CanvasElement> {
        self.elements.get(id)
    }

    pub(super) fn get_mut(&mut self, id: &ElementId) -> Option<&mut CanvasElement> {
        self.elements.get_mut(id)
    }

    /// Look up an element or fail with `ElementNotFound`.
    ///
    /// # Errors
    ///
    /// Returns `ElementNotFound` if no element has this id.
    pub fn require(&self, id: &ElementId) -> Result<&CanvasElement, CanvasError> {
        self.get(id).ok_or(CanvasError::ElementNotFound(*id))
    }

    /// Look up an element that `user` is allowed to mutate.
    ///
    /// # Errors
    ///
    /// Returns `ElementNotFound`, or `LockConflict` if another user holds the lock.
    pub fn require_writable(&self, id: &ElementId, user: &str) -> Result<&CanvasElement, CanvasError> {
        let element = self.require(id)?;
        if element.is_writable_by(user) {
            return Ok(element);
        }
        let holder = element.locked_by().unwrap_or_default().to_owned();
        Err(CanvasError::LockConflict { element_id: *id, holder })
    }

    /// Insert a new element on top of the current stack.
    pub fn insert(&mut self, draft: ElementDraft, created_by: Option<UserId>) -> &CanvasElement {
        let z_index = i64::try_from(self.elements.len()).unwrap_or(i64::MAX);
        let element = CanvasElement::from_draft(draft, z_index, created_by);
        let id = element.id;
        self.order.push(id);
        self.elements.entry(id).or_insert(element)
    }

    /// Apply a patch on behalf of `user`.
    ///
    /// # Errors
    ///
    /// Returns `ElementNotFound`, `LockConflict` if another user holds the lock,
    /// or `StaleUpdate` if the patch carries a version older than the element's.
    pub fn update(&mut self, id: &ElementId, user: &str, patch: &ElementPatch) -> Result<&CanvasElement, CanvasError> {
        let current = self.require_writable(id, user)?.version;
        if let Some(incoming) = patch.version {
            if incoming < current {
                return Err(CanvasError::StaleUpdate { incoming, current });
            }
        }
        let element = self
            .elements
            .get_mut(id)
            .ok_or(CanvasError::ElementNotFound(*id))?;
        element.apply(patch);
        Ok(element)
    }

    /// Move an element to `position` on behalf of `user`.
    ///
    /// # Errors
    ///
    /// Same as [`ElementStore::update`].
    pub fn move_to(&mut self, id: &ElementId, user: &str, position: Point) -> Result<&CanvasElement, CanvasError> {
        self.update(id, user, &ElementPatch::position(position))
    }

    /// Delete an element on behalf of `user`.
    ///
    /// # Errors
    ///
    /// Returns `ElementNotFound`, or `LockConflict` if another user holds the lock.
    pub fn remove(&mut self, id: &ElementId, user: &str) -> Result<CanvasElement, CanvasError> {
        self.require_writable(id, user)?;
        self.order.retain(|other| other != id);
        self.elements
            .remove(id)
            .ok_or(CanvasError::ElementNotFound(*id))
    }

    /// Elements in draw order: ascending `z_index`, insertion order on ties.
    #[must_use]
    pub fn sorted(&self) -> Vec<&CanvasElement> {
        let mut out: Vec<&CanvasElement> = self
            .order
            .iter()
            .filter_map(|id| self.elements.get(id))
            .collect();
        // Stable sort keeps insertion order within equal z.
        out.sort_by_key(|el| el.z_index);
        out
    }

    /// Topmost visible element containing a world-space point.
    #[must_use]
    pub fn hit_test(&self, point: Point) -> Option<&CanvasElement> {
        self.sorted()
            .into_iter()
            .rev()
            .find(|el| el.visible && el.contains(point))
    }

    #[cfg(test)]
    pub fn iter(&self) -> impl Iterator<Item = &CanvasElement> {
        self.elements.values()
    }
}
