//! Comment pins placed on the canvas.

use serde::{Deserialize, Serialize};
use uuid::Uuid;

use super::element::{Point, UserId};
use super::error::CanvasError;

/// A comment pinned at a world-space position. Never edited after creation.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Annotation {
    pub id: Uuid,
    pub position: Point,
    pub text: String,
    pub user_id: UserId,
    pub user_name: String,
    /// Milliseconds since Unix epoch.
    pub created_at: i64,
}

#[derive(Debug, Default)]
pub struct AnnotationStore {
    items: Vec<Annotation>,
}

impl AnnotationStore {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    #[must_use]
    pub fn len(&self) -> usize {
        self.items.len()
    }

    #[cfg(test)]
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.items.is_empty()
    }

    pub fn add(&mut self, annotation: Annotation) -> &Annotation {
        self.items.push(annotation);
        &self.items[self.items.len() - 1]
    }

    /// Remove an annotation. Only its author may remove it.
    ///
    /// # Errors
    ///
    /// Returns `AnnotationNotFound`, or `NotAnnotationAuthor` for anyone else.
    pub fn remove(&mut self, id: &Uuid, user: &str) -> Result<Annotation, CanvasError> {
        let index = self
            .items
            .iter()
            .position(|a| a.id == *id)
            .ok_or(CanvasError::AnnotationNotFound(*id))?;
        if self.items[index].user_id != user {
            return Err(CanvasError::NotAnnotationAuthor(*id));
        }
        Ok(self.items.remove(index))
    }

    /// Annotations in creation order.
    #[must_use]
    pub fn list(&self) -> &[Annotation] {
        &self.items
    }
}
