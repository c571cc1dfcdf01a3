//! Canvas controller: turns raw pointer input into canvas operations.
//!
//! One controller exists per connected session. It holds the active tool,
//! the zoom factor, and the gesture being tracked between pointer-down and
//! pointer-up. Each handler mutates the [`CanvasDoc`] through its public API
//! (so lock rules still apply) and returns the events to broadcast.
//!
//! Screen coordinates are CSS pixels; world coordinates are screen divided by
//! zoom. Every pointer event also republishes the session's cursor.

#[cfg(test)]
#[path = "controller_test.rs"]
mod controller_test;

use std::time::Instant;

use uuid::Uuid;

use super::doc::{CanvasDoc, EventResult};
use super::element::{ElementDraft, ElementId, ElementType, Point};
use super::error::CanvasError;

/// Minimum zoom factor.
pub const MIN_ZOOM: f64 = 0.1;

/// Maximum zoom factor.
pub const MAX_ZOOM: f64 = 5.0;

/// Which tool is currently active.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum Tool {
    /// Pointer / selection tool (default).
    #[default]
    Select,
    /// Insert a rectangle.
    Rectangle,
    /// Insert a text element.
    Text,
}

impl Tool {
    /// Parse the wire name of a tool.
    #[must_use]
    pub fn parse(raw: &str) -> Option<Self> {
        match raw {
            "select" => Some(Self::Select),
            "rectangle" => Some(Self::Rectangle),
            "text" => Some(Self::Text),
            _ => None,
        }
    }

    #[must_use]
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Select => "select",
            Self::Rectangle => "rectangle",
            Self::Text => "text",
        }
    }

    /// The element type this tool draws, if it draws one.
    #[must_use]
    pub fn element_type(self) -> Option<ElementType> {
        match self {
            Self::Select => None,
            Self::Rectangle => Some(ElementType::Rectangle),
            Self::Text => Some(ElementType::Text),
        }
    }
}

/// The gesture tracked between pointer-down and pointer-up.
#[derive(Debug, Clone, Copy, PartialEq, Default)]
pub enum Gesture {
    /// No gesture in progress; waiting for the next pointer-down.
    #[default]
    Idle,
    /// Dragging an existing element.
    Selecting {
        element_id: ElementId,
        /// Screen-space pointer position minus the element's scaled position at pointer-down.
        drag_offset: Point,
    },
    /// A new element was just inserted; waiting for pointer-up.
    Drawing { element_id: ElementId },
}

impl Gesture {
    #[must_use]
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Idle => "idle",
            Self::Selecting { .. } => "selecting",
            Self::Drawing { .. } => "drawing",
        }
    }

    /// The element the gesture is acting on, if any.
    #[must_use]
    pub fn element_id(&self) -> Option<ElementId> {
        match self {
            Self::Idle => None,
            Self::Selecting { element_id, .. } | Self::Drawing { element_id } => Some(*element_id),
        }
    }
}

/// Identity of the session driving the controller.
#[derive(Debug, Clone, Copy)]
pub struct Actor<'a> {
    pub client_id: Uuid,
    pub user_id: &'a str,
}

#[derive(Debug, Clone)]
pub struct CanvasController {
    tool: Tool,
    zoom: f64,
    gesture: Gesture,
}

impl Default for CanvasController {
    fn default() -> Self {
        Self { tool: Tool::default(), zoom: 1.0, gesture: Gesture::Idle }
    }
}

impl CanvasController {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    #[must_use]
    pub fn tool(&self) -> Tool {
        self.tool
    }

    pub fn set_tool(&mut self, tool: Tool) {
        self.tool = tool;
    }

    #[must_use]
    pub fn zoom(&self) -> f64 {
        self.zoom
    }

    /// Set the zoom factor, clamped to `[MIN_ZOOM, MAX_ZOOM]`. Non-finite input is ignored.
    pub fn set_zoom(&mut self, zoom: f64) {
        if zoom.is_finite() {
            self.zoom = zoom.clamp(MIN_ZOOM, MAX_ZOOM);
        }
    }

    #[must_use]
    pub fn gesture(&self) -> Gesture {
        self.gesture
    }

    /// Abandon any gesture in progress (e.g. when the session leaves the canvas).
    pub fn reset(&mut self) {
        self.gesture = Gesture::Idle;
    }

    /// Convert a screen-space point to world coordinates.
    #[must_use]
    pub fn screen_to_world(&self, screen: Point) -> Point {
        screen.div(self.zoom)
    }

    /// Pointer pressed.
    ///
    /// With the select tool, starts dragging the topmost element under the
    /// pointer, or clears the selection over empty canvas. With a drawing tool,
    /// inserts a new element at the pointer.
    ///
    /// # Errors
    ///
    /// Returns `LockConflict` (gesture stays idle, nothing changes) when the
    /// element under the pointer is locked by another user, or `UnknownSession`.
    pub fn pointer_down(&mut self, doc: &mut CanvasDoc, actor: Actor<'_>, screen: Point, now: Instant) -> EventResult {
        // A missed pointer-up leaves a stale gesture behind; start over.
        self.gesture = Gesture::Idle;
        let world = self.screen_to_world(screen);
        doc.presence().require(&actor.client_id)?;

        let mut events = Vec::new();
        match self.tool.element_type() {
            Some(kind) => {
                let (element_id, created) = doc.create_element(actor.user_id, ElementDraft::new(kind, world), now);
                events.extend(created);
                self.gesture = Gesture::Drawing { element_id };
            }
            None => {
                let hit = doc
                    .elements()
                    .hit_test(world)
                    .map(|el| (el.id, el.position));
                match hit {
                    Some((element_id, position)) => {
                        let selected = doc.select(&actor.client_id, Some(element_id), now)?;
                        events.extend(selected);
                        let drag_offset = screen.sub(position.scale(self.zoom));
                        self.gesture = Gesture::Selecting { element_id, drag_offset };
                    }
                    None => {
                        let has_selection = doc
                            .presence()
                            .get(&actor.client_id)
                            .is_some_and(|p| p.selected_element.is_some());
                        if has_selection {
                            events.extend(doc.select(&actor.client_id, None, now)?);
                        }
                    }
                }
            }
        }

        events.extend(doc.move_cursor(&actor.client_id, Some(world), now)?);
        Ok(events)
    }

    /// Pointer moved.
    ///
    /// While dragging, moves the element to `(pointer - drag_offset) / zoom`.
    /// The move is skipped silently if another user has locked the element
    /// since the drag began; the drag ends if the element was deleted.
    ///
    /// # Errors
    ///
    /// Returns `UnknownSession` if the session has not joined.
    pub fn pointer_move(&mut self, doc: &mut CanvasDoc, actor: Actor<'_>, screen: Point, now: Instant) -> EventResult {
        let world = self.screen_to_world(screen);
        let mut events = doc.move_cursor(&actor.client_id, Some(world), now)?;

        if let Gesture::Selecting { element_id, drag_offset } = self.gesture {
            let position = screen.sub(drag_offset).div(self.zoom);
            match doc.move_element(actor.user_id, &element_id, position, now) {
                Ok(moved) => events.extend(moved),
                Err(CanvasError::LockConflict { .. }) => {}
                Err(CanvasError::ElementNotFound(_)) => self.gesture = Gesture::Idle,
                Err(e) => return Err(e),
            }
        }
        Ok(events)
    }

    /// Pointer released. Ends any gesture.
    ///
    /// # Errors
    ///
    /// Returns `UnknownSession` if the session has not joined.
    pub fn pointer_up(&mut self, doc: &mut CanvasDoc, actor: Actor<'_>, screen: Point, now: Instant) -> EventResult {
        self.gesture = Gesture::Idle;
        let world = self.screen_to_world(screen);
        doc.move_cursor(&actor.client_id, Some(world), now)
    }
}
