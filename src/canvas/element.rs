//! Element model: geometry, element types, and the sparse update applied to them.
//!
//! `CanvasElement` is what lives in the store and goes over the wire.
//! `ElementDraft` carries the caller-supplied fields for a new element, and
//! `ElementPatch` is the sparse edit applied by `element:update` and drags.

#[cfg(test)]
#[path = "element_test.rs"]
mod element_test;

use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// Unique identifier for a canvas element.
pub type ElementId = Uuid;

/// Identity of a participant as supplied at connect time.
pub type UserId = String;

/// Free-form style map (CSS-like keys to JSON values).
pub type Styles = serde_json::Map<String, serde_json::Value>;

/// A point in either screen or world space.
#[derive(Debug, Clone, Copy, PartialEq, Default, Serialize, Deserialize)]
pub struct Point {
    pub x: f64,
    pub y: f64,
}

impl Point {
    #[must_use]
    pub fn new(x: f64, y: f64) -> Self {
        Self { x, y }
    }

    #[must_use]
    pub fn sub(self, other: Point) -> Point {
        Point::new(self.x - other.x, self.y - other.y)
    }

    #[must_use]
    pub fn scale(self, factor: f64) -> Point {
        Point::new(self.x * factor, self.y * factor)
    }

    #[must_use]
    pub fn div(self, divisor: f64) -> Point {
        Point::new(self.x / divisor, self.y / divisor)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Size {
    pub width: f64,
    pub height: f64,
}

impl Size {
    #[must_use]
    pub fn new(width: f64, height: f64) -> Self {
        Self { width, height }
    }
}

/// The kind of a canvas element.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ElementType {
    Rectangle,
    Text,
    Image,
    Button,
    Input,
}

impl ElementType {
    /// Parse the wire name of an element type.
    #[must_use]
    pub fn parse(raw: &str) -> Option<Self> {
        match raw {
            "rectangle" => Some(Self::Rectangle),
            "text" => Some(Self::Text),
            "image" => Some(Self::Image),
            "button" => Some(Self::Button),
            "input" => Some(Self::Input),
            _ => None,
        }
    }

    #[cfg(test)]
    #[must_use]
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Rectangle => "rectangle",
            Self::Text => "text",
            Self::Image => "image",
            Self::Button => "button",
            Self::Input => "input",
        }
    }

    /// Size given to a freshly inserted element when the caller omits one.
    #[must_use]
    pub fn default_size(self) -> Size {
        match self {
            Self::Rectangle => Size::new(100.0, 100.0),
            Self::Text => Size::new(200.0, 40.0),
            Self::Image => Size::new(200.0, 150.0),
            Self::Button => Size::new(120.0, 40.0),
            Self::Input => Size::new(200.0, 36.0),
        }
    }

    /// Styles given to a freshly inserted element when the caller omits them.
    #[must_use]
    pub fn default_styles(self) -> Styles {
        let value = match self {
            Self::Rectangle => serde_json::json!({
                "backgroundColor": "#3b82f6",
                "borderRadius": "4px",
            }),
            Self::Text => serde_json::json!({
                "fontSize": "16px",
                "color": "#000000",
            }),
            Self::Image => serde_json::json!({
                "objectFit": "cover",
            }),
            Self::Button => serde_json::json!({
                "backgroundColor": "#3b82f6",
                "color": "#ffffff",
                "borderRadius": "6px",
            }),
            Self::Input => serde_json::json!({
                "border": "1px solid #d1d5db",
                "borderRadius": "4px",
            }),
        };
        match value {
            serde_json::Value::Object(map) => map,
            _ => Styles::new(),
        }
    }

    /// Text payload given to a freshly inserted element, if the type carries one.
    #[must_use]
    pub fn default_content(self) -> Option<String> {
        match self {
            Self::Text => Some("Text".into()),
            Self::Button => Some("Button".into()),
            Self::Rectangle | Self::Image | Self::Input => None,
        }
    }
}

/// An element as stored on the canvas and sent on the wire.
///
/// The lock fields are private: `locked` and `locked_by` only change together
/// through [`CanvasElement::set_lock`], so `locked == locked_by.is_some()`
/// holds for every element the store hands out.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CanvasElement {
    pub id: ElementId,
    #[serde(rename = "type")]
    pub kind: ElementType,
    pub position: Point,
    pub size: Size,
    pub styles: Styles,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub content: Option<String>,
    locked: bool,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    locked_by: Option<UserId>,
    pub visible: bool,
    /// Stacking order; ties are broken by insertion order in the store.
    pub z_index: i64,
    /// Bumped on every geometry or content edit. Lock changes leave it alone.
    pub version: u64,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub created_by: Option<UserId>,
}

impl CanvasElement {
    /// Build a new unlocked, visible element from a draft.
    #[must_use]
    pub fn from_draft(draft: ElementDraft, z_index: i64, created_by: Option<UserId>) -> Self {
        Self {
            id: Uuid::new_v4(),
            kind: draft.kind,
            position: draft.position,
            size: draft.size.unwrap_or_else(|| draft.kind.default_size()),
            styles: draft.styles.unwrap_or_else(|| draft.kind.default_styles()),
            content: draft.content.or_else(|| draft.kind.default_content()),
            locked: false,
            locked_by: None,
            visible: true,
            z_index,
            version: 1,
            created_by,
        }
    }

    #[must_use]
    pub fn is_locked(&self) -> bool {
        self.locked
    }

    #[must_use]
    pub fn locked_by(&self) -> Option<&str> {
        self.locked_by.as_deref()
    }

    /// Whether `user` may mutate this element: unlocked, or locked by `user`.
    #[must_use]
    pub fn is_writable_by(&self, user: &str) -> bool {
        self.locked_by.as_deref().is_none_or(|holder| holder == user)
    }

    /// Set or clear the lock owner. The only writer of both lock fields.
    pub(super) fn set_lock(&mut self, owner: Option<UserId>) {
        self.locked = owner.is_some();
        self.locked_by = owner;
    }

    /// Whether a world-space point falls inside this element's bounding box.
    #[must_use]
    pub fn contains(&self, point: Point) -> bool {
        point.x >= self.position.x
            && point.x <= self.position.x + self.size.width
            && point.y >= self.position.y
            && point.y <= self.position.y + self.size.height
    }

    /// Apply a sparse patch and bump the version.
    pub(super) fn apply(&mut self, patch: &ElementPatch) {
        if let Some(x) = patch.x {
            self.position.x = x;
        }
        if let Some(y) = patch.y {
            self.position.y = y;
        }
        if let Some(w) = patch.width {
            self.size.width = w;
        }
        if let Some(h) = patch.height {
            self.size.height = h;
        }
        if let Some(styles) = &patch.styles {
            // Null values delete keys.
            for (key, value) in styles {
                if value.is_null() {
                    self.styles.remove(key);
                } else {
                    self.styles.insert(key.clone(), value.clone());
                }
            }
        }
        if let Some(content) = &patch.content {
            self.content = Some(content.clone());
        }
        if let Some(visible) = patch.visible {
            self.visible = visible;
        }
        if let Some(z) = patch.z_index {
            self.z_index = z;
        }
        self.version += 1;
    }
}

/// Caller-supplied fields for a new element. Omitted fields take type defaults.
#[derive(Debug, Clone, PartialEq)]
pub struct ElementDraft {
    pub kind: ElementType,
    pub position: Point,
    pub size: Option<Size>,
    pub styles: Option<Styles>,
    pub content: Option<String>,
}

impl ElementDraft {
    #[must_use]
    pub fn new(kind: ElementType, position: Point) -> Self {
        Self { kind, position, size: None, styles: None, content: None }
    }

    #[must_use]
    pub fn with_size(mut self, size: Size) -> Self {
        self.size = Some(size);
        self
    }

    #[must_use]
    pub fn with_styles(mut self, styles: Styles) -> Self {
        self.styles = Some(styles);
        self
    }

    #[must_use]
    pub fn with_content(mut self, content: impl Into<String>) -> Self {
        self.content = Some(content.into());
        self
    }
}

/// Sparse update for an element. Only present fields are applied.
///
/// `version`, when present, is the version the caller last saw; the store
/// rejects the patch if the element has moved past it.
#[derive(Debug, Clone, Default, PartialEq, Deserialize)]
#[serde(default)]
pub struct ElementPatch {
    pub x: Option<f64>,
    pub y: Option<f64>,
    pub width: Option<f64>,
    pub height: Option<f64>,
    pub styles: Option<Styles>,
    pub content: Option<String>,
    pub visible: Option<bool>,
    pub z_index: Option<i64>,
    pub version: Option<u64>,
}

impl ElementPatch {
    /// A patch that only moves the element.
    #[must_use]
    pub fn position(point: Point) -> Self {
        Self { x: Some(point.x), y: Some(point.y), ..Self::default() }
    }
}
