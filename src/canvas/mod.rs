//! Collaborative canvas domain model.
//!
//! Everything in this module is synchronous and transport-free: it owns the
//! shared element store, the per-element lock table, session presence, and
//! comment annotations, and reports every change as a typed [`CanvasEvent`].
//! The service layer wraps a [`CanvasDoc`] in the app-wide lock and fans the
//! resulting events out to connected sessions.
//!
//! ## Module layout
//!
//! | Module | Role |
//! |--------|------|
//! | [`element`] | Element, geometry, draft and patch types |
//! | [`store`] | Element store with z-order and hit-testing |
//! | [`lock`] | Exclusive edit locks with renewable leases |
//! | [`presence`] | Per-session cursor and selection |
//! | [`annotation`] | Comment pins |
//! | [`event`] | Broadcast event payloads |
//! | [`doc`] | The [`CanvasDoc`] facade tying the stores together |
//! | [`controller`] | Pointer gesture state machine |

pub mod annotation;
pub mod controller;
pub mod doc;
pub mod element;
pub mod error;
pub mod event;
pub mod lock;
pub mod presence;
pub mod store;

pub use doc::CanvasDoc;
pub use error::CanvasError;
pub use event::CanvasEvent;
