//! Services used by the websocket and HTTP routes.
//!
//! ARCHITECTURE
//! ============
//! Service modules own canvas lifecycle, mutation fan-out and the lease
//! sweeper so route handlers can stay focused on protocol translation.

pub mod canvas;
pub mod lease;
