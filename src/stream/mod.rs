//! Chunked upload protocol over a single WebSocket connection.
//!
//! The protocol itself lives in [`session`] as a pure state machine; the
//! [`handler`] module wires it to axum's socket type and the watermark
//! pipeline.

pub mod handler;
pub mod session;

pub use session::{Action, Frame, SessionError, SessionLimits, StreamSession};
