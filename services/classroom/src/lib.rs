//! Classroom Service Library Crate
//!
//! Hosts one dialog orchestrator per WebSocket connection and streams its
//! visible state to the browser. All connections share a single outbound
//! gateway, so calls to the language model stay serialized process-wide.

pub mod config;
pub mod router;
pub mod state;
pub mod ws;
