//! Classroom Core
//!
//! A scripted teaching dialog between a human teacher, a simulated student
//! and a supervising professor, plus the outbound gateway that serializes
//! and rate-limits every call to the upstream language model.

pub mod agent;
pub mod config;
pub mod error;
pub mod gateway;
pub mod gemini;
pub mod message;
pub mod orchestrator;
pub mod persona;
pub mod text;
pub mod transcript;
pub mod transport;
