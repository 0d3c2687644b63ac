//! Collaborator traits and implementations.
//!
//! This module contains the external services the engine consumes:
//!
//! - [`email`] - Mail source (fetch unread, mark read, send reply)
//! - [`calendar`] - Busy-now calendar collaborator and availability helpers
//! - [`ai`] - AI/LLM providers (OpenAI-compatible, Anthropic)

pub mod ai;
pub mod calendar;
pub mod email;
