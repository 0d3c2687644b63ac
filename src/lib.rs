//! mailwatch - Mailbox monitoring and notification scheduling engine
//!
//! Polls a mail source on a schedule that respects active hours, quiet hours
//! and calendar meetings, summarizes new messages through a failover chain of
//! LLM providers, and drives a notification popup for a host UI.
//!
//! The entry point is [`MonitorEngine`]; hosts supply the collaborators
//! (mail, calendar, providers, clock) and consume [`services::UiEvent`]s.

pub mod app;
pub mod config;
pub mod domain;
pub mod logging;
pub mod providers;
pub mod services;
pub mod storage;

pub use app::{Collaborators, EngineError, MonitorEngine, UiCommand};
