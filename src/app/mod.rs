//! Engine assembly and the UI command surface.

mod actions;
mod engine;

pub use actions::UiCommand;
pub use engine::{configured_providers, Collaborators, EngineError, MonitorEngine, Result};
