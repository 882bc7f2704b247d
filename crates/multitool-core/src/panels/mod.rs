//! UI-agnostic panel state
//!
//! Each panel owns its state exclusively and changes it only through named
//! operations. Nothing here depends on a UI framework, so the TUI and the
//! one-shot subcommands share the same behaviour.

mod chat;
mod image_editor;
mod tasks;

#[cfg(test)]
mod testing;

pub use chat::{ChatMessage, ChatPanel, ChatRole};
pub use image_editor::{EditJob, ImageEditor, LoadedImage};
pub use tasks::{Task, TaskList};

/// Progress of a panel's single outstanding gateway call
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub enum RequestState {
    #[default]
    Idle,
    InFlight,
    Succeeded,
    Failed(String),
}

impl RequestState {
    pub fn is_in_flight(&self) -> bool {
        matches!(self, RequestState::InFlight)
    }

    pub fn error(&self) -> Option<&str> {
        match self {
            RequestState::Failed(reason) => Some(reason),
            _ => None,
        }
    }
}
