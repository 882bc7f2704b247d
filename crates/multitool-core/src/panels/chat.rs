use serde::{Deserialize, Serialize};
use tracing::{debug, warn};

use super::RequestState;
use crate::error::Result;
use crate::gateway::Gateway;

pub const GREETING: &str = "Hello! How can I help you today?";

/// A chat message in the AI conversation
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ChatMessage {
    pub role: ChatRole,
    pub text: String,
}

impl ChatMessage {
    pub fn user(text: impl Into<String>) -> Self {
        Self {
            role: ChatRole::User,
            text: text.into(),
        }
    }

    pub fn model(text: impl Into<String>) -> Self {
        Self {
            role: ChatRole::Model,
            text: text.into(),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ChatRole {
    User,
    Model,
}

/// Append-only conversation with at most one outstanding request
#[derive(Debug, Clone)]
pub struct ChatPanel {
    messages: Vec<ChatMessage>,
    request: RequestState,
}

impl Default for ChatPanel {
    fn default() -> Self {
        Self::new()
    }
}

impl ChatPanel {
    pub fn new() -> Self {
        Self {
            messages: vec![ChatMessage::model(GREETING)],
            request: RequestState::Idle,
        }
    }

    pub fn messages(&self) -> &[ChatMessage] {
        &self.messages
    }

    pub fn request(&self) -> &RequestState {
        &self.request
    }

    pub fn is_loading(&self) -> bool {
        self.request.is_in_flight()
    }

    /// Record the user's message and return the prompt to send, or `None`
    /// when the input is blank or a reply is still pending. The message is
    /// kept exactly as typed.
    pub fn begin(&mut self, input: &str) -> Option<String> {
        if input.trim().is_empty() || self.is_loading() {
            return None;
        }

        self.messages.push(ChatMessage::user(input));
        self.request = RequestState::InFlight;
        Some(input.to_string())
    }

    /// Apply the gateway result. Always appends exactly one model message and
    /// leaves the loading state. Returns false if nothing was pending.
    pub fn complete(&mut self, result: Result<String>) -> bool {
        if !self.is_loading() {
            warn!("Chat reply arrived with no request pending, dropping it");
            return false;
        }

        match result {
            Ok(reply) => {
                debug!(chars = reply.len(), "Chat reply received");
                self.messages.push(ChatMessage::model(reply));
                self.request = RequestState::Succeeded;
            }
            Err(e) => {
                if e.is_validation() {
                    debug!(error = %e, "Chat request rejected");
                } else {
                    warn!(error = %e, "Chat request failed");
                }
                self.messages.push(ChatMessage::model(format!(
                    "Sorry, I couldn't get a response: {}",
                    e
                )));
                self.request = RequestState::Failed(e.to_string());
            }
        }
        true
    }

    /// `begin`, call the gateway, `complete`.
    pub async fn send(&mut self, gateway: &dyn Gateway, input: &str) -> bool {
        let Some(prompt) = self.begin(input) else {
            return false;
        };
        let result = gateway.generate_text(&prompt).await;
        self.complete(result)
    }
}
