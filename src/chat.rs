//! Follow-up questions about the image currently on screen.

use serde::{Deserialize, Serialize};
use tracing::{debug, info};

use crate::state::RequestToken;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ChatRole {
    User,
    Ai,
}

impl ChatRole {
    pub fn as_str(&self) -> &'static str {
        match self {
            ChatRole::User => "user",
            ChatRole::Ai => "ai",
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ChatMessage {
    pub role: ChatRole,
    pub text: String,
}

/// A question that has been sent and is waiting for its answer
#[derive(Debug, Clone)]
pub struct PendingQuestion {
    pub token: RequestToken,
    pub question: String,
    pub image_path: String,
}

/// Question input, transcript and in-flight flag
#[derive(Debug, Default)]
pub struct ChatController {
    messages: Vec<ChatMessage>,
    input: String,
    asking: bool,
}

impl ChatController {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn set_input(&mut self, text: impl Into<String>) {
        self.input = text.into();
    }

    pub fn input(&self) -> &str {
        &self.input
    }

    pub fn is_asking(&self) -> bool {
        self.asking
    }

    pub fn messages(&self) -> &[ChatMessage] {
        &self.messages
    }

    /// Ask is enabled with a non-blank question, an image in scope and no
    /// question in flight
    pub fn can_ask(&self, image_path: Option<&str>) -> bool {
        !self.asking && image_path.is_some() && !self.input.trim().is_empty()
    }

    /// Move the input into the transcript and mark a question in flight.
    ///
    /// Returns `None` (and changes nothing) when asking is not possible.
    pub fn begin(&mut self, image_path: Option<&str>, token: RequestToken) -> Option<PendingQuestion> {
        let question = self.input.trim().to_string();
        let image_path = match image_path {
            Some(path) if !question.is_empty() && !self.asking => path.to_string(),
            _ => {
                debug!("Ask ignored: no question, no image, or a question in flight");
                return None;
            }
        };

        info!("Asking question ({} chars)", question.len());
        self.push(ChatRole::User, question.clone());
        self.input.clear();
        self.asking = true;

        Some(PendingQuestion {
            token,
            question,
            image_path,
        })
    }

    /// Re-enable Ask; runs whatever the outcome
    pub fn finish(&mut self) {
        self.asking = false;
    }

    /// Append the answer, or the error shown in its place, as an AI message
    pub fn record_reply(&mut self, text: impl Into<String>) {
        self.push(ChatRole::Ai, text.into());
    }

    pub fn clear(&mut self) {
        self.messages.clear();
    }

    fn push(&mut self, role: ChatRole, text: String) {
        self.messages.push(ChatMessage { role, text });
    }
}
