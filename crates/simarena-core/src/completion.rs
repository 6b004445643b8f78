//! The seam between the engine and a language-model backend.
//!
//! The engine only ever sees [`CompletionClient`]. The HTTP implementation
//! lives in `simarena-llm`; tests use scripted in-memory clients.

use std::future::Future;

use serde::{Deserialize, Serialize};

/// Speaker of a chat message.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ChatRole {
    /// Instructions and context.
    System,
    /// The request for this turn.
    User,
    /// Model output.
    Assistant,
}

/// A single message in a chat completion request.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ChatMessage {
    /// Who is speaking.
    pub role: ChatRole,
    /// Message text.
    pub content: String,
}

impl ChatMessage {
    /// A system message.
    pub fn system(content: impl Into<String>) -> Self {
        Self {
            role: ChatRole::System,
            content: content.into(),
        }
    }

    /// A user message.
    pub fn user(content: impl Into<String>) -> Self {
        Self {
            role: ChatRole::User,
            content: content.into(),
        }
    }
}

/// A rendered two-part prompt: system context plus the user instruction.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RenderedPrompt {
    /// System message text.
    pub system: String,
    /// User message text.
    pub user: String,
}

impl RenderedPrompt {
    /// The ordered message list to send to the backend.
    pub fn messages(&self) -> Vec<ChatMessage> {
        vec![
            ChatMessage::system(self.system.clone()),
            ChatMessage::user(self.user.clone()),
        ]
    }
}

/// Errors returned by a completion backend.
#[derive(Debug, thiserror::Error)]
pub enum CompletionError {
    /// The request never produced a response (connect, timeout, broken body).
    #[error("transport error: {0}")]
    Transport(String),

    /// The backend answered with a non-success status.
    #[error("LLM API error {status}: {body}")]
    Status {
        /// HTTP status code.
        status: u16,
        /// Response body, verbatim.
        body: String,
    },

    /// The response body could not be decoded.
    #[error("malformed response: {0}")]
    Malformed(String),

    /// The response decoded but contained no choices.
    #[error("no choices in response")]
    EmptyChoices,

    /// Every attempt failed; carries the last failure.
    #[error("{operation} failed after retries: {last}")]
    Exhausted {
        /// Which operation gave up.
        operation: &'static str,
        /// How many attempts were made.
        attempts: u32,
        /// The error from the final attempt.
        last: Box<Self>,
    },
}

/// A chat-completion backend.
///
/// Both operations retry internally; an `Err` means the backend has already
/// given up. A `token_budget` of 0 means no cap on the response length.
pub trait CompletionClient: Send + Sync + 'static {
    /// Stream a completion and return the accumulated text.
    fn complete_streaming(
        &self,
        messages: &[ChatMessage],
        token_budget: u32,
    ) -> impl Future<Output = Result<String, CompletionError>> + Send;

    /// Request a completion in one response.
    fn complete_blocking(
        &self,
        messages: &[ChatMessage],
        token_budget: u32,
    ) -> impl Future<Output = Result<String, CompletionError>> + Send;
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn prompt_yields_system_then_user() {
        let prompt = RenderedPrompt {
            system: String::from("ctx"),
            user: String::from("go"),
        };
        let messages = prompt.messages();
        assert_eq!(messages.len(), 2);
        assert_eq!(messages.first().map(|m| m.role), Some(ChatRole::System));
        assert_eq!(messages.get(1).map(|m| m.content.as_str()), Some("go"));
    }

    #[test]
    fn exhausted_error_names_the_operation() {
        let err = CompletionError::Exhausted {
            operation: "chat completion",
            attempts: 2,
            last: Box::new(CompletionError::Status {
                status: 500,
                body: String::from("boom"),
            }),
        };
        assert_eq!(
            err.to_string(),
            "chat completion failed after retries: LLM API error 500: boom"
        );
    }
}
