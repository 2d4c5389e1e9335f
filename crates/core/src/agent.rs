//! The seam between the dialog orchestrator and whatever produces replies.

use crate::message::ChatMessage;
use anyhow::Result;
use async_trait::async_trait;

/// A stateful persona that produces LLM-backed turns from its own history.
#[cfg_attr(test, mockall::automock)]
#[async_trait]
pub trait Agent: Send + Sync {
    /// Produces the student's next reply as one or more sequential parts.
    async fn generate_reply(&self) -> Result<Vec<String>>;

    /// Produces a one-shot supervisor explanation of the conversation so far.
    async fn generate_help_reply(&self) -> Result<String>;

    /// Records a message in the running history without calling the model.
    async fn append_message(&self, message: ChatMessage);
}
