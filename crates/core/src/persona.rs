//! The student/professor persona backed by the [`Gateway`].

use crate::{
    agent::Agent,
    gateway::Gateway,
    message::{ChatMessage, Role},
};
use anyhow::{Context, Result};
use async_trait::async_trait;
use std::path::Path;
use tokio::sync::Mutex;
use tracing::{debug, info};

/// The teacher's line that opens every conversation.
pub const USER_OPENING_SENTENCE: &str = "Teacher (to the student): Hi! Today I'd like you to explain what you already know about our topic, and we'll work through it together.";

/// The student's scripted answer to the opening line.
pub const STUDENT_OPENING_SENTENCE: &str = "Student (to the teacher): Hi! I've read a little about it, but I'm honestly not sure I understand it yet.";

/// The standing request placed in the supervisor slot.
pub const SUPERVISOR_REQUEST: &str = "Please help the student learn the material.";

const DEFAULT_STUDENT_PROMPT: &str = include_str!("../prompts/student.md");
const DEFAULT_PROFESSOR_PROMPT: &str = include_str!("../prompts/professor.md");

/// System prompts for the two simulated roles.
#[derive(Debug, Clone)]
pub struct Personas {
    pub student_prompt: String,
    pub professor_prompt: String,
}

impl Default for Personas {
    fn default() -> Self {
        Self {
            student_prompt: DEFAULT_STUDENT_PROMPT.to_string(),
            professor_prompt: DEFAULT_PROFESSOR_PROMPT.to_string(),
        }
    }
}

impl Personas {
    /// Reads `student.md` and `professor.md` from `dir`, keeping the
    /// built-in prompt for any file that does not exist.
    pub fn load(dir: &Path) -> Result<Self> {
        let mut personas = Self::default();
        for (file, slot) in [
            ("student.md", &mut personas.student_prompt),
            ("professor.md", &mut personas.professor_prompt),
        ] {
            let path = dir.join(file);
            if path.is_file() {
                *slot = std::fs::read_to_string(&path)
                    .with_context(|| format!("Failed to read prompt {}", path.display()))?;
                info!(path = %path.display(), "Loaded persona prompt");
            }
        }
        Ok(personas)
    }
}

/// Splits a reply into the parts delivered as separate chat bubbles.
///
/// Parts are separated by blank lines. A reply with no visible text is
/// returned as a single part so the caller always has something to show.
pub fn split_reply(reply: &str) -> Vec<String> {
    let mut parts = Vec::new();
    let mut current: Vec<&str> = Vec::new();
    for line in reply.lines() {
        if line.trim().is_empty() {
            if !current.is_empty() {
                parts.push(current.join("\n"));
                current.clear();
            }
        } else {
            current.push(line.trim_end());
        }
    }
    if !current.is_empty() {
        parts.push(current.join("\n"));
    }
    if parts.is_empty() {
        parts.push(reply.trim().to_string());
    }
    parts
}

/// A simulated student whose history starts with the scripted opening exchange.
pub struct ClassroomAgent {
    gateway: Gateway,
    personas: Personas,
    history: Mutex<Vec<ChatMessage>>,
}

impl ClassroomAgent {
    pub fn new(gateway: Gateway, personas: Personas) -> Self {
        let history = vec![
            ChatMessage::system(personas.student_prompt.clone()),
            ChatMessage::user(USER_OPENING_SENTENCE),
            ChatMessage::assistant(STUDENT_OPENING_SENTENCE),
        ];
        Self {
            gateway,
            personas,
            history: Mutex::new(history),
        }
    }

    /// A snapshot of the running history.
    pub async fn history(&self) -> Vec<ChatMessage> {
        self.history.lock().await.clone()
    }
}

#[async_trait]
impl Agent for ClassroomAgent {
    async fn generate_reply(&self) -> Result<Vec<String>> {
        let payload = self.history.lock().await.clone();
        let reply = self
            .gateway
            .enqueue(payload)
            .await
            .context("Student reply failed")?;
        self.history
            .lock()
            .await
            .push(ChatMessage::assistant(reply.clone()));

        let parts = split_reply(&reply);
        debug!(parts = parts.len(), "Student reply received");
        Ok(parts)
    }

    async fn generate_help_reply(&self) -> Result<String> {
        let mut payload = vec![ChatMessage::system(self.personas.professor_prompt.clone())];
        payload.extend(
            self.history
                .lock()
                .await
                .iter()
                .filter(|m| m.role != Role::System)
                .cloned(),
        );
        payload.push(ChatMessage::user(format!("Supervisor: {SUPERVISOR_REQUEST}")));

        self.gateway
            .enqueue(payload)
            .await
            .context("Professor help reply failed")
    }

    async fn append_message(&self, message: ChatMessage) {
        self.history.lock().await.push(message);
    }
}
