//! Wire types for the `generateContent` endpoint.
//!
//! The upstream API requires alternating turns, so consecutive messages from
//! the same side are merged into a single [`Content`] with several parts.

use crate::message::{ChatMessage, Role};
use serde::{Deserialize, Serialize};

#[derive(Serialize, Deserialize, Debug, Clone, PartialEq, Eq)]
pub struct Content {
    pub role: String,
    pub parts: Vec<Part>,
}

#[derive(Serialize, Deserialize, Debug, Clone, PartialEq, Eq)]
pub struct Part {
    pub text: String,
}

#[derive(Serialize, Debug)]
pub struct GenerateContentRequest {
    pub contents: Vec<Content>,
}

#[derive(Deserialize, Debug, Default)]
pub struct GenerateContentResponse {
    #[serde(default)]
    pub candidates: Vec<Candidate>,
}

#[derive(Deserialize, Debug)]
pub struct Candidate {
    pub content: Option<CandidateContent>,
}

#[derive(Deserialize, Debug)]
pub struct CandidateContent {
    #[serde(default)]
    pub parts: Vec<CandidatePart>,
}

#[derive(Deserialize, Debug)]
pub struct CandidatePart {
    pub text: Option<String>,
}

impl GenerateContentResponse {
    /// Returns `candidates[0].content.parts[0].text`, if the path exists.
    pub fn first_text(&self) -> Option<&str> {
        self.candidates
            .first()?
            .content
            .as_ref()?
            .parts
            .first()?
            .text
            .as_deref()
    }
}

fn wire_role(role: Role) -> &'static str {
    match role {
        Role::Assistant => "model",
        Role::System | Role::User => "user",
    }
}

/// Converts a role-tagged history into grouped, alternating turns.
pub fn group_messages(messages: &[ChatMessage]) -> Vec<Content> {
    let mut contents: Vec<Content> = Vec::new();
    for msg in messages {
        let role = wire_role(msg.role);
        let part = Part {
            text: msg.content.clone(),
        };
        match contents.last_mut() {
            Some(last) if last.role == role => last.parts.push(part),
            _ => contents.push(Content {
                role: role.to_string(),
                parts: vec![part],
            }),
        }
    }
    contents
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn texts(content: &Content) -> Vec<&str> {
        content.parts.iter().map(|p| p.text.as_str()).collect()
    }

    #[test]
    fn test_consecutive_same_role_messages_merge() {
        let grouped = group_messages(&[
            ChatMessage::user("a"),
            ChatMessage::user("b"),
            ChatMessage::assistant("c"),
        ]);

        assert_eq!(grouped.len(), 2);
        assert_eq!(grouped[0].role, "user");
        assert_eq!(texts(&grouped[0]), vec!["a", "b"]);
        assert_eq!(grouped[1].role, "model");
        assert_eq!(texts(&grouped[1]), vec!["c"]);
    }

    #[test]
    fn test_system_messages_are_sent_as_user_turns() {
        let grouped = group_messages(&[
            ChatMessage::system("be a student"),
            ChatMessage::user("hello"),
            ChatMessage::assistant("hi"),
            ChatMessage::user("next"),
        ]);

        let roles: Vec<&str> = grouped.iter().map(|c| c.role.as_str()).collect();
        assert_eq!(roles, vec!["user", "model", "user"]);
        assert_eq!(texts(&grouped[0]), vec!["be a student", "hello"]);
    }

    #[test]
    fn test_empty_history_yields_no_contents() {
        assert!(group_messages(&[]).is_empty());
    }

    #[test]
    fn test_request_body_shape() {
        let body = GenerateContentRequest {
            contents: group_messages(&[ChatMessage::user("a"), ChatMessage::assistant("b")]),
        };
        assert_eq!(
            serde_json::to_value(&body).unwrap(),
            json!({
                "contents": [
                    { "role": "user", "parts": [{ "text": "a" }] },
                    { "role": "model", "parts": [{ "text": "b" }] }
                ]
            })
        );
    }

    #[test]
    fn test_first_text_extraction() {
        let response: GenerateContentResponse = serde_json::from_value(json!({
            "candidates": [
                { "content": { "role": "model", "parts": [{ "text": "first" }, { "text": "second" }] } }
            ]
        }))
        .unwrap();
        assert_eq!(response.first_text(), Some("first"));
    }

    #[test]
    fn test_first_text_missing_paths() {
        let empty: GenerateContentResponse = serde_json::from_value(json!({})).unwrap();
        assert_eq!(empty.first_text(), None);

        let blocked: GenerateContentResponse = serde_json::from_value(json!({
            "candidates": [{ "finishReason": "SAFETY" }]
        }))
        .unwrap();
        assert_eq!(blocked.first_text(), None);

        let no_text: GenerateContentResponse = serde_json::from_value(json!({
            "candidates": [{ "content": { "parts": [{ "inlineData": {} }] } }]
        }))
        .unwrap();
        assert_eq!(no_text.first_text(), None);
    }
}
