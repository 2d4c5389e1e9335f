//! Defines the WebSocket message protocol between the browser client and the server.

use classroom_core::{orchestrator::DialogView, transcript::Transcript};
use serde::{Deserialize, Serialize};

/// Messages sent from the client (browser) to the server.
#[derive(Deserialize, Debug, PartialEq, Eq)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum ClientMessage {
    /// The teacher's message to the student.
    SendMessage { text: String },
    /// Asks the professor for help.
    RequestHelp,
    /// Text the teacher pasted into the input box.
    Paste { text: String },
    /// Requests a full copy of the transcript.
    ExportTranscript,
}

/// Messages sent from the server to the client (browser).
#[derive(Serialize, Debug, Clone)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum ServerMessage {
    /// The complete visible state, sent after every change.
    View { view: DialogView },
    /// The transcript, in reply to `export_transcript`.
    Transcript { transcript: Transcript },
    /// Reports a protocol error to the client.
    Error { message: String },
}

#[cfg(test)]
mod tests {
    use super::*;
    use classroom_core::orchestrator::{Phase, SupervisorSlot, VisibleTurn};
    use serde_json::json;

    #[test]
    fn test_client_message_deserialization() {
        let msg: ClientMessage =
            serde_json::from_str(r#"{"type":"send_message","text":"What is X?"}"#).unwrap();
        assert_eq!(
            msg,
            ClientMessage::SendMessage {
                text: "What is X?".to_string()
            }
        );

        let msg: ClientMessage = serde_json::from_str(r#"{"type":"request_help"}"#).unwrap();
        assert_eq!(msg, ClientMessage::RequestHelp);

        let msg: ClientMessage =
            serde_json::from_str(r#"{"type":"paste","text":"copied"}"#).unwrap();
        assert_eq!(
            msg,
            ClientMessage::Paste {
                text: "copied".to_string()
            }
        );

        let msg: ClientMessage = serde_json::from_str(r#"{"type":"export_transcript"}"#).unwrap();
        assert_eq!(msg, ClientMessage::ExportTranscript);
    }

    #[test]
    fn test_unknown_client_message_is_rejected() {
        assert!(serde_json::from_str::<ClientMessage>(r#"{"type":"init"}"#).is_err());
        assert!(serde_json::from_str::<ClientMessage>(r#"{"type":"send_message"}"#).is_err());
    }

    #[test]
    fn test_server_view_message_serialization() {
        let msg = ServerMessage::View {
            view: DialogView {
                turns: vec![VisibleTurn::user("hi")],
                supervisor: SupervisorSlot::ProfessorThinking,
                send_active: true,
                phase: Phase::Idle,
            },
        };
        let value = serde_json::to_value(&msg).unwrap();
        assert_eq!(value["type"], "view");
        assert_eq!(value["view"]["turns"][0]["text"], "hi");
        assert_eq!(value["view"]["supervisor"], json!({ "state": "professor_thinking" }));
        assert_eq!(value["view"]["send_active"], true);
    }

    #[test]
    fn test_server_error_serialization() {
        let msg = ServerMessage::Error {
            message: "bad".to_string(),
        };
        assert_eq!(
            serde_json::to_value(&msg).unwrap(),
            json!({ "type": "error", "message": "bad" })
        );
    }
}
