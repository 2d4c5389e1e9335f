//! Append-only conversation log, partitioned by channel.

use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum EntryRole {
    User,
    Agent,
    Supervisor,
}

/// Which of the independent sequences an entry belongs to.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Channel {
    /// The teacher/student exchange.
    Main,
    /// Replies produced by a help request.
    Help,
    /// Prompts shown in the supervisor slot.
    Supervisor,
    /// Text the user pasted into the input.
    Paste,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TranscriptEntry {
    pub text: String,
    pub role: EntryRole,
    pub timestamp: String,
}

impl TranscriptEntry {
    /// Creates an entry stamped with the current local time (RFC 3339).
    pub fn now(text: impl Into<String>, role: EntryRole) -> Self {
        Self {
            text: text.into(),
            role,
            timestamp: chrono::Local::now().to_rfc3339(),
        }
    }
}

/// Entries are only ever appended; nothing reorders or edits them.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Transcript {
    main: Vec<TranscriptEntry>,
    help: Vec<TranscriptEntry>,
    supervisor: Vec<TranscriptEntry>,
    paste: Vec<TranscriptEntry>,
}

impl Transcript {
    pub fn append(&mut self, channel: Channel, entry: TranscriptEntry) {
        match channel {
            Channel::Main => self.main.push(entry),
            Channel::Help => self.help.push(entry),
            Channel::Supervisor => self.supervisor.push(entry),
            Channel::Paste => self.paste.push(entry),
        }
    }

    pub fn channel(&self, channel: Channel) -> &[TranscriptEntry] {
        match channel {
            Channel::Main => &self.main,
            Channel::Help => &self.help,
            Channel::Supervisor => &self.supervisor,
            Channel::Paste => &self.paste,
        }
    }

    pub fn len(&self) -> usize {
        self.main.len() + self.help.len() + self.supervisor.len() + self.paste.len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_channels_are_independent_and_ordered() {
        let mut transcript = Transcript::default();
        transcript.append(Channel::Main, TranscriptEntry::now("one", EntryRole::User));
        transcript.append(Channel::Help, TranscriptEntry::now("help", EntryRole::Supervisor));
        transcript.append(Channel::Main, TranscriptEntry::now("two", EntryRole::Agent));

        let main: Vec<&str> = transcript
            .channel(Channel::Main)
            .iter()
            .map(|e| e.text.as_str())
            .collect();
        assert_eq!(main, vec!["one", "two"]);
        assert_eq!(transcript.channel(Channel::Help).len(), 1);
        assert!(transcript.channel(Channel::Paste).is_empty());
        assert_eq!(transcript.len(), 3);
    }

    #[test]
    fn test_entry_timestamp_is_rfc3339() {
        let entry = TranscriptEntry::now("hi", EntryRole::User);
        assert!(chrono::DateTime::parse_from_rfc3339(&entry.timestamp).is_ok());
    }

    #[test]
    fn test_export_shape() {
        let mut transcript = Transcript::default();
        transcript.append(
            Channel::Paste,
            TranscriptEntry {
                text: "copied".into(),
                role: EntryRole::User,
                timestamp: "2026-01-01T00:00:00+00:00".into(),
            },
        );

        let value = serde_json::to_value(&transcript).unwrap();
        assert_eq!(value["main"], serde_json::json!([]));
        assert_eq!(value["paste"][0]["text"], "copied");
        assert_eq!(value["paste"][0]["role"], "user");
    }
}
