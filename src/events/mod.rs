//! Events published by the text writer
//!
//! Every buffer mutation, mode change and glove connection change is
//! broadcast so that UIs and keyboard emulators can follow along.

use serde::{Deserialize, Serialize};

use crate::text::{Action, WritingMode};

/// Events emitted by the text writer
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum TextEvent {
    /// Glove input stream started
    GloveConnected,

    /// Glove input stream ended
    GloveDisconnected,

    /// A chord was decoded
    ChordResolved {
        /// Chord code in 1..=30
        code: u8,
    },

    /// Characters were appended to the buffer
    TextAppended { text: String },

    /// The last character was erased
    CharacterRemoved { character: char },

    /// Writing mode changed
    ModeChanged { mode: WritingMode },

    /// Buffer was emptied on request
    TextCleared,

    /// Disambiguation window changed
    ApplyDelayChanged { delay_ms: u64 },
}

impl TextEvent {
    /// Buffer event for an applied action, if the action changed the text
    pub fn from_action(action: &Action) -> Option<Self> {
        match action {
            Action::AppendLetter(c) => Some(TextEvent::TextAppended {
                text: c.to_string(),
            }),
            Action::AppendDigits(digits) => Some(TextEvent::TextAppended {
                text: digits.clone(),
            }),
            Action::Backspace(Some(character)) => Some(TextEvent::CharacterRemoved {
                character: *character,
            }),
            Action::Backspace(None) | Action::EnterNumberMode => None,
        }
    }
}

impl std::fmt::Display for TextEvent {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            TextEvent::GloveConnected => write!(f, "GLOVE_CONNECTED"),
            TextEvent::GloveDisconnected => write!(f, "GLOVE_DISCONNECTED"),
            TextEvent::ChordResolved { code } => write!(f, "CHORD_RESOLVED ({})", code),
            TextEvent::TextAppended { text } => write!(f, "TEXT_APPENDED ({:?})", text),
            TextEvent::CharacterRemoved { character } => {
                write!(f, "CHARACTER_REMOVED ({:?})", character)
            }
            TextEvent::ModeChanged { mode } => write!(f, "MODE_CHANGED ({})", mode),
            TextEvent::TextCleared => write!(f, "TEXT_CLEARED"),
            TextEvent::ApplyDelayChanged { delay_ms } => {
                write!(f, "APPLY_DELAY_CHANGED ({}ms)", delay_ms)
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_event_serialization() {
        let event = TextEvent::TextAppended { text: "H".into() };
        let json = serde_json::to_string(&event).unwrap();
        assert!(json.contains("text_appended"));
        assert!(json.contains("\"H\""));
    }

    #[test]
    fn test_event_deserialization() {
        let json = r#"{"type":"mode_changed","mode":"numbers"}"#;
        let event: TextEvent = serde_json::from_str(json).unwrap();
        assert_eq!(
            event,
            TextEvent::ModeChanged {
                mode: WritingMode::Numbers
            }
        );
    }

    #[test]
    fn test_from_action() {
        assert_eq!(
            TextEvent::from_action(&Action::AppendDigits("15".into())),
            Some(TextEvent::TextAppended { text: "15".into() })
        );
        assert_eq!(
            TextEvent::from_action(&Action::Backspace(Some('A'))),
            Some(TextEvent::CharacterRemoved { character: 'A' })
        );
        assert_eq!(TextEvent::from_action(&Action::Backspace(None)), None);
        assert_eq!(TextEvent::from_action(&Action::EnterNumberMode), None);
    }
}
