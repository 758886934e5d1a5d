//! Typed text state
//!
//! Owns the text buffer and the Letters/Numbers writing mode. Other tasks
//! read it through [`TextSnapshot`] only.

mod buffer;

pub use buffer::{Action, TextBuffer, WritingMode};

use serde::Serialize;

use crate::chord::ApplyDelay;

/// Immutable copy of the writer state, published after every change
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct TextSnapshot {
    pub text: String,
    pub mode: WritingMode,
    pub apply_delay_ms: u64,
    pub glove_connected: bool,
}

impl TextSnapshot {
    pub fn capture(buffer: &TextBuffer, apply_delay: ApplyDelay, glove_connected: bool) -> Self {
        Self {
            text: buffer.text().to_string(),
            mode: buffer.mode(),
            apply_delay_ms: apply_delay.as_millis(),
            glove_connected,
        }
    }
}
