//! Text buffer and writing mode
//!
//! Applies resolved chord codes to the typed text. Numbers mode is
//! single-shot: it lasts for exactly one chord.

use serde::{Deserialize, Serialize};
use tracing::info;

use crate::chord::{ChordCode, Symbol};

/// How the next chord code is read
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum WritingMode {
    /// Codes map to letters and control symbols
    #[default]
    Letters,
    /// The next code is typed as a number, then back to Letters
    Numbers,
}

impl std::fmt::Display for WritingMode {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            WritingMode::Letters => write!(f, "Letters"),
            WritingMode::Numbers => write!(f, "Numbers"),
        }
    }
}

/// Effect of one chord on the buffer
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Action {
    /// A letter, `.` or space was typed
    AppendLetter(char),
    /// A number was typed in Numbers mode
    AppendDigits(String),
    /// Last character erased, `None` if the buffer was already empty
    Backspace(Option<char>),
    /// Switched to Numbers mode for the next chord
    EnterNumberMode,
}

/// Typed text plus the current writing mode
#[derive(Debug, Clone, Default)]
pub struct TextBuffer {
    text: String,
    mode: WritingMode,
}

impl TextBuffer {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn text(&self) -> &str {
        &self.text
    }

    pub fn mode(&self) -> WritingMode {
        self.mode
    }

    /// Apply a resolved chord and return what it did
    pub fn apply_code(&mut self, code: ChordCode) -> Action {
        let action = match self.mode {
            WritingMode::Numbers => {
                self.mode = WritingMode::Letters;
                Action::AppendDigits(numeric_text(code))
            }
            WritingMode::Letters => match code.symbol() {
                Symbol::Letter(letter) => Action::AppendLetter(letter),
                Symbol::NumberModeToggle => {
                    self.mode = WritingMode::Numbers;
                    Action::EnterNumberMode
                }
                Symbol::Backspace => Action::Backspace(self.text.pop()),
                Symbol::Period => Action::AppendLetter('.'),
                Symbol::Space => Action::AppendLetter(' '),
            },
        };

        match &action {
            Action::AppendLetter(c) => self.text.push(*c),
            Action::AppendDigits(digits) => self.text.push_str(digits),
            Action::Backspace(_) | Action::EnterNumberMode => {}
        }

        action
    }

    /// Empty the buffer and return to Letters mode
    pub fn clear(&mut self) {
        if !self.text.is_empty() || self.mode != WritingMode::Letters {
            info!(len = self.text.len(), mode = %self.mode, "text buffer cleared");
        }
        self.text.clear();
        self.mode = WritingMode::Letters;
    }
}

/// Numbers-mode rendering of a code.
///
/// Code 30 is `0`; every other code is its own decimal value, so codes 10-29
/// type two digits.
fn numeric_text(code: ChordCode) -> String {
    match code.value() {
        30 => "0".to_string(),
        n => n.to_string(),
    }
}
