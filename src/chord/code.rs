//! Finger vectors, chord codes and their Letters-mode symbols
//!
//! A chord is one or two sequential single-finger activations. Single chords
//! map to codes 1-5, double chords to `first * 5 + second` (6-30).

use std::fmt;

/// Number of fingers reported by the glove
pub const FINGER_COUNT: usize = 5;

/// Code that switches the next chord to Numbers mode
pub const NUMBER_MODE_CODE: u8 = 27;
/// Code that erases the last character
pub const BACKSPACE_CODE: u8 = 28;
/// Code that types a period
pub const PERIOD_CODE: u8 = 29;
/// Code that types a space (or `0` in Numbers mode)
pub const SPACE_CODE: u8 = 30;

/// A single finger, numbered 1 (first) to 5 (last)
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct Finger(u8);

impl Finger {
    /// All fingers in scan order
    pub const ALL: [Finger; FINGER_COUNT] = [Finger(1), Finger(2), Finger(3), Finger(4), Finger(5)];

    /// Create a finger from its 1-based number
    #[cfg(test)]
    pub fn new(number: u8) -> Option<Self> {
        (1..=FINGER_COUNT as u8).contains(&number).then_some(Self(number))
    }

    /// 1-based finger number
    pub fn number(self) -> u8 {
        self.0
    }
}

impl fmt::Display for Finger {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "finger {}", self.0)
    }
}

/// Snapshot of which fingers are past their flex threshold
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct FingerVector([bool; FINGER_COUNT]);

impl FingerVector {
    /// Wrap a thresholded finger snapshot
    pub fn new(fingers: [bool; FINGER_COUNT]) -> Self {
        Self(fingers)
    }

    /// Vector with only `finger` active
    #[cfg(test)]
    pub fn only(finger: Finger) -> Self {
        let mut fingers = [false; FINGER_COUNT];
        fingers[usize::from(finger.number() - 1)] = true;
        Self(fingers)
    }

    /// Lowest-numbered active finger, if any
    pub fn first_active(&self) -> Option<Finger> {
        Finger::ALL
            .into_iter()
            .zip(self.0)
            .find_map(|(finger, active)| active.then_some(finger))
    }

    /// Check if every finger is released
    pub fn is_empty(&self) -> bool {
        !self.0.iter().any(|active| *active)
    }

    pub fn as_array(&self) -> &[bool; FINGER_COUNT] {
        &self.0
    }
}

/// A resolved chord, always in `1..=30`
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct ChordCode(u8);

impl ChordCode {
    pub const MIN: u8 = 1;
    pub const MAX: u8 = SPACE_CODE;

    /// Chord made of a single activation that timed out
    pub fn single(finger: Finger) -> Self {
        Self(finger.number())
    }

    /// Chord made of two sequential activations
    pub fn double(first: Finger, second: Finger) -> Self {
        Self(first.number() * FINGER_COUNT as u8 + second.number())
    }

    /// Create a code from its raw value
    #[cfg(test)]
    pub fn new(value: u8) -> Option<Self> {
        (Self::MIN..=Self::MAX).contains(&value).then_some(Self(value))
    }

    pub fn value(self) -> u8 {
        self.0
    }

    /// Letters-mode meaning of this code
    pub fn symbol(self) -> Symbol {
        match self.0 {
            NUMBER_MODE_CODE => Symbol::NumberModeToggle,
            BACKSPACE_CODE => Symbol::Backspace,
            PERIOD_CODE => Symbol::Period,
            SPACE_CODE => Symbol::Space,
            n => Symbol::Letter(char::from(b'A' + n - 1)),
        }
    }
}

impl fmt::Display for ChordCode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// What a chord code means while writing letters
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Symbol {
    /// `A` through `Z`
    Letter(char),
    /// Next chord is read as a number
    NumberModeToggle,
    Backspace,
    Period,
    Space,
}
