//! Chord decoding
//!
//! Reads finger activations as chords:
//! - Single chord: one finger, then nothing for the apply delay (codes 1-5)
//! - Double chord: two fingers within the apply delay (codes 6-30)

mod code;
mod decoder;

pub use code::{ChordCode, Finger, FingerVector, Symbol, FINGER_COUNT};
pub use decoder::{ApplyDelay, ChordDecoder};
