//! Text writer module
//!
//! Connects the chord decoder to the text buffer. Runs as one task, so
//! timer expiry and glove events never race.

mod machine;

pub use machine::{TextWriter, WriterCommand};
