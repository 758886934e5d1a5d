//! Glove input
//!
//! Adapts raw flex samples from the glove bridge into finger activation
//! events for the text writer.

mod aggregator;
mod fingers;
mod listener;

pub use fingers::{GloveSettings, Sensitivity};
pub use listener::{GloveControl, GloveEvent, GloveListener};
