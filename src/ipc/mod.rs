//! IPC module for daemon-client communication
//!
//! UIs and keyboard emulators connect here to read the typed text, tune the
//! apply delay, and follow text events as they happen.

mod protocol;
mod server;

pub use server::{Server, WriterLink};
