//! IPC message protocol definitions
//!
//! All messages are JSON-encoded, prefixed with a 4-byte little-endian length.

use serde::{Deserialize, Serialize};

use crate::chord::FINGER_COUNT;
use crate::events::TextEvent;
use crate::glove::GloveSettings;
use crate::text::{TextSnapshot, WritingMode};

/// Largest accepted frame body
pub const MAX_FRAME_LEN: usize = 1024 * 1024;

/// Requests from clients to the daemon
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum Request {
    /// Ping to check connectivity
    Ping,

    /// Request current daemon status
    GetStatus,

    /// Request the typed text
    GetText,

    /// Change the chord disambiguation window
    SetApplyDelay { delay_ms: u64 },

    /// Empty the text buffer
    ClearText,

    /// Replace the per-finger activation thresholds
    SetSensitivity { thresholds: [u16; FINGER_COUNT] },

    /// Resize the moving-mean window, 0 disables smoothing
    SetAggregationSize { size: usize },

    /// Subscribe to text event notifications
    Subscribe,
}

/// Responses from the daemon to clients
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum Response {
    /// Pong response to ping
    Pong,

    /// Current daemon status
    Status(DaemonStatus),

    /// Typed text and mode
    Text { text: String, mode: WritingMode },

    /// New apply delay accepted
    ApplyDelayUpdated { delay_ms: u64 },

    /// Buffer clear accepted
    TextCleared,

    /// New thresholds stored, used from the next sample
    SensitivityUpdated { thresholds: [u16; FINGER_COUNT] },

    /// New window size stored, used from the next sample
    AggregationSizeUpdated { size: usize },

    /// Subscription confirmed
    Subscribed,

    /// Error response
    Error { code: String, message: String },
}

impl Response {
    pub fn error(code: &str, message: impl Into<String>) -> Self {
        Response::Error {
            code: code.to_string(),
            message: message.into(),
        }
    }
}

/// Push notification from daemon to subscribed clients
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum Notification {
    /// Text writer event occurred
    Event { event: TextEvent },
}

/// Full daemon status snapshot
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DaemonStatus {
    /// Daemon version
    pub version: String,

    /// Current writing mode
    pub mode: WritingMode,

    /// Typed text
    pub text: String,

    /// Chord disambiguation window
    pub apply_delay_ms: u64,

    /// Whether glove samples are flowing
    pub glove_connected: bool,

    /// Per-finger activation thresholds
    pub sensitivity: [u16; FINGER_COUNT],

    /// Moving-mean window size
    pub aggregation_size: usize,

    /// Uptime in seconds
    pub uptime_secs: u64,
}

impl DaemonStatus {
    pub fn from_snapshot(
        snapshot: &TextSnapshot,
        glove: GloveSettings,
        uptime_secs: u64,
    ) -> Self {
        Self {
            version: env!("CARGO_PKG_VERSION").to_string(),
            mode: snapshot.mode,
            text: snapshot.text.clone(),
            apply_delay_ms: snapshot.apply_delay_ms,
            glove_connected: snapshot.glove_connected,
            sensitivity: *glove.sensitivity.thresholds(),
            aggregation_size: glove.aggregation_window,
            uptime_secs,
        }
    }
}
