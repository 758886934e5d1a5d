//! Text writer task
//!
//! The single consumer of glove events. Owns the chord decoder and the text
//! buffer, sleeps until the pending chord's deadline, and publishes every
//! change as a [`TextEvent`] and a fresh [`TextSnapshot`].

use std::future;

use tokio::sync::{broadcast, mpsc, watch};
use tokio::time::{self, Instant};
use tracing::{debug, info, warn};

use crate::chord::{ApplyDelay, ChordCode, ChordDecoder, FingerVector};
use crate::events::TextEvent;
use crate::glove::GloveEvent;
use crate::text::{Action, TextBuffer, TextSnapshot, WritingMode};

/// Requests from other tasks to the text writer
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum WriterCommand {
    /// Change the disambiguation window for future chords
    SetApplyDelay(ApplyDelay),
    /// Empty the text buffer
    ClearText,
}

pub struct TextWriter {
    decoder: ChordDecoder,
    buffer: TextBuffer,
    glove_connected: bool,
    /// Channel for emitting text events
    event_tx: broadcast::Sender<TextEvent>,
    /// Latest state for readers on other tasks
    snapshot_tx: watch::Sender<TextSnapshot>,
}

impl TextWriter {
    pub fn new(
        apply_delay: ApplyDelay,
        event_tx: broadcast::Sender<TextEvent>,
        snapshot_tx: watch::Sender<TextSnapshot>,
    ) -> Self {
        let writer = Self {
            decoder: ChordDecoder::new(apply_delay),
            buffer: TextBuffer::new(),
            glove_connected: false,
            event_tx,
            snapshot_tx,
        };
        writer.publish_snapshot();
        writer
    }

    pub fn text(&self) -> &str {
        self.buffer.text()
    }

    pub fn mode(&self) -> WritingMode {
        self.buffer.mode()
    }

    /// Run the writer until the glove channel closes
    pub async fn run(
        &mut self,
        mut glove_rx: mpsc::Receiver<GloveEvent>,
        mut command_rx: mpsc::Receiver<WriterCommand>,
    ) {
        info!(
            apply_delay_ms = self.decoder.apply_delay().as_millis(),
            "text writer started"
        );

        loop {
            let deadline = self.decoder.deadline();

            tokio::select! {
                biased;

                _ = sleep_until(deadline) => {
                    self.resolve_expired(Instant::now());
                }

                event = glove_rx.recv() => match event {
                    Some(event) => self.handle_glove_event(event, Instant::now()),
                    None => break,
                },

                Some(command) = command_rx.recv() => {
                    self.handle_command(command);
                }
            }
        }

        self.dispose();
        info!("text writer stopped");
    }

    /// Discard any pending chord so nothing resolves after shutdown
    pub fn dispose(&mut self) {
        if self.decoder.cancel() {
            info!("pending chord discarded");
        }
    }

    fn handle_glove_event(&mut self, event: GloveEvent, now: Instant) {
        match event {
            GloveEvent::Connected => {
                info!("glove connected");
                self.glove_connected = true;
                self.emit(TextEvent::GloveConnected);
                self.publish_snapshot();
            }
            GloveEvent::FingersChanged(fingers) => {
                self.handle_fingers(fingers, now);
            }
            GloveEvent::Disconnected => {
                warn!("glove disconnected");
                self.glove_connected = false;
                self.dispose();
                self.emit(TextEvent::GloveDisconnected);
                self.publish_snapshot();
            }
        }
    }

    fn handle_fingers(&mut self, fingers: FingerVector, now: Instant) {
        // A deadline that passed before this event arrived wins.
        self.resolve_expired(now);

        if fingers.is_empty() {
            debug!("fingers released");
            return;
        }

        if let Some(code) = self.decoder.on_finger_event(fingers, now) {
            self.apply(code);
        }
    }

    fn resolve_expired(&mut self, now: Instant) {
        if let Some(code) = self.decoder.poll_timeout(now) {
            self.apply(code);
        }
    }

    fn handle_command(&mut self, command: WriterCommand) {
        match command {
            WriterCommand::SetApplyDelay(delay) => {
                info!(
                    delay_ms = delay.as_millis(),
                    chord_pending = self.decoder.is_pending(),
                    "apply delay updated"
                );
                self.decoder.set_apply_delay(delay);
                self.emit(TextEvent::ApplyDelayChanged {
                    delay_ms: delay.as_millis(),
                });
            }
            WriterCommand::ClearText => {
                self.buffer.clear();
                self.emit(TextEvent::TextCleared);
            }
        }
        self.publish_snapshot();
    }

    /// Apply a resolved chord to the buffer and publish the result
    fn apply(&mut self, code: ChordCode) {
        let old_mode = self.buffer.mode();
        let action = self.buffer.apply_code(code);
        let new_mode = self.buffer.mode();

        info!(%code, ?action, mode = %new_mode, "chord applied");
        self.emit(TextEvent::ChordResolved { code: code.value() });

        if let Action::Backspace(None) = action {
            debug!("backspace on empty buffer ignored");
        }
        if let Some(event) = TextEvent::from_action(&action) {
            self.emit(event);
        }
        if new_mode != old_mode {
            self.emit(TextEvent::ModeChanged { mode: new_mode });
        }

        self.publish_snapshot();
    }

    fn emit(&self, event: TextEvent) {
        debug!(%event, "emitting text event");
        // No subscribers is fine
        let _ = self.event_tx.send(event);
    }

    fn publish_snapshot(&self) {
        self.snapshot_tx.send_replace(TextSnapshot::capture(
            &self.buffer,
            self.decoder.apply_delay(),
            self.glove_connected,
        ));
    }
}

/// Sleep until `deadline`, or forever when nothing is pending
async fn sleep_until(deadline: Option<Instant>) {
    match deadline {
        Some(deadline) => time::sleep_until(deadline).await,
        None => future::pending().await,
    }
}
