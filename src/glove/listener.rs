//! Glove sample listener
//!
//! Reads flex samples line by line from a blocking source (the glove bridge
//! writes them to our stdin) on a dedicated thread and forwards finger
//! changes to the text writer.

use std::io::BufRead;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};
use std::thread;

use tokio::sync::mpsc;
use tracing::{debug, error, info, warn};

use crate::chord::FingerVector;

use super::fingers::{FingerTracker, FlexSample, GloveSettings, SampleParseError, Sensitivity};

/// Events sent from the glove listener to the text writer
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum GloveEvent {
    /// Sample stream opened
    Connected,
    /// Thresholded fingers changed
    FingersChanged(FingerVector),
    /// Sample stream ended or failed
    Disconnected,
}

/// Errors that can occur in the glove listener
#[derive(Debug, thiserror::Error)]
pub enum GloveError {
    #[error("glove listener is already running")]
    AlreadyRunning,

    #[error("failed to spawn listener thread: {0}")]
    ThreadSpawn(String),

    #[error("bad sample on line {line}: {source}")]
    Parse {
        line: usize,
        #[source]
        source: SampleParseError,
    },

    #[error("failed to send event to channel")]
    ChannelSend,
}

/// Shared handle for changing thresholding while the listener runs.
///
/// The listener thread picks up changes before the next sample.
#[derive(Debug, Clone)]
pub struct GloveControl {
    settings: Arc<Mutex<GloveSettings>>,
}

impl GloveControl {
    pub fn new(settings: GloveSettings) -> Self {
        Self {
            settings: Arc::new(Mutex::new(settings)),
        }
    }

    pub fn settings(&self) -> GloveSettings {
        *self.lock()
    }

    pub fn set_sensitivity(&self, sensitivity: Sensitivity) {
        self.lock().sensitivity = sensitivity;
    }

    pub fn set_aggregation_window(&self, window: usize) {
        self.lock().aggregation_window = window;
    }

    fn lock(&self) -> MutexGuard<'_, GloveSettings> {
        // Settings are plain values, a panicked writer cannot leave them torn
        self.settings.lock().unwrap_or_else(PoisonError::into_inner)
    }
}

/// Background reader that turns flex samples into finger events
pub struct GloveListener {
    event_tx: mpsc::Sender<GloveEvent>,
    control: GloveControl,
    running: Arc<AtomicBool>,
}

impl GloveListener {
    /// Create a new glove listener
    pub fn new(event_tx: mpsc::Sender<GloveEvent>, settings: GloveSettings) -> Self {
        Self {
            event_tx,
            control: GloveControl::new(settings),
            running: Arc::new(AtomicBool::new(false)),
        }
    }

    /// Handle for changing settings at runtime
    pub fn control(&self) -> GloveControl {
        self.control.clone()
    }

    /// Start reading samples from `source` on a dedicated thread.
    ///
    /// The thread runs until the source is exhausted, the receiving side is
    /// dropped, or `stop()` is called.
    pub fn start<R>(&self, source: R) -> Result<(), GloveError>
    where
        R: BufRead + Send + 'static,
    {
        if self.running.swap(true, Ordering::SeqCst) {
            return Err(GloveError::AlreadyRunning);
        }

        let event_tx = self.event_tx.clone();
        let running = Arc::clone(&self.running);
        let control = self.control.clone();

        let spawned = thread::Builder::new()
            .name("glove-listener".to_string())
            .spawn(move || {
                info!("glove listener thread started");

                if let Err(e) = read_samples(source, &control, &event_tx, &running) {
                    error!(?e, "glove listener error");
                }

                let _ = event_tx.blocking_send(GloveEvent::Disconnected);
                running.store(false, Ordering::SeqCst);
                info!("glove listener thread stopped");
            });

        if let Err(e) = spawned {
            self.running.store(false, Ordering::SeqCst);
            return Err(GloveError::ThreadSpawn(e.to_string()));
        }

        Ok(())
    }

    /// Stop the glove listener
    pub fn stop(&self) {
        if !self.is_running() {
            return;
        }

        // Takes effect once the current blocking read returns
        self.running.store(false, Ordering::SeqCst);
        info!("glove listener stop requested");
    }

    /// Check if the listener is currently running
    pub fn is_running(&self) -> bool {
        self.running.load(Ordering::SeqCst)
    }
}

/// Read samples until EOF, a read error, or shutdown
fn read_samples<R: BufRead>(
    source: R,
    control: &GloveControl,
    event_tx: &mpsc::Sender<GloveEvent>,
    running: &AtomicBool,
) -> Result<(), GloveError> {
    let mut tracker = FingerTracker::new(control.settings());
    send(event_tx, GloveEvent::Connected)?;

    for (index, line) in source.lines().enumerate() {
        if !running.load(Ordering::SeqCst) {
            break;
        }

        let line = match line {
            Ok(line) => line,
            Err(e) => {
                warn!(?e, "glove source read failed");
                break;
            }
        };

        let line = line.trim();
        if line.is_empty() || line.starts_with('#') {
            continue;
        }

        let sample = match parse_line(index + 1, line) {
            Ok(sample) => sample,
            Err(e) => {
                warn!(%e, "skipping glove sample");
                continue;
            }
        };

        let settings = control.settings();
        if tracker.apply(settings) {
            info!(
                sensitivity = ?settings.sensitivity.thresholds(),
                aggregation_window = settings.aggregation_window,
                "glove settings applied"
            );
        }

        if let Some(fingers) = tracker.process(sample) {
            debug!(fingers = ?fingers.as_array(), "fingers changed");
            send(event_tx, GloveEvent::FingersChanged(fingers))?;
        }
    }

    Ok(())
}

fn parse_line(line: usize, text: &str) -> Result<FlexSample, GloveError> {
    text.parse()
        .map_err(|source| GloveError::Parse { line, source })
}

fn send(event_tx: &mpsc::Sender<GloveEvent>, event: GloveEvent) -> Result<(), GloveError> {
    event_tx
        .blocking_send(event)
        .map_err(|_| GloveError::ChannelSend)
}

#[cfg(test)]
mod tests {
    use std::io::{self, BufReader, Cursor, Read};
    use std::sync::mpsc as std_mpsc;

    use super::*;
    use crate::chord::Finger;

    /// Blocking source fed one line at a time, EOF once the sender is dropped
    struct LineFeed {
        lines: std_mpsc::Receiver<String>,
        pending: Vec<u8>,
    }

    impl Read for LineFeed {
        fn read(&mut self, buf: &mut [u8]) -> io::Result<usize> {
            if self.pending.is_empty() {
                match self.lines.recv() {
                    Ok(line) => self.pending = format!("{line}\n").into_bytes(),
                    Err(_) => return Ok(0),
                }
            }

            let n = buf.len().min(self.pending.len());
            buf[..n].copy_from_slice(&self.pending[..n]);
            self.pending.drain(..n);
            Ok(n)
        }
    }

    fn line_feed() -> (std_mpsc::Sender<String>, BufReader<LineFeed>) {
        let (tx, rx) = std_mpsc::channel();
        let feed = LineFeed {
            lines: rx,
            pending: Vec::new(),
        };
        (tx, BufReader::new(feed))
    }

    fn finger(n: u8) -> FingerVector {
        FingerVector::only(Finger::new(n).unwrap())
    }

    fn settings() -> GloveSettings {
        GloveSettings {
            sensitivity: Sensitivity::default(),
            aggregation_window: 0,
        }
    }

    #[test]
    fn test_listener_creation() {
        let (tx, _rx) = mpsc::channel(32);
        let listener = GloveListener::new(tx, settings());
        assert!(!listener.is_running());
    }

    #[test]
    fn test_parse_line_reports_line_number() {
        let err = parse_line(7, "1 2").unwrap_err();
        assert!(matches!(err, GloveError::Parse { line: 7, .. }));
        assert!(err.to_string().contains("line 7"));
    }

    #[tokio::test]
    async fn test_reads_samples_until_eof() {
        let input = "# bridge header\n\
                     0 0 0 0 0\n\
                     0 0 90 0 0\n\
                     garbage\n\
                     0 0 95 0 0\n\
                     \n\
                     0 0 0 0 0\n";

        let (tx, mut rx) = mpsc::channel(32);
        let listener = GloveListener::new(tx, settings());
        listener.start(Cursor::new(input)).unwrap();

        let mut events = Vec::new();
        while let Some(event) = rx.recv().await {
            let done = event == GloveEvent::Disconnected;
            events.push(event);
            if done {
                break;
            }
        }

        let finger3 = finger(3);
        assert_eq!(
            events,
            vec![
                GloveEvent::Connected,
                GloveEvent::FingersChanged(finger3),
                GloveEvent::FingersChanged(FingerVector::default()),
                GloveEvent::Disconnected,
            ]
        );
    }

    #[tokio::test]
    async fn test_start_twice_fails() {
        // Capacity 1 keeps the first thread blocked until we drain it.
        let (tx, mut rx) = mpsc::channel(1);
        let listener = GloveListener::new(tx, settings());

        listener.start(Cursor::new("")).unwrap();
        assert!(matches!(
            listener.start(Cursor::new("")),
            Err(GloveError::AlreadyRunning)
        ));

        assert_eq!(rx.recv().await, Some(GloveEvent::Connected));
        assert_eq!(rx.recv().await, Some(GloveEvent::Disconnected));
    }

    #[tokio::test]
    async fn test_stop_ends_stream_after_current_line() {
        let (feed, source) = line_feed();
        let (tx, mut rx) = mpsc::channel(32);
        let listener = GloveListener::new(tx, settings());
        listener.start(source).unwrap();

        feed.send("0 90 0 0 0".into()).unwrap();
        assert_eq!(rx.recv().await, Some(GloveEvent::Connected));
        assert_eq!(rx.recv().await, Some(GloveEvent::FingersChanged(finger(2))));

        listener.stop();

        // Would release finger 2 if it were processed
        feed.send("0 0 0 0 0".into()).unwrap();
        assert_eq!(rx.recv().await, Some(GloveEvent::Disconnected));

        // The thread owns the last sender, so the channel closing means it exited
        drop(listener);
        assert_eq!(rx.recv().await, None);
    }

    #[tokio::test]
    async fn test_settings_change_applies_to_next_sample() {
        let (feed, source) = line_feed();
        let (tx, mut rx) = mpsc::channel(32);
        let listener = GloveListener::new(tx, settings());
        let control = listener.control();
        listener.start(source).unwrap();

        feed.send("0 0 0 20 0".into()).unwrap();
        assert_eq!(rx.recv().await, Some(GloveEvent::Connected));
        assert_eq!(rx.recv().await, Some(GloveEvent::FingersChanged(finger(4))));

        control.set_sensitivity(Sensitivity::uniform(30));
        feed.send("0 0 0 20 0".into()).unwrap();
        assert_eq!(
            rx.recv().await,
            Some(GloveEvent::FingersChanged(FingerVector::default()))
        );

        control.set_aggregation_window(3);
        assert_eq!(control.settings().aggregation_window, 3);

        drop(feed);
        assert_eq!(rx.recv().await, Some(GloveEvent::Disconnected));
    }
}
