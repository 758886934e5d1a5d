//! chord-glove-daemon: types text from flex-sensor glove chords
//!
//! The daemon reads flex samples from the glove bridge on stdin and provides:
//! - Per-finger thresholding into finger activation events
//! - Chord decoding (one or two sequential fingers) into letters, digits
//!   and control actions
//! - IPC server exposing the typed text and live text events
//!
//! Bluetooth transport, calibration and rendering live in other processes.

mod chord;
mod config;
mod events;
mod glove;
mod ipc;
mod lifecycle;
mod text;
mod writer;

use std::io::BufReader;

use anyhow::{Context, Result};
use tokio::sync::{broadcast, mpsc, watch};
use tracing::{error, info, warn};
use tracing_subscriber::EnvFilter;

use crate::config::Config;
use crate::events::TextEvent;
use crate::glove::GloveListener;
use crate::ipc::{Server, WriterLink};
use crate::lifecycle::ShutdownSignal;
use crate::text::TextSnapshot;
use crate::writer::TextWriter;

#[tokio::main]
async fn main() -> Result<()> {
    // Initialize logging
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")),
        )
        .with_writer(std::io::stderr)
        .init();

    info!(
        version = env!("CARGO_PKG_VERSION"),
        "chord-glove-daemon starting"
    );

    let config = Config::load()?;
    config.ensure_dirs()?;
    info!(
        ?config.socket_path,
        apply_delay_ms = config.apply_delay.as_millis(),
        sensitivity = ?config.glove.sensitivity.thresholds(),
        aggregation_window = config.glove.aggregation_window,
        "configuration loaded"
    );

    let mut shutdown = ShutdownSignal::new().context("failed to register signal handlers")?;

    // Glove listener -> text writer
    let (glove_tx, glove_rx) = mpsc::channel(64);
    // IPC server -> text writer
    let (command_tx, command_rx) = mpsc::channel(16);
    // Text writer -> subscribers
    let (event_tx, _event_rx) = broadcast::channel::<TextEvent>(128);
    let (snapshot_tx, snapshot_rx) = watch::channel(TextSnapshot::default());

    let mut text_writer = TextWriter::new(config.apply_delay, event_tx.clone(), snapshot_tx);

    // Samples arrive on stdin from the glove bridge
    let glove_listener = GloveListener::new(glove_tx, config.glove);
    match glove_listener.start(BufReader::new(std::io::stdin())) {
        Ok(()) => {
            info!("glove listener started");
        }
        Err(e) => {
            error!(?e, "failed to start glove listener");
            warn!("continuing without glove input");
        }
    }

    let server = Server::new(
        &config.socket_path,
        WriterLink {
            snapshot_rx,
            command_tx,
            event_tx: event_tx.clone(),
        },
        glove_listener.control(),
    )?;

    let mut log_event_rx = event_tx.subscribe();

    info!("daemon initialized, entering main loop");

    tokio::select! {
        // The listener keeps a glove sender alive, so this only returns if
        // the writer itself stops
        _ = text_writer.run(glove_rx, command_rx) => {
            info!("text writer exited");
        }

        result = server.run() => {
            if let Err(e) = result {
                error!(?e, "IPC server error");
            }
        }

        // Trace the typed text as it changes
        _ = async {
            loop {
                match log_event_rx.recv().await {
                    Ok(event) => {
                        info!(%event, "text event");
                    }
                    Err(broadcast::error::RecvError::Lagged(n)) => {
                        warn!(skipped = n, "text event receiver lagged");
                    }
                    Err(broadcast::error::RecvError::Closed) => {
                        break;
                    }
                }
            }
        } => {
            info!("text event logger exited");
        }

        reason = shutdown.wait() => {
            info!(%reason, "shutdown signal received");
        }
    }

    info!("shutting down...");

    glove_listener.stop();
    text_writer.dispose();
    server.shutdown().await;

    info!(
        text_len = text_writer.text().chars().count(),
        mode = %text_writer.mode(),
        "chord-glove-daemon stopped"
    );

    Ok(())
}
