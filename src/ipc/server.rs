//! Unix domain socket server for IPC
//!
//! Provides request-response communication and push notifications of text
//! events to subscribed clients.

use std::io::ErrorKind;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::Instant;

use anyhow::{bail, Context, Result};
use tokio::io::{AsyncRead, AsyncReadExt, AsyncWrite, AsyncWriteExt};
use tokio::net::UnixListener;
use tokio::sync::broadcast::error::RecvError;
use tokio::sync::{broadcast, mpsc, watch};
use tokio::task::JoinHandle;
use tracing::{debug, error, info, warn};

use crate::chord::ApplyDelay;
use crate::events::TextEvent;
use crate::glove::{GloveControl, Sensitivity};
use crate::text::TextSnapshot;
use crate::writer::WriterCommand;

use super::protocol::{DaemonStatus, Notification, Request, Response, MAX_FRAME_LEN};

/// Channels connecting the server to the text writer
#[derive(Clone)]
pub struct WriterLink {
    /// Latest writer state
    pub snapshot_rx: watch::Receiver<TextSnapshot>,
    /// Requests to the writer
    pub command_tx: mpsc::Sender<WriterCommand>,
    /// Source of notifications for subscribed clients
    pub event_tx: broadcast::Sender<TextEvent>,
}

/// State shared by every client handler
struct Shared {
    writer: WriterLink,
    glove: GloveControl,
    start_time: Instant,
}

/// IPC Server handling client connections
pub struct Server {
    socket_path: PathBuf,
    listener: Option<UnixListener>,
    shared: Arc<Shared>,
    shutdown_tx: broadcast::Sender<()>,
}

/// A frame read by a client's reader task
type Incoming = std::result::Result<Request, String>;

/// Aborts the wrapped task when dropped
struct AbortOnDrop(JoinHandle<()>);

impl Drop for AbortOnDrop {
    fn drop(&mut self) {
        self.0.abort();
    }
}

impl Server {
    /// Create a new IPC server bound to `socket_path`
    pub fn new(socket_path: &Path, writer: WriterLink, glove: GloveControl) -> Result<Self> {
        if let Some(parent) = socket_path.parent() {
            std::fs::create_dir_all(parent).context("failed to create socket directory")?;
        }

        // Remove stale socket if it exists
        if socket_path.exists() {
            std::fs::remove_file(socket_path).context("failed to remove stale socket")?;
        }

        let listener = UnixListener::bind(socket_path).context("failed to bind Unix socket")?;

        // Owner-only access
        #[cfg(unix)]
        {
            use std::os::unix::fs::PermissionsExt;
            std::fs::set_permissions(socket_path, std::fs::Permissions::from_mode(0o600))?;
        }

        let (shutdown_tx, _) = broadcast::channel(1);

        info!(?socket_path, "IPC server listening");

        Ok(Self {
            socket_path: socket_path.to_owned(),
            listener: Some(listener),
            shared: Arc::new(Shared {
                writer,
                glove,
                start_time: Instant::now(),
            }),
            shutdown_tx,
        })
    }

    /// Run the server, accepting connections
    pub async fn run(&self) -> Result<()> {
        let listener = self.listener.as_ref().context("server not initialized")?;

        loop {
            match listener.accept().await {
                Ok((stream, _addr)) => {
                    debug!("client connected");
                    let shared = Arc::clone(&self.shared);
                    let mut shutdown_rx = self.shutdown_tx.subscribe();

                    tokio::spawn(async move {
                        tokio::select! {
                            result = handle_client(stream, shared) => {
                                if let Err(e) = result {
                                    warn!(?e, "client handler error");
                                }
                            }
                            _ = shutdown_rx.recv() => {
                                debug!("client handler shutting down");
                            }
                        }
                    });
                }
                Err(e) => {
                    error!(?e, "accept error");
                }
            }
        }
    }

    /// Gracefully shutdown the server
    pub async fn shutdown(&self) {
        let _ = self.shutdown_tx.send(());

        if self.socket_path.exists() {
            if let Err(e) = std::fs::remove_file(&self.socket_path) {
                warn!(?e, "failed to remove socket file");
            }
        }

        info!("IPC server shutdown complete");
    }
}

/// Serve one client until it disconnects.
///
/// Requests are read on a separate task so that notifications can be pushed
/// while the client is idle.
async fn handle_client<S>(stream: S, shared: Arc<Shared>) -> Result<()>
where
    S: AsyncRead + AsyncWrite + Send + 'static,
{
    let (mut reader, mut writer) = tokio::io::split(stream);
    let (request_tx, mut request_rx) = mpsc::channel::<Incoming>(8);

    // Also aborted when this future is dropped on shutdown
    let _reader_task = AbortOnDrop(tokio::spawn(async move {
        if let Err(e) = read_requests(&mut reader, request_tx).await {
            warn!(?e, "client read error");
        }
    }));

    let mut events: Option<broadcast::Receiver<TextEvent>> = None;

    loop {
        tokio::select! {
            incoming = request_rx.recv() => {
                let Some(incoming) = incoming else {
                    debug!("client disconnected");
                    break;
                };

                let response = match incoming {
                    Ok(request) => {
                        debug!(?request, "received request");
                        if request == Request::Subscribe && events.is_none() {
                            events = Some(shared.writer.event_tx.subscribe());
                            debug!("client subscribed to notifications");
                        }
                        process_request(request, &shared).await
                    }
                    Err(message) => Response::error("invalid_request", message),
                };

                write_frame(&mut writer, &response).await?;
            }

            event = next_event(&mut events) => match event {
                Ok(event) => {
                    write_frame(&mut writer, &Notification::Event { event }).await?;
                }
                Err(RecvError::Lagged(n)) => {
                    warn!(skipped = n, "subscriber lagged");
                }
                Err(RecvError::Closed) => {
                    events = None;
                }
            },
        }
    }

    Ok(())
}

/// Next event for a subscribed client; never resolves otherwise
async fn next_event(
    events: &mut Option<broadcast::Receiver<TextEvent>>,
) -> std::result::Result<TextEvent, RecvError> {
    match events {
        Some(rx) => rx.recv().await,
        None => std::future::pending().await,
    }
}

/// Forward parsed frames until EOF
async fn read_requests<R>(reader: &mut R, request_tx: mpsc::Sender<Incoming>) -> Result<()>
where
    R: AsyncRead + Unpin,
{
    while let Some(body) = read_frame(reader).await? {
        let incoming = serde_json::from_slice::<Request>(&body)
            .map_err(|e| format!("failed to parse request: {e}"));

        if request_tx.send(incoming).await.is_err() {
            break;
        }
    }
    Ok(())
}

/// Read a length-prefixed frame, `None` on clean EOF
async fn read_frame<R>(reader: &mut R) -> Result<Option<Vec<u8>>>
where
    R: AsyncRead + Unpin,
{
    let mut len_buf = [0u8; 4];
    match reader.read_exact(&mut len_buf).await {
        Ok(_) => {}
        Err(e) if e.kind() == ErrorKind::UnexpectedEof => return Ok(None),
        Err(e) => return Err(e.into()),
    }

    let len = u32::from_le_bytes(len_buf) as usize;
    if len > MAX_FRAME_LEN {
        bail!("message of {len} bytes too large");
    }

    let mut body = vec![0u8; len];
    reader
        .read_exact(&mut body)
        .await
        .context("truncated message body")?;
    Ok(Some(body))
}

/// Send a length-prefixed JSON message
async fn write_frame<W, T>(writer: &mut W, msg: &T) -> Result<()>
where
    W: AsyncWrite + Unpin,
    T: serde::Serialize,
{
    let msg_bytes = serde_json::to_vec(msg)?;
    let msg_len = (msg_bytes.len() as u32).to_le_bytes();

    writer.write_all(&msg_len).await?;
    writer.write_all(&msg_bytes).await?;
    writer.flush().await?;

    Ok(())
}

/// Process a request and return a response
async fn process_request(request: Request, shared: &Shared) -> Response {
    match request {
        Request::Ping => Response::Pong,

        Request::GetStatus => {
            let snapshot = shared.writer.snapshot_rx.borrow().clone();
            let uptime_secs = shared.start_time.elapsed().as_secs();
            Response::Status(DaemonStatus::from_snapshot(
                &snapshot,
                shared.glove.settings(),
                uptime_secs,
            ))
        }

        Request::GetText => {
            let snapshot = shared.writer.snapshot_rx.borrow().clone();
            Response::Text {
                text: snapshot.text,
                mode: snapshot.mode,
            }
        }

        Request::SetApplyDelay { delay_ms } => {
            let delay = match ApplyDelay::from_millis(delay_ms) {
                Ok(delay) => delay,
                Err(e) => return Response::error("invalid_apply_delay", e.to_string()),
            };

            match send_command(shared, WriterCommand::SetApplyDelay(delay)).await {
                Ok(()) => {
                    info!(delay_ms, "apply delay changed via IPC");
                    Response::ApplyDelayUpdated { delay_ms }
                }
                Err(response) => response,
            }
        }

        Request::ClearText => match send_command(shared, WriterCommand::ClearText).await {
            Ok(()) => {
                info!("text cleared via IPC");
                Response::TextCleared
            }
            Err(response) => response,
        },

        Request::SetSensitivity { thresholds } => {
            shared.glove.set_sensitivity(Sensitivity::new(thresholds));
            info!(?thresholds, "sensitivity changed via IPC");
            Response::SensitivityUpdated { thresholds }
        }

        Request::SetAggregationSize { size } => {
            shared.glove.set_aggregation_window(size);
            info!(size, "aggregation size changed via IPC");
            Response::AggregationSizeUpdated { size }
        }

        Request::Subscribe => Response::Subscribed,
    }
}

async fn send_command(shared: &Shared, command: WriterCommand) -> std::result::Result<(), Response> {
    shared
        .writer
        .command_tx
        .send(command)
        .await
        .map_err(|_| Response::error("writer_unavailable", "text writer is not running"))
}
