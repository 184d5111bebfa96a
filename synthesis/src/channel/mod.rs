//! Line-framed token channel to the debate backend
//!
//! One channel per session. `send` writes one JSON request per line,
//! dialing the transport first if the channel is down, so a fresh send
//! after `close` transparently reconnects. A reader task decodes inbound
//! lines, stamps each with the active request id, and forwards the typed
//! envelopes to the session worker. Malformed lines are dropped with a
//! warning; lines that arrive while no request is active are dropped
//! silently at debug level.

pub mod transport;
pub mod wire;

pub use transport::{TcpTransport, Transport, TransportError, TransportStream};
pub use wire::{OutboundRequest, WireError, WireMessage};

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

use futures::{SinkExt, StreamExt};
use thiserror::Error;
use tokio::io::{ReadHalf, WriteHalf};
use tokio::sync::{mpsc, Mutex};
use tokio::task::JoinHandle;
use tokio_util::codec::{FramedRead, FramedWrite, LinesCodec, LinesCodecError};
use tracing::{debug, warn};

use crate::events::{Envelope, RequestId};

/// Cap on a single inbound line. Anything longer is a framing fault and
/// severs the stream.
const MAX_LINE_BYTES: usize = 1024 * 1024;

type WireReader = FramedRead<ReadHalf<Box<dyn TransportStream>>, LinesCodec>;
type WireWriter = FramedWrite<WriteHalf<Box<dyn TransportStream>>, LinesCodec>;

/// Errors surfaced by [`TokenChannel`] operations
#[derive(Debug, Error)]
pub enum ChannelError {
    #[error("failed to open token channel: {0}")]
    Connect(#[from] TransportError),

    #[error("failed to write to token channel: {0}")]
    Send(#[from] LinesCodecError),

    #[error("failed to encode outbound request: {0}")]
    Encode(#[from] WireError),
}

struct Connection {
    writer: WireWriter,
    reader: JoinHandle<()>,
}

/// Full-duplex token stream for one debate session. Dropping the
/// channel aborts its reader task.
pub struct TokenChannel {
    transport: Arc<dyn Transport>,
    session_id: String,
    events: mpsc::UnboundedSender<Envelope>,
    active_request: Arc<Mutex<Option<RequestId>>>,
    connected: Arc<AtomicBool>,
    conn: Mutex<Option<Connection>>,
}

impl TokenChannel {
    /// Create a channel for `session_id`. No IO happens until `open` or
    /// the first `send`.
    pub fn new(
        transport: Arc<dyn Transport>,
        session_id: impl Into<String>,
        events: mpsc::UnboundedSender<Envelope>,
    ) -> Self {
        Self {
            transport,
            session_id: session_id.into(),
            events,
            active_request: Arc::new(Mutex::new(None)),
            connected: Arc::new(AtomicBool::new(false)),
            conn: Mutex::new(None),
        }
    }

    pub fn session_id(&self) -> &str {
        &self.session_id
    }

    pub fn is_connected(&self) -> bool {
        self.connected.load(Ordering::SeqCst)
    }

    /// Attribute subsequent inbound lines to `request_id`.
    pub async fn set_active_request(&self, request_id: RequestId) {
        *self.active_request.lock().await = Some(request_id);
    }

    /// Stop attributing inbound lines; the reader drops them until the
    /// next `set_active_request`.
    pub async fn clear_active_request(&self) {
        self.active_request.lock().await.take();
    }

    pub async fn active_request(&self) -> Option<RequestId> {
        self.active_request.lock().await.clone()
    }

    /// Dial the transport and start the reader task. A no-op when the
    /// channel is already up.
    pub async fn open(&self) -> Result<(), ChannelError> {
        let mut guard = self.conn.lock().await;
        if guard.is_some() && self.is_connected() {
            return Ok(());
        }
        if let Some(stale) = guard.take() {
            stale.reader.abort();
        }
        *guard = Some(self.dial().await?);
        Ok(())
    }

    /// Write one request line, reconnecting first if the channel is down.
    /// A write failure tears the connection down so the next send re-dials.
    pub async fn send(&self, request: &OutboundRequest) -> Result<(), ChannelError> {
        let line = request.encode()?;
        let mut guard = self.conn.lock().await;
        let mut connection = match guard.take() {
            Some(connection) if self.is_connected() => connection,
            stale => {
                if let Some(stale) = stale {
                    stale.reader.abort();
                }
                self.dial().await?
            }
        };
        match connection.writer.send(line).await {
            Ok(()) => {
                *guard = Some(connection);
                Ok(())
            }
            Err(error) => {
                self.connected.store(false, Ordering::SeqCst);
                connection.reader.abort();
                warn!(session_id = %self.session_id, %error, "Token channel write failed");
                Err(ChannelError::Send(error))
            }
        }
    }

    /// Tear the connection down. Safe to call repeatedly; a later `send`
    /// opens a fresh connection.
    pub async fn close(&self) {
        self.active_request.lock().await.take();
        let mut guard = self.conn.lock().await;
        if let Some(connection) = guard.take() {
            connection.reader.abort();
            self.connected.store(false, Ordering::SeqCst);
            debug!(session_id = %self.session_id, "Token channel closed");
        }
    }

    /// Abort the reader without waiting on the connection lock. Drop
    /// paths must not block; a contended lock means another task holds
    /// the connection and teardown falls to [`TokenChannel`]'s own drop.
    pub(crate) fn abort_reader(&self) {
        if let Ok(mut guard) = self.conn.try_lock() {
            if let Some(connection) = guard.take() {
                connection.reader.abort();
                self.connected.store(false, Ordering::SeqCst);
            }
        }
    }

    async fn dial(&self) -> Result<Connection, ChannelError> {
        let stream = self.transport.connect(&self.session_id).await?;
        let (read_half, write_half) = tokio::io::split(stream);
        let frames = FramedRead::new(read_half, LinesCodec::new_with_max_length(MAX_LINE_BYTES));
        let reader = tokio::spawn(read_loop(
            frames,
            self.session_id.clone(),
            self.events.clone(),
            Arc::clone(&self.active_request),
            Arc::clone(&self.connected),
        ));
        self.connected.store(true, Ordering::SeqCst);
        debug!(session_id = %self.session_id, "Token channel open");
        Ok(Connection {
            writer: FramedWrite::new(write_half, LinesCodec::new()),
            reader,
        })
    }
}

impl Drop for TokenChannel {
    fn drop(&mut self) {
        if let Some(connection) = self.conn.get_mut().take() {
            connection.reader.abort();
        }
    }
}

async fn read_loop(
    mut frames: WireReader,
    session_id: String,
    events: mpsc::UnboundedSender<Envelope>,
    active_request: Arc<Mutex<Option<RequestId>>>,
    connected: Arc<AtomicBool>,
) {
    while let Some(next) = frames.next().await {
        let line = match next {
            Ok(line) => line,
            Err(error) => {
                warn!(session_id = %session_id, %error, "Token channel read failed, stopping reader");
                break;
            }
        };
        if line.trim().is_empty() {
            continue;
        }
        let message = match WireMessage::decode(&line) {
            Ok(message) => message,
            Err(error) => {
                warn!(
                    session_id = %session_id,
                    %error,
                    bytes = line.len(),
                    "Dropping malformed wire line"
                );
                continue;
            }
        };
        let request_id = match active_request.lock().await.clone() {
            Some(request_id) => request_id,
            None => {
                debug!(session_id = %session_id, "Dropping wire line with no active request");
                continue;
            }
        };
        if events.send(message.into_envelope(request_id)).is_err() {
            // Worker side is gone; the session is shutting down.
            break;
        }
    }
    connected.store(false, Ordering::SeqCst);
    debug!(session_id = %session_id, "Token channel reader stopped");
}
