//! Pluggable byte transport under the token channel
//!
//! The channel frames whatever stream the transport dials; production uses
//! TCP, tests substitute an in-memory duplex pipe.

use std::time::Duration;

use async_trait::async_trait;
use thiserror::Error;
use tokio::io::{AsyncRead, AsyncWrite};
use tokio::net::TcpStream;
use tracing::debug;

/// Full-duplex byte stream the token channel frames
pub trait TransportStream: AsyncRead + AsyncWrite + Send + Unpin {}

impl<T: AsyncRead + AsyncWrite + Send + Unpin> TransportStream for T {}

/// Error establishing a transport connection
#[derive(Debug, Error)]
pub enum TransportError {
    #[error("connection to {addr} timed out after {timeout_ms}ms")]
    Timeout { addr: String, timeout_ms: u64 },

    #[error("connection failed: {0}")]
    Io(#[from] std::io::Error),
}

/// Dials the debate backend on behalf of one session
#[async_trait]
pub trait Transport: Send + Sync {
    /// Establish a fresh full-duplex stream for the given session.
    async fn connect(&self, session_id: &str) -> Result<Box<dyn TransportStream>, TransportError>;
}

/// TCP transport with a connect timeout
pub struct TcpTransport {
    addr: String,
    connect_timeout: Duration,
}

impl TcpTransport {
    pub fn new(addr: impl Into<String>, connect_timeout: Duration) -> Self {
        Self {
            addr: addr.into(),
            connect_timeout,
        }
    }
}

#[async_trait]
impl Transport for TcpTransport {
    async fn connect(&self, session_id: &str) -> Result<Box<dyn TransportStream>, TransportError> {
        let stream = tokio::time::timeout(self.connect_timeout, TcpStream::connect(&self.addr))
            .await
            .map_err(|_| TransportError::Timeout {
                addr: self.addr.clone(),
                timeout_ms: self.connect_timeout.as_millis() as u64,
            })?
            .map_err(TransportError::Io)?;

        debug!(addr = %self.addr, session_id, "Transport connected");
        Ok(Box::new(stream))
    }
}
