//! Runtime configuration sourced from the environment.

use std::time::Duration;

use crate::channel::TcpTransport;

const DEFAULT_BACKEND_ADDR: &str = "127.0.0.1:7343";
const DEFAULT_CONNECT_TIMEOUT_MS: u64 = 5_000;

/// Connection settings for the debate backend and feedback endpoint.
#[derive(Debug, Clone)]
pub struct SynthesisConfig {
    /// Address of the debate backend.
    pub backend_addr: String,
    /// Feedback endpoint; feedback recording is disabled when unset.
    pub feedback_url: Option<String>,
    /// Transport connect timeout.
    pub connect_timeout: Duration,
}

impl Default for SynthesisConfig {
    fn default() -> Self {
        Self {
            backend_addr: DEFAULT_BACKEND_ADDR.to_string(),
            feedback_url: None,
            connect_timeout: Duration::from_millis(DEFAULT_CONNECT_TIMEOUT_MS),
        }
    }
}

impl SynthesisConfig {
    /// Read configuration from `DEBATE_BACKEND_ADDR`, `DEBATE_FEEDBACK_URL`,
    /// and `DEBATE_CONNECT_TIMEOUT_MS`, falling back to defaults.
    pub fn from_env() -> Self {
        Self {
            backend_addr: std::env::var("DEBATE_BACKEND_ADDR")
                .unwrap_or_else(|_| DEFAULT_BACKEND_ADDR.to_string()),
            feedback_url: std::env::var("DEBATE_FEEDBACK_URL")
                .ok()
                .filter(|v| !v.is_empty()),
            connect_timeout: connect_timeout_from_env(),
        }
    }

    /// TCP transport pointed at the configured backend.
    pub fn transport(&self) -> TcpTransport {
        TcpTransport::new(self.backend_addr.clone(), self.connect_timeout)
    }
}

fn connect_timeout_from_env() -> Duration {
    let ms = std::env::var("DEBATE_CONNECT_TIMEOUT_MS")
        .ok()
        .and_then(|v| v.parse::<u64>().ok())
        .filter(|v| *v > 0)
        .unwrap_or(DEFAULT_CONNECT_TIMEOUT_MS);
    Duration::from_millis(ms)
}
