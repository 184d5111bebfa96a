//! Streaming Debate Synthesis Library
//!
//! This library provides:
//! - A line-framed token channel to a debate backend with request attribution
//! - A per-session phase machine driven by backend state announcements
//! - Wholesale answer reconciliation (first / partial / final snapshots)
//! - A synchronous in-order event bus with per-listener panic isolation
//! - Fire-and-forget feedback recording
//!
//! # Usage
//!
//! ```no_run
//! use std::sync::Arc;
//! use synthesis::{EventBus, SessionController, SynthesisConfig};
//!
//! #[tokio::main]
//! async fn main() -> Result<(), synthesis::SessionError> {
//!     let config = SynthesisConfig::from_env();
//!     let controller = SessionController::new(
//!         "session-1",
//!         Arc::new(config.transport()),
//!         EventBus::new().shared(),
//!     );
//!     controller.subscribe(|envelope| println!("{envelope:?}"));
//!     let request_id = controller.send("why is the sky blue?").await?;
//!     println!("streaming request {request_id}");
//!     controller.close().await;
//!     Ok(())
//! }
//! ```

#![allow(clippy::uninlined_format_args)]

pub mod channel;
pub mod config;
pub mod events;
pub mod feedback;
pub mod reconcile;
pub mod session;

// Re-export key event types
pub use events::{
    new_request_id, Envelope, EventBus, Listener, ListenerId, Phase, RequestId, SharedEventBus,
    Source, Tier,
};

// Re-export key channel types
pub use channel::{
    ChannelError, OutboundRequest, TcpTransport, TokenChannel, Transport, TransportError,
    TransportStream, WireError, WireMessage,
};

// Re-export key session types
pub use session::{
    DebateSession, PhaseTransition, SessionController, SessionError, SharedSessionController,
    TransitionError,
};

// Re-export answer reconciliation types
pub use reconcile::{Answer, AnswerPatch, AnswerReconciler, AnswerSet};

// Re-export feedback types
pub use feedback::{FeedbackDirection, FeedbackError, FeedbackRecord, FeedbackRecorder};

// Re-export configuration
pub use config::SynthesisConfig;
