//! Event infrastructure for the debate stream
//!
//! Two pieces:
//!
//! 1. **Envelope types** (`types.rs`): the closed tagged sum every inbound
//!    wire message is decoded into, plus the phase/tier vocabulary.
//!
//! 2. **Event Bus** (`bus.rs`): per-session synchronous pub/sub with
//!    per-listener fault isolation, dispatching in registration order.
//!
//! # Event Flow
//!
//! ```text
//! ┌───────────────┐     ┌──────────────┐     ┌──────────────┐
//! │ Token Channel │────▶│   Session    │────▶│  Event Bus   │
//! │   (decode)    │     │   (apply)    │     │  (fan out)   │
//! └───────────────┘     └──────────────┘     └──────────────┘
//! ```
//!
//! Observers receive the raw envelope stream; the session's answer and phase
//! snapshots are already updated by the time listeners run.

pub mod bus;
pub mod types;

// Re-export core types
pub use bus::{EventBus, Listener, ListenerId, SharedEventBus};
pub use types::{new_request_id, Envelope, Phase, RequestId, Source, Tier};
