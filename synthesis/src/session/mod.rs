//! Debate Session Lifecycle
//!
//! Per-session phase machine plus the controller that drives it from the
//! token stream. Phases are announced by the backend; the controller never
//! decides to escalate on its own, it only validates and records what the
//! backend reports.
//!
//! # Phase Flow
//!
//! ```text
//! gathering → validating ──► synthesizing (terminal)
//!                │    ▲
//!                ▼    │
//!              escalating
//!                (next tier: T1 → T2 → OPUS)
//! ```
//!
//! Invalid announcements are rejected with the prior phase retained;
//! re-asserting the current phase is accepted as a no-op.

pub mod controller;
pub mod state;

pub use controller::{SessionController, SessionError, SharedSessionController};
pub use state::{DebateSession, PhaseTransition, TransitionError};
