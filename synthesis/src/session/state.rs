//! Session phase machine and per-request lifecycle tracking.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::events::{Phase, RequestId, Tier};

/// A phase transition record.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PhaseTransition {
    /// Previous phase.
    pub from: Phase,
    /// New phase.
    pub to: Phase,
    /// When the transition occurred.
    pub at: DateTime<Utc>,
    /// Reason for the transition.
    pub reason: String,
}

/// Error for invalid phase transitions.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TransitionError {
    pub from: Phase,
    pub to: Phase,
    pub reason: String,
}

impl std::fmt::Display for TransitionError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(
            f,
            "invalid transition {} → {}: {}",
            self.from, self.to, self.reason
        )
    }
}

impl std::error::Error for TransitionError {}

/// A debate session tracking phase, tier, and the in-flight request.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DebateSession {
    /// Unique session identifier.
    pub session_id: String,
    /// Request currently attributed to the token stream, if any.
    pub request_id: Option<RequestId>,
    /// Current phase.
    pub phase: Phase,
    /// Model tier last announced by the backend.
    pub tier: Option<Tier>,
    /// Whether a request is streaming right now.
    pub is_streaming: bool,
    /// Latest confidence estimate reported for the in-flight request.
    pub confidence: Option<f32>,
    /// Last session-level error, if any.
    pub error: Option<String>,
    /// Phase transitions of the current request.
    pub transitions: Vec<PhaseTransition>,
    /// When the session was created.
    pub created_at: DateTime<Utc>,
}

impl DebateSession {
    /// Create a new idle session.
    pub fn new(session_id: &str) -> Self {
        Self {
            session_id: session_id.to_string(),
            request_id: None,
            phase: Phase::Gathering,
            tier: None,
            is_streaming: false,
            confidence: None,
            error: None,
            transitions: Vec::new(),
            created_at: Utc::now(),
        }
    }

    /// Start tracking a new request, superseding any previous one. The
    /// phase machine is force-reset to gathering regardless of where the
    /// previous request left off, and the transition history restarts
    /// with that forced reset as its first record.
    pub fn begin_request(&mut self, request_id: RequestId) {
        self.transitions.clear();
        if self.phase != Phase::Gathering {
            self.record_transition(Phase::Gathering, "request started");
        }
        self.phase = Phase::Gathering;
        self.request_id = Some(request_id);
        self.tier = None;
        self.is_streaming = true;
        self.confidence = None;
        self.error = None;
    }

    /// Apply a backend state announcement. The tier update always lands;
    /// an invalid phase transition is rejected and the prior phase kept.
    /// Re-asserting the current phase is accepted as a no-op.
    pub fn apply_state(&mut self, phase: Phase, tier: Option<Tier>) -> Result<(), TransitionError> {
        if tier.is_some() {
            self.tier = tier;
        }
        if phase == self.phase {
            return Ok(());
        }
        if !self.phase.valid_transitions().contains(&phase) {
            return Err(TransitionError {
                from: self.phase,
                to: phase,
                reason: format!(
                    "not a valid transition (allowed: {:?})",
                    self.phase.valid_transitions()
                ),
            });
        }
        self.record_transition(phase, "backend state update");
        self.phase = phase;
        Ok(())
    }

    /// Record the latest confidence estimate for the in-flight request.
    pub fn record_progress(&mut self, confidence: f32) {
        self.confidence = Some(confidence);
    }

    /// Mark the in-flight request complete. A final answer implies the
    /// synthesizing phase, so the transition is forced even if the backend
    /// never announced it.
    pub fn mark_final(&mut self) -> Option<RequestId> {
        if self.phase != Phase::Synthesizing {
            self.record_transition(Phase::Synthesizing, "final received");
            self.phase = Phase::Synthesizing;
        }
        self.is_streaming = false;
        self.request_id.take()
    }

    /// Abandon the in-flight request, keeping the phase where it stopped.
    pub fn cancel_request(&mut self) -> Option<RequestId> {
        self.is_streaming = false;
        self.request_id.take()
    }

    /// Record a session-level failure and stop streaming.
    pub fn fail(&mut self, error: impl Into<String>) {
        self.error = Some(error.into());
        self.is_streaming = false;
        self.request_id = None;
    }

    /// Whether a request is currently attributed to the stream.
    pub fn has_active_request(&self) -> bool {
        self.request_id.is_some()
    }

    /// Compact status line.
    pub fn status_line(&self) -> String {
        let tier = match self.tier {
            Some(tier) => tier.as_str(),
            None => "-",
        };
        format!(
            "[{}] tier={} | {} | {} transitions | session={}",
            self.phase,
            tier,
            if self.is_streaming { "streaming" } else { "idle" },
            self.transitions.len(),
            self.session_id
        )
    }

    fn record_transition(&mut self, to: Phase, reason: &str) {
        self.transitions.push(PhaseTransition {
            from: self.phase,
            to,
            at: Utc::now(),
            reason: reason.to_string(),
        });
    }
}
