//! Envelope and vocabulary types for the debate stream
//!
//! Every inbound wire message becomes exactly one `Envelope`, stamped with
//! the request id it was attributed to at read time.

use serde::{Deserialize, Serialize};

/// Correlation key for one `send`-initiated exchange
pub type RequestId = String;

/// Generate a fresh request id
pub fn new_request_id() -> RequestId {
    uuid::Uuid::new_v4().to_string()
}

/// Lifecycle stage of one debate request.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Phase {
    /// Backends are collecting candidate answers.
    Gathering,
    /// Candidates are being cross-checked.
    Validating,
    /// Confidence fell short and a higher tier is taking over.
    Escalating,
    /// A verified synthesis has been accepted. Terminal.
    Synthesizing,
}

impl Phase {
    /// Whether this is the terminal phase.
    pub fn is_terminal(self) -> bool {
        matches!(self, Self::Synthesizing)
    }

    /// Whether this phase allows transition to a new phase.
    pub fn can_transition(self) -> bool {
        !self.is_terminal()
    }

    /// Valid transitions from this phase.
    ///
    /// Escalation loops back through validation; synthesis admits nothing
    /// until a new request resets the machine.
    pub fn valid_transitions(self) -> &'static [Phase] {
        match self {
            Self::Gathering => &[Self::Validating],
            Self::Validating => &[Self::Escalating, Self::Synthesizing],
            Self::Escalating => &[Self::Validating],
            Self::Synthesizing => &[],
        }
    }
}

impl std::fmt::Display for Phase {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Gathering => write!(f, "gathering"),
            Self::Validating => write!(f, "validating"),
            Self::Escalating => write!(f, "escalating"),
            Self::Synthesizing => write!(f, "synthesizing"),
        }
    }
}

/// Cost/capability level of the answering model, escalated by the backend.
///
/// The client observes tier changes; it never decides them.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum Tier {
    /// Cheapest tier, first to answer.
    T1,
    /// Mid tier.
    T2,
    /// Most capable tier, last resort.
    #[serde(rename = "OPUS")]
    Opus,
}

impl Tier {
    /// Wire/display name of the tier.
    pub fn as_str(self) -> &'static str {
        match self {
            Self::T1 => "T1",
            Self::T2 => "T2",
            Self::Opus => "OPUS",
        }
    }
}

impl std::fmt::Display for Tier {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

/// A supporting citation attached to a final answer.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Source {
    /// Human-readable label, when the backend provides one.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub title: Option<String>,
    /// Where the supporting material lives.
    pub url: String,
}

/// One typed unit of the debate stream.
///
/// A closed sum: each variant carries only the fields valid for it, so
/// dispatch sites match exhaustively instead of probing optionals.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum Envelope {
    /// The backend moved the request to a new phase and/or tier.
    State {
        request_id: RequestId,
        phase: Phase,
        tier: Option<Tier>,
    },

    /// A mid-stream answer snapshot with the backend's confidence so far.
    Progress {
        request_id: RequestId,
        confidence_estimate: f32,
        partial_output: String,
    },

    /// The verified synthesis. Terminal for its request id.
    Final {
        request_id: RequestId,
        partial_output: String,
        sources: Vec<Source>,
    },
}

impl Envelope {
    /// The request id this envelope was attributed to.
    pub fn request_id(&self) -> &str {
        match self {
            Envelope::State { request_id, .. } => request_id,
            Envelope::Progress { request_id, .. } => request_id,
            Envelope::Final { request_id, .. } => request_id,
        }
    }

    /// Stable name of the envelope kind, for log fields.
    pub fn kind(&self) -> &'static str {
        match self {
            Envelope::State { .. } => "state",
            Envelope::Progress { .. } => "progress",
            Envelope::Final { .. } => "final",
        }
    }

    /// The phase carried by a `state` envelope.
    pub fn phase(&self) -> Option<Phase> {
        match self {
            Envelope::State { phase, .. } => Some(*phase),
            _ => None,
        }
    }

    /// The tier carried by a `state` envelope.
    pub fn tier(&self) -> Option<Tier> {
        match self {
            Envelope::State { tier, .. } => *tier,
            _ => None,
        }
    }

    /// The confidence estimate carried by a `progress` envelope.
    pub fn confidence_estimate(&self) -> Option<f32> {
        match self {
            Envelope::Progress {
                confidence_estimate,
                ..
            } => Some(*confidence_estimate),
            _ => None,
        }
    }

    /// The answer text carried by this envelope, if any.
    pub fn partial_output(&self) -> Option<&str> {
        match self {
            Envelope::State { .. } => None,
            Envelope::Progress { partial_output, .. } => Some(partial_output),
            Envelope::Final { partial_output, .. } => Some(partial_output),
        }
    }

    /// The sources carried by a `final` envelope.
    pub fn sources(&self) -> Option<&[Source]> {
        match self {
            Envelope::Final { sources, .. } => Some(sources),
            _ => None,
        }
    }

    /// Whether this envelope is terminal for its request id.
    pub fn is_final(&self) -> bool {
        matches!(self, Envelope::Final { .. })
    }
}
