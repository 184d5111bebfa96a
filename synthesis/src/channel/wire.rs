//! Wire protocol spoken over the token channel
//!
//! Inbound: one JSON object per line, tagged by `type`. Outbound: one JSON
//! request per `send`, camelCase field names. The wire carries no request
//! ids; attribution happens when a decoded message becomes an `Envelope`.

use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::events::{Envelope, Phase, RequestId, Source, Tier};

/// Failure to decode one inbound line
#[derive(Debug, Error)]
#[error("malformed wire message: {0}")]
pub struct WireError(#[from] serde_json::Error);

/// One inbound message from the debate backend
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum WireMessage {
    /// The request moved to a new phase and/or tier.
    State {
        phase: Phase,
        #[serde(default, skip_serializing_if = "Option::is_none")]
        tier: Option<Tier>,
    },

    /// Mid-stream answer snapshot.
    Progress {
        confidence_estimate: f32,
        partial_output: String,
    },

    /// Verified synthesis; last message of the request.
    Final {
        partial_output: String,
        #[serde(default, skip_serializing_if = "Vec::is_empty")]
        sources: Vec<Source>,
    },
}

impl WireMessage {
    /// Decode one inbound line.
    pub fn decode(line: &str) -> Result<Self, WireError> {
        Ok(serde_json::from_str(line)?)
    }

    /// Attribute this message to a request, producing the typed envelope.
    pub fn into_envelope(self, request_id: RequestId) -> Envelope {
        match self {
            WireMessage::State { phase, tier } => Envelope::State {
                request_id,
                phase,
                tier,
            },
            WireMessage::Progress {
                confidence_estimate,
                partial_output,
            } => Envelope::Progress {
                request_id,
                confidence_estimate,
                partial_output,
            },
            WireMessage::Final {
                partial_output,
                sources,
            } => Envelope::Final {
                request_id,
                partial_output,
                sources,
            },
        }
    }
}

/// One outbound user query
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct OutboundRequest {
    pub session_id: String,
    pub message: String,
}

impl OutboundRequest {
    pub fn new(session_id: impl Into<String>, message: impl Into<String>) -> Self {
        Self {
            session_id: session_id.into(),
            message: message.into(),
        }
    }

    /// Encode as a single wire line (the codec appends the newline).
    pub fn encode(&self) -> Result<String, WireError> {
        Ok(serde_json::to_string(self)?)
    }
}
