//! Feedback recorder posting user verdicts to the feedback endpoint.
//!
//! Recording is best-effort. The synchronous `record` reports delivery
//! problems to the caller; `record_detached` is fire-and-forget and only
//! logs the outcome, so a slow or absent endpoint never stalls a session.

use std::time::Duration;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use thiserror::Error;
use tracing::{info, warn};

/// User verdict on one answer.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum FeedbackDirection {
    Up,
    Down,
}

impl std::fmt::Display for FeedbackDirection {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Up => write!(f, "up"),
            Self::Down => write!(f, "down"),
        }
    }
}

/// One feedback record, shaped for the endpoint's camelCase API.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct FeedbackRecord {
    /// Request id of the answer being rated.
    pub message_id: String,
    /// Session the answer belongs to.
    pub session_id: String,
    /// Thumbs up or down.
    pub direction: FeedbackDirection,
    /// Tier label of the model that produced the answer, if known.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub model: Option<String>,
    /// When the feedback was given.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub created_at: Option<DateTime<Utc>>,
}

impl FeedbackRecord {
    pub fn new(
        message_id: impl Into<String>,
        session_id: impl Into<String>,
        direction: FeedbackDirection,
    ) -> Self {
        Self {
            message_id: message_id.into(),
            session_id: session_id.into(),
            direction,
            model: None,
            created_at: Some(Utc::now()),
        }
    }

    pub fn with_model(mut self, model: impl Into<String>) -> Self {
        self.model = Some(model.into());
        self
    }
}

/// Errors surfaced by [`FeedbackRecorder::record`]
#[derive(Debug, Error)]
pub enum FeedbackError {
    #[error("feedback request failed: {0}")]
    Request(#[from] reqwest::Error),

    #[error("feedback endpoint rejected the record: status {status}")]
    Rejected { status: u16, body: String },
}

/// Posts feedback records to a single endpoint.
#[derive(Debug, Clone)]
pub struct FeedbackRecorder {
    client: reqwest::Client,
    url: String,
}

impl FeedbackRecorder {
    pub fn new(url: impl Into<String>) -> Self {
        Self {
            client: reqwest::Client::new(),
            url: url.into(),
        }
    }

    pub fn url(&self) -> &str {
        &self.url
    }

    /// Post one record and wait for the endpoint's verdict.
    pub async fn record(&self, record: &FeedbackRecord) -> Result<(), FeedbackError> {
        let response = self
            .client
            .post(&self.url)
            .json(record)
            .timeout(Duration::from_secs(10))
            .send()
            .await?;

        let status = response.status();
        if status.is_success() {
            info!(
                status = %status,
                message_id = %record.message_id,
                direction = %record.direction,
                "Feedback recorded"
            );
            Ok(())
        } else {
            let body = response.text().await.unwrap_or_default();
            Err(FeedbackError::Rejected {
                status: status.as_u16(),
                body,
            })
        }
    }

    /// Post one record without blocking the caller on delivery.
    pub fn record_detached(&self, record: FeedbackRecord) {
        let recorder = self.clone();
        tokio::spawn(async move {
            if let Err(e) = recorder.record(&record).await {
                warn!("Feedback delivery failed: {e}");
            }
        });
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_record_serializes_camel_case() {
        let record = FeedbackRecord::new("req-1", "session-1", FeedbackDirection::Up)
            .with_model("OPUS");
        let value = serde_json::to_value(&record).unwrap();

        assert_eq!(value["messageId"], "req-1");
        assert_eq!(value["sessionId"], "session-1");
        assert_eq!(value["direction"], "up");
        assert_eq!(value["model"], "OPUS");
        assert!(value.get("createdAt").is_some());
    }

    #[test]
    fn test_optional_fields_are_omitted() {
        let record = FeedbackRecord {
            message_id: "req-1".to_string(),
            session_id: "session-1".to_string(),
            direction: FeedbackDirection::Down,
            model: None,
            created_at: None,
        };
        let value = serde_json::to_value(&record).unwrap();

        assert_eq!(value["direction"], "down");
        assert!(value.get("model").is_none());
        assert!(value.get("createdAt").is_none());
    }

    #[test]
    fn test_new_stamps_created_at() {
        let record = FeedbackRecord::new("req-1", "session-1", FeedbackDirection::Up);
        assert!(record.created_at.is_some());
        assert!(record.model.is_none());
    }

    #[test]
    fn test_direction_display() {
        assert_eq!(FeedbackDirection::Up.to_string(), "up");
        assert_eq!(FeedbackDirection::Down.to_string(), "down");
    }
}
