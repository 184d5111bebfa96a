//! Answer reconciliation for streamed debate output.
//!
//! The backend streams whole-answer snapshots, not deltas. The reconciler
//! keeps three slots per request: the first non-empty snapshot, the latest
//! streaming snapshot, and the verified final. Replacement is wholesale;
//! snapshots are never merged. Envelopes stamped with a request id other
//! than the current one are discarded, and once a request is sealed (final
//! received or the request abandoned) nothing mutates its answers.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::events::{Envelope, RequestId, Source, Tier};

/// One answer snapshot.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Answer {
    /// Full answer text at the time of the snapshot.
    pub text: String,
    /// Confidence estimate that accompanied the snapshot, if any.
    pub confidence: Option<f32>,
    /// Citations attached to the snapshot.
    pub sources: Vec<Source>,
    /// Tier that produced the snapshot, per the last state announcement.
    pub model: Option<Tier>,
    /// When the snapshot was recorded.
    pub received_at: DateTime<Utc>,
}

/// The reconciled answer slots for one request.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct AnswerSet {
    /// Request these answers belong to.
    pub request_id: Option<RequestId>,
    /// First non-empty snapshot seen, captured once per request.
    pub first: Option<Answer>,
    /// Latest streaming snapshot, replaced wholesale on every progress.
    pub partial: Option<Answer>,
    /// Verified final answer.
    #[serde(rename = "final")]
    pub final_answer: Option<Answer>,
}

/// Which slots an applied envelope changed.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AnswerPatch {
    /// The partial slot was replaced.
    Partial { captured_first: bool },
    /// The final slot was recorded and the request sealed.
    Final { captured_first: bool },
}

/// Applies envelopes to the answer slots of the current request.
#[derive(Debug, Default)]
pub struct AnswerReconciler {
    answers: AnswerSet,
    tier: Option<Tier>,
    sealed: bool,
}

impl AnswerReconciler {
    pub fn new() -> Self {
        Self::default()
    }

    /// Reset the slots for a new request. Answers from the superseded
    /// request are dropped.
    pub fn begin_request(&mut self, request_id: RequestId) {
        self.answers = AnswerSet {
            request_id: Some(request_id),
            ..AnswerSet::default()
        };
        self.tier = None;
        self.sealed = false;
    }

    /// Seal the current request; later envelopes no longer mutate it.
    pub fn seal(&mut self) {
        self.sealed = true;
    }

    pub fn is_sealed(&self) -> bool {
        self.sealed
    }

    /// Snapshot of the current answer slots.
    pub fn answers(&self) -> AnswerSet {
        self.answers.clone()
    }

    /// Apply one envelope. Returns the patch that landed, or `None` when
    /// the envelope was discarded (stale, sealed, or no request active)
    /// or carried no answer content.
    pub fn apply(&mut self, envelope: &Envelope) -> Option<AnswerPatch> {
        let current = self.answers.request_id.as_deref()?;
        if envelope.request_id() != current {
            return None;
        }
        if self.sealed {
            return None;
        }

        match envelope {
            Envelope::State { tier, .. } => {
                if tier.is_some() {
                    self.tier = *tier;
                }
                None
            }
            Envelope::Progress {
                confidence_estimate,
                partial_output,
                ..
            } => {
                let snapshot = Answer {
                    text: partial_output.clone(),
                    confidence: Some(*confidence_estimate),
                    sources: Vec::new(),
                    model: self.tier,
                    received_at: Utc::now(),
                };
                let captured_first = self.capture_first(&snapshot);
                self.answers.partial = Some(snapshot);
                Some(AnswerPatch::Partial { captured_first })
            }
            Envelope::Final {
                partial_output,
                sources,
                ..
            } => {
                let snapshot = Answer {
                    text: partial_output.clone(),
                    confidence: None,
                    sources: sources.clone(),
                    model: self.tier,
                    received_at: Utc::now(),
                };
                let captured_first = self.capture_first(&snapshot);
                self.answers.final_answer = Some(snapshot);
                self.sealed = true;
                Some(AnswerPatch::Final { captured_first })
            }
        }
    }

    fn capture_first(&mut self, snapshot: &Answer) -> bool {
        if self.answers.first.is_some() || snapshot.text.is_empty() {
            return false;
        }
        self.answers.first = Some(snapshot.clone());
        true
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::events::Phase;

    fn progress(request_id: &str, confidence: f32, text: &str) -> Envelope {
        Envelope::Progress {
            request_id: request_id.to_string(),
            confidence_estimate: confidence,
            partial_output: text.to_string(),
        }
    }

    fn final_answer(request_id: &str, text: &str) -> Envelope {
        Envelope::Final {
            request_id: request_id.to_string(),
            partial_output: text.to_string(),
            sources: vec![Source {
                title: Some("Ref".to_string()),
                url: "https://example.com".to_string(),
            }],
        }
    }

    #[test]
    fn test_progress_replaces_wholesale() {
        let mut reconciler = AnswerReconciler::new();
        reconciler.begin_request("req-1".to_string());

        reconciler.apply(&progress("req-1", 0.2, "draft one")).unwrap();
        reconciler.apply(&progress("req-1", 0.6, "draft two")).unwrap();

        let answers = reconciler.answers();
        let partial = answers.partial.unwrap();
        assert_eq!(partial.text, "draft two");
        assert_eq!(partial.confidence, Some(0.6));
    }

    #[test]
    fn test_first_is_captured_once() {
        let mut reconciler = AnswerReconciler::new();
        reconciler.begin_request("req-1".to_string());

        let patch = reconciler.apply(&progress("req-1", 0.2, "draft one")).unwrap();
        assert_eq!(patch, AnswerPatch::Partial { captured_first: true });

        let patch = reconciler.apply(&progress("req-1", 0.6, "draft two")).unwrap();
        assert_eq!(patch, AnswerPatch::Partial { captured_first: false });

        let answers = reconciler.answers();
        assert_eq!(answers.first.unwrap().text, "draft one");
    }

    #[test]
    fn test_empty_progress_replaces_but_never_captures_first() {
        let mut reconciler = AnswerReconciler::new();
        reconciler.begin_request("req-1".to_string());

        let patch = reconciler.apply(&progress("req-1", 0.1, "")).unwrap();
        assert_eq!(patch, AnswerPatch::Partial { captured_first: false });

        let answers = reconciler.answers();
        assert!(answers.first.is_none());
        assert_eq!(answers.partial.unwrap().text, "");
    }

    #[test]
    fn test_stale_envelope_is_discarded() {
        let mut reconciler = AnswerReconciler::new();
        reconciler.begin_request("req-1".to_string());
        reconciler.apply(&progress("req-1", 0.4, "old answer")).unwrap();

        reconciler.begin_request("req-2".to_string());
        assert_eq!(reconciler.apply(&progress("req-1", 0.9, "late")), None);

        let answers = reconciler.answers();
        assert_eq!(answers.request_id.as_deref(), Some("req-2"));
        assert!(answers.partial.is_none());
    }

    #[test]
    fn test_final_seals_the_request() {
        let mut reconciler = AnswerReconciler::new();
        reconciler.begin_request("req-1".to_string());
        reconciler.apply(&progress("req-1", 0.5, "draft")).unwrap();
        reconciler.apply(&final_answer("req-1", "verified")).unwrap();
        assert!(reconciler.is_sealed());

        // Nothing lands after the final, not even another final.
        assert_eq!(reconciler.apply(&progress("req-1", 0.9, "more")), None);
        assert_eq!(reconciler.apply(&final_answer("req-1", "again")), None);

        let answers = reconciler.answers();
        assert_eq!(answers.final_answer.unwrap().text, "verified");
        assert_eq!(answers.partial.unwrap().text, "draft");
    }

    #[test]
    fn test_final_captures_first_when_nothing_streamed() {
        let mut reconciler = AnswerReconciler::new();
        reconciler.begin_request("req-1".to_string());

        let patch = reconciler.apply(&final_answer("req-1", "only answer")).unwrap();
        assert_eq!(patch, AnswerPatch::Final { captured_first: true });

        let answers = reconciler.answers();
        assert_eq!(answers.first.unwrap().text, "only answer");
        assert_eq!(answers.final_answer.unwrap().sources.len(), 1);
    }

    #[test]
    fn test_snapshots_carry_last_announced_tier() {
        let mut reconciler = AnswerReconciler::new();
        reconciler.begin_request("req-1".to_string());

        let state = Envelope::State {
            request_id: "req-1".to_string(),
            phase: Phase::Validating,
            tier: Some(Tier::T2),
        };
        assert_eq!(reconciler.apply(&state), None);

        reconciler.apply(&progress("req-1", 0.5, "draft")).unwrap();
        let answers = reconciler.answers();
        assert_eq!(answers.partial.unwrap().model, Some(Tier::T2));
    }

    #[test]
    fn test_seal_blocks_late_envelopes() {
        let mut reconciler = AnswerReconciler::new();
        reconciler.begin_request("req-1".to_string());
        reconciler.apply(&progress("req-1", 0.4, "draft")).unwrap();

        reconciler.seal();
        assert_eq!(reconciler.apply(&final_answer("req-1", "late")), None);
        assert!(reconciler.answers().final_answer.is_none());
    }

    #[test]
    fn test_begin_request_resets_slots() {
        let mut reconciler = AnswerReconciler::new();
        reconciler.begin_request("req-1".to_string());
        reconciler.apply(&final_answer("req-1", "done")).unwrap();

        reconciler.begin_request("req-2".to_string());
        let answers = reconciler.answers();
        assert!(answers.first.is_none());
        assert!(answers.partial.is_none());
        assert!(answers.final_answer.is_none());
        assert!(!reconciler.is_sealed());
    }

    #[test]
    fn test_apply_without_active_request() {
        let mut reconciler = AnswerReconciler::new();
        assert_eq!(reconciler.apply(&progress("req-1", 0.4, "draft")), None);
    }
}
