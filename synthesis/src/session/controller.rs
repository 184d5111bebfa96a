//! Session controller wiring the token channel, phase machine, answer
//! reconciler, and event bus into one per-session pipeline.
//!
//! A worker task drains the channel's envelope queue in arrival order.
//! For each envelope it updates the session and answer slots under one
//! lock, then publishes the envelope on the bus, so listeners always
//! observe snapshots at least as fresh as the envelope they are handed.

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::sync::Mutex as StdMutex;
use std::sync::MutexGuard;

use thiserror::Error;
use tokio::sync::{mpsc, Mutex};
use tokio::task::JoinHandle;
use tracing::{debug, info, warn};

use crate::channel::{ChannelError, OutboundRequest, TokenChannel, Transport};
use crate::events::{new_request_id, Envelope, ListenerId, RequestId, SharedEventBus};
use crate::reconcile::{AnswerReconciler, AnswerSet};
use crate::session::state::DebateSession;

/// Shared handle to a [`SessionController`].
pub type SharedSessionController = Arc<SessionController>;

/// Errors surfaced by [`SessionController`] operations
#[derive(Debug, Error)]
pub enum SessionError {
    #[error("session is closed")]
    Closed,

    #[error("token channel failure: {0}")]
    Channel(#[from] ChannelError),
}

struct CoreState {
    session: DebateSession,
    reconciler: AnswerReconciler,
}

/// Controls one debate session end to end.
pub struct SessionController {
    session_id: String,
    channel: Arc<TokenChannel>,
    bus: SharedEventBus,
    core: Arc<Mutex<CoreState>>,
    worker: StdMutex<Option<JoinHandle<()>>>,
    closed: AtomicBool,
}

impl SessionController {
    /// Create a controller and spawn its worker task. No transport IO
    /// happens until the first `send`. Must be called inside a Tokio
    /// runtime.
    pub fn new(
        session_id: impl Into<String>,
        transport: Arc<dyn Transport>,
        bus: SharedEventBus,
    ) -> Self {
        let session_id = session_id.into();
        let (events_tx, events_rx) = mpsc::unbounded_channel();
        let channel = Arc::new(TokenChannel::new(transport, session_id.clone(), events_tx));
        let core = Arc::new(Mutex::new(CoreState {
            session: DebateSession::new(&session_id),
            reconciler: AnswerReconciler::new(),
        }));
        let worker = tokio::spawn(event_loop(
            events_rx,
            Arc::clone(&core),
            Arc::clone(&channel),
            Arc::clone(&bus),
        ));
        Self {
            session_id,
            channel,
            bus,
            core,
            worker: StdMutex::new(Some(worker)),
            closed: AtomicBool::new(false),
        }
    }

    /// Wrap in an [`Arc`] for sharing across tasks.
    pub fn shared(self) -> SharedSessionController {
        Arc::new(self)
    }

    pub fn session_id(&self) -> &str {
        &self.session_id
    }

    pub fn is_closed(&self) -> bool {
        self.closed.load(Ordering::SeqCst)
    }

    pub fn is_connected(&self) -> bool {
        self.channel.is_connected()
    }

    /// Register a listener for every envelope this session publishes.
    pub fn subscribe(&self, listener: impl Fn(&Envelope) + Send + Sync + 'static) -> ListenerId {
        self.bus.subscribe(listener)
    }

    /// Remove a previously registered listener.
    pub fn unsubscribe(&self, id: ListenerId) {
        self.bus.unsubscribe(id);
    }

    /// Handle to the session's event bus.
    pub fn bus(&self) -> SharedEventBus {
        Arc::clone(&self.bus)
    }

    /// Snapshot of the session state.
    pub async fn session(&self) -> DebateSession {
        self.core.lock().await.session.clone()
    }

    /// Snapshot of the reconciled answer slots.
    pub async fn answers(&self) -> AnswerSet {
        self.core.lock().await.reconciler.answers()
    }

    /// Dispatch a user message to the backend, superseding any request
    /// still in flight. Inbound tokens are attributed to the returned
    /// request id until it completes, is cancelled, or is superseded.
    pub async fn send(&self, message: &str) -> Result<RequestId, SessionError> {
        if self.is_closed() {
            return Err(SessionError::Closed);
        }
        let request_id = new_request_id();
        {
            let mut core = self.core.lock().await;
            core.session.begin_request(request_id.clone());
            core.reconciler.begin_request(request_id.clone());
        }
        self.channel.set_active_request(request_id.clone()).await;

        let request = OutboundRequest::new(&self.session_id, message);
        if let Err(error) = self.channel.send(&request).await {
            self.channel.clear_active_request().await;
            let mut core = self.core.lock().await;
            core.session.fail(error.to_string());
            core.reconciler.seal();
            return Err(error.into());
        }

        info!(
            session_id = %self.session_id,
            request_id = %request_id,
            "Debate request dispatched"
        );
        Ok(request_id)
    }

    /// Abandon the in-flight request. The channel stays open; tokens
    /// still in flight for the old request are dropped at the reader.
    pub async fn cancel(&self) -> Option<RequestId> {
        self.channel.clear_active_request().await;
        let cancelled = {
            let mut core = self.core.lock().await;
            core.reconciler.seal();
            core.session.cancel_request()
        };
        if let Some(request_id) = &cancelled {
            info!(
                session_id = %self.session_id,
                request_id = %request_id,
                "Request cancelled"
            );
        }
        cancelled
    }

    /// Tear the session down: abandon any in-flight request, close the
    /// channel, stop the worker, and drop all listeners. Safe to call
    /// repeatedly; `send` afterwards fails with [`SessionError::Closed`].
    pub async fn close(&self) {
        if self.closed.swap(true, Ordering::SeqCst) {
            return;
        }
        self.channel.close().await;
        {
            let mut core = self.core.lock().await;
            core.reconciler.seal();
            core.session.cancel_request();
        }
        if let Some(worker) = self.worker_slot().take() {
            worker.abort();
        }
        self.bus.clear();
        info!(session_id = %self.session_id, "Session closed");
    }

    fn worker_slot(&self) -> MutexGuard<'_, Option<JoinHandle<()>>> {
        match self.worker.lock() {
            Ok(guard) => guard,
            Err(poisoned) => {
                warn!("worker handle lock poisoned, recovering");
                poisoned.into_inner()
            }
        }
    }
}

impl Drop for SessionController {
    fn drop(&mut self) {
        if let Some(worker) = self.worker_slot().take() {
            worker.abort();
        }
        self.channel.abort_reader();
    }
}

async fn event_loop(
    mut events: mpsc::UnboundedReceiver<Envelope>,
    core: Arc<Mutex<CoreState>>,
    channel: Arc<TokenChannel>,
    bus: SharedEventBus,
) {
    while let Some(envelope) = events.recv().await {
        {
            let mut core = core.lock().await;
            let current = core.session.request_id.as_deref() == Some(envelope.request_id());
            match &envelope {
                Envelope::State { phase, tier, .. } => {
                    if current {
                        if let Err(error) = core.session.apply_state(*phase, *tier) {
                            warn!(
                                session_id = %channel.session_id(),
                                %error,
                                "Rejected phase transition"
                            );
                        }
                    }
                }
                Envelope::Progress {
                    confidence_estimate,
                    ..
                } => {
                    if current {
                        core.session.record_progress(*confidence_estimate);
                    }
                }
                Envelope::Final { .. } => {}
            }
            if let Some(patch) = core.reconciler.apply(&envelope) {
                debug!(request_id = %envelope.request_id(), ?patch, "Answer slots updated");
            }
            if envelope.is_final() && current {
                core.session.mark_final();
                channel.clear_active_request().await;
            }
        }
        bus.publish(&envelope);
    }
    debug!("Session worker stopped");
}
