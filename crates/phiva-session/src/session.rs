//! The single-session streaming chat coordinator.
//!
//! `ChatSession` owns the transcript and the pending-image slot, gates
//! admission through `chatable()` / `interruptable()`, and coordinates one
//! asynchronous generation at a time against a [`ChatEngine`].

use crate::engine::ChatEngine;
use phiva_core::{ImageTensor, Message, MessageRole, Result};
use std::sync::Arc;
use tokio::sync::{Mutex, RwLock, watch};
use tokio_util::sync::CancellationToken;

/// The session state machine.
///
/// `Resetting` is transient: observers may see it on the status channel
/// while a reset is clearing state, but every operation leaves the session
/// in `Idle` or `Generating`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SessionStatus {
    /// Ready for input.
    Idle,
    /// A reply is being produced.
    Generating,
    /// Session state is being cleared.
    Resetting,
}

/// An attached-but-unsent image awaiting the next generation request.
struct PendingImage {
    tensor: ImageTensor,
    /// Display reference for the User message, if the host has one.
    source_path: Option<String>,
}

/// Mutable session state, guarded as a unit so transitions are atomic.
struct SessionState {
    status: SessionStatus,
    messages: Vec<Message>,
    pending_image: Option<PendingImage>,
    /// Monotonic id of the current generation. Bumped by every generate and
    /// reset; a generation task only applies tokens while its id is current.
    generation: u64,
    cancel: Option<CancellationToken>,
}

/// A bounded, single-session streaming chat-inference coordinator.
///
/// The transcript and pending-image slot are owned exclusively by the
/// session; callers observe them through snapshots and mutate them only
/// through [`attach_image`](Self::attach_image),
/// [`request_generate`](Self::request_generate) and
/// [`request_reset_chat`](Self::request_reset_chat).
pub struct ChatSession {
    engine: Arc<dyn ChatEngine>,
    state: Arc<Mutex<SessionState>>,
    status_tx: Arc<watch::Sender<SessionStatus>>,
    report: Arc<RwLock<String>>,
}

impl ChatSession {
    /// Creates an idle session with an empty transcript.
    pub fn new(engine: Arc<dyn ChatEngine>) -> Self {
        let (status_tx, _) = watch::channel(SessionStatus::Idle);
        Self {
            engine,
            state: Arc::new(Mutex::new(SessionState {
                status: SessionStatus::Idle,
                messages: Vec::new(),
                pending_image: None,
                generation: 0,
                cancel: None,
            })),
            status_tx: Arc::new(status_tx),
            report: Arc::new(RwLock::new(String::new())),
        }
    }

    /// Current status, as last published on the status channel.
    pub fn status(&self) -> SessionStatus {
        *self.status_tx.borrow()
    }

    /// True iff the session accepts a new prompt or image right now.
    ///
    /// Pure query; gating every send/attach on it guarantees at most one
    /// in-flight generation.
    pub fn chatable(&self) -> bool {
        self.status() == SessionStatus::Idle
    }

    /// True iff it is safe to navigate away from or reset the session.
    ///
    /// False while a reply is streaming.
    pub fn interruptable(&self) -> bool {
        self.status() == SessionStatus::Idle
    }

    /// Subscribes to status transitions.
    pub fn subscribe(&self) -> watch::Receiver<SessionStatus> {
        self.status_tx.subscribe()
    }

    /// Waits until the session is `Idle`.
    pub async fn wait_idle(&self) {
        let mut rx = self.status_tx.subscribe();
        loop {
            if *rx.borrow_and_update() == SessionStatus::Idle {
                return;
            }
            if rx.changed().await.is_err() {
                return;
            }
        }
    }

    /// Snapshot of the transcript, in display order.
    pub async fn messages(&self) -> Vec<Message> {
        self.state.lock().await.messages.clone()
    }

    /// True if an image is attached and waiting for the next prompt.
    pub async fn has_pending_image(&self) -> bool {
        self.state.lock().await.pending_image.is_some()
    }

    /// Latest engine runtime-stats line, refreshed after each generation.
    pub async fn report(&self) -> String {
        self.report.read().await.clone()
    }

    /// Attaches a decoded image for the next prompt.
    ///
    /// Rejected as a no-op (returning `false`) unless the session is idle
    /// and no image is already pending. `source_path` is carried onto the
    /// User message for display.
    pub async fn attach_image(&self, tensor: ImageTensor, source_path: Option<String>) -> bool {
        let mut state = self.state.lock().await;
        if state.status != SessionStatus::Idle {
            tracing::debug!("attach_image rejected: session not idle");
            return false;
        }
        if state.pending_image.is_some() {
            tracing::debug!("attach_image rejected: image already pending");
            return false;
        }
        state.pending_image = Some(PendingImage {
            tensor,
            source_path,
        });
        true
    }

    /// Starts generating a reply to `prompt`, consuming any pending image.
    ///
    /// Returns `true` and transitions to `Generating` when accepted; the
    /// reply streams into the transcript asynchronously and the session
    /// returns to `Idle` on completion, engine failure, or cancellation.
    ///
    /// Rejected as a no-op when the session is not `chatable()`, or when
    /// `prompt` is empty and no image is pending. A rejected call never
    /// starts a second concurrent generation.
    pub async fn request_generate(&self, prompt: &str) -> bool {
        let (generation, image, cancel) = {
            let mut state = self.state.lock().await;
            if state.status != SessionStatus::Idle {
                tracing::warn!("request_generate rejected: session not idle");
                return false;
            }
            if prompt.is_empty() && state.pending_image.is_none() {
                tracing::debug!("request_generate rejected: empty prompt and no image");
                return false;
            }

            let pending = state.pending_image.take();
            let image_path = pending.as_ref().and_then(|p| p.source_path.clone());
            state.messages.push(Message::user(prompt, image_path));
            state.messages.push(Message::bot());

            state.generation += 1;
            let cancel = CancellationToken::new();
            state.cancel = Some(cancel.clone());
            state.status = SessionStatus::Generating;
            self.status_tx.send_replace(SessionStatus::Generating);

            (state.generation, pending.map(|p| p.tensor), cancel)
        };

        let engine = Arc::clone(&self.engine);
        let state = Arc::clone(&self.state);
        let status_tx = Arc::clone(&self.status_tx);
        let report = Arc::clone(&self.report);
        let prompt = prompt.to_string();

        tokio::spawn(async move {
            let outcome = drive_generation(
                engine.as_ref(),
                &state,
                generation,
                &prompt,
                image,
                &cancel,
            )
            .await;
            if let Err(e) = outcome {
                tracing::warn!("generation {} failed: {}", generation, e);
            }

            if let Ok(stats) = engine.runtime_stats_text().await {
                *report.write().await = stats;
            }

            // Land back in Idle unless a reset superseded this generation.
            let mut state = state.lock().await;
            if state.generation == generation {
                state.cancel = None;
                state.status = SessionStatus::Idle;
                status_tx.send_replace(SessionStatus::Idle);
            }
        });

        true
    }

    /// Resets the session: cancels any in-flight generation, clears the
    /// transcript and pending image, and returns once the state machine is
    /// back in `Idle`.
    ///
    /// Idempotent; resetting an already-idle, empty session is a no-op.
    /// After this returns, no token from the cancelled generation mutates
    /// the discarded transcript.
    pub async fn request_reset_chat(&self) {
        let cancel = {
            let mut state = self.state.lock().await;
            state.status = SessionStatus::Resetting;
            self.status_tx.send_replace(SessionStatus::Resetting);
            // Invalidate the in-flight generation so stale tokens are dropped.
            state.generation += 1;
            state.messages.clear();
            state.pending_image = None;
            state.cancel.take()
        };

        if let Some(cancel) = cancel {
            cancel.cancel();
        }

        if let Err(e) = self.engine.reset_chat().await {
            tracing::warn!("engine reset failed: {}", e);
        }

        let mut state = self.state.lock().await;
        state.status = SessionStatus::Idle;
        self.status_tx.send_replace(SessionStatus::Idle);
    }

    /// Releases engine resources. The session is unusable afterwards.
    pub async fn unload(&self) -> Result<()> {
        self.engine.unload().await
    }
}

/// Runs one generation against the engine, applying the streamed reply to
/// the most recent Bot message while this generation is still current.
async fn drive_generation(
    engine: &dyn ChatEngine,
    state: &Mutex<SessionState>,
    generation: u64,
    prompt: &str,
    image: Option<ImageTensor>,
    cancel: &CancellationToken,
) -> Result<()> {
    if let Some(image) = &image {
        engine.prefill_image(image).await?;
    }
    engine.prefill(prompt).await?;

    loop {
        if cancel.is_cancelled() {
            tracing::debug!("generation {} cancelled", generation);
            return Ok(());
        }

        tokio::select! {
            _ = cancel.cancelled() => {
                tracing::debug!("generation {} cancelled mid-decode", generation);
                return Ok(());
            }
            decoded = engine.decode() => decoded?,
        }

        let text = engine.message().await?;
        {
            let mut state = state.lock().await;
            if state.generation != generation {
                // A reset discarded this reply; drop the token.
                return Ok(());
            }
            if let Some(last) = state.messages.last_mut() {
                if last.role == MessageRole::Bot {
                    last.text = text;
                }
            }
        }

        if engine.stopped().await? {
            return Ok(());
        }
    }
}
