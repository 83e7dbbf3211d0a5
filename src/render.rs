//! Render contexts: per-view fetch state, redraw signal and cancellation.

use crate::model::{FetchState, OrderData, RenderPayload};
use std::sync::{Arc, Weak};
use tokio::sync::watch;

/// Cancellation flag shared between a render context and its tasks.
#[derive(Clone, Debug)]
pub struct CancelToken {
    flag: Arc<watch::Sender<bool>>,
}

impl CancelToken {
    pub fn new() -> Self {
        let (flag, _) = watch::channel(false);
        CancelToken {
            flag: Arc::new(flag),
        }
    }

    pub fn cancel(&self) {
        self.flag.send_replace(true);
    }

    pub fn is_cancelled(&self) -> bool {
        *self.flag.borrow()
    }

    /// Resolves once the token is cancelled.
    pub async fn cancelled(&self) {
        let mut rx = self.flag.subscribe();
        // The sender lives as long as `self`, so this only returns on cancel.
        let _ = rx.wait_for(|cancelled| *cancelled).await;
    }
}

impl Default for CancelToken {
    fn default() -> Self {
        Self::new()
    }
}

/// State owned by one receipt view.
///
/// The view subscribes with [`RenderContext::subscribe`] and redraws when the
/// receiver reports a change. Dropping the context cancels every task bound
/// to it; their late results are discarded.
///
/// # Example
///
/// ```ignore
/// let ctx = RenderContext::new();
/// let mut redraw = ctx.subscribe();
/// service.spawn_reprint(&ctx, order.clone());
///
/// redraw.changed().await?;
/// let payload = ctx.render_payload(order);
/// ```
#[derive(Debug)]
pub struct RenderContext {
    state: Arc<watch::Sender<FetchState>>,
    cancel: CancelToken,
}

impl RenderContext {
    pub fn new() -> Self {
        let (state, _) = watch::channel(FetchState::default());
        RenderContext {
            state: Arc::new(state),
            cancel: CancelToken::new(),
        }
    }

    /// Receiver that is notified on every state change.
    pub fn subscribe(&self) -> watch::Receiver<FetchState> {
        self.state.subscribe()
    }

    /// Snapshot of the current state.
    pub fn state(&self) -> FetchState {
        self.state.borrow().clone()
    }

    /// Replace the state and notify subscribers.
    pub fn publish(&self, state: FetchState) {
        self.state.send_replace(state);
    }

    pub fn cancel_token(&self) -> CancelToken {
        self.cancel.clone()
    }

    pub fn cancel(&self) {
        self.cancel.cancel();
    }

    pub fn is_cancelled(&self) -> bool {
        self.cancel.is_cancelled()
    }

    /// Handle for a background task. It stops resolving once the context is
    /// dropped.
    pub fn handle(&self) -> ContextHandle {
        ContextHandle {
            state: Arc::downgrade(&self.state),
            cancel: self.cancel.clone(),
        }
    }

    /// Payload for the template: the order plus the image, once known.
    pub fn render_payload(&self, order: OrderData) -> RenderPayload {
        let mut payload = RenderPayload::new(order);
        if let Some(image) = &self.state.borrow().image {
            payload.attach(image);
        }
        payload
    }
}

impl Default for RenderContext {
    fn default() -> Self {
        Self::new()
    }
}

impl Drop for RenderContext {
    fn drop(&mut self) {
        self.cancel.cancel();
    }
}

/// Weak link from a background task back to its render context.
#[derive(Clone, Debug)]
pub struct ContextHandle {
    state: Weak<watch::Sender<FetchState>>,
    cancel: CancelToken,
}

impl ContextHandle {
    pub fn cancel_token(&self) -> &CancelToken {
        &self.cancel
    }

    /// Publish a state unless the context was cancelled or dropped.
    ///
    /// Returns whether the state was delivered.
    pub fn publish(&self, state: FetchState) -> bool {
        if self.cancel.is_cancelled() {
            return false;
        }

        match self.state.upgrade() {
            Some(sender) => {
                sender.send_replace(state);
                true
            }
            None => false,
        }
    }
}
