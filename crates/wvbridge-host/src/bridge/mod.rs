//! Host-side bridge handle.
//!
//! `HostBridge` is a cheap `Clone` handle. The registries live behind an
//! `Arc` and are safe to touch from any thread; everything else (startup
//! queue, navigation counter, every script evaluation) is owned by a single
//! task spawned at construction. Sends from any thread are marshaled onto
//! that task through a channel and return immediately; replies come back
//! through the supplied continuation only.

mod owner;

use std::fmt;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Weak};
use std::time::Duration;

use serde_json::Value;
use tokio::sync::{mpsc, watch};
use tracing::{debug, info};

use wvbridge_core::dispatch::{empty_reply, outbound_call};
use wvbridge_core::error::{BridgeError, Result};
use wvbridge_core::protocol::Envelope;
use wvbridge_core::registry::{CallbackRegistry, HandlerRegistry};

use crate::config::schema::BridgeSection;
use crate::transport::WebView;

use self::owner::BridgeOwner;

/// One-shot reply continuation.
pub type Continuation = Box<dyn FnOnce(Value) + Send>;

/// Host message handler: `(data, responder)`.
pub type HostHandler = Arc<dyn Fn(Option<Value>, Responder) -> Result<()> + Send + Sync>;

/// Diagnostic hook for protocol faults.
pub type FaultHook = Arc<dyn Fn(&BridgeError) + Send + Sync>;

/// Bridge lifecycle.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BridgeState {
    /// Registries empty, startup queue buffering.
    Created,
    /// A navigation is in flight; sends still buffer.
    Loading,
    /// Counterpart confirmed; startup queue drained and retired.
    Ready,
    /// Torn down; sends are rejected.
    Destroyed,
}

#[derive(Clone)]
pub struct BridgeOptions {
    /// Upper bound for one script evaluation.
    pub eval_timeout: Duration,
    /// Called for every contained fault and every call without a handler.
    pub on_fault: Option<FaultHook>,
}

impl Default for BridgeOptions {
    fn default() -> Self {
        Self {
            eval_timeout: Duration::from_millis(5000),
            on_fault: None,
        }
    }
}

impl fmt::Debug for BridgeOptions {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("BridgeOptions")
            .field("eval_timeout", &self.eval_timeout)
            .field("on_fault", &self.on_fault.is_some())
            .finish()
    }
}

impl From<&BridgeSection> for BridgeOptions {
    fn from(section: &BridgeSection) -> Self {
        Self {
            eval_timeout: Duration::from_millis(section.eval_timeout_ms),
            on_fault: None,
        }
    }
}

/// Work marshaled onto the owner task.
pub(crate) enum Command {
    /// Outbound envelope entering the send path.
    Enqueue(Envelope),
    Destroy,
}

pub(crate) struct Shared {
    pub(crate) callbacks: CallbackRegistry<Continuation>,
    pub(crate) handlers: HandlerRegistry<HostHandler>,
    destroyed: AtomicBool,
}

/// Reply handle given to a host handler. Consumed on use, so a call is
/// answered at most once.
pub struct Responder {
    callback_id: Option<String>,
    commands: Option<mpsc::UnboundedSender<Command>>,
}

impl Responder {
    pub(crate) fn new(
        callback_id: Option<String>,
        commands: Option<mpsc::UnboundedSender<Command>>,
    ) -> Self {
        Self {
            callback_id,
            commands,
        }
    }

    /// True when the caller asked for a reply.
    pub fn expects_reply(&self) -> bool {
        self.callback_id.is_some()
    }

    /// Queue `{responseId, responseData}` through the normal send path.
    pub fn respond(self, payload: Value) {
        let Some(callback_id) = self.callback_id else {
            debug!("responder invoked for a call without callbackId");
            return;
        };
        let Some(commands) = self.commands else {
            debug!(%callback_id, "bridge gone, reply dropped");
            return;
        };
        if commands
            .send(Command::Enqueue(Envelope::response(callback_id, payload)))
            .is_err()
        {
            debug!("bridge stopped, reply dropped");
        }
    }

    /// Reply without a payload.
    pub fn finish(self) {
        self.respond(empty_reply());
    }
}

#[derive(Clone)]
pub struct HostBridge {
    shared: Arc<Shared>,
    commands: mpsc::UnboundedSender<Command>,
    state: watch::Receiver<BridgeState>,
}

impl HostBridge {
    /// Attach a bridge to `webview` and spawn its owner task.
    ///
    /// The bridge keeps only a weak reference to the web view. Must be called
    /// from within a tokio runtime.
    pub fn new<W, F>(webview: &Arc<W>, default_handler: F, options: BridgeOptions) -> Self
    where
        W: WebView + 'static,
        F: Fn(Option<Value>, Responder) -> Result<()> + Send + Sync + 'static,
    {
        let shared = Arc::new(Shared {
            callbacks: CallbackRegistry::new(),
            handlers: HandlerRegistry::new(),
            destroyed: AtomicBool::new(false),
        });
        let handler: HostHandler = Arc::new(default_handler);
        shared.handlers.set_default(handler);

        let (commands, commands_rx) = mpsc::unbounded_channel();
        let (state_tx, state) = watch::channel(BridgeState::Created);
        let weak: Weak<dyn WebView> = Arc::downgrade(webview) as Weak<dyn WebView>;
        let events = webview.subscribe();

        let owner = BridgeOwner::new(
            weak,
            Arc::clone(&shared),
            commands.downgrade(),
            state_tx,
            options,
        );
        tokio::spawn(owner.run(commands_rx, events));
        info!("host bridge created");

        Self {
            shared,
            commands,
            state,
        }
    }

    /// Send `data` to the guest default handler, fire-and-forget.
    pub fn send(&self, data: Option<Value>) -> Result<()> {
        self.submit(None, data, None)
    }

    /// Send `data` to the guest default handler; `on_response` runs with the reply.
    pub fn send_with_response<F>(&self, data: Option<Value>, on_response: F) -> Result<()>
    where
        F: FnOnce(Value) + Send + 'static,
    {
        self.submit(None, data, Some(Box::new(on_response)))
    }

    pub fn call_handler(&self, name: impl Into<String>, data: Option<Value>) -> Result<()> {
        self.submit(Some(name.into()), data, None)
    }

    pub fn call_handler_with_response<F>(
        &self,
        name: impl Into<String>,
        data: Option<Value>,
        on_response: F,
    ) -> Result<()>
    where
        F: FnOnce(Value) + Send + 'static,
    {
        self.submit(Some(name.into()), data, Some(Box::new(on_response)))
    }

    /// Register a named handler. Last writer wins.
    pub fn register_handler<F>(&self, name: impl Into<String>, handler: F)
    where
        F: Fn(Option<Value>, Responder) -> Result<()> + Send + Sync + 'static,
    {
        let handler: HostHandler = Arc::new(handler);
        self.shared.handlers.register(name, handler);
    }

    /// Unsubscribe from the web view and clear registries and queues.
    /// Later sends fail with `Destroyed`.
    pub fn destroy(&self) {
        if self.shared.destroyed.swap(true, Ordering::SeqCst) {
            return;
        }
        self.shared.callbacks.clear();
        self.shared.handlers.clear();
        let _ = self.commands.send(Command::Destroy);
    }

    pub fn state(&self) -> BridgeState {
        *self.state.borrow()
    }

    /// Wait until the guest is confirmed ready.
    pub async fn wait_ready(&self) -> Result<()> {
        let mut state = self.state.clone();
        let reached = state
            .wait_for(|s| matches!(s, BridgeState::Ready | BridgeState::Destroyed))
            .await
            .map(|s| *s)
            .map_err(|_| BridgeError::Destroyed)?;
        match reached {
            BridgeState::Ready => Ok(()),
            _ => Err(BridgeError::Destroyed),
        }
    }

    /// Continuations still waiting for a reply.
    pub fn pending_callbacks(&self) -> usize {
        self.shared.callbacks.len()
    }

    fn submit(
        &self,
        handler_name: Option<String>,
        data: Option<Value>,
        on_response: Option<Continuation>,
    ) -> Result<()> {
        if self.shared.destroyed.load(Ordering::SeqCst) {
            return Err(BridgeError::Destroyed);
        }
        let env = outbound_call(&self.shared.callbacks, handler_name, data, on_response);
        if let Err(mpsc::error::SendError(cmd)) = self.commands.send(Command::Enqueue(env)) {
            // Owner task is gone; don't leave the continuation behind.
            if let Command::Enqueue(Envelope {
                callback_id: Some(id),
                ..
            }) = cmd
            {
                self.shared.callbacks.take(&id);
            }
            return Err(BridgeError::Destroyed);
        }
        Ok(())
    }
}
