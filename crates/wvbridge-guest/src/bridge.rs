//! Guest-side bridge object.
//!
//! Inbound: the host injects `_handleMessageFromNative(json)`. Deliveries
//! that arrive before `init` are buffered and replayed in order by `init`;
//! after that each delivery is dispatched on the next turn of the task
//! queue, never synchronously from the injected call.
//!
//! Outbound: every envelope is appended to a local queue and the host is
//! poked with the payload-less queue signal. The host pulls the queue with
//! `_fetchQueue()`, which hands back a JSON array and empties it.

use std::cell::{Cell, RefCell};
use std::rc::{Rc, Weak};

use serde_json::Value;
use tracing::{debug, error, warn};

use wvbridge_core::dispatch::{empty_reply, guarded, outbound_call, route, Routed};
use wvbridge_core::error::{BridgeError, Result};
use wvbridge_core::protocol::codec::{decode, encode_batch};
use wvbridge_core::protocol::{Envelope, Signal};
use wvbridge_core::registry::{CallbackRegistry, HandlerRegistry};
use wvbridge_core::startup::StartupQueue;

use crate::scheduler::TaskQueue;

type Continuation = Box<dyn FnOnce(Value)>;

/// A guest message handler: `(data, responder)`.
pub type GuestHandler = Rc<dyn Fn(Option<Value>, GuestResponder) -> Result<()>>;

/// Guest -> host scalar notification primitive.
pub trait HostNotifier {
    fn notify(&self, signal: &str);
}

impl<F> HostNotifier for F
where
    F: Fn(&str),
{
    fn notify(&self, signal: &str) {
        self(signal)
    }
}

/// Reply handle passed to a guest handler. Consumed on use, so a call is
/// answered at most once.
pub struct GuestResponder {
    bridge: Weak<GuestBridge>,
    callback_id: Option<String>,
}

impl GuestResponder {
    /// True when the caller asked for a reply.
    pub fn expects_reply(&self) -> bool {
        self.callback_id.is_some()
    }

    pub fn respond(self, payload: Value) {
        let Some(callback_id) = self.callback_id else {
            debug!("responder invoked for a call without callbackId");
            return;
        };
        match self.bridge.upgrade() {
            Some(bridge) => bridge.enqueue(Envelope::response(callback_id, payload)),
            None => debug!(%callback_id, "bridge gone, reply dropped"),
        }
    }

    /// Reply without a payload.
    pub fn finish(self) {
        self.respond(empty_reply());
    }
}

/// The guest singleton (`window.WebViewJavascriptBridge`).
pub struct GuestBridge {
    this: Weak<GuestBridge>,
    callbacks: CallbackRegistry<Continuation>,
    handlers: HandlerRegistry<GuestHandler>,
    initialized: Cell<bool>,
    inbound: RefCell<StartupQueue<String>>,
    outbound: RefCell<Vec<Envelope>>,
    notifier: Rc<dyn HostNotifier>,
    tasks: TaskQueue,
}

impl GuestBridge {
    pub(crate) fn new(notifier: Rc<dyn HostNotifier>, tasks: TaskQueue) -> Rc<Self> {
        Rc::new_cyclic(|this| Self {
            this: this.clone(),
            callbacks: CallbackRegistry::new(),
            handlers: HandlerRegistry::new(),
            initialized: Cell::new(false),
            inbound: RefCell::new(StartupQueue::new()),
            outbound: RefCell::new(Vec::new()),
            notifier,
            tasks,
        })
    }

    /// Install the default handler and replay deliveries buffered so far.
    /// A second call is a usage bug and fails with `DoubleInitialization`.
    pub fn init<F>(&self, default_handler: F) -> Result<()>
    where
        F: Fn(Option<Value>, GuestResponder) -> Result<()> + 'static,
    {
        if self.initialized.replace(true) {
            error!("bridge init called twice");
            return Err(BridgeError::DoubleInitialization);
        }
        self.handlers.set_default(Rc::new(default_handler));
        let buffered = self.inbound.borrow_mut().drain();
        for json in buffered {
            self.schedule_dispatch(json);
        }
        Ok(())
    }

    pub fn is_initialized(&self) -> bool {
        self.initialized.get()
    }

    pub fn register_handler<F>(&self, name: impl Into<String>, handler: F)
    where
        F: Fn(Option<Value>, GuestResponder) -> Result<()> + 'static,
    {
        self.handlers.register(name, Rc::new(handler));
    }

    /// Send `data` to the host default handler, fire-and-forget.
    pub fn send(&self, data: Option<Value>) {
        self.enqueue(outbound_call(&self.callbacks, None, data, None));
    }

    /// Send `data` to the host default handler; `on_response` runs with the reply.
    pub fn send_with_response(
        &self,
        data: Option<Value>,
        on_response: impl FnOnce(Value) + 'static,
    ) {
        let cb: Continuation = Box::new(on_response);
        self.enqueue(outbound_call(&self.callbacks, None, data, Some(cb)));
    }

    pub fn call_handler(&self, name: impl Into<String>, data: Option<Value>) {
        self.enqueue(outbound_call(&self.callbacks, Some(name.into()), data, None));
    }

    pub fn call_handler_with_response(
        &self,
        name: impl Into<String>,
        data: Option<Value>,
        on_response: impl FnOnce(Value) + 'static,
    ) {
        let cb: Continuation = Box::new(on_response);
        self.enqueue(outbound_call(&self.callbacks, Some(name.into()), data, Some(cb)));
    }

    /// `_fetchQueue`: drain the outbound queue as a JSON array.
    pub fn fetch_queue(&self) -> Result<String> {
        let batch = std::mem::take(&mut *self.outbound.borrow_mut());
        encode_batch(&batch)
    }

    /// `_handleMessageFromNative`: accept one envelope pushed by the host.
    pub fn handle_message_from_native(&self, json: String) {
        let early = self.inbound.borrow_mut().push(json);
        if let Some(json) = early {
            self.schedule_dispatch(json);
        }
    }

    pub fn pending_outbound(&self) -> usize {
        self.outbound.borrow().len()
    }

    pub fn pending_callbacks(&self) -> usize {
        self.callbacks.len()
    }

    fn enqueue(&self, env: Envelope) {
        self.outbound.borrow_mut().push(env);
        self.notifier.notify(&Signal::QueueHasMessage.to_string());
    }

    fn schedule_dispatch(&self, json: String) {
        let this = self.this.clone();
        self.tasks.defer(move || match this.upgrade() {
            Some(bridge) => bridge.dispatch(&json),
            None => Ok(()),
        });
    }

    fn dispatch(&self, json: &str) -> Result<()> {
        let env = decode(json).inspect_err(|e| warn!(error = %e, "dropping inbound message"))?;
        let routed = route(&self.callbacks, &self.handlers, env).inspect_err(|e| match e {
            BridgeError::NoHandlerForCall { envelope } => {
                error!(%envelope, "no handler for message from native")
            }
            other => warn!(error = %other, "inbound message failed"),
        })?;
        match routed {
            Routed::Resolved { .. } | Routed::Unresolved { .. } => Ok(()),
            Routed::Call {
                handler,
                data,
                callback_id,
            } => {
                let responder = GuestResponder {
                    bridge: self.this.clone(),
                    callback_id,
                };
                guarded(|| handler(data, responder))
                    .inspect_err(|e| error!(error = %e, envelope = json, "guest handler threw"))
            }
        }
    }
}
