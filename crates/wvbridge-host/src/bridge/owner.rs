//! Owner task: the single logical thread of a host bridge.
//!
//! Every script evaluation, the startup queue and the navigation counter are
//! confined here. Commands from `HostBridge` handles and events from the web
//! view are processed one at a time, commands first.

use std::sync::{Arc, Weak};

use tokio::sync::{mpsc, watch};
use tracing::{debug, error, info, warn};

use wvbridge_core::dispatch::{guarded, route, Routed};
use wvbridge_core::error::{BridgeError, Result};
use wvbridge_core::protocol::codec::decode_batch_each;
use wvbridge_core::protocol::script::{self, FETCH_QUEUE};
use wvbridge_core::protocol::{Envelope, Signal};
use wvbridge_core::startup::StartupQueue;

use crate::bridge::{BridgeOptions, BridgeState, Command, Responder, Shared};
use crate::transport::handshake::{self, NavigationTracker};
use crate::transport::{evaluate_with_timeout, Subscription, WebView, WebViewEvent};

pub(super) struct BridgeOwner {
    webview: Weak<dyn WebView>,
    shared: Arc<Shared>,
    commands: mpsc::WeakUnboundedSender<Command>,
    startup: StartupQueue<Envelope>,
    nav: NavigationTracker,
    state: watch::Sender<BridgeState>,
    options: BridgeOptions,
}

impl BridgeOwner {
    pub(super) fn new(
        webview: Weak<dyn WebView>,
        shared: Arc<Shared>,
        commands: mpsc::WeakUnboundedSender<Command>,
        state: watch::Sender<BridgeState>,
        options: BridgeOptions,
    ) -> Self {
        Self {
            webview,
            shared,
            commands,
            startup: StartupQueue::new(),
            nav: NavigationTracker::new(),
            state,
            options,
        }
    }

    pub(super) async fn run(
        mut self,
        mut commands: mpsc::UnboundedReceiver<Command>,
        mut events: Subscription,
    ) {
        let mut events_open = true;
        loop {
            tokio::select! {
                biased;

                cmd = commands.recv() => match cmd {
                    Some(Command::Enqueue(env)) => self.queue(env).await,
                    Some(Command::Destroy) | None => break,
                },

                ev = events.recv(), if events_open => match ev {
                    Some(ev) => self.on_event(ev).await,
                    None => {
                        debug!("web view event stream closed");
                        events_open = false;
                    }
                },
            }
        }

        events.unsubscribe();
        self.teardown();
    }

    async fn queue(&mut self, env: Envelope) {
        if let Some(env) = self.startup.push(env) {
            self.deliver(env).await;
        }
    }

    async fn on_event(&mut self, event: WebViewEvent) {
        match event {
            WebViewEvent::NavigationStarting => {
                self.nav.start();
                if self.startup.is_active() {
                    self.set_state(BridgeState::Loading);
                } else {
                    debug!("navigation after ready; this bridge instance will not re-handshake");
                }
            }
            WebViewEvent::NavigationFailed => {
                self.nav.finish();
                warn!(in_flight = self.nav.in_flight(), "navigation failed");
            }
            WebViewEvent::NavigationCompleted => {
                self.nav.finish();
                if self.nav.is_idle() && self.startup.is_active() {
                    self.handshake().await;
                }
            }
            WebViewEvent::ScriptNotify(raw) => match Signal::parse(&raw) {
                Ok(Some(Signal::QueueHasMessage)) => self.flush().await,
                Ok(None) => debug!(%raw, "ignoring foreign notification"),
                Err(e) => self.fault(e),
            },
        }
    }

    async fn handshake(&mut self) {
        let readiness = match self.webview.upgrade() {
            Some(webview) => {
                handshake::establish(webview.as_ref(), self.options.eval_timeout).await
            }
            None => return,
        };
        match readiness {
            Ok(how) => {
                let buffered = self.startup.drain();
                info!(?how, buffered = buffered.len(), "guest bridge ready");
                self.set_state(BridgeState::Ready);
                for env in buffered {
                    self.deliver(env).await;
                }
            }
            Err(e) => self.fault(e),
        }
    }

    /// Host -> guest push. Failures are logged, never surfaced to the sender.
    async fn deliver(&self, env: Envelope) {
        let res = match script::deliver(&env) {
            Ok(expr) => self.evaluate(&expr).await.map(|_| ()),
            Err(e) => Err(e),
        };
        if let Err(e) = res {
            self.fault(e);
        }
    }

    /// Pull the guest outbound queue and dispatch it in order.
    async fn flush(&self) {
        let raw = match self.evaluate(FETCH_QUEUE).await {
            Ok(raw) => raw,
            Err(e) => {
                self.fault(e);
                return;
            }
        };
        if raw.trim().is_empty() {
            return;
        }
        let batch = match decode_batch_each(&raw) {
            Ok(batch) => batch,
            Err(e) => {
                self.fault(e);
                return;
            }
        };
        debug!(count = batch.len(), "pulled guest queue");
        // A bad element is dropped alone; the guest queue is already empty.
        for item in batch {
            match item {
                Ok(env) => self.dispatch(env),
                Err(e) => self.fault(e),
            }
        }
    }

    fn dispatch(&self, env: Envelope) {
        let shown = env.to_string();
        match route(&self.shared.callbacks, &self.shared.handlers, env) {
            Ok(Routed::Call {
                handler,
                data,
                callback_id,
            }) => {
                let responder = Responder::new(callback_id, self.commands.upgrade());
                if let Err(e) = guarded(|| handler(data, responder)) {
                    let msg = match e {
                        BridgeError::HandlerThrew(msg) => msg,
                        other => other.to_string(),
                    };
                    self.fault(BridgeError::HandlerThrew(format!("{msg}; envelope: {shown}")));
                }
            }
            Ok(Routed::Resolved { .. }) | Ok(Routed::Unresolved { .. }) => {}
            Err(e) => self.fault(e),
        }
    }

    async fn evaluate(&self, script: &str) -> Result<String> {
        let webview = self
            .webview
            .upgrade()
            .ok_or_else(|| BridgeError::Transport("web view dropped".into()))?;
        evaluate_with_timeout(webview.as_ref(), script, self.options.eval_timeout).await
    }

    fn fault(&self, e: BridgeError) {
        match &e {
            BridgeError::NoHandlerForCall { envelope } => {
                error!(%envelope, "no handler for message from guest")
            }
            BridgeError::HandlerThrew(msg) => error!(error = %msg, "host handler threw"),
            other if other.is_contained() => {
                warn!(code = other.code().as_str(), error = %other, "bridge fault")
            }
            other => error!(code = other.code().as_str(), error = %other, "bridge fault"),
        }
        if let Some(hook) = &self.options.on_fault {
            let _ = guarded(|| {
                hook(&e);
                Ok(())
            });
        }
    }

    fn set_state(&self, next: BridgeState) {
        if *self.state.borrow() != next {
            debug!(?next, "bridge state");
            self.state.send_replace(next);
        }
    }

    fn teardown(&mut self) {
        self.startup.clear();
        self.shared.callbacks.clear();
        self.shared.handlers.clear();
        self.set_state(BridgeState::Destroyed);
        info!("host bridge destroyed");
    }
}
