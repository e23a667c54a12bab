//! In-process loopback web view.
//!
//! Runs a `GuestRuntime` on a dedicated thread, the way an embedded script
//! engine runs on its own thread. Host calls are posted to that thread and
//! answered over oneshot channels; guest notifications and navigation
//! progress are published on the event hub. After every command the guest
//! task queue is drained, which is the guest's "next turn".

use std::sync::{Arc, Mutex};
use std::thread;

use async_trait::async_trait;
use tokio::sync::{mpsc, oneshot};
use tracing::{debug, warn};

use wvbridge_core::error::{BridgeError, ErrorCode, Result};
use wvbridge_guest::GuestRuntime;

use crate::transport::{EventHub, Subscription, WebView, WebViewEvent};

type GuestJob = Box<dyn FnOnce(&GuestRuntime) + Send>;

enum GuestCommand {
    Navigate(GuestJob),
    Evaluate {
        script: String,
        reply: oneshot::Sender<Result<String>>,
    },
    Run(GuestJob),
}

pub struct LoopbackWebView {
    hub: Arc<EventHub>,
    commands: mpsc::UnboundedSender<GuestCommand>,
    faults: Arc<Mutex<Vec<ErrorCode>>>,
}

impl LoopbackWebView {
    /// Start the guest thread. No page is loaded until `navigate`.
    pub fn spawn() -> Result<Arc<Self>> {
        let hub = EventHub::new();
        let faults = Arc::new(Mutex::new(Vec::new()));
        let (commands, rx) = mpsc::unbounded_channel();

        let thread_hub = Arc::clone(&hub);
        let thread_faults = Arc::clone(&faults);
        thread::Builder::new()
            .name("guest-runtime".into())
            .spawn(move || guest_thread(rx, thread_hub, thread_faults))
            .map_err(|e| BridgeError::Internal(format!("guest thread spawn failed: {e}")))?;

        Ok(Arc::new(Self {
            hub,
            commands,
            faults,
        }))
    }

    /// Load a fresh page. `page` runs against the new runtime before the
    /// navigation completes; it typically registers a bridge-ready listener.
    pub fn navigate(&self, page: impl FnOnce(&GuestRuntime) + Send + 'static) -> Result<()> {
        self.post(GuestCommand::Navigate(Box::new(page)))
    }

    /// Run `job` on the guest thread against the current page.
    pub async fn run_in_guest<R, F>(&self, job: F) -> Result<R>
    where
        R: Send + 'static,
        F: FnOnce(&GuestRuntime) -> R + Send + 'static,
    {
        let (tx, rx) = oneshot::channel();
        self.post(GuestCommand::Run(Box::new(move |rt| {
            let _ = tx.send(job(rt));
        })))?;
        rx.await
            .map_err(|_| BridgeError::Transport("no page loaded in guest".into()))
    }

    /// Codes of faults raised by guest tasks so far, oldest first.
    pub fn take_guest_faults(&self) -> Vec<ErrorCode> {
        std::mem::take(&mut *self.faults.lock().unwrap_or_else(|e| e.into_inner()))
    }

    pub fn subscriber_count(&self) -> usize {
        self.hub.subscriber_count()
    }

    fn post(&self, cmd: GuestCommand) -> Result<()> {
        self.commands
            .send(cmd)
            .map_err(|_| BridgeError::Transport("guest runtime stopped".into()))
    }
}

#[async_trait]
impl WebView for LoopbackWebView {
    async fn evaluate_script(&self, script: &str) -> Result<String> {
        let (reply, rx) = oneshot::channel();
        self.post(GuestCommand::Evaluate {
            script: script.to_string(),
            reply,
        })?;
        rx.await
            .map_err(|_| BridgeError::Transport("guest runtime stopped".into()))?
    }

    fn subscribe(&self) -> Subscription {
        self.hub.subscribe()
    }
}

fn guest_thread(
    mut rx: mpsc::UnboundedReceiver<GuestCommand>,
    hub: Arc<EventHub>,
    faults: Arc<Mutex<Vec<ErrorCode>>>,
) {
    let mut runtime: Option<GuestRuntime> = None;

    while let Some(cmd) = rx.blocking_recv() {
        match cmd {
            GuestCommand::Navigate(page) => {
                hub.publish(WebViewEvent::NavigationStarting);
                let notify_hub = Arc::clone(&hub);
                let rt = GuestRuntime::new(move |signal: &str| {
                    notify_hub.publish(WebViewEvent::ScriptNotify(signal.to_string()))
                });
                page(&rt);
                runtime = Some(rt);
                hub.publish(WebViewEvent::NavigationCompleted);
            }
            GuestCommand::Evaluate { script, reply } => {
                let res = match &runtime {
                    Some(rt) => rt.evaluate(&script),
                    None => Err(BridgeError::Transport("no page loaded".into())),
                };
                let _ = reply.send(res);
            }
            GuestCommand::Run(job) => match &runtime {
                Some(rt) => job(rt),
                None => debug!("guest job dropped, no page loaded"),
            },
        }

        if let Some(rt) = &runtime {
            let raised = rt.run_until_idle();
            if !raised.is_empty() {
                let mut sink = faults.lock().unwrap_or_else(|e| e.into_inner());
                for fault in raised {
                    warn!(code = fault.code().as_str(), error = %fault, "guest task fault");
                    sink.push(fault.code());
                }
            }
        }
    }
    debug!("guest runtime thread stopped");
}
