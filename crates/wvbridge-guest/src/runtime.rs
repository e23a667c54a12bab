//! One guest runtime (a loaded page's global scope).
//!
//! The bridge object is created lazily: either by the host injecting the
//! bootstrap script, or by a page that ships it. Installing is idempotent,
//! guarded by the runtime's own slot rather than by load-once semantics.

use std::cell::RefCell;
use std::rc::Rc;

use tracing::{debug, info};

use wvbridge_core::error::{BridgeError, Result};
use wvbridge_core::protocol::script::ScriptCommand;
use wvbridge_core::protocol::BRIDGE_OBJECT;

use crate::bridge::{GuestBridge, HostNotifier};
use crate::scheduler::TaskQueue;

type ReadyListener = Box<dyn Fn(&Rc<GuestBridge>)>;

pub struct GuestRuntime {
    tasks: TaskQueue,
    notifier: Rc<dyn HostNotifier>,
    bridge: RefCell<Option<Rc<GuestBridge>>>,
    ready_listeners: RefCell<Vec<ReadyListener>>,
}

impl GuestRuntime {
    pub fn new(notifier: impl HostNotifier + 'static) -> Self {
        Self {
            tasks: TaskQueue::new(),
            notifier: Rc::new(notifier),
            bridge: RefCell::new(None),
            ready_listeners: RefCell::new(Vec::new()),
        }
    }

    pub fn tasks(&self) -> &TaskQueue {
        &self.tasks
    }

    /// The bridge singleton, if installed.
    pub fn bridge(&self) -> Option<Rc<GuestBridge>> {
        self.bridge.borrow().clone()
    }

    /// Page hook fired once when the bridge gets installed
    /// (`WebViewJavascriptBridgeReady`).
    pub fn on_bridge_ready(&self, listener: impl Fn(&Rc<GuestBridge>) + 'static) {
        self.ready_listeners.borrow_mut().push(Box::new(listener));
    }

    /// Install the bridge singleton. A second install returns the existing
    /// object and fires nothing.
    pub fn install_bridge(&self) -> Rc<GuestBridge> {
        if let Some(existing) = self.bridge() {
            debug!("bridge already installed");
            return existing;
        }
        let bridge = GuestBridge::new(Rc::clone(&self.notifier), self.tasks.clone());
        *self.bridge.borrow_mut() = Some(Rc::clone(&bridge));
        info!("guest bridge installed");

        // Listeners may register more listeners; don't hold the borrow.
        let listeners = std::mem::take(&mut *self.ready_listeners.borrow_mut());
        for listener in &listeners {
            listener(&bridge);
        }
        let mut slot = self.ready_listeners.borrow_mut();
        let added = std::mem::replace(&mut *slot, listeners);
        slot.extend(added);
        bridge
    }

    /// Evaluate a host expression. Only the bridge vocabulary is understood.
    pub fn evaluate(&self, script: &str) -> Result<String> {
        let command = ScriptCommand::parse(script)?.ok_or_else(|| {
            let head: String = script.chars().take(48).collect();
            BridgeError::Transport(format!("unsupported expression: {head}"))
        })?;
        match command {
            ScriptCommand::Probe => Ok(self.bridge().is_some().to_string()),
            ScriptCommand::Bootstrap => {
                self.install_bridge();
                Ok(String::new())
            }
            ScriptCommand::FetchQueue => self.require_bridge()?.fetch_queue(),
            ScriptCommand::Deliver(json) => {
                self.require_bridge()?.handle_message_from_native(json);
                Ok(String::new())
            }
        }
    }

    /// Drain the task queue. Returns faults raised by tasks.
    pub fn run_until_idle(&self) -> Vec<BridgeError> {
        self.tasks.run_until_idle()
    }

    fn require_bridge(&self) -> Result<Rc<GuestBridge>> {
        self.bridge()
            .ok_or_else(|| BridgeError::Transport(format!("{BRIDGE_OBJECT} is not defined")))
    }
}
