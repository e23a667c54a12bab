//! Transport adapter (host side).
//!
//! A `WebView` is the host's handle on the guest runtime. It offers exactly
//! two primitives: evaluate an expression inside the guest (with a string
//! result), and a stream of events (navigation progress plus the guest's
//! payload-less notifications). Subscriptions are non-owning: they hold the
//! hub weakly and unsubscribe on drop.

pub mod handshake;
pub mod loopback;
pub mod ws;

use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, Weak};
use std::time::Duration;

use async_trait::async_trait;
use dashmap::DashMap;
use tokio::sync::mpsc;

use wvbridge_core::error::{BridgeError, Result};

/// Events a web view raises toward the bridge.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum WebViewEvent {
    NavigationStarting,
    NavigationCompleted,
    NavigationFailed,
    /// Raw guest notification (`scheme://token`).
    ScriptNotify(String),
}

/// Host -> guest primitives.
#[async_trait]
pub trait WebView: Send + Sync {
    /// Evaluate `script` inside the guest and return its string result.
    async fn evaluate_script(&self, script: &str) -> Result<String>;

    /// Subscribe to this web view's events.
    fn subscribe(&self) -> Subscription;
}

/// Evaluate with an upper bound on how long the guest may take.
pub async fn evaluate_with_timeout(
    webview: &dyn WebView,
    script: &str,
    limit: Duration,
) -> Result<String> {
    match tokio::time::timeout(limit, webview.evaluate_script(script)).await {
        Ok(res) => res,
        Err(_) => Err(BridgeError::Transport(format!(
            "script evaluation timed out after {}ms",
            limit.as_millis()
        ))),
    }
}

/// Fan-out of web view events to subscribers.
#[derive(Default)]
pub struct EventHub {
    subscribers: DashMap<u64, mpsc::UnboundedSender<WebViewEvent>>,
    seq: AtomicU64,
}

impl EventHub {
    pub fn new() -> Arc<Self> {
        Arc::new(Self::default())
    }

    pub fn subscribe(self: &Arc<Self>) -> Subscription {
        let id = self.seq.fetch_add(1, Ordering::Relaxed);
        let (tx, rx) = mpsc::unbounded_channel();
        self.subscribers.insert(id, tx);
        Subscription {
            id,
            rx,
            hub: Arc::downgrade(self),
        }
    }

    pub fn publish(&self, event: WebViewEvent) {
        let mut closed = Vec::new();
        for sub in self.subscribers.iter() {
            if sub.value().send(event.clone()).is_err() {
                closed.push(*sub.key());
            }
        }
        // Removing while iterating would deadlock the shard.
        for id in closed {
            self.subscribers.remove(&id);
        }
    }

    pub fn subscriber_count(&self) -> usize {
        self.subscribers.len()
    }
}

/// One subscriber's event stream. Dropping it unsubscribes.
pub struct Subscription {
    id: u64,
    rx: mpsc::UnboundedReceiver<WebViewEvent>,
    hub: Weak<EventHub>,
}

impl Subscription {
    pub async fn recv(&mut self) -> Option<WebViewEvent> {
        self.rx.recv().await
    }

    /// Explicit unsubscribe.
    pub fn unsubscribe(self) {}
}

impl Drop for Subscription {
    fn drop(&mut self) {
        if let Some(hub) = self.hub.upgrade() {
            hub.subscribers.remove(&self.id);
        }
    }
}
