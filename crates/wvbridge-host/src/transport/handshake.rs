//! Readiness handshake.
//!
//! The host declares the guest ready once no navigation is in flight and the
//! guest exposes the bridge object: probe first, and inject the bootstrap
//! script only if the probe says the object is missing.

use std::time::Duration;

use tracing::{debug, info};

use wvbridge_core::error::Result;
use wvbridge_core::protocol::script::{BOOTSTRAP, PROBE};

use crate::transport::{evaluate_with_timeout, WebView};

/// In-flight navigation/load counter.
#[derive(Debug, Default)]
pub struct NavigationTracker {
    in_flight: u64,
}

impl NavigationTracker {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn start(&mut self) {
        self.in_flight += 1;
    }

    /// Completion or failure. Never goes below zero, so a stray
    /// completion event cannot wrap the counter.
    pub fn finish(&mut self) {
        self.in_flight = self.in_flight.saturating_sub(1);
    }

    pub fn in_flight(&self) -> u64 {
        self.in_flight
    }

    pub fn is_idle(&self) -> bool {
        self.in_flight == 0
    }
}

/// How readiness was reached.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Readiness {
    /// The page already exposed the bridge.
    AlreadyPresent,
    /// The bootstrap script was injected.
    Injected,
}

/// Probe the guest and inject the bootstrap script if needed.
pub async fn establish(webview: &dyn WebView, limit: Duration) -> Result<Readiness> {
    let probe = evaluate_with_timeout(webview, PROBE, limit).await?;
    if probe.trim() == "true" {
        debug!("bridge object already present");
        return Ok(Readiness::AlreadyPresent);
    }
    evaluate_with_timeout(webview, BOOTSTRAP, limit).await?;
    info!("bridge bootstrap injected");
    Ok(Readiness::Injected)
}
