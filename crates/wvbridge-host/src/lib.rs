//! wvbridge host library entry.
//!
//! This crate wires the host half of the bridge: the `HostBridge` handle and
//! the owner task behind it, the readiness handshake, the `WebView` transport
//! adapter with its event hub, strict config loading, and the loopback and
//! WebSocket transports. It is consumed by the binary (`main.rs`) and by
//! integration tests.

pub mod bridge;
pub mod config;
pub mod demo;
pub mod transport;

pub use bridge::{BridgeOptions, BridgeState, HostBridge, HostHandler, Responder};
