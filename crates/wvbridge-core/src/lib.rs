//! wvbridge core: transport-agnostic bridge protocol primitives.
//!
//! This crate defines the wire-level contracts shared by the host half and
//! the guest half of the bridge: the envelope and its codec, the signal
//! token, the script expressions the host evaluates inside the guest, the
//! callback/handler registries and the routing step of the dispatcher. It
//! carries no transport or runtime dependencies so both halves can reuse it.
//!
//! # Defensive guarantees
//! Panics, `unwrap`, and `expect` are compile-denied here
//! (`#![deny(clippy::panic, clippy::unwrap_used, clippy::expect_used)]`).
//! Everything that arrives from the counterpart is untrusted, so every
//! fallible path surfaces as `BridgeError`/`Result`.

#![deny(clippy::unwrap_used)]
#![deny(clippy::expect_used)]
#![deny(clippy::panic)]

pub mod dispatch;
pub mod error;
pub mod protocol;
pub mod registry;
pub mod startup;

/// Shared result type.
pub use error::{BridgeError, ErrorCode, Result};
/// Opaque payload carried by envelopes.
pub use serde_json::Value;
