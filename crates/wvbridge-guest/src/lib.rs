//! Guest half of the bridge.
//!
//! Models what runs inside the embedded script runtime: a single-threaded
//! cooperative task queue, the lazily installed bridge singleton, and a
//! minimal evaluator for the expressions the host injects. Everything here
//! is `!Send` by construction (`Rc`/`RefCell`); a guest runtime lives on one
//! thread, the way a page's script engine does.

#![deny(clippy::unwrap_used)]
#![deny(clippy::expect_used)]
#![deny(clippy::panic)]

pub mod bridge;
pub mod runtime;
pub mod scheduler;

pub use bridge::{GuestBridge, GuestHandler, GuestResponder, HostNotifier};
pub use runtime::GuestRuntime;
pub use scheduler::TaskQueue;
