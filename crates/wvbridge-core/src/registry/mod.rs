//! Registries shared by both halves of the bridge.
//!
//! Both sides keep the same two tables: pending reply continuations keyed by
//! correlation id, and local message handlers keyed by name.

mod callbacks;
mod handlers;

pub use callbacks::CallbackRegistry;
pub use handlers::HandlerRegistry;
