//! Top-level facade crate for wvbridge.
//!
//! Re-exports the protocol core, the guest runtime and the host library so
//! users can depend on a single crate.

pub mod core {
    pub use wvbridge_core::*;
}

pub mod guest {
    pub use wvbridge_guest::*;
}

pub mod host {
    pub use wvbridge_host::*;
}
