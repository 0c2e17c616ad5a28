//! Workspace umbrella crate.
//!
//! Re-exports the [`core_service`] façade so host applications can depend on
//! `tilawa` alone and pick bridges through features (`desktop-shims` by
//! default).

pub use core_service::*;
