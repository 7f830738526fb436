//! Site records.
//!
//! A [`Site`] is created from one inventory entry and collects the tunnels
//! the topology builder attaches to it.

pub mod types;

pub use types::{Site, Tunnel, WanEndpoint};
