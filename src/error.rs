//! Error types raised by topology construction and address handling.

use std::net::Ipv4Addr;

use ipnet::Ipv4Net;

/// Errors produced while parsing addresses, building the topology or
/// allocating tunnel resources.
///
/// None of these are retried. `PoolExhausted` and `TunnelNumberOverflow`
/// can be raised after some tunnels were already attached; the caller
/// must discard the whole build in that case.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum MeshError {
    #[error("Invalid address '{input}': {reason}")]
    AddressFormat { input: String, reason: String },

    #[error("Invalid topology: {0}")]
    InvalidTopology(String),

    #[error("Tunnel address pool {block} exhausted while allocating pair {a} <-> {b}")]
    PoolExhausted { block: Ipv4Net, a: Ipv4Addr, b: Ipv4Addr },

    #[error("Tunnel number {number} for site {site} exceeds maximum allowed value of {ceiling}")]
    TunnelNumberOverflow { site: String, number: u32, ceiling: u32 },

    #[error("Invalid site '{site}': {reason}")]
    InvalidSite { site: String, reason: String },
}

impl MeshError {
    pub(crate) fn address(input: &str, reason: impl Into<String>) -> Self {
        MeshError::AddressFormat {
            input: input.to_string(),
            reason: reason.into(),
        }
    }
}
