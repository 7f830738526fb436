//! IPv4 address handling.
//!
//! This module parses the addresses found in site inventories and owns the
//! pool that point-to-point tunnel subnets are allocated from.

pub mod address;
pub mod pool;

// Re-export commonly used types
pub use address::{mask_to_prefix, NetworkAddress, DEFAULT_NETMASK};
pub use pool::{TunnelAddressPool, TunnelLease};
