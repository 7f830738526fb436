//! Tunnel address pool.
//!
//! Point-to-point tunnel subnets are carved out of one large block. Every
//! unordered pair of WAN addresses gets exactly one subnet for the lifetime
//! of the pool, and asking for the same pair again (in either order) returns
//! the same two host addresses.

use std::collections::HashMap;
use std::net::Ipv4Addr;

use ipnet::{Ipv4Net, Ipv4Subnets};
use serde::Serialize;

use crate::error::MeshError;

/// Addresses handed out for one side of a tunnel
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct TunnelLease {
    /// Subnet both addresses were drawn from
    pub subnet: Ipv4Net,
    /// Address for the first IP passed to [`TunnelAddressPool::allocate_pair`]
    pub local: Ipv4Addr,
    /// Address for the second IP passed to [`TunnelAddressPool::allocate_pair`]
    pub remote: Ipv4Addr,
}

impl TunnelLease {
    fn swapped(self) -> Self {
        Self {
            subnet: self.subnet,
            local: self.remote,
            remote: self.local,
        }
    }
}

/// Canonical, order-independent key for a WAN address pair.
///
/// The two addresses are ordered by their dotted-quad text, so
/// `10.0.0.10` sorts before `10.0.0.9`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
struct PairKey {
    first: Ipv4Addr,
    second: Ipv4Addr,
}

impl PairKey {
    /// Returns the key and whether `(a, b)` is the reverse of canonical order
    fn canonical(a: Ipv4Addr, b: Ipv4Addr) -> (Self, bool) {
        if a.to_string() <= b.to_string() {
            (Self { first: a, second: b }, false)
        } else {
            (Self { first: b, second: a }, true)
        }
    }
}

/// Pool of point-to-point subnets sliced from one block
#[derive(Debug)]
pub struct TunnelAddressPool {
    block: Ipv4Net,
    subnet_prefix_len: u8,
    subnets: Ipv4Subnets,
    capacity: u64,
    consumed: u64,
    /// Leases stored in canonical order: `local` belongs to `PairKey::first`
    allocations: HashMap<PairKey, TunnelLease>,
}

impl TunnelAddressPool {
    /// Default block tunnel subnets are carved from
    pub const DEFAULT_BLOCK: &'static str = "172.26.0.0/15";
    /// Default tunnel subnet size
    pub const DEFAULT_SUBNET_PREFIX: u8 = 29;

    /// Slice `block` into subnets of `subnet_prefix_len`.
    ///
    /// The subnet prefix must be at least the block prefix and at most 30,
    /// so every subnet has two usable host addresses.
    pub fn new(block: Ipv4Net, subnet_prefix_len: u8) -> Result<Self, MeshError> {
        let block = block.trunc();
        if subnet_prefix_len > 30 || subnet_prefix_len < block.prefix_len() {
            return Err(MeshError::address(
                &block.to_string(),
                format!(
                    "cannot slice into /{} tunnel subnets (need /{}../30)",
                    subnet_prefix_len,
                    block.prefix_len()
                ),
            ));
        }
        let subnets = block
            .subnets(subnet_prefix_len)
            .map_err(|e| MeshError::address(&block.to_string(), e.to_string()))?;
        let capacity = 1u64 << (subnet_prefix_len - block.prefix_len());

        log::debug!(
            "Tunnel address pool {} sliced into {} /{} subnets",
            block,
            capacity,
            subnet_prefix_len
        );

        Ok(Self {
            block,
            subnet_prefix_len,
            subnets,
            capacity,
            consumed: 0,
            allocations: HashMap::new(),
        })
    }

    /// Allocate (or look up) the tunnel addresses for a WAN pair.
    ///
    /// `local` of the returned lease belongs to `a`, `remote` to `b`.
    /// Repeated calls for the same unordered pair never consume another
    /// subnet.
    pub fn allocate_pair(&mut self, a: Ipv4Addr, b: Ipv4Addr) -> Result<TunnelLease, MeshError> {
        let (key, reversed) = PairKey::canonical(a, b);

        if let Some(lease) = self.allocations.get(&key) {
            return Ok(orient(*lease, reversed));
        }

        let subnet = self
            .subnets
            .next()
            .ok_or(MeshError::PoolExhausted { block: self.block, a, b })?;
        let mut hosts = subnet.hosts();
        let (first, second) = match (hosts.next(), hosts.next()) {
            (Some(first), Some(second)) => (first, second),
            _ => {
                return Err(MeshError::address(
                    &subnet.to_string(),
                    "tunnel subnet has fewer than two host addresses",
                ))
            }
        };
        self.consumed += 1;

        let lease = TunnelLease {
            subnet,
            local: first,
            remote: second,
        };
        self.allocations.insert(key, lease);

        log::debug!(
            "Allocated {} for {} <-> {} ({}/{} subnets used)",
            subnet,
            key.first,
            key.second,
            self.consumed,
            self.capacity
        );

        Ok(orient(lease, reversed))
    }

    /// Look up an existing allocation without consuming a subnet
    pub fn lookup(&self, a: Ipv4Addr, b: Ipv4Addr) -> Option<TunnelLease> {
        let (key, reversed) = PairKey::canonical(a, b);
        self.allocations.get(&key).map(|lease| orient(*lease, reversed))
    }

    pub fn block(&self) -> Ipv4Net {
        self.block
    }

    pub fn subnet_prefix_len(&self) -> u8 {
        self.subnet_prefix_len
    }

    /// Total number of subnets in the block
    pub fn capacity(&self) -> u64 {
        self.capacity
    }

    /// Number of subnets handed out so far
    pub fn allocated(&self) -> u64 {
        self.consumed
    }

    pub fn remaining(&self) -> u64 {
        self.capacity - self.consumed
    }
}

fn orient(lease: TunnelLease, reversed: bool) -> TunnelLease {
    if reversed {
        lease.swapped()
    } else {
        lease
    }
}
