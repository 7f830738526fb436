use std::net::Ipv4Addr;

use ipnet::Ipv4Net;
use serde::{Deserialize, Serialize};

use crate::ip::TunnelAddressPool;

/// Fixed generation constants.
///
/// Every field has a default, so an inventory may omit the `settings`
/// section entirely or override only the values it cares about.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct Settings {
    /// Community attached to routes advertised over primary tunnels
    pub primary_community: String,
    /// Community attached to routes advertised over backup tunnels
    pub backup_community: String,
    /// How many times the local AS is prepended on backup tunnels
    pub as_prepend_count: u8,
    /// Tunnel numbers start at `site_id * tunnel_base` (modulo `tunnel_number_modulus`)
    pub tunnel_base: u32,
    pub tunnel_number_modulus: u32,
    /// Highest tunnel number a site may use
    pub tunnel_number_ceiling: u32,
    /// Block that tunnel subnets are carved from
    pub tunnel_network: Ipv4Net,
    /// Prefix length of each tunnel subnet
    pub tunnel_prefix_len: u8,
    /// Name of the synthetic upstream router
    pub internet_router_name: String,
    /// AS number of the synthetic upstream router
    pub internet_router_as: u32,
    /// SLA probe frequency in seconds
    pub sla_frequency: u32,
    /// SLA probe timeout in seconds
    pub sla_timeout: u32,
    /// Packets per SLA probe
    pub sla_num_packets: u32,
    /// First track id handed out on each site
    pub track_base: u32,
    pub bfd: BfdTimers,
    /// Pre-shared key for sites that do not set their own
    pub default_pre_shared_key: String,
    /// Interface carrying the site's first local network
    pub inside_interface: String,
}

/// BFD interval settings (milliseconds) and multipliers
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct BfdTimers {
    pub multi_hop: BfdInterval,
    pub single_hop: BfdInterval,
    pub interface: BfdInterval,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct BfdInterval {
    pub min_tx: u32,
    pub min_rx: u32,
    pub multiplier: u32,
}

impl BfdInterval {
    pub const fn new(min_tx: u32, min_rx: u32, multiplier: u32) -> Self {
        Self { min_tx, min_rx, multiplier }
    }
}

/// Default implementation for BfdTimers
impl Default for BfdTimers {
    fn default() -> Self {
        Self {
            multi_hop: BfdInterval::new(100, 100, 3),
            single_hop: BfdInterval::new(50, 50, 3),
            interface: BfdInterval::new(100, 100, 5),
        }
    }
}

/// Default implementation for Settings
impl Default for Settings {
    fn default() -> Self {
        Self {
            primary_community: "65000:100".to_string(),
            backup_community: "65000:200".to_string(),
            as_prepend_count: 3,
            tunnel_base: 100,
            tunnel_number_modulus: 10_000,
            tunnel_number_ceiling: 10_000,
            tunnel_network: TunnelAddressPool::DEFAULT_BLOCK
                .parse()
                .unwrap_or_else(|_| Ipv4Net::from(Ipv4Addr::UNSPECIFIED)),
            tunnel_prefix_len: TunnelAddressPool::DEFAULT_SUBNET_PREFIX,
            internet_router_name: "INTERNET-RTR".to_string(),
            internet_router_as: 65000,
            sla_frequency: 5,
            sla_timeout: 1,
            sla_num_packets: 2,
            track_base: 100,
            bfd: BfdTimers::default(),
            default_pre_shared_key: "cisco123".to_string(),
            inside_interface: "Vlan17".to_string(),
        }
    }
}

impl Settings {
    /// First tunnel number for a site
    pub fn tunnel_number_base(&self, site_id: u32) -> u32 {
        let modulus = self.tunnel_number_modulus.max(1) as u64;
        ((site_id as u64 * self.tunnel_base as u64) % modulus) as u32
    }
}
