//! Site, WAN endpoint and tunnel records.

use std::net::Ipv4Addr;

use ipnet::Ipv4Net;
use serde::Serialize;

use crate::config::Settings;
use crate::error::MeshError;
use crate::inventory::{SiteRecord, WanRecord};
use crate::ip::{mask_to_prefix, NetworkAddress};

/// One upstream-facing interface of a site
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct WanEndpoint {
    /// Device interface name, e.g. `GigabitEthernet0/0`
    pub interface_name: String,
    pub ip: Ipv4Addr,
    pub netmask: Ipv4Addr,
    pub gateway: Ipv4Addr,
    pub is_primary: bool,
    /// Track id of the SLA probe watching this uplink, multi-WAN sites only
    #[serde(skip_serializing_if = "Option::is_none")]
    pub track_id: Option<u32>,
}

impl WanEndpoint {
    fn from_record(record: &WanRecord, is_primary: bool) -> Result<Self, MeshError> {
        let address = NetworkAddress::parse(&record.address)?;
        let gateway = record.gateway.trim().parse::<Ipv4Addr>().map_err(|_| {
            MeshError::address(&record.gateway, "gateway is not a valid IPv4 address")
        })?;

        Ok(Self {
            interface_name: record.interface.trim().to_string(),
            ip: address.ip(),
            netmask: address.netmask(),
            gateway,
            is_primary,
            track_id: None,
        })
    }

    /// The `nameif` used for this interface in rendered configs
    pub fn nameif(&self) -> String {
        format!("outside-{}", self.interface_name.to_lowercase().replace('/', "_"))
    }

    /// The network this endpoint's address belongs to
    pub fn network(&self) -> Ipv4Net {
        let prefix = mask_to_prefix(self.netmask).unwrap_or(32);
        Ipv4Net::new(self.ip, prefix)
            .map(|net| net.trunc())
            .unwrap_or_else(|_| Ipv4Net::from(self.ip))
    }
}

/// One side of an IPSec tunnel
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Tunnel {
    /// Interface name, e.g. `tunnel100`
    pub name: String,
    pub number: u32,
    pub source_wan: WanEndpoint,
    pub destination_wan: WanEndpoint,
    pub local_ip: Ipv4Addr,
    pub remote_ip: Ipv4Addr,
    pub subnet: Ipv4Net,
    pub is_primary: bool,
    pub remote_site: String,
    pub remote_as: u32,
}

/// A site taking part in the VPN.
///
/// Tunnels and counters are filled in by the topology builder; renderers
/// only read a site.
#[derive(Debug, Clone, Serialize)]
pub struct Site {
    pub name: String,
    pub site_id: u32,
    pub location: String,
    pub is_hub: bool,
    pub wan_endpoints: Vec<WanEndpoint>,
    pub local_networks: Vec<NetworkAddress>,
    pub bgp_as: Vec<u32>,
    #[serde(skip)]
    pub pre_shared_key: String,
    pub tunnels: Vec<Tunnel>,
    #[serde(skip)]
    tunnel_base: u32,
    #[serde(skip)]
    tunnel_counter: u32,
    #[serde(skip)]
    track_counter: u32,
}

impl Site {
    /// Build a site from its inventory record.
    ///
    /// The first WAN listed becomes the primary uplink.
    pub fn from_record(record: &SiteRecord, settings: &Settings) -> Result<Self, MeshError> {
        let invalid = |reason: &str| MeshError::InvalidSite {
            site: record.name.clone(),
            reason: reason.to_string(),
        };

        if record.name.trim().is_empty() {
            return Err(invalid("site name cannot be empty"));
        }
        if record.wan.is_empty() {
            return Err(invalid("at least one WAN endpoint is required"));
        }
        if record.bgp_as.is_empty() {
            return Err(invalid("at least one BGP AS number is required"));
        }

        let wan_endpoints = record
            .wan
            .iter()
            .enumerate()
            .map(|(i, wan)| WanEndpoint::from_record(wan, i == 0))
            .collect::<Result<Vec<_>, _>>()?;
        let local_networks = record
            .local_networks
            .iter()
            .map(|net| NetworkAddress::parse(net))
            .collect::<Result<Vec<_>, _>>()?;

        Ok(Self {
            name: record.name.trim().to_string(),
            site_id: record.site_id,
            location: record.location.trim().to_string(),
            is_hub: false,
            wan_endpoints,
            local_networks,
            bgp_as: record.bgp_as.clone(),
            pre_shared_key: record
                .pre_shared_key
                .clone()
                .unwrap_or_else(|| settings.default_pre_shared_key.clone()),
            tunnels: Vec::new(),
            tunnel_base: settings.tunnel_number_base(record.site_id),
            tunnel_counter: 0,
            track_counter: settings.track_base,
        })
    }

    /// The AS number this site speaks BGP with
    pub fn local_as(&self) -> u32 {
        self.bgp_as.first().copied().unwrap_or_default()
    }

    pub fn primary_wan(&self) -> Option<&WanEndpoint> {
        self.wan_endpoints.iter().find(|wan| wan.is_primary)
    }

    pub fn is_multi_wan(&self) -> bool {
        self.wan_endpoints.len() > 1
    }

    /// First usable host and netmask of the first local network
    pub fn inside_address(&self) -> Option<(Ipv4Addr, Ipv4Addr)> {
        self.local_networks
            .first()
            .map(|net| (net.first_host(), net.netmask()))
    }

    /// The network the inside interface sits on
    pub fn inside_network(&self) -> Option<Ipv4Net> {
        self.local_networks.first().map(NetworkAddress::network)
    }

    /// Next tunnel number for this site.
    ///
    /// Fails without advancing the counter once the number would exceed
    /// `ceiling`.
    pub(crate) fn next_tunnel_number(&mut self, ceiling: u32) -> Result<u32, MeshError> {
        let number = self.peek_tunnel_number(ceiling)?;
        self.tunnel_counter += 1;
        Ok(number)
    }

    /// The number [`Site::next_tunnel_number`] would hand out, without
    /// consuming it
    pub(crate) fn peek_tunnel_number(&self, ceiling: u32) -> Result<u32, MeshError> {
        let overflow = |number| MeshError::TunnelNumberOverflow {
            site: self.name.clone(),
            number,
            ceiling,
        };
        let number = self
            .tunnel_base
            .checked_add(self.tunnel_counter)
            .ok_or_else(|| overflow(u32::MAX))?;
        if number > ceiling {
            return Err(overflow(number));
        }
        Ok(number)
    }

    /// Next failover track id for this site
    pub(crate) fn next_track_id(&mut self) -> Result<u32, MeshError> {
        let id = self.track_counter;
        self.track_counter = id.checked_add(1).ok_or_else(|| MeshError::InvalidSite {
            site: self.name.clone(),
            reason: format!("track ids exhausted after {}", id),
        })?;
        Ok(id)
    }

    /// Number of tunnel numbers handed out so far
    pub fn tunnels_numbered(&self) -> u32 {
        self.tunnel_counter
    }
}
