use std::collections::{HashMap, HashSet};
use std::net::Ipv4Addr;

use serde::{Deserialize, Serialize};

use crate::config::Settings;
use crate::ip::NetworkAddress;

/// Longest SLA probe frequency or timeout a router accepts (one week)
const MAX_SLA_SECONDS: u32 = 604_800;
/// Highest first track id; SLA monitor ids are positive 32-bit signed values
const MAX_TRACK_BASE: u32 = i32::MAX as u32;

/// Top-level inventory file: optional generation settings plus the site list
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Inventory {
    #[serde(default)]
    pub settings: Settings,
    pub sites: Vec<SiteRecord>,
}

/// One site as written in the inventory
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SiteRecord {
    pub name: String,
    pub site_id: u32,
    #[serde(default)]
    pub location: String,
    /// WAN uplinks in priority order; the first one is primary
    pub wan: Vec<WanRecord>,
    /// Local networks in CIDR or "address mask" form
    #[serde(default)]
    pub local_networks: Vec<String>,
    /// BGP AS numbers; the first one is the site's local AS
    pub bgp_as: Vec<u32>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub pre_shared_key: Option<String>,
}

/// One WAN uplink as written in the inventory
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct WanRecord {
    pub interface: String,
    /// Address in CIDR or "address mask" form
    pub address: String,
    pub gateway: String,
}

impl SiteRecord {
    pub fn new(name: &str, site_id: u32) -> Self {
        Self {
            name: name.to_string(),
            site_id,
            location: String::new(),
            wan: Vec::new(),
            local_networks: Vec::new(),
            bgp_as: Vec::new(),
            pre_shared_key: None,
        }
    }

    pub fn with_location(mut self, location: &str) -> Self {
        self.location = location.to_string();
        self
    }

    pub fn with_wan(mut self, interface: &str, address: &str, gateway: &str) -> Self {
        self.wan.push(WanRecord {
            interface: interface.to_string(),
            address: address.to_string(),
            gateway: gateway.to_string(),
        });
        self
    }

    pub fn with_local_network(mut self, network: &str) -> Self {
        self.local_networks.push(network.to_string());
        self
    }

    pub fn with_as(mut self, as_number: u32) -> Self {
        self.bgp_as.push(as_number);
        self
    }

    pub fn with_pre_shared_key(mut self, key: &str) -> Self {
        self.pre_shared_key = Some(key.to_string());
        self
    }
}

impl Inventory {
    /// Validate the inventory
    pub fn validate(&self) -> Result<(), ValidationError> {
        self.validate_settings()?;

        if self.sites.is_empty() {
            return Err(ValidationError::InvalidSite(
                "inventory must contain at least one site".to_string(),
            ));
        }

        let mut names = HashSet::new();
        for site in &self.sites {
            Self::validate_site(site)?;
            if !names.insert(site.name.trim()) {
                return Err(ValidationError::DuplicateSite(site.name.clone()));
            }
        }

        self.warn_shared_wan_addresses();

        Ok(())
    }

    fn validate_settings(&self) -> Result<(), ValidationError> {
        let settings = &self.settings;

        if settings.primary_community.trim().is_empty() || settings.backup_community.trim().is_empty() {
            return Err(ValidationError::InvalidSettings(
                "communities cannot be empty".to_string(),
            ));
        }
        if settings.primary_community == settings.backup_community {
            return Err(ValidationError::InvalidSettings(format!(
                "primary and backup community must differ (both {})",
                settings.primary_community
            )));
        }
        if settings.tunnel_prefix_len > 30 || settings.tunnel_prefix_len < settings.tunnel_network.prefix_len() {
            return Err(ValidationError::InvalidSettings(format!(
                "tunnel_prefix_len {} must be between {} and 30 for tunnel_network {}",
                settings.tunnel_prefix_len,
                settings.tunnel_network.prefix_len(),
                settings.tunnel_network
            )));
        }
        if settings.tunnel_number_modulus == 0 || settings.tunnel_number_ceiling == 0 {
            return Err(ValidationError::InvalidSettings(
                "tunnel_number_modulus and tunnel_number_ceiling must be positive".to_string(),
            ));
        }
        if settings.sla_frequency == 0 || settings.sla_frequency > MAX_SLA_SECONDS {
            return Err(ValidationError::InvalidSettings(format!(
                "sla_frequency must be between 1 and {} seconds",
                MAX_SLA_SECONDS
            )));
        }
        if settings.sla_timeout > MAX_SLA_SECONDS {
            return Err(ValidationError::InvalidSettings(format!(
                "sla_timeout must be at most {} seconds",
                MAX_SLA_SECONDS
            )));
        }
        if settings.sla_num_packets == 0 {
            return Err(ValidationError::InvalidSettings(
                "sla_num_packets must be positive".to_string(),
            ));
        }
        if settings.track_base == 0 || settings.track_base > MAX_TRACK_BASE {
            return Err(ValidationError::InvalidSettings(format!(
                "track_base must be between 1 and {}",
                MAX_TRACK_BASE
            )));
        }
        if settings.internet_router_name.trim().is_empty() {
            return Err(ValidationError::InvalidSettings(
                "internet_router_name cannot be empty".to_string(),
            ));
        }

        Ok(())
    }

    fn validate_site(site: &SiteRecord) -> Result<(), ValidationError> {
        let name = site.name.trim();
        if name.is_empty() {
            return Err(ValidationError::InvalidSite("site name cannot be empty".to_string()));
        }
        if site.wan.is_empty() {
            return Err(ValidationError::InvalidSite(format!(
                "site {} has no WAN endpoints",
                name
            )));
        }
        if site.bgp_as.is_empty() {
            return Err(ValidationError::InvalidSite(format!(
                "site {} has no BGP AS number",
                name
            )));
        }

        for wan in &site.wan {
            if wan.interface.trim().is_empty() {
                return Err(ValidationError::InvalidSite(format!(
                    "site {} has a WAN endpoint without an interface name",
                    name
                )));
            }
            NetworkAddress::parse(&wan.address)
                .map_err(|e| ValidationError::InvalidSite(format!("site {}: {}", name, e)))?;
            wan.gateway.trim().parse::<Ipv4Addr>().map_err(|_| {
                ValidationError::InvalidSite(format!(
                    "site {}: gateway '{}' is not a valid IPv4 address",
                    name, wan.gateway
                ))
            })?;
        }

        for network in &site.local_networks {
            NetworkAddress::parse(network)
                .map_err(|e| ValidationError::InvalidSite(format!("site {}: {}", name, e)))?;
        }

        Ok(())
    }

    /// Two uplinks sharing an address would share tunnel subnets
    fn warn_shared_wan_addresses(&self) {
        let mut seen: HashMap<Ipv4Addr, &str> = HashMap::new();
        for site in &self.sites {
            for wan in &site.wan {
                let Ok(address) = NetworkAddress::parse(&wan.address) else {
                    continue;
                };
                match seen.get(&address.ip()) {
                    Some(owner) => log::warn!(
                        "WAN address {} is used by both {} and {}; their tunnels will share addresses",
                        address.ip(),
                        owner,
                        site.name
                    ),
                    None => {
                        seen.insert(address.ip(), &site.name);
                    }
                }
            }
        }
    }

    /// Look up a site record by name
    pub fn site(&self, name: &str) -> Option<&SiteRecord> {
        self.sites.iter().find(|site| site.name.trim() == name)
    }
}

#[derive(Debug, thiserror::Error)]
pub enum ValidationError {
    #[error("Invalid site configuration: {0}")]
    InvalidSite(String),
    #[error("Duplicate site name: {0}")]
    DuplicateSite(String),
    #[error("Invalid settings: {0}")]
    InvalidSettings(String),
}
