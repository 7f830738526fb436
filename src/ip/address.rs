//! IPv4 address / netmask parsing.
//!
//! Inventory files carry addresses either in CIDR form (`10.1.0.1/24`) or in
//! the router-native "address mask" form (`10.1.0.1 255.255.255.0`). Both are
//! normalized into a [`NetworkAddress`].

use std::fmt;
use std::net::Ipv4Addr;
use std::str::FromStr;

use ipnet::Ipv4Net;
use serde::Serialize;

use crate::error::MeshError;

/// Netmask used when an "address mask" string omits the mask token
pub const DEFAULT_NETMASK: Ipv4Addr = Ipv4Addr::new(255, 255, 255, 0);

/// An IPv4 address together with its netmask.
///
/// Host bits are kept as given; [`NetworkAddress::network_address`] masks
/// them off when the network itself is needed.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
pub struct NetworkAddress {
    ip: Ipv4Addr,
    netmask: Ipv4Addr,
}

impl NetworkAddress {
    /// Parse `"ip/prefix"` or `"ip [netmask]"`.
    ///
    /// # Examples
    /// ```
    /// use meshgen::ip::NetworkAddress;
    ///
    /// let cidr = NetworkAddress::parse("10.1.0.1/24").unwrap();
    /// let spaced = NetworkAddress::parse("10.1.0.1 255.255.255.0").unwrap();
    /// assert_eq!(cidr, spaced);
    /// assert_eq!(cidr.network_address().to_string(), "10.1.0.0");
    /// ```
    pub fn parse(input: &str) -> Result<Self, MeshError> {
        let trimmed = input.trim();

        if let Some((ip, prefix)) = trimmed.split_once('/') {
            let ip = parse_ip(input, ip.trim())?;
            let prefix: u8 = prefix
                .trim()
                .parse()
                .map_err(|_| MeshError::address(input, format!("invalid prefix length '{}'", prefix.trim())))?;
            let net = Ipv4Net::new(ip, prefix)
                .map_err(|_| MeshError::address(input, format!("prefix length {} out of range", prefix)))?;
            return Ok(Self { ip, netmask: net.netmask() });
        }

        let mut tokens = trimmed.split_whitespace();
        let ip_token = tokens
            .next()
            .ok_or_else(|| MeshError::address(input, "empty address"))?;
        let ip = parse_ip(input, ip_token)?;

        let netmask = match tokens.next() {
            Some(mask) => {
                let mask = parse_ip(input, mask)?;
                mask_to_prefix(mask)
                    .ok_or_else(|| MeshError::address(input, format!("non-contiguous netmask {}", mask)))?;
                mask
            }
            None => {
                log::warn!("No netmask given for '{}', defaulting to {}", trimmed, DEFAULT_NETMASK);
                DEFAULT_NETMASK
            }
        };

        if let Some(extra) = tokens.next() {
            return Err(MeshError::address(input, format!("unexpected token '{}'", extra)));
        }

        Ok(Self { ip, netmask })
    }

    pub fn ip(&self) -> Ipv4Addr {
        self.ip
    }

    pub fn netmask(&self) -> Ipv4Addr {
        self.netmask
    }

    pub fn prefix_len(&self) -> u8 {
        // The constructor only accepts contiguous masks.
        mask_to_prefix(self.netmask).unwrap_or(32)
    }

    /// The network this address lives in, host bits zeroed
    pub fn network(&self) -> Ipv4Net {
        Ipv4Net::new(self.ip, self.prefix_len())
            .map(|net| net.trunc())
            .unwrap_or_else(|_| Ipv4Net::from(self.ip))
    }

    /// The network address with host bits masked off
    pub fn network_address(&self) -> Ipv4Addr {
        self.network().network()
    }

    /// The first usable host address of the network.
    ///
    /// For /31 and /32 networks every address is usable, so this is the
    /// network address itself.
    pub fn first_host(&self) -> Ipv4Addr {
        self.network()
            .hosts()
            .next()
            .unwrap_or_else(|| self.network_address())
    }
}

impl FromStr for NetworkAddress {
    type Err = MeshError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::parse(s)
    }
}

impl fmt::Display for NetworkAddress {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} {}", self.ip, self.netmask)
    }
}

fn parse_ip(input: &str, token: &str) -> Result<Ipv4Addr, MeshError> {
    token
        .parse::<Ipv4Addr>()
        .map_err(|_| MeshError::address(input, format!("'{}' is not a valid IPv4 address", token)))
}

/// Convert a netmask into its prefix length, `None` if the mask is not contiguous
pub fn mask_to_prefix(mask: Ipv4Addr) -> Option<u8> {
    let bits = u32::from(mask);
    let prefix = bits.leading_ones();
    if bits.checked_shl(prefix).unwrap_or(0) != 0 {
        return None;
    }
    Some(prefix as u8)
}
