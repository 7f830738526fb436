//! Topology type definitions.
//!
//! This file contains the topology patterns the builder supports
//! (full mesh, hub-spoke and a single peer-to-peer pair).

use std::fmt;

use serde::{Deserialize, Serialize};

/// Which sites get tunnels to which
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Topology {
    /// Every site connects to every other site
    FullMesh,
    /// Hubs connect to each other and to every spoke; spokes never connect directly
    HubSpoke { hubs: Vec<String> },
    /// Only the two named sites connect
    PeerToPeer { peers: Vec<String> },
}

impl Topology {
    pub fn hub_spoke<S: AsRef<str>>(hubs: &[S]) -> Self {
        Self::HubSpoke {
            hubs: hubs.iter().map(|h| h.as_ref().to_string()).collect(),
        }
    }

    pub fn peer_to_peer<S: AsRef<str>>(peers: &[S]) -> Self {
        Self::PeerToPeer {
            peers: peers.iter().map(|p| p.as_ref().to_string()).collect(),
        }
    }

    /// Returns true if only a subset of the sites takes part
    pub fn is_partial(&self) -> bool {
        matches!(self, Self::PeerToPeer { .. })
    }
}

impl fmt::Display for Topology {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::FullMesh => write!(f, "full mesh"),
            Self::HubSpoke { hubs } => write!(f, "hub-spoke (hubs: {})", hubs.join(", ")),
            Self::PeerToPeer { peers } => write!(f, "peer-to-peer ({})", peers.join(" <-> ")),
        }
    }
}
