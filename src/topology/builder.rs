//! Topology construction.
//!
//! The builder turns a topology selection into a list of site pairs and
//! creates the tunnels for every pair: one tunnel per combination of the two
//! sites' WAN endpoints, with addresses from the shared tunnel pool and
//! tunnel numbers from each site's own counter.

use std::collections::HashSet;

use serde::Serialize;

use crate::config::Settings;
use crate::error::MeshError;
use crate::ip::TunnelAddressPool;
use crate::site::{Site, Tunnel};
use crate::topology::types::Topology;

/// Summary of one build pass
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct BuildReport {
    /// Indices of the sites taking part, in input order
    pub participants: Vec<usize>,
    /// Number of site pairs that were connected
    pub site_pairs: usize,
    /// Number of tunnel records created, counting both sides
    pub tunnels: usize,
    /// Tunnel subnets consumed from the pool
    pub subnets_allocated: u64,
}

/// Validated edge set for one topology
#[derive(Debug)]
struct EdgePlan {
    participants: Vec<usize>,
    hubs: HashSet<usize>,
    edges: Vec<(usize, usize)>,
}

/// Builds tunnels between sites according to a [`Topology`]
#[derive(Debug)]
pub struct TopologyBuilder {
    pool: TunnelAddressPool,
    tunnel_number_ceiling: u32,
}

impl TopologyBuilder {
    /// Create a builder with a fresh tunnel pool taken from `settings`
    pub fn new(settings: &Settings) -> Result<Self, MeshError> {
        let pool = TunnelAddressPool::new(settings.tunnel_network, settings.tunnel_prefix_len)?;
        Ok(Self::with_pool(pool, settings.tunnel_number_ceiling))
    }

    pub fn with_pool(pool: TunnelAddressPool, tunnel_number_ceiling: u32) -> Self {
        Self {
            pool,
            tunnel_number_ceiling,
        }
    }

    pub fn pool(&self) -> &TunnelAddressPool {
        &self.pool
    }

    /// Attach tunnels to `sites` for the given topology.
    ///
    /// The topology is validated before any site is touched. Pool exhaustion
    /// or tunnel number overflow abort the build part way; the sites must
    /// then be discarded.
    pub fn build(&mut self, sites: &mut [Site], topology: &Topology) -> Result<BuildReport, MeshError> {
        let plan = plan_edges(sites, topology)?;
        log::info!(
            "Building {} topology: {} participating sites, {} site pairs",
            topology,
            plan.participants.len(),
            plan.edges.len()
        );

        for (index, site) in sites.iter_mut().enumerate() {
            site.is_hub = plan.hubs.contains(&index);
        }

        for &index in &plan.participants {
            assign_wan_tracking(&mut sites[index])?;
        }

        let subnets_before = self.pool.allocated();
        let mut tunnels = 0;
        for &(a, b) in &plan.edges {
            tunnels += self.connect(sites, a, b)?;
        }

        let report = BuildReport {
            participants: plan.participants,
            site_pairs: plan.edges.len(),
            tunnels,
            subnets_allocated: self.pool.allocated() - subnets_before,
        };
        log::info!(
            "Created {} tunnel interfaces using {} tunnel subnets ({} remaining)",
            report.tunnels,
            report.subnets_allocated,
            self.pool.remaining()
        );
        Ok(report)
    }

    /// Create the tunnels between sites `a` and `b`, returning how many
    /// tunnel records were added
    fn connect(&mut self, sites: &mut [Site], a: usize, b: usize) -> Result<usize, MeshError> {
        let (site_a, site_b) = pair_mut(sites, a, b);
        let wans_a = site_a.wan_endpoints.clone();
        let wans_b = site_b.wan_endpoints.clone();
        let mut created = 0;

        for wan_a in &wans_a {
            for wan_b in &wans_b {
                // Both numbers must be available before either side gets a tunnel
                site_a.peek_tunnel_number(self.tunnel_number_ceiling)?;
                site_b.peek_tunnel_number(self.tunnel_number_ceiling)?;

                let lease = self.pool.allocate_pair(wan_a.ip, wan_b.ip)?;
                let is_primary = wan_a.is_primary && wan_b.is_primary;

                let number_a = site_a.next_tunnel_number(self.tunnel_number_ceiling)?;
                let number_b = site_b.next_tunnel_number(self.tunnel_number_ceiling)?;

                site_a.tunnels.push(Tunnel {
                    name: tunnel_name(number_a),
                    number: number_a,
                    source_wan: wan_a.clone(),
                    destination_wan: wan_b.clone(),
                    local_ip: lease.local,
                    remote_ip: lease.remote,
                    subnet: lease.subnet,
                    is_primary,
                    remote_site: site_b.name.clone(),
                    remote_as: site_b.local_as(),
                });

                site_b.tunnels.push(Tunnel {
                    name: tunnel_name(number_b),
                    number: number_b,
                    source_wan: wan_b.clone(),
                    destination_wan: wan_a.clone(),
                    local_ip: lease.remote,
                    remote_ip: lease.local,
                    subnet: lease.subnet,
                    is_primary,
                    remote_site: site_a.name.clone(),
                    remote_as: site_a.local_as(),
                });
                created += 2;

                log::debug!(
                    "{} {} ({}) <-> {} {} ({}) over {}{}",
                    site_a.name,
                    wan_a.interface_name,
                    lease.local,
                    site_b.name,
                    wan_b.interface_name,
                    lease.remote,
                    lease.subnet,
                    if is_primary { " [primary]" } else { "" }
                );
            }
        }

        Ok(created)
    }
}

pub fn tunnel_name(number: u32) -> String {
    format!("tunnel{}", number)
}

/// Give every WAN endpoint of a multi-WAN site its own track id
fn assign_wan_tracking(site: &mut Site) -> Result<(), MeshError> {
    if !site.is_multi_wan() {
        return Ok(());
    }
    for i in 0..site.wan_endpoints.len() {
        let id = site.next_track_id()?;
        site.wan_endpoints[i].track_id = Some(id);
    }
    Ok(())
}

/// Validate the topology against the site list and compute its edges
fn plan_edges(sites: &[Site], topology: &Topology) -> Result<EdgePlan, MeshError> {
    let mut seen = HashSet::new();
    for site in sites {
        if !seen.insert(site.name.as_str()) {
            return Err(MeshError::InvalidTopology(format!(
                "site name {} appears more than once",
                site.name
            )));
        }
    }

    let all: Vec<usize> = (0..sites.len()).collect();

    match topology {
        Topology::FullMesh => Ok(EdgePlan {
            edges: ordered_pairs(sites, &all),
            participants: all,
            hubs: HashSet::new(),
        }),
        Topology::HubSpoke { hubs } => {
            if hubs.is_empty() {
                return Err(MeshError::InvalidTopology(
                    "hub sites must be specified for hub-spoke topology".to_string(),
                ));
            }
            let mut hub_set = HashSet::new();
            for hub in hubs {
                hub_set.insert(find_site(sites, hub)?);
            }

            let hub_list: Vec<usize> = all.iter().copied().filter(|i| hub_set.contains(i)).collect();
            let spokes: Vec<usize> = all.iter().copied().filter(|i| !hub_set.contains(i)).collect();

            let mut edges = ordered_pairs(sites, &hub_list);
            for &hub in &hub_list {
                for &spoke in &spokes {
                    edges.push((hub, spoke));
                }
            }

            Ok(EdgePlan {
                participants: all,
                hubs: hub_set,
                edges,
            })
        }
        Topology::PeerToPeer { peers } => {
            if peers.len() != 2 {
                return Err(MeshError::InvalidTopology(format!(
                    "peer-to-peer topology needs exactly two sites, got {}",
                    peers.len()
                )));
            }
            let first = find_site(sites, &peers[0])?;
            let second = find_site(sites, &peers[1])?;
            if first == second {
                return Err(MeshError::InvalidTopology(format!(
                    "peer-to-peer topology needs two distinct sites, got {} twice",
                    peers[0]
                )));
            }
            let (a, b) = (first.min(second), first.max(second));

            Ok(EdgePlan {
                participants: vec![a, b],
                hubs: HashSet::new(),
                edges: vec![(a, b)],
            })
        }
    }
}

fn find_site(sites: &[Site], name: &str) -> Result<usize, MeshError> {
    sites
        .iter()
        .position(|site| site.name == name.trim())
        .ok_or_else(|| MeshError::InvalidTopology(format!("unknown site {}", name)))
}

/// Every unordered pair of `indices` once, smaller site name first,
/// in input order of the smaller name's site
fn ordered_pairs(sites: &[Site], indices: &[usize]) -> Vec<(usize, usize)> {
    let mut pairs = Vec::new();
    for &i in indices {
        for &j in indices {
            if sites[i].name < sites[j].name {
                pairs.push((i, j));
            }
        }
    }
    pairs
}

/// Borrow two distinct sites mutably
fn pair_mut(sites: &mut [Site], a: usize, b: usize) -> (&mut Site, &mut Site) {
    assert_ne!(a, b, "a site cannot be paired with itself");
    if a < b {
        let (left, right) = sites.split_at_mut(b);
        (&mut left[a], &mut right[0])
    } else {
        let (left, right) = sites.split_at_mut(a);
        (&mut right[0], &mut left[b])
    }
}
