//! Configuration orchestrator.
//!
//! This module coordinates the overall generation process, managing the flow
//! from the validated inventory through topology construction to the
//! rendered configuration files.

use std::fs;
use std::net::Ipv4Addr;
use std::path::{Path, PathBuf};

use color_eyre::eyre::WrapErr;
use color_eyre::Result;
use ipnet::Ipv4Net;
use log::info;
use rayon::prelude::*;
use serde::Serialize;

use crate::config::Settings;
use crate::error::MeshError;
use crate::inventory::Inventory;
use crate::render::{DeviceConfigRenderer, InternetRouterRenderer};
use crate::site::{Site, Tunnel};
use crate::topology::{BuildReport, Topology, TopologyBuilder};

/// File the tunnel plan is written to
pub const TUNNEL_PLAN_FILE: &str = "tunnel_plan.json";

/// What to generate from an inventory
#[derive(Debug, Clone)]
pub struct GenerationRequest {
    pub topology: Topology,
    /// Also render the synthetic upstream router
    pub include_internet_router: bool,
    /// Also write the JSON tunnel plan
    pub write_plan: bool,
}

/// Sites after topology construction, restricted to the participants
#[derive(Debug)]
pub struct BuiltNetwork {
    pub sites: Vec<Site>,
    pub report: BuildReport,
    pub pool_block: Ipv4Net,
    pub pool_prefix_len: u8,
    pub pool_capacity: u64,
}

/// One rendered configuration ready to be written out
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RenderedConfig {
    pub device: String,
    pub file_name: String,
    pub text: String,
}

/// Machine-readable summary of every tunnel that was created
#[derive(Debug, Serialize)]
pub struct TunnelPlan<'a> {
    pub topology: String,
    pub pool: PoolSummary,
    pub sites: Vec<SitePlan<'a>>,
}

#[derive(Debug, Serialize)]
pub struct PoolSummary {
    pub block: Ipv4Net,
    pub subnet_prefix_len: u8,
    pub allocated: u64,
    pub capacity: u64,
}

#[derive(Debug, Serialize)]
pub struct SitePlan<'a> {
    pub name: &'a str,
    pub site_id: u32,
    pub role: &'static str,
    pub local_as: u32,
    pub wan: Vec<(&'a str, Ipv4Addr)>,
    pub tunnels: &'a [Tunnel],
}

/// Files written by [`generate`]
#[derive(Debug)]
pub struct GenerationSummary {
    pub report: BuildReport,
    pub files: Vec<PathBuf>,
}

/// Turn every inventory record into a site
pub fn prepare_sites(inventory: &Inventory) -> Result<Vec<Site>, MeshError> {
    inventory
        .sites
        .iter()
        .map(|record| Site::from_record(record, &inventory.settings))
        .collect()
}

/// Build the topology and keep only the sites that take part in it
pub fn build_network(inventory: &Inventory, topology: &Topology) -> Result<BuiltNetwork, MeshError> {
    let mut sites = prepare_sites(inventory)?;
    let mut builder = TopologyBuilder::new(&inventory.settings)?;
    let report = builder.build(&mut sites, topology)?;

    if topology.is_partial() {
        info!(
            "{} of {} sites take part in the {} topology",
            report.participants.len(),
            sites.len(),
            topology
        );
    }

    let sites = sites
        .into_iter()
        .enumerate()
        .filter(|(index, _)| report.participants.binary_search(index).is_ok())
        .map(|(_, site)| site)
        .collect();

    let pool = builder.pool();
    Ok(BuiltNetwork {
        sites,
        report,
        pool_block: pool.block(),
        pool_prefix_len: pool.subnet_prefix_len(),
        pool_capacity: pool.capacity(),
    })
}

/// Render every site, plus the upstream router when asked.
///
/// Sites are rendered in parallel; the result keeps input order.
pub fn render_all(sites: &[Site], settings: &Settings, include_internet_router: bool) -> Vec<RenderedConfig> {
    let renderer = DeviceConfigRenderer::new(settings);
    let mut rendered: Vec<RenderedConfig> = sites
        .par_iter()
        .map(|site| RenderedConfig {
            device: site.name.clone(),
            file_name: config_file_name(&site.name),
            text: renderer.render(site),
        })
        .collect();

    if include_internet_router {
        rendered.push(RenderedConfig {
            device: settings.internet_router_name.clone(),
            file_name: config_file_name(&settings.internet_router_name),
            text: InternetRouterRenderer::new(settings).render(sites),
        });
    }

    rendered
}

/// Build the JSON-serializable tunnel plan for a built network
pub fn tunnel_plan<'a>(network: &'a BuiltNetwork, topology: &Topology) -> TunnelPlan<'a> {
    TunnelPlan {
        topology: topology.to_string(),
        pool: PoolSummary {
            block: network.pool_block,
            subnet_prefix_len: network.pool_prefix_len,
            allocated: network.report.subnets_allocated,
            capacity: network.pool_capacity,
        },
        sites: network
            .sites
            .iter()
            .map(|site| SitePlan {
                name: &site.name,
                site_id: site.site_id,
                role: if site.is_hub { "hub" } else { "spoke" },
                local_as: site.local_as(),
                wan: site
                    .wan_endpoints
                    .iter()
                    .map(|wan| (wan.interface_name.as_str(), wan.ip))
                    .collect(),
                tunnels: &site.tunnels,
            })
            .collect(),
    }
}

/// Run the whole pipeline and write the results into `output_dir`
pub fn generate(inventory: &Inventory, request: &GenerationRequest, output_dir: &Path) -> Result<GenerationSummary> {
    info!("Generating {} configuration for {} sites", request.topology, inventory.sites.len());

    let network = build_network(inventory, &request.topology)
        .wrap_err_with(|| format!("Failed to build {} topology", request.topology))?;

    let rendered = render_all(&network.sites, &inventory.settings, request.include_internet_router);

    fs::create_dir_all(output_dir)
        .wrap_err_with(|| format!("Failed to create output directory '{}'", output_dir.display()))?;

    let mut files = Vec::with_capacity(rendered.len() + 1);
    for config in &rendered {
        let path = output_dir.join(&config.file_name);
        fs::write(&path, &config.text)
            .wrap_err_with(|| format!("Failed to write configuration for {} to '{}'", config.device, path.display()))?;
        info!("Wrote configuration for {} to {:?}", config.device, path);
        files.push(path);
    }

    if request.write_plan {
        let path = output_dir.join(TUNNEL_PLAN_FILE);
        let plan_json = serde_json::to_string_pretty(&tunnel_plan(&network, &request.topology))?;
        fs::write(&path, plan_json)
            .wrap_err_with(|| format!("Failed to write tunnel plan to '{}'", path.display()))?;
        info!("Wrote tunnel plan to {:?}", path);
        files.push(path);
    }

    Ok(GenerationSummary {
        report: network.report,
        files,
    })
}

/// Output file name for a device, with path separators made safe
pub fn config_file_name(device: &str) -> String {
    let safe: String = device
        .chars()
        .map(|c| if c == '/' || c == '\\' { '_' } else { c })
        .collect();
    format!("{}_config.txt", safe)
}
