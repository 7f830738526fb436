use clap::{Parser, ValueEnum};
use color_eyre::eyre::eyre;
use color_eyre::Result;
use env_logger::Env;
use ipnet::Ipv4Net;
use log::info;
use std::path::PathBuf;

use meshgen::config_loader::{self, SettingsOverrides};
use meshgen::orchestrator::{self, GenerationRequest};
use meshgen::topology::Topology;

/// Topology selected on the command line
#[derive(Debug, Clone, Copy, PartialEq, Eq, ValueEnum)]
enum TopologyKind {
    /// Every site connects to every other site
    FullMesh,
    /// Hubs connect to everything, spokes only to hubs
    HubSpoke,
    /// Exactly two sites connect to each other
    Peer,
}

/// VPN mesh / hub-spoke topology builder and router configuration generator
#[derive(Parser, Debug)]
#[command(author, version, about, long_about = None)]
struct Args {
    /// Path to the site inventory YAML file
    #[arg(short, long)]
    inventory: PathBuf,

    /// Output directory for the rendered configuration files
    #[arg(short, long, default_value = "configs")]
    output: PathBuf,

    /// Topology to build
    #[arg(short, long, value_enum, default_value_t = TopologyKind::FullMesh)]
    topology: TopologyKind,

    /// Hub site for hub-spoke topology (repeatable)
    #[arg(long = "hub")]
    hubs: Vec<String>,

    /// Site for peer-to-peer topology (give exactly two)
    #[arg(long = "peer")]
    peers: Vec<String>,

    /// Also generate the upstream internet router configuration
    #[arg(long)]
    internet_router: bool,

    /// Also write a JSON plan of every tunnel
    #[arg(long)]
    plan: bool,

    /// Override the block tunnel subnets are carved from
    #[arg(long)]
    tunnel_network: Option<Ipv4Net>,

    /// Override the default pre-shared key
    #[arg(long)]
    pre_shared_key: Option<String>,
}

impl Args {
    fn topology(&self) -> Result<Topology> {
        match self.topology {
            TopologyKind::FullMesh => Ok(Topology::FullMesh),
            TopologyKind::HubSpoke => {
                if self.hubs.is_empty() {
                    return Err(eyre!("--topology hub-spoke needs at least one --hub"));
                }
                Ok(Topology::hub_spoke(&self.hubs))
            }
            TopologyKind::Peer => {
                if self.peers.len() != 2 {
                    return Err(eyre!("--topology peer needs exactly two --peer sites, got {}", self.peers.len()));
                }
                Ok(Topology::peer_to_peer(&self.peers))
            }
        }
    }
}

fn main() -> Result<()> {
    // Initialize error handling
    color_eyre::install()?;

    let args = Args::parse();

    // Initialize logging with default filter level of "info"
    env_logger::Builder::from_env(Env::default().default_filter_or("info")).init();

    info!("Inventory file: {:?}", args.inventory);
    info!("Output directory: {:?}", args.output);

    let topology = args.topology()?;

    let mut inventory = config_loader::load_inventory(&args.inventory)?;
    config_loader::apply_overrides(
        &mut inventory,
        &SettingsOverrides {
            tunnel_network: args.tunnel_network,
            pre_shared_key: args.pre_shared_key.clone(),
        },
    )?;

    let request = GenerationRequest {
        topology,
        include_internet_router: args.internet_router,
        write_plan: args.plan,
    };
    let summary = orchestrator::generate(&inventory, &request, &args.output)?;

    info!(
        "Generated {} files for {} sites ({} tunnels, {} tunnel subnets)",
        summary.files.len(),
        summary.report.participants.len(),
        summary.report.tunnels,
        summary.report.subnets_allocated
    );
    Ok(())
}
