//! # Meshgen - VPN topology builder and router configuration generator
//!
//! This library derives a site-to-site VPN topology from a list of sites and
//! renders the router configuration each site needs: IPSec tunnel
//! interfaces, IKEv2 policy, BFD, BGP peering with primary/backup path
//! selection, and WAN failover tracking.
//!
//! ## Overview
//!
//! Each site has one or more WAN uplinks (the first one is primary), a set
//! of local networks and a BGP AS number. For every pair of sites the
//! selected topology connects, one IPSec tunnel is created per combination
//! of the two sites' uplinks. Tunnel addresses come from a shared pool of
//! point-to-point subnets, so every tunnel gets a unique address pair.
//!
//! ## Key Features
//!
//! - **Topologies**: full mesh, hub-spoke, or a single peer-to-peer pair
//! - **Deterministic output**: the same inventory always yields the same tunnels,
//!   numbering, addresses and text
//! - **Primary/backup paths**: tunnels between two primary uplinks use the
//!   primary community and single-hop BFD; all others are tagged backup and
//!   AS-path prepended
//! - **Upstream router**: optional configuration for a synthetic internet
//!   router that owns every WAN gateway
//!
//! ## Architecture
//!
//! - `ip`: address parsing and the tunnel address pool
//! - `site`: site, WAN endpoint and tunnel records
//! - `topology`: topology selection and the tunnel builder
//! - `render`: per-site and upstream router configuration text
//! - `config`: generation constants (communities, timers, pool block)
//! - `inventory` / `config_loader`: the YAML site inventory and its validation
//! - `orchestrator`: the end-to-end pipeline writing files to disk
//!
//! ## Example Usage
//!
//! ```rust,no_run
//! use meshgen::{config_loader, orchestrator};
//! use meshgen::orchestrator::GenerationRequest;
//! use meshgen::topology::Topology;
//! use std::path::Path;
//!
//! let inventory = config_loader::load_inventory(Path::new("sites.yaml"))?;
//! let request = GenerationRequest {
//!     topology: Topology::hub_spoke(&["HQ"]),
//!     include_internet_router: true,
//!     write_plan: false,
//! };
//! orchestrator::generate(&inventory, &request, Path::new("configs"))?;
//! # Ok::<(), color_eyre::eyre::Error>(())
//! ```
//!
//! ## Error Handling
//!
//! Topology construction and address handling return [`error::MeshError`].
//! File loading and the orchestrator use `color_eyre` for error reporting
//! with context.

pub mod config;
pub mod config_loader;
pub mod error;
pub mod inventory;
pub mod ip;
pub mod orchestrator;
pub mod render;
pub mod site;
pub mod topology;

pub use error::MeshError;
