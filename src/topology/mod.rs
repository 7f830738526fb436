//! Network topology module.
//!
//! This module contains the topology selection types and the builder that
//! turns a selection into tunnels between sites.

pub mod builder;
pub mod types;

// Re-export key types for easier access
pub use builder::{BuildReport, TopologyBuilder};
pub use types::Topology;
