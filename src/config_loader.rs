use crate::inventory::Inventory;
use color_eyre::eyre::WrapErr;
use color_eyre::Result;
use log::info;
use std::fs::File;
use std::path::Path;

/// Load and validate a site inventory from a YAML file
pub fn load_inventory(inventory_path: &Path) -> Result<Inventory> {
    info!("Loading inventory from: {:?}", inventory_path);

    let file = File::open(inventory_path)
        .wrap_err_with(|| format!("Failed to open inventory '{}'", inventory_path.display()))?;

    let inventory: Inventory = serde_yaml::from_reader(file)
        .wrap_err_with(|| format!("Failed to parse inventory '{}'", inventory_path.display()))?;

    inventory.validate()?;

    info!(
        "Loaded {} sites ({} WAN endpoints)",
        inventory.sites.len(),
        inventory.sites.iter().map(|site| site.wan.len()).sum::<usize>()
    );

    Ok(inventory)
}

/// Overrides given on the command line, applied on top of the inventory settings
#[derive(Debug, Clone, Default)]
pub struct SettingsOverrides {
    pub tunnel_network: Option<ipnet::Ipv4Net>,
    pub pre_shared_key: Option<String>,
}

/// Apply command-line overrides to a loaded inventory.
///
/// The inventory is left untouched when the result does not validate.
pub fn apply_overrides(inventory: &mut Inventory, overrides: &SettingsOverrides) -> Result<()> {
    let mut updated = inventory.clone();

    if let Some(network) = overrides.tunnel_network {
        info!("Tunnel network overridden: {}", network);
        updated.settings.tunnel_network = network;
    }

    if let Some(key) = &overrides.pre_shared_key {
        info!("Default pre-shared key overridden");
        updated.settings.default_pre_shared_key = key.clone();
    }

    updated
        .validate()
        .wrap_err("Settings overrides produce an invalid inventory")?;

    *inventory = updated;
    Ok(())
}
