//! Contract address commands: `zkguard addresses`.

use anyhow::{Context, Result};
use std::path::Path;

use super::super::AddressesCommands;

pub fn cmd_addresses(project_dir: &Path, command: Option<AddressesCommands>) -> Result<()> {
    use zkguard::adapters::{ContractAddressProvider, DeploymentManifest, ManifestAddressProvider};
    use zkguard::config::{CliOverrides, ZkGuardConfig, known_network};

    match command {
        None => {
            let config = ZkGuardConfig::load(project_dir, &CliOverrides::default())?;
            show(&config, ManifestAddressProvider::from_config(&config).addresses());
        }
        Some(AddressesCommands::Show { network }) => {
            let overrides = CliOverrides {
                network,
                ..Default::default()
            };
            let config = ZkGuardConfig::load(project_dir, &overrides)?;
            show(&config, ManifestAddressProvider::from_config(&config).addresses());
        }
        Some(AddressesCommands::Record {
            network,
            verifier,
            price_guard,
            chain_id,
        }) => {
            let overrides = CliOverrides {
                network,
                ..Default::default()
            };
            let config = ZkGuardConfig::load(project_dir, &overrides)?;

            for (label, address) in [("verifier", &verifier), ("price guard", &price_guard)] {
                if !is_address(address) {
                    anyhow::bail!(
                        "Invalid {} address '{}': expected 0x followed by 40 hex digits",
                        label,
                        address
                    );
                }
            }

            let known_id = known_network(&config.network).map(|n| n.chain_id);
            let chain_id = match chain_id.or(known_id) {
                Some(id) => id,
                None => anyhow::bail!(
                    "Unknown network '{}': pass --chain-id to record it",
                    config.network
                ),
            };

            let mut manifest = DeploymentManifest::load_or_default(&config.manifest_path)
                .context("Failed to load deployment manifest")?;
            manifest.record(&config.network, &verifier, &price_guard, chain_id);
            manifest
                .save(&config.manifest_path)
                .context("Failed to save deployment manifest")?;

            println!(
                "Recorded {} (chain {}) in {}",
                config.network,
                chain_id,
                config.manifest_path.display()
            );
        }
    }

    Ok(())
}

fn show(config: &zkguard::config::ZkGuardConfig, addresses: zkguard::adapters::ContractAddresses) {
    println!();
    println!("Network:    {}", config.network);
    println!("Manifest:   {}", config.manifest_path.display());
    if config.verifier_override.is_some() || config.price_guard_override.is_some() {
        println!("Source:     environment");
    }
    println!(
        "Verifier:   {}",
        addresses.verifier.as_deref().unwrap_or("(not deployed)")
    );
    println!(
        "PriceGuard: {}",
        addresses.price_guard.as_deref().unwrap_or("(not deployed)")
    );
    if addresses.price_guard.is_none() {
        println!();
        println!("On-chain verification will use mock transactions.");
    }

    match zkguard::adapters::DeploymentManifest::load(&config.manifest_path) {
        Ok(manifest) => {
            let networks = manifest.networks();
            if !networks.is_empty() {
                println!();
                println!("Recorded networks:");
                for (name, entry) in networks {
                    let chain = entry
                        .chain_id
                        .map(|id| format!("chain {}", id))
                        .unwrap_or_else(|| "chain ?".to_string());
                    println!("  {} ({})", name, chain);
                }
            }
        }
        Err(e) if config.manifest_path.exists() => {
            tracing::debug!(error = %e, "Manifest unreadable, skipping network list");
        }
        Err(_) => {}
    }
    println!();
}

fn is_address(s: &str) -> bool {
    s.strip_prefix("0x")
        .is_some_and(|hex| hex.len() == 40 && hex.chars().all(|c| c.is_ascii_hexdigit()))
}
