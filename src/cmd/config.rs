//! Configuration view and validation commands: `zkguard config`.

use anyhow::Result;

use super::super::ConfigCommands;

pub fn cmd_config(project_dir: &std::path::Path, command: Option<ConfigCommands>) -> Result<()> {
    use zkguard::config::{CliOverrides, ZkGuardConfig, ZkGuardToml};

    let zkguard_dir = project_dir.join(".zkguard");
    let config_path = zkguard_dir.join("zkguard.toml");

    match command {
        None | Some(ConfigCommands::Show) => {
            println!();
            println!("zkguard Configuration");
            println!("=====================");
            println!();

            if config_path.exists() {
                println!("Config file: {}", config_path.display());
            } else {
                println!("No zkguard.toml found at {}", config_path.display());
                println!("Using defaults. Run 'zkguard config init' to create one.");
            }
            println!();

            let config = ZkGuardConfig::load(project_dir, &CliOverrides::default())?;

            println!("[pipeline]");
            println!("  pacing_ms = {}", config.pacing.as_millis());
            println!();

            println!("[inference]");
            match &config.inference_endpoint {
                Some(endpoint) => println!("  endpoint = \"{}\"", endpoint),
                None => println!("  endpoint = (none, fallback prediction)"),
            }
            println!();

            println!("[proof]");
            println!("  artifacts_dir = \"{}\"", config.artifacts_dir.display());
            println!("  api_url = \"{}\"", config.zk_api_url);
            println!();

            println!("[chain]");
            println!("  network = \"{}\"", config.network);
            match &config.rpc_url {
                Some(url) => println!("  rpc_url = \"{}\"", url),
                None => println!("  rpc_url = (none, mock transactions)"),
            }
            if let Some(chain_id) = config.chain_id {
                println!("  chain_id = {}", chain_id);
            }
            println!("  manifest = \"{}\"", config.manifest_path.display());
            println!("  receipt_poll_ms = {}", config.receipt_poll.as_millis());
            println!();
        }
        Some(ConfigCommands::Validate) => {
            println!();
            println!("Validating configuration...");
            println!();

            let config = ZkGuardConfig::load(project_dir, &CliOverrides::default())?;
            let warnings = config.validate();

            if warnings.is_empty() {
                println!("Configuration is valid.");
            } else {
                println!("Configuration warnings:");
                for warning in warnings {
                    println!("  - {}", warning);
                }
            }
            println!();
        }
        Some(ConfigCommands::Init) => {
            if config_path.exists() {
                println!("zkguard.toml already exists at {}", config_path.display());
                println!("Delete it first if you want to recreate it.");
                return Ok(());
            }

            if !zkguard_dir.exists() {
                std::fs::create_dir_all(&zkguard_dir)?;
            }

            let toml = ZkGuardToml::default();
            toml.save(&config_path)?;

            println!("Created zkguard.toml at {}", config_path.display());
            println!();
            println!("You can now customize:");
            println!("  - [inference] endpoint of the model server");
            println!("  - [proof] artifacts_dir, api_url");
            println!("  - [chain] network, rpc_url, chain_id, manifest");
            println!();
        }
    }

    Ok(())
}
