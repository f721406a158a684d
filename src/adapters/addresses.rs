//! Deployed contract addresses.
//!
//! The manifest is the JSON file the deployment tooling writes after
//! deploying the verifier and price-guard contracts:
//!
//! ```json
//! {
//!   "monadTestnet": {
//!     "verifier": "0x...",
//!     "monadPriceGuard": "0x...",
//!     "chainId": 10143
//!   },
//!   "verifier": "0x...",
//!   "monadPriceGuard": "0x...",
//!   "network": "monadTestnet",
//!   "chainId": 10143
//! }
//! ```
//!
//! The root-level keys are the older flat form, still written for the
//! default network.

use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

use super::ContractAddressProvider;
use crate::config::{DEFAULT_NETWORK, ZkGuardConfig};
use crate::errors::ManifestError;

const KEY_VERIFIER: &str = "verifier";
const KEY_PRICE_GUARD: &str = "monadPriceGuard";
const KEY_NETWORK: &str = "network";
const KEY_CHAIN_ID: &str = "chainId";

/// Addresses the pipeline needs. A missing price guard forces mock verification.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ContractAddresses {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub verifier: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub price_guard: Option<String>,
}

impl ContractAddresses {
    pub fn is_empty(&self) -> bool {
        self.verifier.is_none() && self.price_guard.is_none()
    }
}

/// One per-network entry of the manifest.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct NetworkEntry {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub verifier: Option<String>,
    #[serde(
        rename = "monadPriceGuard",
        default,
        skip_serializing_if = "Option::is_none"
    )]
    pub price_guard: Option<String>,
    #[serde(rename = "chainId", default, skip_serializing_if = "Option::is_none")]
    pub chain_id: Option<u64>,
}

impl NetworkEntry {
    fn addresses(&self) -> ContractAddresses {
        ContractAddresses {
            verifier: non_empty(self.verifier.as_deref()),
            price_guard: non_empty(self.price_guard.as_deref()),
        }
    }
}

fn non_empty(s: Option<&str>) -> Option<String> {
    s.map(str::trim).filter(|s| !s.is_empty()).map(str::to_string)
}

/// The manifest document. Unknown keys are kept so a rewrite never drops
/// anything the deployment tooling added.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct DeploymentManifest {
    root: Map<String, Value>,
}

impl DeploymentManifest {
    pub fn load(path: &Path) -> Result<Self, ManifestError> {
        let content = std::fs::read_to_string(path).map_err(|source| ManifestError::Read {
            path: path.to_path_buf(),
            source,
        })?;
        Self::parse(&content, path)
    }

    /// Load the manifest, or an empty one if the file does not exist.
    pub fn load_or_default(path: &Path) -> Result<Self, ManifestError> {
        if path.exists() {
            Self::load(path)
        } else {
            Ok(Self::default())
        }
    }

    fn parse(content: &str, path: &Path) -> Result<Self, ManifestError> {
        let root: Map<String, Value> =
            serde_json::from_str(content).map_err(|source| ManifestError::Parse {
                path: path.to_path_buf(),
                source,
            })?;
        Ok(Self { root })
    }

    /// Per-network entry, if present and well-formed.
    pub fn entry(&self, network: &str) -> Option<NetworkEntry> {
        let value = self.root.get(network)?;
        if !value.is_object() {
            return None;
        }
        serde_json::from_value(value.clone()).ok()
    }

    /// All nested per-network entries, in file order.
    pub fn networks(&self) -> Vec<(String, NetworkEntry)> {
        self.root
            .iter()
            .filter(|(_, v)| v.is_object())
            .filter_map(|(k, v)| {
                serde_json::from_value::<NetworkEntry>(v.clone())
                    .ok()
                    .map(|e| (k.clone(), e))
            })
            .collect()
    }

    /// Root-level addresses of the older flat form.
    pub fn flat_addresses(&self) -> ContractAddresses {
        ContractAddresses {
            verifier: non_empty(self.root.get(KEY_VERIFIER).and_then(Value::as_str)),
            price_guard: non_empty(self.root.get(KEY_PRICE_GUARD).and_then(Value::as_str)),
        }
    }

    /// Addresses for `network`: its nested entry first, then the flat keys.
    pub fn resolve(&self, network: &str) -> ContractAddresses {
        if let Some(entry) = self.entry(network) {
            return entry.addresses();
        }
        self.flat_addresses()
    }

    /// Flat-only document written by older tooling: has `network`, no nested entries.
    fn is_flat_only(&self) -> bool {
        self.root.contains_key(KEY_NETWORK) && !self.root.values().any(Value::is_object)
    }

    /// Record a deployment, merging the way the deployment tooling does.
    ///
    /// A flat-only document is first converted into a nested entry under its
    /// `network`. The new entry replaces any previous one for `network`. For
    /// the default network the flat keys are rewritten too.
    pub fn record(&mut self, network: &str, verifier: &str, price_guard: &str, chain_id: u64) {
        if self.is_flat_only() {
            let old_network = self
                .root
                .get(KEY_NETWORK)
                .and_then(Value::as_str)
                .map(str::to_string);
            let converted = NetworkEntry {
                verifier: self
                    .root
                    .get(KEY_VERIFIER)
                    .and_then(Value::as_str)
                    .map(str::to_string),
                price_guard: self
                    .root
                    .get(KEY_PRICE_GUARD)
                    .and_then(Value::as_str)
                    .map(str::to_string),
                chain_id: self.root.get(KEY_CHAIN_ID).and_then(Value::as_u64),
            };
            self.root = Map::new();
            if let Some(old_network) = old_network {
                self.insert_entry(&old_network, &converted);
            }
        }

        let entry = NetworkEntry {
            verifier: Some(verifier.to_string()),
            price_guard: Some(price_guard.to_string()),
            chain_id: Some(chain_id),
        };
        self.insert_entry(network, &entry);

        if network == DEFAULT_NETWORK {
            self.root
                .insert(KEY_VERIFIER.to_string(), Value::from(verifier));
            self.root
                .insert(KEY_PRICE_GUARD.to_string(), Value::from(price_guard));
            self.root.insert(KEY_NETWORK.to_string(), Value::from(network));
            self.root.insert(KEY_CHAIN_ID.to_string(), Value::from(chain_id));
        }
    }

    fn insert_entry(&mut self, network: &str, entry: &NetworkEntry) {
        // NetworkEntry is plain strings and integers; serialization cannot fail.
        if let Ok(value) = serde_json::to_value(entry) {
            self.root.insert(network.to_string(), value);
        }
    }

    /// Write the manifest pretty-printed with 2-space indentation.
    pub fn save(&self, path: &Path) -> Result<(), ManifestError> {
        let content = serde_json::to_string_pretty(&self.root).map_err(|source| {
            ManifestError::Serialize {
                path: path.to_path_buf(),
                source,
            }
        })?;
        if let Some(parent) = path.parent()
            && !parent.as_os_str().is_empty()
        {
            std::fs::create_dir_all(parent).map_err(|source| ManifestError::Write {
                path: path.to_path_buf(),
                source,
            })?;
        }
        std::fs::write(path, content).map_err(|source| ManifestError::Write {
            path: path.to_path_buf(),
            source,
        })
    }
}

/// Resolves addresses from environment overrides, then the manifest.
///
/// The manifest is re-read on every call so a deployment made while the
/// process is running is picked up by the next run.
#[derive(Debug, Clone)]
pub struct ManifestAddressProvider {
    manifest_path: PathBuf,
    network: String,
    env_verifier: Option<String>,
    env_price_guard: Option<String>,
}

impl ManifestAddressProvider {
    pub fn new(manifest_path: impl Into<PathBuf>, network: impl Into<String>) -> Self {
        Self {
            manifest_path: manifest_path.into(),
            network: network.into(),
            env_verifier: None,
            env_price_guard: None,
        }
    }

    pub fn with_overrides(mut self, verifier: Option<String>, price_guard: Option<String>) -> Self {
        self.env_verifier = verifier;
        self.env_price_guard = price_guard;
        self
    }

    pub fn from_config(config: &ZkGuardConfig) -> Self {
        Self::new(&config.manifest_path, &config.network).with_overrides(
            config.verifier_override.clone(),
            config.price_guard_override.clone(),
        )
    }
}

impl ContractAddressProvider for ManifestAddressProvider {
    fn addresses(&self) -> ContractAddresses {
        if self.env_verifier.is_some() || self.env_price_guard.is_some() {
            tracing::debug!("Using contract addresses from environment");
            return ContractAddresses {
                verifier: non_empty(self.env_verifier.as_deref()),
                price_guard: non_empty(self.env_price_guard.as_deref()),
            };
        }

        if !self.manifest_path.exists() {
            tracing::warn!(
                manifest = %self.manifest_path.display(),
                "No contract address manifest found, on-chain verification will be mocked"
            );
            return ContractAddresses::default();
        }

        match DeploymentManifest::load(&self.manifest_path) {
            Ok(manifest) => {
                let addresses = manifest.resolve(&self.network);
                if addresses.is_empty() {
                    tracing::warn!(
                        network = %self.network,
                        "No contract addresses found for network, on-chain verification will be mocked"
                    );
                }
                addresses
            }
            Err(e) => {
                tracing::warn!(error = %e, "Could not load contract address manifest");
                ContractAddresses::default()
            }
        }
    }
}
