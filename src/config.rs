//! Layered configuration for zkguard.
//!
//! Settings are read from `.zkguard/zkguard.toml`, then overridden by
//! environment variables (a `.env` file is loaded by the binary), then by CLI
//! flags.
//!
//! # Configuration File Format
//!
//! ```toml
//! [pipeline]
//! pacing_ms = 400
//!
//! [inference]
//! endpoint = "http://127.0.0.1:8001"
//!
//! [proof]
//! artifacts_dir = "public"
//! api_url = "http://localhost:8000"
//!
//! [chain]
//! network = "monadTestnet"
//! rpc_url = "https://testnet-rpc.monad.xyz"
//! chain_id = 10143
//! manifest = "contract-addresses.json"
//! receipt_poll_ms = 1000
//! ```

use std::path::{Path, PathBuf};
use std::time::Duration;

use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};

use crate::errors::ConfigError;

pub const ENV_INFERENCE_URL: &str = "ZKGUARD_INFERENCE_URL";
pub const ENV_ZK_API_URL: &str = "ZKGUARD_ZK_API_URL";
pub const ENV_RPC_URL: &str = "ZKGUARD_RPC_URL";
pub const ENV_NETWORK: &str = "ZKGUARD_NETWORK";
pub const ENV_PACING_MS: &str = "ZKGUARD_PACING_MS";
pub const ENV_VERIFIER_ADDRESS: &str = "ZKGUARD_VERIFIER_ADDRESS";
pub const ENV_PRICE_GUARD_ADDRESS: &str = "ZKGUARD_PRICE_GUARD_ADDRESS";

/// The network the deployment tooling treats as its default.
pub const DEFAULT_NETWORK: &str = "monadTestnet";

/// Chain id and public RPC endpoint of a network the deployment tooling knows.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct KnownNetwork {
    pub name: &'static str,
    pub chain_id: u64,
    pub rpc_url: &'static str,
}

pub const KNOWN_NETWORKS: [KnownNetwork; 3] = [
    KnownNetwork {
        name: "monadTestnet",
        chain_id: 10143,
        rpc_url: "https://testnet-rpc.monad.xyz",
    },
    KnownNetwork {
        name: "sepolia",
        chain_id: 11155111,
        rpc_url: "https://rpc.sepolia.org",
    },
    KnownNetwork {
        name: "localhost",
        chain_id: 31337,
        rpc_url: "http://127.0.0.1:8545",
    },
];

pub fn known_network(name: &str) -> Option<&'static KnownNetwork> {
    KNOWN_NETWORKS.iter().find(|n| n.name == name)
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PipelineSection {
    /// Delay inserted between progress lines so observers can follow along.
    #[serde(default = "default_pacing_ms")]
    pub pacing_ms: u64,
}

fn default_pacing_ms() -> u64 {
    400
}

impl Default for PipelineSection {
    fn default() -> Self {
        Self {
            pacing_ms: default_pacing_ms(),
        }
    }
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct InferenceSection {
    /// Base URL of the model-serving backend. Unset means inference is unavailable.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub endpoint: Option<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ProofSection {
    /// Directory holding `settings.json`, `pk.key` and `vk.key`.
    #[serde(default = "default_artifacts_dir")]
    pub artifacts_dir: String,
    /// Base URL of the proof backend.
    #[serde(default = "default_zk_api_url")]
    pub api_url: String,
}

fn default_artifacts_dir() -> String {
    "public".to_string()
}

fn default_zk_api_url() -> String {
    "http://localhost:8000".to_string()
}

impl Default for ProofSection {
    fn default() -> Self {
        Self {
            artifacts_dir: default_artifacts_dir(),
            api_url: default_zk_api_url(),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ChainSection {
    #[serde(default = "default_network")]
    pub network: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub rpc_url: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub chain_id: Option<u64>,
    /// Deployed-address manifest written by the deployment tooling.
    #[serde(default = "default_manifest")]
    pub manifest: String,
    #[serde(default = "default_receipt_poll_ms")]
    pub receipt_poll_ms: u64,
}

fn default_network() -> String {
    DEFAULT_NETWORK.to_string()
}

fn default_manifest() -> String {
    "contract-addresses.json".to_string()
}

fn default_receipt_poll_ms() -> u64 {
    1000
}

impl Default for ChainSection {
    fn default() -> Self {
        Self {
            network: default_network(),
            rpc_url: None,
            chain_id: None,
            manifest: default_manifest(),
            receipt_poll_ms: default_receipt_poll_ms(),
        }
    }
}

/// The complete zkguard.toml structure.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct ZkGuardToml {
    #[serde(default)]
    pub pipeline: PipelineSection,
    #[serde(default)]
    pub inference: InferenceSection,
    #[serde(default)]
    pub proof: ProofSection,
    #[serde(default)]
    pub chain: ChainSection,
}

impl ZkGuardToml {
    pub fn load(path: &Path) -> Result<Self, ConfigError> {
        let content = std::fs::read_to_string(path).map_err(|source| ConfigError::Read {
            path: path.to_path_buf(),
            source,
        })?;
        toml::from_str(&content).map_err(|source| ConfigError::Parse {
            path: path.to_path_buf(),
            source,
        })
    }

    /// Load `zkguard.toml` from the given directory, or defaults if it does not exist.
    pub fn load_or_default(zkguard_dir: &Path) -> Result<Self, ConfigError> {
        let path = zkguard_dir.join("zkguard.toml");
        if path.exists() {
            Self::load(&path)
        } else {
            Ok(Self::default())
        }
    }

    pub fn save(&self, path: &Path) -> Result<()> {
        let content = toml::to_string_pretty(self).context("Failed to serialize zkguard.toml")?;
        std::fs::write(path, content)
            .with_context(|| format!("Failed to write config file: {}", path.display()))?;
        Ok(())
    }
}

/// Overrides supplied on the command line.
#[derive(Debug, Clone, Default)]
pub struct CliOverrides {
    pub pacing_ms: Option<u64>,
    pub network: Option<String>,
    pub inference_endpoint: Option<String>,
}

/// Resolved runtime configuration (file → environment → CLI).
#[derive(Debug, Clone)]
pub struct ZkGuardConfig {
    pub project_dir: PathBuf,
    pub zkguard_dir: PathBuf,
    pub toml: ZkGuardToml,
    pub pacing: Duration,
    pub inference_endpoint: Option<String>,
    pub zk_api_url: String,
    pub artifacts_dir: PathBuf,
    pub network: String,
    /// `None` when the network is unknown and no explicit RPC URL was given.
    pub rpc_url: Option<String>,
    pub chain_id: Option<u64>,
    pub manifest_path: PathBuf,
    pub receipt_poll: Duration,
    pub verifier_override: Option<String>,
    pub price_guard_override: Option<String>,
}

impl ZkGuardConfig {
    /// Resolve configuration for a project using the process environment.
    pub fn load(project_dir: &Path, cli: &CliOverrides) -> Result<Self> {
        Self::resolve(project_dir, cli, |key| std::env::var(key).ok())
    }

    /// Resolve configuration with an explicit environment lookup.
    pub fn resolve<F>(project_dir: &Path, cli: &CliOverrides, env: F) -> Result<Self>
    where
        F: Fn(&str) -> Option<String>,
    {
        let project_dir = project_dir
            .canonicalize()
            .context("Failed to resolve project directory")?;
        let zkguard_dir = project_dir.join(".zkguard");
        let toml = ZkGuardToml::load_or_default(&zkguard_dir)?;

        let env = |key: &str| env(key).filter(|v| !v.trim().is_empty());

        let pacing_ms = match cli.pacing_ms {
            Some(ms) => ms,
            None => match env(ENV_PACING_MS) {
                Some(raw) => raw.trim().parse().map_err(|_| ConfigError::InvalidValue {
                    key: ENV_PACING_MS.to_string(),
                    message: format!("'{}' is not a number of milliseconds", raw),
                })?,
                None => toml.pipeline.pacing_ms,
            },
        };

        let inference_endpoint = cli
            .inference_endpoint
            .clone()
            .or_else(|| env(ENV_INFERENCE_URL))
            .or_else(|| toml.inference.endpoint.clone());

        let zk_api_url = env(ENV_ZK_API_URL).unwrap_or_else(|| toml.proof.api_url.clone());

        let network = cli
            .network
            .clone()
            .or_else(|| env(ENV_NETWORK))
            .unwrap_or_else(|| toml.chain.network.clone());
        let known = known_network(&network);

        let rpc_url = env(ENV_RPC_URL)
            .or_else(|| toml.chain.rpc_url.clone())
            .or_else(|| known.map(|n| n.rpc_url.to_string()));
        let chain_id = toml.chain.chain_id.or_else(|| known.map(|n| n.chain_id));

        let artifacts_dir = project_dir.join(&toml.proof.artifacts_dir);
        let manifest_path = project_dir.join(&toml.chain.manifest);
        let receipt_poll = Duration::from_millis(toml.chain.receipt_poll_ms);

        Ok(Self {
            pacing: Duration::from_millis(pacing_ms),
            inference_endpoint,
            zk_api_url,
            artifacts_dir,
            network,
            rpc_url,
            chain_id,
            manifest_path,
            receipt_poll,
            verifier_override: env(ENV_VERIFIER_ADDRESS),
            price_guard_override: env(ENV_PRICE_GUARD_ADDRESS),
            project_dir,
            zkguard_dir,
            toml,
        })
    }

    pub fn config_file(&self) -> PathBuf {
        self.zkguard_dir.join("zkguard.toml")
    }

    pub fn runs_dir(&self) -> PathBuf {
        self.zkguard_dir.join("runs")
    }

    pub fn log_dir(&self) -> PathBuf {
        self.zkguard_dir.join("logs")
    }

    pub fn ensure_directories(&self) -> Result<()> {
        std::fs::create_dir_all(self.runs_dir()).context("Failed to create runs directory")?;
        std::fs::create_dir_all(self.log_dir()).context("Failed to create log directory")?;
        Ok(())
    }

    /// Validate the resolved configuration and return any warnings.
    pub fn validate(&self) -> Vec<String> {
        let mut warnings = Vec::new();

        if known_network(&self.network).is_none() {
            if self.rpc_url.is_none() {
                warnings.push(format!(
                    "Unknown network '{}' and no rpc_url configured: on-chain verification will use mock transactions",
                    self.network
                ));
            }
            if self.chain_id.is_none() {
                warnings.push(format!(
                    "Unknown network '{}' and no chain_id configured",
                    self.network
                ));
            }
        }

        if self.toml.chain.receipt_poll_ms == 0 {
            warnings.push("chain.receipt_poll_ms is 0: receipts will be polled in a tight loop".to_string());
        }

        if let Some(ref endpoint) = self.inference_endpoint
            && !is_http_url(endpoint)
        {
            warnings.push(format!(
                "Inference endpoint '{}' is not an http(s) URL",
                endpoint
            ));
        }

        if !is_http_url(&self.zk_api_url) {
            warnings.push(format!(
                "Proof API URL '{}' is not an http(s) URL",
                self.zk_api_url
            ));
        }

        warnings
    }
}

fn is_http_url(url: &str) -> bool {
    url.starts_with("http://") || url.starts_with("https://")
}
