//! Shared domain types for the zkguard verifiable-inference pipeline.
//!
//! These types are what observers see: step snapshots, log entries and the
//! three stage results. They carry no behaviour beyond formatting helpers so
//! that display layers can depend on them without pulling in the runtime.

use std::fmt;
use std::str::FromStr;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// Number of stages in every pipeline run.
pub const STEP_COUNT: usize = 5;

/// Reported size of a mock proof.
pub const MOCK_PROOF_SIZE_BYTES: usize = 4096;

/// Static title/description of one pipeline stage.
#[derive(Debug, Clone, Copy)]
pub struct StepDefinition {
    pub title: &'static str,
    pub description: &'static str,
}

/// The five fixed stages, in execution order.
pub const STEP_DEFINITIONS: [StepDefinition; STEP_COUNT] = [
    StepDefinition {
        title: "Data Ingestion",
        description: "Formatting user inputs -> Tensor",
    },
    StepDefinition {
        title: "Model Inference",
        description: "Running forward pass",
    },
    StepDefinition {
        title: "Witness Generation",
        description: "EZKL trace generation",
    },
    StepDefinition {
        title: "Proof Generation",
        description: "Halo2 Prover (KZG Commitment)",
    },
    StepDefinition {
        title: "On-chain Verification",
        description: "EVM Call: verifyPrediction()",
    },
];

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum StepStatus {
    #[default]
    Pending,
    Processing,
    Completed,
    Error,
}

impl StepStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Pending => "pending",
            Self::Processing => "processing",
            Self::Completed => "completed",
            Self::Error => "error",
        }
    }
}

impl fmt::Display for StepStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for StepStatus {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "pending" => Ok(Self::Pending),
            "processing" => Ok(Self::Processing),
            "completed" => Ok(Self::Completed),
            "error" => Ok(Self::Error),
            _ => Err(format!("Invalid step status: {}", s)),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Step {
    /// 1-based stage id.
    pub id: u8,
    pub title: String,
    pub description: String,
    pub status: StepStatus,
}

impl Step {
    /// All five stages in their initial `pending` state.
    pub fn initial() -> Vec<Step> {
        STEP_DEFINITIONS
            .iter()
            .enumerate()
            .map(|(i, def)| Step {
                id: (i + 1) as u8,
                title: def.title.to_string(),
                description: def.description.to_string(),
                status: StepStatus::Pending,
            })
            .collect()
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct LogEntry {
    pub timestamp: DateTime<Utc>,
    pub message: String,
}

impl LogEntry {
    pub fn new(message: impl Into<String>) -> Self {
        Self {
            timestamp: Utc::now(),
            message: message.into(),
        }
    }

    /// `[HH:MM:SS] message`, the way the dashboard terminal shows it.
    pub fn display_line(&self) -> String {
        format!("[{}] {}", self.timestamp.format("%H:%M:%S"), self.message)
    }

    pub fn is_warning(&self) -> bool {
        self.message.starts_with("[WARNING]") || self.message.starts_with("[ERROR]")
    }
}

/// Whether a value was genuinely computed or substituted by a fallback.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Provenance {
    Real,
    Mock,
}

impl Provenance {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Real => "real",
            Self::Mock => "mock",
        }
    }

    pub fn is_mock(&self) -> bool {
        matches!(self, Self::Mock)
    }
}

impl fmt::Display for Provenance {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// The three raw input fields as typed by the user.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RawInputs {
    pub btc_vol: String,
    pub eth_gas: String,
    pub volume: String,
}

impl RawInputs {
    pub fn new(
        btc_vol: impl Into<String>,
        eth_gas: impl Into<String>,
        volume: impl Into<String>,
    ) -> Self {
        Self {
            btc_vol: btc_vol.into(),
            eth_gas: eth_gas.into(),
            volume: volume.into(),
        }
    }
}

impl Default for RawInputs {
    fn default() -> Self {
        Self::new("0.45", "24", "1.2")
    }
}

/// Normalized model inputs: BTC volatility, ETH gas, market volume.
#[derive(Debug, Clone, Copy, PartialEq, Default, Serialize, Deserialize)]
pub struct Inputs(pub [f64; 3]);

impl Inputs {
    pub fn as_array(&self) -> [f64; 3] {
        self.0
    }

    pub fn to_vec(&self) -> Vec<f64> {
        self.0.to_vec()
    }
}

impl fmt::Display for Inputs {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "[{}, {}, {}]", self.0[0], self.0[1], self.0[2])
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PredictionResult {
    pub prediction: f64,
    pub inputs: Inputs,
    pub provenance: Provenance,
}

impl PredictionResult {
    /// Price formatted with two decimals, e.g. `2693.00`.
    pub fn formatted(&self) -> String {
        format!("{:.2}", self.prediction)
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ProofArtifact {
    /// Always `0x` followed by lowercase hex digits once stored by the pipeline.
    pub proof_hex: String,
    pub size_bytes: usize,
    pub provenance: Provenance,
}

impl ProofArtifact {
    /// Short form for display: long proofs are cut after 66 characters.
    pub fn display(&self) -> String {
        if self.proof_hex.len() > 66 {
            format!("{}... ({} bytes)", &self.proof_hex[..66], self.size_bytes)
        } else {
            format!("{} ({} bytes)", self.proof_hex, self.size_bytes)
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct VerificationResult {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub tx_hash: Option<String>,
    pub success: bool,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
    pub provenance: Provenance,
}

impl VerificationResult {
    pub fn confirmed(tx_hash: impl Into<String>) -> Self {
        Self {
            tx_hash: Some(tx_hash.into()),
            success: true,
            error: None,
            provenance: Provenance::Real,
        }
    }

    pub fn mocked(tx_hash: impl Into<String>, reason: impl Into<String>) -> Self {
        Self {
            tx_hash: Some(tx_hash.into()),
            success: false,
            error: Some(reason.into()),
            provenance: Provenance::Mock,
        }
    }
}

/// Immutable snapshot of one finished pipeline run.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RunReport {
    pub run_id: Uuid,
    pub started_at: DateTime<Utc>,
    pub finished_at: DateTime<Utc>,
    pub inputs: Inputs,
    pub steps: Vec<Step>,
    pub logs: Vec<LogEntry>,
    pub prediction: Option<PredictionResult>,
    pub proof: Option<ProofArtifact>,
    pub verification: Option<VerificationResult>,
}

impl RunReport {
    pub fn all_completed(&self) -> bool {
        self.steps.iter().all(|s| s.status == StepStatus::Completed)
    }

    pub fn duration(&self) -> chrono::Duration {
        self.finished_at - self.started_at
    }
}
