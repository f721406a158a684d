//! External-service adapters consumed by the orchestrator.
//!
//! Each seam is an `#[async_trait]` trait so the orchestrator can be driven
//! by real clients in the binary and by scripted doubles in tests.

pub mod addresses;
pub mod chain;
pub mod inference;
pub mod proof;

use async_trait::async_trait;
use zkguard_common::{Inputs, ProofArtifact};

use crate::errors::AdapterError;
use crate::pipeline::StageOutcome;

pub use addresses::{ContractAddresses, DeploymentManifest, ManifestAddressProvider, NetworkEntry};
pub use chain::{JsonRpcChainAdapter, UnavailableChain};
pub use inference::{HttpInferenceAdapter, UnavailableInference};
pub use proof::{EzklProofAdapter, MockProofAdapter};

/// Model-inference runtime.
/// Real implementation: `HttpInferenceAdapter`. No backend: `UnavailableInference`.
#[async_trait]
pub trait InferenceAdapter: Send + Sync {
    /// Run the price model on one `[1, 3]` input tensor.
    async fn run(&self, inputs: &Inputs) -> Result<f64, AdapterError>;

    /// Load the model ahead of the first run.
    async fn warm_up(&self) -> Result<(), AdapterError> {
        Ok(())
    }
}

/// Proof backend. Never fails outward: an unusable real path is reported as
/// `StageOutcome::Fallback` carrying a mock artifact.
#[async_trait]
pub trait ProofAdapter: Send + Sync {
    async fn generate(&self, inputs: &Inputs, prediction: f64) -> StageOutcome<ProofArtifact>;
}

/// Chain client / wallet that submits `verifyPrediction` and returns the tx hash.
/// May suspend indefinitely while an external actor approves the call.
#[async_trait]
pub trait ChainAdapter: Send + Sync {
    async fn verify(
        &self,
        contract: &str,
        instances: &[f64],
        proof_hex: &str,
    ) -> Result<String, AdapterError>;
}

/// Source of deployed contract addresses.
pub trait ContractAddressProvider: Send + Sync {
    fn addresses(&self) -> ContractAddresses;
}

impl ContractAddressProvider for ContractAddresses {
    fn addresses(&self) -> ContractAddresses {
        self.clone()
    }
}
