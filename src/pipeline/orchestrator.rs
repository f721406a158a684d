//! Drives one pipeline run through its five stages.
//!
//! Exactly one run may be in flight per orchestrator. A second `run()` while
//! the latch is held returns `RunOutcome::Rejected` without touching any
//! state. Once a run starts it always reaches stage 5: inference, proof and
//! verification each pick a real or a fallback result, and the log stream
//! records which.

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};
use std::time::{Duration, Instant};

use chrono::{DateTime, Utc};
use tokio::sync::broadcast;
use uuid::Uuid;
use zkguard_common::{
    Inputs, LogEntry, PredictionResult, ProofArtifact, Provenance, RawInputs, RunReport, Step,
    StepStatus, VerificationResult,
};

use super::events::{EventPublisher, PipelineEvent};
use super::fallback::{fallback_prediction, fallback_proof, linear_prediction, mock_tx_hash};
use super::log_sink::LogSink;
use super::normalize::{is_strict_proof_hex, normalize_inputs, normalize_proof_text};
use super::outcome::StageOutcome;
use super::steps::StepStateMachine;
use crate::adapters::{
    ChainAdapter, ContractAddressProvider, ContractAddresses, EzklProofAdapter,
    HttpInferenceAdapter, InferenceAdapter, JsonRpcChainAdapter, ManifestAddressProvider,
    MockProofAdapter, ProofAdapter, UnavailableChain, UnavailableInference,
};
use crate::config::ZkGuardConfig;
use crate::errors::OrchestratorError;

const INGESTION: usize = 0;
const INFERENCE: usize = 1;
const WITNESS: usize = 2;
const PROOF: usize = 3;
const VERIFICATION: usize = 4;

/// Result of a `run()` call.
#[derive(Debug, Clone)]
pub enum RunOutcome {
    Completed(RunReport),
    /// Another run held the latch; nothing was changed.
    Rejected,
}

impl RunOutcome {
    pub fn report(&self) -> Option<&RunReport> {
        match self {
            Self::Completed(report) => Some(report),
            Self::Rejected => None,
        }
    }

    pub fn is_rejected(&self) -> bool {
        matches!(self, Self::Rejected)
    }
}

/// State of the current (or most recent) run.
struct PipelineRun {
    run_id: Uuid,
    started_at: DateTime<Utc>,
    steps: StepStateMachine,
    logs: LogSink,
    inputs: Inputs,
    prediction: Option<PredictionResult>,
    proof: Option<ProofArtifact>,
    verification: Option<VerificationResult>,
}

impl PipelineRun {
    fn new() -> Self {
        Self {
            run_id: Uuid::new_v4(),
            started_at: Utc::now(),
            steps: StepStateMachine::new(),
            logs: LogSink::new(),
            inputs: Inputs::default(),
            prediction: None,
            proof: None,
            verification: None,
        }
    }

    /// Start over in place: new id, all steps pending, empty log, no results.
    fn restart(&mut self) {
        self.run_id = Uuid::new_v4();
        self.started_at = Utc::now();
        self.steps.reset();
        self.logs.clear();
        self.inputs = Inputs::default();
        self.prediction = None;
        self.proof = None;
        self.verification = None;
    }

    fn report(&self, finished_at: DateTime<Utc>) -> RunReport {
        RunReport {
            run_id: self.run_id,
            started_at: self.started_at,
            finished_at,
            inputs: self.inputs,
            steps: self.steps.snapshot(),
            logs: self.logs.snapshot(),
            prediction: self.prediction.clone(),
            proof: self.proof.clone(),
            verification: self.verification.clone(),
        }
    }
}

/// Held for the duration of a run; releases the latch on drop, including on panic.
struct RunLatch<'a>(&'a AtomicBool);

impl<'a> RunLatch<'a> {
    fn acquire(flag: &'a AtomicBool) -> Option<Self> {
        flag.compare_exchange(false, true, Ordering::AcqRel, Ordering::Acquire)
            .ok()
            .map(|_| Self(flag))
    }
}

impl Drop for RunLatch<'_> {
    fn drop(&mut self) {
        self.0.store(false, Ordering::Release);
    }
}

pub struct OrchestratorBuilder {
    inference: Arc<dyn InferenceAdapter>,
    proof: Arc<dyn ProofAdapter>,
    chain: Arc<dyn ChainAdapter>,
    addresses: Arc<dyn ContractAddressProvider>,
    pacing: Duration,
    publisher: EventPublisher,
    inputs: RawInputs,
}

impl Default for OrchestratorBuilder {
    fn default() -> Self {
        Self {
            inference: Arc::new(UnavailableInference),
            proof: Arc::new(MockProofAdapter),
            chain: Arc::new(UnavailableChain::new("no chain client configured")),
            addresses: Arc::new(ContractAddresses::default()),
            pacing: Duration::ZERO,
            publisher: EventPublisher::default(),
            inputs: RawInputs::default(),
        }
    }
}

impl OrchestratorBuilder {
    /// Real adapters wired from resolved configuration.
    pub fn from_config(config: &ZkGuardConfig) -> Self {
        let inference: Arc<dyn InferenceAdapter> = match &config.inference_endpoint {
            Some(endpoint) => Arc::new(HttpInferenceAdapter::new(endpoint.clone())),
            None => Arc::new(UnavailableInference),
        };

        let chain: Arc<dyn ChainAdapter> = match (&config.rpc_url, config.chain_id) {
            (Some(rpc_url), Some(chain_id)) => Arc::new(JsonRpcChainAdapter::new(
                rpc_url.clone(),
                chain_id,
                config.receipt_poll,
            )),
            _ => Arc::new(UnavailableChain::new(format!(
                "no RPC endpoint or chain id known for network '{}'",
                config.network
            ))),
        };

        Self::default()
            .inference(inference)
            .proof(Arc::new(EzklProofAdapter::new(
                config.artifacts_dir.clone(),
                config.zk_api_url.clone(),
            )))
            .chain(chain)
            .addresses(Arc::new(ManifestAddressProvider::from_config(config)))
            .pacing(config.pacing)
    }

    pub fn inference(mut self, adapter: Arc<dyn InferenceAdapter>) -> Self {
        self.inference = adapter;
        self
    }

    pub fn proof(mut self, adapter: Arc<dyn ProofAdapter>) -> Self {
        self.proof = adapter;
        self
    }

    pub fn chain(mut self, adapter: Arc<dyn ChainAdapter>) -> Self {
        self.chain = adapter;
        self
    }

    pub fn addresses(mut self, provider: Arc<dyn ContractAddressProvider>) -> Self {
        self.addresses = provider;
        self
    }

    /// Delay inserted at each progress point. Zero disables pacing.
    pub fn pacing(mut self, pacing: Duration) -> Self {
        self.pacing = pacing;
        self
    }

    pub fn publisher(mut self, publisher: EventPublisher) -> Self {
        self.publisher = publisher;
        self
    }

    pub fn inputs(mut self, inputs: RawInputs) -> Self {
        self.inputs = inputs;
        self
    }

    pub fn build(self) -> Orchestrator {
        Orchestrator {
            inference: self.inference,
            proof: self.proof,
            chain: self.chain,
            addresses: self.addresses,
            pacing: self.pacing,
            publisher: self.publisher,
            raw_inputs: Mutex::new(self.inputs),
            state: Mutex::new(PipelineRun::new()),
            running: AtomicBool::new(false),
        }
    }
}

/// Sequences ingestion, inference, witness, proof and on-chain verification.
///
/// Share it as `Arc<Orchestrator>`; state locks are never held across an
/// await, so snapshots can be read from other tasks while a run is in flight.
pub struct Orchestrator {
    inference: Arc<dyn InferenceAdapter>,
    proof: Arc<dyn ProofAdapter>,
    chain: Arc<dyn ChainAdapter>,
    addresses: Arc<dyn ContractAddressProvider>,
    pacing: Duration,
    publisher: EventPublisher,
    raw_inputs: Mutex<RawInputs>,
    state: Mutex<PipelineRun>,
    running: AtomicBool,
}

impl Orchestrator {
    pub fn builder() -> OrchestratorBuilder {
        OrchestratorBuilder::default()
    }

    fn state(&self) -> MutexGuard<'_, PipelineRun> {
        self.state.lock().unwrap_or_else(PoisonError::into_inner)
    }

    // ── Observers ────────────────────────────────────────────────────

    /// Replace the raw input fields read by the next ingestion stage.
    pub fn set_inputs(&self, inputs: RawInputs) {
        *self.raw_inputs.lock().unwrap_or_else(PoisonError::into_inner) = inputs;
    }

    pub fn raw_inputs(&self) -> RawInputs {
        self.raw_inputs
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .clone()
    }

    pub fn subscribe(&self) -> broadcast::Receiver<PipelineEvent> {
        self.publisher.subscribe()
    }

    pub fn is_running(&self) -> bool {
        self.running.load(Ordering::Acquire)
    }

    pub fn steps(&self) -> Vec<Step> {
        self.state().steps.snapshot()
    }

    pub fn logs(&self) -> Vec<LogEntry> {
        self.state().logs.snapshot()
    }

    pub fn prediction(&self) -> Option<PredictionResult> {
        self.state().prediction.clone()
    }

    pub fn proof(&self) -> Option<ProofArtifact> {
        self.state().proof.clone()
    }

    pub fn verification(&self) -> Option<VerificationResult> {
        self.state().verification.clone()
    }

    /// Preload the model. A failure is logged and does not affect later runs.
    pub async fn warm_up(&self) {
        if let Err(e) = self.inference.warm_up().await {
            tracing::warn!(error = %e, "Model warm-up failed, runs will use fallback if it stays down");
        }
    }

    // ── Run ──────────────────────────────────────────────────────────

    /// Execute one run, or return `Rejected` if a run is already in flight.
    pub async fn run(&self) -> RunOutcome {
        let Some(latch) = RunLatch::acquire(&self.running) else {
            tracing::debug!("Pipeline run rejected: another run is in progress");
            return RunOutcome::Rejected;
        };

        let run_id = self.begin();
        let inputs = self.ingest(run_id).await;
        let prediction = self.infer(run_id, &inputs).await;
        self.prepare_witness(run_id, &inputs).await;
        let proof = self.prove(run_id, &inputs, prediction.prediction).await;
        self.verify_on_chain(run_id, &inputs, &proof).await;

        let report = self.state().report(Utc::now());
        drop(latch);

        tracing::info!(
            run_id = %run_id,
            prediction = prediction.prediction,
            proof = %proof.provenance,
            "Pipeline run finished"
        );
        self.publisher.publish(PipelineEvent::RunFinished {
            report: Box::new(report.clone()),
        });
        RunOutcome::Completed(report)
    }

    /// Like `run`, but reports a concurrent call as an error.
    pub async fn try_run(&self) -> Result<RunReport, OrchestratorError> {
        match self.run().await {
            RunOutcome::Completed(report) => Ok(report),
            RunOutcome::Rejected => Err(OrchestratorError::ConcurrencyRejected),
        }
    }

    fn begin(&self) -> Uuid {
        let (run_id, steps) = {
            let mut state = self.state();
            state.restart();
            (state.run_id, state.steps.snapshot())
        };
        tracing::info!(run_id = %run_id, "Pipeline run started");
        self.publisher
            .publish(PipelineEvent::RunStarted { run_id, steps });
        run_id
    }

    fn log(&self, run_id: Uuid, message: impl Into<String>) {
        let entry = self.state().logs.append(message);
        self.publisher.publish(PipelineEvent::Log { run_id, entry });
    }

    fn set_step(&self, run_id: Uuid, index: usize, status: StepStatus) {
        let step = self.state().steps.set_status(index, status);
        if let Some(step) = step {
            self.publisher
                .publish(PipelineEvent::StepChanged { run_id, step });
        }
    }

    async fn pace(&self) {
        if !self.pacing.is_zero() {
            tokio::time::sleep(self.pacing).await;
        }
    }

    // ── Stages ───────────────────────────────────────────────────────

    async fn ingest(&self, run_id: Uuid) -> Inputs {
        self.set_step(run_id, INGESTION, StepStatus::Processing);

        let inputs = normalize_inputs(&self.raw_inputs());
        self.state().inputs = inputs;
        let [btc_vol, eth_gas, volume] = inputs.as_array();
        self.log(
            run_id,
            format!(
                "Initializing pipeline with inputs: BTC Vol={}, ETH Gas={}, Volume={}",
                btc_vol, eth_gas, volume
            ),
        );
        self.publisher
            .publish(PipelineEvent::InputsNormalized { run_id, inputs });
        self.pace().await;

        self.set_step(run_id, INGESTION, StepStatus::Completed);
        inputs
    }

    async fn infer(&self, run_id: Uuid, inputs: &Inputs) -> PredictionResult {
        self.set_step(run_id, INFERENCE, StepStatus::Processing);
        self.log(run_id, "[Inference] Loading model...");
        self.log(run_id, "[Inference] Running forward pass...");
        self.log(run_id, format!("[Inference] Input tensor: {}", inputs));

        let outcome = match self.inference.run(inputs).await {
            Ok(prediction) => StageOutcome::Real(prediction),
            Err(e) => StageOutcome::fallback(fallback_prediction(inputs), e.to_string()),
        };

        match &outcome {
            StageOutcome::Real(prediction) => {
                self.log(run_id, format!("[Inference] Prediction output: ${:.2}", prediction));
            }
            StageOutcome::Fallback { value, reason } => {
                self.log(run_id, format!("[ERROR] Inference failed: {}", reason));
                if !linear_prediction(inputs).is_finite() {
                    self.log(
                        run_id,
                        "[WARNING] Simulated prediction out of range, clamped to a finite value",
                    );
                }
                self.log(run_id, format!("[FALLBACK] Using simulated prediction: ${:.2}", value));
            }
        }

        let result = PredictionResult {
            prediction: *outcome.value(),
            inputs: *inputs,
            provenance: outcome.provenance(),
        };
        self.state().prediction = Some(result.clone());
        self.publisher.publish(PipelineEvent::PredictionReady {
            run_id,
            prediction: result.clone(),
        });
        self.pace().await;

        self.set_step(run_id, INFERENCE, StepStatus::Completed);
        result
    }

    /// Local trace preparation. No external call; always succeeds.
    async fn prepare_witness(&self, run_id: Uuid, inputs: &Inputs) {
        let started = Instant::now();
        self.set_step(run_id, WITNESS, StepStatus::Processing);
        self.log(run_id, "[EZKL] Loading circuit params from settings.json...");
        self.log(run_id, "[EZKL] Configuring K=17 (Lookup bits)...");
        self.pace().await;

        self.log(run_id, format!("[EZKL] Input tensor: {}", inputs));
        self.log(run_id, "[EZKL] Generating witness from ONNX trace...");
        self.pace().await;

        self.log(
            run_id,
            format!(
                "[EZKL] Witness generation complete. Time: {}ms",
                started.elapsed().as_millis()
            ),
        );
        self.set_step(run_id, WITNESS, StepStatus::Completed);
    }

    async fn prove(&self, run_id: Uuid, inputs: &Inputs, prediction: f64) -> ProofArtifact {
        self.set_step(run_id, PROOF, StepStatus::Processing);
        self.log(run_id, "[Halo2] Starting proof generation...");
        self.log(run_id, "[Halo2] Computing KZG commitments...");
        self.pace().await;
        self.log(run_id, "[Halo2] Round 1/3 complete...");
        self.pace().await;
        self.log(run_id, "[Halo2] Round 2/3 complete...");
        self.pace().await;

        let generated = self.proof.generate(inputs, prediction).await;

        self.log(run_id, "[Halo2] Finalizing proof...");
        self.pace().await;

        let (mut artifact, mock_reason) = match generated {
            StageOutcome::Real(artifact) => (artifact, None),
            StageOutcome::Fallback { value, reason } => (value, Some(reason)),
        };

        let outcome = match normalize_proof_text(&artifact.proof_hex) {
            Some(proof_hex) => {
                artifact.proof_hex = proof_hex;
                self.log(
                    run_id,
                    format!(
                        "[EZKL] Proof generated successfully. Size: {} bytes",
                        artifact.size_bytes
                    ),
                );
                match mock_reason {
                    None => {
                        artifact.provenance = Provenance::Real;
                        StageOutcome::Real(artifact)
                    }
                    Some(reason) => {
                        artifact.provenance = Provenance::Mock;
                        self.log(run_id, format!("[INFO] Using mock proof ({})", reason));
                        StageOutcome::fallback(artifact, reason)
                    }
                }
            }
            None => {
                self.log(
                    run_id,
                    "[ERROR] Proof generation failed: proof backend returned malformed proof text",
                );
                self.log(run_id, "[FALLBACK] Using mock proof");
                StageOutcome::fallback(fallback_proof(), "malformed proof text")
            }
        };

        if let Some(reason) = outcome.fallback_reason() {
            tracing::debug!(run_id = %run_id, reason, "Proof stage fell back to mock");
        }
        let artifact = outcome.into_value();
        self.state().proof = Some(artifact.clone());
        self.publisher.publish(PipelineEvent::ProofReady {
            run_id,
            proof: artifact.clone(),
        });

        self.set_step(run_id, PROOF, StepStatus::Completed);
        artifact
    }

    async fn verify_on_chain(&self, run_id: Uuid, inputs: &Inputs, proof: &ProofArtifact) {
        self.set_step(run_id, VERIFICATION, StepStatus::Processing);
        self.log(run_id, "[Monad] Connecting to RPC Node...");
        self.log(run_id, "[Monad] Estimating Gas...");

        let addresses = self.addresses.addresses();
        let proof_ready = is_strict_proof_hex(&proof.proof_hex);

        let outcome = match addresses.price_guard {
            Some(contract) if proof_ready => {
                self.log(run_id, "[Monad] Sending transaction to blockchain...");
                match self
                    .chain
                    .verify(&contract, &inputs.to_vec(), &proof.proof_hex)
                    .await
                {
                    Ok(tx_hash) => {
                        self.log(run_id, format!("[Monad] TxHash: {}", tx_hash));
                        self.log(run_id, "[Monad] Transaction confirmed!");
                        StageOutcome::Real(VerificationResult::confirmed(tx_hash))
                    }
                    Err(e) => {
                        self.log(run_id, format!("[WARNING] Real transaction failed: {}", e));
                        self.log(run_id, "[INFO] Using mock transaction");
                        self.mock_verification(run_id, e.to_string())
                    }
                }
            }
            Some(_) => {
                self.log(run_id, "[WARNING] Proof not available, using mock transaction");
                self.pace().await;
                self.mock_verification(run_id, "proof not available".to_string())
            }
            None => {
                self.log(run_id, "[WARNING] Contract not deployed, using mock transaction");
                self.pace().await;
                self.mock_verification(run_id, "contract not deployed".to_string())
            }
        };

        let verification = outcome.into_value();
        self.state().verification = Some(verification.clone());
        self.publisher.publish(PipelineEvent::VerificationReady {
            run_id,
            verification,
        });

        self.set_step(run_id, VERIFICATION, StepStatus::Completed);
    }

    fn mock_verification(&self, run_id: Uuid, reason: String) -> StageOutcome<VerificationResult> {
        let tx_hash = mock_tx_hash();
        self.log(run_id, format!("[Monad] TxHash (mock): {}", tx_hash));
        StageOutcome::fallback(VerificationResult::mocked(tx_hash, reason.clone()), reason)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::errors::AdapterError;
    use async_trait::async_trait;
    use std::collections::HashMap;
    use tokio::sync::Notify;
    use zkguard_common::STEP_COUNT;

    // ── Test doubles ─────────────────────────────────────────────────

    struct FixedInference(f64);

    #[async_trait]
    impl InferenceAdapter for FixedInference {
        async fn run(&self, _inputs: &Inputs) -> Result<f64, AdapterError> {
            Ok(self.0)
        }
    }

    struct FailingInference;

    #[async_trait]
    impl InferenceAdapter for FailingInference {
        async fn run(&self, _inputs: &Inputs) -> Result<f64, AdapterError> {
            Err(AdapterError::Failure("model crashed".into()))
        }

        async fn warm_up(&self) -> Result<(), AdapterError> {
            Err(AdapterError::Unavailable("down".into()))
        }
    }

    /// Blocks inside inference until released.
    struct GatedInference {
        entered: Arc<Notify>,
        release: Arc<Notify>,
    }

    #[async_trait]
    impl InferenceAdapter for GatedInference {
        async fn run(&self, _inputs: &Inputs) -> Result<f64, AdapterError> {
            self.entered.notify_one();
            self.release.notified().await;
            Ok(1.0)
        }
    }

    struct PanickingInference;

    #[async_trait]
    impl InferenceAdapter for PanickingInference {
        async fn run(&self, _inputs: &Inputs) -> Result<f64, AdapterError> {
            panic!("adapter bug");
        }
    }

    struct TextProof(&'static str, Provenance);

    #[async_trait]
    impl ProofAdapter for TextProof {
        async fn generate(&self, _: &Inputs, _: f64) -> StageOutcome<ProofArtifact> {
            let artifact = ProofArtifact {
                proof_hex: self.0.to_string(),
                size_bytes: 1234,
                provenance: self.1,
            };
            match self.1 {
                Provenance::Real => StageOutcome::Real(artifact),
                Provenance::Mock => StageOutcome::fallback(artifact, "artifacts missing"),
            }
        }
    }

    #[derive(Default)]
    struct RecordingChain {
        fail: bool,
        calls: Mutex<Vec<(String, Vec<f64>, String)>>,
    }

    #[async_trait]
    impl ChainAdapter for RecordingChain {
        async fn verify(
            &self,
            contract: &str,
            instances: &[f64],
            proof_hex: &str,
        ) -> Result<String, AdapterError> {
            self.calls.lock().unwrap().push((
                contract.to_string(),
                instances.to_vec(),
                proof_hex.to_string(),
            ));
            if self.fail {
                Err(AdapterError::UserDeclined("rejected in wallet".into()))
            } else {
                Ok("0xrealtxhash".to_string())
            }
        }
    }

    fn deployed() -> Arc<ContractAddresses> {
        Arc::new(ContractAddresses {
            verifier: Some("0xverifier".into()),
            price_guard: Some("0xguard".into()),
        })
    }

    fn messages(orchestrator: &Orchestrator) -> Vec<String> {
        orchestrator.logs().into_iter().map(|e| e.message).collect()
    }

    fn position(messages: &[String], needle: &str) -> usize {
        messages
            .iter()
            .position(|m| m.contains(needle))
            .unwrap_or_else(|| panic!("no log line containing {:?} in {:#?}", needle, messages))
    }

    fn assert_all_completed(orchestrator: &Orchestrator) {
        let steps = orchestrator.steps();
        assert_eq!(steps.len(), STEP_COUNT);
        assert!(
            steps.iter().all(|s| s.status == StepStatus::Completed),
            "{:?}",
            steps
        );
    }

    // ── Scenarios ────────────────────────────────────────────────────

    #[tokio::test]
    async fn test_default_scenario_runs_fully_mocked() {
        let orchestrator = Orchestrator::builder().build();
        let report = orchestrator.try_run().await.unwrap();

        assert!(report.all_completed());
        assert_all_completed(&orchestrator);

        let prediction = orchestrator.prediction().unwrap();
        assert!((prediction.prediction - 2693.0).abs() < 1e-9);
        assert_eq!(prediction.formatted(), "2693.00");
        assert_eq!(prediction.provenance, Provenance::Mock);

        let proof = orchestrator.proof().unwrap();
        assert!(is_strict_proof_hex(&proof.proof_hex));
        assert_eq!(proof.size_bytes, 4096);
        assert_eq!(proof.provenance, Provenance::Mock);

        let verification = orchestrator.verification().unwrap();
        let tx = verification.tx_hash.unwrap();
        assert_eq!(tx.len(), 42);
        assert!(is_strict_proof_hex(&tx));
        assert!(!verification.success);
        assert_eq!(verification.provenance, Provenance::Mock);

        let logs = messages(&orchestrator);
        assert!(logs.contains(&"[FALLBACK] Using simulated prediction: $2693.00".to_string()));
        assert!(logs[0].starts_with("Initializing pipeline with inputs: BTC Vol=0.45, ETH Gas=24, Volume=1.2"));
        assert_eq!(report.logs.len(), logs.len());
    }

    #[tokio::test]
    async fn test_malformed_inputs_normalize_to_zero_and_complete() {
        let orchestrator = Orchestrator::builder()
            .inputs(RawInputs::new("abc", "", "--"))
            .build();
        orchestrator.run().await;

        assert_eq!(orchestrator.prediction().unwrap().inputs, Inputs([0.0, 0.0, 0.0]));
        assert_eq!(orchestrator.prediction().unwrap().prediction, 2000.0);
        assert_all_completed(&orchestrator);
    }

    #[tokio::test]
    async fn test_set_inputs_applies_to_next_run() {
        let orchestrator = Orchestrator::builder().build();
        orchestrator.set_inputs(RawInputs::new("1", "1", "1"));
        let report = orchestrator.try_run().await.unwrap();
        assert_eq!(report.inputs, Inputs([1.0, 1.0, 1.0]));
        assert_eq!(report.prediction.unwrap().prediction, 2602.0);
    }

    #[tokio::test]
    async fn test_real_inference_is_stored_and_logged() {
        let orchestrator = Orchestrator::builder()
            .inference(Arc::new(FixedInference(3120.456)))
            .build();
        orchestrator.run().await;

        let prediction = orchestrator.prediction().unwrap();
        assert_eq!(prediction.prediction, 3120.456);
        assert_eq!(prediction.provenance, Provenance::Real);
        let logs = messages(&orchestrator);
        assert!(logs.contains(&"[Inference] Prediction output: $3120.46".to_string()));
        assert!(!logs.iter().any(|m| m.starts_with("[FALLBACK]")));
    }

    #[tokio::test]
    async fn test_inference_failure_uses_formula_and_logs_fallback() {
        let orchestrator = Orchestrator::builder()
            .inference(Arc::new(FailingInference))
            .inputs(RawInputs::new("2", "10", "0.5"))
            .build();
        orchestrator.run().await;

        assert_eq!(orchestrator.prediction().unwrap().prediction, 200.0 + 20.0 + 250.0 + 2000.0);
        let logs = messages(&orchestrator);
        let error = position(&logs, "[ERROR] Inference failed: model crashed");
        let fallback = position(&logs, "[FALLBACK] Using simulated prediction: $2470.00");
        assert!(error < fallback);
    }

    #[tokio::test]
    async fn test_overflowing_fallback_is_finite_and_recordable() {
        use crate::history::RunRecorder;

        let report = Orchestrator::builder()
            .inputs(RawInputs::new("0.45", "24", "1e306"))
            .build()
            .try_run()
            .await
            .unwrap();

        let prediction = report.prediction.as_ref().unwrap();
        assert!(prediction.prediction.is_finite());
        assert_eq!(prediction.prediction, f64::MAX);
        let logs: Vec<&str> = report.logs.iter().map(|e| e.message.as_str()).collect();
        assert!(logs.iter().any(|m| m.starts_with("[WARNING] Simulated prediction out of range")));

        let dir = tempfile::TempDir::new().unwrap();
        let recorder = RunRecorder::new(dir.path());
        let path = recorder.record(&report).unwrap();
        let loaded = recorder.load_run(&path).unwrap();
        assert_eq!(loaded.prediction, report.prediction);
        assert!(loaded.all_completed());
    }

    #[tokio::test]
    async fn test_proof_text_is_normalized() {
        let orchestrator = Orchestrator::builder()
            .proof(Arc::new(TextProof("0x0xABCDEF (1234 bytes)", Provenance::Real)))
            .build();
        orchestrator.run().await;

        let proof = orchestrator.proof().unwrap();
        assert_eq!(proof.proof_hex, "0xabcdef");
        assert_eq!(proof.size_bytes, 1234);
        assert_eq!(proof.provenance, Provenance::Real);
        assert!(messages(&orchestrator).contains(&"[EZKL] Proof generated successfully. Size: 1234 bytes".to_string()));
    }

    #[tokio::test]
    async fn test_garbage_proof_text_falls_back() {
        let orchestrator = Orchestrator::builder()
            .proof(Arc::new(TextProof("proof unavailable", Provenance::Real)))
            .build();
        orchestrator.run().await;

        let proof = orchestrator.proof().unwrap();
        assert!(is_strict_proof_hex(&proof.proof_hex));
        assert_eq!(proof.proof_hex.len(), 66);
        assert_eq!(proof.size_bytes, 4096);
        assert_eq!(proof.provenance, Provenance::Mock);
        assert!(messages(&orchestrator).contains(&"[FALLBACK] Using mock proof".to_string()));
        assert_all_completed(&orchestrator);
    }

    #[tokio::test]
    async fn test_mock_proof_is_labeled() {
        let orchestrator = Orchestrator::builder()
            .proof(Arc::new(TextProof("0x1234", Provenance::Mock)))
            .build();
        orchestrator.run().await;
        assert_eq!(orchestrator.proof().unwrap().provenance, Provenance::Mock);
        assert!(messages(&orchestrator).contains(&"[INFO] Using mock proof (artifacts missing)".to_string()));
    }

    #[tokio::test]
    async fn test_chain_success_binds_tx_hash() {
        let chain = Arc::new(RecordingChain::default());
        let orchestrator = Orchestrator::builder()
            .inputs(RawInputs::new("0.45", "24", "1.2"))
            .proof(Arc::new(TextProof("0xBEEF", Provenance::Real)))
            .chain(chain.clone())
            .addresses(deployed())
            .build();
        orchestrator.run().await;

        let verification = orchestrator.verification().unwrap();
        assert_eq!(verification.tx_hash.as_deref(), Some("0xrealtxhash"));
        assert!(verification.success);
        assert_eq!(verification.provenance, Provenance::Real);

        let calls = chain.calls.lock().unwrap();
        assert_eq!(calls.len(), 1);
        assert_eq!(calls[0].0, "0xguard");
        assert_eq!(calls[0].1, vec![0.45, 24.0, 1.2]);
        assert_eq!(calls[0].2, "0xbeef");
        assert!(messages(&orchestrator).contains(&"[Monad] Transaction confirmed!".to_string()));
    }

    #[tokio::test]
    async fn test_chain_failure_warns_then_mocks() {
        let chain = Arc::new(RecordingChain {
            fail: true,
            ..Default::default()
        });
        let orchestrator = Orchestrator::builder()
            .chain(chain)
            .addresses(deployed())
            .build();
        orchestrator.run().await;

        let verification = orchestrator.verification().unwrap();
        let tx = verification.tx_hash.clone().unwrap();
        assert_eq!(tx.len(), 42);
        assert!(!verification.success);
        assert_eq!(verification.error.as_deref(), Some("User declined: rejected in wallet"));

        let logs = messages(&orchestrator);
        let warning = position(&logs, "[WARNING] Real transaction failed: User declined");
        let mock = position(&logs, &format!("[Monad] TxHash (mock): {}", tx));
        assert!(warning < mock);
        assert_all_completed(&orchestrator);
    }

    #[tokio::test]
    async fn test_missing_contract_skips_chain_call() {
        let chain = Arc::new(RecordingChain::default());
        let orchestrator = Orchestrator::builder().chain(chain.clone()).build();
        orchestrator.run().await;

        assert!(chain.calls.lock().unwrap().is_empty());
        let logs = messages(&orchestrator);
        let tx = orchestrator.verification().unwrap().tx_hash.unwrap();
        let warning = position(&logs, "[WARNING] Contract not deployed");
        let mock = position(&logs, &tx);
        assert!(warning < mock);
    }

    #[tokio::test]
    async fn test_rerun_clears_previous_state() {
        let orchestrator = Orchestrator::builder().build();
        let first = orchestrator.try_run().await.unwrap();
        let second = orchestrator.try_run().await.unwrap();

        assert_ne!(first.run_id, second.run_id);
        assert_eq!(first.logs.len(), second.logs.len());
        assert_eq!(orchestrator.logs().len(), second.logs.len());
        assert_ne!(
            first.verification.unwrap().tx_hash,
            second.verification.unwrap().tx_hash
        );
    }

    // ── Concurrency ──────────────────────────────────────────────────

    #[tokio::test]
    async fn test_concurrent_run_is_rejected_without_side_effects() {
        let entered = Arc::new(Notify::new());
        let release = Arc::new(Notify::new());
        let orchestrator = Arc::new(
            Orchestrator::builder()
                .inference(Arc::new(GatedInference {
                    entered: entered.clone(),
                    release: release.clone(),
                }))
                .build(),
        );

        let background = {
            let orchestrator = orchestrator.clone();
            tokio::spawn(async move { orchestrator.run().await })
        };
        entered.notified().await;
        assert!(orchestrator.is_running());

        let steps_before = orchestrator.steps();
        let logs_before = orchestrator.logs();
        let prediction_before = orchestrator.prediction();
        let proof_before = orchestrator.proof();
        let verification_before = orchestrator.verification();

        assert!(orchestrator.run().await.is_rejected());
        match orchestrator.try_run().await {
            Err(OrchestratorError::ConcurrencyRejected) => {}
            other => panic!("Expected ConcurrencyRejected, got {:?}", other),
        }

        assert_eq!(orchestrator.steps(), steps_before);
        assert_eq!(orchestrator.logs(), logs_before);
        assert_eq!(orchestrator.prediction(), prediction_before);
        assert_eq!(orchestrator.proof(), proof_before);
        assert_eq!(orchestrator.verification(), verification_before);

        release.notify_one();
        let outcome = background.await.unwrap();
        assert!(outcome.report().unwrap().all_completed());
        assert!(!orchestrator.is_running());

        // The latch is free again.
        release.notify_one();
        assert!(!orchestrator.run().await.is_rejected());
    }

    #[tokio::test]
    async fn test_panicking_adapter_releases_latch() {
        let orchestrator = Arc::new(
            Orchestrator::builder()
                .inference(Arc::new(PanickingInference))
                .build(),
        );
        let handle = {
            let orchestrator = orchestrator.clone();
            tokio::spawn(async move { orchestrator.run().await })
        };
        assert!(handle.await.is_err());
        assert!(!orchestrator.is_running());
    }

    // ── Events ───────────────────────────────────────────────────────

    #[tokio::test]
    async fn test_step_status_never_regresses() {
        let orchestrator = Orchestrator::builder().build();
        let mut rx = orchestrator.subscribe();
        orchestrator.run().await;

        let mut seen: HashMap<u8, Vec<StepStatus>> = HashMap::new();
        let mut finished = false;
        while let Ok(event) = rx.try_recv() {
            match event {
                PipelineEvent::StepChanged { step, .. } => {
                    seen.entry(step.id).or_default().push(step.status)
                }
                PipelineEvent::RunFinished { .. } => finished = true,
                _ => {}
            }
        }
        assert!(finished);
        assert_eq!(seen.len(), STEP_COUNT);
        for (id, statuses) in seen {
            assert_eq!(
                statuses,
                vec![StepStatus::Processing, StepStatus::Completed],
                "step {}",
                id
            );
        }
    }

    #[tokio::test]
    async fn test_stages_complete_in_order() {
        let orchestrator = Orchestrator::builder().build();
        let mut rx = orchestrator.subscribe();
        orchestrator.run().await;

        let mut transitions = Vec::new();
        while let Ok(event) = rx.try_recv() {
            if let PipelineEvent::StepChanged { step, .. } = event {
                transitions.push((step.id, step.status));
            }
        }
        let expected: Vec<_> = (1..=5u8)
            .flat_map(|id| [(id, StepStatus::Processing), (id, StepStatus::Completed)])
            .collect();
        assert_eq!(transitions, expected);
    }

    #[tokio::test]
    async fn test_events_carry_results_and_logs_in_order() {
        let orchestrator = Orchestrator::builder().build();
        let mut rx = orchestrator.subscribe();
        let report = orchestrator.try_run().await.unwrap();

        let mut kinds = Vec::new();
        let mut logged = Vec::new();
        while let Ok(event) = rx.try_recv() {
            assert_eq!(event.run_id(), report.run_id);
            match &event {
                PipelineEvent::RunStarted { .. } => kinds.push("started"),
                PipelineEvent::InputsNormalized { .. } => kinds.push("inputs"),
                PipelineEvent::PredictionReady { .. } => kinds.push("prediction"),
                PipelineEvent::ProofReady { .. } => kinds.push("proof"),
                PipelineEvent::VerificationReady { .. } => kinds.push("verification"),
                PipelineEvent::RunFinished { .. } => kinds.push("finished"),
                PipelineEvent::Log { entry, .. } => logged.push(entry.clone()),
                PipelineEvent::StepChanged { .. } => {}
            }
        }
        assert_eq!(
            kinds,
            vec!["started", "inputs", "prediction", "proof", "verification", "finished"]
        );
        assert_eq!(logged, report.logs);
    }

    #[tokio::test]
    async fn test_warm_up_failure_does_not_block_run() {
        let orchestrator = Orchestrator::builder()
            .inference(Arc::new(FailingInference))
            .build();
        orchestrator.warm_up().await;
        assert!(!orchestrator.run().await.is_rejected());
    }
}
