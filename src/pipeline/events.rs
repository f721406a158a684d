use serde::{Deserialize, Serialize};
use tokio::sync::broadcast;
use uuid::Uuid;
use zkguard_common::{
    Inputs, LogEntry, PredictionResult, ProofArtifact, RunReport, Step, VerificationResult,
};

/// Buffered events per subscriber before a slow observer starts lagging.
pub const EVENT_CHANNEL_CAPACITY: usize = 256;

// ── Pipeline event types ─────────────────────────────────────────────

/// Everything an observer can learn about a run, published after each transition.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(tag = "type", content = "data")]
pub enum PipelineEvent {
    RunStarted {
        run_id: Uuid,
        steps: Vec<Step>,
    },
    StepChanged {
        run_id: Uuid,
        step: Step,
    },
    Log {
        run_id: Uuid,
        entry: LogEntry,
    },
    InputsNormalized {
        run_id: Uuid,
        inputs: Inputs,
    },
    PredictionReady {
        run_id: Uuid,
        prediction: PredictionResult,
    },
    ProofReady {
        run_id: Uuid,
        proof: ProofArtifact,
    },
    VerificationReady {
        run_id: Uuid,
        verification: VerificationResult,
    },
    RunFinished {
        report: Box<RunReport>,
    },
}

impl PipelineEvent {
    pub fn run_id(&self) -> Uuid {
        match self {
            Self::RunStarted { run_id, .. }
            | Self::StepChanged { run_id, .. }
            | Self::Log { run_id, .. }
            | Self::InputsNormalized { run_id, .. }
            | Self::PredictionReady { run_id, .. }
            | Self::ProofReady { run_id, .. }
            | Self::VerificationReady { run_id, .. } => *run_id,
            Self::RunFinished { report } => report.run_id,
        }
    }
}

// ── Publisher ────────────────────────────────────────────────────────

/// Fan-out of pipeline events to any number of subscribers.
#[derive(Debug, Clone)]
pub struct EventPublisher {
    tx: broadcast::Sender<PipelineEvent>,
}

impl Default for EventPublisher {
    fn default() -> Self {
        Self::new(EVENT_CHANNEL_CAPACITY)
    }
}

impl EventPublisher {
    pub fn new(capacity: usize) -> Self {
        let (tx, _) = broadcast::channel(capacity);
        Self { tx }
    }

    pub fn subscribe(&self) -> broadcast::Receiver<PipelineEvent> {
        self.tx.subscribe()
    }

    pub fn publish(&self, event: PipelineEvent) {
        let _ = self.tx.send(event); // Ignore error if no receivers
    }

    pub fn subscriber_count(&self) -> usize {
        self.tx.receiver_count()
    }
}
