use std::path::{Path, PathBuf};
use std::time::Duration;

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use tokio::sync::OnceCell;
use zkguard_common::{Inputs, MOCK_PROOF_SIZE_BYTES, ProofArtifact, Provenance};

use super::ProofAdapter;
use crate::errors::AdapterError;
use crate::pipeline::StageOutcome;

pub const SETTINGS_FILE: &str = "settings.json";
pub const PROVING_KEY_FILE: &str = "pk.key";
pub const VERIFICATION_KEY_FILE: &str = "vk.key";

const MOCK_PROOF_MAX_HEX: usize = 128;
const REQUEST_TIMEOUT: Duration = Duration::from_secs(300);

#[derive(Debug, Serialize)]
struct ProveRequest<'a> {
    inputs: &'a [f64],
    prediction: f64,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct ProveResponse {
    proof: String,
    #[serde(default)]
    proof_size: Option<usize>,
}

/// Circuit artifacts that must all be present before a real proof is attempted.
#[derive(Debug)]
pub struct ZkArtifacts {
    pub settings: serde_json::Value,
    pub proving_key: PathBuf,
    pub verification_key: PathBuf,
}

/// EZKL proof backend: checks local circuit artifacts, then asks the prover API.
///
/// Anything short of a proof from the API yields a mock proof, so `generate`
/// always has an artifact to hand back.
pub struct EzklProofAdapter {
    artifacts_dir: PathBuf,
    api_url: String,
    client: OnceCell<reqwest::Client>,
}

impl EzklProofAdapter {
    pub fn new(artifacts_dir: impl Into<PathBuf>, api_url: impl Into<String>) -> Self {
        Self {
            artifacts_dir: artifacts_dir.into(),
            api_url: api_url.into().trim_end_matches('/').to_string(),
            client: OnceCell::new(),
        }
    }

    pub fn artifacts_dir(&self) -> &Path {
        &self.artifacts_dir
    }

    /// Load settings and check both keys. Fails with the first missing artifact.
    pub async fn load_artifacts(&self) -> Result<ZkArtifacts, AdapterError> {
        let settings_path = self.artifacts_dir.join(SETTINGS_FILE);
        let raw = tokio::fs::read_to_string(&settings_path)
            .await
            .map_err(|_| AdapterError::Unavailable(format!("{} not found", SETTINGS_FILE)))?;
        let settings = serde_json::from_str(&raw)
            .map_err(|e| AdapterError::Unavailable(format!("{} is invalid: {}", SETTINGS_FILE, e)))?;

        let proving_key = self.require_key(PROVING_KEY_FILE).await?;
        let verification_key = self.require_key(VERIFICATION_KEY_FILE).await?;

        Ok(ZkArtifacts {
            settings,
            proving_key,
            verification_key,
        })
    }

    async fn require_key(&self, name: &str) -> Result<PathBuf, AdapterError> {
        let path = self.artifacts_dir.join(name);
        match tokio::fs::metadata(&path).await {
            Ok(meta) if meta.is_file() && meta.len() > 0 => Ok(path),
            _ => Err(AdapterError::Unavailable(format!("{} missing", name))),
        }
    }

    async fn client(&self) -> Result<&reqwest::Client, AdapterError> {
        self.client
            .get_or_try_init(|| async {
                reqwest::Client::builder()
                    .timeout(REQUEST_TIMEOUT)
                    .build()
                    .map_err(|e| {
                        AdapterError::Unavailable(format!("failed to build HTTP client: {}", e))
                    })
            })
            .await
    }

    async fn request_proof(&self, inputs: &Inputs, prediction: f64) -> Result<ProofArtifact, AdapterError> {
        let url = format!("{}/generate-proof", self.api_url);
        let values = inputs.to_vec();
        tracing::debug!(endpoint = %url, "Requesting proof");

        let resp = self
            .client()
            .await?
            .post(&url)
            .json(&ProveRequest {
                inputs: &values,
                prediction,
            })
            .send()
            .await
            .map_err(|e| AdapterError::from_http("proof request failed", e))?;

        let status = resp.status();
        if !status.is_success() {
            return Err(AdapterError::Failure(format!("prover API returned {}", status)));
        }

        let body: ProveResponse = resp
            .json()
            .await
            .map_err(|e| AdapterError::from_http("malformed prover response", e))?;

        if body.proof.trim().is_empty() {
            return Err(AdapterError::Failure("prover returned an empty proof".to_string()));
        }

        let size_bytes = body.proof_size.unwrap_or_else(|| hex_body_len(&body.proof) / 2);
        Ok(ProofArtifact {
            proof_hex: body.proof,
            size_bytes,
            provenance: Provenance::Real,
        })
    }
}

fn hex_body_len(proof: &str) -> usize {
    proof
        .split_whitespace()
        .next()
        .map(|t| t.trim_start_matches("0x").len())
        .unwrap_or(0)
}

/// Stand-in proof derived from the inputs, the prediction and the clock.
pub fn mock_proof(inputs: &Inputs, prediction: f64, now_millis: i64) -> ProofArtifact {
    let mut values: Vec<i64> = inputs
        .as_array()
        .iter()
        .map(|v| (v * 1000.0).floor() as i64)
        .collect();
    values.push((prediction * 1000.0).floor() as i64);
    values.push(now_millis.rem_euclid(1_000_000));

    let mut hex: String = values
        .iter()
        .map(|v| format!("{:08x}", *v as u32))
        .collect();
    hex.truncate(MOCK_PROOF_MAX_HEX);

    ProofArtifact {
        proof_hex: format!("0x{}", hex),
        size_bytes: MOCK_PROOF_SIZE_BYTES,
        provenance: Provenance::Mock,
    }
}

/// Used when no proof backend is configured: every proof is a mock.
#[derive(Debug, Default, Clone, Copy)]
pub struct MockProofAdapter;

#[async_trait]
impl ProofAdapter for MockProofAdapter {
    async fn generate(&self, inputs: &Inputs, prediction: f64) -> StageOutcome<ProofArtifact> {
        StageOutcome::fallback(
            mock_proof(inputs, prediction, chrono::Utc::now().timestamp_millis()),
            "no proof backend configured",
        )
    }
}

#[async_trait]
impl ProofAdapter for EzklProofAdapter {
    async fn generate(&self, inputs: &Inputs, prediction: f64) -> StageOutcome<ProofArtifact> {
        let now = chrono::Utc::now().timestamp_millis();

        let artifacts = match self.load_artifacts().await {
            Ok(artifacts) => artifacts,
            Err(e) => {
                tracing::debug!(dir = %self.artifacts_dir.display(), reason = %e, "ZK artifacts unavailable");
                return StageOutcome::fallback(
                    mock_proof(inputs, prediction, now),
                    format!("ZK artifacts not found: {}", e),
                );
            }
        };
        tracing::debug!(
            pk = %artifacts.proving_key.display(),
            vk = %artifacts.verification_key.display(),
            "ZK artifacts loaded"
        );

        match self.request_proof(inputs, prediction).await {
            Ok(proof) => StageOutcome::Real(proof),
            Err(e) => {
                tracing::warn!(error = %e, "Real proof generation failed");
                StageOutcome::fallback(
                    mock_proof(inputs, prediction, now),
                    format!("real proof generation failed: {}", e),
                )
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::errors::AdapterErrorKind;
    use crate::pipeline::normalize::is_strict_proof_hex;
    use axum::{Json, Router, http::StatusCode, routing::post};
    use serde_json::{Value, json};
    use std::fs;
    use tempfile::tempdir;

    async fn serve(app: Router) -> String {
        let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();
        tokio::spawn(async move {
            axum::serve(listener, app).await.unwrap();
        });
        format!("http://{}", addr)
    }

    fn write_artifacts(dir: &Path) {
        fs::write(dir.join(SETTINGS_FILE), r#"{"run_args": {"logrows": 17}}"#).unwrap();
        fs::write(dir.join(PROVING_KEY_FILE), b"pk-bytes").unwrap();
        fs::write(dir.join(VERIFICATION_KEY_FILE), b"vk-bytes").unwrap();
    }

    #[test]
    fn test_mock_proof_encodes_values() {
        let proof = mock_proof(&Inputs([0.45, 24.0, 1.2]), 2693.0, 1_700_000_123_456);
        // 450, 24000, 1200, 2693000, 123456
        assert_eq!(
            proof.proof_hex,
            concat!("0x", "000001c2", "00005dc0", "000004b0", "00291788", "0001e240")
        );
        assert_eq!(proof.size_bytes, 4096);
        assert_eq!(proof.provenance, Provenance::Mock);
    }

    #[test]
    fn test_mock_proof_negative_values_stay_hex() {
        let proof = mock_proof(&Inputs([-1.0, -0.0005, 0.0]), -5.0, 42);
        assert!(is_strict_proof_hex(&proof.proof_hex));
        assert!(proof.proof_hex.starts_with("0xfffffc18"));
        assert_eq!(proof.proof_hex.len(), 2 + 40);
    }

    #[tokio::test]
    async fn test_mock_adapter_always_falls_back() {
        let outcome = MockProofAdapter.generate(&Inputs([0.45, 24.0, 1.2]), 2693.0).await;
        assert_eq!(outcome.provenance(), Provenance::Mock);
        assert_eq!(outcome.value().provenance, Provenance::Mock);
        assert!(outcome.value().proof_hex.starts_with("0x000001c200005dc0"));
    }

    #[tokio::test]
    async fn test_load_artifacts_reports_first_missing() {
        let dir = tempdir().unwrap();
        let adapter = EzklProofAdapter::new(dir.path(), "http://127.0.0.1:1");
        let err = adapter.load_artifacts().await.unwrap_err();
        assert_eq!(err.kind(), AdapterErrorKind::Unavailable);
        assert!(err.to_string().contains("settings.json"));

        fs::write(dir.path().join(SETTINGS_FILE), "{}").unwrap();
        fs::write(dir.path().join(PROVING_KEY_FILE), b"pk").unwrap();
        fs::write(dir.path().join(VERIFICATION_KEY_FILE), b"").unwrap();
        let err = adapter.load_artifacts().await.unwrap_err();
        assert!(err.to_string().contains("vk.key"));
    }

    #[tokio::test]
    async fn test_load_artifacts_rejects_invalid_settings() {
        let dir = tempdir().unwrap();
        write_artifacts(dir.path());
        fs::write(dir.path().join(SETTINGS_FILE), "{not json").unwrap();
        let adapter = EzklProofAdapter::new(dir.path(), "http://127.0.0.1:1");
        assert!(adapter.load_artifacts().await.is_err());
    }

    #[tokio::test]
    async fn test_missing_artifacts_yield_mock() {
        let dir = tempdir().unwrap();
        let adapter = EzklProofAdapter::new(dir.path(), "http://127.0.0.1:1");
        let outcome = adapter.generate(&Inputs([1.0, 2.0, 3.0]), 2000.0).await;
        assert_eq!(outcome.provenance(), Provenance::Mock);
        assert!(outcome.fallback_reason().unwrap().contains("ZK artifacts not found"));
        assert!(is_strict_proof_hex(&outcome.value().proof_hex));
    }

    #[tokio::test]
    async fn test_real_proof_from_api() {
        let app = Router::new().route(
            "/generate-proof",
            post(|Json(body): Json<Value>| async move {
                assert_eq!(body["inputs"], json!([1.0, 2.0, 3.0]));
                assert_eq!(body["prediction"], json!(2000.5));
                Json(json!({"proof": "0xABCDEF0123", "proofSize": 5}))
            }),
        );
        let dir = tempdir().unwrap();
        write_artifacts(dir.path());
        let adapter = EzklProofAdapter::new(dir.path(), serve(app).await);

        let outcome = adapter.generate(&Inputs([1.0, 2.0, 3.0]), 2000.5).await;
        assert_eq!(outcome.provenance(), Provenance::Real);
        let proof = outcome.into_value();
        assert_eq!(proof.proof_hex, "0xABCDEF0123");
        assert_eq!(proof.size_bytes, 5);
        assert_eq!(proof.provenance, Provenance::Real);
    }

    #[tokio::test]
    async fn test_missing_proof_size_is_derived() {
        let app = Router::new().route(
            "/generate-proof",
            post(|| async { Json(json!({"proof": "0xaabbccdd (extra text)"})) }),
        );
        let dir = tempdir().unwrap();
        write_artifacts(dir.path());
        let adapter = EzklProofAdapter::new(dir.path(), serve(app).await);
        let proof = adapter.generate(&Inputs::default(), 0.0).await.into_value();
        assert_eq!(proof.size_bytes, 4);
    }

    #[tokio::test]
    async fn test_api_error_yields_mock() {
        let app = Router::new().route(
            "/generate-proof",
            post(|| async { (StatusCode::SERVICE_UNAVAILABLE, "busy") }),
        );
        let dir = tempdir().unwrap();
        write_artifacts(dir.path());
        let adapter = EzklProofAdapter::new(dir.path(), serve(app).await);
        let outcome = adapter.generate(&Inputs::default(), 1.0).await;
        assert_eq!(outcome.provenance(), Provenance::Mock);
        assert!(outcome.fallback_reason().unwrap().contains("503"));
        assert_eq!(outcome.value().size_bytes, 4096);
    }

    #[tokio::test]
    async fn test_empty_proof_yields_mock() {
        let app = Router::new().route(
            "/generate-proof",
            post(|| async { Json(json!({"proof": "  "})) }),
        );
        let dir = tempdir().unwrap();
        write_artifacts(dir.path());
        let adapter = EzklProofAdapter::new(dir.path(), serve(app).await);
        let outcome = adapter.generate(&Inputs::default(), 1.0).await;
        assert_eq!(outcome.provenance(), Provenance::Mock);
    }
}
