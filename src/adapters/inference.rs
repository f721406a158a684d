use std::time::Duration;

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use tokio::sync::OnceCell;
use zkguard_common::Inputs;

use super::InferenceAdapter;
use crate::errors::AdapterError;

const REQUEST_TIMEOUT: Duration = Duration::from_secs(30);

/// Used when no model backend is configured.
#[derive(Debug, Default, Clone, Copy)]
pub struct UnavailableInference;

#[async_trait]
impl InferenceAdapter for UnavailableInference {
    async fn run(&self, _inputs: &Inputs) -> Result<f64, AdapterError> {
        Err(AdapterError::Unavailable(
            "no inference backend configured".to_string(),
        ))
    }
}

#[derive(Debug, Serialize)]
struct PredictRequest {
    /// Shape `[1, 3]`.
    input: Vec<Vec<f64>>,
}

#[derive(Debug, Deserialize)]
struct PredictResponse {
    /// Shape `[1, 1]`.
    output: Vec<Vec<f64>>,
}

/// Client for a model-serving backend exposing `POST /predict` and `GET /health`.
pub struct HttpInferenceAdapter {
    endpoint: String,
    client: OnceCell<reqwest::Client>,
}

impl HttpInferenceAdapter {
    pub fn new(endpoint: impl Into<String>) -> Self {
        Self {
            endpoint: endpoint.into().trim_end_matches('/').to_string(),
            client: OnceCell::new(),
        }
    }

    pub fn endpoint(&self) -> &str {
        &self.endpoint
    }

    /// The shared client, built on first use.
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
}

#[async_trait]
impl InferenceAdapter for HttpInferenceAdapter {
    async fn run(&self, inputs: &Inputs) -> Result<f64, AdapterError> {
        let url = format!("{}/predict", self.endpoint);
        tracing::debug!(endpoint = %url, inputs = %inputs, "Running inference");

        let resp = self
            .client()
            .await?
            .post(&url)
            .json(&PredictRequest {
                input: vec![inputs.to_vec()],
            })
            .send()
            .await
            .map_err(|e| AdapterError::from_http("inference request failed", e))?;

        let status = resp.status();
        if !status.is_success() {
            tracing::warn!(endpoint = %url, status = %status, "Inference backend returned error status");
            return Err(AdapterError::Failure(format!(
                "inference backend returned {}",
                status
            )));
        }

        let body: PredictResponse = resp
            .json()
            .await
            .map_err(|e| AdapterError::from_http("malformed inference response", e))?;

        let prediction = body
            .output
            .first()
            .and_then(|row| row.first())
            .copied()
            .ok_or_else(|| AdapterError::Failure("inference returned empty output".to_string()))?;

        if !prediction.is_finite() {
            return Err(AdapterError::Failure(format!(
                "inference returned non-finite output {}",
                prediction
            )));
        }
        Ok(prediction)
    }

    async fn warm_up(&self) -> Result<(), AdapterError> {
        let url = format!("{}/health", self.endpoint);
        let resp = self
            .client()
            .await?
            .get(&url)
            .send()
            .await
            .map_err(|e| AdapterError::from_http("inference health check failed", e))?;
        if !resp.status().is_success() {
            return Err(AdapterError::Failure(format!(
                "inference health check returned {}",
                resp.status()
            )));
        }
        tracing::debug!(endpoint = %url, "Inference backend ready");
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::errors::AdapterErrorKind;
    use axum::{Json, Router, http::StatusCode, routing::get, routing::post};
    use serde_json::{Value, json};

    async fn serve(app: Router) -> String {
        let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();
        tokio::spawn(async move {
            axum::serve(listener, app).await.unwrap();
        });
        format!("http://{}", addr)
    }

    #[tokio::test]
    async fn test_unavailable_inference_always_fails() {
        let err = UnavailableInference.run(&Inputs([1.0, 2.0, 3.0])).await.unwrap_err();
        assert_eq!(err.kind(), AdapterErrorKind::Unavailable);
    }

    #[tokio::test]
    async fn test_predict_sends_tensor_and_reads_output() {
        let app = Router::new().route(
            "/predict",
            post(|Json(body): Json<Value>| async move {
                assert_eq!(body, json!({"input": [[0.45, 24.0, 1.2]]}));
                Json(json!({"output": [[3120.5]]}))
            }),
        );
        let url = serve(app).await;
        let adapter = HttpInferenceAdapter::new(format!("{}/", url));
        let prediction = adapter.run(&Inputs([0.45, 24.0, 1.2])).await.unwrap();
        assert_eq!(prediction, 3120.5);
    }

    #[tokio::test]
    async fn test_error_status_is_failure() {
        let app = Router::new().route(
            "/predict",
            post(|| async { (StatusCode::INTERNAL_SERVER_ERROR, "model crashed") }),
        );
        let adapter = HttpInferenceAdapter::new(serve(app).await);
        let err = adapter.run(&Inputs::default()).await.unwrap_err();
        assert_eq!(err.kind(), AdapterErrorKind::Failure);
        assert!(err.to_string().contains("500"));
    }

    #[tokio::test]
    async fn test_empty_output_is_failure() {
        let app = Router::new().route("/predict", post(|| async { Json(json!({"output": []})) }));
        let adapter = HttpInferenceAdapter::new(serve(app).await);
        let err = adapter.run(&Inputs::default()).await.unwrap_err();
        assert_eq!(err.kind(), AdapterErrorKind::Failure);
    }

    #[tokio::test]
    async fn test_malformed_body_is_failure() {
        let app = Router::new().route("/predict", post(|| async { "not json" }));
        let adapter = HttpInferenceAdapter::new(serve(app).await);
        let err = adapter.run(&Inputs::default()).await.unwrap_err();
        assert_eq!(err.kind(), AdapterErrorKind::Failure);
    }

    #[tokio::test]
    async fn test_unreachable_backend_is_unavailable() {
        // Bind then drop to get a port nobody listens on.
        let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();
        drop(listener);
        let adapter = HttpInferenceAdapter::new(format!("http://{}", addr));
        let err = adapter.run(&Inputs::default()).await.unwrap_err();
        assert_eq!(err.kind(), AdapterErrorKind::Unavailable);
    }

    #[tokio::test]
    async fn test_warm_up_hits_health() {
        let app = Router::new().route("/health", get(|| async { "ok" }));
        let adapter = HttpInferenceAdapter::new(serve(app).await);
        adapter.warm_up().await.unwrap();
    }

    #[tokio::test]
    async fn test_warm_up_reports_missing_health_route() {
        let adapter = HttpInferenceAdapter::new(serve(Router::new()).await);
        let err = adapter.warm_up().await.unwrap_err();
        assert_eq!(err.kind(), AdapterErrorKind::Failure);
    }
}
