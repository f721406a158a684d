//! On-chain verification over Ethereum JSON-RPC.
//!
//! The node is expected to manage the signing account (a local dev node or a
//! wallet-backed RPC endpoint), so transactions go out through
//! `eth_sendTransaction` and the node may hold the call until the account
//! owner approves it.

use std::sync::atomic::{AtomicU64, Ordering};
use std::time::Duration;

use async_trait::async_trait;
use serde::Deserialize;
use serde::de::DeserializeOwned;
use serde_json::{Value, json};
use tokio::sync::OnceCell;

use super::ChainAdapter;
use crate::errors::AdapterError;

/// `bytes4(keccak256("verifyPrediction(uint256[],bytes)"))`
pub const VERIFY_PREDICTION_SELECTOR: [u8; 4] = [0x79, 0x52, 0x97, 0xff];

/// EIP-1193 "user rejected request".
const USER_REJECTED_CODE: i64 = 4001;

/// Fixed-point scale applied to instances before encoding.
const INSTANCE_SCALE: f64 = 1e18;

const WORD: usize = 32;

/// Used when no RPC endpoint or chain id is known for the configured network.
#[derive(Debug, Clone)]
pub struct UnavailableChain {
    reason: String,
}

impl UnavailableChain {
    pub fn new(reason: impl Into<String>) -> Self {
        Self {
            reason: reason.into(),
        }
    }
}

#[async_trait]
impl ChainAdapter for UnavailableChain {
    async fn verify(&self, _: &str, _: &[f64], _: &str) -> Result<String, AdapterError> {
        Err(AdapterError::Unavailable(self.reason.clone()))
    }
}

// ── ABI encoding ─────────────────────────────────────────────────────

fn encode_word(value: u128) -> [u8; WORD] {
    let mut word = [0u8; WORD];
    word[16..].copy_from_slice(&value.to_be_bytes());
    word
}

/// Scale an instance to 18 decimals and floor it into an unsigned word.
pub fn scale_instance(value: f64) -> Result<u128, AdapterError> {
    let scaled = (value * INSTANCE_SCALE).floor();
    if !scaled.is_finite() || scaled < 0.0 || scaled >= u128::MAX as f64 {
        return Err(AdapterError::Failure(format!(
            "instance {} cannot be encoded as uint256",
            value
        )));
    }
    Ok(scaled as u128)
}

/// Calldata for `verifyPrediction(uint256[] instances, bytes proof)`.
pub fn encode_verify_call(instances: &[f64], proof: &[u8]) -> Result<Vec<u8>, AdapterError> {
    let words = instances
        .iter()
        .map(|v| scale_instance(*v))
        .collect::<Result<Vec<_>, _>>()?;

    let array_offset = 2 * WORD;
    let bytes_offset = array_offset + WORD + words.len() * WORD;
    let padded_len = proof.len().div_ceil(WORD) * WORD;

    let mut data = Vec::with_capacity(4 + bytes_offset + WORD + padded_len);
    data.extend_from_slice(&VERIFY_PREDICTION_SELECTOR);
    data.extend_from_slice(&encode_word(array_offset as u128));
    data.extend_from_slice(&encode_word(bytes_offset as u128));
    data.extend_from_slice(&encode_word(words.len() as u128));
    for word in words {
        data.extend_from_slice(&encode_word(word));
    }
    data.extend_from_slice(&encode_word(proof.len() as u128));
    data.extend_from_slice(proof);
    data.resize(data.len() + (padded_len - proof.len()), 0);
    Ok(data)
}

fn decode_proof_hex(proof_hex: &str) -> Result<Vec<u8>, AdapterError> {
    let body = proof_hex.strip_prefix("0x").unwrap_or(proof_hex);
    hex::decode(body).map_err(|e| AdapterError::Failure(format!("invalid proof bytes: {}", e)))
}

fn parse_quantity(raw: &str) -> Result<u64, AdapterError> {
    let body = raw.strip_prefix("0x").unwrap_or(raw);
    u64::from_str_radix(body, 16)
        .map_err(|_| AdapterError::Failure(format!("invalid quantity '{}' from node", raw)))
}

// ── JSON-RPC client ──────────────────────────────────────────────────

#[derive(Debug, Deserialize)]
struct RpcError {
    code: i64,
    message: String,
}

#[derive(Debug, Deserialize)]
struct RpcResponse {
    #[serde(default)]
    result: Option<Value>,
    #[serde(default)]
    error: Option<RpcError>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct TransactionReceipt {
    #[serde(default)]
    transaction_hash: Option<String>,
    #[serde(default)]
    status: Option<String>,
}

/// Submits `verifyPrediction` through a JSON-RPC node and waits for the receipt.
pub struct JsonRpcChainAdapter {
    rpc_url: String,
    chain_id: u64,
    receipt_poll: Duration,
    next_id: AtomicU64,
    client: OnceCell<reqwest::Client>,
}

impl JsonRpcChainAdapter {
    pub fn new(rpc_url: impl Into<String>, chain_id: u64, receipt_poll: Duration) -> Self {
        Self {
            rpc_url: rpc_url.into(),
            chain_id,
            receipt_poll,
            next_id: AtomicU64::new(1),
            client: OnceCell::new(),
        }
    }

    async fn client(&self) -> Result<&reqwest::Client, AdapterError> {
        self.client
            .get_or_try_init(|| async {
                reqwest::Client::builder().build().map_err(|e| {
                    AdapterError::Unavailable(format!("failed to build HTTP client: {}", e))
                })
            })
            .await
    }

    async fn call<T: DeserializeOwned>(&self, method: &str, params: Value) -> Result<T, AdapterError> {
        let id = self.next_id.fetch_add(1, Ordering::Relaxed);
        tracing::debug!(method, id, "JSON-RPC call");

        let resp = self
            .client()
            .await?
            .post(&self.rpc_url)
            .json(&json!({
                "jsonrpc": "2.0",
                "id": id,
                "method": method,
                "params": params,
            }))
            .send()
            .await
            .map_err(|e| AdapterError::Unavailable(format!("{} failed: {}", method, e)))?;

        let status = resp.status();
        if !status.is_success() {
            return Err(AdapterError::Unavailable(format!(
                "{} failed: RPC node returned {}",
                method, status
            )));
        }

        let body: RpcResponse = resp
            .json()
            .await
            .map_err(|e| AdapterError::Failure(format!("{}: malformed response: {}", method, e)))?;

        if let Some(err) = body.error {
            return Err(if err.code == USER_REJECTED_CODE {
                AdapterError::UserDeclined(err.message)
            } else {
                AdapterError::Failure(format!("{}: {} (code {})", method, err.message, err.code))
            });
        }

        serde_json::from_value(body.result.unwrap_or(Value::Null))
            .map_err(|e| AdapterError::Failure(format!("{}: unexpected result: {}", method, e)))
    }

    async fn wait_for_receipt(&self, tx_hash: &str) -> Result<TransactionReceipt, AdapterError> {
        loop {
            let receipt: Option<TransactionReceipt> = self
                .call("eth_getTransactionReceipt", json!([tx_hash]))
                .await?;
            if let Some(receipt) = receipt {
                return Ok(receipt);
            }
            tokio::time::sleep(self.receipt_poll).await;
        }
    }
}

#[async_trait]
impl ChainAdapter for JsonRpcChainAdapter {
    async fn verify(
        &self,
        contract: &str,
        instances: &[f64],
        proof_hex: &str,
    ) -> Result<String, AdapterError> {
        let accounts: Vec<String> = self.call("eth_accounts", json!([])).await?;
        let from = accounts
            .into_iter()
            .next()
            .ok_or_else(|| AdapterError::Unavailable("No wallet account available".to_string()))?;

        let chain_id: String = self.call("eth_chainId", json!([])).await?;
        let chain_id = parse_quantity(&chain_id)?;
        if chain_id != self.chain_id {
            return Err(AdapterError::Failure(format!(
                "wrong network: node is on chain {}, expected {}",
                chain_id, self.chain_id
            )));
        }

        let proof = decode_proof_hex(proof_hex)?;
        let data = format!("0x{}", hex::encode(encode_verify_call(instances, &proof)?));
        let tx = json!({ "from": from, "to": contract, "data": data });

        let estimate: String = self.call("eth_estimateGas", json!([tx])).await?;
        let gas = parse_quantity(&estimate)?.saturating_mul(2);
        tracing::debug!(gas, contract, "Sending verifyPrediction");

        let mut send = tx;
        send["gas"] = Value::String(format!("{:#x}", gas));
        let tx_hash: String = self.call("eth_sendTransaction", json!([send])).await?;
        tracing::info!(tx_hash = %tx_hash, "Transaction sent, waiting for receipt");

        let receipt = self.wait_for_receipt(&tx_hash).await?;
        if receipt.status.as_deref() == Some("0x0") {
            return Err(AdapterError::Failure("transaction reverted".to_string()));
        }
        Ok(receipt.transaction_hash.unwrap_or(tx_hash))
    }
}
