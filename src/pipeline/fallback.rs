//! Deterministic stand-ins used when a real stage result is unavailable.

use sha2::{Digest, Sha256};
use uuid::Uuid;
use zkguard_common::{Inputs, MOCK_PROOF_SIZE_BYTES, ProofArtifact, Provenance};

/// Hex characters in a mock transaction id, after the `0x`.
pub const MOCK_TX_HEX_LEN: usize = 40;

/// Hex characters in the orchestrator's own fallback proof.
pub const FALLBACK_PROOF_HEX_LEN: usize = 64;

/// Linear stand-in for the price model, unclamped. Huge inputs overflow to
/// an infinity or NaN.
pub fn linear_prediction(inputs: &Inputs) -> f64 {
    let [btc_vol, eth_gas, volume] = inputs.as_array();
    btc_vol * 100.0 + eth_gas * 2.0 + volume * 500.0 + 2000.0
}

/// `linear_prediction` kept finite: overflow saturates to `f64::MAX`/`f64::MIN`,
/// NaN becomes 0.0. Stored predictions must survive a JSON round-trip.
pub fn fallback_prediction(inputs: &Inputs) -> f64 {
    let raw = linear_prediction(inputs);
    if raw.is_nan() {
        0.0
    } else {
        raw.clamp(f64::MIN, f64::MAX)
    }
}

/// `len` pseudo-random lowercase hex characters.
pub fn random_hex(len: usize) -> String {
    let mut out = String::with_capacity(len + 64);
    while out.len() < len {
        let mut hasher = Sha256::new();
        hasher.update(Uuid::new_v4().as_bytes());
        hasher.update(
            chrono::Utc::now()
                .timestamp_nanos_opt()
                .unwrap_or_default()
                .to_le_bytes(),
        );
        out.push_str(&hex::encode(hasher.finalize()));
    }
    out.truncate(len);
    out
}

/// `0x` + 40 hex characters, shaped like an address-length tx id.
pub fn mock_tx_hash() -> String {
    format!("0x{}", random_hex(MOCK_TX_HEX_LEN))
}

/// Proof substituted when the adapter's text cannot be normalized.
pub fn fallback_proof() -> ProofArtifact {
    ProofArtifact {
        proof_hex: format!("0x{}", random_hex(FALLBACK_PROOF_HEX_LEN)),
        size_bytes: MOCK_PROOF_SIZE_BYTES,
        provenance: Provenance::Mock,
    }
}
