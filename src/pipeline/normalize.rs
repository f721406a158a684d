//! Input and proof-text normalization.

use std::sync::LazyLock;

use regex::Regex;
use zkguard_common::{Inputs, RawInputs};

/// Strict form of a stored proof.
pub static PROOF_HEX_RE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"^0x[0-9a-f]+$").expect("proof regex is a valid static pattern"));

/// Parse the leading decimal literal of a user-typed field.
///
/// Leading whitespace is skipped and anything after the literal is ignored
/// (`"12abc"` is 12). Empty, unparsable and non-finite values become `0.0`.
pub fn parse_numeric_field(raw: &str) -> f64 {
    let text = raw.trim_start();
    let bytes = text.as_bytes();
    let mut end = 0;

    if matches!(bytes.first(), Some(b'+') | Some(b'-')) {
        end += 1;
    }

    let int_start = end;
    while end < bytes.len() && bytes[end].is_ascii_digit() {
        end += 1;
    }
    let mut digits = end - int_start;

    if end < bytes.len() && bytes[end] == b'.' {
        let frac_start = end + 1;
        let mut frac_end = frac_start;
        while frac_end < bytes.len() && bytes[frac_end].is_ascii_digit() {
            frac_end += 1;
        }
        digits += frac_end - frac_start;
        if digits > 0 {
            end = frac_end;
        }
    }

    if digits == 0 {
        return 0.0;
    }

    // Exponent only counts if at least one digit follows it.
    if end < bytes.len() && matches!(bytes[end], b'e' | b'E') {
        let mut exp_end = end + 1;
        if exp_end < bytes.len() && matches!(bytes[exp_end], b'+' | b'-') {
            exp_end += 1;
        }
        let exp_digits_start = exp_end;
        while exp_end < bytes.len() && bytes[exp_end].is_ascii_digit() {
            exp_end += 1;
        }
        if exp_end > exp_digits_start {
            end = exp_end;
        }
    }

    match text[..end].parse::<f64>() {
        Ok(value) if value.is_finite() => value,
        _ => 0.0,
    }
}

pub fn normalize_inputs(raw: &RawInputs) -> Inputs {
    Inputs([
        parse_numeric_field(&raw.btc_vol),
        parse_numeric_field(&raw.eth_gas),
        parse_numeric_field(&raw.volume),
    ])
}

/// Reduce adapter proof text to strict `0x` + lowercase hex.
///
/// Only the first whitespace-separated token is kept, one `0x` prefix is
/// stripped plus a duplicated one if present. Returns `None` if nothing
/// hex-shaped remains.
pub fn normalize_proof_text(raw: &str) -> Option<String> {
    let token = raw.split_whitespace().next()?;
    let body = strip_hex_prefix(token);
    let body = strip_hex_prefix(body);
    if body.is_empty() || !body.chars().all(|c| c.is_ascii_hexdigit()) {
        return None;
    }
    Some(format!("0x{}", body.to_ascii_lowercase()))
}

fn strip_hex_prefix(s: &str) -> &str {
    s.strip_prefix("0x")
        .or_else(|| s.strip_prefix("0X"))
        .unwrap_or(s)
}

pub fn is_strict_proof_hex(s: &str) -> bool {
    PROOF_HEX_RE.is_match(s)
}
