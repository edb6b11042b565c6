//! Decimal-string ⇄ base-unit conversions for token amounts. No floats.

use alloy::primitives::U256;
use eyre::Context as _;

pub const NATIVE_DECIMALS: u8 = 18;

fn scale(decimals: u8) -> eyre::Result<U256> {
    U256::from(10_u64)
        .checked_pow(U256::from(decimals))
        .ok_or_else(|| eyre::eyre!("decimals too large"))
}

/// Parse a base-unit integer such as `"1500000"`.
pub fn parse_base_amount(s: &str) -> eyre::Result<U256> {
    let s = s.trim();
    if s.is_empty() {
        eyre::bail!("empty amount");
    }
    s.parse::<U256>().context("parse base amount")
}

/// Parse a UI amount such as `"1.5"` into base units for a token with `decimals`.
pub fn parse_ui_amount(s: &str, decimals: u8) -> eyre::Result<U256> {
    let s = s.trim();
    if s.is_empty() {
        eyre::bail!("empty amount");
    }
    if s.starts_with('-') {
        eyre::bail!("amount must be non-negative");
    }
    let (whole, frac) = s.split_once('.').unwrap_or((s, ""));
    if frac.len() > usize::from(decimals) {
        eyre::bail!("too many decimal places for token (decimals={decimals})");
    }

    let whole_v = if whole.is_empty() {
        U256::ZERO
    } else {
        whole.parse::<U256>().context("parse whole")?
    };
    let frac_padded = format!("{frac:0<width$}", width = usize::from(decimals));
    let frac_v = if frac_padded.is_empty() {
        U256::ZERO
    } else {
        frac_padded.parse::<U256>().context("parse fractional")?
    };

    whole_v
        .checked_mul(scale(decimals)?)
        .and_then(|x| x.checked_add(frac_v))
        .ok_or_else(|| eyre::eyre!("amount overflow"))
}

/// Format base units as a trimmed decimal string: `1500000` at 6 decimals is `"1.5"`.
pub fn format_ui_amount(base: U256, decimals: u8) -> eyre::Result<String> {
    if decimals == 0 {
        return Ok(base.to_string());
    }
    let scale = scale(decimals)?;
    let whole = base / scale;
    let frac = base % scale;
    if frac.is_zero() {
        return Ok(whole.to_string());
    }
    let frac_s = format!("{frac:0>width$}", frac = frac.to_string(), width = usize::from(decimals));
    Ok(format!("{whole}.{}", frac_s.trim_end_matches('0')))
}

/// Accept either a UI amount (`"1.5"`, needs `decimals`) or raw base units (`"1500000"`).
pub fn parse_amount_arg(s: &str, decimals: Option<u8>) -> eyre::Result<U256> {
    match decimals {
        Some(d) => parse_ui_amount(s, d),
        None => parse_base_amount(s),
    }
}
