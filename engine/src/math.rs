//! # Fixed-Point Conversions
//!
//! Exact integer math between asset amounts and share amounts. There is no
//! floating point anywhere in the vault; everything is `U256` with checked
//! operations, because an intermediate `assets * 10^30` overflows `u128` for
//! perfectly ordinary deposits.
//!
//! ## Rounding
//!
//! Every division truncates. The fee is rounded down (the depositor keeps
//! the dust), but the share and asset conversions are also rounded down, so
//! any precision loss lands in the vault's favour. There is no rounding-up
//! path.

use alloy_primitives::U256;
use thiserror::Error;

use crate::config::{share_scale, FEE_DENOMINATOR};

/// Errors from the conversion functions.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Error)]
pub enum MathError {
    /// An intermediate product did not fit in 256 bits.
    #[error("arithmetic overflow")]
    Overflow,

    /// The price was zero, which would divide by zero.
    #[error("price must be nonzero")]
    InvalidPrice,
}

/// The part of `assets` withheld as fee: `floor(assets * fee_bps / 1000)`.
pub fn fee_amount(assets: U256, fee_bps: u64) -> Result<U256, MathError> {
    assets
        .checked_mul(U256::from(fee_bps))
        .map(|scaled| scaled / U256::from(FEE_DENOMINATOR))
        .ok_or(MathError::Overflow)
}

/// Assets left after the fee: `assets - fee_amount(assets, fee_bps)`.
///
/// A fee above 100% would make this negative; that is reported as overflow
/// rather than clamped.
pub fn assets_after_fee(assets: U256, fee_bps: u64) -> Result<U256, MathError> {
    let fee = fee_amount(assets, fee_bps)?;
    assets.checked_sub(fee).ok_or(MathError::Overflow)
}

/// Shares minted for a deposit of `assets` at `price` with `fee_bps` taken.
///
/// `shares = (assets - fee) * SHARE_SCALE / price`
pub fn shares_for_assets(assets: U256, price: U256, fee_bps: u64) -> Result<U256, MathError> {
    if price.is_zero() {
        return Err(MathError::InvalidPrice);
    }
    let effective = assets_after_fee(assets, fee_bps)?;
    effective
        .checked_mul(share_scale())
        .map(|scaled| scaled / price)
        .ok_or(MathError::Overflow)
}

/// Assets released for redeeming `shares` at `price`. No fee on this leg.
///
/// `assets = shares * price / SHARE_SCALE`
pub fn assets_for_shares(shares: U256, price: U256) -> Result<U256, MathError> {
    if price.is_zero() {
        return Err(MathError::InvalidPrice);
    }
    shares
        .checked_mul(price)
        .map(|scaled| scaled / share_scale())
        .ok_or(MathError::Overflow)
}
