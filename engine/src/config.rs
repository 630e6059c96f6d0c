//! # Vault Configuration & Constants
//!
//! Every scaling factor the vault uses lives here, together with the
//! construction-time [`VaultInit`] parameters. If a conversion somewhere
//! else multiplies by a literal power of ten, it should be using one of
//! these instead.
//!
//! ## Scales
//!
//! ```text
//! price   : assets-per-share, scaled by PRICE_SCALE (10^18)
//! shares  : 30-decimal units; 1 asset unit at price 1.0 = 10^12 share units
//! fee     : parts per FEE_DENOMINATOR (1000), so 1 = 0.1%
//! ```
//!
//! `shares = effective_assets * SHARE_SCALE / price` and
//! `assets = shares * price / SHARE_SCALE`.

use alloy_primitives::{Address, U256};
use serde::{Deserialize, Serialize};
use thiserror::Error;

// ---------------------------------------------------------------------------
// Fixed-Point Scales
// ---------------------------------------------------------------------------

/// Scale applied to `price_per_share`. A stored price of `10^18` means one
/// unit of the underlying asset buys one share unit-for-unit.
pub const PRICE_SCALE: u128 = 1_000_000_000_000_000_000;

/// Scale used when turning an asset amount into shares. Chosen so that at
/// `price == PRICE_SCALE` one asset base unit yields `10^12` share base units
/// (18-decimal asset, 30-decimal share).
pub const SHARE_SCALE: u128 = 1_000_000_000_000_000_000_000_000_000_000;

/// Decimals of the underlying asset the scales above are calibrated for.
pub const ASSET_DECIMALS: u8 = 18;

/// Decimals reported by the share token.
pub const SHARE_DECIMALS: u8 = 30;

/// Price the vault starts at unless [`VaultInit::initial_price`] overrides it.
pub const INITIAL_PRICE: u128 = PRICE_SCALE;

// ---------------------------------------------------------------------------
// Fee Parameters
// ---------------------------------------------------------------------------

/// Denominator of the fee. Fees are expressed in parts per thousand.
pub const FEE_DENOMINATOR: u64 = 1_000;

/// Upper bound accepted by `set_fee`: 1000/1000, i.e. the whole deposit.
pub const MAX_FEE_BPS: u64 = 1_000;

/// Fee the vault starts with: 1/1000 = 0.1%.
pub const DEFAULT_FEE_BPS: u64 = 1;

// ---------------------------------------------------------------------------
// Runtime
// ---------------------------------------------------------------------------

/// Capacity of the event broadcast channel. Subscribers that fall further
/// behind than this lose the oldest records and must catch up by polling.
pub const EVENT_CHANNEL_CAPACITY: usize = 1_024;

/// Returns [`PRICE_SCALE`] as a `U256`.
pub fn price_scale() -> U256 {
    U256::from(PRICE_SCALE)
}

/// Returns [`SHARE_SCALE`] as a `U256`.
pub fn share_scale() -> U256 {
    U256::from(SHARE_SCALE)
}

// ---------------------------------------------------------------------------
// Construction Parameters
// ---------------------------------------------------------------------------

/// Errors raised while loading or validating a [`VaultInit`].
#[derive(Debug, Error)]
pub enum ConfigError {
    /// The configuration document could not be parsed.
    #[error("invalid vault configuration: {0}")]
    Parse(#[from] serde_json::Error),

    /// A required address was left as the zero address.
    #[error("{field} must not be the zero address")]
    ZeroAddress {
        /// Name of the offending field.
        field: &'static str,
    },

    /// The share token name or symbol was empty.
    #[error("{field} must not be empty")]
    Empty {
        /// Name of the offending field.
        field: &'static str,
    },

    /// The initial fee exceeded [`MAX_FEE_BPS`].
    #[error("initial fee {0} exceeds maximum of {MAX_FEE_BPS}")]
    FeeOutOfRange(u64),

    /// The initial price was zero.
    #[error("initial price must be nonzero")]
    ZeroPrice,

    /// The asset ledger handed to the vault is not the configured asset.
    #[error("asset mismatch: configured {expected}, ledger is {actual}")]
    AssetMismatch {
        /// Asset named in the configuration.
        expected: Address,
        /// Address reported by the ledger.
        actual: Address,
    },
}

/// Construction-time configuration of a vault.
///
/// Mirrors what a deployer supplies once: where the vault's custody account
/// lives, which asset it accepts, how the share token is named, and who
/// holds the two bootstrap roles.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct VaultInit {
    /// The vault's own account in the asset and share ledgers. Escrowed
    /// assets and shares are held here.
    pub vault_address: Address,
    /// Address of the underlying asset token.
    pub asset: Address,
    /// Share token name (e.g. "TestVault").
    pub name: String,
    /// Share token symbol (e.g. "TVT").
    pub symbol: String,
    /// Account granted the `Admin` role at construction.
    pub admin: Address,
    /// Account granted the `PriceSetter` role at construction.
    pub price_setter: Address,
    /// Starting fee; defaults to [`DEFAULT_FEE_BPS`].
    #[serde(default)]
    pub initial_fee_bps: Option<u64>,
    /// Starting price; defaults to [`INITIAL_PRICE`].
    #[serde(default)]
    pub initial_price: Option<U256>,
}

impl VaultInit {
    /// Builds a configuration with default fee and price.
    pub fn new(
        vault_address: Address,
        asset: Address,
        name: impl Into<String>,
        symbol: impl Into<String>,
        admin: Address,
        price_setter: Address,
    ) -> Self {
        Self {
            vault_address,
            asset,
            name: name.into(),
            symbol: symbol.into(),
            admin,
            price_setter,
            initial_fee_bps: None,
            initial_price: None,
        }
    }

    /// Parses and validates a JSON configuration document.
    pub fn from_json_str(doc: &str) -> Result<Self, ConfigError> {
        let init: VaultInit = serde_json::from_str(doc)?;
        init.validate()?;
        Ok(init)
    }

    /// Checks every field a vault cannot start without.
    pub fn validate(&self) -> Result<(), ConfigError> {
        for (field, addr) in [
            ("vault_address", self.vault_address),
            ("asset", self.asset),
            ("admin", self.admin),
            ("price_setter", self.price_setter),
        ] {
            if addr == Address::ZERO {
                return Err(ConfigError::ZeroAddress { field });
            }
        }
        if self.name.trim().is_empty() {
            return Err(ConfigError::Empty { field: "name" });
        }
        if self.symbol.trim().is_empty() {
            return Err(ConfigError::Empty { field: "symbol" });
        }
        let fee = self.fee_bps();
        if fee > MAX_FEE_BPS {
            return Err(ConfigError::FeeOutOfRange(fee));
        }
        if self.price().is_zero() {
            return Err(ConfigError::ZeroPrice);
        }
        Ok(())
    }

    /// Effective starting fee.
    pub fn fee_bps(&self) -> u64 {
        self.initial_fee_bps.unwrap_or(DEFAULT_FEE_BPS)
    }

    /// Effective starting price.
    pub fn price(&self) -> U256 {
        self.initial_price.unwrap_or_else(|| U256::from(INITIAL_PRICE))
    }
}
