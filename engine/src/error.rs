//! Error types for the vault engine.
//!
//! Every fallible vault operation returns a [`VaultError`]. A failed call
//! leaves the ledger exactly as it found it and emits no event; callers
//! decide whether to retry. [`VaultError::kind`] groups the variants into
//! the five categories callers usually branch on.

use alloy_primitives::{Address, U256};
use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::access::Role;
use crate::config::ConfigError;
use crate::ledger::asset::AssetError;
use crate::ledger::requests::RequestKind;
use crate::ledger::shares::ShareError;
use crate::math::MathError;

/// Coarse classification of a [`VaultError`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum ErrorKind {
    /// A role or operator check failed.
    Unauthorized,
    /// The request slot was not in the state the operation needs.
    InvalidState,
    /// An argument was rejected before any state was read.
    InvalidInput,
    /// Something the call depends on is blocked or exhausted.
    ResourceUnavailable,
    /// A checked computation did not fit.
    ArithmeticOverflow,
}

/// Errors returned by vault operations.
#[derive(Debug, Error)]
pub enum VaultError {
    /// The caller does not hold the role the operation requires.
    #[error("unauthorized: {account} does not hold role {role}")]
    MissingRole {
        /// The account that attempted the call.
        account: Address,
        /// The role that was required.
        role: Role,
    },

    /// The caller is neither the owner nor one of its approved operators.
    #[error("unauthorized: {caller} is not {owner} or an approved operator")]
    NotOperator {
        /// The account that attempted the call.
        caller: Address,
        /// The account on whose behalf it tried to act.
        owner: Address,
    },

    /// The controller already has an open request of this kind.
    #[error("pending {kind} request exists for {controller}")]
    PendingRequestExists {
        /// Controller of the existing request.
        controller: Address,
        /// Deposit or redeem.
        kind: RequestKind,
    },

    /// Cancellation needs a pending request and there is none.
    #[error("no pending {kind} request for {controller}")]
    NoPendingRequest {
        /// Controller that was looked up.
        controller: Address,
        /// Deposit or redeem.
        kind: RequestKind,
    },

    /// Fulfillment found no open request with exactly the given amount.
    #[error("no {kind} request for {controller} matching {requested}")]
    NoMatchingRequest {
        /// Controller that was looked up.
        controller: Address,
        /// Deposit or redeem.
        kind: RequestKind,
        /// The amount the fulfiller asked for.
        requested: U256,
    },

    /// `pause` was called while already paused, or `unpause` while running.
    #[error("vault is not paused")]
    NotPaused,

    /// Amounts must be strictly positive.
    #[error("amount must be greater than zero")]
    ZeroAmount,

    /// An address argument was the zero address.
    #[error("{field} must not be the zero address")]
    ZeroAddress {
        /// Name of the offending argument.
        field: &'static str,
    },

    /// The fee is above the permitted maximum.
    #[error("fee {0} out of range (max 1000)")]
    FeeOutOfRange(u64),

    /// The price is zero.
    #[error("price must be nonzero")]
    InvalidPrice,

    /// Perform data handed to `perform_upkeep` could not be decoded.
    #[error("invalid perform data: {0}")]
    InvalidPerformData(String),

    /// The vault could not be constructed from its configuration.
    #[error(transparent)]
    InvalidConfig(#[from] ConfigError),

    /// The vault is paused.
    #[error("contract paused")]
    ContractPaused,

    /// The share sender is frozen.
    #[error("sender frozen: {0}")]
    SenderFrozen(Address),

    /// Moving the underlying asset failed (balance or allowance).
    #[error("asset transfer failed: {0}")]
    AssetTransferFailed(#[source] AssetError),

    /// The share holder does not have enough shares.
    #[error("insufficient shares: {account} has {available}, needs {requested}")]
    InsufficientShares {
        /// The share holder.
        account: Address,
        /// Current balance.
        available: U256,
        /// Amount the call needed.
        requested: U256,
    },

    /// The spender's share allowance is too small.
    #[error("insufficient share allowance: {spender} may spend {allowance} of {owner}, needs {requested}")]
    InsufficientAllowance {
        /// The share holder.
        owner: Address,
        /// The account spending on the holder's behalf.
        spender: Address,
        /// Remaining allowance.
        allowance: U256,
        /// Amount the call needed.
        requested: U256,
    },

    /// A checked computation overflowed.
    #[error("arithmetic overflow")]
    ArithmeticOverflow,
}

impl VaultError {
    /// Returns the category this error belongs to.
    pub fn kind(&self) -> ErrorKind {
        match self {
            VaultError::MissingRole { .. } | VaultError::NotOperator { .. } => {
                ErrorKind::Unauthorized
            }
            VaultError::PendingRequestExists { .. }
            | VaultError::NoPendingRequest { .. }
            | VaultError::NoMatchingRequest { .. }
            | VaultError::NotPaused => ErrorKind::InvalidState,
            VaultError::ZeroAmount
            | VaultError::ZeroAddress { .. }
            | VaultError::FeeOutOfRange(_)
            | VaultError::InvalidPrice
            | VaultError::InvalidPerformData(_)
            | VaultError::InvalidConfig(_) => ErrorKind::InvalidInput,
            VaultError::ContractPaused
            | VaultError::SenderFrozen(_)
            | VaultError::AssetTransferFailed(_)
            | VaultError::InsufficientShares { .. }
            | VaultError::InsufficientAllowance { .. } => ErrorKind::ResourceUnavailable,
            VaultError::ArithmeticOverflow => ErrorKind::ArithmeticOverflow,
        }
    }
}

impl From<MathError> for VaultError {
    fn from(err: MathError) -> Self {
        match err {
            MathError::Overflow => VaultError::ArithmeticOverflow,
            MathError::InvalidPrice => VaultError::InvalidPrice,
        }
    }
}

impl From<AssetError> for VaultError {
    fn from(err: AssetError) -> Self {
        match err {
            AssetError::Overflow => VaultError::ArithmeticOverflow,
            other => VaultError::AssetTransferFailed(other),
        }
    }
}

impl From<ShareError> for VaultError {
    fn from(err: ShareError) -> Self {
        match err {
            ShareError::InsufficientBalance {
                account,
                balance,
                amount,
            } => VaultError::InsufficientShares {
                account,
                available: balance,
                requested: amount,
            },
            ShareError::InsufficientAllowance {
                owner,
                spender,
                allowance,
                amount,
            } => VaultError::InsufficientAllowance {
                owner,
                spender,
                allowance,
                requested: amount,
            },
            ShareError::Overflow => VaultError::ArithmeticOverflow,
        }
    }
}

/// Convenience alias used throughout the engine.
pub type VaultResult<T> = Result<T, VaultError>;
