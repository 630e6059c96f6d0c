//! # Underlying Asset Ledger
//!
//! The vault never owns the asset token; it only asks it to move balances.
//! [`AssetLedger`] is that seam. [`Erc20Ledger`] is an in-memory
//! implementation with ERC-20 semantics (balances, allowances, `transferFrom`
//! spending the allowance) used by tests and the keeper simulation.
//!
//! Every transfer either fully succeeds or leaves both balances untouched.

use std::collections::HashMap;

use alloy_primitives::{Address, U256};
use serde::{Deserialize, Serialize};
use thiserror::Error;

/// Errors raised by an asset ledger.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum AssetError {
    /// The sender does not hold enough of the asset.
    #[error("insufficient balance: {account} has {balance}, needs {amount}")]
    InsufficientBalance {
        /// The debited account.
        account: Address,
        /// Its balance before the failed transfer.
        balance: U256,
        /// The amount that was requested.
        amount: U256,
    },

    /// The spender's allowance is too small.
    #[error("insufficient allowance: {spender} may spend {allowance} of {owner}, needs {amount}")]
    InsufficientAllowance {
        /// The account whose tokens would move.
        owner: Address,
        /// The account trying to move them.
        spender: Address,
        /// Remaining allowance.
        allowance: U256,
        /// The amount that was requested.
        amount: U256,
    },

    /// A credit would overflow the recipient balance or total supply.
    #[error("asset balance overflow")]
    Overflow,
}

/// Operations the vault needs from the underlying asset token.
pub trait AssetLedger: Send + Sync {
    /// Address of the asset token.
    fn address(&self) -> Address;

    /// Balance held by `account`.
    fn balance_of(&self, account: Address) -> U256;

    /// Amount `spender` may still pull from `owner`.
    fn allowance(&self, owner: Address, spender: Address) -> U256;

    /// Moves `amount` from `from` to `to` on `from`'s own authority.
    fn transfer(&mut self, from: Address, to: Address, amount: U256) -> Result<(), AssetError>;

    /// Moves `amount` from `from` to `to`, spending `spender`'s allowance.
    fn transfer_from(
        &mut self,
        spender: Address,
        from: Address,
        to: Address,
        amount: U256,
    ) -> Result<(), AssetError>;
}

/// In-memory ERC-20 style token.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Erc20Ledger {
    address: Address,
    name: String,
    symbol: String,
    total_supply: U256,
    balances: HashMap<Address, U256>,
    allowances: HashMap<Address, HashMap<Address, U256>>,
}

impl Erc20Ledger {
    /// Creates an empty token at `address`.
    pub fn new(address: Address, name: impl Into<String>, symbol: impl Into<String>) -> Self {
        Self {
            address,
            name: name.into(),
            symbol: symbol.into(),
            total_supply: U256::ZERO,
            balances: HashMap::new(),
            allowances: HashMap::new(),
        }
    }

    /// Token name.
    pub fn name(&self) -> &str {
        &self.name
    }

    /// Token symbol.
    pub fn symbol(&self) -> &str {
        &self.symbol
    }

    /// Total minted supply.
    pub fn total_supply(&self) -> U256 {
        self.total_supply
    }

    /// Creates `amount` new tokens for `to`.
    pub fn mint_to(&mut self, to: Address, amount: U256) -> Result<(), AssetError> {
        let supply = self
            .total_supply
            .checked_add(amount)
            .ok_or(AssetError::Overflow)?;
        let balance = self
            .balance_of(to)
            .checked_add(amount)
            .ok_or(AssetError::Overflow)?;
        self.total_supply = supply;
        self.balances.insert(to, balance);
        Ok(())
    }

    /// Sets `spender`'s allowance over `owner`'s tokens to `amount`.
    pub fn approve(&mut self, owner: Address, spender: Address, amount: U256) {
        self.allowances
            .entry(owner)
            .or_default()
            .insert(spender, amount);
    }

    fn move_balance(&mut self, from: Address, to: Address, amount: U256) -> Result<(), AssetError> {
        let from_balance = self.balance_of(from);
        if from_balance < amount {
            return Err(AssetError::InsufficientBalance {
                account: from,
                balance: from_balance,
                amount,
            });
        }
        if from == to {
            return Ok(());
        }
        let to_balance = self
            .balance_of(to)
            .checked_add(amount)
            .ok_or(AssetError::Overflow)?;
        self.balances.insert(from, from_balance - amount);
        self.balances.insert(to, to_balance);
        Ok(())
    }
}

impl AssetLedger for Erc20Ledger {
    fn address(&self) -> Address {
        self.address
    }

    fn balance_of(&self, account: Address) -> U256 {
        self.balances.get(&account).copied().unwrap_or(U256::ZERO)
    }

    fn allowance(&self, owner: Address, spender: Address) -> U256 {
        self.allowances
            .get(&owner)
            .and_then(|m| m.get(&spender))
            .copied()
            .unwrap_or(U256::ZERO)
    }

    fn transfer(&mut self, from: Address, to: Address, amount: U256) -> Result<(), AssetError> {
        self.move_balance(from, to, amount)
    }

    fn transfer_from(
        &mut self,
        spender: Address,
        from: Address,
        to: Address,
        amount: U256,
    ) -> Result<(), AssetError> {
        let allowance = self.allowance(from, spender);
        if allowance < amount {
            return Err(AssetError::InsufficientAllowance {
                owner: from,
                spender,
                allowance,
                amount,
            });
        }
        self.move_balance(from, to, amount)?;
        // Unlimited approvals are never decremented.
        if allowance != U256::MAX {
            self.approve(from, spender, allowance - amount);
        }
        Ok(())
    }
}
