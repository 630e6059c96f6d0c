//! # Share Ledger
//!
//! Balances, allowances and total supply of the vault share token.
//!
//! Supply only changes through [`ShareLedger::mint`] and [`ShareLedger::burn`],
//! which are crate-private: the fulfillment paths in [`crate::vault`] are the
//! only callers. Every other movement (user transfers, escrow into and out
//! of vault custody) goes through [`ShareLedger::move_balance`], which
//! conserves the sum of balances. The invariant
//! `sum(balances) == total_supply` therefore holds after every call.

use std::collections::HashMap;

use alloy_primitives::{Address, U256};
use serde::{Deserialize, Serialize};
use thiserror::Error;

/// Errors raised by share ledger operations.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ShareError {
    /// The debited account holds fewer shares than requested.
    #[error("insufficient balance: {account} has {balance}, needs {amount}")]
    InsufficientBalance {
        /// The debited account.
        account: Address,
        /// Its current balance.
        balance: U256,
        /// The amount requested.
        amount: U256,
    },

    /// The spender's allowance is too small.
    #[error("insufficient allowance: {spender} may spend {allowance} of {owner}, needs {amount}")]
    InsufficientAllowance {
        /// The share holder.
        owner: Address,
        /// The spender.
        spender: Address,
        /// Remaining allowance.
        allowance: U256,
        /// The amount requested.
        amount: U256,
    },

    /// A credit would overflow a balance or the total supply.
    #[error("share supply overflow")]
    Overflow,
}

/// The vault share token.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ShareLedger {
    name: String,
    symbol: String,
    decimals: u8,
    total_supply: U256,
    balances: HashMap<Address, U256>,
    allowances: HashMap<Address, HashMap<Address, U256>>,
}

impl ShareLedger {
    /// Creates an empty share token.
    pub fn new(name: impl Into<String>, symbol: impl Into<String>, decimals: u8) -> Self {
        Self {
            name: name.into(),
            symbol: symbol.into(),
            decimals,
            total_supply: U256::ZERO,
            balances: HashMap::new(),
            allowances: HashMap::new(),
        }
    }

    /// Share token name.
    pub fn name(&self) -> &str {
        &self.name
    }

    /// Share token symbol.
    pub fn symbol(&self) -> &str {
        &self.symbol
    }

    /// Share token decimals.
    pub fn decimals(&self) -> u8 {
        self.decimals
    }

    /// Total shares in existence, escrowed ones included.
    pub fn total_supply(&self) -> U256 {
        self.total_supply
    }

    /// Shares held by `account`.
    pub fn balance_of(&self, account: Address) -> U256 {
        self.balances.get(&account).copied().unwrap_or(U256::ZERO)
    }

    /// Remaining allowance of `spender` over `owner`'s shares.
    pub fn allowance(&self, owner: Address, spender: Address) -> U256 {
        self.allowances
            .get(&owner)
            .and_then(|m| m.get(&spender))
            .copied()
            .unwrap_or(U256::ZERO)
    }

    /// Sum of every balance. Equal to [`total_supply`](Self::total_supply)
    /// unless something has gone badly wrong.
    pub fn sum_of_balances(&self) -> U256 {
        self.balances
            .values()
            .fold(U256::ZERO, |acc, b| acc.saturating_add(*b))
    }

    /// Fails unless `account` holds at least `amount`.
    pub fn ensure_balance(&self, account: Address, amount: U256) -> Result<(), ShareError> {
        let balance = self.balance_of(account);
        if balance < amount {
            return Err(ShareError::InsufficientBalance {
                account,
                balance,
                amount,
            });
        }
        Ok(())
    }

    /// Sets `spender`'s allowance over `owner`'s shares.
    pub fn approve(&mut self, owner: Address, spender: Address, amount: U256) {
        self.allowances
            .entry(owner)
            .or_default()
            .insert(spender, amount);
    }

    /// Checks that `spender` may move `amount` of `owner`'s shares without
    /// consuming anything.
    pub fn ensure_allowance(
        &self,
        owner: Address,
        spender: Address,
        amount: U256,
    ) -> Result<(), ShareError> {
        let allowance = self.allowance(owner, spender);
        if allowance < amount {
            return Err(ShareError::InsufficientAllowance {
                owner,
                spender,
                allowance,
                amount,
            });
        }
        Ok(())
    }

    /// Consumes `amount` of `spender`'s allowance. `U256::MAX` is unlimited.
    pub fn spend_allowance(
        &mut self,
        owner: Address,
        spender: Address,
        amount: U256,
    ) -> Result<(), ShareError> {
        self.ensure_allowance(owner, spender, amount)?;
        let allowance = self.allowance(owner, spender);
        if allowance != U256::MAX {
            self.approve(owner, spender, allowance - amount);
        }
        Ok(())
    }

    /// Moves shares between accounts. Supply is unchanged.
    pub fn move_balance(&mut self, from: Address, to: Address, amount: U256) -> Result<(), ShareError> {
        self.ensure_balance(from, amount)?;
        if from == to {
            return Ok(());
        }
        let to_balance = self
            .balance_of(to)
            .checked_add(amount)
            .ok_or(ShareError::Overflow)?;
        let from_balance = self.balance_of(from) - amount;
        self.balances.insert(from, from_balance);
        self.balances.insert(to, to_balance);
        Ok(())
    }

    /// Creates `amount` new shares for `to`.
    pub(crate) fn mint(&mut self, to: Address, amount: U256) -> Result<(), ShareError> {
        let supply = self
            .total_supply
            .checked_add(amount)
            .ok_or(ShareError::Overflow)?;
        let balance = self
            .balance_of(to)
            .checked_add(amount)
            .ok_or(ShareError::Overflow)?;
        self.total_supply = supply;
        self.balances.insert(to, balance);
        Ok(())
    }

    /// Destroys `amount` of `from`'s shares.
    pub(crate) fn burn(&mut self, from: Address, amount: U256) -> Result<(), ShareError> {
        self.ensure_balance(from, amount)?;
        let supply = self
            .total_supply
            .checked_sub(amount)
            .ok_or(ShareError::Overflow)?;
        let balance = self.balance_of(from) - amount;
        self.total_supply = supply;
        self.balances.insert(from, balance);
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const ALICE: Address = Address::repeat_byte(0xA1);
    const BOB: Address = Address::repeat_byte(0xB0);

    fn ledger() -> ShareLedger {
        ShareLedger::new("TestVault", "TVT", 30)
    }

    #[test]
    fn mint_and_burn_track_supply() {
        let mut shares = ledger();
        shares.mint(ALICE, U256::from(1_000u64)).unwrap();
        shares.burn(ALICE, U256::from(400u64)).unwrap();
        assert_eq!(shares.total_supply(), U256::from(600u64));
        assert_eq!(shares.balance_of(ALICE), U256::from(600u64));
        assert_eq!(shares.sum_of_balances(), shares.total_supply());
    }

    #[test]
    fn burn_more_than_balance_rejected() {
        let mut shares = ledger();
        shares.mint(ALICE, U256::from(100u64)).unwrap();
        let err = shares.burn(ALICE, U256::from(200u64)).unwrap_err();
        assert!(matches!(err, ShareError::InsufficientBalance { .. }));
        assert_eq!(shares.total_supply(), U256::from(100u64));
    }

    #[test]
    fn mint_overflow_rejected_without_mutation() {
        let mut shares = ledger();
        shares.mint(ALICE, U256::MAX).unwrap();
        assert_eq!(shares.mint(BOB, U256::from(1u64)), Err(ShareError::Overflow));
        assert_eq!(shares.balance_of(BOB), U256::ZERO);
        assert_eq!(shares.total_supply(), U256::MAX);
    }

    #[test]
    fn move_balance_conserves_supply() {
        let mut shares = ledger();
        shares.mint(ALICE, U256::from(50u64)).unwrap();
        shares.move_balance(ALICE, BOB, U256::from(20u64)).unwrap();
        assert_eq!(shares.balance_of(ALICE), U256::from(30u64));
        assert_eq!(shares.balance_of(BOB), U256::from(20u64));
        assert_eq!(shares.sum_of_balances(), U256::from(50u64));
    }

    #[test]
    fn allowance_spending() {
        let mut shares = ledger();
        shares.approve(ALICE, BOB, U256::from(10u64));
        shares.spend_allowance(ALICE, BOB, U256::from(4u64)).unwrap();
        assert_eq!(shares.allowance(ALICE, BOB), U256::from(6u64));
        assert!(shares.spend_allowance(ALICE, BOB, U256::from(7u64)).is_err());
        assert_eq!(shares.allowance(ALICE, BOB), U256::from(6u64));
    }
}
