//! # Freeze / Pause Guard
//!
//! A global circuit breaker plus a per-account freeze list.
//!
//! - While paused, request creation and fulfillment fail with
//!   [`VaultError::ContractPaused`]. Cancellation is still allowed so users
//!   can pull escrow out during an emergency.
//! - A frozen account cannot *send* shares. It can still receive them, and
//!   its requests are created, fulfilled and cancelled as usual.

use std::collections::BTreeSet;

use alloy_primitives::Address;
use serde::{Deserialize, Serialize};

use crate::error::{VaultError, VaultResult};

/// Pause flag and frozen-sender set.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct Guard {
    paused: bool,
    frozen: BTreeSet<Address>,
}

impl Guard {
    /// Returns `true` while the vault is paused.
    pub fn paused(&self) -> bool {
        self.paused
    }

    /// Engages the breaker. Fails if it is already engaged.
    pub fn pause(&mut self) -> VaultResult<()> {
        if self.paused {
            return Err(VaultError::ContractPaused);
        }
        self.paused = true;
        Ok(())
    }

    /// Releases the breaker. Fails if it is not engaged.
    pub fn unpause(&mut self) -> VaultResult<()> {
        if !self.paused {
            return Err(VaultError::NotPaused);
        }
        self.paused = false;
        Ok(())
    }

    /// Fails with [`VaultError::ContractPaused`] while paused.
    pub fn ensure_not_paused(&self) -> VaultResult<()> {
        if self.paused {
            Err(VaultError::ContractPaused)
        } else {
            Ok(())
        }
    }

    /// Adds `account` to the frozen set. Returns `false` if already frozen.
    pub fn freeze(&mut self, account: Address) -> bool {
        self.frozen.insert(account)
    }

    /// Removes `account` from the frozen set. Returns `false` if it was not frozen.
    pub fn unfreeze(&mut self, account: Address) -> bool {
        self.frozen.remove(&account)
    }

    /// Returns `true` if `account` is frozen.
    pub fn is_frozen(&self, account: Address) -> bool {
        self.frozen.contains(&account)
    }

    /// Fails with [`VaultError::SenderFrozen`] if `sender` is frozen.
    pub fn ensure_sender_not_frozen(&self, sender: Address) -> VaultResult<()> {
        if self.is_frozen(sender) {
            Err(VaultError::SenderFrozen(sender))
        } else {
            Ok(())
        }
    }

    /// Frozen accounts, in address order.
    pub fn frozen_accounts(&self) -> Vec<Address> {
        self.frozen.iter().copied().collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn pause_toggles_and_rejects_repeats() {
        let mut guard = Guard::default();
        assert!(guard.ensure_not_paused().is_ok());

        guard.pause().unwrap();
        assert!(guard.paused());
        assert!(matches!(guard.ensure_not_paused(), Err(VaultError::ContractPaused)));
        assert!(matches!(guard.pause(), Err(VaultError::ContractPaused)));

        guard.unpause().unwrap();
        assert!(!guard.paused());
        assert!(matches!(guard.unpause(), Err(VaultError::NotPaused)));
    }

    #[test]
    fn freeze_blocks_only_the_frozen_sender() {
        let mut guard = Guard::default();
        let alice = Address::repeat_byte(0xA1);
        let bob = Address::repeat_byte(0xB0);

        assert!(guard.freeze(alice));
        assert!(!guard.freeze(alice));
        assert!(matches!(
            guard.ensure_sender_not_frozen(alice),
            Err(VaultError::SenderFrozen(a)) if a == alice
        ));
        assert!(guard.ensure_sender_not_frozen(bob).is_ok());
        assert_eq!(guard.frozen_accounts(), vec![alice]);

        assert!(guard.unfreeze(alice));
        assert!(!guard.unfreeze(alice));
        assert!(guard.ensure_sender_not_frozen(alice).is_ok());
    }
}
