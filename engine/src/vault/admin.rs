//! Administrative surface (pause, freeze list, roles, operators) and the
//! share token's own transfer/approve calls.

use alloy_primitives::{Address, U256};
use tracing::info;

use super::TokenVault;
use crate::access::Role;
use crate::error::{VaultError, VaultResult};
use crate::events::VaultEvent;
use crate::ledger::AssetLedger;

impl<A: AssetLedger> TokenVault<A> {
    // -----------------------------------------------------------------------
    // Circuit breaker
    // -----------------------------------------------------------------------

    /// Halts request creation and fulfillment. Cancellation keeps working.
    pub fn pause(&mut self, caller: Address) -> VaultResult<()> {
        self.authorize(&[Role::Admin], caller, "pause")?;
        self.guard.pause()?;
        info!(%caller, "vault paused");
        self.events.commit(vec![VaultEvent::Paused { account: caller }]);
        Ok(())
    }

    /// Lifts a pause. Fails with [`VaultError::NotPaused`] if not paused.
    pub fn unpause(&mut self, caller: Address) -> VaultResult<()> {
        self.authorize(&[Role::Admin], caller, "unpause")?;
        self.guard.unpause()?;
        info!(%caller, "vault unpaused");
        self.events.commit(vec![VaultEvent::Unpaused { account: caller }]);
        Ok(())
    }

    /// Adds `account` to the frozen set. Freezing twice is a no-op.
    pub fn freeze_account(&mut self, caller: Address, account: Address) -> VaultResult<()> {
        self.authorize(&[Role::Admin], caller, "freeze_account")?;
        if self.guard.freeze(account) {
            info!(%account, "account frozen");
            self.events
                .commit(vec![VaultEvent::AccountFrozen { account }]);
        }
        Ok(())
    }

    /// Removes `account` from the frozen set.
    pub fn unfreeze_account(&mut self, caller: Address, account: Address) -> VaultResult<()> {
        self.authorize(&[Role::Admin], caller, "unfreeze_account")?;
        if self.guard.unfreeze(account) {
            info!(%account, "account unfrozen");
            self.events
                .commit(vec![VaultEvent::AccountUnfrozen { account }]);
        }
        Ok(())
    }

    /// Every frozen account.
    pub fn frozen_accounts(&self) -> Vec<Address> {
        self.guard.frozen_accounts()
    }

    // -----------------------------------------------------------------------
    // Roles & operators
    // -----------------------------------------------------------------------

    /// Grants `role` to `account`. Admin only. Granting a held role emits
    /// nothing.
    pub fn grant_role(&mut self, caller: Address, role: Role, account: Address) -> VaultResult<()> {
        self.authorize(&[Role::Admin], caller, "grant_role")?;
        if account == Address::ZERO {
            return Err(VaultError::ZeroAddress { field: "account" });
        }
        if self.access.grant(role, account) {
            info!(%role, %account, "role granted");
            self.events.commit(vec![VaultEvent::RoleGranted {
                role,
                account,
                sender: caller,
            }]);
        }
        Ok(())
    }

    /// Revokes `role` from `account`. Admin only.
    ///
    /// An admin may revoke its own role; nothing stops the last admin from
    /// locking the vault's privileged surface for good.
    pub fn revoke_role(&mut self, caller: Address, role: Role, account: Address) -> VaultResult<()> {
        self.authorize(&[Role::Admin], caller, "revoke_role")?;
        if self.access.revoke(role, account) {
            info!(%role, %account, "role revoked");
            self.events.commit(vec![VaultEvent::RoleRevoked {
                role,
                account,
                sender: caller,
            }]);
        }
        Ok(())
    }

    /// Shorthand for `grant_role(caller, Role::Keeper, keeper)`.
    pub fn grant_keeper_role(&mut self, caller: Address, keeper: Address) -> VaultResult<()> {
        self.grant_role(caller, Role::Keeper, keeper)
    }

    /// Lets `operator` act for `caller` on requests (or stops it).
    pub fn set_operator(
        &mut self,
        caller: Address,
        operator: Address,
        approved: bool,
    ) -> VaultResult<()> {
        self.access.set_operator(caller, operator, approved);
        info!(controller = %caller, %operator, approved, "operator set");
        self.events.commit(vec![VaultEvent::OperatorSet {
            controller: caller,
            operator,
            approved,
        }]);
        Ok(())
    }

    // -----------------------------------------------------------------------
    // Share token
    // -----------------------------------------------------------------------

    /// Moves `amount` of the caller's shares to `to`. Frozen senders are
    /// rejected with [`VaultError::SenderFrozen`].
    pub fn transfer(&mut self, caller: Address, to: Address, amount: U256) -> VaultResult<()> {
        self.guard.ensure_sender_not_frozen(caller)?;
        if to == Address::ZERO {
            return Err(VaultError::ZeroAddress { field: "to" });
        }
        self.shares.move_balance(caller, to, amount)?;
        self.events.commit(vec![VaultEvent::Transfer {
            from: caller,
            to,
            value: amount,
        }]);
        Ok(())
    }

    /// Sets `spender`'s allowance over the caller's shares.
    pub fn approve(&mut self, caller: Address, spender: Address, amount: U256) -> VaultResult<()> {
        if spender == Address::ZERO {
            return Err(VaultError::ZeroAddress { field: "spender" });
        }
        self.shares.approve(caller, spender, amount);
        self.events.commit(vec![VaultEvent::Approval {
            owner: caller,
            spender,
            value: amount,
        }]);
        Ok(())
    }

    /// Moves `amount` of `from`'s shares to `to`, spending the caller's
    /// allowance. The frozen check applies to `from`, the share sender.
    pub fn transfer_from(
        &mut self,
        caller: Address,
        from: Address,
        to: Address,
        amount: U256,
    ) -> VaultResult<()> {
        self.guard.ensure_sender_not_frozen(from)?;
        if to == Address::ZERO {
            return Err(VaultError::ZeroAddress { field: "to" });
        }
        self.shares.ensure_allowance(from, caller, amount)?;
        self.shares.ensure_balance(from, amount)?;

        self.shares.move_balance(from, to, amount)?;
        self.shares.spend_allowance(from, caller, amount)?;
        self.events.commit(vec![VaultEvent::Transfer {
            from,
            to,
            value: amount,
        }]);
        Ok(())
    }
}
