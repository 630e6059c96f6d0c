//! Request side of the vault: opening, cancelling and marking requests
//! claimable.

use alloy_primitives::{Address, U256};
use tracing::info;

use super::TokenVault;
use crate::access::Role;
use crate::error::{VaultError, VaultResult};
use crate::events::VaultEvent;
use crate::ledger::{AssetLedger, RequestKind};

impl<A: AssetLedger> TokenVault<A> {
    /// Opens a deposit request for `controller`, escrowing `assets` from
    /// `owner`. Returns the request id.
    ///
    /// `caller` must be `owner` or an operator `owner` has approved. The
    /// vault pulls the assets with its allowance on the asset ledger, so
    /// `owner` must have approved the vault beforehand.
    ///
    /// # Errors
    ///
    /// - [`VaultError::ContractPaused`] while paused.
    /// - [`VaultError::ZeroAmount`] if `assets` is zero.
    /// - [`VaultError::NotOperator`] if `caller` may not act for `owner`.
    /// - [`VaultError::PendingRequestExists`] if `controller` already has one.
    /// - [`VaultError::AssetTransferFailed`] if the asset pull fails.
    pub fn request_deposit(
        &mut self,
        caller: Address,
        assets: U256,
        controller: Address,
        owner: Address,
    ) -> VaultResult<u64> {
        self.check_request(caller, assets, controller, owner, RequestKind::Deposit)?;

        self.underlying
            .transfer_from(self.address, owner, self.address, assets)?;
        let request_id =
            self.requests
                .open(RequestKind::Deposit, controller, owner, caller, assets)?;

        info!(%controller, %owner, request_id, %assets, "deposit requested");
        self.events.commit(vec![VaultEvent::DepositRequest {
            controller,
            owner,
            request_id,
            sender: caller,
            assets,
        }]);
        Ok(request_id)
    }

    /// Opens a redeem request for `controller`, moving `shares` from `owner`
    /// into vault custody. The shares are not burned until fulfillment.
    ///
    /// # Errors
    ///
    /// As [`request_deposit`](Self::request_deposit), with
    /// [`VaultError::InsufficientShares`] in place of the asset failure.
    pub fn request_redeem(
        &mut self,
        caller: Address,
        shares: U256,
        controller: Address,
        owner: Address,
    ) -> VaultResult<u64> {
        self.check_request(caller, shares, controller, owner, RequestKind::Redeem)?;

        self.shares.move_balance(owner, self.address, shares)?;
        let request_id = self
            .requests
            .open(RequestKind::Redeem, controller, owner, caller, shares)?;

        info!(%controller, %owner, request_id, %shares, "redeem requested");
        self.events.commit(vec![
            VaultEvent::Transfer {
                from: owner,
                to: self.address,
                value: shares,
            },
            VaultEvent::RedeemRequest {
                controller,
                owner,
                request_id,
                sender: caller,
                shares,
            },
        ]);
        Ok(request_id)
    }

    fn check_request(
        &self,
        caller: Address,
        amount: U256,
        controller: Address,
        owner: Address,
        kind: RequestKind,
    ) -> VaultResult<()> {
        self.guard.ensure_not_paused()?;
        if amount.is_zero() {
            return Err(VaultError::ZeroAmount);
        }
        if controller == Address::ZERO {
            return Err(VaultError::ZeroAddress { field: "controller" });
        }
        self.access.require_authorized_for(caller, owner)?;
        self.requests.ensure_can_open(kind, controller)
    }

    /// Cancels `controller`'s pending deposit and refunds the escrowed
    /// assets to the owner they came from. Returns the refunded amount.
    ///
    /// Allowed while paused. A `Claimable` request can no longer be
    /// cancelled.
    ///
    /// # Errors
    ///
    /// - [`VaultError::NotOperator`] if `caller` may not act for `controller`.
    /// - [`VaultError::NoPendingRequest`] if there is nothing pending.
    pub fn cancel_deposit(&mut self, caller: Address, controller: Address) -> VaultResult<U256> {
        self.access.require_authorized_for(caller, controller)?;
        let request = self.requests.deposits.pending(controller)?.clone();

        self.underlying
            .transfer(self.address, request.owner, request.amount)?;
        self.requests.deposits.take(controller);

        info!(%controller, request_id = request.id, assets = %request.amount, "deposit cancelled");
        self.events.commit(vec![VaultEvent::DepositCancelled {
            controller,
            owner: request.owner,
            request_id: request.id,
            assets: request.amount,
        }]);
        Ok(request.amount)
    }

    /// Cancels `controller`'s pending redeem and returns the escrowed shares
    /// to their owner. Returns the refunded amount.
    ///
    /// # Errors
    ///
    /// As [`cancel_deposit`](Self::cancel_deposit).
    pub fn cancel_redeem(&mut self, caller: Address, controller: Address) -> VaultResult<U256> {
        self.access.require_authorized_for(caller, controller)?;
        let request = self.requests.redeems.pending(controller)?.clone();

        self.shares
            .move_balance(self.address, request.owner, request.amount)?;
        self.requests.redeems.take(controller);

        info!(%controller, request_id = request.id, shares = %request.amount, "redeem cancelled");
        self.events.commit(vec![
            VaultEvent::Transfer {
                from: self.address,
                to: request.owner,
                value: request.amount,
            },
            VaultEvent::RedeemCancelled {
                controller,
                owner: request.owner,
                request_id: request.id,
                shares: request.amount,
            },
        ]);
        Ok(request.amount)
    }

    /// Moves `controller`'s deposit request from `Pending` to `Claimable`.
    /// No value moves. Admin or Keeper only.
    pub fn make_deposit_claimable(&mut self, caller: Address, controller: Address) -> VaultResult<()> {
        self.make_claimable(caller, controller, RequestKind::Deposit)
    }

    /// Moves `controller`'s redeem request from `Pending` to `Claimable`.
    /// No value moves. Admin or Keeper only.
    pub fn make_redeem_claimable(&mut self, caller: Address, controller: Address) -> VaultResult<()> {
        self.make_claimable(caller, controller, RequestKind::Redeem)
    }

    fn make_claimable(
        &mut self,
        caller: Address,
        controller: Address,
        kind: RequestKind,
    ) -> VaultResult<()> {
        self.authorize(&[Role::Admin, Role::Keeper], caller, "make_claimable")?;
        self.guard.ensure_not_paused()?;

        let request = self.requests.book_mut(kind).make_claimable(controller)?;
        let (request_id, amount) = (request.id, request.amount);

        info!(%controller, %kind, request_id, %amount, "request claimable");
        let event = match kind {
            RequestKind::Deposit => VaultEvent::DepositClaimable {
                controller,
                request_id,
                assets: amount,
            },
            RequestKind::Redeem => VaultEvent::RedeemClaimable {
                controller,
                request_id,
                shares: amount,
            },
        };
        self.events.commit(vec![event]);
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use alloy_primitives::{Address, U256};

    use crate::access::Role;
    use crate::config::{VaultInit, PRICE_SCALE};
    use crate::error::VaultError;
    use crate::ledger::{AssetLedger, Erc20Ledger, RequestKind, RequestStatus};
    use crate::vault::TokenVault;

    const VAULT: Address = Address::repeat_byte(0x11);
    const TOKEN: Address = Address::repeat_byte(0xA5);
    const ADMIN: Address = Address::repeat_byte(0xAD);
    const SETTER: Address = Address::repeat_byte(0x9E);
    const KEEPER: Address = Address::repeat_byte(0x4B);
    const ALICE: Address = Address::repeat_byte(0xA1);
    const BOB: Address = Address::repeat_byte(0xB0);

    fn units(n: u64) -> U256 {
        U256::from(n) * U256::from(PRICE_SCALE)
    }

    fn vault() -> TokenVault {
        let mut token = Erc20Ledger::new(TOKEN, "TestToken", "TTK");
        token.mint_to(ALICE, units(1_000)).unwrap();
        token.approve(ALICE, VAULT, U256::MAX);
        let init = VaultInit::new(VAULT, TOKEN, "TestVault", "TVT", ADMIN, SETTER);
        TokenVault::new(init, token).unwrap()
    }

    #[test]
    fn deposit_request_escrows_assets() {
        let mut v = vault();
        let id = v.request_deposit(ALICE, units(100), ALICE, ALICE).unwrap();
        assert_eq!(id, 1);
        assert_eq!(v.pending_deposit_request(ALICE), units(100));
        assert_eq!(v.underlying().balance_of(ALICE), units(900));
        assert_eq!(v.total_assets(), units(100));
    }

    #[test]
    fn zero_amount_rejected() {
        let mut v = vault();
        assert!(matches!(
            v.request_deposit(ALICE, U256::ZERO, ALICE, ALICE),
            Err(VaultError::ZeroAmount)
        ));
    }

    #[test]
    fn stranger_cannot_request_for_owner() {
        let mut v = vault();
        let err = v.request_deposit(BOB, units(1), ALICE, ALICE).unwrap_err();
        assert!(matches!(err, VaultError::NotOperator { .. }));
        assert_eq!(v.underlying().balance_of(ALICE), units(1_000));
    }

    #[test]
    fn missing_allowance_is_asset_transfer_failure() {
        let mut v = vault();
        v.underlying_mut().approve(ALICE, VAULT, units(1));
        let before = v.events().len();
        let err = v.request_deposit(ALICE, units(2), ALICE, ALICE).unwrap_err();
        assert!(matches!(err, VaultError::AssetTransferFailed(_)));
        assert_eq!(v.request_status(RequestKind::Deposit, ALICE), RequestStatus::None);
        assert_eq!(v.events().len(), before);
        assert_eq!(v.requests().peek_id(), 1);
    }

    #[test]
    fn cancel_refunds_and_second_cancel_fails() {
        let mut v = vault();
        v.request_deposit(ALICE, units(75), ALICE, ALICE).unwrap();
        assert_eq!(v.cancel_deposit(ALICE, ALICE).unwrap(), units(75));
        assert_eq!(v.underlying().balance_of(ALICE), units(1_000));
        assert_eq!(v.pending_deposit_request(ALICE), U256::ZERO);

        let events = v.events().len();
        assert!(matches!(
            v.cancel_deposit(ALICE, ALICE),
            Err(VaultError::NoPendingRequest { .. })
        ));
        assert_eq!(v.events().len(), events);
    }

    #[test]
    fn keeper_can_make_claimable_but_stranger_cannot() {
        let mut v = vault();
        v.grant_role(ADMIN, Role::Keeper, KEEPER).unwrap();
        v.request_deposit(ALICE, units(30), ALICE, ALICE).unwrap();

        assert!(matches!(
            v.make_deposit_claimable(BOB, ALICE),
            Err(VaultError::MissingRole { .. })
        ));
        v.make_deposit_claimable(KEEPER, ALICE).unwrap();
        assert_eq!(v.pending_deposit_request(ALICE), U256::ZERO);
        assert_eq!(v.claimable_deposit_request(ALICE), units(30));
    }

    #[test]
    fn claimable_deposit_cannot_be_cancelled() {
        let mut v = vault();
        v.request_deposit(ALICE, units(30), ALICE, ALICE).unwrap();
        v.make_deposit_claimable(ADMIN, ALICE).unwrap();
        assert!(matches!(
            v.cancel_deposit(ALICE, ALICE),
            Err(VaultError::NoPendingRequest { .. })
        ));
        assert_eq!(v.claimable_deposit_request(ALICE), units(30));
    }

    #[test]
    fn make_claimable_without_request_fails() {
        let mut v = vault();
        assert!(matches!(
            v.make_redeem_claimable(ADMIN, ALICE),
            Err(VaultError::NoPendingRequest {
                kind: RequestKind::Redeem,
                ..
            })
        ));
    }
}
