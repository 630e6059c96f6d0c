//! Fulfillment: turning escrowed requests into minted shares or released
//! assets at the current price and fee, plus the price and fee setters.
//!
//! Fulfillment is exact. The amount named by the fulfiller must equal the
//! escrowed request (or its conversion at the current price), otherwise the
//! call fails with `NoMatchingRequest`. A request may be fulfilled straight
//! from `Pending` or after it was made `Claimable`.

use alloy_primitives::{Address, U256};
use tracing::info;

use super::TokenVault;
use crate::access::Role;
use crate::config::MAX_FEE_BPS;
use crate::error::{VaultError, VaultResult};
use crate::events::VaultEvent;
use crate::ledger::{AssetLedger, Request, RequestKind};
use crate::math;

impl<A: AssetLedger> TokenVault<A> {
    // -----------------------------------------------------------------------
    // Deposit side
    // -----------------------------------------------------------------------

    /// Fulfills `controller`'s deposit request of exactly `assets`, minting
    /// the converted shares to `receiver`. Returns the shares minted.
    ///
    /// The fee is the one configured now, not the one in force when the
    /// request was made. The escrowed assets stay in the vault.
    pub fn deposit(
        &mut self,
        caller: Address,
        assets: U256,
        receiver: Address,
        controller: Address,
    ) -> VaultResult<U256> {
        self.authorize(&[Role::Admin], caller, "deposit")?;
        self.fulfill_deposit(caller, assets, receiver, controller, None)
    }

    /// Fulfills `controller`'s deposit request whose conversion at the
    /// current price and fee is exactly `shares`. Returns the assets consumed.
    pub fn mint(
        &mut self,
        caller: Address,
        shares: U256,
        receiver: Address,
        controller: Address,
    ) -> VaultResult<U256> {
        self.authorize(&[Role::Admin], caller, "mint")?;
        self.guard.ensure_not_paused()?;

        let no_match = || VaultError::NoMatchingRequest {
            controller,
            kind: RequestKind::Deposit,
            requested: shares,
        };
        let request = self
            .requests
            .deposits
            .get(controller)
            .cloned()
            .ok_or_else(no_match)?;
        let converted = math::shares_for_assets(
            request.amount,
            self.config.price_per_share,
            self.config.fee_bps,
        )?;
        if converted != shares {
            return Err(no_match());
        }

        let assets = request.amount;
        self.settle_deposit(caller, request, receiver, shares)?;
        Ok(assets)
    }

    /// Shared by [`deposit`](Self::deposit) and the keeper path. When
    /// `expected_id` is set, the open request must also carry that id.
    /// Role checks are the caller's job.
    pub(crate) fn fulfill_deposit(
        &mut self,
        caller: Address,
        assets: U256,
        receiver: Address,
        controller: Address,
        expected_id: Option<u64>,
    ) -> VaultResult<U256> {
        self.guard.ensure_not_paused()?;

        let request = self.requests.deposits.matching(controller, assets)?.clone();
        if expected_id.is_some_and(|id| id != request.id) {
            return Err(VaultError::NoMatchingRequest {
                controller,
                kind: RequestKind::Deposit,
                requested: assets,
            });
        }
        let shares = math::shares_for_assets(
            request.amount,
            self.config.price_per_share,
            self.config.fee_bps,
        )?;

        self.settle_deposit(caller, request, receiver, shares)?;
        Ok(shares)
    }

    fn settle_deposit(
        &mut self,
        caller: Address,
        request: Request,
        receiver: Address,
        shares: U256,
    ) -> VaultResult<()> {
        if receiver == Address::ZERO {
            return Err(VaultError::ZeroAddress { field: "receiver" });
        }

        self.shares.mint(receiver, shares)?;
        self.requests.deposits.take(request.controller);

        info!(
            controller = %request.controller,
            %receiver,
            request_id = request.id,
            assets = %request.amount,
            %shares,
            fee_bps = self.config.fee_bps,
            "deposit fulfilled"
        );
        self.events.commit(vec![
            VaultEvent::Transfer {
                from: Address::ZERO,
                to: receiver,
                value: shares,
            },
            VaultEvent::Deposit {
                sender: caller,
                owner: receiver,
                request_id: request.id,
                assets: request.amount,
                shares,
            },
        ]);
        Ok(())
    }

    // -----------------------------------------------------------------------
    // Redeem side
    // -----------------------------------------------------------------------

    /// Fulfills `controller`'s redeem request whose conversion at the current
    /// price is exactly `assets`. Returns the shares burned.
    pub fn withdraw(
        &mut self,
        caller: Address,
        assets: U256,
        receiver: Address,
        controller: Address,
    ) -> VaultResult<U256> {
        self.authorize(&[Role::Admin], caller, "withdraw")?;
        self.guard.ensure_not_paused()?;

        let no_match = || VaultError::NoMatchingRequest {
            controller,
            kind: RequestKind::Redeem,
            requested: assets,
        };
        let request = self
            .requests
            .redeems
            .get(controller)
            .cloned()
            .ok_or_else(no_match)?;
        let converted = math::assets_for_shares(request.amount, self.config.price_per_share)?;
        if converted != assets {
            return Err(no_match());
        }

        let shares = request.amount;
        self.settle_redeem(caller, request, receiver, assets)?;
        Ok(shares)
    }

    /// Fulfills `controller`'s redeem request of exactly `shares`, burning
    /// them and paying the converted assets to `receiver`. No fee is taken
    /// on this leg. Returns the assets released.
    pub fn redeem(
        &mut self,
        caller: Address,
        shares: U256,
        receiver: Address,
        controller: Address,
    ) -> VaultResult<U256> {
        self.authorize(&[Role::Admin], caller, "redeem")?;
        self.guard.ensure_not_paused()?;

        let request = self.requests.redeems.matching(controller, shares)?.clone();
        let assets = math::assets_for_shares(request.amount, self.config.price_per_share)?;

        self.settle_redeem(caller, request, receiver, assets)?;
        Ok(assets)
    }

    fn settle_redeem(
        &mut self,
        caller: Address,
        request: Request,
        receiver: Address,
        assets: U256,
    ) -> VaultResult<()> {
        if receiver == Address::ZERO {
            return Err(VaultError::ZeroAddress { field: "receiver" });
        }
        // Burn cannot fail once this holds, so the payout below is final.
        self.shares.ensure_balance(self.address, request.amount)?;

        self.underlying.transfer(self.address, receiver, assets)?;
        self.shares.burn(self.address, request.amount)?;
        self.requests.redeems.take(request.controller);

        info!(
            controller = %request.controller,
            %receiver,
            request_id = request.id,
            shares = %request.amount,
            %assets,
            "redeem fulfilled"
        );
        self.events.commit(vec![
            VaultEvent::Transfer {
                from: self.address,
                to: Address::ZERO,
                value: request.amount,
            },
            VaultEvent::Withdraw {
                sender: caller,
                receiver,
                owner: request.controller,
                request_id: request.id,
                assets,
                shares: request.amount,
            },
        ]);
        Ok(())
    }

    // -----------------------------------------------------------------------
    // Price & fee
    // -----------------------------------------------------------------------

    /// Sets the price per share. PriceSetter only; zero is rejected.
    pub fn set_price(&mut self, caller: Address, new_price: U256) -> VaultResult<()> {
        self.authorize(&[Role::PriceSetter], caller, "set_price")?;
        if new_price.is_zero() {
            return Err(VaultError::InvalidPrice);
        }

        let old_price = self.config.price_per_share;
        self.config.price_per_share = new_price;

        info!(%old_price, %new_price, "price updated");
        self.events.commit(vec![VaultEvent::PriceUpdated {
            old_price,
            new_price,
        }]);
        Ok(())
    }

    /// Sets the deposit fee in parts per thousand. Admin only.
    pub fn set_fee(&mut self, caller: Address, new_fee: u64) -> VaultResult<()> {
        self.authorize(&[Role::Admin], caller, "set_fee")?;
        if new_fee > MAX_FEE_BPS {
            return Err(VaultError::FeeOutOfRange(new_fee));
        }

        let old_fee = self.config.fee_bps;
        self.config.fee_bps = new_fee;

        info!(old_fee, new_fee, "fee updated");
        self.events
            .commit(vec![VaultEvent::FeeUpdated { old_fee, new_fee }]);
        Ok(())
    }
}
