//! # Token Vault
//!
//! The engine's single owned store: access control, the guard, the share
//! ledger, the request books, price/fee configuration, the underlying asset
//! ledger and the audit log. Everything is a plain field, so a vault can be
//! built and driven in a unit test with no runtime at all; wrap it in a
//! [`SharedVault`](crate::handle::SharedVault) to share it across threads.
//!
//! Operations are split by concern:
//!
//! ```text
//! request.rs  — request / cancel / make-claimable (the request ledger side)
//! fulfill.rs  — deposit / mint / withdraw / redeem, price and fee
//! admin.rs    — pause, freeze, roles, operators, share transfers
//! ```
//!
//! Every mutating method takes the acting account as `caller`, checks
//! authorization first, validates everything that can fail, and only then
//! mutates. Events are committed last. A returned `Err` means nothing
//! changed.

mod admin;
mod fulfill;
mod request;

use alloy_primitives::{Address, U256};
use serde::{Deserialize, Serialize};
use tracing::{info, warn};

use crate::access::{AccessControl, Role};
use crate::config::{ConfigError, VaultInit, SHARE_DECIMALS};
use crate::error::VaultResult;
use crate::events::{EventLog, EventRecord, VaultEvent};
use crate::guard::Guard;
use crate::ledger::{
    AssetLedger, Erc20Ledger, Request, RequestKind, RequestLedger, RequestStatus, ShareLedger,
};
use crate::math;

/// Price and fee as currently configured.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct VaultConfig {
    /// Assets per share, scaled by [`PRICE_SCALE`](crate::config::PRICE_SCALE).
    pub price_per_share: U256,
    /// Deposit fee in parts per thousand.
    pub fee_bps: u64,
}

/// The vault engine.
#[derive(Debug)]
pub struct TokenVault<A: AssetLedger = Erc20Ledger> {
    address: Address,
    access: AccessControl,
    guard: Guard,
    shares: ShareLedger,
    requests: RequestLedger,
    config: VaultConfig,
    underlying: A,
    events: EventLog,
}

impl<A: AssetLedger> TokenVault<A> {
    /// Builds a vault from its construction parameters.
    ///
    /// # Errors
    ///
    /// Returns [`VaultError::InvalidConfig`](crate::VaultError::InvalidConfig)
    /// if `init` fails validation or names a different asset than
    /// `underlying`.
    pub fn new(init: VaultInit, underlying: A) -> VaultResult<Self> {
        init.validate()?;
        if underlying.address() != init.asset {
            return Err(ConfigError::AssetMismatch {
                expected: init.asset,
                actual: underlying.address(),
            }
            .into());
        }

        let access = AccessControl::bootstrap(init.admin, init.price_setter);
        let mut events = EventLog::new(init.vault_address);
        events.commit(vec![
            VaultEvent::RoleGranted {
                role: Role::Admin,
                account: init.admin,
                sender: init.vault_address,
            },
            VaultEvent::RoleGranted {
                role: Role::PriceSetter,
                account: init.price_setter,
                sender: init.vault_address,
            },
        ]);

        info!(
            vault = %init.vault_address,
            asset = %init.asset,
            symbol = %init.symbol,
            admin = %init.admin,
            price_setter = %init.price_setter,
            "vault initialized"
        );

        Ok(Self {
            address: init.vault_address,
            access,
            guard: Guard::default(),
            shares: ShareLedger::new(init.name.clone(), init.symbol.clone(), SHARE_DECIMALS),
            requests: RequestLedger::new(),
            config: VaultConfig {
                price_per_share: init.price(),
                fee_bps: init.fee_bps(),
            },
            underlying,
            events,
        })
    }

    /// Passes if `caller` holds any of `roles`. Rejections are logged.
    pub(crate) fn authorize(
        &self,
        roles: &[Role],
        caller: Address,
        action: &'static str,
    ) -> VaultResult<()> {
        self.access.require_any_role(roles, caller).map_err(|err| {
            warn!(%caller, action, "rejected privileged call");
            err
        })
    }

    // -----------------------------------------------------------------------
    // Identity & configuration views
    // -----------------------------------------------------------------------

    /// The vault's own custody account.
    pub fn address(&self) -> Address {
        self.address
    }

    /// Address of the underlying asset.
    pub fn asset(&self) -> Address {
        self.underlying.address()
    }

    /// Current price per share.
    pub fn get_price(&self) -> U256 {
        self.config.price_per_share
    }

    /// Current deposit fee.
    pub fn fee(&self) -> u64 {
        self.config.fee_bps
    }

    /// Price and fee together.
    pub fn config(&self) -> VaultConfig {
        self.config
    }

    /// Returns `true` while paused.
    pub fn paused(&self) -> bool {
        self.guard.paused()
    }

    /// Returns `true` if `account` may not send shares.
    pub fn is_frozen(&self, account: Address) -> bool {
        self.guard.is_frozen(account)
    }

    /// Returns `true` if `account` holds `role`.
    pub fn has_role(&self, role: Role, account: Address) -> bool {
        self.access.has_role(role, account)
    }

    /// Current members of `role`.
    pub fn role_members(&self, role: Role) -> Vec<Address> {
        self.access.members(role)
    }

    /// Returns `true` if `owner` has approved `operator`.
    pub fn is_operator(&self, owner: Address, operator: Address) -> bool {
        self.access.is_operator(owner, operator)
    }

    // -----------------------------------------------------------------------
    // Share token views
    // -----------------------------------------------------------------------

    /// Share token name.
    pub fn name(&self) -> &str {
        self.shares.name()
    }

    /// Share token symbol.
    pub fn symbol(&self) -> &str {
        self.shares.symbol()
    }

    /// Share token decimals.
    pub fn decimals(&self) -> u8 {
        self.shares.decimals()
    }

    /// Share balance of `account`.
    pub fn balance_of(&self, account: Address) -> U256 {
        self.shares.balance_of(account)
    }

    /// Total share supply, including shares escrowed for redeems.
    pub fn total_supply(&self) -> U256 {
        self.shares.total_supply()
    }

    /// Share allowance of `spender` over `owner`.
    pub fn allowance(&self, owner: Address, spender: Address) -> U256 {
        self.shares.allowance(owner, spender)
    }

    /// Read access to the full share ledger.
    pub fn shares(&self) -> &ShareLedger {
        &self.shares
    }

    // -----------------------------------------------------------------------
    // Asset views
    // -----------------------------------------------------------------------

    /// Underlying asset held in vault custody, escrow included.
    pub fn total_assets(&self) -> U256 {
        self.underlying.balance_of(self.address)
    }

    /// Shares a deposit of `assets` would mint right now (fee applied).
    pub fn convert_to_shares(&self, assets: U256) -> VaultResult<U256> {
        Ok(math::shares_for_assets(
            assets,
            self.config.price_per_share,
            self.config.fee_bps,
        )?)
    }

    /// Assets a redeem of `shares` would release right now.
    pub fn convert_to_assets(&self, shares: U256) -> VaultResult<U256> {
        Ok(math::assets_for_shares(shares, self.config.price_per_share)?)
    }

    /// The underlying asset ledger.
    pub fn underlying(&self) -> &A {
        &self.underlying
    }

    /// Mutable access to the underlying asset ledger, for the asset's own
    /// operations (minting, approvals). The vault's custody balance is only
    /// ever moved by vault operations.
    pub fn underlying_mut(&mut self) -> &mut A {
        &mut self.underlying
    }

    // -----------------------------------------------------------------------
    // Request views
    // -----------------------------------------------------------------------

    /// Escrowed assets while the deposit request is `Pending`, else zero.
    pub fn pending_deposit_request(&self, controller: Address) -> U256 {
        self.requests.deposits.pending_amount(controller)
    }

    /// Escrowed assets while the deposit request is `Claimable`, else zero.
    pub fn claimable_deposit_request(&self, controller: Address) -> U256 {
        self.requests.deposits.claimable_amount(controller)
    }

    /// Escrowed shares while the redeem request is `Pending`, else zero.
    pub fn pending_redeem_request(&self, controller: Address) -> U256 {
        self.requests.redeems.pending_amount(controller)
    }

    /// Escrowed shares while the redeem request is `Claimable`, else zero.
    pub fn claimable_redeem_request(&self, controller: Address) -> U256 {
        self.requests.redeems.claimable_amount(controller)
    }

    /// Status of `controller`'s slot of the given kind.
    pub fn request_status(&self, kind: RequestKind, controller: Address) -> RequestStatus {
        self.requests.book(kind).status(controller)
    }

    /// The open request of the given kind for `controller`.
    pub fn request(&self, kind: RequestKind, controller: Address) -> Option<&Request> {
        self.requests.book(kind).get(controller)
    }

    /// Read access to both request books.
    pub fn requests(&self) -> &RequestLedger {
        &self.requests
    }

    // -----------------------------------------------------------------------
    // Audit log
    // -----------------------------------------------------------------------

    /// The audit log.
    pub fn events(&self) -> &EventLog {
        &self.events
    }

    /// Records with `sequence >= cursor`.
    pub fn events_since(&self, cursor: u64) -> &[EventRecord] {
        self.events.since(cursor)
    }

    /// Live stream of records committed from now on.
    pub fn subscribe(&self) -> tokio::sync::broadcast::Receiver<EventRecord> {
        self.events.subscribe()
    }
}
