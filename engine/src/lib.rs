// Copyright (c) 2026 ALAS Technology. MIT License.
// See LICENSE for details.

//! # Token Vault Engine
//!
//! Accounting and state-machine core of an asynchronous tokenized vault.
//! Deposits and redeems are *requests*: the vault escrows the value, holds
//! the request until an authorized fulfiller (an admin, or a keeper on the
//! automated path) settles it at the vault's share price, and only then
//! mints or burns shares.
//!
//! ## Architecture
//!
//! - **config** — Fixed-point scales, fee bounds, construction parameters.
//! - **math** — Checked asset/share conversions. No floats, ever.
//! - **access** — Roles (Admin, PriceSetter, Keeper) and operator approvals.
//! - **guard** — The pause breaker and the frozen-sender list.
//! - **ledger** — Asset token seam, share balances, per-controller request slots.
//! - **vault** — `TokenVault`, the owned store every operation runs against.
//! - **events** — Append-only audit log with cursor polling and a broadcast feed.
//! - **automation** — `check_log` / `perform_upkeep`, the pending-request
//!   scanner and the `Keeper` loop body.
//! - **handle** — `SharedVault`, the lock that makes a vault shareable.
//!
//! ## Ground Rules
//!
//! 1. Every mutating call names its acting account (`caller`) explicitly.
//! 2. A call either applies completely or returns `Err` with nothing changed
//!    and nothing logged.
//! 3. Shares are minted and burned only by fulfillment.
//! 4. All arithmetic on balances is checked `U256`.

pub mod access;
pub mod automation;
pub mod config;
pub mod error;
pub mod events;
pub mod guard;
pub mod handle;
pub mod ledger;
pub mod math;
pub mod vault;

pub use access::Role;
pub use automation::{
    FailedUpkeep, FulfilledUpkeep, Keeper, KeeperReport, PendingRequestScanner, PerformData,
    UpkeepCheck,
};
pub use config::VaultInit;
pub use error::{ErrorKind, VaultError, VaultResult};
pub use events::{EventRecord, VaultEvent};
pub use handle::SharedVault;
pub use ledger::{AssetLedger, Erc20Ledger, RequestKind, RequestStatus};
pub use vault::{TokenVault, VaultConfig};
