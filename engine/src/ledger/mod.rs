//! # Ledger Module — Balances and Request Slots
//!
//! ```text
//! asset.rs     — the external asset token seam (and an in-memory ERC-20)
//! shares.rs    — vault share balances, allowances and supply
//! requests.rs  — per-controller deposit / redeem request slots
//! ```
//!
//! All amounts are `U256` in base units. Nothing in this module checks
//! roles, the pause flag or the freeze list; that is the vault's job.

pub mod asset;
pub mod requests;
pub mod shares;

pub use asset::{AssetError, AssetLedger, Erc20Ledger};
pub use requests::{Request, RequestBook, RequestKind, RequestLedger, RequestStatus};
pub use shares::{ShareError, ShareLedger};
