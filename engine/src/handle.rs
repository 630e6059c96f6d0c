//! # Shared Vault Handle
//!
//! [`TokenVault`] is a plain owned store; [`SharedVault`] is how it is
//! shared between threads or tasks. One `parking_lot::RwLock` guards the
//! whole vault:
//!
//! - every mutating call holds the write lock for its full duration, so two
//!   transitions never interleave (in particular two fulfillments for the
//!   same controller);
//! - views hold the read lock and therefore see a state between calls, never
//!   half of a `Pending` → `Claimable` move.
//!
//! The closures passed to [`read`](SharedVault::read) and
//! [`write`](SharedVault::write) must not block or await.

use std::sync::Arc;

use parking_lot::RwLock;
use tokio::sync::broadcast;

use crate::events::EventRecord;
use crate::ledger::{AssetLedger, Erc20Ledger};
use crate::vault::TokenVault;

/// Cloneable, thread-safe handle to one vault.
#[derive(Debug)]
pub struct SharedVault<A: AssetLedger = Erc20Ledger> {
    inner: Arc<RwLock<TokenVault<A>>>,
}

impl<A: AssetLedger> Clone for SharedVault<A> {
    fn clone(&self) -> Self {
        Self {
            inner: Arc::clone(&self.inner),
        }
    }
}

impl<A: AssetLedger> SharedVault<A> {
    /// Wraps a vault for sharing.
    pub fn new(vault: TokenVault<A>) -> Self {
        Self {
            inner: Arc::new(RwLock::new(vault)),
        }
    }

    /// Runs `f` against a consistent snapshot.
    pub fn read<R>(&self, f: impl FnOnce(&TokenVault<A>) -> R) -> R {
        let vault = self.inner.read();
        f(&vault)
    }

    /// Runs `f` with exclusive access.
    pub fn write<R>(&self, f: impl FnOnce(&mut TokenVault<A>) -> R) -> R {
        let mut vault = self.inner.write();
        f(&mut vault)
    }

    /// Live stream of event records committed from now on.
    pub fn subscribe(&self) -> broadcast::Receiver<EventRecord> {
        self.read(|vault| vault.subscribe())
    }
}

impl<A: AssetLedger> From<TokenVault<A>> for SharedVault<A> {
    fn from(vault: TokenVault<A>) -> Self {
        Self::new(vault)
    }
}
