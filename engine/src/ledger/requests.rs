//! # Request Ledger
//!
//! One slot per controller per request kind. A slot moves through
//!
//! ```text
//!            open            make_claimable          take
//!   None ───────────▶ Pending ─────────────▶ Claimable ─────▶ None
//!                        │                                  ▲
//!                        └──────────────── take ────────────┘
//!                          (cancel, or direct fulfillment)
//! ```
//!
//! An empty slot *is* the `None` state; there is no stored tombstone. The
//! book never moves value itself. The vault escrows or releases the asset
//! and shares and then records the transition here.

use std::collections::HashMap;

use alloy_primitives::{Address, U256};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::error::{VaultError, VaultResult};

/// Which side of the vault a request belongs to.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum RequestKind {
    /// Assets in, shares out.
    Deposit,
    /// Shares in, assets out.
    Redeem,
}

impl std::fmt::Display for RequestKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            RequestKind::Deposit => write!(f, "deposit"),
            RequestKind::Redeem => write!(f, "redeem"),
        }
    }
}

/// Lifecycle state of a controller's request slot.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum RequestStatus {
    /// No open request.
    None,
    /// Escrowed, waiting for an authorized party.
    Pending,
    /// Marked ready; value has not moved yet.
    Claimable,
}

impl std::fmt::Display for RequestStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            RequestStatus::None => write!(f, "None"),
            RequestStatus::Pending => write!(f, "Pending"),
            RequestStatus::Claimable => write!(f, "Claimable"),
        }
    }
}

/// An open deposit or redeem request.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Request {
    /// Vault-wide unique id, assigned at creation.
    pub id: u64,
    /// Deposit or redeem.
    pub kind: RequestKind,
    /// Account the request is tracked and settled for.
    pub controller: Address,
    /// Account whose assets or shares were escrowed; refunds go back here.
    pub owner: Address,
    /// Account that submitted the request (owner or one of its operators).
    pub requested_by: Address,
    /// Escrowed amount: assets for deposits, shares for redeems.
    pub amount: U256,
    /// `Pending` or `Claimable`; never `None` while stored.
    pub status: RequestStatus,
    /// When the request was opened.
    pub created_at: DateTime<Utc>,
    /// When the status last changed.
    pub updated_at: DateTime<Utc>,
}

/// All open requests of one kind, keyed by controller.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RequestBook {
    kind: RequestKind,
    slots: HashMap<Address, Request>,
}

impl RequestBook {
    /// Creates an empty book.
    pub fn new(kind: RequestKind) -> Self {
        Self {
            kind,
            slots: HashMap::new(),
        }
    }

    /// The open request for `controller`, if any.
    pub fn get(&self, controller: Address) -> Option<&Request> {
        self.slots.get(&controller)
    }

    /// Current status of `controller`'s slot.
    pub fn status(&self, controller: Address) -> RequestStatus {
        self.get(controller)
            .map(|r| r.status)
            .unwrap_or(RequestStatus::None)
    }

    /// Escrowed amount while `Pending`, else zero.
    pub fn pending_amount(&self, controller: Address) -> U256 {
        self.amount_in(controller, RequestStatus::Pending)
    }

    /// Escrowed amount while `Claimable`, else zero.
    pub fn claimable_amount(&self, controller: Address) -> U256 {
        self.amount_in(controller, RequestStatus::Claimable)
    }

    fn amount_in(&self, controller: Address, status: RequestStatus) -> U256 {
        match self.get(controller) {
            Some(r) if r.status == status => r.amount,
            _ => U256::ZERO,
        }
    }

    /// Fails with [`VaultError::PendingRequestExists`] if the slot is taken.
    pub fn ensure_vacant(&self, controller: Address) -> VaultResult<()> {
        if self.slots.contains_key(&controller) {
            return Err(VaultError::PendingRequestExists {
                controller,
                kind: self.kind,
            });
        }
        Ok(())
    }

    /// The request if it is still `Pending` (the only cancellable state).
    pub fn pending(&self, controller: Address) -> VaultResult<&Request> {
        match self.get(controller) {
            Some(r) if r.status == RequestStatus::Pending => Ok(r),
            _ => Err(VaultError::NoPendingRequest {
                controller,
                kind: self.kind,
            }),
        }
    }

    /// The open request if its amount is exactly `amount`.
    pub fn matching(&self, controller: Address, amount: U256) -> VaultResult<&Request> {
        match self.get(controller) {
            Some(r) if r.amount == amount => Ok(r),
            _ => Err(VaultError::NoMatchingRequest {
                controller,
                kind: self.kind,
                requested: amount,
            }),
        }
    }

    /// Records a new `Pending` request. The caller has already escrowed the
    /// value, so the slot must be vacant.
    pub(crate) fn open(
        &mut self,
        id: u64,
        controller: Address,
        owner: Address,
        requested_by: Address,
        amount: U256,
    ) -> VaultResult<&Request> {
        self.ensure_vacant(controller)?;
        let now = Utc::now();
        let request = Request {
            id,
            kind: self.kind,
            controller,
            owner,
            requested_by,
            amount,
            status: RequestStatus::Pending,
            created_at: now,
            updated_at: now,
        };
        let slot = self.slots.entry(controller).or_insert(request);
        Ok(&*slot)
    }

    /// `Pending` → `Claimable`.
    pub(crate) fn make_claimable(&mut self, controller: Address) -> VaultResult<&Request> {
        let kind = self.kind;
        match self.slots.get_mut(&controller) {
            Some(r) if r.status == RequestStatus::Pending => {
                r.status = RequestStatus::Claimable;
                r.updated_at = Utc::now();
                Ok(&*r)
            }
            _ => Err(VaultError::NoPendingRequest { controller, kind }),
        }
    }

    /// Clears the slot back to `None`, returning what was there.
    pub(crate) fn take(&mut self, controller: Address) -> Option<Request> {
        self.slots.remove(&controller)
    }

    /// All requests still `Pending`, oldest id first.
    pub fn pending_requests(&self) -> Vec<&Request> {
        let mut open: Vec<&Request> = self
            .slots
            .values()
            .filter(|r| r.status == RequestStatus::Pending)
            .collect();
        open.sort_by_key(|r| r.id);
        open
    }

    /// Sum of escrowed amounts over every open request.
    pub fn total_escrowed(&self) -> U256 {
        self.slots
            .values()
            .fold(U256::ZERO, |acc, r| acc.saturating_add(r.amount))
    }

    /// Number of open requests.
    pub fn len(&self) -> usize {
        self.slots.len()
    }

    /// Returns `true` if no request is open.
    pub fn is_empty(&self) -> bool {
        self.slots.is_empty()
    }
}

/// Deposit and redeem books plus the id counter they share.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RequestLedger {
    /// Open deposit requests.
    pub deposits: RequestBook,
    /// Open redeem requests.
    pub redeems: RequestBook,
    next_id: u64,
}

impl RequestLedger {
    /// Creates empty books. Ids start at 1.
    pub fn new() -> Self {
        Self {
            deposits: RequestBook::new(RequestKind::Deposit),
            redeems: RequestBook::new(RequestKind::Redeem),
            next_id: 1,
        }
    }

    /// The book for `kind`.
    pub fn book(&self, kind: RequestKind) -> &RequestBook {
        match kind {
            RequestKind::Deposit => &self.deposits,
            RequestKind::Redeem => &self.redeems,
        }
    }

    pub(crate) fn book_mut(&mut self, kind: RequestKind) -> &mut RequestBook {
        match kind {
            RequestKind::Deposit => &mut self.deposits,
            RequestKind::Redeem => &mut self.redeems,
        }
    }

    /// Id the next request will receive.
    pub fn peek_id(&self) -> u64 {
        self.next_id
    }

    /// Everything [`open`](Self::open) checks, without mutating. The vault
    /// calls this before escrowing so a later `open` cannot fail.
    pub fn ensure_can_open(&self, kind: RequestKind, controller: Address) -> VaultResult<()> {
        self.book(kind).ensure_vacant(controller)?;
        self.next_id
            .checked_add(1)
            .map(|_| ())
            .ok_or(VaultError::ArithmeticOverflow)
    }

    /// Allocates an id and records a `Pending` request under it.
    pub(crate) fn open(
        &mut self,
        kind: RequestKind,
        controller: Address,
        owner: Address,
        requested_by: Address,
        amount: U256,
    ) -> VaultResult<u64> {
        self.ensure_can_open(kind, controller)?;
        let id = self.next_id;
        self.book_mut(kind)
            .open(id, controller, owner, requested_by, amount)?;
        self.next_id += 1;
        Ok(id)
    }
}

impl Default for RequestLedger {
    fn default() -> Self {
        Self::new()
    }
}
