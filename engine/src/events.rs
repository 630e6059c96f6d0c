//! # Audit Log
//!
//! The vault's only externally observable trail. Every successful state
//! transition appends its records in one batch at the very end of the call,
//! so a failed call never leaves a record behind.
//!
//! Consumers can either poll ([`EventLog::since`] with a cursor) or
//! [`subscribe`](EventLog::subscribe) to a broadcast stream. A subscriber
//! that lags past [`EVENT_CHANNEL_CAPACITY`] gets a `Lagged` error on its
//! receiver and should fall back to polling from its last sequence number.

use alloy_primitives::{Address, U256};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use tokio::sync::broadcast;

use crate::access::Role;
use crate::config::EVENT_CHANNEL_CAPACITY;

/// Something that happened in the vault.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "type")]
pub enum VaultEvent {
    /// A deposit request was opened and its assets escrowed.
    DepositRequest {
        controller: Address,
        owner: Address,
        request_id: u64,
        sender: Address,
        assets: U256,
    },
    /// A redeem request was opened and its shares escrowed.
    RedeemRequest {
        controller: Address,
        owner: Address,
        request_id: u64,
        sender: Address,
        shares: U256,
    },
    /// A pending deposit was cancelled and refunded.
    DepositCancelled {
        controller: Address,
        owner: Address,
        request_id: u64,
        assets: U256,
    },
    /// A pending redeem was cancelled and refunded.
    RedeemCancelled {
        controller: Address,
        owner: Address,
        request_id: u64,
        shares: U256,
    },
    /// A deposit request moved to `Claimable`.
    DepositClaimable {
        controller: Address,
        request_id: u64,
        assets: U256,
    },
    /// A redeem request moved to `Claimable`.
    RedeemClaimable {
        controller: Address,
        request_id: u64,
        shares: U256,
    },
    /// A deposit request was fulfilled.
    Deposit {
        sender: Address,
        owner: Address,
        request_id: u64,
        assets: U256,
        shares: U256,
    },
    /// A redeem request was fulfilled.
    Withdraw {
        sender: Address,
        receiver: Address,
        owner: Address,
        request_id: u64,
        assets: U256,
        shares: U256,
    },
    /// Shares moved. `from == 0` is a mint, `to == 0` a burn.
    Transfer {
        from: Address,
        to: Address,
        value: U256,
    },
    /// A share allowance was set.
    Approval {
        owner: Address,
        spender: Address,
        value: U256,
    },
    /// The vault was paused.
    Paused { account: Address },
    /// The vault was unpaused.
    Unpaused { account: Address },
    /// An account was added to the frozen set.
    AccountFrozen { account: Address },
    /// An account was removed from the frozen set.
    AccountUnfrozen { account: Address },
    /// An operator approval changed.
    OperatorSet {
        controller: Address,
        operator: Address,
        approved: bool,
    },
    /// A role was granted.
    RoleGranted {
        role: Role,
        account: Address,
        sender: Address,
    },
    /// A role was revoked.
    RoleRevoked {
        role: Role,
        account: Address,
        sender: Address,
    },
    /// The share price changed.
    PriceUpdated { old_price: U256, new_price: U256 },
    /// The fee changed.
    FeeUpdated { old_fee: u64, new_fee: u64 },
}

impl VaultEvent {
    /// Short event name, as used in logs.
    pub fn name(&self) -> &'static str {
        match self {
            VaultEvent::DepositRequest { .. } => "DepositRequest",
            VaultEvent::RedeemRequest { .. } => "RedeemRequest",
            VaultEvent::DepositCancelled { .. } => "DepositCancelled",
            VaultEvent::RedeemCancelled { .. } => "RedeemCancelled",
            VaultEvent::DepositClaimable { .. } => "DepositClaimable",
            VaultEvent::RedeemClaimable { .. } => "RedeemClaimable",
            VaultEvent::Deposit { .. } => "Deposit",
            VaultEvent::Withdraw { .. } => "Withdraw",
            VaultEvent::Transfer { .. } => "Transfer",
            VaultEvent::Approval { .. } => "Approval",
            VaultEvent::Paused { .. } => "Paused",
            VaultEvent::Unpaused { .. } => "Unpaused",
            VaultEvent::AccountFrozen { .. } => "AccountFrozen",
            VaultEvent::AccountUnfrozen { .. } => "AccountUnfrozen",
            VaultEvent::OperatorSet { .. } => "OperatorSet",
            VaultEvent::RoleGranted { .. } => "RoleGranted",
            VaultEvent::RoleRevoked { .. } => "RoleRevoked",
            VaultEvent::PriceUpdated { .. } => "PriceUpdated",
            VaultEvent::FeeUpdated { .. } => "FeeUpdated",
        }
    }
}

/// An event as stored in the log.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct EventRecord {
    /// Position in the log, starting at 0. Use `sequence + 1` as the next
    /// polling cursor.
    pub sequence: u64,
    /// Address of the vault that emitted the record.
    pub source: Address,
    /// Wall-clock time the batch was committed.
    pub timestamp: DateTime<Utc>,
    /// What happened.
    pub event: VaultEvent,
}

/// Append-only event log with a broadcast fan-out.
#[derive(Debug)]
pub struct EventLog {
    source: Address,
    records: Vec<EventRecord>,
    sender: broadcast::Sender<EventRecord>,
}

impl EventLog {
    /// Creates an empty log for the vault at `source`.
    pub fn new(source: Address) -> Self {
        let (sender, _) = broadcast::channel(EVENT_CHANNEL_CAPACITY);
        Self {
            source,
            records: Vec::new(),
            sender,
        }
    }

    /// Appends a batch. Called once, after the operation has fully applied.
    pub(crate) fn commit(&mut self, batch: Vec<VaultEvent>) {
        let timestamp = Utc::now();
        for event in batch {
            let record = EventRecord {
                sequence: self.records.len() as u64,
                source: self.source,
                timestamp,
                event,
            };
            // No subscribers is not an error; the record stays pollable.
            let _ = self.sender.send(record.clone());
            self.records.push(record);
        }
    }

    /// Every record, oldest first.
    pub fn records(&self) -> &[EventRecord] {
        &self.records
    }

    /// Records with `sequence >= cursor`.
    pub fn since(&self, cursor: u64) -> &[EventRecord] {
        let start = usize::try_from(cursor)
            .unwrap_or(usize::MAX)
            .min(self.records.len());
        &self.records[start..]
    }

    /// The cursor that would return only records appended from now on.
    pub fn next_cursor(&self) -> u64 {
        self.records.len() as u64
    }

    /// Number of records.
    pub fn len(&self) -> usize {
        self.records.len()
    }

    /// Returns `true` if nothing has been logged.
    pub fn is_empty(&self) -> bool {
        self.records.is_empty()
    }

    /// Opens a live stream of records committed after this call.
    pub fn subscribe(&self) -> broadcast::Receiver<EventRecord> {
        self.sender.subscribe()
    }
}
