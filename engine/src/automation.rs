//! # Automated Fulfillment
//!
//! A pull-based stand-in for log-triggered automation. Nothing here runs on
//! its own; an external scheduler decides when to look.
//!
//! ```text
//!   EventRecord ──check_log──▶ UpkeepCheck { perform_data }
//!                                   │
//!                                   ▼
//!                  perform_upkeep(perform_data)  (Keeper role)
//!                                   │
//!                                   ▼
//!                  deposit fulfilled, receiver = controller
//! ```
//!
//! `perform_data` is a bincode-encoded [`PerformData`]. It names the request
//! id as well as the controller and amount, so replaying a payload after the
//! request was fulfilled fails with `NoMatchingRequest` even if the same
//! controller has since opened a new request of the same size.
//!
//! [`Keeper`] packages the loop body: follow the log from a cursor, check
//! every new record, perform what is needed, and report what happened.
//! [`PendingRequestScanner`] is the fallback for requests whose event was
//! missed.

use alloy_primitives::{Address, U256};
use serde::{Deserialize, Serialize};
use tracing::{debug, info, warn};

use crate::access::Role;
use crate::error::{VaultError, VaultResult};
use crate::events::{EventRecord, VaultEvent};
use crate::handle::SharedVault;
use crate::ledger::AssetLedger;
use crate::vault::TokenVault;

// ---------------------------------------------------------------------------
// Perform Data
// ---------------------------------------------------------------------------

/// Everything `perform_upkeep` needs to fulfill one deposit request.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct PerformData {
    /// Id of the request to fulfill.
    pub request_id: u64,
    /// Controller of the request; also the share receiver.
    pub controller: Address,
    /// Escrowed asset amount.
    pub assets: U256,
}

impl PerformData {
    /// Encodes to the opaque byte form passed between check and perform.
    pub fn encode(&self) -> VaultResult<Vec<u8>> {
        bincode::serialize(self).map_err(|e| VaultError::InvalidPerformData(e.to_string()))
    }

    /// Decodes perform data produced by [`encode`](Self::encode).
    pub fn decode(bytes: &[u8]) -> VaultResult<Self> {
        bincode::deserialize(bytes).map_err(|e| VaultError::InvalidPerformData(e.to_string()))
    }
}

/// Result of [`TokenVault::check_log`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct UpkeepCheck {
    /// `true` if the record calls for a `perform_upkeep`.
    pub upkeep_needed: bool,
    /// Encoded [`PerformData`]; empty when no upkeep is needed.
    pub perform_data: Vec<u8>,
}

impl UpkeepCheck {
    fn not_needed() -> Self {
        Self {
            upkeep_needed: false,
            perform_data: Vec::new(),
        }
    }
}

// ---------------------------------------------------------------------------
// Check / Perform
// ---------------------------------------------------------------------------

impl<A: AssetLedger> TokenVault<A> {
    /// Inspects a log record. Only a `DepositRequest` emitted by this vault
    /// needs upkeep. `_extra` is accepted for interface parity and ignored.
    pub fn check_log(&self, record: &EventRecord, _extra: &[u8]) -> VaultResult<UpkeepCheck> {
        if record.source != self.address() {
            return Ok(UpkeepCheck::not_needed());
        }
        let VaultEvent::DepositRequest {
            controller,
            request_id,
            assets,
            ..
        } = record.event
        else {
            return Ok(UpkeepCheck::not_needed());
        };

        let data = PerformData {
            request_id,
            controller,
            assets,
        };
        let perform_data = data.encode()?;
        debug!(
            sequence = record.sequence,
            request_id,
            %controller,
            perform_data = %hex::encode(&perform_data),
            "upkeep needed"
        );
        Ok(UpkeepCheck {
            upkeep_needed: true,
            perform_data,
        })
    }

    /// Fulfills the deposit named by `perform_data`, minting to its
    /// controller. Keeper only. Returns the shares minted.
    ///
    /// # Errors
    ///
    /// - [`VaultError::MissingRole`] if `caller` is not a keeper.
    /// - [`VaultError::InvalidPerformData`] if the bytes do not decode.
    /// - [`VaultError::NoMatchingRequest`] if the request is gone (replay),
    ///   or the open one has a different id or amount.
    /// - Anything [`deposit`](Self::deposit) can fail with.
    pub fn perform_upkeep(&mut self, caller: Address, perform_data: &[u8]) -> VaultResult<U256> {
        self.authorize(&[Role::Keeper], caller, "perform_upkeep")?;
        let data = PerformData::decode(perform_data)?;
        debug!(request_id = data.request_id, controller = %data.controller, "perform data decoded");

        let shares = self.fulfill_deposit(
            caller,
            data.assets,
            data.controller,
            data.controller,
            Some(data.request_id),
        )?;
        info!(request_id = data.request_id, %shares, "upkeep performed");
        Ok(shares)
    }
}

// ---------------------------------------------------------------------------
// Scanner
// ---------------------------------------------------------------------------

/// Source of deposit requests still waiting for fulfillment, for schedulers
/// that scan state instead of following the log.
pub trait PendingRequestScanner {
    /// Every `Pending` deposit request, oldest first.
    fn pending_deposits(&self) -> Vec<PerformData>;
}

impl<A: AssetLedger> PendingRequestScanner for TokenVault<A> {
    fn pending_deposits(&self) -> Vec<PerformData> {
        self.requests()
            .deposits
            .pending_requests()
            .into_iter()
            .map(|r| PerformData {
                request_id: r.id,
                controller: r.controller,
                assets: r.amount,
            })
            .collect()
    }
}

// ---------------------------------------------------------------------------
// Keeper
// ---------------------------------------------------------------------------

/// A successfully performed upkeep.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct FulfilledUpkeep {
    /// The request that was fulfilled.
    pub request: PerformData,
    /// Shares minted to the controller.
    pub shares: U256,
}

/// An upkeep that could not be performed.
#[derive(Debug)]
pub struct FailedUpkeep {
    /// The request, when the perform data could be decoded.
    pub request: Option<PerformData>,
    /// Why it failed.
    pub error: VaultError,
}

/// What one [`Keeper::poll`] or [`Keeper::sweep`] did.
#[derive(Debug, Default)]
pub struct KeeperReport {
    /// Log records inspected (zero for a sweep).
    pub observed: usize,
    /// Upkeeps performed.
    pub fulfilled: Vec<FulfilledUpkeep>,
    /// Upkeeps attempted and rejected.
    pub failed: Vec<FailedUpkeep>,
}

impl KeeperReport {
    /// Returns `true` if nothing was attempted.
    pub fn is_idle(&self) -> bool {
        self.fulfilled.is_empty() && self.failed.is_empty()
    }
}

/// Follows a vault's log and performs upkeep as a keeper account.
#[derive(Debug, Clone)]
pub struct Keeper {
    address: Address,
    cursor: u64,
}

impl Keeper {
    /// A keeper that will look at the log from the very first record.
    pub fn new(address: Address) -> Self {
        Self::starting_at(address, 0)
    }

    /// A keeper that resumes at `cursor`.
    pub fn starting_at(address: Address, cursor: u64) -> Self {
        Self { address, cursor }
    }

    /// The keeper's account.
    pub fn address(&self) -> Address {
        self.address
    }

    /// Sequence number of the next record to look at.
    pub fn cursor(&self) -> u64 {
        self.cursor
    }

    /// Checks every record appended since the last poll and performs the
    /// upkeeps they call for.
    ///
    /// Records are collected under the read lock; each perform then takes
    /// the write lock on its own, so other callers interleave between them.
    pub fn poll<A: AssetLedger>(&mut self, vault: &SharedVault<A>) -> KeeperReport {
        let mut report = KeeperReport::default();

        let (payloads, next_cursor) = vault.read(|v| {
            let records = v.events_since(self.cursor);
            report.observed = records.len();
            let mut payloads = Vec::new();
            for record in records {
                match v.check_log(record, &[]) {
                    Ok(check) if check.upkeep_needed => payloads.push(check.perform_data),
                    Ok(_) => {}
                    Err(error) => {
                        warn!(sequence = record.sequence, %error, "check_log failed");
                        report.failed.push(FailedUpkeep {
                            request: None,
                            error,
                        });
                    }
                }
            }
            (payloads, v.events().next_cursor())
        });
        self.cursor = next_cursor;

        for payload in payloads {
            self.perform(vault, &payload, &mut report);
        }
        report
    }

    /// Performs upkeep for every pending deposit found by scanning state,
    /// whether or not its event was seen. Does not move the cursor.
    pub fn sweep<A: AssetLedger>(&mut self, vault: &SharedVault<A>) -> KeeperReport {
        let mut report = KeeperReport::default();
        let pending = vault.read(|v| v.pending_deposits());

        for data in pending {
            match data.encode() {
                Ok(payload) => self.perform(vault, &payload, &mut report),
                Err(error) => report.failed.push(FailedUpkeep {
                    request: Some(data),
                    error,
                }),
            }
        }
        report
    }

    fn perform<A: AssetLedger>(
        &self,
        vault: &SharedVault<A>,
        payload: &[u8],
        report: &mut KeeperReport,
    ) {
        let request = PerformData::decode(payload).ok();
        match vault.write(|v| v.perform_upkeep(self.address, payload)) {
            Ok(shares) => {
                if let Some(request) = request {
                    report.fulfilled.push(FulfilledUpkeep { request, shares });
                }
            }
            Err(error) => {
                warn!(
                    keeper = %self.address,
                    request_id = request.map(|r| r.request_id),
                    %error,
                    "upkeep failed"
                );
                report.failed.push(FailedUpkeep { request, error });
            }
        }
    }
}
