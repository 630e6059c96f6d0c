//! # Scenario Replay
//!
//! A scenario is a JSON document listing asset funding plus a sequence of
//! vault operations, each naming its acting account. Steps are applied in
//! order through the shared vault handle; `keeper_poll` and `keeper_sweep`
//! steps hand control to the keeper in the middle of the script.
//!
//! ```json
//! {
//!   "funding": [{ "account": "0xa1a1…", "amount": "1000000000000000000000" }],
//!   "steps": [
//!     { "op": "request_deposit", "caller": "0xa1…", "assets": "100000000000000000000",
//!       "controller": "0xa1…", "owner": "0xa1…" },
//!     { "op": "keeper_poll" },
//!     { "op": "pause", "caller": "0xad…" },
//!     { "op": "request_deposit", "caller": "0xa1…", "assets": "1",
//!       "controller": "0xa1…", "owner": "0xa1…", "expect_error": true }
//!   ]
//! }
//! ```
//!
//! Amounts are strings (decimal or `0x` hex) because they routinely exceed
//! what a JSON number can hold exactly. A step marked `expect_error` must
//! fail; any other step must succeed, or the replay stops.

use std::path::Path;

use alloy_primitives::{Address, U256};
use anyhow::{bail, Context, Result};
use serde::{Deserialize, Serialize};
use tracing::info;

use tokenvault_engine::{
    AssetLedger, Keeper, Role, SharedVault, TokenVault, VaultResult,
};

use crate::metrics::KeeperMetrics;

/// Underlying-asset funding applied before the first step.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Funding {
    /// Account credited.
    pub account: Address,
    /// Amount minted on the asset ledger.
    pub amount: U256,
    /// Also give the vault an unlimited allowance over the account.
    #[serde(default = "default_true")]
    pub approve_vault: bool,
}

fn default_true() -> bool {
    true
}

/// One vault operation.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "op", rename_all = "snake_case")]
pub enum Action {
    RequestDeposit {
        caller: Address,
        assets: U256,
        controller: Address,
        owner: Address,
    },
    RequestRedeem {
        caller: Address,
        shares: U256,
        controller: Address,
        owner: Address,
    },
    CancelDeposit {
        caller: Address,
        controller: Address,
    },
    CancelRedeem {
        caller: Address,
        controller: Address,
    },
    MakeDepositClaimable {
        caller: Address,
        controller: Address,
    },
    MakeRedeemClaimable {
        caller: Address,
        controller: Address,
    },
    Deposit {
        caller: Address,
        assets: U256,
        receiver: Address,
        controller: Address,
    },
    Mint {
        caller: Address,
        shares: U256,
        receiver: Address,
        controller: Address,
    },
    Withdraw {
        caller: Address,
        assets: U256,
        receiver: Address,
        controller: Address,
    },
    Redeem {
        caller: Address,
        shares: U256,
        receiver: Address,
        controller: Address,
    },
    SetPrice {
        caller: Address,
        price: U256,
    },
    SetFee {
        caller: Address,
        fee: u64,
    },
    Pause {
        caller: Address,
    },
    Unpause {
        caller: Address,
    },
    FreezeAccount {
        caller: Address,
        account: Address,
    },
    UnfreezeAccount {
        caller: Address,
        account: Address,
    },
    SetOperator {
        caller: Address,
        operator: Address,
        approved: bool,
    },
    GrantRole {
        caller: Address,
        role: Role,
        account: Address,
    },
    RevokeRole {
        caller: Address,
        role: Role,
        account: Address,
    },
    Transfer {
        caller: Address,
        to: Address,
        amount: U256,
    },
    Approve {
        caller: Address,
        spender: Address,
        amount: U256,
    },
    TransferFrom {
        caller: Address,
        from: Address,
        to: Address,
        amount: U256,
    },
    /// Run one keeper poll over the log.
    KeeperPoll,
    /// Run one keeper sweep over pending state.
    KeeperSweep,
}

impl Action {
    /// Short name for logs.
    pub fn name(&self) -> &'static str {
        match self {
            Action::RequestDeposit { .. } => "request_deposit",
            Action::RequestRedeem { .. } => "request_redeem",
            Action::CancelDeposit { .. } => "cancel_deposit",
            Action::CancelRedeem { .. } => "cancel_redeem",
            Action::MakeDepositClaimable { .. } => "make_deposit_claimable",
            Action::MakeRedeemClaimable { .. } => "make_redeem_claimable",
            Action::Deposit { .. } => "deposit",
            Action::Mint { .. } => "mint",
            Action::Withdraw { .. } => "withdraw",
            Action::Redeem { .. } => "redeem",
            Action::SetPrice { .. } => "set_price",
            Action::SetFee { .. } => "set_fee",
            Action::Pause { .. } => "pause",
            Action::Unpause { .. } => "unpause",
            Action::FreezeAccount { .. } => "freeze_account",
            Action::UnfreezeAccount { .. } => "unfreeze_account",
            Action::SetOperator { .. } => "set_operator",
            Action::GrantRole { .. } => "grant_role",
            Action::RevokeRole { .. } => "revoke_role",
            Action::Transfer { .. } => "transfer",
            Action::Approve { .. } => "approve",
            Action::TransferFrom { .. } => "transfer_from",
            Action::KeeperPoll => "keeper_poll",
            Action::KeeperSweep => "keeper_sweep",
        }
    }

    /// Applies a vault operation. Keeper steps are handled by the caller.
    fn apply<A: AssetLedger>(&self, vault: &mut TokenVault<A>) -> VaultResult<()> {
        match *self {
            Action::RequestDeposit {
                caller,
                assets,
                controller,
                owner,
            } => vault
                .request_deposit(caller, assets, controller, owner)
                .map(drop),
            Action::RequestRedeem {
                caller,
                shares,
                controller,
                owner,
            } => vault
                .request_redeem(caller, shares, controller, owner)
                .map(drop),
            Action::CancelDeposit { caller, controller } => {
                vault.cancel_deposit(caller, controller).map(drop)
            }
            Action::CancelRedeem { caller, controller } => {
                vault.cancel_redeem(caller, controller).map(drop)
            }
            Action::MakeDepositClaimable { caller, controller } => {
                vault.make_deposit_claimable(caller, controller)
            }
            Action::MakeRedeemClaimable { caller, controller } => {
                vault.make_redeem_claimable(caller, controller)
            }
            Action::Deposit {
                caller,
                assets,
                receiver,
                controller,
            } => vault.deposit(caller, assets, receiver, controller).map(drop),
            Action::Mint {
                caller,
                shares,
                receiver,
                controller,
            } => vault.mint(caller, shares, receiver, controller).map(drop),
            Action::Withdraw {
                caller,
                assets,
                receiver,
                controller,
            } => vault
                .withdraw(caller, assets, receiver, controller)
                .map(drop),
            Action::Redeem {
                caller,
                shares,
                receiver,
                controller,
            } => vault.redeem(caller, shares, receiver, controller).map(drop),
            Action::SetPrice { caller, price } => vault.set_price(caller, price),
            Action::SetFee { caller, fee } => vault.set_fee(caller, fee),
            Action::Pause { caller } => vault.pause(caller),
            Action::Unpause { caller } => vault.unpause(caller),
            Action::FreezeAccount { caller, account } => vault.freeze_account(caller, account),
            Action::UnfreezeAccount { caller, account } => {
                vault.unfreeze_account(caller, account)
            }
            Action::SetOperator {
                caller,
                operator,
                approved,
            } => vault.set_operator(caller, operator, approved),
            Action::GrantRole {
                caller,
                role,
                account,
            } => vault.grant_role(caller, role, account),
            Action::RevokeRole {
                caller,
                role,
                account,
            } => vault.revoke_role(caller, role, account),
            Action::Transfer { caller, to, amount } => vault.transfer(caller, to, amount),
            Action::Approve {
                caller,
                spender,
                amount,
            } => vault.approve(caller, spender, amount),
            Action::TransferFrom {
                caller,
                from,
                to,
                amount,
            } => vault.transfer_from(caller, from, to, amount),
            Action::KeeperPoll | Action::KeeperSweep => Ok(()),
        }
    }
}

/// A scripted step.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Step {
    #[serde(flatten)]
    pub action: Action,
    /// The step is expected to be rejected by the vault.
    #[serde(default)]
    pub expect_error: bool,
}

/// A full scenario document.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Scenario {
    #[serde(default)]
    pub funding: Vec<Funding>,
    pub steps: Vec<Step>,
}

/// Tally of a finished replay.
#[derive(Debug, Default, Clone, PartialEq, Eq)]
pub struct ReplaySummary {
    /// Steps that succeeded.
    pub applied: usize,
    /// Steps that failed as the script expected.
    pub rejected: usize,
    /// Upkeeps performed by keeper steps.
    pub upkeeps: usize,
}

impl Scenario {
    /// Parses a scenario document.
    pub fn from_json_str(doc: &str) -> Result<Self> {
        serde_json::from_str(doc).context("failed to parse scenario")
    }

    /// Reads and parses a scenario file.
    pub fn load(path: &Path) -> Result<Self> {
        let doc = std::fs::read_to_string(path)
            .with_context(|| format!("failed to read scenario {}", path.display()))?;
        Self::from_json_str(&doc).with_context(|| format!("in {}", path.display()))
    }

    /// Credits the funding entries on the vault's asset ledger.
    pub fn fund(&self, vault: &SharedVault) -> Result<()> {
        vault.write(|v| {
            let custody = v.address();
            for entry in &self.funding {
                v.underlying_mut()
                    .mint_to(entry.account, entry.amount)
                    .with_context(|| format!("failed to fund {}", entry.account))?;
                if entry.approve_vault {
                    v.underlying_mut()
                        .approve(entry.account, custody, U256::MAX);
                }
            }
            Ok(())
        })
    }

    /// Applies every step in order. Stops at the first step whose outcome
    /// does not match its `expect_error` flag.
    pub fn replay(
        &self,
        vault: &SharedVault,
        keeper: &mut Keeper,
        metrics: &KeeperMetrics,
    ) -> Result<ReplaySummary> {
        let mut summary = ReplaySummary::default();

        for (index, step) in self.steps.iter().enumerate() {
            let op = step.action.name();
            let outcome = match step.action {
                Action::KeeperPoll => Ok(Some(keeper.poll(vault))),
                Action::KeeperSweep => Ok(Some(keeper.sweep(vault))),
                _ => vault.write(|v| step.action.apply(v)).map(|()| None),
            };

            match (outcome, step.expect_error) {
                (Ok(report), false) => {
                    summary.applied += 1;
                    if let Some(report) = report {
                        summary.upkeeps += report.fulfilled.len();
                        metrics.record(&report);
                    }
                    info!(step = index, op, "step applied");
                }
                (Err(error), true) => {
                    summary.rejected += 1;
                    info!(step = index, op, %error, "step rejected as expected");
                }
                (Ok(_), true) => bail!("step {index} ({op}) succeeded but was expected to fail"),
                (Err(error), false) => {
                    return Err(error).with_context(|| format!("step {index} ({op}) failed"));
                }
            }
        }
        Ok(summary)
    }
}
