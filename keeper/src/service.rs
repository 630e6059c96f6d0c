//! # Keeper Service Loop
//!
//! Drives a [`Keeper`] against a shared vault on a fixed cadence. Each round
//! polls the event log for new deposit requests, sweeps vault state for
//! pending deposits the log walk missed or failed on (unless disabled), and
//! folds the outcome into the metrics.
//!
//! ## Shutdown
//!
//! The loop watches a `tokio::sync::watch` channel. When it flips to `true`
//! the loop exits after the round in progress; a sleeping loop wakes up
//! immediately. Vault operations never straddle a round boundary, so no
//! request is left half-fulfilled.

use std::time::Duration;

use tokio::sync::watch;
use tracing::{debug, info};

use tokenvault_engine::{Keeper, KeeperReport, PendingRequestScanner, SharedVault};

use crate::metrics::KeeperMetrics;

// ---------------------------------------------------------------------------
// Configuration
// ---------------------------------------------------------------------------

/// Timing and behavior of the keeper loop.
#[derive(Debug, Clone)]
pub struct KeeperServiceConfig {
    /// Time between rounds, in milliseconds.
    pub poll_interval_ms: u64,
    /// Sweep state each round. This is what retries upkeeps that failed
    /// after the cursor moved past their request.
    pub sweep: bool,
    /// Stop after this many rounds. `None` runs until shutdown.
    pub max_rounds: Option<u64>,
}

impl Default for KeeperServiceConfig {
    fn default() -> Self {
        Self {
            poll_interval_ms: 1_000,
            sweep: true,
            max_rounds: None,
        }
    }
}

// ---------------------------------------------------------------------------
// KeeperService
// ---------------------------------------------------------------------------

/// Outcome of one keeper round.
#[derive(Debug, Default)]
pub struct RoundOutcome {
    /// Result of following the log.
    pub poll: KeeperReport,
    /// Result of the state sweep, when enabled.
    pub sweep: Option<KeeperReport>,
    /// Deposit requests still pending after the round.
    pub pending_after: usize,
}

impl RoundOutcome {
    /// Upkeeps performed across poll and sweep.
    pub fn fulfilled(&self) -> usize {
        self.poll.fulfilled.len() + self.sweep.as_ref().map_or(0, |s| s.fulfilled.len())
    }

    /// Upkeeps rejected across poll and sweep.
    pub fn failed(&self) -> usize {
        self.poll.failed.len() + self.sweep.as_ref().map_or(0, |s| s.failed.len())
    }
}

/// The async keeper loop.
pub struct KeeperService {
    vault: SharedVault,
    keeper: Keeper,
    metrics: KeeperMetrics,
    config: KeeperServiceConfig,
}

impl KeeperService {
    /// Wires a keeper to a vault. Does not start the loop.
    pub fn new(
        vault: SharedVault,
        keeper: Keeper,
        metrics: KeeperMetrics,
        config: KeeperServiceConfig,
    ) -> Self {
        Self {
            vault,
            keeper,
            metrics,
            config,
        }
    }

    /// The keeper, with its current log cursor.
    pub fn keeper(&self) -> &Keeper {
        &self.keeper
    }

    /// Runs rounds until shutdown or until `max_rounds` is reached.
    /// Returns the number of rounds completed.
    pub async fn run(&mut self, mut shutdown: watch::Receiver<bool>) -> u64 {
        info!(
            keeper = %self.keeper.address(),
            interval_ms = self.config.poll_interval_ms,
            sweep = self.config.sweep,
            "keeper loop starting"
        );
        let mut rounds = 0u64;

        loop {
            if *shutdown.borrow() {
                info!(rounds, "keeper loop received shutdown signal, exiting cleanly");
                return rounds;
            }

            let outcome = self.run_single_round();
            rounds += 1;
            if outcome.fulfilled() > 0 || outcome.failed() > 0 {
                info!(
                    round = rounds,
                    fulfilled = outcome.fulfilled(),
                    failed = outcome.failed(),
                    pending = outcome.pending_after,
                    "keeper round completed"
                );
            } else {
                debug!(round = rounds, observed = outcome.poll.observed, "idle round");
            }

            if self.config.max_rounds.is_some_and(|max| rounds >= max) {
                info!(rounds, "round limit reached, keeper loop exiting");
                return rounds;
            }

            tokio::select! {
                _ = tokio::time::sleep(Duration::from_millis(self.config.poll_interval_ms)) => {}
                _ = shutdown.changed() => {
                    info!(rounds, "keeper loop shutting down during sleep");
                    return rounds;
                }
            }
        }
    }

    /// Executes one round: poll the log, optionally sweep, update metrics.
    pub fn run_single_round(&mut self) -> RoundOutcome {
        let poll = self.keeper.poll(&self.vault);
        self.metrics.record(&poll);

        let sweep = if self.config.sweep {
            let report = self.keeper.sweep(&self.vault);
            self.metrics.record(&report);
            Some(report)
        } else {
            None
        };

        let pending_after = self.vault.read(|v| v.pending_deposits().len());
        self.metrics.pending_deposits.set(pending_after as i64);
        self.metrics.rounds_total.inc();

        RoundOutcome {
            poll,
            sweep,
            pending_after,
        }
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
