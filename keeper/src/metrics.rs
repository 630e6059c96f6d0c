//! # Prometheus Metrics
//!
//! Counters for what the keeper observed and did. Kept in a dedicated
//! [`prometheus::Registry`] and rendered in the text exposition format on
//! demand (`--print-metrics`); there is no scrape endpoint.

use prometheus::{Encoder, IntCounter, IntGauge, Registry, TextEncoder};
use tokenvault_engine::KeeperReport;

/// Metric handles for one keeper process.
#[derive(Clone)]
pub struct KeeperMetrics {
    registry: Registry,
    /// Log records inspected by `poll`.
    pub events_observed_total: IntCounter,
    /// Upkeeps that fulfilled a deposit.
    pub upkeeps_performed_total: IntCounter,
    /// Upkeeps the vault rejected.
    pub upkeeps_failed_total: IntCounter,
    /// Keeper rounds completed.
    pub rounds_total: IntCounter,
    /// Deposit requests still pending after the last round.
    pub pending_deposits: IntGauge,
}

impl KeeperMetrics {
    /// Creates and registers all metrics.
    pub fn new() -> Result<Self, prometheus::Error> {
        let registry = Registry::new_custom(Some("tokenvault".into()), None)?;

        let events_observed_total = IntCounter::new(
            "keeper_events_observed_total",
            "Vault log records inspected by the keeper",
        )?;
        registry.register(Box::new(events_observed_total.clone()))?;

        let upkeeps_performed_total = IntCounter::new(
            "keeper_upkeeps_performed_total",
            "Deposit requests fulfilled through perform_upkeep",
        )?;
        registry.register(Box::new(upkeeps_performed_total.clone()))?;

        let upkeeps_failed_total = IntCounter::new(
            "keeper_upkeeps_failed_total",
            "Upkeeps rejected by the vault",
        )?;
        registry.register(Box::new(upkeeps_failed_total.clone()))?;

        let rounds_total = IntCounter::new("keeper_rounds_total", "Keeper rounds completed")?;
        registry.register(Box::new(rounds_total.clone()))?;

        let pending_deposits = IntGauge::new(
            "vault_pending_deposits",
            "Deposit requests pending after the last keeper round",
        )?;
        registry.register(Box::new(pending_deposits.clone()))?;

        Ok(Self {
            registry,
            events_observed_total,
            upkeeps_performed_total,
            upkeeps_failed_total,
            rounds_total,
            pending_deposits,
        })
    }

    /// Folds one poll or sweep into the counters.
    pub fn record(&self, report: &KeeperReport) {
        self.events_observed_total.inc_by(report.observed as u64);
        self.upkeeps_performed_total
            .inc_by(report.fulfilled.len() as u64);
        self.upkeeps_failed_total.inc_by(report.failed.len() as u64);
    }

    /// Encodes all registered metrics into the Prometheus text format.
    pub fn encode(&self) -> Result<String, prometheus::Error> {
        let encoder = TextEncoder::new();
        let metric_families = self.registry.gather();
        let mut buffer = Vec::new();
        encoder.encode(&metric_families, &mut buffer)?;
        String::from_utf8(buffer).map_err(|e| prometheus::Error::Msg(e.to_string()))
    }
}
