// Copyright (c) 2026 ALAS Technology. MIT License.
// See LICENSE for details.

//! # Token Vault Keeper
//!
//! Entry point for the `tokenvault-keeper` binary. Builds a vault from a
//! JSON configuration, grants the keeper account its role, and then either
//! replays a scenario or runs the fulfillment loop.
//!
//! - `run`          — keeper loop until Ctrl+C (optionally after a scenario)
//! - `simulate`     — replay a scenario, then print the event log
//! - `check-config` — validate a vault configuration
//! - `version`      — print build version information
//!
//! Vault events go to stdout as JSON lines. Logs go to stderr.

mod cli;
mod logging;
mod metrics;
mod scenario;
mod service;

use std::io::Write;
use std::path::Path;

use anyhow::{Context, Result};
use clap::Parser;
use tokio::signal;
use tokio::sync::{broadcast, watch};

use tokenvault_engine::{Erc20Ledger, EventRecord, Keeper, SharedVault, TokenVault, VaultInit};

use cli::{Commands, KeeperCli};
use metrics::KeeperMetrics;
use scenario::Scenario;
use service::{KeeperService, KeeperServiceConfig};

#[tokio::main]
async fn main() -> Result<()> {
    let cli = KeeperCli::parse();
    logging::init_logging(logging::DEFAULT_FILTER, cli.log_format);

    match cli.command {
        Commands::Run(args) => run_keeper(args).await,
        Commands::Simulate(args) => simulate(args),
        Commands::CheckConfig(args) => check_config(&args.config),
        Commands::Version => {
            print_version();
            Ok(())
        }
    }
}

/// Reads and validates a vault configuration file.
fn load_config(path: &Path) -> Result<VaultInit> {
    let doc = std::fs::read_to_string(path)
        .with_context(|| format!("failed to read vault config {}", path.display()))?;
    VaultInit::from_json_str(&doc)
        .with_context(|| format!("invalid vault config {}", path.display()))
}

/// Builds a vault over a fresh in-memory asset ledger and grants `keeper`
/// the Keeper role on behalf of the configured admin.
fn build_vault(args: &cli::VaultArgs) -> Result<SharedVault> {
    let init = load_config(&args.config)?;
    let admin = init.admin;
    let token = Erc20Ledger::new(init.asset, "Underlying", "UND");

    let mut vault = TokenVault::new(init, token).context("failed to construct vault")?;
    vault
        .grant_keeper_role(admin, args.keeper)
        .context("failed to grant keeper role")?;

    tracing::info!(
        vault = %vault.address(),
        asset = %vault.asset(),
        keeper = %args.keeper,
        price = %vault.get_price(),
        fee = vault.fee(),
        "vault ready"
    );
    Ok(SharedVault::new(vault))
}

/// Runs the keeper loop, streaming every committed event to stdout.
async fn run_keeper(args: cli::RunArgs) -> Result<()> {
    let vault = build_vault(&args.vault)?;
    let metrics = KeeperMetrics::new().context("failed to register metrics")?;
    let mut keeper = Keeper::new(args.vault.keeper);

    // Records committed during construction are printed up front; the
    // subscription picks up everything after.
    let events = vault.subscribe();
    vault.read(|v| print_records(v.events().records()))?;
    let printer = tokio::spawn(forward_events(events));

    if let Some(path) = &args.scenario {
        let scenario = Scenario::load(path)?;
        scenario.fund(&vault)?;
        let summary = scenario.replay(&vault, &mut keeper, &metrics)?;
        tracing::info!(
            applied = summary.applied,
            rejected = summary.rejected,
            upkeeps = summary.upkeeps,
            "scenario replayed"
        );
    }

    let (shutdown_tx, shutdown_rx) = watch::channel(false);
    let mut service = KeeperService::new(
        vault.clone(),
        keeper,
        metrics.clone(),
        KeeperServiceConfig {
            poll_interval_ms: args.poll_interval_ms,
            sweep: args.sweep,
            max_rounds: args.rounds,
        },
    );
    let mut keeper_loop = tokio::spawn(async move { service.run(shutdown_rx).await });

    let rounds = tokio::select! {
        res = &mut keeper_loop => res.context("keeper loop panicked")?,
        _ = shutdown_signal() => {
            tracing::info!("shutdown signal received, stopping keeper loop");
            // A closed receiver means the loop already returned.
            let _ = shutdown_tx.send(true);
            keeper_loop.await.context("keeper loop panicked")?
        }
    };

    printer.abort();
    if args.vault.print_metrics {
        print!("{}", metrics.encode()?);
    }
    tracing::info!(rounds, "tokenvault-keeper stopped");
    Ok(())
}

/// Replays a scenario to completion and prints the resulting event log.
fn simulate(args: cli::SimulateArgs) -> Result<()> {
    let vault = build_vault(&args.vault)?;
    let metrics = KeeperMetrics::new().context("failed to register metrics")?;
    let mut keeper = Keeper::new(args.vault.keeper);

    let scenario = Scenario::load(&args.scenario)?;
    scenario.fund(&vault)?;
    let summary = scenario.replay(&vault, &mut keeper, &metrics)?;

    vault.read(|v| print_records(v.events().records()))?;
    vault.read(|v| {
        tracing::info!(
            steps = scenario.steps.len(),
            applied = summary.applied,
            rejected = summary.rejected,
            upkeeps = summary.upkeeps,
            total_supply = %v.total_supply(),
            total_assets = %v.total_assets(),
            open_deposit_requests = v.requests().deposits.len(),
            open_redeem_requests = v.requests().redeems.len(),
            "simulation complete"
        );
    });

    if args.vault.print_metrics {
        print!("{}", metrics.encode()?);
    }
    Ok(())
}

/// Validates a configuration file and prints the effective settings.
fn check_config(path: &Path) -> Result<()> {
    let init = load_config(path)?;
    println!("vault_address  {}", init.vault_address);
    println!("asset          {}", init.asset);
    println!("share token    {} ({})", init.name, init.symbol);
    println!("admin          {}", init.admin);
    println!("price_setter   {}", init.price_setter);
    println!("fee            {}/1000", init.fee_bps());
    println!("price          {}", init.price());
    tracing::info!(path = %path.display(), "configuration is valid");
    Ok(())
}

/// Writes records to stdout, one JSON object per line.
fn print_records(records: &[EventRecord]) -> Result<()> {
    let stdout = std::io::stdout();
    let mut out = stdout.lock();
    for record in records {
        serde_json::to_writer(&mut out, record).context("failed to encode event")?;
        writeln!(out)?;
    }
    out.flush()?;
    Ok(())
}

/// Forwards live records to stdout until the vault is dropped.
async fn forward_events(mut events: broadcast::Receiver<EventRecord>) {
    loop {
        match events.recv().await {
            Ok(record) => {
                if let Err(e) = print_records(std::slice::from_ref(&record)) {
                    tracing::error!("event output failed: {:#}", e);
                    return;
                }
            }
            Err(broadcast::error::RecvError::Lagged(skipped)) => {
                tracing::warn!(skipped, "event stream lagged, records dropped from stdout");
            }
            Err(broadcast::error::RecvError::Closed) => return,
        }
    }
}

/// Prints version information to stdout.
fn print_version() {
    println!("tokenvault-keeper {}", env!("CARGO_PKG_VERSION"));
    println!("rustc             {}", rustc_version());
}

/// Returns the Rust compiler version used to build this binary.
fn rustc_version() -> &'static str {
    option_env!("RUSTC_VERSION").unwrap_or("unknown")
}

/// Waits for SIGINT (Ctrl+C) or SIGTERM, whichever comes first.
///
/// If a handler cannot be installed, that branch never completes.
async fn shutdown_signal() {
    let ctrl_c = async {
        if let Err(e) = signal::ctrl_c().await {
            tracing::error!("failed to install Ctrl+C handler: {}", e);
            std::future::pending::<()>().await;
        }
    };

    #[cfg(unix)]
    let terminate = async {
        match signal::unix::signal(signal::unix::SignalKind::terminate()) {
            Ok(mut stream) => {
                stream.recv().await;
            }
            Err(e) => {
                tracing::error!("failed to install SIGTERM handler: {}", e);
                std::future::pending::<()>().await;
            }
        }
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => {}
        _ = terminate => {}
    }
}
