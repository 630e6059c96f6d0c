//! # CLI Interface
//!
//! Command-line structure for `tokenvault-keeper`, built with `clap` derive.
//! Every path and tunable also reads from a `VAULT_*` environment variable.

use std::path::PathBuf;

use alloy_primitives::Address;
use clap::{ArgAction, Args, Parser, Subcommand};

use crate::logging::LogFormat;

/// Token vault keeper.
///
/// Hosts a vault engine in-process, replays scripted operations against it,
/// and runs the automated-fulfillment loop as a keeper account. Events are
/// written to stdout as JSON lines; logs go to stderr.
#[derive(Parser, Debug)]
#[command(
    name = "tokenvault-keeper",
    about = "Keeper process for the token vault engine",
    version,
    propagate_version = true
)]
pub struct KeeperCli {
    /// Log output format.
    #[arg(long, global = true, env = "VAULT_LOG_FORMAT", value_enum, default_value_t = LogFormat::Pretty)]
    pub log_format: LogFormat,

    /// Subcommand to execute.
    #[command(subcommand)]
    pub command: Commands,
}

/// Top-level subcommands.
#[derive(Subcommand, Debug)]
pub enum Commands {
    /// Start the keeper loop against a freshly configured vault.
    Run(RunArgs),
    /// Replay a scenario to completion, then print the event log.
    Simulate(SimulateArgs),
    /// Validate a vault configuration file and exit.
    CheckConfig(CheckConfigArgs),
    /// Print version information and exit.
    Version,
}

/// Vault and keeper identity shared by `run` and `simulate`.
#[derive(Args, Debug)]
pub struct VaultArgs {
    /// Path to the vault configuration (JSON).
    #[arg(long, short = 'c', env = "VAULT_CONFIG")]
    pub config: PathBuf,

    /// Keeper account. Granted the Keeper role by the configured admin on
    /// startup.
    #[arg(long, short = 'k', env = "VAULT_KEEPER")]
    pub keeper: Address,

    /// Print Prometheus metrics to stdout before exiting.
    #[arg(long)]
    pub print_metrics: bool,
}

/// Arguments for the `run` subcommand.
#[derive(Args, Debug)]
pub struct RunArgs {
    #[command(flatten)]
    pub vault: VaultArgs,

    /// Scenario to replay before the loop starts.
    #[arg(long, short = 's', env = "VAULT_SCENARIO")]
    pub scenario: Option<PathBuf>,

    /// Time between keeper rounds, in milliseconds.
    #[arg(long, env = "VAULT_POLL_INTERVAL_MS", default_value_t = 1_000)]
    pub poll_interval_ms: u64,

    /// Do not sweep state for pending deposits each round. Without the
    /// sweep, an upkeep that fails (e.g. while paused) is not retried once
    /// the log cursor has moved past its request.
    #[arg(long = "no-sweep", action = ArgAction::SetFalse)]
    pub sweep: bool,

    /// Stop after this many rounds instead of waiting for Ctrl+C.
    #[arg(long)]
    pub rounds: Option<u64>,
}

/// Arguments for the `simulate` subcommand.
#[derive(Args, Debug)]
pub struct SimulateArgs {
    #[command(flatten)]
    pub vault: VaultArgs,

    /// Scenario to replay.
    #[arg(long, short = 's', env = "VAULT_SCENARIO")]
    pub scenario: PathBuf,
}

/// Arguments for the `check-config` subcommand.
#[derive(Args, Debug)]
pub struct CheckConfigArgs {
    /// Path to the vault configuration (JSON).
    #[arg(long, short = 'c', env = "VAULT_CONFIG")]
    pub config: PathBuf,
}

#[cfg(test)]
mod tests {
    use super::*;
    use clap::CommandFactory;

    #[test]
    fn verify_cli_structure() {
        KeeperCli::command().debug_assert();
    }

    #[test]
    fn parses_simulate_with_keeper_address() {
        let cli = KeeperCli::try_parse_from([
            "tokenvault-keeper",
            "--log-format",
            "json",
            "simulate",
            "--config",
            "vault.json",
            "--keeper",
            "0x4b4b4b4b4b4b4b4b4b4b4b4b4b4b4b4b4b4b4b4b",
            "--scenario",
            "scenario.json",
        ])
        .unwrap();
        assert_eq!(cli.log_format, LogFormat::Json);
        match cli.command {
            Commands::Simulate(args) => {
                assert_eq!(args.vault.keeper, Address::repeat_byte(0x4B));
                assert_eq!(args.scenario, PathBuf::from("scenario.json"));
                assert!(!args.vault.print_metrics);
            }
            other => panic!("unexpected command: {other:?}"),
        }
    }

    #[test]
    fn run_sweeps_unless_told_not_to() {
        let base = [
            "tokenvault-keeper",
            "run",
            "--config",
            "vault.json",
            "--keeper",
            "0x4b4b4b4b4b4b4b4b4b4b4b4b4b4b4b4b4b4b4b4b",
        ];
        match KeeperCli::try_parse_from(base).unwrap().command {
            Commands::Run(args) => assert!(args.sweep),
            other => panic!("unexpected command: {other:?}"),
        }

        let with_flag = base.iter().copied().chain(["--no-sweep"]);
        match KeeperCli::try_parse_from(with_flag).unwrap().command {
            Commands::Run(args) => assert!(!args.sweep),
            other => panic!("unexpected command: {other:?}"),
        }
    }

    #[test]
    fn rejects_malformed_keeper_address() {
        let result = KeeperCli::try_parse_from([
            "tokenvault-keeper",
            "check-config",
            "--config",
            "vault.json",
        ]);
        assert!(result.is_ok());

        let result = KeeperCli::try_parse_from([
            "tokenvault-keeper",
            "run",
            "--config",
            "vault.json",
            "--keeper",
            "not-an-address",
        ]);
        assert!(result.is_err());
    }
}
