//! ScalpLab CLI: run one trading cycle or validate a configuration.
//!
//! Commands:
//! - `run`: one snapshot-decide-act cycle against Bitget, or against a
//!   candle CSV with `--paper`
//! - `check-config`: load and validate a TOML config, print the effective
//!   configuration
//!
//! Exit codes: 0 when the cycle completes (bracket submitted or no action),
//! 1 when it aborts, 2 when a position was left without automated exits.

use anyhow::{bail, Context, Result};
use clap::{Parser, Subcommand};
use scalplab_core::domain::{Balance, Instrument, Pair, Timeframe};
use scalplab_core::exchange::{
    BitgetExchange, Credentials, Exchange, ExchangeSession, PaperExchange,
};
use scalplab_core::{BotConfig, EngineError, NoActionReason, Orchestrator, Outcome, Severity};
use std::path::PathBuf;
use std::process::ExitCode;
use tracing::{error, info};
use tracing_subscriber::EnvFilter;

#[derive(Parser)]
#[command(
    name = "scalplab",
    about = "ScalpLab: EMA crossover bracket trader for one futures pair"
)]
struct Cli {
    /// Debug-level logging (overrides RUST_LOG).
    #[arg(long, short, global = true, default_value_t = false)]
    verbose: bool,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Run one trading cycle.
    Run(RunArgs),
    /// Load and validate a config file, then print the effective configuration.
    CheckConfig {
        /// Path to a TOML config file.
        #[arg(long)]
        config: PathBuf,
    },
}

#[derive(clap::Args)]
struct RunArgs {
    /// Path to a TOML config file. Defaults apply when omitted.
    #[arg(long)]
    config: Option<PathBuf>,

    /// Pair override, e.g. BTC/USDT.
    #[arg(long)]
    pair: Option<Pair>,

    /// Timeframe override: 1m, 3m, 5m, 15m, 30m, 1h, 4h, 1d.
    #[arg(long)]
    timeframe: Option<Timeframe>,

    /// Fraction of capital risked on the trade, in (0, 1].
    #[arg(long)]
    risk_fraction: Option<f64>,

    /// Trade against candles from this CSV instead of the live venue.
    #[arg(long)]
    paper: Option<PathBuf>,

    /// Paper account balance.
    #[arg(long, default_value_t = 10_000.0, requires = "paper")]
    paper_balance: f64,

    /// Paper price tick.
    #[arg(long, default_value_t = 0.01, requires = "paper")]
    paper_tick_size: f64,

    /// Paper size lot (also the minimum size).
    #[arg(long, default_value_t = 0.001, requires = "paper")]
    paper_lot_size: f64,

    #[arg(long, env = "SCALPLAB_API_KEY", hide_env_values = true)]
    api_key: Option<String>,

    #[arg(long, env = "SCALPLAB_API_SECRET", hide_env_values = true)]
    api_secret: Option<String>,

    #[arg(long, env = "SCALPLAB_API_PASSPHRASE", hide_env_values = true)]
    api_passphrase: Option<String>,
}

fn main() -> ExitCode {
    let cli = Cli::parse();
    init_tracing(cli.verbose);

    let result = match cli.command {
        Commands::Run(args) => run_cycle_cmd(args),
        Commands::CheckConfig { config } => run_check_config(config),
    };

    match result {
        Ok(code) => code,
        Err(err) => {
            error!("{err:#}");
            ExitCode::from(1)
        }
    }
}

fn init_tracing(verbose: bool) {
    let filter = if verbose {
        EnvFilter::new("scalplab=debug,scalplab_core=debug")
    } else {
        EnvFilter::try_from_default_env()
            .unwrap_or_else(|_| EnvFilter::new("scalplab=info,scalplab_core=info"))
    };
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_target(false)
        .init();
}

fn load_config(args: &RunArgs) -> Result<BotConfig> {
    let mut config = match &args.config {
        Some(path) => BotConfig::from_file(path)
            .with_context(|| format!("loading {}", path.display()))?,
        None => BotConfig::default(),
    };
    apply_overrides(&mut config, args);
    config.validate()?;
    Ok(config)
}

fn apply_overrides(config: &mut BotConfig, args: &RunArgs) {
    if let Some(pair) = &args.pair {
        config.pair = pair.clone();
    }
    if let Some(timeframe) = args.timeframe {
        config.timeframe = timeframe;
    }
    if let Some(risk_fraction) = args.risk_fraction {
        config.risk_fraction = risk_fraction;
    }
}

fn run_cycle_cmd(args: RunArgs) -> Result<ExitCode> {
    let config = load_config(&args)?;
    let orchestrator = Orchestrator::new(config);

    match &args.paper {
        Some(path) => {
            let pair = orchestrator.config().pair.clone();
            let instrument =
                Instrument::new(pair, args.paper_tick_size, args.paper_lot_size, args.paper_lot_size)?;
            let balance = Balance {
                total: args.paper_balance,
                available: args.paper_balance,
            };
            let exchange = PaperExchange::from_csv(path, instrument, balance)
                .with_context(|| format!("loading paper candles from {}", path.display()))?;
            run_in_session(&orchestrator, ExchangeSession::new(exchange))
        }
        None => {
            let credentials = credentials(&args)?;
            let exchange =
                BitgetExchange::new(credentials, orchestrator.config().venue.clone())?;
            run_in_session(&orchestrator, ExchangeSession::new(exchange))
        }
    }
}

fn credentials(args: &RunArgs) -> Result<Credentials> {
    match (&args.api_key, &args.api_secret, &args.api_passphrase) {
        (Some(key), Some(secret), Some(passphrase)) => {
            Ok(Credentials::new(key.as_str(), secret.as_str(), passphrase.as_str()))
        }
        _ => bail!(
            "live trading needs SCALPLAB_API_KEY, SCALPLAB_API_SECRET and \
             SCALPLAB_API_PASSPHRASE (or --paper CANDLES.csv)"
        ),
    }
}

fn run_in_session<E: Exchange>(
    orchestrator: &Orchestrator,
    mut session: ExchangeSession<E>,
) -> Result<ExitCode> {
    let result = orchestrator.run(&mut *session);
    if let Err(err) = session.close() {
        error!(%err, "closing exchange session failed");
    }
    match result {
        Ok(outcome) => {
            print_outcome(&outcome);
            Ok(ExitCode::SUCCESS)
        }
        Err(err) => {
            error!("{err}");
            Ok(ExitCode::from(exit_code(&err)))
        }
    }
}

fn exit_code(err: &EngineError) -> u8 {
    match err.severity() {
        Severity::Abort => 1,
        Severity::Critical => 2,
    }
}

fn print_outcome(outcome: &Outcome) {
    match outcome {
        Outcome::Submitted(report) => {
            println!("Bracket submitted");
            println!("  entry:       {}", report.entry.order_id);
            println!("  stop-loss:   {}", report.stop_loss.order_id);
            println!("  take-profit: {}", report.take_profit.order_id);
        }
        Outcome::NoAction(NoActionReason::PositionOpen) => {
            println!("No action: position already open");
        }
        Outcome::NoAction(NoActionReason::NoSignal(decision)) => {
            println!(
                "No action: no entry signal on bar {} (ema_cross={}, momentum_ok={})",
                decision.signal_time, decision.ema_cross, decision.momentum_ok
            );
        }
    }
}

fn run_check_config(path: PathBuf) -> Result<ExitCode> {
    let config =
        BotConfig::from_file(&path).with_context(|| format!("loading {}", path.display()))?;
    info!(path = %path.display(), "configuration is valid");
    print!("{}", config.to_toml()?);
    Ok(ExitCode::SUCCESS)
}

#[cfg(test)]
mod tests {
    use super::*;
    use clap::CommandFactory;
    use scalplab_core::domain::{OrderAck, OrderRole};
    use scalplab_core::error::ExitFailure;
    use scalplab_core::exchange::ExchangeError;

    #[test]
    fn cli_definition_is_consistent() {
        Cli::command().debug_assert();
    }

    #[test]
    fn flags_override_config() {
        let cli = Cli::try_parse_from([
            "scalplab",
            "run",
            "--pair",
            "eth/usdt",
            "--timeframe",
            "15m",
            "--risk-fraction",
            "0.01",
        ])
        .unwrap();
        let Commands::Run(args) = cli.command else {
            panic!("expected run");
        };
        let config = load_config(&args).unwrap();
        assert_eq!(config.pair.as_str(), "ETH/USDT");
        assert_eq!(config.timeframe, Timeframe::M15);
        assert_eq!(config.risk_fraction, 0.01);
    }

    #[test]
    fn invalid_override_is_rejected() {
        let cli =
            Cli::try_parse_from(["scalplab", "run", "--risk-fraction", "2.0"]).unwrap();
        let Commands::Run(args) = cli.command else {
            panic!("expected run");
        };
        assert!(load_config(&args).is_err());
    }

    #[test]
    fn paper_options_require_paper() {
        assert!(Cli::try_parse_from(["scalplab", "run", "--paper-balance", "5"]).is_err());
    }

    #[test]
    fn unprotected_position_exits_with_two() {
        let err = EngineError::UnprotectedPosition {
            entry: OrderAck {
                order_id: "1".into(),
                client_order_id: None,
            },
            submitted: vec![],
            failures: vec![ExitFailure {
                role: OrderRole::StopLoss,
                error: ExchangeError::Network("timeout".into()),
            }],
        };
        assert_eq!(exit_code(&err), 2);
        assert_eq!(exit_code(&EngineError::InsufficientData("short".into())), 1);
    }
}
