//! CLI definition and dispatch.

use clap::{Parser, Subcommand};
use std::path::{Path, PathBuf};
use std::process::ExitCode;

use crate::adapters::csv_price_adapter::CsvPriceAdapter;
use crate::adapters::csv_report_adapter::CsvReportAdapter;
use crate::adapters::file_config_adapter::FileConfigAdapter;
use crate::domain::config::PipelineConfig;
use crate::domain::config_validation::{validate, validate_pipeline_config};
use crate::domain::error::LsquantError;
use crate::domain::pipeline::{PipelineOutput, run_pipeline};
use crate::ports::data_port::PriceDataPort;
use crate::ports::report_port::ReportPort;

#[derive(Parser, Debug)]
#[command(name = "lsquant", about = "Cross-sectional long/short research backtester")]
pub struct Cli {
    #[command(subcommand)]
    pub command: Command,
}

#[derive(Subcommand, Debug)]
pub enum Command {
    /// Run the full pipeline and write a report
    Backtest {
        /// INI configuration; built-in defaults when omitted
        #[arg(short, long)]
        config: Option<PathBuf>,
        #[arg(short, long, default_value = "data")]
        data_dir: PathBuf,
        #[arg(short, long, default_value = "out")]
        output: PathBuf,
        /// Validate and print the resolved configuration without running
        #[arg(long)]
        dry_run: bool,
    },
    /// Validate a configuration file
    Validate {
        #[arg(short, long)]
        config: PathBuf,
    },
    /// List symbols with a price file in the data directory
    ListSymbols {
        #[arg(short, long, default_value = "data")]
        data_dir: PathBuf,
    },
}

pub fn run(cli: Cli) -> ExitCode {
    match cli.command {
        Command::Backtest {
            config,
            data_dir,
            output,
            dry_run,
        } => {
            if dry_run {
                run_dry_run(config.as_deref())
            } else {
                run_backtest(config.as_deref(), &data_dir, &output)
            }
        }
        Command::Validate { config } => run_validate(&config),
        Command::ListSymbols { data_dir } => run_list_symbols(&data_dir),
    }
}

/// Load and validate the configuration, falling back to the defaults when
/// no file is given.
pub fn load_config(path: Option<&Path>) -> Result<PipelineConfig, LsquantError> {
    match path {
        Some(path) => {
            eprintln!("Loading config from {}", path.display());
            let adapter = FileConfigAdapter::from_file(path)?;
            validate_pipeline_config(&adapter)
        }
        None => {
            eprintln!("No config given, using defaults");
            let config = PipelineConfig::default();
            validate(&config)?;
            Ok(config)
        }
    }
}

fn run_backtest(config_path: Option<&Path>, data_dir: &Path, output_dir: &Path) -> ExitCode {
    // Stage 1: Load and validate config
    let config = match load_config(config_path) {
        Ok(c) => c,
        Err(e) => {
            eprintln!("error: {e}");
            return (&e).into();
        }
    };

    // Stages 2-4: Load prices, run pipeline, write report
    let data_port = CsvPriceAdapter::new(data_dir.to_path_buf());
    let report = CsvReportAdapter::new();
    match run_backtest_pipeline(&data_port, &report, &config, output_dir) {
        Ok(output) => {
            print_summary(&output);
            eprintln!("\nReport written to: {}", output_dir.display());
            ExitCode::SUCCESS
        }
        Err(e) => {
            eprintln!("error: {e}");
            (&e).into()
        }
    }
}

pub fn run_backtest_pipeline(
    data_port: &dyn PriceDataPort,
    report: &dyn ReportPort,
    config: &PipelineConfig,
    output_dir: &Path,
) -> Result<PipelineOutput, LsquantError> {
    // Stage 2: Load prices
    let prices = data_port.load_panel(&config.universe, config.start_date, config.end_date)?;
    eprintln!(
        "Loaded {} symbols, {} dates ({} to {})",
        prices.symbols().len(),
        prices.len(),
        config.start_date,
        config.end_date,
    );

    // Stage 3: Features, walk-forward scores, weights, backtest, stats
    eprintln!(
        "Running pipeline: model {}, train_window {}, retrain every {}",
        config.model_kind, config.train_window, config.retrain_freq
    );
    let output = run_pipeline(&prices, config)?;

    // Stage 4: Report
    report.write(&output, output_dir)?;
    Ok(output)
}

fn print_summary(output: &PipelineOutput) {
    let s = &output.stats;
    println!("cagr          {:>10.4}", s.cagr);
    println!("ann_vol       {:>10.4}", s.ann_vol);
    println!("sharpe        {:>10.4}", s.sharpe);
    println!("max_drawdown  {:>10.4}", s.max_drawdown);
    println!("total_return  {:>10.4}", s.total_return);
    println!("num_days      {:>10}", s.num_days);

    eprintln!("\n=== Trading Activity ===");
    eprintln!("Avg Turnover:     {:.4}", output.activity.avg_turnover);
    eprintln!("Total Costs:      {:.6}", output.activity.total_costs);
    eprintln!(
        "Scored:           {} records over {} feature dates",
        output.scores.len(),
        output.features.dates
    );
}

pub fn run_dry_run(config_path: Option<&Path>) -> ExitCode {
    let config = match load_config(config_path) {
        Ok(c) => c,
        Err(e) => {
            eprintln!("error: {e}");
            return (&e).into();
        }
    };
    eprintln!("Config validated successfully");

    let signals: Vec<String> = config.signals.iter().map(|s| s.to_string()).collect();
    eprintln!("\nUniverse:");
    if config.universe.is_empty() {
        eprintln!("  symbols: every file in the data directory");
    } else {
        eprintln!("  symbols: {}", config.universe.join(", "));
    }
    eprintln!("  range:   {} to {}", config.start_date, config.end_date);
    eprintln!("\nFeatures:");
    eprintln!("  signals: {}", signals.join(", "));
    eprintln!(
        "  lookback {}, label_horizon {}, min_history {}",
        config.lookback, config.label_horizon, config.min_history
    );
    eprintln!("\nModel:");
    eprintln!("  {} (alpha {})", config.model_kind, config.alpha);
    eprintln!(
        "  train_window {}, retrain_freq {}",
        config.train_window, config.retrain_freq
    );
    eprintln!("\nPortfolio:");
    eprintln!(
        "  long {:.2}, short {:.2}, gross {:.2}, dollar_neutral {}, weighting {}",
        config.long_frac,
        config.short_frac,
        config.gross_leverage,
        config.dollar_neutral,
        config.weighting
    );
    eprintln!(
        "  costs: commission {} bps, slippage {} bps",
        config.commission_bps, config.slippage_bps
    );

    eprintln!("\nDry run complete: configuration is valid");
    ExitCode::SUCCESS
}

fn run_validate(config_path: &Path) -> ExitCode {
    match load_config(Some(config_path)) {
        Ok(_) => {
            eprintln!("Config is valid");
            ExitCode::SUCCESS
        }
        Err(e) => {
            eprintln!("error: {e}");
            (&e).into()
        }
    }
}

fn run_list_symbols(data_dir: &Path) -> ExitCode {
    let adapter = CsvPriceAdapter::new(data_dir.to_path_buf());
    match adapter.list_symbols() {
        Ok(symbols) => {
            for s in &symbols {
                println!("{s}");
            }
            eprintln!("{} symbols in {}", symbols.len(), data_dir.display());
            ExitCode::SUCCESS
        }
        Err(e) => {
            eprintln!("error: {e}");
            (&e).into()
        }
    }
}
