use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::Duration;

use alloy::primitives::Address;
use chrono::Utc;
use clap::{ArgAction, Args, Parser, Subcommand, ValueEnum};
use color_eyre::eyre::{eyre, Context, Result};
use comfy_table::presets::UTF8_BORDERS_ONLY;
use comfy_table::Table;
use indicatif::{ProgressBar, ProgressStyle};
use lp_analysis::{
    parse_basis_book, BasisBook, PositionOutcome, PositionReport, Refresher, ValuationSettings,
    Valuator, WalletValuation,
};
use lp_data::{
    parse_address, BinanceSpot, ChainConfig, FeeMode, MetadataCache, ReadOrchestrator,
    RpcTransport,
};
use tracing::{error, info, Level};
use tracing_subscriber::EnvFilter;

type LiveValuator = Valuator<RpcTransport, BinanceSpot>;

#[derive(Parser, Debug)]
#[command(name = "lp-valuator")]
#[command(about = "Value Uniswap V3 liquidity positions held by a wallet")]
#[command(version)]
struct Cli {
    #[arg(long, short = 'v', action = ArgAction::Count, global = true)]
    verbose: u8,

    #[arg(long, short = 'q', global = true)]
    quiet: bool,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand, Debug)]
enum Commands {
    /// Value every position of a wallet.
    Positions(PositionsArgs),
    /// Print the resolved chain and valuation settings.
    Config(ChainArgs),
}

#[derive(Args, Debug)]
struct ChainArgs {
    /// JSON-RPC endpoint (overrides LPV_RPC_URL).
    #[arg(long)]
    rpc_url: Option<String>,

    /// Issue one eth_call per read instead of Multicall3 batches.
    #[arg(long)]
    no_batch: bool,

    /// exact | owed
    #[arg(long)]
    fee_mode: Option<FeeMode>,
}

#[derive(Args, Debug)]
struct PositionsArgs {
    /// Owner address (0x-prefixed).
    wallet: String,

    #[command(flatten)]
    chain: ChainArgs,

    #[arg(long, value_enum, default_value_t = OutputFormat::Table)]
    output: OutputFormat,

    /// JSON file of deposit basis keyed by position id.
    #[arg(long)]
    basis: Option<PathBuf>,

    /// Also show closed positions (zero liquidity).
    #[arg(long)]
    include_empty: bool,

    /// Re-value every N seconds; a slow pass is superseded by the next one.
    #[arg(long, value_name = "SECS")]
    watch: Option<u64>,
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, ValueEnum)]
enum OutputFormat {
    Table,
    Json,
}

#[tokio::main]
async fn main() -> Result<()> {
    color_eyre::install()?;

    let cli = Cli::parse();
    init_tracing(cli.verbose, cli.quiet)?;

    match cli.command {
        Commands::Positions(args) => handle_positions(args).await,
        Commands::Config(args) => handle_config(&args),
    }
}

fn init_tracing(verbose: u8, quiet: bool) -> Result<()> {
    let level = if quiet {
        Level::WARN
    } else {
        match verbose {
            0 => Level::INFO,
            1 => Level::DEBUG,
            _ => Level::TRACE,
        }
    };

    let filter = EnvFilter::try_from_default_env()
        .or_else(|_| EnvFilter::try_new(level.as_str()))
        .wrap_err("failed to initialize tracing filter")?;

    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .init();
    Ok(())
}

fn chain_config(args: &ChainArgs) -> Result<ChainConfig> {
    let mut config = ChainConfig::from_env().wrap_err("invalid LPV_* environment")?;
    if let Some(url) = &args.rpc_url {
        config.rpc_url = url.clone();
    }
    if args.no_batch {
        config.batching = false;
    }
    if let Some(mode) = args.fee_mode {
        config.fee_mode = mode;
    }
    config.validate().wrap_err("invalid chain configuration")?;
    Ok(config)
}

fn build_valuator(config: &ChainConfig, settings: ValuationSettings) -> Result<LiveValuator> {
    let transport = RpcTransport::new(config).wrap_err("failed to create RPC transport")?;
    let reader = ReadOrchestrator::new(transport, config, Arc::new(MetadataCache::new()));
    let spot = BinanceSpot::new(settings.spot_timeout, settings.spot_ttl)
        .wrap_err("failed to create spot price client")?;
    Ok(Valuator::new(reader, spot, settings))
}

fn load_basis(path: Option<&Path>) -> Result<BasisBook> {
    let Some(path) = path else {
        return Ok(BasisBook::new());
    };
    let raw = std::fs::read_to_string(path)
        .wrap_err_with(|| format!("failed to read basis file {}", path.display()))?;
    parse_basis_book(&raw).wrap_err_with(|| format!("invalid basis file {}", path.display()))
}

async fn handle_positions(args: PositionsArgs) -> Result<()> {
    let owner = parse_address(&args.wallet).wrap_err("invalid wallet address")?;
    let config = chain_config(&args.chain)?;
    let basis = Arc::new(load_basis(args.basis.as_deref())?);
    let valuator = Arc::new(build_valuator(&config, ValuationSettings::from_env())?);
    let view = View {
        format: args.output,
        include_empty: args.include_empty,
    };

    info!(
        owner = %owner,
        rpc = %config.rpc_url,
        batching = config.batching,
        fee_mode = %config.fee_mode,
        "valuing wallet"
    );

    match args.watch {
        None => {
            let pb = spinner("reading positions")?;
            let today = Utc::now().date_naive();
            let result = valuator.value_wallet(owner, &basis, today).await;
            pb.finish_and_clear();
            let valuation = result.wrap_err("wallet valuation failed")?;
            view.render(&valuation)
        }
        Some(0) => Err(eyre!("--watch interval must be at least 1 second")),
        Some(secs) => watch(valuator, basis, owner, view, Duration::from_secs(secs)).await,
    }
}

/// Re-value on a fixed interval until a pass errors. A pass still running
/// when the next one starts is aborted.
async fn watch(
    valuator: Arc<LiveValuator>,
    basis: Arc<BasisBook>,
    owner: Address,
    view: View,
    every: Duration,
) -> Result<()> {
    let refresher = Arc::new(Refresher::new());
    let (failed_tx, mut failed_rx) = tokio::sync::mpsc::unbounded_channel();
    let mut ticker = tokio::time::interval(every);

    loop {
        tokio::select! {
            _ = ticker.tick() => {}
            Some(report) = failed_rx.recv() => return Err(report),
        }

        let refresher = Arc::clone(&refresher);
        let valuator = Arc::clone(&valuator);
        let basis = Arc::clone(&basis);
        let failed_tx = failed_tx.clone();
        tokio::spawn(async move {
            let pass = async move {
                let today = Utc::now().date_naive();
                valuator.value_wallet(owner, &basis, today).await
            };
            let outcome = match refresher.run(pass).await {
                None => return,
                Some(Ok(valuation)) => view.render(&valuation),
                Some(Err(e)) => Err(eyre!(e)).wrap_err("wallet valuation failed"),
            };
            if let Err(report) = outcome {
                error!(error = %report, "refresh failed");
                let _ = failed_tx.send(report);
            }
        });
    }
}

fn handle_config(args: &ChainArgs) -> Result<()> {
    let config = chain_config(args)?;
    let settings = ValuationSettings::from_env();

    let mut table = Table::new();
    table.load_preset(UTF8_BORDERS_ONLY);
    table.set_header(vec!["Setting", "Value"]);
    table.add_row(vec!["RPC URL".to_string(), config.rpc_url.clone()]);
    table.add_row(vec!["Position manager".to_string(), config.position_manager.to_string()]);
    table.add_row(vec!["Factory".to_string(), config.factory.to_string()]);
    table.add_row(vec!["Multicall3".to_string(), config.multicall.to_string()]);
    table.add_row(vec!["Batching".to_string(), config.batching.to_string()]);
    table.add_row(vec!["Batch size".to_string(), config.batch_size.to_string()]);
    table.add_row(vec!["Fee mode".to_string(), config.fee_mode.to_string()]);
    table.add_row(vec!["Timeout".to_string(), format!("{:?}", config.timeout)]);
    table.add_row(vec![
        "Stable symbols".to_string(),
        settings.stable_symbols.len().to_string(),
    ]);
    table.add_row(vec![
        "Fallback prices".to_string(),
        settings.fallback_prices.len().to_string(),
    ]);
    table.add_row(vec!["Spot timeout".to_string(), format!("{:?}", settings.spot_timeout)]);

    println!("{table}");
    Ok(())
}

fn spinner(message: &'static str) -> Result<ProgressBar> {
    let pb = ProgressBar::new_spinner();
    pb.set_style(
        ProgressStyle::with_template("{spinner:.green} {msg}")
            .wrap_err("failed to create progress style")?,
    );
    pb.set_message(message);
    pb.enable_steady_tick(Duration::from_millis(100));
    Ok(pb)
}

#[derive(Clone, Copy, Debug)]
struct View {
    format: OutputFormat,
    include_empty: bool,
}

impl View {
    fn render(&self, valuation: &WalletValuation) -> Result<()> {
        let shown: Vec<&PositionOutcome> = valuation
            .positions
            .iter()
            .filter(|outcome| self.include_empty || !outcome.report().is_some_and(|r| r.is_empty))
            .collect();

        match self.format {
            OutputFormat::Json => {
                let json = serde_json::json!({
                    "owner": valuation.owner,
                    "generated_at": valuation.generated_at,
                    "positions": shown,
                    "summary": valuation.summary,
                    "batches": valuation.batches,
                    "rpc_calls": valuation.rpc_calls,
                });
                let json = serde_json::to_string_pretty(&json).wrap_err("failed to serialize JSON")?;
                println!("{json}");
            }
            OutputFormat::Table => print_positions_table(valuation, &shown),
        }
        Ok(())
    }
}

fn print_positions_table(valuation: &WalletValuation, shown: &[&PositionOutcome]) {
    let mut table = Table::new();
    table.load_preset(UTF8_BORDERS_ONLY);
    table.set_header(vec![
        "ID", "Pair", "Fee", "Range", "Current", "Status", "Amounts", "Fees", "Value", "ROI", "APR",
    ]);

    for outcome in shown {
        match outcome {
            PositionOutcome::Valued(report) => table.add_row(position_row(report)),
            PositionOutcome::Unavailable { id, reason } => table.add_row(vec![
                id.clone(),
                "-".to_string(),
                "-".to_string(),
                "-".to_string(),
                "-".to_string(),
                "unavailable".to_string(),
                reason.clone(),
                String::new(),
                String::new(),
                String::new(),
                String::new(),
            ]),
        };
    }

    println!("{table}\n");

    let summary = &valuation.summary;
    println!("Wallet {} at {}:", valuation.owner, valuation.generated_at.format("%Y-%m-%d %H:%M:%S UTC"));
    println!(
        "  Positions:   {} ({} in range, {} out of range, {} closed, {} unavailable)",
        summary.positions, summary.in_range, summary.out_of_range, summary.empty, summary.unavailable
    );
    println!("  Liquidity:   {}", format_usd(summary.total_value_usd));
    println!("  Fees:        {}", format_usd(summary.total_fees_usd));
    println!("  Total:       {}", format_usd(summary.total_usd()));
    println!("  Round trips: {} ({} reads)", valuation.batches, valuation.rpc_calls);
    if summary.degraded_fees > 0 {
        println!("  * fees for {} position(s) are owed-only or partial", summary.degraded_fees);
    }
    if summary.estimated_prices > 0 {
        println!("  ~ USD prices for {} position(s) are estimated", summary.estimated_prices);
    }
}

fn position_row(report: &PositionReport) -> Vec<String> {
    let status = if report.is_empty {
        "closed".to_string()
    } else if report.in_range {
        format!("in range {:.0}%", report.range_position_pct)
    } else {
        "out of range".to_string()
    };
    let degraded = if report.fees_degraded { "*" } else { "" };
    let estimated = if report.prices_estimated { "~" } else { "" };

    vec![
        report.id.clone(),
        report.pair_label.clone(),
        format!("{:.2}%", f64::from(report.fee_tier) / 10_000.0),
        format!("{} - {}", format_price(report.price_low), format_price(report.price_high)),
        format_price(report.price_current),
        status,
        format!(
            "{} {}\n{} {}",
            format_amount(report.amount0),
            report.symbol0,
            format_amount(report.amount1),
            report.symbol1
        ),
        format!(
            "{} {}\n{} {}{degraded}",
            format_amount(report.fee0),
            report.symbol0,
            format_amount(report.fee1),
            report.symbol1
        ),
        format!("{estimated}{}", format_usd(report.total_usd())),
        format_pct(report.roi_pct),
        format_pct(report.apr_pct),
    ]
}

fn format_usd(value: f64) -> String {
    format!("${value:.2}")
}

fn format_pct(value: Option<f64>) -> String {
    value.map_or_else(|| "-".to_string(), |pct| format!("{pct:.2}%"))
}

fn format_amount(value: f64) -> String {
    if value == 0.0 || value.abs() >= 1.0 {
        format!("{value:.4}")
    } else {
        format!("{value:.6e}")
    }
}

/// Significant digits regardless of magnitude; ranges span many decades.
fn format_price(value: f64) -> String {
    if !value.is_finite() {
        "∞".to_string()
    } else if value == 0.0 {
        "0".to_string()
    } else if value.abs() >= 1_000.0 {
        format!("{value:.2}")
    } else if value.abs() >= 0.01 {
        format!("{value:.4}")
    } else {
        format!("{value:.4e}")
    }
}
