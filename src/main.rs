//! testnet-trader - main entry point
//!
//! Subcommands:
//! - sign: print a signed order query string
//! - order: place a MARKET or LIMIT order
//! - status: current price and account balances
//! - download: fetch historical klines to CSV
//! - backtest: run a strategy over a CSV file
//! - watch: poll the ticker and log strategy signals

use anyhow::Result;
use clap::{Parser, Subcommand};
use rust_decimal::Decimal;
use std::path::PathBuf;
use testnet_trader::types::{OrderType, Side, TimeInForce};
use testnet_trader::Config;
use tracing::info;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};

mod commands;

#[derive(Parser, Debug)]
#[command(name = "testnet-trader")]
#[command(about = "Binance spot testnet toolkit: signing, orders, klines and backtests", long_about = None)]
#[command(version)]
struct Cli {
    #[command(subcommand)]
    command: Commands,

    /// Path to the JSON configuration file
    #[arg(short, long, global = true)]
    config: Option<PathBuf>,

    /// Verbose output
    #[arg(short, long, global = true)]
    verbose: bool,
}

#[derive(Subcommand, Debug)]
enum Commands {
    /// Print a signed order query string without sending it
    Sign {
        #[arg(short, long, default_value = "BTCUSDT")]
        symbol: String,

        /// BUY or SELL
        #[arg(long, default_value = "BUY")]
        side: Side,

        /// MARKET or LIMIT
        #[arg(long = "type", default_value = "MARKET")]
        order_type: OrderType,

        #[arg(short, long, default_value = "0.001")]
        quantity: Decimal,

        /// Limit price (LIMIT orders)
        #[arg(short, long)]
        price: Option<Decimal>,

        /// Timestamp in milliseconds (default: now)
        #[arg(long)]
        timestamp: Option<i64>,
    },

    /// Validate and place an order
    Order {
        /// Trading pair (default: the configured default market)
        #[arg(short, long)]
        symbol: Option<String>,

        /// BUY or SELL
        #[arg(long)]
        side: Side,

        /// MARKET or LIMIT
        #[arg(long = "type", default_value = "MARKET")]
        order_type: OrderType,

        #[arg(short, long)]
        quantity: Decimal,

        /// Limit price (required for LIMIT orders)
        #[arg(short, long)]
        price: Option<Decimal>,

        /// GTC, IOC or FOK (LIMIT orders)
        #[arg(long, default_value = "GTC")]
        time_in_force: TimeInForce,

        /// Validate and print the request without sending it
        #[arg(long)]
        dry_run: bool,
    },

    /// Show the current price and account balances
    Status {
        /// Trading pair (default: the configured default market)
        #[arg(short, long)]
        symbol: Option<String>,
    },

    /// Download historical klines to CSV
    Download {
        #[arg(short, long, default_value = "BTCUSDT")]
        symbol: String,

        /// Kline interval. E.g., "1m", "1h", "1d"
        #[arg(short, long, default_value = "1m")]
        interval: String,

        /// Klines per request (max 1000); with --end, the page size
        #[arg(short, long, default_value = "1000")]
        limit: u32,

        /// Start date (YYYY-MM-DD or RFC 3339)
        #[arg(long, default_value = "2024-01-01")]
        start: String,

        /// End date; when set, every page up to it is fetched
        #[arg(long)]
        end: Option<String>,

        /// Output directory
        #[arg(short, long, default_value = ".")]
        output: PathBuf,

        /// REST endpoint for market data
        #[arg(long, default_value = commands::download::DEFAULT_DATA_URL)]
        base_url: String,
    },

    /// Run a strategy over a kline CSV file
    Backtest {
        /// CSV file with timestamp,open,high,low,close,volume
        #[arg(short, long)]
        data: PathBuf,

        /// Strategy name (price-change, sma-cross, enhanced)
        #[arg(short, long, default_value = "enhanced")]
        strategy: String,

        /// Strategy parameters as JSON. E.g., '{"short_period": 5}'
        #[arg(long)]
        params: Option<String>,

        /// Initial capital
        #[arg(long)]
        capital: Option<f64>,

        /// Fee per side as a fraction. E.g., 0.001
        #[arg(long)]
        fee: Option<f64>,

        /// Write the trade log to this CSV file
        #[arg(long)]
        trades: Option<PathBuf>,
    },

    /// Poll the ticker and log SMA crossover signals (no orders)
    Watch {
        /// Trading pair (default: the configured default market)
        #[arg(short, long)]
        symbol: Option<String>,

        /// Poll interval in seconds
        #[arg(short, long, default_value = "10")]
        interval: u64,

        #[arg(long, default_value = "10")]
        short: usize,

        #[arg(long, default_value = "50")]
        long: usize,
    },
}

fn setup_logging(verbose: bool, command_name: &str) -> Result<()> {
    std::fs::create_dir_all("logs")?;

    // {command}_{date}.log
    let log_filename = format!(
        "{}_{}.log",
        command_name,
        chrono::Local::now().format("%Y-%m-%d_%H-%M-%S")
    );
    let log_path = PathBuf::from("logs").join(&log_filename);

    let level = if verbose { "debug" } else { "info" };
    let filter_str = format!(
        "{},hyper=warn,hyper_util=warn,reqwest=warn,rustls=warn,h2=warn",
        level
    );
    let env_filter =
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(&filter_str));

    let file_appender = tracing_appender::rolling::never("logs", &log_filename);

    let console_layer = tracing_subscriber::fmt::layer()
        .with_target(false)
        .with_ansi(true);

    let file_layer = tracing_subscriber::fmt::layer()
        .with_writer(file_appender)
        .with_target(true)
        .with_line_number(true)
        .with_file(true)
        .with_ansi(false);

    tracing_subscriber::registry()
        .with(env_filter)
        .with(console_layer)
        .with(file_layer)
        .init();

    info!("Log file: {}", log_path.display());

    Ok(())
}

fn main() -> Result<()> {
    let cli = Cli::parse();

    let command_name = match &cli.command {
        Commands::Sign { .. } => "sign",
        Commands::Order { .. } => "order",
        Commands::Status { .. } => "status",
        Commands::Download { .. } => "download",
        Commands::Backtest { .. } => "backtest",
        Commands::Watch { .. } => "watch",
    };

    setup_logging(cli.verbose, command_name)?;

    let config = Config::load(cli.config.as_deref());

    match cli.command {
        Commands::Sign {
            symbol,
            side,
            order_type,
            quantity,
            price,
            timestamp,
        } => commands::sign::run(
            &config, &symbol, side, order_type, quantity, price, timestamp,
        ),

        Commands::Order {
            symbol,
            side,
            order_type,
            quantity,
            price,
            time_in_force,
            dry_run,
        } => commands::order::run(
            &config,
            commands::order::OrderArgs {
                symbol: symbol.unwrap_or_else(|| config.settings.default_market.clone()),
                side,
                order_type,
                quantity,
                price,
                time_in_force,
                dry_run,
            },
        ),

        Commands::Status { symbol } => {
            let symbol = symbol.unwrap_or_else(|| config.settings.default_market.clone());
            commands::status::run(&config, &symbol)
        }

        Commands::Download {
            symbol,
            interval,
            limit,
            start,
            end,
            output,
            base_url,
        } => commands::download::run(symbol, interval, limit, start, end, output, base_url),

        Commands::Backtest {
            data,
            strategy,
            params,
            capital,
            fee,
            trades,
        } => commands::backtest::run(data, strategy, params, capital, fee, trades),

        Commands::Watch {
            symbol,
            interval,
            short,
            long,
        } => {
            let symbol = symbol.unwrap_or_else(|| config.settings.default_market.clone());
            commands::watch::run(&config, &symbol, interval, short, long)
        }
    }
}
