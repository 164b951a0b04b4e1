//! Tangent CLI binary.
//!
//! Command-line interface for CAPM and historical-mean portfolio optimization.

mod integration;

use chrono::{NaiveDate, Utc};
use clap::{Args, Parser, Subcommand};
use indicatif::{ProgressBar, ProgressStyle};
use integration::cache_manager;
use integration::data_pipeline::{FetchConfig, YahooMarketData};
use integration::logging::{LogFormat, init_logging};
use std::path::PathBuf;
use std::process;
use std::time::Duration;
use tangent::{
    EngineConfig, ExpectedReturnSource, ExportFormat, Exporter, PortfolioEngine, PortfolioError,
    risk_ceiling,
};

#[derive(Parser)]
#[command(name = "tangent")]
#[command(about = "Tangent: maximum-Sharpe portfolios under weight caps and a risk ceiling", long_about = None)]
#[command(version)]
struct Cli {
    /// Log level (trace, debug, info, warn, error); RUST_LOG takes precedence
    #[arg(long, global = true, default_value = "warn")]
    log_level: String,

    /// Log output format
    #[arg(long, global = true, value_enum, default_value_t = LogFormat::Pretty)]
    log_format: LogFormat,

    #[command(subcommand)]
    command: Commands,
}

/// Options shared by the optimization commands.
#[derive(Args)]
struct RequestArgs {
    /// Ticker symbols
    #[arg(required = true)]
    tickers: Vec<String>,

    /// Maximum weight of any single ticker
    #[arg(long, default_value = "1.0")]
    max_weight: f64,

    /// Query date (YYYY-MM-DD); history ends the day before. Defaults to today
    #[arg(long)]
    date: Option<NaiveDate>,

    /// Output format (text, json, pretty-json, csv)
    #[arg(long, default_value = "text")]
    format: String,

    /// Engine configuration file (JSON)
    #[arg(long)]
    config: Option<PathBuf>,

    /// Disable caching (always fetch fresh data)
    #[arg(long)]
    no_cache: bool,

    /// Force refresh cached data
    #[arg(long)]
    refresh: bool,
}

#[derive(Subcommand)]
enum Commands {
    /// Maximum-Sharpe portfolio
    Optimize {
        #[command(flatten)]
        request: RequestArgs,

        /// Volatility ceiling; 0 means none
        #[arg(long, default_value = "0")]
        max_risk: f64,

        /// Expected-return model (capm or historical)
        #[arg(long)]
        model: Option<String>,
    },

    /// Minimum-volatility portfolio
    MinVol {
        #[command(flatten)]
        request: RequestArgs,
    },

    /// Show the profile of one instrument
    Info {
        /// Ticker symbol
        symbol: String,
    },

    /// Manage the quote cache
    Cache {
        #[command(subcommand)]
        action: CacheAction,
    },
}

#[derive(Subcommand)]
enum CacheAction {
    /// Show cache statistics
    Stats,

    /// Delete cached quotes
    Clear {
        /// Only this symbol
        #[arg(long)]
        symbol: Option<String>,
    },
}

#[tokio::main]
async fn main() {
    if let Err(e) = run().await {
        eprintln!("Error: {}", e);
        process::exit(1);
    }
}

async fn run() -> Result<(), Box<dyn std::error::Error>> {
    let cli = Cli::parse();
    init_logging(&cli.log_level, cli.log_format);

    match cli.command {
        Commands::Optimize {
            request,
            max_risk,
            model,
        } => optimize(request, max_risk, model.as_deref()).await?,
        Commands::MinVol { request } => minimum_volatility(request).await?,
        Commands::Info { symbol } => show_info(&symbol).await?,
        Commands::Cache { action } => manage_cache(action)?,
    }

    Ok(())
}

/// Everything a request needs before it reaches the engine.
struct Prepared {
    engine: PortfolioEngine<YahooMarketData>,
    tickers: Vec<String>,
    date: NaiveDate,
    format: ExportFormat,
}

fn prepare(request: &RequestArgs) -> Result<Prepared, Box<dyn std::error::Error>> {
    let config = match &request.config {
        Some(path) => EngineConfig::from_file(path)
            .map_err(|e| format!("Failed to load config {}: {}", path.display(), e))?,
        None => EngineConfig::default(),
    };
    let fetch = FetchConfig {
        use_cache: !request.no_cache,
        force_refresh: request.refresh,
    };
    let source = YahooMarketData::new(fetch, &config.risk_free_symbol)?;

    Ok(Prepared {
        engine: PortfolioEngine::new(source, config),
        tickers: request.tickers.iter().map(|t| t.trim().to_uppercase()).collect(),
        date: request.date.unwrap_or_else(|| Utc::now().date_naive()),
        format: request.format.parse()?,
    })
}

fn spinner(message: &str) -> Result<ProgressBar, Box<dyn std::error::Error>> {
    let pb = ProgressBar::new_spinner();
    pb.set_style(ProgressStyle::default_spinner().template("{spinner:.green} {msg}")?);
    pb.enable_steady_tick(Duration::from_millis(100));
    pb.set_message(message.to_string());
    Ok(pb)
}

fn describe(err: PortfolioError) -> String {
    format!("{} [{}]", err, err.kind())
}

async fn optimize(
    request: RequestArgs,
    max_risk: f64,
    model: Option<&str>,
) -> Result<(), Box<dyn std::error::Error>> {
    let prepared = prepare(&request)?;
    let ceiling = risk_ceiling(max_risk).map_err(describe)?;
    let model = match model {
        Some(name) => name.parse::<ExpectedReturnSource>().map_err(describe)?,
        None => prepared.engine.config().expected_returns,
    };

    let pb = spinner(&format!("Optimizing {} tickers...", prepared.tickers.len()))?;
    let outcome = prepared
        .engine
        .optimize_portfolio_with(
            &prepared.tickers,
            prepared.date,
            request.max_weight,
            ceiling,
            model,
        )
        .await;
    pb.finish_and_clear();

    let result = outcome.map_err(describe)?;
    println!("{}", result.export_to_string(prepared.format)?);
    Ok(())
}

async fn minimum_volatility(request: RequestArgs) -> Result<(), Box<dyn std::error::Error>> {
    let prepared = prepare(&request)?;

    let pb = spinner(&format!(
        "Minimizing volatility of {} tickers...",
        prepared.tickers.len()
    ))?;
    let outcome = prepared
        .engine
        .minimum_volatility_portfolio(&prepared.tickers, prepared.date, request.max_weight)
        .await;
    pb.finish_and_clear();

    let result = outcome.map_err(describe)?;
    println!("{}", result.export_to_string(prepared.format)?);
    Ok(())
}

async fn show_info(symbol: &str) -> Result<(), Box<dyn std::error::Error>> {
    let symbol = symbol.trim().to_uppercase();
    let source = YahooMarketData::new(FetchConfig::default(), "^IRX")?;
    let profile = source.profile(&symbol).await?;

    let text = |value: &Option<String>| value.clone().unwrap_or_else(|| "n/a".to_string());
    println!("\n{}", profile.symbol);
    println!("{}", "=".repeat(48));
    println!("{:<20} {}", "Name", text(&profile.long_name));
    println!("{:<20} {}", "Sector", text(&profile.sector));
    println!("{:<20} {}", "Industry", text(&profile.industry));
    match profile.price {
        Some(price) => println!("{:<20} {:.2}", "Price", price),
        None => println!("{:<20} n/a", "Price"),
    }
    match profile.beta {
        Some(beta) => println!("{:<20} {:.2}", "Beta", beta),
        None => println!("{:<20} n/a (CAPM uses 1.00)", "Beta"),
    }
    Ok(())
}

fn manage_cache(action: CacheAction) -> Result<(), Box<dyn std::error::Error>> {
    let cache = cache_manager::open_cache()?;
    match action {
        CacheAction::Stats => {
            let stats = cache.get_stats()?;
            println!("Cache location: {}", cache_manager::cache_path().display());
            println!("Quotes:         {}", stats.total_quotes);
            println!("Symbols:        {}", stats.unique_symbols);
            if let (Some(first), Some(last)) = (stats.first_date, stats.last_date) {
                println!("Date range:     {} to {}", first, last);
            }
        }
        CacheAction::Clear { symbol } => {
            let removed = match symbol {
                Some(symbol) => cache.clear_symbol(&symbol.to_uppercase())?,
                None => cache.clear_all()?,
            };
            println!("Removed {} cached quotes", removed);
        }
    }
    Ok(())
}
