use std::sync::Arc;

use anyhow::{Context, Result};
use clap::{Parser, Subcommand};
use portfolio_aggregator::{api, AggregatorService, Settings};
use tracing_subscriber::{fmt, prelude::*, EnvFilter};

#[derive(Parser, Debug)]
#[command(name = "portfolio-aggregator")]
#[command(about = "Value wallet balances across chains with live market prices", long_about = None)]
struct Cli {
    /// Emit logs as JSON lines
    #[arg(long, global = true)]
    log_json: bool,

    #[command(flatten)]
    settings: Settings,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Run the HTTP API
    Serve {
        /// Address to listen on
        #[arg(short, long, env = "BIND_ADDR", default_value = "0.0.0.0:8000")]
        bind: String,
    },
    /// Print the valuation of one address
    Balance {
        /// The blockchain address to query
        #[arg(short, long)]
        address: String,

        /// Chain to query (ethereum, bsc, solana, etc.)
        #[arg(short, long, default_value = "ethereum")]
        chain: String,

        /// Market coin ids to include, comma separated
        #[arg(long = "coins", value_delimiter = ',')]
        coin_ids: Vec<String>,

        /// Print the raw JSON result
        #[arg(long)]
        json: bool,
    },
}

fn init_tracing(json: bool) -> Result<()> {
    let filter = EnvFilter::try_from_default_env()
        .or_else(|_| EnvFilter::try_new("info"))
        .context("invalid RUST_LOG")?;

    let registry = tracing_subscriber::registry().with(filter);
    if json {
        registry.with(fmt::layer().json()).init();
    } else {
        registry.with(fmt::layer()).init();
    }
    Ok(())
}

async fn serve(service: Arc<AggregatorService>, bind: &str) -> Result<()> {
    let app = api::create_router(service);
    let listener = tokio::net::TcpListener::bind(bind)
        .await
        .with_context(|| format!("failed to bind {}", bind))?;
    tracing::info!("listening on {}", listener.local_addr()?);

    axum::serve(listener, app)
        .with_graceful_shutdown(async {
            let _ = tokio::signal::ctrl_c().await;
            tracing::info!("shutting down");
        })
        .await?;
    Ok(())
}

async fn print_balance(
    service: &AggregatorService,
    chain: &str,
    address: &str,
    coin_ids: &[String],
    json: bool,
) -> Result<()> {
    let chain = chain.trim().to_lowercase();
    let result = service.aggregate(&chain, address.trim(), coin_ids, &[]).await;

    if json {
        println!("{}", serde_json::to_string_pretty(&result)?);
        return Ok(());
    }

    println!("Chain: {}  Address: {}", result.chain, result.address);
    println!("{}", "=".repeat(72));
    for line in result.native.iter().chain(result.tokens.iter()) {
        let price = line
            .usd_price
            .map(|p| format!("${:.4}", p))
            .unwrap_or_else(|| "-".to_string());
        println!(
            "{:8} | {:>20} | {:>14} | ${:>14.2}",
            line.symbol, line.balance, price, line.usd_value
        );
    }
    println!("{}", "=".repeat(72));
    println!("Total: ${:.2}", result.total_usd);

    for error in &result.errors {
        eprintln!("warning: {}", error);
    }
    Ok(())
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();
    init_tracing(cli.log_json)?;

    let service = Arc::new(
        AggregatorService::from_settings(&cli.settings)
            .context("failed to build market data client")?,
    );

    match cli.command {
        Command::Serve { bind } => serve(service, &bind).await,
        Command::Balance {
            address,
            chain,
            coin_ids,
            json,
        } => print_balance(&service, &chain, &address, &coin_ids, json).await,
    }
}
