use std::time::Duration;

use anyhow::{Context, Result};
use clap::{Parser, Subcommand};
use serde_json::Value;

use market_client::format::{format_change, format_price, format_volume};
use market_client::{ApiClient, ChartRequest};

#[derive(Parser)]
#[command(name = "market-client", about = "Query the market data backend")]
struct Cli {
    /// Backend base URL
    #[arg(long, default_value = "http://localhost:8080/api")]
    base_url: String,

    /// Cache freshness window in seconds
    #[arg(long, default_value_t = 30)]
    ttl_secs: u64,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// List the tradable symbols
    Symbols,
    /// Show the backend feature flags
    Features,
    /// Fetch chart data for one or more symbols
    Chart {
        symbols: Vec<String>,
        #[arg(long, default_value = "1h")]
        timeframe: String,
        /// Override the first pane series
        #[arg(long)]
        pane1: Option<String>,
        /// Override the second pane series
        #[arg(long)]
        pane2: Option<String>,
    },
    /// Probe backend health
    Health,
}

#[tokio::main]
async fn main() -> Result<()> {
    env_logger::init();
    let cli = Cli::parse();

    let client = ApiClient::with_ttl(&cli.base_url, Duration::from_secs(cli.ttl_secs))
        .context("Failed to construct API client")?;

    match cli.command {
        Commands::Symbols => {
            print_json(&client.symbols().await.context("Failed to fetch symbols")?)?;
        }
        Commands::Features => {
            print_json(&client.features().await.context("Failed to fetch features")?)?;
        }
        Commands::Health => {
            print_json(&client.health().await.context("Health check failed")?)?;
        }
        Commands::Chart {
            symbols,
            timeframe,
            pane1,
            pane2,
        } => {
            if symbols.is_empty() {
                anyhow::bail!("at least one symbol is required");
            }
            let requests: Vec<ChartRequest> = symbols
                .iter()
                .map(|symbol| ChartRequest {
                    symbol: symbol.clone(),
                    timeframe: timeframe.clone(),
                    pane1: pane1.clone(),
                    pane2: pane2.clone(),
                })
                .collect();

            for (request, result) in requests
                .iter()
                .zip(client.chart_data_many(&requests).await)
            {
                match result {
                    Ok(data) => show_chart(&request.symbol, &data)?,
                    Err(err) => eprintln!("{}: {}", request.symbol, err),
                }
            }
        }
    }

    Ok(())
}

/// Print a one-line quote summary when the payload carries the usual fields,
/// otherwise fall back to the raw JSON.
fn show_chart(symbol: &str, data: &Value) -> Result<()> {
    let price = data.get("price").and_then(Value::as_f64);
    let change = data.get("change").and_then(Value::as_f64);
    let change_percent = data.get("change_percent").and_then(Value::as_f64);
    let volume = data.get("volume").and_then(Value::as_f64);

    match (price, change, change_percent) {
        (Some(_), Some(change), Some(change_percent)) => {
            println!(
                "{}: {} {} vol {}",
                symbol,
                format_price(price),
                format_change(change, change_percent),
                format_volume(volume)
            );
            Ok(())
        }
        _ => {
            println!("{}:", symbol);
            print_json(data)
        }
    }
}

fn print_json(value: &Value) -> Result<()> {
    println!(
        "{}",
        serde_json::to_string_pretty(value).context("Failed to render response")?
    );
    Ok(())
}
