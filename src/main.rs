//! CLI interface for flight-search

use anyhow::{Context, Result};
use clap::{Parser, Subcommand};
use flight_search::{
    DraftField, GatewayConfig, PassengerCategory, PricingGateway, QueryBuilder, SearchOrchestrator,
    SearchState,
};
use std::fs;
use std::path::PathBuf;
use std::time::Duration;
use tracing::info;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};

#[derive(Parser)]
#[command(name = "flight-search")]
#[command(about = "Search flight prices via the Sky Scrapper price calendar")]
#[command(version)]
pub struct Cli {
    /// Write JSON logs to daily files in this directory instead of stderr
    #[arg(long, global = true)]
    pub log_dir: Option<PathBuf>,

    #[command(subcommand)]
    pub command: Commands,
}

#[derive(Subcommand)]
pub enum Commands {
    /// Search for flight prices
    Search {
        /// Origin SkyId (e.g. BOM)
        #[arg(short, long)]
        from: String,
        /// Destination SkyId (e.g. JFK)
        #[arg(short, long)]
        to: String,
        /// Departure date (YYYY-MM-DD)
        #[arg(short, long)]
        date: String,
        /// Return date (YYYY-MM-DD)
        #[arg(short, long)]
        return_date: Option<String>,
        /// Number of adults
        #[arg(long, default_value = "1")]
        adults: u32,
        /// Number of children (2-11)
        #[arg(long, default_value = "0")]
        children: u32,
        /// Number of infants on lap
        #[arg(long, default_value = "0")]
        infants: u32,
        /// Cabin class (economy, premiumEconomy, business, first)
        #[arg(long, default_value = "economy")]
        class: String,
        /// Output file for JSON results
        #[arg(short, long)]
        output: Option<String>,
        /// RapidAPI key for the Sky Scrapper API
        #[arg(long, env = "SKY_SCRAPPER_API_KEY", hide_env_values = true)]
        api_key: String,
        /// Provider base URL
        #[arg(long, env = "SKY_SCRAPPER_BASE_URL")]
        base_url: Option<String>,
        /// Give up on the provider after this many seconds
        #[arg(long)]
        timeout_secs: Option<u64>,
    },
}

fn init_logging(log_dir: Option<&PathBuf>) -> Result<()> {
    let filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new("flight_search=info"));

    match log_dir {
        Some(dir) => {
            fs::create_dir_all(dir)?;
            let file_appender = tracing_appender::rolling::daily(dir, "flight-search.log");
            tracing_subscriber::registry()
                .with(filter)
                .with(
                    tracing_subscriber::fmt::layer()
                        .with_writer(file_appender)
                        .with_ansi(false)
                        .with_target(true)
                        .json(),
                )
                .init();
        }
        None => {
            tracing_subscriber::registry()
                .with(filter)
                .with(tracing_subscriber::fmt::layer().with_writer(std::io::stderr))
                .init();
        }
    }
    Ok(())
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();
    init_logging(cli.log_dir.as_ref())?;

    match cli.command {
        Commands::Search {
            from,
            to,
            date,
            return_date,
            adults,
            children,
            infants,
            class,
            output,
            api_key,
            base_url,
            timeout_secs,
        } => {
            // Fill the draft the way the search form would
            let mut draft = QueryBuilder::new();
            draft.set_field(DraftField::Origin, from)?;
            draft.set_field(DraftField::Destination, to)?;
            draft.set_field(DraftField::DepartureDate, date)?;
            draft.set_field(DraftField::ReturnDate, return_date.unwrap_or_default())?;
            draft.set_field(DraftField::CabinClass, class)?;
            draft.set_passenger_count(PassengerCategory::Adults, adults);
            draft.set_passenger_count(PassengerCategory::Children, children);
            draft.set_passenger_count(PassengerCategory::Infants, infants);

            let mut config = GatewayConfig::with_api_key(api_key);
            if let Some(base_url) = base_url {
                config.base_url = base_url;
            }
            config.timeout = timeout_secs.map(Duration::from_secs);

            let orchestrator = SearchOrchestrator::new(PricingGateway::new(config)?);

            println!(
                "Searching {} passenger(s), {}...",
                draft.total_passengers(),
                draft.cabin_class().label()
            );
            orchestrator.submit(&draft).await?;

            match orchestrator.state() {
                SearchState::Success(entries) => {
                    if let Some(output_file) = output {
                        let json = serde_json::to_string_pretty(&entries)?;
                        fs::write(&output_file, &json)
                            .with_context(|| format!("writing {}", output_file))?;
                        println!("Results saved to {}", output_file);
                    }

                    if entries.is_empty() {
                        println!("No flights found.");
                    }
                    for entry in &entries {
                        let day = entry
                            .departure_day()
                            .map(|d| d.format("%a %d %b %Y").to_string())
                            .unwrap_or_else(|| entry.date.clone());
                        println!("{}  ({})", entry, day);
                        println!("    Book now: {}", entry.booking_link);
                    }
                    info!(entries = entries.len(), "Search finished");
                }
                SearchState::Error(reason) => {
                    eprintln!("Error searching for flights: {}", reason);
                    std::process::exit(1);
                }
                SearchState::Idle | SearchState::Loading => {
                    anyhow::bail!("search did not settle");
                }
            }
        }
    }

    Ok(())
}
