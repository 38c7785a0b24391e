use anyhow::Context;
use clap::{Parser, Subcommand};
use dotenv::dotenv;
use stepfilter::config::FilterConfig;
use stepfilter::filter::{summarize, ConditionsFilter, FilterServices, HttpWebhookTransport};
use stepfilter::loader::FixtureLoader;
use stepfilter::store::LogAuditSink;

use std::sync::Arc;

#[derive(Parser, Debug)]
#[command(author, version, about, long_about = None)]
struct Args {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand, Debug)]
enum Commands {
    /// Evaluate a step's filters from a fixture file
    Evaluate {
        /// Path to the fixture (YAML or JSON)
        #[arg(short, long)]
        file: String,
    },
    /// Summarize a list of evaluated conditions by filter kind
    Summarize {
        /// Path to a JSON or YAML list of conditions
        #[arg(short, long)]
        file: String,
    },
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    dotenv().ok();
    env_logger::init();

    let args = Args::parse();
    let loader = FixtureLoader::new();

    match args.command {
        Commands::Evaluate { file } => {
            let config = FilterConfig::from_env()?;
            let fixture = loader
                .load_fixture(&file)
                .with_context(|| format!("Failed to load fixture {}", file))?;
            log::info!("Loaded fixture {}", file);

            let store = fixture.seed_store().await;
            let transport = Arc::new(HttpWebhookTransport::new(config.webhook_timeout)?);
            let services = FilterServices::with_store(store, Arc::new(LogAuditSink), transport);
            let filter = ConditionsFilter::new(services, &config);

            let outcome = filter
                .filter(fixture.filters.as_deref(), &fixture.context)
                .await?;
            println!("{}", serde_json::to_string_pretty(&outcome)?);
        }
        Commands::Summarize { file } => {
            let conditions = loader
                .load_conditions(&file)
                .with_context(|| format!("Failed to load conditions {}", file))?;
            let used = summarize(&conditions);
            println!("{}", serde_json::to_string_pretty(&used)?);
        }
    }

    Ok(())
}
