use anyhow::Result;
use chrono::Utc;
use clap::{Parser, Subcommand};
use tracing::info;
use tracing_subscriber::EnvFilter;

use docketcc_common::{Config, Frequency};
use docketcc_pipeline::{Pipeline, PipelineDeps};
use docketcc_store::{connect, migrate, SubscribeOutcome};

#[derive(Parser)]
#[command(name = "docketcc", about = "FCC docket filing ingestion and notification pipeline")]
struct Cli {
    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand)]
enum Command {
    /// Scheduled run: poll the highest-priority dockets, then deliver due digests
    Run,
    /// Poll one docket now, ignoring the time-of-day heuristic
    Trigger {
        docket: String,
        #[arg(long, default_value_t = 24)]
        lookback_hours: i64,
    },
    /// Send due digests from the notification queue
    Deliver,
    /// Queue digests for recent filings a subscriber was never queued for
    Reconcile {
        #[arg(long, default_value_t = 48)]
        window_hours: i64,
    },
    /// Retry AI enrichment for pending and failed filings
    Reprocess {
        #[arg(long, default_value_t = 25)]
        limit: i64,
    },
    /// Downgrade lapsed trials to free
    ExpireTrials,
    /// Subscribe an email address to a docket
    Subscribe {
        email: String,
        docket: String,
        #[arg(long, default_value = "daily")]
        frequency: Frequency,
    },
    /// Apply database migrations and exit
    Migrate,
}

#[tokio::main]
async fn main() -> Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::from_default_env().add_directive("docketcc=info".parse()?))
        .init();

    let cli = Cli::parse();

    let config = Config::from_env()?;
    config.log_redacted();

    let pool = connect(&config.database_url).await?;
    migrate(&pool).await?;

    let pipeline = Pipeline::new(PipelineDeps::from_config(pool, &config));

    match cli.command {
        Command::Run => {
            let report = pipeline.run_scheduled(Utc::now()).await?;
            info!(report = %serde_json::to_string(&report)?, "Run complete");
            let delivered = pipeline.deliver(Utc::now()).await?;
            info!(sent = delivered.sent, failed = delivered.failed, "Delivery complete");
        }
        Command::Trigger {
            docket,
            lookback_hours,
        } => {
            let report = pipeline.run_docket(&docket, lookback_hours).await?;
            println!("{}", serde_json::to_string_pretty(&report)?);
        }
        Command::Deliver => {
            let report = pipeline.deliver(Utc::now()).await?;
            println!("{}", serde_json::to_string_pretty(&report)?);
        }
        Command::Reconcile { window_hours } => {
            let report = pipeline.reconcile(window_hours, Utc::now()).await?;
            println!("{}", serde_json::to_string_pretty(&report)?);
        }
        Command::Reprocess { limit } => {
            let report = pipeline.reprocess_pending(limit).await?;
            println!("{}", serde_json::to_string_pretty(&report)?);
        }
        Command::ExpireTrials => {
            let expired = pipeline.expire_trials(Utc::now()).await?;
            println!("Expired {expired} trials");
        }
        Command::Subscribe {
            email,
            docket,
            frequency,
        } => match pipeline.users().subscribe(&email, &docket, frequency).await? {
            SubscribeOutcome::Created {
                subscription,
                replaced,
            } => {
                println!(
                    "Subscribed to {} ({})",
                    subscription.docket_number, subscription.frequency
                );
                for docket in replaced {
                    println!("Removed free-tier subscription to {docket}");
                }
            }
            SubscribeOutcome::Existing { subscription } => {
                println!("Already subscribed to {}", subscription.docket_number);
            }
        },
        Command::Migrate => info!("Migrations applied"),
    }

    Ok(())
}
