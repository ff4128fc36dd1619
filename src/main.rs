use std::sync::Arc;

use anyhow::Result;
use clap::{Parser, Subcommand};
use tracing::info;
use tracing_subscriber::EnvFilter;

use vitalguard::alerts::AlertService;
use vitalguard::broadcast::Broadcaster;
use vitalguard::config::Settings;
use vitalguard::db::Database;
use vitalguard::notify::LogOnlyNotifier;
use vitalguard::scheduler::IngestScheduler;
use vitalguard::simulator::VitalSimulator;

#[derive(Parser)]
#[command(name = "vitalguard", about = "Patient vital-sign monitoring core")]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Run the ingestion scheduler until interrupted.
    Monitor {
        /// Override the cycle interval in seconds.
        #[arg(long)]
        interval: Option<u64>,
    },
    /// Onboard a patient with default alert thresholds.
    AddPatient {
        name: String,
        #[arg(long)]
        condition: Option<String>,
    },
}

#[tokio::main(flavor = "multi_thread")]
async fn main() -> Result<()> {
    dotenv::dotenv().ok();
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")))
        .init();

    let cli = Cli::parse();
    let mut settings = Settings::from_env();

    match cli.command {
        Commands::Monitor { interval } => {
            if let Some(interval) = interval {
                settings.simulation_interval_secs = interval;
            }

            let db = Arc::new(Database::connect(&settings.database_url).await?);
            let broadcaster = Arc::new(Broadcaster::new());
            let alerts = Arc::new(AlertService::new(
                db.clone(),
                broadcaster.clone(),
                Arc::new(LogOnlyNotifier),
                settings.risk_window(),
            ));
            let scheduler = Arc::new(IngestScheduler::new(
                db,
                Arc::new(VitalSimulator::new()),
                alerts,
                broadcaster,
                settings,
            ));

            scheduler.start().await;
            tokio::signal::ctrl_c().await?;
            info!("shutdown requested");
            scheduler.stop().await;
        }
        Commands::AddPatient { name, condition } => {
            let db = Database::connect(&settings.database_url).await?;
            let patient = db.create_patient(&name, condition.as_deref()).await?;
            println!("created patient {} ({})", patient.id, patient.full_name);
        }
    }

    Ok(())
}
