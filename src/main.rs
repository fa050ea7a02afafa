use anyhow::Result;
use disaster_response::{
    config,
    journal::{JournalStats, JournalStorage},
    simulation::Simulation,
};
use std::sync::Arc;
use tracing::{info, warn};

/// Validates that a log level string is valid
fn validate_log_level(level: &str) -> Result<()> {
    level
        .parse::<tracing_subscriber::filter::LevelFilter>()
        .map_err(|_| {
            anyhow::anyhow!(
                "Invalid log level: '{}'. Valid levels: error, warn, info, debug, trace",
                level
            )
        })?;
    Ok(())
}

#[tokio::main]
async fn main() -> Result<()> {
    // Load configuration first (before logging setup)
    let config = match config::load().await {
        Ok(config) => config,
        Err(e) => {
            eprintln!("Failed to load configuration: {}", e);
            std::process::exit(1);
        }
    };

    // Determine log level: environment variable overrides config
    let log_level = std::env::var("RUST_LOG").unwrap_or_else(|_| config.logs.level.clone());

    if let Err(e) = validate_log_level(&log_level) {
        eprintln!("{}", e);
        std::process::exit(1);
    }

    let filter = tracing_subscriber::EnvFilter::try_from_default_env()
        .or_else(|_| tracing_subscriber::EnvFilter::try_new(&log_level))?;
    tracing_subscriber::fmt().with_env_filter(filter).json().init();

    info!("Starting disaster-response simulation with log level: {}", log_level);

    let journal = Arc::new(JournalStorage::new(&config.journal.database_path).await?);
    let mut simulation = Simulation::from_config(&config, journal.clone())?;

    for report in &config.scenario.reports {
        if let Err(e) = simulation.ingest(report).await {
            warn!("Skipping report from {}: {}", report.sensor_id, e);
        }
    }

    let ticks = simulation.run(config.simulation.max_ticks).await?;
    info!("Simulation finished after {} ticks", ticks.len());

    for agent in simulation.agents() {
        info!(
            "Agent {} ({}) ended in {} with {} rescued, {} treated, goals done: {}",
            agent.id(),
            agent.kind(),
            agent.state(),
            agent.context().rescued_total,
            agent.context().patients_treated,
            agent.completed_goals().len()
        );
    }

    let stats = JournalStats::from_records(&journal.list().await?);
    info!("Journal statistics: {}", serde_json::to_string(&stats)?);

    Ok(())
}
