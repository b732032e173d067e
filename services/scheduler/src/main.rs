//! vsched scheduler
//!
//! Runs scheduling cycles against the configured policy file until Ctrl+C.

use std::sync::Arc;
use std::time::Duration;

use anyhow::Result;
use clap::Parser;
use tokio::sync::watch;
use tracing::{error, info, warn};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};
use vsched_scheduler::{config::Settings, SchedulerBuilder};

#[tokio::main]
async fn main() -> Result<()> {
    let settings = Settings::parse();

    // Prefer RUST_LOG, fall back to VSCHED_LOG_LEVEL
    tracing_subscriber::registry()
        .with(
            EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| settings.log_level.clone().into()),
        )
        .with(tracing_subscriber::fmt::layer().json())
        .init();

    info!("Starting vsched scheduler");
    info!(
        scheduler_name = %settings.scheduler_name,
        scheduler_conf = ?settings.scheduler_conf,
        period_ms = settings.schedule_period_ms,
        "Configuration loaded"
    );

    let scheduler = match SchedulerBuilder::new(settings.schedule_period())
        .cycle_mode(settings.cycle_mode())
        .build(
            settings.connection(),
            settings.scheduler_name.clone(),
            settings.scheduler_conf.clone(),
            settings.default_queue.clone(),
        ) {
        Ok(scheduler) => Arc::new(scheduler),
        Err(e) => {
            error!(error = %e, "Failed to create scheduler");
            return Err(e.into());
        }
    };

    let (shutdown_tx, shutdown_rx) = watch::channel(false);
    let mut scheduler_handle = tokio::spawn(scheduler.run(shutdown_rx));

    tokio::select! {
        _ = tokio::signal::ctrl_c() => {
            info!("Received shutdown signal");
        }
        result = &mut scheduler_handle => {
            if let Err(e) = result {
                error!(error = %e, "Scheduler task panicked");
            }
            return Ok(());
        }
    }

    let _ = shutdown_tx.send(true);

    info!("Waiting for scheduler to shut down...");
    match tokio::time::timeout(Duration::from_secs(10), scheduler_handle).await {
        Ok(Err(e)) => error!(error = %e, "Scheduler task panicked"),
        Ok(Ok(())) => {}
        Err(e) => warn!(error = %e, "Scheduler did not shut down in time"),
    }

    info!("Scheduler shutdown complete");
    Ok(())
}
