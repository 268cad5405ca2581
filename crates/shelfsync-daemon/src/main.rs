mod pipeline;
mod publish;
mod scheduler;

use std::time::Duration;

use clap::Parser;
use shelfsync_core::AppConfig;
use shelfsync_scraper::{CatalogFetcher, ImageFetcher, NormalizeOptions};
use shelfsync_store::CatalogStore;
use tracing_subscriber::EnvFilter;

use crate::pipeline::{SyncOutcome, SyncPipeline};
use crate::scheduler::{ManualListener, ManualTrigger, RunReason, SyncScheduler, SystemClock};

#[derive(Debug, Parser)]
#[command(name = "shelfsync")]
#[command(about = "Keeps the local storefront catalog in sync with the vendor")]
struct Cli {
    /// Run a single sync cycle and exit.
    #[arg(long)]
    once: bool,

    /// Queue a sync at startup instead of waiting for the first interval.
    #[arg(long)]
    run_now: bool,
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    dotenvy::dotenv().ok();
    let cli = Cli::parse();
    let config = shelfsync_core::load_app_config()?;
    let env_filter = EnvFilter::try_from_default_env()
        .or_else(|_| EnvFilter::try_new(config.log_level.clone()))?;
    tracing_subscriber::fmt().with_env_filter(env_filter).init();
    tracing::debug!(?config, "configuration loaded");

    let pipeline = build_pipeline(&config)?;

    if cli.once {
        let outcome = pipeline.run_once().await?;
        tracing::info!(?outcome, "single sync finished");
        return Ok(());
    }

    let scheduler = SyncScheduler::new(
        SystemClock,
        Duration::from_secs(config.sync_interval_secs),
        config.run_on_start || cli.run_now,
    );
    let trigger = ManualTrigger::new();
    let listener = if config.manual_trigger {
        ManualListener::start(trigger.clone())
    } else {
        None
    };

    tokio::select! {
        () = scheduler::drive(
            scheduler,
            trigger,
            listener,
            Duration::from_secs(config.poll_interval_secs.max(1)),
            |reason| run_cycle(&pipeline, reason),
        ) => {}
        () = shutdown_signal() => {}
    }
    Ok(())
}

fn build_pipeline(config: &AppConfig) -> anyhow::Result<SyncPipeline> {
    let fetcher = CatalogFetcher::from_config(config)?;
    tracing::info!(
        source = %config.source_url,
        strategies = ?config.strategies,
        "extraction chain ready"
    );

    let mut pipeline = SyncPipeline::new(
        fetcher,
        NormalizeOptions::from_config(config),
        CatalogStore::from_config(config),
        config.empty_catalog_policy,
    )
    .with_publish_hook(publish::hook_from_config(config));

    if config.download_images {
        pipeline = pipeline.with_images(ImageFetcher::from_config(config)?, config.image_concurrency);
    }
    Ok(pipeline)
}

/// Runs one cycle and logs the result; never fails the scheduler.
async fn run_cycle(pipeline: &SyncPipeline, reason: RunReason) {
    match pipeline.run_once().await {
        Ok(SyncOutcome::Replaced { records, strategy }) => {
            tracing::info!(%reason, records, %strategy, "sync cycle complete");
        }
        Ok(outcome) => tracing::warn!(%reason, ?outcome, "sync cycle complete without new records"),
        Err(e) => tracing::error!(
            %reason,
            error = %e,
            "sync cycle failed; previous catalog kept, retrying on next trigger"
        ),
    }
}

async fn shutdown_signal() {
    let ctrl_c = async {
        if let Err(e) = tokio::signal::ctrl_c().await {
            tracing::error!(error = %e, "failed to listen for ctrl-c");
            std::future::pending::<()>().await;
        }
    };

    #[cfg(unix)]
    let terminate = async {
        match tokio::signal::unix::signal(tokio::signal::unix::SignalKind::terminate()) {
            Ok(mut signal) => {
                signal.recv().await;
            }
            Err(e) => {
                tracing::error!(error = %e, "failed to install SIGTERM handler");
                std::future::pending::<()>().await;
            }
        }
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        () = ctrl_c => {},
        () = terminate => {},
    }

    tracing::info!("received shutdown signal, exiting");
}
