//! barcode-sync - loads new reference barcodes into the remote table

use anyhow::{Context, Result};
use barcode_common::logging::{init_logging, LogConfig, LogLevel};
use barcode_sync::{Reconciler, SyncConfig, SyncOutcome};
use tracing::{debug, error, info};

#[tokio::main(flavor = "current_thread")]
async fn main() -> Result<()> {
    // Also reads `.env`, so LOG_* settings from it apply below
    let config = SyncConfig::load().context("Failed to load configuration")?;

    let log_config = LogConfig::builder()
        .level(LogLevel::Info)
        .log_file_prefix("barcode-sync")
        .filter_directives("sqlx=warn")
        .build();
    let _log_guard = init_logging(&LogConfig::from_env_or(log_config)?)?;

    debug!(?config, "Configuration loaded");

    let reconciler = Reconciler::from_config(&config)?;

    match reconciler.run().await {
        Ok(SyncOutcome::UpToDate { .. }) => {
            info!("Barcode reference already up to date");
        },
        Ok(SyncOutcome::Reconciled { report, .. }) => {
            info!(
                local = report.local_barcodes,
                remote = report.remote_barcodes,
                inserted = report.insert.rows_inserted,
                files_skipped = report.load.files_skipped,
                "Barcode sync complete"
            );
        },
        Err(e) => {
            error!(error = %e, "Barcode sync failed, revision marker not updated");
            return Err(e.into());
        },
    }

    Ok(())
}
