//! Reconciliation driver
//!
//! A run first compares the revision markers. When the data checkout moved to
//! a new revision it loads the local reference, subtracts the barcodes already
//! stored remotely and inserts the rest. The last-processed marker is only
//! advanced once that whole step succeeded, so a failed run is retried in full
//! next time.

use crate::config::{SourceConfig, SyncConfig};
use crate::error::Result;
use crate::local::{LoadStats, LocalBarcodeReference};
use crate::marker::{CommitMarkers, RevisionCheck};
use crate::remote::{
    BarcodeSink, BarcodeSource, InsertStats, PgBarcodeReader, PgBarcodeWriter, RemoteTarget,
};
use barcode_common::BarcodeSet;
use tracing::{info, instrument};

/// Barcodes present locally but not remotely
pub fn new_barcodes(local: &BarcodeSet, remote: &BarcodeSet) -> BarcodeSet {
    local.difference(remote).copied().collect()
}

/// Result of one reconciliation step
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct SyncReport {
    pub local_barcodes: usize,
    pub remote_barcodes: usize,
    pub new_barcodes: usize,
    pub insert: InsertStats,
    pub load: LoadStats,
}

/// What a run did
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SyncOutcome {
    /// Markers were equal; nothing was read or written
    UpToDate { revision: String },
    /// Reconciliation ran and `revision` was recorded as processed
    Reconciled { revision: String, report: SyncReport },
}

pub struct Reconciler<S, W> {
    source: SourceConfig,
    markers: CommitMarkers,
    remote: S,
    sink: W,
}

impl Reconciler<PgBarcodeReader, PgBarcodeWriter> {
    /// Postgres-backed reconciler for a validated configuration
    pub fn from_config(config: &SyncConfig) -> Result<Self> {
        let target = RemoteTarget::from_config(&config.database)?;

        Ok(Self::new(
            config.source.clone(),
            CommitMarkers::new(config.current_marker_path(), config.last_marker_path()),
            PgBarcodeReader::new(target.clone()),
            PgBarcodeWriter::with_batch_size(target, config.database.batch_size),
        ))
    }
}

impl<S: BarcodeSource, W: BarcodeSink> Reconciler<S, W> {
    pub fn new(source: SourceConfig, markers: CommitMarkers, remote: S, sink: W) -> Self {
        Self {
            source,
            markers,
            remote,
            sink,
        }
    }

    /// Check the markers and reconcile if the data revision changed
    #[instrument(skip_all, name = "barcode_sync")]
    pub async fn run(&self) -> Result<SyncOutcome> {
        let (current, last) = match self.markers.check()? {
            RevisionCheck::UpToDate { revision } => {
                info!(revision = %revision.trim(), "Nothing to update, revision markers are equal");
                return Ok(SyncOutcome::UpToDate { revision });
            },
            RevisionCheck::Changed { current, last } => (current, last),
        };

        info!(
            current = %current.trim(),
            last = %last.trim(),
            "New data revision, reconciling"
        );

        let report = self.reconcile().await?;
        self.markers.record(&current)?;

        info!(
            revision = %current.trim(),
            new_barcodes = report.new_barcodes,
            rows_inserted = report.insert.rows_inserted,
            "Revision recorded as processed"
        );

        Ok(SyncOutcome::Reconciled {
            revision: current,
            report,
        })
    }

    /// Insert local barcodes missing remotely, ignoring the markers
    pub async fn reconcile(&self) -> Result<SyncReport> {
        let local = LocalBarcodeReference::load(&self.source)?;
        let local_barcodes = local.barcodes();
        let remote_barcodes = self.remote.fetch_barcodes().await?;

        let new = new_barcodes(&local_barcodes, &remote_barcodes);

        let insert = if new.is_empty() {
            info!("There are no new barcodes");
            InsertStats::default()
        } else {
            info!(count = new.len(), "There are new barcodes");
            let rows = local.rows_for(&new);
            self.sink.insert_rows(&rows).await?
        };

        Ok(SyncReport {
            local_barcodes: local_barcodes.len(),
            remote_barcodes: remote_barcodes.len(),
            new_barcodes: new.len(),
            insert,
            load: local.stats().clone(),
        })
    }
}
