//! Barcode Sync Library
//!
//! Keeps a PostgreSQL barcode reference table in step with a local checkout
//! of the UHTT barcode reference data. Each run:
//!
//! 1. compares `current_commit_hash` with `last_commit_hash` and stops if equal
//! 2. loads every tab-separated source file, deduplicated by barcode
//! 3. fetches the barcodes already stored remotely
//! 4. inserts the difference in batches, in one transaction
//! 5. records the current revision as processed
//!
//! # Example
//!
//! ```no_run
//! use barcode_sync::{Reconciler, SyncConfig, SyncOutcome};
//!
//! #[tokio::main(flavor = "current_thread")]
//! async fn main() -> anyhow::Result<()> {
//!     let config = SyncConfig::load()?;
//!     match Reconciler::from_config(&config)?.run().await? {
//!         SyncOutcome::UpToDate { .. } => {},
//!         SyncOutcome::Reconciled { report, .. } => {
//!             tracing::info!(inserted = report.insert.rows_inserted, "Sync finished");
//!         },
//!     }
//!     Ok(())
//! }
//! ```

pub mod config;
pub mod error;
pub mod local;
pub mod marker;
pub mod remote;
pub mod sync;

pub use config::{DatabaseConfig, SourceConfig, SyncConfig};
pub use error::{Result, SyncError};
pub use local::{LoadStats, LocalBarcodeReference};
pub use marker::CommitMarkers;
pub use remote::{BarcodeSink, BarcodeSource, InsertStats, PgBarcodeReader, PgBarcodeWriter};
pub use sync::{new_barcodes, Reconciler, SyncOutcome, SyncReport};
