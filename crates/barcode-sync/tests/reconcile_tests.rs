//! Reconciler integration tests
//!
//! These drive a full run against real source files in a temporary directory
//! and an in-memory remote table, covering:
//! - Marker gating and idempotent re-runs
//! - Set difference and first-seen row selection
//! - Marker persistence only after a successful run
//!
//! No database is required.

use async_trait::async_trait;
use barcode_common::{BarcodeRow, BarcodeSet};
use barcode_sync::marker::{CURRENT_MARKER_FILE, LAST_MARKER_FILE};
use barcode_sync::{
    BarcodeSink, BarcodeSource, CommitMarkers, InsertStats, Reconciler, Result, SourceConfig,
    SyncError, SyncOutcome,
};
use std::path::PathBuf;
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use tempfile::TempDir;

// ============================================================================
// Test Helpers
// ============================================================================

/// In-memory stand-in for the remote barcode table
#[derive(Default)]
struct FakeTable {
    rows: Mutex<Vec<BarcodeRow>>,
    reads: AtomicUsize,
    insert_calls: Mutex<Vec<Vec<BarcodeRow>>>,
    fail_reads: AtomicBool,
    fail_inserts: AtomicBool,
}

impl FakeTable {
    fn with_barcodes(barcodes: &[i64]) -> Arc<Self> {
        let table = Self::default();
        *table.rows.lock().unwrap() = barcodes
            .iter()
            .map(|b| BarcodeRow::new(*b, "existing", 100))
            .collect();
        Arc::new(table)
    }

    fn reads(&self) -> usize {
        self.reads.load(Ordering::SeqCst)
    }

    fn insert_calls(&self) -> Vec<Vec<BarcodeRow>> {
        self.insert_calls.lock().unwrap().clone()
    }
}

#[async_trait]
impl BarcodeSource for FakeTable {
    async fn fetch_barcodes(&self) -> Result<BarcodeSet> {
        self.reads.fetch_add(1, Ordering::SeqCst);
        if self.fail_reads.load(Ordering::SeqCst) {
            return Err(SyncError::RemoteUnavailable(sqlx::Error::PoolTimedOut));
        }
        Ok(self.rows.lock().unwrap().iter().map(|r| r.barcode).collect())
    }
}

#[async_trait]
impl BarcodeSink for FakeTable {
    async fn insert_rows(&self, rows: &[BarcodeRow]) -> Result<InsertStats> {
        self.insert_calls.lock().unwrap().push(rows.to_vec());
        if self.fail_inserts.load(Ordering::SeqCst) {
            return Err(SyncError::Remote(sqlx::Error::WorkerCrashed));
        }
        self.rows.lock().unwrap().extend_from_slice(rows);
        Ok(InsertStats {
            rows_inserted: rows.len(),
            batches: 1,
        })
    }
}

struct Workspace {
    root: TempDir,
}

impl Workspace {
    fn new() -> Self {
        let root = TempDir::new().unwrap();
        std::fs::create_dir(root.path().join("data")).unwrap();
        Self { root }
    }

    fn data_file(&self, name: &str, rows: &[(i64, &str)]) {
        let mut body = String::from("ID\tUPCEAN\tName\tCategoryID\n");
        for (i, (barcode, name)) in rows.iter().enumerate() {
            body.push_str(&format!("{}\t{}\t{}\t1\n", i, barcode, name));
        }
        std::fs::write(self.root.path().join("data").join(name), body).unwrap();
    }

    fn raw_data_file(&self, name: &str, body: &str) {
        std::fs::write(self.root.path().join("data").join(name), body).unwrap();
    }

    fn set_current(&self, revision: &str) {
        std::fs::write(self.root.path().join(CURRENT_MARKER_FILE), revision).unwrap();
    }

    fn last_path(&self) -> PathBuf {
        self.root.path().join(LAST_MARKER_FILE)
    }

    fn last(&self) -> Option<String> {
        std::fs::read_to_string(self.last_path()).ok()
    }

    fn reconciler(&self, table: &Arc<FakeTable>) -> Reconciler<Arc<FakeTable>, Arc<FakeTable>> {
        Reconciler::new(
            SourceConfig::for_dir(self.root.path().join("data")),
            CommitMarkers::in_dir(self.root.path()),
            Arc::clone(table),
            Arc::clone(table),
        )
    }
}

fn expect_report(outcome: SyncOutcome) -> barcode_sync::SyncReport {
    match outcome {
        SyncOutcome::Reconciled { report, .. } => report,
        other => panic!("Expected a reconciliation, got {:?}", other),
    }
}

// ============================================================================
// Reconciliation Tests
// ============================================================================

#[tokio::test]
async fn test_inserts_only_new_barcodes_and_records_marker() {
    let ws = Workspace::new();
    ws.data_file("a.csv", &[(1, "Milk"), (2, "Bread"), (3, "Eggs")]);
    ws.set_current("rev-1\n");
    let table = FakeTable::with_barcodes(&[2, 3]);

    let report = expect_report(ws.reconciler(&table).run().await.unwrap());

    assert_eq!(report.local_barcodes, 3);
    assert_eq!(report.remote_barcodes, 2);
    assert_eq!(report.new_barcodes, 1);
    assert_eq!(report.insert.rows_inserted, 1);
    assert_eq!(table.insert_calls(), vec![vec![BarcodeRow::new(1, "Milk", 100)]]);
    assert_eq!(ws.last().as_deref(), Some("rev-1\n"));
}

#[tokio::test]
async fn test_second_run_with_same_revision_is_a_no_op() {
    let ws = Workspace::new();
    ws.data_file("a.csv", &[(1, "Milk")]);
    ws.set_current("rev-1");
    let table = FakeTable::with_barcodes(&[]);
    let reconciler = ws.reconciler(&table);

    reconciler.run().await.unwrap();
    let reads_after_first = table.reads();
    let inserts_after_first = table.insert_calls().len();

    let outcome = reconciler.run().await.unwrap();

    assert_eq!(
        outcome,
        SyncOutcome::UpToDate {
            revision: "rev-1".to_string()
        }
    );
    assert_eq!(table.reads(), reads_after_first);
    assert_eq!(table.insert_calls().len(), inserts_after_first);
}

#[tokio::test]
async fn test_new_revision_without_new_barcodes_skips_write() {
    let ws = Workspace::new();
    ws.data_file("a.csv", &[(1, "Milk"), (2, "Bread")]);
    ws.set_current("rev-2");
    std::fs::write(ws.last_path(), "rev-1").unwrap();
    let table = FakeTable::with_barcodes(&[1, 2, 5]);

    let report = expect_report(ws.reconciler(&table).run().await.unwrap());

    assert_eq!(report.new_barcodes, 0);
    assert_eq!(report.insert, InsertStats::default());
    assert!(table.insert_calls().is_empty());
    assert_eq!(ws.last().as_deref(), Some("rev-2"));
}

#[tokio::test]
async fn test_first_seen_name_is_inserted_for_duplicates() {
    let ws = Workspace::new();
    ws.data_file("01.csv", &[(10, "Original name")]);
    ws.data_file("02.csv", &[(10, "Later name"), (11, "Other")]);
    ws.set_current("rev-1");
    let table = FakeTable::with_barcodes(&[]);

    let report = expect_report(ws.reconciler(&table).run().await.unwrap());

    assert_eq!(report.load.duplicates_dropped, 1);
    let inserted = &table.insert_calls()[0];
    assert!(inserted.contains(&BarcodeRow::new(10, "Original name", 100)));
    assert!(!inserted.iter().any(|r| r.name == "Later name"));
    assert_eq!(inserted.len(), 2);
}

#[tokio::test]
async fn test_unparsable_files_are_skipped_not_fatal() {
    let ws = Workspace::new();
    ws.data_file("good-1.csv", &[(1, "Milk")]);
    ws.data_file("good-2.csv", &[(2, "Bread")]);
    ws.raw_data_file("broken.csv", "ID\tUPCEAN\tName\n1\t3\tTea\tstray\tcells\n");
    ws.raw_data_file("README.md", "not a table\n\"unterminated");
    ws.set_current("rev-1");
    let table = FakeTable::with_barcodes(&[]);

    let report = expect_report(ws.reconciler(&table).run().await.unwrap());

    assert_eq!(report.load.files_loaded, 2);
    assert_eq!(report.load.files_skipped, 1);
    assert_eq!(report.local_barcodes, 2);
}

#[tokio::test]
async fn test_empty_source_directory_inserts_nothing() {
    let ws = Workspace::new();
    ws.set_current("rev-1");
    let table = FakeTable::with_barcodes(&[1]);

    let report = expect_report(ws.reconciler(&table).run().await.unwrap());

    assert_eq!(report.local_barcodes, 0);
    assert!(table.insert_calls().is_empty());
    assert_eq!(ws.last().as_deref(), Some("rev-1"));
}

// ============================================================================
// Failure Handling Tests
// ============================================================================

#[tokio::test]
async fn test_missing_current_marker_is_fatal_and_touches_nothing() {
    let ws = Workspace::new();
    ws.data_file("a.csv", &[(1, "Milk")]);
    let table = FakeTable::with_barcodes(&[]);

    let err = ws.reconciler(&table).run().await.unwrap_err();

    assert!(matches!(err, SyncError::CurrentMarkerMissing { .. }));
    assert_eq!(table.reads(), 0);
    assert!(ws.last().is_none());
}

#[tokio::test]
async fn test_remote_read_failure_keeps_marker() {
    let ws = Workspace::new();
    ws.data_file("a.csv", &[(1, "Milk")]);
    ws.set_current("rev-1");
    let table = FakeTable::with_barcodes(&[]);
    table.fail_reads.store(true, Ordering::SeqCst);

    let err = ws.reconciler(&table).run().await.unwrap_err();

    assert!(err.is_remote());
    assert!(table.insert_calls().is_empty());
    assert!(ws.last().is_none());
}

#[tokio::test]
async fn test_insert_failure_keeps_previous_marker_and_retries() {
    let ws = Workspace::new();
    ws.data_file("a.csv", &[(1, "Milk")]);
    ws.set_current("rev-2");
    std::fs::write(ws.last_path(), "rev-1").unwrap();
    let table = FakeTable::with_barcodes(&[]);
    table.fail_inserts.store(true, Ordering::SeqCst);
    let reconciler = ws.reconciler(&table);

    assert!(matches!(reconciler.run().await, Err(SyncError::Remote(_))));
    assert_eq!(ws.last().as_deref(), Some("rev-1"));

    table.fail_inserts.store(false, Ordering::SeqCst);
    let report = expect_report(reconciler.run().await.unwrap());

    assert_eq!(report.insert.rows_inserted, 1);
    assert_eq!(table.insert_calls().len(), 2);
    assert_eq!(ws.last().as_deref(), Some("rev-2"));
}

#[tokio::test]
async fn test_missing_source_directory_keeps_marker() {
    let ws = Workspace::new();
    ws.set_current("rev-1");
    let table = FakeTable::with_barcodes(&[]);
    let reconciler = Reconciler::new(
        SourceConfig::for_dir(ws.root.path().join("no-such-dir")),
        CommitMarkers::in_dir(ws.root.path()),
        Arc::clone(&table),
        Arc::clone(&table),
    );

    let err = reconciler.run().await.unwrap_err();

    assert!(matches!(err, SyncError::SourceDirectory { .. }));
    assert!(ws.last().is_none());
}
