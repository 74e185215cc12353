//! Bulk insert of new barcode rows
//!
//! Rows are split into fixed-size batches, one multi-row parameterized INSERT
//! per batch, all inside a single transaction committed at the end.

use super::{BarcodeSink, InsertStats, RemoteTarget, TableRef};
use crate::config::DEFAULT_BATCH_SIZE;
use crate::error::{Result, SyncError};
use async_trait::async_trait;
use barcode_common::BarcodeRow;
use sqlx::postgres::PgConnection;
use sqlx::{Connection, Postgres, QueryBuilder};
use std::borrow::Cow;
use tracing::{debug, info};

/// Characters that never reach the remote `name` column
const STRIPPED_NAME_CHARS: [char; 3] = ['\'', '"', '\\'];

/// Remove quotes and backslashes from a product name
pub fn sanitize_name(name: &str) -> Cow<'_, str> {
    if name.contains(STRIPPED_NAME_CHARS) {
        Cow::Owned(name.chars().filter(|c| !STRIPPED_NAME_CHARS.contains(c)).collect())
    } else {
        Cow::Borrowed(name)
    }
}

pub struct PgBarcodeWriter {
    target: RemoteTarget,
    batch_size: usize,
}

impl PgBarcodeWriter {
    pub fn new(target: RemoteTarget) -> Self {
        Self::with_batch_size(target, DEFAULT_BATCH_SIZE)
    }

    /// Writer with a custom batch size (clamped to at least one row)
    pub fn with_batch_size(target: RemoteTarget, batch_size: usize) -> Self {
        Self {
            target,
            batch_size: batch_size.max(1),
        }
    }

    pub fn batch_size(&self) -> usize {
        self.batch_size
    }

    /// One INSERT per batch of already-sanitized rows
    pub fn insert_statements<'a>(
        &self,
        rows: &'a [BarcodeRow],
    ) -> impl Iterator<Item = QueryBuilder<'a, Postgres>> + 'a {
        let table = self.target.table().clone();
        rows.chunks(self.batch_size)
            .map(move |chunk| build_insert(&table, chunk))
    }

    async fn insert_batches(
        &self,
        conn: &mut PgConnection,
        rows: &[BarcodeRow],
    ) -> Result<InsertStats> {
        let total_batches = rows.len().div_ceil(self.batch_size);
        let mut stats = InsertStats::default();

        let mut tx = conn.begin().await.map_err(SyncError::Remote)?;

        for (batch_idx, mut statement) in self.insert_statements(rows).enumerate() {
            let result = statement
                .build()
                .execute(&mut *tx)
                .await
                .map_err(SyncError::Remote)?;

            stats.batches += 1;
            stats.rows_inserted += result.rows_affected() as usize;
            debug!(
                batch = batch_idx + 1,
                total_batches,
                rows = result.rows_affected(),
                "Batch inserted"
            );
        }

        tx.commit().await.map_err(SyncError::Remote)?;
        Ok(stats)
    }
}

/// `INSERT INTO <table> (barcode, name, owner) VALUES ($1, $2, $3), ...`
fn build_insert<'a>(table: &TableRef, rows: &'a [BarcodeRow]) -> QueryBuilder<'a, Postgres> {
    let mut query_builder: QueryBuilder<Postgres> =
        QueryBuilder::new(format!("INSERT INTO {} (barcode, name, owner) ", table));

    query_builder.push_values(rows, |mut b, row| {
        b.push_bind(row.barcode)
            .push_bind(&row.name)
            .push_bind(row.owner);
    });

    query_builder
}

#[async_trait]
impl BarcodeSink for PgBarcodeWriter {
    async fn insert_rows(&self, rows: &[BarcodeRow]) -> Result<InsertStats> {
        if rows.is_empty() {
            debug!("No rows to insert, skipping connection");
            return Ok(InsertStats::default());
        }

        let rows: Vec<BarcodeRow> = rows
            .iter()
            .map(|row| BarcodeRow {
                name: sanitize_name(&row.name).into_owned(),
                ..row.clone()
            })
            .collect();

        info!(
            rows = rows.len(),
            batch_size = self.batch_size,
            table = %self.target.table(),
            "Inserting new barcodes"
        );

        let mut conn = self.target.connect().await?;
        let result = self.insert_batches(&mut conn, &rows).await;
        self.target.release(conn).await;

        let stats = result?;
        info!(
            rows_inserted = stats.rows_inserted,
            batches = stats.batches,
            "New barcodes committed"
        );
        Ok(stats)
    }
}
