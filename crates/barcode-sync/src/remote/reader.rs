//! Reads the barcodes already present in the remote table

use super::{BarcodeSource, RemoteTarget};
use crate::error::{Result, SyncError};
use async_trait::async_trait;
use barcode_common::{Barcode, BarcodeSet};
use futures::TryStreamExt;
use sqlx::postgres::PgConnection;
use tracing::{debug, info};

pub struct PgBarcodeReader {
    target: RemoteTarget,
}

impl PgBarcodeReader {
    pub fn new(target: RemoteTarget) -> Self {
        Self { target }
    }

    pub fn select_sql(&self) -> String {
        format!("SELECT barcode FROM {}", self.target.table())
    }

    async fn fetch(&self, conn: &mut PgConnection) -> Result<BarcodeSet> {
        let sql = self.select_sql();
        debug!(sql = %sql, "Fetching remote barcodes");

        sqlx::query_scalar::<_, Barcode>(&sql)
            .fetch(&mut *conn)
            .try_collect::<BarcodeSet>()
            .await
            .map_err(SyncError::Remote)
    }
}

#[async_trait]
impl BarcodeSource for PgBarcodeReader {
    async fn fetch_barcodes(&self) -> Result<BarcodeSet> {
        let mut conn = self.target.connect().await?;
        let result = self.fetch(&mut conn).await;
        self.target.release(conn).await;

        let barcodes = result?;
        info!(count = barcodes.len(), table = %self.target.table(), "Remote barcodes fetched");
        Ok(barcodes)
    }
}
