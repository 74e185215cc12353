//! Remote barcode table access
//!
//! Reading and writing are separate capabilities ([`BarcodeSource`] and
//! [`BarcodeSink`]) so the reconciler can be driven against in-memory doubles.
//! The Postgres implementations share [`RemoteTarget`], which owns the connect
//! options and the qualified table name and scopes every connection to a
//! single operation.

pub mod reader;
pub mod writer;

pub use reader::PgBarcodeReader;
pub use writer::{sanitize_name, PgBarcodeWriter};

use crate::config::DatabaseConfig;
use crate::error::{Result, SyncError};
use async_trait::async_trait;
use barcode_common::{BarcodeRow, BarcodeSet};
use sqlx::postgres::{PgConnectOptions, PgConnection};
use sqlx::Connection;
use std::sync::Arc;
use std::time::Duration;
use tracing::{debug, warn};

/// Reads the set of barcodes already stored remotely
#[async_trait]
pub trait BarcodeSource: Send + Sync {
    async fn fetch_barcodes(&self) -> Result<BarcodeSet>;
}

/// Stores new barcode rows remotely
#[async_trait]
pub trait BarcodeSink: Send + Sync {
    /// Insert `rows`, all or nothing
    async fn insert_rows(&self, rows: &[BarcodeRow]) -> Result<InsertStats>;
}

#[async_trait]
impl<T: BarcodeSource + ?Sized> BarcodeSource for Arc<T> {
    async fn fetch_barcodes(&self) -> Result<BarcodeSet> {
        (**self).fetch_barcodes().await
    }
}

#[async_trait]
impl<T: BarcodeSink + ?Sized> BarcodeSink for Arc<T> {
    async fn insert_rows(&self, rows: &[BarcodeRow]) -> Result<InsertStats> {
        (**self).insert_rows(rows).await
    }
}

/// Insert statistics
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct InsertStats {
    pub rows_inserted: usize,
    pub batches: usize,
}

/// Schema-qualified table name made of plain SQL identifiers
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TableRef {
    schema: String,
    table: String,
}

const IDENTIFIER_PATTERN: &str = r"^[A-Za-z_][A-Za-z0-9_]*$";

impl TableRef {
    /// Validate both parts so they can be spliced into SQL text
    pub fn new(schema: &str, table: &str) -> Result<Self> {
        let identifier = regex::Regex::new(IDENTIFIER_PATTERN)
            .map_err(|e| SyncError::config(format!("Identifier pattern: {}", e)))?;

        for part in [schema, table] {
            if !identifier.is_match(part) {
                return Err(SyncError::InvalidIdentifier(part.to_string()));
            }
        }

        Ok(Self {
            schema: schema.to_string(),
            table: table.to_string(),
        })
    }

    pub fn schema(&self) -> &str {
        &self.schema
    }

    pub fn table(&self) -> &str {
        &self.table
    }
}

impl std::fmt::Display for TableRef {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}.{}", self.schema, self.table)
    }
}

/// Connection parameters and table shared by the reader and the writer
#[derive(Debug, Clone)]
pub struct RemoteTarget {
    options: PgConnectOptions,
    table: TableRef,
    connect_timeout: Duration,
}

impl RemoteTarget {
    pub fn new(options: PgConnectOptions, table: TableRef, connect_timeout: Duration) -> Self {
        Self {
            options,
            table,
            connect_timeout,
        }
    }

    pub fn from_config(config: &DatabaseConfig) -> Result<Self> {
        Ok(Self::new(
            config.connect_options()?,
            TableRef::new(&config.schema, &config.table)?,
            Duration::from_secs(config.connect_timeout_secs),
        ))
    }

    pub fn table(&self) -> &TableRef {
        &self.table
    }

    /// Open a dedicated connection. Pair every call with [`RemoteTarget::release`].
    pub(crate) async fn connect(&self) -> Result<PgConnection> {
        let connect = PgConnection::connect_with(&self.options);

        let conn = match tokio::time::timeout(self.connect_timeout, connect).await {
            Ok(Ok(conn)) => conn,
            Ok(Err(e)) => return Err(SyncError::RemoteUnavailable(e)),
            Err(_) => {
                return Err(SyncError::RemoteUnavailable(sqlx::Error::Io(std::io::Error::new(
                    std::io::ErrorKind::TimedOut,
                    format!("connect timed out after {:?}", self.connect_timeout),
                ))))
            },
        };

        debug!(
            host = self.options.get_host(),
            table = %self.table,
            "Database connection opened"
        );
        Ok(conn)
    }

    /// Close a connection gracefully. Failures are logged only, the socket is dropped either way.
    pub(crate) async fn release(&self, conn: PgConnection) {
        match conn.close().await {
            Ok(()) => debug!("Database connection closed"),
            Err(e) => warn!(error = %e, "Database connection did not close cleanly"),
        }
    }
}
