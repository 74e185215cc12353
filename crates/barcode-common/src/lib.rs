//! Barcode Sync Common Library
#![deny(clippy::unwrap_used, clippy::expect_used)]
//!
//! Shared types and logging setup for the barcode sync workspace.
//!
//! - **Types**: barcode rows and barcode sets shared by the local and remote sides
//! - **Logging**: process-wide `tracing` subscriber configuration
//!
//! # Example
//!
//! ```no_run
//! use barcode_common::logging::{init_logging, LogConfig};
//! use barcode_common::types::BarcodeRow;
//!
//! fn main() -> anyhow::Result<()> {
//!     init_logging(&LogConfig::from_env()?)?;
//!     let row = BarcodeRow::new(4600000000017, "Milk 1L", 100);
//!     tracing::info!(barcode = row.barcode, "Loaded row");
//!     Ok(())
//! }
//! ```

pub mod logging;
pub mod types;

pub use types::{Barcode, BarcodeRow, BarcodeSet};
