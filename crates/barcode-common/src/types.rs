//! Common types used across the barcode sync workspace

use std::collections::HashSet;

/// Integer product identifier (EAN/UPC), the reconciliation key.
pub type Barcode = i64;

/// Set of barcodes used for local/remote difference computation.
pub type BarcodeSet = HashSet<Barcode>;

/// One row of the barcode reference table.
///
/// Mirrors the remote table columns `(barcode, name, owner)`.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct BarcodeRow {
    pub barcode: Barcode,
    pub name: String,
    /// Fixed tag identifying who contributed the row
    pub owner: i32,
}

impl BarcodeRow {
    pub fn new(barcode: Barcode, name: impl Into<String>, owner: i32) -> Self {
        Self {
            barcode,
            name: name.into(),
            owner,
        }
    }
}
