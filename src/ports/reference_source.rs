//! Reference source port: Trait for loading a reference table.

use crate::domain::ReferenceTable;

/// Trait for loading reference data.
///
/// A source is read once at startup; the resulting table is immutable.
pub trait ReferenceSource: Send + Sync {
    /// Error type for load operations.
    type Error: std::error::Error + Send + Sync + 'static;

    /// Load and validate the full reference table.
    ///
    /// # Errors
    /// Returns error if the data cannot be read, fails integrity checks,
    /// or contains malformed rows.
    fn load(&self) -> Result<ReferenceTable, Self::Error>;

    /// Human-readable description of where the data comes from (for logs).
    fn describe(&self) -> String;
}
