//! Error types for the migration system.

use std::path::PathBuf;

/// Errors that can occur while authoring, validating, or compiling migrations.
#[derive(Debug, thiserror::Error)]
pub enum MigrateError {
    /// IO error (reading/writing schema or migration documents).
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    /// No migrations directory found.
    #[error("Migrations directory not found: {0}")]
    MigrationsDirNotFound(PathBuf),

    /// Serialization/deserialization error.
    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),
}

/// Result type for migration operations.
pub type Result<T> = std::result::Result<T, MigrateError>;
