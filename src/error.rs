//! Error types and exit codes for lexmap-engine

use std::process::ExitCode;
use thiserror::Error;

/// Main error type for lexmap-engine operations
#[derive(Error, Debug)]
pub enum LexMapError {
    #[error("Malformed catalog input: {message}")]
    CatalogMalformed { message: String },

    #[error("Unknown entity: {name}")]
    UnknownEntity { name: String },

    #[error("Query error: {message}")]
    QueryError { message: String },

    #[error("Index artifact error at {path}: {message}")]
    IndexArtifact { path: String, message: String },

    #[error("No index snapshot available")]
    NoSnapshot,

    #[error("Serialization error: {message}")]
    Serialization { message: String },

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}

impl LexMapError {
    /// Convert error to appropriate exit code:
    /// - 0: Success
    /// - 1: IO error / missing artifact / no snapshot
    /// - 2: Malformed catalog input (fatal to a refresh cycle)
    /// - 3: Unknown entity / bad query input
    /// - 4: Internal serialization failure
    pub fn exit_code(&self) -> ExitCode {
        match self {
            Self::CatalogMalformed { .. } => ExitCode::from(2),
            Self::UnknownEntity { .. } => ExitCode::from(3),
            Self::QueryError { .. } => ExitCode::from(3),
            Self::IndexArtifact { .. } => ExitCode::from(1),
            Self::NoSnapshot => ExitCode::from(1),
            Self::Serialization { .. } => ExitCode::from(4),
            Self::Io(_) => ExitCode::from(1),
        }
    }
}

impl From<serde_json::Error> for LexMapError {
    fn from(e: serde_json::Error) -> Self {
        Self::Serialization {
            message: e.to_string(),
        }
    }
}

/// Result type alias for lexmap-engine operations
pub type Result<T> = std::result::Result<T, LexMapError>;
