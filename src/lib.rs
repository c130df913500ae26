//! # Restodir - Restaurant directory persistence layer
//!
//! Maps a relational schema (cities, restaurant types, restaurants, likes,
//! comments, grades, evaluation criteria) onto a shared in-memory object graph.
//!
//! Restodir provides:
//! - A bounded connection pool with explicit transaction scopes
//! - One mapper per entity type, each with its own identity map
//! - Cascading deletes that keep the relational graph consistent
//! - A registry that wires the mappers together without construction cycles

pub mod domain;
pub mod storage;
pub mod mapper;
pub mod config;
pub mod ui;
pub mod output;

// Re-exports for convenient access
pub use domain::{
    BasicEvaluation, City, CompleteEvaluation, Evaluation, EvaluationCriteria, Grade,
    Localisation, Restaurant, RestaurantType, Shared, shared,
};
pub use mapper::{CascadeReport, Mapper, MapperRegistry};
pub use storage::{ConnectionProvider, PoolSettings};

/// Result type alias for Restodir operations
pub type Result<T> = std::result::Result<T, Error>;

/// Error types for Restodir operations
#[derive(Debug, thiserror::Error)]
pub enum Error {
    #[error("Storage error: {0}")]
    Storage(#[from] rusqlite::Error),

    #[error("Connection pool error: {0}")]
    Pool(#[from] r2d2::Error),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("{entity} #{id} references missing {target} #{target_id}")]
    DanglingReference {
        entity: &'static str,
        id: i64,
        target: &'static str,
        target_id: i64,
    },

    #[error("{0} has not been persisted yet")]
    NotPersisted(&'static str),

    #[error("Unknown sequence: {0}")]
    UnknownSequence(&'static str),

    #[error("Mapper not wired: {0}")]
    NotWired(&'static str),

    #[error("Invalid value in column {column}: {value}")]
    InvalidColumn { column: &'static str, value: String },
}

impl Error {
    /// True when the underlying statement failed on a UNIQUE constraint
    pub fn is_unique_violation(&self) -> bool {
        match self {
            Error::Storage(rusqlite::Error::SqliteFailure(err, _)) => {
                err.extended_code == rusqlite::ffi::SQLITE_CONSTRAINT_UNIQUE
            }
            _ => false,
        }
    }
}
