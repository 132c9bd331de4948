//! Error types for Strata operations

use crate::{RecordKey, RecordType, Stage, StageContext, VersionNumber};
use thiserror::Error;

/// Storage layer errors.
#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum StorageError {
    #[error("Record not found: {key}")]
    NotFound { key: RecordKey },

    #[error("Version {version} does not exist for {key}")]
    InvalidVersion { key: RecordKey, version: VersionNumber },

    #[error("{key} has no row on stage {stage}")]
    NotOnStage { key: RecordKey, stage: Stage },

    #[error("Insert failed for {record_type}: {reason}")]
    InsertFailed {
        record_type: RecordType,
        reason: String,
    },

    #[error("Transaction failed: {reason}")]
    TransactionFailed { reason: String },

    #[error("Storage lock poisoned")]
    LockPoisoned,
}

/// Configuration errors. Raised when declarations are loaded, never mid-cascade.
#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum ConfigError {
    #[error("Failed to read config file {path}: {reason}")]
    Io { path: String, reason: String },

    #[error("Failed to parse config TOML: {reason}")]
    Parse { reason: String },

    #[error("{record_type} manages undeclared relationship {relationship}")]
    UnknownRelationship {
        record_type: RecordType,
        relationship: String,
    },

    #[error("Relationship {relationship} declared twice on {record_type}")]
    DuplicateRelationship {
        record_type: RecordType,
        relationship: String,
    },

    #[error("Unknown record type {record_type} referenced by {referenced_by}")]
    UnknownRecordType {
        record_type: RecordType,
        referenced_by: String,
    },

    #[error("Cyclic managed relationships between {}", format_cycle(.cycle))]
    CyclicRelationships { cycle: Vec<RecordType> },

    #[error("Invalid value for {field}: {reason}")]
    InvalidValue { field: String, reason: String },
}

fn format_cycle(cycle: &[RecordType]) -> String {
    cycle
        .iter()
        .map(RecordType::as_str)
        .collect::<Vec<_>>()
        .join(", ")
}

/// Cascade engine errors.
#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum CascadeError {
    #[error("Unsaved {record_type} record cannot take part in a cascade")]
    UnsavedRecord { record_type: RecordType },

    #[error("{key} is missing in {context}")]
    RecordMissing {
        key: RecordKey,
        context: StageContext,
    },

    #[error("{operation} override for {record_type} failed: {reason}")]
    Override {
        record_type: RecordType,
        operation: String,
        reason: String,
    },
}

/// Identity parsing errors.
#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum IdentityError {
    #[error("Invalid record id: {value:?}")]
    InvalidRecordId { value: String },

    #[error("Invalid rollback target: {value:?} (expected \"Live\" or a version number)")]
    InvalidRollbackTarget { value: String },
}

/// Master error type for all Strata errors.
#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum StrataError {
    #[error("Storage error: {0}")]
    Storage(#[from] StorageError),

    #[error("Config error: {0}")]
    Config(#[from] ConfigError),

    #[error("Cascade error: {0}")]
    Cascade(#[from] CascadeError),

    #[error("Identity error: {0}")]
    Identity(#[from] IdentityError),
}

/// Result type alias for Strata operations.
pub type StrataResult<T> = Result<T, StrataError>;

// =============================================================================
// TESTS
// =============================================================================
