// Copyright (c) 2024-2025 DeepGraph Inc.
// SPDX-License-Identifier: Apache-2.0
//
//! Coordinator error types

use thiserror::Error;

/// Configuration field that conflicted with the canonical configuration of an
/// already-open path
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ConfigField {
    ReadOnly,
    InMemory,
    EncryptionKey,
    SchemaVersion,
    Engine,
}

impl std::fmt::Display for ConfigField {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let name = match self {
            ConfigField::ReadOnly => "read_only",
            ConfigField::InMemory => "in_memory",
            ConfigField::EncryptionKey => "encryption_key",
            ConfigField::SchemaVersion => "schema_version",
            ConfigField::Engine => "engine",
        };
        write!(f, "{}", name)
    }
}

/// Coordinator errors
///
/// Errors are `Clone` so that an error captured during a background change
/// cycle can be handed to every pending query.
#[derive(Error, Debug, Clone, PartialEq)]
pub enum CoordinatorError {
    #[error(
        "Schema mismatch detected: another process has modified the database file's schema in an incompatible way"
    )]
    SchemaMismatch,

    #[error("Database at '{path}' already opened with a different {field}: {message}")]
    MismatchedConfig {
        path: String,
        field: ConfigField,
        message: String,
    },

    #[error("Unable to open '{path}': {message}")]
    AccessError { path: String, message: String },

    #[error("Failed to open background snapshot for '{path}': {message}")]
    AsyncOpen { path: String, message: String },

    #[error("Storage error: {0}")]
    Storage(String),

    #[error("Invalid transaction log: {0}")]
    InvalidTransactionLog(String),

    #[error("Cannot write to read-only database at '{path}'")]
    ReadOnly { path: String },

    #[error("Database handle for '{path}' has been closed")]
    Closed { path: String },

    #[error("No database handle has been opened for '{path}'")]
    NotOpen { path: String },

    #[error("Invalid configuration: {0}")]
    InvalidConfig(String),
}

impl CoordinatorError {
    /// Errors raised while replaying a transaction log that leave the
    /// coordinator unable to trust its snapshot
    pub fn is_consistency_error(&self) -> bool {
        matches!(
            self,
            CoordinatorError::SchemaMismatch | CoordinatorError::InvalidTransactionLog(_)
        )
    }
}

pub type Result<T> = std::result::Result<T, CoordinatorError>;
