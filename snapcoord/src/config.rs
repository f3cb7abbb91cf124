// Copyright (c) 2024-2025 DeepGraph Inc.
// SPDX-License-Identifier: Apache-2.0
//
//! Open configuration for a database handle

use crate::error::{ConfigField, CoordinatorError, Result};
use crate::storage::StorageEngine;
use serde::{Deserialize, Serialize};
use std::path::{Component, Path, PathBuf};
use std::sync::Arc;

/// Required length of an encryption key, in bytes
pub const ENCRYPTION_KEY_LEN: usize = 64;

/// Configuration used to open a database handle
///
/// Every handle opened for the same path must agree with the first one on
/// `read_only`, `in_memory`, `encryption_key`, `engine` and (when pinned)
/// `schema_version`.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct RealmConfig {
    /// Path of the database file; also the key of its coordinator
    pub path: String,

    /// Open without write access
    pub read_only: bool,

    /// Keep the file contents in memory only
    pub in_memory: bool,

    /// Encryption key, if the file is encrypted
    pub encryption_key: Option<Vec<u8>>,

    /// Schema version the caller expects, `None` when the caller does not care
    pub schema_version: Option<u64>,

    /// Reuse an existing handle opened on the same thread
    pub cache: bool,

    /// Storage engine backing the file
    #[serde(skip)]
    pub engine: Option<Arc<dyn StorageEngine>>,
}

impl Default for RealmConfig {
    fn default() -> Self {
        Self {
            path: String::new(),
            read_only: false,
            in_memory: false,
            encryption_key: None,
            schema_version: None,
            cache: true,
            engine: None,
        }
    }
}

impl RealmConfig {
    pub fn new(path: impl Into<String>, engine: Arc<dyn StorageEngine>) -> Self {
        Self {
            path: path.into(),
            engine: Some(engine),
            ..Self::default()
        }
    }

    pub fn with_read_only(mut self, read_only: bool) -> Self {
        self.read_only = read_only;
        self
    }

    pub fn with_in_memory(mut self, in_memory: bool) -> Self {
        self.in_memory = in_memory;
        self
    }

    pub fn with_encryption_key(mut self, key: Vec<u8>) -> Self {
        self.encryption_key = Some(key);
        self
    }

    pub fn with_schema_version(mut self, version: u64) -> Self {
        self.schema_version = Some(version);
        self
    }

    pub fn with_cache(mut self, cache: bool) -> Self {
        self.cache = cache;
        self
    }

    pub fn with_engine(mut self, engine: Arc<dyn StorageEngine>) -> Self {
        self.engine = Some(engine);
        self
    }

    /// Storage engine for this configuration
    pub fn engine(&self) -> Result<&Arc<dyn StorageEngine>> {
        self.engine.as_ref().ok_or_else(|| {
            CoordinatorError::InvalidConfig(format!("no storage engine configured for '{}'", self.path))
        })
    }

    /// Check the configuration for values that can never be opened
    pub fn validate(&self) -> Result<()> {
        if self.path.is_empty() {
            return Err(CoordinatorError::InvalidConfig(
                "database path must not be empty".to_string(),
            ));
        }
        if let Some(key) = &self.encryption_key {
            if key.len() != ENCRYPTION_KEY_LEN {
                return Err(CoordinatorError::InvalidConfig(format!(
                    "encryption key must be {} bytes, got {}",
                    ENCRYPTION_KEY_LEN,
                    key.len()
                )));
            }
        }
        self.engine()?;
        Ok(())
    }

    /// Compare a requested configuration against this canonical one
    ///
    /// Schema contents are not compared; only the version number is, and
    /// only when the requester pinned one.
    pub(crate) fn check_compatible(&self, requested: &RealmConfig) -> Result<()> {
        let mismatch = |field: ConfigField, message: &str| CoordinatorError::MismatchedConfig {
            path: self.path.clone(),
            field,
            message: message.to_string(),
        };

        if self.read_only != requested.read_only {
            return Err(mismatch(
                ConfigField::ReadOnly,
                "already opened with different read permissions",
            ));
        }
        if self.in_memory != requested.in_memory {
            return Err(mismatch(
                ConfigField::InMemory,
                "already opened with different in-memory settings",
            ));
        }
        if self.encryption_key != requested.encryption_key {
            return Err(mismatch(
                ConfigField::EncryptionKey,
                "already opened with a different encryption key",
            ));
        }
        if let (Some(canonical), Some(engine)) = (&self.engine, &requested.engine) {
            if !same_engine(canonical, engine) {
                return Err(mismatch(
                    ConfigField::Engine,
                    "already opened with a different storage engine",
                ));
            }
        }
        if requested.schema_version.is_some() && self.schema_version != requested.schema_version {
            return Err(mismatch(
                ConfigField::SchemaVersion,
                "already opened with a different schema version",
            ));
        }
        Ok(())
    }
}

/// Lexically normalise a database path so that spellings of the same file
/// share one key. `.` components, repeated separators and trailing
/// separators are dropped and `..` cancels the component before it. The file
/// system is never consulted, so symlinks are not resolved.
pub fn normalize_path(path: &str) -> String {
    let mut parts: Vec<Component> = Vec::new();
    for component in Path::new(path).components() {
        match component {
            Component::CurDir => {}
            Component::ParentDir => match parts.last() {
                Some(Component::Normal(_)) => {
                    parts.pop();
                }
                Some(Component::RootDir) | Some(Component::Prefix(_)) => {}
                _ => parts.push(component),
            },
            other => parts.push(other),
        }
    }
    if parts.is_empty() {
        return path.to_string();
    }
    parts
        .iter()
        .collect::<PathBuf>()
        .to_string_lossy()
        .into_owned()
}

/// Engines are the same when they share an allocation; vtables are ignored
fn same_engine(a: &Arc<dyn StorageEngine>, b: &Arc<dyn StorageEngine>) -> bool {
    std::ptr::eq(Arc::as_ptr(a) as *const (), Arc::as_ptr(b) as *const ())
}
