// Copyright (c) 2024-2025 DeepGraph Inc.
// SPDX-License-Identifier: Apache-2.0
//
//! snapcoord - Snapshot coordination for multi-version embedded databases
//!
//! snapcoord sits between database handles and an MVCC storage engine. It
//! makes sure every thread opening the same file shares one coordinator, and
//! keeps background queries up to date as commits land.
//!
//! # Features
//!
//! - **Coordinator registry**: at most one coordinator per database path
//! - **Handle cache**: per-thread reuse of open handles with config checks
//! - **Async queries**: background re-evaluation on a dedicated snapshot
//! - **Change diffs**: per-table and per-link-list diffs from transaction logs
//! - **Commit fan-out**: every open handle learns about every commit
//!
//! # Usage
//!
//! ```rust,ignore
//! use snapcoord::{MemoryEngine, Realm, RealmConfig};
//! use std::sync::Arc;
//!
//! let engine = Arc::new(MemoryEngine::new());
//! let realm = Realm::open(RealmConfig::new("/data/app.db", engine))?;
//! realm.commit(log)?;
//! realm.refresh()?;
//! ```

pub mod changes;
pub mod config;
pub mod coordinator;
pub mod error;
pub mod realm;
pub mod storage;

pub use changes::{
    ChangeInfo, IndexSet, LinkListInfo, LinkListKey, TransactLogObserver, TransactLogValidator,
    TransactionChanges,
};
pub use config::RealmConfig;
pub use coordinator::{CoordinatorRegistry, RealmCoordinator};
pub use error::{CoordinatorError, Result};
pub use realm::{AsyncQuery, BindingContext, Realm, RealmId};
pub use storage::{
    LogInstruction, MemoryEngine, SnapshotCursor, StorageEngine, TransactLogHandler, VersionId,
};

/// snapcoord version
pub const VERSION: &str = env!("CARGO_PKG_VERSION");

/// snapcoord crate name
pub const CRATE_NAME: &str = env!("CARGO_PKG_NAME");
