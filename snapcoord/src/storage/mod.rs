// Copyright (c) 2024-2025 DeepGraph Inc.
// SPDX-License-Identifier: Apache-2.0
//
//! Storage engine interface
//!
//! The coordinator consumes the MVCC storage engine through a narrow set of
//! traits. The engine owns files and pages; the coordinator only decides which
//! snapshot each cursor reads and which logs get replayed through which
//! handler.
//!
//! ```text
//! RealmCoordinator
//!     ↓ open_cursor / commit / commit_notifier
//! StorageEngine
//!     ↓ begin_read / advance_read(handler)
//! SnapshotCursor ──replay──> TransactLogHandler
//! ```

pub mod memory;
pub mod traits;
pub mod types;

pub use memory::MemoryEngine;
pub use traits::{
    CommitListener, CommitNotifier, SnapshotCursor, StorageEngine, TransactLogHandler,
};
pub use types::{DataType, FieldValue, LinkType, LogInstruction, VersionId};
