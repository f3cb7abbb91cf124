// Copyright (c) 2024-2025 DeepGraph Inc.
// SPDX-License-Identifier: Apache-2.0
//
//! Storage engine traits
//!
//! The coordinator never touches pages or files directly. Everything it needs
//! from the MVCC storage engine goes through the traits in this module:
//! snapshot cursors that can be advanced while replaying the transaction log,
//! commits, and the cross-process commit notifier.

use super::types::{LogInstruction, VersionId};
use crate::config::RealmConfig;
use crate::error::Result;
use std::fmt::Debug;
use std::sync::Weak;

/// Visitor for transaction log replay
///
/// The engine calls [`handle`](Self::handle) once per recorded instruction, in
/// commit order, and [`parse_complete`](Self::parse_complete) once the replay
/// reached its target. Returning an error aborts the replay.
pub trait TransactLogHandler {
    fn handle(&mut self, instruction: &LogInstruction) -> Result<()>;

    fn parse_complete(&mut self) -> Result<()> {
        Ok(())
    }
}

/// A point-in-time view of the database that can only move forward
pub trait SnapshotCursor: Send {
    /// Start a read transaction at `version`, or at the latest version if `None`
    fn begin_read(&mut self, version: Option<VersionId>) -> Result<VersionId>;

    /// End the current read transaction, releasing the pinned version
    fn end_read(&mut self);

    /// Advance the current read transaction to `target` (latest if `None`),
    /// replaying every intervening log through `handler` if one is given
    fn advance_read(
        &mut self,
        handler: Option<&mut dyn TransactLogHandler>,
        target: Option<VersionId>,
    ) -> Result<VersionId>;

    /// Version of the current read transaction, if one is active
    fn current_version(&self) -> Option<VersionId>;

    fn is_reading(&self) -> bool {
        self.current_version().is_some()
    }
}

/// Signals other processes (and other coordinators) that a commit happened
pub trait CommitNotifier: Send + Sync {
    fn notify_others(&self);
}

/// Receiver side of the commit notifier
pub trait CommitListener: Send + Sync {
    /// Called when another writer committed to the same file
    fn on_change(&self);
}

/// MVCC storage engine
pub trait StorageEngine: Send + Sync + Debug {
    /// Open a new snapshot cursor for the file described by `config`
    fn open_cursor(&self, config: &RealmConfig) -> Result<Box<dyn SnapshotCursor>>;

    /// Commit a write transaction and return the version it produced
    fn commit(&self, config: &RealmConfig, log: Vec<LogInstruction>) -> Result<VersionId>;

    /// Latest committed version of the file
    fn latest_version(&self, config: &RealmConfig) -> Result<VersionId>;

    /// Create the commit notifier for `config`, waking `listener` whenever
    /// another writer commits
    fn commit_notifier(
        &self,
        config: &RealmConfig,
        listener: Weak<dyn CommitListener>,
    ) -> Result<Box<dyn CommitNotifier>>;
}
