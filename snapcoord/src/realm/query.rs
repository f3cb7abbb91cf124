// Copyright (c) 2024-2025 DeepGraph Inc.
// SPDX-License-Identifier: Apache-2.0
//
//! Async query interface
//!
//! The coordinator does not know what a query computes. It only decides which
//! snapshot the query is attached to, when it runs, and which diff it sees.

use super::handle::RealmId;
use crate::changes::{LinkListKey, TransactionChanges};
use crate::error::CoordinatorError;
use crate::storage::{SnapshotCursor, VersionId};

/// A query whose results are computed in the background and delivered to
/// the handle that created it
///
/// All methods take `&self`; implementations synchronise their own state.
/// `run` is called without any coordinator lock held, every other method is
/// called with the coordinator's query lock held except `call_callbacks`.
pub trait AsyncQuery: Send + Sync {
    /// Snapshot the query is pinned to. Immutable until the query has been
    /// imported; afterwards, the version its latest results were computed at.
    fn version(&self) -> VersionId;

    /// Import the query into `cursor`, which reads exactly `version()` during
    /// import and the coordinator's query snapshot afterwards
    fn attach_to(&self, cursor: &dyn SnapshotCursor);

    /// Release whatever ties the query to the snapshot it was attached to
    fn detach(&self);

    /// Re-evaluate against the attached snapshot. `changes` describes what
    /// changed since the previous run.
    fn run(&self, changes: &TransactionChanges);

    /// Publish the results of `run` for the owning thread
    fn prepare_handover(&self);

    /// Hand results to `realm` if they were computed at `version`. A captured
    /// background error is passed instead of results when present. Returns
    /// true if callbacks should be invoked.
    fn deliver(&self, realm: RealmId, version: VersionId, error: Option<&CoordinatorError>)
        -> bool;

    /// Invoke user callbacks for the last delivery
    fn call_callbacks(&self);

    /// False once nothing outside the coordinator refers to the query
    fn is_alive(&self) -> bool;

    /// Drop the query's resources even if references remain elsewhere
    fn release_query(&self);

    /// Link lists whose fine-grained changes this query wants
    fn observed_link_lists(&self) -> Vec<LinkListKey> {
        Vec::new()
    }
}
