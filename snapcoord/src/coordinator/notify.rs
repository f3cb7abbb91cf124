// Copyright (c) 2024-2025 DeepGraph Inc.
// SPDX-License-Identifier: Apache-2.0
//
//! Commit notification fan-out and result delivery

use super::realm_coordinator::RealmCoordinator;
use crate::changes::TransactLogValidator;
use crate::error::{CoordinatorError, Result};
use crate::realm::{AsyncQuery, Realm};
use crate::storage::VersionId;
use std::sync::Arc;

impl RealmCoordinator {
    /// Handle a commit on this file: run a change cycle, then tell every open
    /// handle that new data is available
    ///
    /// Handles are notified even if the cycle failed; the failure is returned
    /// after they have been.
    pub fn on_change(&self) -> Result<()> {
        let result = self.run_async_queries();

        let realms: Vec<Arc<Realm>> = {
            let state = self.realms.lock();
            state
                .cached_realms
                .iter()
                .filter_map(|cached| cached.realm())
                .collect()
        };
        for realm in &realms {
            realm.notify();
        }
        result
    }

    /// Advance `realm` to the version the async queries were last run at and
    /// deliver their results. Returns true if the handle moved.
    ///
    /// With no queries pinned to a version the handle goes straight to the
    /// latest version. Results older than the handle's snapshot are skipped.
    pub fn advance_to_ready(&self, realm: &Realm) -> Result<bool> {
        let ready: Vec<Arc<dyn AsyncQuery>>;
        let advanced;
        {
            let state = self.queries.lock();

            let target = state
                .queries
                .iter()
                .map(|query| query.version())
                .filter(|version| !version.is_unset())
                .min();

            let Some(target) = target else {
                return realm.with_cursor(|cursor| {
                    let before = cursor.current_version();
                    let mut validator = TransactLogValidator::new();
                    let after = cursor.advance_read(Some(&mut validator), None)?;
                    Ok(before != Some(after))
                });
            };

            let outcome = realm.with_cursor(|cursor| {
                let current = cursor.current_version();
                if current.map_or(false, |current| target < current) {
                    return Ok((false, current));
                }
                let mut validator = TransactLogValidator::new();
                let after = cursor.advance_read(Some(&mut validator), Some(target))?;
                Ok((current != Some(after), Some(after)))
            })?;
            let (moved, version) = outcome;

            let stale = version.map_or(true, |version| version != target);
            if stale && state.async_error.is_none() {
                log::debug!(
                    "{} is past async results at {}; skipping delivery",
                    realm.id(),
                    target
                );
                return Ok(false);
            }
            let version = version.unwrap_or(target);

            ready = state
                .queries
                .iter()
                .filter(|query| query.deliver(realm.id(), version, state.async_error.as_ref()))
                .cloned()
                .collect();
            advanced = moved;
        }

        for query in &ready {
            query.call_callbacks();
        }
        Ok(advanced)
    }

    /// Deliver results already computed for `realm`'s current version
    pub fn process_available_async(&self, realm: &Realm) -> Result<()> {
        let version: VersionId = realm.current_version().ok_or_else(|| CoordinatorError::Closed {
            path: realm.path().to_string(),
        })?;

        let ready: Vec<Arc<dyn AsyncQuery>> = {
            let state = self.queries.lock();
            state
                .queries
                .iter()
                .filter(|query| query.deliver(realm.id(), version, state.async_error.as_ref()))
                .cloned()
                .collect()
        };

        for query in &ready {
            query.call_callbacks();
        }
        Ok(())
    }
}
