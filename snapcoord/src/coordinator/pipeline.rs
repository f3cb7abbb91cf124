// Copyright (c) 2024-2025 DeepGraph Inc.
// SPDX-License-Identifier: Apache-2.0
//
//! Async query pipeline
//!
//! New queries are imported on the advancer cursor at the version they were
//! created at, oldest first. Both cursors are then brought to one target
//! version and the query cursor replays the logs in between exactly once
//! with a change observer, so every query in a cycle sees the same diff.

use super::realm_coordinator::{QueryState, RealmCoordinator};
use crate::changes::{LinkListKey, TransactLogObserver};
use crate::config::RealmConfig;
use crate::error::{CoordinatorError, Result};
use crate::realm::AsyncQuery;
use crate::storage::{SnapshotCursor, VersionId};
use std::sync::Arc;

impl RealmCoordinator {
    /// Add `query` to the newly-registered list and pin its version on the
    /// advancer cursor
    pub fn register_query(&self, query: Arc<dyn AsyncQuery>) -> Result<()> {
        let config = self.config()?;
        let version = query.version();
        let mut state = self.queries.lock();
        Self::clean_up_dead_queries(&mut state);
        self.pin_version(&mut state, &config, version);
        state.new_queries.push(query);
        log::debug!(
            "Registered async query on '{}' at {} ({} awaiting import)",
            self.path(),
            version,
            state.new_queries.len()
        );
        Ok(())
    }

    /// Number of queries in main rotation
    pub fn query_count(&self) -> usize {
        self.queries.lock().queries.len()
    }

    /// Number of queries registered but not yet imported
    pub fn pending_query_count(&self) -> usize {
        self.queries.lock().new_queries.len()
    }

    /// Error captured by the last failed change cycle, if any
    pub fn async_error(&self) -> Option<CoordinatorError> {
        self.queries.lock().async_error.clone()
    }

    /// Keep the advancer cursor at the oldest version any pending query needs
    fn pin_version(&self, state: &mut QueryState, config: &RealmConfig, version: VersionId) {
        if state.async_error.is_some() {
            return;
        }

        let result = match state.advancer_cursor.as_mut() {
            None => open_cursor_at(config, Some(version)).map(|cursor| {
                state.advancer_cursor = Some(cursor);
            }),
            Some(cursor) if state.new_queries.is_empty() => {
                cursor.begin_read(Some(version)).map(|_| ())
            }
            Some(cursor) => {
                if cursor.current_version().map_or(true, |current| version < current) {
                    cursor.end_read();
                    cursor.begin_read(Some(version)).map(|_| ())
                } else {
                    Ok(())
                }
            }
        };

        if let Err(e) = result {
            log::warn!("Failed to pin {} on '{}': {}", version, self.path(), e);
            state.async_error = Some(self.async_open_error(&e));
        }
    }

    /// Release dead queries, ending the read on a cursor whose list emptied.
    /// A cursor open failure is forgotten once no query is left to report it
    /// to; consistency errors stay until the coordinator goes away.
    pub(super) fn clean_up_dead_queries(state: &mut QueryState) {
        if remove_dead(&mut state.queries) && state.queries.is_empty() {
            if let Some(cursor) = state.query_cursor.as_mut() {
                cursor.end_read();
            }
        }
        if remove_dead(&mut state.new_queries) && state.new_queries.is_empty() {
            if let Some(cursor) = state.advancer_cursor.as_mut() {
                cursor.end_read();
            }
        }

        let idle = state.queries.is_empty() && state.new_queries.is_empty();
        let retryable = state
            .async_error
            .as_ref()
            .map_or(false, |e| !e.is_consistency_error());
        if idle && retryable {
            log::debug!("Clearing async error with no queries left to report it");
            state.async_error = None;
        }
    }

    /// One change cycle: import new queries, advance to the latest version,
    /// run every query against the shared diff, and publish results
    pub(super) fn run_async_queries(&self) -> Result<()> {
        // No handle has opened the file yet
        let Ok(config) = self.config() else {
            return Ok(());
        };

        let mut state = self.queries.lock();
        Self::clean_up_dead_queries(&mut state);

        if state.queries.is_empty() && state.new_queries.is_empty() {
            return Ok(());
        }

        if state.async_error.is_none() {
            self.open_query_cursor(&mut state, &config);
        }
        if state.async_error.is_some() {
            Self::move_new_queries_to_main(&mut state);
            return Ok(());
        }

        let observed: Vec<LinkListKey> = state
            .queries
            .iter()
            .chain(state.new_queries.iter())
            .flat_map(|query| query.observed_link_lists())
            .collect();
        let mut observer = TransactLogObserver::new(observed);

        if let Err(e) = self.advance_query_cursor_to_latest(&mut state, &config, &mut observer) {
            let error = if e.is_consistency_error() {
                e
            } else {
                self.async_open_error(&e)
            };
            log::warn!("Change cycle on '{}' failed: {}", self.path(), error);
            state.async_error = Some(error.clone());
            Self::move_new_queries_to_main(&mut state);
            return Err(error);
        }

        let changes = observer.into_changes();
        let queries_to_run = state.queries.clone();
        drop(state);

        log::debug!(
            "Running {} async queries on '{}'",
            queries_to_run.len(),
            self.path()
        );
        for query in &queries_to_run {
            query.run(&changes);
        }

        let mut state = self.queries.lock();
        for query in &queries_to_run {
            query.prepare_handover();
        }
        Self::clean_up_dead_queries(&mut state);
        Ok(())
    }

    fn open_query_cursor(&self, state: &mut QueryState, config: &RealmConfig) {
        let result = match state.query_cursor.as_mut() {
            None => open_cursor_at(config, None).map(|cursor| {
                state.query_cursor = Some(cursor);
            }),
            Some(cursor) if state.queries.is_empty() || !cursor.is_reading() => {
                cursor.begin_read(None).map(|_| ())
            }
            Some(_) => Ok(()),
        };

        if let Err(e) = result {
            log::warn!("Failed to open query cursor on '{}': {}", self.path(), e);
            state.async_error = Some(self.async_open_error(&e));
        }
    }

    fn move_new_queries_to_main(state: &mut QueryState) {
        let new_queries = std::mem::take(&mut state.new_queries);
        state.queries.extend(new_queries);
    }

    /// Import pending queries and advance the query cursor with `observer`
    /// attached. Queries pinned past the latest version stay pending.
    fn advance_query_cursor_to_latest(
        &self,
        state: &mut QueryState,
        config: &RealmConfig,
        observer: &mut TransactLogObserver,
    ) -> Result<()> {
        let QueryState {
            query_cursor,
            advancer_cursor,
            queries,
            new_queries,
            ..
        } = state;

        let query_cursor = query_cursor
            .as_mut()
            .ok_or_else(|| CoordinatorError::Storage("query cursor is not open".to_string()))?;

        if new_queries.is_empty() {
            query_cursor.advance_read(Some(observer), None)?;
            return Ok(());
        }

        let latest = config.engine()?.latest_version(config)?;
        new_queries.sort_by_key(|query| query.version());
        let split = new_queries.partition_point(|query| query.version() <= latest);
        let deferred = new_queries.split_off(split);
        let ready = std::mem::replace(new_queries, deferred);

        let advancer = advancer_cursor
            .as_mut()
            .ok_or_else(|| CoordinatorError::Storage("advancer cursor is not open".to_string()))?;

        for query in &ready {
            advancer.advance_read(None, Some(query.version()))?;
            query.attach_to(&**advancer);
        }
        let target = advancer.advance_read(None, Some(latest))?;

        query_cursor.advance_read(Some(observer), Some(target))?;
        for query in &ready {
            query.detach();
            query.attach_to(&**query_cursor);
        }

        log::debug!(
            "Imported {} queries on '{}' at {} ({} deferred)",
            ready.len(),
            self.path(),
            target,
            new_queries.len()
        );
        queries.extend(ready);
        if new_queries.is_empty() {
            advancer.end_read();
        }
        Ok(())
    }

    fn async_open_error(&self, e: &CoordinatorError) -> CoordinatorError {
        CoordinatorError::AsyncOpen {
            path: self.path().to_string(),
            message: e.to_string(),
        }
    }
}

fn open_cursor_at(config: &RealmConfig, version: Option<VersionId>) -> Result<Box<dyn SnapshotCursor>> {
    let mut cursor = config.engine()?.open_cursor(config)?;
    cursor.begin_read(version)?;
    Ok(cursor)
}

/// Swap-remove every dead query. Returns true if any were removed.
fn remove_dead(list: &mut Vec<Arc<dyn AsyncQuery>>) -> bool {
    let mut removed = false;
    let mut i = 0;
    while i < list.len() {
        if list[i].is_alive() {
            i += 1;
            continue;
        }
        list[i].release_query();
        list.swap_remove(i);
        removed = true;
    }
    removed
}
