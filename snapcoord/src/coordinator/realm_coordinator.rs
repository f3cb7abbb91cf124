// Copyright (c) 2024-2025 DeepGraph Inc.
// SPDX-License-Identifier: Apache-2.0
//
//! Per-path coordinator
//!
//! One `RealmCoordinator` exists per database path. It owns the canonical
//! open configuration, the cache of open handles, the commit notifier, and
//! the two background snapshot cursors used by the async query pipeline.
//!
//! Two locks guard its state and are never held together:
//! - the realm lock: configuration, handle cache, notifier
//! - the query lock: query cursor, advancer cursor, query lists, async error

use super::cache::CachedRealm;
use super::registry::CoordinatorRegistry;
use crate::config::RealmConfig;
use crate::error::{CoordinatorError, Result};
use crate::realm::{AsyncQuery, Realm, RealmId};
use crate::storage::{CommitListener, CommitNotifier, SnapshotCursor};
use parking_lot::Mutex;
use std::sync::{Arc, Weak};

/// State guarded by the realm lock
#[derive(Default)]
pub(super) struct RealmState {
    pub(super) config: Option<RealmConfig>,
    pub(super) cached_realms: Vec<CachedRealm>,
    pub(super) notifier: Option<Arc<dyn CommitNotifier>>,
}

/// State guarded by the query lock
#[derive(Default)]
pub(super) struct QueryState {
    /// Advanced to the latest version once per change cycle
    pub(super) query_cursor: Option<Box<dyn SnapshotCursor>>,
    /// Holds the oldest version among queries awaiting import
    pub(super) advancer_cursor: Option<Box<dyn SnapshotCursor>>,
    pub(super) async_error: Option<CoordinatorError>,
    /// Queries in main rotation, attached to the query cursor
    pub(super) queries: Vec<Arc<dyn AsyncQuery>>,
    /// Newly registered queries, not yet imported
    pub(super) new_queries: Vec<Arc<dyn AsyncQuery>>,
}

/// Configuration and notifier taken on by an open that has not succeeded yet
struct Adoption {
    config: RealmConfig,
    notifier: Option<Arc<dyn CommitNotifier>>,
}

impl Adoption {
    fn apply(self, state: &mut RealmState) {
        if let Some(notifier) = self.notifier {
            state.notifier = Some(notifier);
        }
        state.config = Some(self.config);
    }
}

pub struct RealmCoordinator {
    path: String,
    registry: Weak<CoordinatorRegistry>,
    self_ref: Weak<RealmCoordinator>,
    pub(super) realms: Mutex<RealmState>,
    pub(super) queries: Mutex<QueryState>,
}

impl std::fmt::Debug for RealmCoordinator {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("RealmCoordinator")
            .field("path", &self.path)
            .finish_non_exhaustive()
    }
}

impl RealmCoordinator {
    pub(crate) fn new(path: &str, registry: Weak<CoordinatorRegistry>) -> Arc<Self> {
        Arc::new_cyclic(|self_ref| Self {
            path: path.to_string(),
            registry,
            self_ref: self_ref.clone(),
            realms: Mutex::new(RealmState::default()),
            queries: Mutex::new(QueryState::default()),
        })
    }

    /// Coordinator for `path` from the process-wide registry, created if needed
    pub fn get_coordinator(path: &str) -> Arc<RealmCoordinator> {
        CoordinatorRegistry::global().get_or_create(path)
    }

    /// Coordinator for `path` from the process-wide registry, if one is alive
    pub fn get_existing_coordinator(path: &str) -> Option<Arc<RealmCoordinator>> {
        CoordinatorRegistry::global().get_existing(path)
    }

    pub fn path(&self) -> &str {
        &self.path
    }

    /// Canonical configuration adopted from the first handle opened
    pub fn config(&self) -> Result<RealmConfig> {
        self.realms
            .lock()
            .config
            .clone()
            .ok_or_else(|| CoordinatorError::NotOpen {
                path: self.path.clone(),
            })
    }

    /// Schema version of the open file, if any handle is open
    pub fn schema_version(&self) -> Option<u64> {
        let state = self.realms.lock();
        if state.cached_realms.is_empty() {
            return None;
        }
        state.config.as_ref().and_then(|c| c.schema_version)
    }

    /// Number of handles currently tracked, including expired entries
    pub fn cached_realm_count(&self) -> usize {
        self.realms.lock().cached_realms.len()
    }

    /// Get a handle for `config`, reusing a cached one for this thread when
    /// the configuration allows it.
    ///
    /// The first successful open decides the canonical configuration. A
    /// failed open leaves the coordinator as it found it.
    pub fn get_realm(&self, config: RealmConfig) -> Result<Arc<Realm>> {
        let mut state = self.realms.lock();

        let adopt = match &state.config {
            None => true,
            Some(canonical) => {
                (!canonical.read_only && state.notifier.is_none())
                    || (canonical.read_only && state.cached_realms.is_empty())
            }
        };

        let mut adopted: Option<Adoption> = None;
        if adopt {
            let notifier = if !config.read_only && state.notifier.is_none() {
                let listener: Weak<dyn CommitListener> = self.self_ref.clone();
                let notifier = config
                    .engine()?
                    .commit_notifier(&config, listener)
                    .map_err(|e| CoordinatorError::AccessError {
                        path: config.path.clone(),
                        message: e.to_string(),
                    })?;
                Some(Arc::from(notifier))
            } else {
                None
            };
            adopted = Some(Adoption {
                config: config.clone(),
                notifier,
            });
        } else if let Some(canonical) = &state.config {
            canonical.check_compatible(&config)?;
        }

        if config.cache {
            let reused = state
                .cached_realms
                .iter()
                .filter(|cached| cached.is_cached_for_current_thread())
                // Can be gone if the last reference dropped and the handle
                // has not unregistered yet
                .find_map(CachedRealm::realm);
            if let Some(realm) = reused {
                if let Some(adoption) = adopted {
                    adoption.apply(&mut state);
                }
                return Ok(realm);
            }
        }

        let coordinator = self.self_ref.upgrade().ok_or_else(|| CoordinatorError::Closed {
            path: self.path.clone(),
        })?;
        let realm = Arc::new(Realm::new(config));
        realm.init(coordinator)?;

        if let Some(adoption) = adopted {
            adoption.apply(&mut state);
        }
        let cache_policy = state.config.as_ref().map_or(true, |c| c.cache);
        state
            .cached_realms
            .push(CachedRealm::new(&realm, cache_policy));
        Ok(realm)
    }

    /// Get a handle using the canonical configuration
    pub fn get_canonical_realm(&self) -> Result<Arc<Realm>> {
        let config = self.config()?;
        self.get_realm(config)
    }

    /// Forget `realm_id` and every expired entry
    pub(crate) fn unregister_realm(&self, realm_id: RealmId) {
        let mut state = self.realms.lock();
        let cached = &mut state.cached_realms;
        let mut i = 0;
        while i < cached.len() {
            if cached[i].expired() || cached[i].is_for_realm(realm_id) {
                cached.swap_remove(i);
            } else {
                i += 1;
            }
        }
    }

    /// Drop the notifier and return every live cached handle so the caller
    /// can close them without holding any lock
    pub(crate) fn release_for_reset(&self) -> Vec<Arc<Realm>> {
        let mut state = self.realms.lock();
        state.notifier = None;
        state
            .cached_realms
            .iter()
            .filter_map(CachedRealm::realm)
            .collect()
    }

    /// Tell every other listener on this file that a commit happened
    pub fn send_commit_notifications(&self) -> Result<()> {
        let notifier = {
            let state = self.realms.lock();
            if state.config.as_ref().map_or(false, |c| c.read_only) {
                return Err(CoordinatorError::ReadOnly {
                    path: self.path.clone(),
                });
            }
            state.notifier.clone()
        };
        match notifier {
            Some(notifier) => notifier.notify_others(),
            None => log::warn!(
                "No commit notifier for '{}'; skipping commit notification",
                self.path
            ),
        }
        Ok(())
    }
}

impl CommitListener for RealmCoordinator {
    fn on_change(&self) {
        if let Err(e) = RealmCoordinator::on_change(self) {
            log::error!("Change cycle for '{}' failed: {}", self.path, e);
        }
    }
}

impl Drop for RealmCoordinator {
    fn drop(&mut self) {
        log::info!("Destroying coordinator for '{}'", self.path);
        if let Some(registry) = self.registry.upgrade() {
            registry.remove_expired();
        }
    }
}
