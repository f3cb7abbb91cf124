// Copyright (c) 2024-2025 DeepGraph Inc.
// SPDX-License-Identifier: Apache-2.0
//
//! Coordinator registry
//!
//! Guarantees at most one live [`RealmCoordinator`] per database path. Entries
//! hold weak references so a coordinator is destroyed as soon as the last
//! handle for its path goes away; the coordinator then sweeps every expired
//! entry out of the registry it came from.
//!
//! The process-wide registry is created lazily on first use and can be torn
//! down wholesale with [`CoordinatorRegistry::reset_all`]. Independent
//! registries can be created with [`CoordinatorRegistry::new`].

use super::realm_coordinator::RealmCoordinator;
use crate::config::normalize_path;
use crate::realm::Realm;
use once_cell::sync::Lazy;
use parking_lot::Mutex;
use std::collections::HashMap;
use std::sync::{Arc, Weak};

/// Process-wide registry, initialized on first access
static GLOBAL_REGISTRY: Lazy<Arc<CoordinatorRegistry>> =
    Lazy::new(|| Arc::new(CoordinatorRegistry::new()));

/// Map from normalised database path to the coordinator for that path
#[derive(Debug, Default)]
pub struct CoordinatorRegistry {
    coordinators: Mutex<HashMap<String, Weak<RealmCoordinator>>>,
}

impl CoordinatorRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// The process-wide registry
    pub fn global() -> Arc<CoordinatorRegistry> {
        GLOBAL_REGISTRY.clone()
    }

    /// Return the live coordinator for `path`, creating one if needed
    pub fn get_or_create(self: &Arc<Self>, path: &str) -> Arc<RealmCoordinator> {
        let key = normalize_path(path);
        let mut coordinators = self.coordinators.lock();

        if let Some(coordinator) = coordinators.get(&key).and_then(Weak::upgrade) {
            return coordinator;
        }

        let coordinator = RealmCoordinator::new(&key, Arc::downgrade(self));
        log::info!("Created coordinator for '{}'", key);
        coordinators.insert(key, Arc::downgrade(&coordinator));
        coordinator
    }

    /// Return the live coordinator for `path` without creating one
    pub fn get_existing(&self, path: &str) -> Option<Arc<RealmCoordinator>> {
        self.coordinators
            .lock()
            .get(&normalize_path(path))
            .and_then(Weak::upgrade)
    }

    /// Number of entries, including ones whose coordinator already expired
    pub fn len(&self) -> usize {
        self.coordinators.lock().len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Drop every entry whose coordinator no longer exists
    pub(crate) fn remove_expired(&self) {
        self.coordinators
            .lock()
            .retain(|_, coordinator| coordinator.strong_count() > 0);
    }

    /// Close every cached handle of every coordinator and forget all
    /// coordinators
    ///
    /// Handles are collected under the registry lock and closed after it is
    /// released, because closing a handle re-enters its coordinator.
    pub fn reset_all(&self) {
        let mut realms_to_close: Vec<Arc<Realm>> = Vec::new();
        let mut live_coordinators = Vec::new();
        {
            let mut coordinators = self.coordinators.lock();
            for coordinator in coordinators.values().filter_map(Weak::upgrade) {
                realms_to_close.extend(coordinator.release_for_reset());
                live_coordinators.push(coordinator);
            }
            coordinators.clear();
        }

        log::info!(
            "Resetting {} coordinators, closing {} cached handles",
            live_coordinators.len(),
            realms_to_close.len()
        );
        drop(live_coordinators);

        for realm in realms_to_close {
            realm.close();
        }
    }
}
