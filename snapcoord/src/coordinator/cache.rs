// Copyright (c) 2024-2025 DeepGraph Inc.
// SPDX-License-Identifier: Apache-2.0
//
//! Cached database handle entries

use crate::realm::{Realm, RealmId};
use std::sync::{Arc, Weak};
use std::thread::ThreadId;

/// Weak reference to an open handle, remembered by its coordinator
///
/// Entries are matched by identity, never dereferenced without upgrading.
/// Non-cacheable entries are tracked only for teardown and notification.
#[derive(Debug, Clone)]
pub(crate) struct CachedRealm {
    realm: Weak<Realm>,
    realm_id: RealmId,
    thread_id: ThreadId,
    cache: bool,
}

impl CachedRealm {
    pub(crate) fn new(realm: &Arc<Realm>, cache: bool) -> Self {
        Self {
            realm: Arc::downgrade(realm),
            realm_id: realm.id(),
            thread_id: realm.thread_id(),
            cache,
        }
    }

    pub(crate) fn realm(&self) -> Option<Arc<Realm>> {
        self.realm.upgrade()
    }

    pub(crate) fn expired(&self) -> bool {
        self.realm.strong_count() == 0
    }

    pub(crate) fn is_for_realm(&self, realm_id: RealmId) -> bool {
        self.realm_id == realm_id
    }

    pub(crate) fn is_cached_for_current_thread(&self) -> bool {
        self.cache && self.thread_id == std::thread::current().id()
    }
}
