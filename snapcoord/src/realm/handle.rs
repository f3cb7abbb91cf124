// Copyright (c) 2024-2025 DeepGraph Inc.
// SPDX-License-Identifier: Apache-2.0
//
//! Database handle
//!
//! A `Realm` is one thread's view of a database file: its own snapshot cursor
//! plus a strong reference to the coordinator for its path. The coordinator
//! keeps only weak references back, keyed by [`RealmId`].

use crate::changes::TransactLogValidator;
use crate::config::RealmConfig;
use crate::coordinator::{CoordinatorRegistry, RealmCoordinator};
use crate::error::{CoordinatorError, Result};
use crate::realm::AsyncQuery;
use crate::storage::{LogInstruction, SnapshotCursor, VersionId};
use parking_lot::Mutex;
use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use std::sync::Arc;
use std::thread::ThreadId;

static NEXT_REALM_ID: AtomicU64 = AtomicU64::new(1);

/// Process-unique identity of a database handle
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct RealmId(u64);

impl RealmId {
    fn next() -> Self {
        RealmId(NEXT_REALM_ID.fetch_add(1, Ordering::Relaxed))
    }

    pub fn id(&self) -> u64 {
        self.0
    }
}

impl std::fmt::Display for RealmId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "realm_{}", self.0)
    }
}

/// Callbacks from the coordinator to the binding layer owning a handle
///
/// Never invoked while a coordinator lock is held.
pub trait BindingContext: Send + Sync {
    /// Another commit is available; the owning thread should refresh
    fn changes_available(&self) {}

    /// The handle advanced to a newer snapshot
    fn did_change(&self) {}
}

pub struct Realm {
    id: RealmId,
    config: RealmConfig,
    thread_id: ThreadId,
    cursor: Mutex<Option<Box<dyn SnapshotCursor>>>,
    coordinator: Mutex<Option<Arc<RealmCoordinator>>>,
    binding_context: Mutex<Option<Arc<dyn BindingContext>>>,
    pending_changes: AtomicBool,
}

impl std::fmt::Debug for Realm {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Realm")
            .field("id", &self.id)
            .field("path", &self.config.path)
            .field("thread_id", &self.thread_id)
            .finish_non_exhaustive()
    }
}

impl Realm {
    /// Open a handle through the process-wide coordinator registry
    pub fn open(config: RealmConfig) -> Result<Arc<Realm>> {
        config.validate()?;
        CoordinatorRegistry::global()
            .get_or_create(&config.path)
            .get_realm(config)
    }

    pub(crate) fn new(config: RealmConfig) -> Self {
        Self {
            id: RealmId::next(),
            config,
            thread_id: std::thread::current().id(),
            cursor: Mutex::new(None),
            coordinator: Mutex::new(None),
            binding_context: Mutex::new(None),
            pending_changes: AtomicBool::new(false),
        }
    }

    /// Open the handle's cursor at the latest version and bind it to its
    /// coordinator
    pub(crate) fn init(&self, coordinator: Arc<RealmCoordinator>) -> Result<()> {
        let mut cursor = self.config.engine()?.open_cursor(&self.config)?;
        let version = cursor.begin_read(None)?;
        log::debug!("{} opened '{}' at {}", self.id, self.config.path, version);

        *self.cursor.lock() = Some(cursor);
        *self.coordinator.lock() = Some(coordinator);
        Ok(())
    }

    pub fn id(&self) -> RealmId {
        self.id
    }

    pub fn config(&self) -> &RealmConfig {
        &self.config
    }

    pub fn path(&self) -> &str {
        &self.config.path
    }

    pub fn thread_id(&self) -> ThreadId {
        self.thread_id
    }

    pub fn is_closed(&self) -> bool {
        self.cursor.lock().is_none()
    }

    pub fn current_version(&self) -> Option<VersionId> {
        self.cursor.lock().as_ref().and_then(|c| c.current_version())
    }

    /// True if a commit notification arrived since the last refresh
    pub fn has_pending_changes(&self) -> bool {
        self.pending_changes.load(Ordering::SeqCst)
    }

    pub fn set_binding_context(&self, context: Option<Arc<dyn BindingContext>>) {
        *self.binding_context.lock() = context;
    }

    pub fn coordinator(&self) -> Result<Arc<RealmCoordinator>> {
        self.coordinator.lock().clone().ok_or_else(|| CoordinatorError::Closed {
            path: self.config.path.clone(),
        })
    }

    /// Commit `log` as a write transaction and advance this handle to it
    pub fn commit(&self, log: Vec<LogInstruction>) -> Result<VersionId> {
        if self.config.read_only {
            return Err(CoordinatorError::ReadOnly {
                path: self.config.path.clone(),
            });
        }
        let coordinator = self.coordinator()?;
        let version = self.config.engine()?.commit(&self.config, log)?;

        self.with_cursor(|cursor| {
            let mut validator = TransactLogValidator::new();
            cursor.advance_read(Some(&mut validator), Some(version))
        })?;

        coordinator.send_commit_notifications()?;
        Ok(version)
    }

    /// Register an async query created against this handle's current version
    pub fn register_query(&self, query: Arc<dyn AsyncQuery>) -> Result<()> {
        self.coordinator()?.register_query(query)
    }

    /// Advance to the version the async queries are ready at and deliver
    /// their results
    pub fn refresh(&self) -> Result<()> {
        let coordinator = self.coordinator()?;
        self.pending_changes.store(false, Ordering::SeqCst);
        if coordinator.advance_to_ready(self)? {
            if let Some(context) = self.binding_context() {
                context.did_change();
            }
        }
        Ok(())
    }

    /// Deliver async results already computed for the current version
    pub fn deliver_available(&self) -> Result<()> {
        self.coordinator()?.process_available_async(self)
    }

    /// End the read transaction and detach from the coordinator. Idempotent.
    pub fn close(&self) {
        if let Some(mut cursor) = self.cursor.lock().take() {
            cursor.end_read();
        }
        let coordinator = self.coordinator.lock().take();
        if let Some(coordinator) = coordinator {
            coordinator.unregister_realm(self.id);
            log::debug!("{} closed '{}'", self.id, self.config.path);
        }
    }

    pub(crate) fn notify(&self) {
        self.pending_changes.store(true, Ordering::SeqCst);
        if let Some(context) = self.binding_context() {
            context.changes_available();
        }
    }

    pub(crate) fn with_cursor<R>(
        &self,
        f: impl FnOnce(&mut dyn SnapshotCursor) -> Result<R>,
    ) -> Result<R> {
        let mut cursor = self.cursor.lock();
        match cursor.as_mut() {
            Some(cursor) => f(&mut **cursor),
            None => Err(CoordinatorError::Closed {
                path: self.config.path.clone(),
            }),
        }
    }

    fn binding_context(&self) -> Option<Arc<dyn BindingContext>> {
        self.binding_context.lock().clone()
    }
}

impl Drop for Realm {
    fn drop(&mut self) {
        self.close();
    }
}
