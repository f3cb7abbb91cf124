// Copyright (c) 2024-2025 DeepGraph Inc.
// SPDX-License-Identifier: Apache-2.0
//
//! In-memory storage engine for testing and embedding
//!
//! Each path owns an append-only list of committed transaction logs. Version
//! `n` is the state after `n - 1` commits, so a fresh file starts at version 1.
//! The commit notifier delivers synchronously to every coordinator listening
//! on the same path, which keeps change cycles deterministic in tests.

use super::traits::{
    CommitListener, CommitNotifier, SnapshotCursor, StorageEngine, TransactLogHandler,
};
use super::types::{LogInstruction, VersionId};
use crate::config::{normalize_path, RealmConfig};
use crate::error::{CoordinatorError, Result};
use parking_lot::{Mutex, RwLock};
use std::collections::HashMap;
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::sync::{Arc, Weak};

/// Committed history of one database file
struct MemoryFile {
    commits: RwLock<Vec<Arc<Vec<LogInstruction>>>>,
    listeners: Mutex<Vec<Weak<dyn CommitListener>>>,
    observed_replays: AtomicUsize,
}

impl MemoryFile {
    fn new() -> Self {
        Self {
            commits: RwLock::new(Vec::new()),
            listeners: Mutex::new(Vec::new()),
            observed_replays: AtomicUsize::new(0),
        }
    }

    fn latest(&self) -> VersionId {
        VersionId::new(self.commits.read().len() as u64 + 1, 0)
    }

    /// Logs that take a snapshot from `from` to `to`
    fn logs_between(&self, from: VersionId, to: VersionId) -> Vec<Arc<Vec<LogInstruction>>> {
        let commits = self.commits.read();
        (from.version + 1..=to.version)
            .map(|version| commits[(version - 2) as usize].clone())
            .collect()
    }
}

/// In-memory MVCC storage engine
pub struct MemoryEngine {
    files: RwLock<HashMap<String, Arc<MemoryFile>>>,
    fail_cursor_open: AtomicBool,
    fail_notifier: AtomicBool,
}

impl std::fmt::Debug for MemoryEngine {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("MemoryEngine")
            .field("files", &self.files.read().len())
            .finish_non_exhaustive()
    }
}

impl Default for MemoryEngine {
    fn default() -> Self {
        Self::new()
    }
}

impl MemoryEngine {
    /// Create a new memory engine
    pub fn new() -> Self {
        Self {
            files: RwLock::new(HashMap::new()),
            fail_cursor_open: AtomicBool::new(false),
            fail_notifier: AtomicBool::new(false),
        }
    }

    fn file(&self, path: &str) -> Arc<MemoryFile> {
        let key = normalize_path(path);
        if let Some(file) = self.files.read().get(&key) {
            return file.clone();
        }
        self.files
            .write()
            .entry(key)
            .or_insert_with(|| Arc::new(MemoryFile::new()))
            .clone()
    }

    /// Make every subsequent `open_cursor` call fail
    pub fn set_fail_cursor_open(&self, fail: bool) {
        self.fail_cursor_open.store(fail, Ordering::SeqCst);
    }

    /// Make every subsequent `commit_notifier` call fail
    pub fn set_fail_notifier(&self, fail: bool) {
        self.fail_notifier.store(fail, Ordering::SeqCst);
    }

    /// Number of log replays that carried a handler, across all cursors of `path`
    pub fn observed_replays(&self, path: &str) -> usize {
        self.file(path).observed_replays.load(Ordering::SeqCst)
    }

    /// Number of commits made to `path`
    pub fn commit_count(&self, path: &str) -> usize {
        self.file(path).commits.read().len()
    }

    /// Number of commit listeners registered on `path`
    pub fn listener_count(&self, path: &str) -> usize {
        self.file(path).listeners.lock().len()
    }
}

impl StorageEngine for MemoryEngine {
    fn open_cursor(&self, config: &RealmConfig) -> Result<Box<dyn SnapshotCursor>> {
        if self.fail_cursor_open.load(Ordering::SeqCst) {
            return Err(CoordinatorError::Storage(format!(
                "unable to open '{}': too many open files",
                config.path
            )));
        }
        Ok(Box::new(MemoryCursor {
            file: self.file(&config.path),
            current: None,
        }))
    }

    fn commit(&self, config: &RealmConfig, log: Vec<LogInstruction>) -> Result<VersionId> {
        let file = self.file(&config.path);
        let mut commits = file.commits.write();
        commits.push(Arc::new(log));
        Ok(VersionId::new(commits.len() as u64 + 1, 0))
    }

    fn latest_version(&self, config: &RealmConfig) -> Result<VersionId> {
        Ok(self.file(&config.path).latest())
    }

    fn commit_notifier(
        &self,
        config: &RealmConfig,
        listener: Weak<dyn CommitListener>,
    ) -> Result<Box<dyn CommitNotifier>> {
        if self.fail_notifier.load(Ordering::SeqCst) {
            return Err(CoordinatorError::Storage(
                "failed to create notification pipe: resource temporarily unavailable".to_string(),
            ));
        }
        let file = self.file(&config.path);
        file.listeners.lock().push(listener.clone());
        Ok(Box::new(MemoryNotifier { file, listener }))
    }
}

/// Snapshot cursor over a [`MemoryFile`]
struct MemoryCursor {
    file: Arc<MemoryFile>,
    current: Option<VersionId>,
}

impl SnapshotCursor for MemoryCursor {
    fn begin_read(&mut self, version: Option<VersionId>) -> Result<VersionId> {
        let latest = self.file.latest();
        let version = version.unwrap_or(latest);
        if version.version == 0 || version > latest {
            return Err(CoordinatorError::Storage(format!(
                "version {} does not exist (latest is {})",
                version, latest
            )));
        }
        self.current = Some(version);
        Ok(version)
    }

    fn end_read(&mut self) {
        self.current = None;
    }

    fn advance_read(
        &mut self,
        handler: Option<&mut dyn TransactLogHandler>,
        target: Option<VersionId>,
    ) -> Result<VersionId> {
        let current = self
            .current
            .ok_or_else(|| CoordinatorError::Storage("no active read transaction".to_string()))?;
        let latest = self.file.latest();
        let target = target.unwrap_or(latest);
        if target < current {
            return Err(CoordinatorError::Storage(format!(
                "cannot advance from {} back to {}",
                current, target
            )));
        }
        if target > latest {
            return Err(CoordinatorError::Storage(format!(
                "version {} does not exist (latest is {})",
                target, latest
            )));
        }

        if let Some(handler) = handler {
            self.file.observed_replays.fetch_add(1, Ordering::SeqCst);
            for log in self.file.logs_between(current, target) {
                for instruction in log.iter() {
                    handler.handle(instruction)?;
                }
            }
            handler.parse_complete()?;
        }

        self.current = Some(target);
        Ok(target)
    }

    fn current_version(&self) -> Option<VersionId> {
        self.current
    }
}

/// Wakes every coordinator listening on the same file
struct MemoryNotifier {
    file: Arc<MemoryFile>,
    listener: Weak<dyn CommitListener>,
}

impl CommitNotifier for MemoryNotifier {
    fn notify_others(&self) {
        let listeners: Vec<Arc<dyn CommitListener>> = {
            let mut listeners = self.file.listeners.lock();
            listeners.retain(|l| l.strong_count() > 0);
            listeners.iter().filter_map(|l| l.upgrade()).collect()
        };
        for listener in listeners {
            listener.on_change();
        }
    }
}

impl Drop for MemoryNotifier {
    fn drop(&mut self) {
        self.file
            .listeners
            .lock()
            .retain(|l| l.strong_count() > 0 && !Weak::ptr_eq(l, &self.listener));
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::storage::types::FieldValue;

    struct Recorder(Vec<LogInstruction>);

    impl TransactLogHandler for Recorder {
        fn handle(&mut self, instruction: &LogInstruction) -> Result<()> {
            self.0.push(instruction.clone());
            Ok(())
        }
    }

    fn config(engine: &Arc<MemoryEngine>) -> RealmConfig {
        RealmConfig::new("/tmp/memory_engine.db", engine.clone())
    }

    fn set_int(row: usize, value: i64) -> LogInstruction {
        LogInstruction::Set {
            col: 0,
            row,
            value: FieldValue::Int(value),
        }
    }

    #[test]
    fn test_versions_start_at_one() {
        let engine = Arc::new(MemoryEngine::new());
        let config = config(&engine);
        assert_eq!(engine.latest_version(&config).unwrap(), VersionId::new(1, 0));

        let v = engine.commit(&config, vec![set_int(0, 1)]).unwrap();
        assert_eq!(v, VersionId::new(2, 0));
        assert_eq!(engine.commit_count(&config.path), 1);
    }

    #[test]
    fn test_advance_replays_intervening_logs() {
        let engine = Arc::new(MemoryEngine::new());
        let config = config(&engine);
        let mut cursor = engine.open_cursor(&config).unwrap();
        assert_eq!(cursor.begin_read(None).unwrap(), VersionId::new(1, 0));

        engine.commit(&config, vec![set_int(0, 1)]).unwrap();
        engine.commit(&config, vec![set_int(1, 2), set_int(2, 3)]).unwrap();
        engine.commit(&config, vec![set_int(3, 4)]).unwrap();

        let mut recorder = Recorder(Vec::new());
        let reached = cursor
            .advance_read(Some(&mut recorder), Some(VersionId::new(3, 0)))
            .unwrap();
        assert_eq!(reached, VersionId::new(3, 0));
        assert_eq!(recorder.0, vec![set_int(0, 1), set_int(1, 2), set_int(2, 3)]);
        assert_eq!(engine.observed_replays(&config.path), 1);

        // Advancing without a handler does not count as an observed replay
        cursor.advance_read(None, None).unwrap();
        assert_eq!(cursor.current_version(), Some(VersionId::new(4, 0)));
        assert_eq!(engine.observed_replays(&config.path), 1);
    }

    #[test]
    fn test_cursor_never_moves_backwards() {
        let engine = Arc::new(MemoryEngine::new());
        let config = config(&engine);
        engine.commit(&config, vec![]).unwrap();

        let mut cursor = engine.open_cursor(&config).unwrap();
        cursor.begin_read(None).unwrap();
        assert!(cursor.advance_read(None, Some(VersionId::new(1, 0))).is_err());

        cursor.end_read();
        assert!(!cursor.is_reading());
        assert!(cursor.advance_read(None, None).is_err());
    }

    #[test]
    fn test_failure_injection() {
        let engine = Arc::new(MemoryEngine::new());
        let config = config(&engine);
        engine.set_fail_cursor_open(true);
        assert!(matches!(
            engine.open_cursor(&config),
            Err(CoordinatorError::Storage(_))
        ));
        engine.set_fail_cursor_open(false);
        assert!(engine.open_cursor(&config).is_ok());
    }

    struct CountingListener(AtomicUsize);

    impl CommitListener for CountingListener {
        fn on_change(&self) {
            self.0.fetch_add(1, Ordering::SeqCst);
        }
    }

    #[test]
    fn test_notifier_wakes_live_listeners() {
        let engine = Arc::new(MemoryEngine::new());
        let config = config(&engine);

        let first = Arc::new(CountingListener(AtomicUsize::new(0)));
        let second = Arc::new(CountingListener(AtomicUsize::new(0)));
        let first_weak: Weak<dyn CommitListener> = Arc::downgrade(&first) as Weak<dyn CommitListener>;
        let second_weak: Weak<dyn CommitListener> =
            Arc::downgrade(&second) as Weak<dyn CommitListener>;

        let notifier = engine.commit_notifier(&config, first_weak).unwrap();
        let other = engine.commit_notifier(&config, second_weak).unwrap();

        notifier.notify_others();
        assert_eq!(first.0.load(Ordering::SeqCst), 1);
        assert_eq!(second.0.load(Ordering::SeqCst), 1);

        drop(other);
        notifier.notify_others();
        assert_eq!(first.0.load(Ordering::SeqCst), 2);
        assert_eq!(second.0.load(Ordering::SeqCst), 1);
    }
}
