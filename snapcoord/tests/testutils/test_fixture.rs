//! Per-test database fixture

use snapcoord::storage::FieldValue;
use snapcoord::{
    BindingContext, CoordinatorRegistry, LogInstruction, MemoryEngine, Realm, RealmConfig,
    RealmCoordinator, VersionId,
};
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;
use tempfile::TempDir;

pub fn init_logging() {
    let _ = env_logger::builder().is_test(true).try_init();
}

/// Shorthand for a version with index 0
pub fn v(version: u64) -> VersionId {
    VersionId::new(version, 0)
}

pub fn set_int(row: usize, value: i64) -> LogInstruction {
    LogInstruction::Set {
        col: 0,
        row,
        value: FieldValue::Int(value),
    }
}

/// A private registry and engine with a unique database path
pub struct TestFixture {
    _temp_dir: TempDir,
    pub engine: Arc<MemoryEngine>,
    pub registry: Arc<CoordinatorRegistry>,
    pub path: String,
}

impl TestFixture {
    pub fn new() -> Self {
        init_logging();
        let temp_dir = tempfile::tempdir().expect("Failed to create temp dir");
        let path = temp_dir
            .path()
            .join("test.realm")
            .to_string_lossy()
            .into_owned();
        Self {
            _temp_dir: temp_dir,
            engine: Arc::new(MemoryEngine::new()),
            registry: Arc::new(CoordinatorRegistry::new()),
            path,
        }
    }

    pub fn config(&self) -> RealmConfig {
        RealmConfig::new(self.path.clone(), self.engine.clone())
    }

    pub fn coordinator(&self) -> Arc<RealmCoordinator> {
        self.registry.get_or_create(&self.path)
    }

    pub fn open(&self) -> Arc<Realm> {
        self.coordinator()
            .get_realm(self.config())
            .expect("Failed to open realm")
    }

    /// Commit straight to the engine, as another process would, without
    /// notifying anyone
    pub fn commit_externally(&self, log: Vec<LogInstruction>) -> VersionId {
        use snapcoord::StorageEngine;
        self.engine
            .commit(&self.config(), log)
            .expect("Failed to commit")
    }

    pub fn observed_replays(&self) -> usize {
        self.engine.observed_replays(&self.path)
    }
}

#[derive(Default)]
pub struct CountingContext {
    pub available: AtomicUsize,
    pub changed: AtomicUsize,
}

impl CountingContext {
    pub fn available(&self) -> usize {
        self.available.load(Ordering::SeqCst)
    }

    pub fn changed(&self) -> usize {
        self.changed.load(Ordering::SeqCst)
    }
}

impl BindingContext for CountingContext {
    fn changes_available(&self) {
        self.available.fetch_add(1, Ordering::SeqCst);
    }

    fn did_change(&self) {
        self.changed.fetch_add(1, Ordering::SeqCst);
    }
}
