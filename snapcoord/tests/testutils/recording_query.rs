//! Async query double

use parking_lot::Mutex;
use snapcoord::{
    AsyncQuery, CoordinatorError, LinkListKey, RealmConfig, RealmId, SnapshotCursor,
    StorageEngine, TransactionChanges, VersionId,
};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

#[derive(Debug, Default, Clone)]
pub struct QueryRecord {
    /// Pinned version until the first handover, then the version of the
    /// latest published results
    pub version: VersionId,
    /// Version of the cursor on every `attach_to`
    pub attached_at: Vec<Option<VersionId>>,
    pub detaches: usize,
    pub runs: Vec<TransactionChanges>,
    pub ran_at: Option<VersionId>,
    pub handed_over: Option<VersionId>,
    pub deliveries: Vec<(RealmId, VersionId)>,
    pub errors: Vec<CoordinatorError>,
    pub callbacks: usize,
    pub released: bool,
}

/// Query that computes nothing and records every coordinator call
pub struct RecordingQuery {
    config: RealmConfig,
    observed: Vec<LinkListKey>,
    alive: AtomicBool,
    record: Mutex<QueryRecord>,
}

impl RecordingQuery {
    pub fn new(config: RealmConfig, version: VersionId) -> Arc<Self> {
        Self::observing(config, version, Vec::new())
    }

    pub fn observing(
        config: RealmConfig,
        version: VersionId,
        observed: Vec<LinkListKey>,
    ) -> Arc<Self> {
        Arc::new(Self {
            config,
            observed,
            alive: AtomicBool::new(true),
            record: Mutex::new(QueryRecord {
                version,
                ..QueryRecord::default()
            }),
        })
    }

    pub fn record(&self) -> QueryRecord {
        self.record.lock().clone()
    }

    /// Simulate the owner of the query going away
    pub fn kill(&self) {
        self.alive.store(false, Ordering::SeqCst);
    }
}

impl AsyncQuery for RecordingQuery {
    fn version(&self) -> VersionId {
        self.record.lock().version
    }

    fn attach_to(&self, cursor: &dyn SnapshotCursor) {
        self.record.lock().attached_at.push(cursor.current_version());
    }

    fn detach(&self) {
        self.record.lock().detaches += 1;
    }

    fn run(&self, changes: &TransactionChanges) {
        // Runs happen synchronously inside the change cycle, so the latest
        // version is the one the query cursor was advanced to
        let latest = self
            .config
            .engine()
            .and_then(|engine| engine.latest_version(&self.config))
            .ok();
        let mut record = self.record.lock();
        record.runs.push(changes.clone());
        record.ran_at = latest;
    }

    fn prepare_handover(&self) {
        let mut record = self.record.lock();
        if let Some(version) = record.ran_at {
            record.handed_over = Some(version);
            record.version = version;
        }
    }

    fn deliver(&self, realm: RealmId, version: VersionId, error: Option<&CoordinatorError>) -> bool {
        let mut record = self.record.lock();
        if let Some(error) = error {
            record.errors.push(error.clone());
            return true;
        }
        if record.handed_over != Some(version) {
            return false;
        }
        if record.deliveries.contains(&(realm, version)) {
            return false;
        }
        record.deliveries.push((realm, version));
        true
    }

    fn call_callbacks(&self) {
        self.record.lock().callbacks += 1;
    }

    fn is_alive(&self) -> bool {
        self.alive.load(Ordering::SeqCst)
    }

    fn release_query(&self) {
        self.record.lock().released = true;
    }

    fn observed_link_lists(&self) -> Vec<LinkListKey> {
        self.observed.clone()
    }
}
