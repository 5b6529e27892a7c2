use std::fmt;
use std::sync::{Arc, Mutex, MutexGuard, PoisonError, RwLock};

use chrono::{DateTime, Utc};
use tracing::{debug, info, warn};

use crate::aggregate::PlayerStats;
use crate::config::AppConfig;
use crate::error::Result;
use crate::form::FormHistory;
use crate::match_log;
use crate::persist::StatsStore;
use crate::pipeline::{self, ComputedStats};
use crate::staleness::{self, CurrentLog, StoredState, Validity};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SnapshotOrigin {
    /// Read back from the persisted artifacts.
    Loaded,
    /// Produced by a recompute during this process.
    Computed,
}

/// An immutable view of the statistics handed out to readers.
#[derive(Debug, Clone)]
pub struct Snapshot {
    pub stats: Vec<PlayerStats>,
    pub form: FormHistory,
    pub marker: Option<u32>,
    pub log_digest: Option<String>,
    pub loaded_at: DateTime<Utc>,
    pub origin: SnapshotOrigin,
}

impl Snapshot {
    fn from_computed(computed: ComputedStats) -> Self {
        Self {
            stats: computed.stats.into_values().collect(),
            form: computed.form,
            marker: Some(computed.marker),
            log_digest: Some(computed.log_digest),
            loaded_at: Utc::now(),
            origin: SnapshotOrigin::Computed,
        }
    }

    pub fn player(&self, player_id: u32) -> Option<&PlayerStats> {
        self.stats.iter().find(|p| p.player_id == player_id)
    }

    fn matches_stored(&self, stored: &StoredState) -> bool {
        self.marker == stored.marker && self.log_digest == stored.digest
    }
}

/// What a presentation layer should show.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum DataStatus {
    /// Inputs are missing or empty; prompt for an upload.
    NotConfigured(String),
    /// The last recompute failed; show the detail.
    Failed(String),
    /// Inputs are fine but the stats need a recompute.
    Stale(Validity),
    Valid,
}

impl fmt::Display for DataStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::NotConfigured(detail) => write!(f, "not configured: {detail}"),
            Self::Failed(detail) => write!(f, "computation failed: {detail}"),
            Self::Stale(validity) => write!(f, "needs refresh: {validity}"),
            Self::Valid => write!(f, "valid"),
        }
    }
}

/// Owns the current statistics and decides, per access, whether the
/// persisted artifacts can be served or must be rebuilt. At most one rebuild
/// runs at a time; readers share the last good snapshot.
pub struct StatsCache {
    config: AppConfig,
    store: StatsStore,
    snapshot: RwLock<Option<Arc<Snapshot>>>,
    recompute_guard: Mutex<()>,
    /// Readers of the persisted artifacts take the read side; `save` the write side.
    artifacts: RwLock<()>,
    last_error: Mutex<Option<String>>,
}

impl StatsCache {
    pub fn new(config: AppConfig) -> Self {
        let store = StatsStore::new(config.artifacts.clone());
        Self {
            config,
            store,
            snapshot: RwLock::new(None),
            recompute_guard: Mutex::new(()),
            artifacts: RwLock::new(()),
            last_error: Mutex::new(None),
        }
    }

    pub fn config(&self) -> &AppConfig {
        &self.config
    }

    pub fn store(&self) -> &StatsStore {
        &self.store
    }

    /// Serves valid cached stats, rebuilding first when they are missing or
    /// stale. A failed rebuild leaves the previous artifacts untouched.
    pub fn access(&self) -> Result<Arc<Snapshot>> {
        let result = self.access_inner();
        self.note_result(&result);
        result
    }

    /// Rebuilds unconditionally.
    pub fn recompute(&self) -> Result<Arc<Snapshot>> {
        let result = {
            let _guard = lock(&self.recompute_guard);
            self.rebuild()
        };
        self.note_result(&result);
        result
    }

    /// Drops the in-memory snapshot; the next access re-validates and reloads.
    pub fn invalidate(&self) {
        *self
            .snapshot
            .write()
            .unwrap_or_else(PoisonError::into_inner) = None;
    }

    /// The current in-memory snapshot, without validation or I/O.
    pub fn snapshot(&self) -> Option<Arc<Snapshot>> {
        self.snapshot
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .clone()
    }

    pub fn last_error(&self) -> Option<String> {
        lock(&self.last_error).clone()
    }

    pub fn status(&self) -> DataStatus {
        let current = match staleness::inspect_log(&self.config.inputs.match_data) {
            Ok(current) => current,
            Err(err) if err.is_not_configured() => {
                return DataStatus::NotConfigured(err.to_string());
            }
            Err(err) => return DataStatus::Failed(err.to_string()),
        };
        if let Err(err) = match_log::read_player_keys(&self.config.inputs.player_keys) {
            if err.is_not_configured() {
                return DataStatus::NotConfigured(err.to_string());
            }
            return DataStatus::Failed(err.to_string());
        }

        let stored = {
            let _artifacts = self.artifacts.read().unwrap_or_else(PoisonError::into_inner);
            self.store.load_stored_state()
        };
        match staleness::check(&current, &stored, self.config.staleness) {
            Validity::Valid => DataStatus::Valid,
            validity => match self.last_error() {
                Some(detail) => DataStatus::Failed(detail),
                None => DataStatus::Stale(validity),
            },
        }
    }

    fn access_inner(&self) -> Result<Arc<Snapshot>> {
        let current = staleness::inspect_log(&self.config.inputs.match_data)?;
        if let Some(snapshot) = self.try_serve(&current) {
            return Ok(snapshot);
        }

        let _guard = lock(&self.recompute_guard);
        // Another caller may have finished a rebuild while we waited.
        let current = staleness::inspect_log(&self.config.inputs.match_data)?;
        if let Some(snapshot) = self.try_serve(&current) {
            return Ok(snapshot);
        }
        self.rebuild()
    }

    fn try_serve(&self, current: &CurrentLog) -> Option<Arc<Snapshot>> {
        // Held until the snapshot is built so a concurrent save cannot swap
        // files between the individual loads.
        let _artifacts = self.artifacts.read().unwrap_or_else(PoisonError::into_inner);
        let stored = self.store.load_stored_state();
        let validity = staleness::check(current, &stored, self.config.staleness);
        if !validity.is_valid() {
            info!(%validity, "cached stats need a recompute");
            return None;
        }

        if let Some(snapshot) = self.snapshot()
            && snapshot.matches_stored(&stored)
        {
            debug!(marker = ?snapshot.marker, "serving in-memory stats");
            return Some(snapshot);
        }

        match self.load_from_disk(stored) {
            Ok(Some(snapshot)) => Some(self.install(snapshot)),
            Ok(None) => None,
            Err(err) => {
                warn!(%err, "cached stats unreadable, recomputing");
                None
            }
        }
    }

    fn load_from_disk(&self, stored: StoredState) -> Result<Option<Snapshot>> {
        let Some(stats) = self.store.load_stats()? else {
            return Ok(None);
        };
        let Some(form) = self.store.load_form()? else {
            return Ok(None);
        };
        debug!(players = stats.len(), "loaded cached stats from disk");
        Ok(Some(Snapshot {
            stats,
            form,
            marker: stored.marker,
            log_digest: stored.digest,
            loaded_at: Utc::now(),
            origin: SnapshotOrigin::Loaded,
        }))
    }

    /// Caller must hold `recompute_guard`.
    fn rebuild(&self) -> Result<Arc<Snapshot>> {
        info!(log = %self.config.inputs.match_data.display(), "recomputing player stats");
        let computed = pipeline::compute(&self.config.inputs)?;
        {
            let _artifacts = self.artifacts.write().unwrap_or_else(PoisonError::into_inner);
            self.store.save(&computed)?;
        }
        Ok(self.install(Snapshot::from_computed(computed)))
    }

    fn install(&self, snapshot: Snapshot) -> Arc<Snapshot> {
        let snapshot = Arc::new(snapshot);
        *self
            .snapshot
            .write()
            .unwrap_or_else(PoisonError::into_inner) = Some(Arc::clone(&snapshot));
        snapshot
    }

    fn note_result(&self, result: &Result<Arc<Snapshot>>) {
        let mut last = lock(&self.last_error);
        match result {
            Ok(_) => *last = None,
            Err(err) => {
                warn!(%err, "stats access failed");
                *last = Some(err.to_string());
            }
        }
    }
}

fn lock<T>(mutex: &Mutex<T>) -> MutexGuard<'_, T> {
    mutex.lock().unwrap_or_else(PoisonError::into_inner)
}
