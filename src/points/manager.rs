use super::record::PointRecord;
use super::threshold::{Crossing, Threshold};
use crate::ActorId;
use crate::action::{Action, ActionEnv};
use crate::cache::MuteList;
use crate::context::EvaluationContext;
use crate::host::Host;
use chrono::Utc;
use std::collections::HashMap;
use std::fmt;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::mpsc::{self, RecvTimeoutError};
use std::sync::{Arc, Mutex, MutexGuard, PoisonError, RwLock};
use std::thread::{self, JoinHandle};
use std::time::Duration;

type RecordHandle = Arc<Mutex<PointRecord>>;

/// Owns every point record and the decay worker.
pub struct PointManager {
    inner: Arc<Inner>,
    worker: Mutex<Option<Worker>>,
}

struct Worker {
    stop: mpsc::Sender<()>,
    handle: JoinHandle<()>,
}

struct Inner {
    records: Mutex<HashMap<ActorId, RecordHandle>>,
    /// Sorted by level.
    thresholds: RwLock<Vec<Arc<Threshold>>>,
    leak_amount: f64,
    host: Arc<dyn Host>,
    mutes: Arc<MuteList>,
    enabled: AtomicBool,
}

impl PointManager {
    /// Start a manager with a decay worker ticking every `leak_interval_secs`
    /// (at least one second).
    pub fn setup(leak_amount: f64, leak_interval_secs: u64, host: Arc<dyn Host>, mutes: Arc<MuteList>) -> Self {
        let manager = Self::manual(leak_amount, host, mutes);
        let interval = Duration::from_secs(leak_interval_secs.max(1));
        let (stop, stopped) = mpsc::channel::<()>();
        let inner = Arc::clone(&manager.inner);

        let spawned = thread::Builder::new().name("chatsieve-decay".into()).spawn(move || {
            loop {
                match stopped.recv_timeout(interval) {
                    Err(RecvTimeoutError::Timeout) => inner.decay_tick(),
                    Ok(()) | Err(RecvTimeoutError::Disconnected) => break,
                }
            }
            tracing::debug!("decay worker stopped");
        });
        match spawned {
            Ok(handle) => {
                tracing::info!(leak = leak_amount, interval_secs = interval.as_secs(), "point decay started");
                *manager.worker.lock().unwrap_or_else(PoisonError::into_inner) = Some(Worker { stop, handle });
            }
            Err(error) => tracing::warn!(%error, "could not start decay worker; scores will not decay on their own"),
        }
        manager
    }

    /// A manager without a worker; the host calls [`decay_tick`](Self::decay_tick).
    pub fn manual(leak_amount: f64, host: Arc<dyn Host>, mutes: Arc<MuteList>) -> Self {
        PointManager {
            inner: Arc::new(Inner {
                records: Mutex::new(HashMap::new()),
                thresholds: RwLock::new(Vec::new()),
                leak_amount: leak_amount.max(0.0),
                host,
                mutes,
                enabled: AtomicBool::new(true),
            }),
            worker: Mutex::new(None),
        }
    }

    pub fn is_enabled(&self) -> bool {
        self.inner.enabled.load(Ordering::Acquire)
    }

    pub fn leak_amount(&self) -> f64 {
        self.inner.leak_amount
    }

    /// Add (or replace, by name) a threshold.
    pub fn add_threshold(&self, name: impl Into<String>, level: f64, ascending: Vec<Action>, descending: Vec<Action>) {
        let threshold = Arc::new(Threshold::new(name, level, ascending, descending));
        let mut thresholds = self.inner.thresholds.write().unwrap_or_else(PoisonError::into_inner);
        thresholds.retain(|t| t.name() != threshold.name());
        let at = thresholds.partition_point(|t| t.level() <= threshold.level());
        tracing::debug!(threshold = threshold.name(), level, "threshold registered");
        thresholds.insert(at, threshold);
    }

    pub fn thresholds(&self) -> Vec<Arc<Threshold>> {
        self.inner.thresholds.read().unwrap_or_else(PoisonError::into_inner).clone()
    }

    /// Adjust `actor`'s score by `delta`, firing any crossed thresholds.
    /// Returns the new score (0 while disabled).
    pub fn add_points(&self, actor: &ActorId, delta: f64) -> f64 {
        if !self.is_enabled() {
            return 0.0;
        }
        let handle = self.inner.handle(actor);
        let (score, crossings) = {
            let mut record = lock(&handle);
            let score = record.apply(delta);
            (score, record.crossings(&self.inner.sorted_thresholds()))
        };
        drop(handle);
        tracing::debug!(actor = %actor, delta, score, "points adjusted");
        self.inner.fire(actor, crossings);
        score
    }

    pub fn current_score(&self, actor: &ActorId) -> f64 {
        self.inner.existing(actor).map_or(0.0, |handle| lock(&handle).score())
    }

    /// Snapshot of `actor`'s record, if one exists.
    pub fn record(&self, actor: &ActorId) -> Option<PointRecord> {
        self.inner.existing(actor).map(|handle| lock(&handle).clone())
    }

    pub fn tracked_actors(&self) -> usize {
        self.inner.records_lock().len()
    }

    /// Decay every score by the leak amount once, then prune idle records.
    pub fn decay_tick(&self) {
        if self.is_enabled() {
            self.inner.decay_tick();
        }
    }

    /// Stop the worker and drop all records. Idempotent.
    pub fn shutdown(&self) {
        self.inner.enabled.store(false, Ordering::Release);
        let worker = self.worker.lock().unwrap_or_else(PoisonError::into_inner).take();
        if let Some(Worker { stop, handle }) = worker {
            let _ = stop.send(());
            if handle.join().is_err() {
                tracing::warn!("decay worker panicked");
            }
            tracing::info!("point decay stopped");
        }
        self.inner.records_lock().clear();
    }
}

impl Drop for PointManager {
    fn drop(&mut self) {
        self.shutdown();
    }
}

impl fmt::Debug for PointManager {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("PointManager")
            .field("enabled", &self.is_enabled())
            .field("leak_amount", &self.inner.leak_amount)
            .field("tracked_actors", &self.tracked_actors())
            .finish()
    }
}

impl Inner {
    fn records_lock(&self) -> MutexGuard<'_, HashMap<ActorId, RecordHandle>> {
        self.records.lock().unwrap_or_else(PoisonError::into_inner)
    }

    fn sorted_thresholds(&self) -> Vec<Arc<Threshold>> {
        self.thresholds.read().unwrap_or_else(PoisonError::into_inner).clone()
    }

    /// Existing or fresh record handle. The map lock is released on return.
    fn handle(&self, actor: &ActorId) -> RecordHandle {
        let mut records = self.records_lock();
        Arc::clone(records.entry(actor.clone()).or_insert_with(|| Arc::new(Mutex::new(PointRecord::new(actor.clone())))))
    }

    fn existing(&self, actor: &ActorId) -> Option<RecordHandle> {
        self.records_lock().get(actor).cloned()
    }

    fn decay_tick(&self) {
        if !self.enabled.load(Ordering::Acquire) {
            return;
        }
        let now = Utc::now();
        let thresholds = self.sorted_thresholds();
        let handles: Vec<(ActorId, RecordHandle)> =
            self.records_lock().iter().map(|(actor, handle)| (actor.clone(), Arc::clone(handle))).collect();

        for (actor, handle) in handles {
            let crossings = {
                let mut record = lock(&handle);
                if record.score() <= 0.0 {
                    continue;
                }
                record.decay(self.leak_amount, now);
                record.crossings(&thresholds)
            };
            drop(handle);
            self.fire(&actor, crossings);
        }

        // Only the map holds an unreferenced handle, and new references can
        // only be taken under the map lock held here.
        let mut records = self.records_lock();
        let before = records.len();
        records.retain(|_, handle| Arc::strong_count(handle) > 1 || !lock(handle).is_idle());
        let pruned = before - records.len();
        if pruned > 0 {
            tracing::debug!(pruned, remaining = records.len(), "pruned idle point records");
        }
    }

    fn fire(&self, actor: &ActorId, crossings: Vec<(Arc<Threshold>, Crossing)>) {
        for (threshold, crossing) in crossings {
            tracing::info!(actor = %actor, threshold = threshold.name(), level = threshold.level(), ?crossing, "threshold crossed");
            let mut ctx = EvaluationContext::new(actor.clone(), "", "POINTS");
            let env = ActionEnv::new(self.host.as_ref()).with_mutes(&self.mutes);
            for action in threshold.actions(crossing) {
                let outcome = action.execute(&mut ctx, &env, None);
                if let Some(failure) = outcome.failure {
                    tracing::warn!(actor = %actor, threshold = threshold.name(), action = action.keyword(), %failure, "threshold action failed");
                }
            }
            for entry in ctx.log_entries() {
                tracing::info!(target: "chatsieve::rules", "{entry}");
            }
        }
    }
}

fn lock(handle: &RecordHandle) -> MutexGuard<'_, PointRecord> {
    handle.lock().unwrap_or_else(PoisonError::into_inner)
}
