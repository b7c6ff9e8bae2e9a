use std::{
    collections::{BTreeMap, HashMap},
    sync::{
        Arc, Mutex, MutexGuard, PoisonError, RwLock,
        atomic::{AtomicBool, Ordering},
    },
    time::SystemTime,
};

use warden_model::{DurationMs, TaskName, TaskSnapshot};

use crate::{registry::TaskDefinition, timer::TimerHandle};

/// Outcome bookkeeping of one task.
#[derive(Debug, Clone, Default)]
struct RunRecord {
    last_run_at: Option<SystemTime>,
    last_error: Option<String>,
    runs: u64,
    failures: u64,
    skipped: u64,
}

/// Runtime state of one scheduled task.
///
/// Created by the scheduler at start. The run record is written only by this task's own runner
/// invocations; timer handles are written by the scheduler and cancelled at shutdown.
pub struct TaskRuntime {
    name: TaskName,
    interval_ms: DurationMs,
    initial_delay_ms: DurationMs,
    running: AtomicBool,
    record: RwLock<RunRecord>,
    periodic: Mutex<Option<TimerHandle>>,
    startup: Mutex<Option<TimerHandle>>,
}

/// Overlap guard held for the duration of one invocation.
///
/// Dropping it clears the `running` flag, whatever way the invocation ended.
pub struct RunGuard<'a> {
    running: &'a AtomicBool,
}

impl Drop for RunGuard<'_> {
    fn drop(&mut self) {
        self.running.store(false, Ordering::Release);
    }
}

impl TaskRuntime {
    pub fn new(def: &TaskDefinition) -> Self {
        Self {
            name: def.name().to_string(),
            interval_ms: def.interval_ms(),
            initial_delay_ms: def.initial_delay_ms(),
            running: AtomicBool::new(false),
            record: RwLock::new(RunRecord::default()),
            periodic: Mutex::new(None),
            startup: Mutex::new(None),
        }
    }

    #[inline]
    pub fn name(&self) -> &str {
        &self.name
    }

    #[inline]
    pub fn is_running(&self) -> bool {
        self.running.load(Ordering::Acquire)
    }

    /// Claim the task for one invocation.
    ///
    /// Returns `None` if an invocation is already in flight.
    pub fn try_begin(&self) -> Option<RunGuard<'_>> {
        self.running
            .compare_exchange(false, true, Ordering::AcqRel, Ordering::Acquire)
            .ok()?;
        self.write_record().runs += 1;
        Some(RunGuard {
            running: &self.running,
        })
    }

    pub(crate) fn record_success(&self, at: SystemTime) {
        let mut record = self.write_record();
        record.last_run_at = Some(at);
        record.last_error = None;
    }

    pub(crate) fn record_failure(&self, message: String) {
        let mut record = self.write_record();
        record.last_error = Some(message);
        record.failures += 1;
    }

    pub(crate) fn record_skip(&self) {
        self.write_record().skipped += 1;
    }

    pub(crate) fn set_periodic(&self, handle: TimerHandle) {
        if let Some(previous) = lock(&self.periodic).replace(handle) {
            previous.cancel();
        }
    }

    pub(crate) fn set_startup(&self, handle: TimerHandle) {
        if let Some(previous) = lock(&self.startup).replace(handle) {
            previous.cancel();
        }
    }

    /// Forget the startup timer once it has fired.
    pub(crate) fn clear_startup(&self) {
        lock(&self.startup).take();
    }

    pub(crate) fn has_startup_timer(&self) -> bool {
        lock(&self.startup).is_some()
    }

    /// Cancel both timers. Returns how many handles were still armed.
    pub(crate) fn cancel_timers(&self) -> usize {
        [lock(&self.periodic).take(), lock(&self.startup).take()]
            .into_iter()
            .flatten()
            .map(|handle| handle.cancel())
            .count()
    }

    pub fn snapshot(&self) -> TaskSnapshot {
        let record = self.record.read().unwrap_or_else(PoisonError::into_inner);
        TaskSnapshot {
            running: self.is_running(),
            last_run: record.last_run_at,
            last_error: record.last_error.clone(),
            runs: record.runs,
            failures: record.failures,
            skipped: record.skipped,
            interval_ms: self.interval_ms,
            initial_delay_ms: self.initial_delay_ms,
        }
    }

    fn write_record(&self) -> std::sync::RwLockWriteGuard<'_, RunRecord> {
        self.record.write().unwrap_or_else(PoisonError::into_inner)
    }
}

fn lock<T>(m: &Mutex<T>) -> MutexGuard<'_, T> {
    m.lock().unwrap_or_else(PoisonError::into_inner)
}

/// In-memory store of per-task runtime state.
#[derive(Clone, Default)]
pub struct StateStore {
    inner: Arc<RwLock<StateStoreInner>>,
}

#[derive(Default)]
struct StateStoreInner {
    /// Runtimes indexed by task name.
    tasks: HashMap<TaskName, Arc<TaskRuntime>>,
    /// Registry order, for iteration.
    order: Vec<TaskName>,
}

impl StateStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub(crate) fn insert(&self, runtime: Arc<TaskRuntime>) {
        let mut inner = self.inner.write().unwrap_or_else(PoisonError::into_inner);
        let name = runtime.name().to_string();
        if inner.tasks.insert(name.clone(), runtime).is_none() {
            inner.order.push(name);
        }
    }

    /// Snapshot of a single task.
    pub fn get(&self, name: &str) -> Option<TaskSnapshot> {
        let inner = self.inner.read().unwrap_or_else(PoisonError::into_inner);
        inner.tasks.get(name).map(|rt| rt.snapshot())
    }

    /// Point-in-time copy of every task's state. No side effects.
    pub fn snapshot(&self) -> BTreeMap<TaskName, TaskSnapshot> {
        let inner = self.inner.read().unwrap_or_else(PoisonError::into_inner);
        inner
            .tasks
            .iter()
            .map(|(name, rt)| (name.clone(), rt.snapshot()))
            .collect()
    }

    pub(crate) fn runtimes(&self) -> Vec<Arc<TaskRuntime>> {
        let inner = self.inner.read().unwrap_or_else(PoisonError::into_inner);
        inner
            .order
            .iter()
            .filter_map(|name| inner.tasks.get(name).cloned())
            .collect()
    }

    pub fn len(&self) -> usize {
        self.inner
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .tasks
            .len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}
