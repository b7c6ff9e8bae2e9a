//! Owns every task timer and fires the runner on them.
use std::{
    fmt,
    str::FromStr,
    sync::{Arc, Mutex, PoisonError},
    time::Duration,
};

use tracing::{debug, info, instrument};
use warden_model::{EventKind, RunEvent};

use crate::{
    bus::EventBus,
    error::CoreError,
    registry::{TaskDefinition, TaskRegistry},
    runner::TaskRunner,
    state::{StateStore, TaskRuntime},
    timer::{Timer, TimerCallback},
};

/// Instant from which a task's periodic phase is measured.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum PeriodicAnchor {
    /// Ticks at `start + k * interval`, regardless of the stagger.
    ///
    /// With `initial_delay` close to `interval` the staggered first run and the first tick can
    /// fire back to back; the overlap guard only catches it if the first run is still in flight.
    #[default]
    SchedulerStart,
    /// Ticks at `start + initial_delay + k * interval`, one interval after the staggered first run.
    FirstRun,
}

impl PeriodicAnchor {
    fn first_tick(self, def: &TaskDefinition) -> Duration {
        match self {
            PeriodicAnchor::SchedulerStart => def.interval(),
            PeriodicAnchor::FirstRun => def.initial_delay() + def.interval(),
        }
    }
}

impl FromStr for PeriodicAnchor {
    type Err = CoreError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "start" | "scheduler-start" => Ok(PeriodicAnchor::SchedulerStart),
            "first-run" | "first_run" => Ok(PeriodicAnchor::FirstRun),
            _ => Err(CoreError::InvalidConfig(format!(
                "invalid periodic anchor: {s} (expected: start|first-run)"
            ))),
        }
    }
}

impl fmt::Display for PeriodicAnchor {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            PeriodicAnchor::SchedulerStart => f.write_str("start"),
            PeriodicAnchor::FirstRun => f.write_str("first-run"),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Lifecycle {
    Idle,
    Started,
    Stopped,
}

/// Arms one startup timer and one periodic timer per task.
///
/// `start` and `stop` are each effective once; the lifecycle lock makes them mutually exclusive
/// so no timer can be armed after `stop` returns.
pub struct Scheduler {
    timer: Arc<dyn Timer>,
    runner: TaskRunner,
    store: StateStore,
    anchor: PeriodicAnchor,
    bus: EventBus,
    lifecycle: Mutex<Lifecycle>,
}

impl Scheduler {
    pub fn new(timer: Arc<dyn Timer>, store: StateStore, bus: EventBus) -> Self {
        Self {
            timer,
            runner: TaskRunner::new(bus.clone()),
            store,
            anchor: PeriodicAnchor::default(),
            bus,
            lifecycle: Mutex::new(Lifecycle::Idle),
        }
    }

    pub fn with_anchor(mut self, anchor: PeriodicAnchor) -> Self {
        self.anchor = anchor;
        self
    }

    pub fn store(&self) -> &StateStore {
        &self.store
    }

    pub fn is_started(&self) -> bool {
        *self.lifecycle.lock().unwrap_or_else(PoisonError::into_inner) == Lifecycle::Started
    }

    /// Create runtime state for every definition and arm its timers.
    ///
    /// Tasks without a stagger are invoked right away, before their periodic timer is armed.
    #[instrument(level = "debug", skip_all, fields(tasks = registry.len(), anchor = %self.anchor))]
    pub fn start(&self, registry: &TaskRegistry) -> Result<(), CoreError> {
        let mut lifecycle = self.lifecycle.lock().unwrap_or_else(PoisonError::into_inner);
        match *lifecycle {
            Lifecycle::Started => return Err(CoreError::AlreadyStarted),
            Lifecycle::Stopped => return Err(CoreError::Stopped),
            Lifecycle::Idle => {}
        }

        for def in registry.iter() {
            let runtime = Arc::new(TaskRuntime::new(def));
            self.store.insert(Arc::clone(&runtime));

            let fire = self.fire(Arc::clone(def), Arc::clone(&runtime));

            if def.initial_delay_ms() == 0 {
                fire();
            } else {
                let rt = Arc::clone(&runtime);
                let fire_once = Arc::clone(&fire);
                let startup: TimerCallback = Arc::new(move || {
                    rt.clear_startup();
                    fire_once();
                });
                runtime.set_startup(self.timer.schedule_once(def.initial_delay(), startup));
            }

            let first = self.anchor.first_tick(def);
            runtime.set_periodic(self.timer.schedule_every(first, def.interval(), fire));

            debug!(
                task = def.name(),
                interval_ms = def.interval_ms(),
                initial_delay_ms = def.initial_delay_ms(),
                "task scheduled"
            );
            self.bus.publish(
                RunEvent::new(EventKind::TaskScheduled)
                    .with_task(def.name())
                    .with_delay_ms(def.initial_delay_ms()),
            );
        }

        *lifecycle = Lifecycle::Started;
        info!(tasks = registry.len(), "scheduler started");
        self.bus.publish(RunEvent::new(EventKind::SchedulerStarted));
        Ok(())
    }

    /// Cancel every periodic and startup timer.
    ///
    /// Returns `false` if the scheduler was already stopped. Runs in flight are left alone.
    pub fn stop(&self) -> bool {
        let mut lifecycle = self.lifecycle.lock().unwrap_or_else(PoisonError::into_inner);
        if *lifecycle == Lifecycle::Stopped {
            return false;
        }
        *lifecycle = Lifecycle::Stopped;

        let cancelled: usize = self
            .store
            .runtimes()
            .iter()
            .map(|rt| rt.cancel_timers())
            .sum();

        info!(cancelled, "scheduler stopped");
        self.bus.publish(RunEvent::new(EventKind::SchedulerStopped));
        true
    }

    fn fire(&self, def: Arc<TaskDefinition>, runtime: Arc<TaskRuntime>) -> TimerCallback {
        let runner = self.runner.clone();
        Arc::new(move || {
            let (runner, def, runtime) = (runner.clone(), Arc::clone(&def), Arc::clone(&runtime));
            tokio::spawn(async move {
                runner.run(&def, &runtime).await;
            });
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{
        bus::testing::Recorder,
        error::WorkError,
        task::{WorkFn, WorkRef},
        timer::{TimerHandle, TokioTimer},
    };
    use std::sync::atomic::{AtomicUsize, Ordering};
    use tokio::time::Instant;

    /// Work that counts invocations, records their start offsets and sleeps for `busy`.
    fn tracked(busy: Duration, origin: Instant) -> (WorkRef, Arc<Mutex<Vec<Duration>>>) {
        let starts = Arc::new(Mutex::new(Vec::new()));
        let s = Arc::clone(&starts);
        let work = WorkFn::arc(move || {
            let s = Arc::clone(&s);
            async move {
                s.lock().unwrap().push(origin.elapsed());
                tokio::time::sleep(busy).await;
                Ok(())
            }
        });
        (work, starts)
    }

    fn scheduler(recorder: &Arc<Recorder>) -> Scheduler {
        let bus = EventBus::new(vec![recorder.clone()]);
        Scheduler::new(TokioTimer::shared(), StateStore::new(), bus)
    }

    #[tokio::test(start_paused = true)]
    async fn slow_task_skips_overlapping_tick() {
        let origin = Instant::now();
        let (work, starts) = tracked(Duration::from_millis(1500), origin);
        let registry = TaskRegistry::new(vec![TaskDefinition::new("a", work, 1000)]).unwrap();
        let recorder = Arc::new(Recorder::default());
        let sched = scheduler(&recorder);

        sched.start(&registry).unwrap();
        tokio::time::sleep(Duration::from_millis(2100)).await;

        let starts = starts.lock().unwrap().clone();
        assert_eq!(
            starts,
            [Duration::ZERO, Duration::from_millis(2000)],
            "run at t=0, tick at t=1000 skipped, run at t=2000"
        );
        let snap = sched.store().get("a").unwrap();
        assert_eq!(snap.runs, 2);
        assert_eq!(snap.skipped, 1);
        assert_eq!(recorder.count(EventKind::TaskSkipped), 1);
    }

    #[tokio::test(start_paused = true)]
    async fn immediate_task_runs_before_first_tick() {
        let origin = Instant::now();
        let (work, starts) = tracked(Duration::from_millis(10), origin);
        let registry = TaskRegistry::new(vec![TaskDefinition::new("a", work, 1000)]).unwrap();
        let sched = scheduler(&Arc::new(Recorder::default()));

        sched.start(&registry).unwrap();
        tokio::time::sleep(Duration::from_millis(999)).await;
        assert_eq!(starts.lock().unwrap().clone(), [Duration::ZERO]);
    }

    #[tokio::test(start_paused = true)]
    async fn staggered_task_waits_for_its_delay() {
        let origin = Instant::now();
        let (work, starts) = tracked(Duration::from_millis(10), origin);
        let registry = TaskRegistry::new(vec![
            TaskDefinition::new("b", work, 10_000).with_initial_delay_ms(3000),
        ])
        .unwrap();
        let sched = scheduler(&Arc::new(Recorder::default()));

        sched.start(&registry).unwrap();
        tokio::time::sleep(Duration::from_millis(2999)).await;
        assert!(starts.lock().unwrap().is_empty());

        tokio::time::sleep(Duration::from_millis(7100)).await;
        assert_eq!(
            starts.lock().unwrap().clone(),
            [Duration::from_millis(3000), Duration::from_millis(10_000)]
        );
    }

    #[tokio::test(start_paused = true)]
    async fn start_anchor_lets_stagger_and_first_tick_fire_back_to_back() {
        let origin = Instant::now();
        let (work, starts) = tracked(Duration::from_millis(10), origin);
        let registry = TaskRegistry::new(vec![
            TaskDefinition::new("c", work, 1000).with_initial_delay_ms(950),
        ])
        .unwrap();
        let sched = scheduler(&Arc::new(Recorder::default()));

        sched.start(&registry).unwrap();
        tokio::time::sleep(Duration::from_millis(1100)).await;
        assert_eq!(
            starts.lock().unwrap().clone(),
            [Duration::from_millis(950), Duration::from_millis(1000)]
        );
    }

    #[tokio::test(start_paused = true)]
    async fn first_run_anchor_spaces_ticks_after_stagger() {
        let origin = Instant::now();
        let (work, starts) = tracked(Duration::from_millis(10), origin);
        let registry = TaskRegistry::new(vec![
            TaskDefinition::new("c", work, 1000).with_initial_delay_ms(950),
        ])
        .unwrap();
        let sched = scheduler(&Arc::new(Recorder::default())).with_anchor(PeriodicAnchor::FirstRun);

        sched.start(&registry).unwrap();
        tokio::time::sleep(Duration::from_millis(2000)).await;
        assert_eq!(
            starts.lock().unwrap().clone(),
            [Duration::from_millis(950), Duration::from_millis(1950)]
        );
    }

    #[tokio::test(start_paused = true)]
    async fn failing_task_stays_scheduled() {
        let calls = Arc::new(AtomicUsize::new(0));
        let c = Arc::clone(&calls);
        let work = WorkFn::arc(move || {
            let c = Arc::clone(&c);
            async move {
                c.fetch_add(1, Ordering::SeqCst);
                Err(WorkError::fail("rss feed malformed"))
            }
        });
        let registry = TaskRegistry::new(vec![TaskDefinition::new("rss", work, 1000)]).unwrap();
        let sched = scheduler(&Arc::new(Recorder::default()));

        sched.start(&registry).unwrap();
        tokio::time::sleep(Duration::from_millis(10)).await;
        let snap = sched.store().get("rss").unwrap();
        assert!(!snap.running);
        assert_eq!(snap.last_error.as_deref(), Some("rss feed malformed"));

        tokio::time::sleep(Duration::from_millis(2000)).await;
        assert_eq!(calls.load(Ordering::SeqCst), 3);
    }

    #[tokio::test(start_paused = true)]
    async fn one_failing_task_does_not_affect_another() {
        let bad = WorkFn::arc(|| async { Err(WorkError::fail("down")) });
        let good = WorkFn::arc(|| async { Ok(()) });
        let registry = TaskRegistry::new(vec![
            TaskDefinition::new("bad", bad, 1000),
            TaskDefinition::new("good", good, 1000),
        ])
        .unwrap();
        let sched = scheduler(&Arc::new(Recorder::default()));

        sched.start(&registry).unwrap();
        tokio::time::sleep(Duration::from_millis(1500)).await;

        let snap = sched.store().snapshot();
        assert!(snap["bad"].last_error.is_some());
        assert!(snap["good"].last_error.is_none());
        assert!(snap["good"].last_run.is_some());
        assert_eq!(snap["good"].runs, 2);
    }

    #[tokio::test(start_paused = true)]
    async fn stop_cancels_all_timers_once() {
        let origin = Instant::now();
        let (work_a, starts_a) = tracked(Duration::from_millis(10), origin);
        let (work_b, starts_b) = tracked(Duration::from_millis(10), origin);
        let registry = TaskRegistry::new(vec![
            TaskDefinition::new("a", work_a, 1000),
            TaskDefinition::new("b", work_b, 1000).with_initial_delay_ms(500),
        ])
        .unwrap();
        let recorder = Arc::new(Recorder::default());
        let sched = scheduler(&recorder);

        sched.start(&registry).unwrap();
        tokio::time::sleep(Duration::from_millis(100)).await;

        assert!(sched.stop());
        assert!(!sched.stop());
        tokio::time::sleep(Duration::from_secs(10)).await;

        assert_eq!(starts_a.lock().unwrap().len(), 1);
        assert!(starts_b.lock().unwrap().is_empty());
        assert_eq!(recorder.count(EventKind::SchedulerStopped), 1);
    }

    #[tokio::test(start_paused = true)]
    async fn startup_handle_is_discarded_after_firing() {
        let (work, _starts) = tracked(Duration::from_millis(1), Instant::now());
        let registry = TaskRegistry::new(vec![
            TaskDefinition::new("b", work, 10_000).with_initial_delay_ms(200),
        ])
        .unwrap();
        let sched = scheduler(&Arc::new(Recorder::default()));
        sched.start(&registry).unwrap();

        let rt = sched.store().runtimes().remove(0);
        assert!(rt.has_startup_timer());
        tokio::time::sleep(Duration::from_millis(300)).await;
        assert!(!rt.has_startup_timer());
    }

    #[tokio::test]
    async fn start_is_effective_once() {
        let registry = TaskRegistry::new(Vec::new()).unwrap();
        let sched = scheduler(&Arc::new(Recorder::default()));

        sched.start(&registry).unwrap();
        assert!(matches!(sched.start(&registry), Err(CoreError::AlreadyStarted)));
        assert!(sched.is_started());

        sched.stop();
        assert!(matches!(sched.start(&registry), Err(CoreError::Stopped)));
    }

    /// Timer that never fires and only remembers what was asked of it.
    #[derive(Default)]
    struct ManualTimer {
        handles: Mutex<Vec<TimerHandle>>,
    }

    impl ManualTimer {
        fn issue(&self) -> TimerHandle {
            let handle = TimerHandle::new(tokio_util::sync::CancellationToken::new());
            self.handles.lock().unwrap().push(handle.clone());
            handle
        }
    }

    impl Timer for ManualTimer {
        fn schedule_once(&self, _delay: Duration, _cb: TimerCallback) -> TimerHandle {
            self.issue()
        }

        fn schedule_every(&self, _first: Duration, _period: Duration, _cb: TimerCallback) -> TimerHandle {
            self.issue()
        }
    }

    #[tokio::test]
    async fn one_periodic_and_at_most_one_startup_timer_per_task() {
        let timer = Arc::new(ManualTimer::default());
        let sched = Scheduler::new(timer.clone(), StateStore::new(), EventBus::default());
        let noop = || WorkFn::arc(|| async { Ok(()) });
        let registry = TaskRegistry::new(vec![
            TaskDefinition::new("now", noop(), 1000),
            TaskDefinition::new("later", noop(), 1000).with_initial_delay_ms(10),
        ])
        .unwrap();

        sched.start(&registry).unwrap();
        assert_eq!(timer.handles.lock().unwrap().len(), 3);

        sched.stop();
        assert!(timer.handles.lock().unwrap().iter().all(TimerHandle::is_cancelled));
    }
}
