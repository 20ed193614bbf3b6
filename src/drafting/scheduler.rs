use parking_lot::Mutex;
use rayon::{ThreadPool, ThreadPoolBuilder};
use std::any::Any;
use std::cmp::Reverse;
use std::collections::{HashMap, HashSet};
use std::panic::{self, AssertUnwindSafe};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{mpsc, Arc};
use std::time::Instant;
use tracing::{debug, error, info};

use super::types::{
    DraftItem, DraftResult, DraftTask, DraftingConfig, SchedulerProgress, SchedulingStatistics,
    TaskState,
};
use super::worker::DraftWorker;
use crate::utils::{PaperGenError, Result};

/// Progress callback: `(task_id, completed / total)`
pub type ProgressCallback = Box<dyn Fn(&str, f64) + Send + Sync>;

/// Cooperative cancellation for a scheduling run
///
/// Tasks that have not started when the token fires are recorded as failed
/// with the message `cancelled`. Tasks already running finish normally.
#[derive(Debug, Clone, Default)]
pub struct CancellationToken {
    cancelled: Arc<AtomicBool>,
}

impl CancellationToken {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn cancel(&self) {
        self.cancelled.store(true, Ordering::SeqCst);
    }

    pub fn is_cancelled(&self) -> bool {
        self.cancelled.load(Ordering::SeqCst)
    }
}

/// Shared bookkeeping for the run in progress
#[derive(Debug, Default)]
struct RunState {
    states: HashMap<String, TaskState>,
    results: HashMap<String, DraftResult>,
    progress: SchedulerProgress,
}

/// Runs independent draft tasks on a bounded worker pool
///
/// Tasks are submitted in descending priority order to a FIFO queue, so
/// priority biases start order only; completion order is whatever the workers
/// produce. Each task's error or panic is contained at the task boundary.
pub struct DraftScheduler {
    pool: ThreadPool,
    max_workers: usize,
    progress_callback: Option<ProgressCallback>,
    cancellation: CancellationToken,
    run: Mutex<RunState>,
    last_completed: Mutex<HashMap<String, DraftResult>>,
    /// One `schedule` call at a time per scheduler
    exclusive: Mutex<()>,
}

impl DraftScheduler {
    /// Create a scheduler with `max_workers` worker threads
    pub fn new(max_workers: usize) -> Result<Self> {
        if max_workers == 0 {
            return Err(PaperGenError::Config("max_workers must be at least 1".to_string()));
        }

        let pool = ThreadPoolBuilder::new()
            .num_threads(max_workers)
            .thread_name(|index| format!("draft-worker-{}", index))
            .build()?;

        Ok(Self {
            pool,
            max_workers,
            progress_callback: None,
            cancellation: CancellationToken::new(),
            run: Mutex::new(RunState::default()),
            last_completed: Mutex::new(HashMap::new()),
            exclusive: Mutex::new(()),
        })
    }

    pub fn from_config(config: &DraftingConfig) -> Result<Self> {
        Self::new(config.max_workers)
    }

    /// Invoke `callback` once per scheduled task as it finishes
    pub fn with_progress_callback<F>(mut self, callback: F) -> Self
    where
        F: Fn(&str, f64) + Send + Sync + 'static,
    {
        self.progress_callback = Some(Box::new(callback));
        self
    }

    pub fn with_cancellation(mut self, token: CancellationToken) -> Self {
        self.cancellation = token;
        self
    }

    pub fn cancellation_token(&self) -> CancellationToken {
        self.cancellation.clone()
    }

    pub fn max_workers(&self) -> usize {
        self.max_workers
    }

    /// Run every task and return exactly one result per task id
    ///
    /// With `skip_existing`, tasks the worker reports as already drafted are
    /// recorded as skipped and never run.
    pub fn schedule<S, W>(
        &self,
        tasks: Vec<DraftTask<S>>,
        worker: &W,
        skip_existing: bool,
    ) -> Result<HashMap<String, DraftResult>>
    where
        S: DraftItem,
        W: DraftWorker<S> + ?Sized,
    {
        let _exclusive = self.exclusive.lock();
        ensure_unique_ids(&tasks)?;

        let mut skipped = Vec::new();
        let mut pending = Vec::with_capacity(tasks.len());
        for task in tasks {
            if skip_existing && worker.already_drafted(task.id()) {
                info!("Skipping {} (already drafted)", task.id());
                skipped.push(DraftResult::skipped(task.id()));
            } else {
                pending.push(task);
            }
        }

        // Stable sort: equal priorities keep submission order
        pending.sort_by_key(|task| Reverse(task.priority));

        let total = pending.len();
        self.begin_run(skipped, &pending);

        if total == 0 {
            info!("No sections to draft");
            return Ok(self.finish_run());
        }

        info!(
            "Starting parallel drafting of {} sections with {} workers",
            total, self.max_workers
        );

        // Jobs go to the pool's global FIFO queue; this thread collects results
        self.pool.in_place_scope_fifo(|scope| {
            let (tx, rx) = mpsc::channel();

            for task in pending {
                let tx = tx.clone();
                scope.spawn_fifo(move |_| {
                    let result = self.run_task(&task, worker);
                    // The receiver lives until every job has reported
                    let _ = tx.send(result);
                });
            }
            drop(tx);

            for result in rx {
                self.record(result);
            }
        });

        Ok(self.finish_run())
    }

    /// Statistics over the most recent completed run
    pub fn statistics(&self) -> SchedulingStatistics {
        SchedulingStatistics::from_results(&self.last_completed.lock())
    }

    /// Counters for the run in progress (or the last one, once finished)
    pub fn progress(&self) -> SchedulerProgress {
        self.run.lock().progress
    }

    pub fn task_state(&self, id: &str) -> Option<TaskState> {
        self.run.lock().states.get(id).copied()
    }

    fn begin_run<S: DraftItem>(&self, skipped: Vec<DraftResult>, pending: &[DraftTask<S>]) {
        let mut run = self.run.lock();
        *run = RunState::default();

        for result in skipped {
            run.states.insert(result.id.clone(), TaskState::Skipped);
            run.results.insert(result.id.clone(), result);
        }
        for task in pending {
            run.states.insert(task.id().to_string(), TaskState::Queued);
        }

        run.progress = SchedulerProgress {
            total: pending.len(),
            queued: pending.len(),
            running: 0,
            completed: 0,
        };
    }

    fn finish_run(&self) -> HashMap<String, DraftResult> {
        let results = self.run.lock().results.clone();
        *self.last_completed.lock() = results.clone();
        results
    }

    fn mark_running(&self, id: &str) {
        let mut run = self.run.lock();
        run.states.insert(id.to_string(), TaskState::Running);
        run.progress.queued = run.progress.queued.saturating_sub(1);
        run.progress.running += 1;
    }

    /// Record a finished task, then report progress outside the lock
    ///
    /// Only the collecting thread calls this, so the callback sees completed
    /// counts in order.
    fn record(&self, result: DraftResult) {
        let progress = {
            let mut run = self.run.lock();
            let current = run.states.get(&result.id).copied();
            // A task finishes once; a second report must not move the counters
            if current.is_some_and(TaskState::is_terminal) {
                debug!("Ignoring repeated result for {}", result.id);
                return;
            }
            let was_running = current == Some(TaskState::Running);
            if was_running {
                run.progress.running = run.progress.running.saturating_sub(1);
            } else {
                run.progress.queued = run.progress.queued.saturating_sub(1);
            }
            run.progress.completed += 1;
            run.states.insert(result.id.clone(), result.state);
            run.results.insert(result.id.clone(), result.clone());
            run.progress
        };

        if result.succeeded {
            info!(
                "Completed {} ({}/{}) in {:.1}s",
                result.id, progress.completed, progress.total, result.duration_seconds
            );
        } else {
            error!(
                "Failed {}: {}",
                result.id,
                result.error_message.as_deref().unwrap_or("unknown error")
            );
        }

        if let Some(callback) = &self.progress_callback {
            callback(&result.id, progress.fraction());
        }
    }

    fn run_task<S, W>(&self, task: &DraftTask<S>, worker: &W) -> DraftResult
    where
        S: DraftItem,
        W: DraftWorker<S> + ?Sized,
    {
        let id = task.id();
        if self.cancellation.is_cancelled() {
            debug!("Not starting {} (cancelled)", id);
            return DraftResult::cancelled(id);
        }

        self.mark_running(id);
        debug!("Starting draft for {}", id);

        let start = Instant::now();
        let outcome = panic::catch_unwind(AssertUnwindSafe(|| worker.draft(task)));
        let duration = start.elapsed().as_secs_f64();

        match outcome {
            Ok(Ok(output)) => DraftResult::success(id, output, duration),
            Ok(Err(err)) => {
                let message = format!("{:#}", err);
                error!("Error drafting {}: {}", id, message);
                DraftResult::failure(id, message, duration)
            }
            Err(payload) => {
                let message = format!("panicked: {}", panic_message(payload.as_ref()));
                error!("Error drafting {}: {}", id, message);
                DraftResult::failure(id, message, duration)
            }
        }
    }
}

fn ensure_unique_ids<S: DraftItem>(tasks: &[DraftTask<S>]) -> Result<()> {
    let mut seen = HashSet::with_capacity(tasks.len());
    for task in tasks {
        if !seen.insert(task.id()) {
            return Err(PaperGenError::DuplicateTask(task.id().to_string()));
        }
    }
    Ok(())
}

fn panic_message(payload: &(dyn Any + Send)) -> String {
    if let Some(message) = payload.downcast_ref::<&str>() {
        message.to_string()
    } else if let Some(message) = payload.downcast_ref::<String>() {
        message.clone()
    } else {
        "unknown panic".to_string()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::drafting::types::Section;
    use anyhow::bail;
    use pretty_assertions::assert_eq;
    use std::sync::atomic::AtomicUsize;
    use std::time::Duration;

    #[derive(Default)]
    struct RecordingWorker {
        existing: HashSet<String>,
        failing: HashSet<String>,
        panicking: HashSet<String>,
        delay: Duration,
        calls: Mutex<Vec<String>>,
        active: AtomicUsize,
        peak: AtomicUsize,
        cancel_after_first: Option<CancellationToken>,
    }

    impl DraftWorker<Section> for RecordingWorker {
        fn draft(&self, task: &DraftTask<Section>) -> anyhow::Result<String> {
            let now_active = self.active.fetch_add(1, Ordering::SeqCst) + 1;
            self.peak.fetch_max(now_active, Ordering::SeqCst);
            self.calls.lock().push(task.id().to_string());

            std::thread::sleep(self.delay);
            self.active.fetch_sub(1, Ordering::SeqCst);

            if let Some(token) = &self.cancel_after_first {
                token.cancel();
            }
            if self.panicking.contains(task.id()) {
                panic!("worker blew up on {}", task.id());
            }
            if self.failing.contains(task.id()) {
                bail!("API error");
            }
            Ok(format!("Content for {}", task.id()))
        }

        fn already_drafted(&self, id: &str) -> bool {
            self.existing.contains(id)
        }
    }

    fn tasks(ids: &[&str]) -> Vec<DraftTask<Section>> {
        ids.iter()
            .map(|id| DraftTask::new(Section::new(*id, id.to_uppercase()), "Research"))
            .collect()
    }

    fn set(ids: &[&str]) -> HashSet<String> {
        ids.iter().map(|id| id.to_string()).collect()
    }

    #[test]
    fn test_empty_task_list() {
        let scheduler = DraftScheduler::new(3).unwrap();
        let results = scheduler
            .schedule(Vec::new(), &RecordingWorker::default(), true)
            .unwrap();

        assert!(results.is_empty());
        assert_eq!(scheduler.statistics(), SchedulingStatistics::default());
    }

    #[test]
    fn test_zero_workers_rejected() {
        assert!(matches!(DraftScheduler::new(0), Err(PaperGenError::Config(_))));
    }

    #[test]
    fn test_one_result_per_task_for_any_pool_size() {
        let ids: Vec<String> = (0..12).map(|i| format!("s{}", i)).collect();
        let id_refs: Vec<&str> = ids.iter().map(String::as_str).collect();

        for workers in [1, 2, 5, 16] {
            let scheduler = DraftScheduler::new(workers).unwrap();
            let worker = RecordingWorker::default();
            let results = scheduler.schedule(tasks(&id_refs), &worker, false).unwrap();

            assert_eq!(results.len(), 12);
            for id in &ids {
                assert_eq!(results[id].id, *id);
                assert!(results[id].succeeded);
            }
        }
    }

    #[test]
    fn test_failure_is_isolated() {
        let scheduler = DraftScheduler::new(2).unwrap();
        let worker = RecordingWorker {
            failing: set(&["methods"]),
            ..Default::default()
        };

        let results = scheduler
            .schedule(tasks(&["intro", "methods", "results"]), &worker, false)
            .unwrap();

        assert!(results["intro"].succeeded);
        assert!(results["results"].succeeded);
        assert!(!results["methods"].succeeded);
        assert!(results["methods"].output.is_none());
        assert!(results["methods"]
            .error_message
            .as_deref()
            .unwrap()
            .contains("API error"));
    }

    #[test]
    fn test_panic_is_isolated() {
        let scheduler = DraftScheduler::new(2).unwrap();
        let worker = RecordingWorker {
            panicking: set(&["intro"]),
            ..Default::default()
        };

        let results = scheduler
            .schedule(tasks(&["intro", "methods"]), &worker, false)
            .unwrap();

        assert!(!results["intro"].succeeded);
        assert!(results["intro"]
            .error_message
            .as_deref()
            .unwrap()
            .contains("worker blew up"));
        assert!(results["methods"].succeeded);
    }

    #[test]
    fn test_skip_existing() {
        let calls = Arc::new(Mutex::new(Vec::new()));
        let seen = Arc::clone(&calls);
        let scheduler = DraftScheduler::new(2)
            .unwrap()
            .with_progress_callback(move |id, _| seen.lock().push(id.to_string()));
        let worker = RecordingWorker {
            existing: set(&["intro", "abstract"]),
            ..Default::default()
        };

        let results = scheduler
            .schedule(tasks(&["abstract", "intro", "methods"]), &worker, true)
            .unwrap();

        assert_eq!(results.len(), 3);
        for id in ["abstract", "intro"] {
            assert!(results[id].succeeded);
            assert_eq!(
                results[id].error_message.as_deref(),
                Some("skipped (already exists)")
            );
        }
        assert_eq!(*worker.calls.lock(), vec!["methods".to_string()]);
        // Progress only reports scheduled tasks
        assert_eq!(*calls.lock(), vec!["methods".to_string()]);

        let stats = scheduler.statistics();
        assert_eq!(stats.skipped, 2);
        assert_eq!(stats.successful, 1);
    }

    #[test]
    fn test_existing_drafts_ignored_without_skip() {
        let scheduler = DraftScheduler::new(2).unwrap();
        let worker = RecordingWorker {
            existing: set(&["intro"]),
            ..Default::default()
        };

        let results = scheduler.schedule(tasks(&["intro"]), &worker, false).unwrap();
        assert_eq!(results["intro"].output.as_deref(), Some("Content for intro"));
    }

    #[test]
    fn test_single_worker_runs_in_priority_order() {
        let scheduler = DraftScheduler::new(1).unwrap();
        let worker = RecordingWorker::default();
        let tasks = vec![
            DraftTask::new(Section::new("low", "Low"), "R").with_priority(1),
            DraftTask::new(Section::new("high", "High"), "R").with_priority(10),
            DraftTask::new(Section::new("tie-a", "Tie A"), "R").with_priority(5),
            DraftTask::new(Section::new("medium", "Medium"), "R").with_priority(5),
        ];

        scheduler.schedule(tasks, &worker, false).unwrap();

        assert_eq!(
            *worker.calls.lock(),
            vec!["high", "tie-a", "medium", "low"]
                .into_iter()
                .map(String::from)
                .collect::<Vec<_>>()
        );
    }

    #[test]
    fn test_progress_is_monotonic_and_complete() {
        let fractions = Arc::new(Mutex::new(Vec::new()));
        let seen = Arc::clone(&fractions);
        let scheduler = DraftScheduler::new(3)
            .unwrap()
            .with_progress_callback(move |_, fraction| seen.lock().push(fraction));
        let worker = RecordingWorker {
            failing: set(&["c"]),
            delay: Duration::from_millis(5),
            ..Default::default()
        };

        scheduler
            .schedule(tasks(&["a", "b", "c", "d", "e", "f"]), &worker, false)
            .unwrap();

        let fractions = fractions.lock();
        assert_eq!(fractions.len(), 6);
        assert!(fractions.windows(2).all(|w| w[0] <= w[1]));
        assert_eq!(*fractions.last().unwrap(), 1.0);
    }

    #[test]
    fn test_runs_in_parallel_within_bound() {
        let scheduler = DraftScheduler::new(3).unwrap();
        let worker = RecordingWorker {
            failing: set(&["t3"]),
            delay: Duration::from_millis(100),
            ..Default::default()
        };
        let ids: Vec<String> = (0..10).map(|i| format!("t{}", i)).collect();
        let id_refs: Vec<&str> = ids.iter().map(String::as_str).collect();

        let start = Instant::now();
        let results = scheduler.schedule(tasks(&id_refs), &worker, false).unwrap();
        let elapsed = start.elapsed();

        assert_eq!(results.len(), 10);
        assert!(elapsed < Duration::from_millis(900), "took {:?}", elapsed);
        assert!(worker.peak.load(Ordering::SeqCst) <= 3);

        let stats = scheduler.statistics();
        assert_eq!(stats.successful, 9);
        assert_eq!(stats.failed, 1);
        assert_eq!(stats.total, stats.successful + stats.failed + stats.skipped);
        assert!(stats.average_duration > 0.0);
    }

    #[test]
    fn test_cancelled_before_start() {
        let token = CancellationToken::new();
        token.cancel();
        let scheduler = DraftScheduler::new(2).unwrap().with_cancellation(token);
        let worker = RecordingWorker::default();

        let results = scheduler.schedule(tasks(&["a", "b"]), &worker, false).unwrap();

        assert_eq!(results.len(), 2);
        assert!(results.values().all(|r| !r.succeeded));
        assert!(results
            .values()
            .all(|r| r.error_message.as_deref() == Some("cancelled")));
        assert!(worker.calls.lock().is_empty());
    }

    #[test]
    fn test_cancel_mid_run_records_unstarted_tasks() {
        let scheduler = DraftScheduler::new(1).unwrap();
        let worker = RecordingWorker {
            cancel_after_first: Some(scheduler.cancellation_token()),
            ..Default::default()
        };

        let results = scheduler
            .schedule(tasks(&["first", "second", "third"]), &worker, false)
            .unwrap();

        assert_eq!(results.len(), 3);
        assert!(results["first"].succeeded);
        assert_eq!(results["second"].error_message.as_deref(), Some("cancelled"));
        assert_eq!(results["third"].error_message.as_deref(), Some("cancelled"));
        assert_eq!(scheduler.task_state("third"), Some(TaskState::Failed));
    }

    #[test]
    fn test_duplicate_ids_rejected() {
        let scheduler = DraftScheduler::new(2).unwrap();
        let err = scheduler
            .schedule(tasks(&["a", "a"]), &RecordingWorker::default(), false)
            .unwrap_err();

        assert!(matches!(err, PaperGenError::DuplicateTask(id) if id == "a"));
    }

    #[test]
    fn test_progress_counters_after_run() {
        let scheduler = DraftScheduler::new(2).unwrap();
        let worker = RecordingWorker {
            existing: set(&["b"]),
            ..Default::default()
        };

        scheduler.schedule(tasks(&["a", "b", "c"]), &worker, true).unwrap();

        let progress = scheduler.progress();
        assert_eq!(progress.total, 2);
        assert_eq!(progress.completed, 2);
        assert_eq!(progress.running, 0);
        assert_eq!(progress.queued, 0);
        assert_eq!(scheduler.task_state("b"), Some(TaskState::Skipped));
        assert_eq!(scheduler.task_state("a"), Some(TaskState::Succeeded));
        assert!(["a", "b", "c"]
            .iter()
            .all(|id| scheduler.task_state(id).is_some_and(TaskState::is_terminal)));
    }

    #[test]
    fn test_repeated_result_is_ignored() {
        let scheduler = DraftScheduler::new(1).unwrap();
        let worker = RecordingWorker::default();
        scheduler.schedule(tasks(&["a", "b"]), &worker, false).unwrap();

        scheduler.record(DraftResult::failure("a", "late duplicate", 0.0));

        let progress = scheduler.progress();
        assert_eq!(progress.completed, 2);
        assert_eq!(scheduler.task_state("a"), Some(TaskState::Succeeded));
        assert!(!TaskState::Running.is_terminal());
        assert!(TaskState::Skipped.is_terminal());
    }
}
