use chrono::{DateTime, Utc};
use serde::Serialize;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use tokio::sync::{Mutex, RwLock};
use tokio::task::JoinHandle;
use tokio::time::{interval, Duration, MissedTickBehavior};

use super::pipeline::{RunReport, SyncJob};
use crate::utils::logging::*;

#[derive(Debug, Clone, PartialEq)]
pub enum TriggerOutcome {
    Completed(RunReport),
    /// A run was already in progress
    Skipped,
    Failed(String),
}

/// What `/status` shows about the previous run
#[derive(Debug, Clone, Serialize)]
pub struct LastRun {
    pub finished_at: DateTime<Utc>,
    pub success: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub report: Option<RunReport>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
}

/// Periodic sync runner with at most one run at a time
///
/// Timer ticks and manual triggers share one guard; a trigger that finds a
/// run in progress is dropped, not queued.
#[derive(Clone)]
pub struct SyncScheduler {
    job: Arc<dyn SyncJob>,
    interval_seconds: u64,
    run_guard: Arc<Mutex<()>>,
    in_progress: Arc<AtomicBool>,
    /// Timer loop state
    running: Arc<RwLock<bool>>,
    loop_handle: Arc<Mutex<Option<JoinHandle<()>>>>,
    last_run: Arc<RwLock<Option<LastRun>>>,
}

impl SyncScheduler {
    pub fn new(job: Arc<dyn SyncJob>, interval_seconds: u64) -> Self {
        Self {
            job,
            interval_seconds: interval_seconds.max(1),
            run_guard: Arc::new(Mutex::new(())),
            in_progress: Arc::new(AtomicBool::new(false)),
            running: Arc::new(RwLock::new(false)),
            loop_handle: Arc::new(Mutex::new(None)),
            last_run: Arc::new(RwLock::new(None)),
        }
    }

    pub fn interval_seconds(&self) -> u64 {
        self.interval_seconds
    }

    /// Runs the job now unless a run is already in progress
    ///
    /// The run happens in its own task, so dropping the returned future
    /// (a disconnected admin caller) never cuts it short.
    pub async fn trigger(&self) -> TriggerOutcome {
        let Ok(guard) = self.run_guard.clone().try_lock_owned() else {
            log_warning("⏭️ Sync run already in progress, skipping trigger");
            return TriggerOutcome::Skipped;
        };

        let flag = InProgressFlag::set(self.in_progress.clone());
        let job = self.job.clone();
        let last_run = self.last_run.clone();

        let handle = tokio::spawn(async move {
            let _guard = guard;
            log_info("🔁 Sync run started");
            let result = job.run(Utc::now()).await;
            drop(flag);

            let (outcome, last) = match result {
                Ok(report) => (
                    TriggerOutcome::Completed(report.clone()),
                    LastRun {
                        finished_at: Utc::now(),
                        success: true,
                        report: Some(report),
                        error: None,
                    },
                ),
                Err(e) => {
                    log_error(&format!("❌ Sync run failed: {}", e));
                    (
                        TriggerOutcome::Failed(e.to_string()),
                        LastRun {
                            finished_at: Utc::now(),
                            success: false,
                            report: None,
                            error: Some(e.to_string()),
                        },
                    )
                }
            };

            *last_run.write().await = Some(last);
            outcome
        });

        match handle.await {
            Ok(outcome) => outcome,
            Err(e) => {
                log_error(&format!("❌ Sync run aborted: {}", e));
                TriggerOutcome::Failed(format!("sync run aborted: {}", e))
            }
        }
    }

    /// Starts the timer loop; the first run happens right away
    pub async fn start(&self) {
        let mut running = self.running.write().await;
        if *running {
            log_warning("Scheduler already running");
            return;
        }
        *running = true;
        drop(running);

        let scheduler = self.clone();
        let handle = tokio::spawn(async move {
            let mut ticker = interval(Duration::from_secs(scheduler.interval_seconds));
            ticker.set_missed_tick_behavior(MissedTickBehavior::Skip);

            log_info(&format!(
                "⏱️ Sync job scheduled every {}s",
                scheduler.interval_seconds
            ));

            loop {
                ticker.tick().await;

                if !*scheduler.running.read().await {
                    break;
                }

                // Own task, so a slow run never delays the next tick
                let runner = scheduler.clone();
                tokio::spawn(async move {
                    runner.trigger().await;
                });
            }
        });

        *self.loop_handle.lock().await = Some(handle);
    }

    /// Stops the timer; a run in progress is left to finish
    pub async fn stop(&self) {
        *self.running.write().await = false;
        if let Some(handle) = self.loop_handle.lock().await.take() {
            handle.abort();
        }
        log_info("Scheduler stopped");
    }

    pub async fn is_started(&self) -> bool {
        *self.running.read().await
    }

    pub fn is_run_in_progress(&self) -> bool {
        self.in_progress.load(Ordering::SeqCst)
    }

    pub async fn last_run(&self) -> Option<LastRun> {
        self.last_run.read().await.clone()
    }
}

/// Clears the in-progress flag when the run ends, even by panic
struct InProgressFlag(Arc<AtomicBool>);

impl InProgressFlag {
    fn set(flag: Arc<AtomicBool>) -> Self {
        flag.store(true, Ordering::SeqCst);
        Self(flag)
    }
}

impl Drop for InProgressFlag {
    fn drop(&mut self) {
        self.0.store(false, Ordering::SeqCst);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::utils::SyncError;
    use async_trait::async_trait;
    use std::sync::atomic::AtomicUsize;
    use tokio::sync::Notify;

    #[derive(Default)]
    struct BlockingJob {
        runs: AtomicUsize,
        started: Notify,
        release: Notify,
    }

    #[async_trait]
    impl SyncJob for BlockingJob {
        async fn run(&self, _now: DateTime<Utc>) -> Result<RunReport, SyncError> {
            self.runs.fetch_add(1, Ordering::SeqCst);
            self.started.notify_one();
            self.release.notified().await;
            Ok(RunReport::default())
        }
    }

    #[derive(Default)]
    struct CountingJob {
        runs: AtomicUsize,
        fail: bool,
    }

    #[async_trait]
    impl SyncJob for CountingJob {
        async fn run(&self, _now: DateTime<Utc>) -> Result<RunReport, SyncError> {
            self.runs.fetch_add(1, Ordering::SeqCst);
            if self.fail {
                return Err(SyncError::Config("log dir unreadable".to_string()));
            }
            Ok(RunReport {
                records: 3,
                ..Default::default()
            })
        }
    }

    #[tokio::test]
    async fn test_overlapping_trigger_is_skipped() {
        let job = Arc::new(BlockingJob::default());
        let scheduler = SyncScheduler::new(job.clone(), 300);

        let first = {
            let scheduler = scheduler.clone();
            tokio::spawn(async move { scheduler.trigger().await })
        };
        job.started.notified().await;

        assert!(scheduler.is_run_in_progress());
        assert_eq!(scheduler.trigger().await, TriggerOutcome::Skipped);

        job.release.notify_one();
        let outcome = first.await.unwrap();

        assert!(matches!(outcome, TriggerOutcome::Completed(_)));
        assert_eq!(job.runs.load(Ordering::SeqCst), 1);
        assert!(!scheduler.is_run_in_progress());
    }

    #[tokio::test]
    async fn test_dropped_caller_does_not_strand_run() {
        let job = Arc::new(BlockingJob::default());
        let scheduler = SyncScheduler::new(job.clone(), 300);

        let caller = {
            let scheduler = scheduler.clone();
            tokio::spawn(async move { scheduler.trigger().await })
        };
        job.started.notified().await;
        assert!(scheduler.is_run_in_progress());

        caller.abort();
        assert!(caller.await.unwrap_err().is_cancelled());

        // The run keeps going without its caller
        assert!(scheduler.is_run_in_progress());
        assert_eq!(scheduler.trigger().await, TriggerOutcome::Skipped);

        job.release.notify_one();
        for _ in 0..50 {
            if scheduler.last_run().await.is_some() {
                break;
            }
            tokio::time::sleep(Duration::from_millis(10)).await;
        }

        assert!(!scheduler.is_run_in_progress());
        assert!(scheduler.last_run().await.unwrap().success);
        assert_eq!(job.runs.load(Ordering::SeqCst), 1);

        let job_again = scheduler.trigger();
        job.release.notify_one();
        assert!(matches!(job_again.await, TriggerOutcome::Completed(_)));
    }

    #[tokio::test]
    async fn test_last_run_recorded() {
        let job = Arc::new(CountingJob::default());
        let scheduler = SyncScheduler::new(job, 300);
        assert!(scheduler.last_run().await.is_none());

        scheduler.trigger().await;
        let last = scheduler.last_run().await.unwrap();
        assert!(last.success);
        assert_eq!(last.report.unwrap().records, 3);

        let failing = SyncScheduler::new(
            Arc::new(CountingJob {
                fail: true,
                ..Default::default()
            }),
            300,
        );
        assert!(matches!(failing.trigger().await, TriggerOutcome::Failed(_)));
        let last = failing.last_run().await.unwrap();
        assert!(!last.success);
        assert!(last.error.unwrap().contains("log dir unreadable"));
    }

    #[tokio::test]
    async fn test_start_runs_immediately_and_stops() {
        let job = Arc::new(CountingJob::default());
        let scheduler = SyncScheduler::new(job.clone(), 3600);

        scheduler.start().await;
        scheduler.start().await;
        assert!(scheduler.is_started().await);

        for _ in 0..50 {
            if job.runs.load(Ordering::SeqCst) > 0 {
                break;
            }
            tokio::time::sleep(Duration::from_millis(20)).await;
        }
        assert_eq!(job.runs.load(Ordering::SeqCst), 1);

        scheduler.stop().await;
        assert!(!scheduler.is_started().await);
    }
}
