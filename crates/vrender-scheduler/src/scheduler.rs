//! Bounded-concurrency fan-out driver (§4.6): runs N tasks with at most K in
//! flight, collects results by index (not arrival order), and aggregates
//! per-task progress into the orchestrator's clip-phase window.

use std::collections::HashMap;
use std::future::Future;
use std::sync::Arc;
use std::time::Duration;

use tokio::sync::{mpsc, watch, Semaphore};
use tracing::{info, warn};

use crate::error::SchedulerError;

pub const DEFAULT_CONCURRENCY: usize = 2;
pub const MAX_CONCURRENCY: usize = 8;
pub const DEFAULT_CANCEL_GRACE: Duration = Duration::from_secs(30);

/// Scheduler tuning: concurrency cap `K` and the grace period granted to
/// in-flight tasks after a cancellation signal.
#[derive(Debug, Clone, Copy)]
pub struct SchedulerConfig {
    pub concurrency: usize,
    pub cancel_grace: Duration,
}

impl SchedulerConfig {
    pub fn new(requested_concurrency: usize) -> Self {
        Self {
            concurrency: requested_concurrency.clamp(1, MAX_CONCURRENCY),
            cancel_grace: DEFAULT_CANCEL_GRACE,
        }
    }
}

impl Default for SchedulerConfig {
    fn default() -> Self {
        Self::new(DEFAULT_CONCURRENCY)
    }
}

/// A task's progress callback: scalar 0..100, reported any number of times
/// before the task resolves.
#[derive(Clone)]
pub struct ProgressReporter {
    index: usize,
    tx: mpsc::UnboundedSender<(usize, u8)>,
}

impl ProgressReporter {
    pub fn report(&self, percent: u8) {
        let _ = self.tx.send((self.index, percent.min(100)));
    }
}

/// Aggregate clip-phase progress window per §4.8: `[10, 75]`, computed from
/// how many of the `N` tasks have completed plus in-flight per-task percent.
pub fn aggregate_percent(task_count: usize, completed: usize) -> u8 {
    if task_count == 0 {
        return 75;
    }
    10 + ((60 * completed) / task_count) as u8
}

/// Drive `task_count` tasks through `task_fn` with at most `config.concurrency`
/// in flight. `task_fn` receives the task index and a [`ProgressReporter`].
/// `on_progress` is invoked with the current `per_scene` map and the
/// aggregate percent on every progress report and on every completion.
///
/// Cancellation: when `cancel` observes `true`, no new tasks are started and
/// the scheduler waits at most `config.cancel_grace` for in-flight tasks
/// before returning with the tasks that never got a chance to run reported as
/// `SchedulerError::Cancelled`.
pub async fn run_fanout<T, E, F, Fut>(
    task_count: usize,
    config: SchedulerConfig,
    mut cancel: watch::Receiver<bool>,
    task_fn: F,
    mut on_progress: impl FnMut(&HashMap<usize, u8>, u8),
) -> Vec<Result<T, SchedulerError>>
where
    T: Send + 'static,
    E: std::fmt::Display + Send + 'static,
    F: Fn(usize, ProgressReporter) -> Fut + Send + Sync + 'static,
    Fut: Future<Output = Result<T, E>> + Send + 'static,
{
    let semaphore = Arc::new(Semaphore::new(config.concurrency));
    let task_fn = Arc::new(task_fn);
    let (progress_tx, mut progress_rx) = mpsc::unbounded_channel();
    let (result_tx, mut result_rx) = mpsc::channel(task_count.max(1));

    let mut per_scene = HashMap::new();
    let mut handles = Vec::with_capacity(task_count);

    for index in 0..task_count {
        if *cancel.borrow() {
            break;
        }

        let permit = tokio::select! {
            biased;
            _ = cancel.changed() => break,
            permit = semaphore.clone().acquire_owned() => permit,
        };
        let Ok(permit) = permit else { break };

        let task_fn = Arc::clone(&task_fn);
        let result_tx = result_tx.clone();
        let reporter = ProgressReporter {
            index,
            tx: progress_tx.clone(),
        };

        handles.push(tokio::spawn(async move {
            let _permit = permit;
            let outcome = task_fn(index, reporter).await;
            let _ = result_tx
                .send((index, outcome.map_err(|e| SchedulerError::TaskFailed {
                    index,
                    reason: e.to_string(),
                })))
                .await;
        }));
    }

    drop(result_tx);
    drop(progress_tx);

    let started = handles.len();
    let mut completed = 0usize;
    let mut results: HashMap<usize, Result<T, SchedulerError>> = HashMap::new();

    loop {
        tokio::select! {
            biased;
            Some((index, percent)) = progress_rx.recv() => {
                per_scene.insert(index, percent);
                on_progress(&per_scene, aggregate_percent(task_count, completed));
            }
            maybe = result_rx.recv() => {
                match maybe {
                    Some((index, outcome)) => {
                        per_scene.insert(index, 100);
                        completed += 1;
                        results.insert(index, outcome);
                        on_progress(&per_scene, aggregate_percent(task_count, completed));
                    }
                    None => break,
                }
            }
            else => break,
        }
        if completed >= started {
            break;
        }
    }

    if *cancel.borrow() {
        warn!(task_count, started, completed, "fan-out cancelled, waiting for in-flight tasks");
        let _ = tokio::time::timeout(config.cancel_grace, async {
            for handle in handles {
                let _ = handle.await;
            }
        })
        .await;
    }

    info!(task_count, started, completed, "fan-out complete");

    (0..task_count)
        .map(|i| {
            results
                .remove(&i)
                .unwrap_or(Err(SchedulerError::Cancelled { index: i }))
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn aggregate_percent_matches_clip_phase_window() {
        assert_eq!(aggregate_percent(4, 0), 10);
        assert_eq!(aggregate_percent(4, 2), 40);
        assert_eq!(aggregate_percent(4, 4), 70);
    }

    #[test]
    fn aggregate_percent_handles_zero_tasks() {
        assert_eq!(aggregate_percent(0, 0), 75);
    }

    #[tokio::test]
    async fn runs_all_tasks_within_concurrency_cap() {
        let (_cancel_tx, cancel_rx) = watch::channel(false);
        let in_flight = Arc::new(std::sync::atomic::AtomicUsize::new(0));
        let max_in_flight = Arc::new(std::sync::atomic::AtomicUsize::new(0));

        let in_flight_c = Arc::clone(&in_flight);
        let max_in_flight_c = Arc::clone(&max_in_flight);

        let results = run_fanout::<u32, String, _, _>(
            6,
            SchedulerConfig::new(2),
            cancel_rx,
            move |index, reporter| {
                let in_flight = Arc::clone(&in_flight_c);
                let max_in_flight = Arc::clone(&max_in_flight_c);
                async move {
                    let n = in_flight.fetch_add(1, std::sync::atomic::Ordering::SeqCst) + 1;
                    max_in_flight.fetch_max(n, std::sync::atomic::Ordering::SeqCst);
                    reporter.report(50);
                    tokio::time::sleep(Duration::from_millis(5)).await;
                    in_flight.fetch_sub(1, std::sync::atomic::Ordering::SeqCst);
                    Ok::<u32, String>(index as u32)
                }
            },
            |_, _| {},
        )
        .await;

        assert_eq!(results.len(), 6);
        assert!(results.iter().all(|r| r.is_ok()));
        assert!(max_in_flight.load(std::sync::atomic::Ordering::SeqCst) <= 2);
    }

    #[tokio::test]
    async fn results_ordered_by_index_not_arrival() {
        let (_cancel_tx, cancel_rx) = watch::channel(false);
        let results = run_fanout::<u32, String, _, _>(
            3,
            SchedulerConfig::new(3),
            cancel_rx,
            |index, _reporter| async move {
                let delay = 10u64.saturating_sub(index as u64 * 3);
                tokio::time::sleep(Duration::from_millis(delay)).await;
                Ok::<u32, String>(index as u32)
            },
            |_, _| {},
        )
        .await;

        for (i, r) in results.iter().enumerate() {
            assert_eq!(*r.as_ref().unwrap(), i as u32);
        }
    }
}
