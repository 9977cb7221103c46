//! Fixed-rate task scheduling on tokio.
//!
//! Each scheduled task gets its own interval. Missed ticks are skipped rather
//! than bursted, and any backlog is drained before running so the task always
//! acts on the current tick. A panic inside one run is caught and logged; the
//! next run still happens on schedule.

use futures_util::FutureExt;
use std::panic::{AssertUnwindSafe, catch_unwind};
use std::time::Duration;
use tokio::runtime::Handle;
use tokio::task::JoinHandle;
use tokio::time::{Instant, MissedTickBehavior, interval_at};
use tracing::{debug, error};

#[derive(Debug, Clone)]
pub struct TaskScheduler {
    runtime: Handle,
}

impl TaskScheduler {
    /// Scheduler on the ambient tokio runtime. Panics outside a runtime.
    pub fn current() -> Self {
        Self {
            runtime: Handle::current(),
        }
    }

    pub fn new(runtime: Handle) -> Self {
        Self { runtime }
    }

    /// Run `task` every `period`, first after `initial_delay`.
    ///
    /// `period` must be non-zero.
    pub fn schedule_at_fixed_rate<F>(
        &self,
        name: &'static str,
        initial_delay: Duration,
        period: Duration,
        mut task: F,
    ) -> ScheduledTask
    where
        F: FnMut() + Send + 'static,
    {
        let handle = self.runtime.spawn(async move {
            let mut ticker = interval_at(Instant::now() + initial_delay, period);
            ticker.set_missed_tick_behavior(MissedTickBehavior::Skip);

            loop {
                let scheduled = ticker.tick().await;

                let mut skipped = 0u32;
                while ticker.tick().now_or_never().is_some() {
                    skipped += 1;
                }
                if skipped > 0 {
                    debug!(
                        "Task {} skipped {} runs to stay current (lag: {:?})",
                        name,
                        skipped,
                        Instant::now().saturating_duration_since(scheduled)
                    );
                }

                if catch_unwind(AssertUnwindSafe(&mut task)).is_err() {
                    error!("Task {} panicked; continuing with the next run", name);
                }
            }
        });
        debug!("Scheduled {} every {:?} after {:?}", name, period, initial_delay);
        ScheduledTask { name, handle }
    }
}

/// A running periodic task. Dropping it cancels the task.
#[derive(Debug)]
pub struct ScheduledTask {
    name: &'static str,
    handle: JoinHandle<()>,
}

impl ScheduledTask {
    pub fn name(&self) -> &'static str {
        self.name
    }

    pub fn cancel(&self) {
        self.handle.abort();
    }

    pub fn is_finished(&self) -> bool {
        self.handle.is_finished()
    }
}

impl Drop for ScheduledTask {
    fn drop(&mut self) {
        self.handle.abort();
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Arc;
    use std::sync::atomic::{AtomicUsize, Ordering};

    fn counter() -> (Arc<AtomicUsize>, impl FnMut() + Send + 'static) {
        let count = Arc::new(AtomicUsize::new(0));
        let inner = count.clone();
        (count, move || {
            inner.fetch_add(1, Ordering::SeqCst);
        })
    }

    #[tokio::test(start_paused = true)]
    async fn test_runs_at_fixed_rate() {
        let (count, task) = counter();
        let _task = TaskScheduler::current().schedule_at_fixed_rate(
            "count",
            Duration::from_millis(10),
            Duration::from_millis(50),
            task,
        );

        tokio::time::sleep(Duration::from_millis(5)).await;
        assert_eq!(count.load(Ordering::SeqCst), 0);

        // Runs at 10, 60, 110 and 160 ms.
        tokio::time::sleep(Duration::from_millis(160)).await;
        assert_eq!(count.load(Ordering::SeqCst), 4);
    }

    #[tokio::test(start_paused = true)]
    async fn test_panic_does_not_stop_schedule() {
        let runs = Arc::new(AtomicUsize::new(0));
        let inner = runs.clone();
        let _task = TaskScheduler::current().schedule_at_fixed_rate(
            "flaky",
            Duration::ZERO,
            Duration::from_millis(50),
            move || {
                let n = inner.fetch_add(1, Ordering::SeqCst);
                if n == 1 {
                    panic!("second run fails");
                }
            },
        );

        tokio::time::sleep(Duration::from_millis(175)).await;
        assert_eq!(runs.load(Ordering::SeqCst), 4);
    }

    #[tokio::test(start_paused = true)]
    async fn test_cancel_stops_runs() {
        let (count, task) = counter();
        let scheduled = TaskScheduler::current().schedule_at_fixed_rate(
            "cancelled",
            Duration::ZERO,
            Duration::from_millis(20),
            task,
        );
        tokio::time::sleep(Duration::from_millis(30)).await;
        let seen = count.load(Ordering::SeqCst);
        assert_eq!(seen, 2);

        scheduled.cancel();
        tokio::time::sleep(Duration::from_millis(200)).await;
        assert_eq!(count.load(Ordering::SeqCst), seen);
        assert!(scheduled.is_finished());
    }
}
