//! Fixed-cadence frame delivery
//!
//! The pacing scheduler drains the decoder on its own clock so that output
//! timing does not follow input arrival jitter. It runs as a tokio task and
//! holds only a weak reference to what it drives, so dropping the stage also
//! ends the task.

use log::{debug, info, warn};
use std::sync::Weak;
use std::time::Duration;
use tokio::runtime::Handle;
use tokio::task::JoinHandle;
use tokio::time::{self, Instant, MissedTickBehavior};
use tokio_util::sync::CancellationToken;

use crate::error::Error;

/// Something the pacing scheduler drives once per tick
pub trait PacedSource: Send + Sync + 'static {
    /// Whether ticking should continue; returning false ends the task
    fn is_active(&self) -> bool;

    /// Perform one paced delivery
    fn tick(&self) -> Result<(), Error>;

    /// Report a failed tick
    fn report(&self, error: &Error);
}

/// Periodic task calling a [`PacedSource`] at a fixed interval
///
/// The first tick happens one period after the task starts. Ticks that could
/// not run on time are skipped rather than bursted.
pub struct PacingScheduler {
    period: Duration,
    cancel: CancellationToken,
    task: Option<JoinHandle<()>>,
}

impl PacingScheduler {
    /// Start pacing `source` on `runtime`
    pub fn spawn<T: PacedSource>(runtime: &Handle, period: Duration, source: Weak<T>) -> Self {
        let cancel = CancellationToken::new();
        let task = runtime.spawn(run(period, source, cancel.clone()));
        info!("PacingScheduler: started with period {:?}", period);

        Self {
            period,
            cancel,
            task: Some(task),
        }
    }

    pub fn period(&self) -> Duration {
        self.period
    }

    /// Ask the task to stop; it exits before running another tick
    pub fn stop(&self) {
        self.cancel.cancel();
    }

    pub fn is_stopped(&self) -> bool {
        self.cancel.is_cancelled()
    }

    /// Check if the task has exited (or was already joined)
    pub fn is_finished(&self) -> bool {
        self.task.as_ref().is_none_or(|task| task.is_finished())
    }

    /// Take the task handle, leaving the scheduler without one
    pub fn take_task(&mut self) -> Option<JoinHandle<()>> {
        self.task.take()
    }

    /// Wait for the task to exit
    pub async fn join(&mut self) {
        if let Some(task) = self.task.take()
            && let Err(e) = task.await
        {
            warn!("PacingScheduler: task ended abnormally: {}", e);
        }
    }
}

impl Drop for PacingScheduler {
    fn drop(&mut self) {
        self.cancel.cancel();
    }
}

async fn run<T: PacedSource>(period: Duration, source: Weak<T>, cancel: CancellationToken) {
    let mut interval = time::interval_at(Instant::now() + period, period);
    interval.set_missed_tick_behavior(MissedTickBehavior::Skip);
    let mut ticks = 0u64;

    loop {
        tokio::select! {
            biased;
            _ = cancel.cancelled() => break,
            _ = interval.tick() => {}
        }

        // The source is only borrowed for the duration of one tick
        let Some(target) = source.upgrade() else {
            break;
        };
        if !target.is_active() {
            break;
        }

        ticks += 1;
        if let Err(e) = target.tick() {
            target.report(&e);
        }
    }

    debug!("PacingScheduler: finished after {} ticks", ticks);
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Arc;
    use std::sync::Mutex;
    use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};

    #[derive(Default)]
    struct CountingSource {
        ticks: AtomicU64,
        inactive: AtomicBool,
        failing: AtomicBool,
        reported: Mutex<Vec<Error>>,
    }

    impl PacedSource for CountingSource {
        fn is_active(&self) -> bool {
            !self.inactive.load(Ordering::SeqCst)
        }

        fn tick(&self) -> Result<(), Error> {
            self.ticks.fetch_add(1, Ordering::SeqCst);
            if self.failing.load(Ordering::SeqCst) {
                return Err(Error::SinkRejected("busy".into()));
            }
            Ok(())
        }

        fn report(&self, error: &Error) {
            self.reported.lock().unwrap().push(error.clone());
        }
    }

    const PERIOD: Duration = Duration::from_millis(100);

    #[tokio::test(start_paused = true)]
    async fn test_ticks_at_fixed_period() {
        let source = Arc::new(CountingSource::default());
        let scheduler = PacingScheduler::spawn(&Handle::current(), PERIOD, Arc::downgrade(&source));
        assert_eq!(scheduler.period(), PERIOD);

        // First tick is one period after start
        time::sleep(Duration::from_millis(50)).await;
        assert_eq!(source.ticks.load(Ordering::SeqCst), 0);

        time::sleep(Duration::from_millis(500)).await;
        assert_eq!(source.ticks.load(Ordering::SeqCst), 5);
        assert!(!scheduler.is_finished());
    }

    #[tokio::test(start_paused = true)]
    async fn test_errors_are_reported_and_ticking_continues() {
        let source = Arc::new(CountingSource::default());
        source.failing.store(true, Ordering::SeqCst);
        let _scheduler =
            PacingScheduler::spawn(&Handle::current(), PERIOD, Arc::downgrade(&source));

        time::sleep(Duration::from_millis(350)).await;
        assert_eq!(source.ticks.load(Ordering::SeqCst), 3);
        assert_eq!(source.reported.lock().unwrap().len(), 3);

        source.failing.store(false, Ordering::SeqCst);
        time::sleep(Duration::from_millis(200)).await;
        assert_eq!(source.ticks.load(Ordering::SeqCst), 5);
        assert_eq!(source.reported.lock().unwrap().len(), 3);
    }

    #[tokio::test(start_paused = true)]
    async fn test_inactive_source_ends_task() {
        let source = Arc::new(CountingSource::default());
        let mut scheduler =
            PacingScheduler::spawn(&Handle::current(), PERIOD, Arc::downgrade(&source));

        time::sleep(Duration::from_millis(250)).await;
        source.inactive.store(true, Ordering::SeqCst);

        // Terminates on the next tick without calling the source again
        time::timeout(PERIOD * 2, scheduler.join()).await.unwrap();
        assert!(scheduler.is_finished());
        assert_eq!(source.ticks.load(Ordering::SeqCst), 2);
    }

    #[tokio::test(start_paused = true)]
    async fn test_stop_cancels_before_next_tick() {
        let source = Arc::new(CountingSource::default());
        let mut scheduler =
            PacingScheduler::spawn(&Handle::current(), PERIOD, Arc::downgrade(&source));

        time::sleep(Duration::from_millis(150)).await;
        scheduler.stop();
        assert!(scheduler.is_stopped());

        time::timeout(Duration::from_millis(1), scheduler.join())
            .await
            .unwrap();
        assert_eq!(source.ticks.load(Ordering::SeqCst), 1);
    }

    #[tokio::test(start_paused = true)]
    async fn test_dropped_source_ends_task() {
        let source = Arc::new(CountingSource::default());
        let mut scheduler =
            PacingScheduler::spawn(&Handle::current(), PERIOD, Arc::downgrade(&source));
        drop(source);

        time::timeout(PERIOD * 2, scheduler.join()).await.unwrap();
        assert!(scheduler.is_finished());
    }

    #[tokio::test(start_paused = true)]
    async fn test_drop_cancels_task() {
        let source = Arc::new(CountingSource::default());
        let mut scheduler =
            PacingScheduler::spawn(&Handle::current(), PERIOD, Arc::downgrade(&source));
        let task = scheduler.take_task().unwrap();
        drop(scheduler);

        time::timeout(Duration::from_millis(1), task)
            .await
            .unwrap()
            .unwrap();
        assert_eq!(source.ticks.load(Ordering::SeqCst), 0);
    }
}
