//! The tokio loop that drives a [`Scheduler`].

use std::time::Duration;

use tokio::sync::oneshot;
use tokio::task::{JoinError, JoinHandle};
use tokio::time::MissedTickBehavior;

use crate::config::TICK_INTERVAL;

use super::{JobId, Scheduler};

/// Owner of a running scheduler loop.
///
/// Dropping the handle also stops the loop, but only [`stop`](Self::stop)
/// waits for it and hands the scheduler back.
pub struct SchedulerHandle {
    stop_tx: Option<oneshot::Sender<()>>,
    join: JoinHandle<Scheduler>,
}

impl Scheduler {
    /// Moves the scheduler onto a tokio task that ticks every second.
    ///
    /// Must be called from within a tokio runtime.
    pub fn start(self) -> SchedulerHandle {
        self.start_with_period(TICK_INTERVAL)
    }

    pub fn start_with_period(mut self, period: Duration) -> SchedulerHandle {
        let (stop_tx, mut stop_rx) = oneshot::channel::<()>();
        let join = tokio::spawn(async move {
            let mut ticker = tokio::time::interval(period);
            ticker.set_missed_tick_behavior(MissedTickBehavior::Skip);
            tracing::info!(jobs = self.len(), "scheduler started");
            loop {
                tokio::select! {
                    _ = &mut stop_rx => break,
                    _ = ticker.tick() => {
                        self.tick();
                    }
                }
            }
            tracing::info!("scheduler stopped");
            self
        });
        SchedulerHandle {
            stop_tx: Some(stop_tx),
            join,
        }
    }

    /// Like [`run_all`](Self::run_all), but pauses for `delay` between
    /// consecutive jobs. Each job sees the clock as of its own start.
    pub async fn run_all_with_delay(&mut self, delay: Duration) -> usize {
        let mut ids: Vec<JobId> = self.jobs.keys().copied().collect();
        ids.sort_unstable();
        for (n, id) in ids.iter().enumerate() {
            if n > 0 {
                tokio::time::sleep(delay).await;
            }
            let now = self.clock.now();
            if let Some(job) = self.jobs.get_mut(id) {
                job.run(now);
            }
        }
        self.rebuild_queue();
        ids.len()
    }
}

impl SchedulerHandle {
    /// Signals the loop to stop, lets the current tick finish, and returns
    /// the scheduler.
    pub async fn stop(mut self) -> Result<Scheduler, JoinError> {
        if let Some(tx) = self.stop_tx.take() {
            let _ = tx.send(());
        }
        self.join.await
    }

    pub fn is_finished(&self) -> bool {
        self.join.is_finished()
    }
}

#[cfg(test)]
mod tests {
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::sync::Arc;

    use chrono::{TimeZone, Utc};

    use super::*;
    use crate::clock::ManualClock;

    #[tokio::test(start_paused = true)]
    async fn loop_ticks_and_stops() {
        let clock = ManualClock::new(Utc.with_ymd_and_hms(2026, 2, 2, 12, 0, 0).unwrap());
        let mut scheduler = Scheduler::with_clock(Arc::new(clock.clone()));
        let runs = Arc::new(AtomicUsize::new(0));
        let r = Arc::clone(&runs);
        scheduler
            .every(1)
            .minute()
            .run(move || {
                r.fetch_add(1, Ordering::SeqCst);
                Ok(())
            })
            .unwrap();

        let handle = scheduler.start();
        clock.advance(chrono::Duration::seconds(61));
        tokio::time::sleep(Duration::from_millis(3_500)).await;

        let scheduler = handle.stop().await.unwrap();
        assert_eq!(runs.load(Ordering::SeqCst), 1);
        assert_eq!(scheduler.len(), 1);
    }

    #[tokio::test(start_paused = true)]
    async fn run_all_with_delay_spaces_out_jobs() {
        let mut scheduler = Scheduler::new();
        let started = Arc::new(parking_lot::Mutex::new(Vec::new()));
        for _ in 0..3 {
            let s = Arc::clone(&started);
            scheduler
                .every(1)
                .hours()
                .run(move || {
                    s.lock().push(tokio::time::Instant::now());
                    Ok(())
                })
                .unwrap();
        }

        let begin = tokio::time::Instant::now();
        assert_eq!(scheduler.run_all_with_delay(Duration::from_secs(2)).await, 3);

        let started = started.lock();
        assert_eq!(started.len(), 3);
        assert_eq!(started[0] - begin, Duration::ZERO);
        assert_eq!(started[1] - started[0], Duration::from_secs(2));
        assert_eq!(started[2] - started[1], Duration::from_secs(2));
        assert!(scheduler.next_run().is_some());
    }

    #[tokio::test(start_paused = true)]
    async fn stop_before_any_job_is_due() {
        let handle = Scheduler::new().start();
        tokio::time::sleep(Duration::from_secs(2)).await;
        assert!(!handle.is_finished());
        let scheduler = handle.stop().await.unwrap();
        assert!(scheduler.is_empty());
    }
}
