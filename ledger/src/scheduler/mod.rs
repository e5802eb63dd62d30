//! # Scheduler: Recurring Jobs
//!
//! A tick-driven scheduler for periodic maintenance such as wallet limit
//! resets. Jobs are registered fluently:
//!
//! ```text
//! scheduler.every(1).day().at("00:00").run(move || Ok(ledger.reset_limits().map(drop)?))?;
//! scheduler.every(1).wednesday().at("07:30").run(task)?;
//! scheduler.every(30).seconds().run(task)?;
//! ```
//!
//! ## Architecture
//!
//! ```text
//! job.rs    - Unit, TimeOfDay, Cadence and first-run anchoring
//! mod.rs    - Scheduler (min-heap of due times) and JobBuilder
//! driver.rs - tokio loop calling tick() every second; SchedulerHandle
//! ```
//!
//! ## Semantics
//!
//! - A job is due when `now > next_run` (strictly after).
//! - A due job runs once per tick no matter how many periods it missed, then
//!   `next_run = now + period`.
//! - A failing task is logged and rescheduled like a successful one.
//! - Anchors are wall-clock times in the scheduler's fixed UTC offset.

mod driver;
mod job;

use std::cmp::Reverse;
use std::collections::{BinaryHeap, HashMap};
use std::sync::Arc;

use chrono::{DateTime, FixedOffset, Offset, Utc, Weekday};

use crate::clock::{Clock, SystemClock};

pub use driver::SchedulerHandle;
pub use job::{Cadence, JobId, TaskResult, TimeOfDay, Unit};

use job::Job;

// ---------------------------------------------------------------------------
// Error Type
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum SchedulerError {
    #[error("invalid interval {0} for this selector")]
    InvalidInterval(u32),

    #[error("invalid time of day {0:?}, expected HH:MM")]
    InvalidTimeOfDay(String),

    #[error("no time unit selected")]
    MissingUnit,

    #[error("unknown time unit {0:?}")]
    UnknownUnit(String),

    #[error("time-of-day anchors are not supported for {0}")]
    AnchorNotSupported(Unit),
}

// ---------------------------------------------------------------------------
// Scheduler
// ---------------------------------------------------------------------------

pub struct Scheduler {
    clock: Arc<dyn Clock>,
    tz: FixedOffset,
    jobs: HashMap<JobId, Job>,
    /// Due times. Entries for removed or rescheduled jobs go stale and are
    /// skipped when popped.
    queue: BinaryHeap<Reverse<(DateTime<Utc>, JobId)>>,
    next_id: JobId,
}

impl Default for Scheduler {
    fn default() -> Self {
        Self::new()
    }
}

impl Scheduler {
    /// A scheduler on the system clock, anchoring in UTC.
    pub fn new() -> Self {
        Self::with_clock(Arc::new(SystemClock))
    }

    pub fn with_clock(clock: Arc<dyn Clock>) -> Self {
        Self {
            clock,
            tz: Utc.fix(),
            jobs: HashMap::new(),
            queue: BinaryHeap::new(),
            next_id: 1,
        }
    }

    /// Interprets `at(..)` anchors in the given offset.
    pub fn with_timezone(mut self, tz: FixedOffset) -> Self {
        self.tz = tz;
        self
    }

    pub fn timezone(&self) -> FixedOffset {
        self.tz
    }

    /// Starts describing a job that repeats every `interval` units.
    pub fn every(&mut self, interval: u32) -> JobBuilder<'_> {
        JobBuilder {
            scheduler: self,
            interval,
            unit: None,
            at: None,
            start_day: None,
            error: None,
        }
    }

    /// Runs every due job once. Returns how many ran.
    pub fn tick(&mut self) -> usize {
        let now = self.clock.now();
        let mut due = Vec::new();
        while let Some(Reverse((at, id))) = self.queue.peek().copied() {
            if now <= at {
                break;
            }
            self.queue.pop();
            if self.jobs.get(&id).is_some_and(|job| job.next_run == at) {
                due.push(id);
            }
        }

        for id in &due {
            if let Some(job) = self.jobs.get_mut(id) {
                job.run(now);
                self.queue.push(Reverse((job.next_run, *id)));
            }
        }
        if !due.is_empty() {
            tracing::debug!(ran = due.len(), "scheduler tick");
        }
        due.len()
    }

    /// Runs every job immediately, regardless of schedule.
    pub fn run_all(&mut self) -> usize {
        let now = self.clock.now();
        let mut ids: Vec<JobId> = self.jobs.keys().copied().collect();
        ids.sort_unstable();
        for id in &ids {
            if let Some(job) = self.jobs.get_mut(id) {
                job.run(now);
            }
        }
        self.rebuild_queue();
        ids.len()
    }

    /// The job that runs next and when.
    pub fn next_run(&self) -> Option<(JobId, DateTime<Utc>)> {
        self.jobs
            .values()
            .map(|job| (job.next_run, job.id))
            .min()
            .map(|(at, id)| (id, at))
    }

    /// When a specific job last ran (or is treated as having last run).
    pub fn last_run(&self, id: JobId) -> Option<DateTime<Utc>> {
        self.jobs.get(&id).map(|job| job.last_run)
    }

    pub fn remove(&mut self, id: JobId) -> bool {
        self.jobs.remove(&id).is_some()
    }

    pub fn clear(&mut self) {
        self.jobs.clear();
        self.queue.clear();
    }

    pub fn len(&self) -> usize {
        self.jobs.len()
    }

    pub fn is_empty(&self) -> bool {
        self.jobs.is_empty()
    }

    fn register(&mut self, cadence: Cadence, task: job::Task) -> JobId {
        let id = self.next_id;
        self.next_id += 1;
        let job = Job::new(id, cadence, task, self.clock.now(), self.tz);
        tracing::info!(
            job = id,
            interval = cadence.interval,
            unit = %cadence.unit,
            next_run = %job.next_run,
            "job scheduled"
        );
        self.queue.push(Reverse((job.next_run, id)));
        self.jobs.insert(id, job);
        id
    }

    fn rebuild_queue(&mut self) {
        self.queue = self
            .jobs
            .values()
            .map(|job| Reverse((job.next_run, job.id)))
            .collect();
    }
}

// ---------------------------------------------------------------------------
// JobBuilder
// ---------------------------------------------------------------------------

/// Fluent job description returned by [`Scheduler::every`].
///
/// Selector mistakes are remembered and reported by [`run`](JobBuilder::run)
/// so the chain never has to be broken up.
#[must_use = "a job is only registered by calling run()"]
pub struct JobBuilder<'a> {
    scheduler: &'a mut Scheduler,
    interval: u32,
    unit: Option<Unit>,
    at: Option<TimeOfDay>,
    start_day: Option<Weekday>,
    error: Option<SchedulerError>,
}

impl<'a> JobBuilder<'a> {
    pub fn unit(mut self, unit: Unit) -> Self {
        self.unit = Some(unit);
        self
    }

    pub fn seconds(self) -> Self {
        self.unit(Unit::Seconds)
    }

    pub fn minutes(self) -> Self {
        self.unit(Unit::Minutes)
    }

    pub fn hours(self) -> Self {
        self.unit(Unit::Hours)
    }

    pub fn days(self) -> Self {
        self.unit(Unit::Days)
    }

    pub fn weeks(self) -> Self {
        self.unit(Unit::Weeks)
    }

    pub fn second(self) -> Self {
        self.single().unit(Unit::Seconds)
    }

    pub fn minute(self) -> Self {
        self.single().unit(Unit::Minutes)
    }

    pub fn hour(self) -> Self {
        self.single().unit(Unit::Hours)
    }

    pub fn day(self) -> Self {
        self.single().unit(Unit::Days)
    }

    /// A weekly job starting on `day`.
    pub fn weekday(mut self, day: Weekday) -> Self {
        self = self.single().unit(Unit::Weeks);
        self.start_day = Some(day);
        self
    }

    pub fn monday(self) -> Self {
        self.weekday(Weekday::Mon)
    }

    pub fn tuesday(self) -> Self {
        self.weekday(Weekday::Tue)
    }

    pub fn wednesday(self) -> Self {
        self.weekday(Weekday::Wed)
    }

    pub fn thursday(self) -> Self {
        self.weekday(Weekday::Thu)
    }

    pub fn friday(self) -> Self {
        self.weekday(Weekday::Fri)
    }

    pub fn saturday(self) -> Self {
        self.weekday(Weekday::Sat)
    }

    pub fn sunday(self) -> Self {
        self.weekday(Weekday::Sun)
    }

    /// Anchors the job at a wall-clock `HH:MM`. Days and weeks only.
    pub fn at(mut self, time: &str) -> Self {
        match time.parse::<TimeOfDay>() {
            Ok(t) => self.at = Some(t),
            Err(e) => self.fail(e),
        }
        self
    }

    /// Registers the job.
    pub fn run<F>(self, task: F) -> Result<JobId, SchedulerError>
    where
        F: FnMut() -> TaskResult + Send + 'static,
    {
        if let Some(err) = self.error {
            return Err(err);
        }
        let unit = self.unit.ok_or(SchedulerError::MissingUnit)?;
        let cadence = Cadence {
            interval: self.interval,
            unit,
            at: self.at,
            start_day: self.start_day,
        };
        cadence.validate()?;
        Ok(self.scheduler.register(cadence, Box::new(task)))
    }

    fn single(mut self) -> Self {
        if self.interval != 1 {
            let interval = self.interval;
            self.fail(SchedulerError::InvalidInterval(interval));
        }
        self
    }

    fn fail(&mut self, err: SchedulerError) {
        self.error.get_or_insert(err);
    }
}
