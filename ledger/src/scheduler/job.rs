//! Job model: units, time-of-day anchors and first-run anchoring.

use std::fmt;
use std::str::FromStr;

use chrono::{DateTime, Datelike, Duration, FixedOffset, NaiveDate, NaiveTime, TimeZone, Utc, Weekday};

use super::SchedulerError;

pub type JobId = u64;

/// What a task returns. Errors are logged and do not stop the schedule.
pub type TaskResult = Result<(), Box<dyn std::error::Error + Send + Sync>>;

pub(crate) type Task = Box<dyn FnMut() -> TaskResult + Send>;

/// Period unit of a job.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Unit {
    Seconds,
    Minutes,
    Hours,
    Days,
    Weeks,
}

impl Unit {
    pub fn seconds(&self) -> i64 {
        match self {
            Unit::Seconds => 1,
            Unit::Minutes => 60,
            Unit::Hours => 60 * 60,
            Unit::Days => 24 * 60 * 60,
            Unit::Weeks => 7 * 24 * 60 * 60,
        }
    }

    pub fn name(&self) -> &'static str {
        match self {
            Unit::Seconds => "seconds",
            Unit::Minutes => "minutes",
            Unit::Hours => "hours",
            Unit::Days => "days",
            Unit::Weeks => "weeks",
        }
    }

    fn accepts_anchor(&self) -> bool {
        matches!(self, Unit::Days | Unit::Weeks)
    }
}

impl fmt::Display for Unit {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

impl FromStr for Unit {
    type Err = SchedulerError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "second" | "seconds" => Ok(Unit::Seconds),
            "minute" | "minutes" => Ok(Unit::Minutes),
            "hour" | "hours" => Ok(Unit::Hours),
            "day" | "days" => Ok(Unit::Days),
            "week" | "weeks" => Ok(Unit::Weeks),
            _ => Err(SchedulerError::UnknownUnit(s.to_string())),
        }
    }
}

/// A wall-clock `HH:MM` anchor.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct TimeOfDay(NaiveTime);

impl TimeOfDay {
    pub fn midnight() -> Self {
        TimeOfDay(NaiveTime::default())
    }

    pub fn time(&self) -> NaiveTime {
        self.0
    }
}

impl FromStr for TimeOfDay {
    type Err = SchedulerError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let invalid = || SchedulerError::InvalidTimeOfDay(s.to_string());
        let (h, m) = s.split_once(':').ok_or_else(invalid)?;
        let digits = |part: &str| !part.is_empty() && part.bytes().all(|b| b.is_ascii_digit());
        if !digits(h) || h.len() > 2 || !digits(m) || m.len() != 2 {
            return Err(invalid());
        }
        let hour: u32 = h.parse().map_err(|_| invalid())?;
        let minute: u32 = m.parse().map_err(|_| invalid())?;
        NaiveTime::from_hms_opt(hour, minute, 0)
            .map(TimeOfDay)
            .ok_or_else(invalid)
    }
}

/// Timing parameters fixed at registration.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Cadence {
    pub interval: u32,
    pub unit: Unit,
    pub at: Option<TimeOfDay>,
    pub start_day: Option<Weekday>,
}

impl Cadence {
    pub(crate) fn validate(&self) -> Result<(), SchedulerError> {
        if self.interval == 0 {
            return Err(SchedulerError::InvalidInterval(0));
        }
        if self.at.is_some() && !self.unit.accepts_anchor() {
            return Err(SchedulerError::AnchorNotSupported(self.unit));
        }
        Ok(())
    }

    pub fn period(&self) -> Duration {
        Duration::seconds(i64::from(self.interval) * self.unit.seconds())
    }

    /// The `last_run` a freshly registered job starts from.
    ///
    /// Anchored daily jobs pretend they last ran at the most recent passed
    /// anchor. Weekly jobs pretend they last ran on the most recent start
    /// weekday at the anchor (midnight if none). Everything else starts now.
    pub(crate) fn initial_last_run(&self, now: DateTime<Utc>, tz: FixedOffset) -> DateTime<Utc> {
        let local = now.with_timezone(&tz);
        match (self.unit, self.at) {
            (Unit::Days, Some(at)) => {
                let today = anchor_utc(local.date_naive(), at, tz);
                if today <= now {
                    today
                } else {
                    today - Duration::days(1)
                }
            }
            (Unit::Weeks, at) => {
                let at = at.unwrap_or_else(TimeOfDay::midnight);
                let start = self.start_day.unwrap_or_else(|| local.weekday());
                let back = (7 + local.weekday().num_days_from_monday()
                    - start.num_days_from_monday())
                    % 7;
                let candidate =
                    anchor_utc(local.date_naive() - Duration::days(i64::from(back)), at, tz);
                if candidate <= now {
                    candidate
                } else {
                    candidate - Duration::weeks(1)
                }
            }
            _ => now,
        }
    }
}

fn anchor_utc(date: NaiveDate, at: TimeOfDay, tz: FixedOffset) -> DateTime<Utc> {
    let local = date.and_time(at.time()) - Duration::seconds(i64::from(tz.local_minus_utc()));
    Utc.from_utc_datetime(&local)
}

pub(crate) struct Job {
    pub(crate) id: JobId,
    pub(crate) cadence: Cadence,
    pub(crate) last_run: DateTime<Utc>,
    pub(crate) next_run: DateTime<Utc>,
    task: Task,
}

impl Job {
    pub(crate) fn new(id: JobId, cadence: Cadence, task: Task, now: DateTime<Utc>, tz: FixedOffset) -> Self {
        let last_run = cadence.initial_last_run(now, tz);
        Self {
            id,
            cadence,
            last_run,
            next_run: last_run + cadence.period(),
            task,
        }
    }

    /// Runs the task once and reschedules from `now`.
    pub(crate) fn run(&mut self, now: DateTime<Utc>) {
        match (self.task)() {
            Ok(()) => tracing::debug!(job = self.id, "job ran"),
            Err(e) => tracing::warn!(job = self.id, error = %e, "job failed"),
        }
        self.last_run = now;
        self.next_run = now + self.cadence.period();
    }
}
