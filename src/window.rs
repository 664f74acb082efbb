//! Time window selection for a sync run.
//!
//! A run covers the half-open interval `[now - span, now)`. `now` is read
//! exactly once, by the caller, so the window logged at the start of a run
//! is the window the run actually queried.

use chrono::{DateTime, Duration, Utc};
use std::fmt;

use crate::error::{SyncError, SyncResult};
use crate::models::format_ts;

/// Upper bound for a recovery window (about a century).
pub const MAX_DAYS_BACK: i64 = 36_500;

/// How far back a run looks.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RunMode {
    /// The last hour. Meant to be triggered by an external scheduler.
    Hourly,
    /// The last `days_back` days, for manual backfill.
    Recover { days_back: u32 },
}

impl RunMode {
    /// Validate a recovery request. `days_back` must be at least 1.
    pub fn recover(days_back: i64) -> SyncResult<Self> {
        if days_back < 1 {
            return Err(SyncError::InvalidInput(format!(
                "days back must be >= 1, got {}",
                days_back
            )));
        }
        if days_back > MAX_DAYS_BACK {
            return Err(SyncError::InvalidInput(format!(
                "days back must be <= {}, got {}",
                MAX_DAYS_BACK, days_back
            )));
        }
        Ok(RunMode::Recover {
            days_back: days_back as u32,
        })
    }

    /// Label used for export file names.
    pub fn label(&self) -> &'static str {
        match self {
            RunMode::Hourly => "hourly",
            RunMode::Recover { .. } => "recovered",
        }
    }

    pub fn span(&self) -> Duration {
        match self {
            RunMode::Hourly => Duration::hours(1),
            RunMode::Recover { days_back } => Duration::days(i64::from(*days_back)),
        }
    }

    /// The window ending at `now`.
    pub fn window(&self, now: DateTime<Utc>) -> TimeWindow {
        TimeWindow {
            start: now - self.span(),
            end: now,
        }
    }
}

/// Half-open UTC interval `[start, end)`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct TimeWindow {
    pub start: DateTime<Utc>,
    pub end: DateTime<Utc>,
}

impl TimeWindow {
    pub fn new(start: DateTime<Utc>, end: DateTime<Utc>) -> SyncResult<Self> {
        if start > end {
            return Err(SyncError::InvalidInput(format!(
                "window start {} is after end {}",
                format_ts(&start),
                format_ts(&end)
            )));
        }
        Ok(Self { start, end })
    }

    pub fn contains(&self, ts: &DateTime<Utc>) -> bool {
        *ts >= self.start && *ts < self.end
    }
}

impl fmt::Display for TimeWindow {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "[{}, {})", format_ts(&self.start), format_ts(&self.end))
    }
}
