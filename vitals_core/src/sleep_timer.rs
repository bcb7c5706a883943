//! Crash-recoverable sleep timer.
//!
//! The timer holds nothing but the persisted start instant. Elapsed time is
//! always `now - start`, so a process restart only needs the caller to hand
//! the stored instant back through `resume`. The timer never reads or writes
//! storage itself: every mutating call returns the value the caller should
//! persist next (see `persisted`).

use crate::{Error, Result, SleepSession};
use chrono::{DateTime, Duration, Utc};

#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub struct SleepTimer {
    started_at: Option<DateTime<Utc>>,
}

impl SleepTimer {
    /// A timer with no open session
    pub fn new() -> Self {
        Self::default()
    }

    /// Rebuild the timer from the persisted start instant
    pub fn resume(persisted: Option<DateTime<Utc>>) -> Self {
        if let Some(since) = persisted {
            tracing::info!("Resuming sleep tracking started at {}", since);
        }
        Self {
            started_at: persisted,
        }
    }

    /// Value the caller should persist after the last operation
    pub fn persisted(&self) -> Option<DateTime<Utc>> {
        self.started_at
    }

    pub fn is_active(&self) -> bool {
        self.started_at.is_some()
    }

    /// Open a session at `now`
    pub fn start(&mut self, now: DateTime<Utc>) -> Result<DateTime<Utc>> {
        if let Some(since) = self.started_at {
            return Err(Error::AlreadyActive { since });
        }
        self.started_at = Some(now);
        tracing::info!("Sleep tracking started at {}", now);
        Ok(now)
    }

    /// Time since the session opened, clamped at zero; None when idle
    pub fn elapsed(&self, now: DateTime<Utc>) -> Option<Duration> {
        self.started_at
            .map(|since| (now - since).max(Duration::zero()))
    }

    /// Close the session at `now` and return it
    ///
    /// A stop at or before the start instant is rejected and leaves the
    /// session open, since a session must have positive duration.
    pub fn stop(&mut self, now: DateTime<Utc>) -> Result<SleepSession> {
        let since = self.started_at.ok_or(Error::NotActive)?;
        let session = SleepSession::from_bounds(since, now).ok_or_else(|| {
            Error::InvalidInput(format!(
                "Sleep stop time {} is not after start time {}",
                now, since
            ))
        })?;
        self.started_at = None;
        tracing::info!(
            "Sleep tracking stopped after {:.2} h",
            session.hours()
        );
        Ok(session)
    }
}
