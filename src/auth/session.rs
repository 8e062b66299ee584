//! Per-session inactivity timers.
//!
//! A session lives `total` from its last restart. The final `warning` of
//! that window is the warning phase: activity there no longer restarts the
//! timer, only an explicit extend does.

use std::time::Duration as StdDuration;

use chrono::{DateTime, Duration, Utc};
use moka::sync::Cache;
use serde::Serialize;
use utoipa::ToSchema;

use crate::error::AuthError;

const MAX_SESSIONS: u64 = 10_000;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, ToSchema)]
#[serde(rename_all = "lowercase")]
pub enum SessionPhase {
    Active,
    Warning,
    Expired,
}

#[derive(Debug, Clone, Copy)]
pub struct SessionTimer {
    started: DateTime<Utc>,
    total: Duration,
    warning: Duration,
}

impl SessionTimer {
    pub fn new(now: DateTime<Utc>, total: Duration, warning: Duration) -> Self {
        Self {
            started: now,
            total,
            warning: warning.min(total),
        }
    }

    pub fn remaining(&self, now: DateTime<Utc>) -> Duration {
        (self.started + self.total - now).max(Duration::zero())
    }

    pub fn phase(&self, now: DateTime<Utc>) -> SessionPhase {
        let remaining = self.remaining(now);
        if remaining <= Duration::zero() {
            SessionPhase::Expired
        } else if remaining <= self.warning {
            SessionPhase::Warning
        } else {
            SessionPhase::Active
        }
    }

    /// Qualifying activity. Restarts the timer only outside the warning window.
    pub fn touch(&mut self, now: DateTime<Utc>) -> SessionPhase {
        let phase = self.phase(now);
        if phase == SessionPhase::Active {
            self.started = now;
        }
        phase
    }

    /// Explicit "stay signed in". Too late once expired.
    pub fn extend(&mut self, now: DateTime<Utc>) -> SessionPhase {
        match self.phase(now) {
            SessionPhase::Expired => SessionPhase::Expired,
            _ => {
                self.started = now;
                SessionPhase::Active
            }
        }
    }
}

#[derive(Debug, Clone, Serialize, ToSchema)]
pub struct SessionStatus {
    pub phase: SessionPhase,
    #[schema(example = 540)]
    pub remaining_secs: i64,
}

impl SessionStatus {
    fn of(timer: &SessionTimer, now: DateTime<Utc>) -> Self {
        Self {
            phase: timer.phase(now),
            remaining_secs: timer.remaining(now).num_seconds(),
        }
    }
}

/// Live sessions keyed by token id.
#[derive(Clone)]
pub struct SessionRegistry {
    timers: Cache<String, SessionTimer>,
    total: Duration,
    warning: Duration,
}

impl SessionRegistry {
    pub fn new(total: Duration, warning: Duration) -> Self {
        let idle = total.to_std().unwrap_or(StdDuration::from_secs(600));
        Self {
            timers: Cache::builder()
                .max_capacity(MAX_SESSIONS)
                .time_to_idle(idle)
                .build(),
            total,
            warning,
        }
    }

    pub fn open(&self, session: &str, now: DateTime<Utc>) -> SessionStatus {
        let timer = SessionTimer::new(now, self.total, self.warning);
        self.timers.insert(session.to_string(), timer);
        SessionStatus::of(&timer, now)
    }

    pub fn touch(&self, session: &str, now: DateTime<Utc>) -> Result<SessionStatus, AuthError> {
        self.update(session, now, |timer| {
            timer.touch(now);
        })
    }

    pub fn extend(&self, session: &str, now: DateTime<Utc>) -> Result<SessionStatus, AuthError> {
        self.update(session, now, |timer| {
            timer.extend(now);
        })
    }

    /// Reads the timer without counting as activity.
    pub fn status(&self, session: &str, now: DateTime<Utc>) -> Result<SessionStatus, AuthError> {
        self.update(session, now, |_| {})
    }

    pub fn close(&self, session: &str) {
        self.timers.invalidate(session);
    }

    fn update(
        &self,
        session: &str,
        now: DateTime<Utc>,
        f: impl FnOnce(&mut SessionTimer),
    ) -> Result<SessionStatus, AuthError> {
        let mut timer = self
            .timers
            .get(session)
            .ok_or(AuthError::SessionExpired)?;
        if timer.phase(now) == SessionPhase::Expired {
            self.close(session);
            return Err(AuthError::SessionExpired);
        }

        f(&mut timer);
        self.timers.insert(session.to_string(), timer);
        Ok(SessionStatus::of(&timer, now))
    }
}
