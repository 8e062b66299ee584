//! The multi-step ceremony guarding a full system reset.
//!
//! trigger -> own PIN -> one-time token -> confirmation phrase. Only a
//! completed ceremony yields a [`ResetAuthorization`], and only that value
//! can build [`Action::ResetSystem`](crate::engine::Action::ResetSystem).

use std::collections::{HashMap, VecDeque};

use chrono::{DateTime, Duration, Utc};
use rand::Rng;

use crate::auth::password::verify_pin;
use crate::error::ResetError;
use crate::model::{Pin, Role, User, UserId};

pub const CONFIRMATION_PHRASE: &str = "RESET DATABASE CONFIRMED";

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CeremonyStep {
    Pin,
    Token,
    Phrase,
}

#[derive(Debug)]
struct Ceremony {
    step: CeremonyStep,
    token: u16,
    opened_at: DateTime<Utc>,
}

/// Proof that the actor completed every step. Not constructible elsewhere.
#[derive(Debug)]
pub struct ResetAuthorization {
    actor: UserId,
    opened_at: DateTime<Utc>,
    confirmed_at: DateTime<Utc>,
}

impl ResetAuthorization {
    pub fn actor(&self) -> &UserId {
        &self.actor
    }

    /// Audit details recorded with the reset.
    pub fn summary(&self) -> String {
        format!(
            "Ceremony opened {} and confirmed {} (PIN, one-time token, phrase)",
            self.opened_at.to_rfc3339(),
            self.confirmed_at.to_rfc3339()
        )
    }
}

#[derive(Debug)]
pub struct ResetGuard {
    max_per_window: usize,
    window: Duration,
    freshness: Duration,
    triggers: HashMap<UserId, VecDeque<DateTime<Utc>>>,
    failures: HashMap<UserId, u32>,
    ceremonies: HashMap<UserId, Ceremony>,
}

impl ResetGuard {
    /// At most `max_per_hour` triggers per actor in any rolling hour, and
    /// only within `freshness` of the actor's last sign-in.
    pub fn new(max_per_hour: usize, freshness: Duration) -> Self {
        Self {
            max_per_window: max_per_hour,
            window: Duration::hours(1),
            freshness,
            triggers: HashMap::new(),
            failures: HashMap::new(),
            ceremonies: HashMap::new(),
        }
    }

    /// Opens a ceremony and returns the one-time token to display.
    pub fn trigger(&mut self, actor: &User, now: DateTime<Utc>) -> Result<u16, ResetError> {
        if actor.role != Role::SuperAdmin || !actor.is_in_service() {
            return Err(ResetError::NotPermitted);
        }

        let window = self.window;
        let recent = self.triggers.entry(actor.id.clone()).or_default();
        while recent.front().is_some_and(|t| now - *t >= window) {
            recent.pop_front();
        }
        if recent.len() >= self.max_per_window {
            let retry_after = recent
                .front()
                .map(|oldest| (*oldest + window - now).num_seconds())
                .unwrap_or_default();
            return Err(ResetError::RateLimited {
                retry_after_secs: retry_after.max(1),
            });
        }

        let fresh = actor
            .last_login
            .is_some_and(|login| now - login <= self.freshness);
        if !fresh {
            return Err(ResetError::StaleSession);
        }

        recent.push_back(now);
        let token = rand::thread_rng().gen_range(1000..=9999);
        self.ceremonies.insert(
            actor.id.clone(),
            Ceremony {
                step: CeremonyStep::Pin,
                token,
                opened_at: now,
            },
        );
        Ok(token)
    }

    pub fn step(&self, actor: &UserId) -> Option<CeremonyStep> {
        self.ceremonies.get(actor).map(|c| c.step)
    }

    pub fn confirm_pin(&mut self, actor: &User, pin: &Pin) -> Result<(), ResetError> {
        let ok = verify_pin(pin, &actor.pin_hash);
        self.advance(&actor.id, CeremonyStep::Pin, ok, ResetError::PinMismatch)
            .map(|_| ())
    }

    pub fn confirm_token(&mut self, actor: &UserId, token: &str) -> Result<(), ResetError> {
        let expected = self.ceremonies.get(actor).map(|c| c.token.to_string());
        let ok = expected.as_deref() == Some(token.trim());
        self.advance(actor, CeremonyStep::Token, ok, ResetError::TokenMismatch)
            .map(|_| ())
    }

    /// The phrase must match exactly, case included.
    pub fn confirm_phrase(
        &mut self,
        actor: &UserId,
        phrase: &str,
        now: DateTime<Utc>,
    ) -> Result<ResetAuthorization, ResetError> {
        let ok = phrase == CONFIRMATION_PHRASE;
        match self.advance(actor, CeremonyStep::Phrase, ok, ResetError::PhraseMismatch)? {
            Some(ceremony) => Ok(ResetAuthorization {
                actor: actor.clone(),
                opened_at: ceremony.opened_at,
                confirmed_at: now,
            }),
            None => Err(ResetError::OutOfOrder),
        }
    }

    /// Failed confirmations recorded against `actor`.
    pub fn failed_attempts(&self, actor: &UserId) -> u32 {
        self.failures.get(actor).copied().unwrap_or(0)
    }

    pub fn cancel(&mut self, actor: &UserId) {
        self.ceremonies.remove(actor);
    }

    /// Moves past `expected` on success; a mismatch closes the ceremony.
    /// Yields the ceremony once its final step is passed.
    fn advance(
        &mut self,
        actor: &UserId,
        expected: CeremonyStep,
        ok: bool,
        mismatch: ResetError,
    ) -> Result<Option<Ceremony>, ResetError> {
        let Some(mut ceremony) = self.ceremonies.remove(actor) else {
            return Err(ResetError::NoCeremony);
        };
        if ceremony.step != expected {
            self.ceremonies.insert(actor.clone(), ceremony);
            return Err(ResetError::OutOfOrder);
        }
        if !ok {
            *self.failures.entry(actor.clone()).or_default() += 1;
            return Err(mismatch);
        }

        ceremony.step = match expected {
            CeremonyStep::Pin => CeremonyStep::Token,
            CeremonyStep::Token => CeremonyStep::Phrase,
            CeremonyStep::Phrase => return Ok(Some(ceremony)),
        };
        self.ceremonies.insert(actor.clone(), ceremony);
        Ok(None)
    }
}
