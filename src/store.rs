//! The desk: one state container per process.
//!
//! Every change goes through [`LeaveDesk::dispatch`]. The reducer runs under
//! the state lock and its sync batch joins a single ordered queue before the
//! lock is released. The local fallback store is written afterwards. Local
//! state is the authority: the gateway is only read at startup.

use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};

use chrono::{DateTime, Utc};
use tokio::sync::mpsc;
use tracing::{debug, info, warn};

use crate::auth::password::{hash_pin, verify_pin};
use crate::config::DeskSettings;
use crate::engine::{Action, ResetGuard, Transition, apply, bootstrap_admin};
use crate::error::{AuthError, DeskError, ResetError, TransitionError};
use crate::gateway::{GatewayError, SyncAction, SyncGateway};
use crate::model::{AppState, Pin, User, UserId};
use crate::utils::local_store::LocalStore;

/// Result of forwarding one sync operation.
#[derive(Debug, Clone)]
pub struct SyncOutcome {
    pub kind: &'static str,
    pub error: Option<String>,
}

pub type SyncObserver = Arc<dyn Fn(SyncOutcome) + Send + Sync>;

fn log_outcome(outcome: SyncOutcome) {
    match outcome.error {
        None => debug!(kind = outcome.kind, "sync forwarded"),
        Some(error) => warn!(kind = outcome.kind, %error, "sync failed, local state kept"),
    }
}

/// Super administrator created when no state exists anywhere.
#[derive(Debug, Clone)]
pub struct Seed {
    pub name: String,
    pub pin: Pin,
}

type SyncBatch = Vec<SyncAction>;

pub struct LeaveDesk {
    state: Mutex<AppState>,
    /// Bumped under the state lock, once per committed change.
    revision: AtomicU64,
    /// Newest revision written to the local store.
    persisted: Mutex<u64>,
    gateway: Arc<dyn SyncGateway>,
    local: Option<LocalStore>,
    outbox: mpsc::UnboundedSender<SyncBatch>,
    /// Taken by the sync worker the first time a runtime is available.
    inbox: Mutex<Option<mpsc::UnboundedReceiver<SyncBatch>>>,
    guard: Mutex<ResetGuard>,
    settings: DeskSettings,
    observer: SyncObserver,
}

fn lock<T>(mutex: &Mutex<T>) -> MutexGuard<'_, T> {
    mutex.lock().unwrap_or_else(PoisonError::into_inner)
}

impl LeaveDesk {
    pub fn new(
        state: AppState,
        gateway: Arc<dyn SyncGateway>,
        local: Option<LocalStore>,
        settings: DeskSettings,
    ) -> Self {
        let guard = ResetGuard::new(settings.reset_attempts_per_hour, settings.reset_freshness);
        let (outbox, inbox) = mpsc::unbounded_channel();
        Self {
            state: Mutex::new(state),
            revision: AtomicU64::new(0),
            persisted: Mutex::new(0),
            gateway,
            local,
            outbox,
            inbox: Mutex::new(Some(inbox)),
            guard: Mutex::new(guard),
            settings,
            observer: Arc::new(log_outcome),
        }
    }

    /// Loads from the gateway, else the local store, else starts empty.
    /// An empty desk gets `seed` as its super administrator.
    pub async fn bootstrap(
        gateway: Arc<dyn SyncGateway>,
        local: Option<LocalStore>,
        settings: DeskSettings,
        seed: Option<Seed>,
    ) -> Result<Self, DeskError> {
        let mut state = match gateway.fetch_all().await {
            Ok(snapshot) if !snapshot.is_empty() => match snapshot.into_state() {
                Ok(state) => {
                    info!(gateway = gateway.name(), users = state.users.len(), "state loaded from gateway");
                    Some(state)
                }
                Err(e) => {
                    warn!(error = %e, "gateway snapshot unusable");
                    None
                }
            },
            Ok(_) => None,
            Err(e) => {
                warn!(gateway = gateway.name(), error = %e, "gateway unreachable at startup");
                None
            }
        };

        if state.is_none() {
            if let Some(store) = &local {
                match store.load() {
                    Ok(Some(saved)) => {
                        info!(path = %store.path().display(), "state loaded from local store");
                        state = Some(saved);
                    }
                    Ok(None) => {}
                    Err(e) => warn!(error = %e, "local store unreadable, starting empty"),
                }
            }
        }

        let desk = Self::new(state.unwrap_or_default(), gateway, local, settings);

        if let Some(seed) = seed {
            if desk.read(|s| s.users.is_empty()) {
                let transition = bootstrap_admin(&seed.name, hash_pin(&seed.pin)?, Utc::now())?;
                desk.install(transition);
                info!(name = %seed.name, "seeded super administrator");
            }
        }

        Ok(desk)
    }

    /// Must be set before the first change is dispatched.
    pub fn with_sync_observer(mut self, observer: impl Fn(SyncOutcome) + Send + Sync + 'static) -> Self {
        self.observer = Arc::new(observer);
        self
    }

    pub fn settings(&self) -> &DeskSettings {
        &self.settings
    }

    pub fn snapshot(&self) -> AppState {
        lock(&self.state).clone()
    }

    pub fn read<R>(&self, f: impl FnOnce(&AppState) -> R) -> R {
        f(&lock(&self.state))
    }

    pub fn dispatch(&self, action: Action) -> Result<Transition, DeskError> {
        self.dispatch_at(action, Utc::now())
    }

    pub fn dispatch_at(&self, action: Action, now: DateTime<Utc>) -> Result<Transition, DeskError> {
        let name = action.name();
        let (transition, revision) = {
            let mut state = lock(&self.state);
            let transition = apply(&state, action, now).map_err(|e| {
                debug!(action = name, error = %e, "action refused");
                e
            })?;
            *state = transition.state.clone();
            // enqueued under the lock so batches keep the order of the changes
            self.forward(transition.sync.clone());
            (transition, self.next_revision())
        };

        self.persist(revision, &transition.state);
        info!(action = name, sync = transition.sync.len(), "action applied");
        Ok(transition)
    }

    /* ===============================
    Sign-in
    =============================== */

    /// Checks the PIN and records the outcome. Falls back to the gateway
    /// for users this desk does not know yet.
    pub async fn authenticate(&self, name: &str, pin: &Pin, now: DateTime<Utc>) -> Result<User, DeskError> {
        let known = self.read(|s| s.roster_user(name).cloned());

        let (user, verified) = match known {
            Some(user) if !user.pin_hash.is_empty() => (user, false),
            _ => match self.gateway.verify(name, pin).await {
                Ok(Some(record)) => {
                    let user = User::try_from(record).map_err(GatewayError::from)?;
                    self.adopt(user.clone());
                    (user, true)
                }
                Ok(None) => return Err(AuthError::InvalidCredentials.into()),
                Err(e) => {
                    debug!(error = %e, "remote verification unavailable");
                    return Err(AuthError::InvalidCredentials.into());
                }
            },
        };

        if user.is_terminated() {
            return Err(AuthError::InvalidCredentials.into());
        }
        if user.is_blocked {
            return Err(AuthError::Blocked.into());
        }
        if !user.is_approved || !user.is_active {
            return Err(AuthError::PendingApproval.into());
        }

        if !verified && !verify_pin(pin, &user.pin_hash) {
            let attempt = Action::RecordFailedAttempt {
                name: user.name.clone(),
                lock_after: self.settings.max_failed_logins,
            };
            if let Err(e) = self.dispatch_at(attempt, now) {
                warn!(error = %e, "failed attempt not recorded");
            }
            return Err(AuthError::InvalidCredentials.into());
        }

        let transition = self.dispatch_at(Action::Login { user_id: user.id.clone() }, now)?;
        transition
            .state
            .user(&user.id)
            .cloned()
            .ok_or_else(|| TransitionError::UnknownUser(user.id.to_string()).into())
    }

    /* ===============================
    System reset ceremony
    =============================== */

    fn reset_actor(&self, actor: &UserId) -> Result<User, DeskError> {
        self.read(|s| s.user(actor).cloned())
            .ok_or_else(|| TransitionError::UnknownUser(actor.to_string()).into())
    }

    fn ceremony<T>(&self, actor: &UserId, result: Result<T, ResetError>) -> Result<T, DeskError> {
        if let Err(e) = &result {
            let failures = lock(&self.guard).failed_attempts(actor);
            warn!(actor = %actor, error = %e, failures, "reset ceremony step refused");
        }
        result.map_err(DeskError::from)
    }

    /// Returns the one-time token to show the actor.
    pub fn trigger_reset(&self, actor: &UserId, now: DateTime<Utc>) -> Result<u16, DeskError> {
        let user = self.reset_actor(actor)?;
        let result = lock(&self.guard).trigger(&user, now);
        self.ceremony(actor, result)
    }

    pub fn confirm_reset_pin(&self, actor: &UserId, pin: &Pin) -> Result<(), DeskError> {
        let user = self.reset_actor(actor)?;
        let result = lock(&self.guard).confirm_pin(&user, pin);
        self.ceremony(actor, result)
    }

    pub fn confirm_reset_token(&self, actor: &UserId, token: &str) -> Result<(), DeskError> {
        let result = lock(&self.guard).confirm_token(actor, token);
        self.ceremony(actor, result)
    }

    /// Final step. Only a completed ceremony reaches the reducer.
    pub fn execute_reset(&self, actor: &UserId, phrase: &str, now: DateTime<Utc>) -> Result<Transition, DeskError> {
        let result = lock(&self.guard).confirm_phrase(actor, phrase, now);
        let authorization = self.ceremony(actor, result)?;
        warn!(actor = %actor, "executing full system reset");
        self.dispatch_at(Action::ResetSystem(authorization), now)
    }

    pub fn cancel_reset(&self, actor: &UserId) {
        lock(&self.guard).cancel(actor);
    }

    /* ===============================
    Internals
    =============================== */

    fn next_revision(&self) -> u64 {
        self.revision.fetch_add(1, Ordering::SeqCst) + 1
    }

    fn install(&self, transition: Transition) {
        let revision = {
            let mut state = lock(&self.state);
            *state = transition.state.clone();
            self.forward(transition.sync);
            self.next_revision()
        };
        self.persist(revision, &transition.state);
    }

    /// Takes a user record the gateway vouched for.
    fn adopt(&self, user: User) {
        let (snapshot, revision) = {
            let mut state = lock(&self.state);
            match state.user_mut(&user.id) {
                Some(existing) => *existing = user,
                None => state.users.push(user),
            }
            (state.clone(), self.next_revision())
        };
        self.persist(revision, &snapshot);
    }

    /// Writes `state` unless a newer revision is already on disk.
    fn persist(&self, revision: u64, state: &AppState) {
        let Some(store) = &self.local else {
            return;
        };
        let mut persisted = lock(&self.persisted);
        if revision <= *persisted {
            return;
        }
        match store.save(state) {
            Ok(()) => *persisted = revision,
            Err(e) => warn!(error = %e, "local store write failed"),
        }
    }

    /// Queues the batch for the sync worker. Batches are sent one at a time,
    /// in the order they were queued.
    fn forward(&self, actions: SyncBatch) {
        if actions.is_empty() {
            return;
        }
        self.start_sync_worker();
        if self.outbox.send(actions).is_err() {
            warn!("sync worker gone, batch dropped");
        }
    }

    fn start_sync_worker(&self) {
        let Ok(handle) = tokio::runtime::Handle::try_current() else {
            return;
        };
        let Some(mut inbox) = lock(&self.inbox).take() else {
            return;
        };

        let gateway = Arc::clone(&self.gateway);
        let observer = Arc::clone(&self.observer);
        handle.spawn(async move {
            while let Some(batch) = inbox.recv().await {
                for action in batch {
                    let kind = action.kind();
                    let error = gateway.sync(action).await.err().map(|e| e.to_string());
                    observer(SyncOutcome { kind, error });
                }
            }
            debug!("sync worker stopped");
        });
    }
}
