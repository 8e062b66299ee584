//! The single place where desk state changes.
//!
//! [`apply`] works on a clone of the current state and hands back the next
//! state only when every check passed, so a failed action never leaves a
//! partial mutation behind. Each successful action appends exactly one audit
//! entry and lists the sync operations the gateway should replay.

use chrono::{DateTime, Utc};

use crate::auth::policy::{authorize_role_assignment, ensure_can_manage, require_global};
use crate::engine::action::Action;
use crate::engine::evaluator::{evaluate, evaluate_excluding, find_conflicts};
use crate::engine::system_reset::ResetAuthorization;
use crate::error::{TransitionError, ValidationError};
use crate::gateway::{
    AuditRecord, EntityRef, NotificationRecord, PurgeScope, RecordUpdate, RequestRecord,
    ResetRecord, SyncAction, UserRecord,
};
use crate::model::{
    AppState, AuditId, Balances, Branch, Department, LeaveDates, LeaveRequest, LeaveStatus,
    LeaveType, Notification, NotificationId, Registration, RequestId, ResetRequest,
    ResetRequestId, ResetStatus, Role, User, UserChanges, UserId, normalize_name,
};

/// What a transition was about, so callers can render it.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Subject {
    None,
    User(UserId),
    Request(RequestId),
    Requests(Vec<RequestId>),
    Reset(ResetRequestId),
}

#[derive(Debug)]
pub struct Transition {
    pub state: AppState,
    pub sync: Vec<SyncAction>,
    pub subject: Subject,
}

struct Draft {
    state: AppState,
    now: DateTime<Utc>,
    sync: Vec<SyncAction>,
}

impl Draft {
    fn new(state: AppState, now: DateTime<Utc>) -> Self {
        Self {
            state,
            now,
            sync: Vec::new(),
        }
    }

    fn finish(self, subject: Subject) -> Transition {
        Transition {
            state: self.state,
            sync: self.sync,
            subject,
        }
    }

    /// In-service user the action is performed by.
    fn actor(&self, id: &UserId) -> Result<User, TransitionError> {
        let user = self.target(id)?;
        if !user.is_in_service() {
            return Err(TransitionError::InactiveAccount);
        }
        Ok(user)
    }

    fn target(&self, id: &UserId) -> Result<User, TransitionError> {
        self.state
            .user(id)
            .cloned()
            .ok_or_else(|| TransitionError::UnknownUser(id.to_string()))
    }

    fn user_mut(&mut self, id: &UserId) -> Result<&mut User, TransitionError> {
        self.state
            .user_mut(id)
            .ok_or_else(|| TransitionError::UnknownUser(id.to_string()))
    }

    fn request(&self, id: &RequestId) -> Result<LeaveRequest, TransitionError> {
        self.state
            .request(id)
            .cloned()
            .ok_or_else(|| TransitionError::UnknownRequest(id.clone()))
    }

    fn request_mut(&mut self, id: &RequestId) -> Result<&mut LeaveRequest, TransitionError> {
        self.state
            .request_mut(id)
            .ok_or_else(|| TransitionError::UnknownRequest(id.clone()))
    }

    fn audit(&mut self, action: &str, performed_by: &str, details: Option<String>) {
        let entry = crate::model::AuditLog {
            id: AuditId::generate(),
            action: action.to_string(),
            performed_by: performed_by.to_string(),
            timestamp: self.now,
            details,
        };
        self.sync
            .push(SyncAction::AppendAudit(AuditRecord::from(&entry)));
        self.state.audit_logs.push(entry);
    }

    fn notify(&mut self, user_id: &UserId, message: String) {
        let notification = Notification {
            id: NotificationId::generate(),
            user_id: user_id.clone(),
            message,
            is_read: false,
            timestamp: self.now,
        };
        self.sync.push(SyncAction::AddNotification(NotificationRecord::from(
            &notification,
        )));
        self.state.notifications.push(notification);
    }

    /// Notifies every in-service user matching `to`, except `skip`.
    fn broadcast(&mut self, to: fn(&User) -> bool, skip: &[&UserId], message: &str) {
        let recipients: Vec<UserId> = self
            .state
            .users
            .iter()
            .filter(|u| u.is_in_service() && to(u) && !skip.contains(&&u.id))
            .map(|u| u.id.clone())
            .collect();
        for id in recipients {
            self.notify(&id, message.to_string());
        }
    }

    fn sync_user(&mut self, id: &UserId, columns: &[&str]) {
        if let Some(user) = self.state.user(id) {
            let update = RecordUpdate::of(id.as_str(), &UserRecord::from(user), columns);
            self.sync.push(SyncAction::UpdateUser(update));
        }
    }

    fn sync_request(&mut self, id: &RequestId, columns: &[&str]) {
        if let Some(request) = self.state.request(id) {
            let update = RecordUpdate::of(id.as_str(), &RequestRecord::from(request), columns);
            self.sync.push(SyncAction::UpdateRequest(update));
        }
    }

    fn ensure_name_free(&self, name: &str, owner: Option<&UserId>) -> Result<(), TransitionError> {
        match self.state.roster_user(name) {
            Some(existing) if Some(&existing.id) != owner => {
                Err(TransitionError::NameTaken(existing.name.clone()))
            }
            _ => Ok(()),
        }
    }

    /// At most one active operations manager, one active branch manager per branch.
    fn ensure_unique_manager(
        &self,
        role: Role,
        branch: Branch,
        except: Option<&UserId>,
    ) -> Result<(), TransitionError> {
        let clash = |u: &User| {
            u.is_active
                && Some(&u.id) != except
                && u.role == role
                && (role == Role::OperationsManager || u.branch == branch)
        };
        match role {
            Role::OperationsManager if self.state.users.iter().any(clash) => {
                Err(TransitionError::DuplicateOperationsManager)
            }
            Role::BranchManager if self.state.users.iter().any(clash) => {
                Err(TransitionError::DuplicateBranchManager(branch))
            }
            _ => Ok(()),
        }
    }

    /* ===============================
    Personnel
    =============================== */

    fn login(&mut self, user_id: &UserId) -> Result<Subject, TransitionError> {
        let user = self.actor(user_id)?;
        let now = self.now;
        let record = self.user_mut(user_id)?;
        record.failed_attempts = 0;
        record.last_login = Some(now);

        self.sync_user(user_id, &["failed_attempts", "last_login"]);
        self.audit(
            "SECURITY_LOGIN",
            &user.name,
            Some("Authentication successful".to_string()),
        );
        Ok(Subject::User(user.id))
    }

    fn record_failed_attempt(&mut self, name: &str, lock_after: u32) -> Result<Subject, TransitionError> {
        let user = self
            .state
            .roster_user(name)
            .cloned()
            .ok_or_else(|| TransitionError::UnknownUser(name.trim().to_string()))?;

        let record = self.user_mut(&user.id)?;
        record.failed_attempts += 1;
        let attempts = record.failed_attempts;
        let locked = lock_after > 0 && attempts >= lock_after;
        if locked {
            record.is_blocked = true;
        }

        self.sync_user(&user.id, &["failed_attempts", "is_blocked"]);
        let details = if locked {
            format!("Account locked after {attempts} failed attempts")
        } else {
            format!("Failed attempt {attempts}")
        };
        self.audit("SECURITY_LOGIN_FAILED", &user.name, Some(details));
        Ok(Subject::User(user.id))
    }

    fn register(
        &mut self,
        actor: Option<&UserId>,
        registration: Registration,
    ) -> Result<Subject, TransitionError> {
        let actor = actor.map(|id| self.actor(id)).transpose()?;
        let name = normalize_name(&registration.name)?;

        authorize_role_assignment(actor.as_ref(), registration.role, registration.branch)?;
        self.ensure_name_free(&name, None)?;
        // manager-created accounts are live at once
        let live = actor.is_some();
        if live {
            self.ensure_unique_manager(registration.role, registration.branch, None)?;
        }

        let user = User {
            id: UserId::generate(),
            name,
            role: registration.role,
            department: registration.department,
            branch: registration.branch,
            is_active: live,
            is_approved: live,
            is_blocked: false,
            pin_hash: registration.pin_hash,
            failed_attempts: 0,
            last_login: None,
            balances: registration.balances.unwrap_or_default(),
            must_change_pin: false,
        };
        self.sync.push(SyncAction::Register(UserRecord::from(&user)));
        self.state.users.push(user.clone());

        let message = if live {
            format!(
                "Personnel Alert: {} has been added to the {} ({}).",
                user.name, user.branch, user.department
            )
        } else {
            format!(
                "Personnel Alert: {} has registered for the {} ({}). Approval required.",
                user.name, user.branch, user.department
            )
        };
        let actor_id = actor.as_ref().map(|a| &a.id);
        let skip: Vec<&UserId> = actor_id.into_iter().chain([&user.id]).collect();
        self.broadcast(|u| u.role.is_manager(), &skip, &message);

        let performer = actor.as_ref().map_or(user.name.as_str(), |a| a.name.as_str());
        self.audit(
            "PERSONNEL_REGISTRATION",
            performer,
            Some(format!("Registered {} for {}", user.name, user.branch)),
        );
        Ok(Subject::User(user.id))
    }

    fn approve_user(&mut self, actor: &UserId, user_id: &UserId) -> Result<Subject, TransitionError> {
        let actor = self.actor(actor)?;
        let target = self.target(user_id)?;
        ensure_can_manage(&actor, &target)?;
        if target.is_terminated() {
            return Err(TransitionError::Forbidden(format!(
                "{} has been terminated",
                target.name
            )));
        }
        self.ensure_unique_manager(target.role, target.branch, Some(&target.id))?;

        let record = self.user_mut(user_id)?;
        record.is_approved = true;
        record.is_active = true;

        self.sync_user(user_id, &["is_approved", "is_active"]);
        self.audit(
            "PROFILE_AUTHORIZED",
            &actor.name,
            Some(format!("Authorized {}", target.name)),
        );
        Ok(Subject::User(target.id))
    }

    fn update_user(
        &mut self,
        actor: &UserId,
        user_id: &UserId,
        changes: UserChanges,
    ) -> Result<Subject, TransitionError> {
        let actor = self.actor(actor)?;
        let target = self.target(user_id)?;
        ensure_can_manage(&actor, &target)?;

        let role = changes.role.unwrap_or(target.role);
        let branch = changes.branch.unwrap_or(target.branch);
        if role != target.role || branch != target.branch {
            authorize_role_assignment(Some(&actor), role, branch)?;
        }
        if target.is_active {
            self.ensure_unique_manager(role, branch, Some(&target.id))?;
        }
        let name = match changes.name.as_deref() {
            Some(raw) => {
                let name = normalize_name(raw)?;
                self.ensure_name_free(&name, Some(&target.id))?;
                name
            }
            None => target.name.clone(),
        };

        let record = self.user_mut(user_id)?;
        record.name = name;
        record.role = role;
        record.branch = branch;
        if let Some(department) = changes.department {
            record.department = department;
        }
        let updated = record.name.clone();

        self.sync_user(user_id, &["name", "role", "department", "branch"]);
        self.audit("PERSONNEL_UPDATE", &actor.name, Some(format!("Updated {updated}")));
        Ok(Subject::User(target.id))
    }

    fn set_balances(
        &mut self,
        actor: &UserId,
        user_id: &UserId,
        balances: Balances,
        reason: &str,
    ) -> Result<Subject, TransitionError> {
        let actor = self.actor(actor)?;
        let target = self.target(user_id)?;
        ensure_can_manage(&actor, &target)?;
        balances.validate()?;

        self.user_mut(user_id)?.balances = balances;

        self.sync_user(user_id, &["balances"]);
        let details = match reason.trim() {
            "" => format!("Balances set for {}", target.name),
            reason => reason.to_string(),
        };
        self.audit("QUOTA_ADJUSTMENT", &actor.name, Some(details));
        Ok(Subject::User(target.id))
    }

    fn terminate_user(&mut self, actor: &UserId, user_id: &UserId) -> Result<Subject, TransitionError> {
        let actor = self.actor(actor)?;
        let target = self.target(user_id)?;
        ensure_can_manage(&actor, &target)?;
        if target.is_terminated() {
            return Err(TransitionError::Forbidden(format!(
                "{} is already terminated",
                target.name
            )));
        }

        let record = self.user_mut(user_id)?;
        record.is_active = false;
        record.is_blocked = true;

        self.sync_user(user_id, &["is_active", "is_blocked"]);
        self.audit(
            "PERSONNEL_TERMINATED",
            &actor.name,
            Some(format!("Terminated {}", target.name)),
        );
        Ok(Subject::User(target.id))
    }

    fn update_self(
        &mut self,
        actor: &UserId,
        name: &str,
        pin_hash: Option<String>,
    ) -> Result<Subject, TransitionError> {
        let actor = self.actor(actor)?;
        let name = normalize_name(name)?;
        self.ensure_name_free(&name, Some(&actor.id))?;

        let record = self.user_mut(&actor.id)?;
        record.name = name.clone();
        let mut columns = vec!["name"];
        if let Some(hash) = pin_hash {
            record.pin_hash = hash;
            record.must_change_pin = false;
            columns.extend(["pin_hash", "must_change_pin"]);
        }

        self.sync_user(&actor.id, &columns);
        self.audit("PROFILE_SELF_UPDATE", &name, None);
        Ok(Subject::User(actor.id))
    }

    /* ===============================
    Leave
    =============================== */

    fn submit_leave(
        &mut self,
        actor: &UserId,
        leave_type: LeaveType,
        dates: LeaveDates,
        reason: &str,
    ) -> Result<Subject, TransitionError> {
        let user = self.actor(actor)?;

        let today = self.now.date_naive();
        if dates.start() <= today {
            return Err(ValidationError::PastDate(dates.start()).into());
        }
        evaluate(&user, &dates, leave_type, &self.state.requests).into_result()?;

        let request = LeaveRequest {
            id: RequestId::generate(),
            user_id: user.id.clone(),
            user_name: user.name.clone(),
            user_role: user.role,
            department: user.department,
            branch: user.branch,
            leave_type,
            dates,
            reason: reason.trim().to_string(),
            status: LeaveStatus::Pending,
            manager_comment: None,
            created_at: self.now,
        };
        self.sync
            .push(SyncAction::AddRequest(RequestRecord::from(&request)));
        self.state.requests.push(request.clone());

        let message = format!(
            "New Leave Application: {} ({}) has applied for {}.",
            user.name, user.branch, leave_type
        );
        self.broadcast(|u| u.role.is_manager(), &[&user.id], &message);
        self.audit(
            "LEAVE_SUBMITTED",
            &user.name,
            Some(format!("Branch: {}, Type: {}", user.branch, leave_type)),
        );
        Ok(Subject::Request(request.id))
    }

    /// Moves one request along the state machine, settling the owner's
    /// balance and notifying them. Auditing is left to the caller.
    fn set_status(
        &mut self,
        actor: &User,
        request_id: &RequestId,
        status: LeaveStatus,
        comment: Option<String>,
    ) -> Result<(), TransitionError> {
        let request = self.request(request_id)?;
        ensure_can_manage(actor, &request)?;

        let from = request.status;
        let days = request.dates.days();
        let settle = match (from, status) {
            (LeaveStatus::Pending, LeaveStatus::Approved) => Some(days),
            (LeaveStatus::Pending, LeaveStatus::Rejected) => None,
            (LeaveStatus::Approved, LeaveStatus::Rejected) => Some(-days),
            _ => return Err(TransitionError::InvalidTransition { from, to: status }),
        };

        if let Some(delta) = settle {
            let owner = self.user_mut(&request.user_id)?;
            let remaining = owner.balances.remaining(request.leave_type);
            if delta > 0 && delta > remaining {
                return Err(TransitionError::InsufficientBalance {
                    remaining,
                    requested: delta,
                });
            }
            owner.balances.debit(request.leave_type, delta)?;
        }

        let record = self.request_mut(request_id)?;
        record.status = status;
        record.manager_comment = comment
            .map(|c| c.trim().to_string())
            .filter(|c| !c.is_empty());

        self.sync_request(request_id, &["status", "manager_comment"]);
        if settle.is_some() {
            self.sync_user(&request.user_id, &["balances"]);
        }
        self.notify(
            &request.user_id,
            format!(
                "Status Update: Your {} request has been {}.",
                request.leave_type,
                status.to_string().to_uppercase()
            ),
        );
        Ok(())
    }

    fn update_leave_status(
        &mut self,
        actor: &UserId,
        request_id: &RequestId,
        status: LeaveStatus,
        comment: Option<String>,
    ) -> Result<Subject, TransitionError> {
        let actor = self.actor(actor)?;
        self.set_status(&actor, request_id, status, comment)?;
        self.audit(
            &format!("LEAVE_{}", status.to_string().to_uppercase()),
            &actor.name,
            Some(format!("Request ID: {request_id}")),
        );
        Ok(Subject::Request(request_id.clone()))
    }

    fn bulk_approve(&mut self, actor: &UserId, request_ids: Vec<RequestId>) -> Result<Subject, TransitionError> {
        let actor = self.actor(actor)?;
        let mut ids: Vec<RequestId> = Vec::with_capacity(request_ids.len());
        for id in request_ids {
            if !ids.contains(&id) {
                ids.push(id);
            }
        }
        if ids.is_empty() {
            return Err(ValidationError::EmptySelection.into());
        }

        for id in &ids {
            self.set_status(&actor, id, LeaveStatus::Approved, None)?;
        }

        let listed = ids
            .iter()
            .map(RequestId::as_str)
            .collect::<Vec<_>>()
            .join(", ");
        self.audit(
            "LEAVE_BULK_APPROVED",
            &actor.name,
            Some(format!("Approved {} request(s): {listed}", ids.len())),
        );
        Ok(Subject::Requests(ids))
    }

    fn update_leave_dates(
        &mut self,
        actor: &UserId,
        request_id: &RequestId,
        dates: LeaveDates,
    ) -> Result<Subject, TransitionError> {
        let actor = self.actor(actor)?;
        let request = self.request(request_id)?;
        ensure_can_manage(&actor, &request)?;
        let owner = self.target(&request.user_id)?;

        let delta = match request.status {
            LeaveStatus::Rejected => {
                return Err(TransitionError::Forbidden(
                    "rejected requests cannot be rescheduled".to_string(),
                ));
            }
            LeaveStatus::Pending => {
                evaluate_excluding(
                    &owner,
                    &dates,
                    request.leave_type,
                    &self.state.requests,
                    Some(request_id),
                )
                .into_result()?;
                None
            }
            LeaveStatus::Approved => {
                let conflicts: Vec<RequestId> = find_conflicts(
                    owner.department,
                    owner.branch,
                    &dates,
                    request.leave_type,
                    &self.state.requests,
                    Some(request_id),
                )
                .map(|r| r.id.clone())
                .collect();
                if !conflicts.is_empty() {
                    return Err(TransitionError::DateConflict(conflicts));
                }
                let delta = dates.days() - request.dates.days();
                let remaining = owner.balances.remaining(request.leave_type);
                if delta > 0 && delta > remaining {
                    return Err(TransitionError::InsufficientBalance {
                        remaining,
                        requested: delta,
                    });
                }
                Some(delta)
            }
        };

        if let Some(delta) = delta {
            self.user_mut(&owner.id)?
                .balances
                .debit(request.leave_type, delta)?;
            self.sync_user(&owner.id, &["balances"]);
        }
        let start = dates.start();
        let end = dates.end();
        self.request_mut(request_id)?.dates = dates;

        self.sync_request(request_id, &["dates"]);
        self.notify(
            &owner.id,
            format!(
                "Schedule Update: Your {} request now runs {start} to {end}.",
                request.leave_type
            ),
        );
        self.audit(
            "LEAVE_DATES_MODIFIED",
            &actor.name,
            Some(format!("Request ID: {request_id}")),
        );
        Ok(Subject::Request(request_id.clone()))
    }

    /* ===============================
    Notifications and credential recovery
    =============================== */

    fn clear_notification(
        &mut self,
        actor: &UserId,
        notification_id: &NotificationId,
    ) -> Result<Subject, TransitionError> {
        let actor = self.target(actor)?;
        let position = self
            .state
            .notifications
            .iter()
            .position(|n| &n.id == notification_id)
            .ok_or_else(|| TransitionError::UnknownNotification(notification_id.to_string()))?;
        if self.state.notifications[position].user_id != actor.id {
            return Err(TransitionError::Forbidden(
                "notification is addressed to someone else".to_string(),
            ));
        }

        self.state.notifications.remove(position);
        self.sync.push(SyncAction::DeleteNotification(EntityRef {
            id: notification_id.to_string(),
        }));
        self.audit("NOTIFICATION_CLEARED", &actor.name, None);
        Ok(Subject::None)
    }

    fn submit_reset_request(&mut self, name: &str, department: Department) -> Result<Subject, TransitionError> {
        let name = normalize_name(name)?;
        let ticket = ResetRequest {
            id: ResetRequestId::generate(),
            user_name: name.clone(),
            department,
            status: ResetStatus::Pending,
            created_at: self.now,
        };
        self.sync.push(SyncAction::AddReset(ResetRecord::from(&ticket)));
        self.state.reset_requests.push(ticket.clone());

        let message = format!(
            "Security Alert: {name} from {department} has requested a PIN reset."
        );
        self.broadcast(|u| u.role.is_global(), &[], &message);
        self.audit("RESET_REQUESTED", &name, None);
        Ok(Subject::Reset(ticket.id))
    }

    fn admin_reset_pin(
        &mut self,
        actor: &UserId,
        user_id: &UserId,
        temp_pin_hash: String,
    ) -> Result<Subject, TransitionError> {
        let actor = self.actor(actor)?;
        require_global(&actor)?;
        let target = self.target(user_id)?;
        ensure_can_manage(&actor, &target)?;
        if target.is_terminated() {
            return Err(TransitionError::Forbidden(format!(
                "{} has been terminated",
                target.name
            )));
        }

        let record = self.user_mut(user_id)?;
        record.pin_hash = temp_pin_hash;
        record.must_change_pin = true;
        record.failed_attempts = 0;
        record.is_blocked = false;

        self.sync_user(
            user_id,
            &["pin_hash", "must_change_pin", "failed_attempts", "is_blocked"],
        );
        self.audit(
            "ADMIN_PIN_RESET",
            &actor.name,
            Some(format!("Temporary PIN issued to {}", target.name)),
        );
        Ok(Subject::User(target.id))
    }

    fn resolve_reset_request(
        &mut self,
        actor: &UserId,
        reset_id: &ResetRequestId,
    ) -> Result<Subject, TransitionError> {
        let actor = self.actor(actor)?;
        require_global(&actor)?;
        let ticket = self
            .state
            .reset_request(reset_id)
            .cloned()
            .ok_or_else(|| TransitionError::UnknownResetRequest(reset_id.to_string()))?;
        if ticket.status == ResetStatus::Resolved {
            return Err(TransitionError::Forbidden(format!(
                "reset request {reset_id} is already resolved"
            )));
        }

        if let Some(record) = self
            .state
            .reset_requests
            .iter_mut()
            .find(|r| &r.id == reset_id)
        {
            record.status = ResetStatus::Resolved;
        }

        self.sync.push(SyncAction::UpdateReset(EntityRef {
            id: reset_id.to_string(),
        }));
        self.audit(
            "RESET_RESOLVED",
            &actor.name,
            Some(format!("Resolved reset for {}", ticket.user_name)),
        );
        Ok(Subject::Reset(ticket.id))
    }

    /* ===============================
    System reset
    =============================== */

    fn reset_system(&mut self, authorization: ResetAuthorization) -> Result<Subject, TransitionError> {
        let actor = self.actor(authorization.actor())?;
        if actor.role != Role::SuperAdmin {
            return Err(TransitionError::Forbidden(
                "only the super administrator may reset the system".to_string(),
            ));
        }

        for user in self.state.users.iter().filter(|u| u.id != actor.id) {
            self.sync.push(SyncAction::DeleteUser(EntityRef {
                id: user.id.to_string(),
            }));
        }
        for notification in &self.state.notifications {
            self.sync.push(SyncAction::DeleteNotification(EntityRef {
                id: notification.id.to_string(),
            }));
        }
        self.sync.push(SyncAction::PurgeActivity(PurgeScope {
            keep_user: actor.id.to_string(),
        }));

        self.state = AppState {
            users: vec![actor.clone()],
            ..AppState::default()
        };
        self.audit(
            "CRITICAL_SYSTEM_RESET",
            &actor.name,
            Some(authorization.summary()),
        );
        self.notify(
            &actor.id,
            "SYSTEM ALERT: Full database reset was executed by this account.".to_string(),
        );
        Ok(Subject::User(actor.id))
    }
}

/// Applies `action` to a copy of `state`. On error nothing changes.
pub fn apply(
    state: &AppState,
    action: Action,
    now: DateTime<Utc>,
) -> Result<Transition, TransitionError> {
    let mut draft = Draft::new(state.clone(), now);

    let subject = match action {
        Action::Login { user_id } => draft.login(&user_id)?,
        Action::RecordFailedAttempt { name, lock_after } => {
            draft.record_failed_attempt(&name, lock_after)?
        }
        Action::Register {
            actor,
            registration,
        } => draft.register(actor.as_ref(), registration)?,
        Action::ApproveUser { actor, user_id } => draft.approve_user(&actor, &user_id)?,
        Action::UpdateUser {
            actor,
            user_id,
            changes,
        } => draft.update_user(&actor, &user_id, changes)?,
        Action::SetBalances {
            actor,
            user_id,
            balances,
            reason,
        } => draft.set_balances(&actor, &user_id, balances, &reason)?,
        Action::TerminateUser { actor, user_id } => draft.terminate_user(&actor, &user_id)?,
        Action::SubmitLeave {
            actor,
            leave_type,
            dates,
            reason,
        } => draft.submit_leave(&actor, leave_type, dates, &reason)?,
        Action::UpdateLeaveStatus {
            actor,
            request_id,
            status,
            comment,
        } => draft.update_leave_status(&actor, &request_id, status, comment)?,
        Action::BulkApprove { actor, request_ids } => draft.bulk_approve(&actor, request_ids)?,
        Action::UpdateLeaveDates {
            actor,
            request_id,
            dates,
        } => draft.update_leave_dates(&actor, &request_id, dates)?,
        Action::ClearNotification {
            actor,
            notification_id,
        } => draft.clear_notification(&actor, &notification_id)?,
        Action::UpdateSelf {
            actor,
            name,
            pin_hash,
        } => draft.update_self(&actor, &name, pin_hash)?,
        Action::SubmitResetRequest { name, department } => {
            draft.submit_reset_request(&name, department)?
        }
        Action::AdminResetPin {
            actor,
            user_id,
            temp_pin_hash,
        } => draft.admin_reset_pin(&actor, &user_id, temp_pin_hash)?,
        Action::ResolveResetRequest { actor, reset_id } => {
            draft.resolve_reset_request(&actor, &reset_id)?
        }
        Action::ResetSystem(authorization) => draft.reset_system(authorization)?,
    };

    Ok(draft.finish(subject))
}

/// First super administrator of an empty desk.
pub fn bootstrap_admin(
    name: &str,
    pin_hash: String,
    now: DateTime<Utc>,
) -> Result<Transition, TransitionError> {
    let name = normalize_name(name)?;
    let mut draft = Draft::new(AppState::default(), now);
    let admin = User {
        id: UserId::generate(),
        name,
        role: Role::SuperAdmin,
        department: Department::Management,
        branch: Branch::GodownHq,
        is_active: true,
        is_approved: true,
        is_blocked: false,
        pin_hash,
        failed_attempts: 0,
        last_login: None,
        balances: Balances::default(),
        must_change_pin: false,
    };
    draft.sync.push(SyncAction::Register(UserRecord::from(&admin)));
    draft.state.users.push(admin.clone());
    draft.audit(
        "SYSTEM_BOOTSTRAP",
        "System",
        Some(format!("Seeded super administrator {}", admin.name)),
    );
    Ok(draft.finish(Subject::User(admin.id)))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::engine::system_reset::{CONFIRMATION_PHRASE, ResetGuard};
    use crate::testing::{
        PIN_HASH, TEST_PIN, at, dates, day, manager, pin, staff, state_with,
    };
    use chrono::Duration;

    fn now() -> DateTime<Utc> {
        at("2025-06-01T09:00:00Z")
    }

    fn run(state: &AppState, action: Action) -> Transition {
        apply(state, action, now()).unwrap()
    }

    fn fail(state: &AppState, action: Action) -> TransitionError {
        apply(state, action, now()).unwrap_err()
    }

    fn submit(actor: &User, leave_type: LeaveType, days: &[&str]) -> Action {
        Action::SubmitLeave {
            actor: actor.id.clone(),
            leave_type,
            dates: dates(days),
            reason: "family matters".into(),
        }
    }

    fn decide(actor: &User, request_id: &RequestId, status: LeaveStatus) -> Action {
        Action::UpdateLeaveStatus {
            actor: actor.id.clone(),
            request_id: request_id.clone(),
            status,
            comment: None,
        }
    }

    fn registration(name: &str, role: Role, branch: Branch) -> Registration {
        Registration {
            name: name.into(),
            role,
            department: Department::Sales,
            branch,
            pin_hash: PIN_HASH.clone(),
            balances: None,
        }
    }

    fn request_id(t: &Transition) -> RequestId {
        match &t.subject {
            Subject::Request(id) => id.clone(),
            other => panic!("expected a request subject, got {other:?}"),
        }
    }

    fn user_id(t: &Transition) -> UserId {
        match &t.subject {
            Subject::User(id) => id.clone(),
            other => panic!("expected a user subject, got {other:?}"),
        }
    }

    fn annual(state: &AppState, id: &UserId) -> i32 {
        state.user(id).unwrap().balances.remaining(LeaveType::Annual)
    }

    #[test]
    fn approve_then_revoke_restores_balance() {
        let bm = manager("Wanjiku", Role::BranchManager, Branch::Naivasha);
        let clerk = staff("Otieno", Branch::Naivasha, Department::Sales);
        let state = state_with(vec![bm.clone(), clerk.clone()]);

        let days = ["2025-07-01", "2025-07-02", "2025-07-03", "2025-07-04", "2025-07-05"];
        let t = run(&state, submit(&clerk, LeaveType::Annual, &days));
        let id = request_id(&t);
        assert_eq!(annual(&t.state, &clerk.id), 21);

        let t = run(&t.state, decide(&bm, &id, LeaveStatus::Approved));
        assert_eq!(annual(&t.state, &clerk.id), 16);

        let t = run(&t.state, decide(&bm, &id, LeaveStatus::Rejected));
        assert_eq!(annual(&t.state, &clerk.id), 21);
        assert_eq!(t.state.request(&id).unwrap().status, LeaveStatus::Rejected);

        // rejected is terminal
        assert_eq!(
            fail(&t.state, decide(&bm, &id, LeaveStatus::Approved)),
            TransitionError::InvalidTransition {
                from: LeaveStatus::Rejected,
                to: LeaveStatus::Approved
            }
        );
    }

    #[test]
    fn balance_equals_quota_minus_approved_days() {
        let sa = manager("Root", Role::SuperAdmin, Branch::GodownHq);
        let clerk = staff("Otieno", Branch::Gilgil, Department::Stores);
        let mut state = state_with(vec![sa.clone(), clerk.clone()]);

        let batches: [&[&str]; 3] = [
            &["2025-07-01", "2025-07-02"],
            &["2025-08-11", "2025-08-12", "2025-08-13"],
            &["2025-09-01"],
        ];
        let mut ids = Vec::new();
        for days in batches {
            let t = run(&state, submit(&clerk, LeaveType::Annual, days));
            ids.push(request_id(&t));
            state = t.state;
        }
        state = run(&state, decide(&sa, &ids[0], LeaveStatus::Approved)).state;
        state = run(&state, decide(&sa, &ids[1], LeaveStatus::Approved)).state;
        state = run(&state, decide(&sa, &ids[2], LeaveStatus::Rejected)).state;
        state = run(&state, decide(&sa, &ids[0], LeaveStatus::Rejected)).state;

        let approved: i32 = state
            .requests_of(&clerk.id)
            .filter(|r| r.status == LeaveStatus::Approved)
            .map(|r| r.dates.days())
            .sum();
        assert_eq!(approved, 3);
        assert_eq!(annual(&state, &clerk.id), 21 - approved);
    }

    #[test]
    fn self_approval_is_always_rejected() {
        for role in [Role::SuperAdmin, Role::OperationsManager, Role::BranchManager] {
            let boss = manager("Boss", role, Branch::GodownHq);
            let state = state_with(vec![boss.clone()]);
            let t = run(&state, submit(&boss, LeaveType::Sick, &["2025-07-01"]));
            let id = request_id(&t);
            assert_eq!(
                fail(&t.state, decide(&boss, &id, LeaveStatus::Approved)),
                TransitionError::SelfApproval
            );
        }
    }

    #[test]
    fn same_team_annual_overlap_conflicts_but_sick_does_not() {
        let bm = manager("Wanjiku", Role::BranchManager, Branch::Gilgil);
        let a = staff("Amina", Branch::Gilgil, Department::Stores);
        let b = staff("Brian", Branch::Gilgil, Department::Stores);
        let state = state_with(vec![bm.clone(), a.clone(), b.clone()]);

        let t = run(&state, submit(&a, LeaveType::Annual, &["2025-06-10"]));
        let id = request_id(&t);
        let state = run(&t.state, decide(&bm, &id, LeaveStatus::Approved)).state;

        assert_eq!(
            fail(&state, submit(&b, LeaveType::Annual, &["2025-06-09", "2025-06-10"])),
            TransitionError::DateConflict(vec![id])
        );
        assert!(apply(&state, submit(&b, LeaveType::Sick, &["2025-06-10"]), now()).is_ok());
    }

    #[test]
    fn ten_days_against_three_remaining() {
        let clerk = {
            let mut u = staff("Otieno", Branch::Naivasha, Department::Sales);
            u.balances.set(LeaveType::Annual, 3);
            u
        };
        let state = state_with(vec![clerk.clone()]);
        let action = Action::SubmitLeave {
            actor: clerk.id.clone(),
            leave_type: LeaveType::Annual,
            dates: LeaveDates::from_range(day("2025-07-01"), day("2025-07-10")).unwrap(),
            reason: String::new(),
        };
        assert_eq!(
            fail(&state, action),
            TransitionError::InsufficientBalance {
                remaining: 3,
                requested: 10
            }
        );
    }

    #[test]
    fn no_same_scope_overlap_after_any_submission_sequence() {
        let team: Vec<User> = ["A", "B", "C"]
            .iter()
            .map(|n| staff(n, Branch::Olkalou, Department::Drivers))
            .collect();
        let mut state = state_with(team.clone());
        let attempts: [(usize, LeaveType, &[&str]); 6] = [
            (0, LeaveType::Annual, &["2025-07-01", "2025-07-02"]),
            (1, LeaveType::Annual, &["2025-07-02", "2025-07-03"]),
            (1, LeaveType::Sick, &["2025-07-02"]),
            (2, LeaveType::Annual, &["2025-07-03"]),
            (2, LeaveType::Sick, &["2025-07-02", "2025-07-05"]),
            (0, LeaveType::Annual, &["2025-07-04"]),
        ];
        for (who, leave_type, days) in attempts {
            if let Ok(t) = apply(&state, submit(&team[who], leave_type, days), now()) {
                state = t.state;
            }
        }

        let live: Vec<&LeaveRequest> = state.requests.iter().filter(|r| r.holds_dates()).collect();
        for (i, a) in live.iter().enumerate() {
            for b in &live[i + 1..] {
                let same_scope = a.branch == b.branch
                    && a.department == b.department
                    && a.leave_type == b.leave_type;
                assert!(!(same_scope && a.dates.overlaps(&b.dates)));
            }
        }
        assert_eq!(state.requests.len(), 4);
    }

    #[test]
    fn past_and_same_day_dates_are_rejected() {
        let clerk = staff("Otieno", Branch::Naivasha, Department::Sales);
        let state = state_with(vec![clerk.clone()]);
        assert_eq!(
            fail(&state, submit(&clerk, LeaveType::Annual, &["2025-06-01", "2025-06-02"])),
            TransitionError::Validation(ValidationError::PastDate(day("2025-06-01")))
        );
    }

    #[test]
    fn every_mutation_appends_exactly_one_audit_entry() {
        let sa = manager("Root", Role::SuperAdmin, Branch::GodownHq);
        let clerk = staff("Otieno", Branch::Naivasha, Department::Sales);
        let state = state_with(vec![sa.clone(), clerk.clone()]);

        let actions = vec![
            Action::Login {
                user_id: clerk.id.clone(),
            },
            submit(&clerk, LeaveType::Annual, &["2025-07-01"]),
            Action::SetBalances {
                actor: sa.id.clone(),
                user_id: clerk.id.clone(),
                balances: Balances::default(),
                reason: "annual review".into(),
            },
            Action::SubmitResetRequest {
                name: "Otieno".into(),
                department: Department::Sales,
            },
            Action::Register {
                actor: None,
                registration: registration("Newcomer", Role::Staff, Branch::Gilgil),
            },
        ];
        let mut state = state;
        for action in actions {
            let before = state.audit_logs.len();
            let name = action.name();
            state = run(&state, action).state;
            assert_eq!(state.audit_logs.len(), before + 1, "{name}");
        }
        let kinds: Vec<&str> = state.audit_logs.iter().map(|a| a.action.as_str()).collect();
        assert_eq!(
            kinds,
            [
                "SECURITY_LOGIN",
                "LEAVE_SUBMITTED",
                "QUOTA_ADJUSTMENT",
                "RESET_REQUESTED",
                "PERSONNEL_REGISTRATION"
            ]
        );
    }

    #[test]
    fn manager_uniqueness_holds_across_register_and_terminate() {
        let sa = manager("Root", Role::SuperAdmin, Branch::GodownHq);
        let state = state_with(vec![sa.clone()]);
        let register = |name: &str, role, branch| Action::Register {
            actor: Some(sa.id.clone()),
            registration: registration(name, role, branch),
        };

        let t = run(&state, register("First OM", Role::OperationsManager, Branch::GodownHq));
        let first = user_id(&t);
        assert_eq!(
            fail(&t.state, register("Second OM", Role::OperationsManager, Branch::GodownHq)),
            TransitionError::DuplicateOperationsManager
        );

        let t = run(&t.state, register("Naivasha BM", Role::BranchManager, Branch::Naivasha));
        assert_eq!(
            fail(&t.state, register("Another BM", Role::BranchManager, Branch::Naivasha)),
            TransitionError::DuplicateBranchManager(Branch::Naivasha)
        );
        let t = run(&t.state, register("Gilgil BM", Role::BranchManager, Branch::Gilgil));

        let t = run(
            &t.state,
            Action::TerminateUser {
                actor: sa.id.clone(),
                user_id: first,
            },
        );
        let state = run(&t.state, register("Second OM", Role::OperationsManager, Branch::GodownHq)).state;
        let active_oms = state
            .users
            .iter()
            .filter(|u| u.role == Role::OperationsManager && u.is_active)
            .count();
        assert_eq!(active_oms, 1);
    }

    #[test]
    fn self_registration_is_staff_only_and_awaits_approval() {
        let sa = manager("Root", Role::SuperAdmin, Branch::GodownHq);
        let bm = manager("Wanjiku", Role::BranchManager, Branch::Naivasha);
        let clerk = staff("Otieno", Branch::Naivasha, Department::Sales);
        let state = state_with(vec![sa.clone(), bm.clone(), clerk.clone()]);

        assert!(matches!(
            fail(
                &state,
                Action::Register {
                    actor: None,
                    registration: registration("Sneaky", Role::BranchManager, Branch::Gilgil),
                }
            ),
            TransitionError::Forbidden(_)
        ));

        let t = run(
            &state,
            Action::Register {
                actor: None,
                registration: registration("  Newcomer ", Role::Staff, Branch::Gilgil),
            },
        );
        let id = user_id(&t);
        let newcomer = t.state.user(&id).unwrap();
        assert_eq!(newcomer.name, "Newcomer");
        assert!(!newcomer.is_approved && !newcomer.is_active);
        assert_eq!(newcomer.balances, Balances::default());
        assert_eq!(t.state.audit_logs[0].performed_by, "Newcomer");

        // both managers hear about it, the clerk does not
        let notified: Vec<&UserId> = t.state.notifications.iter().map(|n| &n.user_id).collect();
        assert_eq!(notified, vec![&sa.id, &bm.id]);
        assert!(t.state.notifications[0].message.ends_with("Approval required."));

        assert_eq!(
            fail(
                &t.state,
                Action::Register {
                    actor: None,
                    registration: registration("newcomer", Role::Staff, Branch::Gilgil),
                }
            ),
            TransitionError::NameTaken("Newcomer".into())
        );

        let t = run(
            &t.state,
            Action::ApproveUser {
                actor: sa.id.clone(),
                user_id: id.clone(),
            },
        );
        assert!(t.state.user(&id).unwrap().is_in_service());
    }

    #[test]
    fn approval_rechecks_branch_manager_uniqueness() {
        let sa = manager("Root", Role::SuperAdmin, Branch::GodownHq);
        let bm = manager("Wanjiku", Role::BranchManager, Branch::Naivasha);
        let mut pending = staff("Kamau", Branch::Naivasha, Department::Sales);
        pending.is_active = false;
        pending.is_approved = false;
        let state = state_with(vec![sa.clone(), bm, pending.clone()]);

        // promoting an inactive account is allowed, activating it is not
        let state = run(
            &state,
            Action::UpdateUser {
                actor: sa.id.clone(),
                user_id: pending.id.clone(),
                changes: UserChanges {
                    role: Some(Role::BranchManager),
                    ..UserChanges::default()
                },
            },
        )
        .state;
        assert_eq!(
            fail(
                &state,
                Action::ApproveUser {
                    actor: sa.id.clone(),
                    user_id: pending.id.clone(),
                }
            ),
            TransitionError::DuplicateBranchManager(Branch::Naivasha)
        );
    }

    #[test]
    fn branch_manager_cannot_move_staff_out_of_their_branch() {
        let bm = manager("Wanjiku", Role::BranchManager, Branch::Naivasha);
        let clerk = staff("Otieno", Branch::Naivasha, Department::Sales);
        let state = state_with(vec![bm.clone(), clerk.clone()]);

        let moved = UserChanges {
            branch: Some(Branch::Gilgil),
            ..UserChanges::default()
        };
        assert!(matches!(
            fail(
                &state,
                Action::UpdateUser {
                    actor: bm.id.clone(),
                    user_id: clerk.id.clone(),
                    changes: moved,
                }
            ),
            TransitionError::Forbidden(_)
        ));

        let renamed = UserChanges {
            name: Some("Otieno Odhiambo".into()),
            department: Some(Department::Stores),
            ..UserChanges::default()
        };
        let t = run(
            &state,
            Action::UpdateUser {
                actor: bm.id.clone(),
                user_id: clerk.id.clone(),
                changes: renamed,
            },
        );
        let updated = t.state.user(&clerk.id).unwrap();
        assert_eq!(updated.name, "Otieno Odhiambo");
        assert_eq!(updated.department, Department::Stores);
    }

    #[test]
    fn termination_is_a_soft_delete() {
        let sa = manager("Root", Role::SuperAdmin, Branch::GodownHq);
        let clerk = staff("Otieno", Branch::Naivasha, Department::Sales);
        let state = state_with(vec![sa.clone(), clerk.clone()]);

        let t = run(
            &state,
            Action::TerminateUser {
                actor: sa.id.clone(),
                user_id: clerk.id.clone(),
            },
        );
        let gone = t.state.user(&clerk.id).unwrap();
        assert!(gone.is_terminated());
        assert_eq!(t.state.users.len(), 2);
        assert_eq!(
            t.state.audit_logs[0].details.as_deref(),
            Some("Terminated Otieno")
        );
        assert_eq!(
            fail(
                &t.state,
                Action::Login {
                    user_id: clerk.id.clone()
                }
            ),
            TransitionError::InactiveAccount
        );
    }

    #[test]
    fn failed_attempts_lock_the_account() {
        let clerk = staff("Otieno", Branch::Naivasha, Department::Sales);
        let mut state = state_with(vec![clerk.clone()]);
        for _ in 0..4 {
            state = run(
                &state,
                Action::RecordFailedAttempt {
                    name: "otieno".into(),
                    lock_after: 5,
                },
            )
            .state;
        }
        assert!(!state.user(&clerk.id).unwrap().is_blocked);

        state = run(
            &state,
            Action::RecordFailedAttempt {
                name: "Otieno".into(),
                lock_after: 5,
            },
        )
        .state;
        let locked = state.user(&clerk.id).unwrap();
        assert!(locked.is_blocked);
        assert_eq!(locked.failed_attempts, 5);
    }

    #[test]
    fn admin_pin_reset_unblocks_and_forces_change() {
        let om = manager("Achieng", Role::OperationsManager, Branch::GodownHq);
        let sa = manager("Root", Role::SuperAdmin, Branch::GodownHq);
        let mut clerk = staff("Otieno", Branch::Naivasha, Department::Sales);
        clerk.is_blocked = true;
        clerk.failed_attempts = 5;
        let state = state_with(vec![om.clone(), sa.clone(), clerk.clone()]);

        let t = run(
            &state,
            Action::AdminResetPin {
                actor: om.id.clone(),
                user_id: clerk.id.clone(),
                temp_pin_hash: "temporary".into(),
            },
        );
        let reset = t.state.user(&clerk.id).unwrap();
        assert!(reset.must_change_pin && !reset.is_blocked);
        assert_eq!(reset.failed_attempts, 0);
        assert_eq!(reset.pin_hash, "temporary");

        // operations manager cannot reset the super admin
        assert!(matches!(
            fail(
                &state,
                Action::AdminResetPin {
                    actor: om.id.clone(),
                    user_id: sa.id.clone(),
                    temp_pin_hash: "temporary".into(),
                }
            ),
            TransitionError::Forbidden(_)
        ));

        let t = run(
            &t.state,
            Action::UpdateSelf {
                actor: clerk.id.clone(),
                name: "Otieno".into(),
                pin_hash: Some("chosen".into()),
            },
        );
        assert!(!t.state.user(&clerk.id).unwrap().must_change_pin);
    }

    #[test]
    fn reset_requests_notify_global_tier_only() {
        let sa = manager("Root", Role::SuperAdmin, Branch::GodownHq);
        let om = manager("Achieng", Role::OperationsManager, Branch::GodownHq);
        let bm = manager("Wanjiku", Role::BranchManager, Branch::Naivasha);
        let state = state_with(vec![sa.clone(), om.clone(), bm.clone()]);

        let t = run(
            &state,
            Action::SubmitResetRequest {
                name: "Otieno".into(),
                department: Department::Sales,
            },
        );
        let notified: Vec<&UserId> = t.state.notifications.iter().map(|n| &n.user_id).collect();
        assert_eq!(notified, vec![&sa.id, &om.id]);
        assert_eq!(
            t.state.notifications[0].message,
            "Security Alert: Otieno from Sales has requested a PIN reset."
        );
        let Subject::Reset(ticket) = t.subject.clone() else {
            panic!("expected a reset subject");
        };

        assert!(matches!(
            fail(
                &t.state,
                Action::ResolveResetRequest {
                    actor: bm.id.clone(),
                    reset_id: ticket.clone(),
                }
            ),
            TransitionError::Forbidden(_)
        ));
        let t = run(
            &t.state,
            Action::ResolveResetRequest {
                actor: om.id.clone(),
                reset_id: ticket,
            },
        );
        assert_eq!(t.state.pending_resets().count(), 0);
        assert_eq!(t.state.reset_requests.len(), 1);
    }

    #[test]
    fn status_change_notifies_owner_and_emits_sync() {
        let bm = manager("Wanjiku", Role::BranchManager, Branch::Naivasha);
        let clerk = staff("Otieno", Branch::Naivasha, Department::Sales);
        let state = state_with(vec![bm.clone(), clerk.clone()]);

        let t = run(&state, submit(&clerk, LeaveType::Sick, &["2025-07-01"]));
        let id = request_id(&t);
        let t = run(&t.state, decide(&bm, &id, LeaveStatus::Approved));

        let last = t.state.notifications.last().unwrap();
        assert_eq!(last.user_id, clerk.id);
        assert_eq!(
            last.message,
            "Status Update: Your Sick Leave request has been APPROVED."
        );
        assert_eq!(t.state.audit_logs.last().unwrap().action, "LEAVE_APPROVED");

        let kinds: Vec<&str> = t.sync.iter().map(SyncAction::kind).collect();
        assert_eq!(
            kinds,
            ["UPDATE_REQUEST", "UPDATE_USER", "ADD_NOTIFICATION", "APPEND_AUDIT"]
        );
    }

    #[test]
    fn bulk_approval_is_all_or_nothing() {
        let sa = manager("Root", Role::SuperAdmin, Branch::GodownHq);
        let a = staff("Amina", Branch::Naivasha, Department::Sales);
        let mut b = staff("Brian", Branch::Gilgil, Department::Sales);
        b.balances.set(LeaveType::Annual, 2);
        let mut state = state_with(vec![sa.clone(), a.clone(), b.clone()]);

        let ra = run(&state, submit(&a, LeaveType::Annual, &["2025-07-01"]));
        state = ra.state.clone();
        let rb = run(&state, submit(&b, LeaveType::Annual, &["2025-07-01", "2025-07-02"]));
        state = rb.state.clone();
        let (ra, rb) = (request_id(&ra), request_id(&rb));

        // b's balance drops underneath the pending request
        state = run(
            &state,
            Action::SetBalances {
                actor: sa.id.clone(),
                user_id: b.id.clone(),
                balances: [(LeaveType::Annual, 1)].into_iter().collect(),
                reason: "correction".into(),
            },
        )
        .state;

        let bulk = |ids: Vec<RequestId>| Action::BulkApprove {
            actor: sa.id.clone(),
            request_ids: ids,
        };
        assert!(matches!(
            fail(&state, bulk(vec![ra.clone(), rb.clone()])),
            TransitionError::InsufficientBalance { .. }
        ));
        assert_eq!(
            fail(&state, bulk(vec![])),
            TransitionError::Validation(ValidationError::EmptySelection)
        );

        let before = state.audit_logs.len();
        let t = run(&state, bulk(vec![ra.clone(), ra.clone()]));
        assert_eq!(t.subject, Subject::Requests(vec![ra.clone()]));
        assert_eq!(t.state.audit_logs.len(), before + 1);
        assert_eq!(t.state.request(&ra).unwrap().status, LeaveStatus::Approved);
        assert_eq!(annual(&t.state, &a.id), 20);
    }

    #[test]
    fn balance_overrides_are_bounded_and_revocation_never_overflows() {
        let sa = manager("Root", Role::SuperAdmin, Branch::GodownHq);
        let clerk = staff("Otieno", Branch::Naivasha, Department::Sales);
        let state = state_with(vec![sa.clone(), clerk.clone()]);

        let t = run(&state, submit(&clerk, LeaveType::Annual, &["2025-07-01"]));
        let id = request_id(&t);
        let mut state = run(&t.state, decide(&sa, &id, LeaveStatus::Approved)).state;

        let set = |days: i32| Action::SetBalances {
            actor: sa.id.clone(),
            user_id: clerk.id.clone(),
            balances: [(LeaveType::Annual, days)].into_iter().collect(),
            reason: String::new(),
        };
        assert_eq!(
            fail(&state, set(i32::MAX)),
            TransitionError::Validation(ValidationError::BalanceOutOfRange {
                leave_type: LeaveType::Annual,
                days: i32::MAX
            })
        );
        assert!(matches!(
            fail(&state, set(-5)),
            TransitionError::Validation(ValidationError::BalanceOutOfRange { .. })
        ));

        // a stored balance already at the ceiling
        state
            .users
            .iter_mut()
            .find(|u| u.id == clerk.id)
            .unwrap()
            .balances
            .set(LeaveType::Annual, i32::MAX);
        assert_eq!(
            fail(&state, decide(&sa, &id, LeaveStatus::Rejected)),
            TransitionError::BalanceOverflow(LeaveType::Annual)
        );
        assert_eq!(state.request(&id).unwrap().status, LeaveStatus::Approved);
    }

    #[test]
    fn rescheduling_an_approved_request_settles_the_difference() {
        let bm = manager("Wanjiku", Role::BranchManager, Branch::Naivasha);
        let clerk = staff("Otieno", Branch::Naivasha, Department::Sales);
        let peer = staff("Kamau", Branch::Naivasha, Department::Sales);
        let state = state_with(vec![bm.clone(), clerk.clone(), peer.clone()]);

        let t = run(&state, submit(&clerk, LeaveType::Annual, &["2025-07-01", "2025-07-02"]));
        let id = request_id(&t);
        let t = run(&t.state, decide(&bm, &id, LeaveStatus::Approved));
        assert_eq!(annual(&t.state, &clerk.id), 19);
        let t = run(&t.state, submit(&peer, LeaveType::Annual, &["2025-07-10"]));
        let peer_request = request_id(&t);

        let reschedule = |days: &[&str]| Action::UpdateLeaveDates {
            actor: bm.id.clone(),
            request_id: id.clone(),
            dates: dates(days),
        };

        let moved = run(
            &t.state,
            reschedule(&["2025-07-01", "2025-07-02", "2025-07-03", "2025-07-04"]),
        );
        assert_eq!(annual(&moved.state, &clerk.id), 17);
        assert_eq!(moved.state.request(&id).unwrap().end_date(), day("2025-07-04"));

        let shrunk = run(&moved.state, reschedule(&["2025-07-03"]));
        assert_eq!(annual(&shrunk.state, &clerk.id), 20);

        assert_eq!(
            fail(&t.state, reschedule(&["2025-07-09", "2025-07-10"])),
            TransitionError::DateConflict(vec![peer_request])
        );
    }

    #[test]
    fn notifications_are_cleared_only_by_their_addressee() {
        let bm = manager("Wanjiku", Role::BranchManager, Branch::Naivasha);
        let clerk = staff("Otieno", Branch::Naivasha, Department::Sales);
        let state = state_with(vec![bm.clone(), clerk.clone()]);
        let t = run(&state, submit(&clerk, LeaveType::Annual, &["2025-07-01"]));
        let note = t.state.notifications[0].id.clone();

        assert!(matches!(
            fail(
                &t.state,
                Action::ClearNotification {
                    actor: clerk.id.clone(),
                    notification_id: note.clone(),
                }
            ),
            TransitionError::Forbidden(_)
        ));
        let t = run(
            &t.state,
            Action::ClearNotification {
                actor: bm.id.clone(),
                notification_id: note.clone(),
            },
        );
        assert!(t.state.notifications.is_empty());
        assert_eq!(t.sync[0].kind(), "DELETE_NOTIFICATION");
    }

    #[test]
    fn completed_ceremony_wipes_everything_but_the_actor() {
        let mut sa = manager("Root", Role::SuperAdmin, Branch::GodownHq);
        sa.last_login = Some(now() - Duration::minutes(1));
        let clerk = staff("Otieno", Branch::Naivasha, Department::Sales);
        let state = state_with(vec![sa.clone(), clerk.clone()]);
        let state = run(&state, submit(&clerk, LeaveType::Annual, &["2025-07-01"])).state;

        let mut guard = ResetGuard::new(2, Duration::minutes(10));
        let token = guard.trigger(&sa, now()).unwrap();
        guard.confirm_pin(&sa, &pin(TEST_PIN)).unwrap();
        guard.confirm_token(&sa.id, &token.to_string()).unwrap();
        let authorization = guard
            .confirm_phrase(&sa.id, CONFIRMATION_PHRASE, now())
            .unwrap();

        let t = run(&state, Action::ResetSystem(authorization));
        assert_eq!(t.state.users, vec![sa.clone()]);
        assert!(t.state.requests.is_empty());
        assert!(t.state.reset_requests.is_empty());
        assert_eq!(t.state.audit_logs.len(), 1);
        assert_eq!(t.state.audit_logs[0].action, "CRITICAL_SYSTEM_RESET");
        assert_eq!(t.state.notifications.len(), 1);
        assert_eq!(t.state.notifications[0].user_id, sa.id);

        let kinds: Vec<&str> = t.sync.iter().map(SyncAction::kind).collect();
        assert!(kinds.contains(&"PURGE_ACTIVITY"));
        assert_eq!(kinds.iter().filter(|k| **k == "DELETE_USER").count(), 1);
    }

    #[test]
    fn wrong_phrase_leaves_state_untouched() {
        let mut sa = manager("Root", Role::SuperAdmin, Branch::GodownHq);
        sa.last_login = Some(now());
        let clerk = staff("Otieno", Branch::Naivasha, Department::Sales);
        let state = state_with(vec![sa.clone(), clerk]);
        let before = state.clone();

        let mut guard = ResetGuard::new(2, Duration::minutes(10));
        let token = guard.trigger(&sa, now()).unwrap();
        guard.confirm_pin(&sa, &pin(TEST_PIN)).unwrap();
        guard.confirm_token(&sa.id, &token.to_string()).unwrap();
        assert!(guard.confirm_phrase(&sa.id, "RESET DATABASE", now()).is_err());

        assert_eq!(state, before);
        assert_eq!(guard.failed_attempts(&sa.id), 1);
    }

    #[test]
    fn self_update_renames_and_clears_forced_change() {
        let mut clerk = staff("Otieno", Branch::Naivasha, Department::Sales);
        clerk.must_change_pin = true;
        let peer = staff("Kamau", Branch::Naivasha, Department::Sales);
        let state = state_with(vec![clerk.clone(), peer]);

        assert_eq!(
            fail(
                &state,
                Action::UpdateSelf {
                    actor: clerk.id.clone(),
                    name: " kamau ".into(),
                    pin_hash: None,
                },
            ),
            TransitionError::NameTaken("Kamau".into())
        );

        let t = run(
            &state,
            Action::UpdateSelf {
                actor: clerk.id.clone(),
                name: "Otieno Odhiambo".into(),
                pin_hash: Some("new-hash".into()),
            },
        );
        let me = t.state.user(&clerk.id).unwrap();
        assert_eq!(me.name, "Otieno Odhiambo");
        assert_eq!(me.pin_hash, "new-hash");
        assert!(!me.must_change_pin);
        assert_eq!(t.state.audit_logs.last().unwrap().action, "PROFILE_SELF_UPDATE");
    }

    #[test]
    fn bootstrap_seeds_a_single_super_admin() {
        let t = bootstrap_admin(" Root ", PIN_HASH.clone(), now()).unwrap();
        assert_eq!(t.state.users.len(), 1);
        let admin = &t.state.users[0];
        assert_eq!(admin.name, "Root");
        assert_eq!(admin.role, Role::SuperAdmin);
        assert!(admin.is_in_service());
        assert_eq!(t.state.audit_logs[0].action, "SYSTEM_BOOTSTRAP");
        assert!(bootstrap_admin("  ", PIN_HASH.clone(), now()).is_err());
    }
}
