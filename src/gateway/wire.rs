//! Snake_case records exchanged with the durable store.
//!
//! The in-memory model serialises camelCase and uses typed enums; the store
//! keeps plain strings and JSON columns. Everything crossing the boundary is
//! converted here and nowhere else.

use std::collections::BTreeMap;
use std::str::FromStr;

use chrono::{DateTime, NaiveDate, Utc};
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};
use sqlx::FromRow;
use sqlx::types::Json;
use thiserror::Error;

use crate::error::ValidationError;
use crate::model::{
    AppState, AuditLog, Balances, LeaveDates, LeaveRequest, LeaveType, Notification,
    ResetRequest, User,
};

#[derive(Debug, Error)]
pub enum WireError {
    #[error("unrecognised {field} value {value:?}")]
    Unrecognised { field: &'static str, value: String },
    #[error(transparent)]
    Invalid(#[from] ValidationError),
}

fn parse<T: FromStr>(field: &'static str, value: &str) -> Result<T, WireError> {
    value.parse().map_err(|_| WireError::Unrecognised {
        field,
        value: value.to_string(),
    })
}

/* ===============================
Records
=============================== */

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, FromRow)]
pub struct UserRecord {
    pub id: String,
    pub name: String,
    pub role: String,
    pub department: String,
    pub branch: String,
    pub is_active: bool,
    pub is_approved: bool,
    pub is_blocked: bool,
    /// Omitted by stores that never hand credentials out.
    #[serde(default)]
    pub pin_hash: String,
    #[serde(default)]
    pub failed_attempts: u32,
    pub last_login: Option<DateTime<Utc>>,
    pub balances: Json<BTreeMap<String, i32>>,
    #[serde(default)]
    pub must_change_pin: bool,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, FromRow)]
pub struct RequestRecord {
    pub id: String,
    pub user_id: String,
    pub user_name: String,
    pub user_role: String,
    pub department: String,
    pub branch: String,
    pub leave_type: String,
    pub dates: Json<Vec<NaiveDate>>,
    pub reason: String,
    pub status: String,
    pub manager_comment: Option<String>,
    pub created_at: DateTime<Utc>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, FromRow)]
pub struct AuditRecord {
    pub id: String,
    pub action: String,
    pub performed_by: String,
    pub timestamp: DateTime<Utc>,
    pub details: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, FromRow)]
pub struct NotificationRecord {
    pub id: String,
    pub user_id: String,
    pub message: String,
    pub is_read: bool,
    pub timestamp: DateTime<Utc>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, FromRow)]
pub struct ResetRecord {
    pub id: String,
    pub user_name: String,
    pub department: String,
    pub status: String,
    pub created_at: DateTime<Utc>,
}

/// Partial update of one row: `{ "id": ..., "updates": { column: value } }`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RecordUpdate {
    pub id: String,
    pub updates: Map<String, Value>,
}

impl RecordUpdate {
    /// Picks `columns` out of the serialised `record`.
    pub fn of<T: Serialize>(id: &str, record: &T, columns: &[&str]) -> Self {
        let mut updates = Map::new();
        if let Ok(Value::Object(mut full)) = serde_json::to_value(record) {
            for column in columns {
                if let Some(value) = full.remove(*column) {
                    updates.insert((*column).to_string(), value);
                }
            }
        }
        Self {
            id: id.to_string(),
            updates,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct EntityRef {
    pub id: String,
}

/// Wipes every user but `keep_user` and all activity tables.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PurgeScope {
    pub keep_user: String,
}

/// Everything `GET /data` returns.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Snapshot {
    #[serde(default)]
    pub users: Vec<UserRecord>,
    #[serde(default)]
    pub requests: Vec<RequestRecord>,
    #[serde(default)]
    pub logs: Vec<AuditRecord>,
    #[serde(default)]
    pub notifications: Vec<NotificationRecord>,
    #[serde(default)]
    pub resets: Vec<ResetRecord>,
}

impl Snapshot {
    pub fn is_empty(&self) -> bool {
        self.users.is_empty()
    }

    pub fn into_state(self) -> Result<AppState, WireError> {
        let mut audit_logs: Vec<AuditLog> = self.logs.into_iter().map(AuditLog::from).collect();
        audit_logs.sort_by_key(|entry| entry.timestamp);

        Ok(AppState {
            users: self
                .users
                .into_iter()
                .map(User::try_from)
                .collect::<Result<_, _>>()?,
            requests: self
                .requests
                .into_iter()
                .map(LeaveRequest::try_from)
                .collect::<Result<_, _>>()?,
            audit_logs,
            notifications: self
                .notifications
                .into_iter()
                .map(Notification::from)
                .collect(),
            reset_requests: self
                .resets
                .into_iter()
                .map(ResetRequest::try_from)
                .collect::<Result<_, _>>()?,
        })
    }

    pub fn from_state(state: &AppState) -> Self {
        Self {
            users: state.users.iter().map(UserRecord::from).collect(),
            requests: state.requests.iter().map(RequestRecord::from).collect(),
            logs: state.audit_logs.iter().map(AuditRecord::from).collect(),
            notifications: state
                .notifications
                .iter()
                .map(NotificationRecord::from)
                .collect(),
            resets: state.reset_requests.iter().map(ResetRecord::from).collect(),
        }
    }
}

/* ===============================
Model -> wire
=============================== */

impl From<&User> for UserRecord {
    fn from(user: &User) -> Self {
        Self {
            id: user.id.to_string(),
            name: user.name.clone(),
            role: user.role.to_string(),
            department: user.department.to_string(),
            branch: user.branch.to_string(),
            is_active: user.is_active,
            is_approved: user.is_approved,
            is_blocked: user.is_blocked,
            pin_hash: user.pin_hash.clone(),
            failed_attempts: user.failed_attempts,
            last_login: user.last_login,
            balances: Json(
                user.balances
                    .iter()
                    .map(|(leave_type, days)| (leave_type.to_string(), days))
                    .collect(),
            ),
            must_change_pin: user.must_change_pin,
        }
    }
}

impl From<&LeaveRequest> for RequestRecord {
    fn from(request: &LeaveRequest) -> Self {
        Self {
            id: request.id.to_string(),
            user_id: request.user_id.to_string(),
            user_name: request.user_name.clone(),
            user_role: request.user_role.to_string(),
            department: request.department.to_string(),
            branch: request.branch.to_string(),
            leave_type: request.leave_type.to_string(),
            dates: Json(request.dates.iter().copied().collect()),
            reason: request.reason.clone(),
            status: request.status.to_string(),
            manager_comment: request.manager_comment.clone(),
            created_at: request.created_at,
        }
    }
}

impl From<&AuditLog> for AuditRecord {
    fn from(entry: &AuditLog) -> Self {
        Self {
            id: entry.id.to_string(),
            action: entry.action.clone(),
            performed_by: entry.performed_by.clone(),
            timestamp: entry.timestamp,
            details: entry.details.clone(),
        }
    }
}

impl From<&Notification> for NotificationRecord {
    fn from(notification: &Notification) -> Self {
        Self {
            id: notification.id.to_string(),
            user_id: notification.user_id.to_string(),
            message: notification.message.clone(),
            is_read: notification.is_read,
            timestamp: notification.timestamp,
        }
    }
}

impl From<&ResetRequest> for ResetRecord {
    fn from(reset: &ResetRequest) -> Self {
        Self {
            id: reset.id.to_string(),
            user_name: reset.user_name.clone(),
            department: reset.department.to_string(),
            status: reset.status.to_string(),
            created_at: reset.created_at,
        }
    }
}

/* ===============================
Wire -> model
=============================== */

impl TryFrom<UserRecord> for User {
    type Error = WireError;

    fn try_from(record: UserRecord) -> Result<Self, Self::Error> {
        let balances = record
            .balances
            .0
            .iter()
            .map(|(name, days)| Ok((parse::<LeaveType>("leave type", name)?, *days)))
            .collect::<Result<Balances, WireError>>()?;

        Ok(Self {
            id: record.id.into(),
            role: parse("role", &record.role)?,
            department: parse("department", &record.department)?,
            branch: parse("branch", &record.branch)?,
            name: record.name,
            is_active: record.is_active,
            is_approved: record.is_approved,
            is_blocked: record.is_blocked,
            pin_hash: record.pin_hash,
            failed_attempts: record.failed_attempts,
            last_login: record.last_login,
            balances,
            must_change_pin: record.must_change_pin,
        })
    }
}

impl TryFrom<RequestRecord> for LeaveRequest {
    type Error = WireError;

    fn try_from(record: RequestRecord) -> Result<Self, Self::Error> {
        Ok(Self {
            id: record.id.into(),
            user_id: record.user_id.into(),
            user_role: parse("role", &record.user_role)?,
            department: parse("department", &record.department)?,
            branch: parse("branch", &record.branch)?,
            leave_type: parse("leave type", &record.leave_type)?,
            status: parse("status", &record.status)?,
            dates: LeaveDates::new(record.dates.0)?,
            user_name: record.user_name,
            reason: record.reason,
            manager_comment: record.manager_comment,
            created_at: record.created_at,
        })
    }
}

impl From<AuditRecord> for AuditLog {
    fn from(record: AuditRecord) -> Self {
        Self {
            id: record.id.into(),
            action: record.action,
            performed_by: record.performed_by,
            timestamp: record.timestamp,
            details: record.details,
        }
    }
}

impl From<NotificationRecord> for Notification {
    fn from(record: NotificationRecord) -> Self {
        Self {
            id: record.id.into(),
            user_id: record.user_id.into(),
            message: record.message,
            is_read: record.is_read,
            timestamp: record.timestamp,
        }
    }
}

impl TryFrom<ResetRecord> for ResetRequest {
    type Error = WireError;

    fn try_from(record: ResetRecord) -> Result<Self, Self::Error> {
        Ok(Self {
            id: record.id.into(),
            department: parse("department", &record.department)?,
            status: parse("reset status", &record.status)?,
            user_name: record.user_name,
            created_at: record.created_at,
        })
    }
}
