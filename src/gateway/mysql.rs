use futures::future::BoxFuture;
use sqlx::MySqlPool;
use tracing::{debug, warn};

use crate::auth::password::verify_pin;
use crate::gateway::{
    AuditRecord, GatewayError, NotificationRecord, RecordUpdate, RequestRecord, ResetRecord,
    Snapshot, SyncAction, SyncGateway, UserRecord,
};
use crate::model::Pin;
use crate::utils::db_utils::{build_update_sql, execute_update};

/// Columns an `UPDATE_USER` may touch.
const USER_COLUMNS: &[&str] = &[
    "name",
    "role",
    "department",
    "branch",
    "is_active",
    "is_approved",
    "is_blocked",
    "pin_hash",
    "failed_attempts",
    "last_login",
    "balances",
    "must_change_pin",
];

/// Columns an `UPDATE_REQUEST` may touch.
const REQUEST_COLUMNS: &[&str] = &["status", "manager_comment", "dates"];

/// Most recent audit entries returned by a full fetch.
const AUDIT_FETCH_LIMIT: i64 = 100;

/// Reaches the relational store directly, schema in `schema.sql`.
#[derive(Debug, Clone)]
pub struct MySqlGateway {
    pool: MySqlPool,
}

impl MySqlGateway {
    pub fn new(pool: MySqlPool) -> Self {
        Self { pool }
    }

    async fn load(&self) -> Result<Snapshot, sqlx::Error> {
        let users = sqlx::query_as::<_, UserRecord>(
            r#"
            SELECT id, name, role, department, branch, is_active, is_approved, is_blocked,
                   pin_hash, failed_attempts, last_login, balances, must_change_pin
            FROM users
            ORDER BY created_at DESC
            "#,
        )
        .fetch_all(&self.pool)
        .await?;

        let requests = sqlx::query_as::<_, RequestRecord>(
            r#"
            SELECT id, user_id, user_name, user_role, department, branch, leave_type, dates,
                   reason, status, manager_comment, created_at
            FROM leave_requests
            ORDER BY created_at DESC
            "#,
        )
        .fetch_all(&self.pool)
        .await?;

        let logs = sqlx::query_as::<_, AuditRecord>(
            r#"
            SELECT id, action, performed_by, timestamp, details
            FROM audit_logs
            ORDER BY timestamp DESC
            LIMIT ?
            "#,
        )
        .bind(AUDIT_FETCH_LIMIT)
        .fetch_all(&self.pool)
        .await?;

        let notifications = sqlx::query_as::<_, NotificationRecord>(
            r#"
            SELECT id, user_id, message, is_read, timestamp
            FROM notifications
            ORDER BY timestamp DESC
            "#,
        )
        .fetch_all(&self.pool)
        .await?;

        let resets = sqlx::query_as::<_, ResetRecord>(
            r#"
            SELECT id, user_name, department, status, created_at
            FROM reset_requests
            ORDER BY created_at DESC
            "#,
        )
        .fetch_all(&self.pool)
        .await?;

        Ok(Snapshot {
            users,
            requests,
            logs,
            notifications,
            resets,
        })
    }

    async fn update(
        &self,
        table: &str,
        allowed: &[&str],
        update: &RecordUpdate,
    ) -> Result<(), GatewayError> {
        let sql = build_update_sql(table, &update.updates, allowed, "id", &update.id)
            .map_err(|e| GatewayError::Rejected(e.to_string()))?;
        let affected = execute_update(&self.pool, sql).await?;
        if affected == 0 {
            warn!(table, id = %update.id, "Update matched no row");
        }
        Ok(())
    }

    async fn apply(&self, action: SyncAction) -> Result<(), GatewayError> {
        match action {
            SyncAction::Register(user) => {
                sqlx::query(
                    r#"
                    INSERT INTO users
                        (id, name, role, department, branch, is_active, is_approved, is_blocked,
                         pin_hash, failed_attempts, last_login, balances, must_change_pin)
                    VALUES (?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?)
                    "#,
                )
                .bind(&user.id)
                .bind(&user.name)
                .bind(&user.role)
                .bind(&user.department)
                .bind(&user.branch)
                .bind(user.is_active)
                .bind(user.is_approved)
                .bind(user.is_blocked)
                .bind(&user.pin_hash)
                .bind(user.failed_attempts)
                .bind(user.last_login)
                .bind(&user.balances)
                .bind(user.must_change_pin)
                .execute(&self.pool)
                .await?;
            }
            SyncAction::AddRequest(request) => {
                sqlx::query(
                    r#"
                    INSERT INTO leave_requests
                        (id, user_id, user_name, user_role, department, branch, leave_type,
                         dates, reason, status, manager_comment, created_at)
                    VALUES (?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?)
                    "#,
                )
                .bind(&request.id)
                .bind(&request.user_id)
                .bind(&request.user_name)
                .bind(&request.user_role)
                .bind(&request.department)
                .bind(&request.branch)
                .bind(&request.leave_type)
                .bind(&request.dates)
                .bind(&request.reason)
                .bind(&request.status)
                .bind(&request.manager_comment)
                .bind(request.created_at)
                .execute(&self.pool)
                .await?;
            }
            SyncAction::UpdateRequest(update) => {
                self.update("leave_requests", REQUEST_COLUMNS, &update)
                    .await?;
            }
            SyncAction::UpdateUser(update) => {
                self.update("users", USER_COLUMNS, &update).await?;
            }
            SyncAction::DeleteUser(target) => {
                sqlx::query("DELETE FROM users WHERE id = ?")
                    .bind(&target.id)
                    .execute(&self.pool)
                    .await?;
            }
            SyncAction::DeleteNotification(target) => {
                sqlx::query("DELETE FROM notifications WHERE id = ?")
                    .bind(&target.id)
                    .execute(&self.pool)
                    .await?;
            }
            SyncAction::UpdateReset(target) => {
                sqlx::query("UPDATE reset_requests SET status = 'RESOLVED' WHERE id = ?")
                    .bind(&target.id)
                    .execute(&self.pool)
                    .await?;
            }
            SyncAction::AddNotification(notification) => {
                sqlx::query(
                    r#"
                    INSERT INTO notifications (id, user_id, message, is_read, timestamp)
                    VALUES (?, ?, ?, ?, ?)
                    "#,
                )
                .bind(&notification.id)
                .bind(&notification.user_id)
                .bind(&notification.message)
                .bind(notification.is_read)
                .bind(notification.timestamp)
                .execute(&self.pool)
                .await?;
            }
            SyncAction::AddReset(reset) => {
                sqlx::query(
                    r#"
                    INSERT INTO reset_requests (id, user_name, department, status, created_at)
                    VALUES (?, ?, ?, ?, ?)
                    "#,
                )
                .bind(&reset.id)
                .bind(&reset.user_name)
                .bind(&reset.department)
                .bind(&reset.status)
                .bind(reset.created_at)
                .execute(&self.pool)
                .await?;
            }
            SyncAction::AppendAudit(entry) => {
                sqlx::query(
                    r#"
                    INSERT INTO audit_logs (id, action, performed_by, timestamp, details)
                    VALUES (?, ?, ?, ?, ?)
                    "#,
                )
                .bind(&entry.id)
                .bind(&entry.action)
                .bind(&entry.performed_by)
                .bind(entry.timestamp)
                .bind(&entry.details)
                .execute(&self.pool)
                .await?;
            }
            SyncAction::PurgeActivity(scope) => {
                let mut tx = self.pool.begin().await?;
                for table in ["leave_requests", "notifications", "reset_requests", "audit_logs"] {
                    sqlx::query(&format!("DELETE FROM {table}"))
                        .execute(&mut *tx)
                        .await?;
                }
                sqlx::query("DELETE FROM users WHERE id <> ?")
                    .bind(&scope.keep_user)
                    .execute(&mut *tx)
                    .await?;
                tx.commit().await?;
            }
        }
        Ok(())
    }
}

impl SyncGateway for MySqlGateway {
    fn name(&self) -> &'static str {
        "mysql"
    }

    fn fetch_all(&self) -> BoxFuture<'_, Result<Snapshot, GatewayError>> {
        Box::pin(async move { Ok(self.load().await?) })
    }

    fn sync(&self, action: SyncAction) -> BoxFuture<'_, Result<(), GatewayError>> {
        Box::pin(async move {
            let kind = action.kind();
            self.apply(action).await?;
            debug!(kind, "Applied sync action");
            Ok(())
        })
    }

    fn verify<'a>(
        &'a self,
        name: &'a str,
        pin: &'a Pin,
    ) -> BoxFuture<'a, Result<Option<UserRecord>, GatewayError>> {
        Box::pin(async move {
            let record = sqlx::query_as::<_, UserRecord>(
                r#"
                SELECT id, name, role, department, branch, is_active, is_approved, is_blocked,
                       pin_hash, failed_attempts, last_login, balances, must_change_pin
                FROM users
                WHERE name = ?
                AND NOT (is_active = FALSE AND is_blocked = TRUE)
                LIMIT 1
                "#,
            )
            .bind(name.trim())
            .fetch_optional(&self.pool)
            .await?;

            Ok(record.filter(|user| verify_pin(pin, &user.pin_hash)))
        })
    }
}
