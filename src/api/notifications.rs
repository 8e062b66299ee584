use actix_web::{HttpResponse, web};
use chrono::{DateTime, Utc};
use serde::Serialize;
use utoipa::ToSchema;

use crate::auth::auth::AuthUser;
use crate::engine::Action;
use crate::error::DeskError;
use crate::model::{Notification, NotificationId};
use crate::store::LeaveDesk;

#[derive(Debug, Serialize, ToSchema)]
pub struct NotificationView {
    #[schema(value_type = String)]
    pub id: NotificationId,
    #[schema(example = "Status Update: Your Annual Leave request has been APPROVED.")]
    pub message: String,
    pub is_read: bool,
    #[schema(example = "2026-01-01T00:00:00Z", format = "date-time", value_type = String)]
    pub timestamp: DateTime<Utc>,
}

impl From<&Notification> for NotificationView {
    fn from(n: &Notification) -> Self {
        Self {
            id: n.id.clone(),
            message: n.message.clone(),
            is_read: n.is_read,
            timestamp: n.timestamp,
        }
    }
}

#[utoipa::path(
    get,
    path = "/api/notifications",
    responses(
        (status = 200, description = "The caller's notifications, newest first", body = Vec<NotificationView>),
        (status = 401, description = "Unauthorized")
    ),
    security(("bearer_auth" = [])),
    tag = "Notifications"
)]
pub async fn list_notifications(
    auth: AuthUser,
    desk: web::Data<LeaveDesk>,
) -> Result<HttpResponse, DeskError> {
    let mut mine: Vec<NotificationView> = desk.read(|s| {
        s.notifications_for(&auth.user_id)
            .map(NotificationView::from)
            .collect()
    });
    mine.sort_by(|a, b| b.timestamp.cmp(&a.timestamp));

    Ok(HttpResponse::Ok().json(mine))
}

#[utoipa::path(
    delete,
    path = "/api/notifications/{notification_id}",
    params(("notification_id" = String, Path, description = "Notification to dismiss")),
    responses(
        (status = 204, description = "Notification cleared"),
        (status = 403, description = "Addressed to someone else"),
        (status = 404, description = "Unknown notification")
    ),
    security(("bearer_auth" = [])),
    tag = "Notifications"
)]
pub async fn clear_notification(
    auth: AuthUser,
    desk: web::Data<LeaveDesk>,
    path: web::Path<String>,
) -> Result<HttpResponse, DeskError> {
    desk.dispatch(Action::ClearNotification {
        actor: auth.user_id.clone(),
        notification_id: NotificationId::from(path.into_inner()),
    })?;

    Ok(HttpResponse::NoContent().finish())
}
