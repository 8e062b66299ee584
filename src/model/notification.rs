use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::model::{NotificationId, UserId};

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Notification {
    pub id: NotificationId,
    pub user_id: UserId,
    pub message: String,
    pub is_read: bool,
    pub timestamp: DateTime<Utc>,
}
