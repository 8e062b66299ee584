use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use strum_macros::{Display, EnumString};

use crate::model::{Department, ResetRequestId};

#[derive(Debug, Copy, Clone, Eq, PartialEq, Serialize, Deserialize, Display, EnumString)]
#[serde(rename_all = "UPPERCASE")]
pub enum ResetStatus {
    #[strum(serialize = "PENDING")]
    Pending,
    #[strum(serialize = "RESOLVED")]
    Resolved,
}

/// Credential recovery ticket raised from the sign-in screen.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ResetRequest {
    pub id: ResetRequestId,
    pub user_name: String,
    pub department: Department,
    pub status: ResetStatus,
    pub created_at: DateTime<Utc>,
}
