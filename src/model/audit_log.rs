use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::model::AuditId;

/// Append-only record of something that changed.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AuditLog {
    pub id: AuditId,
    pub action: String,
    pub performed_by: String,
    pub timestamp: DateTime<Utc>,
    pub details: Option<String>,
}
