//! Database models for the operation audit trail.

use crate::types::{OperationLogId, UserId};
use bon::Builder;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use utoipa::ToSchema;

/// Kind of mutation an entry records
#[derive(Debug, Clone, Copy, Serialize, Deserialize, sqlx::Type, PartialEq, Eq, ToSchema)]
#[sqlx(type_name = "operation_action", rename_all = "UPPERCASE")]
#[serde(rename_all = "UPPERCASE")]
pub enum OperationAction {
    Create,
    Update,
    Delete,
}

/// A new audit entry. The store assigns id, sequence number and timestamp.
#[derive(Debug, Clone, Builder)]
pub struct OperationLogCreateDBRequest {
    pub user_id: Option<UserId>,
    #[builder(into)]
    pub method: String,
    #[builder(into)]
    pub route: String,
    pub action: OperationAction,
    #[builder(into)]
    pub entity_type: Option<String>,
    #[builder(into)]
    pub entity_id: Option<String>,
    pub metadata: Option<serde_json::Value>,
}

#[derive(Debug, Clone, sqlx::FromRow)]
pub struct OperationLogDBResponse {
    pub id: OperationLogId,
    pub seq: i64,
    pub user_id: Option<UserId>,
    pub method: String,
    pub route: String,
    pub action: OperationAction,
    pub entity_type: Option<String>,
    pub entity_id: Option<String>,
    pub metadata: Option<serde_json::Value>,
    pub created_at: DateTime<Utc>,
}

/// Filters for querying the trail. Absent fields are unconstrained; present ones combine with AND.
/// Both date bounds are inclusive.
#[derive(Debug, Clone, Default)]
pub struct OperationLogFilter {
    pub user_id: Option<UserId>,
    pub entity_type: Option<String>,
    pub start_date: Option<DateTime<Utc>>,
    pub end_date: Option<DateTime<Utc>>,
}

impl OperationLogFilter {
    pub fn matches(&self, entry: &OperationLogDBResponse) -> bool {
        self.user_id.is_none_or(|id| entry.user_id == Some(id))
            && self
                .entity_type
                .as_deref()
                .is_none_or(|t| entry.entity_type.as_deref() == Some(t))
            && self.start_date.is_none_or(|start| entry.created_at >= start)
            && self.end_date.is_none_or(|end| entry.created_at <= end)
    }
}
