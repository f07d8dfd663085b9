//! API models for the operation audit trail.

use chrono::{DateTime, NaiveDate, Utc};
use serde::{Deserialize, Serialize};
use utoipa::{IntoParams, ToSchema};

use crate::db::models::operation_logs::{OperationAction, OperationLogDBResponse, OperationLogFilter};
use crate::errors::Error;
use crate::types::{OperationLogId, UserId};

/// Query parameters for listing audit entries
#[derive(Debug, Clone, Default, Deserialize, IntoParams)]
#[serde(rename_all = "camelCase")]
#[into_params(parameter_in = Query)]
pub struct ListOperationLogsQuery {
    /// Only entries made by this user (UUID)
    pub user_id: Option<String>,
    /// Only entries about this entity type, e.g. `products`
    pub entity_type: Option<String>,
    /// Inclusive lower bound: RFC 3339 timestamp or `YYYY-MM-DD` (midnight UTC)
    pub start_date: Option<String>,
    /// Inclusive upper bound: RFC 3339 timestamp or `YYYY-MM-DD` (midnight UTC)
    pub end_date: Option<String>,
}

fn parse_bound(field: &str, value: &str) -> Result<DateTime<Utc>, Error> {
    if let Ok(instant) = DateTime::parse_from_rfc3339(value) {
        return Ok(instant.with_timezone(&Utc));
    }
    NaiveDate::parse_from_str(value, "%Y-%m-%d")
        .ok()
        .and_then(|date| date.and_hms_opt(0, 0, 0))
        .map(|midnight| midnight.and_utc())
        .ok_or_else(|| Error::validation(field, format!("{field} must be an RFC 3339 timestamp or a YYYY-MM-DD date")))
}

fn parse_user_id(value: &str) -> Result<UserId, Error> {
    UserId::parse_str(value).map_err(|_| Error::validation("userId", "userId must be a UUID"))
}

/// Blank parameters (`?userId=`) are treated as absent
fn present(value: Option<String>) -> Option<String> {
    value.filter(|v| !v.trim().is_empty())
}

impl TryFrom<ListOperationLogsQuery> for OperationLogFilter {
    type Error = Error;

    fn try_from(query: ListOperationLogsQuery) -> Result<Self, Error> {
        Ok(Self {
            user_id: present(query.user_id).as_deref().map(parse_user_id).transpose()?,
            entity_type: present(query.entity_type),
            start_date: present(query.start_date).as_deref().map(|v| parse_bound("startDate", v)).transpose()?,
            end_date: present(query.end_date).as_deref().map(|v| parse_bound("endDate", v)).transpose()?,
        })
    }
}

/// One audit entry
#[derive(Debug, Clone, Serialize, Deserialize, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct OperationLogResponse {
    #[schema(value_type = String, format = "uuid")]
    pub id: OperationLogId,
    /// Acting user; null once that user has been deleted
    #[schema(value_type = Option<String>, format = "uuid")]
    pub user_id: Option<UserId>,
    pub method: String,
    pub route: String,
    pub action: OperationAction,
    pub entity_type: Option<String>,
    pub entity_id: Option<String>,
    pub metadata: Option<serde_json::Value>,
    pub created_at: DateTime<Utc>,
}

impl From<OperationLogDBResponse> for OperationLogResponse {
    fn from(db: OperationLogDBResponse) -> Self {
        Self {
            id: db.id,
            user_id: db.user_id,
            method: db.method,
            route: db.route,
            action: db.action,
            entity_type: db.entity_type,
            entity_id: db.entity_id,
            metadata: db.metadata,
            created_at: db.created_at,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;

    #[test]
    fn test_date_only_bounds_are_midnight_utc() {
        let filter = OperationLogFilter::try_from(ListOperationLogsQuery {
            start_date: Some("2024-03-01".to_string()),
            end_date: Some("2024-03-05T12:30:00+02:00".to_string()),
            ..Default::default()
        })
        .unwrap();

        assert_eq!(filter.start_date, Some(Utc.with_ymd_and_hms(2024, 3, 1, 0, 0, 0).unwrap()));
        assert_eq!(filter.end_date, Some(Utc.with_ymd_and_hms(2024, 3, 5, 10, 30, 0).unwrap()));
    }

    #[test]
    fn test_bad_date_names_field() {
        let err = OperationLogFilter::try_from(ListOperationLogsQuery {
            end_date: Some("yesterday".to_string()),
            ..Default::default()
        })
        .unwrap_err();
        assert_eq!(err.field().as_deref(), Some("endDate"));
    }

    #[test]
    fn test_blank_parameters_are_unconstrained() {
        let filter = OperationLogFilter::try_from(ListOperationLogsQuery {
            user_id: Some(String::new()),
            entity_type: Some(String::new()),
            start_date: Some(String::new()),
            end_date: Some(" ".to_string()),
        })
        .unwrap();
        assert!(filter.user_id.is_none());
        assert!(filter.entity_type.is_none());
        assert!(filter.start_date.is_none());
        assert!(filter.end_date.is_none());
    }

    #[test]
    fn test_bad_user_id_names_field() {
        let err = OperationLogFilter::try_from(ListOperationLogsQuery {
            user_id: Some("not-a-uuid".to_string()),
            ..Default::default()
        })
        .unwrap_err();
        assert_eq!(err.field().as_deref(), Some("userId"));
    }
}
