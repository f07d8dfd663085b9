//! Common type definitions.
//!
//! All entity IDs are UUIDs wrapped in type aliases:
//!
//! - [`UserId`]: user account identifier
//! - [`SessionId`]: login session identifier
//! - [`OperationLogId`]: audit entry identifier
//! - [`EntityId`]: identifier of a catalog record (fabric, product, ...)
//!
//! [`abbrev_uuid`] shortens UUIDs for logs and traces.

use uuid::Uuid;

pub type UserId = Uuid;
pub type SessionId = Uuid;
pub type OperationLogId = Uuid;
pub type EntityId = Uuid;

/// Abbreviate a UUID to its first 8 characters for more readable logs and traces
/// Example: "550e8400-e29b-41d4-a716-446655440000" -> "550e8400"
pub fn abbrev_uuid(uuid: &Uuid) -> String {
    uuid.to_string().chars().take(8).collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_abbrev_uuid() {
        let id = Uuid::parse_str("550e8400-e29b-41d4-a716-446655440000").unwrap();
        assert_eq!(abbrev_uuid(&id), "550e8400");
    }
}
