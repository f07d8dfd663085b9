//! Database record models matching table schemas.

pub mod catalog;
pub mod operation_logs;
pub mod sessions;
pub mod users;
