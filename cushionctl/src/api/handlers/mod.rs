pub mod auth;
pub mod catalog;
pub mod operation_logs;
pub mod statistics;
pub mod users;
