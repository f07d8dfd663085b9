//! Repository implementations for database access.
//!
//! Each repository wraps a borrowed `PgConnection`:
//!
//! ```ignore
//! let mut conn = pool.acquire().await?;
//! let mut users = Users::new(&mut conn);
//! let user = users.get_user_by_email("alice@example.com").await?;
//! ```

pub mod catalog;
pub mod operation_logs;
pub mod repository;
pub mod sessions;
pub mod users;

pub use catalog::CatalogEntries;
pub use operation_logs::OperationLogs;
pub use repository::Repository;
pub use sessions::Sessions;
pub use users::Users;
