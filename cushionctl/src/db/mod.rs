//! Database layer for data persistence and access.
//!
//! ```text
//! ┌──────────────┐
//! │    store     │  (storage traits the API layer talks to)
//! └──────┬───────┘
//!        ↓
//! ┌──────────────┐
//! │ Repositories │  (db::handlers - queries over a borrowed connection)
//! └──────┬───────┘
//!        ↓
//! ┌──────────────┐
//! │    Models    │  (db::models - database records)
//! └──────┬───────┘
//!        ↓
//! ┌──────────────┐
//! │  PostgreSQL  │
//! └──────────────┘
//! ```
//!
//! - [`handlers`]: one repository per table, plus a generic one for catalog records
//! - [`models`]: record structures matching table schemas
//! - [`errors`]: storage error type shared with the in-memory backend

pub mod errors;
pub mod handlers;
pub mod models;
