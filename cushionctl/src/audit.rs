//! Operation audit trail.
//!
//! Mutating handlers call [`AuditLogger::record`] after their primary effect has succeeded. The
//! write has its own error boundary: a failure is logged at error level and swallowed, so it can
//! neither abort nor roll back the operation it describes.

use std::sync::Arc;

use tracing::{debug, error, instrument};

use crate::{
    db::{
        errors::Result,
        models::operation_logs::{OperationLogCreateDBRequest, OperationLogDBResponse, OperationLogFilter},
    },
    store::AuditStore,
};

#[derive(Clone)]
pub struct AuditLogger {
    store: Arc<dyn AuditStore>,
}

impl AuditLogger {
    pub fn new(store: Arc<dyn AuditStore>) -> Self {
        Self { store }
    }

    /// Append one entry. Never fails from the caller's point of view.
    #[instrument(skip_all, fields(action = ?entry.action, route = %entry.route, entity_type = ?entry.entity_type))]
    pub async fn record(&self, entry: OperationLogCreateDBRequest) {
        match self.store.append(&entry).await {
            Ok(logged) => debug!(seq = logged.seq, "Operation recorded"),
            Err(e) => error!(
                method = %entry.method,
                entity_id = ?entry.entity_id,
                "Failed to record operation: {:#}",
                e
            ),
        }
    }

    /// Entries matching `filter`, newest first
    pub async fn query(&self, filter: &OperationLogFilter) -> Result<Vec<OperationLogDBResponse>> {
        self.store.query(filter).await
    }
}
