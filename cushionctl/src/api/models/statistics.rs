//! Dashboard counts over the catalog.

use serde::{Deserialize, Serialize};
use utoipa::ToSchema;

/// Totals shown on the home dashboard
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct CatalogStatistics {
    pub total_fabrics: u64,
    pub total_accessories: u64,
    pub total_products: u64,
    /// Design ideas still pending or in progress
    pub active_design_ideas: u64,
    /// Client requirements nobody has started on
    pub pending_requirements: u64,
}
