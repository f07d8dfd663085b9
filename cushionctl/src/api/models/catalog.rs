//! Request/response models for the catalog collections.
//!
//! Update payloads are partial: a missing field is left unchanged. For nullable columns an
//! explicit `null` clears the value, hence the `Option<Option<_>>` fields.

use crate::db::models::catalog::{
    DesignIdeaStatus, Product, ProductPhase, ProductStatus, RequirementPriority, RequirementStatus,
};
use rust_decimal::Decimal;
use serde::{Deserialize, Deserializer, Serialize};

/// Distinguish an explicit `null` (`Some(None)`) from an absent field (`None`)
fn deserialize_some<'de, T, D>(deserializer: D) -> Result<Option<T>, D::Error>
where
    T: Deserialize<'de>,
    D: Deserializer<'de>,
{
    T::deserialize(deserializer).map(Some)
}

#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct FabricCreate {
    pub name: String,
    pub color: String,
    pub width: i32,
    pub gram_weight: i32,
    pub price: Decimal,
    #[serde(default)]
    pub image_url: Option<String>,
}

#[derive(Debug, Clone, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct FabricUpdate {
    pub name: Option<String>,
    pub color: Option<String>,
    pub width: Option<i32>,
    pub gram_weight: Option<i32>,
    pub price: Option<Decimal>,
    #[serde(default, deserialize_with = "deserialize_some")]
    pub image_url: Option<Option<String>>,
}

#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AccessoryCreate {
    pub name: String,
    pub price: Decimal,
    #[serde(default)]
    pub image_url: Option<String>,
}

#[derive(Debug, Clone, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AccessoryUpdate {
    pub name: Option<String>,
    pub price: Option<Decimal>,
    #[serde(default, deserialize_with = "deserialize_some")]
    pub image_url: Option<Option<String>>,
}

#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ProductCreate {
    pub code: String,
    pub name: String,
    #[serde(default)]
    pub image_url: Option<String>,
    #[serde(default)]
    pub phase: ProductPhase,
    #[serde(default)]
    pub cover_cost: Option<Decimal>,
    #[serde(default)]
    pub inner_core_cost: Option<Decimal>,
    #[serde(default)]
    pub package_cost: Option<Decimal>,
    #[serde(default)]
    pub general_cost: Option<Decimal>,
    #[serde(default)]
    pub model_url: Option<String>,
    #[serde(default)]
    pub status: ProductStatus,
}

#[derive(Debug, Clone, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ProductUpdate {
    pub code: Option<String>,
    pub name: Option<String>,
    #[serde(default, deserialize_with = "deserialize_some")]
    pub image_url: Option<Option<String>>,
    pub phase: Option<ProductPhase>,
    #[serde(default, deserialize_with = "deserialize_some")]
    pub cover_cost: Option<Option<Decimal>>,
    #[serde(default, deserialize_with = "deserialize_some")]
    pub inner_core_cost: Option<Option<Decimal>>,
    #[serde(default, deserialize_with = "deserialize_some")]
    pub package_cost: Option<Option<Decimal>>,
    #[serde(default, deserialize_with = "deserialize_some")]
    pub general_cost: Option<Option<Decimal>>,
    #[serde(default, deserialize_with = "deserialize_some")]
    pub model_url: Option<Option<String>>,
    pub status: Option<ProductStatus>,
}

/// Product with its derived total cost
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct ProductResponse {
    #[serde(flatten)]
    pub product: Product,
    pub total_cost: Decimal,
}

impl From<Product> for ProductResponse {
    fn from(product: Product) -> Self {
        Self {
            total_cost: product.total_cost(),
            product,
        }
    }
}

#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct DesignIdeaCreate {
    pub title: String,
    pub description: String,
    #[serde(default)]
    pub image_urls: Vec<String>,
    #[serde(default)]
    pub demand_analysis: Option<String>,
    #[serde(default)]
    pub negative_reviews: Option<String>,
    #[serde(default)]
    pub redesign_reason: Option<String>,
    #[serde(default)]
    pub price_range_min: Option<Decimal>,
    #[serde(default)]
    pub price_range_max: Option<Decimal>,
    /// Defaults to the creator's display name
    #[serde(default)]
    pub created_by: Option<String>,
    #[serde(default)]
    pub status: DesignIdeaStatus,
}

#[derive(Debug, Clone, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct DesignIdeaUpdate {
    pub title: Option<String>,
    pub description: Option<String>,
    pub image_urls: Option<Vec<String>>,
    #[serde(default, deserialize_with = "deserialize_some")]
    pub demand_analysis: Option<Option<String>>,
    #[serde(default, deserialize_with = "deserialize_some")]
    pub negative_reviews: Option<Option<String>>,
    #[serde(default, deserialize_with = "deserialize_some")]
    pub redesign_reason: Option<Option<String>>,
    #[serde(default, deserialize_with = "deserialize_some")]
    pub price_range_min: Option<Option<Decimal>>,
    #[serde(default, deserialize_with = "deserialize_some")]
    pub price_range_max: Option<Option<Decimal>>,
    pub status: Option<DesignIdeaStatus>,
}

#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ClientRequirementCreate {
    pub client_name: String,
    pub description: String,
    pub requirements: String,
    #[serde(default)]
    pub status: RequirementStatus,
    #[serde(default)]
    pub priority: RequirementPriority,
}

#[derive(Debug, Clone, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ClientRequirementUpdate {
    pub client_name: Option<String>,
    pub description: Option<String>,
    pub requirements: Option<String>,
    pub status: Option<RequirementStatus>,
    pub priority: Option<RequirementPriority>,
}
