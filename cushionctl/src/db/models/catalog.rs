//! Catalog records: fabrics, accessories, products, design ideas and client requirements.
//!
//! Each record type implements [`Entity`], which is everything the generic repository, the
//! in-memory store and the CRUD handlers need to know about it.

use crate::api::models::catalog::{
    AccessoryCreate, AccessoryUpdate, ClientRequirementCreate, ClientRequirementUpdate, DesignIdeaCreate, DesignIdeaUpdate,
    FabricCreate, FabricUpdate, ProductCreate, ProductResponse, ProductUpdate,
};
use crate::api::models::users::CurrentUser;
use crate::db::errors::DbError;
use crate::errors::Error;
use crate::types::EntityId;
use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize, de::DeserializeOwned};
use sqlx::{FromRow, Postgres, postgres::PgRow, query_builder::Separated};

/// A record that failed validation, naming the offending wire field
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Violation {
    pub field: &'static str,
    pub message: String,
}

impl Violation {
    fn new(field: &'static str, message: impl Into<String>) -> Self {
        Self {
            field,
            message: message.into(),
        }
    }
}

impl From<Violation> for Error {
    fn from(v: Violation) -> Self {
        Error::Validation {
            field: Some(v.field.to_string()),
            message: v.message,
        }
    }
}

impl Violation {
    pub fn into_db_error(self, table: &str) -> DbError {
        DbError::CheckViolation {
            constraint: Some(self.field.to_string()),
            table: Some(table.to_string()),
            message: self.message,
        }
    }
}

/// A value that must be unique across the table
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct UniqueKey {
    pub constraint: &'static str,
    pub value: String,
}

pub trait Entity: Serialize + for<'r> FromRow<'r, PgRow> + Clone + Send + Sync + Unpin + 'static {
    type Create: DeserializeOwned + Send + 'static;
    type Update: DeserializeOwned + Send + 'static;
    type Response: Serialize + From<Self> + Send;

    /// Table name, also the entity type tag recorded in the audit trail
    const TABLE: &'static str;
    /// Human-readable name used in error messages
    const NAME: &'static str;
    /// Every column, in the order [`Entity::push_values`] binds them
    const COLUMNS: &'static [&'static str];
    /// Statuses under which a record still counts as open work
    const OPEN_STATUSES: &'static [&'static str] = &[];

    fn id(&self) -> EntityId;

    fn created_at(&self) -> DateTime<Utc>;

    fn from_create(id: EntityId, created_at: DateTime<Utc>, request: Self::Create, creator: &CurrentUser) -> Self;

    /// Apply a partial update; absent fields are left unchanged
    fn apply(&mut self, changes: Self::Update);

    fn check(&self) -> Result<(), Violation>;

    fn push_values<'args>(&self, row: &mut Separated<'_, 'args, Postgres, &'static str>);

    fn unique_key(&self) -> Option<UniqueKey> {
        None
    }

    /// Workflow status as stored, for types that have one
    fn status_tag(&self) -> Option<&'static str> {
        None
    }

    fn is_open(&self) -> bool {
        self.status_tag().is_some_and(|status| Self::OPEN_STATUSES.contains(&status))
    }
}

/// Which records a count includes
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CountScope {
    All,
    /// Only records whose status is one of [`Entity::OPEN_STATUSES`]
    Open,
}

fn required(field: &'static str, value: &str) -> Result<(), Violation> {
    if value.trim().is_empty() {
        return Err(Violation::new(field, format!("{field} must not be empty")));
    }
    Ok(())
}

/// Money columns are `NUMERIC(10, 2)`
const AMOUNT_SCALE: u32 = 2;
const AMOUNT_LIMIT: i64 = 100_000_000;

/// A non-negative amount that fits the money columns
fn amount(field: &'static str, value: Option<Decimal>) -> Result<(), Violation> {
    let Some(v) = value else {
        return Ok(());
    };
    if v < Decimal::ZERO {
        return Err(Violation::new(field, format!("{field} must not be negative")));
    }
    if v >= Decimal::from(AMOUNT_LIMIT) {
        return Err(Violation::new(field, format!("{field} must be less than {AMOUNT_LIMIT}")));
    }
    if v.normalize().scale() > AMOUNT_SCALE {
        return Err(Violation::new(
            field,
            format!("{field} must have at most {AMOUNT_SCALE} decimal places"),
        ));
    }
    Ok(())
}

fn positive(field: &'static str, value: i32) -> Result<(), Violation> {
    if value <= 0 {
        return Err(Violation::new(field, format!("{field} must be greater than zero")));
    }
    Ok(())
}

macro_rules! set_if_some {
    ($target:expr, $changes:expr, $($field:ident),+ $(,)?) => {
        $(
            if let Some(value) = $changes.$field {
                $target.$field = value;
            }
        )+
    };
}

#[derive(Debug, Clone, Serialize, Deserialize, FromRow, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct Fabric {
    pub id: EntityId,
    pub name: String,
    pub color: String,
    /// Roll width in centimetres
    pub width: i32,
    /// Grams per square metre
    pub gram_weight: i32,
    pub price: Decimal,
    pub image_url: Option<String>,
    pub created_at: DateTime<Utc>,
}

impl Entity for Fabric {
    type Create = FabricCreate;
    type Update = FabricUpdate;
    type Response = Fabric;

    const TABLE: &'static str = "fabrics";
    const NAME: &'static str = "Fabric";
    const COLUMNS: &'static [&'static str] = &["id", "name", "color", "width", "gram_weight", "price", "image_url", "created_at"];

    fn id(&self) -> EntityId {
        self.id
    }

    fn created_at(&self) -> DateTime<Utc> {
        self.created_at
    }

    fn from_create(id: EntityId, created_at: DateTime<Utc>, request: FabricCreate, _creator: &CurrentUser) -> Self {
        Self {
            id,
            name: request.name,
            color: request.color,
            width: request.width,
            gram_weight: request.gram_weight,
            price: request.price,
            image_url: request.image_url,
            created_at,
        }
    }

    fn apply(&mut self, changes: FabricUpdate) {
        set_if_some!(self, changes, name, color, width, gram_weight, price, image_url);
    }

    fn check(&self) -> Result<(), Violation> {
        required("name", &self.name)?;
        required("color", &self.color)?;
        positive("width", self.width)?;
        positive("gramWeight", self.gram_weight)?;
        amount("price", Some(self.price))
    }

    fn push_values<'args>(&self, row: &mut Separated<'_, 'args, Postgres, &'static str>) {
        row.push_bind(self.id)
            .push_bind(self.name.clone())
            .push_bind(self.color.clone())
            .push_bind(self.width)
            .push_bind(self.gram_weight)
            .push_bind(self.price)
            .push_bind(self.image_url.clone())
            .push_bind(self.created_at);
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, FromRow, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct Accessory {
    pub id: EntityId,
    pub name: String,
    pub price: Decimal,
    pub image_url: Option<String>,
    pub created_at: DateTime<Utc>,
}

impl Entity for Accessory {
    type Create = AccessoryCreate;
    type Update = AccessoryUpdate;
    type Response = Accessory;

    const TABLE: &'static str = "accessories";
    const NAME: &'static str = "Accessory";
    const COLUMNS: &'static [&'static str] = &["id", "name", "price", "image_url", "created_at"];

    fn id(&self) -> EntityId {
        self.id
    }

    fn created_at(&self) -> DateTime<Utc> {
        self.created_at
    }

    fn from_create(id: EntityId, created_at: DateTime<Utc>, request: AccessoryCreate, _creator: &CurrentUser) -> Self {
        Self {
            id,
            name: request.name,
            price: request.price,
            image_url: request.image_url,
            created_at,
        }
    }

    fn apply(&mut self, changes: AccessoryUpdate) {
        set_if_some!(self, changes, name, price, image_url);
    }

    fn check(&self) -> Result<(), Violation> {
        required("name", &self.name)?;
        amount("price", Some(self.price))
    }

    fn push_values<'args>(&self, row: &mut Separated<'_, 'args, Postgres, &'static str>) {
        row.push_bind(self.id)
            .push_bind(self.name.clone())
            .push_bind(self.price)
            .push_bind(self.image_url.clone())
            .push_bind(self.created_at);
    }
}

#[derive(Debug, Clone, Copy, Serialize, Deserialize, sqlx::Type, PartialEq, Eq, Default)]
#[sqlx(type_name = "product_phase", rename_all = "lowercase")]
#[serde(rename_all = "lowercase")]
pub enum ProductPhase {
    #[default]
    Produced,
    Designing,
}

#[derive(Debug, Clone, Copy, Serialize, Deserialize, sqlx::Type, PartialEq, Eq, Default)]
#[sqlx(type_name = "product_status", rename_all = "lowercase")]
#[serde(rename_all = "lowercase")]
pub enum ProductStatus {
    #[default]
    Active,
    Discontinued,
}

#[derive(Debug, Clone, Serialize, Deserialize, FromRow, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct Product {
    pub id: EntityId,
    pub code: String,
    pub name: String,
    pub image_url: Option<String>,
    pub phase: ProductPhase,
    pub cover_cost: Option<Decimal>,
    pub inner_core_cost: Option<Decimal>,
    pub package_cost: Option<Decimal>,
    pub general_cost: Option<Decimal>,
    pub model_url: Option<String>,
    pub status: ProductStatus,
    pub created_at: DateTime<Utc>,
}

impl Product {
    /// Sum of the cost components that are present
    pub fn total_cost(&self) -> Decimal {
        [self.cover_cost, self.inner_core_cost, self.package_cost, self.general_cost]
            .into_iter()
            .flatten()
            .sum()
    }
}

impl Entity for Product {
    type Create = ProductCreate;
    type Update = ProductUpdate;
    type Response = ProductResponse;

    const TABLE: &'static str = "products";
    const NAME: &'static str = "Product";
    const COLUMNS: &'static [&'static str] = &[
        "id",
        "code",
        "name",
        "image_url",
        "phase",
        "cover_cost",
        "inner_core_cost",
        "package_cost",
        "general_cost",
        "model_url",
        "status",
        "created_at",
    ];

    fn id(&self) -> EntityId {
        self.id
    }

    fn created_at(&self) -> DateTime<Utc> {
        self.created_at
    }

    fn from_create(id: EntityId, created_at: DateTime<Utc>, request: ProductCreate, _creator: &CurrentUser) -> Self {
        Self {
            id,
            code: request.code,
            name: request.name,
            image_url: request.image_url,
            phase: request.phase,
            cover_cost: request.cover_cost,
            inner_core_cost: request.inner_core_cost,
            package_cost: request.package_cost,
            general_cost: request.general_cost,
            model_url: request.model_url,
            status: request.status,
            created_at,
        }
    }

    fn apply(&mut self, changes: ProductUpdate) {
        set_if_some!(
            self,
            changes,
            code,
            name,
            image_url,
            phase,
            cover_cost,
            inner_core_cost,
            package_cost,
            general_cost,
            model_url,
            status
        );
    }

    fn check(&self) -> Result<(), Violation> {
        required("code", &self.code)?;
        required("name", &self.name)?;
        amount("coverCost", self.cover_cost)?;
        amount("innerCoreCost", self.inner_core_cost)?;
        amount("packageCost", self.package_cost)?;
        amount("generalCost", self.general_cost)
    }

    fn push_values<'args>(&self, row: &mut Separated<'_, 'args, Postgres, &'static str>) {
        row.push_bind(self.id)
            .push_bind(self.code.clone())
            .push_bind(self.name.clone())
            .push_bind(self.image_url.clone())
            .push_bind(self.phase)
            .push_bind(self.cover_cost)
            .push_bind(self.inner_core_cost)
            .push_bind(self.package_cost)
            .push_bind(self.general_cost)
            .push_bind(self.model_url.clone())
            .push_bind(self.status)
            .push_bind(self.created_at);
    }

    fn unique_key(&self) -> Option<UniqueKey> {
        Some(UniqueKey {
            constraint: "products_code_unique",
            value: self.code.clone(),
        })
    }
}

#[derive(Debug, Clone, Copy, Serialize, Deserialize, sqlx::Type, PartialEq, Eq, Default)]
#[sqlx(type_name = "design_idea_status", rename_all = "snake_case")]
#[serde(rename_all = "snake_case")]
pub enum DesignIdeaStatus {
    #[default]
    Pending,
    InProgress,
    Approved,
    Rejected,
}

impl DesignIdeaStatus {
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Pending => "pending",
            Self::InProgress => "in_progress",
            Self::Approved => "approved",
            Self::Rejected => "rejected",
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, FromRow, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct DesignIdea {
    pub id: EntityId,
    pub title: String,
    pub description: String,
    pub image_urls: Vec<String>,
    pub demand_analysis: Option<String>,
    pub negative_reviews: Option<String>,
    pub redesign_reason: Option<String>,
    pub price_range_min: Option<Decimal>,
    pub price_range_max: Option<Decimal>,
    pub created_by: String,
    pub status: DesignIdeaStatus,
    pub created_at: DateTime<Utc>,
}

impl Entity for DesignIdea {
    type Create = DesignIdeaCreate;
    type Update = DesignIdeaUpdate;
    type Response = DesignIdea;

    const TABLE: &'static str = "design_ideas";
    const NAME: &'static str = "Design idea";
    const OPEN_STATUSES: &'static [&'static str] = &["pending", "in_progress"];
    const COLUMNS: &'static [&'static str] = &[
        "id",
        "title",
        "description",
        "image_urls",
        "demand_analysis",
        "negative_reviews",
        "redesign_reason",
        "price_range_min",
        "price_range_max",
        "created_by",
        "status",
        "created_at",
    ];

    fn id(&self) -> EntityId {
        self.id
    }

    fn created_at(&self) -> DateTime<Utc> {
        self.created_at
    }

    fn status_tag(&self) -> Option<&'static str> {
        Some(self.status.as_str())
    }

    fn from_create(id: EntityId, created_at: DateTime<Utc>, request: DesignIdeaCreate, creator: &CurrentUser) -> Self {
        Self {
            id,
            title: request.title,
            description: request.description,
            image_urls: request.image_urls,
            demand_analysis: request.demand_analysis,
            negative_reviews: request.negative_reviews,
            redesign_reason: request.redesign_reason,
            price_range_min: request.price_range_min,
            price_range_max: request.price_range_max,
            created_by: request
                .created_by
                .filter(|name| !name.trim().is_empty())
                .unwrap_or_else(|| creator.name.clone()),
            status: request.status,
            created_at,
        }
    }

    fn apply(&mut self, changes: DesignIdeaUpdate) {
        set_if_some!(
            self,
            changes,
            title,
            description,
            image_urls,
            demand_analysis,
            negative_reviews,
            redesign_reason,
            price_range_min,
            price_range_max,
            status
        );
    }

    fn check(&self) -> Result<(), Violation> {
        required("title", &self.title)?;
        required("description", &self.description)?;
        amount("priceRangeMin", self.price_range_min)?;
        amount("priceRangeMax", self.price_range_max)?;
        if let (Some(min), Some(max)) = (self.price_range_min, self.price_range_max)
            && min > max
        {
            return Err(Violation::new("priceRangeMax", "priceRangeMin must not exceed priceRangeMax"));
        }
        Ok(())
    }

    fn push_values<'args>(&self, row: &mut Separated<'_, 'args, Postgres, &'static str>) {
        row.push_bind(self.id)
            .push_bind(self.title.clone())
            .push_bind(self.description.clone())
            .push_bind(self.image_urls.clone())
            .push_bind(self.demand_analysis.clone())
            .push_bind(self.negative_reviews.clone())
            .push_bind(self.redesign_reason.clone())
            .push_bind(self.price_range_min)
            .push_bind(self.price_range_max)
            .push_bind(self.created_by.clone())
            .push_bind(self.status)
            .push_bind(self.created_at);
    }
}

#[derive(Debug, Clone, Copy, Serialize, Deserialize, sqlx::Type, PartialEq, Eq, Default)]
#[sqlx(type_name = "requirement_status", rename_all = "snake_case")]
#[serde(rename_all = "snake_case")]
pub enum RequirementStatus {
    #[default]
    Pending,
    InProgress,
    Completed,
    Cancelled,
}

impl RequirementStatus {
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Pending => "pending",
            Self::InProgress => "in_progress",
            Self::Completed => "completed",
            Self::Cancelled => "cancelled",
        }
    }
}

#[derive(Debug, Clone, Copy, Serialize, Deserialize, sqlx::Type, PartialEq, Eq, Default)]
#[sqlx(type_name = "requirement_priority", rename_all = "lowercase")]
#[serde(rename_all = "lowercase")]
pub enum RequirementPriority {
    Low,
    #[default]
    Medium,
    High,
}

#[derive(Debug, Clone, Serialize, Deserialize, FromRow, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct ClientRequirement {
    pub id: EntityId,
    pub client_name: String,
    pub description: String,
    pub requirements: String,
    pub status: RequirementStatus,
    pub priority: RequirementPriority,
    pub created_at: DateTime<Utc>,
}

impl Entity for ClientRequirement {
    type Create = ClientRequirementCreate;
    type Update = ClientRequirementUpdate;
    type Response = ClientRequirement;

    const TABLE: &'static str = "client_requirements";
    const NAME: &'static str = "Client requirement";
    const OPEN_STATUSES: &'static [&'static str] = &["pending"];
    const COLUMNS: &'static [&'static str] = &["id", "client_name", "description", "requirements", "status", "priority", "created_at"];

    fn id(&self) -> EntityId {
        self.id
    }

    fn created_at(&self) -> DateTime<Utc> {
        self.created_at
    }

    fn status_tag(&self) -> Option<&'static str> {
        Some(self.status.as_str())
    }

    fn from_create(id: EntityId, created_at: DateTime<Utc>, request: ClientRequirementCreate, _creator: &CurrentUser) -> Self {
        Self {
            id,
            client_name: request.client_name,
            description: request.description,
            requirements: request.requirements,
            status: request.status,
            priority: request.priority,
            created_at,
        }
    }

    fn apply(&mut self, changes: ClientRequirementUpdate) {
        set_if_some!(self, changes, client_name, description, requirements, status, priority);
    }

    fn check(&self) -> Result<(), Violation> {
        required("clientName", &self.client_name)?;
        required("description", &self.description)?;
        required("requirements", &self.requirements)
    }

    fn push_values<'args>(&self, row: &mut Separated<'_, 'args, Postgres, &'static str>) {
        row.push_bind(self.id)
            .push_bind(self.client_name.clone())
            .push_bind(self.description.clone())
            .push_bind(self.requirements.clone())
            .push_bind(self.status)
            .push_bind(self.priority)
            .push_bind(self.created_at);
    }
}
