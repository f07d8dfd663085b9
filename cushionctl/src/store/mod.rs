//! Storage ports.
//!
//! Handlers and the auth layer talk to these traits, never to a database directly. Two adapters
//! implement them: [`postgres`] (durable, the production backend) and [`memory`] (concurrent maps,
//! for local runs and tests). Both report failures as [`DbError`](crate::db::errors::DbError).

use std::sync::Arc;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use sqlx::PgPool;

use crate::db::{
    errors::Result,
    models::{
        catalog::{Accessory, ClientRequirement, CountScope, DesignIdea, Entity, Fabric, Product},
        operation_logs::{OperationLogCreateDBRequest, OperationLogDBResponse, OperationLogFilter},
        sessions::{SessionCreateDBRequest, SessionDBResponse},
        users::{UserCreateDBRequest, UserDBResponse, UserUpdateDBRequest},
    },
};
use crate::types::{EntityId, UserId};

pub mod memory;
pub mod postgres;

/// Persists user identity and password hashes. Emails are unique.
#[async_trait]
pub trait CredentialStore: Send + Sync {
    async fn create_user(&self, request: &UserCreateDBRequest) -> Result<UserDBResponse>;

    async fn get_user(&self, id: UserId) -> Result<Option<UserDBResponse>>;

    /// Exact, case-sensitive lookup
    async fn get_user_by_email(&self, email: &str) -> Result<Option<UserDBResponse>>;

    async fn list_users(&self) -> Result<Vec<UserDBResponse>>;

    async fn update_user(&self, id: UserId, request: &UserUpdateDBRequest) -> Result<Option<UserDBResponse>>;

    /// Deleting a user removes their sessions and nulls the actor of their audit entries
    async fn delete_user(&self, id: UserId) -> Result<bool>;
}

/// Persists sessions keyed by the digest of their bearer token.
#[async_trait]
pub trait SessionStore: Send + Sync {
    async fn create_session(&self, request: &SessionCreateDBRequest) -> Result<SessionDBResponse>;

    /// Returns the row even if expired; callers decide validity
    async fn get_session(&self, token_hash: &str) -> Result<Option<SessionDBResponse>>;

    /// Idempotent: deleting a missing session is not an error
    async fn delete_session(&self, token_hash: &str) -> Result<bool>;

    async fn delete_user_sessions(&self, user_id: UserId, keep_token_hash: Option<&str>) -> Result<u64>;

    async fn delete_expired_sessions(&self, now: DateTime<Utc>) -> Result<u64>;
}

/// Append-only operation log.
#[async_trait]
pub trait AuditStore: Send + Sync {
    async fn append(&self, request: &OperationLogCreateDBRequest) -> Result<OperationLogDBResponse>;

    /// Newest first, ties broken by sequence number descending
    async fn query(&self, filter: &OperationLogFilter) -> Result<Vec<OperationLogDBResponse>>;
}

/// Storage for one kind of catalog record.
#[async_trait]
pub trait CatalogStore<E: Entity>: Send + Sync {
    async fn list(&self) -> Result<Vec<E>>;

    async fn get(&self, id: EntityId) -> Result<Option<E>>;

    async fn insert(&self, entity: &E) -> Result<E>;

    /// Merge, validate and write a partial update. `None` if the record does not exist.
    async fn update(&self, id: EntityId, changes: E::Update) -> Result<Option<E>>;

    async fn delete(&self, id: EntityId) -> Result<bool>;

    async fn count(&self, scope: CountScope) -> Result<u64>;
}

/// Stores for every catalog collection
#[derive(Clone)]
pub struct CatalogStores {
    pub fabrics: Arc<dyn CatalogStore<Fabric>>,
    pub accessories: Arc<dyn CatalogStore<Accessory>>,
    pub products: Arc<dyn CatalogStore<Product>>,
    pub design_ideas: Arc<dyn CatalogStore<DesignIdea>>,
    pub client_requirements: Arc<dyn CatalogStore<ClientRequirement>>,
}

impl CatalogStores {
    pub fn postgres(pool: PgPool) -> Self {
        Self {
            fabrics: Arc::new(postgres::PgCatalog::new(pool.clone())),
            accessories: Arc::new(postgres::PgCatalog::new(pool.clone())),
            products: Arc::new(postgres::PgCatalog::new(pool.clone())),
            design_ideas: Arc::new(postgres::PgCatalog::new(pool.clone())),
            client_requirements: Arc::new(postgres::PgCatalog::new(pool)),
        }
    }

    pub fn in_memory() -> Self {
        Self {
            fabrics: Arc::new(memory::MemoryCatalog::default()),
            accessories: Arc::new(memory::MemoryCatalog::default()),
            products: Arc::new(memory::MemoryCatalog::default()),
            design_ideas: Arc::new(memory::MemoryCatalog::default()),
            client_requirements: Arc::new(memory::MemoryCatalog::default()),
        }
    }
}

/// Picks the store for one record type out of [`CatalogStores`]
pub trait SelectStore<E: Entity> {
    fn store(&self) -> &Arc<dyn CatalogStore<E>>;
}

macro_rules! select_store {
    ($($entity:ty => $field:ident),+ $(,)?) => {
        $(
            impl SelectStore<$entity> for CatalogStores {
                fn store(&self) -> &Arc<dyn CatalogStore<$entity>> {
                    &self.$field
                }
            }
        )+
    };
}

select_store! {
    Fabric => fabrics,
    Accessory => accessories,
    Product => products,
    DesignIdea => design_ideas,
    ClientRequirement => client_requirements,
}

/// Every storage port, wired to one backend
#[derive(Clone)]
pub struct Stores {
    pub users: Arc<dyn CredentialStore>,
    pub sessions: Arc<dyn SessionStore>,
    pub audit: Arc<dyn AuditStore>,
    pub catalog: CatalogStores,
}

impl Stores {
    pub fn postgres(pool: PgPool) -> Self {
        let store = Arc::new(postgres::PgStore::new(pool.clone()));
        Self {
            users: store.clone(),
            sessions: store.clone(),
            audit: store,
            catalog: CatalogStores::postgres(pool),
        }
    }

    pub fn in_memory() -> Self {
        let store = Arc::new(memory::MemoryStore::default());
        Self {
            users: store.clone(),
            sessions: store.clone(),
            audit: store,
            catalog: CatalogStores::in_memory(),
        }
    }
}
