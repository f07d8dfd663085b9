//! PostgreSQL adapter for the storage ports. Each call checks a connection out of the pool and
//! hands it to the matching repository.

use std::marker::PhantomData;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use sqlx::PgPool;

use crate::db::{
    errors::Result,
    handlers::{CatalogEntries, OperationLogs, Repository, Sessions, Users},
    models::{
        catalog::{CountScope, Entity},
        operation_logs::{OperationLogCreateDBRequest, OperationLogDBResponse, OperationLogFilter},
        sessions::{SessionCreateDBRequest, SessionDBResponse},
        users::{UserCreateDBRequest, UserDBResponse, UserUpdateDBRequest},
    },
};
use crate::store::{AuditStore, CatalogStore, CredentialStore, SessionStore};
use crate::types::{EntityId, UserId};

#[derive(Clone)]
pub struct PgStore {
    pool: PgPool,
}

impl PgStore {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }
}

#[async_trait]
impl CredentialStore for PgStore {
    async fn create_user(&self, request: &UserCreateDBRequest) -> Result<UserDBResponse> {
        let mut conn = self.pool.acquire().await?;
        Users::new(&mut conn).create(request).await
    }

    async fn get_user(&self, id: UserId) -> Result<Option<UserDBResponse>> {
        let mut conn = self.pool.acquire().await?;
        Users::new(&mut conn).get_by_id(id).await
    }

    async fn get_user_by_email(&self, email: &str) -> Result<Option<UserDBResponse>> {
        let mut conn = self.pool.acquire().await?;
        Users::new(&mut conn).get_user_by_email(email).await
    }

    async fn list_users(&self) -> Result<Vec<UserDBResponse>> {
        let mut conn = self.pool.acquire().await?;
        Users::new(&mut conn).list(&()).await
    }

    async fn update_user(&self, id: UserId, request: &UserUpdateDBRequest) -> Result<Option<UserDBResponse>> {
        let mut conn = self.pool.acquire().await?;
        Users::new(&mut conn).update(id, request).await
    }

    async fn delete_user(&self, id: UserId) -> Result<bool> {
        let mut conn = self.pool.acquire().await?;
        Users::new(&mut conn).delete(id).await
    }
}

#[async_trait]
impl SessionStore for PgStore {
    async fn create_session(&self, request: &SessionCreateDBRequest) -> Result<SessionDBResponse> {
        let mut conn = self.pool.acquire().await?;
        Sessions::new(&mut conn).create(request).await
    }

    async fn get_session(&self, token_hash: &str) -> Result<Option<SessionDBResponse>> {
        let mut conn = self.pool.acquire().await?;
        Sessions::new(&mut conn).get_by_token_hash(token_hash).await
    }

    async fn delete_session(&self, token_hash: &str) -> Result<bool> {
        let mut conn = self.pool.acquire().await?;
        Sessions::new(&mut conn).delete_by_token_hash(token_hash).await
    }

    async fn delete_user_sessions(&self, user_id: UserId, keep_token_hash: Option<&str>) -> Result<u64> {
        let mut conn = self.pool.acquire().await?;
        Sessions::new(&mut conn).delete_for_user(user_id, keep_token_hash).await
    }

    async fn delete_expired_sessions(&self, now: DateTime<Utc>) -> Result<u64> {
        let mut conn = self.pool.acquire().await?;
        Sessions::new(&mut conn).delete_expired(now).await
    }
}

#[async_trait]
impl AuditStore for PgStore {
    async fn append(&self, request: &OperationLogCreateDBRequest) -> Result<OperationLogDBResponse> {
        let mut conn = self.pool.acquire().await?;
        OperationLogs::new(&mut conn).create(request).await
    }

    async fn query(&self, filter: &OperationLogFilter) -> Result<Vec<OperationLogDBResponse>> {
        let mut conn = self.pool.acquire().await?;
        OperationLogs::new(&mut conn).list(filter).await
    }
}

pub struct PgCatalog<E> {
    pool: PgPool,
    _entity: PhantomData<fn() -> E>,
}

impl<E> PgCatalog<E> {
    pub fn new(pool: PgPool) -> Self {
        Self {
            pool,
            _entity: PhantomData,
        }
    }
}

#[async_trait]
impl<E: Entity> CatalogStore<E> for PgCatalog<E> {
    async fn list(&self) -> Result<Vec<E>> {
        let mut conn = self.pool.acquire().await?;
        CatalogEntries::<E>::new(&mut conn).list(&()).await
    }

    async fn get(&self, id: EntityId) -> Result<Option<E>> {
        let mut conn = self.pool.acquire().await?;
        CatalogEntries::<E>::new(&mut conn).get_by_id(id).await
    }

    async fn insert(&self, entity: &E) -> Result<E> {
        let mut conn = self.pool.acquire().await?;
        CatalogEntries::<E>::new(&mut conn).create(entity).await
    }

    async fn update(&self, id: EntityId, changes: E::Update) -> Result<Option<E>> {
        let mut conn = self.pool.acquire().await?;
        CatalogEntries::<E>::new(&mut conn).update(id, changes).await
    }

    async fn delete(&self, id: EntityId) -> Result<bool> {
        let mut conn = self.pool.acquire().await?;
        CatalogEntries::<E>::new(&mut conn).delete(id).await
    }

    async fn count(&self, scope: CountScope) -> Result<u64> {
        let mut conn = self.pool.acquire().await?;
        CatalogEntries::<E>::new(&mut conn).count(scope).await
    }
}
