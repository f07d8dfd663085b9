//! In-memory adapter for the storage ports, built on concurrent maps.
//!
//! Mirrors the relational behaviour the rest of the service relies on: unique emails and
//! product codes, session cascade on user deletion, audit actors nulled when their user goes.

use std::sync::atomic::{AtomicI64, Ordering};

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use dashmap::{DashMap, mapref::entry::Entry};
use tokio::sync::Mutex;
use uuid::Uuid;

use crate::db::{
    errors::{DbError, Result},
    models::{
        catalog::{CountScope, Entity},
        operation_logs::{OperationLogCreateDBRequest, OperationLogDBResponse, OperationLogFilter},
        sessions::{SessionCreateDBRequest, SessionDBResponse},
        users::{UserCreateDBRequest, UserDBResponse, UserUpdateDBRequest},
    },
};
use crate::store::{AuditStore, CatalogStore, CredentialStore, SessionStore};
use crate::types::{EntityId, UserId};

#[derive(Default)]
pub struct MemoryStore {
    users: DashMap<UserId, UserDBResponse>,
    /// email -> user id; the entry API makes the uniqueness check atomic
    emails: DashMap<String, UserId>,
    /// token hash -> session
    sessions: DashMap<String, SessionDBResponse>,
    logs: DashMap<Uuid, OperationLogDBResponse>,
    log_seq: AtomicI64,
}

#[async_trait]
impl CredentialStore for MemoryStore {
    async fn create_user(&self, request: &UserCreateDBRequest) -> Result<UserDBResponse> {
        match self.emails.entry(request.email.clone()) {
            Entry::Occupied(_) => Err(DbError::unique("users", "users_email_unique", request.email.clone())),
            Entry::Vacant(slot) => {
                let user = UserDBResponse {
                    id: Uuid::new_v4(),
                    email: request.email.clone(),
                    name: request.name.clone(),
                    password_hash: request.password_hash.clone(),
                    role: request.role,
                    created_at: Utc::now(),
                };
                self.users.insert(user.id, user.clone());
                slot.insert(user.id);
                Ok(user)
            }
        }
    }

    async fn get_user(&self, id: UserId) -> Result<Option<UserDBResponse>> {
        Ok(self.users.get(&id).map(|u| u.clone()))
    }

    async fn get_user_by_email(&self, email: &str) -> Result<Option<UserDBResponse>> {
        let Some(id) = self.emails.get(email).map(|id| *id) else {
            return Ok(None);
        };
        Ok(self.users.get(&id).map(|u| u.clone()))
    }

    async fn list_users(&self) -> Result<Vec<UserDBResponse>> {
        let mut users: Vec<UserDBResponse> = self.users.iter().map(|u| u.clone()).collect();
        users.sort_by(|a, b| b.created_at.cmp(&a.created_at).then(a.id.cmp(&b.id)));
        Ok(users)
    }

    async fn update_user(&self, id: UserId, request: &UserUpdateDBRequest) -> Result<Option<UserDBResponse>> {
        Ok(self.users.get_mut(&id).map(|mut user| {
            user.apply(request);
            user.clone()
        }))
    }

    async fn delete_user(&self, id: UserId) -> Result<bool> {
        let Some((_, user)) = self.users.remove(&id) else {
            return Ok(false);
        };
        self.emails.remove(&user.email);
        self.sessions.retain(|_, session| session.user_id != id);
        for mut entry in self.logs.iter_mut() {
            if entry.user_id == Some(id) {
                entry.user_id = None;
            }
        }
        Ok(true)
    }
}

#[async_trait]
impl SessionStore for MemoryStore {
    async fn create_session(&self, request: &SessionCreateDBRequest) -> Result<SessionDBResponse> {
        if !self.users.contains_key(&request.user_id) {
            return Err(DbError::ForeignKeyViolation {
                constraint: Some("sessions_user_id_fkey".to_string()),
                table: Some("sessions".to_string()),
                message: "session owner does not exist".to_string(),
            });
        }
        match self.sessions.entry(request.token_hash.clone()) {
            Entry::Occupied(_) => Err(DbError::unique("sessions", "sessions_token_hash_unique", "<token>")),
            Entry::Vacant(slot) => {
                let session = SessionDBResponse {
                    id: Uuid::new_v4(),
                    user_id: request.user_id,
                    token_hash: request.token_hash.clone(),
                    expires_at: request.expires_at,
                    created_at: Utc::now(),
                };
                slot.insert(session.clone());
                Ok(session)
            }
        }
    }

    async fn get_session(&self, token_hash: &str) -> Result<Option<SessionDBResponse>> {
        Ok(self.sessions.get(token_hash).map(|s| s.clone()))
    }

    async fn delete_session(&self, token_hash: &str) -> Result<bool> {
        Ok(self.sessions.remove(token_hash).is_some())
    }

    async fn delete_user_sessions(&self, user_id: UserId, keep_token_hash: Option<&str>) -> Result<u64> {
        let before = self.sessions.len();
        self.sessions
            .retain(|hash, session| session.user_id != user_id || Some(hash.as_str()) == keep_token_hash);
        Ok(before.saturating_sub(self.sessions.len()) as u64)
    }

    async fn delete_expired_sessions(&self, now: DateTime<Utc>) -> Result<u64> {
        let before = self.sessions.len();
        self.sessions.retain(|_, session| now < session.expires_at);
        Ok(before.saturating_sub(self.sessions.len()) as u64)
    }
}

#[async_trait]
impl AuditStore for MemoryStore {
    async fn append(&self, request: &OperationLogCreateDBRequest) -> Result<OperationLogDBResponse> {
        let entry = OperationLogDBResponse {
            id: Uuid::new_v4(),
            seq: self.log_seq.fetch_add(1, Ordering::SeqCst) + 1,
            user_id: request.user_id,
            method: request.method.clone(),
            route: request.route.clone(),
            action: request.action,
            entity_type: request.entity_type.clone(),
            entity_id: request.entity_id.clone(),
            metadata: request.metadata.clone(),
            created_at: Utc::now(),
        };
        self.logs.insert(entry.id, entry.clone());
        Ok(entry)
    }

    async fn query(&self, filter: &OperationLogFilter) -> Result<Vec<OperationLogDBResponse>> {
        let mut entries: Vec<OperationLogDBResponse> = self
            .logs
            .iter()
            .filter(|entry| filter.matches(entry))
            .map(|entry| entry.clone())
            .collect();
        entries.sort_by(|a, b| b.created_at.cmp(&a.created_at).then(b.seq.cmp(&a.seq)));
        Ok(entries)
    }
}

/// Catalog records for one entity type. Writes are serialized so the natural-key check and the
/// write happen atomically.
pub struct MemoryCatalog<E> {
    entries: DashMap<EntityId, E>,
    writes: Mutex<()>,
}

impl<E> Default for MemoryCatalog<E> {
    fn default() -> Self {
        Self {
            entries: DashMap::new(),
            writes: Mutex::new(()),
        }
    }
}

impl<E: Entity> MemoryCatalog<E> {
    fn check_unique(&self, candidate: &E) -> Result<()> {
        let Some(key) = candidate.unique_key() else {
            return Ok(());
        };
        let taken = self
            .entries
            .iter()
            .any(|other| other.id() != candidate.id() && other.unique_key().as_ref() == Some(&key));
        if taken {
            return Err(DbError::unique(E::TABLE, key.constraint, key.value));
        }
        Ok(())
    }
}

#[async_trait]
impl<E: Entity> CatalogStore<E> for MemoryCatalog<E> {
    async fn list(&self) -> Result<Vec<E>> {
        let mut entities: Vec<E> = self.entries.iter().map(|e| e.clone()).collect();
        entities.sort_by(|a, b| b.created_at().cmp(&a.created_at()).then(a.id().cmp(&b.id())));
        Ok(entities)
    }

    async fn get(&self, id: EntityId) -> Result<Option<E>> {
        Ok(self.entries.get(&id).map(|e| e.clone()))
    }

    async fn insert(&self, entity: &E) -> Result<E> {
        entity.check().map_err(|v| v.into_db_error(E::TABLE))?;
        let _guard = self.writes.lock().await;
        self.check_unique(entity)?;
        self.entries.insert(entity.id(), entity.clone());
        Ok(entity.clone())
    }

    async fn update(&self, id: EntityId, changes: E::Update) -> Result<Option<E>> {
        let _guard = self.writes.lock().await;
        let Some(mut entity) = self.entries.get(&id).map(|e| e.clone()) else {
            return Ok(None);
        };
        entity.apply(changes);
        entity.check().map_err(|v| v.into_db_error(E::TABLE))?;
        self.check_unique(&entity)?;
        self.entries.insert(id, entity.clone());
        Ok(Some(entity))
    }

    async fn delete(&self, id: EntityId) -> Result<bool> {
        let _guard = self.writes.lock().await;
        Ok(self.entries.remove(&id).is_some())
    }

    async fn count(&self, scope: CountScope) -> Result<u64> {
        let count = match scope {
            CountScope::All => self.entries.len(),
            CountScope::Open => self.entries.iter().filter(|e| e.is_open()).count(),
        };
        Ok(count as u64)
    }
}
