//! Database repository for login sessions.
//!
//! Sessions are looked up by the digest of their bearer token. They are never updated.

use crate::types::{SessionId, UserId, abbrev_uuid};
use crate::db::{
    errors::Result,
    handlers::repository::Repository,
    models::sessions::{SessionCreateDBRequest, SessionDBResponse},
};
use chrono::{DateTime, Utc};
use sqlx::PgConnection;
use tracing::instrument;
use uuid::Uuid;

pub struct Sessions<'c> {
    db: &'c mut PgConnection,
}

#[async_trait::async_trait]
impl<'c> Repository for Sessions<'c> {
    type CreateRequest = SessionCreateDBRequest;
    type Response = SessionDBResponse;
    type Id = SessionId;
    type Filter = UserId;

    #[instrument(skip(self, request), fields(user_id = %abbrev_uuid(&request.user_id)), err)]
    async fn create(&mut self, request: &Self::CreateRequest) -> Result<Self::Response> {
        let session = sqlx::query_as::<_, SessionDBResponse>(
            r#"
            INSERT INTO sessions (id, user_id, token_hash, expires_at)
            VALUES ($1, $2, $3, $4)
            RETURNING *
            "#,
        )
        .bind(Uuid::new_v4())
        .bind(request.user_id)
        .bind(&request.token_hash)
        .bind(request.expires_at)
        .fetch_one(&mut *self.db)
        .await?;

        Ok(session)
    }

    #[instrument(skip(self), fields(session_id = %abbrev_uuid(&id)), err)]
    async fn get_by_id(&mut self, id: Self::Id) -> Result<Option<Self::Response>> {
        let session = sqlx::query_as::<_, SessionDBResponse>("SELECT * FROM sessions WHERE id = $1")
            .bind(id)
            .fetch_optional(&mut *self.db)
            .await?;

        Ok(session)
    }

    /// All sessions of one user, newest first
    #[instrument(skip_all, fields(user_id = %abbrev_uuid(user_id)), err)]
    async fn list(&mut self, user_id: &Self::Filter) -> Result<Vec<Self::Response>> {
        let sessions = sqlx::query_as::<_, SessionDBResponse>("SELECT * FROM sessions WHERE user_id = $1 ORDER BY created_at DESC")
            .bind(user_id)
            .fetch_all(&mut *self.db)
            .await?;

        Ok(sessions)
    }
}

impl<'c> Sessions<'c> {
    pub fn new(db: &'c mut PgConnection) -> Self {
        Self { db }
    }

    #[instrument(skip_all, err)]
    pub async fn get_by_token_hash(&mut self, token_hash: &str) -> Result<Option<SessionDBResponse>> {
        let session = sqlx::query_as::<_, SessionDBResponse>("SELECT * FROM sessions WHERE token_hash = $1")
            .bind(token_hash)
            .fetch_optional(&mut *self.db)
            .await?;

        Ok(session)
    }

    #[instrument(skip_all, err)]
    pub async fn delete_by_token_hash(&mut self, token_hash: &str) -> Result<bool> {
        let result = sqlx::query("DELETE FROM sessions WHERE token_hash = $1")
            .bind(token_hash)
            .execute(&mut *self.db)
            .await?;

        Ok(result.rows_affected() > 0)
    }

    /// Revoke every session of a user, optionally sparing the one with `keep_token_hash`
    #[instrument(skip_all, fields(user_id = %abbrev_uuid(&user_id)), err)]
    pub async fn delete_for_user(&mut self, user_id: UserId, keep_token_hash: Option<&str>) -> Result<u64> {
        let result = sqlx::query("DELETE FROM sessions WHERE user_id = $1 AND ($2::TEXT IS NULL OR token_hash <> $2)")
            .bind(user_id)
            .bind(keep_token_hash)
            .execute(&mut *self.db)
            .await?;

        Ok(result.rows_affected())
    }

    #[instrument(skip(self), err)]
    pub async fn delete_expired(&mut self, now: DateTime<Utc>) -> Result<u64> {
        let result = sqlx::query("DELETE FROM sessions WHERE expires_at <= $1")
            .bind(now)
            .execute(&mut *self.db)
            .await?;

        Ok(result.rows_affected())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::api::models::users::Role;
    use crate::db::handlers::users::Users;
    use crate::db::models::users::UserCreateDBRequest;
    use chrono::Duration;
    use sqlx::PgPool;

    async fn create_user(conn: &mut PgConnection) -> UserId {
        let mut users = Users::new(conn);
        users
            .create(&UserCreateDBRequest {
                email: format!("{}@example.com", Uuid::new_v4()),
                name: "Session Owner".to_string(),
                password_hash: "$argon2id$test".to_string(),
                role: Role::Guest,
            })
            .await
            .unwrap()
            .id
    }

    fn request(user_id: UserId, token_hash: &str, expires_at: DateTime<Utc>) -> SessionCreateDBRequest {
        SessionCreateDBRequest {
            user_id,
            token_hash: token_hash.to_string(),
            expires_at,
        }
    }

    #[sqlx::test]
    #[test_log::test]
    async fn test_session_roundtrip_and_revoke(pool: PgPool) {
        let mut conn = pool.acquire().await.unwrap();
        let user_id = create_user(&mut conn).await;
        let mut repo = Sessions::new(&mut conn);

        let expires = Utc::now() + Duration::hours(1);
        let created = repo.create(&request(user_id, "hash-a", expires)).await.unwrap();
        let found = repo.get_by_token_hash("hash-a").await.unwrap().unwrap();
        assert_eq!(found.id, created.id);

        assert!(repo.delete_by_token_hash("hash-a").await.unwrap());
        // Idempotent
        assert!(!repo.delete_by_token_hash("hash-a").await.unwrap());
        assert!(repo.get_by_token_hash("hash-a").await.unwrap().is_none());
    }

    #[sqlx::test]
    #[test_log::test]
    async fn test_delete_for_user_keeps_current(pool: PgPool) {
        let mut conn = pool.acquire().await.unwrap();
        let user_id = create_user(&mut conn).await;
        let mut repo = Sessions::new(&mut conn);

        let expires = Utc::now() + Duration::hours(1);
        for hash in ["h1", "h2", "h3"] {
            repo.create(&request(user_id, hash, expires)).await.unwrap();
        }

        assert_eq!(repo.delete_for_user(user_id, Some("h2")).await.unwrap(), 2);
        let remaining = repo.list(&user_id).await.unwrap();
        assert_eq!(remaining.len(), 1);
        assert_eq!(remaining[0].token_hash, "h2");

        assert_eq!(repo.delete_for_user(user_id, None).await.unwrap(), 1);
    }

    #[sqlx::test]
    #[test_log::test]
    async fn test_delete_expired(pool: PgPool) {
        let mut conn = pool.acquire().await.unwrap();
        let user_id = create_user(&mut conn).await;
        let mut repo = Sessions::new(&mut conn);

        let now = Utc::now();
        repo.create(&request(user_id, "old", now - Duration::minutes(5))).await.unwrap();
        repo.create(&request(user_id, "fresh", now + Duration::hours(1))).await.unwrap();

        assert_eq!(repo.delete_expired(now).await.unwrap(), 1);
        assert!(repo.get_by_token_hash("old").await.unwrap().is_none());
        assert!(repo.get_by_token_hash("fresh").await.unwrap().is_some());
    }

    #[sqlx::test]
    #[test_log::test]
    async fn test_user_delete_cascades_sessions(pool: PgPool) {
        let mut conn = pool.acquire().await.unwrap();
        let user_id = create_user(&mut conn).await;
        Sessions::new(&mut conn)
            .create(&request(user_id, "cascade", Utc::now() + Duration::hours(1)))
            .await
            .unwrap();

        assert!(Users::new(&mut conn).delete(user_id).await.unwrap());
        assert!(Sessions::new(&mut conn).get_by_token_hash("cascade").await.unwrap().is_none());
    }
}
