//! Database repository for the append-only operation audit trail.

use crate::types::{OperationLogId, abbrev_uuid};
use crate::db::{
    errors::Result,
    handlers::repository::Repository,
    models::operation_logs::{OperationLogCreateDBRequest, OperationLogDBResponse, OperationLogFilter},
};
use sqlx::PgConnection;
use tracing::instrument;
use uuid::Uuid;

pub struct OperationLogs<'c> {
    db: &'c mut PgConnection,
}

impl<'c> OperationLogs<'c> {
    pub fn new(db: &'c mut PgConnection) -> Self {
        Self { db }
    }
}

#[async_trait::async_trait]
impl<'c> Repository for OperationLogs<'c> {
    type CreateRequest = OperationLogCreateDBRequest;
    type Response = OperationLogDBResponse;
    type Id = OperationLogId;
    type Filter = OperationLogFilter;

    #[instrument(skip(self, request), fields(action = ?request.action, route = %request.route), err)]
    async fn create(&mut self, request: &Self::CreateRequest) -> Result<Self::Response> {
        let entry = sqlx::query_as::<_, OperationLogDBResponse>(
            r#"
            INSERT INTO operation_logs (id, user_id, method, route, action, entity_type, entity_id, metadata)
            VALUES ($1, $2, $3, $4, $5, $6, $7, $8)
            RETURNING *
            "#,
        )
        .bind(Uuid::new_v4())
        .bind(request.user_id)
        .bind(&request.method)
        .bind(&request.route)
        .bind(request.action)
        .bind(&request.entity_type)
        .bind(&request.entity_id)
        .bind(&request.metadata)
        .fetch_one(&mut *self.db)
        .await?;

        Ok(entry)
    }

    #[instrument(skip(self), fields(log_id = %abbrev_uuid(&id)), err)]
    async fn get_by_id(&mut self, id: Self::Id) -> Result<Option<Self::Response>> {
        let entry = sqlx::query_as::<_, OperationLogDBResponse>("SELECT * FROM operation_logs WHERE id = $1")
            .bind(id)
            .fetch_optional(&mut *self.db)
            .await?;

        Ok(entry)
    }

    /// Newest first; entries sharing a timestamp are ordered by sequence, descending
    #[instrument(skip(self), err)]
    async fn list(&mut self, filter: &Self::Filter) -> Result<Vec<Self::Response>> {
        let entries = sqlx::query_as::<_, OperationLogDBResponse>(
            r#"
            SELECT * FROM operation_logs
            WHERE ($1::UUID IS NULL OR user_id = $1)
              AND ($2::TEXT IS NULL OR entity_type = $2)
              AND ($3::TIMESTAMPTZ IS NULL OR created_at >= $3)
              AND ($4::TIMESTAMPTZ IS NULL OR created_at <= $4)
            ORDER BY created_at DESC, seq DESC
            "#,
        )
        .bind(filter.user_id)
        .bind(&filter.entity_type)
        .bind(filter.start_date)
        .bind(filter.end_date)
        .fetch_all(&mut *self.db)
        .await?;

        Ok(entries)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::api::models::users::Role;
    use crate::db::handlers::users::Users;
    use crate::db::models::operation_logs::OperationAction;
    use crate::db::models::users::UserCreateDBRequest;
    use sqlx::PgPool;

    fn entry(user_id: Option<Uuid>, entity_type: &str) -> OperationLogCreateDBRequest {
        OperationLogCreateDBRequest::builder()
            .maybe_user_id(user_id)
            .method("POST")
            .route(format!("/api/{entity_type}"))
            .action(OperationAction::Create)
            .entity_type(entity_type)
            .metadata(serde_json::json!({ "name": "Linen" }))
            .build()
    }

    #[sqlx::test]
    #[test_log::test]
    async fn test_append_and_query_newest_first(pool: PgPool) {
        let mut conn = pool.acquire().await.unwrap();
        let mut repo = OperationLogs::new(&mut conn);

        let first = repo.create(&entry(None, "fabrics")).await.unwrap();
        let second = repo.create(&entry(None, "products")).await.unwrap();
        assert!(second.seq > first.seq);
        assert_eq!(first.metadata, Some(serde_json::json!({ "name": "Linen" })));

        let all = repo.list(&OperationLogFilter::default()).await.unwrap();
        assert_eq!(all.len(), 2);
        assert_eq!(all[0].id, second.id);

        let fabrics = repo
            .list(&OperationLogFilter {
                entity_type: Some("fabrics".to_string()),
                ..Default::default()
            })
            .await
            .unwrap();
        assert_eq!(fabrics.len(), 1);
        assert_eq!(fabrics[0].id, first.id);
    }

    #[sqlx::test]
    #[test_log::test]
    async fn test_entries_survive_user_deletion(pool: PgPool) {
        let mut conn = pool.acquire().await.unwrap();
        let user = Users::new(&mut conn)
            .create(&UserCreateDBRequest {
                email: "gone@example.com".to_string(),
                name: "Gone".to_string(),
                password_hash: "$argon2id$test".to_string(),
                role: Role::Editor,
            })
            .await
            .unwrap();

        let logged = OperationLogs::new(&mut conn).create(&entry(Some(user.id), "fabrics")).await.unwrap();
        assert_eq!(logged.user_id, Some(user.id));

        Users::new(&mut conn).delete(user.id).await.unwrap();

        let after = OperationLogs::new(&mut conn).get_by_id(logged.id).await.unwrap().unwrap();
        assert_eq!(after.user_id, None);
        assert_eq!(after.route, "/api/fabrics");
    }
}
