//! Generic database repository for catalog records.
//!
//! One implementation serves every [`Entity`]: statements are assembled from the entity's table
//! name and column list, and values are bound by the entity itself.

use std::marker::PhantomData;

use crate::db::{
    errors::{DbError, Result},
    handlers::repository::Repository,
    models::catalog::{CountScope, Entity},
};
use crate::types::{EntityId, abbrev_uuid};
use sqlx::{Connection, PgConnection, Postgres, QueryBuilder};
use tracing::instrument;

pub struct CatalogEntries<'c, E> {
    db: &'c mut PgConnection,
    _entity: PhantomData<E>,
}

impl<'c, E: Entity> CatalogEntries<'c, E> {
    pub fn new(db: &'c mut PgConnection) -> Self {
        Self { db, _entity: PhantomData }
    }

    /// Apply a partial update under a row lock. The merged record is validated before it is
    /// written; a failing record surfaces as [`DbError::CheckViolation`] naming the field.
    #[instrument(skip(self, changes), fields(table = E::TABLE, id = %abbrev_uuid(&id)), err)]
    pub async fn update(&mut self, id: EntityId, changes: E::Update) -> Result<Option<E>> {
        let mut tx = self.db.begin().await?;

        let select = format!("SELECT * FROM {} WHERE id = $1 FOR UPDATE", E::TABLE);
        let Some(mut entity) = sqlx::query_as::<_, E>(&select).bind(id).fetch_optional(&mut *tx).await? else {
            return Ok(None);
        };

        entity.apply(changes);
        entity.check().map_err(|v| v.into_db_error(E::TABLE))?;

        let mut query = QueryBuilder::<Postgres>::new(format!("UPDATE {} SET ({}) = (", E::TABLE, E::COLUMNS.join(", ")));
        {
            let mut values = query.separated(", ");
            entity.push_values(&mut values);
        }
        query.push(") WHERE id = ");
        query.push_bind(id);
        query.push(" RETURNING *");

        let updated = query.build_query_as::<E>().fetch_one(&mut *tx).await?;
        tx.commit().await?;

        Ok(Some(updated))
    }

    #[instrument(skip(self), fields(table = E::TABLE, id = %abbrev_uuid(&id)), err)]
    pub async fn delete(&mut self, id: EntityId) -> Result<bool> {
        let statement = format!("DELETE FROM {} WHERE id = $1", E::TABLE);
        let result = sqlx::query(&statement).bind(id).execute(&mut *self.db).await?;

        Ok(result.rows_affected() > 0)
    }

    /// Count records. An open count of a type without a workflow status is always zero.
    #[instrument(skip(self), fields(table = E::TABLE), err)]
    pub async fn count(&mut self, scope: CountScope) -> Result<u64> {
        let mut query = QueryBuilder::<Postgres>::new(format!("SELECT COUNT(*) FROM {}", E::TABLE));
        if scope == CountScope::Open {
            if E::OPEN_STATUSES.is_empty() {
                return Ok(0);
            }
            let statuses: Vec<String> = E::OPEN_STATUSES.iter().map(|s| s.to_string()).collect();
            query.push(" WHERE status::text = ANY(");
            query.push_bind(statuses);
            query.push(")");
        }

        let count: i64 = query.build_query_scalar().fetch_one(&mut *self.db).await?;
        Ok(u64::try_from(count).unwrap_or_default())
    }
}

#[async_trait::async_trait]
impl<'c, E: Entity> Repository for CatalogEntries<'c, E> {
    type CreateRequest = E;
    type Response = E;
    type Id = EntityId;
    type Filter = ();

    /// Insert a fully-formed record (the caller assigns id and timestamp)
    #[instrument(skip_all, fields(table = E::TABLE), err)]
    async fn create(&mut self, entity: &E) -> Result<E> {
        entity.check().map_err(|v| v.into_db_error(E::TABLE))?;

        let mut query = QueryBuilder::<Postgres>::new(format!("INSERT INTO {} ({}) ", E::TABLE, E::COLUMNS.join(", ")));
        query.push_values(std::iter::once(entity), |mut row, entity| entity.push_values(&mut row));
        query.push(" RETURNING *");

        let created = query.build_query_as::<E>().fetch_one(&mut *self.db).await?;
        Ok(created)
    }

    #[instrument(skip(self), fields(table = E::TABLE, id = %abbrev_uuid(&id)), err)]
    async fn get_by_id(&mut self, id: EntityId) -> Result<Option<E>> {
        let statement = format!("SELECT * FROM {} WHERE id = $1", E::TABLE);
        let entity = sqlx::query_as::<_, E>(&statement).bind(id).fetch_optional(&mut *self.db).await?;

        Ok(entity)
    }

    /// Newest first
    #[instrument(skip_all, fields(table = E::TABLE), err)]
    async fn list(&mut self, _filter: &()) -> Result<Vec<E>> {
        let statement = format!("SELECT * FROM {} ORDER BY created_at DESC, id", E::TABLE);
        let entities = sqlx::query_as::<_, E>(&statement).fetch_all(&mut *self.db).await?;

        Ok(entities)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::api::models::users::{CurrentUser, Role};
    use crate::db::models::catalog::{DesignIdea, Fabric, Product};
    use chrono::Utc;
    use sqlx::PgPool;
    use uuid::Uuid;

    fn creator() -> CurrentUser {
        CurrentUser {
            id: Uuid::new_v4(),
            email: "ed@example.com".to_string(),
            name: "Ed".to_string(),
            role: Role::Editor,
            created_at: Utc::now(),
        }
    }

    fn product(code: &str) -> Product {
        let request = serde_json::from_value(serde_json::json!({
            "code": code,
            "name": "Linen square",
            "coverCost": "12.50",
        }))
        .unwrap();
        Product::from_create(Uuid::new_v4(), Utc::now(), request, &creator())
    }

    #[sqlx::test]
    #[test_log::test]
    async fn test_product_crud(pool: PgPool) {
        let mut conn = pool.acquire().await.unwrap();
        let mut repo = CatalogEntries::<Product>::new(&mut conn);

        let created = repo.create(&product("CUSH-001")).await.unwrap();
        assert_eq!(created.code, "CUSH-001");

        let changes = serde_json::from_value(serde_json::json!({ "name": "Linen square XL", "modelUrl": "https://m/1.glb" })).unwrap();
        let updated = repo.update(created.id, changes).await.unwrap().unwrap();
        assert_eq!(updated.name, "Linen square XL");
        assert_eq!(updated.code, "CUSH-001");
        assert_eq!(updated.model_url.as_deref(), Some("https://m/1.glb"));

        assert_eq!(repo.list(&()).await.unwrap().len(), 1);
        assert!(repo.delete(created.id).await.unwrap());
        assert!(repo.get_by_id(created.id).await.unwrap().is_none());
    }

    #[sqlx::test]
    #[test_log::test]
    async fn test_duplicate_product_code(pool: PgPool) {
        let mut conn = pool.acquire().await.unwrap();
        let mut repo = CatalogEntries::<Product>::new(&mut conn);

        repo.create(&product("DUP")).await.unwrap();
        let candidate = product("DUP");
        match repo.create(&candidate).await.unwrap_err() {
            DbError::UniqueViolation {
                constraint,
                conflicting_value,
                ..
            } => {
                assert_eq!(constraint.as_deref(), Some("products_code_unique"));
                assert_eq!(conflicting_value.as_deref(), Some("DUP"));
            }
            other => panic!("expected unique violation, got {other:?}"),
        }
    }

    #[sqlx::test]
    #[test_log::test]
    async fn test_update_validates_merged_record(pool: PgPool) {
        let mut conn = pool.acquire().await.unwrap();
        let request = serde_json::from_value(serde_json::json!({
            "title": "Bolster",
            "description": "Round",
            "imageUrls": ["https://img/1.png"],
            "priceRangeMin": 10,
        }))
        .unwrap();
        let idea = DesignIdea::from_create(Uuid::new_v4(), Utc::now(), request, &creator());
        let mut repo = CatalogEntries::<DesignIdea>::new(&mut conn);
        let created = repo.create(&idea).await.unwrap();
        assert_eq!(created.image_urls, vec!["https://img/1.png".to_string()]);

        let changes = serde_json::from_value(serde_json::json!({ "priceRangeMax": 5 })).unwrap();
        let err = repo.update(created.id, changes).await.unwrap_err();
        assert!(matches!(err, DbError::CheckViolation { .. }));
    }

    #[sqlx::test]
    #[test_log::test]
    async fn test_count_open_design_ideas(pool: PgPool) {
        let mut conn = pool.acquire().await.unwrap();
        let mut repo = CatalogEntries::<DesignIdea>::new(&mut conn);
        for status in ["pending", "in_progress", "rejected"] {
            let request = serde_json::from_value(serde_json::json!({
                "title": "Idea",
                "description": "Something soft",
                "status": status,
            }))
            .unwrap();
            repo.create(&DesignIdea::from_create(Uuid::new_v4(), Utc::now(), request, &creator()))
                .await
                .unwrap();
        }

        assert_eq!(repo.count(CountScope::All).await.unwrap(), 3);
        assert_eq!(repo.count(CountScope::Open).await.unwrap(), 2);

        let mut fabrics = CatalogEntries::<Fabric>::new(&mut conn);
        assert_eq!(fabrics.count(CountScope::Open).await.unwrap(), 0);
    }

    #[sqlx::test]
    #[test_log::test]
    async fn test_update_missing_returns_none(pool: PgPool) {
        let mut conn = pool.acquire().await.unwrap();
        let mut repo = CatalogEntries::<Fabric>::new(&mut conn);
        let changes = serde_json::from_value(serde_json::json!({ "name": "x" })).unwrap();
        assert!(repo.update(Uuid::new_v4(), changes).await.unwrap().is_none());
        assert!(!repo.delete(Uuid::new_v4()).await.unwrap());
    }
}
