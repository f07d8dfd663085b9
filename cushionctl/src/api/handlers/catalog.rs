//! CRUD handlers shared by every catalog collection.
//!
//! Each handler is generic over the record type; the router instantiates them once per
//! collection. Reads are public. Mutations pass through an [`AccessPolicy`] and, once the write
//! has succeeded, append one audit entry tagged with the collection name.

use axum::{Json, extract::State, http::StatusCode};
use chrono::Utc;
use serde_json::Value;
use uuid::Uuid;

use crate::{
    AppState,
    api::{
        extract::{PathParams, Payload, RequestTarget},
        models::users::CurrentUser,
    },
    auth::gate::{AccessPolicy, Authorized, Editors},
    db::models::{
        catalog::Entity,
        operation_logs::{OperationAction, OperationLogCreateDBRequest},
    },
    errors::{Error, Result},
    store::{CatalogStores, SelectStore},
    types::EntityId,
};

fn not_found<E: Entity>(id: EntityId) -> Error {
    Error::NotFound {
        resource: E::NAME.to_string(),
        id: id.to_string(),
    }
}

/// Typed view of a submitted body. The raw value is kept for the audit entry.
fn decode<T: serde::de::DeserializeOwned>(name: &str, payload: &Value) -> Result<T> {
    serde_json::from_value(payload.clone()).map_err(|e| Error::Validation {
        field: None,
        message: format!("Invalid {} payload: {e}", name.to_lowercase()),
    })
}

async fn record<E: Entity>(
    state: &AppState,
    target: RequestTarget,
    actor: &CurrentUser,
    action: OperationAction,
    id: EntityId,
    metadata: Option<Value>,
) {
    state
        .audit
        .record(
            OperationLogCreateDBRequest::builder()
                .user_id(actor.id)
                .method(target.method.as_str())
                .route(target.route)
                .action(action)
                .entity_type(E::TABLE)
                .entity_id(id.to_string())
                .maybe_metadata(metadata)
                .build(),
        )
        .await;
}

#[tracing::instrument(skip_all, fields(collection = E::TABLE))]
pub async fn list<E>(State(state): State<AppState>) -> Result<Json<Vec<E::Response>>>
where
    E: Entity,
    CatalogStores: SelectStore<E>,
{
    let records = SelectStore::<E>::store(&state.catalog).list().await?;
    Ok(Json(records.into_iter().map(E::Response::from).collect()))
}

#[tracing::instrument(skip_all, fields(collection = E::TABLE))]
pub async fn get<E>(State(state): State<AppState>, PathParams(id): PathParams<EntityId>) -> Result<Json<E::Response>>
where
    E: Entity,
    CatalogStores: SelectStore<E>,
{
    let entity = SelectStore::<E>::store(&state.catalog).get(id).await?.ok_or_else(|| not_found::<E>(id))?;
    Ok(Json(entity.into()))
}

/// Create a record. `P` decides who may create records of this type.
#[tracing::instrument(skip_all, fields(collection = E::TABLE))]
pub async fn create<E, P>(
    State(state): State<AppState>,
    target: RequestTarget,
    Authorized { user, .. }: Authorized<P>,
    Payload(payload): Payload<Value>,
) -> Result<(StatusCode, Json<E::Response>)>
where
    E: Entity,
    P: AccessPolicy,
    CatalogStores: SelectStore<E>,
{
    let request: E::Create = decode(E::NAME, &payload)?;
    let entity = E::from_create(Uuid::new_v4(), Utc::now(), request, &user);
    let created = SelectStore::<E>::store(&state.catalog).insert(&entity).await?;

    record::<E>(&state, target, &user, OperationAction::Create, created.id(), Some(payload)).await;

    Ok((StatusCode::CREATED, Json(created.into())))
}

/// Partially update a record; absent fields keep their values
#[tracing::instrument(skip_all, fields(collection = E::TABLE))]
pub async fn update<E>(
    State(state): State<AppState>,
    target: RequestTarget,
    Authorized { user, .. }: Authorized<Editors>,
    PathParams(id): PathParams<EntityId>,
    Payload(payload): Payload<Value>,
) -> Result<Json<E::Response>>
where
    E: Entity,
    CatalogStores: SelectStore<E>,
{
    let changes: E::Update = decode(E::NAME, &payload)?;
    let updated = SelectStore::<E>::store(&state.catalog)
        .update(id, changes)
        .await?
        .ok_or_else(|| not_found::<E>(id))?;

    record::<E>(&state, target, &user, OperationAction::Update, id, Some(payload)).await;

    Ok(Json(updated.into()))
}

#[tracing::instrument(skip_all, fields(collection = E::TABLE))]
pub async fn delete<E>(
    State(state): State<AppState>,
    target: RequestTarget,
    Authorized { user, .. }: Authorized<Editors>,
    PathParams(id): PathParams<EntityId>,
) -> Result<StatusCode>
where
    E: Entity,
    CatalogStores: SelectStore<E>,
{
    if !SelectStore::<E>::store(&state.catalog).delete(id).await? {
        return Err(not_found::<E>(id));
    }

    record::<E>(&state, target, &user, OperationAction::Delete, id, None).await;

    Ok(StatusCode::NO_CONTENT)
}
