use axum::{Json, extract::State};

use crate::{
    AppState,
    api::{
        extract::QueryParams,
        models::operation_logs::{ListOperationLogsQuery, OperationLogResponse},
    },
    auth::gate::{Admins, Authorized},
    db::models::operation_logs::OperationLogFilter,
    errors::Result,
};

/// Query the audit trail, newest first
#[utoipa::path(
    get,
    path = "/api/operation-logs",
    tag = "operation_logs",
    params(ListOperationLogsQuery),
    responses(
        (status = 200, description = "Matching entries, newest first", body = [OperationLogResponse]),
        (status = 400, description = "Malformed filter", body = crate::errors::ErrorBody),
        (status = 403, description = "Caller is not an admin", body = crate::errors::ErrorBody),
    )
)]
#[tracing::instrument(skip_all)]
pub async fn list_operation_logs(
    State(state): State<AppState>,
    _: Authorized<Admins>,
    QueryParams(query): QueryParams<ListOperationLogsQuery>,
) -> Result<Json<Vec<OperationLogResponse>>> {
    let filter = OperationLogFilter::try_from(query)?;
    let entries = state.audit.query(&filter).await?;
    Ok(Json(entries.into_iter().map(OperationLogResponse::from).collect()))
}

#[cfg(test)]
mod tests {
    use axum::http::StatusCode;
    use chrono::{Duration, Utc};
    use serde_json::json;

    use crate::{
        api::models::{operation_logs::OperationLogResponse, users::Role},
        db::models::operation_logs::OperationAction,
        errors::ErrorBody,
        test_utils::*,
    };

    #[test_log::test(tokio::test)]
    async fn test_query_filters_combine() {
        let (server, stores, _bg) = create_test_app().await;
        let (admin, admin_cookie) = create_logged_in_user(&server, &stores, "admin@example.com", Role::Admin).await;
        let (editor, editor_cookie) = create_logged_in_user(&server, &stores, "editor@example.com", Role::Editor).await;
        let (admin_name, admin_value) = cookie_header(&admin_cookie);
        let (editor_name, editor_value) = cookie_header(&editor_cookie);

        server
            .post("/api/accessories")
            .add_header(editor_name.clone(), editor_value.clone())
            .json(&json!({ "name": "Piping", "price": "1.2" }))
            .await
            .assert_status(StatusCode::CREATED);
        server
            .post("/api/products")
            .add_header(editor_name.clone(), editor_value.clone())
            .json(&json!({ "code": "P-1", "name": "Bolster" }))
            .await
            .assert_status(StatusCode::CREATED);
        server
            .post("/api/products")
            .add_header(admin_name.clone(), admin_value.clone())
            .json(&json!({ "code": "P-2", "name": "Floor cushion" }))
            .await
            .assert_status(StatusCode::CREATED);

        // Editors may not read the trail
        server
            .get("/api/operation-logs")
            .add_header(editor_name, editor_value)
            .await
            .assert_status(StatusCode::FORBIDDEN);

        let all: Vec<OperationLogResponse> = server
            .get("/api/operation-logs")
            .add_header(admin_name.clone(), admin_value.clone())
            .await
            .json();
        assert_eq!(all.len(), 3);
        assert_eq!(all[0].user_id, Some(admin.id));
        assert!(all.windows(2).all(|w| w[0].created_at >= w[1].created_at));

        let editor_products: Vec<OperationLogResponse> = server
            .get("/api/operation-logs")
            .add_query_param("userId", editor.id)
            .add_query_param("entityType", "products")
            .add_header(admin_name.clone(), admin_value.clone())
            .await
            .json();
        assert_eq!(editor_products.len(), 1);
        assert_eq!(editor_products[0].action, OperationAction::Create);
        assert_eq!(editor_products[0].route, "/api/products");

        let tomorrow = (Utc::now() + Duration::days(1)).format("%Y-%m-%d").to_string();
        let future: Vec<OperationLogResponse> = server
            .get("/api/operation-logs")
            .add_query_param("startDate", &tomorrow)
            .add_header(admin_name.clone(), admin_value.clone())
            .await
            .json();
        assert!(future.is_empty());

        let until_now: Vec<OperationLogResponse> = server
            .get("/api/operation-logs")
            .add_query_param("endDate", (Utc::now() + Duration::seconds(1)).to_rfc3339())
            .add_header(admin_name, admin_value)
            .await
            .json();
        assert_eq!(until_now.len(), 3);
    }

    #[test_log::test(tokio::test)]
    async fn test_malformed_filters_are_validation_errors() {
        let (server, stores, _bg) = create_test_app().await;
        let (_, cookie) = create_logged_in_user(&server, &stores, "admin@example.com", Role::Admin).await;
        let (name, value) = cookie_header(&cookie);

        let response = server
            .get("/api/operation-logs")
            .add_query_param("startDate", "last tuesday")
            .add_header(name.clone(), value.clone())
            .await;
        response.assert_status(StatusCode::BAD_REQUEST);
        assert_eq!(response.json::<ErrorBody>().field.as_deref(), Some("startDate"));

        let response = server
            .get("/api/operation-logs")
            .add_query_param("userId", "not-a-uuid")
            .add_header(name, value)
            .await;
        response.assert_status(StatusCode::BAD_REQUEST);
        let body: ErrorBody = response.json();
        assert_eq!(body.kind, "validation");
        assert_eq!(body.field.as_deref(), Some("userId"));
    }

    #[test_log::test(tokio::test)]
    async fn test_blank_filters_are_ignored() {
        let (server, stores, _bg) = create_test_app().await;
        let (_, cookie) = create_logged_in_user(&server, &stores, "admin@example.com", Role::Admin).await;
        let (name, value) = cookie_header(&cookie);

        server
            .post("/api/accessories")
            .add_header(name.clone(), value.clone())
            .json(&json!({ "name": "Zip", "price": "0.3" }))
            .await
            .assert_status(StatusCode::CREATED);

        let response = server
            .get("/api/operation-logs")
            .add_query_param("userId", "")
            .add_query_param("entityType", "")
            .add_query_param("startDate", "")
            .add_query_param("endDate", "")
            .add_header(name, value)
            .await;
        response.assert_status_ok();
        assert_eq!(response.json::<Vec<OperationLogResponse>>().len(), 1);
    }
}
