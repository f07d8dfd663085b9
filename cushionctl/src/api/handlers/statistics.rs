use axum::{Json, extract::State};

use crate::{
    AppState,
    api::models::statistics::CatalogStatistics,
    db::models::catalog::CountScope,
    errors::Result,
};

/// Catalog totals for the dashboard
#[utoipa::path(
    get,
    path = "/api/statistics",
    tag = "statistics",
    security(()),
    responses(
        (status = 200, description = "Catalog totals", body = CatalogStatistics),
    )
)]
#[tracing::instrument(skip_all)]
pub async fn get_statistics(State(state): State<AppState>) -> Result<Json<CatalogStatistics>> {
    let catalog = &state.catalog;
    let (total_fabrics, total_accessories, total_products, active_design_ideas, pending_requirements) = tokio::try_join!(
        catalog.fabrics.count(CountScope::All),
        catalog.accessories.count(CountScope::All),
        catalog.products.count(CountScope::All),
        catalog.design_ideas.count(CountScope::Open),
        catalog.client_requirements.count(CountScope::Open),
    )?;

    Ok(Json(CatalogStatistics {
        total_fabrics,
        total_accessories,
        total_products,
        active_design_ideas,
        pending_requirements,
    }))
}

#[cfg(test)]
mod tests {
    use axum::http::StatusCode;
    use serde_json::json;

    use crate::{api::models::statistics::CatalogStatistics, api::models::users::Role, test_utils::*};

    #[test_log::test(tokio::test)]
    async fn test_statistics_are_public_and_count_open_work() {
        let (server, stores, _bg) = create_test_app().await;

        let empty: CatalogStatistics = server.get("/api/statistics").await.json();
        assert_eq!(empty, CatalogStatistics::default());

        let (_, cookie) = create_logged_in_user(&server, &stores, "editor@example.com", Role::Editor).await;
        let (name, value) = cookie_header(&cookie);

        let creations = [
            ("/api/fabrics", json!({ "name": "Linen", "color": "sand", "width": 140, "gramWeight": 220, "price": "12" })),
            ("/api/fabrics", json!({ "name": "Velvet", "color": "moss", "width": 140, "gramWeight": 380, "price": "21" })),
            ("/api/accessories", json!({ "name": "Tassel", "price": "0.8" })),
            ("/api/design-ideas", json!({ "title": "Round", "description": "A round one" })),
            ("/api/design-ideas", json!({ "title": "Long", "description": "Bolster", "status": "in_progress" })),
            ("/api/design-ideas", json!({ "title": "Odd", "description": "Triangle", "status": "rejected" })),
            ("/api/client-requirements", json!({ "clientName": "Hotel", "description": "Lobby", "requirements": "40 units" })),
            (
                "/api/client-requirements",
                json!({ "clientName": "Cafe", "description": "Benches", "requirements": "12 units", "status": "completed" }),
            ),
        ];
        for (path, body) in creations {
            server
                .post(path)
                .add_header(name.clone(), value.clone())
                .json(&body)
                .await
                .assert_status(StatusCode::CREATED);
        }

        let response = server.get("/api/statistics").await;
        response.assert_status_ok();
        assert_eq!(
            response.json::<CatalogStatistics>(),
            CatalogStatistics {
                total_fabrics: 2,
                total_accessories: 1,
                total_products: 0,
                active_design_ideas: 2,
                pending_requirements: 1,
            }
        );
    }
}
