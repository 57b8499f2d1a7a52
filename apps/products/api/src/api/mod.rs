//! API routes module

pub mod health;
pub mod products;

use axum::Router;
use axum_helpers::server::{create_router, health_router};

use crate::openapi::ApiDoc;
use crate::state::AppState;

/// Routes served under `/api`
pub fn routes(state: &AppState) -> Router {
    Router::new().nest("/products", products::router(state))
}

/// Full application: `/api` routes with docs and middleware, plus `/health`
/// and `/ready` at the root.
pub fn app(state: &AppState) -> std::io::Result<Router> {
    let router = create_router::<ApiDoc>(routes(state))?
        .merge(health_router(state.config.app))
        .merge(health::router(state.clone()));
    Ok(router)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::{Config, Environment, ProductStore};
    use crate::state::Backend;
    use axum::body::Body;
    use axum::http::{Request, StatusCode, header};
    use core_config::{app_info, server::ServerConfig};
    use domain_products::{InMemoryProductRepository, Product};
    use http_body_util::BodyExt;
    use serde_json::{Value, json};
    use tower::ServiceExt;

    fn memory_app(products: Vec<Product>) -> Router {
        let state = AppState {
            config: Config {
                app: app_info!(),
                server: ServerConfig::default(),
                environment: Environment::Development,
                store: ProductStore::Memory,
                postgres: None,
            },
            backend: Backend::Memory(InMemoryProductRepository::with_products(products)),
        };

        temp_env::with_var("CORS_ALLOWED_ORIGIN", Some("http://localhost:3000"), || {
            app(&state)
        })
        .unwrap()
    }

    async fn send(
        app: Router,
        method: &str,
        uri: &str,
        body: Option<Value>,
    ) -> (StatusCode, Vec<u8>, Option<String>) {
        let mut builder = Request::builder().method(method).uri(uri);
        let body = match body {
            Some(json) => {
                builder = builder.header(header::CONTENT_TYPE, "application/json");
                Body::from(json.to_string())
            }
            None => Body::empty(),
        };

        let response = app.oneshot(builder.body(body).unwrap()).await.unwrap();
        let status = response.status();
        let location = response
            .headers()
            .get(header::LOCATION)
            .map(|v| v.to_str().unwrap().to_string());
        let bytes = response.into_body().collect().await.unwrap().to_bytes();
        (status, bytes.to_vec(), location)
    }

    #[tokio::test]
    async fn test_crud_walkthrough() {
        let app = memory_app(vec![]);

        let (status, _, location) = send(
            app.clone(),
            "POST",
            "/api/products",
            Some(json!({"id": 1, "name": "A"})),
        )
        .await;
        assert_eq!(status, StatusCode::CREATED);
        assert_eq!(location.as_deref(), Some("/api/products/1"));

        let (status, body, _) = send(app.clone(), "GET", "/api/products/1", None).await;
        assert_eq!(status, StatusCode::OK);
        let product: Value = serde_json::from_slice(&body).unwrap();
        assert_eq!(product, json!({"id": 1, "name": "A"}));

        let (status, body, _) = send(
            app.clone(),
            "PUT",
            "/api/products",
            Some(json!({"id": 1, "name": "B"})),
        )
        .await;
        assert_eq!(status, StatusCode::OK);
        assert!(body.is_empty());

        let (status, body, _) = send(app.clone(), "GET", "/api/products", None).await;
        assert_eq!(status, StatusCode::OK);
        let list: Value = serde_json::from_slice(&body).unwrap();
        assert_eq!(list, json!([{"id": 1, "name": "B"}]));

        let (status, _, _) = send(app.clone(), "DELETE", "/api/products/1", None).await;
        assert_eq!(status, StatusCode::OK);

        let (status, body, _) = send(app, "GET", "/api/products/1", None).await;
        assert_eq!(status, StatusCode::NOT_FOUND);
        assert!(body.is_empty());
    }

    #[tokio::test]
    async fn test_paged_route_under_api() {
        let products = (1..=3).map(|i| Product::new(i, format!("P{i}"))).collect();
        let app = memory_app(products);

        let (status, body, _) = send(app, "GET", "/api/products/paged?page=2&size=2", None).await;
        assert_eq!(status, StatusCode::OK);

        let page: Value = serde_json::from_slice(&body).unwrap();
        assert_eq!(page["items"], json!([{"id": 3, "name": "P3"}]));
        assert_eq!(page["total_items"], 3);
        assert_eq!(page["has_previous_page"], true);
    }

    #[tokio::test]
    async fn test_unsupported_method_returns_405() {
        let app = memory_app(vec![]);

        let (status, _, _) = send(app, "PATCH", "/api/products", None).await;
        assert_eq!(status, StatusCode::METHOD_NOT_ALLOWED);
    }

    #[tokio::test]
    async fn test_unknown_route_returns_404_json() {
        let app = memory_app(vec![]);

        let (status, body, _) = send(app, "GET", "/api/unknown", None).await;
        assert_eq!(status, StatusCode::NOT_FOUND);
        let json: Value = serde_json::from_slice(&body).unwrap();
        assert_eq!(json["error"], "NOT_FOUND");
    }

    #[tokio::test]
    async fn test_health_and_ready() {
        let app = memory_app(vec![]);

        let (status, body, _) = send(app.clone(), "GET", "/health", None).await;
        assert_eq!(status, StatusCode::OK);
        let json: Value = serde_json::from_slice(&body).unwrap();
        assert_eq!(json["name"], "products_api");

        let (status, body, _) = send(app, "GET", "/ready", None).await;
        assert_eq!(status, StatusCode::OK);
        let json: Value = serde_json::from_slice(&body).unwrap();
        assert_eq!(json["status"], "ready");
    }

    #[tokio::test]
    async fn test_openapi_document_lists_product_paths() {
        let app = memory_app(vec![]);

        let (status, body, _) = send(app, "GET", "/api-docs/openapi.json", None).await;
        assert_eq!(status, StatusCode::OK);

        let doc: Value = serde_json::from_slice(&body).unwrap();
        let paths = doc["paths"].as_object().unwrap();
        assert!(paths.contains_key("/api/products"));
        assert!(paths.contains_key("/api/products/paged"));
        assert!(paths.contains_key("/api/products/{id}"));
    }
}
