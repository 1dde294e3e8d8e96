//! API Routes
//!
//! Configures the Axum router with all node endpoints.

use axum::{
    routing::{delete, get, patch, post, put},
    Router,
};
use tower_http::{
    cors::{Any, CorsLayer},
    trace::TraceLayer,
};

use super::handlers::{
    cluster_handler, delete_handler, down_handler, get_handler, health_handler, join_handler,
    keys_handler, leave_handler, map_delete_handler, map_entries_handler, map_get_handler,
    map_keys_handler, map_set_handler, map_update_handler, maps_handler, set_handler,
    stats_handler, up_handler, update_handler, AppState,
};

/// Creates the main router with all endpoints configured.
///
/// # Middleware
/// - CORS: Allows any origin
/// - Tracing: Logs all requests for debugging
pub fn create_router(state: AppState) -> Router {
    let cors = CorsLayer::new()
        .allow_origin(Any)
        .allow_methods(Any)
        .allow_headers(Any);

    Router::new()
        .route("/set", put(set_handler))
        .route("/get/:key", get(get_handler))
        .route("/del/:key", delete(delete_handler))
        .route("/update/:key", patch(update_handler))
        .route("/keys", get(keys_handler))
        .route("/maps", get(maps_handler))
        .route("/maps/:map/set", put(map_set_handler))
        .route("/maps/:map/get/:key", get(map_get_handler))
        .route("/maps/:map/del/:key", delete(map_delete_handler))
        .route("/maps/:map/update/:key", patch(map_update_handler))
        .route("/maps/:map/keys", get(map_keys_handler))
        .route("/maps/:map/entries", get(map_entries_handler))
        .route("/stats", get(stats_handler))
        .route("/health", get(health_handler))
        .route("/cluster", get(cluster_handler))
        .route("/cluster/members", post(join_handler))
        .route("/cluster/members/:id", delete(leave_handler))
        .route("/cluster/members/:id/down", post(down_handler))
        .route("/cluster/members/:id/up", post(up_handler))
        .layer(cors)
        .layer(TraceLayer::new_for_http())
        .with_state(state)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::Config;
    use crate::coordinator::Coordinator;
    use crate::store::MemoryDocumentStore;
    use axum::{
        body::Body,
        http::{Request, StatusCode},
    };
    use std::sync::Arc;
    use tower::util::ServiceExt;

    async fn create_test_app() -> Router {
        let config = Config {
            partition_count: 8,
            ..Config::default()
        };
        let coordinator = Coordinator::start(&config, Arc::new(MemoryDocumentStore::new()))
            .await
            .unwrap();
        create_router(AppState::new(coordinator))
    }

    #[tokio::test]
    async fn test_health_endpoint() {
        let app = create_test_app().await;

        let response = app
            .oneshot(
                Request::builder()
                    .uri("/health")
                    .body(Body::empty())
                    .unwrap(),
            )
            .await
            .unwrap();

        assert_eq!(response.status(), StatusCode::OK);
    }

    #[tokio::test]
    async fn test_cluster_endpoint() {
        let app = create_test_app().await;

        let response = app
            .oneshot(
                Request::builder()
                    .uri("/cluster")
                    .body(Body::empty())
                    .unwrap(),
            )
            .await
            .unwrap();

        assert_eq!(response.status(), StatusCode::OK);
    }

    #[tokio::test]
    async fn test_set_endpoint() {
        let app = create_test_app().await;

        let response = app
            .oneshot(
                Request::builder()
                    .method("PUT")
                    .uri("/set")
                    .header("content-type", "application/json")
                    .body(Body::from(r#"{"key":"test","value":{"n":1}}"#))
                    .unwrap(),
            )
            .await
            .unwrap();

        assert_eq!(response.status(), StatusCode::OK);
    }

    #[tokio::test]
    async fn test_map_routes() {
        let app = create_test_app().await;

        let response = app
            .clone()
            .oneshot(
                Request::builder()
                    .method("PUT")
                    .uri("/maps/users/set")
                    .header("content-type", "application/json")
                    .body(Body::from(r#"{"key":"1","value":{"n":1}}"#))
                    .unwrap(),
            )
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::OK);

        let response = app
            .clone()
            .oneshot(
                Request::builder()
                    .method("PATCH")
                    .uri("/maps/users/update/1")
                    .header("content-type", "application/json")
                    .body(Body::from(r#"{"field":"n","value":2}"#))
                    .unwrap(),
            )
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::OK);

        let response = app
            .oneshot(
                Request::builder()
                    .uri("/maps/users/entries")
                    .body(Body::empty())
                    .unwrap(),
            )
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::OK);
    }

    #[tokio::test]
    async fn test_get_not_found() {
        let app = create_test_app().await;

        let response = app
            .oneshot(
                Request::builder()
                    .uri("/get/nonexistent")
                    .body(Body::empty())
                    .unwrap(),
            )
            .await
            .unwrap();

        assert_eq!(response.status(), StatusCode::NOT_FOUND);
    }
}
