//! Application wiring: state, router and server startup

use crate::config::{Backend, Settings};
use crate::error::envelope_bare_errors;
use crate::handlers;
use crate::storage::{CacheStore, PgStore};
use anyhow::{Context, Result};
use axum::{
    middleware,
    routing::{get, post, put},
    Router,
};
use cats_core::CatStore;
use std::net::SocketAddr;
use std::sync::Arc;
use std::time::Duration;
use tower_http::timeout::TimeoutLayer;
use tower_http::trace::TraceLayer;
use tracing::info;

/// Application state shared across handlers
#[derive(Clone)]
pub struct AppState {
    pub store: Arc<dyn CatStore>,
}

impl AppState {
    pub fn new(store: Arc<dyn CatStore>) -> Self {
        Self { store }
    }
}

/// Build the `/cats/v1` router. Requests running longer than
/// `request_timeout` are cancelled, storage call included. Every error
/// response, including timeouts and extractor rejections, uses the JSON
/// envelope.
pub fn router(state: AppState, request_timeout: Duration) -> Router {
    Router::new()
        .route("/cats/v1/health", get(handlers::health))
        .route("/cats/v1/", post(handlers::cats::create))
        .route("/cats/v1/cats", get(handlers::cats::list))
        .route(
            "/cats/v1/cats/:id",
            get(handlers::cats::get).delete(handlers::cats::delete),
        )
        .route("/cats/v1/:id", put(handlers::cats::update))
        .layer(TimeoutLayer::new(request_timeout))
        .layer(middleware::map_response(envelope_bare_errors))
        .layer(TraceLayer::new_for_http())
        .with_state(state)
}

/// Construct the configured storage backend.
pub async fn build_store(settings: &Settings) -> Result<Arc<dyn CatStore>> {
    match settings.storage.backend {
        Backend::Postgres => {
            info!("Initializing PostgreSQL storage...");
            let store = PgStore::connect(&settings.database)
                .await
                .context("Failed to initialize database")?;
            Ok(Arc::new(store))
        }
        Backend::Cache => {
            info!(
                "Initializing in-memory cache: capacity={} bytes, ttl={}s",
                settings.cache.capacity_bytes, settings.cache.ttl_secs
            );
            let store = Arc::new(CacheStore::new(
                settings.cache.capacity_bytes,
                settings.cache.ttl(),
            ));
            if settings.cache.sweep_interval_secs > 0 {
                CacheStore::spawn_sweeper(
                    &store,
                    Duration::from_secs(settings.cache.sweep_interval_secs),
                );
            }
            Ok(store)
        }
    }
}

pub async fn run_server(settings: Settings) -> Result<()> {
    let store = build_store(&settings).await?;
    info!("Storage initialized");

    let app = router(AppState::new(store), settings.server.request_timeout());

    let addr: SocketAddr = settings
        .server
        .bind_address()
        .parse()
        .context("Failed to parse bind address")?;

    let listener = tokio::net::TcpListener::bind(addr)
        .await
        .with_context(|| format!("Failed to bind to {}", addr))?;

    info!("Server listening on {}", addr);

    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal())
        .await
        .context("Server error")?;

    info!("Server stopped");
    Ok(())
}

async fn shutdown_signal() {
    if let Err(e) = tokio::signal::ctrl_c().await {
        tracing::error!("Failed to listen for shutdown signal: {}", e);
        std::future::pending::<()>().await;
    }
    info!("Shutdown signal received");
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::handlers::health::{HealthResponse, HEALTHY, STORAGE_UNAVAILABLE};
    use axum::{
        body::Body,
        http::{Request, StatusCode},
    };
    use crate::response::ApiResponse;
    use async_trait::async_trait;
    use cats_core::{Cat, MockCatStore, NewCat, StorageError};
    use tower::ServiceExt;

    /// Answers only after the request deadline has passed.
    struct SlowStore;

    #[async_trait]
    impl CatStore for SlowStore {
        async fn status(&self) -> cats_core::Result<()> {
            tokio::time::sleep(Duration::from_secs(5)).await;
            Ok(())
        }

        async fn insert(&self, _cat: &NewCat) -> cats_core::Result<String> {
            Err(StorageError::Unsupported("insert".to_string()))
        }

        async fn select(&self, id: &str) -> cats_core::Result<Cat> {
            Err(StorageError::NotFound(id.to_string()))
        }

        async fn select_all(&self, _limit: i64, _offset: i64) -> cats_core::Result<Vec<Cat>> {
            Ok(Vec::new())
        }

        async fn update(&self, id: &str, _cat: &NewCat) -> cats_core::Result<()> {
            Err(StorageError::NotFound(id.to_string()))
        }

        async fn delete(&self, id: &str) -> cats_core::Result<()> {
            Err(StorageError::NotFound(id.to_string()))
        }

        async fn purge(&self, table: &str) -> cats_core::Result<()> {
            Err(StorageError::Unsupported(table.to_string()))
        }
    }

    async fn envelope_of(response: axum::response::Response) -> ApiResponse {
        let bytes = axum::body::to_bytes(response.into_body(), usize::MAX)
            .await
            .unwrap();
        serde_json::from_slice(&bytes).unwrap()
    }

    async fn health_of(store: MockCatStore) -> (StatusCode, HealthResponse) {
        let app = router(AppState::new(Arc::new(store)), Duration::from_secs(5));
        let response = app
            .oneshot(
                Request::builder()
                    .uri("/cats/v1/health")
                    .body(Body::empty())
                    .unwrap(),
            )
            .await
            .unwrap();

        let status = response.status();
        let bytes = axum::body::to_bytes(response.into_body(), usize::MAX)
            .await
            .unwrap();
        (status, serde_json::from_slice(&bytes).unwrap())
    }

    #[tokio::test]
    async fn test_health() {
        let mut store = MockCatStore::new();
        store.expect_status().times(1).returning(|| Ok(()));

        let (status, body) = health_of(store).await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(body.status, HEALTHY);
    }

    #[tokio::test]
    async fn test_health_with_storage_down() {
        let mut store = MockCatStore::new();
        store
            .expect_status()
            .times(1)
            .returning(|| Err(StorageError::Database("connection refused".to_string())));

        let (status, body) = health_of(store).await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(body.status, STORAGE_UNAVAILABLE);
    }

    #[tokio::test]
    async fn test_unknown_route() {
        let app = router(AppState::new(Arc::new(MockCatStore::new())), Duration::from_secs(5));
        let response = app
            .oneshot(
                Request::builder()
                    .uri("/dogs/v1/health")
                    .body(Body::empty())
                    .unwrap(),
            )
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::NOT_FOUND);
        assert_eq!(
            envelope_of(response).await,
            ApiResponse::error(StatusCode::NOT_FOUND, "not found")
        );
    }

    #[tokio::test]
    async fn test_timeout_uses_envelope() {
        let app = router(AppState::new(Arc::new(SlowStore)), Duration::from_millis(20));
        let response = app
            .oneshot(
                Request::builder()
                    .uri("/cats/v1/health")
                    .body(Body::empty())
                    .unwrap(),
            )
            .await
            .unwrap();

        assert_eq!(response.status(), StatusCode::REQUEST_TIMEOUT);
        assert_eq!(
            envelope_of(response).await,
            ApiResponse::error(StatusCode::REQUEST_TIMEOUT, "request timeout")
        );
    }

    #[tokio::test]
    async fn test_build_cache_store() {
        let mut settings = Settings::default();
        settings.storage.backend = Backend::Cache;
        settings.cache.sweep_interval_secs = 0;

        let store = build_store(&settings).await.unwrap();
        assert!(store.status().await.is_ok());
    }
}
