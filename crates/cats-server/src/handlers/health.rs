//! Health check handler

use crate::app::AppState;
use axum::{extract::State, Json};
use serde::{Deserialize, Serialize};

pub const HEALTHY: &str = "Cats is up and available";
pub const STORAGE_UNAVAILABLE: &str = "Cats is up, storage unavailable";

#[derive(Debug, Serialize, Deserialize)]
pub struct HealthResponse {
    pub status: String,
}

pub async fn health(State(state): State<AppState>) -> Json<HealthResponse> {
    let status = match state.store.status().await {
        Ok(()) => HEALTHY,
        Err(e) => {
            tracing::warn!("Storage status check failed: {}", e);
            STORAGE_UNAVAILABLE
        }
    };

    Json(HealthResponse {
        status: status.to_string(),
    })
}
