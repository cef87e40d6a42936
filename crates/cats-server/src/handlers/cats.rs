//! Cat handlers

use crate::app::AppState;
use crate::error::ApiError;
use crate::response::{json_response, ApiResponse};
use axum::{
    body::Bytes,
    extract::{Path, Query, State},
    http::StatusCode,
    response::Response,
};
use cats_core::{Cat, NewCat, StorageError};
use tracing::{debug, info, warn};

pub const MAX_PAGE_SIZE: i64 = 10;

/// Raw paging parameters; anything unparseable falls back to the defaults.
#[derive(Debug, Default)]
pub struct ListParams {
    count: Option<String>,
    start: Option<String>,
}

impl ListParams {
    /// Collect `count` and `start` from query pairs. The first value of a
    /// repeated key wins and unknown keys are ignored.
    pub fn from_query(pairs: Vec<(String, String)>) -> Self {
        let mut params = Self::default();
        for (key, value) in pairs {
            let slot = match key.as_str() {
                "count" => &mut params.count,
                "start" => &mut params.start,
                _ => continue,
            };
            if slot.is_none() {
                *slot = Some(value);
            }
        }
        params
    }

    /// `(limit, offset)` with the count clamped to 1..=10 (else 10) and the
    /// start clamped to at least 0.
    pub fn page(&self) -> (i64, i64) {
        let count = parse_param(self.count.as_deref());
        let start = parse_param(self.start.as_deref());

        let limit = if (1..=MAX_PAGE_SIZE).contains(&count) {
            count
        } else {
            MAX_PAGE_SIZE
        };

        (limit, start.max(0))
    }
}

fn parse_param(value: Option<&str>) -> i64 {
    value.and_then(|v| v.trim().parse().ok()).unwrap_or(0)
}

fn parse_cat(body: &[u8]) -> Result<NewCat, ApiError> {
    serde_json::from_slice(body).map_err(|e| {
        warn!("Received invalid json in request body: {}", e);
        ApiError::BadRequest("invalid json in request body".to_string())
    })
}

pub async fn create(State(state): State<AppState>, body: Bytes) -> Result<Response, ApiError> {
    let cat = parse_cat(&body)?;

    let id = state.store.insert(&cat).await.map_err(|e| {
        info!("Error storing cat {:?}: {}", cat, e);
        ApiError::internal(e).or_internal("error storing cat")
    })?;

    debug!("Created cat {}", id);
    Ok(json_response(StatusCode::CREATED, &ApiResponse::result(id)))
}

pub async fn get(
    State(state): State<AppState>,
    Path(id): Path<String>,
) -> Result<Response, ApiError> {
    let cat = state.store.select(&id).await.map_err(|e| {
        debug!("Error getting cat {}: {}", id, e);
        ApiError::from_storage(e, "cat not found").or_internal("error getting cat")
    })?;

    Ok(json_response(StatusCode::OK, &cat))
}

pub async fn list(
    State(state): State<AppState>,
    Query(pairs): Query<Vec<(String, String)>>,
) -> Result<Response, ApiError> {
    let (limit, offset) = ListParams::from_query(pairs).page();

    match state.store.select_all(limit, offset).await {
        Ok(cats) => Ok(json_response(StatusCode::OK, &cats)),
        // An empty page is not an error for the client.
        Err(StorageError::NotFound(_)) => Ok(json_response(StatusCode::OK, &Vec::<Cat>::new())),
        Err(e) => Err(ApiError::internal(e)),
    }
}

pub async fn update(
    State(state): State<AppState>,
    Path(id): Path<String>,
    body: Bytes,
) -> Result<Response, ApiError> {
    let cat = parse_cat(&body)?;

    state.store.update(&id, &cat).await.map_err(|e| {
        ApiError::from_storage(e, format!("cat id {} not found", id))
            .or_internal("error storing object")
    })?;

    Ok(json_response(StatusCode::OK, &ApiResponse::success()))
}

pub async fn delete(
    State(state): State<AppState>,
    Path(id): Path<String>,
) -> Result<Response, ApiError> {
    if uuid::Uuid::parse_str(&id).map_or(true, |uuid| uuid.is_nil()) {
        return Err(ApiError::BadRequest(format!("invalid cat id: {}", id)));
    }

    state.store.delete(&id).await.map_err(|e| {
        debug!("Error deleting cat {}: {}", id, e);
        ApiError::from_storage(e, format!("cat id {} not found", id))
    })?;

    Ok(json_response(StatusCode::OK, &ApiResponse::success()))
}
