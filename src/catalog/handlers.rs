use axum::{
    body::{Body, Bytes},
    extract::{Path, Query, State},
    http::{header, HeaderValue, Uri},
    response::{IntoResponse, Response},
    Json,
};
use serde_json::Value;
use std::collections::HashMap;
use tracing::{debug, error};

use super::cache::ResponseCache;

/// Set on trending responses to `HIT` or `MISS`.
pub const X_CACHE: &str = "x-cache";
use super::error::ApiError;
use crate::server::AppState;

pub async fn trending(State(state): State<AppState>, uri: Uri) -> Result<Response, ApiError> {
    let key = state.cache.key(&uri);
    if let Some(body) = state.cache.get(&key).await {
        return Ok(json_response(body, &state.cache, true));
    }

    let data = state.movies.trending().await?;
    let movies = state.shaper.shape_results(&data).map_err(|e| {
        error!("Failed to shape trending results: {}", e);
        ApiError::Shape(e)
    })?;
    debug!(count = movies.len(), "Shaped trending movies");

    let body = Bytes::from(serde_json::to_vec(&movies)?);
    state.cache.insert(key, body.clone()).await;

    Ok(json_response(body, &state.cache, false))
}

pub async fn details(
    State(state): State<AppState>,
    Path(movie_id): Path<String>,
) -> Result<Json<Value>, ApiError> {
    let movie_id = parse_movie_id(&movie_id).ok_or(ApiError::NotFound)?;
    let data = state.movies.details(movie_id).await?;
    Ok(Json(data))
}

pub async fn search(
    State(state): State<AppState>,
    Query(params): Query<HashMap<String, String>>,
) -> Result<Json<Value>, ApiError> {
    let query = params.get("q").map(String::as_str).unwrap_or("");
    let data = state.movies.search(query).await?;
    Ok(Json(data))
}

fn parse_movie_id(s: &str) -> Option<u64> {
    if s.is_empty() || !s.bytes().all(|b| b.is_ascii_digit()) {
        return None;
    }
    s.parse().ok()
}

fn json_response(body: Bytes, cache: &ResponseCache, hit: bool) -> Response {
    let mut response = Body::from(body).into_response();
    let headers = response.headers_mut();
    headers.insert(
        header::CONTENT_TYPE,
        HeaderValue::from_static("application/json"),
    );
    if cache.is_enabled() {
        headers.insert(
            X_CACHE,
            HeaderValue::from_static(if hit { "HIT" } else { "MISS" }),
        );
        let max_age = format!("max-age={}", cache.ttl().as_secs());
        if let Ok(value) = HeaderValue::from_str(&max_age) {
            headers.insert(header::CACHE_CONTROL, value);
        }
    }
    response
}
