//! HTTP handlers for the bookmarks API.
//!
//! Each handler runs one request end to end: validate the payload, hit the
//! store, sanitize anything going back out. No state is shared between
//! requests beyond the database handle.

use std::sync::Arc;

use axum::{
    Json,
    extract::{Path, State},
    http::{StatusCode, header},
    response::{IntoResponse, Response},
};
use serde_json::json;

use crate::db::Database;
use crate::error::ApiError;
use crate::model::{CreateBookmark, UpdateBookmark};
use crate::sanitize::sanitize_bookmark;
use crate::unpack_error;
use crate::validate::{validate_create, validate_update};

#[derive(Clone)]
pub struct AppState {
    pub db: Arc<Database>,
    pub api_token: String,
}

pub async fn healthcheck() -> impl IntoResponse {
    Json(json!({ "status": "ok" }))
}

pub async fn list_bookmarks(State(state): State<AppState>) -> Result<Response, ApiError> {
    match state.db.list_bookmarks().await {
        Ok(bookmarks) => {
            let bookmarks: Vec<_> = bookmarks.into_iter().map(sanitize_bookmark).collect();
            Ok(Json(bookmarks).into_response())
        }
        Err(e) => {
            tracing::error!("failed to list bookmarks: {}", unpack_error(&*e));
            Err(ApiError::Storage(e))
        }
    }
}

pub async fn get_bookmark(
    State(state): State<AppState>,
    Path(id): Path<i64>,
) -> Result<Response, ApiError> {
    match state.db.get_bookmark(id).await {
        Ok(Some(bookmark)) => Ok(Json(sanitize_bookmark(bookmark)).into_response()),
        Ok(None) => Err(ApiError::NotFound),
        Err(e) => {
            tracing::error!("failed to get bookmark {}: {}", id, unpack_error(&*e));
            Err(ApiError::Storage(e))
        }
    }
}

pub async fn create_bookmark(
    State(state): State<AppState>,
    Json(payload): Json<CreateBookmark>,
) -> Result<Response, ApiError> {
    let fields = validate_create(&payload).map_err(|e| {
        tracing::info!(field = e.field, "rejected create: {}", e.message);
        ApiError::from(e)
    })?;

    match state.db.insert_bookmark(&fields).await {
        Ok(bookmark) => {
            tracing::info!("bookmark {} created", bookmark.id);
            let location = format!("/api/bookmarks/{}", bookmark.id);
            Ok((
                StatusCode::CREATED,
                [(header::LOCATION, location)],
                Json(sanitize_bookmark(bookmark)),
            )
                .into_response())
        }
        Err(e) => {
            tracing::error!("failed to create bookmark: {}", unpack_error(&*e));
            Err(ApiError::Storage(e))
        }
    }
}

pub async fn update_bookmark(
    State(state): State<AppState>,
    Path(id): Path<i64>,
    Json(payload): Json<UpdateBookmark>,
) -> Result<Response, ApiError> {
    // Confirm the target exists before looking at the payload, so a patch
    // against a missing id answers 404 regardless of body contents.
    match state.db.get_bookmark(id).await {
        Ok(Some(_)) => {}
        Ok(None) => return Err(ApiError::NotFound),
        Err(e) => {
            tracing::error!("failed to get bookmark {}: {}", id, unpack_error(&*e));
            return Err(ApiError::Storage(e));
        }
    }

    let patch = validate_update(&payload).map_err(|e| {
        tracing::info!(field = e.field, "rejected update for {}: {}", id, e.message);
        ApiError::from(e)
    })?;

    match state.db.update_bookmark(id, &patch).await {
        // The row was present a moment ago; treat a no-match here as the
        // delete racing us.
        Ok(true) => {
            tracing::info!("bookmark {} updated", id);
            Ok(StatusCode::NO_CONTENT.into_response())
        }
        Ok(false) => Err(ApiError::NotFound),
        Err(e) => {
            tracing::error!("failed to update bookmark {}: {}", id, unpack_error(&*e));
            Err(ApiError::Storage(e))
        }
    }
}

pub async fn delete_bookmark(
    State(state): State<AppState>,
    Path(id): Path<i64>,
) -> Result<Response, ApiError> {
    match state.db.delete_bookmark(id).await {
        Ok(true) => {
            tracing::info!("bookmark {} deleted", id);
            Ok(StatusCode::NO_CONTENT.into_response())
        }
        Ok(false) => Err(ApiError::NotFound),
        Err(e) => {
            tracing::error!("failed to delete bookmark {}: {}", id, unpack_error(&*e));
            Err(ApiError::Storage(e))
        }
    }
}
