use axum::{
    Json,
    extract::{Request, State},
    http::{StatusCode, header},
    middleware::Next,
    response::{IntoResponse, Response},
};
use serde_json::json;

use crate::handler::AppState;

/// Bearer-token gate in front of the bookmarks routes. Everything behind it
/// can assume the caller is authenticated.
pub async fn require_bearer_token(
    State(state): State<AppState>,
    req: Request,
    next: Next,
) -> Response {
    let authorized = req
        .headers()
        .get(header::AUTHORIZATION)
        .and_then(|value| value.to_str().ok())
        .and_then(|value| value.strip_prefix("Bearer "))
        .is_some_and(|token| token == state.api_token);

    if !authorized {
        tracing::info!("rejected unauthorized request to {}", req.uri().path());
        return (
            StatusCode::UNAUTHORIZED,
            Json(json!({ "error": "Unauthorized request" })),
        )
            .into_response();
    }

    next.run(req).await
}
