use axum::{
    extract::{Request, State},
    http::{header::AUTHORIZATION, StatusCode},
    middleware::Next,
    response::{IntoResponse, Response},
};

use crate::AppState;

/// Checks `Authorization: Bearer <token>` against the configured admin token.
///
/// - No admin token configured: 404, the admin surface does not exist.
/// - Missing or wrong token: 401.
pub async fn require_admin_token(
    State(state): State<AppState>,
    req: Request,
    next: Next,
) -> Response {
    let Some(expected) = state.admin_token.as_deref() else {
        return StatusCode::NOT_FOUND.into_response();
    };

    let provided = req
        .headers()
        .get(AUTHORIZATION)
        .and_then(|v| v.to_str().ok())
        .and_then(|v| v.strip_prefix("Bearer "));

    match provided {
        Some(token) if token == expected => next.run(req).await,
        _ => {
            tracing::warn!(
                method = %req.method(),
                uri = %req.uri().path(),
                "Admin auth: rejected"
            );
            StatusCode::UNAUTHORIZED.into_response()
        }
    }
}
