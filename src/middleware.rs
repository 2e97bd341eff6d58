use axum::{
    extract::{Request, State},
    http::HeaderMap,
    middleware::Next,
    response::{IntoResponse, Response},
};

use crate::auth::resolve_session;
use crate::database::AppState;
use crate::error::AppError;

/// Middleware that turns a bearer token into an explicit [`Session`]
///
/// Expects `Authorization: Bearer <token>`. On success the resolved
/// [`Session`] is stored in the request extensions, where handlers pick it up
/// with `Extension<Session>`. Missing, malformed or unknown tokens are
/// rejected with `401 Unauthorized` before the handler runs.
///
/// [`Session`]: crate::model::Session
pub async fn session_middleware(
    State(state): State<AppState>,
    headers: HeaderMap,
    mut request: Request,
    next: Next,
) -> Result<Response, Response> {
    let token = headers
        .get("Authorization")
        .and_then(|value| value.to_str().ok())
        .and_then(|value| value.strip_prefix("Bearer "))
        .map(str::trim)
        .filter(|token| !token.is_empty())
        .ok_or_else(|| AppError::Unauthorized.into_response())?;

    let session = resolve_session(&state.db, token).map_err(IntoResponse::into_response)?;

    request.extensions_mut().insert(session);
    Ok(next.run(request).await)
}
