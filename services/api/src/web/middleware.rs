//! services/api/src/web/middleware.rs
//!
//! Authentication middleware for protecting routes.

use axum::{
    extract::{Request, State},
    http::{header, HeaderMap},
    middleware::Next,
    response::Response,
};
use shop_core::{PortError, Role};
use std::sync::Arc;
use tracing::debug;
use uuid::Uuid;

use crate::error::ApiError;
use crate::web::state::AppState;

/// Who is making the request, as proven by their session token.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct AuthContext {
    pub account_id: Uuid,
    pub role: Role,
}

/// Pulls the session token from `Authorization: Bearer` or, failing that,
/// the `session` cookie.
fn session_token(headers: &HeaderMap) -> Option<&str> {
    let bearer = headers
        .get(header::AUTHORIZATION)
        .and_then(|v| v.to_str().ok())
        .and_then(|v| v.strip_prefix("Bearer "))
        .map(str::trim)
        .filter(|t| !t.is_empty());
    if bearer.is_some() {
        return bearer;
    }

    headers
        .get(header::COOKIE)
        .and_then(|v| v.to_str().ok())?
        .split(';')
        .find_map(|c| {
            let c = c.trim();
            c.strip_prefix("session=")
        })
        .filter(|t| !t.is_empty())
}

/// Middleware that validates the session token and extracts the caller.
///
/// If valid, inserts an `AuthContext` into request extensions for handlers to use.
/// If invalid or missing, returns 401 Unauthorized.
pub async fn require_auth(
    State(state): State<Arc<AppState>>,
    mut req: Request,
    next: Next,
) -> Result<Response, ApiError> {
    // 1. Extract the token
    let token = session_token(req.headers()).ok_or(ApiError::Port(PortError::Unauthorized))?;

    // 2. Verify signature and expiry
    let claims = state.tokens.verify(token).map_err(|e| {
        debug!("Rejected session token: {:?}", e);
        ApiError::Port(PortError::Unauthorized)
    })?;

    // 3. Insert the caller into request extensions
    req.extensions_mut().insert(AuthContext {
        account_id: claims.account_id,
        role: claims.role,
    });

    // 4. Continue to the handler
    Ok(next.run(req).await)
}

/// Middleware that only lets admins through. Must run after `require_auth`.
pub async fn require_admin(req: Request, next: Next) -> Result<Response, ApiError> {
    match req.extensions().get::<AuthContext>() {
        Some(auth) if auth.role == Role::Admin => Ok(next.run(req).await),
        Some(auth) => {
            debug!(account_id = %auth.account_id, "Non-admin hit an admin route");
            Err(ApiError::Forbidden)
        }
        None => Err(ApiError::Port(PortError::Unauthorized)),
    }
}
