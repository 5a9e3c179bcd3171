//! Authentication middleware
//!
//! Validates the bearer token and exposes the caller to handlers.

use crate::auth::{decode_token, AuthUser};
use crate::error::AppError;
use crate::state::SharedState;
use axum::{
    extract::{Request, State},
    middleware::Next,
    response::Response,
};
use axum_extra::{
    headers::{authorization::Bearer, Authorization},
    TypedHeader,
};
use tracing::debug;

/// Reject requests without a valid bearer token; on success an [`AuthUser`]
/// is inserted into the request extensions
pub async fn require_auth(
    State(state): State<SharedState>,
    bearer: Option<TypedHeader<Authorization<Bearer>>>,
    mut request: Request,
    next: Next,
) -> Result<Response, AppError> {
    let TypedHeader(Authorization(bearer)) = bearer
        .ok_or_else(|| AppError::Unauthorized("Missing authorization header".to_string()))?;

    let claims = decode_token(bearer.token(), &state.settings.auth.jwt_secret)?;
    let address = claims
        .address
        .parse()
        .map_err(|_| AppError::Unauthorized("Invalid token".to_string()))?;

    debug!(user_id = claims.sub, address = %claims.address, "authenticated request");
    request.extensions_mut().insert(AuthUser {
        user_id: claims.sub,
        address,
    });

    Ok(next.run(request).await)
}
