//! User route handlers
//!
//! Wallet-signature login plus the user CRUD surface.

use super::{parse_id, AppJson};
use crate::auth::{create_token, recover_address};
use crate::error::{not_found_error, validation_error, ApiResult, AppError};
use crate::middleware::truncate_signature;
use crate::models::{
    is_address, ApiResponse, AuthRequest, AuthResponse, CountedResponse, MessageResponse,
    UpdateStatusRequest, User,
};
use crate::state::SharedState;
use axum::{
    extract::{Path, State},
    Json,
};
use tracing::{debug, info, warn};
use validator::Validate;

/// GET /api/users
pub async fn list_users(State(state): State<SharedState>) -> ApiResult<Json<CountedResponse<User>>> {
    let users = state.users.list().await?;
    debug!(count = users.len(), "listed users");
    Ok(Json(CountedResponse::new(users)))
}

/// GET /api/users/{id}
pub async fn get_user(
    State(state): State<SharedState>,
    Path(id): Path<String>,
) -> ApiResult<Json<ApiResponse<User>>> {
    let id = parse_id("id", &id)?;
    let user = state
        .users
        .find_by_id(id)
        .await?
        .ok_or_else(|| not_found_error("User not found"))?;
    Ok(Json(ApiResponse::ok(user)))
}

/// GET /api/users/address/{address}
pub async fn get_user_by_address(
    State(state): State<SharedState>,
    Path(address): Path<String>,
) -> ApiResult<Json<ApiResponse<User>>> {
    if !is_address(&address) {
        return Err(validation_error("Invalid Ethereum address"));
    }
    let user = state
        .users
        .find_by_address(&address)
        .await?
        .ok_or_else(|| not_found_error("User not found"))?;
    Ok(Json(ApiResponse::ok(user)))
}

/// POST /api/users/auth
///
/// Recovers the signer of the login challenge, creating the user on first
/// sight, and issues a bearer token for it.
pub async fn authenticate(
    State(state): State<SharedState>,
    AppJson(payload): AppJson<AuthRequest>,
) -> ApiResult<Json<ApiResponse<AuthResponse>>> {
    payload.validate().map_err(|e| validation_error(e.to_string()))?;

    if payload.message != state.settings.auth.challenge {
        return Err(AppError::BadRequest(
            "Message does not match the authentication challenge".to_string(),
        ));
    }

    let address = recover_address(&payload.message, &payload.signature).map_err(|e| {
        warn!(
            signature = %truncate_signature(&payload.signature),
            "signature recovery failed: {}",
            e
        );
        AppError::Unauthorized("Invalid signature".to_string())
    })?;
    let address = address.to_lower_hex();

    let (user, is_new_user) = state.users.find_or_create(&address).await?;
    let token = create_token(&user, &state.settings.auth)?;

    info!(
        user_id = user.id,
        address = %address,
        is_new_user,
        signature = %truncate_signature(&payload.signature),
        "user authenticated"
    );

    Ok(Json(ApiResponse::with_message(
        "Authentication successful",
        AuthResponse {
            user,
            address,
            is_new_user,
            token,
        },
    )))
}

/// PATCH /api/users/{id}/status
pub async fn update_status(
    State(state): State<SharedState>,
    Path(id): Path<String>,
    AppJson(payload): AppJson<UpdateStatusRequest>,
) -> ApiResult<Json<ApiResponse<User>>> {
    let id = parse_id("id", &id)?;
    payload.validate().map_err(|e| validation_error(e.to_string()))?;

    let user = state
        .users
        .update_status(id, payload.status.trim())
        .await?
        .ok_or_else(|| not_found_error("User not found"))?;

    info!(user_id = user.id, status = %user.status, "user status updated");
    Ok(Json(ApiResponse::with_message(
        "User status updated successfully",
        user,
    )))
}

/// DELETE /api/users/{id}
pub async fn delete_user(
    State(state): State<SharedState>,
    Path(id): Path<String>,
) -> ApiResult<Json<MessageResponse>> {
    let id = parse_id("id", &id)?;
    if !state.users.delete(id).await? {
        return Err(not_found_error("User not found"));
    }
    info!(user_id = id, "user deleted");
    Ok(Json(MessageResponse::new("User deleted successfully")))
}
