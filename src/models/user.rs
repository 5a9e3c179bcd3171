//! User models

use chrono::{DateTime, Utc};
use once_cell::sync::Lazy;
use regex::Regex;
use serde::{Deserialize, Serialize};
use validator::Validate;

pub const DEFAULT_USER_STATUS: &str = "active";

static SIGNATURE_RE: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"^0x[a-fA-F0-9]{130}$").expect("valid signature regex"));

static ADDRESS_RE: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"^0x[a-fA-F0-9]{40}$").expect("valid address regex"));

/// A wallet that has authenticated at least once
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct User {
    pub id: i32,
    /// Lower-case `0x` address
    pub address: String,
    pub status: String,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

/// POST /api/users/auth
#[derive(Debug, Deserialize, Validate)]
pub struct AuthRequest {
    #[validate(length(min = 1, message = "Message is required"))]
    pub message: String,
    #[validate(regex(path = *SIGNATURE_RE, message = "Signature must be 0x followed by 130 hex characters"))]
    pub signature: String,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct AuthResponse {
    pub user: User,
    pub address: String,
    pub is_new_user: bool,
    pub token: String,
}

/// PATCH /api/users/{id}/status
#[derive(Debug, Deserialize, Validate)]
pub struct UpdateStatusRequest {
    #[validate(length(min = 1, max = 20, message = "Status must be between 1 and 20 characters"))]
    pub status: String,
}

pub fn is_address(value: &str) -> bool {
    ADDRESS_RE.is_match(value)
}
