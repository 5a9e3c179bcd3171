//! Authentication module
//!
//! Wallet signature login and JWT-based request authentication.

mod jwt;
mod middleware;
pub mod signature;

pub use jwt::{create_token, decode_token};
pub use middleware::require_auth;
pub use signature::recover_address;

use crate::chain::Address;

/// Caller identity established by [`require_auth`]
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct AuthUser {
    pub user_id: i32,
    pub address: Address,
}
