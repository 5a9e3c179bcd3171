//! Route definitions and router setup
//!
//! Configures all API routes and middleware.

mod governance;
mod proposals;
mod users;

use crate::auth::require_auth;
use crate::config::Settings;
use crate::error::{not_found_error, validation_error, AppError};
use crate::middleware::attach_request_id;
use crate::state::SharedState;
use axum::{
    extract::FromRequest,
    http::{header, Method},
    middleware::{from_fn, from_fn_with_state},
    routing::{get, patch, post},
    Router,
};
use std::time::Duration;
use tower::ServiceBuilder;
use tower_http::{
    compression::CompressionLayer,
    cors::{Any, CorsLayer},
    request_id::MakeRequestUuid,
    trace::{DefaultMakeSpan, DefaultOnRequest, DefaultOnResponse, TraceLayer},
    ServiceBuilderExt,
};
use tracing::Level;

/// JSON body extractor whose rejections use the error envelope
#[derive(FromRequest)]
#[from_request(via(axum::Json), rejection(AppError))]
pub struct AppJson<T>(pub T);

/// Parse a numeric path segment
pub(crate) fn parse_id(name: &str, raw: &str) -> Result<i32, AppError> {
    raw.parse::<i32>()
        .ok()
        .filter(|id| *id > 0)
        .ok_or_else(|| validation_error(format!("{} must be a positive integer", name)))
}

/// Create the application router with all routes and middleware
pub fn create_router(state: SharedState, settings: &Settings) -> Router {
    let cors = build_cors_layer(settings);

    let trace_layer = TraceLayer::new_for_http()
        .make_span_with(DefaultMakeSpan::new().level(Level::INFO))
        .on_request(DefaultOnRequest::new().level(Level::INFO))
        .on_response(DefaultOnResponse::new().level(Level::INFO));

    // outermost first: the id is set before tracing sees the request
    let middleware = ServiceBuilder::new()
        .set_x_request_id(MakeRequestUuid)
        .layer(trace_layer)
        .layer(CompressionLayer::new())
        .layer(cors)
        .propagate_x_request_id()
        .layer(from_fn(attach_request_id));

    let authed = Router::new()
        .route("/api/proposals/submit", post(proposals::submit_proposal))
        .route("/api/proposals/{id}/submit", post(proposals::resubmit_proposal))
        .route(
            "/api/governance/proposals/{onchain_id}/vote",
            post(governance::cast_vote),
        )
        .route(
            "/api/governance/proposals/{onchain_id}/queue",
            post(governance::queue_proposal),
        )
        .route(
            "/api/governance/proposals/{onchain_id}/execute",
            post(governance::execute_proposal),
        )
        .route("/api/governance/delegate", post(governance::delegate))
        .route_layer(from_fn_with_state(state.clone(), require_auth));

    Router::new()
        .route("/api/health", get(health_check))
        // Users
        .route("/api/users", get(users::list_users))
        .route("/api/users/auth", post(users::authenticate))
        .route("/api/users/address/{address}", get(users::get_user_by_address))
        .route("/api/users/{id}", get(users::get_user).delete(users::delete_user))
        .route("/api/users/{id}/status", patch(users::update_status))
        // Proposals
        .route(
            "/api/proposals",
            get(proposals::list_proposals).post(proposals::create_proposal),
        )
        .route("/api/proposals/stats", get(proposals::proposal_stats))
        .route(
            "/api/proposals/onchain/{onchain_id}",
            get(proposals::get_proposal_by_onchain_id),
        )
        .route(
            "/api/proposals/user/{user_id}",
            get(proposals::list_user_proposals),
        )
        .route(
            "/api/proposals/{id}",
            get(proposals::get_proposal)
                .put(proposals::update_proposal)
                .delete(proposals::delete_proposal),
        )
        .route("/api/proposals/{id}/votes", patch(proposals::update_votes))
        // Governance reads
        .route(
            "/api/governance/proposals",
            get(governance::list_onchain_proposals),
        )
        .route(
            "/api/governance/proposals/{onchain_id}",
            get(governance::get_onchain_proposal),
        )
        .route(
            "/api/governance/voting-power/{address}",
            get(governance::voting_power),
        )
        .merge(authed)
        .fallback(route_not_found)
        .layer(middleware)
        .with_state(state)
}

/// Build CORS layer from settings
fn build_cors_layer(settings: &Settings) -> CorsLayer {
    let origins: Vec<_> = settings
        .cors
        .allowed_origins
        .iter()
        .filter_map(|s| s.parse().ok())
        .collect();

    let layer = CorsLayer::new()
        .allow_methods([
            Method::GET,
            Method::POST,
            Method::PUT,
            Method::PATCH,
            Method::DELETE,
            Method::OPTIONS,
        ])
        .allow_headers([header::CONTENT_TYPE, header::AUTHORIZATION, header::ACCEPT])
        .max_age(Duration::from_secs(3600));

    if origins.is_empty() {
        layer.allow_origin(Any)
    } else {
        layer.allow_origin(origins)
    }
}

/// Health check endpoint
async fn health_check() -> axum::Json<serde_json::Value> {
    axum::Json(serde_json::json!({
        "success": true,
        "message": "Server is running",
        "timestamp": chrono::Utc::now().to_rfc3339(),
        "version": env!("CARGO_PKG_VERSION")
    }))
}

async fn route_not_found() -> AppError {
    not_found_error("Route not found")
}
