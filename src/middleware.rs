//! Request correlation helpers

use crate::error::ErrorResponse;
use axum::{
    extract::Request,
    middleware::Next,
    response::{IntoResponse, Response},
    Json,
};

const REQUEST_ID_HEADER: &str = "x-request-id";

/// Copy the request's `x-request-id` into every error envelope
pub async fn attach_request_id(request: Request, next: Next) -> Response {
    let request_id = request
        .headers()
        .get(REQUEST_ID_HEADER)
        .and_then(|v| v.to_str().ok())
        .map(str::to_owned);

    let mut response = next.run(request).await;
    let Some(body) = response.extensions_mut().remove::<ErrorResponse>() else {
        return response;
    };
    let Some(request_id) = request_id else {
        return response;
    };

    let status = response.status();
    (
        status,
        Json(ErrorResponse {
            request_id: Some(request_id),
            ..body
        }),
    )
        .into_response()
}

/// First and last 10 characters of a signature, for logs
pub fn truncate_signature(signature: &str) -> String {
    if signature.len() <= 20 || !signature.is_ascii() {
        return signature.to_string();
    }
    format!(
        "{}...{}",
        &signature[..10],
        &signature[signature.len() - 10..]
    )
}
