use crate::error::TokenError;
use axum::extract::{Request, State};
use axum::middleware::Next;
use axum::response::{IntoResponse, Response};
use std::time::Duration;
use tokio::time::timeout;

/// Whole-request deadline.
///
/// Expiry drops the handler future, so any write it had not reached is never
/// made, and answers with the same 500 body as every other internal failure.
pub async fn enforce(State(limit): State<Duration>, request: Request, next: Next) -> Response {
    let path = request.uri().path().to_string();
    match timeout(limit, next.run(request)).await {
        Ok(response) => response,
        Err(_) => TokenError::Timeout(format!(
            "{path} exceeded {}ms",
            limit.as_millis()
        ))
        .into_response(),
    }
}
