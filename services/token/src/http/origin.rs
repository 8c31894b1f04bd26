use super::state::AppState;
use crate::error::TokenError;
use axum::extract::{ConnectInfo, FromRequestParts};
use axum::http::header::USER_AGENT;
use axum::http::request::Parts;
use axum::http::HeaderMap;
use std::net::SocketAddr;

const FORWARDED_FOR: &str = "x-forwarded-for";

/// Network origin of a request: the client IP, without the port.
///
/// The first `X-Forwarded-For` entry wins when `trust_forwarded_for` is set
/// and the header is present; otherwise the peer address is used. Returns
/// `None` when neither is available.
pub(super) fn request_origin(parts: &Parts, trust_forwarded_for: bool) -> Option<String> {
    if trust_forwarded_for {
        if let Some(forwarded) = forwarded_for(&parts.headers) {
            return Some(forwarded);
        }
    }
    parts
        .extensions
        .get::<ConnectInfo<SocketAddr>>()
        .map(|ConnectInfo(addr)| addr.ip().to_string())
}

fn forwarded_for(headers: &HeaderMap) -> Option<String> {
    headers
        .get(FORWARDED_FOR)?
        .to_str()
        .ok()?
        .split(',')
        .map(str::trim)
        .find(|entry| !entry.is_empty())
        .map(str::to_string)
}

/// Who is calling: network origin and user agent.
#[derive(Debug, Clone)]
pub struct ClientContext {
    pub origin: String,
    pub user_agent: String,
}

impl FromRequestParts<AppState> for ClientContext {
    type Rejection = TokenError;

    async fn from_request_parts(parts: &mut Parts, state: &AppState) -> Result<Self, Self::Rejection> {
        let origin = request_origin(parts, state.settings.trust_forwarded_for)
            .ok_or_else(|| TokenError::Internal("request origin unavailable".to_string()))?;
        let user_agent = parts
            .headers
            .get(USER_AGENT)
            .and_then(|v| v.to_str().ok())
            .unwrap_or_default()
            .to_string();

        Ok(ClientContext { origin, user_agent })
    }
}
