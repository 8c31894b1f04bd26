use super::cookies;
use super::origin::ClientContext;
use super::state::AppState;
use crate::error::TokenError;
use crate::metrics;
use crate::refresh::{IssuedCredentials, RefreshRequest};
use axum::extract::rejection::QueryRejection;
use axum::extract::{Query, State};
use axum::http::header::{AUTHORIZATION, CONTENT_TYPE};
use axum::http::HeaderMap;
use axum::response::IntoResponse;
use axum::Json;
use axum_extra::extract::CookieJar;
use rust_common::with_deadline;
use serde::{Deserialize, Serialize};
use tracing::debug;

/// Header carrying the access token on `/api/refresh`.
pub const ACCESS_TOKEN_HEADER: &str = "access_token";

#[derive(Debug, Deserialize)]
pub struct AuthQuery {
    guid: Option<String>,
}

#[derive(Debug, Serialize)]
pub struct TokenBody {
    access_token: String,
}

/// `GET /api/auth?guid=<uuid>`
pub async fn issue(
    State(state): State<AppState>,
    client: ClientContext,
    jar: CookieJar,
    query: Result<Query<AuthQuery>, QueryRejection>,
) -> Result<(CookieJar, Json<TokenBody>), TokenError> {
    let Query(query) = query.map_err(|rejection| {
        debug!(%rejection, "Unparseable auth query");
        TokenError::InvalidGuid
    })?;
    let guid = normalize_guid(query.guid.as_deref())?;

    let principal = with_deadline(
        state.settings.collaborator_timeout,
        "resolver.resolve",
        state.resolver.resolve_principal(&guid),
    )
    .await??;

    let issued = state.issuer.issue(principal, &client.origin).await?;
    Ok(respond(&state, jar, issued))
}

/// `GET /api/refresh`
pub async fn refresh(
    State(state): State<AppState>,
    client: ClientContext,
    headers: HeaderMap,
    jar: CookieJar,
) -> Result<(CookieJar, Json<TokenBody>), TokenError> {
    let access_token = access_token(&headers);
    let refresh_token = cookies::get_refresh_token(&jar);

    let issued = state
        .coordinator
        .rotate(RefreshRequest {
            access_token: access_token.as_deref(),
            refresh_token: refresh_token.as_deref(),
            origin: &client.origin,
            user_agent: &client.user_agent,
        })
        .await?;
    Ok(respond(&state, jar, issued))
}

pub async fn health() -> impl IntoResponse {
    Json(serde_json::json!({ "status": "ok" }))
}

pub async fn render_metrics() -> impl IntoResponse {
    (
        [(CONTENT_TYPE, "text/plain; version=0.0.4")],
        metrics::render(),
    )
}

fn respond(state: &AppState, jar: CookieJar, issued: IssuedCredentials) -> (CookieJar, Json<TokenBody>) {
    let cookie = cookies::refresh_cookie(
        &issued.refresh_token,
        issued.refresh_expires_at,
        state.settings.secure_cookies,
    );
    (
        jar.add(cookie),
        Json(TokenBody {
            access_token: issued.access_token,
        }),
    )
}

/// `access_token` header first, then `Authorization: Bearer`.
fn access_token(headers: &HeaderMap) -> Option<String> {
    if let Some(value) = headers.get(ACCESS_TOKEN_HEADER).and_then(|v| v.to_str().ok()) {
        let value = value.trim();
        if !value.is_empty() {
            return Some(value.to_string());
        }
    }
    headers
        .get(AUTHORIZATION)
        .and_then(|v| v.to_str().ok())
        .and_then(|v| v.strip_prefix("Bearer "))
        .map(str::trim)
        .filter(|v| !v.is_empty())
        .map(str::to_string)
}

/// Lowercase hyphenated form of a GUID query parameter.
fn normalize_guid(raw: Option<&str>) -> Result<String, TokenError> {
    let raw = raw.map(str::trim).filter(|g| !g.is_empty()).ok_or(TokenError::MissingGuid)?;
    let guid = uuid::Uuid::parse_str(raw).map_err(|_| TokenError::InvalidGuid)?;
    Ok(guid.hyphenated().to_string())
}
