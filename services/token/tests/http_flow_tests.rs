//! End-to-end tests through the axum router.

use async_trait::async_trait;
use axum::body::Body;
use axum::extract::ConnectInfo;
use axum::http::header::{AUTHORIZATION, CONTENT_TYPE, COOKIE, SET_COOKIE, USER_AGENT};
use axum::http::{Request, Response, StatusCode};
use axum::Router;
use http_body_util::BodyExt;
use parking_lot::Mutex;
use session_token::http::{router, AppState, ACCESS_TOKEN_HEADER, REFRESH_COOKIE_NAME};
use session_token::jwt::{AccessClaims, JwtSerializer, PrincipalId, SigningKey};
use session_token::notify::{Notifier, NotifyError};
use session_token::storage::{InMemorySessionStore, StaticResolver};
use session_token::{Config, TokenError};
use std::collections::HashMap;
use std::net::SocketAddr;
use std::sync::Arc;
use std::time::Duration;
use tower::ServiceExt;

const GUID: &str = "da92d676-1fa8-479f-84ac-68e0a6f0460f";
const ACCESS_KEY: &str = "http-flow-tests-access-signing-key-0001";
const REFRESH_KEY: &str = "http-flow-tests-refresh-signing-key-001";
const HOME: &str = "203.0.113.9:40000";

#[derive(Default)]
struct RecordingNotifier {
    sent: Mutex<Vec<(String, String)>>,
    fail: bool,
    stall: Option<Duration>,
}

#[async_trait]
impl Notifier for RecordingNotifier {
    async fn send(&self, address: &str, message: &str) -> Result<(), NotifyError> {
        if let Some(stall) = self.stall {
            tokio::time::sleep(stall).await;
        }
        if self.fail {
            return Err(NotifyError::Rejected(502));
        }
        self.sent.lock().push((address.to_string(), message.to_string()));
        Ok(())
    }
}

struct TestApp {
    router: Router,
    notifier: Arc<RecordingNotifier>,
}

fn config(extra: &[(&str, &str)]) -> Config {
    let mut vars: HashMap<String, String> = [
        ("ACCESS_KEY", ACCESS_KEY),
        ("REFRESH_KEY", REFRESH_KEY),
        ("HASH_MEMORY_KIB", "64"),
        ("HASH_ITERATIONS", "1"),
        ("ANOMALY_NOTIFY_ADDRESS", "owner@example.com"),
    ]
    .into_iter()
    .map(|(k, v)| (k.to_string(), v.to_string()))
    .collect();
    for (k, v) in extra {
        vars.insert((*k).to_string(), (*v).to_string());
    }
    Config::from_source(|name| vars.get(name).cloned()).unwrap()
}

fn app_with(notifier: RecordingNotifier, extra: &[(&str, &str)]) -> TestApp {
    app_from_config(notifier, &config(extra))
}

fn app_from_config(notifier: RecordingNotifier, config: &Config) -> TestApp {
    let notifier = Arc::new(notifier);
    let state = AppState::new(
        config,
        Arc::new(InMemorySessionStore::new()),
        Arc::new(StaticResolver::new([(GUID, PrincipalId(7))])),
        notifier.clone(),
    )
    .unwrap();

    TestApp {
        router: router(state),
        notifier,
    }
}

fn app() -> TestApp {
    app_with(RecordingNotifier::default(), &[])
}

fn get(uri: &str) -> axum::http::request::Builder {
    Request::builder().method("GET").uri(uri).header(USER_AGENT, "flow-test/1.0")
}

async fn send(app: &TestApp, builder: axum::http::request::Builder, peer: &str) -> Response<Body> {
    let mut request = builder.body(Body::empty()).unwrap();
    let addr: SocketAddr = peer.parse().unwrap();
    request.extensions_mut().insert(ConnectInfo(addr));
    app.router.clone().oneshot(request).await.unwrap()
}

async fn json_body(response: Response<Body>) -> serde_json::Value {
    let bytes = response.into_body().collect().await.unwrap().to_bytes();
    serde_json::from_slice(&bytes).unwrap()
}

fn refresh_cookie(response: &Response<Body>) -> (String, String) {
    let header = response
        .headers()
        .get(SET_COOKIE)
        .expect("refresh cookie set")
        .to_str()
        .unwrap()
        .to_string();
    let value = header
        .split(';')
        .next()
        .and_then(|pair| pair.trim().strip_prefix(&format!("{REFRESH_COOKIE_NAME}=")))
        .unwrap()
        .to_string();
    (value, header)
}

/// Issue a pair for the seeded principal from `peer`.
async fn issue(app: &TestApp, peer: &str) -> (String, String) {
    let response = send(app, get(&format!("/api/auth?guid={GUID}")), peer).await;
    assert_eq!(response.status(), StatusCode::OK);
    let (refresh, _) = refresh_cookie(&response);
    let body = json_body(response).await;
    (body["access_token"].as_str().unwrap().to_string(), refresh)
}

fn refresh_request(access: &str, refresh: &str) -> axum::http::request::Builder {
    get("/api/refresh")
        .header(ACCESS_TOKEN_HEADER, access)
        .header(COOKIE, format!("{REFRESH_COOKIE_NAME}={refresh}"))
}

#[tokio::test]
async fn test_issue_returns_access_body_and_refresh_cookie() {
    let app = app();
    let response = send(&app, get(&format!("/api/auth?guid={GUID}")), HOME).await;
    assert_eq!(response.status(), StatusCode::OK);

    let (_, header) = refresh_cookie(&response);
    assert!(header.contains("HttpOnly"));
    assert!(header.contains("SameSite=Strict"));
    assert!(header.contains("Path=/api/refresh"));
    assert!(header.contains("Secure"));
    assert!(header.contains("Expires="));

    let body = json_body(response).await;
    let access = body["access_token"].as_str().unwrap();
    let serializer = JwtSerializer::new("authApp", &SigningKey::new(ACCESS_KEY.as_bytes().to_vec()).unwrap());
    let claims: AccessClaims = serializer.deserialize(access).unwrap();
    assert_eq!(claims.user_id, PrincipalId(7));
    assert_eq!(claims.origin, "203.0.113.9");
    assert_eq!(claims.exp - claims.iat, 30 * 60);
}

#[tokio::test]
async fn test_guid_is_case_insensitive() {
    let app = app();
    let uri = format!("/api/auth?guid={}", GUID.to_uppercase());
    let response = send(&app, get(&uri), HOME).await;
    assert_eq!(response.status(), StatusCode::OK);
}

#[tokio::test]
async fn test_issue_rejects_bad_guid() {
    let app = app();

    for uri in [
        "/api/auth".to_string(),
        "/api/auth?guid=".to_string(),
        "/api/auth?guid=not-a-guid".to_string(),
        "/api/auth?guid=0b7c7a0e-5a4e-4c0b-9f7e-3f1f2b9d8c11".to_string(),
    ] {
        let response = send(&app, get(&uri), HOME).await;
        assert_eq!(response.status(), StatusCode::BAD_REQUEST, "{uri}");
        assert!(response.headers().get(SET_COOKIE).is_none());
    }
}

#[tokio::test]
async fn test_issue_rejects_unparseable_query_as_json() {
    let app = app();
    let uri = format!("/api/auth?guid={GUID}&guid={GUID}");

    let response = send(&app, get(&uri), HOME).await;
    assert_eq!(response.status(), StatusCode::BAD_REQUEST);
    assert!(response.headers().get(SET_COOKIE).is_none());
    assert_eq!(
        json_body(response).await,
        serde_json::json!({ "error": TokenError::InvalidGuid.public_message() })
    );
}

#[tokio::test]
async fn test_issue_then_refresh_then_replay() {
    let app = app();
    let (access, refresh) = issue(&app, HOME).await;

    let response = send(&app, refresh_request(&access, &refresh), HOME).await;
    assert_eq!(response.status(), StatusCode::OK);
    let (new_refresh, _) = refresh_cookie(&response);
    assert_ne!(new_refresh, refresh);
    let body = json_body(response).await;
    assert_ne!(body["access_token"].as_str().unwrap(), access);

    let replay = send(&app, refresh_request(&access, &refresh), HOME).await;
    assert_eq!(replay.status(), StatusCode::UNAUTHORIZED);
    assert_eq!(json_body(replay).await, serde_json::json!({ "error": "unauthorized" }));
}

#[tokio::test]
async fn test_refresh_accepts_bearer_header() {
    let app = app();
    let (access, refresh) = issue(&app, HOME).await;

    let builder = get("/api/refresh")
        .header(AUTHORIZATION, format!("Bearer {access}"))
        .header(COOKIE, format!("{REFRESH_COOKIE_NAME}={refresh}"));
    let response = send(&app, builder, HOME).await;
    assert_eq!(response.status(), StatusCode::OK);
}

#[tokio::test]
async fn test_refresh_missing_credentials() {
    let app = app();
    let (access, refresh) = issue(&app, HOME).await;

    let no_cookie = get("/api/refresh").header(ACCESS_TOKEN_HEADER, access.as_str());
    let response = send(&app, no_cookie, HOME).await;
    assert_eq!(response.status(), StatusCode::BAD_REQUEST);
    assert_eq!(json_body(response).await, serde_json::json!({ "error": "missing credentials" }));

    let no_access = get("/api/refresh").header(COOKIE, format!("{REFRESH_COOKIE_NAME}={refresh}"));
    let response = send(&app, no_access, HOME).await;
    assert_eq!(response.status(), StatusCode::BAD_REQUEST);
}

#[tokio::test]
async fn test_refresh_with_garbage_tokens() {
    let app = app();
    let response = send(&app, refresh_request("abc.def.ghi", "xyz"), HOME).await;
    assert_eq!(response.status(), StatusCode::UNAUTHORIZED);
    assert_eq!(json_body(response).await, serde_json::json!({ "error": "unauthorized" }));
}

#[tokio::test]
async fn test_refresh_from_new_origin_notifies() {
    let app = app();
    let (access, refresh) = issue(&app, HOME).await;

    let response = send(&app, refresh_request(&access, &refresh), "198.51.100.20:5555").await;
    assert_eq!(response.status(), StatusCode::OK);

    let sent = app.notifier.sent.lock().clone();
    assert_eq!(sent.len(), 1);
    assert_eq!(sent[0].0, "owner@example.com");
    assert!(sent[0].1.contains("198.51.100.20"));
    assert!(sent[0].1.contains("flow-test/1.0"));
}

#[tokio::test]
async fn test_same_ip_new_port_is_same_origin() {
    let app = app();
    let (access, refresh) = issue(&app, HOME).await;

    let response = send(&app, refresh_request(&access, &refresh), "203.0.113.9:61000").await;
    assert_eq!(response.status(), StatusCode::OK);
    assert!(app.notifier.sent.lock().is_empty());
}

#[tokio::test]
async fn test_notifier_failure_fails_closed() {
    let app = app_with(RecordingNotifier { fail: true, ..Default::default() }, &[]);
    let (access, refresh) = issue(&app, HOME).await;

    let response = send(&app, refresh_request(&access, &refresh), "198.51.100.20:5555").await;
    assert_eq!(response.status(), StatusCode::INTERNAL_SERVER_ERROR);
    assert!(response.headers().get(SET_COOKIE).is_none());
    assert_eq!(json_body(response).await, serde_json::json!({ "error": "internal error" }));

    // The pair was not consumed.
    let response = send(&app, refresh_request(&access, &refresh), HOME).await;
    assert_eq!(response.status(), StatusCode::OK);
}

#[tokio::test]
async fn test_request_deadline_is_internal_error() {
    let mut config = config(&[("COLLABORATOR_TIMEOUT_MS", "5000"), ("REQUEST_TIMEOUT_SECS", "30")]);
    config.request_timeout = Duration::from_millis(500);
    let app = app_from_config(
        RecordingNotifier { stall: Some(Duration::from_secs(3)), ..Default::default() },
        &config,
    );
    let (access, refresh) = issue(&app, HOME).await;

    let response = send(&app, refresh_request(&access, &refresh), "198.51.100.20:5555").await;
    assert_eq!(response.status(), StatusCode::INTERNAL_SERVER_ERROR);
    assert!(response.headers().get(SET_COOKIE).is_none());
    assert_eq!(json_body(response).await, serde_json::json!({ "error": "internal error" }));

    // The cut-off rotation never reached its write.
    let response = send(&app, refresh_request(&access, &refresh), HOME).await;
    assert_eq!(response.status(), StatusCode::OK);
}

#[tokio::test]
async fn test_notifier_failure_fail_open() {
    let app = app_with(
        RecordingNotifier { fail: true, ..Default::default() },
        &[("ANOMALY_POLICY", "fail-open")],
    );
    let (access, refresh) = issue(&app, HOME).await;

    let response = send(&app, refresh_request(&access, &refresh), "198.51.100.20:5555").await;
    assert_eq!(response.status(), StatusCode::OK);
}

#[tokio::test]
async fn test_forwarded_for_when_trusted() {
    let app = app_with(RecordingNotifier::default(), &[("TRUST_FORWARDED_FOR", "true")]);
    let builder = get(&format!("/api/auth?guid={GUID}")).header("x-forwarded-for", "192.0.2.44, 10.0.0.1");
    let response = send(&app, builder, "10.0.0.1:8080").await;
    assert_eq!(response.status(), StatusCode::OK);

    let body = json_body(response).await;
    let serializer = JwtSerializer::new("authApp", &SigningKey::new(ACCESS_KEY.as_bytes().to_vec()).unwrap());
    let claims: AccessClaims = serializer.deserialize(body["access_token"].as_str().unwrap()).unwrap();
    assert_eq!(claims.origin, "192.0.2.44");
}

#[tokio::test]
async fn test_reissue_invalidates_previous_pair() {
    let app = app();
    let (old_access, old_refresh) = issue(&app, HOME).await;
    let (access, refresh) = issue(&app, HOME).await;

    let stale = send(&app, refresh_request(&old_access, &old_refresh), HOME).await;
    assert_eq!(stale.status(), StatusCode::UNAUTHORIZED);

    let fresh = send(&app, refresh_request(&access, &refresh), HOME).await;
    assert_eq!(fresh.status(), StatusCode::OK);
}

#[tokio::test]
async fn test_health_and_metrics() {
    let app = app();

    let response = send(&app, get("/health"), HOME).await;
    assert_eq!(response.status(), StatusCode::OK);
    assert_eq!(json_body(response).await, serde_json::json!({ "status": "ok" }));

    issue(&app, HOME).await;
    let response = send(&app, get("/metrics"), HOME).await;
    assert_eq!(response.status(), StatusCode::OK);
    assert!(response
        .headers()
        .get(CONTENT_TYPE)
        .and_then(|v| v.to_str().ok())
        .is_some_and(|v| v.starts_with("text/plain")));
    let bytes = response.into_body().collect().await.unwrap().to_bytes();
    assert!(String::from_utf8_lossy(&bytes).contains("session_token_tokens_issued_total"));
}
