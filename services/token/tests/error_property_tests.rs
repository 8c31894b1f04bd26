//! Property-based tests for error handling.
//!
//! Property 11: Error Classification and Mapping
//! Property 12: Internal Details Not Exposed

use axum::http::StatusCode;
use axum::response::IntoResponse;
use http_body_util::BodyExt;
use proptest::prelude::*;
use session_token::error::ErrorKind;
use session_token::jwt::VerifyError;
use session_token::TokenError;

/// Arbitrary error message generator
fn arb_error_message() -> impl Strategy<Value = String> {
    "[a-zA-Z0-9 .:]{1,100}"
}

fn arb_verify_error() -> impl Strategy<Value = VerifyError> {
    prop_oneof![
        Just(VerifyError::Malformed),
        Just(VerifyError::BadSignature),
        Just(VerifyError::Expired),
        Just(VerifyError::WrongIssuer),
    ]
}

fn arb_auth_error() -> impl Strategy<Value = TokenError> {
    prop_oneof![
        arb_verify_error().prop_map(TokenError::Verify),
        Just(TokenError::TokenMismatch),
        Just(TokenError::SessionMissing),
        Just(TokenError::RefreshReused),
        Just(TokenError::RefreshExpired),
        Just(TokenError::ConcurrentRotation),
    ]
}

fn arb_internal_error() -> impl Strategy<Value = TokenError> {
    arb_error_message().prop_flat_map(|msg| {
        prop_oneof![
            Just(TokenError::Storage(msg.clone())),
            Just(TokenError::Resolver(msg.clone())),
            Just(TokenError::Hashing(msg.clone())),
            Just(TokenError::Signing(msg.clone())),
            Just(TokenError::Notification(msg.clone())),
            Just(TokenError::Timeout(msg.clone())),
            Just(TokenError::Config(msg.clone())),
            Just(TokenError::Internal(msg)),
        ]
    })
}

async fn body_of(err: TokenError) -> (StatusCode, serde_json::Value) {
    let response = err.into_response();
    let status = response.status();
    let bytes = response.into_body().collect().await.unwrap().to_bytes();
    (status, serde_json::from_slice(&bytes).unwrap())
}

proptest! {
    #![proptest_config(ProptestConfig::with_cases(100))]

    /// Property 11: every authentication failure is a 401 with the same body,
    /// whichever check failed.
    #[test]
    fn prop_auth_failures_indistinguishable(err in arb_auth_error()) {
        prop_assert_eq!(err.kind(), ErrorKind::Auth);

        let rt = tokio::runtime::Runtime::new().unwrap();
        let (status, body) = rt.block_on(body_of(err));
        prop_assert_eq!(status, StatusCode::UNAUTHORIZED);
        prop_assert_eq!(body, serde_json::json!({ "error": "unauthorized" }));
    }

    /// Property 12: internal failures are a 500 and never echo their detail.
    #[test]
    fn prop_internal_details_not_exposed(err in arb_internal_error()) {
        prop_assert_eq!(err.kind(), ErrorKind::Internal);
        let detail = err.to_string();

        let rt = tokio::runtime::Runtime::new().unwrap();
        let (status, body) = rt.block_on(body_of(err));
        prop_assert_eq!(status, StatusCode::INTERNAL_SERVER_ERROR);
        prop_assert_eq!(&body, &serde_json::json!({ "error": "internal error" }));
        prop_assert!(!body.to_string().contains(&detail));
    }
}

#[test]
fn test_validation_errors_name_the_input() {
    assert_eq!(
        TokenError::MissingGuid.public_message(),
        "Request must have query param `guid`"
    );
    assert_eq!(
        TokenError::UnknownPrincipal.public_message(),
        "Unknown value of query param `guid`"
    );
    assert_eq!(
        TokenError::MissingCredential("refresh_token").public_message(),
        "missing credentials"
    );
    assert_eq!(TokenError::InvalidGuid.status(), StatusCode::BAD_REQUEST);
}
