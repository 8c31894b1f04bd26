use crate::error::TokenError;
use crate::jwt::claims::TokenClaims;
use jsonwebtoken::errors::ErrorKind;
use jsonwebtoken::{decode, encode, Algorithm, DecodingKey, EncodingKey, Header, Validation};
use serde::de::DeserializeOwned;
use serde::Serialize;
use std::fmt;
use subtle::ConstantTimeEq;
use thiserror::Error;
use zeroize::Zeroizing;

/// HMAC-SHA-512: 512-bit tags over the compact JWS payload.
const ALGORITHM: Algorithm = Algorithm::HS512;

/// Why an envelope was rejected.
///
/// Kept coarse on purpose at the HTTP layer: every variant becomes 401.
#[derive(Error, Debug, Clone, Copy, PartialEq, Eq)]
pub enum VerifyError {
    #[error("token malformed")]
    Malformed,

    #[error("token signature invalid")]
    BadSignature,

    #[error("token expired")]
    Expired,

    #[error("token issuer mismatch")]
    WrongIssuer,
}

/// Symmetric key material for one token kind.
#[derive(Clone)]
pub struct SigningKey(Zeroizing<Vec<u8>>);

impl SigningKey {
    /// Shortest accepted key, matching the HMAC-SHA-256 block floor.
    pub const MIN_LEN: usize = 32;

    pub fn new(bytes: impl Into<Vec<u8>>) -> Result<Self, TokenError> {
        let bytes = Zeroizing::new(bytes.into());
        if bytes.len() < Self::MIN_LEN {
            return Err(TokenError::Config(format!(
                "signing key must be at least {} bytes, got {}",
                Self::MIN_LEN,
                bytes.len()
            )));
        }
        Ok(Self(bytes))
    }

    pub fn as_bytes(&self) -> &[u8] {
        &self.0
    }
}

impl PartialEq for SigningKey {
    fn eq(&self, other: &Self) -> bool {
        self.0.as_slice().ct_eq(other.0.as_slice()).into()
    }
}

impl fmt::Debug for SigningKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str("SigningKey([redacted])")
    }
}

/// Signs and verifies one kind of envelope with one key.
pub struct JwtSerializer {
    issuer: String,
    encoding_key: EncodingKey,
    decoding_key: DecodingKey,
    validation: Validation,
}

impl JwtSerializer {
    pub fn new(issuer: impl Into<String>, key: &SigningKey) -> Self {
        let issuer = issuer.into();

        // Expiry is checked by hand below so the boundary is strict and
        // evaluated against the caller's clock.
        let mut validation = Validation::new(ALGORITHM);
        validation.validate_exp = false;
        validation.validate_nbf = false;
        validation.validate_aud = false;
        validation.leeway = 0;
        validation.set_required_spec_claims(&["exp", "iss"]);
        validation.set_issuer(&[issuer.as_str()]);

        JwtSerializer {
            issuer,
            encoding_key: EncodingKey::from_secret(key.as_bytes()),
            decoding_key: DecodingKey::from_secret(key.as_bytes()),
            validation,
        }
    }

    pub fn issuer(&self) -> &str {
        &self.issuer
    }

    pub fn serialize<C>(&self, claims: &C) -> Result<String, TokenError>
    where
        C: TokenClaims + Serialize,
    {
        encode(&Header::new(ALGORITHM), claims, &self.encoding_key)
            .map_err(|e| TokenError::Signing(e.to_string()))
    }

    /// Verify against the current wall-clock time.
    pub fn deserialize<C>(&self, token: &str) -> Result<C, VerifyError>
    where
        C: TokenClaims + DeserializeOwned,
    {
        self.deserialize_at(token, chrono::Utc::now().timestamp())
    }

    pub fn deserialize_at<C>(&self, token: &str, now: i64) -> Result<C, VerifyError>
    where
        C: TokenClaims + DeserializeOwned,
    {
        let data = decode::<C>(token, &self.decoding_key, &self.validation).map_err(|e| {
            match e.kind() {
                ErrorKind::InvalidSignature => VerifyError::BadSignature,
                ErrorKind::InvalidIssuer => VerifyError::WrongIssuer,
                ErrorKind::ExpiredSignature => VerifyError::Expired,
                _ => VerifyError::Malformed,
            }
        })?;
        let claims = data.claims;

        if claims.token_use() != C::USE {
            return Err(VerifyError::Malformed);
        }
        if claims.issuer() != self.issuer {
            return Err(VerifyError::WrongIssuer);
        }
        if !claims.is_valid_at(now) {
            return Err(VerifyError::Expired);
        }

        Ok(claims)
    }
}
