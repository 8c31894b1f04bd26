use serde::{Deserialize, Serialize};
use std::fmt;

/// Internal principal identifier, resolved from an external GUID.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct PrincipalId(pub i64);

impl fmt::Display for PrincipalId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// Which half of a credential pair a token is.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum TokenUse {
    /// Short-lived credential presented to APIs
    Access,
    /// Long-lived credential used only to rotate the pair
    Refresh,
}

impl TokenUse {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Access => "access",
            Self::Refresh => "refresh",
        }
    }
}

/// Fields every signed envelope carries, whatever its kind.
pub trait TokenClaims {
    /// The kind a decoded payload must declare.
    const USE: TokenUse;

    fn issuer(&self) -> &str;
    fn token_use(&self) -> TokenUse;
    fn expires_at(&self) -> i64;

    /// Valid strictly before `exp`.
    fn is_valid_at(&self, timestamp: i64) -> bool {
        timestamp < self.expires_at()
    }
}

/// Claims of an access token.
///
/// `iid` links the token to the refresh token minted in the same issuance.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct AccessClaims {
    pub iss: String,
    pub token_use: TokenUse,
    pub user_id: PrincipalId,
    pub origin: String,
    pub iid: String,
    pub exp: i64,
    pub iat: i64,
}

/// Claims of a refresh token.
///
/// `rid` is the raw refresh secret; only its Argon2 hash is stored server-side.
#[derive(Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct RefreshClaims {
    pub iss: String,
    pub token_use: TokenUse,
    pub user_id: PrincipalId,
    pub rid: String,
    pub origin: String,
    pub iid: String,
    pub exp: i64,
    pub iat: i64,
}

impl fmt::Debug for RefreshClaims {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("RefreshClaims")
            .field("iss", &self.iss)
            .field("token_use", &self.token_use)
            .field("user_id", &self.user_id)
            .field("rid", &"[redacted]")
            .field("origin", &self.origin)
            .field("iid", &self.iid)
            .field("exp", &self.exp)
            .field("iat", &self.iat)
            .finish()
    }
}

impl TokenClaims for AccessClaims {
    const USE: TokenUse = TokenUse::Access;

    fn issuer(&self) -> &str {
        &self.iss
    }

    fn token_use(&self) -> TokenUse {
        self.token_use
    }

    fn expires_at(&self) -> i64 {
        self.exp
    }
}

impl TokenClaims for RefreshClaims {
    const USE: TokenUse = TokenUse::Refresh;

    fn issuer(&self) -> &str {
        &self.iss
    }

    fn token_use(&self) -> TokenUse {
        self.token_use
    }

    fn expires_at(&self) -> i64 {
        self.exp
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn access(exp: i64) -> AccessClaims {
        AccessClaims {
            iss: "authApp".to_string(),
            token_use: TokenUse::Access,
            user_id: PrincipalId(7),
            origin: "10.0.0.1".to_string(),
            iid: "issuance-1".to_string(),
            exp,
            iat: exp - 1800,
        }
    }

    #[test]
    fn test_expiry_boundary_is_exclusive() {
        let claims = access(1_000);
        assert!(claims.is_valid_at(999));
        assert!(!claims.is_valid_at(1_000));
        assert!(!claims.is_valid_at(1_001));
    }

    #[test]
    fn test_unknown_fields_rejected() {
        let json = r#"{"iss":"authApp","token_use":"access","user_id":7,"origin":"10.0.0.1",
            "iid":"x","exp":10,"iat":1,"admin":true}"#;
        assert!(serde_json::from_str::<AccessClaims>(json).is_err());
    }

    #[test]
    fn test_mistyped_principal_rejected() {
        let json = r#"{"iss":"authApp","token_use":"access","user_id":"7","origin":"10.0.0.1",
            "iid":"x","exp":10,"iat":1}"#;
        assert!(serde_json::from_str::<AccessClaims>(json).is_err());
    }

    #[test]
    fn test_refresh_debug_hides_secret() {
        let claims = RefreshClaims {
            iss: "authApp".to_string(),
            token_use: TokenUse::Refresh,
            user_id: PrincipalId(7),
            rid: "super-secret-value".to_string(),
            origin: "10.0.0.1".to_string(),
            iid: "issuance-1".to_string(),
            exp: 10,
            iat: 1,
        };
        assert!(!format!("{claims:?}").contains("super-secret-value"));
    }
}
