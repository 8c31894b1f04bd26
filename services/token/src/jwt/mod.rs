pub mod claims;
pub mod serializer;

pub use claims::{AccessClaims, PrincipalId, RefreshClaims, TokenClaims, TokenUse};
pub use serializer::{JwtSerializer, SigningKey, VerifyError};
