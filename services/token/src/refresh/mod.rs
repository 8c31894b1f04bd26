pub mod anomaly;
pub mod generator;
pub mod issuer;
pub mod rotator;
pub mod session;

pub use anomaly::{AnomalyDetector, NotifyPolicy};
pub use generator::{HashConfig, HashError, RefreshTokenGenerator, SecretHasher};
pub use issuer::{CredentialIssuer, IssuedCredentials, IssuerSettings};
pub use rotator::{RefreshRequest, RotationCoordinator, RotationStage};
pub use session::SessionRecord;
