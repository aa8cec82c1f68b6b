use async_trait::async_trait;
use chrono::{DateTime, Utc};
use jsonwebtoken::{errors::ErrorKind, Algorithm, DecodingKey, Validation};
use serde::{Deserialize, Serialize};
use thiserror::Error;

use lessonbay_core::UserId;

/// Bearer token claims as issued by the identity provider.
///
/// `name` and `role` are provider metadata: hints only, never authoritative once a
/// local user record exists.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct IdentityClaims {
    /// Subject / external user identifier.
    pub sub: UserId,

    pub email: String,

    #[serde(default)]
    pub name: Option<String>,

    #[serde(default)]
    pub role: Option<String>,

    /// Issued-at, seconds since the Unix epoch.
    pub iat: i64,

    /// Expiration, seconds since the Unix epoch.
    pub exp: i64,
}

/// What the identity provider vouches for after a credential has been verified.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ProviderIdentity {
    pub id: UserId,
    pub email: String,
    pub display_name_hint: Option<String>,
    pub role_hint: Option<String>,
}

impl From<IdentityClaims> for ProviderIdentity {
    fn from(claims: IdentityClaims) -> Self {
        Self {
            id: claims.sub,
            email: claims.email,
            display_name_hint: claims.name,
            role_hint: claims.role,
        }
    }
}

#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum TokenValidationError {
    #[error("token has expired")]
    Expired,

    #[error("token not yet valid (iat is in the future)")]
    NotYetValid,

    #[error("invalid token time window (exp <= iat)")]
    InvalidTimeWindow,
}

#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum CredentialError {
    #[error("credential missing")]
    Missing,

    #[error("credential malformed: {0}")]
    Malformed(String),

    #[error("credential rejected: {0}")]
    Rejected(String),

    #[error(transparent)]
    Claims(#[from] TokenValidationError),

    /// The provider could not be consulted. Not evidence that the credential is bad.
    #[error("identity provider unavailable: {0}")]
    Unavailable(String),
}

/// Deterministically validate the claim time window.
///
/// Note: this validates the *claims* only. Signature verification happens in the
/// [`CredentialVerifier`] implementation.
pub fn validate_claims(claims: &IdentityClaims, now: DateTime<Utc>) -> Result<(), TokenValidationError> {
    let now = now.timestamp();
    if claims.exp <= claims.iat {
        return Err(TokenValidationError::InvalidTimeWindow);
    }
    if now < claims.iat {
        return Err(TokenValidationError::NotYetValid);
    }
    if now >= claims.exp {
        return Err(TokenValidationError::Expired);
    }
    Ok(())
}

/// External credential verification contract.
#[async_trait]
pub trait CredentialVerifier: Send + Sync {
    async fn verify(&self, token: &str, now: DateTime<Utc>) -> Result<ProviderIdentity, CredentialError>;
}

/// Verifies HS256-signed bearer tokens with a shared secret.
pub struct Hs256CredentialVerifier {
    key: DecodingKey,
    validation: Validation,
}

impl Hs256CredentialVerifier {
    pub fn new(secret: impl AsRef<[u8]>) -> Self {
        let mut validation = Validation::new(Algorithm::HS256);
        // Time checks go through `validate_claims` so they use the caller's clock.
        validation.validate_exp = false;
        validation.validate_aud = false;
        validation.required_spec_claims.clear();

        Self {
            key: DecodingKey::from_secret(secret.as_ref()),
            validation,
        }
    }

    pub fn decode(&self, token: &str, now: DateTime<Utc>) -> Result<IdentityClaims, CredentialError> {
        if token.trim().is_empty() {
            return Err(CredentialError::Missing);
        }

        let data = jsonwebtoken::decode::<IdentityClaims>(token, &self.key, &self.validation).map_err(|e| {
            match e.kind() {
                ErrorKind::InvalidSignature | ErrorKind::InvalidAlgorithm | ErrorKind::ImmatureSignature => {
                    CredentialError::Rejected(e.to_string())
                }
                _ => CredentialError::Malformed(e.to_string()),
            }
        })?;

        validate_claims(&data.claims, now)?;
        Ok(data.claims)
    }
}

#[async_trait]
impl CredentialVerifier for Hs256CredentialVerifier {
    async fn verify(&self, token: &str, now: DateTime<Utc>) -> Result<ProviderIdentity, CredentialError> {
        self.decode(token, now).map(ProviderIdentity::from)
    }
}

#[cfg(test)]
mod tests {
    use chrono::TimeZone;
    use jsonwebtoken::{EncodingKey, Header};

    use super::*;

    fn now() -> DateTime<Utc> {
        Utc.with_ymd_and_hms(2025, 3, 1, 9, 0, 0).unwrap()
    }

    fn claims(iat: i64, exp: i64) -> IdentityClaims {
        IdentityClaims {
            sub: UserId::new(),
            email: "bob@example.com".to_string(),
            name: Some("Bob".to_string()),
            role: Some("teacher".to_string()),
            iat,
            exp,
        }
    }

    fn mint(secret: &str, claims: &IdentityClaims) -> String {
        jsonwebtoken::encode(
            &Header::new(Algorithm::HS256),
            claims,
            &EncodingKey::from_secret(secret.as_bytes()),
        )
        .unwrap()
    }

    #[test]
    fn time_window_checks() {
        let t = now().timestamp();
        assert_eq!(validate_claims(&claims(t, t), now()), Err(TokenValidationError::InvalidTimeWindow));
        assert_eq!(validate_claims(&claims(t + 10, t + 60), now()), Err(TokenValidationError::NotYetValid));
        assert_eq!(validate_claims(&claims(t - 60, t), now()), Err(TokenValidationError::Expired));
        assert_eq!(validate_claims(&claims(t - 60, t + 1), now()), Ok(()));
    }

    #[test]
    fn decodes_valid_token() {
        let t = now().timestamp();
        let c = claims(t - 5, t + 600);
        let verifier = Hs256CredentialVerifier::new("secret");

        let decoded = verifier.decode(&mint("secret", &c), now()).unwrap();
        assert_eq!(decoded, c);
    }

    #[test]
    fn wrong_secret_is_rejected() {
        let t = now().timestamp();
        let token = mint("other", &claims(t - 5, t + 600));
        let verifier = Hs256CredentialVerifier::new("secret");

        assert!(matches!(verifier.decode(&token, now()), Err(CredentialError::Rejected(_))));
    }

    #[test]
    fn garbage_and_empty_tokens() {
        let verifier = Hs256CredentialVerifier::new("secret");
        assert_eq!(verifier.decode("  ", now()), Err(CredentialError::Missing));
        assert!(matches!(verifier.decode("not.a.jwt", now()), Err(CredentialError::Malformed(_))));
    }

    #[tokio::test]
    async fn verify_maps_claims_to_provider_identity() {
        let t = now().timestamp();
        let c = claims(t - 5, t + 600);
        let verifier = Hs256CredentialVerifier::new("secret");

        let identity = verifier.verify(&mint("secret", &c), now()).await.unwrap();
        assert_eq!(identity.id, c.sub);
        assert_eq!(identity.role_hint.as_deref(), Some("teacher"));
        assert_eq!(identity.display_name_hint.as_deref(), Some("Bob"));
    }
}
