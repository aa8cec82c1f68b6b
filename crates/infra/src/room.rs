//! Conferencing-room adapter.
//!
//! The access decision is made before any call reaches this seam; a `RoomOperator`
//! only mints join tokens and forcibly disconnects participants.

use async_trait::async_trait;
use chrono::{DateTime, Duration, Utc};
use jsonwebtoken::{encode, EncodingKey, Header};
use serde::{Deserialize, Serialize};
use thiserror::Error;
use tracing::info;

use lessonbay_auth::Principal;
use lessonbay_core::{ClassId, UserId};

#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum RoomError {
    #[error("room provider unavailable: {0}")]
    Unavailable(String),

    #[error("token signing failed: {0}")]
    Signing(String),
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct RoomToken {
    pub url: String,
    pub token: String,
    pub expires_at: DateTime<Utc>,
}

/// Grant embedded in a join token.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RoomGrant {
    pub sub: String,
    pub name: String,
    pub room: String,
    pub can_publish: bool,
    pub iat: i64,
    pub exp: i64,
}

#[async_trait]
pub trait RoomOperator: Send + Sync {
    async fn mint_join_token(
        &self,
        class_id: ClassId,
        principal: &Principal,
        publisher: bool,
        now: DateTime<Utc>,
    ) -> Result<RoomToken, RoomError>;

    async fn remove_participant(&self, class_id: ClassId, user_id: UserId) -> Result<(), RoomError>;
}

/// Signs HS256 join tokens locally; removal is logged only.
pub struct LocalRoomOperator {
    url: String,
    key: EncodingKey,
    ttl: Duration,
}

impl LocalRoomOperator {
    pub fn new(url: impl Into<String>, secret: &[u8], ttl: Duration) -> Self {
        Self {
            url: url.into(),
            key: EncodingKey::from_secret(secret),
            ttl,
        }
    }
}

#[async_trait]
impl RoomOperator for LocalRoomOperator {
    async fn mint_join_token(
        &self,
        class_id: ClassId,
        principal: &Principal,
        publisher: bool,
        now: DateTime<Utc>,
    ) -> Result<RoomToken, RoomError> {
        let expires_at = now + self.ttl;
        let grant = RoomGrant {
            sub: principal.id.to_string(),
            name: principal.display_name.clone(),
            room: class_id.to_string(),
            can_publish: publisher,
            iat: now.timestamp(),
            exp: expires_at.timestamp(),
        };
        let token = encode(&Header::default(), &grant, &self.key).map_err(|e| RoomError::Signing(e.to_string()))?;

        Ok(RoomToken {
            url: self.url.clone(),
            token,
            expires_at,
        })
    }

    async fn remove_participant(&self, class_id: ClassId, user_id: UserId) -> Result<(), RoomError> {
        info!(class_id = %class_id, user_id = %user_id, "participant removed from room");
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use jsonwebtoken::{decode, DecodingKey, Validation};

    use lessonbay_auth::Role;

    use super::*;

    #[tokio::test]
    async fn join_token_carries_room_and_publish_grant() {
        let op = LocalRoomOperator::new("wss://rooms.local", b"room-secret", Duration::hours(2));
        let class = ClassId::new();
        let principal = Principal::new(UserId::new(), "t@example.com", "Teacher", Role::Teacher);
        let now = Utc::now();

        let token = op.mint_join_token(class, &principal, true, now).await.unwrap();

        let mut validation = Validation::default();
        validation.required_spec_claims.clear();
        let grant = decode::<RoomGrant>(&token.token, &DecodingKey::from_secret(b"room-secret"), &validation)
            .unwrap()
            .claims;
        assert_eq!(token.url, "wss://rooms.local");
        assert_eq!(grant.room, class.to_string());
        assert_eq!(grant.sub, principal.id.to_string());
        assert!(grant.can_publish);
        assert_eq!(grant.exp - grant.iat, 7200);
    }
}
