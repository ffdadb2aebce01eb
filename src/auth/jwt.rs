use std::sync::Arc;

use chrono::{DateTime, Duration, Utc};
use doccontrol_auth_api::Role;
use jsonwebtoken::errors::ErrorKind;
use jsonwebtoken::{Algorithm, DecodingKey, EncodingKey, Header, Validation, decode, encode};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::clock::Clock;

#[derive(Debug, thiserror::Error)]
pub enum JwtError {
    #[error("Token generation failed: {0}")]
    GenerationFailed(jsonwebtoken::errors::Error),
    #[error("Malformed token: {0}")]
    Malformed(String),
    #[error("Token signature does not match")]
    BadSignature,
    #[error("Token expired")]
    Expired,
}

#[derive(Debug, Serialize, Deserialize, Clone, PartialEq, Eq)]
pub struct Claims {
    pub sub: Uuid,
    pub role: Role,
    /// Session the token was issued for
    pub sid: Uuid,
    pub jti: Uuid,
    pub iat: i64,
    pub exp: i64,
}

#[derive(Debug, Clone)]
pub struct IssuedAccessToken {
    pub token: String,
    pub token_id: Uuid,
    pub expires_at: DateTime<Utc>,
}

/// Signs and verifies HS256 access tokens.
///
/// Expiry is checked against the injected clock rather than by
/// `jsonwebtoken`, with no leeway: a token is dead from `exp` onwards.
#[derive(Clone)]
pub struct JwtManager {
    encoding_key: EncodingKey,
    decoding_key: DecodingKey,
    validation: Validation,
    ttl: Duration,
    clock: Arc<dyn Clock>,
}

impl JwtManager {
    pub fn new(secret: &str, ttl: Duration, clock: Arc<dyn Clock>) -> Self {
        let mut validation = Validation::new(Algorithm::HS256);
        validation.validate_exp = false;
        validation.leeway = 0;
        validation.set_required_spec_claims(&["exp", "iat", "sub"]);

        Self {
            encoding_key: EncodingKey::from_secret(secret.as_ref()),
            decoding_key: DecodingKey::from_secret(secret.as_ref()),
            validation,
            ttl,
            clock,
        }
    }

    /// Access token lifetime in seconds
    pub fn expires_in(&self) -> i64 {
        self.ttl.num_seconds()
    }

    pub fn issue(
        &self,
        user_id: Uuid,
        role: Role,
        session_id: Uuid,
    ) -> Result<IssuedAccessToken, JwtError> {
        let now = self.clock.now();
        let expires_at = now + self.ttl;
        let token_id = Uuid::new_v4();

        let claims = Claims {
            sub: user_id,
            role,
            sid: session_id,
            jti: token_id,
            iat: now.timestamp(),
            exp: expires_at.timestamp(),
        };

        let token = encode(&Header::new(Algorithm::HS256), &claims, &self.encoding_key)
            .map_err(JwtError::GenerationFailed)?;

        Ok(IssuedAccessToken {
            token,
            token_id,
            expires_at,
        })
    }

    pub fn verify(&self, token: &str) -> Result<Claims, JwtError> {
        let claims = decode::<Claims>(token, &self.decoding_key, &self.validation)
            .map(|data| data.claims)
            .map_err(|e| match e.kind() {
                ErrorKind::InvalidSignature => JwtError::BadSignature,
                _ => JwtError::Malformed(e.to_string()),
            })?;

        if self.clock.now().timestamp() >= claims.exp {
            return Err(JwtError::Expired);
        }

        Ok(claims)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::clock::ManualClock;

    fn make_jwt_manager() -> (JwtManager, Arc<ManualClock>) {
        let clock = Arc::new(ManualClock::new(Utc::now()));
        let jwt = JwtManager::new("my_secret_key_for_tests", Duration::days(7), clock.clone());
        (jwt, clock)
    }

    #[test]
    fn issue_and_verify_round_trips_identity() {
        let (jwt, _) = make_jwt_manager();
        let user_id = Uuid::new_v4();
        let session_id = Uuid::new_v4();

        let issued = jwt
            .issue(user_id, Role::Manager, session_id)
            .expect("Token generation failed");
        let claims = jwt.verify(&issued.token).expect("Token verification failed");

        assert_eq!(claims.sub, user_id);
        assert_eq!(claims.role, Role::Manager);
        assert_eq!(claims.sid, session_id);
        assert_eq!(claims.jti, issued.token_id);
        assert_eq!(claims.exp - claims.iat, Duration::days(7).num_seconds());
    }

    #[test]
    fn every_role_survives_a_round_trip() {
        let (jwt, _) = make_jwt_manager();
        for role in Role::ALL {
            let issued = jwt.issue(Uuid::new_v4(), role, Uuid::new_v4()).unwrap();
            assert_eq!(jwt.verify(&issued.token).unwrap().role, role);
        }
    }

    #[test]
    fn token_is_rejected_from_expiry_onwards() {
        let (jwt, clock) = make_jwt_manager();
        let issued = jwt.issue(Uuid::new_v4(), Role::User, Uuid::new_v4()).unwrap();

        clock.advance(Duration::days(7) - Duration::seconds(1));
        assert!(jwt.verify(&issued.token).is_ok());

        clock.advance(Duration::seconds(1));
        assert!(matches!(jwt.verify(&issued.token), Err(JwtError::Expired)));
    }

    #[test]
    fn token_signed_with_another_secret_is_rejected() {
        let (jwt, clock) = make_jwt_manager();
        let other = JwtManager::new("another_secret", Duration::days(7), clock);
        let issued = other.issue(Uuid::new_v4(), Role::Admin, Uuid::new_v4()).unwrap();

        assert!(matches!(jwt.verify(&issued.token), Err(JwtError::BadSignature)));
    }

    #[test]
    fn tampered_payload_is_rejected() {
        let (jwt, _) = make_jwt_manager();
        let user = jwt.issue(Uuid::new_v4(), Role::User, Uuid::new_v4()).unwrap();
        let admin = jwt.issue(Uuid::new_v4(), Role::Admin, Uuid::new_v4()).unwrap();

        // Splice the admin payload onto the user's signature
        let user_parts: Vec<&str> = user.token.split('.').collect();
        let admin_parts: Vec<&str> = admin.token.split('.').collect();
        let forged = format!("{}.{}.{}", user_parts[0], admin_parts[1], user_parts[2]);

        assert!(jwt.verify(&forged).is_err());
    }

    #[test]
    fn garbage_input_is_malformed() {
        let (jwt, _) = make_jwt_manager();

        assert!(matches!(jwt.verify("invalid.token.here"), Err(JwtError::Malformed(_))));
        assert!(matches!(jwt.verify(""), Err(JwtError::Malformed(_))));
    }
}
