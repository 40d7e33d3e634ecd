use chrono::{DateTime, Duration, TimeZone, Utc};
use jsonwebtoken::{decode, encode, Algorithm, DecodingKey, EncodingKey, Header, Validation};
use secrecy::ExposeSecret;
use serde::{Deserialize, Serialize};
use std::collections::HashSet;
use std::sync::Arc;

use super::clock::Clock;
use crate::config::SessionConfig;

/// Issues and verifies the HS256 session token behind browser logins.
#[derive(Clone)]
pub struct SessionService {
    encoding_key: EncodingKey,
    decoding_key: DecodingKey,
    expiry_seconds: i64,
    clock: Arc<dyn Clock>,
}

/// Claims carried by a session token.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SessionClaims {
    /// Subject (user ID)
    pub sub: String,
    /// Issued at (Unix timestamp)
    pub iat: i64,
    /// Expiration time (Unix timestamp)
    pub exp: i64,
}

#[derive(Debug, Clone)]
pub struct SessionToken {
    pub token: String,
    pub expires_at: DateTime<Utc>,
}

impl SessionToken {
    /// Split into the `header.payload` part and the signature part carried
    /// by the two session cookies.
    pub fn split(&self) -> Option<(&str, &str)> {
        self.token.rsplit_once('.')
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SessionError {
    Invalid,
    Expired,
}

/// Reassemble a token from its cookie halves.
pub fn join_cookie_parts(payload: &str, signature: &str) -> String {
    format!("{}.{}", payload, signature)
}

impl SessionService {
    pub fn new(config: &SessionConfig, clock: Arc<dyn Clock>) -> Self {
        let secret = config.secret.expose_secret().as_bytes();
        Self {
            encoding_key: EncodingKey::from_secret(secret),
            decoding_key: DecodingKey::from_secret(secret),
            expiry_seconds: config.expiry_seconds,
            clock,
        }
    }

    pub fn expiry_seconds(&self) -> i64 {
        self.expiry_seconds
    }

    /// Sign a session for `user_id` valid for the configured lifetime.
    pub fn issue(&self, user_id: &str) -> Result<SessionToken, anyhow::Error> {
        let now = self.clock.now();
        let expires_at = now + Duration::seconds(self.expiry_seconds);

        let claims = SessionClaims {
            sub: user_id.to_string(),
            iat: now.timestamp(),
            exp: expires_at.timestamp(),
        };

        let token = encode(&Header::new(Algorithm::HS256), &claims, &self.encoding_key)
            .map_err(|e| anyhow::anyhow!("Failed to encode session token: {}", e))?;

        Ok(SessionToken { token, expires_at })
    }

    /// Check the signature, then expiry against the service clock.
    pub fn verify(&self, token: &str) -> Result<SessionClaims, SessionError> {
        let mut validation = Validation::new(Algorithm::HS256);
        // Expiry is compared against the injected clock below.
        validation.validate_exp = false;
        validation.required_spec_claims = HashSet::from(["exp".to_string(), "sub".to_string()]);

        let data = decode::<SessionClaims>(token, &self.decoding_key, &validation).map_err(|e| {
            tracing::debug!(error = %e, "Session token rejected");
            SessionError::Invalid
        })?;

        let expires_at = Utc
            .timestamp_opt(data.claims.exp, 0)
            .single()
            .ok_or(SessionError::Invalid)?;
        if self.clock.now() >= expires_at {
            return Err(SessionError::Expired);
        }

        Ok(data.claims)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::services::clock::ManualClock;
    use secrecy::SecretString;

    fn service(secret: &str, clock: Arc<ManualClock>) -> SessionService {
        let config = SessionConfig {
            secret: SecretString::new(secret.to_string()),
            expiry_seconds: 86_400,
            cookie_prefix: "conductor".to_string(),
            cookie_domain: None,
        };
        SessionService::new(&config, clock)
    }

    #[test]
    fn test_issue_and_verify() {
        let clock = Arc::new(ManualClock::default());
        let sessions = service("test-secret", clock.clone());

        let session = sessions.issue("user-1").unwrap();
        let claims = sessions.verify(&session.token).unwrap();

        assert_eq!(claims.sub, "user-1");
        assert_eq!(claims.exp - claims.iat, 86_400);
        assert_eq!(session.expires_at.timestamp(), claims.exp);
    }

    #[test]
    fn test_expiry_is_distinct_from_invalid() {
        let clock = Arc::new(ManualClock::default());
        let sessions = service("test-secret", clock.clone());
        let session = sessions.issue("user-1").unwrap();

        clock.advance(Duration::seconds(86_399));
        assert!(sessions.verify(&session.token).is_ok());

        clock.advance(Duration::seconds(1));
        assert_eq!(
            sessions.verify(&session.token).unwrap_err(),
            SessionError::Expired
        );
    }

    #[test]
    fn test_foreign_signature_is_invalid() {
        let clock = Arc::new(ManualClock::default());
        let ours = service("test-secret", clock.clone());
        let theirs = service("other-secret", clock);

        let session = theirs.issue("user-1").unwrap();
        assert_eq!(ours.verify(&session.token).unwrap_err(), SessionError::Invalid);
        assert_eq!(ours.verify("not.a.jwt").unwrap_err(), SessionError::Invalid);
    }

    #[test]
    fn test_cookie_parts_rejoin() {
        let clock = Arc::new(ManualClock::default());
        let sessions = service("test-secret", clock);
        let session = sessions.issue("user-1").unwrap();

        let (payload, signature) = session.split().unwrap();
        assert_eq!(payload.matches('.').count(), 1);
        assert!(!signature.contains('.'));

        let rejoined = join_cookie_parts(payload, signature);
        assert_eq!(sessions.verify(&rejoined).unwrap().sub, "user-1");
    }
}
