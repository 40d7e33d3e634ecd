use chrono::{DateTime, Duration, Utc};
use mongodb::bson::oid::ObjectId;
use serde::{Deserialize, Serialize};

use super::ApiScope;

/// Lifetime of an authorization code.
pub const AUTH_CODE_LIFETIME_SECS: i64 = 30;
pub const AUTH_CODE_LENGTH: usize = 6;

/// Lifetime of an API-client access token (12 hours).
pub const ACCESS_TOKEN_LIFETIME_SECS: i64 = 43_200;
pub const ACCESS_TOKEN_LENGTH: usize = 32;

/// A third-party application registered to act on behalf of users.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ApiClient {
    #[serde(rename = "_id", skip_serializing_if = "Option::is_none")]
    pub id: Option<ObjectId>,
    pub client_id: String,
    pub name: String,
    pub secret_hash: String,
    #[serde(default)]
    pub scopes: Vec<ApiScope>,
    pub redirect_uri: String,
    #[serde(
        default,
        with = "optional_chrono_datetime_as_bson_datetime",
        skip_serializing_if = "Option::is_none"
    )]
    pub last_used: Option<DateTime<Utc>>,
}

impl ApiClient {
    pub fn new(
        client_id: String,
        name: String,
        secret_hash: String,
        scopes: Vec<ApiScope>,
        redirect_uri: String,
    ) -> Self {
        Self {
            id: None,
            client_id,
            name,
            secret_hash,
            scopes,
            redirect_uri,
            last_used: None,
        }
    }
}

/// One-time code binding a client to a user, redeemed for an access token.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AuthCode {
    #[serde(rename = "_id", skip_serializing_if = "Option::is_none")]
    pub id: Option<ObjectId>,
    pub code: String,
    pub client_id: String,
    pub user_id: String,
    #[serde(with = "mongodb::bson::serde_helpers::chrono_datetime_as_bson_datetime")]
    pub issued_at: DateTime<Utc>,
    pub lifetime_secs: i64,
}

impl AuthCode {
    pub fn new(code: String, client_id: &str, user_id: &str, issued_at: DateTime<Utc>) -> Self {
        Self {
            id: None,
            code,
            client_id: client_id.to_string(),
            user_id: user_id.to_string(),
            issued_at,
            lifetime_secs: AUTH_CODE_LIFETIME_SECS,
        }
    }

    pub fn expires_at(&self) -> DateTime<Utc> {
        self.issued_at + Duration::seconds(self.lifetime_secs)
    }

    pub fn is_expired(&self, now: DateTime<Utc>) -> bool {
        now >= self.expires_at()
    }

    /// Codes are exactly six ASCII alphanumerics.
    pub fn is_well_formed(code: &str) -> bool {
        code.len() == AUTH_CODE_LENGTH && code.chars().all(|c| c.is_ascii_alphanumeric())
    }
}

/// Opaque bearer token presented by an API client on behalf of a user.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AccessToken {
    #[serde(rename = "_id", skip_serializing_if = "Option::is_none")]
    pub id: Option<ObjectId>,
    pub token: String,
    pub client_id: String,
    pub user_id: String,
    #[serde(with = "mongodb::bson::serde_helpers::chrono_datetime_as_bson_datetime")]
    pub issued_at: DateTime<Utc>,
    pub lifetime_secs: i64,
}

impl AccessToken {
    pub fn new(token: String, client_id: &str, user_id: &str, issued_at: DateTime<Utc>) -> Self {
        Self {
            id: None,
            token,
            client_id: client_id.to_string(),
            user_id: user_id.to_string(),
            issued_at,
            lifetime_secs: ACCESS_TOKEN_LIFETIME_SECS,
        }
    }

    pub fn expires_at(&self) -> DateTime<Utc> {
        self.issued_at + Duration::seconds(self.lifetime_secs)
    }

    /// Valid at any instant strictly before `issued_at + lifetime`.
    pub fn is_expired(&self, now: DateTime<Utc>) -> bool {
        now >= self.expires_at()
    }
}

pub mod optional_chrono_datetime_as_bson_datetime {
    use chrono::{DateTime, Utc};
    use serde::{Deserialize, Deserializer, Serializer};

    pub fn serialize<S>(val: &Option<DateTime<Utc>>, serializer: S) -> Result<S::Ok, S::Error>
    where
        S: Serializer,
    {
        match val {
            Some(date) => {
                mongodb::bson::serde_helpers::chrono_datetime_as_bson_datetime::serialize(
                    date, serializer,
                )
            }
            None => serializer.serialize_none(),
        }
    }

    pub fn deserialize<'de, D>(deserializer: D) -> Result<Option<DateTime<Utc>>, D::Error>
    where
        D: Deserializer<'de>,
    {
        #[derive(Deserialize)]
        struct Wrapper(
            #[serde(with = "mongodb::bson::serde_helpers::chrono_datetime_as_bson_datetime")]
            DateTime<Utc>,
        );

        let wrapper = Option::<Wrapper>::deserialize(deserializer)?;
        Ok(wrapper.map(|w| w.0))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_auth_code_format() {
        assert!(AuthCode::is_well_formed("aB3dE9"));
        assert!(!AuthCode::is_well_formed("aB3dE"));
        assert!(!AuthCode::is_well_formed("aB3dE9x"));
        assert!(!AuthCode::is_well_formed("aB3-E9"));
    }

    #[test]
    fn test_auth_code_expires_after_thirty_seconds() {
        let issued = Utc::now();
        let code = AuthCode::new("abc123".to_string(), "client", "user", issued);

        assert!(!code.is_expired(issued + Duration::seconds(29)));
        assert!(code.is_expired(issued + Duration::seconds(30)));
    }

    #[test]
    fn test_access_token_boundary() {
        let issued = Utc::now();
        let token = AccessToken::new("t".repeat(32), "client", "user", issued);

        assert!(!token.is_expired(issued + Duration::seconds(ACCESS_TOKEN_LIFETIME_SECS - 1)));
        assert!(token.is_expired(issued + Duration::seconds(ACCESS_TOKEN_LIFETIME_SECS)));
    }
}
