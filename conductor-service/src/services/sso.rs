//! External identity provider (OAuth2 authorization-code flow).

use async_trait::async_trait;
use secrecy::ExposeSecret;
use serde::Deserialize;
use std::collections::HashMap;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Mutex;
use std::time::Duration;

use crate::config::SsoConfig;

/// Identity asserted by the provider.
#[derive(Debug, Clone, PartialEq)]
pub struct SsoProfile {
    pub subject: String,
    pub email: String,
    pub name: String,
    pub avatar: Option<String>,
}

#[async_trait]
pub trait IdentityProvider: Send + Sync {
    /// Where to send the browser to start a login.
    fn authorize_url(&self, state: &str) -> String;

    /// Trade an authorization code for a provider access token.
    async fn exchange_code(&self, code: &str) -> Result<String, anyhow::Error>;

    async fn fetch_profile(&self, access_token: &str) -> Result<SsoProfile, anyhow::Error>;
}

#[derive(Debug, Deserialize)]
struct TokenResponse {
    access_token: String,
}

#[derive(Debug, Deserialize)]
struct UserInfo {
    sub: String,
    email: String,
    name: Option<String>,
    given_name: Option<String>,
    family_name: Option<String>,
    picture: Option<String>,
}

impl From<UserInfo> for SsoProfile {
    fn from(info: UserInfo) -> Self {
        let name = info.name.unwrap_or_else(|| {
            [info.given_name, info.family_name]
                .into_iter()
                .flatten()
                .collect::<Vec<_>>()
                .join(" ")
        });
        Self {
            subject: info.sub,
            email: info.email,
            name,
            avatar: info.picture,
        }
    }
}

pub struct OidcProvider {
    client: reqwest::Client,
    config: SsoConfig,
}

impl OidcProvider {
    pub fn new(config: &SsoConfig) -> Result<Self, anyhow::Error> {
        let client = reqwest::Client::builder()
            .timeout(Duration::from_secs(10))
            .build()?;
        Ok(Self {
            client,
            config: config.clone(),
        })
    }
}

#[async_trait]
impl IdentityProvider for OidcProvider {
    fn authorize_url(&self, state: &str) -> String {
        format!(
            "{}?client_id={}&redirect_uri={}&response_type=code&scope=openid%20email%20profile&state={}",
            self.config.authorize_url,
            urlencoding::encode(&self.config.client_id),
            urlencoding::encode(&self.config.redirect_uri),
            urlencoding::encode(state),
        )
    }

    async fn exchange_code(&self, code: &str) -> Result<String, anyhow::Error> {
        let response = self
            .client
            .post(&self.config.token_url)
            .form(&[
                ("grant_type", "authorization_code"),
                ("code", code),
                ("redirect_uri", self.config.redirect_uri.as_str()),
                ("client_id", self.config.client_id.as_str()),
                ("client_secret", self.config.client_secret.expose_secret().as_str()),
            ])
            .send()
            .await?;

        if !response.status().is_success() {
            let status = response.status();
            let body = response.text().await.unwrap_or_default();
            anyhow::bail!("Token endpoint returned {}: {}", status, body);
        }

        let token: TokenResponse = response.json().await?;
        Ok(token.access_token)
    }

    async fn fetch_profile(&self, access_token: &str) -> Result<SsoProfile, anyhow::Error> {
        let response = self
            .client
            .get(&self.config.profile_url)
            .bearer_auth(access_token)
            .send()
            .await?;

        if !response.status().is_success() {
            anyhow::bail!("Userinfo endpoint returned {}", response.status());
        }

        let info: UserInfo = response.json().await?;
        Ok(info.into())
    }
}

/// Scripted provider: codes registered with [`MockIdentityProvider::register`]
/// exchange for a token that resolves to the registered profile.
#[derive(Default)]
pub struct MockIdentityProvider {
    profiles: Mutex<HashMap<String, SsoProfile>>,
    fail_profile: AtomicBool,
}

impl MockIdentityProvider {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn register(&self, code: &str, profile: SsoProfile) {
        if let Ok(mut profiles) = self.profiles.lock() {
            profiles.insert(code.to_string(), profile);
        }
    }

    pub fn fail_profile_fetch(&self, fail: bool) {
        self.fail_profile.store(fail, Ordering::SeqCst);
    }
}

#[async_trait]
impl IdentityProvider for MockIdentityProvider {
    fn authorize_url(&self, state: &str) -> String {
        format!("https://sso.test/authorize?state={}", urlencoding::encode(state))
    }

    async fn exchange_code(&self, code: &str) -> Result<String, anyhow::Error> {
        let profiles = self
            .profiles
            .lock()
            .map_err(|e| anyhow::anyhow!("Mock provider mutex poisoned: {}", e))?;
        if profiles.contains_key(code) {
            Ok(format!("token-{}", code))
        } else {
            anyhow::bail!("invalid_grant")
        }
    }

    async fn fetch_profile(&self, access_token: &str) -> Result<SsoProfile, anyhow::Error> {
        if self.fail_profile.load(Ordering::SeqCst) {
            anyhow::bail!("userinfo unavailable");
        }
        let code = access_token
            .strip_prefix("token-")
            .ok_or_else(|| anyhow::anyhow!("unknown token"))?;
        self.profiles
            .lock()
            .map_err(|e| anyhow::anyhow!("Mock provider mutex poisoned: {}", e))?
            .get(code)
            .cloned()
            .ok_or_else(|| anyhow::anyhow!("unknown token"))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use secrecy::SecretString;

    #[test]
    fn test_userinfo_name_falls_back_to_given_and_family() {
        let info: UserInfo = serde_json::from_value(serde_json::json!({
            "sub": "abc",
            "email": "ada@example.com",
            "given_name": "Ada",
            "family_name": "Lovelace"
        }))
        .unwrap();

        let profile = SsoProfile::from(info);
        assert_eq!(profile.name, "Ada Lovelace");
        assert_eq!(profile.avatar, None);
    }

    #[test]
    fn test_authorize_url_encodes_parameters() {
        let provider = OidcProvider::new(&SsoConfig {
            provider: "libreone".to_string(),
            authorize_url: "https://sso.example.com/authorize".to_string(),
            token_url: "https://sso.example.com/token".to_string(),
            profile_url: "https://sso.example.com/userinfo".to_string(),
            client_id: "conductor".to_string(),
            client_secret: SecretString::new("s".to_string()),
            redirect_uri: "https://conductor.example.com/oauth/libreone".to_string(),
        })
        .unwrap();

        let url = provider.authorize_url("xyz");
        assert!(url.starts_with("https://sso.example.com/authorize?client_id=conductor"));
        assert!(url.contains("redirect_uri=https%3A%2F%2Fconductor.example.com%2Foauth%2Flibreone"));
        assert!(url.ends_with("&state=xyz"));
    }
}
