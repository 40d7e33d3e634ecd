use axum::http::Method;
use serde::Serialize;
use std::sync::Arc;

use super::{
    clock::Clock,
    metrics::{outcome, record_auth_event},
    store::ConductorStore,
    ServiceError,
};
use crate::models::{
    api_client::{ACCESS_TOKEN_LENGTH, AUTH_CODE_LENGTH},
    AccessToken, AuthCode, ScopeMethod,
};
use crate::utils::{random_alphanumeric, verify_password, Password, PasswordHashString};

#[derive(Debug, Clone, Serialize)]
pub struct AuthCodeGrant {
    pub code: String,
    pub expires_in: i64,
}

#[derive(Debug, Clone, Serialize)]
pub struct AccessTokenGrant {
    pub access_token: String,
    pub token_type: &'static str,
    pub expires_in: i64,
}

/// The user an API client is acting for.
#[derive(Debug, Clone, PartialEq)]
pub struct ApiClientIdentity {
    pub user_id: String,
    pub client_id: String,
}

/// Issues authorization codes and access tokens to API clients and
/// verifies the tokens on incoming requests.
#[derive(Clone)]
pub struct ApiClientService {
    store: Arc<dyn ConductorStore>,
    clock: Arc<dyn Clock>,
}

impl ApiClientService {
    pub fn new(store: Arc<dyn ConductorStore>, clock: Arc<dyn Clock>) -> Self {
        Self { store, clock }
    }

    pub async fn create_auth_code(
        &self,
        client_id: &str,
        user_id: &str,
    ) -> Result<AuthCodeGrant, ServiceError> {
        let now = self.clock.now();
        let code = AuthCode::new(random_alphanumeric(AUTH_CODE_LENGTH), client_id, user_id, now);

        self.store
            .insert_auth_code(&code)
            .await
            .map_err(ServiceError::database)?;
        self.store
            .touch_api_client(client_id, now)
            .await
            .map_err(ServiceError::database)?;

        tracing::info!(client_id = %client_id, user_id = %user_id, "Authorization code issued");
        Ok(AuthCodeGrant {
            code: code.code,
            expires_in: code.lifetime_secs,
        })
    }

    /// Issue a code for a signed-in user and build the redirect back to the
    /// client's registered URI.
    pub async fn authorize(
        &self,
        client_id: &str,
        redirect_uri: &str,
        user_id: &str,
    ) -> Result<String, ServiceError> {
        let client = self
            .store
            .find_api_client(client_id)
            .await
            .map_err(ServiceError::database)?
            .ok_or(ServiceError::UnknownClient)?;

        if client.redirect_uri != redirect_uri {
            return Err(ServiceError::RedirectUriMismatch);
        }

        let grant = self.create_auth_code(client_id, user_id).await?;
        let separator = if redirect_uri.contains('?') { '&' } else { '?' };
        Ok(format!(
            "{}{}code={}",
            redirect_uri,
            separator,
            urlencoding::encode(&grant.code)
        ))
    }

    /// Redeem an authorization code. A code is redeemable exactly once.
    pub async fn create_access_token(
        &self,
        client_id: &str,
        client_secret: &str,
        code: &str,
    ) -> Result<AccessTokenGrant, ServiceError> {
        let result = self
            .create_access_token_inner(client_id, client_secret, code)
            .await;
        record_auth_event("token_exchange", outcome(&result));
        result
    }

    async fn create_access_token_inner(
        &self,
        client_id: &str,
        client_secret: &str,
        code: &str,
    ) -> Result<AccessTokenGrant, ServiceError> {
        let client = self
            .store
            .find_api_client(client_id)
            .await
            .map_err(ServiceError::database)?
            .ok_or(ServiceError::UnknownClient)?;

        verify_password(
            &Password::new(client_secret),
            &PasswordHashString::new(client.secret_hash.clone()),
        )
        .map_err(|_| {
            tracing::warn!(client_id = %client_id, "API client presented a bad secret");
            ServiceError::InvalidClientSecret
        })?;

        if !AuthCode::is_well_formed(code) {
            return Err(ServiceError::MalformedAuthCode);
        }

        let auth_code = self
            .store
            .find_auth_code(client_id, code)
            .await
            .map_err(ServiceError::database)?
            .ok_or(ServiceError::AuthCodeNotFound)?;

        let now = self.clock.now();
        if auth_code.is_expired(now) {
            return Err(ServiceError::AuthCodeExpired);
        }

        // Deleting first means a concurrent redemption of the same code
        // finds nothing to delete and gets no token.
        let consumed = self
            .store
            .delete_auth_code(client_id, code)
            .await
            .map_err(ServiceError::database)?;
        if !consumed {
            return Err(ServiceError::AuthCodeNotFound);
        }

        let token = AccessToken::new(
            random_alphanumeric(ACCESS_TOKEN_LENGTH),
            client_id,
            &auth_code.user_id,
            now,
        );
        self.store
            .insert_access_token(&token)
            .await
            .map_err(ServiceError::database)?;
        self.store
            .touch_api_client(client_id, now)
            .await
            .map_err(ServiceError::database)?;

        tracing::info!(client_id = %client_id, user_id = %token.user_id, "Access token issued");
        Ok(AccessTokenGrant {
            access_token: token.token,
            token_type: "Bearer",
            expires_in: token.lifetime_secs,
        })
    }

    /// Resolve a bearer token to the user it acts for, requiring a scope
    /// that covers `method` on `resource_prefix`.
    pub async fn verify_access_token(
        &self,
        token: &str,
        method: &Method,
        resource_prefix: &str,
    ) -> Result<ApiClientIdentity, ServiceError> {
        if token.is_empty() {
            return Err(ServiceError::MissingCredentials);
        }

        let access = self
            .store
            .find_access_token(token)
            .await
            .map_err(ServiceError::database)?
            .ok_or(ServiceError::InvalidAccessToken)?;

        if access.is_expired(self.clock.now()) {
            return Err(ServiceError::AccessTokenExpired);
        }

        let client = self
            .store
            .find_api_client(&access.client_id)
            .await
            .map_err(ServiceError::database)?
            .ok_or(ServiceError::InvalidAccessToken)?;

        let granted = ScopeMethod::from_method(method).is_some_and(|m| {
            client
                .scopes
                .iter()
                .any(|scope| scope.grants(m, resource_prefix))
        });
        if !granted {
            tracing::warn!(
                client_id = %client.client_id,
                method = %method,
                resource = %resource_prefix,
                "API client lacks scope"
            );
            return Err(ServiceError::InsufficientScope);
        }

        Ok(ApiClientIdentity {
            user_id: access.user_id,
            client_id: access.client_id,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::{ApiClient, ApiScope};
    use crate::services::{clock::ManualClock, MemoryStore};
    use crate::utils::hash_password;
    use chrono::Duration;

    async fn setup() -> (ApiClientService, Arc<MemoryStore>, Arc<ManualClock>) {
        let store = Arc::new(MemoryStore::new());
        let clock = Arc::new(ManualClock::default());
        let hash = hash_password(&Password::new("client-secret")).unwrap();
        let client = ApiClient::new(
            "client-1".to_string(),
            "Test Client".to_string(),
            hash.into_string(),
            vec![ApiScope::new(ScopeMethod::Get, "/users/me")],
            "https://client.example.com/callback".to_string(),
        );
        store.insert_api_client(&client).await.unwrap();
        let service = ApiClientService::new(store.clone(), clock.clone());
        (service, store, clock)
    }

    #[tokio::test]
    async fn test_code_is_redeemable_once() {
        let (service, _, _) = setup().await;
        let grant = service.create_auth_code("client-1", "user-1").await.unwrap();
        assert_eq!(grant.code.len(), 6);
        assert_eq!(grant.expires_in, 30);

        let token = service
            .create_access_token("client-1", "client-secret", &grant.code)
            .await
            .unwrap();
        assert_eq!(token.access_token.len(), 32);
        assert_eq!(token.expires_in, 43_200);

        let err = service
            .create_access_token("client-1", "client-secret", &grant.code)
            .await
            .unwrap_err();
        assert!(matches!(err, ServiceError::AuthCodeNotFound));
    }

    #[tokio::test]
    async fn test_code_is_bound_to_its_client() {
        let (service, store, _) = setup().await;
        let mut other = store.find_api_client("client-1").await.unwrap().unwrap();
        other.client_id = "client-2".to_string();
        store.insert_api_client(&other).await.unwrap();

        let grant = service.create_auth_code("client-1", "user-1").await.unwrap();
        let err = service
            .create_access_token("client-2", "client-secret", &grant.code)
            .await
            .unwrap_err();
        assert!(matches!(err, ServiceError::AuthCodeNotFound));
    }

    #[tokio::test]
    async fn test_issue_touches_last_used() {
        let (service, store, _) = setup().await;
        service.create_auth_code("client-1", "user-1").await.unwrap();

        let client = store.find_api_client("client-1").await.unwrap().unwrap();
        assert!(client.last_used.is_some());
    }

    #[tokio::test]
    async fn test_expired_code() {
        let (service, _, clock) = setup().await;
        let grant = service.create_auth_code("client-1", "user-1").await.unwrap();
        clock.advance(Duration::seconds(30));

        let err = service
            .create_access_token("client-1", "client-secret", &grant.code)
            .await
            .unwrap_err();
        assert!(matches!(err, ServiceError::AuthCodeExpired));
    }

    #[tokio::test]
    async fn test_access_token_lifetime_and_scope() {
        let (service, _, clock) = setup().await;
        let grant = service.create_auth_code("client-1", "user-1").await.unwrap();
        let token = service
            .create_access_token("client-1", "client-secret", &grant.code)
            .await
            .unwrap();

        let identity = service
            .verify_access_token(&token.access_token, &Method::GET, "/users/me")
            .await
            .unwrap();
        assert_eq!(identity.user_id, "user-1");

        let err = service
            .verify_access_token(&token.access_token, &Method::POST, "/users/me")
            .await
            .unwrap_err();
        assert!(matches!(err, ServiceError::InsufficientScope));

        clock.advance(Duration::seconds(43_199));
        assert!(service
            .verify_access_token(&token.access_token, &Method::GET, "/users/me")
            .await
            .is_ok());

        clock.advance(Duration::seconds(1));
        let err = service
            .verify_access_token(&token.access_token, &Method::GET, "/users/me")
            .await
            .unwrap_err();
        assert!(matches!(err, ServiceError::AccessTokenExpired));
    }

    #[tokio::test]
    async fn test_authorize_requires_registered_redirect() {
        let (service, _, _) = setup().await;

        let err = service
            .authorize("client-1", "https://evil.example.com", "user-1")
            .await
            .unwrap_err();
        assert!(matches!(err, ServiceError::RedirectUriMismatch));

        let url = service
            .authorize("client-1", "https://client.example.com/callback", "user-1")
            .await
            .unwrap();
        assert!(url.starts_with("https://client.example.com/callback?code="));
    }
}
