//! Shared setup for conductor-service integration tests.
//!
//! Every test gets its own router backed by the in-memory store, mock
//! email, a scripted identity provider and a manual clock.

#![allow(dead_code)]

use axum::{
    body::Body,
    http::{header, HeaderMap, Request, StatusCode},
    Router,
};
use conductor_service::{
    build_router,
    config::ConductorConfig,
    models::{ApiClient, ApiScope, AuthMethod, Project, Role, RoleAssignment, User},
    services::{
        ConductorStore, ManualClock, MemoryStore, MockEmailService, MockIdentityProvider,
        MockWorkbenchSync,
    },
    utils::{hash_password, Password},
    AppState, Integrations,
};
use std::collections::HashMap;
use std::sync::Arc;
use tower::ServiceExt;

pub const DEPLOYMENT_ORG: &str = "campus";
pub const GLOBAL_ORG: &str = "libretexts";
pub const SESSION_SECRET: &str = "test-session-secret-that-is-long-enough";

pub struct TestApp {
    pub router: Router,
    pub state: AppState,
    pub store: Arc<MemoryStore>,
    pub email: Arc<MockEmailService>,
    pub sso: Arc<MockIdentityProvider>,
    pub workbench: Arc<MockWorkbenchSync>,
    pub clock: Arc<ManualClock>,
}

pub struct TestResponse {
    pub status: StatusCode,
    pub headers: HeaderMap,
    pub body: serde_json::Value,
}

impl TestResponse {
    /// All `Set-Cookie` values as `name=value` pairs.
    pub fn cookies(&self) -> HashMap<String, String> {
        self.headers
            .get_all(header::SET_COOKIE)
            .iter()
            .filter_map(|v| v.to_str().ok())
            .filter_map(|v| v.split(';').next())
            .filter_map(|pair| pair.split_once('='))
            .map(|(k, v)| (k.trim().to_string(), v.trim().to_string()))
            .collect()
    }

    /// The raw `Set-Cookie` header for `name`.
    pub fn set_cookie(&self, name: &str) -> Option<String> {
        self.headers
            .get_all(header::SET_COOKIE)
            .iter()
            .filter_map(|v| v.to_str().ok())
            .find(|v| v.starts_with(&format!("{}=", name)))
            .map(str::to_string)
    }

    pub fn location(&self) -> Option<String> {
        self.headers
            .get(header::LOCATION)
            .and_then(|v| v.to_str().ok())
            .map(str::to_string)
    }
}

pub fn test_config(overrides: &[(&str, &str)]) -> ConductorConfig {
    let mut env: HashMap<String, String> = [
        ("ENVIRONMENT", "dev"),
        ("LOG_LEVEL", "error"),
        ("ORG_ID", DEPLOYMENT_ORG),
        ("GLOBAL_ORG_ID", GLOBAL_ORG),
        ("SESSION_SECRET", SESSION_SECRET),
        ("FRONTEND_URL", "https://conductor.example.com"),
        ("SSO_PROVIDER", "libreone"),
    ]
    .into_iter()
    .map(|(k, v)| (k.to_string(), v.to_string()))
    .collect();
    for (k, v) in overrides {
        env.insert(k.to_string(), v.to_string());
    }

    ConductorConfig::from_lookup(service_core::config::Config::default(), |key| {
        env.get(key).cloned()
    })
    .expect("Failed to build test config")
}

/// Overrides that make [`test_config`] a complete production config.
pub fn prod_overrides() -> Vec<(&'static str, &'static str)> {
    vec![
        ("ENVIRONMENT", "prod"),
        ("SERVICE_NAME", "conductor-service"),
        ("MONGODB_URI", "mongodb://db:27017"),
        ("MONGODB_DATABASE", "conductor"),
        ("SESSION_EXPIRY_SECONDS", "86400"),
        ("COOKIE_PREFIX", "conductor"),
        ("SSO_AUTHORIZE_URL", "https://sso.example.com/authorize"),
        ("SSO_TOKEN_URL", "https://sso.example.com/token"),
        ("SSO_PROFILE_URL", "https://sso.example.com/userinfo"),
        ("SSO_CLIENT_ID", "conductor"),
        ("SSO_CLIENT_SECRET", "shh"),
        ("SSO_REDIRECT_URI", "https://conductor.example.com/oauth/libreone"),
        ("SMTP_HOST", "smtp.example.com"),
        ("SMTP_PORT", "587"),
        ("SMTP_USER", "mailer"),
        ("SMTP_PASSWORD", "pw"),
        ("SMTP_FROM_EMAIL", "conductor@example.com"),
        ("INVITATION_EXPIRY_DAYS", "30"),
        ("ALLOWED_ORIGINS", "https://conductor.example.com"),
        ("RATE_LIMIT_LOGIN_ATTEMPTS", "5"),
        ("RATE_LIMIT_LOGIN_WINDOW_SECONDS", "900"),
    ]
}

impl TestApp {
    pub fn new() -> Self {
        Self::with_config(test_config(&[]))
    }

    pub fn with_config(config: ConductorConfig) -> Self {
        let store = Arc::new(MemoryStore::new());
        let email = Arc::new(MockEmailService::new());
        let sso = Arc::new(MockIdentityProvider::new());
        let workbench = Arc::new(MockWorkbenchSync::new());
        let clock = Arc::new(ManualClock::default());

        let state = AppState::new(
            config,
            Integrations {
                store: store.clone(),
                sso: sso.clone(),
                email: email.clone(),
                workbench: workbench.clone(),
                clock: clock.clone(),
            },
        );
        let router = build_router(state.clone());

        Self {
            router,
            state,
            store,
            email,
            sso,
            workbench,
            clock,
        }
    }

    pub async fn send(&self, request: Request<Body>) -> TestResponse {
        let response = self
            .router
            .clone()
            .oneshot(request)
            .await
            .expect("Router failed");

        let status = response.status();
        let headers = response.headers().clone();
        let bytes = axum::body::to_bytes(response.into_body(), usize::MAX)
            .await
            .expect("Failed to read body");
        let body = if bytes.is_empty() {
            serde_json::Value::Null
        } else {
            serde_json::from_slice(&bytes).unwrap_or(serde_json::Value::Null)
        };

        TestResponse {
            status,
            headers,
            body,
        }
    }

    pub async fn get(&self, uri: &str, auth: Option<&str>) -> TestResponse {
        self.send(request("GET", uri, auth, None)).await
    }

    pub async fn post_json(
        &self,
        uri: &str,
        auth: Option<&str>,
        body: serde_json::Value,
    ) -> TestResponse {
        self.send(request("POST", uri, auth, Some(body))).await
    }

    pub async fn put_json(
        &self,
        uri: &str,
        auth: Option<&str>,
        body: serde_json::Value,
    ) -> TestResponse {
        self.send(request("PUT", uri, auth, Some(body))).await
    }

    pub async fn delete(&self, uri: &str, auth: Option<&str>) -> TestResponse {
        self.send(request("DELETE", uri, auth, None)).await
    }

    /// Insert a password account holding `member` in the deployment org.
    pub async fn create_password_user(&self, name: &str, email: &str, password: &str) -> User {
        let hash = hash_password(&Password::new(password)).expect("Failed to hash password");
        let mut user = User::new(
            name.to_string(),
            email,
            AuthMethod::Password {
                hash: hash.into_string(),
            },
        );
        user.roles
            .push(RoleAssignment::new(DEPLOYMENT_ORG, Role::Member));
        self.store.insert_user(&user).await.expect("Failed to insert user");
        user
    }

    pub async fn create_user_with_roles(&self, name: &str, email: &str, roles: &[(&str, Role)]) -> User {
        let mut user = User::new(
            name.to_string(),
            email,
            AuthMethod::External {
                subject: format!("sub-{}", email),
            },
        );
        user.roles = roles
            .iter()
            .map(|(org, role)| RoleAssignment::new(*org, *role))
            .collect();
        self.store.insert_user(&user).await.expect("Failed to insert user");
        user
    }

    /// `Cookie` header carrying a fresh session for `user_id`.
    pub fn session_cookie(&self, user_id: &str) -> String {
        let session = self
            .state
            .sessions
            .issue(user_id)
            .expect("Failed to issue session");
        let (payload, signature) = session.split().expect("Malformed session token");
        let config = &self.state.config.session;
        format!(
            "{}={}; {}={}",
            config.access_cookie(),
            payload,
            config.signed_cookie(),
            signature
        )
    }

    pub async fn create_api_client(&self, client_id: &str, secret: &str, scopes: &[&str]) -> ApiClient {
        let hash = hash_password(&Password::new(secret)).expect("Failed to hash secret");
        let scopes = scopes
            .iter()
            .map(|s| s.parse::<ApiScope>().expect("Invalid scope"))
            .collect();
        let client = ApiClient::new(
            client_id.to_string(),
            format!("{} app", client_id),
            hash.into_string(),
            scopes,
            format!("https://{}.example.com/callback", client_id),
        );
        self.store
            .insert_api_client(&client)
            .await
            .expect("Failed to insert API client");
        client
    }

    pub async fn create_project(&self, project_id: &str, title: &str, lead: &User) -> Project {
        let mut project = Project::new(project_id, title, DEPLOYMENT_ORG);
        project.leads.push(lead.user_id.clone());
        self.store
            .insert_project(&project)
            .await
            .expect("Failed to insert project");
        project
    }
}

/// Build a request. `auth` starting with `Bearer ` goes in the
/// `Authorization` header; anything else is sent as the `Cookie` header.
pub fn request(
    method: &str,
    uri: &str,
    auth: Option<&str>,
    body: Option<serde_json::Value>,
) -> Request<Body> {
    let mut builder = Request::builder().method(method).uri(uri);

    match auth {
        Some(value) if value.starts_with("Bearer ") => {
            builder = builder.header(header::AUTHORIZATION, value);
        }
        Some(value) => {
            builder = builder.header(header::COOKIE, value);
        }
        None => {}
    }

    match body {
        Some(json) => builder
            .header(header::CONTENT_TYPE, "application/json")
            .body(Body::from(json.to_string()))
            .expect("Failed to build request"),
        None => builder.body(Body::empty()).expect("Failed to build request"),
    }
}

/// Turn `Set-Cookie` pairs from a response into a `Cookie` header value.
pub fn cookie_header(cookies: &HashMap<String, String>, names: &[String]) -> String {
    names
        .iter()
        .filter_map(|name| cookies.get(name).map(|v| format!("{}={}", name, v)))
        .collect::<Vec<_>>()
        .join("; ")
}
