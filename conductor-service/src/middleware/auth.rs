use axum::{
    extract::{FromRequestParts, MatchedPath, Request, State},
    http::{header, request::Parts, HeaderMap, Method},
    middleware::Next,
    response::Response,
};
use axum_extra::extract::cookie::CookieJar;
use service_core::error::AppError;

use crate::config::SessionConfig;
use crate::services::{session::join_cookie_parts, ServiceError, SessionError};
use crate::AppState;

/// How the caller proved who they are.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum AuthSource {
    Session,
    ApiClient { client_id: String },
}

/// Authenticated user attached to the request by [`auth_middleware`].
#[derive(Debug, Clone)]
pub struct RequestUser {
    pub user_id: String,
    pub source: AuthSource,
}

impl RequestUser {
    pub fn is_session(&self) -> bool {
        self.source == AuthSource::Session
    }
}

/// Require a session or an API-client access token.
///
/// `Authorization: Bearer <token>` is an API-client token and is checked
/// against the client's scopes for the matched route. Any other
/// `Authorization` value is a session token. Without the header, the
/// session token is rebuilt from the two session cookies.
pub async fn auth_middleware(
    State(state): State<AppState>,
    mut req: Request,
    next: Next,
) -> Result<Response, AppError> {
    // Owned copies: a borrow of the request must not live across an await.
    let headers = req.headers().clone();
    let method = req.method().clone();
    let route = match req.extensions().get::<MatchedPath>() {
        Some(path) => path.as_str().to_string(),
        None => req.uri().path().to_string(),
    };
    let user = verify_request(&state, headers, method, route).await?;
    tracing::debug!(user_id = %user.user_id, source = ?user.source, "Request authenticated");

    req.extensions_mut().insert(user);
    Ok(next.run(req).await)
}

async fn verify_request(
    state: &AppState,
    headers: HeaderMap,
    method: Method,
    route: String,
) -> Result<RequestUser, ServiceError> {
    let credential =
        credential(&headers, &state.config.session).ok_or(ServiceError::MissingCredentials)?;

    if let Some(token) = credential.strip_prefix("Bearer ") {
        let prefix = resource_prefix(&route);
        let identity = state
            .api_clients
            .verify_access_token(token.trim(), &method, &prefix)
            .await?;
        return Ok(RequestUser {
            user_id: identity.user_id,
            source: AuthSource::ApiClient {
                client_id: identity.client_id,
            },
        });
    }

    let claims = state.sessions.verify(&credential).map_err(|e| match e {
        SessionError::Expired => ServiceError::SessionExpired,
        SessionError::Invalid => ServiceError::InvalidSession,
    })?;

    Ok(RequestUser {
        user_id: claims.sub,
        source: AuthSource::Session,
    })
}

fn credential(headers: &HeaderMap, session: &SessionConfig) -> Option<String> {
    if let Some(value) = headers
        .get(header::AUTHORIZATION)
        .and_then(|v| v.to_str().ok())
        .filter(|v| !v.trim().is_empty())
    {
        return Some(value.to_string());
    }

    let jar = CookieJar::from_headers(headers);
    let payload = jar.get(&session.access_cookie())?;
    let signature = jar.get(&session.signed_cookie())?;
    Some(join_cookie_parts(payload.value(), signature.value()))
}

/// Path segments of a route template up to its first parameter:
/// `/users/:userID/roles` becomes `/users`.
pub fn resource_prefix(route: &str) -> String {
    let segments: Vec<&str> = route
        .split('/')
        .filter(|s| !s.is_empty())
        .take_while(|s| !s.starts_with(':') && !s.starts_with('*'))
        .collect();

    format!("/{}", segments.join("/"))
}

/// Extractor for the user attached by [`auth_middleware`].
pub struct AuthUser(pub RequestUser);

#[axum::async_trait]
impl<S> FromRequestParts<S> for AuthUser
where
    S: Send + Sync,
{
    type Rejection = AppError;

    async fn from_request_parts(parts: &mut Parts, _state: &S) -> Result<Self, Self::Rejection> {
        let user = parts
            .extensions
            .get::<RequestUser>()
            .cloned()
            .ok_or(ServiceError::MissingCredentials)?;

        Ok(AuthUser(user))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_resource_prefix_stops_at_first_parameter() {
        assert_eq!(resource_prefix("/users/me"), "/users/me");
        assert_eq!(resource_prefix("/users/:userID/roles"), "/users");
        assert_eq!(
            resource_prefix("/projects/invitations/:inviteID/accept"),
            "/projects/invitations"
        );
        assert_eq!(resource_prefix("/files/*rest"), "/files");
        assert_eq!(resource_prefix("/:id"), "/");
        assert_eq!(resource_prefix("/"), "/");
    }

    #[test]
    fn test_credential_prefers_authorization_header() {
        let session = SessionConfig {
            secret: secrecy::SecretString::new("s".to_string()),
            expiry_seconds: 60,
            cookie_prefix: "conductor".to_string(),
            cookie_domain: None,
        };

        let mut headers = HeaderMap::new();
        headers.insert(
            header::COOKIE,
            "conductor_access=aaa.bbb; conductor_signed=ccc".parse().unwrap(),
        );
        assert_eq!(credential(&headers, &session).as_deref(), Some("aaa.bbb.ccc"));

        headers.insert(header::AUTHORIZATION, "Bearer xyz".parse().unwrap());
        assert_eq!(credential(&headers, &session).as_deref(), Some("Bearer xyz"));
    }

    #[test]
    fn test_credential_needs_both_cookies() {
        let session = SessionConfig {
            secret: secrecy::SecretString::new("s".to_string()),
            expiry_seconds: 60,
            cookie_prefix: "conductor".to_string(),
            cookie_domain: None,
        };

        let mut headers = HeaderMap::new();
        headers.insert(header::COOKIE, "conductor_access=aaa.bbb".parse().unwrap());
        assert_eq!(credential(&headers, &session), None);
    }
}
