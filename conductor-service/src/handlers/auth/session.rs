use axum::{extract::State, Json};
use axum_extra::extract::cookie::{Cookie, CookieJar, SameSite};
use service_core::error::AppError;

use crate::{
    config::ConductorConfig,
    dtos::{
        auth::{LoginRequest, RegisterRequest, SessionResponse},
        Envelope, MessageResponse,
    },
    services::{AuthOutcome, SessionToken},
    utils::ValidatedJson,
    AppState,
};

/// Login with email and password.
///
/// POST /auth/login
#[tracing::instrument(skip_all)]
pub async fn login(
    State(state): State<AppState>,
    jar: CookieJar,
    ValidatedJson(req): ValidatedJson<LoginRequest>,
) -> Result<(CookieJar, Json<Envelope<SessionResponse>>), AppError> {
    let outcome = state.auth_service.login(&req.email, &req.password).await?;
    session_response(&state, jar, outcome)
}

/// Create a password account and sign it in.
///
/// POST /auth/register
#[tracing::instrument(skip_all)]
pub async fn register(
    State(state): State<AppState>,
    jar: CookieJar,
    ValidatedJson(req): ValidatedJson<RegisterRequest>,
) -> Result<(CookieJar, Json<Envelope<SessionResponse>>), AppError> {
    let outcome = state
        .auth_service
        .register(&req.name, &req.email, &req.password)
        .await?;
    session_response(&state, jar, outcome)
}

/// Drop the session cookies. Tokens are not tracked server-side, so this
/// needs no authentication.
///
/// POST /auth/logout
pub async fn logout(
    State(state): State<AppState>,
    jar: CookieJar,
) -> (CookieJar, Json<Envelope<MessageResponse>>) {
    let jar = clear_session_cookies(jar, &state.config);
    (
        jar,
        Json(Envelope::ok(MessageResponse::new("Logged out successfully"))),
    )
}

pub(crate) fn session_response(
    state: &AppState,
    jar: CookieJar,
    outcome: AuthOutcome,
) -> Result<(CookieJar, Json<Envelope<SessionResponse>>), AppError> {
    let jar = set_session_cookies(jar, &state.config, &outcome.session)?;
    Ok((
        jar,
        Json(Envelope::ok(SessionResponse {
            user: outcome.user.sanitized(),
            expires_in: state.sessions.expiry_seconds(),
        })),
    ))
}

/// Store the token as two cookies: `header.payload` in the access cookie
/// (readable by the web app) and the signature in the signed cookie
/// (HttpOnly in production).
pub(crate) fn set_session_cookies(
    jar: CookieJar,
    config: &ConductorConfig,
    session: &SessionToken,
) -> Result<CookieJar, AppError> {
    let (payload, signature) = session.split().ok_or_else(|| {
        AppError::InternalError(anyhow::anyhow!("Issued session token is malformed"))
    })?;
    let is_prod = config.is_prod();

    let access = session_cookie(config, config.session.access_cookie(), payload.to_string(), false);
    let signed = session_cookie(config, config.session.signed_cookie(), signature.to_string(), is_prod);

    Ok(jar.add(access).add(signed))
}

pub(crate) fn clear_session_cookies(jar: CookieJar, config: &ConductorConfig) -> CookieJar {
    // Always emit the expired cookies, even if the request carried none.
    let expired = |name: String| {
        let mut cookie = session_cookie(config, name, String::new(), false);
        cookie.make_removal();
        cookie
    };
    jar.add(expired(config.session.access_cookie()))
        .add(expired(config.session.signed_cookie()))
}

fn session_cookie(
    config: &ConductorConfig,
    name: String,
    value: String,
    http_only: bool,
) -> Cookie<'static> {
    let mut cookie = Cookie::build((name, value))
        .path("/")
        .http_only(http_only)
        .secure(config.is_prod())
        .same_site(SameSite::Lax)
        .max_age(time::Duration::seconds(config.session.expiry_seconds));

    if let Some(domain) = &config.session.cookie_domain {
        cookie = cookie.domain(domain.clone());
    }

    cookie.build()
}
