use axum::{
    extract::{Path, Query, State},
    response::Redirect,
};
use axum_extra::extract::cookie::{Cookie, CookieJar, SameSite};
use service_core::error::AppError;
use subtle::ConstantTimeEq;

use super::session::set_session_cookies;
use crate::{dtos::auth::SsoCallbackQuery, services::ServiceError, utils::random_hex, AppState};

const SSO_STATE_MINUTES: i64 = 10;

/// Start an SSO login: remember a random state value and send the browser
/// to the identity provider.
///
/// GET /auth/sso
pub async fn sso_login(State(state): State<AppState>, jar: CookieJar) -> (CookieJar, Redirect) {
    let state_value = random_hex(16);
    let url = state.sso.authorize_url(&state_value);

    let cookie = Cookie::build((state.config.session.sso_state_cookie(), state_value))
        .path("/")
        .http_only(true)
        .secure(state.config.is_prod())
        .same_site(SameSite::Lax)
        .max_age(time::Duration::minutes(SSO_STATE_MINUTES))
        .build();

    (jar.add(cookie), Redirect::to(&url))
}

/// Identity provider callback.
///
/// GET /oauth/:provider
#[tracing::instrument(skip(state, jar, query))]
pub async fn sso_callback(
    State(state): State<AppState>,
    Path(provider): Path<String>,
    jar: CookieJar,
    Query(query): Query<SsoCallbackQuery>,
) -> Result<(CookieJar, Redirect), AppError> {
    if provider != state.config.sso.provider {
        return Err(ServiceError::UnknownProvider.into());
    }

    if query.code.as_deref().map_or(true, str::is_empty) {
        return Err(ServiceError::MissingSsoCode.into());
    }

    let state_cookie = state.config.session.sso_state_cookie();
    let expected = jar.get(&state_cookie).map(|c| c.value().to_string());
    let state_matches = match (expected.as_deref(), query.state.as_deref()) {
        (Some(expected), Some(actual)) => bool::from(expected.as_bytes().ct_eq(actual.as_bytes())),
        _ => false,
    };
    if !state_matches {
        tracing::warn!("SSO callback state mismatch");
        return Err(ServiceError::InvalidSsoState.into());
    }

    let outcome = state.auth_service.complete_sso(query.code.as_deref()).await?;

    let jar = set_session_cookies(jar, &state.config, &outcome.session)?
        .remove(Cookie::build(state_cookie).path("/"));

    Ok((jar, Redirect::to(&state.config.frontend_url)))
}
