//! Authorization-code flow for registered API clients.

use axum::{
    extract::{Query, State},
    response::Redirect,
    Json,
};
use service_core::error::AppError;

use crate::{
    dtos::{
        auth::{AuthorizeQuery, TokenRequest},
        Envelope,
    },
    middleware::AuthUser,
    services::AccessTokenGrant,
    utils::ValidatedJson,
    AppState,
};

/// Issue an authorization code for the signed-in user and redirect back to
/// the client.
///
/// GET /oauth2/authorize?client_id=&redirect_uri=
#[tracing::instrument(skip(state, user), fields(client_id = %query.client_id))]
pub async fn authorize(
    State(state): State<AppState>,
    AuthUser(user): AuthUser,
    Query(query): Query<AuthorizeQuery>,
) -> Result<Redirect, AppError> {
    if !user.is_session() {
        return Err(AppError::Forbidden(anyhow::anyhow!(
            "Authorization requires a user session"
        )));
    }

    let url = state
        .api_clients
        .authorize(&query.client_id, &query.redirect_uri, &user.user_id)
        .await?;
    Ok(Redirect::to(&url))
}

/// Exchange an authorization code for an access token.
///
/// POST /auth/token
#[tracing::instrument(skip_all, fields(client_id = %req.client_id))]
pub async fn token(
    State(state): State<AppState>,
    ValidatedJson(req): ValidatedJson<TokenRequest>,
) -> Result<Json<Envelope<AccessTokenGrant>>, AppError> {
    let grant = state
        .api_clients
        .create_access_token(&req.client_id, &req.client_secret, &req.code)
        .await?;
    Ok(Json(Envelope::ok(grant)))
}
