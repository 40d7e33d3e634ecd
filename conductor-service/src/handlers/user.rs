use axum::{
    extract::{Path, State},
    Json,
};
use service_core::error::AppError;

use crate::dtos::{
    users::{SetRoleRequest, UserResponse, UserRolesResponse},
    Envelope,
};
use crate::middleware::AuthUser;
use crate::AppState;

/// GET /users/me
pub async fn get_me(
    State(state): State<AppState>,
    AuthUser(user): AuthUser,
) -> Result<Json<Envelope<UserResponse>>, AppError> {
    let user = state.auth_service.get_user(&user.user_id).await?;
    Ok(Json(Envelope::ok(UserResponse {
        user: user.sanitized(),
    })))
}

/// GET /users/:userID/roles (campus admins)
pub async fn get_user_roles(
    State(state): State<AppState>,
    Path(user_id): Path<String>,
) -> Result<Json<Envelope<UserRolesResponse>>, AppError> {
    let user = state.auth_service.get_user(&user_id).await?;
    Ok(Json(Envelope::ok(UserRolesResponse {
        user_id: user.user_id,
        roles: user.roles,
    })))
}

/// PUT /users/:userID/roles (campus admins)
#[tracing::instrument(skip(state, requester))]
pub async fn set_user_role(
    State(state): State<AppState>,
    AuthUser(requester): AuthUser,
    Path(user_id): Path<String>,
    Json(req): Json<SetRoleRequest>,
) -> Result<Json<Envelope<UserRolesResponse>>, AppError> {
    let user = state
        .auth_service
        .set_deployment_role(&user_id, req.role)
        .await?;

    tracing::info!(
        requester = %requester.user_id,
        user_id = %user.user_id,
        role = %req.role,
        "Deployment role changed"
    );
    Ok(Json(Envelope::ok(UserRolesResponse {
        user_id: user.user_id,
        roles: user.roles,
    })))
}
