use axum::{
    extract::{Request, State},
    middleware::Next,
    response::Response,
};
use service_core::error::AppError;

use super::auth::RequestUser;
use crate::models::Role;
use crate::services::{check_has_role, ServiceError};
use crate::AppState;

/// Organization role a route requires.
#[derive(Debug, Clone)]
pub struct RoleRequirement {
    pub org: String,
    pub role: Role,
}

impl RoleRequirement {
    pub fn new(org: impl Into<String>, role: Role) -> Self {
        Self {
            org: org.into(),
            role,
        }
    }
}

/// Must run after [`super::auth_middleware`]. Rejects with 401 when the
/// user does not hold the required role.
pub async fn require_role(
    State((state, requirement)): State<(AppState, RoleRequirement)>,
    req: Request,
    next: Next,
) -> Result<Response, AppError> {
    let request_user = req
        .extensions()
        .get::<RequestUser>()
        .cloned()
        .ok_or(ServiceError::MissingCredentials)?;
    let user = state.auth_service.get_user(&request_user.user_id).await?;

    if !check_has_role(&state.authz, &user.roles, &requirement.org, requirement.role) {
        tracing::warn!(
            user_id = %user.user_id,
            org = %requirement.org,
            role = %requirement.role,
            "Missing required role"
        );
        return Err(ServiceError::InsufficientRole.into());
    }

    Ok(next.run(req).await)
}
