use serde::{Deserialize, Serialize};

use crate::models::{Role, RoleAssignment};

#[derive(Debug, Deserialize)]
pub struct SetRoleRequest {
    pub role: Role,
}

#[derive(Debug, Serialize)]
pub struct UserRolesResponse {
    pub user_id: String,
    pub roles: Vec<RoleAssignment>,
}

#[derive(Debug, Serialize)]
pub struct UserResponse {
    pub user: crate::models::UserProfile,
}
