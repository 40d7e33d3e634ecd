//! Role authorization.
//!
//! A user holds `(org, role)` when any of these is true:
//!
//! * they have the exact assignment;
//! * they are a super-admin of the global organization;
//! * `org` is this deployment's organization and they are its campus-admin.

use crate::models::{Project, Role, RoleAssignment, User};

/// Organization identities the overrides are evaluated against.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AuthzContext {
    pub deployment_org: String,
    pub global_org: String,
}

impl AuthzContext {
    pub fn new(deployment_org: impl Into<String>, global_org: impl Into<String>) -> Self {
        Self {
            deployment_org: deployment_org.into(),
            global_org: global_org.into(),
        }
    }
}

pub fn check_has_role(
    ctx: &AuthzContext,
    roles: &[RoleAssignment],
    org: &str,
    role: Role,
) -> bool {
    roles.iter().any(|a| {
        (a.org == org && a.role == role)
            || (a.org == ctx.global_org && a.role == Role::SuperAdmin)
            || (org == ctx.deployment_org
                && a.org == ctx.deployment_org
                && a.role == Role::CampusAdmin)
    })
}

pub fn is_global_super_admin(ctx: &AuthzContext, user: &User) -> bool {
    check_has_role(ctx, &user.roles, &ctx.global_org, Role::SuperAdmin)
}

/// Leads, liaisons and global super-admins may manage a project's
/// invitations and team.
pub fn can_manage_project(ctx: &AuthzContext, user: &User, project: &Project) -> bool {
    project.role_of(&user.user_id).is_some_and(|r| r.is_admin()) || is_global_super_admin(ctx, user)
}
