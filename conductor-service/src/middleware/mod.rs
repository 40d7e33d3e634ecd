pub mod auth;
pub mod role;

pub use auth::{auth_middleware, resource_prefix, AuthSource, AuthUser, RequestUser};
pub use role::{require_role, RoleRequirement};
