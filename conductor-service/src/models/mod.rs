pub mod api_client;
pub mod invitation;
pub mod project;
pub mod role;
pub mod user;

pub use api_client::{AccessToken, ApiClient, AuthCode};
pub use invitation::{InvitationStatus, ProjectInvitation};
pub use project::Project;
pub use role::{ApiScope, ProjectRole, Role, ScopeMethod};
pub use user::{normalize_email, AuthMethod, RoleAssignment, User, UserProfile};
