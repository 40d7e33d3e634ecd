//! Services layer for conductor-service.
//!
//! Business logic for sessions, SSO, API-client tokens, role checks and
//! project invitations, plus the store and outbound integrations they use.

pub mod api_clients;
pub mod auth;
pub mod authz;
pub mod clock;
mod database;
pub mod email;
pub mod error;
pub mod invitations;
mod memory;
pub mod metrics;
pub mod outbox;
pub mod session;
pub mod sso;
pub mod store;
pub mod workbench;

pub use api_clients::{AccessTokenGrant, ApiClientIdentity, ApiClientService, AuthCodeGrant};
pub use auth::{AuthOutcome, AuthService};
pub use authz::{can_manage_project, check_has_role, is_global_super_admin, AuthzContext};
pub use clock::{Clock, ManualClock, SystemClock};
pub use database::MongoDb;
pub use email::{EmailProvider, EmailService, InvitationEmail, MockEmailService, TeamJoinedEmail};
pub use error::ServiceError;
pub use invitations::{
    AcceptOutcome, InvitationPage, InvitationService, InvitationSettings, InvitationView,
    MembershipOutcome,
};
pub use memory::MemoryStore;
pub use outbox::Outbox;
pub use session::{SessionClaims, SessionError, SessionService, SessionToken};
pub use sso::{IdentityProvider, MockIdentityProvider, OidcProvider, SsoProfile};
pub use store::ConductorStore;
pub use workbench::{MockWorkbenchSync, TeamPermission, WorkbenchSync};
