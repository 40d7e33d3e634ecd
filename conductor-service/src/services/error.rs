use service_core::error::AppError;
use thiserror::Error;

#[derive(Error, Debug)]
pub enum ServiceError {
    #[error("Database error: {0}")]
    Database(anyhow::Error),

    #[error("Internal server error: {0}")]
    Internal(#[from] anyhow::Error),

    #[error("Validation error: {0}")]
    ValidationError(String),

    // Sessions
    #[error("Invalid credentials")]
    InvalidCredentials,

    #[error("Email already registered")]
    EmailAlreadyRegistered,

    #[error("Authentication required")]
    MissingCredentials,

    #[error("Invalid session")]
    InvalidSession,

    #[error("Session expired")]
    SessionExpired,

    #[error("User not found")]
    UserNotFound,

    // SSO
    #[error("Missing authorization code")]
    MissingSsoCode,

    #[error("Invalid SSO state")]
    InvalidSsoState,

    #[error("Unknown identity provider")]
    UnknownProvider,

    #[error("Identity provider token exchange failed")]
    SsoTokenExchange(anyhow::Error),

    #[error("Identity provider profile fetch failed")]
    SsoProfileFetch(anyhow::Error),

    #[error("Account uses a different authentication method")]
    AuthMethodMismatch,

    // Roles
    #[error("Insufficient role")]
    InsufficientRole,

    // API clients
    #[error("Unknown API client")]
    UnknownClient,

    #[error("Invalid client credentials")]
    InvalidClientSecret,

    #[error("Redirect URI does not match the registered URI")]
    RedirectUriMismatch,

    #[error("Malformed authorization code")]
    MalformedAuthCode,

    #[error("Authorization code not found")]
    AuthCodeNotFound,

    #[error("Authorization code expired")]
    AuthCodeExpired,

    #[error("Invalid access token")]
    InvalidAccessToken,

    #[error("Access token expired")]
    AccessTokenExpired,

    #[error("Insufficient scope")]
    InsufficientScope,

    // Projects and invitations
    #[error("Project not found")]
    ProjectNotFound,

    #[error("Only project leads and liaisons can manage invitations")]
    NotProjectAdmin,

    #[error("Invitation not found")]
    InvitationNotFound,

    #[error("Invitation has expired")]
    InvitationExpired,

    #[error("Invitation has already been accepted")]
    InvitationAlreadyAccepted,
}

impl ServiceError {
    pub fn database(err: impl Into<anyhow::Error>) -> Self {
        ServiceError::Database(err.into())
    }
}

impl From<ServiceError> for AppError {
    fn from(err: ServiceError) -> Self {
        let msg = anyhow::anyhow!(err.to_string());
        match err {
            ServiceError::Database(e) => AppError::DatabaseError(e),
            ServiceError::Internal(e) => AppError::InternalError(e),
            ServiceError::ValidationError(e) => AppError::BadRequest(anyhow::anyhow!(e)),

            ServiceError::MissingSsoCode
            | ServiceError::InvalidSsoState
            | ServiceError::MalformedAuthCode
            | ServiceError::RedirectUriMismatch => AppError::BadRequest(msg),

            ServiceError::InvalidCredentials
            | ServiceError::MissingCredentials
            | ServiceError::InvalidSession
            | ServiceError::SessionExpired
            | ServiceError::SsoTokenExchange(_)
            | ServiceError::InsufficientRole
            | ServiceError::UnknownClient
            | ServiceError::InvalidAccessToken
            | ServiceError::AccessTokenExpired => AppError::Unauthorized(msg),

            ServiceError::InvalidClientSecret
            | ServiceError::AuthCodeExpired
            | ServiceError::InsufficientScope
            | ServiceError::NotProjectAdmin
            | ServiceError::InvitationNotFound => AppError::Forbidden(msg),

            ServiceError::UnknownProvider
            | ServiceError::UserNotFound
            | ServiceError::AuthCodeNotFound
            | ServiceError::ProjectNotFound
            | ServiceError::InvitationExpired => AppError::NotFound(msg),

            ServiceError::EmailAlreadyRegistered
            | ServiceError::AuthMethodMismatch
            | ServiceError::InvitationAlreadyAccepted => AppError::Conflict(msg),

            ServiceError::SsoProfileFetch(_) => AppError::BadGateway(msg.to_string()),
        }
    }
}
