use std::sync::Arc;

use super::{
    authz::AuthzContext,
    metrics::{outcome, record_auth_event},
    session::{SessionService, SessionToken},
    sso::IdentityProvider,
    store::ConductorStore,
    ServiceError,
};
use crate::models::{normalize_email, AuthMethod, Role, RoleAssignment, User};
use crate::utils::{equalize_verification_time, hash_password, verify_password, Password, PasswordHashString};

/// A user together with the session just issued for them.
#[derive(Debug, Clone)]
pub struct AuthOutcome {
    pub user: User,
    pub session: SessionToken,
}

#[derive(Clone)]
pub struct AuthService {
    store: Arc<dyn ConductorStore>,
    sessions: SessionService,
    sso: Arc<dyn IdentityProvider>,
    authz: AuthzContext,
}

impl AuthService {
    pub fn new(
        store: Arc<dyn ConductorStore>,
        sessions: SessionService,
        sso: Arc<dyn IdentityProvider>,
        authz: AuthzContext,
    ) -> Self {
        Self {
            store,
            sessions,
            sso,
            authz,
        }
    }

    /// Password login. Every failure is reported as `InvalidCredentials`.
    pub async fn login(&self, email: &str, password: &str) -> Result<AuthOutcome, ServiceError> {
        let result = self.login_inner(email, password).await;
        record_auth_event("login", outcome(&result));
        result
    }

    async fn login_inner(&self, email: &str, password: &str) -> Result<AuthOutcome, ServiceError> {
        let email = normalize_email(email);
        let password = Password::new(password);

        let user = self
            .store
            .find_user_by_email(&email)
            .await
            .map_err(ServiceError::database)?;

        let hash = match user.as_ref().map(|u| &u.auth) {
            Some(AuthMethod::Password { hash }) => PasswordHashString::new(hash.clone()),
            _ => {
                equalize_verification_time(&password);
                tracing::info!("Login failed: no password account for email");
                return Err(ServiceError::InvalidCredentials);
            }
        };

        if verify_password(&password, &hash).is_err() {
            tracing::info!("Login failed: password mismatch");
            return Err(ServiceError::InvalidCredentials);
        }

        let user = user.ok_or(ServiceError::InvalidCredentials)?;
        let user = self.ensure_org_membership(user).await?;
        let session = self.sessions.issue(&user.user_id)?;

        tracing::info!(user_id = %user.user_id, "User logged in");
        Ok(AuthOutcome { user, session })
    }

    pub async fn register(
        &self,
        name: &str,
        email: &str,
        password: &str,
    ) -> Result<AuthOutcome, ServiceError> {
        let email = normalize_email(email);

        if self
            .store
            .find_user_by_email(&email)
            .await
            .map_err(ServiceError::database)?
            .is_some()
        {
            return Err(ServiceError::EmailAlreadyRegistered);
        }

        let hash = hash_password(&Password::new(password))?;
        let mut user = User::new(
            name.trim().to_string(),
            &email,
            AuthMethod::Password {
                hash: hash.into_string(),
            },
        );
        user.roles
            .push(RoleAssignment::new(&self.authz.deployment_org, Role::Member));

        self.store
            .insert_user(&user)
            .await
            .map_err(ServiceError::database)?;

        let session = self.sessions.issue(&user.user_id)?;
        record_auth_event("register", "success");
        tracing::info!(user_id = %user.user_id, "User registered");
        Ok(AuthOutcome { user, session })
    }

    /// Complete an SSO login from the provider's authorization code.
    pub async fn complete_sso(&self, code: Option<&str>) -> Result<AuthOutcome, ServiceError> {
        let result = self.complete_sso_inner(code).await;
        record_auth_event("sso", outcome(&result));
        result
    }

    async fn complete_sso_inner(&self, code: Option<&str>) -> Result<AuthOutcome, ServiceError> {
        let code = code
            .filter(|c| !c.is_empty())
            .ok_or(ServiceError::MissingSsoCode)?;

        let access_token = self.sso.exchange_code(code).await.map_err(|e| {
            tracing::warn!(error = %e, "SSO token exchange failed");
            ServiceError::SsoTokenExchange(e)
        })?;

        let profile = self.sso.fetch_profile(&access_token).await.map_err(|e| {
            tracing::warn!(error = %e, "SSO profile fetch failed");
            ServiceError::SsoProfileFetch(e)
        })?;

        let email = normalize_email(&profile.email);
        let existing = self
            .store
            .find_user_by_email(&email)
            .await
            .map_err(ServiceError::database)?;

        let user = match existing {
            Some(mut user) => {
                match &user.auth {
                    AuthMethod::External { subject } if *subject == profile.subject => {}
                    _ => {
                        tracing::info!(user_id = %user.user_id, "SSO login for account bound to another method");
                        return Err(ServiceError::AuthMethodMismatch);
                    }
                }

                let avatar = if user.custom_avatar {
                    None
                } else {
                    profile.avatar.as_deref()
                };
                self.store
                    .update_user_profile(&user.user_id, &profile.name, avatar)
                    .await
                    .map_err(ServiceError::database)?;

                user.name = profile.name.clone();
                if let Some(avatar) = avatar {
                    user.avatar = Some(avatar.to_string());
                }
                self.ensure_org_membership(user).await?
            }
            None => {
                let mut user = User::new(
                    profile.name.clone(),
                    &email,
                    AuthMethod::External {
                        subject: profile.subject.clone(),
                    },
                );
                user.avatar = profile.avatar.clone();
                user.roles
                    .push(RoleAssignment::new(&self.authz.deployment_org, Role::Member));
                self.store
                    .insert_user(&user)
                    .await
                    .map_err(ServiceError::database)?;
                tracing::info!(user_id = %user.user_id, "User created from SSO profile");
                user
            }
        };

        let session = self.sessions.issue(&user.user_id)?;
        Ok(AuthOutcome { user, session })
    }

    /// Give the user a `member` role in this deployment's organization
    /// unless they already hold a role there.
    pub async fn ensure_org_membership(&self, mut user: User) -> Result<User, ServiceError> {
        let org = &self.authz.deployment_org;
        if user.role_in(org).is_some() {
            return Ok(user);
        }

        let assignment = RoleAssignment::new(org, Role::Member);
        let added = self
            .store
            .add_user_role(&user.user_id, &assignment)
            .await
            .map_err(ServiceError::database)?;
        if added {
            tracing::info!(user_id = %user.user_id, org = %org, "Added organization membership");
            user.roles.push(assignment);
        }
        Ok(user)
    }

    pub async fn get_user(&self, user_id: &str) -> Result<User, ServiceError> {
        self.store
            .find_user_by_id(user_id)
            .await
            .map_err(ServiceError::database)?
            .ok_or(ServiceError::UserNotFound)
    }

    /// Set the user's role in this deployment's organization.
    pub async fn set_deployment_role(&self, user_id: &str, role: Role) -> Result<User, ServiceError> {
        if role == Role::SuperAdmin {
            return Err(ServiceError::ValidationError(
                "superadmin can only be granted in the global organization".to_string(),
            ));
        }

        let assignment = RoleAssignment::new(&self.authz.deployment_org, role);
        let updated = self
            .store
            .set_user_role(user_id, &assignment)
            .await
            .map_err(ServiceError::database)?;
        if !updated {
            return Err(ServiceError::UserNotFound);
        }

        tracing::info!(user_id = %user_id, role = %role, "Updated deployment role");
        self.get_user(user_id).await
    }
}
