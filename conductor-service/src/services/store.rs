//! Document-store access behind a trait so services can run against
//! MongoDB in production and an in-memory store in tests.

use async_trait::async_trait;
use chrono::{DateTime, Utc};

use crate::models::{
    AccessToken, ApiClient, AuthCode, Project, ProjectInvitation, ProjectRole, RoleAssignment,
    User,
};

#[async_trait]
pub trait ConductorStore: Send + Sync {
    async fn health_check(&self) -> Result<(), anyhow::Error>;

    // Users
    async fn find_user_by_id(&self, user_id: &str) -> Result<Option<User>, anyhow::Error>;
    async fn find_user_by_email(&self, email: &str) -> Result<Option<User>, anyhow::Error>;
    async fn find_users_by_ids(&self, user_ids: &[String]) -> Result<Vec<User>, anyhow::Error>;
    async fn insert_user(&self, user: &User) -> Result<(), anyhow::Error>;
    async fn update_user_profile(
        &self,
        user_id: &str,
        name: &str,
        avatar: Option<&str>,
    ) -> Result<(), anyhow::Error>;
    /// Append `assignment` unless the user already holds a role in its org.
    /// Returns whether it was appended.
    async fn add_user_role(
        &self,
        user_id: &str,
        assignment: &RoleAssignment,
    ) -> Result<bool, anyhow::Error>;
    /// Replace whatever role the user holds in the assignment's org.
    /// Returns false when the user does not exist.
    async fn set_user_role(
        &self,
        user_id: &str,
        assignment: &RoleAssignment,
    ) -> Result<bool, anyhow::Error>;

    // API clients
    async fn find_api_client(&self, client_id: &str) -> Result<Option<ApiClient>, anyhow::Error>;
    async fn insert_api_client(&self, client: &ApiClient) -> Result<(), anyhow::Error>;
    async fn touch_api_client(&self, client_id: &str, at: DateTime<Utc>)
        -> Result<(), anyhow::Error>;
    async fn insert_auth_code(&self, code: &AuthCode) -> Result<(), anyhow::Error>;
    async fn find_auth_code(
        &self,
        client_id: &str,
        code: &str,
    ) -> Result<Option<AuthCode>, anyhow::Error>;
    /// Returns whether a code was removed; only one caller can see `true`.
    async fn delete_auth_code(&self, client_id: &str, code: &str) -> Result<bool, anyhow::Error>;
    async fn insert_access_token(&self, token: &AccessToken) -> Result<(), anyhow::Error>;
    async fn find_access_token(&self, token: &str) -> Result<Option<AccessToken>, anyhow::Error>;

    // Projects
    async fn find_project(&self, project_id: &str) -> Result<Option<Project>, anyhow::Error>;
    async fn insert_project(&self, project: &Project) -> Result<(), anyhow::Error>;
    /// Add the user to the team list for `role`. Returns false when the
    /// project does not exist.
    async fn add_project_member(
        &self,
        project_id: &str,
        user_id: &str,
        role: ProjectRole,
    ) -> Result<bool, anyhow::Error>;

    // Invitations
    async fn insert_invitation(&self, invitation: &ProjectInvitation) -> Result<(), anyhow::Error>;
    async fn find_invitation(
        &self,
        invite_id: &str,
    ) -> Result<Option<ProjectInvitation>, anyhow::Error>;
    async fn find_invitation_with_token(
        &self,
        invite_id: &str,
        token: &str,
    ) -> Result<Option<ProjectInvitation>, anyhow::Error>;
    async fn find_invitations_for(
        &self,
        project_id: &str,
        email: &str,
    ) -> Result<Vec<ProjectInvitation>, anyhow::Error>;
    async fn delete_invitations_for(
        &self,
        project_id: &str,
        email: &str,
    ) -> Result<u64, anyhow::Error>;
    /// Flip `accepted` from false to true. Returns false when the
    /// invitation is missing or was already accepted.
    async fn claim_invitation(&self, invite_id: &str) -> Result<bool, anyhow::Error>;
    /// Undo a claim whose follow-up write failed.
    async fn release_invitation(&self, invite_id: &str) -> Result<(), anyhow::Error>;
    async fn update_invitation_role(
        &self,
        invite_id: &str,
        role: ProjectRole,
    ) -> Result<bool, anyhow::Error>;
    async fn delete_invitation(&self, invite_id: &str) -> Result<bool, anyhow::Error>;
    /// A page of a project's invitations, newest first, and the total count.
    async fn list_invitations(
        &self,
        project_id: &str,
        skip: u64,
        limit: u64,
    ) -> Result<(Vec<ProjectInvitation>, u64), anyhow::Error>;
}
