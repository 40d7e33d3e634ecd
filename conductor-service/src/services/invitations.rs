//! Project invitations: single-use, expiring offers of a team role.
//!
//! An invitation moves from pending to either accepted or expired, and both
//! are terminal. Acceptance claims the `accepted` flag with a store-level
//! compare-and-swap before the membership write, so two concurrent accepts
//! cannot both add members or fire notifications. Email and workbench sync
//! run through the [`Outbox`] after the membership write has landed.

use chrono::{DateTime, Utc};
use serde::Serialize;
use std::sync::Arc;

use super::{
    authz::{can_manage_project, AuthzContext},
    clock::Clock,
    email::{EmailProvider, InvitationEmail, TeamJoinedEmail},
    outbox::Outbox,
    store::ConductorStore,
    workbench::{TeamPermission, WorkbenchSync},
    ServiceError,
};
use crate::models::{
    normalize_email, InvitationStatus, Project, ProjectInvitation, ProjectRole, User,
};
use crate::utils::random_hex;

const INVITATION_TOKEN_BYTES: usize = 32;
pub const MAX_PAGE_SIZE: u64 = 100;

#[derive(Debug, Clone)]
pub struct InvitationSettings {
    pub expiry_days: i64,
    /// Base URL of the web app; invitation links point at it.
    pub frontend_url: String,
}

#[derive(Debug, Clone, Serialize)]
pub struct InvitationSender {
    pub user_id: String,
    pub name: String,
}

/// Invitation as returned to callers. Never carries the token.
#[derive(Debug, Clone, Serialize)]
pub struct InvitationView {
    pub invite_id: String,
    pub project_id: String,
    pub project_title: Option<String>,
    pub sender: Option<InvitationSender>,
    pub email: String,
    pub role: ProjectRole,
    pub accepted: bool,
    pub status: InvitationStatus,
    pub created_at: DateTime<Utc>,
    pub expires_at: DateTime<Utc>,
}

#[derive(Debug, Clone, Serialize)]
pub struct InvitationPage {
    pub invitations: Vec<InvitationView>,
    pub total: u64,
    pub page: u64,
    pub limit: u64,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum MembershipOutcome {
    Joined,
    AlreadyMember,
}

impl MembershipOutcome {
    pub fn message(self) -> &'static str {
        match self {
            MembershipOutcome::Joined => "Successfully joined the project.",
            MembershipOutcome::AlreadyMember => "You're already a member of this project.",
        }
    }
}

#[derive(Debug, Clone, Serialize)]
pub struct AcceptOutcome {
    pub project_id: String,
    pub outcome: MembershipOutcome,
}

#[derive(Clone)]
pub struct InvitationService {
    store: Arc<dyn ConductorStore>,
    email: Arc<dyn EmailProvider>,
    workbench: Arc<dyn WorkbenchSync>,
    outbox: Outbox,
    authz: AuthzContext,
    clock: Arc<dyn Clock>,
    settings: InvitationSettings,
}

impl InvitationService {
    pub fn new(
        store: Arc<dyn ConductorStore>,
        email: Arc<dyn EmailProvider>,
        workbench: Arc<dyn WorkbenchSync>,
        outbox: Outbox,
        authz: AuthzContext,
        clock: Arc<dyn Clock>,
        settings: InvitationSettings,
    ) -> Self {
        Self {
            store,
            email,
            workbench,
            outbox,
            authz,
            clock,
            settings,
        }
    }

    /// Invite `email` to the project. Any earlier invitation for the same
    /// address is replaced; an accepted one blocks the new invite.
    pub async fn create(
        &self,
        sender_id: &str,
        project_id: &str,
        email: &str,
        role: ProjectRole,
    ) -> Result<InvitationView, ServiceError> {
        let project = self.find_project(project_id).await?;
        let sender = self.require_project_admin(sender_id, &project).await?;
        let email = normalize_email(email);

        let existing = self
            .store
            .find_invitations_for(project_id, &email)
            .await
            .map_err(ServiceError::database)?;
        if existing.iter().any(|inv| inv.accepted) {
            return Err(ServiceError::InvitationAlreadyAccepted);
        }

        let replaced = self
            .store
            .delete_invitations_for(project_id, &email)
            .await
            .map_err(ServiceError::database)?;

        let invitation = ProjectInvitation::new(
            project_id,
            &sender.user_id,
            email,
            role,
            random_hex(INVITATION_TOKEN_BYTES),
            self.clock.now(),
            self.settings.expiry_days,
        );
        self.store
            .insert_invitation(&invitation)
            .await
            .map_err(ServiceError::database)?;

        tracing::info!(
            invite_id = %invitation.invite_id,
            project_id = %project_id,
            role = %role,
            replaced,
            "Project invitation created"
        );

        let message = InvitationEmail {
            to: invitation.email.clone(),
            project_title: project.title.clone(),
            sender_name: sender.name.clone(),
            role,
            invite_id: invitation.invite_id.clone(),
            token: invitation.token.clone(),
            link: self.invitation_link(&invitation),
            expires_at: invitation.expires_at,
        };
        let provider = self.email.clone();
        self.outbox.dispatch("invitation_email", async move {
            provider.send_project_invitation(&message).await
        });

        Ok(self.view(&invitation, Some(&project), Some(&sender)))
    }

    /// Fetch by id and token. A wrong pair is reported as not found (403)
    /// and a lapsed invitation as expired (404).
    pub async fn get(&self, invite_id: &str, token: &str) -> Result<InvitationView, ServiceError> {
        let invitation = self.find_live(invite_id, token).await?;

        let project = self
            .store
            .find_project(&invitation.project_id)
            .await
            .map_err(ServiceError::database)?;
        let sender = self
            .store
            .find_user_by_id(&invitation.sender_id)
            .await
            .map_err(ServiceError::database)?;

        Ok(self.view(&invitation, project.as_ref(), sender.as_ref()))
    }

    /// Accept on behalf of `user_id`. The caller's email does not need to
    /// match the invited address; holding the token is what counts.
    pub async fn accept(
        &self,
        invite_id: &str,
        token: &str,
        user_id: &str,
    ) -> Result<AcceptOutcome, ServiceError> {
        let invitation = self.find_live(invite_id, token).await?;
        if invitation.accepted {
            return Err(ServiceError::InvitationAlreadyAccepted);
        }

        let user = self
            .store
            .find_user_by_id(user_id)
            .await
            .map_err(ServiceError::database)?
            .ok_or(ServiceError::UserNotFound)?;
        self.find_project(&invitation.project_id).await?;

        if !self
            .store
            .claim_invitation(invite_id)
            .await
            .map_err(ServiceError::database)?
        {
            return Err(ServiceError::InvitationAlreadyAccepted);
        }

        let outcome = match self
            .add_member_to_project(&invitation.project_id, &user.user_id, invitation.role)
            .await
        {
            Ok(outcome) => outcome,
            Err(e) => {
                if let Err(release_err) = self.store.release_invitation(invite_id).await {
                    tracing::error!(
                        invite_id = %invite_id,
                        error = %release_err,
                        "Failed to release invitation claim"
                    );
                }
                return Err(e);
            }
        };

        tracing::info!(
            invite_id = %invite_id,
            project_id = %invitation.project_id,
            user_id = %user.user_id,
            outcome = ?outcome,
            "Project invitation accepted"
        );

        // Membership has landed; a failed re-read only skips the side effects.
        if outcome == MembershipOutcome::Joined {
            match self.store.find_project(&invitation.project_id).await {
                Ok(Some(project)) => self.dispatch_team_effects(project, user, invitation.role),
                Ok(None) => tracing::warn!(
                    project_id = %invitation.project_id,
                    "Project vanished after join; skipping team notifications"
                ),
                Err(e) => tracing::error!(
                    project_id = %invitation.project_id,
                    error = %e,
                    "Failed to reload project after join; skipping team notifications"
                ),
            }
        }

        Ok(AcceptOutcome {
            project_id: invitation.project_id,
            outcome,
        })
    }

    pub async fn update(
        &self,
        requester_id: &str,
        invite_id: &str,
        role: ProjectRole,
    ) -> Result<InvitationView, ServiceError> {
        let mut invitation = self.find_by_id(invite_id).await?;
        let project = self.find_project(&invitation.project_id).await?;
        self.require_project_admin(requester_id, &project).await?;

        if invitation.accepted {
            return Err(ServiceError::InvitationAlreadyAccepted);
        }

        if !self
            .store
            .update_invitation_role(invite_id, role)
            .await
            .map_err(ServiceError::database)?
        {
            return Err(ServiceError::InvitationNotFound);
        }
        invitation.role = role;

        tracing::info!(invite_id = %invite_id, role = %role, "Project invitation updated");
        let sender = self
            .store
            .find_user_by_id(&invitation.sender_id)
            .await
            .map_err(ServiceError::database)?;
        Ok(self.view(&invitation, Some(&project), sender.as_ref()))
    }

    pub async fn delete(&self, requester_id: &str, invite_id: &str) -> Result<(), ServiceError> {
        let invitation = self.find_by_id(invite_id).await?;
        let project = self.find_project(&invitation.project_id).await?;
        self.require_project_admin(requester_id, &project).await?;

        if !self
            .store
            .delete_invitation(invite_id)
            .await
            .map_err(ServiceError::database)?
        {
            return Err(ServiceError::InvitationNotFound);
        }

        tracing::info!(invite_id = %invite_id, "Project invitation deleted");
        Ok(())
    }

    /// A page of the project's invitations, newest first. `page` starts at 1.
    pub async fn list(
        &self,
        requester_id: &str,
        project_id: &str,
        page: u64,
        limit: u64,
    ) -> Result<InvitationPage, ServiceError> {
        let project = self.find_project(project_id).await?;
        self.require_project_admin(requester_id, &project).await?;

        let page = page.max(1);
        let limit = limit.clamp(1, MAX_PAGE_SIZE);
        let (invitations, total) = self
            .store
            .list_invitations(project_id, (page - 1).saturating_mul(limit), limit)
            .await
            .map_err(ServiceError::database)?;

        let sender_ids: Vec<String> = invitations.iter().map(|i| i.sender_id.clone()).collect();
        let senders = self
            .store
            .find_users_by_ids(&sender_ids)
            .await
            .map_err(ServiceError::database)?;

        let invitations = invitations
            .iter()
            .map(|inv| {
                let sender = senders.iter().find(|u| u.user_id == inv.sender_id);
                self.view(inv, Some(&project), sender)
            })
            .collect();

        Ok(InvitationPage {
            invitations,
            total,
            page,
            limit,
        })
    }

    /// Put the user on the project's team. A user already on the team in
    /// any role is left untouched.
    pub async fn add_member_to_project(
        &self,
        project_id: &str,
        user_id: &str,
        role: ProjectRole,
    ) -> Result<MembershipOutcome, ServiceError> {
        let project = self.find_project(project_id).await?;
        if project.role_of(user_id).is_some() {
            return Ok(MembershipOutcome::AlreadyMember);
        }

        if !self
            .store
            .add_project_member(project_id, user_id, role)
            .await
            .map_err(ServiceError::database)?
        {
            return Err(ServiceError::ProjectNotFound);
        }
        Ok(MembershipOutcome::Joined)
    }

    fn dispatch_team_effects(&self, project: Project, member: User, role: ProjectRole) {
        let team = project.team_members();

        if let Some(workbench_id) = project.workbench_id.clone() {
            let store = self.store.clone();
            let workbench = self.workbench.clone();
            let team = team.clone();
            self.outbox.dispatch("workbench_sync", async move {
                let ids: Vec<String> = team.iter().map(|(id, _)| id.clone()).collect();
                let users = store.find_users_by_ids(&ids).await?;
                let permissions: Vec<TeamPermission> = team
                    .into_iter()
                    .filter_map(|(user_id, role)| {
                        let email = users.iter().find(|u| u.user_id == user_id)?.email.clone();
                        Some(TeamPermission {
                            user_id,
                            email,
                            role,
                        })
                    })
                    .collect();
                workbench.sync_team(&workbench_id, &permissions).await
            });
        }

        let recipients: Vec<String> = team
            .into_iter()
            .map(|(id, _)| id)
            .filter(|id| *id != member.user_id)
            .collect();
        if recipients.is_empty() {
            return;
        }

        let store = self.store.clone();
        let email = self.email.clone();
        let project_title = project.title;
        self.outbox.dispatch("team_joined_email", async move {
            let users = store.find_users_by_ids(&recipients).await?;
            let notice = TeamJoinedEmail {
                to: users.into_iter().map(|u| u.email).collect(),
                project_title,
                member_name: member.name,
                role,
            };
            email.send_team_joined(&notice).await
        });
    }

    async fn find_live(&self, invite_id: &str, token: &str) -> Result<ProjectInvitation, ServiceError> {
        let invitation = self
            .store
            .find_invitation_with_token(invite_id, token)
            .await
            .map_err(ServiceError::database)?
            .ok_or(ServiceError::InvitationNotFound)?;

        if !invitation.accepted && invitation.is_expired(self.clock.now()) {
            return Err(ServiceError::InvitationExpired);
        }
        Ok(invitation)
    }

    async fn find_by_id(&self, invite_id: &str) -> Result<ProjectInvitation, ServiceError> {
        self.store
            .find_invitation(invite_id)
            .await
            .map_err(ServiceError::database)?
            .ok_or(ServiceError::InvitationNotFound)
    }

    async fn find_project(&self, project_id: &str) -> Result<Project, ServiceError> {
        self.store
            .find_project(project_id)
            .await
            .map_err(ServiceError::database)?
            .ok_or(ServiceError::ProjectNotFound)
    }

    async fn require_project_admin(
        &self,
        user_id: &str,
        project: &Project,
    ) -> Result<User, ServiceError> {
        let user = self
            .store
            .find_user_by_id(user_id)
            .await
            .map_err(ServiceError::database)?
            .ok_or(ServiceError::UserNotFound)?;

        if !can_manage_project(&self.authz, &user, project) {
            tracing::warn!(
                user_id = %user_id,
                project_id = %project.project_id,
                "Rejected invitation management by non-admin"
            );
            return Err(ServiceError::NotProjectAdmin);
        }
        Ok(user)
    }

    fn invitation_link(&self, invitation: &ProjectInvitation) -> String {
        format!(
            "{}/projects/invitation/{}?token={}",
            self.settings.frontend_url.trim_end_matches('/'),
            invitation.invite_id,
            invitation.token
        )
    }

    fn view(
        &self,
        invitation: &ProjectInvitation,
        project: Option<&Project>,
        sender: Option<&User>,
    ) -> InvitationView {
        InvitationView {
            invite_id: invitation.invite_id.clone(),
            project_id: invitation.project_id.clone(),
            project_title: project.map(|p| p.title.clone()),
            sender: sender.map(|u| InvitationSender {
                user_id: u.user_id.clone(),
                name: u.name.clone(),
            }),
            email: invitation.email.clone(),
            role: invitation.role,
            accepted: invitation.accepted,
            status: invitation.status(self.clock.now()),
            created_at: invitation.created_at,
            expires_at: invitation.expires_at,
        }
    }
}
