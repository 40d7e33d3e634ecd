use async_trait::async_trait;
use chrono::{DateTime, Utc};
use std::collections::HashMap;
use std::sync::{Mutex, MutexGuard};

use super::store::ConductorStore;
use crate::models::{
    AccessToken, ApiClient, AuthCode, Project, ProjectInvitation, ProjectRole, RoleAssignment,
    User,
};

#[derive(Default)]
struct Tables {
    users: Vec<User>,
    api_clients: HashMap<String, ApiClient>,
    auth_codes: Vec<AuthCode>,
    access_tokens: HashMap<String, AccessToken>,
    projects: HashMap<String, Project>,
    invitations: Vec<ProjectInvitation>,
    /// Project reads left before `find_project` starts failing.
    project_read_budget: Option<usize>,
}

/// Process-local store with the same semantics as the MongoDB store.
/// Every operation runs under one lock, so conditional updates are atomic.
#[derive(Default)]
pub struct MemoryStore {
    tables: Mutex<Tables>,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    fn tables(&self) -> Result<MutexGuard<'_, Tables>, anyhow::Error> {
        self.tables
            .lock()
            .map_err(|e| anyhow::anyhow!("Memory store mutex poisoned: {}", e))
    }

    /// Let `reads` more project lookups succeed, then fail the rest.
    pub fn fail_project_reads_after(&self, reads: usize) -> Result<(), anyhow::Error> {
        self.tables()?.project_read_budget = Some(reads);
        Ok(())
    }
}

#[async_trait]
impl ConductorStore for MemoryStore {
    async fn health_check(&self) -> Result<(), anyhow::Error> {
        self.tables().map(|_| ())
    }

    async fn find_user_by_id(&self, user_id: &str) -> Result<Option<User>, anyhow::Error> {
        Ok(self.tables()?.users.iter().find(|u| u.user_id == user_id).cloned())
    }

    async fn find_user_by_email(&self, email: &str) -> Result<Option<User>, anyhow::Error> {
        Ok(self.tables()?.users.iter().find(|u| u.email == email).cloned())
    }

    async fn find_users_by_ids(&self, user_ids: &[String]) -> Result<Vec<User>, anyhow::Error> {
        Ok(self
            .tables()?
            .users
            .iter()
            .filter(|u| user_ids.contains(&u.user_id))
            .cloned()
            .collect())
    }

    async fn insert_user(&self, user: &User) -> Result<(), anyhow::Error> {
        let mut tables = self.tables()?;
        if tables
            .users
            .iter()
            .any(|u| u.email == user.email || u.user_id == user.user_id)
        {
            anyhow::bail!("Duplicate user {}", user.email);
        }
        tables.users.push(user.clone());
        Ok(())
    }

    async fn update_user_profile(
        &self,
        user_id: &str,
        name: &str,
        avatar: Option<&str>,
    ) -> Result<(), anyhow::Error> {
        let mut tables = self.tables()?;
        if let Some(user) = tables.users.iter_mut().find(|u| u.user_id == user_id) {
            user.name = name.to_string();
            if let Some(avatar) = avatar {
                user.avatar = Some(avatar.to_string());
            }
        }
        Ok(())
    }

    async fn add_user_role(
        &self,
        user_id: &str,
        assignment: &RoleAssignment,
    ) -> Result<bool, anyhow::Error> {
        let mut tables = self.tables()?;
        match tables.users.iter_mut().find(|u| u.user_id == user_id) {
            Some(user) if !user.roles.iter().any(|a| a.org == assignment.org) => {
                user.roles.push(assignment.clone());
                Ok(true)
            }
            _ => Ok(false),
        }
    }

    async fn set_user_role(
        &self,
        user_id: &str,
        assignment: &RoleAssignment,
    ) -> Result<bool, anyhow::Error> {
        let mut tables = self.tables()?;
        match tables.users.iter_mut().find(|u| u.user_id == user_id) {
            Some(user) => {
                user.roles.retain(|a| a.org != assignment.org);
                user.roles.push(assignment.clone());
                Ok(true)
            }
            None => Ok(false),
        }
    }

    async fn find_api_client(&self, client_id: &str) -> Result<Option<ApiClient>, anyhow::Error> {
        Ok(self.tables()?.api_clients.get(client_id).cloned())
    }

    async fn insert_api_client(&self, client: &ApiClient) -> Result<(), anyhow::Error> {
        self.tables()?
            .api_clients
            .insert(client.client_id.clone(), client.clone());
        Ok(())
    }

    async fn touch_api_client(
        &self,
        client_id: &str,
        at: DateTime<Utc>,
    ) -> Result<(), anyhow::Error> {
        if let Some(client) = self.tables()?.api_clients.get_mut(client_id) {
            client.last_used = Some(at);
        }
        Ok(())
    }

    async fn insert_auth_code(&self, code: &AuthCode) -> Result<(), anyhow::Error> {
        self.tables()?.auth_codes.push(code.clone());
        Ok(())
    }

    async fn find_auth_code(
        &self,
        client_id: &str,
        code: &str,
    ) -> Result<Option<AuthCode>, anyhow::Error> {
        Ok(self
            .tables()?
            .auth_codes
            .iter()
            .find(|c| c.client_id == client_id && c.code == code)
            .cloned())
    }

    async fn delete_auth_code(&self, client_id: &str, code: &str) -> Result<bool, anyhow::Error> {
        let mut tables = self.tables()?;
        let before = tables.auth_codes.len();
        tables
            .auth_codes
            .retain(|c| !(c.client_id == client_id && c.code == code));
        Ok(tables.auth_codes.len() < before)
    }

    async fn insert_access_token(&self, token: &AccessToken) -> Result<(), anyhow::Error> {
        self.tables()?
            .access_tokens
            .insert(token.token.clone(), token.clone());
        Ok(())
    }

    async fn find_access_token(&self, token: &str) -> Result<Option<AccessToken>, anyhow::Error> {
        Ok(self.tables()?.access_tokens.get(token).cloned())
    }

    async fn find_project(&self, project_id: &str) -> Result<Option<Project>, anyhow::Error> {
        let mut tables = self.tables()?;
        let budget = tables.project_read_budget;
        match budget {
            Some(0) => anyhow::bail!("Project read failed"),
            Some(left) => tables.project_read_budget = Some(left - 1),
            None => {}
        }
        Ok(tables.projects.get(project_id).cloned())
    }

    async fn insert_project(&self, project: &Project) -> Result<(), anyhow::Error> {
        self.tables()?
            .projects
            .insert(project.project_id.clone(), project.clone());
        Ok(())
    }

    async fn add_project_member(
        &self,
        project_id: &str,
        user_id: &str,
        role: ProjectRole,
    ) -> Result<bool, anyhow::Error> {
        let mut tables = self.tables()?;
        match tables.projects.get_mut(project_id) {
            Some(project) => {
                let team = project.team_mut(role);
                if !team.iter().any(|id| id == user_id) {
                    team.push(user_id.to_string());
                }
                Ok(true)
            }
            None => Ok(false),
        }
    }

    async fn insert_invitation(&self, invitation: &ProjectInvitation) -> Result<(), anyhow::Error> {
        self.tables()?.invitations.push(invitation.clone());
        Ok(())
    }

    async fn find_invitation(
        &self,
        invite_id: &str,
    ) -> Result<Option<ProjectInvitation>, anyhow::Error> {
        Ok(self
            .tables()?
            .invitations
            .iter()
            .find(|i| i.invite_id == invite_id)
            .cloned())
    }

    async fn find_invitation_with_token(
        &self,
        invite_id: &str,
        token: &str,
    ) -> Result<Option<ProjectInvitation>, anyhow::Error> {
        Ok(self
            .tables()?
            .invitations
            .iter()
            .find(|i| i.invite_id == invite_id && i.token == token)
            .cloned())
    }

    async fn find_invitations_for(
        &self,
        project_id: &str,
        email: &str,
    ) -> Result<Vec<ProjectInvitation>, anyhow::Error> {
        Ok(self
            .tables()?
            .invitations
            .iter()
            .filter(|i| i.project_id == project_id && i.email == email)
            .cloned()
            .collect())
    }

    async fn delete_invitations_for(
        &self,
        project_id: &str,
        email: &str,
    ) -> Result<u64, anyhow::Error> {
        let mut tables = self.tables()?;
        let before = tables.invitations.len();
        tables
            .invitations
            .retain(|i| i.accepted || i.project_id != project_id || i.email != email);
        Ok((before - tables.invitations.len()) as u64)
    }

    async fn claim_invitation(&self, invite_id: &str) -> Result<bool, anyhow::Error> {
        let mut tables = self.tables()?;
        match tables
            .invitations
            .iter_mut()
            .find(|i| i.invite_id == invite_id && !i.accepted)
        {
            Some(invitation) => {
                invitation.accepted = true;
                Ok(true)
            }
            None => Ok(false),
        }
    }

    async fn release_invitation(&self, invite_id: &str) -> Result<(), anyhow::Error> {
        if let Some(invitation) = self
            .tables()?
            .invitations
            .iter_mut()
            .find(|i| i.invite_id == invite_id)
        {
            invitation.accepted = false;
        }
        Ok(())
    }

    async fn update_invitation_role(
        &self,
        invite_id: &str,
        role: ProjectRole,
    ) -> Result<bool, anyhow::Error> {
        let mut tables = self.tables()?;
        match tables
            .invitations
            .iter_mut()
            .find(|i| i.invite_id == invite_id)
        {
            Some(invitation) => {
                invitation.role = role;
                Ok(true)
            }
            None => Ok(false),
        }
    }

    async fn delete_invitation(&self, invite_id: &str) -> Result<bool, anyhow::Error> {
        let mut tables = self.tables()?;
        let before = tables.invitations.len();
        tables.invitations.retain(|i| i.invite_id != invite_id);
        Ok(tables.invitations.len() < before)
    }

    async fn list_invitations(
        &self,
        project_id: &str,
        skip: u64,
        limit: u64,
    ) -> Result<(Vec<ProjectInvitation>, u64), anyhow::Error> {
        let tables = self.tables()?;
        let mut matching: Vec<_> = tables
            .invitations
            .iter()
            .filter(|i| i.project_id == project_id)
            .cloned()
            .collect();
        matching.sort_by(|a, b| b.created_at.cmp(&a.created_at));

        let total = matching.len() as u64;
        let page = matching
            .into_iter()
            .skip(skip as usize)
            .take(limit as usize)
            .collect();
        Ok((page, total))
    }
}
