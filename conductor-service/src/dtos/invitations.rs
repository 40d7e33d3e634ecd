use serde::{Deserialize, Serialize};
use validator::Validate;

use crate::models::ProjectRole;
use crate::services::{InvitationView, MembershipOutcome};

#[derive(Debug, Deserialize, Validate)]
pub struct CreateInvitationRequest {
    #[validate(email(message = "Invalid email format"))]
    pub email: String,
    pub role: ProjectRole,
}

#[derive(Debug, Deserialize)]
pub struct UpdateInvitationRequest {
    pub role: ProjectRole,
}

#[derive(Debug, Deserialize)]
pub struct InvitationTokenQuery {
    pub token: Option<String>,
}

#[derive(Debug, Deserialize)]
pub struct ListInvitationsQuery {
    #[serde(default = "default_page")]
    pub page: u64,
    #[serde(default = "default_limit")]
    pub limit: u64,
}

fn default_page() -> u64 {
    1
}

fn default_limit() -> u64 {
    25
}

#[derive(Debug, Serialize)]
pub struct InvitationResponse {
    pub invitation: InvitationView,
}

#[derive(Debug, Serialize)]
pub struct AcceptInvitationResponse {
    pub msg: &'static str,
    pub project_id: String,
    pub outcome: MembershipOutcome,
}
