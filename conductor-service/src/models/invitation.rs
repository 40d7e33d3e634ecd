//! Project invitation model - single-use, expiring offers of a team role.

use chrono::{DateTime, Duration, Utc};
use mongodb::bson::oid::ObjectId;
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use super::ProjectRole;

/// Invitation status derived from the accepted flag and the clock.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum InvitationStatus {
    Pending,
    Accepted,
    Expired,
}

/// Invitation entity as stored.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ProjectInvitation {
    #[serde(rename = "_id", skip_serializing_if = "Option::is_none")]
    pub id: Option<ObjectId>,
    pub invite_id: String,
    pub project_id: String,
    pub sender_id: String,
    pub email: String,
    pub token: String,
    pub role: ProjectRole,
    #[serde(default)]
    pub accepted: bool,
    #[serde(with = "mongodb::bson::serde_helpers::chrono_datetime_as_bson_datetime")]
    pub created_at: DateTime<Utc>,
    #[serde(with = "mongodb::bson::serde_helpers::chrono_datetime_as_bson_datetime")]
    pub expires_at: DateTime<Utc>,
}

impl ProjectInvitation {
    /// Create a new invitation.
    pub fn new(
        project_id: &str,
        sender_id: &str,
        email: String,
        role: ProjectRole,
        token: String,
        created_at: DateTime<Utc>,
        expiry_days: i64,
    ) -> Self {
        Self {
            id: None,
            invite_id: Uuid::new_v4().to_string(),
            project_id: project_id.to_string(),
            sender_id: sender_id.to_string(),
            email,
            token,
            role,
            accepted: false,
            created_at,
            expires_at: created_at + Duration::days(expiry_days),
        }
    }

    /// Check if invitation has expired.
    pub fn is_expired(&self, now: DateTime<Utc>) -> bool {
        now >= self.expires_at
    }

    pub fn status(&self, now: DateTime<Utc>) -> InvitationStatus {
        if self.accepted {
            InvitationStatus::Accepted
        } else if self.is_expired(now) {
            InvitationStatus::Expired
        } else {
            InvitationStatus::Pending
        }
    }
}
