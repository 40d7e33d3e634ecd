//! User accounts and their organization role assignments.

use chrono::{DateTime, Utc};
use mongodb::bson::{oid::ObjectId, serde_helpers::chrono_datetime_as_bson_datetime};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use super::Role;

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RoleAssignment {
    pub org: String,
    pub role: Role,
}

impl RoleAssignment {
    pub fn new(org: impl Into<String>, role: Role) -> Self {
        Self {
            org: org.into(),
            role,
        }
    }
}

/// How an account proves its identity. An account is bound to exactly one.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "method", rename_all = "lowercase")]
pub enum AuthMethod {
    /// Argon2 PHC string; the salt is embedded.
    Password { hash: String },
    /// Subject identifier issued by the external identity provider.
    External { subject: String },
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct User {
    #[serde(rename = "_id", skip_serializing_if = "Option::is_none")]
    pub id: Option<ObjectId>,
    pub user_id: String,
    pub name: String,
    pub email: String,
    pub avatar: Option<String>,
    #[serde(default)]
    pub custom_avatar: bool,
    pub auth: AuthMethod,
    #[serde(default)]
    pub roles: Vec<RoleAssignment>,
    #[serde(with = "chrono_datetime_as_bson_datetime")]
    pub created_at: DateTime<Utc>,
}

impl User {
    pub fn new(name: String, email: &str, auth: AuthMethod) -> Self {
        Self {
            id: None,
            user_id: Uuid::new_v4().to_string(),
            name,
            email: normalize_email(email),
            avatar: None,
            custom_avatar: false,
            auth,
            roles: Vec::new(),
            created_at: Utc::now(),
        }
    }

    pub fn is_password_account(&self) -> bool {
        matches!(self.auth, AuthMethod::Password { .. })
    }

    /// The assignment held in `org`, if any.
    pub fn role_in(&self, org: &str) -> Option<Role> {
        self.roles.iter().find(|a| a.org == org).map(|a| a.role)
    }

    pub fn sanitized(&self) -> UserProfile {
        UserProfile::from(self)
    }
}

/// User as returned by the API (no credentials, no internal id).
#[derive(Debug, Clone, Serialize)]
pub struct UserProfile {
    pub user_id: String,
    pub name: String,
    pub email: String,
    pub avatar: Option<String>,
    pub roles: Vec<RoleAssignment>,
}

impl From<&User> for UserProfile {
    fn from(u: &User) -> Self {
        Self {
            user_id: u.user_id.clone(),
            name: u.name.clone(),
            email: u.email.clone(),
            avatar: u.avatar.clone(),
            roles: u.roles.clone(),
        }
    }
}

/// Emails are compared and stored trimmed and lower-cased.
pub fn normalize_email(email: &str) -> String {
    email.trim().to_lowercase()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_new_user_normalizes_email() {
        let user = User::new(
            "Ada".to_string(),
            "  Ada@Example.COM ",
            AuthMethod::Password {
                hash: "x".to_string(),
            },
        );
        assert_eq!(user.email, "ada@example.com");
        assert!(user.is_password_account());
        assert!(user.roles.is_empty());
    }

    #[test]
    fn test_auth_method_is_tagged() {
        let json = serde_json::to_value(AuthMethod::External {
            subject: "sub-1".to_string(),
        })
        .unwrap();
        assert_eq!(json["method"], "external");
        assert_eq!(json["subject"], "sub-1");
    }

    #[test]
    fn test_sanitized_profile_has_no_credentials() {
        let mut user = User::new(
            "Ada".to_string(),
            "ada@example.com",
            AuthMethod::Password {
                hash: "$argon2id$secret".to_string(),
            },
        );
        user.roles.push(RoleAssignment::new("libretexts", Role::Member));

        let json = serde_json::to_string(&user.sanitized()).unwrap();
        assert!(!json.contains("argon2"));
        assert!(json.contains("\"role\":\"member\""));
        assert_eq!(user.role_in("libretexts"), Some(Role::Member));
        assert_eq!(user.role_in("other"), None);
    }
}
