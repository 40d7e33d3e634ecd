//! Closed vocabularies for organization roles, project team roles and
//! API-client scopes.

use axum::http::Method;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

/// Role a user holds within an organization.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Role {
    SuperAdmin,
    CampusAdmin,
    Member,
}

impl Role {
    pub fn as_str(&self) -> &'static str {
        match self {
            Role::SuperAdmin => "superadmin",
            Role::CampusAdmin => "campusadmin",
            Role::Member => "member",
        }
    }
}

impl fmt::Display for Role {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for Role {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_lowercase().as_str() {
            "superadmin" => Ok(Role::SuperAdmin),
            "campusadmin" => Ok(Role::CampusAdmin),
            "member" => Ok(Role::Member),
            other => Err(format!("Unknown role: {}", other)),
        }
    }
}

/// Position on a project team.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ProjectRole {
    Lead,
    Liaison,
    Member,
    Auditor,
}

impl ProjectRole {
    pub const ALL: [ProjectRole; 4] = [
        ProjectRole::Lead,
        ProjectRole::Liaison,
        ProjectRole::Member,
        ProjectRole::Auditor,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            ProjectRole::Lead => "lead",
            ProjectRole::Liaison => "liaison",
            ProjectRole::Member => "member",
            ProjectRole::Auditor => "auditor",
        }
    }

    /// Leads and liaisons administer the project (invitations, team).
    pub fn is_admin(&self) -> bool {
        matches!(self, ProjectRole::Lead | ProjectRole::Liaison)
    }

    /// Name of the team list holding this role on a project document.
    pub fn team_field(&self) -> &'static str {
        match self {
            ProjectRole::Lead => "leads",
            ProjectRole::Liaison => "liaisons",
            ProjectRole::Member => "members",
            ProjectRole::Auditor => "auditors",
        }
    }
}

impl fmt::Display for ProjectRole {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// HTTP method an API-client scope applies to.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ScopeMethod {
    Get,
    Post,
    Put,
    Patch,
    Delete,
}

impl ScopeMethod {
    pub fn as_str(&self) -> &'static str {
        match self {
            ScopeMethod::Get => "GET",
            ScopeMethod::Post => "POST",
            ScopeMethod::Put => "PUT",
            ScopeMethod::Patch => "PATCH",
            ScopeMethod::Delete => "DELETE",
        }
    }

    pub fn from_method(method: &Method) -> Option<Self> {
        match *method {
            Method::GET => Some(ScopeMethod::Get),
            Method::POST => Some(ScopeMethod::Post),
            Method::PUT => Some(ScopeMethod::Put),
            Method::PATCH => Some(ScopeMethod::Patch),
            Method::DELETE => Some(ScopeMethod::Delete),
            _ => None,
        }
    }
}

impl FromStr for ScopeMethod {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "GET" => Ok(ScopeMethod::Get),
            "POST" => Ok(ScopeMethod::Post),
            "PUT" => Ok(ScopeMethod::Put),
            "PATCH" => Ok(ScopeMethod::Patch),
            "DELETE" => Ok(ScopeMethod::Delete),
            other => Err(format!("Unknown scope method: {}", other)),
        }
    }
}

/// A coarse permission granted to an API client, written `METHOD:/resource`.
///
/// Stored and serialized in its string form.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub struct ApiScope {
    pub method: ScopeMethod,
    pub resource: String,
}

impl ApiScope {
    pub fn new(method: ScopeMethod, resource: impl Into<String>) -> Self {
        Self {
            method,
            resource: resource.into(),
        }
    }

    /// A scope grants a request when the method matches and the scope's
    /// resource starts with the request's resource prefix.
    pub fn grants(&self, method: ScopeMethod, prefix: &str) -> bool {
        self.method == method && self.resource.starts_with(prefix)
    }
}

impl fmt::Display for ApiScope {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}:{}", self.method.as_str(), self.resource)
    }
}

impl FromStr for ApiScope {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let (method, resource) = s
            .split_once(':')
            .ok_or_else(|| format!("Scope must be METHOD:/path, got {}", s))?;
        if !resource.starts_with('/') {
            return Err(format!("Scope resource must start with '/', got {}", s));
        }
        Ok(ApiScope::new(method.parse()?, resource))
    }
}

impl TryFrom<String> for ApiScope {
    type Error = String;

    fn try_from(value: String) -> Result<Self, Self::Error> {
        value.parse()
    }
}

impl From<ApiScope> for String {
    fn from(scope: ApiScope) -> Self {
        scope.to_string()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_role_parses_case_insensitively() {
        assert_eq!("CampusAdmin".parse::<Role>().unwrap(), Role::CampusAdmin);
        assert_eq!("member".parse::<Role>().unwrap(), Role::Member);
        assert!("owner".parse::<Role>().is_err());
    }

    #[test]
    fn test_role_serializes_lowercase() {
        let json = serde_json::to_string(&Role::SuperAdmin).unwrap();
        assert_eq!(json, "\"superadmin\"");
    }

    #[test]
    fn test_only_lead_and_liaison_administer() {
        let admins: Vec<_> = ProjectRole::ALL
            .iter()
            .filter(|r| r.is_admin())
            .copied()
            .collect();
        assert_eq!(admins, vec![ProjectRole::Lead, ProjectRole::Liaison]);
    }

    #[test]
    fn test_scope_round_trips_through_string() {
        let scope: ApiScope = "GET:/users/me".parse().unwrap();
        assert_eq!(scope.method, ScopeMethod::Get);
        assert_eq!(scope.resource, "/users/me");
        assert_eq!(scope.to_string(), "GET:/users/me");

        let json = serde_json::to_string(&scope).unwrap();
        assert_eq!(json, "\"GET:/users/me\"");
    }

    #[test]
    fn test_scope_rejects_malformed_strings() {
        assert!("/users/me".parse::<ApiScope>().is_err());
        assert!("GET:users".parse::<ApiScope>().is_err());
        assert!("FETCH:/users".parse::<ApiScope>().is_err());
    }

    #[test]
    fn test_scope_grants_by_prefix() {
        let scope: ApiScope = "GET:/projects/invitations".parse().unwrap();

        assert!(scope.grants(ScopeMethod::Get, "/projects"));
        assert!(scope.grants(ScopeMethod::Get, "/projects/invitations"));
        assert!(!scope.grants(ScopeMethod::Post, "/projects"));
        assert!(!scope.grants(ScopeMethod::Get, "/users"));
        assert!(!scope.grants(ScopeMethod::Get, "/projects/invitations/extra"));
    }
}
