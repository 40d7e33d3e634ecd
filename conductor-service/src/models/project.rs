use mongodb::bson::oid::ObjectId;
use serde::{Deserialize, Serialize};

use super::ProjectRole;

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Project {
    #[serde(rename = "_id", skip_serializing_if = "Option::is_none")]
    pub id: Option<ObjectId>,
    pub project_id: String,
    pub title: String,
    pub org: String,
    #[serde(default)]
    pub leads: Vec<String>,
    #[serde(default)]
    pub liaisons: Vec<String>,
    #[serde(default)]
    pub members: Vec<String>,
    #[serde(default)]
    pub auditors: Vec<String>,
    /// Companion authoring workbench, once provisioned.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub workbench_id: Option<String>,
}

impl Project {
    pub fn new(project_id: impl Into<String>, title: impl Into<String>, org: impl Into<String>) -> Self {
        Self {
            id: None,
            project_id: project_id.into(),
            title: title.into(),
            org: org.into(),
            leads: Vec::new(),
            liaisons: Vec::new(),
            members: Vec::new(),
            auditors: Vec::new(),
            workbench_id: None,
        }
    }

    pub fn team(&self, role: ProjectRole) -> &[String] {
        match role {
            ProjectRole::Lead => &self.leads,
            ProjectRole::Liaison => &self.liaisons,
            ProjectRole::Member => &self.members,
            ProjectRole::Auditor => &self.auditors,
        }
    }

    pub fn team_mut(&mut self, role: ProjectRole) -> &mut Vec<String> {
        match role {
            ProjectRole::Lead => &mut self.leads,
            ProjectRole::Liaison => &mut self.liaisons,
            ProjectRole::Member => &mut self.members,
            ProjectRole::Auditor => &mut self.auditors,
        }
    }

    /// Highest-ranked team role the user holds, if any.
    pub fn role_of(&self, user_id: &str) -> Option<ProjectRole> {
        ProjectRole::ALL
            .into_iter()
            .find(|role| self.team(*role).iter().any(|id| id == user_id))
    }

    /// Every user on the team with their role, one entry per user.
    pub fn team_members(&self) -> Vec<(String, ProjectRole)> {
        let mut seen = std::collections::HashSet::new();
        ProjectRole::ALL
            .into_iter()
            .flat_map(|role| self.team(role).iter().map(move |id| (id.clone(), role)))
            .filter(|(id, _)| seen.insert(id.clone()))
            .collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_role_of_prefers_higher_rank() {
        let mut project = Project::new("p1", "Physics", "libretexts");
        project.members.push("u1".to_string());
        project.leads.push("u1".to_string());
        project.auditors.push("u2".to_string());

        assert_eq!(project.role_of("u1"), Some(ProjectRole::Lead));
        assert_eq!(project.role_of("u2"), Some(ProjectRole::Auditor));
        assert_eq!(project.role_of("u3"), None);
    }

    #[test]
    fn test_team_members_are_unique() {
        let mut project = Project::new("p1", "Physics", "libretexts");
        project.leads.push("u1".to_string());
        project.members.push("u1".to_string());
        project.members.push("u2".to_string());

        let team = project.team_members();
        assert_eq!(
            team,
            vec![
                ("u1".to_string(), ProjectRole::Lead),
                ("u2".to_string(), ProjectRole::Member)
            ]
        );
    }
}
