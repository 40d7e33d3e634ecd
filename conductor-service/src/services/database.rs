use async_trait::async_trait;
use chrono::{DateTime, Utc};
use futures::TryStreamExt;
use mongodb::{
    bson::{doc, to_bson, DateTime as BsonDateTime, Document},
    options::{FindOptions, IndexOptions},
    Client as MongoClient, Collection, Database, IndexModel,
};
use service_core::error::AppError;

use super::store::ConductorStore;
use crate::models::{
    AccessToken, ApiClient, AuthCode, Project, ProjectInvitation, ProjectRole, RoleAssignment,
    User,
};

#[derive(Clone)]
pub struct MongoDb {
    client: MongoClient,
    db: Database,
}

impl MongoDb {
    pub async fn connect(uri: &str, database: &str) -> Result<Self, AppError> {
        tracing::info!("Connecting to MongoDB");
        let client = MongoClient::with_uri_str(uri).await.map_err(|e| {
            tracing::error!(error = %e, "Failed to connect to MongoDB");
            AppError::DatabaseError(anyhow::anyhow!(e.to_string()))
        })?;
        let db = client.database(database);
        tracing::info!(database = %database, "Successfully connected to MongoDB database");
        Ok(Self { client, db })
    }

    pub async fn initialize_indexes(&self) -> Result<(), AppError> {
        tracing::info!("Creating MongoDB indexes for conductor-service");

        create_index(&self.users(), doc! { "user_id": 1 }, "user_id_idx", true).await?;
        create_index(&self.users(), doc! { "email": 1 }, "email_idx", true).await?;
        create_index(&self.api_clients(), doc! { "client_id": 1 }, "client_id_idx", true).await?;
        create_index(
            &self.auth_codes(),
            doc! { "client_id": 1, "code": 1 },
            "client_code_idx",
            true,
        )
        .await?;
        create_index(&self.access_tokens(), doc! { "token": 1 }, "token_idx", true).await?;
        create_index(&self.projects(), doc! { "project_id": 1 }, "project_id_idx", true).await?;
        create_index(&self.invitations(), doc! { "invite_id": 1 }, "invite_id_idx", true).await?;
        create_index(
            &self.invitations(),
            doc! { "project_id": 1, "email": 1 },
            "project_email_idx",
            false,
        )
        .await?;

        tracing::info!("MongoDB indexes created");
        Ok(())
    }

    pub fn client(&self) -> &MongoClient {
        &self.client
    }

    pub fn users(&self) -> Collection<User> {
        self.db.collection("users")
    }

    pub fn api_clients(&self) -> Collection<ApiClient> {
        self.db.collection("api_clients")
    }

    pub fn auth_codes(&self) -> Collection<AuthCode> {
        self.db.collection("auth_codes")
    }

    pub fn access_tokens(&self) -> Collection<AccessToken> {
        self.db.collection("access_tokens")
    }

    pub fn projects(&self) -> Collection<Project> {
        self.db.collection("projects")
    }

    pub fn invitations(&self) -> Collection<ProjectInvitation> {
        self.db.collection("project_invitations")
    }
}

async fn create_index<T>(
    collection: &Collection<T>,
    keys: Document,
    name: &str,
    unique: bool,
) -> Result<(), AppError>
where
    T: Send + Sync,
{
    let index = IndexModel::builder()
        .keys(keys)
        .options(
            IndexOptions::builder()
                .name(name.to_string())
                .unique(unique)
                .build(),
        )
        .build();

    collection.create_index(index, None).await.map_err(|e| {
        tracing::error!(index = %name, error = %e, "Failed to create index");
        AppError::DatabaseError(anyhow::anyhow!(e.to_string()))
    })?;
    Ok(())
}

#[async_trait]
impl ConductorStore for MongoDb {
    async fn health_check(&self) -> Result<(), anyhow::Error> {
        self.db.run_command(doc! { "ping": 1 }, None).await?;
        Ok(())
    }

    async fn find_user_by_id(&self, user_id: &str) -> Result<Option<User>, anyhow::Error> {
        Ok(self.users().find_one(doc! { "user_id": user_id }, None).await?)
    }

    async fn find_user_by_email(&self, email: &str) -> Result<Option<User>, anyhow::Error> {
        Ok(self.users().find_one(doc! { "email": email }, None).await?)
    }

    async fn find_users_by_ids(&self, user_ids: &[String]) -> Result<Vec<User>, anyhow::Error> {
        let cursor = self
            .users()
            .find(doc! { "user_id": { "$in": user_ids.to_vec() } }, None)
            .await?;
        Ok(cursor.try_collect().await?)
    }

    async fn insert_user(&self, user: &User) -> Result<(), anyhow::Error> {
        self.users().insert_one(user, None).await?;
        Ok(())
    }

    async fn update_user_profile(
        &self,
        user_id: &str,
        name: &str,
        avatar: Option<&str>,
    ) -> Result<(), anyhow::Error> {
        let mut set = doc! { "name": name };
        if let Some(avatar) = avatar {
            set.insert("avatar", avatar);
        }
        self.users()
            .update_one(doc! { "user_id": user_id }, doc! { "$set": set }, None)
            .await?;
        Ok(())
    }

    async fn add_user_role(
        &self,
        user_id: &str,
        assignment: &RoleAssignment,
    ) -> Result<bool, anyhow::Error> {
        let result = self
            .users()
            .update_one(
                doc! { "user_id": user_id, "roles.org": { "$ne": assignment.org.as_str() } },
                doc! { "$push": { "roles": to_bson(assignment)? } },
                None,
            )
            .await?;
        Ok(result.modified_count > 0)
    }

    async fn set_user_role(
        &self,
        user_id: &str,
        assignment: &RoleAssignment,
    ) -> Result<bool, anyhow::Error> {
        // One pipeline update: drop the org's entry and append the new one.
        let pipeline = vec![doc! {
            "$set": {
                "roles": {
                    "$concatArrays": [
                        {
                            "$filter": {
                                "input": { "$ifNull": ["$roles", []] },
                                "as": "r",
                                "cond": { "$ne": ["$$r.org", assignment.org.as_str()] },
                            }
                        },
                        [to_bson(assignment)?],
                    ]
                }
            }
        }];
        let result = self
            .users()
            .update_one(doc! { "user_id": user_id }, pipeline, None)
            .await?;
        Ok(result.matched_count > 0)
    }

    async fn find_api_client(&self, client_id: &str) -> Result<Option<ApiClient>, anyhow::Error> {
        Ok(self
            .api_clients()
            .find_one(doc! { "client_id": client_id }, None)
            .await?)
    }

    async fn insert_api_client(&self, client: &ApiClient) -> Result<(), anyhow::Error> {
        self.api_clients().insert_one(client, None).await?;
        Ok(())
    }

    async fn touch_api_client(
        &self,
        client_id: &str,
        at: DateTime<Utc>,
    ) -> Result<(), anyhow::Error> {
        self.api_clients()
            .update_one(
                doc! { "client_id": client_id },
                doc! { "$set": { "last_used": BsonDateTime::from_chrono(at) } },
                None,
            )
            .await?;
        Ok(())
    }

    async fn insert_auth_code(&self, code: &AuthCode) -> Result<(), anyhow::Error> {
        self.auth_codes().insert_one(code, None).await?;
        Ok(())
    }

    async fn find_auth_code(
        &self,
        client_id: &str,
        code: &str,
    ) -> Result<Option<AuthCode>, anyhow::Error> {
        Ok(self
            .auth_codes()
            .find_one(doc! { "client_id": client_id, "code": code }, None)
            .await?)
    }

    async fn delete_auth_code(&self, client_id: &str, code: &str) -> Result<bool, anyhow::Error> {
        let result = self
            .auth_codes()
            .delete_one(doc! { "client_id": client_id, "code": code }, None)
            .await?;
        Ok(result.deleted_count > 0)
    }

    async fn insert_access_token(&self, token: &AccessToken) -> Result<(), anyhow::Error> {
        self.access_tokens().insert_one(token, None).await?;
        Ok(())
    }

    async fn find_access_token(&self, token: &str) -> Result<Option<AccessToken>, anyhow::Error> {
        Ok(self
            .access_tokens()
            .find_one(doc! { "token": token }, None)
            .await?)
    }

    async fn find_project(&self, project_id: &str) -> Result<Option<Project>, anyhow::Error> {
        Ok(self
            .projects()
            .find_one(doc! { "project_id": project_id }, None)
            .await?)
    }

    async fn insert_project(&self, project: &Project) -> Result<(), anyhow::Error> {
        self.projects().insert_one(project, None).await?;
        Ok(())
    }

    async fn add_project_member(
        &self,
        project_id: &str,
        user_id: &str,
        role: ProjectRole,
    ) -> Result<bool, anyhow::Error> {
        let mut member = Document::new();
        member.insert(role.team_field(), user_id);
        let result = self
            .projects()
            .update_one(
                doc! { "project_id": project_id },
                doc! { "$addToSet": member },
                None,
            )
            .await?;
        Ok(result.matched_count > 0)
    }

    async fn insert_invitation(&self, invitation: &ProjectInvitation) -> Result<(), anyhow::Error> {
        self.invitations().insert_one(invitation, None).await?;
        Ok(())
    }

    async fn find_invitation(
        &self,
        invite_id: &str,
    ) -> Result<Option<ProjectInvitation>, anyhow::Error> {
        Ok(self
            .invitations()
            .find_one(doc! { "invite_id": invite_id }, None)
            .await?)
    }

    async fn find_invitation_with_token(
        &self,
        invite_id: &str,
        token: &str,
    ) -> Result<Option<ProjectInvitation>, anyhow::Error> {
        Ok(self
            .invitations()
            .find_one(doc! { "invite_id": invite_id, "token": token }, None)
            .await?)
    }

    async fn find_invitations_for(
        &self,
        project_id: &str,
        email: &str,
    ) -> Result<Vec<ProjectInvitation>, anyhow::Error> {
        let cursor = self
            .invitations()
            .find(doc! { "project_id": project_id, "email": email }, None)
            .await?;
        Ok(cursor.try_collect().await?)
    }

    async fn delete_invitations_for(
        &self,
        project_id: &str,
        email: &str,
    ) -> Result<u64, anyhow::Error> {
        let result = self
            .invitations()
            .delete_many(
                doc! { "project_id": project_id, "email": email, "accepted": false },
                None,
            )
            .await?;
        Ok(result.deleted_count)
    }

    async fn claim_invitation(&self, invite_id: &str) -> Result<bool, anyhow::Error> {
        let result = self
            .invitations()
            .update_one(
                doc! { "invite_id": invite_id, "accepted": false },
                doc! { "$set": { "accepted": true } },
                None,
            )
            .await?;
        Ok(result.modified_count > 0)
    }

    async fn release_invitation(&self, invite_id: &str) -> Result<(), anyhow::Error> {
        self.invitations()
            .update_one(
                doc! { "invite_id": invite_id },
                doc! { "$set": { "accepted": false } },
                None,
            )
            .await?;
        Ok(())
    }

    async fn update_invitation_role(
        &self,
        invite_id: &str,
        role: ProjectRole,
    ) -> Result<bool, anyhow::Error> {
        let result = self
            .invitations()
            .update_one(
                doc! { "invite_id": invite_id },
                doc! { "$set": { "role": role.as_str() } },
                None,
            )
            .await?;
        Ok(result.matched_count > 0)
    }

    async fn delete_invitation(&self, invite_id: &str) -> Result<bool, anyhow::Error> {
        let result = self
            .invitations()
            .delete_one(doc! { "invite_id": invite_id }, None)
            .await?;
        Ok(result.deleted_count > 0)
    }

    async fn list_invitations(
        &self,
        project_id: &str,
        skip: u64,
        limit: u64,
    ) -> Result<(Vec<ProjectInvitation>, u64), anyhow::Error> {
        let filter = doc! { "project_id": project_id };
        let total = self
            .invitations()
            .count_documents(filter.clone(), None)
            .await?;

        let options = FindOptions::builder()
            .sort(doc! { "created_at": -1 })
            .skip(skip)
            .limit(limit as i64)
            .build();
        let cursor = self.invitations().find(filter, options).await?;
        Ok((cursor.try_collect().await?, total))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::{AuthMethod, Role};

    async fn connect() -> MongoDb {
        let uri = std::env::var("MONGODB_URI")
            .unwrap_or_else(|_| "mongodb://localhost:27017".to_string());
        let db_name = format!("test_conductor_{}", uuid::Uuid::new_v4());
        let db = MongoDb::connect(&uri, &db_name).await.unwrap();
        db.initialize_indexes().await.unwrap();
        db
    }

    #[tokio::test]
    #[ignore = "requires a running MongoDB"]
    async fn test_role_assignment_round_trip() {
        let db = connect().await;
        let user = User::new(
            "Ada".to_string(),
            "ada@example.com",
            AuthMethod::Password {
                hash: "$argon2id$x".to_string(),
            },
        );
        db.insert_user(&user).await.unwrap();

        let member = RoleAssignment::new("campus", Role::Member);
        assert!(db.add_user_role(&user.user_id, &member).await.unwrap());
        assert!(!db.add_user_role(&user.user_id, &member).await.unwrap());

        let elsewhere = RoleAssignment::new("elsewhere", Role::Member);
        assert!(db.add_user_role(&user.user_id, &elsewhere).await.unwrap());

        let admin = RoleAssignment::new("campus", Role::CampusAdmin);
        assert!(db.set_user_role(&user.user_id, &admin).await.unwrap());
        assert!(!db.set_user_role("ghost", &admin).await.unwrap());

        let stored = db.find_user_by_id(&user.user_id).await.unwrap().unwrap();
        assert_eq!(stored.roles, vec![elsewhere, admin]);

        db.db.drop(None).await.unwrap();
    }

    #[tokio::test]
    #[ignore = "requires a running MongoDB"]
    async fn test_claim_invitation_is_compare_and_swap() {
        let db = connect().await;
        let inv = ProjectInvitation::new(
            "p1",
            "s1",
            "alice@example.com".to_string(),
            ProjectRole::Member,
            "tok".to_string(),
            Utc::now(),
            30,
        );
        db.insert_invitation(&inv).await.unwrap();

        assert!(db.claim_invitation(&inv.invite_id).await.unwrap());
        assert!(!db.claim_invitation(&inv.invite_id).await.unwrap());

        db.db.drop(None).await.unwrap();
    }

    #[tokio::test]
    #[ignore = "requires a running MongoDB"]
    async fn test_delete_invitations_for_keeps_accepted() {
        let db = connect().await;
        let invitation = |token: &str| {
            ProjectInvitation::new(
                "p1",
                "s1",
                "alice@example.com".to_string(),
                ProjectRole::Member,
                token.to_string(),
                Utc::now(),
                30,
            )
        };
        let accepted = invitation("tok-a");
        db.insert_invitation(&accepted).await.unwrap();
        db.insert_invitation(&invitation("tok-b")).await.unwrap();
        assert!(db.claim_invitation(&accepted.invite_id).await.unwrap());

        let removed = db
            .delete_invitations_for("p1", "alice@example.com")
            .await
            .unwrap();
        assert_eq!(removed, 1);
        assert!(db.find_invitation(&accepted.invite_id).await.unwrap().is_some());

        db.db.drop(None).await.unwrap();
    }
}
