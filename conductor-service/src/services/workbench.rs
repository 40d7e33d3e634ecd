//! Team permission sync with the companion authoring workbench.

use async_trait::async_trait;
use secrecy::{ExposeSecret, SecretString};
use serde::Serialize;
use std::sync::{Arc, Mutex};
use std::time::Duration;

use crate::config::WorkbenchConfig;
use crate::models::ProjectRole;

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct TeamPermission {
    pub user_id: String,
    pub email: String,
    pub role: ProjectRole,
}

#[async_trait]
pub trait WorkbenchSync: Send + Sync {
    async fn sync_team(
        &self,
        workbench_id: &str,
        team: &[TeamPermission],
    ) -> Result<(), anyhow::Error>;
}

#[derive(Serialize)]
struct SyncTeamRequest<'a> {
    team: &'a [TeamPermission],
}

pub struct HttpWorkbenchSync {
    client: reqwest::Client,
    base_url: String,
    api_token: Option<SecretString>,
}

impl HttpWorkbenchSync {
    pub fn new(base_url: &str, api_token: Option<SecretString>) -> Result<Self, anyhow::Error> {
        let client = reqwest::Client::builder()
            .timeout(Duration::from_secs(10))
            .build()?;
        Ok(Self {
            client,
            base_url: base_url.trim_end_matches('/').to_string(),
            api_token,
        })
    }
}

#[async_trait]
impl WorkbenchSync for HttpWorkbenchSync {
    async fn sync_team(
        &self,
        workbench_id: &str,
        team: &[TeamPermission],
    ) -> Result<(), anyhow::Error> {
        let url = format!(
            "{}/workbenches/{}/team",
            self.base_url,
            urlencoding::encode(workbench_id)
        );

        let mut request = self.client.put(&url).json(&SyncTeamRequest { team });
        if let Some(token) = &self.api_token {
            request = request.bearer_auth(token.expose_secret());
        }

        let response = request.send().await?;
        if !response.status().is_success() {
            anyhow::bail!(
                "Workbench sync for {} returned {}",
                workbench_id,
                response.status()
            );
        }

        tracing::info!(workbench_id = %workbench_id, members = team.len(), "Workbench team synced");
        Ok(())
    }
}

/// Used when no workbench API is configured.
pub struct DisabledWorkbenchSync;

#[async_trait]
impl WorkbenchSync for DisabledWorkbenchSync {
    async fn sync_team(
        &self,
        workbench_id: &str,
        _team: &[TeamPermission],
    ) -> Result<(), anyhow::Error> {
        tracing::debug!(workbench_id = %workbench_id, "Workbench API not configured, skipping sync");
        Ok(())
    }
}

/// Build the sync client for the configured workbench, if any.
pub fn from_config(config: &WorkbenchConfig) -> Result<Arc<dyn WorkbenchSync>, anyhow::Error> {
    let sync: Arc<dyn WorkbenchSync> = match &config.api_url {
        Some(url) => Arc::new(HttpWorkbenchSync::new(url, config.api_token.clone())?),
        None => Arc::new(DisabledWorkbenchSync),
    };
    Ok(sync)
}

/// Records sync calls.
#[derive(Default)]
pub struct MockWorkbenchSync {
    calls: Mutex<Vec<(String, Vec<TeamPermission>)>>,
}

impl MockWorkbenchSync {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn calls(&self) -> Vec<(String, Vec<TeamPermission>)> {
        self.calls.lock().map(|v| v.clone()).unwrap_or_default()
    }
}

#[async_trait]
impl WorkbenchSync for MockWorkbenchSync {
    async fn sync_team(
        &self,
        workbench_id: &str,
        team: &[TeamPermission],
    ) -> Result<(), anyhow::Error> {
        self.calls
            .lock()
            .map_err(|e| anyhow::anyhow!("Mock workbench mutex poisoned: {}", e))?
            .push((workbench_id.to_string(), team.to_vec()));
        Ok(())
    }
}
