//! GitLab adapter implementing both provider ports
//!
//! Uses the GitLab REST API v4. Projects are addressed by their URL-encoded
//! `namespace/name` path for lookups and by numeric id for mutations.

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use reqwest::{header, Client, StatusCode};
use serde::Deserialize;

use super::forge_port::{mutation_change, response_error};
use super::{DestinationForge, ForgeError, ForgeResult, SourceForge};
use crate::types::{Change, DestinationProjectState, Forge, ProjectEdit, SourceRepo, Visibility};

/// GitLab project response from API
#[derive(Debug, Deserialize)]
struct GitLabProject {
    id: u64,
    path: String,
    path_with_namespace: String,
    description: Option<String>,
    #[serde(default)]
    visibility: Option<String>,
    #[serde(default)]
    archived: bool,
    http_url_to_repo: String,
    web_url: String,
    #[serde(default)]
    forked_from_project: Option<serde_json::Value>,
    last_activity_at: DateTime<Utc>,
}

/// GitLab adapter
pub struct GitLabAdapter {
    client: Client,
    api_url: String,
    web_url: String,
    token: Option<String>,
}

impl GitLabAdapter {
    /// Create an adapter for gitlab.com
    pub fn new(token: Option<String>) -> ForgeResult<Self> {
        Self::with_url(Forge::GitLab.default_web_url(), token)
    }

    /// Create an adapter for a self-hosted instance; the API lives under `/api/v4`
    pub fn with_url(web_url: &str, token: Option<String>) -> ForgeResult<Self> {
        let client = Client::builder()
            .user_agent(concat!("forgemirror/", env!("CARGO_PKG_VERSION")))
            .build()
            .map_err(|e| ForgeError::NetworkError(e.to_string()))?;

        let web_url = web_url.trim_end_matches('/').to_string();
        Ok(Self {
            client,
            api_url: Forge::GitLab.api_url(&web_url),
            web_url,
            token,
        })
    }

    fn headers(&self) -> ForgeResult<header::HeaderMap> {
        let mut headers = header::HeaderMap::new();
        if let Some(token) = &self.token {
            headers.insert(
                "PRIVATE-TOKEN",
                header::HeaderValue::from_str(token)
                    .map_err(|e| ForgeError::AuthenticationFailed { message: e.to_string() })?,
            );
        }
        headers.insert(
            header::ACCEPT,
            header::HeaderValue::from_static("application/json"),
        );
        Ok(headers)
    }

    fn to_source_repo(project: GitLabProject) -> SourceRepo {
        SourceRepo {
            full_name: project.path_with_namespace,
            name: project.path,
            clone_url: project.http_url_to_repo,
            web_url: project.web_url,
            description: project.description.unwrap_or_default(),
            archived: project.archived,
            fork: project.forked_from_project.is_some(),
            updated_at: project.last_activity_at,
        }
    }

    fn to_project_state(project: GitLabProject) -> DestinationProjectState {
        let visibility = match project.visibility.as_deref() {
            Some("public") => Visibility::Public,
            Some("internal") => Visibility::Internal,
            _ => Visibility::Private,
        };

        DestinationProjectState {
            id: project.id,
            description: project.description.unwrap_or_default(),
            visibility,
            archived: project.archived,
        }
    }

    /// Next page number from `X-Next-Page`; empty on the last page
    fn parse_next_page(headers: &header::HeaderMap) -> Option<u32> {
        headers
            .get("x-next-page")?
            .to_str()
            .ok()?
            .trim()
            .parse()
            .ok()
    }

    /// Projects owned by a group; projects shared into it from elsewhere are excluded
    fn group_projects_url(&self, group: &str) -> String {
        format!(
            "{}/groups/{}/projects?with_shared=false",
            self.api_url,
            urlencoding::encode(group)
        )
    }

    fn user_projects_url(&self, user: &str) -> String {
        format!("{}/users/{}/projects", self.api_url, urlencoding::encode(user))
    }

    /// Walk every page of a project listing.
    /// Returns `None` when the first page is a 404 (owner of the other kind).
    async fn list_paginated(&self, base_url: &str, owner: &str) -> ForgeResult<Option<Vec<SourceRepo>>> {
        let headers = self.headers()?;
        let mut projects = Vec::new();
        let mut page = 1u32;

        let separator = if base_url.contains('?') { '&' } else { '?' };

        loop {
            let url = format!("{}{}per_page=100&page={}", base_url, separator, page);
            let response = self.client.get(&url)
                .headers(headers.clone())
                .send()
                .await
                .map_err(|e| ForgeError::NetworkError(e.to_string()))?;

            if page == 1 && response.status() == StatusCode::NOT_FOUND {
                return Ok(None);
            }

            if !response.status().is_success() {
                return Err(response_error(Forge::GitLab, response, owner).await);
            }

            let next = Self::parse_next_page(response.headers());

            let batch: Vec<GitLabProject> = response.json().await
                .map_err(|e| ForgeError::SerdeError(format!("Failed to parse response: {}", e)))?;
            tracing::trace!("gitlab: {} projects on page {}", batch.len(), page);
            projects.extend(batch.into_iter().map(Self::to_source_repo));

            match next {
                Some(n) if n > page => page = n,
                _ => break,
            }
        }

        Ok(Some(projects))
    }

    async fn post_project_action(&self, id: u64, action: &str) -> ForgeResult<Change> {
        let url = format!("{}/projects/{}/{}", self.api_url, id, action);

        let response = self.client.post(&url)
            .headers(self.headers()?)
            .send()
            .await
            .map_err(|e| ForgeError::NetworkError(e.to_string()))?;

        mutation_change(Forge::GitLab, response, &id.to_string()).await
    }
}

#[async_trait]
impl SourceForge for GitLabAdapter {
    fn forge(&self) -> Forge {
        Forge::GitLab
    }

    async fn list_repositories(&self, owner: &str) -> ForgeResult<Vec<SourceRepo>> {
        if let Some(projects) = self.list_paginated(&self.group_projects_url(owner), owner).await? {
            return Ok(projects);
        }

        // Not a group: try user projects
        self.list_paginated(&self.user_projects_url(owner), owner)
            .await?
            .ok_or_else(|| ForgeError::RepoNotFound { name: owner.to_string() })
    }
}

#[async_trait]
impl DestinationForge for GitLabAdapter {
    fn forge(&self) -> Forge {
        Forge::GitLab
    }

    fn clone_url(&self, namespace: &str, name: &str) -> String {
        format!("{}/{}/{}.git", self.web_url, namespace, name)
    }

    async fn get_project(&self, namespace: &str, name: &str) -> ForgeResult<DestinationProjectState> {
        let path = format!("{}/{}", namespace, name);
        let url = format!("{}/projects/{}", self.api_url, urlencoding::encode(&path));

        let response = self.client.get(&url)
            .headers(self.headers()?)
            .send()
            .await
            .map_err(|e| ForgeError::NetworkError(e.to_string()))?;

        if !response.status().is_success() {
            return Err(response_error(Forge::GitLab, response, &path).await);
        }

        let project: GitLabProject = response.json().await
            .map_err(|e| ForgeError::SerdeError(format!("Failed to parse response: {}", e)))?;

        Ok(Self::to_project_state(project))
    }

    async fn edit_project(&self, id: u64, edit: &ProjectEdit) -> ForgeResult<Change> {
        let url = format!("{}/projects/{}", self.api_url, id);
        let body = serde_json::json!({
            "description": edit.description,
            "visibility": edit.visibility.as_str(),
        });

        let response = self.client.put(&url)
            .headers(self.headers()?)
            .json(&body)
            .send()
            .await
            .map_err(|e| ForgeError::NetworkError(e.to_string()))?;

        mutation_change(Forge::GitLab, response, &id.to_string()).await
    }

    async fn archive_project(&self, id: u64) -> ForgeResult<Change> {
        self.post_project_action(id, "archive").await
    }

    async fn unarchive_project(&self, id: u64) -> ForgeResult<Change> {
        self.post_project_action(id, "unarchive").await
    }
}
