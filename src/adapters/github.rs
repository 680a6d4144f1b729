//! GitHub adapter implementing both provider ports
//!
//! Uses the GitHub REST API v3. As a source it pages through an
//! organization's (or user's) repositories; as a destination it edits and
//! archives repositories by numeric id.

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use reqwest::{header, Client, StatusCode};
use serde::Deserialize;

use super::forge_port::{mutation_change, response_error};
use super::{DestinationForge, ForgeError, ForgeResult, SourceForge};
use crate::types::{Change, DestinationProjectState, Forge, ProjectEdit, SourceRepo, Visibility};

/// GitHub repository response from API
#[derive(Debug, Deserialize)]
struct GitHubRepo {
    id: u64,
    name: String,
    full_name: String,
    description: Option<String>,
    #[serde(default)]
    private: bool,
    #[serde(default)]
    visibility: Option<String>,
    #[serde(default)]
    archived: bool,
    #[serde(default)]
    fork: bool,
    clone_url: String,
    html_url: String,
    updated_at: DateTime<Utc>,
}

/// GitHub adapter
pub struct GitHubAdapter {
    client: Client,
    api_url: String,
    web_url: String,
    token: Option<String>,
}

impl GitHubAdapter {
    /// Create an adapter for github.com
    pub fn new(token: Option<String>) -> ForgeResult<Self> {
        Self::with_url(Forge::GitHub.default_web_url(), token)
    }

    /// Create an adapter for a GitHub Enterprise host
    pub fn with_url(web_url: &str, token: Option<String>) -> ForgeResult<Self> {
        let client = Client::builder()
            .user_agent(concat!("forgemirror/", env!("CARGO_PKG_VERSION")))
            .build()
            .map_err(|e| ForgeError::NetworkError(e.to_string()))?;

        let web_url = web_url.trim_end_matches('/').to_string();
        Ok(Self {
            client,
            api_url: Forge::GitHub.api_url(&web_url),
            web_url,
            token,
        })
    }

    /// Request headers; anonymous when no token is configured
    fn headers(&self) -> ForgeResult<header::HeaderMap> {
        let mut headers = header::HeaderMap::new();
        if let Some(token) = &self.token {
            headers.insert(
                header::AUTHORIZATION,
                header::HeaderValue::from_str(&format!("Bearer {}", token))
                    .map_err(|e| ForgeError::AuthenticationFailed { message: e.to_string() })?,
            );
        }
        headers.insert(
            header::ACCEPT,
            header::HeaderValue::from_static("application/vnd.github+json"),
        );
        headers.insert(
            "X-GitHub-Api-Version",
            header::HeaderValue::from_static("2022-11-28"),
        );
        Ok(headers)
    }

    fn to_source_repo(gh_repo: GitHubRepo) -> SourceRepo {
        SourceRepo {
            full_name: gh_repo.full_name,
            name: gh_repo.name,
            clone_url: gh_repo.clone_url,
            web_url: gh_repo.html_url,
            description: gh_repo.description.unwrap_or_default(),
            archived: gh_repo.archived,
            fork: gh_repo.fork,
            updated_at: gh_repo.updated_at,
        }
    }

    fn to_project_state(gh_repo: GitHubRepo) -> DestinationProjectState {
        let visibility = match gh_repo.visibility.as_deref() {
            Some("internal") => Visibility::Internal,
            Some("public") => Visibility::Public,
            Some(_) => Visibility::Private,
            None if gh_repo.private => Visibility::Private,
            None => Visibility::Public,
        };

        DestinationProjectState {
            id: gh_repo.id,
            description: gh_repo.description.unwrap_or_default(),
            visibility,
            archived: gh_repo.archived,
        }
    }

    /// Extract the `rel="next"` URL from a Link header.
    /// GitHub uses: `<url?page=N>; rel="next", <url?page=M>; rel="last"`.
    fn parse_next_link(headers: &header::HeaderMap) -> Option<String> {
        let link_header = headers.get(header::LINK)?.to_str().ok()?;
        link_header.split(',').find_map(|part| {
            let (url_part, params) = part.split_once(';')?;
            if !params.split(';').any(|p| p.trim() == "rel=\"next\"") {
                return None;
            }
            Some(
                url_part
                    .trim()
                    .trim_start_matches('<')
                    .trim_end_matches('>')
                    .to_string(),
            )
        })
    }

    /// Follow Link headers page by page.
    /// Returns `None` when the first page is a 404 (owner of the other kind).
    async fn list_paginated(&self, first_url: String, owner: &str) -> ForgeResult<Option<Vec<SourceRepo>>> {
        let headers = self.headers()?;
        let mut repos = Vec::new();
        let mut next = Some(first_url);
        let mut first = true;

        while let Some(url) = next.take() {
            let response = self.client.get(&url)
                .headers(headers.clone())
                .send()
                .await
                .map_err(|e| ForgeError::NetworkError(e.to_string()))?;

            if first && response.status() == StatusCode::NOT_FOUND {
                return Ok(None);
            }
            first = false;

            if !response.status().is_success() {
                return Err(response_error(Forge::GitHub, response, owner).await);
            }

            next = Self::parse_next_link(response.headers());

            let page: Vec<GitHubRepo> = response.json().await
                .map_err(|e| ForgeError::SerdeError(format!("Failed to parse response: {}", e)))?;
            tracing::trace!("github: {} repositories on page", page.len());
            repos.extend(page.into_iter().map(Self::to_source_repo));
        }

        Ok(Some(repos))
    }

    async fn patch_repository(&self, id: u64, body: serde_json::Value) -> ForgeResult<Change> {
        let url = format!("{}/repositories/{}", self.api_url, id);

        let response = self.client.patch(&url)
            .headers(self.headers()?)
            .json(&body)
            .send()
            .await
            .map_err(|e| ForgeError::NetworkError(e.to_string()))?;

        mutation_change(Forge::GitHub, response, &id.to_string()).await
    }
}

#[async_trait]
impl SourceForge for GitHubAdapter {
    fn forge(&self) -> Forge {
        Forge::GitHub
    }

    async fn list_repositories(&self, owner: &str) -> ForgeResult<Vec<SourceRepo>> {
        let org_url = format!("{}/orgs/{}/repos?per_page=100&type=all", self.api_url, owner);
        if let Some(repos) = self.list_paginated(org_url, owner).await? {
            return Ok(repos);
        }

        // Not an organization: try user repos
        let user_url = format!("{}/users/{}/repos?per_page=100&type=owner", self.api_url, owner);
        self.list_paginated(user_url, owner)
            .await?
            .ok_or_else(|| ForgeError::RepoNotFound { name: owner.to_string() })
    }
}

#[async_trait]
impl DestinationForge for GitHubAdapter {
    fn forge(&self) -> Forge {
        Forge::GitHub
    }

    fn clone_url(&self, namespace: &str, name: &str) -> String {
        format!("{}/{}/{}.git", self.web_url, namespace, name)
    }

    async fn get_project(&self, namespace: &str, name: &str) -> ForgeResult<DestinationProjectState> {
        let url = format!("{}/repos/{}/{}", self.api_url, namespace, name);

        let response = self.client.get(&url)
            .headers(self.headers()?)
            .send()
            .await
            .map_err(|e| ForgeError::NetworkError(e.to_string()))?;

        if !response.status().is_success() {
            return Err(response_error(Forge::GitHub, response, &format!("{}/{}", namespace, name)).await);
        }

        let gh_repo: GitHubRepo = response.json().await
            .map_err(|e| ForgeError::SerdeError(format!("Failed to parse response: {}", e)))?;

        Ok(Self::to_project_state(gh_repo))
    }

    async fn edit_project(&self, id: u64, edit: &ProjectEdit) -> ForgeResult<Change> {
        let body = serde_json::json!({
            "description": edit.description,
            "visibility": edit.visibility.as_str(),
        });
        self.patch_repository(id, body).await
    }

    async fn archive_project(&self, id: u64) -> ForgeResult<Change> {
        self.patch_repository(id, serde_json::json!({ "archived": true })).await
    }

    async fn unarchive_project(&self, id: u64) -> ForgeResult<Change> {
        self.patch_repository(id, serde_json::json!({ "archived": false })).await
    }
}
