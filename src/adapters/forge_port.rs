//! Provider ports - the two capabilities a mirror run needs from a forge
//!
//! `SourceForge` lists the repositories to mirror; `DestinationForge` reads
//! and corrects project metadata on the mirror side. Each provider adapter
//! implements both, so any forge can sit on either side of a run.

use async_trait::async_trait;
use reqwest::{Response, StatusCode};
use thiserror::Error;

use crate::types::{Change, DestinationProjectState, Forge, ProjectEdit, SourceRepo};

/// Errors that can occur when interacting with a forge
#[derive(Debug, Error)]
pub enum ForgeError {
    /// Repository or project not found
    #[error("Repository not found: {name}")]
    RepoNotFound { name: String },

    /// Authentication failed
    #[error("Authentication failed: {message}")]
    AuthenticationFailed { message: String },

    /// Network/connection error
    #[error("Network error: {0}")]
    NetworkError(String),

    /// API error
    #[error("API error: {0}")]
    ApiError(String),

    /// Serialization/deserialization error
    #[error("Serialization error: {0}")]
    SerdeError(String),
}

/// Result type for forge operations
pub type ForgeResult<T> = std::result::Result<T, ForgeError>;

/// Repository discovery on the source side
#[async_trait]
pub trait SourceForge: Send + Sync {
    fn forge(&self) -> Forge;

    /// List every repository of a user or organization, all pages
    async fn list_repositories(&self, owner: &str) -> ForgeResult<Vec<SourceRepo>>;
}

/// Project metadata on the destination side.
///
/// Mutations return `Change::NoChange` when the provider reports the project
/// was already in the requested state.
#[async_trait]
pub trait DestinationForge: Send + Sync {
    fn forge(&self) -> Forge;

    /// Git URL to push the mirror of `namespace/name` to
    fn clone_url(&self, namespace: &str, name: &str) -> String;

    /// Look up a project by namespace and name
    async fn get_project(&self, namespace: &str, name: &str) -> ForgeResult<DestinationProjectState>;

    /// Set description and visibility
    async fn edit_project(&self, id: u64, edit: &ProjectEdit) -> ForgeResult<Change>;

    async fn archive_project(&self, id: u64) -> ForgeResult<Change>;

    async fn unarchive_project(&self, id: u64) -> ForgeResult<Change>;
}

/// Turn a non-success response into a typed error
pub(crate) async fn response_error(forge: Forge, response: Response, name: &str) -> ForgeError {
    let status = response.status();
    let body = response.text().await.unwrap_or_default();

    match status {
        StatusCode::NOT_FOUND => ForgeError::RepoNotFound {
            name: name.to_string(),
        },
        StatusCode::UNAUTHORIZED | StatusCode::FORBIDDEN => ForgeError::AuthenticationFailed {
            message: format!("{} API {}: {}", forge, status, body),
        },
        _ => ForgeError::ApiError(format!("{} API error {}: {}", forge, status, body)),
    }
}

/// Map a mutation response to a `Change`, treating 304 as "already so"
pub(crate) async fn mutation_change(forge: Forge, response: Response, name: &str) -> ForgeResult<Change> {
    if response.status() == StatusCode::NOT_MODIFIED {
        return Ok(Change::NoChange);
    }
    if !response.status().is_success() {
        return Err(response_error(forge, response, name).await);
    }
    Ok(Change::Updated)
}
