//! Repository identity types

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use super::DestinationProjectState;

/// Basic-auth style credentials for a clone/fetch/push.
///
/// Never persisted; only handed to libgit2 for the duration of one call.
#[derive(Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Credentials {
    pub username: String,
    pub token: String,
}

impl Credentials {
    pub fn new(username: impl Into<String>, token: impl Into<String>) -> Self {
        Self {
            username: username.into(),
            token: token.into(),
        }
    }

    /// Build credentials from optional CLI/env values.
    ///
    /// Returns `None` when neither a user nor a token is set. A token without
    /// a user gets `default_user`.
    pub fn from_parts(user: Option<String>, token: Option<String>, default_user: &str) -> Option<Self> {
        match (user, token) {
            (None, None) => None,
            (user, token) => Some(Self {
                username: user.unwrap_or_else(|| default_user.to_string()),
                token: token.unwrap_or_default(),
            }),
        }
    }
}

impl std::fmt::Debug for Credentials {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Credentials")
            .field("username", &self.username)
            .field("token", &"<redacted>")
            .finish()
    }
}

/// Identity of a repository at a provider
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RepositoryRef {
    /// Display name used in logs
    pub name: String,

    /// URL git clones from / pushes to
    pub url: String,

    pub credentials: Option<Credentials>,
}

impl RepositoryRef {
    pub fn new(name: impl Into<String>, url: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            url: url.into(),
            credentials: None,
        }
    }

    pub fn with_credentials(mut self, credentials: Option<Credentials>) -> Self {
        self.credentials = credentials;
        self
    }
}

/// A repository as returned by a source listing
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SourceRepo {
    /// Owner-qualified name, e.g. `alice/widget`
    pub full_name: String,

    /// Short name, e.g. `widget`
    pub name: String,

    pub clone_url: String,

    /// Browser URL, e.g. `https://github.com/alice/widget`
    pub web_url: String,

    #[serde(default)]
    pub description: String,

    #[serde(default)]
    pub archived: bool,

    #[serde(default)]
    pub fork: bool,

    pub updated_at: DateTime<Utc>,
}

impl SourceRepo {
    /// Create a listing entry with empty description and current timestamp
    pub fn new(full_name: impl Into<String>, clone_url: impl Into<String>) -> Self {
        let full_name = full_name.into();
        let name = full_name.rsplit('/').next().unwrap_or_default().to_string();
        Self {
            web_url: format!("https://github.com/{}", full_name),
            full_name,
            name,
            clone_url: clone_url.into(),
            description: String::new(),
            archived: false,
            fork: false,
            updated_at: Utc::now(),
        }
    }

    pub fn with_description(mut self, description: impl Into<String>) -> Self {
        self.description = description.into();
        self
    }

    pub fn with_web_url(mut self, web_url: impl Into<String>) -> Self {
        self.web_url = web_url.into();
        self
    }

    pub fn with_archived(mut self, archived: bool) -> Self {
        self.archived = archived;
        self
    }

    pub fn with_fork(mut self, fork: bool) -> Self {
        self.fork = fork;
        self
    }

    pub fn with_updated_at(mut self, updated_at: DateTime<Utc>) -> Self {
        self.updated_at = updated_at;
        self
    }

    /// Human identity used in mirror descriptions, e.g. `github.com/alice/widget`
    pub fn identity(&self) -> String {
        let url = self.web_url.trim_end_matches('/');
        url.split_once("://")
            .map_or(url, |(_, rest)| rest)
            .to_string()
    }

    /// The repository to clone/fetch from
    pub fn to_ref(&self, credentials: Option<Credentials>) -> RepositoryRef {
        RepositoryRef::new(&self.full_name, &self.clone_url).with_credentials(credentials)
    }
}

/// One source -> destination pairing, built per orchestration pass
#[derive(Debug, Clone)]
pub struct MirrorPair {
    pub source: RepositoryRef,
    pub destination: RepositoryRef,
    pub destination_metadata: DestinationProjectState,
}
