//! Core types for forgemirror

pub mod outcome;
pub mod project;
pub mod repo;

use serde::{Deserialize, Serialize};

pub use outcome::{
    CacheRefresh, Change, GitReport, MetadataReport, RemoteAction, RepoReport, RunSummary,
    SyncOutcome, SyncPhase,
};
pub use project::{DestinationProjectState, ProjectEdit};
pub use repo::{Credentials, MirrorPair, RepositoryRef, SourceRepo};

/// Supported git forges
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Forge {
    GitHub,
    GitLab,
}

impl Forge {
    /// Public web base URL of the hosted instance
    pub fn default_web_url(self) -> &'static str {
        match self {
            Forge::GitHub => "https://github.com",
            Forge::GitLab => "https://gitlab.com",
        }
    }

    /// REST API base URL for a given web base URL.
    ///
    /// github.com serves its API from a separate host; GitHub Enterprise and
    /// every GitLab instance serve it under the web host.
    pub fn api_url(self, web_url: &str) -> String {
        let web_url = web_url.trim_end_matches('/');
        match self {
            Forge::GitHub if web_url == "https://github.com" => "https://api.github.com".to_string(),
            Forge::GitHub => format!("{}/api/v3", web_url),
            Forge::GitLab => format!("{}/api/v4", web_url),
        }
    }

    /// Username paired with a bare access token for HTTPS git auth
    pub fn token_username(self) -> &'static str {
        match self {
            Forge::GitHub => "x-access-token",
            Forge::GitLab => "oauth2",
        }
    }
}

impl std::fmt::Display for Forge {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Forge::GitHub => write!(f, "github"),
            Forge::GitLab => write!(f, "gitlab"),
        }
    }
}

impl std::str::FromStr for Forge {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_lowercase().as_str() {
            "github" => Ok(Forge::GitHub),
            "gitlab" => Ok(Forge::GitLab),
            _ => Err(format!("Unknown forge: {}", s)),
        }
    }
}

/// Repository visibility
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Visibility {
    #[default]
    Public,
    Internal,
    Private,
}

impl Visibility {
    pub fn as_str(self) -> &'static str {
        match self {
            Visibility::Public => "public",
            Visibility::Internal => "internal",
            Visibility::Private => "private",
        }
    }
}

impl std::fmt::Display for Visibility {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_forge_round_trip_names() {
        assert_eq!("GitHub".parse::<Forge>().unwrap(), Forge::GitHub);
        assert_eq!("gitlab".parse::<Forge>().unwrap(), Forge::GitLab);
        assert!("codeberg".parse::<Forge>().is_err());
        assert_eq!(Forge::GitLab.to_string(), "gitlab");
    }

    #[test]
    fn test_api_url() {
        assert_eq!(Forge::GitHub.api_url("https://github.com/"), "https://api.github.com");
        assert_eq!(
            Forge::GitHub.api_url("https://ghe.example.com"),
            "https://ghe.example.com/api/v3"
        );
        assert_eq!(Forge::GitLab.api_url("https://kastelo.io"), "https://kastelo.io/api/v4");
    }
}
