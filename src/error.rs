use thiserror::Error;

use crate::adapters::ForgeError;
use crate::git::GitError;
use crate::types::SyncPhase;

/// Phase-tagged errors of a mirror run.
///
/// Every per-repository variant names the repository, so the `Display` form is
/// the one-line log message for that failure.
#[derive(Debug, Error)]
pub enum MirrorError {
    #[error("listing repositories for {owner}: {source}")]
    Discovery {
        owner: String,
        #[source]
        source: ForgeError,
    },

    #[error("{repo}: fetching: {source}")]
    Fetch {
        repo: String,
        #[source]
        source: GitError,
    },

    #[error("{repo}: configuring remote {remote}: {source}")]
    RemoteConfig {
        repo: String,
        remote: String,
        #[source]
        source: GitError,
    },

    #[error("{repo}: pushing to {destination}: {source}")]
    Push {
        repo: String,
        destination: String,
        #[source]
        source: GitError,
    },

    #[error("{repo}: {action}: {source}")]
    Metadata {
        repo: String,
        action: &'static str,
        #[source]
        source: ForgeError,
    },

    #[error("Config error: {0}")]
    Config(String),

    #[error("Storage error: {0}")]
    Io(#[from] std::io::Error),

    #[error("{repo}: {phase} task failed: {message}")]
    Task {
        repo: String,
        phase: SyncPhase,
        message: String,
    },
}

impl MirrorError {
    /// Pipeline phase the error belongs to
    pub fn phase(&self) -> SyncPhase {
        match self {
            MirrorError::Config(_) | MirrorError::Io(_) => SyncPhase::Setup,
            MirrorError::Discovery { .. } => SyncPhase::Discovery,
            MirrorError::Fetch { .. } => SyncPhase::Fetch,
            MirrorError::RemoteConfig { .. } => SyncPhase::Remote,
            MirrorError::Push { .. } => SyncPhase::Push,
            MirrorError::Metadata { .. } => SyncPhase::Metadata,
            MirrorError::Task { phase, .. } => *phase,
        }
    }

    pub(crate) fn metadata(repo: &str, action: &'static str, source: ForgeError) -> Self {
        MirrorError::Metadata {
            repo: repo.to_string(),
            action,
            source,
        }
    }
}

pub type Result<T> = std::result::Result<T, MirrorError>;
