//! Per-repository reconciliation results

use crate::error::MirrorError;

/// Result of a mutating operation that may legitimately find nothing to do.
///
/// Fetch, push, and provider updates report `NoChange` instead of failing
/// when the target is already up to date.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Change {
    Updated,
    NoChange,
}

impl Change {
    pub fn from_count(count: usize) -> Self {
        if count == 0 {
            Change::NoChange
        } else {
            Change::Updated
        }
    }
}

/// How the local mirror was brought up to date
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CacheRefresh {
    /// First encounter: full clone
    Cloned,
    /// Existing mirror: incremental fetch
    Fetched(Change),
}

/// What the remote reconciler had to do
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RemoteAction {
    /// Remote already had exactly the desired URL
    Unchanged,
    Created,
    /// Stale remote deleted and recreated
    Replaced,
}

/// Pipeline phase, used to tag failures
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SyncPhase {
    /// Loading configuration and preparing local storage
    Setup,
    Discovery,
    Fetch,
    Remote,
    Push,
    Metadata,
}

impl std::fmt::Display for SyncPhase {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let name = match self {
            SyncPhase::Setup => "setup",
            SyncPhase::Discovery => "discovery",
            SyncPhase::Fetch => "fetch",
            SyncPhase::Remote => "remote",
            SyncPhase::Push => "push",
            SyncPhase::Metadata => "metadata",
        };
        f.write_str(name)
    }
}

/// Outcome of the git half of the pipeline (cache, remote, push)
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct GitReport {
    pub refresh: CacheRefresh,
    pub remote: RemoteAction,
    pub push: Change,
}

impl GitReport {
    /// True when nothing was fetched, reconfigured, or pushed
    pub fn is_noop(&self) -> bool {
        self.refresh == CacheRefresh::Fetched(Change::NoChange)
            && self.remote == RemoteAction::Unchanged
            && self.push == Change::NoChange
    }
}

/// Provider calls issued by the metadata reconciler
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct MetadataReport {
    pub description: Change,
    pub archive: Change,
}

impl Default for MetadataReport {
    fn default() -> Self {
        Self {
            description: Change::NoChange,
            archive: Change::NoChange,
        }
    }
}

/// Everything that happened to one repository in a successful pass
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RepoReport {
    pub name: String,
    pub git: GitReport,
    /// Destination was unarchived so a failed push could be retried
    pub unarchived_for_push: bool,
    pub metadata: MetadataReport,
}

impl RepoReport {
    pub fn is_noop(&self) -> bool {
        self.git.is_noop()
            && !self.unarchived_for_push
            && self.metadata == MetadataReport::default()
    }
}

/// Per-repository result of one orchestration pass
#[derive(Debug)]
pub struct SyncOutcome {
    pub repo: String,
    pub result: Result<RepoReport, MirrorError>,
}

impl SyncOutcome {
    pub fn is_success(&self) -> bool {
        self.result.is_ok()
    }

    /// Failing phase, if the repository failed
    pub fn failed_phase(&self) -> Option<SyncPhase> {
        self.result.as_ref().err().map(MirrorError::phase)
    }
}

/// All outcomes of one run, in discovery order
#[derive(Debug, Default)]
pub struct RunSummary {
    pub outcomes: Vec<SyncOutcome>,
}

impl RunSummary {
    pub fn succeeded(&self) -> impl Iterator<Item = &SyncOutcome> {
        self.outcomes.iter().filter(|o| o.is_success())
    }

    pub fn failed(&self) -> impl Iterator<Item = &SyncOutcome> {
        self.outcomes.iter().filter(|o| !o.is_success())
    }

    pub fn get(&self, repo: &str) -> Option<&SyncOutcome> {
        self.outcomes.iter().find(|o| o.repo == repo)
    }
}
