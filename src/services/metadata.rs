//! Metadata reconciler
//!
//! Compares a source repository with its destination project and issues the
//! smallest set of provider calls that brings description, visibility, and
//! archive state in line with the mirror policy. Planning is pure; `apply`
//! performs the calls.

use chrono::{DateTime, Duration, Utc};
use serde::{Deserialize, Serialize};

use crate::adapters::DestinationForge;
use crate::error::{MirrorError, Result};
use crate::types::{DestinationProjectState, MetadataReport, ProjectEdit, SourceRepo, Visibility};

/// Forks untouched for this long get archived on the destination
pub const DEFAULT_STALE_FORK_DAYS: i64 = 730;

/// Rule deciding whether the destination description is already acceptable
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum DescriptionMatch {
    /// Destination must start with the full desired description
    #[default]
    Desired,
    /// Destination must start with the raw source description
    Source,
}

/// Tunable mirror policy
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MetadataPolicy {
    pub stale_fork_after: Duration,
    pub description_match: DescriptionMatch,
    /// Visibility reasserted on every description update
    pub visibility: Visibility,
}

impl Default for MetadataPolicy {
    fn default() -> Self {
        Self {
            stale_fork_after: Duration::days(DEFAULT_STALE_FORK_DAYS),
            description_match: DescriptionMatch::default(),
            visibility: Visibility::Public,
        }
    }
}

/// Provider calls a reconciliation needs
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct MetadataPlan {
    pub edit: Option<ProjectEdit>,
    pub archive: bool,
}

impl MetadataPlan {
    pub fn is_empty(&self) -> bool {
        self.edit.is_none() && !self.archive
    }
}

impl MetadataPolicy {
    /// Description the destination should carry
    pub fn desired_description(&self, source: &SourceRepo) -> String {
        let identity = source.identity();
        let description = source.description.trim();
        if description.is_empty() {
            format!("Mirror of {}", identity)
        } else {
            format!("{} (mirror of {})", description, identity)
        }
    }

    pub fn description_needs_update(&self, source: &SourceRepo, current: &str) -> bool {
        match self.description_match {
            DescriptionMatch::Desired => !current.starts_with(&self.desired_description(source)),
            DescriptionMatch::Source => {
                let source_description = source.description.trim();
                (source_description.is_empty() && current.is_empty())
                    || !current.starts_with(source_description)
            }
        }
    }

    /// Archived at the source, or a fork gone stale.
    ///
    /// A window reaching past the earliest representable time never goes stale.
    pub fn should_archive(&self, source: &SourceRepo, now: DateTime<Utc>) -> bool {
        source.archived
            || (source.fork
                && now
                    .checked_sub_signed(self.stale_fork_after)
                    .is_some_and(|cutoff| source.updated_at < cutoff))
    }

    pub fn plan(&self, source: &SourceRepo, project: &DestinationProjectState, now: DateTime<Utc>) -> MetadataPlan {
        let edit = self
            .description_needs_update(source, &project.description)
            .then(|| ProjectEdit {
                description: self.desired_description(source),
                visibility: self.visibility,
            });

        MetadataPlan {
            edit,
            archive: !project.archived && self.should_archive(source, now),
        }
    }
}

/// Issue the planned calls.
///
/// Both calls are attempted even if the first fails; the first error wins.
pub async fn apply(
    forge: &dyn DestinationForge,
    repo: &str,
    project: &DestinationProjectState,
    plan: &MetadataPlan,
) -> Result<MetadataReport> {
    let mut report = MetadataReport::default();
    let mut first_error: Option<MirrorError> = None;

    if let Some(edit) = &plan.edit {
        tracing::debug!("{}: setting description {:?}", repo, edit.description);
        match forge.edit_project(project.id, edit).await {
            Ok(change) => report.description = change,
            Err(e) => first_error = Some(MirrorError::metadata(repo, "updating description", e)),
        }
    }

    if plan.archive {
        tracing::debug!("{}: archiving destination project {}", repo, project.id);
        match forge.archive_project(project.id).await {
            Ok(change) => report.archive = change,
            Err(e) => {
                first_error.get_or_insert(MirrorError::metadata(repo, "archiving project", e));
            }
        }
    }

    match first_error {
        Some(e) => Err(e),
        None => Ok(report),
    }
}

/// Plan and apply in one step
pub async fn reconcile(
    forge: &dyn DestinationForge,
    policy: &MetadataPolicy,
    source: &SourceRepo,
    project: &DestinationProjectState,
    now: DateTime<Utc>,
) -> Result<MetadataReport> {
    let plan = policy.plan(source, project, now);
    if plan.is_empty() {
        return Ok(MetadataReport::default());
    }
    apply(forge, &source.full_name, project, &plan).await
}
