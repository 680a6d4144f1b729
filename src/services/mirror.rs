//! MirrorService - per-repository reconciliation pipeline
//!
//! For each source repository:
//! 1. Look up the destination project (id, description, archive state)
//! 2. Clone or fetch the local mirror
//! 3. Point the destination remote at the project's clone URL
//! 4. Push every branch and tag; unarchive and retry once if the project is archived
//! 5. Reconcile description, visibility, and archive state
//!
//! A failure in any step ends that repository's pass and is recorded in the
//! run summary; the next repository is processed regardless.

use std::sync::Arc;

use chrono::{DateTime, Utc};

use super::metadata::{self, MetadataPolicy};
use super::push::push_all;
use super::remote::ensure_remote;
use crate::adapters::{DestinationForge, SourceForge};
use crate::cache::{LocalMirror, MirrorCache};
use crate::error::{MirrorError, Result};
use crate::git;
use crate::types::{
    CacheRefresh, Change, Credentials, GitReport, MirrorPair,
    RemoteAction, RepoReport, RepositoryRef, RunSummary, SourceRepo, SyncOutcome, SyncPhase,
};

/// Orchestrates mirror runs against one destination namespace
pub struct MirrorService {
    git: GitMirror,
    destination: Arc<dyn DestinationForge>,
    namespace: String,
    source_credentials: Option<Credentials>,
    destination_credentials: Option<Credentials>,
    policy: MetadataPolicy,
}

impl MirrorService {
    /// Create a service pushing into `namespace` at `destination`.
    /// The destination remote is named after the destination forge.
    pub fn new(cache: MirrorCache, destination: Arc<dyn DestinationForge>, namespace: impl Into<String>) -> Self {
        let git = GitMirror::new(cache, destination.forge().to_string());
        Self {
            git,
            destination,
            namespace: namespace.into(),
            source_credentials: None,
            destination_credentials: None,
            policy: MetadataPolicy::default(),
        }
    }

    pub fn with_remote_name(mut self, name: impl Into<String>) -> Self {
        self.git.remote_name = name.into();
        self
    }

    pub fn with_source_credentials(mut self, credentials: Option<Credentials>) -> Self {
        self.source_credentials = credentials;
        self
    }

    pub fn with_destination_credentials(mut self, credentials: Option<Credentials>) -> Self {
        self.destination_credentials = credentials;
        self
    }

    pub fn with_policy(mut self, policy: MetadataPolicy) -> Self {
        self.policy = policy;
        self
    }

    pub fn cache(&self) -> &MirrorCache {
        self.git.cache()
    }

    /// List `owner`'s repositories and mirror all of them.
    ///
    /// Only a listing failure is returned as an error; per-repository
    /// failures end up in the summary.
    pub async fn discover_and_run(&self, source: &dyn SourceForge, owner: &str) -> Result<RunSummary> {
        let repos = source
            .list_repositories(owner)
            .await
            .map_err(|e| MirrorError::Discovery {
                owner: owner.to_string(),
                source: e,
            })?;

        tracing::info!(
            "{}: {} repositories on {} to mirror into {}/{}",
            owner,
            repos.len(),
            source.forge(),
            self.destination.forge(),
            self.namespace
        );
        Ok(self.run(&repos).await)
    }

    /// Reconcile each repository in order, one at a time
    pub async fn run(&self, repos: &[SourceRepo]) -> RunSummary {
        let now = Utc::now();
        let mut summary = RunSummary::default();

        for repo in repos {
            let result = self.reconcile(repo, now).await;
            match &result {
                Ok(report) if report.is_noop() => tracing::debug!("{}: up to date", repo.full_name),
                Ok(report) => tracing::info!(
                    "{}: refresh={:?} remote={:?} push={:?} description={:?} archive={:?}",
                    repo.full_name,
                    report.git.refresh,
                    report.git.remote,
                    report.git.push,
                    report.metadata.description,
                    report.metadata.archive
                ),
                Err(e) => tracing::error!("{}", e),
            }
            summary.outcomes.push(SyncOutcome {
                repo: repo.full_name.clone(),
                result,
            });
        }

        tracing::info!(
            "{} succeeded, {} failed",
            summary.succeeded().count(),
            summary.failed().count()
        );
        summary
    }

    /// Run the full pipeline for one repository
    pub async fn reconcile(&self, source: &SourceRepo, now: DateTime<Utc>) -> Result<RepoReport> {
        let name = source.full_name.clone();

        let project = self
            .destination
            .get_project(&self.namespace, &source.name)
            .await
            .map_err(|e| MirrorError::metadata(&name, "looking up destination project", e))?;

        let mut pair = MirrorPair {
            source: source.to_ref(self.source_credentials.clone()),
            destination: RepositoryRef::new(
                format!("{}/{}", self.namespace, source.name),
                self.destination.clone_url(&self.namespace, &source.name),
            )
            .with_credentials(self.destination_credentials.clone()),
            destination_metadata: project,
        };

        let (mirror, refresh, remote) = self.git.prepare(&pair.source, &pair.destination, None).await?;
        let (mirror, first_push) = self.git.push(mirror, &pair.source, &pair.destination).await?;

        let mut unarchived_for_push = false;
        let push = match first_push {
            Ok(change) => change,
            Err(e) if pair.destination_metadata.archived => {
                tracing::warn!("{}; destination is archived, unarchiving and retrying", e);
                if let Err(unarchive_err) = self
                    .destination
                    .unarchive_project(pair.destination_metadata.id)
                    .await
                {
                    tracing::warn!("{}: unarchiving failed: {}", name, unarchive_err);
                    return Err(e);
                }
                pair.destination_metadata.archived = false;
                unarchived_for_push = true;
                let (_, retry) = self.git.push(mirror, &pair.source, &pair.destination).await?;
                retry?
            }
            Err(e) => return Err(e),
        };

        let metadata = metadata::reconcile(
            self.destination.as_ref(),
            &self.policy,
            source,
            &pair.destination_metadata,
            now,
        )
        .await?;

        Ok(RepoReport {
            name,
            git: GitReport { refresh, remote, push },
            unarchived_for_push,
            metadata,
        })
    }
}

/// Git half of the pipeline: refresh the local mirror, converge the
/// destination remote, push. No provider API calls.
#[derive(Debug, Clone)]
pub struct GitMirror {
    cache: MirrorCache,
    remote_name: String,
}

impl GitMirror {
    pub fn new(cache: MirrorCache, remote_name: impl Into<String>) -> Self {
        Self {
            cache,
            remote_name: remote_name.into(),
        }
    }

    pub fn cache(&self) -> &MirrorCache {
        &self.cache
    }

    /// Mirror one source to one destination.
    ///
    /// `head` names the branch the local mirror's HEAD should point at after
    /// fetching.
    pub async fn mirror(
        &self,
        source: &RepositoryRef,
        destination: &RepositoryRef,
        head: Option<&str>,
    ) -> Result<GitReport> {
        let (mirror, refresh, remote) = self.prepare(source, destination, head.map(String::from)).await?;
        let (_, push) = self.push(mirror, source, destination).await?;
        Ok(GitReport {
            refresh,
            remote,
            push: push?,
        })
    }

    /// Fetch (or clone) the mirror and converge the destination remote
    async fn prepare(
        &self,
        source: &RepositoryRef,
        destination: &RepositoryRef,
        head: Option<String>,
    ) -> Result<(LocalMirror, CacheRefresh, RemoteAction)> {
        let cache = self.cache.clone();
        let source = source.clone();
        let destination_url = destination.url.clone();
        let remote_name = self.remote_name.clone();
        let repo = source.name.clone();

        run_blocking(&repo, SyncPhase::Fetch, move || {
            let (mirror, refresh) = cache.ensure(&source)?;

            if let Some(head) = head {
                git::set_head_branch(mirror.repository(), &head).map_err(|e| MirrorError::Fetch {
                    repo: source.name.clone(),
                    source: e,
                })?;
            }

            let remote = ensure_remote(mirror.repository(), &remote_name, &destination_url)
                .map_err(|e| MirrorError::RemoteConfig {
                    repo: source.name.clone(),
                    remote: remote_name.clone(),
                    source: e,
                })?;

            Ok((mirror, refresh, remote))
        })
        .await
    }

    /// Push all refs; the mirror is handed back so a retry can reuse it.
    /// The outer error is a task failure, the inner one a push failure.
    async fn push(
        &self,
        mirror: LocalMirror,
        source: &RepositoryRef,
        destination: &RepositoryRef,
    ) -> Result<(LocalMirror, Result<Change>)> {
        let repo = source.name.clone();
        let destination = destination.clone();
        let remote_name = self.remote_name.clone();

        run_blocking(&source.name, SyncPhase::Push, move || {
            let result = push_all(mirror.repository(), &remote_name, destination.credentials.as_ref())
                .map_err(|e| MirrorError::Push {
                    repo,
                    destination: destination.name.clone(),
                    source: e,
                });
            Ok((mirror, result))
        })
        .await
    }
}

/// Run blocking git work off the async runtime
async fn run_blocking<T, F>(repo: &str, phase: SyncPhase, work: F) -> Result<T>
where
    F: FnOnce() -> Result<T> + Send + 'static,
    T: Send + 'static,
{
    tokio::task::spawn_blocking(work)
        .await
        .map_err(|e| MirrorError::Task {
            repo: repo.to_string(),
            phase,
            message: e.to_string(),
        })?
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::adapters::{ForgeCall, InMemoryForge};
    use crate::types::{DestinationProjectState, Forge};
    use git2::{Repository, Signature};
    use std::path::Path;
    use tempfile::TempDir;

    fn commit(repo: &Repository, message: &str) {
        let sig = Signature::now("Test", "test@test.com").unwrap();
        let blob = repo.blob(message.as_bytes()).unwrap();
        let mut builder = repo.treebuilder(None).unwrap();
        builder.insert("file.txt", blob, 0o100_644).unwrap();
        let tree = repo.find_tree(builder.write().unwrap()).unwrap();
        let parent = repo
            .find_reference("refs/heads/main")
            .ok()
            .and_then(|r| r.peel_to_commit().ok());
        let parents: Vec<&git2::Commit<'_>> = parent.iter().collect();
        repo.commit(Some("refs/heads/main"), &sig, &sig, message, &tree, &parents)
            .unwrap();
    }

    fn source_repo(root: &Path, name: &str) -> SourceRepo {
        let path = root.join("source").join(format!("{}.git", name));
        let repo = Repository::init_bare(&path).unwrap();
        commit(&repo, "initial");
        SourceRepo::new(format!("alice/{}", name), path.to_str().unwrap())
    }

    fn service(root: &Path, forge: &InMemoryForge) -> MirrorService {
        MirrorService::new(
            MirrorCache::new(root.join("cache")),
            Arc::new(forge.clone()),
            "mirrors",
        )
    }

    #[tokio::test]
    async fn test_reconcile_creates_mirror_and_fixes_metadata() {
        let temp = TempDir::new().unwrap();
        let source = source_repo(temp.path(), "widget");
        let dest_root = temp.path().join("dest");
        Repository::init_bare(dest_root.join("mirrors").join("widget.git")).unwrap();
        let forge = InMemoryForge::new(Forge::GitLab, dest_root.to_str().unwrap())
            .with_project("mirrors", "widget", DestinationProjectState::new(5));

        let report = service(temp.path(), &forge)
            .reconcile(&source, Utc::now())
            .await
            .unwrap();

        assert_eq!(report.git.refresh, CacheRefresh::Cloned);
        assert_eq!(report.git.remote, RemoteAction::Created);
        assert_eq!(report.git.push, Change::Updated);
        assert_eq!(report.metadata.description, Change::Updated);
        assert!(!report.unarchived_for_push);

        let project = forge.project("mirrors", "widget").unwrap();
        assert_eq!(project.description, "Mirror of github.com/alice/widget");
    }

    #[tokio::test]
    async fn test_missing_project_skips_git_work() {
        let temp = TempDir::new().unwrap();
        let source = source_repo(temp.path(), "widget");
        let forge = InMemoryForge::new(Forge::GitLab, "/nowhere");
        let service = service(temp.path(), &forge);

        let err = service.reconcile(&source, Utc::now()).await.unwrap_err();
        assert_eq!(err.phase(), SyncPhase::Metadata);
        assert!(!service.cache().path_for(&source.clone_url).exists());
        assert!(forge.mutations().is_empty());
    }

    #[tokio::test]
    async fn test_push_failure_without_archive_is_not_retried() {
        let temp = TempDir::new().unwrap();
        let source = source_repo(temp.path(), "widget");
        let dest_root = temp.path().join("dest");
        let forge = InMemoryForge::new(Forge::GitLab, dest_root.to_str().unwrap())
            .with_project("mirrors", "widget", DestinationProjectState::new(5));

        let err = service(temp.path(), &forge)
            .reconcile(&source, Utc::now())
            .await
            .unwrap_err();

        assert_eq!(err.phase(), SyncPhase::Push);
        assert!(forge.mutations().is_empty());
    }

    #[tokio::test]
    async fn test_git_mirror_sets_head() {
        let temp = TempDir::new().unwrap();
        let source_path = temp.path().join("source.git");
        let source_repo = Repository::init_bare(&source_path).unwrap();
        commit(&source_repo, "initial");
        let dest_path = temp.path().join("dest.git");
        Repository::init_bare(&dest_path).unwrap();

        let git = GitMirror::new(MirrorCache::new(temp.path().join("cache")), "mirror");
        let source = RepositoryRef::new("source", source_path.to_str().unwrap());
        let destination = RepositoryRef::new("dest", dest_path.to_str().unwrap());

        let report = git.mirror(&source, &destination, Some("main")).await.unwrap();
        assert_eq!(report.refresh, CacheRefresh::Cloned);
        assert_eq!(report.push, Change::Updated);

        let mirror = Repository::open_bare(git.cache().path_for(&source.url)).unwrap();
        assert_eq!(mirror.head().unwrap().name(), Some("refs/heads/main"));

        let report = git.mirror(&source, &destination, None).await.unwrap();
        assert!(report.is_noop());

        let err = git.mirror(&source, &destination, Some("nope")).await.unwrap_err();
        assert_eq!(err.phase(), SyncPhase::Fetch);
    }

    #[tokio::test]
    async fn test_discovery_failure_is_fatal() {
        let temp = TempDir::new().unwrap();
        let forge = InMemoryForge::new(Forge::GitHub, "/unused").with_list_error("boom");
        let service = service(temp.path(), &forge);

        let err = service.discover_and_run(&forge, "alice").await.unwrap_err();
        assert_eq!(err.phase(), SyncPhase::Discovery);
        assert_eq!(forge.calls(), vec![ForgeCall::ListRepositories { owner: "alice".into() }]);
    }
}
